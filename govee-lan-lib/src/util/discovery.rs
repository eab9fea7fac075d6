use std::time::Duration;

use log::{debug, info, warn};
use tokio::time::Instant;

use crate::util::config::LanConfig;
use crate::util::envelope::{Command, DeviceDescriptor, Reply};
use crate::util::error::{LanError, Result};
use crate::util::transport::Transport;

pub struct Discovery;

impl Discovery {
    /// Finds devices with LAN control enabled using the default ports.
    ///
    /// An empty result means no device answered within `given_timeout`.
    pub async fn find_devices(given_timeout: Duration) -> Result<Vec<DeviceDescriptor>> {
        Self::find_devices_with(&LanConfig::default(), given_timeout).await
    }

    /**
    Sends one scan request to the multicast group and collects every reply
    until `given_timeout` has passed since the request went out.

    Replies are not deduplicated: a device that answers twice is listed
    twice. Datagrams that do not decode as scan replies are skipped and the
    scan keeps listening.
     */
    pub async fn find_devices_with(
        config: &LanConfig,
        given_timeout: Duration,
    ) -> Result<Vec<DeviceDescriptor>> {
        let transport =
            Transport::bind_multicast(config.listen_port, config.multicast_ttl, given_timeout)
                .await?;
        let scan = Command::scan().encode()?;
        transport.send(&scan, config.discovery_target()).await?;

        let timeout_end = Instant::now() + given_timeout;
        let mut discovered_devices = Vec::new();

        loop {
            let now = Instant::now();
            if now >= timeout_end {
                break;
            }
            let remaining_time = timeout_end - now;

            match transport
                .receive_within(config.max_datagram_size, remaining_time)
                .await
            {
                Ok((datagram, source)) => match Reply::decode(&datagram) {
                    Ok(Reply::Scan(device)) => {
                        info!(
                            "Found device {} ({}) at {}",
                            device.device, device.sku, device.ip
                        );
                        discovered_devices.push(device);
                    }
                    Ok(other) => {
                        debug!("Ignoring {} message from {}", other.kind(), source);
                    }
                    Err(e) => {
                        warn!("Skipping datagram from {}: {}", source, e);
                    }
                },
                Err(LanError::Timeout(_)) => break,
                Err(e) => return Err(e),
            }
        }

        if discovered_devices.is_empty() {
            info!("Discovery finished without replies. Check that LAN control is enabled.");
        }
        Ok(discovered_devices)
    }

    pub fn pretty_print_devices(devices: &[DeviceDescriptor]) {
        for line in Self::format_table(devices) {
            println!("{}", line);
        }
    }

    /// Lays the devices out as a table with one padded column per field.
    pub fn format_table(devices: &[DeviceDescriptor]) -> Vec<String> {
        let header = ["IP Address", "Device ID", "SKU", "WiFi HW/SW", "BLE HW/SW"];
        let rows: Vec<[String; 5]> = devices
            .iter()
            .map(|d| {
                [
                    d.ip.to_string(),
                    d.device.clone(),
                    d.sku.clone(),
                    format!("{}/{}", d.wifi_version_hard, d.wifi_version_soft),
                    format!("{}/{}", d.ble_version_hard, d.ble_version_soft),
                ]
            })
            .collect();

        let mut widths = header.map(str::len);
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        let format_row = |cells: [&str; 5]| {
            cells
                .iter()
                .zip(widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = width + 2))
                .collect::<String>()
                .trim_end()
                .to_string()
        };

        let separator = widths.map(|w| "-".repeat(w));
        let mut lines = vec![
            format_row(header),
            format_row(separator.each_ref().map(String::as_str)),
        ];
        for row in &rows {
            lines.push(format_row(row.each_ref().map(String::as_str)));
        }
        lines
    }
}
