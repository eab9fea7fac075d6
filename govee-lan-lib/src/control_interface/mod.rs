use std::net::{IpAddr, SocketAddr};

use log::{debug, warn};

use crate::util::config::LanConfig;
use crate::util::envelope::{Command, DeviceDescriptor, Power, Reply, StatusSnapshot};
use crate::util::error::{LanError, Result};
use crate::util::transport::Transport;

/// Controls one device over the LAN API.
///
/// Every operation opens its own socket, sends exactly one datagram and
/// closes the socket again, so an instance holds no connection state and can
/// be cloned freely. Nothing is retried: a lost datagram is a lost command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlInterface {
    host: Option<IpAddr>,
    config: LanConfig,
}

impl ControlInterface {
    /// Creates an interface for `host`. Without a host every operation fails
    /// with [`LanError::MissingTarget`].
    pub fn new(host: Option<IpAddr>) -> Self {
        Self::with_config(host, LanConfig::default())
    }

    pub fn with_config(host: Option<IpAddr>, config: LanConfig) -> Self {
        ControlInterface { host, config }
    }

    pub fn from_device_descriptor(device: &DeviceDescriptor, config: LanConfig) -> Self {
        Self::with_config(Some(device.ip), config)
    }

    pub fn host(&self) -> Option<IpAddr> {
        self.host
    }

    pub fn config(&self) -> &LanConfig {
        &self.config
    }

    fn target(&self) -> Result<SocketAddr> {
        self.host
            .map(|ip| SocketAddr::new(ip, self.config.control_port))
            .ok_or(LanError::MissingTarget)
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.send_command(&Command::turn(Power::On)).await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.send_command(&Command::turn(Power::Off)).await
    }

    /// Sets the brightness. The level is clamped to 1..=100.
    pub async fn set_brightness(&self, level: i32) -> Result<()> {
        self.send_command(&Command::brightness(level)).await
    }

    /// Sets an RGB color. Each channel is clamped to 0..=255.
    pub async fn set_color(&self, red: i32, green: i32, blue: i32) -> Result<()> {
        self.send_command(&Command::color(red, green, blue)).await
    }

    /// Sets a white color temperature. The value is clamped to 2000..=9000 K.
    pub async fn set_temperature(&self, kelvin: i32) -> Result<()> {
        self.send_command(&Command::temperature(kelvin)).await
    }

    /// Queries the device state.
    ///
    /// Waits once, for the configured status timeout, for a reply. `None`
    /// means no usable reply arrived; that covers an offline device, a lost
    /// datagram and a reply that did not decode, which cannot be told apart.
    pub async fn get_status(&self) -> Result<Option<StatusSnapshot>> {
        let target = self.target()?;
        let transport = Transport::bind_unicast(self.config.status_timeout).await?;
        transport
            .send(&Command::dev_status().encode()?, target)
            .await?;

        match transport.receive(self.config.max_datagram_size).await {
            Ok((datagram, source)) => match Reply::decode(&datagram) {
                Ok(Reply::DevStatus(status)) => Ok(Some(status)),
                Ok(other) => {
                    warn!("Expected a status reply from {}, got {}", source, other.kind());
                    Ok(None)
                }
                Err(e) => {
                    warn!("Discarding status reply from {}: {}", source, e);
                    Ok(None)
                }
            },
            Err(LanError::Timeout(waited)) => {
                debug!("No status reply from {} within {:?}", target, waited);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a command that the device does not answer.
    async fn send_command(&self, command: &Command) -> Result<()> {
        let target = self.target()?;
        let transport = Transport::bind_unicast(self.config.status_timeout).await?;
        debug!("Sending {} to {}", command.kind(), target);
        transport.send(&command.encode()?, target).await
    }
}
