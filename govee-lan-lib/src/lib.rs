//! # Govee LAN Control Library
//!
//! `govee-lan-lib` controls Govee lights over the local network with the LAN
//! API, a small JSON-over-UDP protocol that is not subject to the cloud API's
//! rate limits. LAN control has to be enabled for each device in the Govee
//! Home app.
//!
//! ## Features
//!
//! - Multicast discovery of devices on the local network
//! - Power, brightness, RGB color and color temperature control
//! - Best-effort status queries
//! - Mathematical and demo light patterns played through a render loop that
//!   always resets the device when it stops
//!
//! ## Example
//!
//! ```no_run
//! use govee_lan_lib::control_interface::ControlInterface;
//! use govee_lan_lib::util::discovery::Discovery;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let devices = Discovery::find_devices(Duration::from_secs(3)).await?;
//!
//!     for device in devices {
//!         let light = ControlInterface::new(Some(device.ip));
//!         light.turn_on().await?;
//!         light.set_color(255, 0, 128).await?;
//!         println!("{} is now {:?}", device.sku, light.get_status().await?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Disclaimer
//!
//! This project is not affiliated with, authorized by, endorsed by, or in any way officially connected
//! with Govee or its affiliates.
//!
//! ## License
//!
//! This project is dual-licensed under the MIT License and the Apache License, Version 2.0.
//! You may choose to use either license, depending on your project needs.

// The `control_interface` module talks to a single device: fire-and-forget
// control commands and the status query.
//
// Example usage:
//
// ```
// use govee_lan_lib::control_interface::ControlInterface;
//
// #[tokio::main]
// async fn main() {
//     let light = ControlInterface::new(Some("192.168.1.23".parse().unwrap()));
//     light.set_brightness(75).await.unwrap();
// }
// ```
pub mod control_interface;

// The `led` module produces frames for animations and plays them on a
// device.
//
// Example usage:
//
// ```
// use govee_lan_lib::led::pattern::{Pattern, PatternName};
//
// let plasma = Pattern::from(PatternName::Plasma);
// let frame = plasma.frame_at(1.5);
// ```
pub mod led;

// The `util` module holds the wire protocol, the UDP transport, discovery
// and configuration shared by the rest of the library.
pub mod util;

pub use util::error::{LanError, Result};
