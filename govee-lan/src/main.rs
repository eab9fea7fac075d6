use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};

use govee_lan_lib::control_interface::ControlInterface;
use govee_lan_lib::led::pattern::{Pattern, PatternName};
use govee_lan_lib::led::render::{RenderSettings, Renderer};
use govee_lan_lib::util::config::LanConfig;
use govee_lan_lib::util::discovery::Discovery;
use govee_lan_lib::util::envelope::{clamp_brightness, clamp_kelvin, RGB};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli).await
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "govee_lan",
    about = "Controls Govee lights over the local network",
    version
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `discover` and `status` commands.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Sends a command to a single device
    #[clap(name = "device-call")]
    DeviceCall {
        /// Sets the IP address of the device
        #[clap(long)]
        ip: IpAddr,

        /// UDP port the device listens on for commands
        #[clap(long, default_value_t = govee_lan_lib::util::config::CONTROL_PORT)]
        control_port: u16,

        /// How long to wait for a status reply, in milliseconds
        #[clap(long, default_value_t = 2000)]
        status_timeout: u64,

        #[clap(subcommand)]
        action: DeviceAction,
    },
    /// Finds devices on the local network via multicast
    #[clap(name = "discover")]
    Discover {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,

        /// Search timeout in milliseconds
        #[clap(short = 't', long = "timeout", default_value_t = 3000)]
        timeout: u64,

        /// Local port that devices send scan replies to
        #[clap(long, default_value_t = govee_lan_lib::util::config::LISTEN_PORT)]
        listen_port: u16,
    },
}

/// Actions available under the `device-call` subcommand
#[derive(Subcommand)]
pub enum DeviceAction {
    /// Queries power, brightness and color.
    #[clap(name = "status")]
    Status {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Json)]
        output: OutputFormat,
    },
    /// Turns the device on.
    #[clap(name = "on")]
    On,
    /// Turns the device off.
    #[clap(name = "off")]
    Off,
    /// Sets the brightness (1-100).
    #[clap(name = "brightness")]
    Brightness {
        #[clap(allow_negative_numbers = true)]
        level: i32,
    },
    /// Sets an RGB color (0-255 each).
    #[clap(name = "color")]
    Color {
        #[clap(allow_negative_numbers = true)]
        red: i32,
        #[clap(allow_negative_numbers = true)]
        green: i32,
        #[clap(allow_negative_numbers = true)]
        blue: i32,
    },
    /// Sets the white color temperature (2000-9000 K).
    #[clap(name = "temperature")]
    Temperature { kelvin: i32 },
    /// Plays a light pattern until it ends or Ctrl-C is pressed, then resets to white.
    #[clap(name = "pattern")]
    Pattern {
        /// The pattern to play
        #[clap(value_enum)]
        name: PatternName,

        /// How long to play, in seconds [default: 60, or until `all` finishes]
        #[clap(short, long)]
        duration: Option<f64>,

        /// Frames sent per second
        #[clap(long, default_value_t = 20.0)]
        fps: f64,

        /// Pattern parameters, e.g. harmonics for fourier or r g b for pulse
        #[clap(allow_negative_numbers = true)]
        params: Vec<f64>,
    },
}

const DEFAULT_PATTERN_DURATION: Duration = Duration::from_secs(60);

fn parse_duration(seconds: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(seconds) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => Err(anyhow!(
            "Duration must be a positive number of seconds, got {}",
            seconds
        )),
    }
}

async fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Discover {
            output,
            timeout,
            listen_port,
        } => {
            let config = LanConfig::default().with_listen_port(listen_port);
            let devices =
                Discovery::find_devices_with(&config, Duration::from_millis(timeout)).await?;
            match output {
                OutputFormat::Plaintext => {
                    if devices.is_empty() {
                        println!("No devices found.");
                        println!();
                        println!("Troubleshooting:");
                        println!("  1. Enable LAN Control in the Govee Home app");
                        println!("  2. Ensure the device is on the same network");
                        println!("  3. Check that the firewall allows UDP ports 4001-4003");
                    } else {
                        println!("Found {} device(s):", devices.len());
                        Discovery::pretty_print_devices(&devices);
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&devices)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&devices)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::DeviceCall {
            ip,
            control_port,
            status_timeout,
            action,
        } => {
            let config = LanConfig::default()
                .with_control_port(control_port)
                .with_status_timeout(Duration::from_millis(status_timeout));
            let control_interface = ControlInterface::with_config(Some(ip), config);

            match action {
                DeviceAction::Status { output } => {
                    let status = control_interface.get_status().await?;
                    match (status, output) {
                        (None, _) => {
                            println!("No status reply from {}", ip);
                        }
                        (Some(status), OutputFormat::Plaintext) => {
                            println!("Power: {}", if status.is_on() { "on" } else { "off" });
                            println!("Brightness: {}", status.brightness);
                            println!(
                                "Color: RGB({}, {}, {})",
                                status.color.red, status.color.green, status.color.blue
                            );
                            println!("Color temperature: {}K", status.color_tem_in_kelvin);
                        }
                        (Some(status), OutputFormat::Json) => {
                            println!("{}", serde_json::to_string_pretty(&status)?);
                        }
                        (Some(status), OutputFormat::Yaml) => {
                            println!("{}", serde_yaml::to_string(&status)?);
                        }
                    }
                }
                DeviceAction::On => {
                    control_interface.turn_on().await?;
                    println!("Device turned on");
                }
                DeviceAction::Off => {
                    control_interface.turn_off().await?;
                    println!("Device turned off");
                }
                DeviceAction::Brightness { level } => {
                    control_interface.set_brightness(level).await?;
                    println!("Brightness set to {}", clamp_brightness(level));
                }
                DeviceAction::Color { red, green, blue } => {
                    control_interface.set_color(red, green, blue).await?;
                    let sent = RGB::clamped(red, green, blue);
                    println!(
                        "Color set to RGB({}, {}, {})",
                        sent.red, sent.green, sent.blue
                    );
                }
                DeviceAction::Temperature { kelvin } => {
                    control_interface.set_temperature(kelvin).await?;
                    println!("Temperature set to {}K", clamp_kelvin(kelvin));
                }
                DeviceAction::Pattern {
                    name,
                    duration,
                    fps,
                    params,
                } => {
                    if !(fps > 0.0) {
                        return Err(anyhow!("Frame rate must be positive"));
                    }
                    let limit = match (duration, name) {
                        (Some(seconds), _) => Some(parse_duration(seconds)?),
                        (None, PatternName::All) => None,
                        (None, _) => Some(DEFAULT_PATTERN_DURATION),
                    };
                    let mut pattern = Pattern::from_name(name, &params)?;
                    let mut settings = RenderSettings::default().with_frame_rate(fps);
                    if let Some(limit) = limit {
                        settings = settings.with_duration(limit);
                    }

                    match limit {
                        Some(limit) => println!(
                            "Running {} for {}s, press Ctrl+C to stop",
                            name,
                            limit.as_secs_f64()
                        ),
                        None => println!("Running {}, press Ctrl+C to stop", name),
                    }
                    let summary = Renderer::new(&control_interface, settings)
                        .run(&mut pattern)
                        .await?;
                    if summary.interrupted {
                        println!(
                            "Pattern interrupted after {:.1}s",
                            summary.elapsed.as_secs_f64()
                        );
                    }
                    println!(
                        "Pattern complete! Rendered {} frames ({:.1} FPS), reset to white",
                        summary.frames,
                        summary.frames_per_second()
                    );
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(1.5).unwrap(), Duration::from_millis(1500));
        for seconds in [0.0, -1.0, 1e20, f64::INFINITY, f64::NAN, 1e-12] {
            assert!(parse_duration(seconds).is_err(), "{} was accepted", seconds);
        }
    }

    #[test]
    fn test_pattern_duration_is_optional() {
        let cli = Cli::try_parse_from([
            "govee_lan",
            "device-call",
            "--ip",
            "192.168.1.23",
            "pattern",
            "all",
        ])
        .unwrap();
        let Commands::DeviceCall {
            action: DeviceAction::Pattern { name, duration, .. },
            ..
        } = cli.command
        else {
            panic!("expected a pattern call");
        };
        assert_eq!(name, PatternName::All);
        assert_eq!(duration, None);
    }
}
