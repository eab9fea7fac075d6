//! The JSON envelope spoken on every LAN port.
//!
//! Every datagram has the shape `{"msg": {"cmd": <kind>, "data": <payload>}}`.
//! Outbound messages are built as [`Command`] values, whose constructors
//! clamp numeric parameters into the range the device accepts. Inbound
//! datagrams decode into [`Reply`], keeping only the fields this crate uses.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::util::error::{LanError, Result};

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 100;
pub const MIN_KELVIN: u16 = 2000;
pub const MAX_KELVIN: u16 = 9000;

/// Token sent with every scan request.
pub const SCAN_ACCOUNT_TOPIC: &str = "reserve";

/// The `cmd` field of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Scan,
    Turn,
    Brightness,
    ColorWc,
    DevStatus,
}

impl FromStr for CommandKind {
    type Err = LanError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "scan" => Ok(CommandKind::Scan),
            "turn" => Ok(CommandKind::Turn),
            "brightness" => Ok(CommandKind::Brightness),
            "colorwc" => Ok(CommandKind::ColorWc),
            "devStatus" => Ok(CommandKind::DevStatus),
            other => Err(LanError::MalformedResponse(format!(
                "unknown command kind {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind_str = match self {
            CommandKind::Scan => "scan",
            CommandKind::Turn => "turn",
            CommandKind::Brightness => "brightness",
            CommandKind::ColorWc => "colorwc",
            CommandKind::DevStatus => "devStatus",
        };
        write!(f, "{}", kind_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RGB {
    #[serde(rename = "r")]
    pub red: u8,
    #[serde(rename = "g")]
    pub green: u8,
    #[serde(rename = "b")]
    pub blue: u8,
}

impl RGB {
    pub const WHITE: RGB = RGB {
        red: 255,
        green: 255,
        blue: 255,
    };

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        RGB { red, green, blue }
    }

    /// Builds a color from arbitrary integers, clamping each channel to 0..=255.
    pub fn clamped(red: i32, green: i32, blue: i32) -> Self {
        RGB {
            red: clamp_channel(red),
            green: clamp_channel(green),
            blue: clamp_channel(blue),
        }
    }
}

impl From<(u8, u8, u8)> for RGB {
    fn from(tuple: (u8, u8, u8)) -> Self {
        RGB::new(tuple.0, tuple.1, tuple.2)
    }
}

impl From<RGB> for (u8, u8, u8) {
    fn from(rgb: RGB) -> Self {
        (rgb.red, rgb.green, rgb.blue)
    }
}

fn clamp_channel(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

pub fn clamp_brightness(level: i32) -> u8 {
    level.clamp(MIN_BRIGHTNESS as i32, MAX_BRIGHTNESS as i32) as u8
}

pub fn clamp_kelvin(kelvin: i32) -> u16 {
    kelvin.clamp(MIN_KELVIN as i32, MAX_KELVIN as i32) as u16
}

/// Power value of a `turn` command, encoded as `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Power {
    Off,
    On,
}

impl Serialize for Power {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(match self {
            Power::Off => 0,
            Power::On => 1,
        })
    }
}

impl<'de> Deserialize<'de> for Power {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Power::Off),
            1 => Ok(Power::On),
            other => Err(serde::de::Error::custom(format!(
                "power value must be 0 or 1, got {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanPayload {
    pub account_topic: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnPayload {
    pub value: Power,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrightnessPayload {
    pub value: u8,
}

/// Payload of `colorwc`. Color and temperature are exclusive: a color
/// command sends temperature `0`, a temperature command sends black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorWcPayload {
    pub color: RGB,
    #[serde(rename = "colorTemInKelvin")]
    pub color_tem_in_kelvin: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmptyPayload {}

/// An outbound command. Build these through the constructors, which apply
/// the device's range limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "cmd", content = "data")]
pub enum Command {
    #[serde(rename = "scan")]
    Scan(ScanPayload),
    #[serde(rename = "turn")]
    Turn(TurnPayload),
    #[serde(rename = "brightness")]
    Brightness(BrightnessPayload),
    #[serde(rename = "colorwc")]
    ColorWc(ColorWcPayload),
    #[serde(rename = "devStatus")]
    DevStatus(EmptyPayload),
}

impl Command {
    pub fn scan() -> Self {
        Command::Scan(ScanPayload {
            account_topic: SCAN_ACCOUNT_TOPIC.to_string(),
        })
    }

    pub fn turn(value: Power) -> Self {
        Command::Turn(TurnPayload { value })
    }

    pub fn brightness(level: i32) -> Self {
        Command::Brightness(BrightnessPayload {
            value: clamp_brightness(level),
        })
    }

    pub fn color(red: i32, green: i32, blue: i32) -> Self {
        Command::ColorWc(ColorWcPayload {
            color: RGB::clamped(red, green, blue),
            color_tem_in_kelvin: 0,
        })
    }

    pub fn temperature(kelvin: i32) -> Self {
        Command::ColorWc(ColorWcPayload {
            color: RGB::default(),
            color_tem_in_kelvin: clamp_kelvin(kelvin),
        })
    }

    pub fn dev_status() -> Self {
        Command::DevStatus(EmptyPayload {})
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Scan(_) => CommandKind::Scan,
            Command::Turn(_) => CommandKind::Turn,
            Command::Brightness(_) => CommandKind::Brightness,
            Command::ColorWc(_) => CommandKind::ColorWc,
            Command::DevStatus(_) => CommandKind::DevStatus,
        }
    }

    /// Whether the device answers this command.
    pub fn expects_reply(&self) -> bool {
        matches!(self, Command::Scan(_) | Command::DevStatus(_))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&Envelope { msg: self }).map_err(LanError::Encode)
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    msg: T,
}

#[derive(Deserialize)]
struct RawMessage {
    cmd: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// A device as it describes itself in a scan reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub ip: IpAddr,
    /// Stable hardware identifier, e.g. `1F:80:C5:32:32:36:72:4E`.
    pub device: String,
    pub sku: String,
    #[serde(default)]
    pub ble_version_hard: String,
    #[serde(default)]
    pub ble_version_soft: String,
    #[serde(default)]
    pub wifi_version_hard: String,
    #[serde(default)]
    pub wifi_version_soft: String,
}

/// Color channels as a device reports them. Unlike [`RGB`] these are not
/// range checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ReportedColor {
    #[serde(rename = "r")]
    pub red: i64,
    #[serde(rename = "g")]
    pub green: i64,
    #[serde(rename = "b")]
    pub blue: i64,
}

impl From<RGB> for ReportedColor {
    fn from(rgb: RGB) -> Self {
        ReportedColor {
            red: rgb.red.into(),
            green: rgb.green.into(),
            blue: rgb.blue.into(),
        }
    }
}

/// Device state from a `devStatus` reply.
///
/// Values are kept exactly as the device sent them, even when they lie
/// outside the ranges a command may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(rename = "onOff")]
    pub on_off: i64,
    pub brightness: i64,
    pub color: ReportedColor,
    #[serde(rename = "colorTemInKelvin")]
    pub color_tem_in_kelvin: i64,
}

impl StatusSnapshot {
    pub fn is_on(&self) -> bool {
        self.on_off != 0
    }
}

/// A decoded inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Scan(DeviceDescriptor),
    DevStatus(StatusSnapshot),
    Turn(TurnPayload),
    Brightness(BrightnessPayload),
    ColorWc(ColorWcPayload),
}

impl Reply {
    /// Decodes a datagram.
    ///
    /// Anything that is not JSON, lacks `msg.cmd`, names an unknown kind or
    /// carries a payload without the required fields is a
    /// [`LanError::MalformedResponse`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope<RawMessage> = serde_json::from_slice(bytes)
            .map_err(|e| LanError::MalformedResponse(e.to_string()))?;
        let kind: CommandKind = envelope.msg.cmd.parse()?;
        let data = envelope.msg.data;

        let reply = match kind {
            CommandKind::Scan => Reply::Scan(payload(kind, data)?),
            CommandKind::DevStatus => Reply::DevStatus(payload(kind, data)?),
            CommandKind::Turn => Reply::Turn(payload(kind, data)?),
            CommandKind::Brightness => Reply::Brightness(payload(kind, data)?),
            CommandKind::ColorWc => Reply::ColorWc(payload(kind, data)?),
        };
        Ok(reply)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Reply::Scan(_) => CommandKind::Scan,
            Reply::DevStatus(_) => CommandKind::DevStatus,
            Reply::Turn(_) => CommandKind::Turn,
            Reply::Brightness(_) => CommandKind::Brightness,
            Reply::ColorWc(_) => CommandKind::ColorWc,
        }
    }
}

fn payload<T: serde::de::DeserializeOwned>(
    kind: CommandKind,
    data: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| LanError::MalformedResponse(format!("bad {} payload: {}", kind, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(command: &Command) -> serde_json::Value {
        serde_json::from_slice(&command.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_scan_envelope() {
        assert_eq!(
            wire(&Command::scan()),
            json!({"msg": {"cmd": "scan", "data": {"account_topic": "reserve"}}})
        );
    }

    #[test]
    fn test_turn_envelope() {
        assert_eq!(
            wire(&Command::turn(Power::On)),
            json!({"msg": {"cmd": "turn", "data": {"value": 1}}})
        );
        assert_eq!(
            wire(&Command::turn(Power::Off)),
            json!({"msg": {"cmd": "turn", "data": {"value": 0}}})
        );
    }

    #[test]
    fn test_dev_status_sends_empty_object() {
        assert_eq!(
            wire(&Command::dev_status()),
            json!({"msg": {"cmd": "devStatus", "data": {}}})
        );
    }

    #[test]
    fn test_brightness_is_clamped() {
        assert_eq!(Command::brightness(150), Command::brightness(100));
        assert_eq!(
            wire(&Command::brightness(0)),
            json!({"msg": {"cmd": "brightness", "data": {"value": 1}}})
        );
        for level in [-1000, -1, 0, 1, 50, 100, 101, 1000, i32::MAX, i32::MIN] {
            let clamped = clamp_brightness(level);
            assert!((MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&clamped));
        }
    }

    #[test]
    fn test_temperature_is_clamped_and_zeroes_color() {
        assert_eq!(clamp_kelvin(1000), 2000);
        assert_eq!(clamp_kelvin(9500), 9000);
        assert_eq!(clamp_kelvin(4000), 4000);
        assert_eq!(
            wire(&Command::temperature(1000)),
            json!({"msg": {"cmd": "colorwc", "data": {
                "color": {"r": 0, "g": 0, "b": 0},
                "colorTemInKelvin": 2000
            }}})
        );
    }

    #[test]
    fn test_color_is_clamped_through_the_wire() {
        let bytes = Command::color(300, -10, 128).encode().unwrap();
        match Reply::decode(&bytes).unwrap() {
            Reply::ColorWc(payload) => {
                assert_eq!(payload.color, RGB::new(255, 0, 128));
                assert_eq!(payload.color_tem_in_kelvin, 0);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    fn decoded_colorwc(command: &Command) -> ColorWcPayload {
        match Reply::decode(&command.encode().unwrap()).unwrap() {
            Reply::ColorWc(payload) => payload,
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_color_clamp_sweep() {
        let values = [
            i32::MIN,
            -65536,
            -256,
            -1,
            0,
            1,
            127,
            254,
            255,
            256,
            1000,
            i32::MAX,
        ];
        for red in values {
            for green in values {
                for blue in values {
                    let payload = decoded_colorwc(&Command::color(red, green, blue));
                    let channels = [
                        (red, payload.color.red),
                        (green, payload.color.green),
                        (blue, payload.color.blue),
                    ];
                    for (sent, received) in channels {
                        if (0..=255).contains(&sent) {
                            assert_eq!(i32::from(received), sent);
                        } else if sent < 0 {
                            assert_eq!(received, 0);
                        } else {
                            assert_eq!(received, 255);
                        }
                    }
                    assert_eq!(payload.color_tem_in_kelvin, 0);
                }
            }
        }
    }

    #[test]
    fn test_temperature_clamp_sweep() {
        for kelvin in [
            i32::MIN,
            -1,
            0,
            1999,
            2000,
            2001,
            6500,
            8999,
            9000,
            9001,
            65536,
            i32::MAX,
        ] {
            let payload = decoded_colorwc(&Command::temperature(kelvin));
            let received = i32::from(payload.color_tem_in_kelvin);
            assert!((2000..=9000).contains(&received), "{} became {}", kelvin, received);
            if (2000..=9000).contains(&kelvin) {
                assert_eq!(received, kelvin);
            }
            assert_eq!(payload.color, RGB::default());
        }
    }

    #[test]
    fn test_decode_scan_reply_ignores_extra_fields() {
        let datagram = json!({"msg": {"cmd": "scan", "data": {
            "ip": "192.168.1.23",
            "device": "1F:80:C5:32:32:36:72:4E",
            "sku": "H606A",
            "bleVersionHard": "3.01.01",
            "bleVersionSoft": "1.03.01",
            "wifiVersionHard": "1.00.10",
            "wifiVersionSoft": "1.02.03",
            "extra": true
        }}});
        let reply = Reply::decode(datagram.to_string().as_bytes()).unwrap();
        assert_eq!(reply.kind(), CommandKind::Scan);
        let Reply::Scan(device) = reply else {
            panic!("expected a scan reply");
        };
        assert_eq!(device.ip, "192.168.1.23".parse::<IpAddr>().unwrap());
        assert_eq!(device.sku, "H606A");
        assert_eq!(device.wifi_version_soft, "1.02.03");
    }

    #[test]
    fn test_decode_status_reply() {
        let datagram = json!({"msg": {"cmd": "devStatus", "data": {
            "onOff": 1,
            "brightness": 100,
            "color": {"r": 255, "g": 0, "b": 0},
            "colorTemInKelvin": 7200
        }}});
        let Reply::DevStatus(status) = Reply::decode(datagram.to_string().as_bytes()).unwrap()
        else {
            panic!("expected a status reply");
        };
        assert!(status.is_on());
        assert_eq!(status.brightness, 100);
        assert_eq!(status.color, RGB::new(255, 0, 0).into());
        assert_eq!(status.color_tem_in_kelvin, 7200);
    }

    #[test]
    fn test_status_values_pass_through_unchecked() {
        let datagram = json!({"msg": {"cmd": "devStatus", "data": {
            "onOff": 2,
            "brightness": 300,
            "color": {"r": 256, "g": -1, "b": 0},
            "colorTemInKelvin": 12000
        }}});
        let Reply::DevStatus(status) = Reply::decode(datagram.to_string().as_bytes()).unwrap()
        else {
            panic!("expected a status reply");
        };
        assert_eq!(
            status,
            StatusSnapshot {
                on_off: 2,
                brightness: 300,
                color: ReportedColor {
                    red: 256,
                    green: -1,
                    blue: 0,
                },
                color_tem_in_kelvin: 12000,
            }
        );
        assert!(status.is_on());

        let off = json!({"msg": {"cmd": "devStatus", "data": {
            "onOff": 0,
            "brightness": 0,
            "color": {"r": 0, "g": 0, "b": 0},
            "colorTemInKelvin": 0
        }}});
        let Reply::DevStatus(status) = Reply::decode(off.to_string().as_bytes()).unwrap() else {
            panic!("expected a status reply");
        };
        assert!(!status.is_on());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let datagrams: [&[u8]; 6] = [
            b"not json",
            br#"{"msg": 5}"#,
            br#"{"cmd": "scan"}"#,
            br#"{"msg": {"cmd": "reboot", "data": {}}}"#,
            br#"{"msg": {"cmd": "scan", "data": {"ip": "10.0.0.2"}}}"#,
            br#"{"msg": {"cmd": "devStatus", "data": {"onOff": 7}}}"#,
        ];
        for datagram in datagrams {
            let result = Reply::decode(datagram);
            assert!(
                matches!(result, Err(LanError::MalformedResponse(_))),
                "{:?} decoded to {:?}",
                String::from_utf8_lossy(datagram),
                result
            );
        }
    }

    #[test]
    fn test_command_kind_names() {
        for kind in [
            CommandKind::Scan,
            CommandKind::Turn,
            CommandKind::Brightness,
            CommandKind::ColorWc,
            CommandKind::DevStatus,
        ] {
            assert_eq!(kind.to_string().parse::<CommandKind>().unwrap(), kind);
        }
        assert!(Command::dev_status().expects_reply());
        assert!(!Command::color(1, 2, 3).expects_reply());
        assert_eq!(Command::temperature(3000).kind(), CommandKind::ColorWc);
    }
}
