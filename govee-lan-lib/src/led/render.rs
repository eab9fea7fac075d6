use std::future::Future;
use std::time::Duration;

use log::{info, warn};
use tokio::time::{sleep, Instant};

use crate::control_interface::ControlInterface;
use crate::led::pattern::{Frame, FrameSource, RESET_FRAME};
use crate::util::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    /// Pause between two frames.
    pub frame_interval: Duration,
    /// Stop after this long even if the source has more frames.
    pub duration: Option<Duration>,
    /// Shown when the loop ends, however it ends.
    pub reset_frame: Frame,
    /// Wait after turning the device on before the first frame.
    pub settle_delay: Duration,
}

impl Default for RenderSettings {
    fn default() -> Self {
        RenderSettings {
            frame_interval: Duration::from_millis(50),
            duration: None,
            reset_frame: RESET_FRAME,
            settle_delay: Duration::from_millis(500),
        }
    }
}

pub const MIN_FRAME_RATE: f64 = 0.1;
pub const MAX_FRAME_RATE: f64 = 1000.0;

impl RenderSettings {
    /// Sets the frame rate, clamped to `MIN_FRAME_RATE..=MAX_FRAME_RATE`.
    /// A NaN rate leaves the interval unchanged.
    pub fn with_frame_rate(mut self, frames_per_second: f64) -> Self {
        if frames_per_second.is_nan() {
            return self;
        }
        let rate = frames_per_second.clamp(MIN_FRAME_RATE, MAX_FRAME_RATE);
        self.frame_interval = Duration::from_secs_f64(1.0 / rate);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSummary {
    pub frames: u64,
    pub elapsed: Duration,
    /// The loop was stopped by the shutdown signal rather than finishing.
    pub interrupted: bool,
}

impl RenderSummary {
    pub fn frames_per_second(&self) -> f64 {
        let seconds = self.elapsed.as_secs_f64();
        if seconds > 0.0 {
            self.frames as f64 / seconds
        } else {
            0.0
        }
    }
}

/// Plays a [`FrameSource`] on one device.
pub struct Renderer<'a> {
    interface: &'a ControlInterface,
    settings: RenderSettings,
}

impl<'a> Renderer<'a> {
    pub fn new(interface: &'a ControlInterface, settings: RenderSettings) -> Self {
        Renderer {
            interface,
            settings,
        }
    }

    /// Plays `source` until it ends, the configured duration passes, or the
    /// user presses Ctrl-C.
    pub async fn run<S: FrameSource + ?Sized>(&self, source: &mut S) -> Result<RenderSummary> {
        self.run_until(source, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /**
    Plays `source` until it ends, the configured duration passes, or
    `shutdown` completes.

    The device is turned on first. Whichever way the loop stops, the reset
    frame is sent before this returns. An error from the loop wins over an
    error from the reset.
     */
    pub async fn run_until<S, F>(&self, source: &mut S, shutdown: F) -> Result<RenderSummary>
    where
        S: FrameSource + ?Sized,
        F: Future<Output = ()>,
    {
        self.interface.turn_on().await?;

        let started = Instant::now();
        let mut frames = 0;
        let outcome = tokio::select! {
            result = self.play(source, &mut frames) => result.map(|_| false),
            _ = shutdown => Ok(true),
        };
        let elapsed = started.elapsed();

        let reset = self.show(self.settings.reset_frame).await;
        let interrupted = match (outcome, reset) {
            (Ok(interrupted), Ok(())) => interrupted,
            (Ok(_), Err(e)) => return Err(e),
            (Err(e), reset) => {
                if let Err(reset_error) = reset {
                    warn!("Reset after a failed render also failed: {}", reset_error);
                }
                return Err(e);
            }
        };

        if interrupted {
            info!("Pattern interrupted after {:.1}s", elapsed.as_secs_f64());
        }
        let summary = RenderSummary {
            frames,
            elapsed,
            interrupted,
        };
        info!(
            "Rendered {} frames ({:.1} FPS), device reset",
            summary.frames,
            summary.frames_per_second()
        );
        Ok(summary)
    }

    async fn play<S: FrameSource + ?Sized>(&self, source: &mut S, frames: &mut u64) -> Result<()> {
        sleep(self.settings.settle_delay).await;

        let started = Instant::now();
        loop {
            let elapsed = started.elapsed();
            if self.settings.duration.is_some_and(|limit| elapsed >= limit) {
                break;
            }
            let Some(frame) = source.next_frame(elapsed) else {
                break;
            };
            self.show(frame).await?;
            *frames += 1;
            sleep(self.settings.frame_interval).await;
        }
        Ok(())
    }

    async fn show(&self, frame: Frame) -> Result<()> {
        let color = frame.color;
        self.interface
            .set_color(color.red.into(), color.green.into(), color.blue.into())
            .await?;
        self.interface.set_brightness(frame.brightness.into()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::pattern::{Bounded, Pattern};
    use crate::util::config::LanConfig;
    use crate::util::envelope::RGB;
    use serde_json::{json, Value};
    use std::net::Ipv4Addr;
    use tokio::net::UdpSocket;
    use tokio::time::timeout;

    /// Yields a fixed number of frames, then ends.
    struct Countdown {
        remaining: u32,
        total: u32,
    }

    impl FrameSource for Countdown {
        fn next_frame(&mut self, _elapsed: Duration) -> Option<Frame> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            Some(Frame::new(RGB::new(10, 20, 30), 40))
        }

        fn restart(&mut self) {
            self.remaining = self.total;
        }
    }

    async fn fake_device() -> (UdpSocket, ControlInterface) {
        let device = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let config = LanConfig::default().with_control_port(device.local_addr().unwrap().port());
        let interface = ControlInterface::with_config(Some(Ipv4Addr::LOCALHOST.into()), config);
        (device, interface)
    }

    async fn drain(device: &UdpSocket) -> Vec<Value> {
        let mut messages = Vec::new();
        let mut buffer = [0; 1024];
        loop {
            let received = timeout(Duration::from_millis(200), device.recv_from(&mut buffer)).await;
            let Ok(Ok((len, _))) = received else {
                break;
            };
            messages.push(serde_json::from_slice(&buffer[..len]).unwrap());
        }
        messages
    }

    fn settings() -> RenderSettings {
        RenderSettings::default()
            .with_settle_delay(Duration::ZERO)
            .with_frame_rate(100.0)
    }

    fn assert_reset_at_end(messages: &[Value]) {
        let n = messages.len();
        assert!(n >= 3);
        assert_eq!(
            messages[n - 2],
            json!({"msg": {"cmd": "colorwc", "data": {
                "color": {"r": 255, "g": 255, "b": 255},
                "colorTemInKelvin": 0
            }}})
        );
        assert_eq!(
            messages[n - 1],
            json!({"msg": {"cmd": "brightness", "data": {"value": 100}}})
        );
    }

    #[tokio::test]
    async fn test_finite_source_plays_every_frame_then_resets() {
        let (device, interface) = fake_device().await;
        let mut source = Countdown {
            remaining: 3,
            total: 3,
        };

        let summary = Renderer::new(&interface, settings())
            .run_until(&mut source, std::future::pending())
            .await
            .unwrap();
        let messages = drain(&device).await;

        assert_eq!(summary.frames, 3);
        assert!(!summary.interrupted);
        assert_eq!(messages.len(), 1 + 3 * 2 + 2);
        assert_eq!(messages[0], json!({"msg": {"cmd": "turn", "data": {"value": 1}}}));
        assert_eq!(
            messages[1],
            json!({"msg": {"cmd": "colorwc", "data": {
                "color": {"r": 10, "g": 20, "b": 30},
                "colorTemInKelvin": 0
            }}})
        );
        assert_eq!(
            messages[2],
            json!({"msg": {"cmd": "brightness", "data": {"value": 40}}})
        );
        assert_reset_at_end(&messages);

        source.restart();
        assert!(source.next_frame(Duration::ZERO).is_some());
    }

    #[tokio::test]
    async fn test_interrupt_still_resets_device() {
        let (device, interface) = fake_device().await;
        let mut source = Pattern::Rainbow;

        let summary = Renderer::new(&interface, settings())
            .run_until(&mut source, sleep(Duration::from_millis(100)))
            .await
            .unwrap();
        let messages = drain(&device).await;

        assert!(summary.interrupted);
        assert_eq!(messages[0], json!({"msg": {"cmd": "turn", "data": {"value": 1}}}));
        assert_reset_at_end(&messages);
    }

    #[tokio::test]
    async fn test_duration_limit_ends_loop() {
        let (device, interface) = fake_device().await;
        let mut source = Bounded::new(Pattern::Plasma, Duration::from_secs(60));

        let settings = settings().with_duration(Duration::from_millis(100));
        let summary = Renderer::new(&interface, settings)
            .run_until(&mut source, std::future::pending())
            .await
            .unwrap();
        let messages = drain(&device).await;

        assert!(!summary.interrupted);
        assert!(summary.frames >= 1);
        assert!(summary.elapsed < Duration::from_secs(5));
        assert_reset_at_end(&messages);
    }

    #[tokio::test]
    async fn test_missing_target_fails_before_rendering() {
        let interface = ControlInterface::new(None);
        let mut source = Pattern::Rainbow;
        let result = Renderer::new(&interface, settings())
            .run_until(&mut source, std::future::pending())
            .await;
        assert!(matches!(
            result,
            Err(crate::util::error::LanError::MissingTarget)
        ));
    }

    #[test]
    fn test_frame_rate_is_clamped() {
        let interval = |rate: f64| RenderSettings::default().with_frame_rate(rate).frame_interval;
        assert_eq!(interval(20.0), Duration::from_millis(50));
        assert_eq!(interval(0.0), Duration::from_secs(10));
        assert_eq!(interval(-5.0), Duration::from_secs(10));
        assert_eq!(interval(f64::INFINITY), Duration::from_millis(1));
        assert_eq!(interval(1e300), Duration::from_millis(1));
        assert_eq!(interval(f64::NAN), RenderSettings::default().frame_interval);
    }

    #[test]
    fn test_frames_per_second() {
        let summary = RenderSummary {
            frames: 40,
            elapsed: Duration::from_secs(2),
            interrupted: false,
        };
        assert_eq!(summary.frames_per_second(), 20.0);
        let empty = RenderSummary {
            frames: 0,
            elapsed: Duration::ZERO,
            interrupted: true,
        };
        assert_eq!(empty.frames_per_second(), 0.0);
    }
}
