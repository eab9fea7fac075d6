use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use clap::ValueEnum;
use rand::Rng;

use crate::led::color::hsv_color;
use crate::util::envelope::{clamp_brightness, RGB};

/// One step of an animation: a color and a brightness in 1..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub color: RGB,
    pub brightness: u8,
}

impl Frame {
    pub fn new(color: RGB, brightness: i32) -> Self {
        Frame {
            color,
            brightness: clamp_brightness(brightness),
        }
    }

    pub fn from_hsv(hue: f64, saturation: f64, value: f64, brightness: i32) -> Self {
        Frame::new(hsv_color(hue, saturation, value), brightness)
    }
}

/// Full white at full brightness.
pub const RESET_FRAME: Frame = Frame {
    color: RGB::WHITE,
    brightness: 100,
};

/// A lazily evaluated, restartable sequence of frames.
pub trait FrameSource {
    /// The frame to show `elapsed` after the animation started, or `None`
    /// once the sequence is finished.
    fn next_frame(&mut self, elapsed: Duration) -> Option<Frame>;

    /// Rewinds the sequence to its first frame.
    fn restart(&mut self);
}

/// Ends an inner source once `duration` has elapsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounded<S> {
    inner: S,
    duration: Duration,
}

impl<S: FrameSource> Bounded<S> {
    pub fn new(inner: S, duration: Duration) -> Self {
        Bounded { inner, duration }
    }
}

impl<S: FrameSource> FrameSource for Bounded<S> {
    fn next_frame(&mut self, elapsed: Duration) -> Option<Frame> {
        if elapsed >= self.duration {
            return None;
        }
        self.inner.next_frame(elapsed)
    }

    fn restart(&mut self) {
        self.inner.restart();
    }
}

/**
Patterns played one after another, with a pause between two of them.

During a pause the previous pattern's closing frame is held. The sequence
ends after its last segment; there is no pause after it.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Sequence {
    segments: Vec<Bounded<Pattern>>,
    gap: Duration,
}

impl Sequence {
    pub fn new(segments: Vec<Bounded<Pattern>>, gap: Duration) -> Self {
        Sequence { segments, gap }
    }

    /// The demo reel: rainbow, ocean, fire, pulse, strobe and disco with one
    /// second between them.
    pub fn showcase() -> Self {
        let seconds = Duration::from_secs;
        Sequence::new(
            vec![
                Bounded::new(Pattern::Rainbow, seconds(15)),
                Bounded::new(Pattern::Ocean, seconds(15)),
                Bounded::new(Pattern::Fire, seconds(15)),
                Bounded::new(Pattern::Pulse { color: PURPLE }, seconds(10)),
                Bounded::new(
                    Pattern::Strobe {
                        colors: vec![
                            RGB::new(255, 0, 0),
                            RGB::new(0, 255, 0),
                            RGB::new(0, 0, 255),
                        ],
                        period: STROBE_PERIOD,
                    },
                    seconds(10),
                ),
                Bounded::new(Pattern::Disco, seconds(15)),
            ],
            seconds(1),
        )
    }

    /// Total running time, pauses included.
    pub fn duration(&self) -> Duration {
        let played: Duration = self.segments.iter().map(|segment| segment.duration).sum();
        let pauses = self.gap * self.segments.len().saturating_sub(1) as u32;
        played + pauses
    }

    /// The frame at `t` seconds after the start, or `None` once every
    /// segment has played.
    pub fn frame_at(&self, t: f64) -> Option<Frame> {
        let gap = self.gap.as_secs_f64();
        let mut start = 0.0;
        for (index, segment) in self.segments.iter().enumerate() {
            let length = segment.duration.as_secs_f64();
            if t < start + length {
                return Some(segment.inner.frame_at(t - start));
            }
            start += length;

            let is_last = index + 1 == self.segments.len();
            if !is_last {
                if t < start + gap {
                    return Some(segment.inner.frame_at(length));
                }
                start += gap;
            }
        }
        None
    }
}

impl FrameSource for Sequence {
    fn next_frame(&mut self, elapsed: Duration) -> Option<Frame> {
        self.frame_at(elapsed.as_secs_f64())
    }

    fn restart(&mut self) {
        for segment in &mut self.segments {
            segment.restart();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PatternName {
    Fourier,
    Perlin,
    Lissajous,
    Interference,
    Mandelbrot,
    Plasma,
    Rainbow,
    Pulse,
    Strobe,
    Fire,
    Ocean,
    Disco,
    /// Several demo patterns in a row.
    All,
}

impl PatternName {
    pub const VARIANTS: [PatternName; 13] = [
        PatternName::Fourier,
        PatternName::Perlin,
        PatternName::Lissajous,
        PatternName::Interference,
        PatternName::Mandelbrot,
        PatternName::Plasma,
        PatternName::Rainbow,
        PatternName::Pulse,
        PatternName::Strobe,
        PatternName::Fire,
        PatternName::Ocean,
        PatternName::Disco,
        PatternName::All,
    ];
}

impl FromStr for PatternName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PatternName::VARIANTS
            .into_iter()
            .find(|name| name.to_string() == s.to_lowercase())
            .ok_or_else(|| anyhow!("Unknown pattern: {}", s))
    }
}

impl fmt::Display for PatternName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name_str = match self {
            PatternName::Fourier => "fourier",
            PatternName::Perlin => "perlin",
            PatternName::Lissajous => "lissajous",
            PatternName::Interference => "interference",
            PatternName::Mandelbrot => "mandelbrot",
            PatternName::Plasma => "plasma",
            PatternName::Rainbow => "rainbow",
            PatternName::Pulse => "pulse",
            PatternName::Strobe => "strobe",
            PatternName::Fire => "fire",
            PatternName::Ocean => "ocean",
            PatternName::Disco => "disco",
            PatternName::All => "all",
        };
        write!(f, "{}", name_str)
    }
}

const PURPLE: RGB = RGB::new(138, 43, 226);
const STROBE_PERIOD: Duration = Duration::from_millis(300);
const MANDELBROT_MAX_ITERATIONS: u32 = 50;

/// A generator of frames from elapsed time and a fixed set of parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// Hue driven by a Fourier series of `harmonics` sine terms.
    Fourier { harmonics: u32 },
    /// Smooth 1-D value noise.
    Perlin { scale: f64 },
    /// Hue and saturation from a point on a Lissajous curve.
    Lissajous { freq_x: f64, freq_y: f64 },
    /// Brightness from interfering sine waves over a slow hue sweep.
    Interference { waves: u32 },
    /// Escape time of a zooming point near the Mandelbrot set boundary.
    Mandelbrot { zoom_speed: f64 },
    Plasma,
    Rainbow,
    Pulse { color: RGB },
    Strobe { colors: Vec<RGB>, period: Duration },
    Fire,
    Ocean,
    Disco,
    Showcase(Sequence),
}

impl From<PatternName> for Pattern {
    fn from(name: PatternName) -> Self {
        match name {
            PatternName::Fourier => Pattern::Fourier { harmonics: 5 },
            PatternName::Perlin => Pattern::Perlin { scale: 0.05 },
            PatternName::Lissajous => Pattern::Lissajous {
                freq_x: 3.0,
                freq_y: 2.0,
            },
            PatternName::Interference => Pattern::Interference { waves: 3 },
            PatternName::Mandelbrot => Pattern::Mandelbrot { zoom_speed: 0.02 },
            PatternName::Plasma => Pattern::Plasma,
            PatternName::Rainbow => Pattern::Rainbow,
            PatternName::Pulse => Pattern::Pulse { color: PURPLE },
            PatternName::Strobe => Pattern::Strobe {
                colors: vec![
                    RGB::new(255, 0, 0),
                    RGB::new(0, 255, 0),
                    RGB::new(0, 0, 255),
                    RGB::new(255, 255, 0),
                    RGB::new(255, 0, 255),
                ],
                period: STROBE_PERIOD,
            },
            PatternName::Fire => Pattern::Fire,
            PatternName::Ocean => Pattern::Ocean,
            PatternName::Disco => Pattern::Disco,
            PatternName::All => Pattern::Showcase(Sequence::showcase()),
        }
    }
}

impl Pattern {
    /**
    Builds a pattern from its name and positional parameters.

    Missing parameters keep their defaults:
    - `fourier [harmonics]`
    - `perlin [scale]`
    - `lissajous [freq_x] [freq_y]`
    - `interference [waves]`
    - `mandelbrot [zoom_speed]`
    - `pulse [r g b]`
    - `strobe [period_ms]`
     */
    pub fn from_name(name: PatternName, params: &[f64]) -> Result<Self> {
        let max_params = match name {
            PatternName::Lissajous => 2,
            PatternName::Pulse => 3,
            PatternName::Plasma
            | PatternName::Rainbow
            | PatternName::Fire
            | PatternName::Ocean
            | PatternName::Disco
            | PatternName::All => 0,
            _ => 1,
        };
        if params.len() > max_params {
            bail!(
                "Pattern {} takes at most {} parameter(s), got {}",
                name,
                max_params,
                params.len()
            );
        }

        let mut pattern = Pattern::from(name);
        match &mut pattern {
            Pattern::Fourier { harmonics } => {
                if let Some(&value) = params.first() {
                    *harmonics = positive_count(value, "harmonics")?;
                }
            }
            Pattern::Perlin { scale } => {
                if let Some(&value) = params.first() {
                    *scale = value;
                }
            }
            Pattern::Lissajous { freq_x, freq_y } => {
                if let Some(&value) = params.first() {
                    *freq_x = value;
                }
                if let Some(&value) = params.get(1) {
                    *freq_y = value;
                }
            }
            Pattern::Interference { waves } => {
                if let Some(&value) = params.first() {
                    *waves = positive_count(value, "waves")?;
                }
            }
            Pattern::Mandelbrot { zoom_speed } => {
                if let Some(&value) = params.first() {
                    *zoom_speed = value;
                }
            }
            Pattern::Pulse { color } => {
                if !params.is_empty() {
                    let [r, g, b] = <[f64; 3]>::try_from(params)
                        .map_err(|_| anyhow!("Pulse color needs exactly three values"))?;
                    *color = RGB::clamped(r as i32, g as i32, b as i32);
                }
            }
            Pattern::Strobe { period, .. } => {
                if let Some(&value) = params.first() {
                    *period = Duration::try_from_secs_f64(value / 1000.0)
                        .ok()
                        .filter(|period| !period.is_zero())
                        .ok_or_else(|| {
                            anyhow!("Strobe period must be a positive duration, got {}ms", value)
                        })?;
                }
            }
            Pattern::Plasma
            | Pattern::Rainbow
            | Pattern::Fire
            | Pattern::Ocean
            | Pattern::Disco
            | Pattern::Showcase(_) => {}
        }
        Ok(pattern)
    }

    /// The frame at `t` seconds after the start. A finished showcase shows
    /// [`RESET_FRAME`].
    pub fn frame_at(&self, t: f64) -> Frame {
        match self {
            Pattern::Fourier { harmonics } => fourier(t, *harmonics),
            Pattern::Perlin { scale } => perlin(t, *scale),
            Pattern::Lissajous { freq_x, freq_y } => lissajous(t, *freq_x, *freq_y),
            Pattern::Interference { waves } => interference(t, *waves),
            Pattern::Mandelbrot { zoom_speed } => mandelbrot(t, *zoom_speed),
            Pattern::Plasma => plasma(t),
            Pattern::Rainbow => Frame::from_hsv(t * 20.0, 1.0, 1.0, 100),
            Pattern::Pulse { color } => {
                Frame::new(*color, (50.0 + 49.0 * (2.0 * t).sin()) as i32)
            }
            Pattern::Strobe { colors, period } => {
                let step = (t / period.as_secs_f64()) as usize;
                let color = colors.get(step % colors.len().max(1)).copied();
                Frame::new(color.unwrap_or(RGB::WHITE), 100)
            }
            Pattern::Fire => {
                let mut rng = rand::thread_rng();
                let color = RGB::new(rng.gen_range(200..=255), rng.gen_range(40..=120), 0);
                Frame::new(color, rng.gen_range(60..=100))
            }
            Pattern::Ocean => {
                let blue = 200.0 + 55.0 * (0.8 * t).sin();
                let green = 100.0 + 100.0 * (0.56 * t).sin();
                Frame::new(RGB::clamped(0, green as i32, blue as i32), 100)
            }
            Pattern::Disco => {
                let mut rng = rand::thread_rng();
                let color = RGB::new(rng.gen(), rng.gen(), rng.gen());
                Frame::new(color, rng.gen_range(70..=100))
            }
            Pattern::Showcase(sequence) => sequence.frame_at(t).unwrap_or(RESET_FRAME),
        }
    }
}

/// Patterns are pure functions of time, so restarting only means the
/// caller's clock starts over. Only a showcase ever ends.
impl FrameSource for Pattern {
    fn next_frame(&mut self, elapsed: Duration) -> Option<Frame> {
        match self {
            Pattern::Showcase(sequence) => sequence.next_frame(elapsed),
            _ => Some(self.frame_at(elapsed.as_secs_f64())),
        }
    }

    fn restart(&mut self) {
        if let Pattern::Showcase(sequence) = self {
            sequence.restart();
        }
    }
}

fn positive_count(value: f64, what: &str) -> Result<u32> {
    if value < 1.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        bail!("{} must be a positive whole number, got {}", what, value);
    }
    Ok(value as u32)
}

fn fourier(t: f64, harmonics: u32) -> Frame {
    let amplitude_sum: f64 = (1..=harmonics).map(|n| 1.0 / n as f64).sum();
    let value: f64 = (1..=harmonics)
        .map(|n| {
            let n = n as f64;
            (2.0 * PI * n * t / 10.0).sin() / n
        })
        .sum();
    let normalized = (value + amplitude_sum) / (2.0 * amplitude_sum);
    Frame::from_hsv(normalized * 360.0, 1.0, 1.0, 100)
}

fn perlin(t: f64, scale: f64) -> Frame {
    let gradient = |i: f64| (i * 12.9898 + 78.233).sin() * 43758.5453;

    let x = t * scale;
    let x_floor = x.floor();
    let x_frac = x - x_floor;
    let fade = x_frac * x_frac * (3.0 - 2.0 * x_frac);

    let g0 = gradient(x_floor);
    let g1 = gradient(x_floor + 1.0);
    let noise = g0 + fade * (g1 - g0);

    Frame::from_hsv(((noise + 1.0) * 180.0).rem_euclid(360.0), 0.8, 1.0, 100)
}

fn lissajous(t: f64, freq_x: f64, freq_y: f64) -> Frame {
    let x = (freq_x * t * 0.5).sin();
    let y = (freq_y * t * 0.5).sin();

    let hue = (y.atan2(x) + PI) / (2.0 * PI) * 360.0;
    let saturation = (x * x + y * y).sqrt().min(1.0);
    Frame::from_hsv(hue, saturation, 1.0, 100)
}

fn interference(t: f64, waves: u32) -> Frame {
    let count = waves as f64;
    let total: f64 = (0..waves)
        .map(|i| {
            let i = i as f64;
            let frequency = 0.5 + i * 0.3;
            let phase = i * PI / count;
            (2.0 * PI * frequency * t + phase).sin() / count
        })
        .sum();
    let normalized = (total + 1.0) / 2.0;

    Frame::from_hsv((t * 30.0).rem_euclid(360.0), 1.0, 1.0, (50.0 + 50.0 * normalized) as i32)
}

fn mandelbrot(t: f64, zoom_speed: f64) -> Frame {
    let zoom = (-t * zoom_speed).exp();
    let (c_re, c_im) = (-0.7 * zoom, 0.27 * zoom);

    let (mut z_re, mut z_im) = (0.0_f64, 0.0_f64);
    let mut iterations = 0;
    while z_re * z_re + z_im * z_im < 4.0 && iterations < MANDELBROT_MAX_ITERATIONS {
        let next_re = z_re * z_re - z_im * z_im + c_re;
        z_im = 2.0 * z_re * z_im + c_im;
        z_re = next_re;
        iterations += 1;
    }

    if iterations == MANDELBROT_MAX_ITERATIONS {
        return Frame::new(RGB::new(0, 0, 50), 50);
    }
    let hue = (iterations as f64 * 20.0 + t * 10.0).rem_euclid(360.0);
    let value = (iterations as f64 / MANDELBROT_MAX_ITERATIONS as f64 * 1.5).min(1.0);
    Frame::from_hsv(hue, 1.0, value, 100)
}

fn plasma(t: f64) -> Frame {
    let x = t * 0.5;
    let y = t * 0.3;
    let plasma = (x * 0.5).sin()
        + (y * 0.7).sin()
        + ((x + y) * 0.3).sin()
        + ((x * x + y * y).sqrt() * 0.4).sin();
    let normalized = (plasma + 4.0) / 8.0;
    Frame::from_hsv((normalized * 360.0 + t * 20.0).rem_euclid(360.0), 1.0, 1.0, 100)
}
