//! # LED Effect Scheduler
//!
//! Runs at most one continuous light bar effect per controller. Starting an
//! effect cancels the running one and waits (bounded) for it to exit before
//! the new loop is spawned, so frames of two effects never interleave.
//!
//! ## Effect speed
//!
//! `speed` ranges from 10 (fastest) to 100 (slowest). Rainbow and breathing
//! frames are spaced by [`frame_delay`]: 8 ms at speed 10 up to 50 ms at 100.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::driver::LedDriver;
use super::task::{sleep_or_cancel, BackgroundLoop};
use crate::color::Rgb;
use crate::controller::record::SharedRecord;

/// Fastest effect speed
pub const MIN_EFFECT_SPEED: u8 = 10;
/// Slowest effect speed
pub const MAX_EFFECT_SPEED: u8 = 100;
/// Speed used until configured otherwise
pub const DEFAULT_EFFECT_SPEED: u8 = 50;

const MIN_FRAME_DELAY_MS: f64 = 8.0;
const MAX_FRAME_DELAY_MS: f64 = 50.0;

/// Breathing brightness bounds
const BREATHING_MIN: f64 = 0.1;
const BREATHING_MAX: f64 = 1.0;

/// Visual effect kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedEffectType {
    #[default]
    None,
    Rainbow,
    Breathing,
    #[serde(alias = "health_bar")]
    HealthBar,
    Pulse,
    Strobe,
}

impl LedEffectType {
    pub fn name(&self) -> &'static str {
        match self {
            LedEffectType::None => "none",
            LedEffectType::Rainbow => "rainbow",
            LedEffectType::Breathing => "breathing",
            LedEffectType::HealthBar => "healthbar",
            LedEffectType::Pulse => "pulse",
            LedEffectType::Strobe => "strobe",
        }
    }
}

impl std::fmt::Display for LedEffectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LedEffectType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(LedEffectType::None),
            "rainbow" => Ok(LedEffectType::Rainbow),
            "breathing" => Ok(LedEffectType::Breathing),
            "healthbar" | "health_bar" => Ok(LedEffectType::HealthBar),
            "pulse" => Ok(LedEffectType::Pulse),
            "strobe" => Ok(LedEffectType::Strobe),
            other => Err(format!("unknown effect: {}", other)),
        }
    }
}

/// Parameters read live by the running effect loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// 10 (fastest) to 100 (slowest)
    pub speed: u8,
    /// Base color for breathing, pulse and strobe
    pub base_color: Rgb,
    /// Value shown by the health bar, 0-100
    pub health_percentage: u8,
}

impl Default for EffectParams {
    fn default() -> Self {
        Self {
            speed: DEFAULT_EFFECT_SPEED,
            base_color: Rgb::BLUE,
            health_percentage: 100,
        }
    }
}

/// Delay between rainbow/breathing frames for a given speed
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use ds4_lightbar::led::effects::frame_delay;
///
/// assert_eq!(frame_delay(10), Duration::from_millis(8));
/// assert_eq!(frame_delay(100), Duration::from_millis(50));
/// ```
pub fn frame_delay(speed: u8) -> Duration {
    let speed = speed.clamp(MIN_EFFECT_SPEED, MAX_EFFECT_SPEED) as f64;
    let span = MAX_FRAME_DELAY_MS - MIN_FRAME_DELAY_MS;
    let range = (MAX_EFFECT_SPEED - MIN_EFFECT_SPEED) as f64;
    let ms = MIN_FRAME_DELAY_MS + (speed - MIN_EFFECT_SPEED as f64) * span / range;
    Duration::from_millis(ms as u64)
}

/// Slower speeds advance the animation by smaller steps
fn speed_factor(speed: u8) -> f64 {
    (110.0 - speed.clamp(MIN_EFFECT_SPEED, MAX_EFFECT_SPEED) as f64) / 100.0
}

/// Hue sweep over six regions for a phase in `[0, 1)`
pub fn rainbow_color(progress: f32) -> Rgb {
    let progress = (progress % 1.0).abs();
    let div = progress * 6.0;
    let region = div as u8;
    let ascending = ((div - region as f32) * 255.0) as u8;
    let descending = 255 - ascending;

    match region {
        0 => Rgb::new(255, ascending, 0),
        1 => Rgb::new(descending, 255, 0),
        2 => Rgb::new(0, 255, ascending),
        3 => Rgb::new(0, descending, 255),
        4 => Rgb::new(ascending, 0, 255),
        _ => Rgb::new(255, 0, descending),
    }
}

/// Rainbow phase increment per frame
pub fn rainbow_step(speed: u8) -> f32 {
    (0.005 * speed_factor(speed)) as f32
}

/// Breathing brightness increment per frame
pub fn breathing_step(speed: u8) -> f64 {
    0.03 * speed_factor(speed)
}

/// Move brightness one step along the triangle wave, reversing at the bounds
fn advance_brightness(brightness: f64, increasing: bool, step: f64) -> (f64, bool) {
    if increasing {
        let next = brightness + step;
        if next >= BREATHING_MAX {
            (BREATHING_MAX, false)
        } else {
            (next, true)
        }
    } else {
        let next = brightness - step;
        if next <= BREATHING_MIN {
            (BREATHING_MIN, true)
        } else {
            (next, false)
        }
    }
}

/// One health bar frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthFrame {
    pub color: Rgb,
    pub flash: bool,
    pub hold: Duration,
}

/// Traffic-light color for a health value
pub fn health_frame(percentage: u8) -> HealthFrame {
    let steady = |color| HealthFrame {
        color,
        flash: false,
        hold: Duration::from_millis(100),
    };

    match percentage {
        76.. => steady(Rgb::GREEN),
        51..=75 => steady(Rgb::YELLOW),
        26..=50 => steady(Rgb::ORANGE),
        _ => HealthFrame {
            color: Rgb::RED,
            flash: true,
            hold: Duration::from_millis(500),
        },
    }
}

/// Length of one pulse beat
pub fn pulse_beat(speed: u8) -> Duration {
    Duration::from_millis((100.0 + speed as f64 * 1.5) as u64)
}

/// Strobe toggle interval
pub fn strobe_interval(speed: u8) -> Duration {
    Duration::from_millis((20.0 + speed as f64 * 0.8) as u64)
}

fn breathing_color(base: Rgb) -> Rgb {
    if base.is_black() {
        Rgb::BLUE
    } else {
        base
    }
}

fn pulse_color(base: Rgb) -> Rgb {
    if base.b == 0 {
        Rgb::new(base.r, base.g, 255)
    } else {
        base
    }
}

fn strobe_color(base: Rgb) -> Rgb {
    if base.r == 0 {
        Rgb::new(255, base.g, base.b)
    } else {
        base
    }
}

/// Per-controller effect loop owner
pub struct EffectScheduler {
    id: String,
    led: Arc<LedDriver>,
    record: SharedRecord,
    runtime: Handle,
    params: Arc<Mutex<EffectParams>>,
    running: tokio::sync::Mutex<Option<BackgroundLoop>>,
}

impl EffectScheduler {
    pub fn new(id: impl Into<String>, led: Arc<LedDriver>, record: SharedRecord, runtime: Handle) -> Self {
        Self {
            id: id.into(),
            led,
            record,
            runtime,
            params: Arc::new(Mutex::new(EffectParams::default())),
            running: tokio::sync::Mutex::new(None),
        }
    }

    /// Effect currently running, `None` when stopped
    pub fn current_effect(&self) -> LedEffectType {
        self.record.lock().active_effect()
    }

    pub fn is_running(&self) -> bool {
        self.current_effect() != LedEffectType::None
    }

    pub fn params(&self) -> EffectParams {
        *self.params.lock()
    }

    /// Set speed, clamped to 10..=100; applies to the running effect
    pub fn set_speed(&self, speed: u8) {
        self.params.lock().speed = speed.clamp(MIN_EFFECT_SPEED, MAX_EFFECT_SPEED);
    }

    /// Set the value shown by the health bar, clamped to 0..=100
    pub fn set_health_percentage(&self, percentage: u8) {
        self.params.lock().health_percentage = percentage.min(100);
    }

    /// Set the base color used by breathing, pulse and strobe
    pub fn set_base_color(&self, color: Rgb) {
        self.params.lock().base_color = color;
    }

    /// Start breathing around `color` (pure black falls back to blue)
    pub async fn start_breathing_with_color(&self, color: Rgb) {
        self.set_base_color(breathing_color(color));
        self.start_effect(LedEffectType::Breathing).await;
    }

    /// Stop the running effect (bounded wait) and start `effect`
    ///
    /// Starting `LedEffectType::None` is the same as [`stop_effect`](Self::stop_effect).
    pub async fn start_effect(&self, effect: LedEffectType) {
        let mut running = self.running.lock().await;

        if let Some(previous) = running.take() {
            debug!("{}: stopping previous effect", self.id);
            previous.stop().await;
        }

        if effect == LedEffectType::None {
            self.record.lock().set_active_effect(LedEffectType::None);
            return;
        }

        let led = self.led.clone();
        let params = self.params.clone();
        *running = Some(BackgroundLoop::spawn(&self.runtime, move |token| {
            run_effect(effect, led, params, token)
        }));
        self.record.lock().set_active_effect(effect);

        info!("{}: {} effect started", self.id, effect);
    }

    /// Cancel the running effect and wait up to one second for it to exit
    pub async fn stop_effect(&self) {
        let mut running = self.running.lock().await;

        if let Some(previous) = running.take() {
            previous.stop().await;
            info!("{}: effect stopped", self.id);
        }
        self.record.lock().set_active_effect(LedEffectType::None);
    }
}

async fn run_effect(
    effect: LedEffectType,
    led: Arc<LedDriver>,
    params: Arc<Mutex<EffectParams>>,
    token: CancellationToken,
) {
    match effect {
        LedEffectType::None => {}
        LedEffectType::Rainbow => run_rainbow(&led, &params, &token).await,
        LedEffectType::Breathing => run_breathing(&led, &params, &token).await,
        LedEffectType::HealthBar => run_health_bar(&led, &params, &token).await,
        LedEffectType::Pulse => run_pulse(&led, &params, &token).await,
        LedEffectType::Strobe => run_strobe(&led, &params, &token).await,
    }
}

async fn run_rainbow(led: &LedDriver, params: &Mutex<EffectParams>, token: &CancellationToken) {
    let mut progress = 0.0f32;

    while !token.is_cancelled() {
        let speed = params.lock().speed;
        led.set_led_color(rainbow_color(progress), 0, false);

        progress += rainbow_step(speed);
        if progress >= 1.0 {
            progress -= 1.0;
        }

        if !sleep_or_cancel(token, frame_delay(speed)).await {
            break;
        }
    }
}

async fn run_breathing(led: &LedDriver, params: &Mutex<EffectParams>, token: &CancellationToken) {
    let base = breathing_color(params.lock().base_color);
    let mut brightness = BREATHING_MIN;
    let mut increasing = true;

    while !token.is_cancelled() {
        let speed = params.lock().speed;
        led.set_led_color(base.scaled(brightness), 0, false);

        (brightness, increasing) = advance_brightness(brightness, increasing, breathing_step(speed));

        if !sleep_or_cancel(token, frame_delay(speed)).await {
            break;
        }
    }
}

async fn run_health_bar(led: &LedDriver, params: &Mutex<EffectParams>, token: &CancellationToken) {
    while !token.is_cancelled() {
        let frame = health_frame(params.lock().health_percentage);
        led.set_led_color(frame.color, 0, frame.flash);

        if !sleep_or_cancel(token, frame.hold).await {
            break;
        }
    }
}

async fn run_pulse(led: &LedDriver, params: &Mutex<EffectParams>, token: &CancellationToken) {
    let bright = pulse_color(params.lock().base_color);
    let dim = bright.divided(3);

    while !token.is_cancelled() {
        let beat = pulse_beat(params.lock().speed);

        for (color, hold) in [(bright, beat), (dim, beat), (bright, beat), (dim, beat * 3)] {
            led.set_led_color(color, 0, false);
            if !sleep_or_cancel(token, hold).await {
                return;
            }
        }
    }
}

async fn run_strobe(led: &LedDriver, params: &Mutex<EffectParams>, token: &CancellationToken) {
    let color = strobe_color(params.lock().base_color);
    let mut on = true;

    while !token.is_cancelled() {
        let interval = strobe_interval(params.lock().speed);
        led.set_led_color(if on { color } else { Rgb::BLACK }, 0, false);
        on = !on;

        if !sleep_or_cancel(token, interval).await {
            break;
        }
    }
}
