//! # Low Battery Warning
//!
//! Two-state monitor per controller. It enters `Triggered` when the
//! controller is discharging at or below the threshold and returns to
//! `Normal` once charging starts or the level recovers above it.
//!
//! On entry it can recolor the light bar, vibrate (three 200 ms pulses, then
//! two 300 ms pulses every re-alert interval), and publish one notification
//! per episode. Each action is toggled independently by [`WarningSettings`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::color::Rgb;
use crate::controller::events::ControllerEvent;
use crate::controller::record::SharedRecord;
use crate::led::driver::LedDriver;
use crate::led::task::{sleep_or_cancel, BackgroundLoop};

/// Rumble used for alert pulses
const ALERT_RUMBLE: u8 = 0xFF;

struct Burst {
    pulses: usize,
    hold: Duration,
}

const INITIAL_BURST: Burst = Burst {
    pulses: 3,
    hold: Duration::from_millis(200),
};

const REALERT_BURST: Burst = Burst {
    pulses: 2,
    hold: Duration::from_millis(300),
};

/// Warning behaviour
#[derive(Debug, Clone, PartialEq)]
pub struct WarningSettings {
    pub enabled: bool,
    /// Trigger at or below this percent
    pub threshold: u8,
    pub color: Rgb,
    pub flash: bool,
    pub auto_color_change: bool,
    pub vibration_alert: bool,
    pub notification: bool,
    pub realert_interval: Duration,
}

impl Default for WarningSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 20,
            color: Rgb::RED,
            flash: true,
            auto_color_change: true,
            vibration_alert: true,
            notification: true,
            realert_interval: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningPhase {
    Normal,
    Triggered,
}

#[derive(Default)]
struct WarningState {
    active: bool,
    notified: bool,
    alerts: Option<BackgroundLoop>,
}

/// Low battery state machine for one controller
pub struct BatteryWarningMonitor {
    id: String,
    record: SharedRecord,
    led: Arc<LedDriver>,
    events: broadcast::Sender<ControllerEvent>,
    runtime: Handle,
    settings: Mutex<WarningSettings>,
    state: tokio::sync::Mutex<WarningState>,
}

impl BatteryWarningMonitor {
    pub fn new(
        record: SharedRecord,
        led: Arc<LedDriver>,
        events: broadcast::Sender<ControllerEvent>,
        runtime: Handle,
        settings: WarningSettings,
    ) -> Self {
        let id = record.lock().id().to_string();
        Self {
            id,
            record,
            led,
            events,
            runtime,
            settings: Mutex::new(settings),
            state: tokio::sync::Mutex::new(WarningState::default()),
        }
    }

    pub fn settings(&self) -> WarningSettings {
        self.settings.lock().clone()
    }

    pub async fn phase(&self) -> WarningPhase {
        if self.state.lock().await.active {
            WarningPhase::Triggered
        } else {
            WarningPhase::Normal
        }
    }

    /// Whether this episode's notification has been published
    pub async fn is_notified(&self) -> bool {
        self.state.lock().await.notified
    }

    /// Re-evaluate against the record's last-known battery state
    pub async fn check_battery_level(&self) {
        let mut state = self.state.lock().await;
        self.evaluate(&mut state).await;
    }

    /// Reset to `Normal`, apply the new threshold, then re-evaluate
    pub async fn update_threshold(&self, threshold: u8) {
        let mut state = self.state.lock().await;
        self.reset(&mut state).await;
        self.settings.lock().threshold = threshold.min(100);
        info!("{}: low battery threshold set to {}%", self.id, threshold.min(100));
        self.evaluate(&mut state).await;
    }

    /// Replace all settings; same reset-then-evaluate order as [`update_threshold`](Self::update_threshold)
    pub async fn update_settings(&self, settings: WarningSettings) {
        let mut state = self.state.lock().await;
        self.reset(&mut state).await;
        *self.settings.lock() = settings;
        self.evaluate(&mut state).await;
    }

    /// Stop any running alert loop; no events are published
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        if let Some(alerts) = state.alerts.take() {
            alerts.stop().await;
        }
        state.active = false;
        state.notified = false;
    }

    async fn evaluate(&self, state: &mut WarningState) {
        let settings = self.settings();
        let (percent, charging) = {
            let record = self.record.lock();
            (record.battery_percent(), record.is_charging())
        };

        if !settings.enabled || charging {
            self.reset(state).await;
        } else if percent <= settings.threshold {
            if !state.active {
                self.trigger(state, &settings, percent);
            }
        } else {
            self.reset(state).await;
        }
    }

    fn trigger(&self, state: &mut WarningState, settings: &WarningSettings, percent: u8) {
        state.active = true;
        info!(
            "{}: low battery warning at {}% (threshold {}%)",
            self.id, percent, settings.threshold
        );
        let _ = self.events.send(ControllerEvent::LowBatteryTriggered {
            id: self.id.clone(),
            percent,
        });

        let alert_color = if settings.auto_color_change {
            if !self.led.set_led_color(settings.color, 0, settings.flash) {
                debug!("{}: warning color not applied", self.id);
            }
            settings.color
        } else {
            self.record.lock().led_color()
        };

        if settings.vibration_alert {
            let led = self.led.clone();
            let flash = settings.flash && settings.auto_color_change;
            let interval = settings.realert_interval;
            state.alerts = Some(BackgroundLoop::spawn(&self.runtime, move |token| {
                run_alerts(led, alert_color, flash, interval, token)
            }));
        }

        if settings.notification && !state.notified {
            state.notified = true;
            let display_name = self.record.lock().display_name().to_string();
            let _ = self.events.send(ControllerEvent::LowBatteryNotification {
                id: self.id.clone(),
                display_name,
                percent,
            });
        }
    }

    async fn reset(&self, state: &mut WarningState) {
        if let Some(alerts) = state.alerts.take() {
            alerts.stop().await;
        }

        if state.active {
            info!("{}: low battery warning cleared", self.id);
            let _ = self.events.send(ControllerEvent::LowBatteryReset { id: self.id.clone() });
        }
        state.active = false;
        state.notified = false;
    }
}

/// Initial burst, then a re-alert burst every `interval` until cancelled
async fn run_alerts(led: Arc<LedDriver>, color: Rgb, flash: bool, interval: Duration, token: CancellationToken) {
    if !vibrate(&led, color, flash, &INITIAL_BURST, &token).await {
        return;
    }

    while sleep_or_cancel(&token, interval).await {
        if !vibrate(&led, color, flash, &REALERT_BURST, &token).await {
            return;
        }
    }
}

async fn vibrate(led: &LedDriver, color: Rgb, flash: bool, burst: &Burst, token: &CancellationToken) -> bool {
    for _ in 0..burst.pulses {
        if token.is_cancelled() {
            return false;
        }

        led.set_led_color(color, ALERT_RUMBLE, flash);
        if !sleep_or_cancel(token, burst.hold).await {
            // never leave the motor running
            led.set_led_color(color, 0x00, flash);
            return false;
        }

        led.set_led_color(color, 0x00, flash);
        if !sleep_or_cancel(token, burst.hold).await {
            return false;
        }
    }
    true
}
