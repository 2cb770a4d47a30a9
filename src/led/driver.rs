//! # LED Driver
//!
//! Sends light bar / rumble output reports for one controller.
//!
//! ## Rumble bands
//!
//! | Rumble | Behaviour |
//! |--------|-----------|
//! | `0` | stop any heartbeat, send a static frame |
//! | `1..=127` | run the heartbeat loop with this color (no frame sent directly) |
//! | `128..=255` | stop any heartbeat, send the raw rumble value once |
//!
//! The heartbeat alternates a 120 ms pulse at rumble `0x08` with a 1080 ms
//! rest at rumble `0x00` until cancelled.
//!
//! All frames, including heartbeat and effect frames, pass through the
//! driver's state lock, and the heartbeat re-checks its cancellation while
//! holding it, so no heartbeat frame can land after the call that stopped it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::task::{sleep_or_cancel, BackgroundLoop};
use crate::color::Rgb;
use crate::controller::record::SharedRecord;
use crate::hid::connection::ConnectionHandle;
use crate::report::encoder::encode_output_report;
use crate::report::protocol::OutputState;

/// Rumble value sent during the heartbeat pulse
pub const HEARTBEAT_PULSE_RUMBLE: u8 = 0x08;

/// Length of the heartbeat pulse
pub const HEARTBEAT_PULSE: Duration = Duration::from_millis(120);

/// Pause between heartbeat pulses
pub const HEARTBEAT_REST: Duration = Duration::from_millis(1080);

/// Lowest rumble value treated as a direct strong-vibration command
pub const STRONG_RUMBLE_MIN: u8 = 128;

struct Heartbeat {
    color: Rgb,
    flash: bool,
    task: BackgroundLoop,
}

#[derive(Default)]
struct DriverState {
    heartbeat: Option<Heartbeat>,
}

struct Shared {
    connection: Arc<ConnectionHandle>,
    record: SharedRecord,
    state: Mutex<DriverState>,
}

impl Shared {
    /// Encode for the active transport and write, falling back to a feature report
    fn send_frame(&self, output: &OutputState) -> bool {
        let sent = self
            .connection
            .with_device(|transport, port| {
                let report = encode_output_report(transport, output);
                match port.write(&report) {
                    Ok(_) => true,
                    Err(e) => {
                        debug!("{}: write failed ({}), trying feature report", self.connection.id(), e);
                        match port.send_feature_report(&report) {
                            Ok(()) => true,
                            Err(e) => {
                                warn!("{}: LED write failed: {}", self.connection.id(), e);
                                false
                            }
                        }
                    }
                }
            })
            .unwrap_or(false);

        if sent {
            self.record.lock().set_led_color(output.color);
        }
        sent
    }
}

/// Serialised LED / rumble output for one controller
pub struct LedDriver {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl LedDriver {
    pub fn new(connection: Arc<ConnectionHandle>, record: SharedRecord, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                connection,
                record,
                state: Mutex::new(DriverState::default()),
            }),
            runtime,
        }
    }

    /// Set the light bar color with a rumble band and optional flashing
    ///
    /// Returns `false` if the controller is not connected or the report could
    /// not be written. A heartbeat request (rumble 1-127) returns `true`
    /// without writing; a running heartbeat takes over the new color.
    pub fn set_led_color(&self, color: Rgb, rumble: u8, flash: bool) -> bool {
        let mut state = self.shared.state.lock();

        if !self.shared.connection.check_connection() {
            debug!("{}: set_led_color skipped, not connected", self.shared.connection.id());
            return false;
        }

        match rumble {
            0 => {
                stop_heartbeat(&mut state);
                self.shared.send_frame(&OutputState::new(color, 0, flash))
            }
            1..=127 => {
                let running = state
                    .heartbeat
                    .as_ref()
                    .is_some_and(|hb| !hb.task.is_finished());

                if running {
                    if let Some(heartbeat) = state.heartbeat.as_mut() {
                        heartbeat.color = color;
                        heartbeat.flash = flash;
                    }
                } else {
                    state.heartbeat = Some(self.start_heartbeat(color, flash));
                }
                true
            }
            _ => {
                stop_heartbeat(&mut state);
                self.shared.send_frame(&OutputState::new(color, rumble, flash))
            }
        }
    }

    /// Stop the heartbeat and switch the light bar off
    pub fn turn_off_led(&self) -> bool {
        let mut state = self.shared.state.lock();
        stop_heartbeat(&mut state);
        self.shared.send_frame(&OutputState::off())
    }

    pub fn is_heartbeat_active(&self) -> bool {
        self.shared
            .state
            .lock()
            .heartbeat
            .as_ref()
            .is_some_and(|hb| !hb.task.is_cancelled() && !hb.task.is_finished())
    }

    fn start_heartbeat(&self, color: Rgb, flash: bool) -> Heartbeat {
        debug!("{}: heartbeat started", self.shared.connection.id());
        let shared = self.shared.clone();
        let task = BackgroundLoop::spawn(&self.runtime, move |token| run_heartbeat(shared, token));
        Heartbeat { color, flash, task }
    }
}

fn stop_heartbeat(state: &mut DriverState) {
    if let Some(heartbeat) = state.heartbeat.take() {
        heartbeat.task.cancel();
        debug!("Heartbeat stopped");
    }
}

/// Send one heartbeat frame unless cancelled; returns `false` once cancelled
fn heartbeat_frame(shared: &Shared, token: &CancellationToken, rumble: u8) -> bool {
    let state = shared.state.lock();
    if token.is_cancelled() {
        return false;
    }
    if let Some(heartbeat) = state.heartbeat.as_ref() {
        shared.send_frame(&OutputState::new(heartbeat.color, rumble, heartbeat.flash));
    }
    true
}

async fn run_heartbeat(shared: Arc<Shared>, token: CancellationToken) {
    loop {
        if !heartbeat_frame(&shared, &token, HEARTBEAT_PULSE_RUMBLE) {
            break;
        }
        if !sleep_or_cancel(&token, HEARTBEAT_PULSE).await {
            break;
        }

        if !heartbeat_frame(&shared, &token, 0x00) {
            break;
        }
        if !sleep_or_cancel(&token, HEARTBEAT_REST).await {
            break;
        }
    }
}
