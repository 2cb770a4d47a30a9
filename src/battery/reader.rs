//! # Battery Reader
//!
//! Reads one input report at a time per controller and decodes the battery
//! byte. A read that arrives while another is still outstanding is dropped,
//! not queued.
//!
//! USB and Bluetooth reports carry the battery byte at different offsets, so
//! each transport learns its own decoder state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::controller::events::ControllerEvent;
use crate::controller::record::SharedRecord;
use crate::hid::connection::ConnectionHandle;
use crate::report::battery::BatteryDecodeCache;
use crate::report::protocol::{BatteryStatus, Transport};

/// Read timeout used when none is configured
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Clears the in-flight flag when the read finishes, however it finishes
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Battery telemetry for one controller
pub struct BatteryReader {
    id: String,
    connection: Arc<ConnectionHandle>,
    record: SharedRecord,
    events: broadcast::Sender<ControllerEvent>,
    caches: Mutex<HashMap<Transport, BatteryDecodeCache>>,
    in_flight: AtomicBool,
    read_timeout: Duration,
}

impl BatteryReader {
    pub fn new(
        connection: Arc<ConnectionHandle>,
        record: SharedRecord,
        events: broadcast::Sender<ControllerEvent>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            id: connection.id().to_string(),
            connection,
            record,
            events,
            caches: Mutex::new(HashMap::new()),
            in_flight: AtomicBool::new(false),
            read_timeout,
        }
    }

    /// Snapshot of the decoder state for `transport`
    pub fn decode_cache(&self, transport: Transport) -> BatteryDecodeCache {
        self.caches.lock().get(&transport).cloned().unwrap_or_default()
    }

    pub fn is_reading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Read and decode the battery state
    ///
    /// Returns `None` when a read is already in flight, the controller is not
    /// connected, or nothing usable arrived before the timeout. On success the
    /// record is updated and `BatteryChanged` is published.
    pub async fn read_battery_status(&self) -> Option<BatteryStatus> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("{}: battery read already in flight", self.id);
            return None;
        }
        let _guard = InFlight(&self.in_flight);

        if !self.connection.check_connection() {
            return None;
        }

        let connection = self.connection.clone();
        let timeout = self.read_timeout;
        let (transport, report) = match tokio::task::spawn_blocking(move || connection.read_input(timeout)).await {
            Ok(Ok(read)) => read,
            Ok(Err(e)) => {
                debug!("{}: battery read skipped: {}", self.id, e);
                return None;
            }
            Err(e) => {
                warn!("{}: battery read task failed: {}", self.id, e);
                return None;
            }
        };

        let status = match self.caches.lock().entry(transport).or_default().decode(&report) {
            Ok(status) => status,
            Err(e) => {
                debug!("{}: {}", self.id, e);
                return None;
            }
        };

        if self.record.lock().set_battery(status.percent, status.charging) {
            debug!("{}: battery {}", self.id, status.status_text());
        }
        let _ = self.events.send(ControllerEvent::BatteryChanged {
            id: self.id.clone(),
            percent: status.percent,
            charging: status.charging,
        });

        Some(status)
    }
}
