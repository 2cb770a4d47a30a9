//! # Controller Connection Handle
//!
//! Owns the open HID handle(s) of one controller. A controller may be attached
//! through USB, Bluetooth or both at once; while both are live the USB handle
//! is the active one. Every access to a handle goes through one lock, so two
//! writers can never interleave partial reports.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::port::HidPort;
use crate::controller::events::ControllerEvent;
use crate::error::{Ds4Error, Result};
use crate::report::protocol::{Transport, BLUETOOTH_INPUT_REPORT_LEN};

/// Pause between non-blocking read attempts
const READ_POLL_INTERVAL: Duration = Duration::from_millis(5);

struct OpenTransport {
    path: String,
    port: Box<dyn HidPort>,
}

#[derive(Default)]
struct Transports {
    usb: Option<OpenTransport>,
    bluetooth: Option<OpenTransport>,
}

impl Transports {
    fn slot(&mut self, transport: Transport) -> &mut Option<OpenTransport> {
        match transport {
            Transport::Usb => &mut self.usb,
            Transport::Bluetooth => &mut self.bluetooth,
        }
    }

    /// Live handle to use for I/O, USB preferred
    fn active(&self) -> Option<(Transport, &OpenTransport)> {
        [(Transport::Usb, &self.usb), (Transport::Bluetooth, &self.bluetooth)]
            .into_iter()
            .find_map(|(transport, slot)| {
                slot.as_ref()
                    .filter(|open| open.port.is_connected())
                    .map(|open| (transport, open))
            })
    }
}

/// Connection to one controller
pub struct ConnectionHandle {
    id: String,
    transports: Mutex<Transports>,
    events: broadcast::Sender<ControllerEvent>,
    loss_reported: AtomicBool,
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("paths", &self.paths())
            .finish_non_exhaustive()
    }
}

impl ConnectionHandle {
    /// Create a handle with no transports attached yet
    pub fn new(id: impl Into<String>, events: broadcast::Sender<ControllerEvent>) -> Self {
        Self {
            id: id.into(),
            transports: Mutex::new(Transports::default()),
            events,
            loss_reported: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Attach an opened device as the given transport, replacing any previous one
    pub fn attach(&self, transport: Transport, path: impl Into<String>, port: Box<dyn HidPort>) {
        let path = path.into();
        debug!("{}: attaching {} transport at {}", self.id, transport, path);
        *self.transports.lock().slot(transport) = Some(OpenTransport { path, port });
        self.loss_reported.store(false, Ordering::SeqCst);
    }

    pub fn has_transport(&self, transport: Transport) -> bool {
        self.transports.lock().slot(transport).is_some()
    }

    /// Whether `transport` is attached and its handle still live
    pub fn has_live_transport(&self, transport: Transport) -> bool {
        self.transports
            .lock()
            .slot(transport)
            .as_ref()
            .is_some_and(|open| open.port.is_connected())
    }

    /// Whether `path` belongs to one of this controller's transports
    pub fn owns_path(&self, path: &str) -> bool {
        self.paths().iter().any(|owned| owned == path)
    }

    /// Device paths of all attached transports
    pub fn paths(&self) -> Vec<String> {
        let transports = self.transports.lock();
        [&transports.usb, &transports.bluetooth]
            .into_iter()
            .flatten()
            .map(|open| open.path.clone())
            .collect()
    }

    /// Whether no transport is attached at all
    pub fn is_empty(&self) -> bool {
        let transports = self.transports.lock();
        transports.usb.is_none() && transports.bluetooth.is_none()
    }

    /// Whether at least one attached transport is live
    pub fn is_connected(&self) -> bool {
        self.transports.lock().active().is_some()
    }

    /// Transport that I/O currently goes through
    pub fn active_transport(&self) -> Option<Transport> {
        self.transports.lock().active().map(|(transport, _)| transport)
    }

    /// Liveness check; publishes `ConnectionLost` once per loss
    pub fn check_connection(&self) -> bool {
        if self.is_connected() {
            return true;
        }

        if !self.loss_reported.swap(true, Ordering::SeqCst) {
            warn!("{}: no live transport", self.id);
            let _ = self.events.send(ControllerEvent::ConnectionLost { id: self.id.clone() });
        }
        false
    }

    /// Run `f` against the active device while holding the handle lock
    ///
    /// Returns `None` when no live transport is attached.
    pub fn with_device<R>(&self, f: impl FnOnce(Transport, &dyn HidPort) -> R) -> Option<R> {
        let transports = self.transports.lock();
        transports
            .active()
            .map(|(transport, open)| f(transport, open.port.as_ref()))
    }

    /// Read one input report within `timeout`
    ///
    /// Returns the report together with the transport it arrived on. Polls
    /// the device without blocking and releases the handle lock between
    /// polls, so writes are never held up by a pending read.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if no live transport is attached
    /// - `Hid` on device error or when nothing arrived before the deadline
    pub fn read_input(&self, timeout: Duration) -> Result<(Transport, Vec<u8>)> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; BLUETOOTH_INPUT_REPORT_LEN];

        loop {
            let (transport, read) = self
                .with_device(|transport, port| port.read_timeout(&mut buf, 0).map(|read| (transport, read)))
                .ok_or_else(|| Ds4Error::NotConnected(self.id.clone()))??;

            if read > 0 {
                buf.truncate(read);
                return Ok((transport, buf));
            }

            if Instant::now() >= deadline {
                return Err(Ds4Error::Hid(format!(
                    "No input report within {} ms",
                    timeout.as_millis()
                )));
            }

            std::thread::sleep(READ_POLL_INTERVAL);
        }
    }

    /// Check every attached transport other than the active one
    ///
    /// Only the active handle sees regular I/O, so a standby link that dropped
    /// would otherwise never fail. The non-blocking read marks such a handle
    /// dead; any pending report on it is discarded.
    pub fn check_idle_transports(&self) {
        let transports = self.transports.lock();
        let active = transports.active().map(|(transport, _)| transport);
        let mut buf = [0u8; BLUETOOTH_INPUT_REPORT_LEN];

        for (transport, slot) in [(Transport::Usb, &transports.usb), (Transport::Bluetooth, &transports.bluetooth)] {
            if Some(transport) == active {
                continue;
            }
            if let Some(open) = slot.as_ref().filter(|open| open.port.is_connected()) {
                if let Err(e) = open.port.read_timeout(&mut buf, 0) {
                    debug!("{}: idle {} transport failed: {}", self.id, transport, e);
                }
            }
        }
    }

    /// Close every attached transport whose handle is no longer live
    ///
    /// Returns the transports that were closed.
    pub fn close_dead_transports(&self) -> Vec<Transport> {
        let mut transports = self.transports.lock();
        let mut closed = Vec::new();

        for transport in [Transport::Usb, Transport::Bluetooth] {
            let slot = transports.slot(transport);
            if slot.as_ref().is_some_and(|open| !open.port.is_connected()) {
                if let Some(open) = slot.take() {
                    info!("{}: closed {} transport at {}", self.id, transport, open.path);
                }
                closed.push(transport);
            }
        }

        closed
    }

    /// Close and release all handles
    pub fn dispose(&self) {
        let mut transports = self.transports.lock();
        transports.usb = None;
        transports.bluetooth = None;
        debug!("{}: connection disposed", self.id);
    }
}
