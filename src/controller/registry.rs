//! # Controller Registry
//!
//! Discovers DualShock 4 controllers, tracks them by device path and retires
//! them once every transport is gone.
//!
//! Each tracked controller is one [`ControllerEntry`] that owns all of its
//! services (connection, LED driver, battery reader, warning monitor, effect
//! scheduler). Entries are created and torn down as a unit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::events::ControllerEvent;
use super::record::{ControllerRecord, SharedRecord};
use crate::battery::reader::{BatteryReader, DEFAULT_READ_TIMEOUT};
use crate::battery::warning::{BatteryWarningMonitor, WarningSettings};
use crate::config::Config;
use crate::error::{Ds4Error, Result};
use crate::hid::connection::ConnectionHandle;
use crate::hid::port::{DeviceDescriptor, HidBackend, HidPort};
use crate::led::driver::LedDriver;
use crate::led::effects::{EffectScheduler, DEFAULT_EFFECT_SPEED};
use crate::report::protocol::{Transport, DS4_PRODUCT_IDS, DS4_VENDOR_ID};

/// Buffered events per subscriber before the slowest one starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Per-controller service settings
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySettings {
    pub battery_read_timeout: Duration,
    pub warning: WarningSettings,
    pub effect_speed: u8,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            battery_read_timeout: DEFAULT_READ_TIMEOUT,
            warning: WarningSettings::default(),
            effect_speed: DEFAULT_EFFECT_SPEED,
        }
    }
}

impl From<&Config> for RegistrySettings {
    fn from(config: &Config) -> Self {
        Self {
            battery_read_timeout: config.read_timeout(),
            warning: config.warning_settings(),
            effect_speed: config.led.effect_speed,
        }
    }
}

/// One tracked controller and its services
pub struct ControllerEntry {
    id: String,
    record: SharedRecord,
    serial_number: Option<String>,
    connection: Arc<ConnectionHandle>,
    led: Arc<LedDriver>,
    battery: BatteryReader,
    warning: BatteryWarningMonitor,
    effects: EffectScheduler,
}

impl std::fmt::Debug for ControllerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerEntry")
            .field("id", &self.id)
            .field("serial_number", &self.serial_number)
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}

impl ControllerEntry {
    fn new(
        record: ControllerRecord,
        serial_number: Option<String>,
        events: &broadcast::Sender<ControllerEvent>,
        settings: &RegistrySettings,
        runtime: &Handle,
    ) -> Self {
        let id = record.id().to_string();
        let record = record.shared();
        let connection = Arc::new(ConnectionHandle::new(id.clone(), events.clone()));
        let led = Arc::new(LedDriver::new(connection.clone(), record.clone(), runtime.clone()));

        let battery = BatteryReader::new(
            connection.clone(),
            record.clone(),
            events.clone(),
            settings.battery_read_timeout,
        );
        let warning = BatteryWarningMonitor::new(
            record.clone(),
            led.clone(),
            events.clone(),
            runtime.clone(),
            settings.warning.clone(),
        );
        let effects = EffectScheduler::new(id.clone(), led.clone(), record.clone(), runtime.clone());
        effects.set_speed(settings.effect_speed);

        Self {
            id,
            record,
            serial_number,
            connection,
            led,
            battery,
            warning,
            effects,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the controller record
    pub fn record(&self) -> ControllerRecord {
        self.record.lock().clone()
    }

    pub fn shared_record(&self) -> &SharedRecord {
        &self.record
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }

    pub fn connection(&self) -> &Arc<ConnectionHandle> {
        &self.connection
    }

    pub fn led(&self) -> &Arc<LedDriver> {
        &self.led
    }

    pub fn battery(&self) -> &BatteryReader {
        &self.battery
    }

    pub fn warning(&self) -> &BatteryWarningMonitor {
        &self.warning
    }

    pub fn effects(&self) -> &EffectScheduler {
        &self.effects
    }

    fn attach(&self, transport: Transport, path: &str, port: Box<dyn HidPort>) {
        self.connection.attach(transport, path, port);
        self.record.lock().set_transport(transport, true);
    }

    /// Whether `device` is the missing second transport of this controller
    ///
    /// A slot whose handle already died counts as missing and is replaced.
    fn pairs_with(&self, device: &DeviceDescriptor, transport: Transport) -> bool {
        match (&self.serial_number, &device.serial_number) {
            (Some(own), Some(other)) => own == other && !self.connection.has_live_transport(transport),
            _ => false,
        }
    }

    /// Stop every background loop, switch the light bar off and close the handles
    pub async fn shutdown(&self) {
        self.effects.stop_effect().await;
        self.warning.dispose().await;
        if !self.led.turn_off_led() {
            debug!("{}: light bar not switched off", self.id);
        }
        self.connection.dispose();
    }
}

/// Tracks every connected controller
pub struct ControllerRegistry {
    backend: Mutex<Box<dyn HidBackend>>,
    controllers: Mutex<Vec<Arc<ControllerEntry>>>,
    /// Controllers connected so far, numbers display names
    connected_total: AtomicUsize,
    events: broadcast::Sender<ControllerEvent>,
    settings: RegistrySettings,
    runtime: Handle,
}

impl ControllerRegistry {
    /// Create a registry over `backend`
    ///
    /// Must be called from within a Tokio runtime; background loops of every
    /// controller are spawned on it.
    ///
    /// # Errors
    ///
    /// Returns `Runtime` when called outside a Tokio runtime.
    pub fn new(backend: Box<dyn HidBackend>, settings: RegistrySettings) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| Ds4Error::Runtime(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            backend: Mutex::new(backend),
            controllers: Mutex::new(Vec::new()),
            connected_total: AtomicUsize::new(0),
            events,
            settings,
            runtime,
        })
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    pub fn count(&self) -> usize {
        self.controllers.lock().len()
    }

    pub fn get(&self, id: &str) -> Option<Arc<ControllerEntry>> {
        self.controllers.lock().iter().find(|entry| entry.id() == id).cloned()
    }

    /// Controller connected earliest
    pub fn first(&self) -> Option<Arc<ControllerEntry>> {
        self.controllers.lock().first().cloned()
    }

    /// All entries in connect order
    pub fn entries(&self) -> Vec<Arc<ControllerEntry>> {
        self.controllers.lock().clone()
    }

    /// Record snapshots in connect order
    pub fn controllers(&self) -> Vec<ControllerRecord> {
        self.controllers.lock().iter().map(|entry| entry.record()).collect()
    }

    /// Open every matching device that is not tracked yet
    ///
    /// Enumeration and open failures are logged and skipped. Returns the
    /// number of tracked controllers.
    pub fn scan_and_connect(&self) -> usize {
        let mut backend = self.backend.lock();

        let devices = match backend.enumerate(DS4_VENDOR_ID, &DS4_PRODUCT_IDS) {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Device enumeration failed: {}", e);
                return self.count();
            }
        };

        let mut connected = Vec::new();
        let count = {
            let mut controllers = self.controllers.lock();

            for device in devices {
                if controllers.iter().any(|entry| entry.connection.owns_path(&device.path)) {
                    continue;
                }

                let transport = Transport::from_input_report_len(device.input_report_len);
                let port = match backend.open(&device) {
                    Ok(port) => port,
                    Err(e) => {
                        warn!("Skipping {}: {}", device.path, e);
                        continue;
                    }
                };

                if let Some(entry) = controllers.iter().find(|entry| entry.pairs_with(&device, transport)) {
                    entry.attach(transport, &device.path, port);
                    info!("{}: {} transport added at {}", entry.id(), transport, device.path);
                    continue;
                }

                let number = self.connected_total.fetch_add(1, Ordering::Relaxed) + 1;
                let display_name = format!("DS4 #{} ({})", number, transport.label());
                let record = ControllerRecord::new(device.path.clone(), display_name, transport);
                let entry = ControllerEntry::new(
                    record,
                    device.serial_number.clone(),
                    &self.events,
                    &self.settings,
                    &self.runtime,
                );
                entry.attach(transport, &device.path, port);

                info!("Connected {} at {}", entry.record().display_name(), device.path);
                connected.push(entry.record());
                controllers.push(Arc::new(entry));
            }

            controllers.len()
        };

        for record in connected {
            let _ = self.events.send(ControllerEvent::Connected(record));
        }

        count
    }

    /// Close dead transports and retire controllers that have none left
    ///
    /// Standby transports are checked first, so a dropped second link is
    /// noticed even though no I/O goes through it. Returns the number of
    /// controllers removed.
    pub async fn cleanup_disconnected(&self) -> usize {
        let removed: Vec<Arc<ControllerEntry>> = {
            let mut controllers = self.controllers.lock();

            for entry in controllers.iter() {
                entry.connection.check_idle_transports();
                for transport in entry.connection.close_dead_transports() {
                    entry.record.lock().set_transport(transport, false);
                }
            }

            let (gone, kept): (Vec<_>, Vec<_>) = controllers
                .drain(..)
                .partition(|entry| entry.connection.is_empty());
            *controllers = kept;
            gone
        };

        for entry in &removed {
            entry.shutdown().await;
            info!("Disconnected {}", entry.record().display_name());
            let _ = self.events.send(ControllerEvent::Disconnected(entry.record()));
        }

        removed.len()
    }

    /// Read the battery of every live controller and re-evaluate its warning
    pub async fn poll_batteries(&self) {
        for entry in self.entries() {
            if !entry.connection.is_connected() {
                continue;
            }

            if entry.battery.read_battery_status().await.is_some() {
                entry.warning.check_battery_level().await;
            }
        }
    }

    /// Tear down every controller
    pub async fn shutdown(&self) {
        let entries: Vec<_> = self.controllers.lock().drain(..).collect();
        for entry in entries {
            entry.shutdown().await;
            debug!("{}: shut down", entry.id());
        }
        info!("Controller registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hid::port::mocks::MockHidPort;
    use crate::hid::port::MockHidBackend;
    use crate::report::protocol::{
        BLUETOOTH_INPUT_REPORT_LEN, DS4_PRODUCT_ID_BLUETOOTH, DS4_PRODUCT_ID_USB, USB_INPUT_REPORT_LEN,
    };
    use std::collections::HashMap;

    fn usb_device(path: &str, serial: Option<&str>) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.to_string(),
            vendor_id: DS4_VENDOR_ID,
            product_id: DS4_PRODUCT_ID_USB,
            serial_number: serial.map(str::to_owned),
            input_report_len: USB_INPUT_REPORT_LEN,
        }
    }

    fn bt_device(path: &str, serial: Option<&str>) -> DeviceDescriptor {
        DeviceDescriptor {
            path: path.to_string(),
            vendor_id: DS4_VENDOR_ID,
            product_id: DS4_PRODUCT_ID_BLUETOOTH,
            serial_number: serial.map(str::to_owned),
            input_report_len: BLUETOOTH_INPUT_REPORT_LEN,
        }
    }

    /// Backend that always lists `devices` and opens the matching mock port
    fn backend(devices: Vec<DeviceDescriptor>, ports: HashMap<String, MockHidPort>) -> Box<MockHidBackend> {
        let mut backend = MockHidBackend::new();
        backend
            .expect_enumerate()
            .returning(move |_, _| Ok(devices.clone()));
        backend.expect_open().returning(move |device| {
            ports
                .get(&device.path)
                .map(MockHidPort::boxed)
                .ok_or_else(|| Ds4Error::Hid(format!("Failed to open {}", device.path)))
        });
        Box::new(backend)
    }

    /// Backend whose device list and ports can change between scans
    fn hotplug_backend(
        devices: Arc<Mutex<Vec<DeviceDescriptor>>>,
        ports: Arc<Mutex<HashMap<String, MockHidPort>>>,
    ) -> Box<MockHidBackend> {
        let mut backend = MockHidBackend::new();
        backend
            .expect_enumerate()
            .returning(move |_, _| Ok(devices.lock().clone()));
        backend.expect_open().returning(move |device| {
            ports
                .lock()
                .get(&device.path)
                .map(MockHidPort::boxed)
                .ok_or_else(|| Ds4Error::Hid(format!("Failed to open {}", device.path)))
        });
        Box::new(backend)
    }

    fn quiet_settings() -> RegistrySettings {
        RegistrySettings {
            battery_read_timeout: Duration::from_millis(20),
            warning: WarningSettings {
                vibration_alert: false,
                ..WarningSettings::default()
            },
            ..RegistrySettings::default()
        }
    }

    fn drain(rx: &mut broadcast::Receiver<ControllerEvent>) -> Vec<ControllerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let result = ControllerRegistry::new(backend(vec![], HashMap::new()), RegistrySettings::default());
        assert!(matches!(result, Err(Ds4Error::Runtime(_))));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.led.effect_speed = 70;
        config.battery.read_timeout_ms = 400;

        let settings = RegistrySettings::from(&config);
        assert_eq!(settings.effect_speed, 70);
        assert_eq!(settings.battery_read_timeout, Duration::from_millis(400));
        assert_eq!(settings.warning, WarningSettings::default());
    }

    #[tokio::test]
    async fn test_usb_controller_connects_once() {
        let ports = HashMap::from([("/dev/hidraw0".to_string(), MockHidPort::new())]);
        let registry = ControllerRegistry::new(
            backend(vec![usb_device("/dev/hidraw0", Some("aa:bb"))], ports),
            quiet_settings(),
        )
        .unwrap();
        let mut rx = registry.subscribe();

        assert_eq!(registry.scan_and_connect(), 1);
        let record = registry.first().unwrap().record();
        assert!(record.has_usb());
        assert!(!record.has_bluetooth());
        assert_eq!(record.display_name(), "DS4 #1 (USB)");

        let events = drain(&mut rx);
        assert_eq!(events, vec![ControllerEvent::Connected(record)]);

        assert_eq!(registry.scan_and_connect(), 1);
        assert!(drain(&mut rx).is_empty(), "no duplicate connect event");

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_open_failure_is_isolated() {
        // Only the second device has a port to open
        let ports = HashMap::from([("/dev/hidraw2".to_string(), MockHidPort::new())]);
        let registry = ControllerRegistry::new(
            backend(
                vec![usb_device("/dev/hidraw1", None), bt_device("/dev/hidraw2", None)],
                ports,
            ),
            quiet_settings(),
        )
        .unwrap();

        assert_eq!(registry.scan_and_connect(), 1);
        let record = registry.get("/dev/hidraw2").unwrap().record();
        assert!(record.has_bluetooth());
        assert_eq!(record.display_name(), "DS4 #1 (BT)");
        assert!(registry.get("/dev/hidraw1").is_none());

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_enumeration_failure_keeps_tracked_count() {
        let mut backend = MockHidBackend::new();
        backend
            .expect_enumerate()
            .returning(|_, _| Err(Ds4Error::Hid("hidapi gone".to_string())));
        let registry = ControllerRegistry::new(Box::new(backend), quiet_settings()).unwrap();

        assert_eq!(registry.scan_and_connect(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_removes_dead_controller() {
        let port = MockHidPort::new();
        let ports = HashMap::from([("/dev/hidraw0".to_string(), port.clone())]);
        let registry =
            ControllerRegistry::new(backend(vec![usb_device("/dev/hidraw0", None)], ports), quiet_settings())
                .unwrap();
        registry.scan_and_connect();
        let mut rx = registry.subscribe();

        assert_eq!(registry.cleanup_disconnected().await, 0);
        port.set_connected(false);
        assert_eq!(registry.cleanup_disconnected().await, 1);

        assert_eq!(registry.count(), 0);
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(ControllerEvent::Disconnected(r)) if r.id() == "/dev/hidraw0"));
    }

    #[tokio::test]
    async fn test_usb_and_bluetooth_pair_by_serial() {
        let usb = MockHidPort::new();
        let bt = MockHidPort::new();
        let ports = HashMap::from([
            ("/dev/hidraw0".to_string(), usb.clone()),
            ("/dev/hidraw1".to_string(), bt.clone()),
        ]);
        let registry = ControllerRegistry::new(
            backend(
                vec![
                    usb_device("/dev/hidraw0", Some("aa:bb")),
                    bt_device("/dev/hidraw1", Some("aa:bb")),
                ],
                ports,
            ),
            quiet_settings(),
        )
        .unwrap();
        let mut rx = registry.subscribe();

        assert_eq!(registry.scan_and_connect(), 1);
        let entry = registry.first().unwrap();
        assert!(entry.record().has_usb());
        assert!(entry.record().has_bluetooth());
        assert_eq!(entry.connection().active_transport(), Some(Transport::Usb));
        assert_eq!(drain(&mut rx).len(), 1);

        // Unplugging the cable keeps the controller on Bluetooth
        usb.set_connected(false);
        assert_eq!(registry.cleanup_disconnected().await, 0);
        assert_eq!(registry.count(), 1);
        assert!(!entry.record().has_usb());
        assert_eq!(entry.connection().active_transport(), Some(Transport::Bluetooth));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_different_serials_are_separate_controllers() {
        let ports = HashMap::from([
            ("/dev/hidraw0".to_string(), MockHidPort::new()),
            ("/dev/hidraw1".to_string(), MockHidPort::new()),
        ]);
        let registry = ControllerRegistry::new(
            backend(
                vec![usb_device("/dev/hidraw0", Some("aa")), usb_device("/dev/hidraw1", Some("bb"))],
                ports,
            ),
            quiet_settings(),
        )
        .unwrap();

        assert_eq!(registry.scan_and_connect(), 2);
        let names: Vec<_> = registry
            .controllers()
            .iter()
            .map(|r| r.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["DS4 #1 (USB)", "DS4 #2 (USB)"]);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_display_numbers_are_not_reused() {
        let first = MockHidPort::new();
        let devices = Arc::new(Mutex::new(vec![
            usb_device("/dev/hidraw0", Some("aa")),
            usb_device("/dev/hidraw1", Some("bb")),
        ]));
        let ports = Arc::new(Mutex::new(HashMap::from([
            ("/dev/hidraw0".to_string(), first.clone()),
            ("/dev/hidraw1".to_string(), MockHidPort::new()),
        ])));
        let registry =
            ControllerRegistry::new(hotplug_backend(devices.clone(), ports.clone()), quiet_settings()).unwrap();
        assert_eq!(registry.scan_and_connect(), 2);

        // #1 goes away, a third controller arrives
        first.set_connected(false);
        devices.lock().remove(0);
        assert_eq!(registry.cleanup_disconnected().await, 1);
        devices.lock().push(usb_device("/dev/hidraw2", Some("cc")));
        ports.lock().insert("/dev/hidraw2".to_string(), MockHidPort::new());

        assert_eq!(registry.scan_and_connect(), 2);
        let names: Vec<_> = registry
            .controllers()
            .iter()
            .map(|r| r.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["DS4 #2 (USB)", "DS4 #3 (USB)"]);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_dropped_standby_link_is_detected_and_repaired() {
        let usb = MockHidPort::new();
        let bt = MockHidPort::new();
        let devices = Arc::new(Mutex::new(vec![
            usb_device("/dev/hidraw0", Some("aa:bb")),
            bt_device("/dev/hidraw1", Some("aa:bb")),
        ]));
        let ports = Arc::new(Mutex::new(HashMap::from([
            ("/dev/hidraw0".to_string(), usb.clone()),
            ("/dev/hidraw1".to_string(), bt.clone()),
        ])));
        let registry =
            ControllerRegistry::new(hotplug_backend(devices.clone(), ports.clone()), quiet_settings()).unwrap();
        assert_eq!(registry.scan_and_connect(), 1);
        let entry = registry.first().unwrap();

        // Bluetooth drops while all traffic goes over USB
        bt.set_read_error(true);
        devices.lock().truncate(1);
        assert_eq!(registry.cleanup_disconnected().await, 0);
        assert!(!entry.record().has_bluetooth());
        assert!(!entry.connection().has_transport(Transport::Bluetooth));
        assert!(usb.is_connected(), "active link untouched");

        // The same controller re-pairs under a new path
        devices.lock().push(bt_device("/dev/hidraw3", Some("aa:bb")));
        ports.lock().insert("/dev/hidraw3".to_string(), MockHidPort::new());
        assert_eq!(registry.scan_and_connect(), 1);
        assert!(entry.record().has_bluetooth());
        assert!(entry.connection().owns_path("/dev/hidraw3"));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_slot_is_replaced_by_same_serial() {
        let bt = MockHidPort::new();
        let devices = Arc::new(Mutex::new(vec![
            usb_device("/dev/hidraw0", Some("aa:bb")),
            bt_device("/dev/hidraw1", Some("aa:bb")),
        ]));
        let ports = Arc::new(Mutex::new(HashMap::from([
            ("/dev/hidraw0".to_string(), MockHidPort::new()),
            ("/dev/hidraw1".to_string(), bt.clone()),
        ])));
        let registry =
            ControllerRegistry::new(hotplug_backend(devices.clone(), ports.clone()), quiet_settings()).unwrap();
        assert_eq!(registry.scan_and_connect(), 1);

        // Dead handle still in its slot when the new path shows up
        bt.set_connected(false);
        devices.lock()[1] = bt_device("/dev/hidraw4", Some("aa:bb"));
        ports.lock().insert("/dev/hidraw4".to_string(), MockHidPort::new());

        assert_eq!(registry.scan_and_connect(), 1);
        let entry = registry.first().unwrap();
        assert!(entry.connection().has_live_transport(Transport::Bluetooth));
        assert!(entry.connection().owns_path("/dev/hidraw4"));
        assert!(!entry.connection().owns_path("/dev/hidraw1"));

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_poll_batteries_feeds_warning() {
        let port = MockHidPort::new();
        let mut report = vec![0u8; 64];
        report[30] = 0x01;
        port.push_input_report(report);

        let ports = HashMap::from([("/dev/hidraw0".to_string(), port.clone())]);
        let registry =
            ControllerRegistry::new(backend(vec![usb_device("/dev/hidraw0", None)], ports), quiet_settings())
                .unwrap();
        registry.scan_and_connect();
        let mut rx = registry.subscribe();

        registry.poll_batteries().await;

        let events = drain(&mut rx);
        assert!(events.contains(&ControllerEvent::BatteryChanged {
            id: "/dev/hidraw0".to_string(),
            percent: 10,
            charging: false,
        }));
        assert!(events.contains(&ControllerEvent::LowBatteryTriggered {
            id: "/dev/hidraw0".to_string(),
            percent: 10,
        }));
        assert_eq!(registry.first().unwrap().record().battery_percent(), 10);

        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_turns_off_and_closes() {
        let port = MockHidPort::new();
        let ports = HashMap::from([("/dev/hidraw0".to_string(), port.clone())]);
        let registry =
            ControllerRegistry::new(backend(vec![usb_device("/dev/hidraw0", None)], ports), quiet_settings())
                .unwrap();
        registry.scan_and_connect();
        let entry = registry.first().unwrap();

        registry.shutdown().await;

        assert_eq!(registry.count(), 0);
        assert!(entry.connection().is_empty());
        let last = port.get_written_data().last().cloned().unwrap();
        assert!(last[2..].iter().all(|&b| b == 0), "light bar switched off");
    }
}
