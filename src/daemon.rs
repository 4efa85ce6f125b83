//! Process lifecycle: discover, wire up, wait, shut down.
//!
//! Startup order is bus, command pipe, touchpad group, typing detection,
//! keyboard monitor. Shutdown runs in reverse, so the keyboard stops feeding
//! keypresses before the controller forces the touchpads enabled, and the
//! group closes after that. The bus is closed last.

use crate::bus::EventBus;
use crate::command::OverrideCommand;
use crate::debounce::{DEFAULT_COOLDOWN, DebounceController};
use crate::device::{DeviceInfo, DeviceOpener};
use crate::discovery::Enumerator;
use crate::error::{Error, Result};
use crate::group::DeviceGroup;
use crate::platform::{self, CommandReceiver, EvdevOpener, KeyboardMonitor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

/// Default location of the command pipe.
pub const DEFAULT_PIPE_PATH: &str = "/tmp/zenbook-duo-daemon.pipe";

/// Settings for [`run`].
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Quiet period after the last keypress before touchpads come back.
    pub cooldown: Duration,
    /// Stop automatically after this long. Meant for trying the daemon out
    /// without risking a stuck touchpad.
    pub timeout: Option<Duration>,
    /// Command pipe location.
    pub pipe_path: PathBuf,
    /// Touchpad device paths. Empty means discover them.
    pub touchpads: Vec<String>,
    /// Keyboard device path. `None` means discover it.
    pub keyboard: Option<String>,
    /// Where to look for devices.
    pub enumerator: Enumerator,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            cooldown: DEFAULT_COOLDOWN,
            timeout: None,
            pipe_path: PathBuf::from(DEFAULT_PIPE_PATH),
            touchpads: Vec::new(),
            keyboard: None,
            enumerator: Enumerator::default(),
        }
    }
}

impl DaemonConfig {
    fn touchpad_devices(&self) -> Result<Vec<DeviceInfo>> {
        if self.touchpads.is_empty() {
            return self.enumerator.touchpads();
        }
        Ok(self
            .touchpads
            .iter()
            .map(|path| DeviceInfo::new(path.as_str(), "configured touchpad"))
            .collect())
    }

    fn keyboard_device(&self) -> Result<DeviceInfo> {
        match &self.keyboard {
            Some(path) => Ok(DeviceInfo::new(path.as_str(), "configured keyboard")),
            None => self.enumerator.keyboard(),
        }
    }
}

/// A running piece of the daemon that must be stopped at shutdown.
pub trait Component {
    /// Name used in shutdown logs.
    fn name(&self) -> &str;

    /// Stop the component. Called once, in reverse start order.
    fn stop(&self) -> Result<()>;
}

impl Component for CommandReceiver {
    fn name(&self) -> &str {
        "command pipe"
    }

    fn stop(&self) -> Result<()> {
        CommandReceiver::stop(self)
    }
}

impl Component for KeyboardMonitor {
    fn name(&self) -> &str {
        "keyboard monitor"
    }

    fn stop(&self) -> Result<()> {
        KeyboardMonitor::stop(self)
    }
}

impl Component for DebounceController {
    fn name(&self) -> &str {
        "typing detection"
    }

    fn stop(&self) -> Result<()> {
        DebounceController::stop(self)
    }
}

impl Component for DeviceGroup {
    fn name(&self) -> &str {
        "touchpad group"
    }

    fn stop(&self) -> Result<()> {
        self.close()
    }
}

impl<C: Component + ?Sized> Component for Arc<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn stop(&self) -> Result<()> {
        (**self).stop()
    }
}

/// Started components, stopped last-in first-out.
#[derive(Default)]
pub struct Components {
    started: Vec<Box<dyn Component>>,
}

impl Components {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a started component.
    pub fn push(&mut self, component: impl Component + 'static) {
        log::debug!("{} started", component.name());
        self.started.push(Box::new(component));
    }

    /// Number of components still to stop.
    pub fn len(&self) -> usize {
        self.started.len()
    }

    /// Check if nothing is left to stop.
    pub fn is_empty(&self) -> bool {
        self.started.is_empty()
    }

    /// Stop everything in reverse start order. Failures are logged and do
    /// not prevent the remaining components from stopping.
    ///
    /// Returns the number of components that failed to stop.
    pub fn stop_all(&mut self) -> usize {
        let mut failures = 0;
        while let Some(component) = self.started.pop() {
            match component.stop() {
                Ok(()) => log::debug!("{} stopped", component.name()),
                Err(e) => {
                    failures += 1;
                    log::warn!("failed to stop {}: {e}", component.name());
                }
            }
        }
        failures
    }
}

impl Drop for Components {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Why [`wait_for_shutdown`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// A signal arrived on the shutdown channel.
    Signal,
    /// The configured timeout elapsed.
    Timeout,
    /// Every sender of the shutdown channel was dropped.
    Disconnected,
}

/// Block until a shutdown request arrives or `timeout` elapses.
pub fn wait_for_shutdown(shutdown: &Receiver<()>, timeout: Option<Duration>) -> ShutdownReason {
    match timeout {
        Some(timeout) => match shutdown.recv_timeout(timeout) {
            Ok(()) => ShutdownReason::Signal,
            Err(RecvTimeoutError::Timeout) => ShutdownReason::Timeout,
            Err(RecvTimeoutError::Disconnected) => ShutdownReason::Disconnected,
        },
        None => match shutdown.recv() {
            Ok(()) => ShutdownReason::Signal,
            Err(_) => ShutdownReason::Disconnected,
        },
    }
}

/// Run the daemon until `shutdown` fires or the configured timeout elapses.
///
/// Any failure before the daemon is active is returned and everything
/// started so far is stopped again. A command pipe that cannot be created
/// only produces a warning.
pub fn run(config: &DaemonConfig, shutdown: &Receiver<()>) -> Result<()> {
    run_with_opener(config, Arc::new(EvdevOpener), shutdown)
}

fn run_with_opener(
    config: &DaemonConfig,
    opener: Arc<dyn DeviceOpener>,
    shutdown: &Receiver<()>,
) -> Result<()> {
    log::info!(
        "starting palm-rejection daemon v{}",
        env!("CARGO_PKG_VERSION")
    );
    if let Some(timeout) = config.timeout {
        log::warn!("running with a {timeout:?} timeout, will stop automatically");
    }

    let bus = EventBus::new();
    let mut components = Components::new();

    let pipe = CommandReceiver::new(&config.pipe_path, bus.clone());
    match pipe.start() {
        Ok(()) => components.push(pipe),
        Err(e) => log::warn!("command pipe unavailable, overrides disabled: {e}"),
    }

    let result = start_input(config, opener, &bus, &mut components).map(|()| {
        let reason = wait_for_shutdown(shutdown, config.timeout);
        log::info!("shutting down ({reason:?})");
    });

    let failures = components.stop_all();
    if failures > 0 {
        log::warn!("{failures} component(s) failed to stop cleanly");
    }
    bus.close();

    if result.is_ok() {
        log::info!("daemon stopped");
    }
    result
}

fn start_input(
    config: &DaemonConfig,
    opener: Arc<dyn DeviceOpener>,
    bus: &EventBus,
    components: &mut Components,
) -> Result<()> {
    let touchpads = config.touchpad_devices()?;
    let keyboard = config.keyboard_device()?;

    let group = Arc::new(DeviceGroup::from_devices(&touchpads, opener));
    group.open()?;
    components.push(Arc::clone(&group));

    let controller = DebounceController::new(group, bus.clone(), config.cooldown);
    controller.start()?;
    components.push(controller.clone());

    let monitor = KeyboardMonitor::open(keyboard.clone())?;
    monitor.start(controller.key_press_handler())?;
    components.push(monitor);

    let paths: Vec<&str> = touchpads.iter().map(|d| d.identifier.as_str()).collect();
    log::info!(
        "palm rejection active: touchpads [{}], keyboard {}, cooldown {:?}",
        paths.join(", "),
        keyboard.identifier,
        config.cooldown
    );
    Ok(())
}

/// Devices the daemon would use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceReport {
    /// Every touchpad, in group order.
    pub touchpads: Vec<DeviceInfo>,
    /// The keyboard watched for typing.
    pub keyboard: Option<DeviceInfo>,
}

/// Run discovery without opening anything.
pub fn list_devices(enumerator: &Enumerator) -> Result<DeviceReport> {
    let touchpads = match enumerator.touchpads() {
        Ok(touchpads) => touchpads,
        Err(Error::NoTouchpad) => Vec::new(),
        Err(e) => return Err(e),
    };
    let keyboard = match enumerator.keyboard() {
        Ok(keyboard) => Some(keyboard),
        Err(Error::NoKeyboard) => None,
        Err(e) => return Err(e),
    };
    Ok(DeviceReport {
        touchpads,
        keyboard,
    })
}

/// Send an override to a running daemon.
pub fn send_command(pipe_path: &Path, command: OverrideCommand) -> Result<()> {
    platform::send_command(pipe_path, command)?;
    log::debug!("sent {command} to {}", pipe_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockOpener;
    use std::fs;
    use std::sync::Mutex;
    use std::sync::mpsc;
    use std::time::Instant;
    use tempfile::TempDir;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl Component for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn stop(&self) -> Result<()> {
            self.log.lock().unwrap().push(self.name);
            if self.fail {
                return Err(Error::NotRunning);
            }
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, fail: bool) -> Recorder {
        Recorder {
            name,
            log: Arc::clone(log),
            fail,
        }
    }

    #[test]
    fn test_components_stop_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut components = Components::new();
        components.push(recorder("pipe", &log, false));
        components.push(recorder("group", &log, true));
        components.push(recorder("controller", &log, false));
        components.push(recorder("keyboard", &log, false));
        assert_eq!(components.len(), 4);

        assert_eq!(components.stop_all(), 1);
        assert!(components.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["keyboard", "controller", "group", "pipe"]
        );

        // Nothing is stopped twice.
        drop(components);
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[test]
    fn test_components_drop_stops_remaining() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut components = Components::new();
            components.push(recorder("a", &log, false));
            components.push(recorder("b", &log, false));
        }
        assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
    }

    #[test]
    fn test_wait_for_shutdown_signal() {
        let (tx, rx) = mpsc::channel();
        tx.send(()).unwrap();
        assert_eq!(wait_for_shutdown(&rx, None), ShutdownReason::Signal);
        tx.send(()).unwrap();
        assert_eq!(
            wait_for_shutdown(&rx, Some(Duration::from_secs(5))),
            ShutdownReason::Signal
        );
    }

    #[test]
    fn test_wait_for_shutdown_timeout() {
        let (_tx, rx) = mpsc::channel::<()>();
        let start = Instant::now();
        assert_eq!(
            wait_for_shutdown(&rx, Some(Duration::from_millis(50))),
            ShutdownReason::Timeout
        );
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_for_shutdown_disconnected() {
        let (tx, rx) = mpsc::channel::<()>();
        drop(tx);
        assert_eq!(wait_for_shutdown(&rx, None), ShutdownReason::Disconnected);
    }

    #[test]
    fn test_default_config() {
        let config = DaemonConfig::default();
        assert_eq!(config.cooldown, Duration::from_millis(300));
        assert_eq!(config.pipe_path, PathBuf::from(DEFAULT_PIPE_PATH));
        assert!(config.timeout.is_none());
        assert!(config.touchpads.is_empty());
        assert!(config.keyboard.is_none());
    }

    #[test]
    fn test_configured_devices_bypass_discovery() {
        let config = DaemonConfig {
            touchpads: vec!["/dev/input/event5".into(), "/dev/input/event6".into()],
            keyboard: Some("/dev/input/event3".into()),
            enumerator: Enumerator::new("/nonexistent/dev", "/nonexistent/sys"),
            ..DaemonConfig::default()
        };

        let pads = config.touchpad_devices().unwrap();
        assert_eq!(pads.len(), 2);
        assert_eq!(pads[1].identifier, "/dev/input/event6");
        assert_eq!(config.keyboard_device().unwrap().identifier, "/dev/input/event3");
    }

    fn fake_input(dir: &TempDir, devices: &[(&str, &str)]) -> Enumerator {
        let dev = dir.path().join("dev");
        let sys = dir.path().join("sys");
        fs::create_dir_all(&dev).unwrap();
        for (event, name) in devices {
            fs::write(dev.join(event), b"").unwrap();
            let node = sys.join(event).join("device");
            fs::create_dir_all(&node).unwrap();
            fs::write(node.join("name"), name).unwrap();
        }
        Enumerator::new(dev, sys)
    }

    #[test]
    fn test_list_devices() {
        let dir = TempDir::new().unwrap();
        let enumerator = fake_input(
            &dir,
            &[
                ("event3", "AT Translated Set 2 keyboard"),
                ("event6", "ASUE140A:00 04F3:3134 Touchpad"),
            ],
        );

        let report = list_devices(&enumerator).unwrap();
        assert_eq!(report.touchpads.len(), 1);
        assert_eq!(report.touchpads[0].name, "ASUE140A:00 04F3:3134 Touchpad");
        assert_eq!(
            report.keyboard.map(|k| k.name).as_deref(),
            Some("AT Translated Set 2 keyboard")
        );
    }

    #[test]
    fn test_list_devices_with_nothing_found() {
        let dir = TempDir::new().unwrap();
        let enumerator = fake_input(&dir, &[("event1", "Power Button")]);
        assert_eq!(list_devices(&enumerator).unwrap(), DeviceReport::default());
    }

    #[test]
    fn test_run_without_touchpads_fails_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let config = DaemonConfig {
            pipe_path: dir.path().join("daemon.pipe"),
            enumerator: fake_input(&dir, &[("event3", "AT Translated Set 2 keyboard")]),
            ..DaemonConfig::default()
        };
        let (_tx, rx) = mpsc::channel();

        let err = run_with_opener(&config, MockOpener::new(), &rx).unwrap_err();
        assert!(matches!(err, Error::NoTouchpad));
        assert!(!config.pipe_path.exists());
    }

    #[test]
    fn test_run_group_open_failure_is_fatal() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        opener.fail_open("/dev/input/event6");
        let config = DaemonConfig {
            pipe_path: dir.path().join("daemon.pipe"),
            touchpads: vec!["/dev/input/event5".into(), "/dev/input/event6".into()],
            keyboard: Some("/dev/input/event3".into()),
            ..DaemonConfig::default()
        };
        let (_tx, rx) = mpsc::channel();

        let err = run_with_opener(&config, opener.clone(), &rx).unwrap_err();
        assert_eq!(err.device_index(), Some(2));
        assert_eq!(opener.open_count(), 0);
        assert!(!config.pipe_path.exists());
    }

    #[test]
    fn test_run_missing_keyboard_releases_touchpads() {
        let dir = TempDir::new().unwrap();
        let opener = MockOpener::new();
        let config = DaemonConfig {
            pipe_path: dir.path().join("daemon.pipe"),
            touchpads: vec!["/dev/input/event5".into()],
            keyboard: Some(
                dir.path()
                    .join("no-such-keyboard")
                    .to_string_lossy()
                    .into_owned(),
            ),
            ..DaemonConfig::default()
        };
        let (_tx, rx) = mpsc::channel();

        let err = run_with_opener(&config, opener.clone(), &rx).unwrap_err();
        assert!(matches!(err, Error::DeviceOpen { .. } | Error::NotSupported(_)));
        // The group was opened, then closed again during shutdown.
        assert_eq!(opener.open_calls("/dev/input/event5"), 1);
        assert_eq!(opener.open_count(), 0);
    }
}
