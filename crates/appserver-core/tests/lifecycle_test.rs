// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Integration tests for the application lifecycle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::thread;
use std::time::{Duration, Instant};

use appserver_core::{
    Application, ApplicationContainer, ApplicationState, ClassLoader, Container, ContainerSettings,
    Error, FilesystemServices, Manager, Provisioner, StateError,
};
use appserver_naming::{DirectoryRegistry, NamingDirectory, NamingError};
use tempfile::TempDir;

type Journal = Arc<Mutex<Vec<String>>>;

struct RecordingManager {
    name: &'static str,
    journal: Journal,
    stop_delay: Duration,
    fail_initialize: bool,
    application: OnceLock<Weak<Application>>,
    observed_on_stop: Mutex<Option<(ApplicationState, bool)>>,
}

impl RecordingManager {
    fn new(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            stop_delay: Duration::ZERO,
            fail_initialize: false,
            application: OnceLock::new(),
            observed_on_stop: Mutex::new(None),
        }
    }
}

impl Manager for RecordingManager {
    fn initialize(&self, application: &Application) -> anyhow::Result<()> {
        if self.fail_initialize {
            anyhow::bail!("{} can't connect to its backend", self.name);
        }
        assert!(application.get_manager(self.name).is_some());
        self.journal
            .lock()
            .unwrap()
            .push(format!("initialize {}", self.name));
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        if let Some(application) = self.application.get().and_then(Weak::upgrade) {
            *self.observed_on_stop.lock().unwrap() =
                Some((application.state(), application.is_connected()));
        }
        thread::sleep(self.stop_delay);
        self.journal.lock().unwrap().push(format!("stop {}", self.name));
        Ok(())
    }
}

struct RecordingClassLoader {
    name: &'static str,
    journal: Journal,
}

impl ClassLoader for RecordingClassLoader {
    fn register(&self, _application: &Application) -> anyhow::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("register {}", self.name));
        Ok(())
    }
}

struct CountingProvisioner {
    runs: AtomicUsize,
}

impl Provisioner for CountingProvisioner {
    fn provision(&self, _application: &Application) -> anyhow::Result<()> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Fixture {
    _tmp: TempDir,
    container: ApplicationContainer,
}

fn fixture(provisioning_enabled: bool) -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = NamingDirectory::root("php", Arc::new(DirectoryRegistry::new())).unwrap();
    let container = ApplicationContainer::new(
        ContainerSettings {
            app_base: tmp.path().join("webapps"),
            tmp_dir: tmp.path().join("tmp"),
            provisioning_enabled,
            ..ContainerSettings::default()
        },
        root,
    );
    Fixture {
        _tmp: tmp,
        container,
    }
}

fn application(fixture: &Fixture, name: &str) -> Arc<Application> {
    let application = Application::builder(name)
        .container_name(fixture.container.name())
        .naming_directory(fixture.container.naming_directory().clone())
        .services(Arc::new(FilesystemServices::new()))
        .tick(Duration::from_millis(10))
        .build()
        .unwrap();
    application.prepare(&fixture.container).unwrap();
    application
}

fn wait_for(application: &Application, state: ApplicationState) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while application.state() != state {
        assert!(
            Instant::now() < deadline,
            "application stuck in {}",
            application.state()
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_state_sequence_of_normal_run() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");

    let manager = Arc::new(RecordingManager::new("BeanContext", &journal));
    manager.application.set(Arc::downgrade(&app)).unwrap();
    app.add_manager("BeanContext", manager.clone()).unwrap();

    let mut observed = vec![app.state()];
    assert!(!app.is_connected());

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    observed.push(app.state());
    assert!(app.is_connected());

    app.stop().unwrap();
    let (on_stop, connected_on_stop) = manager.observed_on_stop.lock().unwrap().unwrap();
    observed.push(on_stop);
    observed.push(app.state());

    assert_eq!(
        observed,
        vec![
            ApplicationState::WaitingForInitialization,
            ApplicationState::InitializationSuccessful,
            ApplicationState::Halt,
            ApplicationState::Shutdown,
        ]
    );
    assert!(!connected_on_stop);
    assert!(!app.is_connected());
}

#[test]
fn test_stop_waits_for_every_manager_in_parallel() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");

    let delays = [150u64, 300, 450];
    for (i, delay) in delays.iter().enumerate() {
        let name: &'static str = ["BeanContext", "SessionManager", "QueueManager"][i];
        let mut manager = RecordingManager::new(name, &journal);
        manager.stop_delay = Duration::from_millis(*delay);
        app.add_manager(name, Arc::new(manager)).unwrap();
    }

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);

    let started = Instant::now();
    app.stop().unwrap();
    let elapsed = started.elapsed();

    let stops = journal
        .lock()
        .unwrap()
        .iter()
        .filter(|entry| entry.starts_with("stop "))
        .count();
    assert_eq!(stops, 3);
    assert_eq!(app.state(), ApplicationState::Shutdown);
    assert!(elapsed >= Duration::from_millis(450), "stopped after {:?}", elapsed);
    assert!(
        elapsed < Duration::from_millis(900),
        "manager shutdown ran sequentially: {:?}",
        elapsed
    );
}

#[test]
fn test_search_resolves_registered_manager() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");

    let manager: Arc<dyn Manager> = Arc::new(RecordingManager::new("BeanContext", &journal));
    app.add_manager("BeanContext", manager.clone()).unwrap();

    let found = app.search("BeanContext", &[]).unwrap();
    let resolved = found.downcast_ref::<Arc<dyn Manager>>().unwrap();
    assert!(Arc::ptr_eq(resolved, &manager));

    let direct = fixture
        .container
        .naming_directory()
        .search("php:global/combined-appserver/example/BeanContext", &[])
        .unwrap();
    assert!(Arc::ptr_eq(
        direct.downcast_ref::<Arc<dyn Manager>>().unwrap(),
        &manager
    ));
}

#[test]
fn test_unsupported_state_value() {
    assert!(matches!(
        ApplicationState::get(99),
        Err(StateError::InvalidState { value: 99, ref valid }) if valid == "0,1,2,3,4,5"
    ));
}

#[test]
fn test_startup_order() {
    let fixture = fixture(true);
    let journal = Journal::default();
    let app = application(&fixture, "example");

    for name in ["first", "second"] {
        app.add_class_loader(
            name,
            Arc::new(RecordingClassLoader {
                name,
                journal: journal.clone(),
            }),
        )
        .unwrap();
    }
    app.add_manager("BeanContext", Arc::new(RecordingManager::new("BeanContext", &journal)))
        .unwrap();
    let provisioner = Arc::new(CountingProvisioner {
        runs: AtomicUsize::new(0),
    });
    app.add_provisioner("DatasourceProvisioner", provisioner.clone())
        .unwrap();

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    app.stop().unwrap();

    assert_eq!(
        *journal.lock().unwrap(),
        vec![
            "register second",
            "register first",
            "initialize BeanContext",
            "register second",
            "register first",
            "stop BeanContext",
        ]
    );
    assert_eq!(provisioner.runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_provisioners_skipped_when_disabled() {
    let fixture = fixture(false);
    let app = application(&fixture, "example");
    let provisioner = Arc::new(CountingProvisioner {
        runs: AtomicUsize::new(0),
    });
    app.add_provisioner("DatasourceProvisioner", provisioner.clone())
        .unwrap();

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    app.stop().unwrap();

    assert_eq!(provisioner.runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_failing_manager_leaves_worker_terminated() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");

    let mut manager = RecordingManager::new("BeanContext", &journal);
    manager.fail_initialize = true;
    app.add_manager("BeanContext", Arc::new(manager)).unwrap();

    app.connect().unwrap();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(app.state(), ApplicationState::WaitingForInitialization);

    assert!(matches!(app.stop(), Err(Error::WorkerTerminated(name)) if name == "example"));
}

#[test]
fn test_stop_without_connect() {
    let fixture = fixture(false);
    let app = application(&fixture, "example");

    assert!(matches!(app.stop(), Err(Error::NotConnected(_))));
}

#[test]
fn test_prepare_binds_environment_and_unload_removes_it() {
    let fixture = fixture(false);
    let app = application(&fixture, "example");
    let root = fixture.container.naming_directory();

    let webapp_path = fixture.container.app_base().join("example");
    assert_eq!(app.webapp_path().unwrap(), webapp_path);
    assert_eq!(
        app.cache_dir().unwrap(),
        fixture.container.tmp_dir().join("example").join("cache")
    );
    assert_eq!(app.umask().unwrap(), 0o002);
    assert_eq!(
        root.search("php:env/combined-appserver/example/user", &[])
            .unwrap()
            .as_str(),
        Some("nobody")
    );

    // Preparing again rebinds without failing.
    app.prepare(&fixture.container).unwrap();

    app.unload();
    assert!(matches!(
        root.search("php:env/combined-appserver/example/user", &[]),
        Err(NamingError::NotFound { .. })
    ));
    assert!(
        !root
            .registry()
            .contains("php:global/combined-appserver/example")
    );

    // Nothing left to unload.
    app.unload();
}

#[test]
fn test_shutdown_unloads_bindings() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");
    app.add_manager("BeanContext", Arc::new(RecordingManager::new("BeanContext", &journal)))
        .unwrap();

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    app.stop().unwrap();

    assert!(app.search("BeanContext", &[]).is_err());
    assert!(app.get_manager("BeanContext").is_some());

    let info = app.info();
    assert_eq!(info.state, ApplicationState::Shutdown);
    assert_eq!(info.unique_name, "combined-appserver/example");
    assert_eq!(info.managers, 1);
    assert!(info.connected_at.is_some());

    // A second stop is a no-op.
    app.stop().unwrap();
}

#[test]
fn test_stopped_application_can_not_reconnect() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");
    app.add_manager("BeanContext", Arc::new(RecordingManager::new("BeanContext", &journal)))
        .unwrap();

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    app.stop().unwrap();

    let result = app.connect();
    thread::sleep(Duration::from_millis(100));

    assert!(matches!(
        result,
        Err(Error::AlreadyStopped { state: ApplicationState::Shutdown, .. })
    ));
    assert_eq!(app.state(), ApplicationState::Shutdown);
    assert_eq!(
        *journal.lock().unwrap(),
        vec!["initialize BeanContext", "stop BeanContext"]
    );
}

#[test]
fn test_failed_application_can_not_reconnect() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");
    let mut manager = RecordingManager::new("BeanContext", &journal);
    manager.fail_initialize = true;
    app.add_manager("BeanContext", Arc::new(manager)).unwrap();

    app.connect().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert!(app.stop().is_err());

    assert!(matches!(
        app.connect(),
        Err(Error::AlreadyStopped { state: ApplicationState::Halt, .. })
    ));
}

#[test]
fn test_shutdown_threads_register_class_loaders() {
    let fixture = fixture(false);
    let journal = Journal::default();
    let app = application(&fixture, "example");
    app.add_class_loader(
        "composer",
        Arc::new(RecordingClassLoader {
            name: "composer",
            journal: journal.clone(),
        }),
    )
    .unwrap();
    for name in ["BeanContext", "SessionManager"] {
        app.add_manager(name, Arc::new(RecordingManager::new(name, &journal)))
            .unwrap();
    }

    app.connect().unwrap();
    wait_for(&app, ApplicationState::InitializationSuccessful);
    app.stop().unwrap();

    let journal = journal.lock().unwrap();
    let registrations = journal
        .iter()
        .filter(|entry| *entry == "register composer")
        .count();
    // Once on the worker, once per manager shutdown thread.
    assert_eq!(registrations, 3);
    let first_stop = journal
        .iter()
        .position(|entry| entry.starts_with("stop "))
        .unwrap();
    assert_eq!(journal[first_stop - 1], "register composer");
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_provision_logs_each_provisioner() {
    let fixture = fixture(true);
    let app = application(&fixture, "example");
    app.add_provisioner(
        "DatasourceProvisioner",
        Arc::new(CountingProvisioner {
            runs: AtomicUsize::new(0),
        }),
    )
    .unwrap();

    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || app.provision()).unwrap();

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    let before = output.find("Provisioning").unwrap();
    let after = output.find("Successfully provisioned").unwrap();
    assert!(before < after);
    assert!(output.contains("provisioner=DatasourceProvisioner"));
}
