//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use memos::config::{DataDirCheck, Profile, Settings};
use memos::http::ServerError;
use memos::lifecycle::{Components, Service, Storage};
use memos::store::{DriverError, StoreError};

/// Validated prod profile on an sqlite database inside `dir`, port 0.
pub fn sqlite_profile(dir: &Path) -> Profile {
    let mut profile = Profile::from_settings(Settings {
        mode: "prod".into(),
        addr: "127.0.0.1".into(),
        port: 0,
        data: dir.to_string_lossy().into_owned(),
        driver: "sqlite".into(),
        ..Settings::default()
    });
    profile.validate(DataDirCheck::Skip).unwrap();
    profile
}

/// Validated profile for fake components.
pub fn fake_profile() -> Profile {
    let mut profile = Profile::from_settings(Settings {
        mode: "prod".into(),
        port: 5230,
        driver: "fake".into(),
        dsn: "fake".into(),
        ..Settings::default()
    });
    profile.validate(DataDirCheck::Skip).unwrap();
    profile
}

/// Ordered record of what the fakes were asked to do.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<&'static str>>,
}

impl Journal {
    pub fn record(&self, event: &'static str) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    /// Poll until `event` shows up.
    pub async fn wait_for(&self, event: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count(event) == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{event} never recorded: {:?}", self.events()));
    }
}

/// Steps that should fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub driver: bool,
    pub migrate: bool,
    pub server: bool,
    pub start: bool,
    pub start_panics: bool,
    pub shutdown: bool,
}

pub struct FakeComponents {
    pub journal: Arc<Journal>,
    pub faults: Faults,
}

impl FakeComponents {
    pub fn new(faults: Faults) -> Self {
        Self {
            journal: Arc::new(Journal::default()),
            faults,
        }
    }
}

#[async_trait]
impl Components for FakeComponents {
    type Driver = ();
    type Store = FakeStore;
    type Server = FakeServer;

    async fn new_driver(&self, _profile: &Profile) -> Result<(), DriverError> {
        self.journal.record("driver");
        if self.faults.driver {
            return Err(DriverError::Unsupported("fake".into()));
        }
        Ok(())
    }

    fn new_store(&self, _driver: (), _profile: Arc<Profile>) -> FakeStore {
        FakeStore {
            journal: Arc::clone(&self.journal),
            fail: self.faults.migrate,
        }
    }

    fn new_server(
        &self,
        scope: &CancellationToken,
        _profile: Arc<Profile>,
        _store: Arc<FakeStore>,
    ) -> Result<FakeServer, ServerError> {
        self.journal.record("server");
        if self.faults.server || scope.is_cancelled() {
            return Err(ServerError::Address(String::new()));
        }
        Ok(FakeServer {
            journal: Arc::clone(&self.journal),
            faults: self.faults,
            stopped: watch::channel(false).0,
        })
    }
}

pub struct FakeStore {
    journal: Arc<Journal>,
    fail: bool,
}

#[async_trait]
impl Storage for FakeStore {
    async fn migrate(&self, _scope: &CancellationToken) -> Result<(), StoreError> {
        self.journal.record("migrate");
        if self.fail {
            return Err(StoreError::Cancelled { version: "0.1.0" });
        }
        Ok(())
    }

    async fn close(&self) {
        self.journal.record("close");
    }
}

pub struct FakeServer {
    journal: Arc<Journal>,
    faults: Faults,
    stopped: watch::Sender<bool>,
}

#[async_trait]
impl Service for FakeServer {
    async fn start(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        self.journal.record("start");
        if self.faults.start_panics {
            panic!("server task crashed");
        }
        if self.faults.start {
            return Err(ServerError::Bind {
                addr: "127.0.0.1:5230".into(),
                source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
            });
        }
        let mut stopped = self.stopped.subscribe();
        tokio::select! {
            _ = stopped.wait_for(|s| *s) => {}
            () = scope.cancelled() => {}
        }
        Err(ServerError::Closed)
    }

    async fn shutdown(&self, _scope: &CancellationToken) -> Result<(), ServerError> {
        self.journal.record("shutdown");
        self.stopped.send_replace(true);
        if self.faults.shutdown {
            return Err(ServerError::ShutdownTimeout(Duration::from_secs(1)));
        }
        Ok(())
    }
}
