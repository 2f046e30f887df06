//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct the database driver, store and server in dependency order
//! - Migrate the schema before any traffic is accepted
//! - Start the server and the shutdown watcher
//! - Wait for the root scope and release resources
//!
//! # Design Decisions
//! - Fail fast: any construction error ends the run
//! - Subsystems initialize in order, not concurrently
//! - The listener starts last (traffic only when ready)
//! - Components come in through [`Components`] so the sequence can be driven
//!   by fakes

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Profile;
use crate::http::{Server, ServerError};
use crate::lifecycle::{greeting, shutdown};
use crate::store::{new_db_driver, DbDriver, DriverError, Store, StoreError};

/// Schema owner used by the lifecycle.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn migrate(&self, scope: &CancellationToken) -> Result<(), StoreError>;
    async fn close(&self);
}

/// Network service driven by the lifecycle.
#[async_trait]
pub trait Service: Send + Sync {
    /// Serve until stopped. `Err(ServerError::Closed)` means an orderly stop.
    async fn start(&self, scope: &CancellationToken) -> Result<(), ServerError>;

    /// Stop and drain. Must be idempotent.
    async fn shutdown(&self, scope: &CancellationToken) -> Result<(), ServerError>;
}

/// Factory for everything the lifecycle constructs.
#[async_trait]
pub trait Components: Send + Sync {
    type Driver: Send;
    type Store: Storage + 'static;
    type Server: Service + 'static;

    async fn new_driver(&self, profile: &Profile) -> Result<Self::Driver, DriverError>;

    fn new_store(&self, driver: Self::Driver, profile: Arc<Profile>) -> Self::Store;

    fn new_server(
        &self,
        scope: &CancellationToken,
        profile: Arc<Profile>,
        store: Arc<Self::Store>,
    ) -> Result<Self::Server, ServerError>;
}

#[async_trait]
impl Storage for Store {
    async fn migrate(&self, scope: &CancellationToken) -> Result<(), StoreError> {
        Store::migrate(self, scope).await
    }

    async fn close(&self) {
        Store::close(self).await;
    }
}

#[async_trait]
impl Service for Server {
    async fn start(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        Server::start(self, scope).await
    }

    async fn shutdown(&self, scope: &CancellationToken) -> Result<(), ServerError> {
        Server::shutdown(self, scope).await
    }
}

/// Production components: sqlx driver, [`Store`], axum [`Server`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Services;

#[async_trait]
impl Components for Services {
    type Driver = DbDriver;
    type Store = Store;
    type Server = Server;

    async fn new_driver(&self, profile: &Profile) -> Result<DbDriver, DriverError> {
        new_db_driver(profile).await
    }

    fn new_store(&self, driver: DbDriver, profile: Arc<Profile>) -> Store {
        Store::new(driver, profile)
    }

    fn new_server(
        &self,
        scope: &CancellationToken,
        profile: Arc<Profile>,
        store: Arc<Store>,
    ) -> Result<Server, ServerError> {
        Server::new(scope, profile, store)
    }
}

/// Step at which a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Driver,
    Migrate,
    Server,
    Start,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Stopped,
    Failed(Phase),
}

impl Outcome {
    /// Process exit status for this outcome.
    pub fn exit_status(self) -> u8 {
        match self {
            Outcome::Stopped => 0,
            Outcome::Failed(_) => 2,
        }
    }
}

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    Validated,
    Connected,
    Ready,
    Serving,
    Draining,
    Stopped,
    Failed,
}

impl State {
    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: State) -> bool {
        use State::*;
        matches!(
            (self, next),
            (Init, Validated)
                | (Validated, Connected)
                | (Connected, Ready)
                | (Ready, Serving)
                | (Serving, Draining)
                | (Draining, Stopped)
                | (Validated | Connected | Ready | Serving, Failed)
                | (Failed, Stopped)
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Current state, logging every transition.
#[derive(Debug)]
struct Tracker {
    state: State,
}

impl Tracker {
    fn new(state: State) -> Self {
        Self { state }
    }

    fn advance(&mut self, next: State) {
        if !self.state.can_transition_to(next) {
            tracing::warn!(from = %self.state, to = %next, "Unexpected lifecycle transition");
        }
        tracing::debug!(from = %self.state, to = %next, "Lifecycle transition");
        self.state = next;
    }
}

type Greeter = Box<dyn Fn(&Profile) + Send + Sync>;

/// One run of a memos instance, from a validated profile to exit.
pub struct Lifecycle<C> {
    profile: Arc<Profile>,
    components: C,
    greeter: Greeter,
}

impl<C: Components> Lifecycle<C> {
    /// Profile must already be validated.
    pub fn new(profile: Profile, components: C) -> Self {
        Self {
            profile: Arc::new(profile),
            components,
            greeter: Box::new(greeting::print),
        }
    }

    /// Replace the stdout greeting.
    pub fn with_greeter<G>(mut self, greeter: G) -> Self
    where
        G: Fn(&Profile) + Send + Sync + 'static,
    {
        self.greeter = Box::new(greeter);
        self
    }

    /// Run until `shutdown_request` resolves or the server fails.
    pub async fn run<F>(self, shutdown_request: F) -> Outcome
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self {
            profile,
            components,
            greeter,
        } = self;
        let mut tracker = Tracker::new(State::Init);
        tracker.advance(State::Validated);

        let scope = CancellationToken::new();

        let driver = match components.new_driver(&profile).await {
            Ok(driver) => driver,
            Err(e) => {
                scope.cancel();
                tracing::error!(driver = %profile.driver, error = %e, "failed to create db driver");
                tracker.advance(State::Failed);
                return Outcome::Failed(Phase::Driver);
            }
        };
        tracker.advance(State::Connected);

        let store = Arc::new(components.new_store(driver, Arc::clone(&profile)));
        if let Err(e) = store.migrate(&scope).await {
            scope.cancel();
            tracing::error!(error = %e, "failed to migrate");
            store.close().await;
            tracker.advance(State::Failed);
            return Outcome::Failed(Phase::Migrate);
        }
        tracker.advance(State::Ready);

        let server = match components.new_server(&scope, Arc::clone(&profile), Arc::clone(&store)) {
            Ok(server) => Arc::new(server),
            Err(e) => {
                scope.cancel();
                tracing::error!(error = %e, "failed to create server");
                store.close().await;
                tracker.advance(State::Failed);
                return Outcome::Failed(Phase::Server);
            }
        };

        let watcher = tokio::spawn(shutdown::watch(
            scope.clone(),
            Arc::clone(&server),
            shutdown_request,
        ));

        let (invoked_tx, invoked_rx) = oneshot::channel();
        let mut serving = tokio::spawn(serve(scope.clone(), Arc::clone(&server), invoked_tx));
        let _ = invoked_rx.await;
        tracker.advance(State::Serving);

        greeter(profile.as_ref());

        let joined = tokio::select! {
            joined = &mut serving => Some(joined),
            () = scope.cancelled() => None,
        };
        let joined = match joined {
            Some(joined) => joined,
            None => serving.await,
        };
        let start_failed = joined.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Server task panicked");
            true
        });
        if start_failed {
            scope.cancel();
        }
        // An orderly stop ends once the watcher has finished draining.
        scope.cancelled().await;

        let signalled = watcher.await.unwrap_or_else(|e| {
            tracing::error!(error = %e, "Shutdown watcher panicked");
            false
        });
        store.close().await;

        if start_failed {
            tracker.advance(State::Failed);
            tracker.advance(State::Stopped);
            return Outcome::Failed(Phase::Start);
        }
        if signalled {
            tracker.advance(State::Draining);
        }
        tracker.advance(State::Stopped);
        tracing::info!("Shutdown complete");
        Outcome::Stopped
    }
}

/// Server task body. Returns `true` when start failed for real.
async fn serve<S>(scope: CancellationToken, server: Arc<S>, invoked: oneshot::Sender<()>) -> bool
where
    S: Service + ?Sized,
{
    let mut start = server.start(&scope);
    let mut invoked = Some(invoked);
    // Report only once start has run up to its first suspension point.
    let result = std::future::poll_fn(|cx| {
        let poll = start.as_mut().poll(cx);
        if let Some(tx) = invoked.take() {
            let _ = tx.send(());
        }
        poll
    })
    .await;
    match result {
        Ok(()) => false,
        Err(e) if e.is_closed() => false,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            scope.cancel();
            true
        }
    }
}
