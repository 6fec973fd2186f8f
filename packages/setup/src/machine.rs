//! The location-setup state machine.
//!
//! ```text
//! NotStarted          -> AwaitingPermission             start()
//! AwaitingPermission  -> AwaitingLocation               permission granted
//!                     -> Denied(permission_denied)      denied / permanently denied
//! AwaitingLocation    -> Resolving                      coordinate acquired
//!                     -> Denied(location_unavailable)   timeout / hardware failure
//! Resolving           -> Resolved(result)               resolver returned
//!                     -> Denied(network_error)          store unavailable
//! Denied(*)           -> AwaitingPermission             retry()
//! Resolved | Denied   -> AwaitingPermission             recheck()
//! (any in-progress)   -> NotStarted                     driving future dropped
//! ```
//!
//! Every transition is applied under one lock and tagged with the run that
//! produced it, so a completion belonging to a superseded or disposed run
//! is discarded instead of applied.
//!
//! The run executes inside the future returned by `start`/`retry`/`recheck`.
//! If that future is dropped before the run settles, the run is abandoned
//! and the machine returns to `NotStarted`, ready for another `start()`.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use delivery_zones_location::{
    LocationAcquirer, LocationError, LocationProvider, PermissionOutcome,
};
use delivery_zones_models::{DenialReason, SetupStatus};
use delivery_zones_resolver::ZoneResolver;
use tokio::sync::{broadcast, watch};

use crate::{SessionCache, SetupConfig};

/// Unread transitions a [`SetupStateMachine::subscribe_transitions`]
/// receiver can hold before it starts lagging.
const TRANSITION_BUFFER: usize = 16;

#[derive(Debug, Default)]
struct Control {
    run: u64,
    in_flight: bool,
    disposed: bool,
}

/// Sequences permission, location and zone resolution once per session.
///
/// Owned by whatever hosts the setup screen and shared by reference (or
/// `Arc`) with the UI, which observes [`Self::subscribe`].
pub struct SetupStateMachine {
    acquirer: LocationAcquirer,
    resolver: ZoneResolver,
    cache: Arc<SessionCache>,
    location_timeout: Duration,
    status: watch::Sender<SetupStatus>,
    transitions: broadcast::Sender<SetupStatus>,
    cancel: watch::Sender<bool>,
    control: Mutex<Control>,
}

impl SetupStateMachine {
    /// Creates a machine in [`SetupStatus::NotStarted`].
    #[must_use]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        resolver: ZoneResolver,
        cache: Arc<SessionCache>,
        config: &SetupConfig,
    ) -> Self {
        Self {
            acquirer: LocationAcquirer::new(provider, config.accuracy),
            resolver,
            cache,
            location_timeout: config.location_timeout(),
            status: watch::Sender::new(SetupStatus::NotStarted),
            transitions: broadcast::channel(TRANSITION_BUFFER).0,
            cancel: watch::Sender::new(false),
            control: Mutex::new(Control::default()),
        }
    }

    /// Snapshot of the current status.
    #[must_use]
    pub fn status(&self) -> SetupStatus {
        self.status.borrow().clone()
    }

    /// Receiver of the latest status. Changes that happen between two reads
    /// are coalesced; use [`Self::subscribe_transitions`] to see every step.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SetupStatus> {
        self.status.subscribe()
    }

    /// Receiver of every status this machine enters from now on, in order.
    #[must_use]
    pub fn subscribe_transitions(&self) -> broadcast::Receiver<SetupStatus> {
        self.transitions.subscribe()
    }

    /// The session cache this machine writes to.
    #[must_use]
    pub const fn cache(&self) -> &Arc<SessionCache> {
        &self.cache
    }

    /// Runs the flow if nothing has run yet; otherwise a no-op.
    ///
    /// When the session cache already holds a result (an earlier screen
    /// resolved it), the machine moves straight to `Resolved` with it.
    ///
    /// Returns whether this call moved the machine out of `NotStarted`.
    pub async fn start(&self) -> bool {
        let run = {
            let mut control = self.lock_control();
            if control.disposed {
                log::warn!("start() on a disposed setup session ignored");
                return false;
            }
            if control.in_flight {
                log::warn!("start() rejected: a setup run is already in flight");
                return false;
            }
            if !matches!(*self.status.borrow(), SetupStatus::NotStarted) {
                log::debug!("start() ignored in state {}", self.status.borrow().name());
                return false;
            }

            if let Some(cached) = self.cache.get() {
                log::info!("Reusing session zone result for {}", cached.coordinate());
                self.publish(SetupStatus::Resolved((*cached).clone()));
                return true;
            }

            self.begin(&mut control)
        };

        self.drive(run).await;
        true
    }

    /// Restarts the flow after a denial. Valid only from `Denied`.
    ///
    /// Returns whether a new run was started.
    pub async fn retry(&self) -> bool {
        self.restart("retry", |status| matches!(status, SetupStatus::Denied(_)))
            .await
    }

    /// Re-runs the flow from any terminal state, discarding the cached
    /// result.
    ///
    /// Returns whether a new run was started.
    pub async fn recheck(&self) -> bool {
        self.restart("recheck", SetupStatus::is_terminal).await
    }

    /// Tears the session down: in-flight steps are cancelled, their late
    /// completions dropped, and later calls become no-ops.
    pub fn dispose(&self) {
        let mut control = self.lock_control();
        control.disposed = true;
        control.in_flight = false;
        self.cancel.send_replace(true);
        log::debug!("Setup session disposed in state {}", self.status.borrow().name());
    }

    async fn restart(&self, op: &str, allowed: impl Fn(&SetupStatus) -> bool) -> bool {
        let run = {
            let mut control = self.lock_control();
            if control.disposed {
                log::warn!("{op}() on a disposed setup session ignored");
                return false;
            }
            if control.in_flight {
                log::warn!("{op}() rejected: a setup run is already in flight");
                return false;
            }
            if !allowed(&*self.status.borrow()) {
                log::warn!("{op}() not valid in state {}", self.status.borrow().name());
                return false;
            }

            self.cache.invalidate();
            self.begin(&mut control)
        };

        self.drive(run).await;
        true
    }

    /// Claims a new run and enters `AwaitingPermission`.
    fn begin(&self, control: &mut Control) -> u64 {
        control.run += 1;
        control.in_flight = true;
        let previous = self.publish(SetupStatus::AwaitingPermission);
        log::debug!(
            "Setup run {} started: {} -> awaiting_permission",
            control.run,
            previous.name()
        );
        control.run
    }

    async fn drive(&self, run: u64) {
        let _guard = RunGuard { machine: self, run };

        let Some(permission) = self.cancellable(self.acquirer.request_permission()).await else {
            return;
        };
        if permission != PermissionOutcome::Granted {
            log::info!("Location permission {permission}; setup denied");
            self.transition(run, SetupStatus::Denied(DenialReason::PermissionDenied));
            return;
        }
        if !self.transition(run, SetupStatus::AwaitingLocation) {
            return;
        }

        let Some(location) = self
            .cancellable(self.acquirer.get_current_coordinate(self.location_timeout))
            .await
        else {
            return;
        };
        let coordinate = match location {
            Ok(coordinate) => coordinate,
            Err(LocationError::PermissionDenied) => {
                self.transition(run, SetupStatus::Denied(DenialReason::PermissionDenied));
                return;
            }
            Err(LocationError::Timeout { .. } | LocationError::HardwareUnavailable { .. }) => {
                self.transition(run, SetupStatus::Denied(DenialReason::LocationUnavailable));
                return;
            }
        };
        if !self.transition(run, SetupStatus::Resolving) {
            return;
        }

        let Some(resolution) = self.cancellable(self.resolver.resolve(coordinate)).await else {
            return;
        };
        match resolution {
            Ok(result) => {
                log::info!(
                    "Setup resolved {} -> {}",
                    result.coordinate(),
                    result
                        .matched_zone_id()
                        .map_or_else(|| "no coverage".to_string(), |id| format!("zone {id}"))
                );
                self.transition(run, SetupStatus::Resolved(result));
            }
            Err(e) => {
                log::warn!("Zone lookup failed: {e}");
                self.transition(run, SetupStatus::Denied(DenialReason::NetworkError));
            }
        }
    }

    /// Applies `next` if `run` is still the live run. Reaching `Resolved`
    /// writes the session cache first; reaching any terminal state ends the
    /// run.
    fn transition(&self, run: u64, next: SetupStatus) -> bool {
        let mut control = self.lock_control();
        if control.disposed || control.run != run {
            log::warn!(
                "Discarding stale transition to {} from run {run}",
                next.name()
            );
            return false;
        }

        if let SetupStatus::Resolved(result) = &next {
            self.cache.set(result.clone());
        }
        if next.is_terminal() {
            control.in_flight = false;
        }

        let name = next.name();
        let previous = self.publish(next);
        log::debug!("Setup run {run}: {} -> {name}", previous.name());
        true
    }

    /// Returns a run whose driving future was dropped to `NotStarted`.
    /// No-op once the run has settled, been superseded or been disposed.
    fn abandon(&self, run: u64) {
        let mut control = self.lock_control();
        if control.disposed || control.run != run || !control.in_flight {
            return;
        }

        control.in_flight = false;
        let previous = self.publish(SetupStatus::NotStarted);
        log::warn!(
            "Setup run {run} dropped in state {}; back to not_started",
            previous.name()
        );
    }

    /// Sets the current status and records it for transition subscribers.
    /// Returns the status it replaced.
    fn publish(&self, next: SetupStatus) -> SetupStatus {
        // Err only means nobody is subscribed.
        let _ = self.transitions.send(next.clone());
        self.status.send_replace(next)
    }

    /// Runs `fut` unless the session is disposed first.
    async fn cancellable<F: Future>(&self, fut: F) -> Option<F::Output> {
        let cancelled = wait_cancelled(self.cancel.subscribe());
        tokio::select! {
            biased;
            () = cancelled => {
                log::debug!("Setup step cancelled");
                None
            }
            output = fut => Some(output),
        }
    }

    fn lock_control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Abandons its run when the future driving it is dropped mid-flow.
struct RunGuard<'a> {
    machine: &'a SetupStateMachine,
    run: u64,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.machine.abandon(self.run);
    }
}

async fn wait_cancelled(mut rx: watch::Receiver<bool>) {
    loop {
        let cancelled = *rx.borrow_and_update();
        if cancelled {
            return;
        }
        if rx.changed().await.is_err() {
            return std::future::pending().await;
        }
    }
}
