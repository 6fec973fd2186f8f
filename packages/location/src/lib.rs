#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Device location acquisition.
//!
//! A platform integration implements [`LocationProvider`] over the OS
//! permission and GPS APIs. [`LocationAcquirer`] drives one acquisition at a
//! time through the permission lifecycle and bounds the GPS fix with a
//! caller-supplied timeout:
//!
//! ```text
//! Unrequested -> Granted | Denied | PermanentlyDenied
//! Granted     -> Fetching -> Success | TimedOut | HardwareUnavailable | PermissionRevoked
//! ```

pub mod provider;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use delivery_zones_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

pub use provider::StaticLocationProvider;

/// Answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PermissionOutcome {
    /// Location access allowed.
    Granted,
    /// Declined; the OS may prompt again later.
    Denied,
    /// Declined with "don't ask again"; only the settings screen can undo it.
    PermanentlyDenied,
}

/// Current permission as reported by the OS, before any prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum PermissionStatus {
    /// Never asked in this install.
    Unrequested,
    /// Location access allowed.
    Granted,
    /// Declined; asking again will prompt.
    Denied,
    /// Declined permanently; asking again will not prompt.
    PermanentlyDenied,
}

/// Requested GPS accuracy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Accuracy {
    /// City-block level, cheapest on battery.
    Low,
    /// Roughly 100 m.
    Balanced,
    /// Best the GPS can give within the timeout.
    #[default]
    High,
}

/// Failures while obtaining a coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// No fix arrived within the timeout budget.
    #[error("No location fix within {timeout:?}")]
    Timeout {
        /// The budget that was exceeded.
        timeout: Duration,
    },

    /// GPS disabled, no signal, or no location hardware.
    #[error("Location hardware unavailable: {message}")]
    HardwareUnavailable {
        /// Platform-provided detail.
        message: String,
    },

    /// Permission was missing or revoked between check and fetch.
    #[error("Location permission denied")]
    PermissionDenied,
}

/// OS location services.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Reads the current permission without prompting.
    async fn check_permission(&self) -> PermissionStatus;

    /// Shows the OS permission prompt and returns the user's answer.
    async fn request_permission(&self) -> PermissionOutcome;

    /// Produces a single GPS fix.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::HardwareUnavailable`] when no fix can be
    /// produced, or [`LocationError::PermissionDenied`] when permission was
    /// revoked.
    async fn current_position(&self, accuracy: Accuracy) -> Result<Coordinate, LocationError>;
}

/// Progress of the current acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AcquisitionState {
    /// Permission not yet requested in this attempt.
    Unrequested,
    /// Permission granted, no fetch yet.
    Granted,
    /// Permission declined.
    Denied,
    /// Permission permanently declined.
    PermanentlyDenied,
    /// Waiting on the GPS.
    Fetching,
    /// A fix was obtained.
    Success(Coordinate),
    /// The timeout elapsed before a fix.
    TimedOut,
    /// The GPS could not produce a fix.
    HardwareUnavailable,
    /// Permission disappeared while fetching.
    PermissionRevoked,
}

/// Drives permission and GPS fix acquisition against a [`LocationProvider`].
pub struct LocationAcquirer {
    provider: Arc<dyn LocationProvider>,
    accuracy: Accuracy,
    state: Mutex<AcquisitionState>,
}

impl LocationAcquirer {
    /// Creates an acquirer requesting fixes at `accuracy`.
    #[must_use]
    pub fn new(provider: Arc<dyn LocationProvider>, accuracy: Accuracy) -> Self {
        Self {
            provider,
            accuracy,
            state: Mutex::new(AcquisitionState::Unrequested),
        }
    }

    /// State of the current attempt.
    #[must_use]
    pub fn state(&self) -> AcquisitionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: AcquisitionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Starts a new attempt and resolves the location permission.
    ///
    /// An existing grant or permanent denial is returned without showing
    /// the OS prompt; otherwise the user is asked.
    pub async fn request_permission(&self) -> PermissionOutcome {
        self.set_state(AcquisitionState::Unrequested);

        let outcome = match self.provider.check_permission().await {
            PermissionStatus::Granted => PermissionOutcome::Granted,
            PermissionStatus::PermanentlyDenied => PermissionOutcome::PermanentlyDenied,
            PermissionStatus::Unrequested | PermissionStatus::Denied => {
                log::debug!("Prompting for location permission");
                self.provider.request_permission().await
            }
        };

        self.set_state(match outcome {
            PermissionOutcome::Granted => AcquisitionState::Granted,
            PermissionOutcome::Denied => AcquisitionState::Denied,
            PermissionOutcome::PermanentlyDenied => AcquisitionState::PermanentlyDenied,
        });
        log::debug!("Location permission: {outcome}");

        outcome
    }

    /// Fetches the device coordinate, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// * [`LocationError::PermissionDenied`] if permission was not granted
    ///   in this attempt or was revoked during the fetch
    /// * [`LocationError::Timeout`] if no fix arrived within `timeout`
    /// * [`LocationError::HardwareUnavailable`] if the GPS failed
    pub async fn get_current_coordinate(
        &self,
        timeout: Duration,
    ) -> Result<Coordinate, LocationError> {
        if self.state() != AcquisitionState::Granted {
            log::warn!("Location fetch attempted without a permission grant");
            return Err(LocationError::PermissionDenied);
        }

        self.set_state(AcquisitionState::Fetching);

        let result = tokio::time::timeout(timeout, self.provider.current_position(self.accuracy))
            .await
            .unwrap_or(Err(LocationError::Timeout { timeout }));

        self.set_state(match &result {
            Ok(coordinate) => AcquisitionState::Success(*coordinate),
            Err(LocationError::Timeout { .. }) => AcquisitionState::TimedOut,
            Err(LocationError::HardwareUnavailable { .. }) => AcquisitionState::HardwareUnavailable,
            Err(LocationError::PermissionDenied) => AcquisitionState::PermissionRevoked,
        });

        match &result {
            Ok(coordinate) => log::debug!("Location fix at {coordinate}"),
            Err(e) => log::warn!("Location fetch failed: {e}"),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct ScriptedProvider {
        status: PermissionStatus,
        answer: PermissionOutcome,
        position: Option<Result<Coordinate, LocationError>>,
        prompts: AtomicUsize,
        fetches: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(
            status: PermissionStatus,
            answer: PermissionOutcome,
            position: Option<Result<Coordinate, LocationError>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                status,
                answer,
                position,
                prompts: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LocationProvider for ScriptedProvider {
        async fn check_permission(&self) -> PermissionStatus {
            self.status
        }

        async fn request_permission(&self) -> PermissionOutcome {
            self.prompts.fetch_add(1, Ordering::SeqCst);
            self.answer
        }

        async fn current_position(&self, _accuracy: Accuracy) -> Result<Coordinate, LocationError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &self.position {
                Some(result) => result.clone(),
                None => std::future::pending().await,
            }
        }
    }

    fn guwahati() -> Coordinate {
        Coordinate::new(26.1445, 91.7362).unwrap()
    }

    fn acquirer(provider: &Arc<ScriptedProvider>) -> LocationAcquirer {
        LocationAcquirer::new(Arc::clone(provider) as Arc<dyn LocationProvider>, Accuracy::High)
    }

    #[tokio::test]
    async fn existing_grant_skips_prompt() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Granted,
            PermissionOutcome::Denied,
            Some(Ok(guwahati())),
        );
        let acquirer = acquirer(&provider);

        assert_eq!(acquirer.request_permission().await, PermissionOutcome::Granted);
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(acquirer.state(), AcquisitionState::Granted);
    }

    #[tokio::test]
    async fn unrequested_permission_prompts_once() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Unrequested,
            PermissionOutcome::Granted,
            Some(Ok(guwahati())),
        );
        let acquirer = acquirer(&provider);

        assert_eq!(acquirer.request_permission().await, PermissionOutcome::Granted);
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_denial_does_not_prompt() {
        let provider = ScriptedProvider::new(
            PermissionStatus::PermanentlyDenied,
            PermissionOutcome::Granted,
            None,
        );
        let acquirer = acquirer(&provider);

        assert_eq!(
            acquirer.request_permission().await,
            PermissionOutcome::PermanentlyDenied
        );
        assert_eq!(provider.prompts.load(Ordering::SeqCst), 0);
        assert_eq!(acquirer.state(), AcquisitionState::PermanentlyDenied);
    }

    #[tokio::test]
    async fn fetch_without_grant_is_permission_denied() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Denied,
            PermissionOutcome::Denied,
            Some(Ok(guwahati())),
        );
        let acquirer = acquirer(&provider);

        assert_eq!(acquirer.request_permission().await, PermissionOutcome::Denied);
        assert_eq!(
            acquirer.get_current_coordinate(Duration::from_secs(10)).await,
            Err(LocationError::PermissionDenied)
        );
        assert_eq!(provider.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn successful_fix() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Granted,
            PermissionOutcome::Granted,
            Some(Ok(guwahati())),
        );
        let acquirer = acquirer(&provider);
        acquirer.request_permission().await;

        let coordinate = acquirer
            .get_current_coordinate(Duration::from_secs(10))
            .await
            .unwrap();

        assert_eq!(coordinate, guwahati());
        assert_eq!(acquirer.state(), AcquisitionState::Success(guwahati()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fix_times_out() {
        let provider =
            ScriptedProvider::new(PermissionStatus::Granted, PermissionOutcome::Granted, None);
        let acquirer = acquirer(&provider);
        acquirer.request_permission().await;

        let timeout = Duration::from_secs(12);
        assert_eq!(
            acquirer.get_current_coordinate(timeout).await,
            Err(LocationError::Timeout { timeout })
        );
        assert_eq!(acquirer.state(), AcquisitionState::TimedOut);
    }

    #[tokio::test]
    async fn hardware_failure_is_reported() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Granted,
            PermissionOutcome::Granted,
            Some(Err(LocationError::HardwareUnavailable {
                message: "GPS disabled".to_string(),
            })),
        );
        let acquirer = acquirer(&provider);
        acquirer.request_permission().await;

        let err = acquirer
            .get_current_coordinate(Duration::from_secs(10))
            .await
            .unwrap_err();

        assert!(matches!(err, LocationError::HardwareUnavailable { .. }));
        assert_eq!(acquirer.state(), AcquisitionState::HardwareUnavailable);
    }

    #[tokio::test]
    async fn revoked_permission_during_fetch() {
        let provider = ScriptedProvider::new(
            PermissionStatus::Granted,
            PermissionOutcome::Granted,
            Some(Err(LocationError::PermissionDenied)),
        );
        let acquirer = acquirer(&provider);
        acquirer.request_permission().await;

        assert_eq!(
            acquirer.get_current_coordinate(Duration::from_secs(10)).await,
            Err(LocationError::PermissionDenied)
        );
        assert_eq!(acquirer.state(), AcquisitionState::PermissionRevoked);
    }
}
