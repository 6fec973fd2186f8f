//! A [`LocationProvider`] with a fixed device position.
//!
//! Used by the command-line tools and by integration environments with no
//! real GPS (emulators, kiosks). Permission prompts are answered with a
//! preset outcome and remembered, the way the OS remembers a grant.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use delivery_zones_models::Coordinate;

use crate::{Accuracy, LocationError, LocationProvider, PermissionOutcome, PermissionStatus};

/// Reports a fixed coordinate once permission is granted.
pub struct StaticLocationProvider {
    coordinate: Option<Coordinate>,
    prompt_answer: PermissionOutcome,
    status: Mutex<PermissionStatus>,
}

impl StaticLocationProvider {
    /// A device at `coordinate` whose user answers prompts with `prompt_answer`.
    #[must_use]
    pub const fn new(coordinate: Coordinate, prompt_answer: PermissionOutcome) -> Self {
        Self {
            coordinate: Some(coordinate),
            prompt_answer,
            status: Mutex::new(PermissionStatus::Unrequested),
        }
    }

    /// A device with location hardware turned off.
    #[must_use]
    pub const fn without_fix(prompt_answer: PermissionOutcome) -> Self {
        Self {
            coordinate: None,
            prompt_answer,
            status: Mutex::new(PermissionStatus::Unrequested),
        }
    }
}

#[async_trait]
impl LocationProvider for StaticLocationProvider {
    async fn check_permission(&self) -> PermissionStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_permission(&self) -> PermissionOutcome {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = match self.prompt_answer {
            PermissionOutcome::Granted => PermissionStatus::Granted,
            PermissionOutcome::Denied => PermissionStatus::Denied,
            PermissionOutcome::PermanentlyDenied => PermissionStatus::PermanentlyDenied,
        };
        self.prompt_answer
    }

    async fn current_position(&self, _accuracy: Accuracy) -> Result<Coordinate, LocationError> {
        if *self.status.lock().unwrap_or_else(PoisonError::into_inner) != PermissionStatus::Granted {
            return Err(LocationError::PermissionDenied);
        }
        self.coordinate
            .ok_or_else(|| LocationError::HardwareUnavailable {
                message: "location services are turned off".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grant_is_remembered() {
        let here = Coordinate::new(26.1445, 91.7362).unwrap();
        let provider = StaticLocationProvider::new(here, PermissionOutcome::Granted);

        assert_eq!(provider.check_permission().await, PermissionStatus::Unrequested);
        assert_eq!(provider.request_permission().await, PermissionOutcome::Granted);
        assert_eq!(provider.check_permission().await, PermissionStatus::Granted);
        assert_eq!(provider.current_position(Accuracy::High).await, Ok(here));
    }

    #[tokio::test]
    async fn position_requires_grant() {
        let here = Coordinate::new(26.1445, 91.7362).unwrap();
        let provider = StaticLocationProvider::new(here, PermissionOutcome::Denied);

        provider.request_permission().await;
        assert_eq!(
            provider.current_position(Accuracy::High).await,
            Err(LocationError::PermissionDenied)
        );
    }

    #[tokio::test]
    async fn no_fix_without_hardware() {
        let provider = StaticLocationProvider::without_fix(PermissionOutcome::Granted);
        provider.request_permission().await;

        assert!(matches!(
            provider.current_position(Accuracy::Low).await,
            Err(LocationError::HardwareUnavailable { .. })
        ));
    }
}
