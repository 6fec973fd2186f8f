//! Location-setup session status as observed by the UI layer.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::ZoneValidationResult;

/// Why a setup run ended without a resolution.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DenialReason {
    /// The user declined location access (once or permanently).
    PermissionDenied,
    /// GPS timed out or the hardware could not produce a fix.
    LocationUnavailable,
    /// The zone lookup backend could not be reached.
    NetworkError,
}

impl DenialReason {
    /// Message shown on the coverage-unavailable screen for this denial.
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "We need your location to check whether we deliver to you. \
                 Allow location access for this app in your device settings, then try again."
            }
            Self::LocationUnavailable => {
                "We couldn't find your location. Make sure GPS is turned on \
                 and you have a clear signal, then try again."
            }
            Self::NetworkError => {
                "We couldn't check delivery coverage right now. \
                 Please check your connection and try again."
            }
        }
    }
}

/// Message shown when the device is outside every active zone.
pub const NO_COVERAGE_MESSAGE: &str = "We don't deliver to your area yet, \
     but we're expanding quickly. Check back soon!";

/// Where the routing layer sends the user once setup is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Destination {
    /// The main app; the device is inside an active zone.
    Home,
    /// The coverage-unavailable experience.
    CoverageUnavailable,
}

/// State of the location-setup flow for the current app process.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "detail")]
pub enum SetupStatus {
    /// Nothing has run yet in this process.
    #[default]
    NotStarted,
    /// Waiting on the OS permission prompt.
    AwaitingPermission,
    /// Waiting on a GPS fix.
    AwaitingLocation,
    /// Waiting on the zone lookup.
    Resolving,
    /// Resolution finished, covered or not.
    Resolved(ZoneValidationResult),
    /// The flow failed; recoverable through retry.
    Denied(DenialReason),
}

impl SetupStatus {
    /// Whether the flow has finished (`Resolved` or `Denied`).
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved(_) | Self::Denied(_))
    }

    /// Whether a run is currently in progress.
    #[must_use]
    pub const fn is_in_progress(&self) -> bool {
        matches!(
            self,
            Self::AwaitingPermission | Self::AwaitingLocation | Self::Resolving
        )
    }

    /// Routing target for terminal states, `None` while not terminal.
    #[must_use]
    pub const fn destination(&self) -> Option<Destination> {
        match self {
            Self::Resolved(result) if result.is_covered() => Some(Destination::Home),
            Self::Resolved(_) | Self::Denied(_) => Some(Destination::CoverageUnavailable),
            Self::NotStarted | Self::AwaitingPermission | Self::AwaitingLocation | Self::Resolving => {
                None
            }
        }
    }

    /// User-facing message for the coverage-unavailable screen, if any.
    #[must_use]
    pub const fn unavailable_message(&self) -> Option<&'static str> {
        match self {
            Self::Resolved(result) if !result.is_covered() => Some(NO_COVERAGE_MESSAGE),
            Self::Denied(reason) => Some(reason.user_message()),
            _ => None,
        }
    }

    /// Short name of the current state, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::AwaitingPermission => "awaiting_permission",
            Self::AwaitingLocation => "awaiting_location",
            Self::Resolving => "resolving",
            Self::Resolved(_) => "resolved",
            Self::Denied(_) => "denied",
        }
    }
}
