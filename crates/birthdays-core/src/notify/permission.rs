use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemPermission {
    Undetermined,
    Granted,
    Denied,
}

/// Session-level view of notification permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    /// Not queried yet this session.
    #[default]
    Unknown,
    /// Query in flight.
    Checking,
    Undetermined,
    Granted,
    /// The user must change this in system settings.
    Denied,
}

impl PermissionState {
    /// Whether the platform has answered at least once.
    pub fn is_known(self) -> bool {
        !matches!(self, PermissionState::Unknown | PermissionState::Checking)
    }

    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }

    pub fn can_transition_to(self, next: PermissionState) -> bool {
        use PermissionState::*;
        matches!(
            (self, next),
            (Unknown, Checking)
                | (Checking, Undetermined | Granted | Denied | Unknown)
                | (Undetermined, Checking | Granted | Denied)
                | (Granted, Checking)
        )
    }
}

impl From<SystemPermission> for PermissionState {
    fn from(value: SystemPermission) -> Self {
        match value {
            SystemPermission::Undetermined => PermissionState::Undetermined,
            SystemPermission::Granted => PermissionState::Granted,
            SystemPermission::Denied => PermissionState::Denied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid permission transition: {from:?} → {to:?}")]
pub struct PermissionTransitionError {
    pub from: PermissionState,
    pub to: PermissionState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denied_is_terminal() {
        for next in [
            PermissionState::Unknown,
            PermissionState::Checking,
            PermissionState::Undetermined,
            PermissionState::Granted,
        ] {
            assert!(!PermissionState::Denied.can_transition_to(next));
        }
    }

    #[test]
    fn happy_path_transitions() {
        assert!(PermissionState::Unknown.can_transition_to(PermissionState::Checking));
        assert!(PermissionState::Checking.can_transition_to(PermissionState::Undetermined));
        assert!(PermissionState::Undetermined.can_transition_to(PermissionState::Granted));
        assert!(!PermissionState::Unknown.can_transition_to(PermissionState::Granted));
    }

    #[test]
    fn known_states() {
        assert!(!PermissionState::Unknown.is_known());
        assert!(!PermissionState::Checking.is_known());
        assert!(PermissionState::Denied.is_known());
        assert!(PermissionState::Undetermined.is_known());
    }
}
