//! Registry change events

use serde::{Deserialize, Serialize};

/// Published on the registry's broadcast channel after each change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    /// New name added
    Registered {
        name: String,
        capabilities: Vec<String>,
    },

    /// Existing name overwritten (position kept)
    Replaced {
        name: String,
        capabilities: Vec<String>,
    },

    /// Name removed
    Unregistered { name: String },

    /// Descriptors loaded from a snapshot
    Restored { count: usize },
}

impl RegistryEvent {
    /// 이벤트 대상 이름
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Registered { name, .. }
            | Self::Replaced { name, .. }
            | Self::Unregistered { name } => Some(name),
            Self::Restored { .. } => None,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Registered { .. } => "registered",
            Self::Replaced { .. } => "replaced",
            Self::Unregistered { .. } => "unregistered",
            Self::Restored { .. } => "restored",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tag() {
        let event = RegistryEvent::Unregistered {
            name: "git_service".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "unregistered");
        assert_eq!(event.name(), Some("git_service"));
        assert_eq!(RegistryEvent::Restored { count: 3 }.name(), None);
    }
}
