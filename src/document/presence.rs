//! Presence (awareness) source.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Display metadata of the local user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceUser {
    pub name: String,
    pub color: String,
}

/// Local awareness state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceState {
    pub user: PresenceUser,
}

/// Source of the local user's presence. Read once per recorded delta.
pub trait PresenceSource: Send + Sync {
    fn local_state(&self) -> Option<PresenceState>;
}

/// Presence that holds a single, replaceable state.
#[derive(Debug, Default)]
pub struct StaticPresence {
    state: RwLock<Option<PresenceState>>,
}

impl StaticPresence {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            state: RwLock::new(Some(PresenceState {
                user: PresenceUser {
                    name: name.into(),
                    color: color.into(),
                },
            })),
        }
    }

    /// Presence with no local state.
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn set(&self, state: Option<PresenceState>) {
        *self.state.write() = state;
    }

    pub fn set_name(&self, name: impl Into<String>) {
        let mut state = self.state.write();
        match state.as_mut() {
            Some(current) => current.user.name = name.into(),
            None => {
                *state = Some(PresenceState {
                    user: PresenceUser {
                        name: name.into(),
                        color: String::new(),
                    },
                })
            }
        }
    }
}

impl PresenceSource for StaticPresence {
    fn local_state(&self) -> Option<PresenceState> {
        self.state.read().clone()
    }
}
