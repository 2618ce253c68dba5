//! External messaging peers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A resolved endpoint on the messaging backend (for example a bot account).
///
/// `id` is the backend's stable identifier and is what inbound messages are
/// matched against. `name` is the human-facing handle it was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerHandle {
    pub id: String,
    pub name: String,
}

impl PeerHandle {
    /// Creates a peer handle.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PeerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_name_and_id() {
        let peer = PeerHandle::new("7001", "helper_bot");
        assert_eq!(peer.to_string(), "@helper_bot (7001)");
    }
}
