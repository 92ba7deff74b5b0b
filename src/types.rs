//! Session identity
//!
//! Display names change on `:rename` and are recycled once released, so
//! anything that must follow one connection (room membership, the `You:`
//! echo) keys on `SessionId` instead.

use std::fmt;

use uuid::Uuid;

/// Identity of one connection, fixed for its whole lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Logged as the bare UUID
impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}
