//! Core type definitions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol revision negotiated with a peer
///
/// Revisions only ever add behavior: anything active at revision `n` stays
/// active at every revision above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Revision(pub u64);

impl Revision {
    /// Newest revision whose wire layout this crate fully implements.
    pub const LATEST: Revision = Revision(54453);

    pub const fn get(&self) -> u64 {
        self.0
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::LATEST
    }
}

impl From<u64> for Revision {
    fn from(revision: u64) -> Self {
        Self(revision)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
