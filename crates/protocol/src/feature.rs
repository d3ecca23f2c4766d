//! # Revision Feature Gate
//!
//! Every piece of protocol behavior that appeared at some revision is listed
//! here as a [`Feature`]. Codecs branch on [`Feature::active`] and never compare
//! revision numbers themselves, so this table is the single place where the
//! protocol's evolution is recorded.
//!
//! Adding a feature means adding one constant (and its [`Feature::ALL`] entry)
//! and threading one conditional through the codec that needs it.

use chwire_core::{ProtocolError, Result, Revision};
use std::fmt;

/// A named unit of protocol behavior, active from a minimum revision on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Feature {
    name: &'static str,
    revision: u64,
}

impl Feature {
    pub const TEMP_TABLES: Feature = Feature::new("TempTables", 50264);
    pub const BLOCK_INFO: Feature = Feature::new("BlockInfo", 51903);
    pub const SERVER_TIMEZONE: Feature = Feature::new("ServerTimezone", 54058);
    pub const QUOTA_KEY_IN_CLIENT_INFO: Feature = Feature::new("QuotaKeyInClientInfo", 54060);
    pub const SERVER_DISPLAY_NAME: Feature = Feature::new("ServerDisplayName", 54372);
    pub const VERSION_PATCH: Feature = Feature::new("VersionPatch", 54401);
    pub const SERVER_LOGS: Feature = Feature::new("ServerLogs", 54406);
    pub const COLUMN_DEFAULTS_METADATA: Feature = Feature::new("ColumnDefaultsMetadata", 54410);
    pub const CLIENT_WRITE_INFO: Feature = Feature::new("ClientWriteInfo", 54420);
    pub const SETTINGS_SERIALIZED_AS_STRINGS: Feature =
        Feature::new("SettingsSerializedAsStrings", 54429);
    pub const INTER_SERVER_SECRET: Feature = Feature::new("InterServerSecret", 54441);
    pub const OPEN_TELEMETRY: Feature = Feature::new("OpenTelemetry", 54442);
    pub const X_FORWARDED_FOR_IN_CLIENT_INFO: Feature =
        Feature::new("XForwardedForInClientInfo", 54443);
    pub const REFERER_IN_CLIENT_INFO: Feature = Feature::new("RefererInClientInfo", 54447);
    pub const DISTRIBUTED_DEPTH: Feature = Feature::new("DistributedDepth", 54448);
    pub const QUERY_START_TIME: Feature = Feature::new("QueryStartTime", 54449);
    pub const PROFILE_EVENTS: Feature = Feature::new("ProfileEvents", 54451);
    pub const PARALLEL_REPLICAS: Feature = Feature::new("ParallelReplicas", 54453);

    /// Every known feature, ordered by minimum revision
    pub const ALL: &'static [Feature] = &[
        Feature::TEMP_TABLES,
        Feature::BLOCK_INFO,
        Feature::SERVER_TIMEZONE,
        Feature::QUOTA_KEY_IN_CLIENT_INFO,
        Feature::SERVER_DISPLAY_NAME,
        Feature::VERSION_PATCH,
        Feature::SERVER_LOGS,
        Feature::COLUMN_DEFAULTS_METADATA,
        Feature::CLIENT_WRITE_INFO,
        Feature::SETTINGS_SERIALIZED_AS_STRINGS,
        Feature::INTER_SERVER_SECRET,
        Feature::OPEN_TELEMETRY,
        Feature::X_FORWARDED_FOR_IN_CLIENT_INFO,
        Feature::REFERER_IN_CLIENT_INFO,
        Feature::DISTRIBUTED_DEPTH,
        Feature::QUERY_START_TIME,
        Feature::PROFILE_EVENTS,
        Feature::PARALLEL_REPLICAS,
    ];

    const fn new(name: &'static str, revision: u64) -> Self {
        Self { name, revision }
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// First revision at which this feature is active
    pub const fn min_revision(&self) -> Revision {
        Revision(self.revision)
    }

    #[inline]
    pub const fn active(&self, revision: Revision) -> bool {
        revision.0 >= self.revision
    }

    /// Fail with `UnsupportedRevision` unless active.
    pub fn require(&self, revision: Revision) -> Result<()> {
        if self.active(revision) {
            Ok(())
        } else {
            Err(ProtocolError::unsupported_revision(revision.0, self.name))
        }
    }

    /// Find a feature by name.
    pub fn lookup(name: &str) -> Option<Feature> {
        Self::ALL.iter().copied().find(|f| f.name == name)
    }

    /// Features active at `revision`.
    pub fn active_at(revision: Revision) -> impl Iterator<Item = Feature> {
        Self::ALL.iter().copied().filter(move |f| f.active(revision))
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (>= {})", self.name, self.revision)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chwire_core::ErrorKind;

    #[test]
    fn test_active_boundary() {
        let f = Feature::INTER_SERVER_SECRET;
        assert!(!f.active(Revision(54440)));
        assert!(f.active(Revision(54441)));
        assert!(f.active(Revision(54442)));
    }

    #[test]
    fn test_table_is_sorted_and_unique() {
        for pair in Feature::ALL.windows(2) {
            assert!(pair[0].min_revision() <= pair[1].min_revision(), "{} after {}", pair[1], pair[0]);
            assert_ne!(pair[0].name(), pair[1].name());
        }
    }

    #[test]
    fn test_latest_covers_every_feature() {
        assert_eq!(Feature::active_at(Revision::LATEST).count(), Feature::ALL.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Feature::lookup("ClientWriteInfo"), Some(Feature::CLIENT_WRITE_INFO));
        assert_eq!(Feature::lookup("NoSuchFeature"), None);
    }

    #[test]
    fn test_require() {
        let err = Feature::SETTINGS_SERIALIZED_AS_STRINGS.require(Revision(54428)).unwrap_err();
        assert_eq!(
            err.kind(),
            &ErrorKind::UnsupportedRevision { revision: 54428, feature: "SettingsSerializedAsStrings" }
        );
        assert!(Feature::SETTINGS_SERIALIZED_AS_STRINGS.require(Revision(54429)).is_ok());
    }
}
