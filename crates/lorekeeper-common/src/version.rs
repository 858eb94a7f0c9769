//! Version types for schema compatibility.

use serde::{Deserialize, Serialize};

use crate::error::{LorekeeperError, LorekeeperResult};

/// Schema version using semantic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current quiz set file version.
    pub const QUIZ_SET: Self = Self::new(1, 0, 0);

    /// Current encounter config version.
    pub const ENCOUNTER_CONFIG: Self = Self::new(1, 0, 0);

    /// Checks if this version can read data from another version.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }

    /// Returns a [`LorekeeperError::VersionMismatch`] if data written with
    /// `data_version` cannot be read.
    pub fn check_readable(&self, data_version: &Self) -> LorekeeperResult<()> {
        if self.can_read(data_version) {
            Ok(())
        } else {
            Err(LorekeeperError::VersionMismatch {
                expected: self.to_string(),
                actual: data_version.to_string(),
            })
        }
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::QUIZ_SET
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
