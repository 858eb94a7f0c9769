//! # Lorekeeper Common
//!
//! Common types, utilities, and shared abstractions for Lorekeeper.
//!
//! This crate provides foundational types used across all Lorekeeper crates:
//! - ID types (EntityId)
//! - Factions and faction masks for target filtering
//! - Version information for content schemas
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_generation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
        assert!(id2 > id1);
        assert_ne!(id1.to_string(), id2.to_string());
    }

    #[test]
    fn test_faction_mask_filtering() {
        let hostile_to_player = FactionMask::of(Faction::Boss).with(Faction::Enemy);
        assert!(hostile_to_player.contains(Faction::Boss));
        assert!(hostile_to_player.contains(Faction::Enemy));
        assert!(!hostile_to_player.contains(Faction::Player));
        assert!(FactionMask::ALL.contains(Faction::Neutral));
        assert_eq!(FactionMask::default(), FactionMask::ALL);
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let v2 = SchemaVersion::new(1, 1, 0);
        let v3 = SchemaVersion::new(2, 0, 0);

        // Same major version reads both ways
        assert!(v2.can_read(&v1));
        assert!(v1.can_read(&v2));
        // Different major versions are incompatible
        assert!(!v1.can_read(&v3));
        assert!(v1.check_readable(&v3).is_err());
        assert_eq!(v2.to_string(), "1.1.0");
    }

    #[test]
    fn test_version_check_reports_mismatch() {
        let result = SchemaVersion::QUIZ_SET.check_readable(&SchemaVersion::new(9, 0, 0));
        match result {
            Err(LorekeeperError::VersionMismatch { expected, actual }) => {
                assert_eq!(expected, SchemaVersion::QUIZ_SET.to_string());
                assert_eq!(actual, "9.0.0");
            },
            other => panic!("expected version mismatch, got {other:?}"),
        }
        assert!(SchemaVersion::QUIZ_SET
            .check_readable(&SchemaVersion::QUIZ_SET)
            .is_ok());
    }
}
