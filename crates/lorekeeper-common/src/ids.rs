//! ID types for combatants and factions.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for entity IDs.
static ENTITY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for an entity in an encounter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new unique entity ID.
    #[must_use]
    pub fn new() -> Self {
        Self(ENTITY_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allegiance of a combatant, used by spatial queries to pre-filter targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Faction {
    /// The player character
    Player,
    /// A boss opponent
    Boss,
    /// A regular hostile creature
    Enemy,
    /// No allegiance
    #[default]
    Neutral,
}

impl Faction {
    /// Bit used by [`FactionMask`] for this faction.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Player => 1 << 0,
            Self::Boss => 1 << 1,
            Self::Enemy => 1 << 2,
            Self::Neutral => 1 << 3,
        }
    }

    /// Returns the display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Player => "Player",
            Self::Boss => "Boss",
            Self::Enemy => "Enemy",
            Self::Neutral => "Neutral",
        }
    }
}

/// Set of factions an attack is allowed to hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FactionMask(u8);

impl FactionMask {
    /// Matches every faction.
    pub const ALL: Self = Self(0b1111);

    /// Mask containing a single faction.
    #[must_use]
    pub const fn of(faction: Faction) -> Self {
        Self(faction.bit())
    }

    /// Adds a faction to the mask.
    #[must_use]
    pub const fn with(self, faction: Faction) -> Self {
        Self(self.0 | faction.bit())
    }

    /// Checks if the mask contains a faction.
    #[must_use]
    pub const fn contains(self, faction: Faction) -> bool {
        self.0 & faction.bit() != 0
    }
}

impl Default for FactionMask {
    fn default() -> Self {
        Self::ALL
    }
}
