//! Consumable health items.
//!
//! This module provides:
//! - [`HealthItemConfig`]: heal amount, capacity and starting stock
//! - [`HealthItems`]: a capped stack of healing items used on a [`CombatEntity`]
//!
//! Healing goes through [`CombatEntity::heal`], so clamping and heal
//! notifications apply. An item is only spent when it can heal.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::stats::CombatEntity;

/// Serializable health item settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthItemConfig {
    /// Health restored per item
    pub heal_amount: f32,
    /// Maximum items carried
    pub max_items: u32,
    /// Items carried at the start of an encounter
    pub starting_items: u32,
}

impl Default for HealthItemConfig {
    fn default() -> Self {
        Self {
            heal_amount: 20.0,
            max_items: 5,
            starting_items: 2,
        }
    }
}

/// A capped stack of health items.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthItems {
    heal_amount: f32,
    max_items: u32,
    count: u32,
}

impl HealthItems {
    /// Creates a stack with `count` items (capped at `max_items`).
    #[must_use]
    pub fn new(heal_amount: f32, max_items: u32, count: u32) -> Self {
        let heal_amount = if heal_amount.is_finite() {
            heal_amount.max(0.0)
        } else {
            0.0
        };
        Self {
            heal_amount,
            max_items,
            count: count.min(max_items),
        }
    }

    /// Creates a stack holding the configured starting items.
    #[must_use]
    pub fn from_config(config: &HealthItemConfig) -> Self {
        Self::new(config.heal_amount, config.max_items, config.starting_items)
    }

    /// Uses one item on `entity` and returns the health restored.
    ///
    /// Does nothing (and keeps the item) when the stack is empty, the entity
    /// is dead, or its health is already full.
    pub fn use_health_item(&mut self, entity: &mut CombatEntity) -> f32 {
        if self.count == 0 {
            debug!("No health items available");
            return 0.0;
        }
        if entity.is_dead() || entity.health() >= entity.max_health() {
            debug!("{} cannot use a health item now", entity.id());
            return 0.0;
        }

        let healed = entity.heal(self.heal_amount);
        if healed > 0.0 {
            self.count -= 1;
            info!("{} used a health item (+{healed:.1}), {} left", entity.id(), self.count);
        }
        healed
    }

    /// Adds items up to the cap and returns the new count.
    pub fn add_health_items(&mut self, amount: u32) -> u32 {
        self.count = self.count.saturating_add(amount).min(self.max_items);
        debug!("Added {amount} health item(s), now {}", self.count);
        self.count
    }

    /// Returns the number of items carried.
    #[must_use]
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Returns the item cap.
    #[must_use]
    pub const fn max_items(&self) -> u32 {
        self.max_items
    }

    /// Returns the health restored per item.
    #[must_use]
    pub const fn heal_amount(&self) -> f32 {
        self.heal_amount
    }
}

impl Default for HealthItems {
    fn default() -> Self {
        Self::from_config(&HealthItemConfig::default())
    }
}
