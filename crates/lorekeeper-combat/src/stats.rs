//! Combat stats: health, defense, critical hits.
//!
//! This module provides:
//! - [`CombatEntity`], the per-actor damage/heal model
//! - Timed defense buffs that stack additively and expire independently
//! - Optional natural regeneration after a quiet period
//! - Damaged/healed/death notifications for subscribers
//!
//! Health never leaves `[0, max_health]` and death is a one-way latch: once
//! dead, damage and healing are no-ops until [`CombatEntity::reset`].

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use lorekeeper_common::EntityId;

use crate::events::{CombatNotification, Notifier, Subscription, SubscriptionId};
use crate::timer::Timers;

/// Minimum damage of a hit that goes through defense.
pub const MIN_DAMAGE: f32 = 1.0;

/// Natural health regeneration settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Regeneration {
    /// Health restored per second
    pub rate: f32,
    /// Seconds without damage before regeneration starts
    pub delay: f32,
}

impl Default for Regeneration {
    fn default() -> Self {
        Self {
            rate: 5.0,
            delay: 5.0,
        }
    }
}

/// Serializable starting stats for a combatant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatStatsConfig {
    /// Maximum health
    pub max_health: f32,
    /// Flat damage reduction
    pub defense: f32,
    /// Chance that an incoming hit is critical (0.0-1.0)
    pub crit_chance: f32,
    /// Damage multiplier for critical hits
    pub crit_multiplier: f32,
    /// Natural regeneration, disabled when absent
    pub regeneration: Option<Regeneration>,
}

impl Default for CombatStatsConfig {
    fn default() -> Self {
        Self {
            max_health: 100.0,
            defense: 0.0,
            crit_chance: 0.05,
            crit_multiplier: 2.0,
            regeneration: None,
        }
    }
}

/// Health, defense and critical-hit model for one damageable actor.
#[derive(Debug)]
pub struct CombatEntity {
    id: EntityId,
    max_health: f32,
    health: f32,
    defense: f32,
    crit_chance: f32,
    crit_multiplier: f32,
    dead: bool,
    regeneration: Option<Regeneration>,
    since_last_damage: f32,
    buffs: Timers<f32>,
    rng: fastrand::Rng,
    notifier: Notifier<CombatNotification>,
}

impl CombatEntity {
    /// Creates an entity at full health with default crit settings.
    #[must_use]
    pub fn new(max_health: f32) -> Self {
        let max_health = if max_health.is_finite() {
            max_health.max(1.0)
        } else {
            1.0
        };
        let defaults = CombatStatsConfig::default();
        Self {
            id: EntityId::new(),
            max_health,
            health: max_health,
            defense: defaults.defense,
            crit_chance: defaults.crit_chance,
            crit_multiplier: defaults.crit_multiplier,
            dead: false,
            regeneration: None,
            since_last_damage: f32::INFINITY,
            buffs: Timers::new(),
            rng: fastrand::Rng::new(),
            notifier: Notifier::default(),
        }
    }

    /// Creates an entity from serialized starting stats.
    #[must_use]
    pub fn from_config(config: &CombatStatsConfig) -> Self {
        let mut entity = Self::new(config.max_health)
            .with_defense(config.defense)
            .with_crit_chance(config.crit_chance)
            .with_crit_multiplier(config.crit_multiplier);
        if let Some(regen) = config.regeneration {
            entity = entity.with_regeneration(regen);
        }
        entity
    }

    /// Sets base defense.
    #[must_use]
    pub fn with_defense(mut self, defense: f32) -> Self {
        self.defense = sanitize_non_negative(defense);
        self
    }

    /// Sets the chance that incoming hits are critical.
    #[must_use]
    pub fn with_crit_chance(mut self, chance: f32) -> Self {
        self.set_crit_chance(chance);
        self
    }

    /// Sets the critical hit multiplier.
    #[must_use]
    pub fn with_crit_multiplier(mut self, multiplier: f32) -> Self {
        self.set_crit_multiplier(multiplier);
        self
    }

    /// Enables natural regeneration.
    #[must_use]
    pub fn with_regeneration(mut self, regeneration: Regeneration) -> Self {
        self.regeneration = Some(Regeneration {
            rate: sanitize_non_negative(regeneration.rate),
            delay: sanitize_non_negative(regeneration.delay),
        });
        self
    }

    /// Seeds the critical-hit roll.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    // ========================================================================
    // Damage and healing
    // ========================================================================

    /// Applies a hit and returns the effective damage dealt.
    ///
    /// Returns 0 without side effects if the entity is dead or `base_damage`
    /// is not a positive finite number.
    pub fn take_damage(
        &mut self,
        base_damage: f32,
        ignore_defense: bool,
        guaranteed_crit: bool,
    ) -> f32 {
        if self.dead {
            return 0.0;
        }
        if !base_damage.is_finite() || base_damage <= 0.0 {
            debug!("Ignoring non-positive damage {base_damage} on {}", self.id);
            return 0.0;
        }

        let critical = guaranteed_crit || self.roll_critical();
        let multiplier = if critical { self.crit_multiplier } else { 1.0 };

        let mut effective = base_damage * multiplier;
        if !ignore_defense {
            effective = (effective - self.defense).max(MIN_DAMAGE);
        }

        self.health = (self.health - effective).max(0.0);
        self.since_last_damage = 0.0;

        debug!(
            "{} took {effective:.1} damage (critical: {critical}), health {:.1}/{:.1}",
            self.id, self.health, self.max_health
        );

        self.notifier.publish(&CombatNotification::Damaged {
            entity: self.id,
            amount: effective,
            critical,
            health: self.health,
            max_health: self.max_health,
        });

        if self.health <= 0.0 && !self.dead {
            self.die();
        }

        effective
    }

    /// Restores health and returns the amount actually healed.
    pub fn heal(&mut self, amount: f32) -> f32 {
        if self.dead || !amount.is_finite() || amount <= 0.0 {
            return 0.0;
        }

        let previous = self.health;
        self.health = (self.health + amount).min(self.max_health);
        let healed = self.health - previous;

        if healed > 0.0 {
            self.notifier.publish(&CombatNotification::Healed {
                entity: self.id,
                amount: healed,
                health: self.health,
            });
        }

        healed
    }

    /// Adds `amount` defense for `duration` seconds.
    ///
    /// Overlapping buffs stack and expire independently.
    pub fn apply_defense_buff(&mut self, amount: f32, duration: f32) {
        if !amount.is_finite() || amount <= 0.0 {
            debug!("Ignoring non-positive defense buff {amount} on {}", self.id);
            return;
        }
        self.defense += amount;
        self.buffs.schedule(duration, amount);
        debug!("{} defense buffed by {amount} for {duration}s", self.id);
    }

    /// Advances buff expiry and regeneration by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        for amount in self.buffs.advance(dt) {
            self.defense = (self.defense - amount).max(0.0);
        }

        if self.dead || !dt.is_finite() || dt <= 0.0 {
            return;
        }

        self.since_last_damage += dt;
        if let Some(regen) = self.regeneration {
            if self.since_last_damage >= regen.delay && self.health < self.max_health {
                self.heal(regen.rate * dt);
            }
        }
    }

    /// Restores full health, clears death and active buffs.
    pub fn reset(&mut self) {
        for amount in self.buffs.clear() {
            self.defense = (self.defense - amount).max(0.0);
        }
        self.health = self.max_health;
        self.dead = false;
        self.since_last_damage = f32::INFINITY;
        info!("{} reset to full health", self.id);
    }

    fn roll_critical(&mut self) -> bool {
        self.crit_chance > 0.0 && self.rng.f32() <= self.crit_chance
    }

    fn die(&mut self) {
        self.dead = true;
        info!("{} died", self.id);
        self.notifier.publish(&CombatNotification::Died { entity: self.id });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the entity ID.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Returns current health.
    #[must_use]
    pub const fn health(&self) -> f32 {
        self.health
    }

    /// Returns maximum health.
    #[must_use]
    pub const fn max_health(&self) -> f32 {
        self.max_health
    }

    /// Returns health as a fraction of maximum (0.0-1.0).
    #[must_use]
    pub fn health_fraction(&self) -> f32 {
        self.health / self.max_health
    }

    /// Returns current defense, including active buffs.
    #[must_use]
    pub const fn defense(&self) -> f32 {
        self.defense
    }

    /// Returns the number of active defense buffs.
    #[must_use]
    pub fn active_buffs(&self) -> usize {
        self.buffs.len()
    }

    /// Returns the critical hit chance.
    #[must_use]
    pub const fn crit_chance(&self) -> f32 {
        self.crit_chance
    }

    /// Sets the critical hit chance, clamped to 0.0-1.0.
    pub fn set_crit_chance(&mut self, chance: f32) {
        self.crit_chance = if chance.is_finite() {
            chance.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Returns the critical hit multiplier.
    #[must_use]
    pub const fn crit_multiplier(&self) -> f32 {
        self.crit_multiplier
    }

    /// Sets the critical hit multiplier (at least 1.0).
    pub fn set_crit_multiplier(&mut self, multiplier: f32) {
        self.crit_multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
    }

    /// Checks if the entity is dead.
    #[must_use]
    pub const fn is_dead(&self) -> bool {
        self.dead
    }

    /// Checks if the entity is alive.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        !self.dead
    }

    /// Subscribes to damage, heal and death notifications.
    pub fn subscribe(&mut self) -> Subscription<CombatNotification> {
        self.notifier.subscribe()
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }
}

fn sanitize_non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
