//! Cooldown-gated area attacks.
//!
//! This module provides:
//! - [`AttackProfile`]: basic and optional special attack for one combatant
//! - Independent cooldown timers for each attack
//! - Area targeting through [`SpatialQuery`] with distance re-validation
//! - Progression hooks (`set_base_damage`, `set_critical_hit_chance`)

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use lorekeeper_common::{EntityId, FactionMask};

use crate::arena::{CombatantStore, SpatialQuery};
use crate::timer::Timers;

/// Attack error types.
///
/// Returned by the `check_*` queries and
/// [`Arena::perform_attack`](crate::arena::Arena::perform_attack); the attack
/// operations themselves treat these cases as no-ops.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CombatError {
    /// Attack on cooldown
    #[error("attack on cooldown: {remaining}s remaining")]
    OnCooldown {
        /// Time remaining in seconds
        remaining: f32,
    },
    /// Special attack not enabled
    #[error("special attack disabled")]
    SpecialDisabled,
    /// Attacker is dead
    #[error("entity is dead: {0}")]
    Dead(EntityId),
    /// Entity or its attack profile not found
    #[error("entity not found: {0}")]
    MissingEntity(EntityId),
}

/// Result type for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;

/// Special attack settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialAttackConfig {
    /// Whether the special attack is available
    pub enabled: bool,
    /// Damage dealt (ignores defense, always critical)
    pub damage: f32,
    /// Cooldown in seconds
    pub cooldown: f32,
}

impl Default for SpecialAttackConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            damage: 25.0,
            cooldown: 5.0,
        }
    }
}

/// Serializable attack settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttackConfig {
    /// Damage of the basic attack
    pub base_damage: f32,
    /// Basic attack cooldown in seconds
    pub cooldown: f32,
    /// Attack radius around the anchor point
    pub range: f32,
    /// Attacker's critical chance for strikes resolved outside real-time combat
    pub crit_chance: f32,
    /// Attacker's critical multiplier
    pub crit_multiplier: f32,
    /// Special attack
    pub special: SpecialAttackConfig,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            base_damage: 10.0,
            cooldown: 1.5,
            range: 1.5,
            crit_chance: 0.05,
            crit_multiplier: 2.0,
            special: SpecialAttackConfig::default(),
        }
    }
}

/// Which attack a cooldown belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttackKind {
    /// Basic attack
    Basic,
    /// Special attack
    Special,
}

/// One target hit by an attack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Target entity
    pub target: EntityId,
    /// Effective damage applied
    pub damage: f32,
    /// Distance from the anchor point
    pub distance: f32,
}

/// Result of an executed attack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackReport {
    /// Which attack was executed
    pub kind: AttackKind,
    /// Targets that took damage
    pub hits: Vec<Hit>,
    /// Candidates discarded by the distance check
    pub rejected: usize,
}

impl AttackReport {
    /// Total damage dealt to all targets.
    #[must_use]
    pub fn total_damage(&self) -> f32 {
        self.hits.iter().map(|h| h.damage).sum()
    }
}

/// Offensive capability of one combatant.
#[derive(Debug, Clone)]
pub struct AttackProfile {
    base_damage: f32,
    cooldown: f32,
    range: f32,
    crit_chance: f32,
    crit_multiplier: f32,
    special_enabled: bool,
    special_damage: f32,
    special_cooldown: f32,
    damage_multiplier: f32,
    targets: FactionMask,
    cooldowns: Timers<AttackKind>,
}

impl Default for AttackProfile {
    fn default() -> Self {
        Self::from_config(&AttackConfig::default())
    }
}

impl AttackProfile {
    /// Creates a profile from settings.
    #[must_use]
    pub fn from_config(config: &AttackConfig) -> Self {
        let mut profile = Self {
            base_damage: non_negative(config.base_damage),
            cooldown: non_negative(config.cooldown),
            range: non_negative(config.range),
            crit_chance: 0.0,
            crit_multiplier: 1.0,
            special_enabled: config.special.enabled,
            special_damage: non_negative(config.special.damage),
            special_cooldown: non_negative(config.special.cooldown),
            damage_multiplier: 1.0,
            targets: FactionMask::ALL,
            cooldowns: Timers::new(),
        };
        profile.set_critical_hit_chance(config.crit_chance);
        profile.crit_multiplier = config.crit_multiplier.max(1.0);
        profile
    }

    /// Restricts which factions the spatial query may return.
    #[must_use]
    pub fn with_targets(mut self, targets: FactionMask) -> Self {
        self.targets = targets;
        self
    }

    /// Enables the special attack.
    #[must_use]
    pub fn with_special(mut self, damage: f32, cooldown: f32) -> Self {
        self.special_enabled = true;
        self.special_damage = non_negative(damage);
        self.special_cooldown = non_negative(cooldown);
        self
    }

    // ========================================================================
    // Attacks
    // ========================================================================

    /// Performs the basic attack around `anchor`.
    ///
    /// Returns `None` without side effects while on cooldown.
    pub fn attack<W>(&mut self, anchor: Vec2, world: &mut W) -> Option<AttackReport>
    where
        W: SpatialQuery + CombatantStore + ?Sized,
    {
        if let Err(e) = self.check_attack() {
            trace!("Attack skipped: {e}");
            return None;
        }
        Some(self.execute(AttackKind::Basic, anchor, world))
    }

    /// Performs the special attack around `anchor`.
    ///
    /// Returns `None` without side effects if disabled or on cooldown.
    pub fn special_attack<W>(&mut self, anchor: Vec2, world: &mut W) -> Option<AttackReport>
    where
        W: SpatialQuery + CombatantStore + ?Sized,
    {
        if let Err(e) = self.check_special_attack() {
            trace!("Special attack skipped: {e}");
            return None;
        }
        Some(self.execute(AttackKind::Special, anchor, world))
    }

    /// Executes an attack without checking cooldowns, then starts its cooldown.
    pub(crate) fn execute<W>(
        &mut self,
        kind: AttackKind,
        anchor: Vec2,
        world: &mut W,
    ) -> AttackReport
    where
        W: SpatialQuery + CombatantStore + ?Sized,
    {
        let (damage, ignore_defense, guaranteed_crit, cooldown) = match kind {
            AttackKind::Basic => (self.damage(), false, false, self.cooldown),
            AttackKind::Special => (self.special_damage(), true, true, self.special_cooldown),
        };

        let mut hits = Vec::new();
        let mut rejected = 0;

        for target in world.find_entities_with_combat_stats(anchor, self.range, self.targets) {
            let Some(position) = world.position_of(target) else {
                rejected += 1;
                continue;
            };

            // The broad phase may over-report.
            let distance = anchor.distance(position);
            if distance > self.range {
                rejected += 1;
                continue;
            }

            let Some(entity) = world.combatant_mut(target) else {
                continue;
            };
            if entity.is_dead() {
                continue;
            }

            let dealt = entity.take_damage(damage, ignore_defense, guaranteed_crit);
            hits.push(Hit {
                target,
                damage: dealt,
                distance,
            });
        }

        self.cooldowns.schedule(cooldown, kind);

        debug!(
            "{kind:?} attack at ({:.1}, {:.1}) hit {} target(s), {rejected} rejected",
            anchor.x,
            anchor.y,
            hits.len()
        );

        AttackReport {
            kind,
            hits,
            rejected,
        }
    }

    /// Advances cooldown timers.
    pub fn tick(&mut self, dt: f32) {
        self.cooldowns.advance(dt);
    }

    /// Checks whether the basic attack can execute now.
    pub fn check_attack(&self) -> CombatResult<()> {
        match self.cooldown_remaining(AttackKind::Basic) {
            Some(remaining) => Err(CombatError::OnCooldown { remaining }),
            None => Ok(()),
        }
    }

    /// Checks whether the special attack can execute now.
    pub fn check_special_attack(&self) -> CombatResult<()> {
        if !self.special_enabled {
            return Err(CombatError::SpecialDisabled);
        }
        match self.cooldown_remaining(AttackKind::Special) {
            Some(remaining) => Err(CombatError::OnCooldown { remaining }),
            None => Ok(()),
        }
    }

    /// Checks if the basic attack is off cooldown.
    #[must_use]
    pub fn can_attack(&self) -> bool {
        self.check_attack().is_ok()
    }

    /// Checks if the special attack is enabled and off cooldown.
    #[must_use]
    pub fn can_special_attack(&self) -> bool {
        self.check_special_attack().is_ok()
    }

    /// Returns the time left on a cooldown, if it is counting down.
    #[must_use]
    pub fn cooldown_remaining(&self, kind: AttackKind) -> Option<f32> {
        self.cooldowns
            .entries()
            .filter(|(k, _)| **k == kind)
            .map(|(_, remaining)| remaining)
            .reduce(f32::max)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Sets base damage; special damage becomes twice the base.
    pub fn set_base_damage(&mut self, damage: f32) {
        self.base_damage = non_negative(damage);
        self.special_damage = self.base_damage * 2.0;
    }

    /// Sets the attacker's critical hit chance, clamped to 0.0-1.0.
    pub fn set_critical_hit_chance(&mut self, chance: f32) {
        self.crit_chance = if chance.is_finite() {
            chance.clamp(0.0, 1.0)
        } else {
            0.0
        };
    }

    /// Sets the outgoing damage multiplier (phase scaling).
    pub fn set_damage_multiplier(&mut self, multiplier: f32) {
        self.damage_multiplier = non_negative(multiplier);
    }

    /// Returns the configured base damage, before multipliers.
    #[must_use]
    pub const fn base_damage(&self) -> f32 {
        self.base_damage
    }

    /// Returns basic attack damage including the damage multiplier.
    #[must_use]
    pub fn damage(&self) -> f32 {
        self.base_damage * self.damage_multiplier
    }

    /// Returns special attack damage including the damage multiplier.
    #[must_use]
    pub fn special_damage(&self) -> f32 {
        self.special_damage * self.damage_multiplier
    }

    /// Returns the damage multiplier.
    #[must_use]
    pub const fn damage_multiplier(&self) -> f32 {
        self.damage_multiplier
    }

    /// Returns the attack range.
    #[must_use]
    pub const fn range(&self) -> f32 {
        self.range
    }

    /// Returns the attacker's critical hit chance.
    #[must_use]
    pub const fn crit_chance(&self) -> f32 {
        self.crit_chance
    }

    /// Returns the attacker's critical hit multiplier.
    #[must_use]
    pub const fn crit_multiplier(&self) -> f32 {
        self.crit_multiplier
    }

    /// Checks if the special attack is enabled.
    #[must_use]
    pub const fn special_enabled(&self) -> bool {
        self.special_enabled
    }

    /// Returns the factions this profile targets.
    #[must_use]
    pub const fn targets(&self) -> FactionMask {
        self.targets
    }
}

fn non_negative(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}
