//! Player experience and levelling.
//!
//! Boss encounters award experience through [`ExperienceSink`]. Levels raise
//! the player's attack damage and critical chance, applied to an
//! [`AttackProfile`] with [`PlayerProgression::apply_level_stats`].

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attack::AttackProfile;

/// Receives experience rewards from encounters.
pub trait ExperienceSink {
    /// Awards experience for defeating a boss of the given level.
    fn award_boss_experience(&mut self, boss_level: u32);
}

/// Levelling curve and per-level stat growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Experience needed to reach level 2
    pub base_experience_requirement: f32,
    /// Growth factor of the requirement per level
    pub experience_scale: f32,
    /// Experience per boss level
    pub experience_per_boss_level: u32,
    /// Scale damage by a percentage of the level-1 base instead of a flat amount
    pub use_percentage_damage: bool,
    /// Damage gained per level as a fraction of the level-1 base
    pub damage_increase_percent: f32,
    /// Flat damage gained per level
    pub damage_increase_flat: f32,
    /// Critical chance at level 1
    pub base_crit_chance: f32,
    /// Critical chance gained per level
    pub crit_chance_per_level: f32,
    /// Critical chance cap
    pub max_crit_chance: f32,
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            base_experience_requirement: 100.0,
            experience_scale: 1.5,
            experience_per_boss_level: 50,
            use_percentage_damage: true,
            damage_increase_percent: 0.1,
            damage_increase_flat: 5.0,
            base_crit_chance: 0.05,
            crit_chance_per_level: 0.02,
            max_crit_chance: 0.5,
        }
    }
}

impl ProgressionConfig {
    /// Returns a copy with unusable values replaced by their defaults.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        let positive = |label: &str, value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                warn!("progression: {label} {value} replaced by {fallback}");
                fallback
            }
        };
        self.base_experience_requirement = positive(
            "base_experience_requirement",
            self.base_experience_requirement,
            defaults.base_experience_requirement,
        );
        self.experience_scale =
            positive("experience_scale", self.experience_scale, defaults.experience_scale);

        let finite = |label: &str, value: f32, fallback: f32| {
            if value.is_finite() {
                value
            } else {
                warn!("progression: {label} {value} replaced by {fallback}");
                fallback
            }
        };
        self.damage_increase_percent = finite(
            "damage_increase_percent",
            self.damage_increase_percent,
            defaults.damage_increase_percent,
        );
        self.damage_increase_flat = finite(
            "damage_increase_flat",
            self.damage_increase_flat,
            defaults.damage_increase_flat,
        );
        self.base_crit_chance =
            finite("base_crit_chance", self.base_crit_chance, defaults.base_crit_chance);
        self.crit_chance_per_level = finite(
            "crit_chance_per_level",
            self.crit_chance_per_level,
            defaults.crit_chance_per_level,
        );
        self.max_crit_chance =
            finite("max_crit_chance", self.max_crit_chance, defaults.max_crit_chance);
        self
    }
}

/// A level gained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelUp {
    /// New level
    pub level: u32,
    /// Attack damage at the new level
    pub base_damage: f32,
    /// Critical chance at the new level
    pub crit_chance: f32,
}

/// Tracks the player's level and experience.
#[derive(Debug, Clone)]
pub struct PlayerProgression {
    config: ProgressionConfig,
    level: u32,
    experience: u32,
    level_one_damage: f32,
    pending_level_ups: Vec<LevelUp>,
}

impl PlayerProgression {
    /// Starts at level 1 with the given level-1 attack damage.
    #[must_use]
    pub fn new(level_one_damage: f32) -> Self {
        Self::with_config(level_one_damage, ProgressionConfig::default())
    }

    /// Starts at level 1 with a custom curve.
    #[must_use]
    pub fn with_config(level_one_damage: f32, config: ProgressionConfig) -> Self {
        let level_one_damage = if level_one_damage.is_finite() {
            level_one_damage.max(0.0)
        } else {
            0.0
        };
        Self {
            config: config.sanitized(),
            level: 1,
            experience: 0,
            level_one_damage,
            pending_level_ups: Vec::new(),
        }
    }

    /// Experience needed to go from `level - 1` to `level`.
    #[must_use]
    pub fn experience_for_level(&self, level: u32) -> u32 {
        if level <= 1 {
            return 0;
        }
        let exponent = i32::try_from(level - 2).unwrap_or(i32::MAX);
        let required = self.config.base_experience_requirement
            * self.config.experience_scale.powi(exponent);
        if !required.is_finite() {
            return u32::MAX;
        }
        required.round().clamp(1.0, u32::MAX as f32) as u32
    }

    /// Experience needed for the next level.
    #[must_use]
    pub fn experience_to_next_level(&self) -> u32 {
        self.experience_for_level(self.level + 1)
    }

    /// Adds experience, returning every level gained.
    pub fn gain_experience(&mut self, amount: u32) -> Vec<LevelUp> {
        self.experience = self.experience.saturating_add(amount);
        let mut gained = Vec::new();

        loop {
            let needed = self.experience_to_next_level();
            if self.experience < needed {
                break;
            }
            self.experience -= needed;
            self.level += 1;
            let level_up = LevelUp {
                level: self.level,
                base_damage: self.damage_for_level(self.level),
                crit_chance: self.crit_chance_for_level(self.level),
            };
            info!(
                "Level up! Now level {} (damage {:.1}, crit {:.0}%)",
                level_up.level,
                level_up.base_damage,
                level_up.crit_chance * 100.0
            );
            gained.push(level_up);
        }

        self.pending_level_ups.extend_from_slice(&gained);
        gained
    }

    /// Attack damage at `level`.
    #[must_use]
    pub fn damage_for_level(&self, level: u32) -> f32 {
        let levels_gained = level.saturating_sub(1) as f32;
        if self.config.use_percentage_damage {
            self.level_one_damage * (1.0 + self.config.damage_increase_percent * levels_gained)
        } else {
            self.level_one_damage + self.config.damage_increase_flat * levels_gained
        }
    }

    /// Critical chance at `level`.
    #[must_use]
    pub fn crit_chance_for_level(&self, level: u32) -> f32 {
        let levels_gained = level.saturating_sub(1) as f32;
        (self.config.base_crit_chance + self.config.crit_chance_per_level * levels_gained)
            .min(self.config.max_crit_chance)
    }

    /// Pushes the current level's stats into an attack profile.
    pub fn apply_level_stats(&self, profile: &mut AttackProfile) {
        profile.set_base_damage(self.damage_for_level(self.level));
        profile.set_critical_hit_chance(self.crit_chance_for_level(self.level));
    }

    /// Takes level-ups gained since the last call.
    pub fn take_level_ups(&mut self) -> Vec<LevelUp> {
        std::mem::take(&mut self.pending_level_ups)
    }

    /// Returns the current level.
    #[must_use]
    pub const fn level(&self) -> u32 {
        self.level
    }

    /// Returns experience towards the next level.
    #[must_use]
    pub const fn experience(&self) -> u32 {
        self.experience
    }
}

impl ExperienceSink for PlayerProgression {
    fn award_boss_experience(&mut self, boss_level: u32) {
        let amount = self
            .config
            .experience_per_boss_level
            .saturating_mul(boss_level.max(1));
        info!("Boss defeated: +{amount} XP");
        self.gain_experience(amount);
    }
}
