//! Encounter configuration.
//!
//! Static per-encounter settings loaded from TOML. Every section uses
//! `#[serde(default)]`, so a partial file only overrides what it names.
//! Values are sanitised after loading; each correction is logged.

use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use lorekeeper_common::{ContentError, LorekeeperResult, SchemaVersion};

use crate::attack::{AttackConfig, SpecialAttackConfig};
use crate::consumables::HealthItemConfig;
use crate::stats::CombatStatsConfig;

/// Boss behaviour and phase ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossConfig {
    /// Display name
    pub name: String,
    /// Number of phases (at most `num_phases - 1` transitions)
    pub num_phases: usize,
    /// Health fractions that trigger the next phase, descending
    pub phase_health_thresholds: Vec<f32>,
    /// Outgoing damage multiplier per phase
    pub phase_damage_multipliers: Vec<f32>,
    /// Movement speed multiplier per phase
    pub phase_speed_multipliers: Vec<f32>,
    /// Distance at which the boss notices the player
    pub detection_radius: f32,
    /// Distance at which the boss starts attacking
    pub attack_range: f32,
    /// Extra distance before an attacking boss resumes chasing
    pub attack_hysteresis: f32,
    /// Base movement speed
    pub move_speed: f32,
    /// Stun duration when changing phase, in seconds
    pub phase_stun_duration: f32,
    /// First phase index that may use the special attack
    pub special_attack_min_phase: usize,
    /// Chance per attack to use the special attack once unlocked
    pub special_attack_chance: f32,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            name: "Boss".to_string(),
            num_phases: 3,
            phase_health_thresholds: vec![0.75, 0.5, 0.25],
            phase_damage_multipliers: vec![1.0, 1.2, 1.5],
            phase_speed_multipliers: vec![1.0, 1.15, 1.3],
            detection_radius: 8.0,
            attack_range: 2.0,
            attack_hysteresis: 0.5,
            move_speed: 3.0,
            phase_stun_duration: 2.0,
            special_attack_min_phase: 2,
            special_attack_chance: 0.3,
        }
    }
}

impl BossConfig {
    /// Returns the last valid phase index.
    #[must_use]
    pub fn last_phase(&self) -> usize {
        self.num_phases.saturating_sub(1)
    }

    /// Returns the health fraction that ends `phase`, if any.
    #[must_use]
    pub fn threshold(&self, phase: usize) -> Option<f32> {
        self.phase_health_thresholds.get(phase).copied()
    }

    /// Returns the damage multiplier for `phase` (1.0 if unset).
    #[must_use]
    pub fn damage_multiplier(&self, phase: usize) -> f32 {
        self.phase_damage_multipliers.get(phase).copied().unwrap_or(1.0)
    }

    /// Returns the speed multiplier for `phase` (1.0 if unset).
    #[must_use]
    pub fn speed_multiplier(&self, phase: usize) -> f32 {
        self.phase_speed_multipliers.get(phase).copied().unwrap_or(1.0)
    }

    /// Returns a copy with out-of-range values corrected.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        if self.num_phases == 0 {
            warn!("Boss '{}': num_phases must be at least 1", self.name);
            self.num_phases = 1;
        }

        let before = self.phase_health_thresholds.len();
        self.phase_health_thresholds.retain(|t| t.is_finite() && *t > 0.0 && *t < 1.0);
        if self.phase_health_thresholds.len() != before {
            warn!("Boss '{}': dropped thresholds outside (0, 1)", self.name);
        }
        if !self
            .phase_health_thresholds
            .windows(2)
            .all(|w| w[0] >= w[1])
        {
            warn!("Boss '{}': phase thresholds were not descending", self.name);
            self.phase_health_thresholds.sort_by(|a, b| b.total_cmp(a));
        }

        let name = self.name.clone();
        let num_phases = self.num_phases;
        sanitize_multipliers(&name, "damage", &mut self.phase_damage_multipliers, num_phases);
        sanitize_multipliers(&name, "speed", &mut self.phase_speed_multipliers, num_phases);

        self.detection_radius = non_negative(&name, "detection_radius", self.detection_radius);
        self.attack_range = non_negative(&name, "attack_range", self.attack_range);
        self.attack_hysteresis = non_negative(&name, "attack_hysteresis", self.attack_hysteresis);
        self.move_speed = non_negative(&name, "move_speed", self.move_speed);
        self.phase_stun_duration =
            non_negative(&name, "phase_stun_duration", self.phase_stun_duration);
        self.special_attack_chance =
            unit_interval(&name, "special_attack_chance", self.special_attack_chance);
        self
    }
}

/// Quiz battle settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizConfig {
    /// Whether this boss uses a quiz battle
    pub enabled: bool,
    /// Distance at which the quiz battle starts
    pub detection_radius: f32,
    /// Boss health fraction that force-ends a running quiz
    pub force_end_health_fraction: f32,
    /// Player damage for a correct answer when the player has no attack profile
    pub base_damage_on_correct: f32,
    /// Damage the player takes for an incorrect answer
    pub base_damage_on_incorrect: f32,
    /// Critical chance for correct answers when the player has no attack profile
    pub critical_hit_chance: f32,
    /// Critical multiplier for correct answers when the player has no attack profile
    pub critical_hit_multiplier: f32,
    /// Shuffle questions when building the bank
    pub shuffle_questions: bool,
    /// Answer animation length; the strike lands halfway through
    pub answer_animation_time: f32,
    /// Delay between a decisive answer and the end of the session
    pub end_delay: f32,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_radius: 5.0,
            force_end_health_fraction: 0.1,
            base_damage_on_correct: 15.0,
            base_damage_on_incorrect: 10.0,
            critical_hit_chance: 0.1,
            critical_hit_multiplier: 2.0,
            shuffle_questions: false,
            answer_animation_time: 1.5,
            end_delay: 2.0,
        }
    }
}

impl QuizConfig {
    /// Delay between submitting and the damage landing.
    #[must_use]
    pub fn strike_delay(&self) -> f32 {
        self.answer_animation_time * 0.5
    }

    /// Delay between the damage landing and the termination check.
    #[must_use]
    pub fn feedback_delay(&self) -> f32 {
        self.answer_animation_time
    }

    /// Returns a copy with out-of-range values corrected.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        let name = "quiz";
        self.detection_radius = non_negative(name, "detection_radius", self.detection_radius);
        self.force_end_health_fraction =
            unit_interval(name, "force_end_health_fraction", self.force_end_health_fraction);
        self.base_damage_on_correct =
            non_negative(name, "base_damage_on_correct", self.base_damage_on_correct);
        self.base_damage_on_incorrect =
            non_negative(name, "base_damage_on_incorrect", self.base_damage_on_incorrect);
        self.critical_hit_chance =
            unit_interval(name, "critical_hit_chance", self.critical_hit_chance);
        if self.critical_hit_multiplier.is_nan() || self.critical_hit_multiplier < 1.0 {
            warn!("quiz: critical_hit_multiplier {} raised to 1.0", self.critical_hit_multiplier);
            self.critical_hit_multiplier = 1.0;
        }
        self.answer_animation_time =
            non_negative(name, "answer_animation_time", self.answer_animation_time);
        self.end_delay = non_negative(name, "end_delay", self.end_delay);
        self
    }
}

/// Starting stats and attack of one combatant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatantConfig {
    /// Health, defense and crit settings
    pub stats: CombatStatsConfig,
    /// Attack settings
    pub attack: AttackConfig,
    /// Health item settings
    pub health_items: HealthItemConfig,
}

impl CombatantConfig {
    /// Default boss combatant: sturdier, longer reach, special attack enabled.
    #[must_use]
    pub fn boss() -> Self {
        Self {
            stats: CombatStatsConfig {
                max_health: 200.0,
                defense: 2.0,
                ..CombatStatsConfig::default()
            },
            attack: AttackConfig {
                base_damage: 12.0,
                range: 2.5,
                special: SpecialAttackConfig {
                    enabled: true,
                    ..SpecialAttackConfig::default()
                },
                ..AttackConfig::default()
            },
            health_items: HealthItemConfig {
                starting_items: 0,
                ..HealthItemConfig::default()
            },
        }
    }
}

/// Complete configuration of one boss encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncounterConfig {
    /// Config schema version
    pub version: SchemaVersion,
    /// Boss behaviour
    pub boss: BossConfig,
    /// Quiz battle settings
    pub quiz: QuizConfig,
    /// Boss stats and attack
    pub boss_combatant: CombatantConfig,
    /// Player stats and attack
    pub player: CombatantConfig,
}

impl Default for EncounterConfig {
    fn default() -> Self {
        Self {
            version: SchemaVersion::ENCOUNTER_CONFIG,
            boss: BossConfig::default(),
            quiz: QuizConfig::default(),
            boss_combatant: CombatantConfig::boss(),
            player: CombatantConfig::default(),
        }
    }
}

impl EncounterConfig {
    /// Parses and sanitises a config from TOML text.
    pub fn from_toml_str(source: &str) -> LorekeeperResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| ContentError::Parse(e.to_string()))?;
        SchemaVersion::ENCOUNTER_CONFIG.check_readable(&config.version)?;
        Ok(config.sanitized())
    }

    /// Loads config from a file, falling back to defaults on any failure.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Encounter config {} not found, using defaults", path.display());
            return Self::default();
        }

        match fs::read_to_string(path) {
            Ok(contents) => match Self::from_toml_str(&contents) {
                Ok(config) => {
                    info!("Loaded encounter config from {}", path.display());
                    config
                },
                Err(e) => {
                    warn!("Failed to parse encounter config: {e}");
                    Self::default()
                },
            },
            Err(e) => {
                warn!("Failed to read encounter config: {e}");
                Self::default()
            },
        }
    }

    /// Saves config to a file.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved encounter config to {}", path.display());
        Ok(())
    }

    /// Returns a copy with out-of-range values corrected.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.boss = self.boss.sanitized();
        self.quiz = self.quiz.sanitized();
        self.player.health_items = sanitize_health_items("player", self.player.health_items);
        self.boss_combatant.health_items =
            sanitize_health_items("boss", self.boss_combatant.health_items);
        self
    }
}

fn sanitize_health_items(owner: &str, mut items: HealthItemConfig) -> HealthItemConfig {
    items.heal_amount = non_negative(owner, "health item heal_amount", items.heal_amount);
    if items.starting_items > items.max_items {
        warn!(
            "{owner}: starting_items {} capped to max_items {}",
            items.starting_items, items.max_items
        );
        items.starting_items = items.max_items;
    }
    items
}

fn sanitize_multipliers(owner: &str, label: &str, values: &mut Vec<f32>, num_phases: usize) {
    for value in values.iter_mut() {
        if !value.is_finite() || *value < 0.0 {
            warn!("{owner}: invalid {label} multiplier {value}, using 1.0");
            *value = 1.0;
        }
    }
    if values.len() < num_phases {
        warn!("{owner}: {label} multipliers padded to {num_phases} phases");
        values.resize(num_phases, 1.0);
    }
}

fn non_negative(owner: &str, label: &str, value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        warn!("{owner}: {label} {value} clamped to 0");
        0.0
    }
}

fn unit_interval(owner: &str, label: &str, value: f32) -> f32 {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        value
    } else {
        warn!("{owner}: {label} {value} clamped to [0, 1]");
        if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tuned_values() {
        let config = EncounterConfig::default();
        assert_eq!(config.boss.num_phases, 3);
        assert_eq!(config.boss.phase_health_thresholds, vec![0.75, 0.5, 0.25]);
        assert!((config.boss.speed_multiplier(2) - 1.3).abs() < f32::EPSILON);
        assert!((config.quiz.strike_delay() - 0.75).abs() < f32::EPSILON);
        assert!((config.quiz.feedback_delay() - 1.5).abs() < f32::EPSILON);
        assert!(config.boss_combatant.attack.special.enabled);
        assert!(!config.player.attack.special.enabled);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EncounterConfig::from_toml_str(
            r#"
            [boss]
            name = "Governor"
            detection_radius = 12.0

            [quiz]
            shuffle_questions = true
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.boss.name, "Governor");
        assert!((config.boss.detection_radius - 12.0).abs() < f32::EPSILON);
        assert!((config.boss.attack_range - 2.0).abs() < f32::EPSILON);
        assert!(config.quiz.shuffle_questions);
        assert!((config.quiz.base_damage_on_correct - 15.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sanitize_corrects_bad_values() {
        let boss = BossConfig {
            num_phases: 0,
            phase_health_thresholds: vec![0.3, 1.5, 0.6, -0.2],
            phase_damage_multipliers: vec![f32::NAN],
            special_attack_chance: 4.0,
            attack_range: -1.0,
            ..BossConfig::default()
        }
        .sanitized();

        assert_eq!(boss.num_phases, 1);
        assert_eq!(boss.phase_health_thresholds, vec![0.6, 0.3]);
        assert_eq!(boss.phase_damage_multipliers, vec![1.0]);
        assert!((boss.special_attack_chance - 1.0).abs() < f32::EPSILON);
        assert!(boss.attack_range.abs() < f32::EPSILON);

        let quiz = QuizConfig {
            critical_hit_chance: -0.5,
            critical_hit_multiplier: 0.2,
            ..QuizConfig::default()
        }
        .sanitized();
        assert!(quiz.critical_hit_chance.abs() < f32::EPSILON);
        assert!((quiz.critical_hit_multiplier - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_health_items_parsed_and_sanitized() {
        let config = EncounterConfig::from_toml_str(
            r#"
            [player.health_items]
            heal_amount = -3.0
            max_items = 3
            starting_items = 7
            "#,
        )
        .expect("valid toml");

        let items = config.player.health_items;
        assert!(items.heal_amount.abs() < f32::EPSILON);
        assert_eq!(items.max_items, 3);
        assert_eq!(items.starting_items, 3);
        assert_eq!(config.boss_combatant.health_items.starting_items, 0);
        assert_eq!(EncounterConfig::default().player.health_items.starting_items, 2);
    }

    #[test]
    fn test_multipliers_padded_to_phase_count() {
        let boss = BossConfig {
            num_phases: 4,
            phase_speed_multipliers: vec![1.0],
            ..BossConfig::default()
        }
        .sanitized();
        assert_eq!(boss.phase_speed_multipliers.len(), 4);
        assert!((boss.speed_multiplier(3) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("encounter.toml");
        let mut config = EncounterConfig::default();
        config.boss.name = "Round Trip".to_string();
        config.quiz.enabled = false;

        config.save_to(&path).expect("save");
        let loaded = EncounterConfig::load_from(&path);

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = EncounterConfig::load_from(dir.path().join("missing.toml"));
        assert_eq!(missing, EncounterConfig::default());

        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "boss = [[[").expect("write");
        assert_eq!(EncounterConfig::load_from(&broken), EncounterConfig::default());
    }

    #[test]
    fn test_rejects_future_version() {
        let result = EncounterConfig::from_toml_str(
            r"
            [version]
            major = 3
            minor = 0
            patch = 0
            ",
        );
        assert!(result.is_err());
    }
}
