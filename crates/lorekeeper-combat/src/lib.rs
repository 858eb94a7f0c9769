//! # Lorekeeper Combat
//!
//! Combat core for Lorekeeper's boss fights.
//!
//! This crate provides:
//! - Combat stats (health, defense, crits, buffs, regeneration)
//! - Cooldown-gated area attacks
//! - Consumable health items
//! - Boss encounter state machine with health-driven phases
//! - Turn-based quiz battles and quiz content loading
//! - Encounter configuration
//! - Player levelling
//! - Tick-driven timers and publish/subscribe notifications

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod arena;
pub mod attack;
pub mod boss;
pub mod config;
pub mod consumables;
pub mod events;
pub mod progression;
pub mod quiz;
pub mod stats;
pub mod timer;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::arena::*;
    pub use crate::attack::*;
    pub use crate::boss::*;
    pub use crate::config::*;
    pub use crate::consumables::*;
    pub use crate::events::*;
    pub use crate::progression::*;
    pub use crate::quiz::*;
    pub use crate::stats::*;
    pub use crate::timer::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use lorekeeper_common::{Faction, FactionMask};

    #[test]
    fn test_full_fight_through_quiz_and_real_time() {
        let config = EncounterConfig::default();
        let mut arena = Arena::new();
        let boss = arena.spawn(
            CombatEntity::from_config(&config.boss_combatant.stats).with_seed(1),
            Vec2::ZERO,
            Faction::Boss,
        );
        let player_attack = AttackProfile::from_config(&config.player.attack)
            .with_targets(FactionMask::of(Faction::Boss));
        let player = arena.spawn_with_attack(
            CombatEntity::new(10_000.0).with_seed(2),
            Vec2::new(4.0, 0.0),
            Faction::Player,
            player_attack,
        );

        let boss_attack = AttackProfile::from_config(&config.boss_combatant.attack)
            .with_targets(FactionMask::of(Faction::Player));
        let questions = QuizSet::builtin()
            .expect("built-in quizzes parse")
            .into_iter()
            .next()
            .expect("at least one set")
            .questions;
        let mut encounter = BossEncounter::new(&config, boss, Some(player), boss_attack, &mut arena)
            .with_questions(questions)
            .with_seed(3);
        let mut progression = PlayerProgression::new(config.player.attack.base_damage);

        // Answer every question correctly.
        encounter.tick(0.1, &mut arena, &mut progression);
        assert!(encounter.is_real_time_paused());
        for _ in 0..200 {
            if let Some(session) = encounter.quiz_session_mut() {
                if session.accepting_input() {
                    let correct = session
                        .current_question()
                        .and_then(|q| usize::try_from(q.correct_answer_index).ok())
                        .unwrap_or(0);
                    session.submit_answer(correct);
                }
            }
            encounter.tick(0.25, &mut arena, &mut progression);
            if encounter.quiz_completed() {
                break;
            }
        }
        assert!(encounter.quiz_completed());
        assert!(!encounter.is_real_time_paused());

        // Finish the boss in real time.
        for _ in 0..2000 {
            if encounter.state() == BossState::Dead {
                break;
            }
            arena.tick(0.1);
            if let (Some(b), Some(p)) = (arena.position_of(boss), arena.position_of(player)) {
                if b.distance(p) > 1.0 {
                    arena.translate(player, (b - p).normalize_or_zero() * 0.5);
                }
            }
            let _ = arena.perform_attack(player, AttackKind::Basic);
            encounter.tick(0.1, &mut arena, &mut progression);
        }

        assert_eq!(encounter.state(), BossState::Dead);
        assert!(progression.level() >= 2);
        assert_eq!(encounter.phase_index(), config.boss.last_phase());
    }
}
