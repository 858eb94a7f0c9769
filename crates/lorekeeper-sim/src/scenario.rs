//! Scripted boss fight at a fixed timestep.
//!
//! The scripted player walks towards the boss, swings whenever the boss is
//! in reach and answers quiz questions after a short think time, choosing
//! the correct answer with a configurable probability. Outside the quiz it
//! drinks a health item when badly hurt. Boss locomotion follows
//! [`BossEncounter::desired_velocity`].

use glam::Vec2;
use serde::Serialize;
use tracing::{debug, info};

use lorekeeper_combat::{
    Arena, AttackKind, AttackProfile, BossEncounter, BossState, CombatEntity, CombatError,
    CombatNotification, CombatantStore, EncounterConfig, EncounterSignal, HealthItems,
    PlayerProgression, QuizBattleSession, QuizOutcome, QuizQuestion, SpatialQuery, Subscription,
};
use lorekeeper_common::{EntityId, Faction, FactionMask};

/// Fixed simulation step (60 Hz).
pub const FIXED_DT: f32 = 1.0 / 60.0;

/// Player walking speed in units per second.
const PLAYER_SPEED: f32 = 4.0;

/// Delay before the scripted player answers a question.
const THINK_TIME: f32 = 0.5;

/// The player stops this fraction of its attack range away from the boss.
const APPROACH_FRACTION: f32 = 0.8;

/// The player drinks a health item below this health fraction.
const HEAL_BELOW: f32 = 0.5;

const PLAYER_START: Vec2 = Vec2::new(12.0, 0.0);

/// Simulation parameters.
#[derive(Debug, Clone, Copy)]
pub struct ScenarioOptions {
    /// Seed for every random roll in the fight
    pub seed: u64,
    /// Probability of answering a question correctly (0.0-1.0)
    pub accuracy: f32,
    /// Simulated time limit in seconds
    pub max_seconds: f32,
    /// Step length in seconds
    pub fixed_dt: f32,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            seed: 1,
            accuracy: 0.8,
            max_seconds: 300.0,
            fixed_dt: FIXED_DT,
        }
    }
}

/// How the fight ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FightOutcome {
    /// Boss died
    Victory,
    /// Player died
    Defeat,
    /// Time limit reached
    Timeout,
}

/// Result of one simulated fight.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Boss display name
    pub boss_name: String,
    /// How the fight ended
    pub outcome: FightOutcome,
    /// Simulated seconds
    pub elapsed_seconds: f32,
    /// Highest phase reached (1-based)
    pub phase_reached: usize,
    /// Boss state at the end
    pub boss_state: BossState,
    /// How the quiz battle ended, if one ran
    pub quiz_outcome: Option<QuizOutcome>,
    /// Quiz answers that were correct
    pub correct_answers: usize,
    /// Quiz answers that were wrong
    pub incorrect_answers: usize,
    /// Total damage the boss took
    pub damage_dealt: f32,
    /// Total damage the player took
    pub damage_taken: f32,
    /// Boss health at the end
    pub boss_health: f32,
    /// Player health at the end
    pub player_health: f32,
    /// Player level at the end
    pub player_level: u32,
    /// Health items the player drank
    pub health_items_used: u32,
    /// Seed used
    pub seed: u64,
}

/// One player against one boss.
#[derive(Debug)]
pub struct Scenario {
    options: ScenarioOptions,
    arena: Arena,
    encounter: BossEncounter,
    progression: PlayerProgression,
    health_items: HealthItems,
    health_items_used: u32,
    boss: EntityId,
    player: EntityId,
    signals: Subscription<EncounterSignal>,
    boss_feed: Subscription<CombatNotification>,
    player_feed: Subscription<CombatNotification>,
    rng: fastrand::Rng,
    think_remaining: f32,
    elapsed: f32,
    outcome: Option<FightOutcome>,
    quiz_outcome: Option<QuizOutcome>,
    damage_dealt: f32,
    damage_taken: f32,
}

impl Scenario {
    /// Sets up the arena and encounter.
    pub fn new(
        config: &EncounterConfig,
        questions: Vec<QuizQuestion>,
        options: ScenarioOptions,
    ) -> Self {
        let mut arena = Arena::new();

        let mut boss_entity =
            CombatEntity::from_config(&config.boss_combatant.stats).with_seed(options.seed);
        let boss_feed = boss_entity.subscribe();
        let boss = arena.spawn(boss_entity, Vec2::ZERO, Faction::Boss);

        let mut player_entity = CombatEntity::from_config(&config.player.stats)
            .with_seed(options.seed.wrapping_add(1));
        let player_feed = player_entity.subscribe();
        let player_attack = AttackProfile::from_config(&config.player.attack)
            .with_targets(FactionMask::of(Faction::Boss));
        let player =
            arena.spawn_with_attack(player_entity, PLAYER_START, Faction::Player, player_attack);

        let boss_attack = AttackProfile::from_config(&config.boss_combatant.attack)
            .with_targets(FactionMask::of(Faction::Player));
        let mut encounter = BossEncounter::new(config, boss, Some(player), boss_attack, &mut arena)
            .with_questions(questions)
            .with_seed(options.seed.wrapping_add(2));
        let signals = encounter.subscribe();

        Self {
            options: ScenarioOptions {
                accuracy: if options.accuracy.is_finite() {
                    options.accuracy.clamp(0.0, 1.0)
                } else {
                    0.0
                },
                max_seconds: if options.max_seconds.is_finite() {
                    options.max_seconds.max(0.0)
                } else {
                    ScenarioOptions::default().max_seconds
                },
                fixed_dt: if options.fixed_dt.is_finite() {
                    options.fixed_dt.max(0.001)
                } else {
                    FIXED_DT
                },
                ..options
            },
            arena,
            encounter,
            progression: PlayerProgression::new(config.player.attack.base_damage),
            health_items: HealthItems::from_config(&config.player.health_items),
            health_items_used: 0,
            boss,
            player,
            signals,
            boss_feed,
            player_feed,
            rng: fastrand::Rng::with_seed(options.seed.wrapping_add(3)),
            think_remaining: THINK_TIME,
            elapsed: 0.0,
            outcome: None,
            quiz_outcome: None,
            damage_dealt: 0.0,
            damage_taken: 0.0,
        }
    }

    /// Runs until someone dies or time runs out.
    pub fn run(mut self) -> Summary {
        info!(
            "Simulating '{}' (seed {}, accuracy {:.0}%)",
            self.encounter.config().name,
            self.options.seed,
            self.options.accuracy * 100.0
        );

        while self.outcome.is_none() {
            if self.elapsed >= self.options.max_seconds {
                info!("Time limit of {}s reached", self.options.max_seconds);
                self.outcome = Some(FightOutcome::Timeout);
                break;
            }
            self.step();
        }

        self.summary()
    }

    fn step(&mut self) {
        let dt = self.options.fixed_dt;

        if self.encounter.is_real_time_paused() {
            self.answer_quiz(dt);
        } else {
            self.arena.tick(dt);
            self.arena.translate(self.boss, self.encounter.desired_velocity() * dt);
            self.move_player(dt);
            self.drink_if_hurt();
            self.swing();
        }

        self.encounter.tick(dt, &mut self.arena, &mut self.progression);
        self.elapsed += dt;

        self.collect_damage();
        self.handle_signals();
    }

    // ========================================================================
    // Scripted player
    // ========================================================================

    fn player_reach(&self) -> f32 {
        self.arena
            .attack_profile(self.player)
            .map_or(0.0, AttackProfile::range)
    }

    fn move_player(&mut self, dt: f32) {
        let alive = self
            .arena
            .combatant(self.player)
            .is_some_and(CombatEntity::is_alive);
        let (Some(from), Some(to)) = (
            self.arena.position_of(self.player),
            self.arena.position_of(self.boss),
        ) else {
            return;
        };
        if !alive {
            return;
        }

        let offset = to - from;
        let stop_at = self.player_reach() * APPROACH_FRACTION;
        let distance = offset.length();
        if distance > stop_at {
            let step = (PLAYER_SPEED * dt).min(distance - stop_at);
            self.arena.translate(self.player, offset.normalize_or_zero() * step);
        }
    }

    fn swing(&mut self) {
        let in_reach = self
            .arena
            .distance_between(self.player, self.boss)
            .is_some_and(|d| d <= self.player_reach());
        if !in_reach {
            return;
        }

        match self.arena.perform_attack(self.player, AttackKind::Basic) {
            Ok(report) => debug!("Player hit for {:.1}", report.total_damage()),
            Err(CombatError::OnCooldown { .. }) => {},
            Err(e) => debug!("Player attack failed: {e}"),
        }
    }

    fn drink_if_hurt(&mut self) {
        let Some(player) = self.arena.combatant_mut(self.player) else {
            return;
        };
        if player.is_dead() || player.health_fraction() >= HEAL_BELOW {
            return;
        }
        if self.health_items.use_health_item(player) > 0.0 {
            self.health_items_used += 1;
            debug!("{} health item(s) left", self.health_items.count());
        }
    }

    fn answer_quiz(&mut self, dt: f32) {
        let Some(session) = self.encounter.quiz_session_mut() else {
            return;
        };
        if !session.accepting_input() {
            self.think_remaining = THINK_TIME;
            return;
        }
        self.think_remaining -= dt;
        if self.think_remaining > 0.0 {
            return;
        }

        let Some(choice) = pick_answer(session, &mut self.rng, self.options.accuracy) else {
            return;
        };
        let choices = session
            .current_question()
            .map_or(0, |q| q.answer_choices.len());

        // Walk the selection like a player on a keyboard would.
        for _ in 0..choices {
            if session.selected_answer_index() == choice {
                break;
            }
            session.navigate(1);
        }
        session.submit();
        self.think_remaining = THINK_TIME;
    }

    // ========================================================================
    // Bookkeeping
    // ========================================================================

    fn collect_damage(&mut self) {
        for event in self.boss_feed.drain() {
            if let CombatNotification::Damaged { amount, .. } = event {
                self.damage_dealt += amount;
            }
        }
        for event in self.player_feed.drain() {
            if let CombatNotification::Damaged { amount, .. } = event {
                self.damage_taken += amount;
            }
        }
    }

    fn handle_signals(&mut self) {
        for signal in self.signals.drain() {
            match signal {
                EncounterSignal::PhaseChanged { phase } => {
                    info!("[{:6.2}s] Boss enters phase {}", self.elapsed, phase + 1);
                },
                EncounterSignal::QuizStarted { questions } => {
                    info!("[{:6.2}s] Quiz battle: {questions} question(s)", self.elapsed);
                },
                EncounterSignal::QuizFinished { outcome } => {
                    info!("[{:6.2}s] Quiz battle over: {}", self.elapsed, outcome.display_name());
                    self.quiz_outcome = Some(outcome);
                },
                EncounterSignal::Victory { boss_level } => {
                    info!("[{:6.2}s] Victory over a level {boss_level} boss", self.elapsed);
                    self.outcome = Some(FightOutcome::Victory);
                    self.apply_level_ups();
                },
                EncounterSignal::GameOver => {
                    info!("[{:6.2}s] Game over", self.elapsed);
                    self.outcome = Some(FightOutcome::Defeat);
                },
                EncounterSignal::StateChanged { .. }
                | EncounterSignal::AttackPerformed { .. } => {},
            }
        }
    }

    fn apply_level_ups(&mut self) {
        for level_up in self.progression.take_level_ups() {
            info!(
                "Reached level {} (damage {:.1}, crit {:.0}%)",
                level_up.level,
                level_up.base_damage,
                level_up.crit_chance * 100.0
            );
        }
        if let Some(profile) = self.arena.attack_profile_mut(self.player) {
            self.progression.apply_level_stats(profile);
        }
    }

    fn summary(&self) -> Summary {
        let health = |id: EntityId| self.arena.combatant(id).map_or(0.0, CombatEntity::health);
        let session = self.encounter.quiz_session();

        Summary {
            boss_name: self.encounter.config().name.clone(),
            outcome: self.outcome.unwrap_or(FightOutcome::Timeout),
            elapsed_seconds: self.elapsed,
            phase_reached: self.encounter.phase_index() + 1,
            boss_state: self.encounter.state(),
            quiz_outcome: self
                .quiz_outcome
                .or_else(|| session.and_then(QuizBattleSession::outcome)),
            correct_answers: session.map_or(0, QuizBattleSession::correct_answers),
            incorrect_answers: session.map_or(0, QuizBattleSession::incorrect_answers),
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            boss_health: health(self.boss),
            player_health: health(self.player),
            player_level: self.progression.level(),
            health_items_used: self.health_items_used,
            seed: self.options.seed,
        }
    }
}

/// Picks the answer to give: correct with probability `accuracy`, otherwise
/// a random wrong choice.
fn pick_answer(
    session: &QuizBattleSession,
    rng: &mut fastrand::Rng,
    accuracy: f32,
) -> Option<usize> {
    let question = session.current_question()?;
    let choices = question.answer_choices.len();
    let correct = usize::try_from(question.correct_answer_index).ok()?;
    if choices <= 1 || rng.f32() < accuracy {
        return Some(correct);
    }
    Some((correct + 1 + rng.usize(..choices - 1)) % choices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lorekeeper_combat::{QuizBank, QuizSet};

    fn builtin_questions() -> Vec<QuizQuestion> {
        let sets = QuizSet::builtin().expect("built-in sets parse");
        let mut rng = fastrand::Rng::with_seed(0);
        QuizBank::from_sets(&sets, false, &mut rng).questions().to_vec()
    }

    fn sturdy_player() -> EncounterConfig {
        let mut config = EncounterConfig::default();
        config.player.stats.max_health = 1000.0;
        config.player.attack.base_damage = 20.0;
        config
    }

    fn options(accuracy: f32) -> ScenarioOptions {
        ScenarioOptions {
            seed: 42,
            accuracy,
            ..ScenarioOptions::default()
        }
    }

    #[test]
    fn test_accurate_player_wins() {
        let summary = Scenario::new(&sturdy_player(), builtin_questions(), options(1.0)).run();

        assert_eq!(summary.outcome, FightOutcome::Victory);
        assert_eq!(summary.boss_state, BossState::Dead);
        assert!(summary.correct_answers > 0);
        assert_eq!(summary.incorrect_answers, 0);
        assert!(summary.boss_health.abs() < f32::EPSILON);
        assert!(summary.damage_dealt >= 200.0);
        assert!(summary.player_level >= 2);
    }

    #[test]
    fn test_wrong_answers_hurt_the_player() {
        let summary = Scenario::new(&sturdy_player(), builtin_questions(), options(0.0)).run();

        assert_eq!(summary.quiz_outcome, Some(QuizOutcome::Completed));
        assert_eq!(summary.correct_answers, 0);
        assert_eq!(summary.incorrect_answers, 10);
        assert!(summary.damage_taken >= 100.0);
        assert_eq!(summary.outcome, FightOutcome::Victory);
    }

    #[test]
    fn test_quiz_disabled_fights_in_real_time() {
        let mut config = sturdy_player();
        config.quiz.enabled = false;

        let summary = Scenario::new(&config, builtin_questions(), options(1.0)).run();

        assert_eq!(summary.outcome, FightOutcome::Victory);
        assert_eq!(summary.quiz_outcome, None);
        assert_eq!(summary.correct_answers, 0);
        assert_eq!(summary.phase_reached, 3);
    }

    #[test]
    fn test_time_limit() {
        let summary = Scenario::new(
            &EncounterConfig::default(),
            builtin_questions(),
            ScenarioOptions {
                max_seconds: 1.0,
                ..options(1.0)
            },
        )
        .run();

        assert_eq!(summary.outcome, FightOutcome::Timeout);
        assert!(summary.elapsed_seconds >= 1.0);
        assert_eq!(summary.phase_reached, 1);
    }

    #[test]
    fn test_non_finite_time_limit_uses_default() {
        let mut config = EncounterConfig::default();
        config.quiz.enabled = false;
        config.player.attack.base_damage = 0.0;
        config.boss_combatant.attack.base_damage = 0.0;
        config.boss_combatant.attack.special.enabled = false;

        let summary = Scenario::new(
            &config,
            Vec::new(),
            ScenarioOptions {
                max_seconds: f32::NAN,
                ..options(1.0)
            },
        )
        .run();

        assert_eq!(summary.outcome, FightOutcome::Timeout);
        let limit = ScenarioOptions::default().max_seconds;
        assert!(summary.elapsed_seconds >= limit);
        assert!(summary.elapsed_seconds < limit + 1.0);
    }

    #[test]
    fn test_hurt_player_drinks_health_items() {
        let mut config = EncounterConfig::default();
        config.quiz.enabled = false;
        config.player.stats.max_health = 60.0;
        config.player.stats.crit_chance = 0.0;
        config.player.attack.base_damage = 0.0;
        config.boss_combatant.attack.crit_chance = 0.0;
        config.boss_combatant.attack.special.enabled = false;

        let summary = Scenario::new(
            &config,
            Vec::new(),
            ScenarioOptions {
                max_seconds: 120.0,
                ..options(1.0)
            },
        )
        .run();

        assert_eq!(summary.outcome, FightOutcome::Defeat);
        assert_eq!(summary.health_items_used, 2);
        assert!(summary.damage_taken >= 100.0);
    }

    #[test]
    fn test_weak_player_is_defeated() {
        let mut config = EncounterConfig::default();
        config.quiz.enabled = false;
        config.player.stats.max_health = 20.0;
        config.player.attack.base_damage = 3.0;

        let summary = Scenario::new(&config, Vec::new(), options(1.0)).run();

        assert_eq!(summary.outcome, FightOutcome::Defeat);
        assert!(summary.player_health.abs() < f32::EPSILON);
        assert_eq!(summary.player_level, 1);
    }

    #[test]
    fn test_summary_json_shape() {
        let summary = Scenario::new(
            &EncounterConfig::default(),
            Vec::new(),
            ScenarioOptions {
                max_seconds: 0.5,
                ..options(1.0)
            },
        )
        .run();

        let json = serde_json::to_value(&summary).expect("summary serializes");
        assert_eq!(json["outcome"], "timeout");
        assert_eq!(json["boss_state"], "Idle");
        assert_eq!(json["seed"], 42);
        assert!(json["quiz_outcome"].is_null());
    }
}
