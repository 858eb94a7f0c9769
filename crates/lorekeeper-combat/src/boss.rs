//! Boss encounter state machine.
//!
//! This module provides:
//! - [`BossState`]: Idle, Chasing, Attacking, StunLocked and the terminal Dead state
//! - Health-driven phase escalation with a telegraphed stun
//! - Basic/special attack selection once the special unlocks
//! - Hand-off to a [`QuizBattleSession`] while the player is within quiz range
//! - Victory and game-over signals plus the experience reward
//!
//! The encounter owns the boss's [`AttackProfile`] and reads everything else
//! (positions, health) through the world traits passed to [`BossEncounter::tick`].

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lorekeeper_common::EntityId;

use crate::arena::{CombatantStore, SpatialQuery};
use crate::attack::AttackProfile;
use crate::config::{BossConfig, EncounterConfig, QuizConfig};
use crate::events::{
    CombatNotification, EncounterSignal, Notifier, QuizEvent, Subscription, SubscriptionId,
};
use crate::progression::ExperienceSink;
use crate::quiz::{QuizBattleSession, QuizCombatants, QuizOutcome, QuizQuestion};
use crate::timer::{TimerId, Timers};

/// Behaviour state of a boss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossState {
    /// Waiting for the player to come into view
    #[default]
    Idle,
    /// Moving towards the player
    Chasing,
    /// In attack range, attacking whenever off cooldown
    Attacking,
    /// Frozen during a phase transition
    StunLocked,
    /// Health reached zero
    Dead,
}

impl BossState {
    /// Returns the display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Chasing => "Chasing",
            Self::Attacking => "Attacking",
            Self::StunLocked => "Stun Locked",
            Self::Dead => "Dead",
        }
    }

    /// Checks if the state is driven by distance to the player.
    #[must_use]
    pub const fn is_pursuit(self) -> bool {
        matches!(self, Self::Idle | Self::Chasing | Self::Attacking)
    }
}

/// One boss fight: behaviour, phases, quiz hand-off and outcome.
#[derive(Debug)]
pub struct BossEncounter {
    config: BossConfig,
    quiz_config: QuizConfig,
    boss: EntityId,
    player: Option<EntityId>,
    attack: AttackProfile,

    state: BossState,
    phase_index: usize,
    can_change_phase: bool,
    /// Pending stun, carrying the state to restore
    stun: Timers<BossState>,
    stun_timer: Option<TimerId>,
    desired_velocity: Vec2,
    facing: Vec2,

    questions: Vec<QuizQuestion>,
    quiz_session: Option<QuizBattleSession>,
    quiz_feed: Option<Subscription<QuizEvent>>,
    quiz_completed: bool,

    boss_feed: Option<Subscription<CombatNotification>>,
    player_feed: Option<Subscription<CombatNotification>>,
    victory_signalled: bool,
    game_over_signalled: bool,

    rng: fastrand::Rng,
    signals: Notifier<EncounterSignal>,
}

impl BossEncounter {
    /// Creates an encounter for `boss` hunting `player`.
    ///
    /// `attack` should target only the player's faction. A missing player
    /// leaves the boss idle; a boss without combat stats still moves and
    /// attacks but never changes phase or dies.
    pub fn new<W>(
        config: &EncounterConfig,
        boss: EntityId,
        player: Option<EntityId>,
        mut attack: AttackProfile,
        world: &mut W,
    ) -> Self
    where
        W: CombatantStore + ?Sized,
    {
        let boss_config = config.boss.clone().sanitized();
        attack.set_damage_multiplier(boss_config.damage_multiplier(0));

        let boss_feed = match world.combatant_mut(boss) {
            Some(entity) => Some(entity.subscribe()),
            None => {
                warn!("Boss {boss} has no combat stats, phases and victory are disabled");
                None
            },
        };
        let player_feed = match player {
            Some(id) => match world.combatant_mut(id) {
                Some(entity) => Some(entity.subscribe()),
                None => {
                    warn!("Player {id} has no combat stats");
                    None
                },
            },
            None => {
                warn!("No player for boss '{}', encounter stays idle", boss_config.name);
                None
            },
        };

        Self {
            quiz_config: config.quiz.clone().sanitized(),
            config: boss_config,
            boss,
            player,
            attack,
            state: BossState::Idle,
            phase_index: 0,
            can_change_phase: true,
            stun: Timers::new(),
            stun_timer: None,
            desired_velocity: Vec2::ZERO,
            facing: Vec2::X,
            questions: Vec::new(),
            quiz_session: None,
            quiz_feed: None,
            quiz_completed: false,
            boss_feed,
            player_feed,
            victory_signalled: false,
            game_over_signalled: false,
            rng: fastrand::Rng::new(),
            signals: Notifier::default(),
        }
    }

    /// Sets the questions used when the quiz battle starts.
    #[must_use]
    pub fn with_questions(mut self, questions: Vec<QuizQuestion>) -> Self {
        self.questions = questions;
        self
    }

    /// Seeds the special-attack roll and the quiz session's crit roll.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Subscribes to encounter signals.
    pub fn subscribe(&mut self) -> Subscription<EncounterSignal> {
        self.signals.subscribe()
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.signals.unsubscribe(id)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Advances the encounter by `dt` seconds.
    ///
    /// Notifications are handled before behaviour, so a boss that died
    /// since the last tick never attacks again.
    pub fn tick<W, P>(&mut self, dt: f32, world: &mut W, progression: &mut P)
    where
        W: SpatialQuery + CombatantStore + ?Sized,
        P: ExperienceSink + ?Sized,
    {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        // Real-time combat is paused while a quiz is running.
        if !self.is_real_time_paused() {
            self.attack.tick(dt);
            for previous in self.stun.advance(dt) {
                self.end_stun(previous);
            }
        }

        if let Some(session) = self.quiz_session.as_mut() {
            session.tick(dt, world);
        }

        self.process_combat_notifications(progression);
        self.process_quiz_events();

        if self.state == BossState::Dead {
            return;
        }

        let Some((boss_position, player_position)) = self.positions(world) else {
            self.lose_player();
            return;
        };

        let offset = player_position - boss_position;
        let distance = offset.length();
        if offset.length_squared() > f32::EPSILON {
            self.facing = offset.normalize();
        }

        if self.should_start_quiz(distance) {
            self.start_quiz_battle();
        }
        if self.is_real_time_paused() {
            self.desired_velocity = Vec2::ZERO;
            return;
        }

        self.update_state(distance);
        self.act(boss_position, world);
    }

    fn positions<W>(&self, world: &W) -> Option<(Vec2, Vec2)>
    where
        W: SpatialQuery + CombatantStore + ?Sized,
    {
        let player = self.player?;
        let player_alive = world.combatant(player).is_some_and(|e| e.is_alive());
        if !player_alive {
            return None;
        }
        Some((world.position_of(self.boss)?, world.position_of(player)?))
    }

    fn lose_player(&mut self) {
        self.desired_velocity = Vec2::ZERO;
        if self.state.is_pursuit() {
            self.set_state(BossState::Idle);
        }
    }

    fn update_state(&mut self, distance: f32) {
        match self.state {
            BossState::Idle => {
                if distance <= self.config.detection_radius {
                    self.set_state(BossState::Chasing);
                }
            },
            BossState::Chasing => {
                if distance <= self.config.attack_range {
                    self.set_state(BossState::Attacking);
                } else if distance > self.config.detection_radius {
                    self.set_state(BossState::Idle);
                }
            },
            BossState::Attacking => {
                if distance > self.config.attack_range + self.config.attack_hysteresis {
                    self.set_state(BossState::Chasing);
                }
            },
            BossState::StunLocked | BossState::Dead => {},
        }
    }

    fn act<W>(&mut self, anchor: Vec2, world: &mut W)
    where
        W: SpatialQuery + CombatantStore + ?Sized,
    {
        self.desired_velocity = match self.state {
            BossState::Chasing => self.facing * self.current_speed(),
            _ => Vec2::ZERO,
        };

        if self.state != BossState::Attacking || !self.attack.can_attack() {
            return;
        }

        let use_special = self.phase_index >= self.config.special_attack_min_phase
            && self.attack.can_special_attack()
            && self.rng.f32() < self.config.special_attack_chance;

        let report = if use_special {
            self.attack.special_attack(anchor, world)
        } else {
            self.attack.attack(anchor, world)
        };

        if let Some(report) = report {
            self.signals.publish(&EncounterSignal::AttackPerformed {
                special: use_special,
                hits: report.hits.len(),
            });
        }
    }

    fn set_state(&mut self, state: BossState) {
        if self.state == state {
            return;
        }
        let from = self.state;
        self.state = state;
        if !matches!(state, BossState::Chasing) {
            self.desired_velocity = Vec2::ZERO;
        }
        debug!(
            "Boss '{}' state: {} -> {}",
            self.config.name,
            from.display_name(),
            state.display_name()
        );
        self.signals.publish(&EncounterSignal::StateChanged { from, to: state });
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    fn process_combat_notifications<P>(&mut self, progression: &mut P)
    where
        P: ExperienceSink + ?Sized,
    {
        let boss_events = self
            .boss_feed
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default();
        for event in boss_events {
            match event {
                CombatNotification::Damaged {
                    health, max_health, ..
                } if health > 0.0 && max_health > 0.0 => {
                    let fraction = health / max_health;
                    self.check_phase_transition(fraction);
                    self.check_quiz_end_condition(fraction);
                },
                CombatNotification::Died { .. } => self.on_boss_died(progression),
                _ => {},
            }
        }

        let player_events = self
            .player_feed
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default();
        for event in player_events {
            if matches!(event, CombatNotification::Died { .. }) {
                self.on_player_died();
            }
        }
    }

    fn process_quiz_events(&mut self) {
        let quiz_events = self
            .quiz_feed
            .as_ref()
            .map(Subscription::drain)
            .unwrap_or_default();
        for event in quiz_events {
            if let QuizEvent::Finished { outcome } = event {
                self.on_quiz_battle_completed(outcome);
            }
        }
    }

    fn check_phase_transition(&mut self, health_fraction: f32) {
        if !self.can_change_phase || self.state == BossState::Dead {
            return;
        }
        if self.phase_index >= self.config.last_phase() {
            return;
        }
        let Some(threshold) = self.config.threshold(self.phase_index) else {
            return;
        };
        if health_fraction <= threshold {
            self.transition_to_next_phase();
        }
    }

    fn transition_to_next_phase(&mut self) {
        self.phase_index += 1;
        self.attack.set_damage_multiplier(self.config.damage_multiplier(self.phase_index));
        self.can_change_phase = false;

        info!(
            "Boss '{}' entering phase {}",
            self.config.name,
            self.phase_index + 1
        );
        self.signals.publish(&EncounterSignal::PhaseChanged {
            phase: self.phase_index,
        });

        let previous = self.state;
        self.set_state(BossState::StunLocked);
        self.stun_timer = Some(self.stun.schedule(self.config.phase_stun_duration, previous));
    }

    fn end_stun(&mut self, previous: BossState) {
        self.stun_timer = None;
        if self.state == BossState::StunLocked {
            self.set_state(previous);
        }
        self.can_change_phase = true;
    }

    fn check_quiz_end_condition(&mut self, health_fraction: f32) {
        let busy = self
            .quiz_session
            .as_ref()
            .is_some_and(QuizBattleSession::is_busy);
        if busy && health_fraction <= self.quiz_config.force_end_health_fraction {
            info!("Boss health low, ending quiz battle");
            self.force_end_quiz();
        }
    }

    fn on_boss_died<P>(&mut self, progression: &mut P)
    where
        P: ExperienceSink + ?Sized,
    {
        if let Some(id) = self.stun_timer.take() {
            self.stun.cancel(id);
        }
        self.set_state(BossState::Dead);
        if self.victory_signalled {
            return;
        }
        self.victory_signalled = true;

        let boss_level = u32::try_from(self.phase_index + 1).unwrap_or(u32::MAX);
        info!("Boss '{}' defeated at phase {}", self.config.name, boss_level);
        self.signals.publish(&EncounterSignal::Victory { boss_level });
        progression.award_boss_experience(boss_level);
    }

    fn on_player_died(&mut self) {
        if self.game_over_signalled || self.victory_signalled {
            return;
        }
        self.game_over_signalled = true;
        info!("Player defeated by '{}'", self.config.name);
        self.signals.publish(&EncounterSignal::GameOver);
    }

    // ========================================================================
    // Quiz hand-off
    // ========================================================================

    fn should_start_quiz(&self, distance: f32) -> bool {
        self.quiz_config.enabled
            && !self.quiz_completed
            && self.quiz_session.is_none()
            && distance <= self.quiz_config.detection_radius
    }

    /// Starts the quiz battle now, regardless of distance.
    ///
    /// Returns false if quiz mode is disabled or completed, a session already
    /// ran, or there is no player.
    pub fn start_quiz_battle(&mut self) -> bool {
        if !self.quiz_config.enabled || self.quiz_completed || self.quiz_session.is_some() {
            return false;
        }
        let Some(player) = self.player else {
            warn!("Cannot start quiz battle without a player");
            return false;
        };

        let combatants = QuizCombatants {
            player,
            boss: self.boss,
        };
        let mut session =
            QuizBattleSession::new(self.questions.clone(), self.quiz_config.clone(), combatants)
                .with_seed(self.rng.u64(..));
        self.quiz_feed = Some(session.subscribe());

        info!("Starting quiz battle with '{}'", self.config.name);
        self.signals.publish(&EncounterSignal::QuizStarted {
            questions: session.question_count(),
        });
        self.desired_velocity = Vec2::ZERO;
        session.begin();
        self.quiz_session = Some(session);
        true
    }

    /// Force-ends a running quiz battle and disables quiz mode.
    ///
    /// Safe to call at any time. Returns true if a session was ended.
    pub fn force_end_quiz(&mut self) -> bool {
        let ended = self
            .quiz_session
            .as_mut()
            .is_some_and(QuizBattleSession::force_end);
        if ended {
            self.quiz_completed = true;
        }
        ended
    }

    fn on_quiz_battle_completed(&mut self, outcome: QuizOutcome) {
        self.quiz_completed = true;
        info!("Quiz battle completed: {}", outcome.display_name());
        self.signals.publish(&EncounterSignal::QuizFinished { outcome });
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the behaviour state.
    #[must_use]
    pub const fn state(&self) -> BossState {
        self.state
    }

    /// Returns the current phase index.
    #[must_use]
    pub const fn phase_index(&self) -> usize {
        self.phase_index
    }

    /// Checks if a phase transition may start (no stun in progress).
    #[must_use]
    pub const fn can_change_phase(&self) -> bool {
        self.can_change_phase
    }

    /// Returns the seconds left on the phase stun, if one is running.
    #[must_use]
    pub fn stun_remaining(&self) -> Option<f32> {
        self.stun_timer.and_then(|id| self.stun.remaining(id))
    }

    /// Returns the velocity the boss wants this tick; locomotion is external.
    #[must_use]
    pub const fn desired_velocity(&self) -> Vec2 {
        self.desired_velocity
    }

    /// Returns the unit direction towards the player's last known position.
    #[must_use]
    pub const fn facing(&self) -> Vec2 {
        self.facing
    }

    /// Returns movement speed including the phase multiplier.
    #[must_use]
    pub fn current_speed(&self) -> f32 {
        self.config.move_speed * self.config.speed_multiplier(self.phase_index)
    }

    /// Returns the boss's attack profile.
    #[must_use]
    pub const fn attack_profile(&self) -> &AttackProfile {
        &self.attack
    }

    /// Returns the quiz session, once one has started.
    #[must_use]
    pub const fn quiz_session(&self) -> Option<&QuizBattleSession> {
        self.quiz_session.as_ref()
    }

    /// Returns the quiz session for input delivery.
    pub fn quiz_session_mut(&mut self) -> Option<&mut QuizBattleSession> {
        self.quiz_session.as_mut()
    }

    /// Checks if quiz mode has finished for this encounter.
    #[must_use]
    pub const fn quiz_completed(&self) -> bool {
        self.quiz_completed
    }

    /// Checks if real-time combat is suspended by a running quiz.
    #[must_use]
    pub fn is_real_time_paused(&self) -> bool {
        self.quiz_session
            .as_ref()
            .is_some_and(QuizBattleSession::is_busy)
    }

    /// Returns the boss entity.
    #[must_use]
    pub const fn boss(&self) -> EntityId {
        self.boss
    }

    /// Returns the player entity, if any.
    #[must_use]
    pub const fn player(&self) -> Option<EntityId> {
        self.player
    }

    /// Returns the boss configuration in effect.
    #[must_use]
    pub const fn config(&self) -> &BossConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Arena;
    use crate::attack::AttackConfig;
    use crate::stats::CombatEntity;
    use lorekeeper_common::{Faction, FactionMask};
    use proptest::prelude::*;

    #[derive(Default)]
    struct Rewards(Vec<u32>);

    impl ExperienceSink for Rewards {
        fn award_boss_experience(&mut self, boss_level: u32) {
            self.0.push(boss_level);
        }
    }

    struct Fixture {
        arena: Arena,
        encounter: BossEncounter,
        signals: Subscription<EncounterSignal>,
        rewards: Rewards,
        boss: EntityId,
        player: EntityId,
    }

    impl Fixture {
        fn new(config: &EncounterConfig, player_at: Vec2) -> Self {
            Self::with_questions(config, player_at, Vec::new())
        }

        fn with_questions(
            config: &EncounterConfig,
            player_at: Vec2,
            questions: Vec<QuizQuestion>,
        ) -> Self {
            let mut arena = Arena::new();
            let boss = arena.spawn(
                CombatEntity::new(100.0).with_crit_chance(0.0),
                Vec2::ZERO,
                Faction::Boss,
            );
            let player = arena.spawn_with_attack(
                CombatEntity::new(500.0).with_crit_chance(0.0),
                player_at,
                Faction::Player,
                AttackProfile::from_config(&AttackConfig {
                    crit_chance: 0.0,
                    ..AttackConfig::default()
                })
                .with_targets(FactionMask::of(Faction::Boss)),
            );
            let attack = AttackProfile::from_config(&config.boss_combatant.attack)
                .with_targets(FactionMask::of(Faction::Player));
            let mut encounter = BossEncounter::new(config, boss, Some(player), attack, &mut arena)
                .with_questions(questions)
                .with_seed(7);
            let signals = encounter.subscribe();
            Self {
                arena,
                encounter,
                signals,
                rewards: Rewards::default(),
                boss,
                player,
            }
        }

        fn tick(&mut self, dt: f32) {
            self.encounter.tick(dt, &mut self.arena, &mut self.rewards);
        }

        fn hit_boss(&mut self, amount: f32) {
            self.arena
                .combatant_mut(self.boss)
                .expect("boss spawned")
                .take_damage(amount, true, false);
        }

        fn boss_health(&self) -> f32 {
            self.arena.combatant(self.boss).expect("boss spawned").health()
        }
    }

    fn real_time_config() -> EncounterConfig {
        let mut config = EncounterConfig::default();
        config.quiz.enabled = false;
        config
    }

    fn questions() -> Vec<QuizQuestion> {
        vec![
            QuizQuestion::new("2 + 2?", &["4", "5"], 0),
            QuizQuestion::new("Capital of France?", &["Lyon", "Paris"], 1),
        ]
    }

    #[test]
    fn test_phase_change_at_seventy_percent() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(20.0, 0.0));

        fx.hit_boss(30.0);
        fx.tick(0.0);

        assert!((fx.boss_health() - 70.0).abs() < f32::EPSILON);
        assert_eq!(fx.encounter.phase_index(), 1);
        assert_eq!(fx.encounter.state(), BossState::StunLocked);
        assert!(!fx.encounter.can_change_phase());
        assert!((fx.encounter.attack_profile().damage_multiplier() - 1.2).abs() < f32::EPSILON);

        let signals = fx.signals.drain();
        assert!(signals.contains(&EncounterSignal::PhaseChanged { phase: 1 }));
        assert!(signals.contains(&EncounterSignal::StateChanged {
            from: BossState::Idle,
            to: BossState::StunLocked,
        }));
    }

    #[test]
    fn test_stun_restores_previous_state() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.0, 0.0));
        fx.tick(0.1);
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Attacking);

        fx.hit_boss(30.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.state(), BossState::StunLocked);

        fx.tick(1.0);
        assert_eq!(fx.encounter.state(), BossState::StunLocked);
        let left = fx.encounter.stun_remaining().expect("stun running");
        assert!((left - 1.0).abs() < 1e-4);

        fx.tick(1.1);
        assert_eq!(fx.encounter.state(), BossState::Attacking);
        assert!(fx.encounter.can_change_phase());
        assert_eq!(fx.encounter.stun_remaining(), None);
    }

    #[test]
    fn test_phases_advance_in_order_without_retrigger() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(20.0, 0.0));

        // One big hit crosses two thresholds but only advances one phase.
        fx.hit_boss(60.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.phase_index(), 1);

        // Damage during the stun is ignored for phase purposes.
        fx.hit_boss(1.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.phase_index(), 1);

        fx.tick(2.5);
        fx.hit_boss(1.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.phase_index(), 2);

        // Last phase reached: no further transitions.
        fx.tick(2.5);
        fx.hit_boss(30.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.phase_index(), 2);
        assert_ne!(fx.encounter.state(), BossState::StunLocked);
    }

    #[test]
    fn test_special_attack_only_from_phase_two() {
        let mut config = real_time_config();
        config.boss.special_attack_chance = 1.0;
        let mut fx = Fixture::new(&config, Vec2::new(1.0, 0.0));

        fx.tick(0.1);
        fx.tick(0.1);
        fx.tick(0.1);
        fx.hit_boss(30.0);
        fx.tick(2.5);
        fx.tick(2.0);
        fx.hit_boss(25.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.phase_index(), 2);
        fx.tick(2.5);

        let signals = fx.signals.drain();
        let phase_two = signals
            .iter()
            .position(|s| *s == EncounterSignal::PhaseChanged { phase: 2 })
            .expect("reached phase 2");
        let specials_before = signals[..phase_two]
            .iter()
            .filter(|s| matches!(s, EncounterSignal::AttackPerformed { special: true, .. }))
            .count();
        let basics_before = signals[..phase_two]
            .iter()
            .filter(|s| matches!(s, EncounterSignal::AttackPerformed { special: false, .. }))
            .count();
        let specials_after = signals[phase_two..]
            .iter()
            .filter(|s| matches!(s, EncounterSignal::AttackPerformed { special: true, .. }))
            .count();

        assert_eq!(specials_before, 0);
        assert!(basics_before > 0);
        assert_eq!(specials_after, 1);
    }

    #[test]
    fn test_death_signals_victory_once_and_awards_experience() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.0, 0.0));
        fx.tick(0.1);
        fx.tick(0.1);
        let _ = fx.signals.drain();

        fx.hit_boss(30.0);
        fx.tick(2.5);
        fx.hit_boss(200.0);
        fx.tick(0.1);
        fx.tick(0.1);

        assert_eq!(fx.encounter.state(), BossState::Dead);
        assert_eq!(fx.rewards.0, vec![2]);
        let signals = fx.signals.drain();
        let victories = signals
            .iter()
            .filter(|s| matches!(s, EncounterSignal::Victory { .. }))
            .count();
        assert_eq!(victories, 1);
        assert!(signals.contains(&EncounterSignal::Victory { boss_level: 2 }));
    }

    #[test]
    fn test_dead_boss_never_attacks() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.0, 0.0));
        fx.tick(0.1);
        fx.tick(0.1);
        fx.tick(2.0);
        let _ = fx.signals.drain();
        let player_health = fx.arena.combatant(fx.player).expect("spawned").health();

        fx.hit_boss(500.0);
        fx.tick(2.0);
        fx.tick(2.0);

        assert!(!fx
            .signals
            .drain()
            .iter()
            .any(|s| matches!(s, EncounterSignal::AttackPerformed { .. })));
        let after = fx.arena.combatant(fx.player).expect("spawned").health();
        assert!((after - player_health).abs() < f32::EPSILON);
        assert_eq!(fx.encounter.desired_velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_attack_hysteresis() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.5, 0.0));
        fx.tick(0.1);
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Attacking);

        fx.arena.set_position(fx.player, Vec2::new(2.3, 0.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Attacking);

        fx.arena.set_position(fx.player, Vec2::new(2.6, 0.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Chasing);

        fx.arena.set_position(fx.player, Vec2::new(2.3, 0.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Chasing);
        assert!((fx.encounter.desired_velocity() - Vec2::new(3.0, 0.0)).length() < 1e-5);
        assert!((fx.encounter.facing() - Vec2::X).length() < 1e-5);
    }

    #[test]
    fn test_detection_radius_and_idle() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(20.0, 0.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Idle);

        fx.arena.set_position(fx.player, Vec2::new(0.0, 6.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Chasing);
        assert!(fx.encounter.desired_velocity().y > 0.0);

        fx.arena.set_position(fx.player, Vec2::new(0.0, 9.0));
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Idle);
        assert_eq!(fx.encounter.desired_velocity(), Vec2::ZERO);
    }

    #[test]
    fn test_missing_player_stays_idle() {
        let mut arena = Arena::new();
        let boss = arena.spawn(CombatEntity::new(100.0), Vec2::ZERO, Faction::Boss);
        let config = real_time_config();
        let mut encounter =
            BossEncounter::new(&config, boss, None, AttackProfile::default(), &mut arena);
        let mut rewards = Rewards::default();

        encounter.tick(1.0, &mut arena, &mut rewards);

        assert_eq!(encounter.state(), BossState::Idle);
        assert!(!encounter.start_quiz_battle());
    }

    #[test]
    fn test_player_death_signals_game_over_once() {
        let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.0, 0.0));
        fx.tick(0.1);
        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Attacking);

        fx.arena
            .combatant_mut(fx.player)
            .expect("spawned")
            .take_damage(1000.0, true, false);
        fx.tick(0.1);
        fx.tick(0.1);

        assert_eq!(fx.encounter.state(), BossState::Idle);
        let game_overs = fx
            .signals
            .drain()
            .iter()
            .filter(|s| **s == EncounterSignal::GameOver)
            .count();
        assert_eq!(game_overs, 1);
    }

    #[test]
    fn test_quiz_suspends_state_machine() {
        let mut fx =
            Fixture::with_questions(&EncounterConfig::default(), Vec2::new(3.0, 0.0), questions());

        fx.tick(0.1);
        assert!(fx.encounter.is_real_time_paused());
        assert!(fx
            .signals
            .drain()
            .contains(&EncounterSignal::QuizStarted { questions: 2 }));

        for _ in 0..10 {
            fx.tick(0.5);
        }
        assert_eq!(fx.encounter.state(), BossState::Idle);
        assert_eq!(fx.encounter.desired_velocity(), Vec2::ZERO);
        assert!(fx.encounter.is_real_time_paused());
    }

    #[test]
    fn test_quiz_completion_resumes_real_time() {
        let mut fx = Fixture::with_questions(
            &EncounterConfig::default(),
            Vec2::new(3.0, 0.0),
            vec![QuizQuestion::new("2 + 2?", &["4", "5"], 0)],
        );

        fx.tick(0.1);
        let session = fx.encounter.quiz_session_mut().expect("quiz started");
        assert!(session.submit_answer(0));

        fx.tick(1.0);
        assert!(fx.boss_health() < 100.0);
        fx.tick(1.6);

        assert!(fx.encounter.quiz_completed());
        assert!(!fx.encounter.is_real_time_paused());
        assert!(fx.signals.drain().contains(&EncounterSignal::QuizFinished {
            outcome: QuizOutcome::Completed,
        }));

        fx.tick(0.1);
        assert_eq!(fx.encounter.state(), BossState::Chasing);
        assert!(fx.encounter.quiz_session().is_some_and(|s| s.is_finished()));
    }

    #[test]
    fn test_low_health_force_ends_quiz() {
        let mut fx =
            Fixture::with_questions(&EncounterConfig::default(), Vec2::new(3.0, 0.0), questions());

        fx.tick(0.1);
        assert!(fx.encounter.is_real_time_paused());

        fx.hit_boss(90.0);
        fx.tick(0.0);

        assert!(fx.encounter.quiz_completed());
        assert!(!fx.encounter.is_real_time_paused());
        assert!(fx
            .signals
            .drain()
            .contains(&EncounterSignal::QuizFinished {
                outcome: QuizOutcome::ForceEnded,
            }));
        assert_eq!(
            fx.encounter.quiz_session().and_then(QuizBattleSession::outcome),
            Some(QuizOutcome::ForceEnded)
        );

        // Calling it again has no further effect.
        assert!(!fx.encounter.force_end_quiz());
        fx.tick(0.0);
        assert!(fx.signals.drain().is_empty());
    }

    #[test]
    fn test_boss_death_mid_quiz_finishes_as_victory() {
        let mut fx =
            Fixture::with_questions(&EncounterConfig::default(), Vec2::new(3.0, 0.0), questions());
        let end_delay = EncounterConfig::default().quiz.end_delay;

        fx.tick(0.1);
        assert!(fx.encounter.is_real_time_paused());
        let _ = fx.signals.drain();

        fx.hit_boss(100.0);
        fx.tick(0.0);
        assert_eq!(fx.encounter.state(), BossState::Dead);
        assert_eq!(fx.rewards.0, vec![1]);
        // The session waits out its end delay.
        assert!(fx.encounter.is_real_time_paused());
        assert!(!fx.encounter.quiz_completed());

        fx.tick(end_delay * 0.5);
        assert!(fx.encounter.quiz_session().is_some_and(|s| s.outcome().is_none()));

        fx.tick(end_delay);
        fx.tick(end_delay);

        assert!(!fx.encounter.is_real_time_paused());
        assert!(fx.encounter.quiz_completed());
        assert_eq!(
            fx.encounter.quiz_session().and_then(QuizBattleSession::outcome),
            Some(QuizOutcome::Victory)
        );

        let signals = fx.signals.drain();
        let victories = signals
            .iter()
            .filter(|s| matches!(s, EncounterSignal::Victory { .. }))
            .count();
        let finished: Vec<_> = signals
            .iter()
            .filter(|s| matches!(s, EncounterSignal::QuizFinished { .. }))
            .collect();
        assert_eq!(victories, 1);
        assert_eq!(
            finished,
            vec![&EncounterSignal::QuizFinished {
                outcome: QuizOutcome::Victory
            }]
        );
        assert_eq!(fx.rewards.0, vec![1]);
    }

    proptest! {
        #[test]
        fn test_phase_index_monotonic(
            steps in prop::collection::vec((0.0f32..40.0, 0.0f32..3.0), 1..40)
        ) {
            let mut fx = Fixture::new(&real_time_config(), Vec2::new(1.0, 0.0));
            let last_phase = fx.encounter.config().last_phase();
            let mut previous = fx.encounter.phase_index();

            for (damage, dt) in steps {
                fx.hit_boss(damage);
                fx.tick(dt);
                let phase = fx.encounter.phase_index();
                prop_assert!(phase >= previous);
                prop_assert!(phase <= last_phase);
                previous = phase;
            }
        }
    }
}
