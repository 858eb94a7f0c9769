//! Turn-based quiz battle session.
//!
//! A session walks an ordered list of questions. Each submitted answer locks
//! the session, lands a strike after a short delay (player hits boss on a
//! correct answer, boss hits player otherwise), waits for feedback, then
//! either advances to the next question or ends. All damage goes through
//! [`CombatEntity::take_damage`](crate::stats::CombatEntity::take_damage).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use lorekeeper_common::EntityId;

use crate::arena::CombatantStore;
use crate::config::QuizConfig;
use crate::events::{Notifier, QuizEvent, Subscription, SubscriptionId};
use crate::quiz::QuizQuestion;
use crate::timer::Timers;

/// How a quiz session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuizOutcome {
    /// The boss died
    Victory,
    /// The player died
    Defeat,
    /// Every question was answered and both sides survived
    Completed,
    /// The owner ended the session early
    ForceEnded,
}

impl QuizOutcome {
    /// Checks if a combatant died (victory or defeat flow applies).
    #[must_use]
    pub const fn is_decisive(self) -> bool {
        matches!(self, Self::Victory | Self::Defeat)
    }

    /// Returns the display name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Victory => "Victory",
            Self::Defeat => "Defeat",
            Self::Completed => "Completed",
            Self::ForceEnded => "Force Ended",
        }
    }
}

/// The two sides of a quiz battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuizCombatants {
    /// Player entity
    pub player: EntityId,
    /// Boss entity
    pub boss: EntityId,
}

/// Damage applied for one answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnswerResolution {
    /// Whether the answer was correct
    pub correct: bool,
    /// Effective damage applied
    pub damage: f32,
    /// Whether the player's strike was critical
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuizStep {
    Strike { correct: bool },
    Feedback,
    End(QuizOutcome),
}

/// One run of the quiz battle protocol.
#[derive(Debug)]
pub struct QuizBattleSession {
    questions: Vec<QuizQuestion>,
    config: QuizConfig,
    combatants: QuizCombatants,
    current_question_index: usize,
    selected_answer_index: usize,
    active: bool,
    processing_answer: bool,
    outcome: Option<QuizOutcome>,
    last_resolution: Option<AnswerResolution>,
    correct_answers: usize,
    incorrect_answers: usize,
    timers: Timers<QuizStep>,
    rng: fastrand::Rng,
    events: Notifier<QuizEvent>,
}

impl QuizBattleSession {
    /// Creates a session that has not started yet.
    ///
    /// Malformed questions are logged and skipped.
    #[must_use]
    pub fn new(
        questions: Vec<QuizQuestion>,
        config: QuizConfig,
        combatants: QuizCombatants,
    ) -> Self {
        let questions = questions
            .into_iter()
            .enumerate()
            .filter_map(|(index, question)| match question.validate() {
                Ok(()) => Some(question),
                Err(e) => {
                    warn!("Skipping quiz question {index}: {e}");
                    None
                },
            })
            .collect();

        Self {
            questions,
            config,
            combatants,
            current_question_index: 0,
            selected_answer_index: 0,
            active: false,
            processing_answer: false,
            outcome: None,
            last_resolution: None,
            correct_answers: 0,
            incorrect_answers: 0,
            timers: Timers::new(),
            rng: fastrand::Rng::new(),
            events: Notifier::default(),
        }
    }

    /// Seeds the critical-hit roll.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    /// Subscribes to quiz events.
    pub fn subscribe(&mut self) -> Subscription<QuizEvent> {
        self.events.subscribe()
    }

    /// Removes a subscriber.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Starts the session and presents the first question.
    ///
    /// A session without questions ends immediately as [`QuizOutcome::Completed`].
    /// Returns false if the session already started or ended.
    pub fn begin(&mut self) -> bool {
        if self.active || self.outcome.is_some() {
            return false;
        }

        if self.questions.is_empty() {
            warn!("Quiz battle has no questions");
            self.finish(QuizOutcome::Completed);
            return true;
        }

        info!("Quiz battle started with {} question(s)", self.questions.len());
        self.active = true;
        self.current_question_index = 0;
        self.present_current();
        true
    }

    // ========================================================================
    // Input
    // ========================================================================

    /// Moves the selection by `direction`, wrapping around the choices.
    pub fn navigate(&mut self, direction: i32) {
        if !self.accepting_input() {
            return;
        }
        let Some(len) = self.current_question().map(|q| q.answer_choices.len()) else {
            return;
        };
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let current = i64::try_from(self.selected_answer_index).unwrap_or(0);
        let next = (current + i64::from(direction)).rem_euclid(len);
        self.selected_answer_index = usize::try_from(next).unwrap_or(0);
        self.events.publish(&QuizEvent::SelectionChanged {
            index: self.selected_answer_index,
        });
    }

    /// Selects an answer directly. Returns false if the input is ignored.
    pub fn select(&mut self, choice: usize) -> bool {
        if !self.accepting_input() {
            return false;
        }
        let in_range = self
            .current_question()
            .is_some_and(|q| choice < q.answer_choices.len());
        if !in_range {
            return false;
        }
        self.selected_answer_index = choice;
        self.events.publish(&QuizEvent::SelectionChanged { index: choice });
        true
    }

    /// Submits the selected answer.
    pub fn submit(&mut self) -> bool {
        self.submit_answer(self.selected_answer_index)
    }

    /// Submits `choice` for the current question.
    ///
    /// Returns false (and does nothing) while an answer is being resolved,
    /// when the session is not running, or if `choice` is out of range.
    pub fn submit_answer(&mut self, choice: usize) -> bool {
        if !self.accepting_input() {
            debug!("Quiz answer ignored: session busy or not running");
            return false;
        }
        let Some(question) = self.current_question() else {
            return false;
        };
        if choice >= question.answer_choices.len() {
            warn!(
                "Answer {choice} out of range for {} choices",
                question.answer_choices.len()
            );
            return false;
        }

        let correct = question.is_correct(choice);
        self.selected_answer_index = choice;
        self.processing_answer = true;
        self.events.publish(&QuizEvent::AnswerLocked { choice, correct });
        self.timers.schedule(self.config.strike_delay(), QuizStep::Strike { correct });
        debug!(
            "Question {} answered {}",
            self.current_question_index,
            if correct { "correctly" } else { "incorrectly" }
        );
        true
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Advances pending strike, feedback and end steps.
    pub fn tick<W>(&mut self, dt: f32, world: &mut W)
    where
        W: CombatantStore + ?Sized,
    {
        if self.outcome.is_some() {
            return;
        }
        if self.accepting_input() {
            self.end_if_decided(world);
        }
        for step in self.timers.advance(dt) {
            if self.outcome.is_some() {
                break;
            }
            match step {
                QuizStep::Strike { correct } => self.resolve_strike(correct, world),
                QuizStep::Feedback => self.check_termination(world),
                QuizStep::End(outcome) => self.finish(outcome),
            }
        }
    }

    fn resolve_strike<W>(&mut self, correct: bool, world: &mut W)
    where
        W: CombatantStore + ?Sized,
    {
        let Some(question) = self.current_question() else {
            return;
        };
        let scale = question.damage_scale();
        let explanation = if correct {
            None
        } else {
            question.explanation.clone()
        };

        let resolution = if correct {
            self.correct_answers += 1;
            let (base, chance, multiplier) = match world.attack_profile(self.combatants.player) {
                Some(profile) => {
                    (profile.damage(), profile.crit_chance(), profile.crit_multiplier())
                },
                None => (
                    self.config.base_damage_on_correct,
                    self.config.critical_hit_chance,
                    self.config.critical_hit_multiplier,
                ),
            };
            let critical = chance > 0.0 && self.rng.f32() <= chance;
            let damage = base * if critical { multiplier } else { 1.0 } * scale;
            let dealt = match world.combatant_mut(self.combatants.boss) {
                Some(boss) => boss.take_damage(damage, false, false),
                None => {
                    warn!("Quiz boss {} missing, strike skipped", self.combatants.boss);
                    0.0
                },
            };
            AnswerResolution {
                correct,
                damage: dealt,
                critical,
            }
        } else {
            self.incorrect_answers += 1;
            let damage = self.config.base_damage_on_incorrect * scale;
            let dealt = match world.combatant_mut(self.combatants.player) {
                Some(player) => player.take_damage(damage, false, false),
                None => {
                    warn!("Quiz player {} missing, strike skipped", self.combatants.player);
                    0.0
                },
            };
            AnswerResolution {
                correct,
                damage: dealt,
                critical: false,
            }
        };

        self.last_resolution = Some(resolution);
        self.events.publish(&QuizEvent::AnswerResolved {
            correct,
            damage: resolution.damage,
            critical: resolution.critical,
            explanation,
        });
        self.timers.schedule(self.config.feedback_delay(), QuizStep::Feedback);
    }

    fn check_termination<W>(&mut self, world: &W)
    where
        W: CombatantStore + ?Sized,
    {
        if let Some(outcome) = self.decisive_outcome(world) {
            self.timers.schedule(self.config.end_delay, QuizStep::End(outcome));
            return;
        }

        if self.current_question_index + 1 >= self.questions.len() {
            self.finish(QuizOutcome::Completed);
            return;
        }

        self.current_question_index += 1;
        self.selected_answer_index = 0;
        self.processing_answer = false;
        self.present_current();
    }

    /// Victory if the boss is dead, Defeat if the player is.
    fn decisive_outcome<W>(&self, world: &W) -> Option<QuizOutcome>
    where
        W: CombatantStore + ?Sized,
    {
        let dead = |id: EntityId| world.combatant(id).is_some_and(|e| e.is_dead());
        if dead(self.combatants.boss) {
            Some(QuizOutcome::Victory)
        } else if dead(self.combatants.player) {
            Some(QuizOutcome::Defeat)
        } else {
            None
        }
    }

    /// Locks input and schedules the end when a combatant died outside the
    /// quiz while it was waiting for an answer.
    fn end_if_decided<W>(&mut self, world: &W)
    where
        W: CombatantStore + ?Sized,
    {
        let Some(outcome) = self.decisive_outcome(world) else {
            return;
        };
        debug!(
            "Combatant died while awaiting an answer, ending quiz as {}",
            outcome.display_name()
        );
        self.processing_answer = true;
        self.timers.schedule(self.config.end_delay, QuizStep::End(outcome));
    }

    fn present_current(&mut self) {
        let Some(question) = self.questions.get(self.current_question_index) else {
            return;
        };
        self.selected_answer_index = 0;
        self.events.publish(&QuizEvent::QuestionPresented {
            index: self.current_question_index,
            total: self.questions.len(),
            text: question.text.clone(),
            choices: question.answer_choices.clone(),
        });
    }

    fn finish(&mut self, outcome: QuizOutcome) {
        self.timers.clear();
        self.active = false;
        self.processing_answer = false;
        self.outcome = Some(outcome);
        info!(
            "Quiz battle ended: {} ({} correct, {} incorrect)",
            outcome.display_name(),
            self.correct_answers,
            self.incorrect_answers
        );
        self.events.publish(&QuizEvent::Finished { outcome });
    }

    /// Ends the session immediately, cancelling any pending strike or delay.
    ///
    /// Safe to call at any time; only the first call has an effect.
    /// Returns true if this call ended the session.
    pub fn force_end(&mut self) -> bool {
        if self.outcome.is_some() {
            return false;
        }
        self.finish(QuizOutcome::ForceEnded);
        true
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Returns the question being asked.
    #[must_use]
    pub fn current_question(&self) -> Option<&QuizQuestion> {
        if self.outcome.is_some() {
            return None;
        }
        self.questions.get(self.current_question_index)
    }

    /// Returns the current question index.
    #[must_use]
    pub const fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Returns the selected answer index.
    #[must_use]
    pub const fn selected_answer_index(&self) -> usize {
        self.selected_answer_index
    }

    /// Returns the number of valid questions.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    /// Checks if the session is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Checks if an answer is being resolved.
    #[must_use]
    pub const fn is_processing_answer(&self) -> bool {
        self.processing_answer
    }

    /// Checks if the session is running or resolving an answer.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.active || self.processing_answer
    }

    /// Checks if a new answer may be submitted.
    #[must_use]
    pub const fn accepting_input(&self) -> bool {
        self.active && !self.processing_answer
    }

    /// Returns how the session ended, if it has.
    #[must_use]
    pub const fn outcome(&self) -> Option<QuizOutcome> {
        self.outcome
    }

    /// Checks if the session has ended.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    /// Returns the last applied answer.
    #[must_use]
    pub const fn last_resolution(&self) -> Option<AnswerResolution> {
        self.last_resolution
    }

    /// Returns the number of correct answers so far.
    #[must_use]
    pub const fn correct_answers(&self) -> usize {
        self.correct_answers
    }

    /// Returns the number of incorrect answers so far.
    #[must_use]
    pub const fn incorrect_answers(&self) -> usize {
        self.incorrect_answers
    }

    /// Returns the combatants.
    #[must_use]
    pub const fn combatants(&self) -> QuizCombatants {
        self.combatants
    }
}
