//! Publish/subscribe notifications between combat components.
//!
//! Each publisher (a combat entity, a boss encounter, a quiz session) owns a
//! [`Notifier`]. Subscribers hold a [`Subscription`] and drain it on their own
//! tick. Dropping a subscription unsubscribes it; the notifier prunes
//! disconnected channels on the next publish.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;

use lorekeeper_common::EntityId;

use crate::boss::BossState;
use crate::quiz::QuizOutcome;

/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

/// Identifies one subscriber of a [`Notifier`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Receiving end of a notifier subscription.
#[derive(Debug)]
pub struct Subscription<E> {
    id: SubscriptionId,
    receiver: Receiver<E>,
}

impl<E> Subscription<E> {
    /// Returns the subscription ID (for explicit unsubscribe).
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Takes the next pending event, if any.
    pub fn try_next(&self) -> Option<E> {
        self.receiver.try_recv().ok()
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<E> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

/// Fan-out publisher owned by the component that emits events.
#[derive(Debug)]
pub struct Notifier<E> {
    subscribers: Vec<(SubscriptionId, Sender<E>)>,
    next_id: u64,
    capacity: usize,
}

impl<E: Clone> Default for Notifier<E> {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl<E: Clone> Notifier<E> {
    /// Creates a notifier whose subscriber channels hold `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Vec::new(),
            next_id: 1,
            capacity: capacity.max(1),
        }
    }

    /// Registers a new subscriber.
    pub fn subscribe(&mut self) -> Subscription<E> {
        let (sender, receiver) = bounded(self.capacity);
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, sender));
        Subscription { id, receiver }
    }

    /// Removes a subscriber. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Delivers an event to every live subscriber.
    pub fn publish(&mut self, event: &E) {
        self.subscribers
            .retain(|(id, sender)| match sender.try_send(event.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    // Non-blocking send - if full, event is dropped
                    warn!("Subscriber {id:?} is full, dropping event");
                    true
                },
                Err(TrySendError::Disconnected(_)) => false,
            });
    }

    /// Returns the number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Returns the per-subscriber channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

// ============================================================================
// Notification payloads
// ============================================================================

/// Notifications published by a [`CombatEntity`](crate::stats::CombatEntity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatNotification {
    /// Damage was applied
    Damaged {
        /// Entity that took damage
        entity: EntityId,
        /// Effective damage applied
        amount: f32,
        /// Whether the hit was critical
        critical: bool,
        /// Health after the hit
        health: f32,
        /// Maximum health
        max_health: f32,
    },
    /// Health was restored
    Healed {
        /// Entity that was healed
        entity: EntityId,
        /// Amount actually restored
        amount: f32,
        /// Health after healing
        health: f32,
    },
    /// Health reached zero
    Died {
        /// Entity that died
        entity: EntityId,
    },
}

impl CombatNotification {
    /// Returns the entity the notification is about.
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        match self {
            Self::Damaged { entity, .. } | Self::Healed { entity, .. } | Self::Died { entity } => {
                *entity
            },
        }
    }
}

/// Signals published by a [`BossEncounter`](crate::boss::BossEncounter) to the game flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncounterSignal {
    /// Behaviour state changed
    StateChanged {
        /// Previous state
        from: BossState,
        /// New state
        to: BossState,
    },
    /// Boss advanced to a new phase
    PhaseChanged {
        /// New phase index
        phase: usize,
    },
    /// Boss executed an attack
    AttackPerformed {
        /// Whether it was the special attack
        special: bool,
        /// Number of targets hit
        hits: usize,
    },
    /// A quiz battle started
    QuizStarted {
        /// Number of questions in the session
        questions: usize,
    },
    /// A quiz battle finished and real-time control resumed
    QuizFinished {
        /// How the session ended
        outcome: QuizOutcome,
    },
    /// Boss died
    Victory {
        /// Level used for the experience reward (phase index + 1)
        boss_level: u32,
    },
    /// Player died
    GameOver,
}

/// Events published by a [`QuizBattleSession`](crate::quiz::QuizBattleSession)
/// for UI and its owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QuizEvent {
    /// A question is ready for input
    QuestionPresented {
        /// Question index
        index: usize,
        /// Total questions in the session
        total: usize,
        /// Question text
        text: String,
        /// Answer choices
        choices: Vec<String>,
    },
    /// Selected answer moved
    SelectionChanged {
        /// Newly selected answer index
        index: usize,
    },
    /// An answer was submitted and locked in
    AnswerLocked {
        /// Submitted answer index
        choice: usize,
        /// Whether it was correct
        correct: bool,
    },
    /// Damage for the locked answer was applied
    AnswerResolved {
        /// Whether the answer was correct
        correct: bool,
        /// Effective damage dealt
        damage: f32,
        /// Whether the player's strike was critical
        critical: bool,
        /// Explanation shown after an incorrect answer
        explanation: Option<String>,
    },
    /// The session ended
    Finished {
        /// How the session ended
        outcome: QuizOutcome,
    },
}
