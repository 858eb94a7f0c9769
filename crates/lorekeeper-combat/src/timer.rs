//! Tick-driven timers.
//!
//! This module provides:
//! - Scheduled continuations stored as data (remaining time + payload)
//! - Cancellation by id
//! - Deterministic firing order when several timers expire in one tick
//!
//! Every timed wait in combat (cooldowns, buff expiry, stun, quiz delays)
//! is a [`Timers`] entry advanced by the owner's `tick`.

/// Handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct ScheduledTimer<T> {
    id: TimerId,
    remaining: f32,
    payload: T,
}

/// A set of pending timers carrying payloads of type `T`.
#[derive(Debug, Clone)]
pub struct Timers<T> {
    pending: Vec<ScheduledTimer<T>>,
    next_id: u64,
}

impl<T> Default for Timers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Timers<T> {
    /// Creates an empty timer set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            next_id: 1,
        }
    }

    /// Schedules `payload` to fire after `delay` seconds.
    ///
    /// Negative or non-finite delays fire on the next [`advance`](Self::advance).
    pub fn schedule(&mut self, delay: f32, payload: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let remaining = if delay.is_finite() { delay.max(0.0) } else { 0.0 };
        self.pending.push(ScheduledTimer {
            id,
            remaining,
            payload,
        });
        id
    }

    /// Cancels a timer, returning its payload if it was still pending.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let index = self.pending.iter().position(|t| t.id == id)?;
        Some(self.pending.remove(index).payload)
    }

    /// Cancels every pending timer and returns their payloads.
    pub fn clear(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|t| t.payload).collect()
    }

    /// Returns the time left on a pending timer.
    #[must_use]
    pub fn remaining(&self, id: TimerId) -> Option<f32> {
        self.pending.iter().find(|t| t.id == id).map(|t| t.remaining)
    }

    /// Iterates pending payloads with their remaining time.
    pub fn entries(&self) -> impl Iterator<Item = (&T, f32)> {
        self.pending.iter().map(|t| (&t.payload, t.remaining))
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Checks if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Advances every timer by `dt` seconds and returns the payloads that expired.
    ///
    /// Expired payloads are ordered by how early they expired within the
    /// step; timers expiring at the same instant keep scheduling order.
    pub fn advance(&mut self, dt: f32) -> Vec<T> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        for timer in &mut self.pending {
            timer.remaining -= dt;
        }

        if !self.pending.iter().any(|t| t.remaining <= 0.0) {
            return Vec::new();
        }

        let (mut expired, still_pending): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|t| t.remaining <= 0.0);
        self.pending = still_pending;

        // Stable sort keeps scheduling order for ties.
        expired.sort_by(|a, b| a.remaining.total_cmp(&b.remaining));
        expired.into_iter().map(|t| t.payload).collect()
    }
}
