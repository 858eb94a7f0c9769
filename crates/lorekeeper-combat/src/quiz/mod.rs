//! Quiz battles.
//!
//! This module provides:
//! - Question content loaded from RON, with load-time validation
//! - A question bank built from one or more sets, optionally shuffled
//! - The turn-based [`QuizBattleSession`]

mod question;
mod session;

pub use question::*;
pub use session::*;
