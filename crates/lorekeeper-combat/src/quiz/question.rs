//! Quiz content: questions, question sets, and the validated question bank.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use lorekeeper_common::{ContentError, LorekeeperError, LorekeeperResult, SchemaVersion};

/// Built-in history quiz sets.
const HISTORY_SETS: &str = include_str!("../../data/quizzes/history.ron");

/// Reasons a question is rejected at load time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionError {
    /// Question has no text
    #[error("question text is empty")]
    EmptyText,
    /// Question has no answer choices
    #[error("question has no answer choices")]
    EmptyChoices,
    /// Correct answer index does not name a choice
    #[error("correct answer index {index} out of range for {len} choices")]
    CorrectIndexOutOfRange {
        /// Index found in the data
        index: i32,
        /// Number of choices
        len: usize,
    },
}

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question text
    pub text: String,
    /// Answer choices in display order
    pub answer_choices: Vec<String>,
    /// Index of the correct choice
    pub correct_answer_index: i32,
    /// Scales damage dealt and taken for this question (values below 1 count as 1)
    #[serde(default = "default_difficulty")]
    pub difficulty_multiplier: f32,
    /// Shown after an incorrect answer
    #[serde(default)]
    pub explanation: Option<String>,
}

fn default_difficulty() -> f32 {
    1.0
}

impl QuizQuestion {
    /// Creates a question.
    #[must_use]
    pub fn new<S: Into<String>>(text: S, choices: &[&str], correct_answer_index: i32) -> Self {
        Self {
            text: text.into(),
            answer_choices: choices.iter().map(|c| (*c).to_string()).collect(),
            correct_answer_index,
            difficulty_multiplier: 1.0,
            explanation: None,
        }
    }

    /// Sets the difficulty multiplier.
    #[must_use]
    pub fn with_difficulty(mut self, multiplier: f32) -> Self {
        self.difficulty_multiplier = multiplier;
        self
    }

    /// Sets the explanation text.
    #[must_use]
    pub fn with_explanation<S: Into<String>>(mut self, explanation: S) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Checks the question is answerable.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.text.trim().is_empty() {
            return Err(QuestionError::EmptyText);
        }
        if self.answer_choices.is_empty() {
            return Err(QuestionError::EmptyChoices);
        }
        let in_range = usize::try_from(self.correct_answer_index)
            .is_ok_and(|index| index < self.answer_choices.len());
        if !in_range {
            return Err(QuestionError::CorrectIndexOutOfRange {
                index: self.correct_answer_index,
                len: self.answer_choices.len(),
            });
        }
        Ok(())
    }

    /// Checks if `choice` is the correct answer.
    #[must_use]
    pub fn is_correct(&self, choice: usize) -> bool {
        usize::try_from(self.correct_answer_index).is_ok_and(|index| index == choice)
    }

    /// Difficulty used for damage scaling, never below 1.
    #[must_use]
    pub fn damage_scale(&self) -> f32 {
        if self.difficulty_multiplier.is_finite() {
            self.difficulty_multiplier.max(1.0)
        } else {
            1.0
        }
    }
}

/// A named collection of questions loaded from a content file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizSet {
    /// Display title
    pub title: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Content schema version
    #[serde(default)]
    pub version: SchemaVersion,
    /// Questions in authored order
    pub questions: Vec<QuizQuestion>,
    /// Question the set starts from; earlier questions follow at the end
    #[serde(default)]
    pub start_question_index: usize,
}

impl QuizSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new<S: Into<String>>(title: S) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            version: SchemaVersion::QUIZ_SET,
            questions: Vec::new(),
            start_question_index: 0,
        }
    }

    /// Adds a question.
    #[must_use]
    pub fn with_question(mut self, question: QuizQuestion) -> Self {
        self.questions.push(question);
        self
    }

    /// Parses a list of sets from RON text.
    pub fn list_from_ron_str(source: &str) -> LorekeeperResult<Vec<Self>> {
        let sets: Vec<Self> =
            ron::from_str(source).map_err(|e| ContentError::Parse(e.to_string()))?;
        for set in &sets {
            SchemaVersion::QUIZ_SET.check_readable(&set.version)?;
        }
        Ok(sets)
    }

    /// Loads a list of sets from a RON file.
    pub fn load_all<P: AsRef<Path>>(path: P) -> LorekeeperResult<Vec<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ContentError::NotFound(path.display().to_string()).into());
        }
        let contents = fs::read_to_string(path)?;
        let sets = Self::list_from_ron_str(&contents)?;
        info!("Loaded {} quiz set(s) from {}", sets.len(), path.display());
        Ok(sets)
    }

    /// Writes a list of sets to a RON file.
    pub fn save_all<P: AsRef<Path>>(sets: &[Self], path: P) -> LorekeeperResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = ron::ser::to_string_pretty(sets, ron::ser::PrettyConfig::default())
            .map_err(|e| LorekeeperError::Serialization(e.to_string()))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// The built-in history quiz sets.
    pub fn builtin() -> LorekeeperResult<Vec<Self>> {
        Self::list_from_ron_str(HISTORY_SETS)
    }

    /// Questions starting at `start_question_index`, wrapping around.
    pub fn ordered_questions(&self) -> impl Iterator<Item = &QuizQuestion> {
        let start = if self.questions.is_empty() {
            0
        } else {
            self.start_question_index % self.questions.len()
        };
        self.questions[start..]
            .iter()
            .chain(self.questions[..start].iter())
    }
}

/// Validated questions ready to be handed to a quiz session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuizBank {
    questions: Vec<QuizQuestion>,
    rejected: usize,
}

impl QuizBank {
    /// Builds a bank from sets, skipping malformed questions.
    ///
    /// When `shuffle` is set the combined list is shuffled with `rng`.
    pub fn from_sets(sets: &[QuizSet], shuffle: bool, rng: &mut fastrand::Rng) -> Self {
        let mut bank = Self::default();
        for set in sets {
            if set.questions.is_empty() {
                warn!("Quiz set '{}' is empty", set.title);
                continue;
            }
            for (index, question) in set.ordered_questions().enumerate() {
                match question.validate() {
                    Ok(()) => bank.questions.push(question.clone()),
                    Err(e) => {
                        warn!("Skipping question {index} of '{}': {e}", set.title);
                        bank.rejected += 1;
                    },
                }
            }
        }
        if shuffle {
            shuffle_questions(&mut bank.questions, rng);
        }
        info!(
            "Quiz bank ready: {} question(s), {} rejected",
            bank.questions.len(),
            bank.rejected
        );
        bank
    }

    /// Builds a bank from loose questions, skipping malformed ones.
    pub fn from_questions(questions: Vec<QuizQuestion>) -> Self {
        let mut rng = fastrand::Rng::with_seed(0);
        let set = QuizSet {
            questions,
            ..QuizSet::new("inline")
        };
        Self::from_sets(std::slice::from_ref(&set), false, &mut rng)
    }

    /// Returns the questions.
    #[must_use]
    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    /// Returns the number of questions rejected by validation.
    #[must_use]
    pub const fn rejected(&self) -> usize {
        self.rejected
    }

    /// Returns the number of questions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Checks if the bank has no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Fisher-Yates shuffle.
pub fn shuffle_questions<T>(items: &mut [T], rng: &mut fastrand::Rng) {
    let n = items.len();
    for i in 0..n.saturating_sub(1) {
        let j = rng.usize(i..n);
        items.swap(i, j);
    }
}
