//! Homework data model and per-problem interaction records.
//!
//! DESIGN
//! ======
//! `HomeworkProblem` mirrors the backend's problem rows. Everything the
//! student does to a problem (drafts, revealed hints, last feedback) lives in
//! an `Interaction`, keyed by problem id inside a `HomeworkLedger`. The ledger
//! reads absent keys as a default record, so callers never branch on
//! "has this problem been touched yet".
//!
//! PERSISTENCE
//! ===========
//! `LedgerSnapshot` is the on-disk form, `{solutions, feedback, hints,
//! shownHints}`. Image drafts and in-flight flags are never persisted.

use std::collections::{BTreeMap, BTreeSet};

use base64::Engine as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

/// Largest accepted image attachment, in bytes.
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

// =============================================================================
// PROBLEMS
// =============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Case-insensitive parse; anything unrecognized reads as `Medium`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "easy" => Self::Easy,
            "hard" => Self::Hard,
            _ => Self::Medium,
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

/// A homework problem as served by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomeworkProblem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hints: Vec<String>,
    #[serde(default)]
    pub is_solved: bool,
    #[serde(default)]
    pub user_attempts: u32,
}

/// Chapter-level completion summary. The homework endpoint sends it
/// snake_case; course details embed it camelCase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterProgress {
    #[serde(default, alias = "totalProblems")]
    pub total_problems: u32,
    #[serde(default, alias = "solvedProblems")]
    pub solved_problems: u32,
    #[serde(default, alias = "completionPercentage")]
    pub completion_percentage: f64,
    #[serde(default, alias = "isCompleted")]
    pub is_completed: bool,
}

impl ChapterProgress {
    /// Progress computed locally, for replies that omit the summary.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_problems(problems: &[HomeworkProblem]) -> Self {
        let total = problems.len() as u32;
        let solved = problems.iter().filter(|p| p.is_solved).count() as u32;
        let completion_percentage = if total == 0 { 0.0 } else { f64::from(solved) * 100.0 / f64::from(total) };
        Self {
            total_problems: total,
            solved_problems: solved,
            completion_percentage,
            is_completed: total > 0 && solved == total,
        }
    }
}

pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!("expected string or number id, got {other}"))),
    }
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// FEEDBACK
// =============================================================================

/// Grading result for the latest submission of a problem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub is_correct: bool,
    #[serde(rename = "feedback", default)]
    pub feedback_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<String>,
    #[serde(rename = "attempts", default, skip_serializing_if = "Option::is_none")]
    pub attempt_number: Option<u32>,
}

impl Feedback {
    /// Feedback recorded when the submission never reached a grader.
    #[must_use]
    pub fn submission_failed(reason: &str) -> Self {
        Self {
            is_correct: false,
            feedback_text: format!("Failed to submit solution: {reason}"),
            score: None,
            suggestions: None,
            attempt_number: None,
        }
    }
}

// =============================================================================
// ATTACHMENTS
// =============================================================================

/// A raw image picked by the student, before encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    /// Validate and encode as a `data:` URL.
    ///
    /// # Errors
    ///
    /// [`ValidationError::NotAnImage`] for non-`image/*` MIME types and
    /// [`ValidationError::ImageTooLarge`] above [`MAX_ATTACHMENT_BYTES`].
    pub fn to_data_url(&self) -> Result<String, ValidationError> {
        if !self.mime.starts_with("image/") {
            return Err(ValidationError::NotAnImage { mime: self.mime.clone() });
        }
        if self.bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ValidationError::ImageTooLarge { size: self.bytes.len(), limit: MAX_ATTACHMENT_BYTES });
        }
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        Ok(format!("data:{};base64,{payload}", self.mime))
    }
}

// =============================================================================
// INTERACTION
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProblemPhase {
    Unattempted,
    Drafting,
    Submitting,
    Correct,
    IncorrectWithFeedback,
}

/// What actually goes over the wire for a submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission {
    Text(String),
    Image(String),
}

/// Everything the student has done to one problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interaction {
    pub draft_text: Option<String>,
    pub draft_image: Option<String>,
    pub shown_hint_count: usize,
    pub revealed_hints: Vec<String>,
    pub feedback: Option<Feedback>,
    pub submission_in_flight: bool,
    pub hint_in_flight: bool,
    edited_since_feedback: bool,
}

impl Interaction {
    pub fn set_draft_text(&mut self, text: impl Into<String>) {
        self.draft_text = Some(text.into());
        self.edited_since_feedback = self.feedback.is_some();
    }

    pub fn set_draft_image(&mut self, data_url: String) {
        self.draft_image = Some(data_url);
        self.edited_since_feedback = self.feedback.is_some();
    }

    pub fn remove_draft_image(&mut self) {
        self.draft_image = None;
    }

    pub fn set_feedback(&mut self, feedback: Option<Feedback>) {
        self.feedback = feedback;
        self.edited_since_feedback = false;
    }

    #[must_use]
    pub fn has_draft(&self) -> bool {
        self.draft_image.is_some() || self.draft_text.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    /// Pick the payload to submit. An attached image wins over drafted text.
    #[must_use]
    pub fn submission(&self) -> Option<Submission> {
        if let Some(image) = self.draft_image.as_ref().filter(|i| !i.is_empty()) {
            return Some(Submission::Image(image.clone()));
        }
        self.draft_text
            .as_ref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| Submission::Text(t.clone()))
    }

    /// Reveal the next static hint, if any remain.
    pub fn reveal_static_hint(&mut self, hints: &[String]) -> Option<String> {
        if self.shown_hint_count >= hints.len() {
            return None;
        }
        self.shown_hint_count += 1;
        self.revealed_hints = hints[..self.shown_hint_count].to_vec();
        hints.get(self.shown_hint_count - 1).cloned()
    }

    pub fn push_generated_hint(&mut self, hint: String) {
        self.revealed_hints.push(hint);
    }

    #[must_use]
    pub fn phase(&self, solved: bool) -> ProblemPhase {
        if self.submission_in_flight {
            return ProblemPhase::Submitting;
        }
        if solved || self.feedback.as_ref().is_some_and(|f| f.is_correct) {
            return ProblemPhase::Correct;
        }
        if self.feedback.is_some() && !self.edited_since_feedback {
            return ProblemPhase::IncorrectWithFeedback;
        }
        if self.has_draft() { ProblemPhase::Drafting } else { ProblemPhase::Unattempted }
    }
}

// =============================================================================
// LEDGER
// =============================================================================

/// Per-problem interactions for one chapter, default-on-read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HomeworkLedger {
    entries: BTreeMap<String, Interaction>,
}

impl HomeworkLedger {
    /// Interaction for `problem_id`, or a fresh default when untouched.
    #[must_use]
    pub fn get(&self, problem_id: &str) -> Interaction {
        self.entries.get(problem_id).cloned().unwrap_or_default()
    }

    /// Mutable interaction for `problem_id`, created on first touch.
    pub fn entry(&mut self, problem_id: &str) -> &mut Interaction {
        self.entries.entry(problem_id.to_owned()).or_default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn to_snapshot(&self) -> LedgerSnapshot {
        let mut snapshot = LedgerSnapshot::default();
        for (id, item) in &self.entries {
            if let Some(text) = &item.draft_text {
                snapshot.solutions.insert(id.clone(), text.clone());
            }
            if let Some(feedback) = &item.feedback {
                snapshot.feedback.insert(id.clone(), Some(feedback.clone()));
            }
            if !item.revealed_hints.is_empty() {
                snapshot.hints.insert(id.clone(), item.revealed_hints.clone());
            }
            if item.shown_hint_count > 0 {
                snapshot.shown_hints.insert(id.clone(), item.shown_hint_count);
            }
        }
        snapshot
    }

    #[must_use]
    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        let LedgerSnapshot { solutions, feedback, hints, shown_hints } = snapshot;
        let ids: BTreeSet<String> = solutions
            .keys()
            .chain(feedback.keys())
            .chain(hints.keys())
            .chain(shown_hints.keys())
            .cloned()
            .collect();

        let mut ledger = Self::default();
        for id in ids {
            let item = ledger.entry(&id);
            item.draft_text = solutions.get(&id).cloned();
            item.feedback = feedback.get(&id).cloned().flatten();
            item.revealed_hints = hints.get(&id).cloned().unwrap_or_default();
            item.shown_hint_count = shown_hints.get(&id).copied().unwrap_or_default();
        }
        ledger
    }
}

/// On-disk form of a [`HomeworkLedger`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub solutions: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub feedback: BTreeMap<String, Option<Feedback>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hints: BTreeMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub shown_hints: BTreeMap<String, usize>,
}

#[cfg(test)]
#[path = "homework_test.rs"]
mod tests;
