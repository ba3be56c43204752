//! Homework manager — the draft, submit, feedback loop for one chapter.
//!
//! DESIGN
//! ======
//! One manager per chapter. It holds the chapter's problems and progress as
//! last served by the backend, plus a `HomeworkLedger` of everything the
//! student has done locally. The ledger is written to the store after every
//! change to drafts, feedback, hints or shown counts, and read back when the
//! manager is constructed.
//!
//! HINTS
//! =====
//! Static hints shipped with a problem are revealed one at a time without a
//! network call. Once they run out, each request asks the backend for a
//! generated hint and appends it; the shown count stays at the static total.
//!
//! IN-FLIGHT FLAGS
//! ===============
//! Submissions and generated-hint requests set a per-problem flag before the
//! gateway call. A second request while the flag is set is refused (submit)
//! or dropped (hint). A drop guard clears the flag on every exit path.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ErrorCode, ValidationError};
use crate::gateway::types::{SubmitReply, SubmitRequest};
use crate::gateway::{GatewayError, TutorGateway};
use crate::state::homework::{
    Attachment, ChapterProgress, Feedback, HomeworkLedger, HomeworkProblem, Interaction, LedgerSnapshot, ProblemPhase,
    Submission,
};
use crate::store::{self, Storage};

// =============================================================================
// ERRORS / OUTCOMES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum HomeworkError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("problem {0} is not loaded")]
    UnknownProblem(String),

    #[error("a submission for this problem is already in progress")]
    SubmissionInFlight,

    #[error("problem is already solved")]
    AlreadySolved,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ErrorCode for HomeworkError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::UnknownProblem(_) => "E_UNKNOWN_PROBLEM",
            Self::SubmissionInFlight => "E_SUBMISSION_IN_FLIGHT",
            Self::AlreadySolved => "E_ALREADY_SOLVED",
            Self::Gateway(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.retryable())
    }
}

/// Result of a hint request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HintOutcome {
    /// Next hint shipped with the problem.
    Static(String),
    /// Hint generated by the backend after static hints ran out.
    Generated(String),
    /// Another generated-hint request for this problem is still running.
    Dropped,
    /// The backend answered without a hint.
    Exhausted,
}

// =============================================================================
// MANAGER
// =============================================================================

#[derive(Default)]
struct HomeworkInner {
    problems: Vec<HomeworkProblem>,
    progress: Option<ChapterProgress>,
    ledger: HomeworkLedger,
}

pub struct HomeworkManager {
    chapter_id: String,
    gateway: Arc<dyn TutorGateway>,
    storage: Arc<dyn Storage>,
    inner: Mutex<HomeworkInner>,
    progress_tx: watch::Sender<Option<ChapterProgress>>,
}

impl HomeworkManager {
    /// Create the manager for `chapter_id`, rehydrating its saved ledger.
    pub fn new(chapter_id: impl Into<String>, gateway: Arc<dyn TutorGateway>, storage: Arc<dyn Storage>) -> Self {
        let chapter_id = chapter_id.into();
        let ledger = store::load_json::<LedgerSnapshot>(storage.as_ref(), &store::homework_key(&chapter_id))
            .map(HomeworkLedger::from_snapshot)
            .unwrap_or_default();
        if !ledger.is_empty() {
            info!(%chapter_id, problems = ledger.len(), "homework: restored saved work");
        }
        let (progress_tx, _) = watch::channel(None);
        Self {
            chapter_id,
            gateway,
            storage,
            inner: Mutex::new(HomeworkInner { ledger, ..HomeworkInner::default() }),
            progress_tx,
        }
    }

    #[must_use]
    pub fn chapter_id(&self) -> &str {
        &self.chapter_id
    }

    #[must_use]
    pub fn problems(&self) -> Vec<HomeworkProblem> {
        self.lock().problems.clone()
    }

    #[must_use]
    pub fn progress(&self) -> Option<ChapterProgress> {
        self.lock().progress
    }

    /// Progress updates, one per successful load.
    #[must_use]
    pub fn subscribe_progress(&self) -> watch::Receiver<Option<ChapterProgress>> {
        self.progress_tx.subscribe()
    }

    #[must_use]
    pub fn interaction(&self, problem_id: &str) -> Interaction {
        self.lock().ledger.get(problem_id)
    }

    #[must_use]
    pub fn phase(&self, problem_id: &str) -> ProblemPhase {
        let inner = self.lock();
        let solved = inner.problems.iter().any(|p| p.id == problem_id && p.is_solved);
        inner.ledger.get(problem_id).phase(solved)
    }

    /// Fetch problems and progress, generating a set first if the chapter
    /// has none yet.
    ///
    /// # Errors
    ///
    /// Any gateway failure; local state is left as it was.
    pub async fn load_problems(&self) -> Result<ChapterProgress, HomeworkError> {
        let mut set = self.gateway.fetch_homework(&self.chapter_id).await?;
        if set.problems.is_empty() {
            info!(chapter_id = %self.chapter_id, "homework: no problems yet, generating");
            self.gateway.generate_homework(&self.chapter_id).await?;
            set = self.gateway.fetch_homework(&self.chapter_id).await?;
        }

        let progress = set.progress.unwrap_or_else(|| ChapterProgress::from_problems(&set.problems));
        debug!(
            chapter_id = %self.chapter_id,
            problems = set.problems.len(),
            solved = progress.solved_problems,
            "homework: loaded"
        );
        {
            let mut inner = self.lock();
            inner.problems = set.problems;
            inner.progress = Some(progress);
        }
        self.progress_tx.send_replace(Some(progress));
        Ok(progress)
    }

    pub fn set_draft_text(&self, problem_id: &str, text: impl Into<String>) {
        let mut inner = self.lock();
        inner.ledger.entry(problem_id).set_draft_text(text);
        self.persist(&inner.ledger);
    }

    /// Attach an image to the draft, replacing any previous one.
    ///
    /// # Errors
    ///
    /// [`HomeworkError::Validation`] when the attachment is not an image or
    /// exceeds the size limit. State is untouched in that case.
    pub fn set_draft_image(&self, problem_id: &str, attachment: &Attachment) -> Result<(), HomeworkError> {
        let data_url = attachment.to_data_url()?;
        self.lock().ledger.entry(problem_id).set_draft_image(data_url);
        Ok(())
    }

    pub fn remove_draft_image(&self, problem_id: &str) {
        self.lock().ledger.entry(problem_id).remove_draft_image();
    }

    /// Reveal the next hint for `problem_id`.
    ///
    /// # Errors
    ///
    /// [`HomeworkError::UnknownProblem`] before problems are loaded, or the
    /// gateway error when a generated hint could not be fetched. Hint state
    /// is unchanged on error.
    pub async fn request_hint(&self, problem_id: &str) -> Result<HintOutcome, HomeworkError> {
        {
            let mut inner = self.lock();
            let hints = inner
                .problems
                .iter()
                .find(|p| p.id == problem_id)
                .map(|p| p.hints.clone())
                .ok_or_else(|| HomeworkError::UnknownProblem(problem_id.to_owned()))?;
            let item = inner.ledger.entry(problem_id);
            if item.hint_in_flight {
                debug!(problem_id, "homework: hint already requested");
                return Ok(HintOutcome::Dropped);
            }
            if let Some(hint) = item.reveal_static_hint(&hints) {
                self.persist(&inner.ledger);
                return Ok(HintOutcome::Static(hint));
            }
            item.hint_in_flight = true;
        }

        let _flight = InFlight { manager: self, problem_id, kind: FlightKind::Hint };
        let reply = self
            .gateway
            .submit_homework(&self.chapter_id, &SubmitRequest::hint(problem_id))
            .await
            .inspect_err(|e| warn!(error = %e, problem_id, "homework: hint request failed"))?;

        match reply.hint.filter(|h| !h.trim().is_empty()) {
            Some(hint) => {
                let mut inner = self.lock();
                inner.ledger.entry(problem_id).push_generated_hint(hint.clone());
                self.persist(&inner.ledger);
                Ok(HintOutcome::Generated(hint))
            }
            None => Ok(HintOutcome::Exhausted),
        }
    }

    /// Submit the current draft for grading.
    ///
    /// Gateway failures do not surface as errors: they are recorded as
    /// failure feedback on the problem and returned like any other grading.
    /// A correct answer triggers one reload of the chapter's problems.
    ///
    /// # Errors
    ///
    /// [`HomeworkError::SubmissionInFlight`], [`HomeworkError::AlreadySolved`]
    /// or [`ValidationError::EmptySolution`]; none of them reach the gateway.
    pub async fn submit_solution(&self, problem_id: &str) -> Result<Feedback, HomeworkError> {
        let request = {
            let mut inner = self.lock();
            let solved = inner.problems.iter().any(|p| p.id == problem_id && p.is_solved);
            let item = inner.ledger.entry(problem_id);
            if item.submission_in_flight {
                return Err(HomeworkError::SubmissionInFlight);
            }
            if solved || item.feedback.as_ref().is_some_and(|f| f.is_correct) {
                return Err(HomeworkError::AlreadySolved);
            }
            let request = match item.submission() {
                Some(Submission::Image(data_url)) => SubmitRequest::image(problem_id, data_url),
                Some(Submission::Text(text)) => SubmitRequest::text(problem_id, text.trim()),
                None => return Err(ValidationError::EmptySolution.into()),
            };
            item.submission_in_flight = true;
            item.set_feedback(None);
            self.persist(&inner.ledger);
            request
        };

        let flight = InFlight { manager: self, problem_id, kind: FlightKind::Submission };
        info!(chapter_id = %self.chapter_id, problem_id, image = request.solution_image.is_some(), "homework: submitting");
        let feedback = match self.gateway.submit_homework(&self.chapter_id, &request).await {
            Ok(reply) => graded(reply),
            Err(e) => {
                warn!(error = %e, problem_id, "homework: submission failed");
                Feedback::submission_failed(&e.to_string())
            }
        };
        {
            let mut inner = self.lock();
            inner.ledger.entry(problem_id).set_feedback(Some(feedback.clone()));
            self.persist(&inner.ledger);
        }
        drop(flight);

        if feedback.is_correct {
            if let Err(e) = self.load_problems().await {
                warn!(error = %e, chapter_id = %self.chapter_id, "homework: refresh after correct answer failed");
            }
        }
        Ok(feedback)
    }

    fn lock(&self) -> MutexGuard<'_, HomeworkInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, ledger: &HomeworkLedger) {
        store::save_json(self.storage.as_ref(), &store::homework_key(&self.chapter_id), &ledger.to_snapshot());
    }
}

fn graded(reply: SubmitReply) -> Feedback {
    Feedback {
        is_correct: reply.is_correct,
        feedback_text: reply.feedback.unwrap_or_default(),
        score: reply.score,
        suggestions: reply.suggestions,
        attempt_number: reply.attempts,
    }
}

// =============================================================================
// IN-FLIGHT GUARD
// =============================================================================

#[derive(Clone, Copy)]
enum FlightKind {
    Hint,
    Submission,
}

struct InFlight<'a> {
    manager: &'a HomeworkManager,
    problem_id: &'a str,
    kind: FlightKind,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut inner = self.manager.lock();
        let item = inner.ledger.entry(self.problem_id);
        match self.kind {
            FlightKind::Hint => item.hint_in_flight = false,
            FlightKind::Submission => item.submission_in_flight = false,
        }
    }
}

#[cfg(test)]
#[path = "homework_test.rs"]
mod tests;
