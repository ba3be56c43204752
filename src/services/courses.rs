//! Course catalog — course list, generation, detail, and the user profile.
//!
//! DESIGN
//! ======
//! Courses are the containers chapters live in. The catalog is read-through:
//! every call goes to the backend, since generation runs server-side and a
//! course's status and progress change without the client doing anything.
//! The one piece of client logic is resolving a chapter inside a course
//! detail into the `Chapter` a chat session binds to.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{ErrorCode, ValidationError};
use crate::gateway::types::{Course, CourseChapter, CourseRequest, CourseSummary, ProfileUser};
use crate::gateway::{CourseGateway, GatewayError};
use crate::state::chat::Chapter;

/// Shortest accepted course topic, after trimming.
pub const MIN_TOPIC_LEN: usize = 3;
/// Accepted course lengths, in weeks.
pub const DURATION_WEEKS: std::ops::RangeInclusive<u32> = 1..=52;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CourseError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("chapter {chapter_id} not found in course {course_id}")]
    UnknownChapter { course_id: String, chapter_id: String },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ErrorCode for CourseError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(e) => e.error_code(),
            Self::UnknownChapter { .. } => "E_UNKNOWN_CHAPTER",
            Self::Gateway(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Gateway(e) if e.retryable())
    }
}

/// Profile with its courses split by completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileOverview {
    pub user: ProfileUser,
    pub completed: Vec<CourseSummary>,
    pub pending: Vec<CourseSummary>,
}

impl ProfileOverview {
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed.len() + self.pending.len()
    }
}

// =============================================================================
// CATALOG
// =============================================================================

pub struct CourseCatalog {
    gateway: Arc<dyn CourseGateway>,
}

impl CourseCatalog {
    pub fn new(gateway: Arc<dyn CourseGateway>) -> Self {
        Self { gateway }
    }

    /// # Errors
    ///
    /// The gateway failure.
    pub async fn list(&self) -> Result<Vec<CourseSummary>, CourseError> {
        let list = self.gateway.list_courses().await?;
        debug!(courses = list.courses.len(), "courses: listed");
        Ok(list.courses)
    }

    /// Ask the backend to generate a course. The returned summary is usually
    /// still `Generating`.
    ///
    /// # Errors
    ///
    /// [`CourseError::Validation`] for a blank or short topic or an
    /// out-of-range duration, without a gateway call. Otherwise the gateway
    /// failure.
    pub async fn generate(&self, mut request: CourseRequest) -> Result<CourseSummary, CourseError> {
        request.topic = request.topic.trim().to_owned();
        validate_course_request(&request)?;
        let reply = self.gateway.generate_course(&request).await?;
        info!(course_id = %reply.course.id, topic = %request.topic, "courses: generation started");
        Ok(reply.course)
    }

    /// # Errors
    ///
    /// The gateway failure.
    pub async fn course(&self, course_id: &str) -> Result<Course, CourseError> {
        Ok(self.gateway.fetch_course(course_id).await?.course)
    }

    /// Resolve one chapter of a course into a chat binding.
    ///
    /// # Errors
    ///
    /// [`CourseError::UnknownChapter`] when the course has no such chapter,
    /// or the gateway failure.
    pub async fn chapter(&self, course_id: &str, chapter_id: &str) -> Result<Chapter, CourseError> {
        let course = self.course(course_id).await?;
        find_chapter(&course, chapter_id)
            .map(CourseChapter::to_chapter)
            .ok_or_else(|| CourseError::UnknownChapter {
                course_id: course_id.to_owned(),
                chapter_id: chapter_id.to_owned(),
            })
    }

    /// # Errors
    ///
    /// The gateway failure.
    pub async fn profile(&self) -> Result<ProfileOverview, CourseError> {
        let reply = self.gateway.fetch_profile().await?;
        let (completed, pending): (Vec<_>, Vec<_>) = reply.courses.into_iter().partition(|c| c.is_completed);
        Ok(ProfileOverview { user: reply.user, completed, pending })
    }
}

/// Chapter ids are matched exactly; a chapter number also matches, so
/// `chat <course> 2` works from the listing.
#[must_use]
pub fn find_chapter<'a>(course: &'a Course, chapter_id: &str) -> Option<&'a CourseChapter> {
    course
        .chapters
        .iter()
        .find(|c| c.id == chapter_id)
        .or_else(|| {
            let number = chapter_id.parse::<u32>().ok()?;
            course.chapters.iter().find(|c| c.chapter_number == number)
        })
}

/// # Errors
///
/// The first rule the request breaks.
pub fn validate_course_request(request: &CourseRequest) -> Result<(), ValidationError> {
    let topic = request.topic.trim();
    if topic.is_empty() {
        return Err(ValidationError::MissingTopic);
    }
    if topic.chars().count() < MIN_TOPIC_LEN {
        return Err(ValidationError::TopicTooShort { min: MIN_TOPIC_LEN });
    }
    if !DURATION_WEEKS.contains(&request.duration) {
        return Err(ValidationError::DurationOutOfRange { min: *DURATION_WEEKS.start(), max: *DURATION_WEEKS.end() });
    }
    Ok(())
}

#[cfg(test)]
#[path = "courses_test.rs"]
mod tests;
