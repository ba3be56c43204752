//! Wire types for the tutoring backend.
//!
//! Request bodies are camelCase; homework rows and progress come back
//! snake_case. Every reply carries a `success` flag, checked by the HTTP
//! layer before these types are decoded.

use serde::{Deserialize, Serialize};

use crate::state::chat::{Chapter, ChatMessage};
use crate::state::homework::{ChapterProgress, HomeworkProblem, null_as_default, string_or_number};

// =============================================================================
// CHAT
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    pub chapter_title: String,
    pub chapter_notes: Option<String>,
    pub chapter_id: Option<String>,
    pub conversation_history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

// =============================================================================
// HOMEWORK
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HomeworkSet {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub problems: Vec<HomeworkProblem>,
    #[serde(default)]
    pub progress: Option<ChapterProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateReply {
    #[serde(default)]
    pub success: bool,
}

/// Body of `POST /api/homework/:chapterId`. Hint requests set `request_hint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub problem_id: String,
    pub solution: String,
    pub solution_image: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub request_hint: bool,
}

impl SubmitRequest {
    #[must_use]
    pub fn hint(problem_id: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            solution: "hint request".to_owned(),
            solution_image: None,
            request_hint: true,
        }
    }

    #[must_use]
    pub fn text(problem_id: impl Into<String>, solution: impl Into<String>) -> Self {
        Self { problem_id: problem_id.into(), solution: solution.into(), solution_image: None, request_hint: false }
    }

    #[must_use]
    pub fn image(problem_id: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            problem_id: problem_id.into(),
            solution: String::new(),
            solution_image: Some(data_url.into()),
            request_hint: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub is_correct: bool,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub suggestions: Option<String>,
    #[serde(default)]
    pub attempts: Option<u32>,
    #[serde(default)]
    pub hint: Option<String>,
}

// =============================================================================
// DOUBTS
// =============================================================================

/// A question asked in chat and the answer it got, saved per chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doubt {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DoubtList {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub doubts: Vec<Doubt>,
}

// =============================================================================
// AUTH
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthReply {
    #[serde(default)]
    pub success: bool,
    pub token: String,
    pub user: AuthUser,
}

// =============================================================================
// COURSES
// =============================================================================

/// Generation state of a course. Unrecognized values read as `Unknown`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CourseStatus {
    Generating,
    Ready,
    Failed,
    #[default]
    Unknown,
}

impl CourseStatus {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "generating" => Self::Generating,
            "ready" => Self::Ready,
            "failed" => Self::Failed,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for CourseStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

/// One row of the course list, also embedded in the profile.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Length in weeks.
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_completed: bool,
    /// Percent complete, 0 to 100.
    #[serde(default, deserialize_with = "null_as_default")]
    pub progress: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_chapters: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed_chapters: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseList {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub courses: Vec<CourseSummary>,
}

/// Body of `POST /api/course/generate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseRequest {
    pub topic: String,
    pub difficulty: String,
    /// Length in weeks, 1 to 52.
    pub duration: u32,
    pub include_videos: bool,
    pub language: String,
    pub category: String,
    pub description: String,
}

impl Default for CourseRequest {
    fn default() -> Self {
        Self {
            topic: String::new(),
            difficulty: "Beginner".to_owned(),
            duration: 4,
            include_videos: true,
            language: "English".to_owned(),
            category: "Programming".to_owned(),
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerateCourseReply {
    #[serde(default)]
    pub success: bool,
    pub course: CourseSummary,
}

/// A chapter as listed in a course detail.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseChapter {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapter_number: u32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ai_generated_notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default, rename = "homeworkProgress")]
    pub homework_progress: Option<ChapterProgress>,
}

impl CourseChapter {
    /// The chat binding for this chapter. Blank notes are dropped.
    #[must_use]
    pub fn to_chapter(&self) -> Chapter {
        let chapter = Chapter::new(self.id.clone(), self.title.clone());
        match self.ai_generated_notes.as_deref().map(str::trim) {
            Some(notes) if !notes.is_empty() => chapter.with_notes(notes),
            _ => chapter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub status: CourseStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_progress: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapters: Vec<CourseChapter>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CourseReply {
    #[serde(default)]
    pub success: bool,
    pub course: Course,
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUser {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProfileReply {
    #[serde(default)]
    pub success: bool,
    pub user: ProfileUser,
    #[serde(default, deserialize_with = "null_as_default")]
    pub courses: Vec<CourseSummary>,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
