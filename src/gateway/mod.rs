//! Gateway — the backend operations the client core depends on.
//!
//! DESIGN
//! ======
//! `TutorGateway` is the one seam between the state managers and the
//! network. It is stateless request/response: no streaming, no push, the
//! caller re-fetches to observe server-side changes. `HttpGateway` is the
//! production implementation; tests inject a mock behind the same trait.
//! Course catalog and account calls sit behind their own traits so a manager
//! only sees the operations it uses.

pub mod http;
pub mod types;

#[cfg(test)]
pub mod test_helpers;

pub use http::HttpGateway;

use types::{
    AuthReply, ChatReply, ChatRequest, CourseList, CourseReply, CourseRequest, Credentials, DoubtList,
    GenerateCourseReply, GenerateReply, HomeworkSet, ProfileReply, Registration, SubmitReply, SubmitRequest,
};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request never produced an HTTP response.
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Server { status: u16, message: String },

    /// The backend answered 2xx but flagged the call as unsuccessful.
    #[error("{0}")]
    Rejected(String),

    /// The response body did not match the expected shape.
    #[error("response decode failed: {0}")]
    Decode(String),

    /// No bearer token is stored; the user must sign in first.
    #[error("not signed in")]
    MissingToken,

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl crate::error::ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Network(_) => "E_NETWORK",
            Self::Server { .. } => "E_SERVER",
            Self::Rejected(_) => "E_REJECTED",
            Self::Decode(_) => "E_DECODE",
            Self::MissingToken => "E_MISSING_TOKEN",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Server { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// GATEWAY TRAIT
// =============================================================================

/// Backend operations consumed by the chat and homework managers.
#[async_trait::async_trait]
pub trait TutorGateway: Send + Sync {
    /// One chat turn: `POST /api/chat`.
    async fn send_chat_message(&self, request: &ChatRequest) -> Result<ChatReply, GatewayError>;

    /// Problems and progress for a chapter: `GET /api/homework/:chapterId`.
    async fn fetch_homework(&self, chapter_id: &str) -> Result<HomeworkSet, GatewayError>;

    /// Trigger problem generation: `POST /api/homework/generate/:chapterId`.
    async fn generate_homework(&self, chapter_id: &str) -> Result<GenerateReply, GatewayError>;

    /// Submit a solution or request a hint: `POST /api/homework/:chapterId`.
    async fn submit_homework(&self, chapter_id: &str, request: &SubmitRequest) -> Result<SubmitReply, GatewayError>;

    /// Saved Q&A pairs for a chapter: `GET /api/doubts/:chapterId`.
    async fn fetch_doubts(&self, chapter_id: &str) -> Result<DoubtList, GatewayError>;
}

/// Course catalog and profile operations behind the chapter views.
#[async_trait::async_trait]
pub trait CourseGateway: Send + Sync {
    /// The signed-in user's courses: `GET /api/course/list`.
    async fn list_courses(&self) -> Result<CourseList, GatewayError>;

    /// Start generating a new course: `POST /api/course/generate`.
    async fn generate_course(&self, request: &CourseRequest) -> Result<GenerateCourseReply, GatewayError>;

    /// One course with its chapters: `GET /api/course/:id`.
    async fn fetch_course(&self, course_id: &str) -> Result<CourseReply, GatewayError>;

    /// `GET /api/user/profile`.
    async fn fetch_profile(&self) -> Result<ProfileReply, GatewayError>;
}

/// Unauthenticated account operations. These never carry a bearer token.
#[async_trait::async_trait]
pub trait AuthGateway: Send + Sync {
    /// `POST /api/auth/signin`.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthReply, GatewayError>;

    /// `POST /api/auth/signup`.
    async fn sign_up(&self, registration: &Registration) -> Result<AuthReply, GatewayError>;
}
