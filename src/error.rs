//! Shared error vocabulary.
//!
//! DESIGN
//! ======
//! Each layer owns its own `thiserror` enum (`GatewayError`, `ChatError`,
//! `HomeworkError`, ...). They all implement `ErrorCode` so the outer surface
//! can render a stable code and decide whether a retry hint is worth showing.
//! Client-side validation failures share one enum because they are shown
//! inline next to the input that caused them.

/// Stable machine-readable code for an error, plus a retry hint.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Input rejected before any state mutation or network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("message must not be empty")]
    EmptyMessage,

    #[error("Please provide a solution (text or image)")]
    EmptySolution,

    #[error("Please upload an image file")]
    NotAnImage { mime: String },

    #[error("Image size should be less than 5MB")]
    ImageTooLarge { size: usize, limit: usize },

    #[error("Please fill all fields")]
    MissingFields,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },

    #[error("Topic is required")]
    MissingTopic,

    #[error("Topic must be at least {min} characters")]
    TopicTooShort { min: usize },

    #[error("Duration must be between {min}-{max} weeks")]
    DurationOutOfRange { min: u32, max: u32 },
}

impl ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "E_EMPTY_MESSAGE",
            Self::EmptySolution => "E_EMPTY_SOLUTION",
            Self::NotAnImage { .. } => "E_NOT_AN_IMAGE",
            Self::ImageTooLarge { .. } => "E_IMAGE_TOO_LARGE",
            Self::MissingFields => "E_MISSING_FIELDS",
            Self::PasswordTooShort { .. } => "E_PASSWORD_TOO_SHORT",
            Self::MissingTopic => "E_MISSING_TOPIC",
            Self::TopicTooShort { .. } => "E_TOPIC_TOO_SHORT",
            Self::DurationOutOfRange { .. } => "E_DURATION_OUT_OF_RANGE",
        }
    }
}
