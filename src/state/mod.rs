//! Client-side state models.
//!
//! DESIGN
//! ======
//! State is split by domain (`chat`, `homework`) so each manager owns one
//! focused tree. The types here are plain data plus pure transitions; the
//! async orchestration that drives them lives in `services`.

pub mod chat;
pub mod homework;

/// Current UTC time as an RFC 3339 string.
#[must_use]
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}
