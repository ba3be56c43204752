//! Client-side managers that sit between a UI and the gateway.
//!
//! ARCHITECTURE
//! ============
//! Each manager owns one slice of state behind a short-lived lock, talks to
//! the backend through an injected gateway trait object, and persists its
//! durable fields to the store after every mutation. Locks are never held
//! across an `.await`; in-flight flags are cleared by drop guards so every
//! exit path, including cancellation, resets them.

pub mod auth;
pub mod chat;
pub mod courses;
pub mod doubts;
pub mod homework;
