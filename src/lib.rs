//! tutordesk — client core for an AI tutoring backend.
//!
//! ARCHITECTURE
//! ============
//! `store` persists small JSON documents between runs. `gateway` is the only
//! code that talks to the backend. `state` holds plain data types with their
//! pure transitions, and `services` wraps them in managers that sequence
//! gateway calls, persistence, and notifications. The `tutordesk` binary is
//! one consumer of these managers; a UI would be another.

pub mod config;
pub mod error;
pub mod gateway;
pub mod services;
pub mod state;
pub mod store;
