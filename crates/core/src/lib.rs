//! Core client for a conversational language-learning service.
//!
//! The crate models one learning session end to end: picking a language and
//! difficulty from the remote catalog, negotiating a roleplay scenario with
//! the AI tutor, holding the conversation turn by turn, and reviewing the
//! resolution. All remote access goes through the [`api::TutorApi`] trait;
//! [`session::SessionOrchestrator`] is the main entry point.

pub mod api;
pub mod conversation;
pub mod error;
pub mod locale;
pub mod scenario;
pub mod session;
