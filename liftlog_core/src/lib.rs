#![forbid(unsafe_code)]

//! Core domain model and business logic for the Liftlog workout tracker.
//!
//! This crate provides:
//! - Domain types (routines, exercise templates, set entries, workout logs)
//! - The workout session engine and its rest timer
//! - Completion client for the generative-language API
//! - Persistence (namespaced document store with live snapshots)
//! - Views over history and progress, demo data, CSV export
//! - The application shell that wires identity, stores and sessions together

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod timer;
pub mod session;
pub mod completion;
pub mod store;
pub mod identity;
pub mod routines;
pub mod history;
pub mod progress;
pub mod demo;
pub mod export;
pub mod shell;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use timer::{format_clock, RestCategory, RestTimer};
pub use session::{RestSuggestionRequest, RestSuggestionResponse, WorkoutSession};
pub use completion::{CompletionClient, CompletionRequest, CompletionTransport, GeminiTransport};
pub use store::{BatchStore, FileStore, LogStore, RoutineStore, Subscription, WriteBatch};
pub use identity::{sign_in, Credentials, Identity};
pub use routines::{generate_routine, RoutineEditor};
pub use shell::{AppContext, Shell, Tab};
