//! Client core for the FAB profile analyzer.
//!
//! Three concerns, layered bottom-up:
//!
//! - [`api`]: resilient HTTP access with a typed error taxonomy and bounded
//!   retry for idempotent reads.
//! - [`tracker`]: the analysis job state machine - start, poll, cache the
//!   terminal result, survive restarts via persisted ids.
//! - [`session`]: interview session recovery and draft handling.
//!
//! Persistence goes through the [`storage::KeyValueStore`] trait; production
//! code injects [`storage::FileStore`], tests inject
//! [`storage::MemoryStore`].

pub mod api;
pub mod models;
pub mod session;
pub mod storage;
pub mod tracker;

pub use api::{ApiClient, ApiError, ClientConfig, ResumeFile, StartAnalysisRequest};
pub use session::{InterviewFlow, Recovery};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use tracker::{AnalysisTracker, AnalysisView, TrackerConfig, TrackerPhase};
