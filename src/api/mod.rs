// API access layer
pub mod client;
pub mod endpoints;
pub mod error;

pub use client::{ApiClient, ClientConfig};
pub use endpoints::{AnalyzerApi, InterviewApi, ResumeFile, StartAnalysisRequest};
pub use error::ApiError;
