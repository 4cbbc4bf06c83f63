//! Round-based evidence gathering.
//!
//! [`ResearchController::collect_evidence`] runs up to `max_rounds` rounds:
//! round one consults the sources picked by a [`QuestionClassifier`], later
//! rounds follow a [`Planner`]. Every round fans its repository queries out to
//! a [`RepoEvidenceBackend`] (normally the worker pool) and its external
//! queries to an [`ExternalEvidenceProvider`] concurrently.

mod classifier;
mod config;
mod controller;
mod error;
mod http;
mod planner;
mod traits;

pub use classifier::{Classification, ClassifyRequest, HeuristicClassifier};
pub use config::ResearchConfig;
pub use controller::{ResearchController, ResearchOutcome};
pub use error::{ExternalFailure, ResearchError, Result};
pub use http::HttpEvidenceProvider;
pub use planner::{PlannerDecision, PlannerRequest};
pub use traits::{
    ExternalEvidence, ExternalEvidenceProvider, Planner, QuestionClassifier, RepoEvidenceBackend,
};
