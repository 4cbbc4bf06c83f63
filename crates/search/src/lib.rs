mod error;
mod multi;
mod query;
mod repo;
mod scoring;

pub use error::{Result, SearchError};
pub use multi::Aggregator;
pub use query::{tokenize, Query, MAX_QUERY_TOKENS};
pub use repo::{FileCandidate, RepoSearcher};
pub use scoring::{render_excerpt, score_lines, FileScore};
