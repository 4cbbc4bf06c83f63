//! # Evidence Indexer
//!
//! Lists the searchable files of a repository and caches the listing for the
//! lifetime of the owning [`Scanner`].
//!
//! ## Pipeline
//!
//! ```text
//! Repository root
//!     │
//!     ├──> git ls-files (when .git exists)
//!     │      └─> or a bounded directory walk
//!     │
//!     ├──> Exclusion rules (VCS, vendor, build dirs, binary media)
//!     │
//!     └──> RepoIndex (cached per root, reused while the bound fits)
//! ```
//!
//! Binary sniffing ([`is_binary_file`]) is applied by callers when files are
//! read, not while listing.
//!
//! ## Example
//!
//! ```no_run
//! use evidence_indexer::Scanner;
//!
//! fn main() -> evidence_indexer::Result<()> {
//!     let scanner = Scanner::new();
//!     let index = scanner.build_index("/path/to/repo".as_ref(), 4_000)?;
//!     println!("{} files via {:?}", index.len(), index.source);
//!     Ok(())
//! }
//! ```

mod binary;
mod error;
mod filters;
mod git;
mod scanner;

pub use binary::{is_binary_file, looks_binary, BINARY_SNIFF_BYTES};
pub use error::{IndexerError, Result};
pub use filters::{is_excluded_path, EXCLUDED_DIRS, EXCLUDED_EXTENSIONS};
pub use scanner::{ListingSource, RepoIndex, Scanner};
