//! # GitHub File Finding
//!
//! Find files by glob pattern across many GitHub repositories at once, using
//! the Git trees API instead of cloning.
//!
//! ## Main Components
//!
//! - [`Finder`]: resolves repository specs and searches them concurrently
//! - [`GitHubClient`]: the REST/GraphQL [`ApiTransport`] with rate-limit handling and caching
//! - [`Output`]: serialized sink for matches and warnings
//! - [`Args`]: command line arguments
//!
//! ## Example
//!
//! ```no_run
//! use github_file_finding::{
//!     CancelToken, ClientOptions, Finder, GitHubClient, Output, OutputOptions, SearchOptions,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let client = GitHubClient::new(ClientOptions::new(std::env::var("GITHUB_TOKEN")?))?;
//!     let output = Arc::new(Output::stdio(OutputOptions::default()));
//!     let finder = Finder::new(Arc::new(client), output, CancelToken::new());
//!
//!     let opts = SearchOptions {
//!         pattern: "*.go".to_string(),
//!         repo_specs: vec!["cli/cli".to_string(), "octocat".to_string()],
//!         ..SearchOptions::default()
//!     };
//!     let summary = finder.find(&opts).await?;
//!     eprintln!("{} matches", summary.matches);
//!
//!     Ok(())
//! }
//! ```

pub mod args;
pub mod cache;
pub mod cancel;
pub mod commit_dates;
pub mod error;
pub mod filters;
pub mod finder;
pub mod github_client;
pub mod options;
pub mod output;
pub mod parse;
pub mod pattern;
pub mod resolver;
pub mod transport;
pub mod tree;
pub mod types;

#[cfg(test)]
mod testing;

pub use crate::args::{Args, ColorMode};
pub use crate::cancel::CancelToken;
pub use crate::error::{ApiError, FindError};
pub use crate::finder::{FindSummary, Finder};
pub use crate::github_client::{ClientOptions, GitHubClient};
pub use crate::options::SearchOptions;
pub use crate::output::{Output, OutputOptions};
pub use crate::transport::ApiTransport;
pub use crate::types::{FileType, RepoTypes, Repository, RepositorySpec, TreeEntry};
