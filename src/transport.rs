use async_trait::async_trait;
use serde_json::Value;

use crate::error::ApiError;
use crate::types::{OwnerType, RawRepo, TreeResponse};

/// The narrow slice of the GitHub API the search core relies on.
///
/// Implementations own authentication, caching and retry policy. Every call is
/// one logical request.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn get_owner_type(&self, name: &str) -> Result<OwnerType, ApiError>;

    /// One page of an owner's repositories. `type_hint` is the API's `type`
    /// query parameter (`all`, `owner`, `sources`, `forks`).
    async fn list_repositories(
        &self,
        owner: &str,
        owner_type: OwnerType,
        page: u32,
        per_page: u32,
        type_hint: &str,
    ) -> Result<Vec<RawRepo>, ApiError>;

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RawRepo, ApiError>;

    /// The full recursive tree at `git_ref`.
    async fn get_tree(&self, owner: &str, name: &str, git_ref: &str)
        -> Result<TreeResponse, ApiError>;

    /// Runs a GraphQL query and returns its `data` object.
    async fn query_commit_history(&self, query: &str) -> Result<Value, ApiError>;
}
