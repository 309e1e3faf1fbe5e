use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{FindError, Result};
use crate::transport::ApiTransport;
use crate::types::{Repository, TreeResponse};

/// Fetches the full recursive tree of `repo` at its resolved ref.
///
/// A truncated tree is returned as-is with `truncated` set; the caller decides
/// how to report it.
pub async fn fetch_tree(
    transport: &dyn ApiTransport,
    cancel: &CancelToken,
    repo: &Repository,
) -> Result<TreeResponse> {
    let tree = cancel
        .run(transport.get_tree(&repo.owner, &repo.name, &repo.git_ref))
        .await
        .map_err(|e| FindError::api(format!("failed to get tree at {}", repo.git_ref), e))?;

    debug!(
        "Fetched {} entries for {}@{}{}",
        tree.entries.len(),
        repo.full_name,
        repo.git_ref,
        if tree.truncated { " (truncated)" } else { "" }
    );
    Ok(tree)
}
