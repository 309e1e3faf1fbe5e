use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt::Write;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{FindError, Result};
use crate::transport::ApiTransport;
use crate::types::{FileCommitInfo, Repository};

/// Paths per GraphQL request.
pub const BATCH_SIZE: usize = 100;

/// Looks up the last commit date of each path at the repository's ref.
///
/// Paths without any commit are left out of the result. Any failed batch
/// fails the whole call, since a partial date set would skew filtering.
pub async fn fetch_commit_dates(
    transport: &dyn ApiTransport,
    cancel: &CancelToken,
    repo: &Repository,
    paths: &[String],
) -> Result<Vec<FileCommitInfo>> {
    let mut results = Vec::with_capacity(paths.len());

    for (index, batch) in paths.chunks(BATCH_SIZE).enumerate() {
        debug!(
            "Fetching commit dates for {} batch {} ({} paths)",
            repo.full_name,
            index + 1,
            batch.len()
        );

        let query = build_file_history_query(&repo.owner, &repo.name, &repo.git_ref, batch);
        let data = cancel
            .run(transport.query_commit_history(&query))
            .await
            .map_err(|e| FindError::api("failed to fetch file commit dates", e))?;

        let target = &data["repository"]["ref"]["target"];
        for (i, path) in batch.iter().enumerate() {
            if let Some(committed_date) = last_commit_date(&target[alias(i)]) {
                results.push(FileCommitInfo {
                    path: path.clone(),
                    committed_date,
                });
            }
        }
    }

    Ok(results)
}

fn alias(index: usize) -> String {
    format!("file{}", index)
}

fn last_commit_date(history: &Value) -> Option<DateTime<Utc>> {
    let date = history["nodes"][0]["committedDate"].as_str()?;
    DateTime::parse_from_rfc3339(date)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// One aliased `history(first:1)` lookup per path, in a single compact query:
///
/// ```text
/// {repository(owner:"o",name:"r"){ref(qualifiedName:"main"){target{...on Commit{
///   file0:history(first:1,path:"a.go"){nodes{committedDate}}
///   file1:history(first:1,path:"b.go"){nodes{committedDate}}
/// }}}}}
/// ```
pub fn build_file_history_query(owner: &str, repo: &str, git_ref: &str, paths: &[String]) -> String {
    let mut query = String::with_capacity(200 + paths.len() * 80);

    let _ = write!(
        query,
        "{{repository(owner:{},name:{}){{ref(qualifiedName:{}){{target{{...on Commit{{",
        quote(owner),
        quote(repo),
        quote(git_ref)
    );
    for (i, path) in paths.iter().enumerate() {
        let _ = write!(
            query,
            "{}:history(first:1,path:{}){{nodes{{committedDate}}}}",
            alias(i),
            quote(path)
        );
    }
    query.push_str("}}}}}");
    query
}

/// GraphQL string literals share JSON's escaping rules.
fn quote(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}
