//! In-memory transport and helpers shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::ApiError;
use crate::transport::ApiTransport;
use crate::types::{OwnerType, RawOwner, RawRepo, Repository, TreeEntry, TreeResponse};

pub fn raw_repo(owner: &str, name: &str) -> RawRepo {
    RawRepo {
        owner: RawOwner {
            login: owner.to_string(),
        },
        name: name.to_string(),
        full_name: format!("{}/{}", owner, name),
        default_branch: Some("main".to_string()),
        fork: false,
        archived: false,
        mirror_url: None,
        size: 1024,
    }
}

pub fn repository(owner: &str, name: &str) -> Repository {
    Repository::from_raw(raw_repo(owner, name), None).unwrap()
}

pub fn tree(entries: &[(&str, &str, u64)]) -> TreeResponse {
    TreeResponse {
        entries: entries
            .iter()
            .map(|(path, mode, size)| TreeEntry::new(*path, *mode, *size))
            .collect(),
        truncated: false,
    }
}

/// Scriptable [`ApiTransport`]. Unknown owners, repositories and trees are
/// `NotFound`.
#[derive(Default)]
pub struct FakeTransport {
    pub owners: HashMap<String, OwnerType>,
    pub listings: HashMap<String, Vec<RawRepo>>,
    pub repos: HashMap<String, RawRepo>,
    /// Keyed by full name.
    pub trees: HashMap<String, TreeResponse>,
    pub failing_trees: HashSet<String>,
    pub tree_delay: Duration,
    /// Per-repository delay, overriding `tree_delay`.
    pub slow_trees: HashMap<String, Duration>,
    /// Last commit date per path, served through GraphQL.
    pub history: HashMap<String, DateTime<Utc>>,
    pub history_error: Option<ApiError>,

    pub list_calls: Mutex<Vec<(u32, String)>>,
    pub tree_calls: Mutex<Vec<String>>,
    pub queries: Mutex<Vec<String>>,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeTransport {
    /// Registers an explicit repository with the given tree.
    pub fn with_repo(mut self, owner: &str, name: &str, tree: TreeResponse) -> Self {
        let full_name = format!("{}/{}", owner, name);
        self.repos.insert(full_name.clone(), raw_repo(owner, name));
        self.trees.insert(full_name, tree);
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ApiTransport for FakeTransport {
    async fn get_owner_type(&self, name: &str) -> Result<OwnerType, ApiError> {
        self.owners.get(name).copied().ok_or(ApiError::NotFound)
    }

    async fn list_repositories(
        &self,
        owner: &str,
        _owner_type: OwnerType,
        page: u32,
        per_page: u32,
        type_hint: &str,
    ) -> Result<Vec<RawRepo>, ApiError> {
        self.list_calls
            .lock()
            .unwrap()
            .push((page, type_hint.to_string()));
        let all = self.listings.get(owner).cloned().unwrap_or_default();
        Ok(all
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect())
    }

    async fn get_repository(&self, owner: &str, name: &str) -> Result<RawRepo, ApiError> {
        self.repos
            .get(&format!("{}/{}", owner, name))
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn get_tree(
        &self,
        owner: &str,
        name: &str,
        git_ref: &str,
    ) -> Result<TreeResponse, ApiError> {
        let full_name = format!("{}/{}", owner, name);
        self.tree_calls
            .lock()
            .unwrap()
            .push(format!("{}@{}", full_name, git_ref));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = self
            .slow_trees
            .get(&full_name)
            .copied()
            .unwrap_or(self.tree_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_trees.contains(&full_name) {
            return Err(ApiError::Server {
                status: 500,
                message: "Internal Server Error".to_string(),
            });
        }
        self.trees.get(&full_name).cloned().ok_or(ApiError::NotFound)
    }

    async fn query_commit_history(&self, query: &str) -> Result<Value, ApiError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(err) = &self.history_error {
            return Err(err.clone());
        }

        let alias = Regex::new(r#"(file\d+):history\(first:1,path:("(?:[^"\\]|\\.)*")\)"#).unwrap();
        let mut target = Map::new();
        for caps in alias.captures_iter(query) {
            let path: String = serde_json::from_str(&caps[2]).unwrap();
            let nodes = match self.history.get(&path) {
                Some(date) => json!([{ "committedDate": date.to_rfc3339() }]),
                None => json!([]),
            };
            target.insert(caps[1].to_string(), json!({ "nodes": nodes }));
        }

        Ok(json!({ "repository": { "ref": { "target": Value::Object(target) } } }))
    }
}

/// A `Write` handle whose bytes can be inspected after the fact.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
