use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::error::FindError;

/// A user-supplied repository selector: `owner`, `owner/repo` or `owner/repo@ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    pub owner: String,
    pub repo: Option<String>,
    pub git_ref: Option<String>,
}

impl RepositorySpec {
    pub fn owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: None,
            git_ref: None,
        }
    }

    pub fn repo(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: Some(repo.into()),
            git_ref: None,
        }
    }

    pub fn with_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }
}

impl FromStr for RepositorySpec {
    type Err = FindError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || FindError::InvalidSpec(spec.to_string());

        let (name, git_ref) = match spec.split_once('@') {
            Some((name, git_ref)) if !git_ref.is_empty() => (name, Some(git_ref)),
            Some(_) => return Err(invalid()),
            None => (spec, None),
        };

        let parts: Vec<&str> = name.split('/').collect();
        let (owner, repo) = match parts.as_slice() {
            [owner] => (*owner, None),
            [owner, repo] if !repo.is_empty() => (*owner, Some(*repo)),
            _ => return Err(invalid()),
        };

        if owner.is_empty() || (repo.is_none() && git_ref.is_some()) {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            repo: repo.map(str::to_string),
            git_ref: git_ref.map(str::to_string),
        })
    }
}

impl fmt::Display for RepositorySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.owner)?;
        if let Some(repo) = &self.repo {
            write!(f, "/{}", repo)?;
        }
        if let Some(git_ref) = &self.git_ref {
            write!(f, "@{}", git_ref)?;
        }
        Ok(())
    }
}

/// Account kind behind an owner name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerType {
    User,
    Organization,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOwner {
    pub login: String,
}

/// Repository as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRepo {
    pub owner: RawOwner,
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub mirror_url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// A resolved repository, searched by exactly one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    /// Explicit ref from the selector, or the default branch.
    pub git_ref: String,
    pub fork: bool,
    pub archived: bool,
    pub mirror: bool,
    pub size: u64,
}

impl Repository {
    /// Builds a repository from its API form. Returns `None` when there is no
    /// ref to search (no explicit ref and no default branch).
    pub fn from_raw(raw: RawRepo, git_ref: Option<&str>) -> Option<Self> {
        let git_ref = match git_ref {
            Some(r) => r.to_string(),
            None => raw.default_branch.filter(|b| !b.is_empty())?,
        };

        Some(Self {
            owner: raw.owner.login,
            name: raw.name,
            full_name: raw.full_name,
            git_ref,
            fork: raw.fork,
            archived: raw.archived,
            mirror: raw.mirror_url.is_some_and(|url| !url.is_empty()),
            size: raw.size,
        })
    }

    /// Fork wins over mirror; everything else is a source.
    pub fn kind(&self) -> RepoKind {
        if self.fork {
            RepoKind::Fork
        } else if self.mirror {
            RepoKind::Mirror
        } else {
            RepoKind::Source
        }
    }

    /// Web URL of `path` at this repository's ref.
    pub fn blob_url(&self, host: &str, path: &str) -> String {
        format!(
            "https://{}/{}/{}/blob/{}/{}",
            host, self.owner, self.name, self.git_ref, path
        )
    }
}

/// Mutually exclusive origin of a repository. Archived is orthogonal to this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoKind {
    Source,
    Fork,
    Mirror,
}

/// One selectable dimension of [`RepoTypes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoType {
    Sources,
    Forks,
    Archives,
    Mirrors,
}

impl RepoType {
    pub const ALL: [RepoType; 4] = [
        RepoType::Sources,
        RepoType::Forks,
        RepoType::Archives,
        RepoType::Mirrors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepoType::Sources => "sources",
            RepoType::Forks => "forks",
            RepoType::Archives => "archives",
            RepoType::Mirrors => "mirrors",
        }
    }
}

/// Which repositories to keep when expanding a bare owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepoTypes {
    pub sources: bool,
    pub forks: bool,
    pub archives: bool,
    pub mirrors: bool,
}

impl RepoTypes {
    /// The default set: active, non-fork, non-mirror repositories.
    pub fn sources() -> Self {
        Self {
            sources: true,
            ..Self::default()
        }
    }

    /// Every non-empty repository, archived or not.
    pub fn all() -> Self {
        Self {
            sources: true,
            forks: true,
            archives: true,
            mirrors: true,
        }
    }

    pub fn selected(&self) -> Vec<RepoType> {
        RepoType::ALL
            .into_iter()
            .filter(|t| self.contains(*t))
            .collect()
    }

    pub fn contains(&self, repo_type: RepoType) -> bool {
        match repo_type {
            RepoType::Sources => self.sources,
            RepoType::Forks => self.forks,
            RepoType::Archives => self.archives,
            RepoType::Mirrors => self.mirrors,
        }
    }

    /// Adds one dimension to the set. Used while parsing `--repo-types`.
    pub fn insert(&mut self, repo_type: RepoType) {
        match repo_type {
            RepoType::Sources => self.sources = true,
            RepoType::Forks => self.forks = true,
            RepoType::Archives => self.archives = true,
            RepoType::Mirrors => self.mirrors = true,
        }
    }

    /// Whether an expanded repository belongs to this set. Empty repositories
    /// never do, and archived ones require `archives` on top of their kind.
    /// Whether an owner-expanded repository belongs to this set.
    ///
    /// Kinds (source, fork, mirror) are a union and `archives` intersects
    /// with them: `{forks, archives}` keeps archived forks only, and without
    /// `archives` archived repositories are dropped. `{archives}` on its own
    /// keeps archived repositories of any kind, and the full set keeps
    /// everything. Empty repositories never qualify.
    pub fn admits(&self, repo: &Repository) -> bool {
        if repo.size == 0 {
            return false;
        }
        if *self == Self::all() {
            return true;
        }
        if repo.archived != self.archives {
            return false;
        }

        let any_kind = !(self.sources || self.forks || self.mirrors);
        if any_kind {
            // `archives` alone, or the empty set.
            return self.archives;
        }
        match repo.kind() {
            RepoKind::Fork => self.forks,
            RepoKind::Mirror => self.mirrors,
            RepoKind::Source => self.sources,
        }
    }
}

impl FromStr for RepoTypes {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut types = RepoTypes::default();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if part == "all" {
                return Ok(RepoTypes::all());
            }
            let repo_type = RepoType::ALL
                .into_iter()
                .find(|t| t.as_str() == part)
                .ok_or_else(|| {
                    format!(
                        "invalid repo type {:?}: must be one of sources, forks, archives, mirrors, or all",
                        part
                    )
                })?;
            types.insert(repo_type);
        }
        Ok(types)
    }
}

impl fmt::Display for RepoTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.selected().iter().map(RepoType::as_str).collect();
        write!(f, "{}", names.join(","))
    }
}

/// Classification of a tree entry, derived from its Git mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Directory,
    Symlink,
    Executable,
    Submodule,
}

impl FileType {
    /// The API only emits a handful of modes, so anything unrecognized is a file.
    pub fn from_mode(mode: &str) -> Self {
        match mode {
            "040000" => FileType::Directory,
            "120000" => FileType::Symlink,
            "160000" => FileType::Submodule,
            "100755" => FileType::Executable,
            "100644" | "100664" => FileType::File,
            _ => FileType::File,
        }
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f" | "file" => Ok(FileType::File),
            "d" | "dir" | "directory" => Ok(FileType::Directory),
            "l" | "symlink" => Ok(FileType::Symlink),
            "x" | "executable" => Ok(FileType::Executable),
            "s" | "submodule" => Ok(FileType::Submodule),
            _ => Err(
                "must be one of f, file, d, dir, directory, l, symlink, x, executable, s, submodule"
                    .to_string(),
            ),
        }
    }
}

/// One node of a recursive Git tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: String,
    #[serde(default)]
    pub sha: String,
    /// Blobs only; trees and submodules carry no size.
    #[serde(default)]
    pub size: u64,
}

impl TreeEntry {
    pub fn new(path: impl Into<String>, mode: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            mode: mode.into(),
            sha: String::new(),
            size,
        }
    }

    pub fn file_type(&self) -> FileType {
        FileType::from_mode(&self.mode)
    }

    /// Final path segment.
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TreeResponse {
    #[serde(rename = "tree", default)]
    pub entries: Vec<TreeEntry>,
    #[serde(default)]
    pub truncated: bool,
}

/// Last commit date of a path, keyed by path for re-joining with tree entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCommitInfo {
    pub path: String,
    pub committed_date: DateTime<Utc>,
}
