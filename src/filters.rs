//! Entry filters applied to each repository's tree.
//!
//! Every stage takes ownership of a sequence and returns the surviving entries
//! in their original relative order. Empty selectors mean "keep everything".

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::options::SearchOptions;
use crate::pattern::Pattern;
use crate::types::{FileCommitInfo, FileType, TreeEntry};

/// The compiled per-repository pipeline (type, extension, size, pattern,
/// exclude). Commit dates need network data and are applied separately with
/// [`filter_by_commit_date`].
#[derive(Debug, Clone)]
pub struct EntryFilter {
    file_types: Vec<FileType>,
    extensions: Vec<String>,
    min_size: u64,
    max_size: u64,
    pattern: Pattern,
    excludes: Vec<Pattern>,
    full_path: bool,
    ignore_case: bool,
}

impl EntryFilter {
    /// Compiles every pattern up front, so syntax errors surface before any
    /// repository is searched.
    pub fn new(opts: &SearchOptions) -> Result<Self> {
        let pattern = Pattern::new(&opts.pattern, opts.ignore_case)?;
        let excludes = opts
            .excludes
            .iter()
            .map(|e| Pattern::new(e, opts.ignore_case))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            file_types: opts.file_types.clone(),
            extensions: normalize_extensions(&opts.extensions, opts.ignore_case),
            min_size: opts.min_size,
            max_size: opts.max_size,
            pattern,
            excludes,
            full_path: opts.full_path,
            ignore_case: opts.ignore_case,
        })
    }

    pub fn apply(&self, entries: Vec<TreeEntry>) -> Vec<TreeEntry> {
        let entries = filter_by_type(entries, &self.file_types);
        let entries = filter_by_extension(entries, &self.extensions, self.ignore_case);
        let entries = filter_by_size(entries, self.min_size, self.max_size);
        let entries = filter_by_pattern(entries, &self.pattern, self.full_path);
        filter_by_excludes(entries, &self.excludes, self.full_path)
    }
}

/// Lowercases (when ignoring case) and gives each extension exactly one
/// leading dot.
pub fn normalize_extensions(extensions: &[String], ignore_case: bool) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| {
            let ext = format!(".{}", ext.trim_start_matches('.'));
            if ignore_case {
                ext.to_lowercase()
            } else {
                ext
            }
        })
        .collect()
}

fn match_target(entry: &TreeEntry, full_path: bool) -> &str {
    if full_path {
        &entry.path
    } else {
        entry.basename()
    }
}

/// Extension of the final path segment, including the dot.
fn extension(path: &str) -> Option<&str> {
    let base = path.rsplit('/').next().unwrap_or(path);
    base.rfind('.').map(|i| &base[i..])
}

pub fn filter_by_type(entries: Vec<TreeEntry>, types: &[FileType]) -> Vec<TreeEntry> {
    if types.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| types.contains(&entry.file_type()))
        .collect()
}

/// `extensions` must already be normalized with [`normalize_extensions`].
pub fn filter_by_extension(
    entries: Vec<TreeEntry>,
    extensions: &[String],
    ignore_case: bool,
) -> Vec<TreeEntry> {
    if extensions.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| match extension(&entry.path) {
            Some(ext) if ignore_case => extensions.contains(&ext.to_lowercase()),
            Some(ext) => extensions.iter().any(|e| e == ext),
            None => false,
        })
        .collect()
}

/// Inclusive bounds; 0 leaves that side unbounded.
pub fn filter_by_size(entries: Vec<TreeEntry>, min_size: u64, max_size: u64) -> Vec<TreeEntry> {
    if min_size == 0 && max_size == 0 {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| {
            (min_size == 0 || entry.size >= min_size) && (max_size == 0 || entry.size <= max_size)
        })
        .collect()
}

pub fn filter_by_pattern(
    entries: Vec<TreeEntry>,
    pattern: &Pattern,
    full_path: bool,
) -> Vec<TreeEntry> {
    entries
        .into_iter()
        .filter(|entry| pattern.is_match(match_target(entry, full_path)))
        .collect()
}

/// Drops entries matching any of `excludes`.
pub fn filter_by_excludes(
    entries: Vec<TreeEntry>,
    excludes: &[Pattern],
    full_path: bool,
) -> Vec<TreeEntry> {
    if excludes.is_empty() {
        return entries;
    }
    entries
        .into_iter()
        .filter(|entry| {
            let target = match_target(entry, full_path);
            !excludes.iter().any(|exclude| exclude.is_match(target))
        })
        .collect()
}

/// Keeps entries whose last commit falls within `[after, before]`. Paths with
/// no known commit are dropped.
pub fn filter_by_commit_date(
    entries: Vec<TreeEntry>,
    commits: &[FileCommitInfo],
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> Vec<TreeEntry> {
    if after.is_none() && before.is_none() {
        return entries;
    }

    let dates: HashMap<&str, DateTime<Utc>> = commits
        .iter()
        .map(|c| (c.path.as_str(), c.committed_date))
        .collect();

    entries
        .into_iter()
        .filter(|entry| match dates.get(entry.path.as_str()) {
            Some(date) => {
                after.map_or(true, |after| *date >= after)
                    && before.map_or(true, |before| *date <= before)
            }
            None => false,
        })
        .collect()
}
