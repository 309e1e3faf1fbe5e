use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{FindError, Result};
use crate::github_client::{ClientOptions, DEFAULT_HOST};
use crate::options::{SearchOptions, DEFAULT_JOBS, MAX_JOBS};
use crate::parse::{parse_byte_size, parse_duration, parse_time};
use crate::types::{FileType, RepoTypes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// `auto` defers to whether the stream is a terminal.
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Auto => is_terminal,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Find files by name across GitHub repositories without cloning them.
///
/// Repositories are given as `owner`, `owner/repo` or `owner/repo@ref`. A bare
/// owner expands to every repository of that user or organization that
/// matches `--repo-types`.
#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    override_usage = "github-file-finding [OPTIONS] [PATTERN] <REPOSITORY>...",
    long_about = "Find files by glob pattern across many GitHub repositories concurrently, using the Git trees API instead of cloning."
)]
pub struct Args {
    /// Optional glob pattern followed by one or more repositories.
    #[clap(value_name = "ARGS", required = true, num_args = 1..)]
    pub args: Vec<String>,

    /// Match the pattern case-insensitively.
    #[clap(short, long)]
    pub ignore_case: bool,

    /// Match the pattern against the full path instead of the base name.
    #[clap(short = 'p', long)]
    pub full_path: bool,

    /// Only show entries of this type: f/file, d/dir, l/symlink, x/executable, s/submodule.
    #[clap(short = 't', long = "type", value_name = "TYPE")]
    pub file_types: Vec<FileType>,

    /// Only show files with this extension (repeatable).
    #[clap(short = 'e', long = "extension", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Skip entries matching this glob pattern (repeatable).
    #[clap(short = 'E', long = "exclude", value_name = "PATTERN")]
    pub excludes: Vec<String>,

    /// Minimum file size, e.g. 1024, 500k, 1M.
    #[clap(long, value_name = "SIZE", value_parser = parse_byte_size)]
    pub min_size: Option<u64>,

    /// Maximum file size, e.g. 1024, 500k, 1M.
    #[clap(long, value_name = "SIZE", value_parser = parse_byte_size)]
    pub max_size: Option<u64>,

    /// Only files changed within this duration, e.g. 10h, 2d, 3weeks.
    #[clap(long, value_name = "DURATION", value_parser = parse_duration)]
    pub changed_within: Option<Duration>,

    /// Only files last changed at or after this time.
    #[clap(long, value_name = "TIME", value_parser = parse_time)]
    pub changed_after: Option<DateTime<Utc>>,

    /// Only files last changed at or before this time.
    #[clap(long, value_name = "TIME", value_parser = parse_time)]
    pub changed_before: Option<DateTime<Utc>>,

    /// Repository kinds searched when expanding an owner: sources, forks, archives, mirrors, all.
    #[clap(long, value_name = "LIST", default_value = "sources")]
    pub repo_types: RepoTypes,

    /// When to colorize output.
    #[clap(short = 'c', long, value_enum, default_value = "auto")]
    pub color: ColorMode,

    /// When to wrap matches in terminal hyperlinks.
    #[clap(long, value_enum, default_value = "auto")]
    pub hyperlink: ColorMode,

    /// Maximum number of repositories searched concurrently.
    #[clap(short = 'j', long, default_value_t = DEFAULT_JOBS)]
    pub jobs: usize,

    /// Bypass the on-disk response cache.
    #[clap(long)]
    pub no_cache: bool,

    /// Directory for cached API responses.
    #[clap(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// How long cached responses stay fresh.
    #[clap(long, value_name = "DURATION", default_value = "24h", value_parser = parse_duration)]
    pub cache_ttl: Duration,

    /// GitHub API token. Falls back to GH_TOKEN, then GITHUB_TOKEN.
    #[clap(long)]
    pub token: Option<String>,

    /// GitHub host. Falls back to GH_HOST, then github.com.
    #[clap(long)]
    pub hostname: Option<String>,

    /// Log debug output to stderr.
    #[clap(short, long)]
    pub verbose: bool,

    /// Show a progress bar on stderr.
    #[clap(long)]
    pub progress: bool,
}

impl Args {
    /// Splits the positional arguments into pattern and repositories.
    ///
    /// A lone argument is a repository searched with `*`; otherwise the first
    /// argument is the pattern and an empty pattern also means `*`.
    pub fn positional(&self) -> (String, Vec<String>) {
        match self.args.as_slice() {
            [] => ("*".to_string(), Vec::new()),
            [repo] => ("*".to_string(), vec![repo.clone()]),
            [pattern, repos @ ..] => {
                let pattern = if pattern.is_empty() {
                    "*".to_string()
                } else {
                    pattern.clone()
                };
                (pattern, repos.to_vec())
            }
        }
    }

    /// Builds the search configuration, resolving `--changed-within` against `now`.
    pub fn search_options(&self, now: DateTime<Utc>) -> Result<SearchOptions> {
        if self.jobs == 0 || self.jobs > MAX_JOBS {
            return Err(FindError::Config(format!(
                "--jobs must be between 1 and {}",
                MAX_JOBS
            )));
        }

        let changed_after = match (self.changed_within, self.changed_after) {
            (Some(_), Some(_)) => {
                return Err(FindError::Config(
                    "--changed-within cannot be combined with --changed-after".to_string(),
                ))
            }
            (Some(within), None) => {
                let within = chrono::Duration::from_std(within).map_err(|_| {
                    FindError::Config("--changed-within is too large".to_string())
                })?;
                Some(now - within)
            }
            (None, after) => after,
        };

        let (pattern, repo_specs) = self.positional();
        let opts = SearchOptions {
            pattern,
            repo_specs,
            repo_types: self.repo_types,
            file_types: self.file_types.clone(),
            ignore_case: self.ignore_case,
            full_path: self.full_path,
            extensions: self.extensions.clone(),
            excludes: self.excludes.clone(),
            min_size: self.min_size.unwrap_or(0),
            max_size: self.max_size.unwrap_or(0),
            changed_after,
            changed_before: self.changed_before,
            jobs: self.jobs,
        };
        opts.validate()?;
        Ok(opts)
    }

    pub fn client_options(&self) -> Result<ClientOptions> {
        self.client_options_from(|key| std::env::var(key).ok())
    }

    /// Like [`Args::client_options`], reading the environment through `env`.
    pub fn client_options_from(&self, env: impl Fn(&str) -> Option<String>) -> Result<ClientOptions> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let token = non_empty(self.token.clone())
            .or_else(|| non_empty(env("GH_TOKEN")))
            .or_else(|| non_empty(env("GITHUB_TOKEN")))
            .ok_or_else(|| {
                FindError::Config(
                    "GitHub token not found: pass --token or set GH_TOKEN or GITHUB_TOKEN"
                        .to_string(),
                )
            })?;
        let host = non_empty(self.hostname.clone())
            .or_else(|| non_empty(env("GH_HOST")))
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        Ok(ClientOptions {
            host,
            disable_cache: self.no_cache,
            cache_dir: self.cache_dir.clone(),
            cache_ttl: self.cache_ttl,
            ..ClientOptions::new(token)
        })
    }
}
