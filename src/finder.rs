use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::commit_dates::fetch_commit_dates;
use crate::error::{FindError, Result};
use crate::filters::{filter_by_commit_date, EntryFilter};
use crate::options::SearchOptions;
use crate::output::Output;
use crate::resolver::Resolver;
use crate::transport::ApiTransport;
use crate::tree::fetch_tree;
use crate::types::{Repository, RepositorySpec};

/// Totals of a search that did not fail as a whole.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FindSummary {
    pub repositories: usize,
    pub failed: usize,
    pub matches: usize,
}

/// Runs a search across every resolved repository with bounded parallelism.
pub struct Finder {
    transport: Arc<dyn ApiTransport>,
    output: Arc<Output>,
    cancel: CancelToken,
}

/// Everything one repository task needs, shared read-only across tasks.
struct SearchContext {
    transport: Arc<dyn ApiTransport>,
    output: Arc<Output>,
    cancel: CancelToken,
    filter: EntryFilter,
    opts: SearchOptions,
}

/// How one repository task ended. Failures are already reported.
enum Outcome {
    Searched(usize),
    Failed,
    Canceled,
}

impl Finder {
    /// Creates a finder. Matches and warnings go to `output`; cancelling
    /// `cancel` stops scheduling and aborts in-flight calls.
    pub fn new(transport: Arc<dyn ApiTransport>, output: Arc<Output>, cancel: CancelToken) -> Self {
        Self {
            transport,
            output,
            cancel,
        }
    }

    /// Resolves, schedules and searches.
    ///
    /// Bad repository selectors and per-repository failures become warnings.
    /// The call fails on bad configuration, on cancellation, or when every
    /// repository failed.
    pub async fn find(&self, opts: &SearchOptions) -> Result<FindSummary> {
        // Configuration errors surface before any request
        opts.validate()?;
        let filter = EntryFilter::new(opts)?;

        let repos = self.resolve_all(opts).await?;
        if repos.is_empty() {
            self.output.info("No repositories match the filter");
            return Ok(FindSummary::default());
        }

        if let Some(progress) = self.output.progress() {
            progress.set_length(repos.len() as u64);
        }

        // Shared state handed to every repository task
        let ctx = Arc::new(SearchContext {
            transport: self.transport.clone(),
            output: self.output.clone(),
            cancel: self.cancel.clone(),
            filter,
            opts: opts.clone(),
        });

        // Create semaphore for concurrency control
        let semaphore = Arc::new(Semaphore::new(opts.jobs));
        let total = repos.len();
        let mut tasks = Vec::with_capacity(total);

        // Launch one task per repository, stopping early on cancellation
        for repo in repos {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                let outcome = match search_repository(&ctx, &repo).await {
                    Ok(matches) => Outcome::Searched(matches),
                    Err(e) if e.is_canceled() => Outcome::Canceled,
                    Err(e) => {
                        // Reported as it happens, not after the whole run
                        ctx.output.warning(format!("{}: {}", repo.full_name, e));
                        Outcome::Failed
                    }
                };
                if let Some(progress) = ctx.output.progress() {
                    progress.inc(1);
                }
                outcome
            }));
        }

        // Wait for all tasks and tally
        let mut summary = FindSummary {
            repositories: total,
            ..FindSummary::default()
        };
        for joined in join_all(tasks).await {
            match joined {
                Ok(Outcome::Searched(matches)) => summary.matches += matches,
                Ok(Outcome::Canceled) => {}
                Ok(Outcome::Failed) => summary.failed += 1,
                Err(e) => {
                    summary.failed += 1;
                    self.output.warning(format!("search task failed: {}", e));
                }
            }
        }

        if let Some(progress) = self.output.progress() {
            progress.finish_and_clear();
        }

        // Cancellation wins over the all-failed outcome
        if self.cancel.is_cancelled() {
            return Err(FindError::Canceled);
        }
        if summary.failed == total {
            return Err(FindError::AllFailed { count: total });
        }

        info!(
            "Searched {} repositories: {} matches, {} failed",
            summary.repositories, summary.matches, summary.failed
        );
        Ok(summary)
    }

    /// Resolves every selector in order, skipping bad ones with a warning, and
    /// deduplicates by full name keeping the first occurrence.
    async fn resolve_all(&self, opts: &SearchOptions) -> Result<Vec<Repository>> {
        let resolver = Resolver::new(self.transport.clone(), self.cancel.clone());
        let mut seen = HashSet::new();
        let mut repos = Vec::new();

        for raw_spec in &opts.repo_specs {
            let spec: RepositorySpec = match raw_spec.parse() {
                Ok(spec) => spec,
                Err(e) => {
                    self.output.warning(e);
                    continue;
                }
            };

            match resolver.resolve(&spec, opts.repo_types).await {
                Ok(found) => {
                    for repo in found {
                        if seen.insert(repo.full_name.clone()) {
                            repos.push(repo);
                        } else {
                            debug!("Skipping duplicate repository {}", repo.full_name);
                        }
                    }
                }
                Err(e) if e.is_canceled() => return Err(e),
                Err(e) => self.output.warning(format!("{}: {}", spec, e)),
            }
        }

        Ok(repos)
    }
}

/// Fetching, filtering, optional enrichment, then emitting, for one repository.
async fn search_repository(ctx: &SearchContext, repo: &Repository) -> Result<usize> {
    debug!("{}: fetching tree", repo.full_name);
    let tree = fetch_tree(ctx.transport.as_ref(), &ctx.cancel, repo).await?;
    if tree.truncated {
        ctx.output.warning(format!(
            "{}: exceeds GitHub's API limit (100k files or 7MB) - results are incomplete",
            repo.full_name
        ));
    }

    debug!("{}: filtering {} entries", repo.full_name, tree.entries.len());
    let mut entries = ctx.filter.apply(tree.entries);

    // Commit dates are only fetched for entries that survived the cheap filters
    if ctx.opts.filters_by_date() && !entries.is_empty() {
        debug!("{}: enriching {} entries", repo.full_name, entries.len());
        let paths: Vec<String> = entries.iter().map(|e| e.path.clone()).collect();
        let commits =
            fetch_commit_dates(ctx.transport.as_ref(), &ctx.cancel, repo, &paths).await?;
        entries = filter_by_commit_date(
            entries,
            &commits,
            ctx.opts.changed_after,
            ctx.opts.changed_before,
        );
    }

    debug!("{}: emitting {} matches", repo.full_name, entries.len());
    for entry in &entries {
        ctx.output.matched(repo, &entry.path);
    }
    Ok(entries.len())
}
