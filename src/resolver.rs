use std::sync::Arc;
use tracing::{debug, info};

use crate::cancel::CancelToken;
use crate::error::{FindError, Result};
use crate::transport::ApiTransport;
use crate::types::{OwnerType, RepoType, RepoTypes, Repository, RepositorySpec};

pub const PAGE_SIZE: u32 = 100;

/// Expands repository specs into concrete repositories.
pub struct Resolver {
    transport: Arc<dyn ApiTransport>,
    cancel: CancelToken,
}

impl Resolver {
    /// Creates a resolver whose API calls all race against `cancel`.
    pub fn new(transport: Arc<dyn ApiTransport>, cancel: CancelToken) -> Self {
        Self { transport, cancel }
    }

    /// `owner/repo[@ref]` yields exactly that repository regardless of
    /// `types`; a bare owner yields every repository `types` admits.
    pub async fn resolve(&self, spec: &RepositorySpec, types: RepoTypes) -> Result<Vec<Repository>> {
        match &spec.repo {
            Some(repo) => {
                let repository = self
                    .resolve_repository(&spec.owner, repo, spec.git_ref.as_deref())
                    .await?;
                Ok(vec![repository])
            }
            None => self.expand_owner(&spec.owner, types).await,
        }
    }

    /// Looks up one repository. An explicit ref is taken as given and only
    /// checked later, when its tree is fetched.
    async fn resolve_repository(
        &self,
        owner: &str,
        name: &str,
        git_ref: Option<&str>,
    ) -> Result<Repository> {
        let raw = self
            .cancel
            .run(self.transport.get_repository(owner, name))
            .await
            .map_err(|e| FindError::api("failed to get repository", e))?;

        // Zero size means the repository has no commits yet
        if raw.size == 0 {
            return Err(FindError::EmptyRepository);
        }
        Repository::from_raw(raw, git_ref).ok_or(FindError::EmptyRepository)
    }

    /// Lists every page of an owner's repositories and keeps those `types`
    /// admits.
    async fn expand_owner(&self, owner: &str, types: RepoTypes) -> Result<Vec<Repository>> {
        // Users and organizations have different listing endpoints
        let owner_type = self
            .cancel
            .run(self.transport.get_owner_type(owner))
            .await
            .map_err(|e| FindError::api(format!("failed to get owner type for {}", owner), e))?;

        let type_hint = server_type_param(types, owner_type);
        debug!(
            "Listing repositories for {} ({:?}, type={})",
            owner, owner_type, type_hint
        );

        // Page until a short page signals the end
        let mut raw_repos = Vec::new();
        let mut page = 1;
        loop {
            let repos = self
                .cancel
                .run(
                    self.transport
                        .list_repositories(owner, owner_type, page, PAGE_SIZE, type_hint),
                )
                .await
                .map_err(|e| FindError::api(format!("failed to list repos for {}", owner), e))?;

            let count = repos.len();
            raw_repos.extend(repos);
            if count < PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }

        // Re-apply the full type semantics whatever the server already filtered.
        let total = raw_repos.len();
        let repos: Vec<Repository> = raw_repos
            .into_iter()
            .filter_map(|raw| Repository::from_raw(raw, None))
            .filter(|repo| types.admits(repo))
            .collect();

        info!(
            "Resolved {} of {} repositories for {} ({} pages)",
            repos.len(),
            total,
            owner,
            page
        );
        Ok(repos)
    }
}

/// The API `type` parameter for listing an owner's repositories. Only a
/// single requested dimension that the API supports for this owner type is
/// pushed to the server; everything else fetches `all`.
pub fn server_type_param(types: RepoTypes, owner_type: OwnerType) -> &'static str {
    match (types.selected().as_slice(), owner_type) {
        ([RepoType::Sources], OwnerType::Organization) => "sources",
        ([RepoType::Sources], OwnerType::User) => "owner",
        ([RepoType::Forks], OwnerType::Organization) => "forks",
        _ => "all",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::{raw_repo, FakeTransport};
    use crate::types::RawRepo;

    fn resolver(transport: FakeTransport) -> Resolver {
        Resolver::new(Arc::new(transport), CancelToken::new())
    }

    fn names(repos: &[Repository]) -> Vec<&str> {
        repos.iter().map(|r| r.full_name.as_str()).collect()
    }

    #[test]
    fn test_server_type_param() {
        let forks = RepoTypes {
            forks: true,
            ..RepoTypes::default()
        };
        let archives = RepoTypes {
            archives: true,
            ..RepoTypes::default()
        };

        assert_eq!(server_type_param(RepoTypes::sources(), OwnerType::Organization), "sources");
        assert_eq!(server_type_param(RepoTypes::sources(), OwnerType::User), "owner");
        assert_eq!(server_type_param(forks, OwnerType::Organization), "forks");
        assert_eq!(server_type_param(forks, OwnerType::User), "all");
        assert_eq!(server_type_param(archives, OwnerType::Organization), "all");
        assert_eq!(server_type_param(RepoTypes::all(), OwnerType::User), "all");
    }

    #[tokio::test]
    async fn test_explicit_repo_bypasses_type_filter() {
        let mut fork = raw_repo("cli", "fork");
        fork.fork = true;
        fork.archived = true;
        let mut transport = FakeTransport::default();
        transport.repos.insert("cli/fork".to_string(), fork);

        let repos = resolver(transport)
            .resolve(&RepositorySpec::repo("cli", "fork"), RepoTypes::default())
            .await
            .unwrap();
        assert_eq!(names(&repos), vec!["cli/fork"]);
        assert_eq!(repos[0].git_ref, "main");
    }

    #[tokio::test]
    async fn test_explicit_ref_wins_over_default_branch() {
        let mut transport = FakeTransport::default();
        transport.repos.insert("cli/cli".to_string(), raw_repo("cli", "cli"));

        let repos = resolver(transport)
            .resolve(
                &RepositorySpec::repo("cli", "cli").with_ref("v2.40.0"),
                RepoTypes::sources(),
            )
            .await
            .unwrap();
        assert_eq!(repos[0].git_ref, "v2.40.0");
    }

    #[tokio::test]
    async fn test_missing_repo_is_not_found() {
        let err = resolver(FakeTransport::default())
            .resolve(&RepositorySpec::repo("cli", "nope"), RepoTypes::sources())
            .await
            .unwrap_err();
        assert_eq!(err.api_error(), Some(&ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_empty_repo_is_rejected() {
        let mut empty = raw_repo("cli", "empty");
        empty.size = 0;
        let mut transport = FakeTransport::default();
        transport.repos.insert("cli/empty".to_string(), empty);

        let err = resolver(transport)
            .resolve(&RepositorySpec::repo("cli", "empty"), RepoTypes::sources())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::EmptyRepository));
    }

    #[tokio::test]
    async fn test_repo_without_default_branch_is_empty() {
        let mut branchless = raw_repo("cli", "branchless");
        branchless.default_branch = None;
        let mut transport = FakeTransport::default();
        transport.repos.insert("cli/branchless".to_string(), branchless);

        let err = resolver(transport)
            .resolve(&RepositorySpec::repo("cli", "branchless"), RepoTypes::sources())
            .await
            .unwrap_err();
        assert!(matches!(err, FindError::EmptyRepository));
    }

    #[tokio::test]
    async fn test_owner_expansion_paginates() {
        let listing: Vec<RawRepo> = (0..250).map(|i| raw_repo("big", &format!("r{}", i))).collect();
        let mut transport = FakeTransport::default();
        transport.owners.insert("big".to_string(), OwnerType::Organization);
        transport.listings.insert("big".to_string(), listing);
        let transport = Arc::new(transport);

        let repos = Resolver::new(transport.clone(), CancelToken::new())
            .resolve(&RepositorySpec::owner("big"), RepoTypes::sources())
            .await
            .unwrap();
        assert_eq!(repos.len(), 250);
        assert_eq!(repos[0].full_name, "big/r0");
        assert_eq!(repos[249].full_name, "big/r249");

        let calls = transport.list_calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                (1, "sources".to_string()),
                (2, "sources".to_string()),
                (3, "sources".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_exact_page_boundary_requests_one_more_page() {
        let listing: Vec<RawRepo> = (0..100).map(|i| raw_repo("u", &format!("r{}", i))).collect();
        let mut transport = FakeTransport::default();
        transport.owners.insert("u".to_string(), OwnerType::User);
        transport.listings.insert("u".to_string(), listing);
        let transport = Arc::new(transport);

        let repos = Resolver::new(transport.clone(), CancelToken::new())
            .resolve(&RepositorySpec::owner("u"), RepoTypes::all())
            .await
            .unwrap();
        assert_eq!(repos.len(), 100);
        assert_eq!(transport.list_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_owner_expansion_filters_client_side() {
        let mut fork = raw_repo("cli", "fork");
        fork.fork = true;
        let mut archived_fork = raw_repo("cli", "archived-fork");
        archived_fork.fork = true;
        archived_fork.archived = true;
        let mut archived_source = raw_repo("cli", "archived-source");
        archived_source.archived = true;
        let mut mirror = raw_repo("cli", "mirror");
        mirror.mirror_url = Some("https://example.com/mirror.git".to_string());
        let mut empty = raw_repo("cli", "empty");
        empty.size = 0;

        let mut transport = FakeTransport::default();
        transport.owners.insert("cli".to_string(), OwnerType::User);
        transport.listings.insert(
            "cli".to_string(),
            vec![
                raw_repo("cli", "source"),
                fork,
                archived_fork,
                archived_source,
                mirror,
                empty,
            ],
        );
        let resolver = resolver(transport);
        let owner = RepositorySpec::owner("cli");

        let sources = resolver.resolve(&owner, RepoTypes::sources()).await.unwrap();
        assert_eq!(names(&sources), vec!["cli/source"]);

        let forks_and_archives = RepoTypes {
            forks: true,
            archives: true,
            ..RepoTypes::default()
        };
        let repos = resolver.resolve(&owner, forks_and_archives).await.unwrap();
        assert_eq!(names(&repos), vec!["cli/archived-fork"]);

        let mirrors = RepoTypes {
            mirrors: true,
            ..RepoTypes::default()
        };
        let repos = resolver.resolve(&owner, mirrors).await.unwrap();
        assert_eq!(names(&repos), vec!["cli/mirror"]);

        let all = resolver.resolve(&owner, RepoTypes::all()).await.unwrap();
        assert_eq!(all.len(), 5);

        let none = resolver.resolve(&owner, RepoTypes::default()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_owner_fails() {
        let err = resolver(FakeTransport::default())
            .resolve(&RepositorySpec::owner("ghost"), RepoTypes::sources())
            .await
            .unwrap_err();
        assert_eq!(err.api_error(), Some(&ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_cancelled_resolution() {
        let mut transport = FakeTransport::default();
        transport.repos.insert("cli/cli".to_string(), raw_repo("cli", "cli"));
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = Resolver::new(Arc::new(transport), cancel)
            .resolve(&RepositorySpec::repo("cli", "cli"), RepoTypes::sources())
            .await
            .unwrap_err();
        assert!(err.is_canceled());
    }
}
