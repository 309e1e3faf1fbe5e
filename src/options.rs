use chrono::{DateTime, Utc};

use crate::error::{FindError, Result};
use crate::types::{FileType, RepoTypes};

pub const MAX_JOBS: usize = 100;
pub const DEFAULT_JOBS: usize = 10;

/// Everything a search needs, assembled once before the run starts.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub pattern: String,
    /// Raw `owner[/repo[@ref]]` strings; malformed ones are skipped with a warning.
    pub repo_specs: Vec<String>,
    /// Only consulted when expanding a bare owner.
    pub repo_types: RepoTypes,
    /// OR-matched; empty means every type.
    pub file_types: Vec<FileType>,
    pub ignore_case: bool,
    pub full_path: bool,
    pub extensions: Vec<String>,
    pub excludes: Vec<String>,
    /// Bytes, 0 = no minimum.
    pub min_size: u64,
    /// Bytes, 0 = no maximum.
    pub max_size: u64,
    pub changed_after: Option<DateTime<Utc>>,
    pub changed_before: Option<DateTime<Utc>>,
    pub jobs: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            pattern: "*".to_string(),
            repo_specs: Vec::new(),
            repo_types: RepoTypes::sources(),
            file_types: Vec::new(),
            ignore_case: false,
            full_path: false,
            extensions: Vec::new(),
            excludes: Vec::new(),
            min_size: 0,
            max_size: 0,
            changed_after: None,
            changed_before: None,
            jobs: DEFAULT_JOBS,
        }
    }
}

impl SearchOptions {
    pub fn filters_by_date(&self) -> bool {
        self.changed_after.is_some() || self.changed_before.is_some()
    }

    /// Rejects configurations that can never produce a meaningful search.
    /// Pattern syntax is checked separately when the filters are compiled.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 || self.jobs > MAX_JOBS {
            return Err(FindError::Config(format!(
                "jobs must be between 1 and {}",
                MAX_JOBS
            )));
        }

        if self.min_size > 0 && self.max_size > 0 && self.min_size > self.max_size {
            return Err(FindError::Config(
                "--min-size cannot be greater than --max-size".to_string(),
            ));
        }

        if let (Some(after), Some(before)) = (self.changed_after, self.changed_before) {
            if after > before {
                return Err(FindError::Config(
                    "--changed-after cannot be later than --changed-before".to_string(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_defaults_are_valid() {
        let opts = SearchOptions::default();
        assert!(opts.validate().is_ok());
        assert!(!opts.filters_by_date());
        assert_eq!(opts.repo_types, RepoTypes::sources());
    }

    #[test]
    fn test_jobs_range() {
        for jobs in [0, MAX_JOBS + 1] {
            let opts = SearchOptions {
                jobs,
                ..SearchOptions::default()
            };
            assert!(matches!(opts.validate(), Err(FindError::Config(_))));
        }
        let opts = SearchOptions {
            jobs: MAX_JOBS,
            ..SearchOptions::default()
        };
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_min_greater_than_max_rejected() {
        let opts = SearchOptions {
            min_size: 2048,
            max_size: 1024,
            ..SearchOptions::default()
        };
        assert!(matches!(opts.validate(), Err(FindError::Config(_))));

        let only_min = SearchOptions {
            min_size: 2048,
            ..SearchOptions::default()
        };
        assert!(only_min.validate().is_ok());
    }

    #[test]
    fn test_date_range_order() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let opts = SearchOptions {
            changed_after: Some(late),
            changed_before: Some(early),
            ..SearchOptions::default()
        };
        assert!(opts.filters_by_date());
        assert!(matches!(opts.validate(), Err(FindError::Config(_))));
    }
}
