use crate::builders::patterns::{JobPredicate, SearchField};
use crate::core::config::{BlockerEntry, GlobalFilter};
use crate::core::error::{JenkinsError, MatchError};
use crate::core::jenkins::{BuildResult, JenkinsClient, JobInfo};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// What a set of jobs is being selected for: one report section or one blocker.
#[derive(Debug, Clone, Copy)]
pub enum Criterion<'a> {
    Search(&'a SearchField),
    Blocker { id: &'a str, entry: &'a BlockerEntry },
}

impl Criterion<'_> {
    pub fn describe(&self) -> String {
        match self {
            Criterion::Search(field) => field.describe(),
            Criterion::Blocker { id, .. } => id.to_string(),
        }
    }

    fn predicate(&self) -> Result<JobPredicate, regex::Error> {
        match self {
            Criterion::Search(field) => field.predicate(),
            Criterion::Blocker { entry, .. } => Ok(JobPredicate::Exact {
                value: entry.job.clone(),
                case_sensitive: true,
            }),
        }
    }
}

/// A job that satisfied a criterion, tagged with its current status.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub name: String,
    pub url: Option<String>,
    pub build_number: Option<u64>,
    pub status: BuildResult,
    /// Description of the criterion this job was matched by.
    pub criterion: String,
}

/// The outcome of evaluating one criterion against the job roster.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionMatch {
    pub description: String,
    /// Matching jobs, sorted by name.
    pub jobs: Vec<JobStatus>,
    /// Jobs that satisfied the criterion itself but not the global filter.
    pub filtered_out: usize,
}

impl CriterionMatch {
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

/// Evaluates criteria against one roster snapshot, fetched on first use.
pub struct JobMatcher<'a> {
    client: &'a dyn JenkinsClient,
    filter: Option<JobPredicate>,
    roster: RefCell<Option<Rc<[JobInfo]>>>,
}

impl<'a> JobMatcher<'a> {
    pub fn new(client: &'a dyn JenkinsClient, filter: Option<&GlobalFilter>) -> Self {
        let filter = filter.map(|f| JobPredicate::Parameter {
            name: f.param_name.clone(),
            value: f.param_value.clone(),
        });
        Self {
            client,
            filter,
            roster: RefCell::new(None),
        }
    }

    fn roster(&self) -> Result<Rc<[JobInfo]>, JenkinsError> {
        if let Some(roster) = self.roster.borrow().as_ref() {
            return Ok(Rc::clone(roster));
        }
        let fetched: Rc<[JobInfo]> = self.client.job_roster()?.into();
        *self.roster.borrow_mut() = Some(Rc::clone(&fetched));
        Ok(fetched)
    }

    /// Selects the jobs satisfying `criterion` and, if configured, the
    /// global filter.
    ///
    /// Every criterion on this matcher sees the same roster. A client failure
    /// is returned tagged with the criterion being evaluated, so no partial
    /// result is ever produced. Zero matches is a normal, non-error result.
    pub fn match_criterion(&self, criterion: &Criterion<'_>) -> Result<CriterionMatch, MatchError> {
        let description = criterion.describe();
        let predicate = criterion
            .predicate()
            .map_err(|source| MatchError::Predicate {
                criterion: description.clone(),
                source,
            })?;

        let roster = self.roster().map_err(|source| MatchError::Jenkins {
                criterion: description.clone(),
                source,
            })?;

        let (jobs, filtered_out) = self.select(&roster, &predicate, &description);
        debug!(
            criterion = %description,
            matched = jobs.len(),
            filtered_out,
            "evaluated criterion"
        );

        Ok(CriterionMatch {
            description,
            jobs,
            filtered_out,
        })
    }

    fn select(
        &self,
        roster: &[JobInfo],
        predicate: &JobPredicate,
        description: &str,
    ) -> (Vec<JobStatus>, usize) {
        let mut filtered_out = 0;
        let mut jobs: Vec<JobStatus> = roster
            .iter()
            .filter(|job| predicate.matches(job))
            .filter(|job| match &self.filter {
                Some(filter) if !filter.matches(job) => {
                    filtered_out += 1;
                    false
                }
                _ => true,
            })
            .map(|job| JobStatus {
                name: job.name.clone(),
                url: job.url.clone(),
                build_number: job.last_build,
                status: job.status,
                criterion: description.to_string(),
            })
            .collect();

        jobs.sort_by(|a, b| a.name.cmp(&b.name));
        (jobs, filtered_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::patterns::MatchKind;
    use std::cell::Cell;

    struct StaticRoster(Vec<JobInfo>);

    impl JenkinsClient for StaticRoster {
        fn job_roster(&self) -> Result<Vec<JobInfo>, JenkinsError> {
            Ok(self.0.clone())
        }
    }

    /// Succeeds for the first `ok_calls` requests, then fails.
    struct FlakyRoster {
        ok_calls: usize,
        calls: Cell<usize>,
    }

    impl JenkinsClient for FlakyRoster {
        fn job_roster(&self) -> Result<Vec<JobInfo>, JenkinsError> {
            let n = self.calls.get();
            self.calls.set(n + 1);
            if n < self.ok_calls {
                Ok(vec![JobInfo::new("nightly-build", BuildResult::Success)])
            } else {
                Err(JenkinsError::Decode {
                    url: "http://ci.example/api/json".into(),
                    message: "connection reset".into(),
                })
            }
        }
    }

    fn roster() -> StaticRoster {
        StaticRoster(vec![
            JobInfo::new("release-build", BuildResult::Failure).with_parameter("RELEASE", "16"),
            JobInfo::new("nightly-build", BuildResult::Success).with_parameter("RELEASE", "16"),
            JobInfo::new("nightly-deploy", BuildResult::Unknown).with_parameter("RELEASE", "17"),
        ])
    }

    fn filter() -> GlobalFilter {
        GlobalFilter {
            param_name: "RELEASE".into(),
            param_value: "16".into(),
        }
    }

    #[test]
    fn test_matches_are_sorted_and_tagged() {
        let client = roster();
        let matcher = JobMatcher::new(&client, None);
        let field = SearchField::new("nightly-*", MatchKind::Glob);
        let result = matcher.match_criterion(&Criterion::Search(&field)).unwrap();

        let names: Vec<_> = result.jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["nightly-build", "nightly-deploy"]);
        assert!(result.jobs.iter().all(|j| j.criterion == "nightly-*"));
        assert_eq!(result.filtered_out, 0);
    }

    #[test]
    fn test_never_built_job_is_reported_unknown() {
        let client = roster();
        let matcher = JobMatcher::new(&client, None);
        let field = SearchField::new("nightly-deploy", MatchKind::Exact);
        let result = matcher.match_criterion(&Criterion::Search(&field)).unwrap();
        assert_eq!(result.jobs.len(), 1);
        assert_eq!(result.jobs[0].status, BuildResult::Unknown);
    }

    #[test]
    fn test_filter_is_conjunctive() {
        let client = roster();
        let unfiltered = JobMatcher::new(&client, None);
        let global = filter();
        let filtered = JobMatcher::new(&client, Some(&global));

        for field in [
            SearchField::new("nightly", MatchKind::Substring),
            SearchField::new("build$", MatchKind::Pattern),
            SearchField::new("*", MatchKind::Glob),
            SearchField::new("nope", MatchKind::Exact),
        ] {
            let all = unfiltered.match_criterion(&Criterion::Search(&field)).unwrap();
            let some = filtered.match_criterion(&Criterion::Search(&field)).unwrap();
            assert!(some.jobs.iter().all(|job| all.jobs.contains(job)));
            assert_eq!(some.jobs.len() + some.filtered_out, all.jobs.len());
        }
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let client = roster();
        let global = filter();
        let matcher = JobMatcher::new(&client, Some(&global));
        let field = SearchField::new("nightly-deploy", MatchKind::Exact);
        let result = matcher.match_criterion(&Criterion::Search(&field)).unwrap();
        assert!(result.is_empty());
        assert_eq!(result.filtered_out, 1);
        assert_eq!(result.description, "nightly-deploy");
    }

    #[test]
    fn test_blocker_criterion_uses_exact_job_name() {
        let client = roster();
        let matcher = JobMatcher::new(&client, None);
        let entry = BlockerEntry::new("nightly");
        let result = matcher
            .match_criterion(&Criterion::Blocker {
                id: "db-migration",
                entry: &entry,
            })
            .unwrap();
        assert!(result.is_empty());
        assert_eq!(result.description, "db-migration");
    }

    #[test]
    fn test_client_failure_surfaces_with_criterion() {
        let client = FlakyRoster {
            ok_calls: 0,
            calls: Cell::new(0),
        };
        let matcher = JobMatcher::new(&client, None);
        let field = SearchField::new("release", MatchKind::Substring);

        let err = matcher.match_criterion(&Criterion::Search(&field)).unwrap_err();
        assert!(matches!(&err, MatchError::Jenkins { criterion, .. } if criterion == "release"));
    }

    #[test]
    fn test_roster_is_fetched_once_per_matcher() {
        let client = FlakyRoster {
            ok_calls: 1,
            calls: Cell::new(0),
        };
        let matcher = JobMatcher::new(&client, None);
        let first = SearchField::new("nightly", MatchKind::Substring);
        let second = SearchField::new("build", MatchKind::Substring);
        let entry = BlockerEntry::new("nightly-build");

        let a = matcher.match_criterion(&Criterion::Search(&first)).unwrap();
        let b = matcher.match_criterion(&Criterion::Search(&second)).unwrap();
        let c = matcher
            .match_criterion(&Criterion::Blocker {
                id: "db-migration",
                entry: &entry,
            })
            .unwrap();

        assert_eq!(client.calls.get(), 1);
        assert_eq!(a.jobs.len(), 1);
        assert_eq!(b.jobs[0].name, a.jobs[0].name);
        assert_eq!(c.jobs.len(), 1);
    }

    #[test]
    fn test_bad_pattern_is_a_match_error() {
        let client = roster();
        let matcher = JobMatcher::new(&client, None);
        let field = SearchField::new("(", MatchKind::Pattern);
        let err = matcher.match_criterion(&Criterion::Search(&field)).unwrap_err();
        assert!(matches!(err, MatchError::Predicate { .. }));
    }
}
