use crate::core::jenkins::JobInfo;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An enum that defines how a search field's `name` is compared to job names.
///
/// The set is closed on purpose: every kind is handled by
/// [`JobPredicate::matches`], so matching is total and testable per kind.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The job name must equal the search text.
    Exact,
    /// The job name must contain the search text.
    Substring,
    /// The search text is a regular expression searched anywhere in the job
    /// name. This is the historical behaviour for bare-string search fields.
    #[default]
    Pattern,
    /// Shell-style wildcards (`*`, `?`) anchored to the whole job name.
    Glob,
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Substring => write!(f, "substring"),
            MatchKind::Pattern => write!(f, "pattern"),
            MatchKind::Glob => write!(f, "glob"),
        }
    }
}

/// One entry of `job_search_fields`: a named rule selecting the jobs of one
/// report section.
///
/// In YAML it is either a bare string (a regex pattern) or a mapping:
///
/// ```yaml
/// job_search_fields:
///   - "nightly-.*"
///   - name: release-
///     kind: substring
///     case_sensitive: false
///     description: Release pipelines
/// ```
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(from = "SearchFieldDef")]
pub struct SearchField {
    /// The text the job name is compared against.
    pub name: String,
    /// How `name` is interpreted.
    pub kind: MatchKind,
    /// Whether the comparison respects letter case. Defaults to `true`.
    pub case_sensitive: bool,
    /// Optional human-readable label used in the header and section title.
    pub description: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SearchFieldDef {
    Bare(String),
    Detailed {
        name: String,
        #[serde(default)]
        kind: MatchKind,
        #[serde(default = "default_case_sensitive")]
        case_sensitive: bool,
        #[serde(default)]
        description: Option<String>,
    },
}

fn default_case_sensitive() -> bool {
    true
}

impl From<SearchFieldDef> for SearchField {
    fn from(def: SearchFieldDef) -> Self {
        match def {
            SearchFieldDef::Bare(name) => SearchField::new(name, MatchKind::Pattern),
            SearchFieldDef::Detailed {
                name,
                kind,
                case_sensitive,
                description,
            } => SearchField {
                name,
                kind,
                case_sensitive,
                description,
            },
        }
    }
}

impl SearchField {
    /// Creates a case-sensitive search field with no description.
    pub fn new(name: impl Into<String>, kind: MatchKind) -> Self {
        Self {
            name: name.into(),
            kind,
            case_sensitive: true,
            description: None,
        }
    }

    /// The label used for this field in headers and report sections.
    ///
    /// Falls back to the raw search text so that a field always has a
    /// non-empty description even when it matches nothing.
    pub fn describe(&self) -> String {
        match &self.description {
            Some(desc) if !desc.trim().is_empty() => desc.clone(),
            _ => self.name.clone(),
        }
    }

    /// Compiles the field into a predicate.
    ///
    /// # Returns
    /// A `JobPredicate` ready for matching, or the regex error for a
    /// `pattern` field whose text is not a valid regular expression.
    pub fn predicate(&self) -> Result<JobPredicate, regex::Error> {
        let predicate = match self.kind {
            MatchKind::Exact => JobPredicate::Exact {
                value: self.name.clone(),
                case_sensitive: self.case_sensitive,
            },
            MatchKind::Substring => JobPredicate::Substring {
                value: self.name.clone(),
                case_sensitive: self.case_sensitive,
            },
            MatchKind::Pattern => JobPredicate::Pattern(
                RegexBuilder::new(&self.name)
                    .case_insensitive(!self.case_sensitive)
                    .build()?,
            ),
            MatchKind::Glob => JobPredicate::Pattern(
                RegexBuilder::new(&glob_to_regex(&self.name))
                    .case_insensitive(!self.case_sensitive)
                    .build()?,
            ),
        };
        Ok(predicate)
    }
}

/// Translates `*` and `?` wildcards into an anchored regular expression.
/// Every other character is matched literally.
fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() + 8);
    out.push('^');
    for ch in glob.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    out
}

/// A compiled matching rule evaluated against a single job.
#[derive(Debug, Clone)]
pub enum JobPredicate {
    Exact { value: String, case_sensitive: bool },
    Substring { value: String, case_sensitive: bool },
    Pattern(Regex),
    /// The global filter: the job's last build must carry parameter `name`
    /// with exactly `value`.
    Parameter { name: String, value: String },
}

impl JobPredicate {
    pub fn matches(&self, job: &JobInfo) -> bool {
        match self {
            JobPredicate::Exact {
                value,
                case_sensitive: true,
            } => job.name == *value,
            JobPredicate::Exact {
                value,
                case_sensitive: false,
            } => job.name.to_lowercase() == value.to_lowercase(),
            JobPredicate::Substring {
                value,
                case_sensitive: true,
            } => job.name.contains(value.as_str()),
            JobPredicate::Substring {
                value,
                case_sensitive: false,
            } => job.name.to_lowercase().contains(&value.to_lowercase()),
            JobPredicate::Pattern(regex) => regex.is_match(&job.name),
            JobPredicate::Parameter { name, value } => {
                job.parameters.get(name).is_some_and(|v| v == value)
            }
        }
    }
}
