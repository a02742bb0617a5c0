use crate::core::error::JenkinsError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Query used to fetch every job together with its last build in one request.
const ROSTER_TREE: &str =
    "jobs[name,url,color,lastBuild[number,result,building,actions[parameters[name,value]]]]";

/// The effective status of a job, taken from its most recent build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BuildResult {
    Success,
    Unstable,
    Failure,
    Aborted,
    NotBuilt,
    Building,
    /// The job has never been built, or Jenkins reported no result.
    Unknown,
}

impl BuildResult {
    pub const ALL: [BuildResult; 7] = [
        BuildResult::Success,
        BuildResult::Unstable,
        BuildResult::Failure,
        BuildResult::Aborted,
        BuildResult::NotBuilt,
        BuildResult::Building,
        BuildResult::Unknown,
    ];

    /// Maps the `result` string of the Jenkins build API.
    pub fn from_jenkins(result: Option<&str>, building: bool) -> Self {
        if building {
            return BuildResult::Building;
        }
        match result {
            Some("SUCCESS") => BuildResult::Success,
            Some("UNSTABLE") => BuildResult::Unstable,
            Some("FAILURE") => BuildResult::Failure,
            Some("ABORTED") => BuildResult::Aborted,
            Some("NOT_BUILT") => BuildResult::NotBuilt,
            _ => BuildResult::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildResult::Success => "success",
            BuildResult::Unstable => "unstable",
            BuildResult::Failure => "failure",
            BuildResult::Aborted => "aborted",
            BuildResult::NotBuilt => "not built",
            BuildResult::Building => "building",
            BuildResult::Unknown => "unknown",
        }
    }
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Jenkins job as seen at the time of the run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    pub name: String,
    pub url: Option<String>,
    pub last_build: Option<u64>,
    pub status: BuildResult,
    /// Parameters of the last build, used by the global filter.
    pub parameters: BTreeMap<String, String>,
}

impl JobInfo {
    /// A job with no build history and no parameters.
    pub fn new(name: impl Into<String>, status: BuildResult) -> Self {
        Self {
            name: name.into(),
            url: None,
            last_build: None,
            status,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// The capability the matcher needs from Jenkins: the current roster of jobs.
pub trait JenkinsClient {
    fn job_roster(&self) -> Result<Vec<JobInfo>, JenkinsError>;
}

#[derive(Debug, Clone)]
pub struct JenkinsAuth {
    pub user: String,
    pub api_token: String,
}

/// A live Jenkins server reached over its JSON API.
pub struct JenkinsServer {
    base_url: String,
    auth: Option<JenkinsAuth>,
    client: reqwest::blocking::Client,
}

impl JenkinsServer {
    /// Builds the HTTP client and checks that the server answers.
    ///
    /// Any failure here is a connection error; nothing else has been
    /// requested from the server yet.
    ///
    /// # Arguments
    /// * `verify_tls`: When `false`, self-signed or otherwise invalid server
    ///   certificates are accepted.
    pub fn connect(
        url: &str,
        auth: Option<JenkinsAuth>,
        timeout: Duration,
        verify_tls: bool,
    ) -> Result<Self, JenkinsError> {
        let base_url = url.trim_end_matches('/').to_string();
        if !verify_tls {
            warn!(url = %base_url, "TLS certificate verification is disabled");
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|source| JenkinsError::Connection {
                url: base_url.clone(),
                source,
            })?;

        let server = Self {
            base_url,
            auth,
            client,
        };

        let ping_url = format!("{}/api/json", server.base_url);
        server
            .get(&ping_url)
            .send()
            .and_then(|resp| resp.error_for_status())
            .map_err(|source| JenkinsError::Connection {
                url: server.base_url.clone(),
                source,
            })?;

        debug!(url = %server.base_url, "connected to Jenkins");
        Ok(server)
    }

    fn get(&self, url: &str) -> reqwest::blocking::RequestBuilder {
        let request = self.client.get(url);
        match &self.auth {
            Some(auth) => request.basic_auth(&auth.user, Some(&auth.api_token)),
            None => request,
        }
    }
}

impl JenkinsClient for JenkinsServer {
    fn job_roster(&self) -> Result<Vec<JobInfo>, JenkinsError> {
        let url = format!("{}/api/json", self.base_url);
        let body = self
            .get(&url)
            .query(&[("tree", ROSTER_TREE)])
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.text())
            .map_err(|source| JenkinsError::Request {
                url: url.clone(),
                source,
            })?;

        let jobs = parse_roster(&body).map_err(|e| JenkinsError::Decode {
            url,
            message: e.to_string(),
        })?;
        debug!(count = jobs.len(), "fetched job roster");
        Ok(jobs)
    }
}

#[derive(Deserialize)]
struct RosterResponse {
    #[serde(default)]
    jobs: Vec<ApiJob>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiJob {
    name: String,
    url: Option<String>,
    color: Option<String>,
    last_build: Option<ApiBuild>,
}

#[derive(Deserialize)]
struct ApiBuild {
    number: Option<u64>,
    result: Option<String>,
    #[serde(default)]
    building: bool,
    #[serde(default)]
    actions: Vec<Option<ApiAction>>,
}

#[derive(Deserialize)]
struct ApiAction {
    #[serde(default)]
    parameters: Vec<ApiParameter>,
}

#[derive(Deserialize)]
struct ApiParameter {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

/// Decodes the body returned for [`ROSTER_TREE`].
pub(crate) fn parse_roster(body: &str) -> Result<Vec<JobInfo>, serde_json::Error> {
    let response: RosterResponse = serde_json::from_str(body)?;
    Ok(response.jobs.into_iter().map(JobInfo::from).collect())
}

impl From<ApiJob> for JobInfo {
    fn from(job: ApiJob) -> Self {
        // A running job without a finished lastBuild is still signalled by
        // the animated ball colour.
        let animated = job
            .color
            .as_deref()
            .is_some_and(|color| color.ends_with("_anime"));

        let Some(build) = job.last_build else {
            let status = if animated {
                BuildResult::Building
            } else {
                BuildResult::Unknown
            };
            return JobInfo {
                name: job.name,
                url: job.url,
                last_build: None,
                status,
                parameters: BTreeMap::new(),
            };
        };

        let parameters = build
            .actions
            .into_iter()
            .flatten()
            .flat_map(|action| action.parameters)
            .map(|param| {
                let value = match param.value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (param.name, value)
            })
            .collect();

        JobInfo {
            name: job.name,
            url: job.url,
            last_build: build.number,
            status: BuildResult::from_jenkins(build.result.as_deref(), build.building),
            parameters,
        }
    }
}
