use crate::builders::patterns::SearchField;
use crate::builders::validator::{validate_config, ValidationOptions};
use crate::core::error::{ConfigError, ModeError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SMTP_PORT: u16 = 25;
pub const DEFAULT_JENKINS_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REMIND_TEMPLATE: &str = "remind_template.html";

/// Which synthesizer a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Report,
    Remind,
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "report" => Ok(Mode::Report),
            "remind" => Ok(Mode::Remind),
            other => Err(ModeError(other.to_string())),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Report => write!(f, "report"),
            Mode::Remind => write!(f, "remind"),
        }
    }
}

/// A single address or a list of them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn to_vec(&self) -> Vec<String> {
        let addrs = match self {
            Recipients::One(addr) => vec![addr.clone()],
            Recipients::Many(addrs) => addrs.clone(),
        };
        addrs
            .into_iter()
            .map(|addr| addr.trim().to_string())
            .filter(|addr| !addr.is_empty())
            .collect()
    }
}

/// The configuration file exactly as written: every key is optional here and
/// [`validate_config`] decides which ones a run needs.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RawConfig {
    pub jenkins_url: Option<String>,
    pub jenkins_user: Option<String>,
    pub jenkins_api_token: Option<String>,
    pub jenkins_timeout_secs: Option<u64>,
    pub jenkins_verify_ssl: Option<bool>,
    pub job_search_fields: Option<Vec<SearchField>>,
    pub filter_param_name: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    pub filter_param_value: Option<String>,
    pub email_from: Option<String>,
    pub email_to: Option<Recipients>,
    pub email_subject: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub test_email: Option<String>,
    pub show_resolved_blockers: Option<bool>,
    pub remind_template: Option<String>,
}

/// The global filter: a build parameter every matched job must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalFilter {
    pub param_name: String,
    pub param_value: String,
}

impl fmt::Display for GlobalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.param_name, self.param_value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailSettings {
    pub from: String,
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub test_recipient: Option<String>,
}

impl EmailSettings {
    /// The recipients for this run: the test address alone when testing.
    pub fn recipients(&self, test_email: bool) -> Vec<String> {
        match (&self.test_recipient, test_email) {
            (Some(test), true) => vec![test.clone()],
            _ => self.to.clone(),
        }
    }
}

/// The validated, typed configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub jenkins_url: String,
    pub jenkins_user: Option<String>,
    pub jenkins_api_token: Option<String>,
    pub jenkins_timeout: Duration,
    /// `false` accepts self-signed Jenkins certificates.
    pub jenkins_verify_ssl: bool,
    pub job_search_fields: Vec<SearchField>,
    pub filter: Option<GlobalFilter>,
    /// Absent when the run does not send email.
    pub email: Option<EmailSettings>,
    pub show_resolved_blockers: bool,
    pub remind_template: String,
}

impl Config {
    /// Validates `raw` for the given run options and converts it.
    pub fn from_raw(raw: RawConfig, options: &ValidationOptions) -> Result<Self, ConfigError> {
        validate_config(&raw, options)?;

        let filter = match (raw.filter_param_name, raw.filter_param_value) {
            (Some(param_name), Some(param_value)) => Some(GlobalFilter {
                param_name,
                param_value,
            }),
            _ => None,
        };

        let email = match (raw.email_from, raw.smtp_host) {
            (Some(from), Some(smtp_host)) if !options.no_email => Some(EmailSettings {
                from,
                to: raw.email_to.map(|r| r.to_vec()).unwrap_or_default(),
                subject: raw.email_subject,
                smtp_host,
                smtp_port: raw.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
                test_recipient: raw.test_email,
            }),
            _ => None,
        };

        Ok(Self {
            jenkins_url: raw.jenkins_url.unwrap_or_default(),
            jenkins_user: raw.jenkins_user,
            jenkins_api_token: raw.jenkins_api_token,
            jenkins_timeout: Duration::from_secs(
                raw.jenkins_timeout_secs
                    .unwrap_or(DEFAULT_JENKINS_TIMEOUT_SECS),
            ),
            jenkins_verify_ssl: raw.jenkins_verify_ssl.unwrap_or(true),
            job_search_fields: raw.job_search_fields.unwrap_or_default(),
            filter,
            email,
            show_resolved_blockers: raw.show_resolved_blockers.unwrap_or(false),
            remind_template: raw
                .remind_template
                .unwrap_or_else(|| DEFAULT_REMIND_TEMPLATE.to_string()),
        })
    }
}

/// A tracked blocker: the job whose failure keeps it open, plus who owns it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BlockerEntry {
    /// Exact name of the Jenkins job that must go green to resolve this blocker.
    pub job: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Bug or ticket references shown next to the blocker.
    #[serde(default)]
    pub tickets: Vec<String>,
}

impl BlockerEntry {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            owner: None,
            description: None,
            tickets: Vec::new(),
        }
    }
}

/// Blockers keyed by id, iterated in id order.
pub type BlockerSet = BTreeMap<String, BlockerEntry>;

pub trait ConfigProvider {
    fn load_config(&self) -> Result<RawConfig, ConfigError>;
    fn load_blockers(&self) -> Result<BlockerSet, ConfigError>;
}

/// Reads the configuration and blockers YAML files.
pub struct ConfigManager {
    config_path: PathBuf,
    blockers_path: PathBuf,
}

impl ConfigManager {
    pub fn new(config_path: impl Into<PathBuf>, blockers_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            blockers_path: blockers_path.into(),
        }
    }
}

impl ConfigProvider for ConfigManager {
    fn load_config(&self) -> Result<RawConfig, ConfigError> {
        // An empty file parses as null; treat it like a mapping with no keys
        // so validation can list everything that is missing.
        Ok(read_yaml::<RawConfig>(&self.config_path)?.unwrap_or_default())
    }

    fn load_blockers(&self) -> Result<BlockerSet, ConfigError> {
        Ok(read_yaml::<BlockerSet>(&self.blockers_path)?.unwrap_or_default())
    }
}

/// Accepts `16`, `true` or `"16"` alike for values compared as text.
fn scalar_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_yaml::Value::Null) => Ok(None),
        Some(serde_yaml::Value::String(s)) => Ok(Some(s)),
        Some(serde_yaml::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_yaml::Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(_) => Err(serde::de::Error::custom(
            "filter_param_value must be a string, number or boolean",
        )),
    }
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str::<Option<T>>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
