use std::path::PathBuf;
use thiserror::Error;

/// Problems with the configuration or blockers file.
///
/// Every variant is fatal and is raised before any Jenkins connection is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read from disk.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not valid YAML or does not have the expected shape.
    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// One or more required keys are absent. All of them are listed at once.
    #[error("missing required configuration: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Keys are present but their values are unusable.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Failures talking to the Jenkins server.
#[derive(Debug, Error)]
pub enum JenkinsError {
    #[error("could not connect to Jenkins at {url}: {source}")]
    Connection {
        url: String,
        source: reqwest::Error,
    },

    #[error("Jenkins request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },

    #[error("unexpected response from Jenkins at {url}: {message}")]
    Decode { url: String, message: String },
}

/// A failure while a criterion was being evaluated.
///
/// Carries the criterion so the operator knows how far the run got; the
/// report is never emitted when this is raised.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("failed to fetch jobs for '{criterion}': {source}")]
    Jenkins {
        criterion: String,
        source: JenkinsError,
    },

    #[error("invalid search pattern for '{criterion}': {source}")]
    Predicate {
        criterion: String,
        source: regex::Error,
    },
}

/// Raised for a `--mode` value other than `report` or `remind`.
#[derive(Debug, Error)]
#[error("Invalid mode selected: {0}")]
pub struct ModeError(pub String);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to read template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("template not found: {0}")]
    NotFound(String),

    #[error("unknown template placeholder: {{{{ {0} }}}}")]
    UnknownPlaceholder(String),

    #[error("invalid placeholder syntax: {0}")]
    Syntax(#[from] regex::Error),
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP connection to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("SMTP I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SMTP server rejected {command}: {reply}")]
    Rejected { command: String, reply: String },

    #[error("no recipients for email")]
    NoRecipients,
}

/// Any failure of a report or reminder run.
#[derive(Debug, Error)]
pub enum JeevesError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Jenkins(#[from] JenkinsError),

    #[error(transparent)]
    Match(#[from] MatchError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Mail(#[from] MailError),
}
