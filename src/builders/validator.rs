use crate::builders::patterns::SearchField;
use crate::core::config::{Mode, RawConfig};
use crate::core::error::ConfigError;

/// The run options that decide which configuration keys are required.
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    pub mode: Mode,
    pub no_email: bool,
    pub test_email: bool,
}

/// A single problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigIssue {
    /// A required key is absent (or empty).
    Missing(String),
    /// A key is present but unusable.
    Invalid(String),
}

/// The `ConfigValidator` trait defines the public interface for validating a
/// loaded configuration before any Jenkins connection is attempted.
pub trait ConfigValidator {
    /// Performs a full validation of the `RawConfig` and returns every issue found.
    ///
    /// # Arguments
    /// * `config`: The configuration as loaded from YAML.
    /// * `options`: The mode and email switches of the current run.
    ///
    /// # Returns
    /// A `Vec<ConfigIssue>`; empty when the configuration is usable.
    fn validate_config(&self, config: &RawConfig, options: &ValidationOptions) -> Vec<ConfigIssue>;

    /// Validates a single search field and returns a list of issues.
    ///
    /// # Arguments
    /// * `field`: The `SearchField` to be validated.
    fn validate_search_field(&self, field: &SearchField) -> Vec<String>;
}

/// The `StandardValidator` is the concrete implementation of `ConfigValidator`
/// used by every run.
pub struct StandardValidator;

impl StandardValidator {
    /// Creates a new instance of `StandardValidator`.
    pub fn new() -> Self {
        Self
    }

    /// Treats `Some("")` and whitespace-only strings like an absent key.
    fn is_blank(value: &Option<String>) -> bool {
        value.as_deref().is_none_or(|v| v.trim().is_empty())
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for StandardValidator {
    /// Checks, in order:
    /// - `jenkins_url` is present and is an http(s) URL.
    /// - `job_search_fields` is present in report mode (an empty list is fine).
    /// - The global filter is either fully set or fully absent.
    /// - Email settings exist unless email is suppressed.
    /// - A test address exists when a test email was requested.
    fn validate_config(&self, config: &RawConfig, options: &ValidationOptions) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if Self::is_blank(&config.jenkins_url) {
            issues.push(ConfigIssue::Missing("jenkins_url".into()));
        } else if let Some(url) = &config.jenkins_url
            && !(url.starts_with("http://") || url.starts_with("https://"))
        {
            issues.push(ConfigIssue::Invalid(format!(
                "jenkins_url must start with http:// or https://, got '{url}'"
            )));
        }

        match (&config.job_search_fields, options.mode) {
            (None, Mode::Report) => {
                issues.push(ConfigIssue::Missing("job_search_fields".into()));
            }
            (Some(fields), _) => {
                for field in fields {
                    issues.extend(
                        self.validate_search_field(field)
                            .into_iter()
                            .map(ConfigIssue::Invalid),
                    );
                }
            }
            (None, Mode::Remind) => {}
        }

        match (
            Self::is_blank(&config.filter_param_name),
            config.filter_param_value.is_none(),
        ) {
            (false, true) => issues.push(ConfigIssue::Missing("filter_param_value".into())),
            (true, false) => issues.push(ConfigIssue::Missing("filter_param_name".into())),
            _ => {}
        }

        if !options.no_email {
            if Self::is_blank(&config.email_from) {
                issues.push(ConfigIssue::Missing("email_from".into()));
            }
            if config.email_to.as_ref().is_none_or(|to| to.to_vec().is_empty()) {
                issues.push(ConfigIssue::Missing("email_to".into()));
            }
            if Self::is_blank(&config.smtp_host) {
                issues.push(ConfigIssue::Missing("smtp_host".into()));
            }
        }

        if options.test_email && Self::is_blank(&config.test_email) {
            issues.push(ConfigIssue::Missing("test_email".into()));
        }

        issues
    }

    /// A field needs non-empty search text, and `pattern` fields must compile.
    fn validate_search_field(&self, field: &SearchField) -> Vec<String> {
        let mut issues = Vec::new();

        if field.name.trim().is_empty() {
            issues.push("job_search_fields entry has an empty name".to_string());
            return issues;
        }

        if let Err(e) = field.predicate() {
            issues.push(format!("invalid search pattern '{}': {e}", field.name));
        }

        issues
    }
}

/// Validates `config` for a run and fails with every missing key at once.
/// Missing keys are reported before invalid values.
pub fn validate_config(config: &RawConfig, options: &ValidationOptions) -> Result<(), ConfigError> {
    let issues = StandardValidator::new().validate_config(config, options);

    let (missing, invalid): (Vec<_>, Vec<_>) = issues
        .into_iter()
        .partition(|issue| matches!(issue, ConfigIssue::Missing(_)));

    if !missing.is_empty() {
        return Err(ConfigError::MissingFields(
            missing.into_iter().map(issue_text).collect(),
        ));
    }
    if !invalid.is_empty() {
        return Err(ConfigError::Invalid(
            invalid.into_iter().map(issue_text).collect(),
        ));
    }
    Ok(())
}

fn issue_text(issue: ConfigIssue) -> String {
    match issue {
        ConfigIssue::Missing(text) | ConfigIssue::Invalid(text) => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::patterns::MatchKind;
    use crate::core::config::Recipients;

    fn options(mode: Mode, no_email: bool, test_email: bool) -> ValidationOptions {
        ValidationOptions {
            mode,
            no_email,
            test_email,
        }
    }

    fn full_config() -> RawConfig {
        RawConfig {
            jenkins_url: Some("https://ci.example".into()),
            job_search_fields: Some(vec![SearchField::new("nightly", MatchKind::Substring)]),
            email_from: Some("jeeves@example.com".into()),
            email_to: Some(Recipients::One("team@example.com".into())),
            smtp_host: Some("smtp.example.com".into()),
            test_email: Some("me@example.com".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_config_is_valid() {
        let config = full_config();
        assert!(validate_config(&config, &options(Mode::Report, false, true)).is_ok());
    }

    #[test]
    fn test_missing_jenkins_url() {
        let config = RawConfig {
            jenkins_url: None,
            ..full_config()
        };
        let err = validate_config(&config, &options(Mode::Report, true, false)).unwrap_err();
        match err {
            ConfigError::MissingFields(fields) => assert_eq!(fields, vec!["jenkins_url"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_http_url_is_invalid() {
        let config = RawConfig {
            jenkins_url: Some("ci.example".into()),
            ..full_config()
        };
        let err = validate_config(&config, &options(Mode::Report, true, false)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_search_fields_required_only_in_report_mode() {
        let config = RawConfig {
            job_search_fields: None,
            ..full_config()
        };
        assert!(validate_config(&config, &options(Mode::Report, true, false)).is_err());
        assert!(validate_config(&config, &options(Mode::Remind, true, false)).is_ok());
    }

    #[test]
    fn test_empty_search_fields_are_valid() {
        let config = RawConfig {
            job_search_fields: Some(vec![]),
            ..full_config()
        };
        assert!(validate_config(&config, &options(Mode::Report, true, false)).is_ok());
    }

    #[test]
    fn test_email_settings_required_unless_suppressed() {
        let config = RawConfig {
            email_from: None,
            email_to: Some(Recipients::Many(vec![])),
            smtp_host: None,
            ..full_config()
        };
        let err = validate_config(&config, &options(Mode::Report, false, false)).unwrap_err();
        match err {
            ConfigError::MissingFields(fields) => {
                assert_eq!(fields, vec!["email_from", "email_to", "smtp_host"])
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(validate_config(&config, &options(Mode::Report, true, false)).is_ok());
    }

    #[test]
    fn test_test_email_address_required() {
        let config = RawConfig {
            test_email: None,
            ..full_config()
        };
        assert!(validate_config(&config, &options(Mode::Report, false, false)).is_ok());
        let err = validate_config(&config, &options(Mode::Report, false, true)).unwrap_err();
        assert!(err.to_string().contains("test_email"));
    }

    #[test]
    fn test_test_email_address_required_with_no_email() {
        let config = RawConfig {
            jenkins_url: Some("https://ci.example".into()),
            job_search_fields: Some(vec![]),
            ..Default::default()
        };
        let err = validate_config(&config, &options(Mode::Report, true, true)).unwrap_err();
        match err {
            ConfigError::MissingFields(fields) => assert_eq!(fields, vec!["test_email"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_half_configured_filter() {
        let config = RawConfig {
            filter_param_name: Some("RELEASE".into()),
            ..full_config()
        };
        let err = validate_config(&config, &options(Mode::Report, true, false)).unwrap_err();
        assert!(err.to_string().contains("filter_param_value"));
    }

    #[test]
    fn test_invalid_search_pattern() {
        let validator = StandardValidator::new();
        let issues = validator.validate_search_field(&SearchField::new("[abc", MatchKind::Pattern));
        assert_eq!(issues.len(), 1);
        assert!(issues[0].contains("[abc"));

        let issues = validator.validate_search_field(&SearchField::new("  ", MatchKind::Exact));
        assert_eq!(issues, vec!["job_search_fields entry has an empty name"]);
    }
}
