use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::builders::header::{generate_header, HeaderSource};
use crate::builders::mailer::{Mailer, NoopMailer, SmtpMailer};
use crate::builders::reminder::{run_remind, RemindRequest};
use crate::builders::reporter::{run_report, ReportRequest};
use crate::builders::template::HtmlTemplate;
use crate::builders::validator::ValidationOptions;
use crate::core::config::{Config, ConfigManager, ConfigProvider, Mode};
use crate::core::jenkins::{JenkinsAuth, JenkinsServer};

/// The command-line switches of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    pub blockers_path: PathBuf,
    pub preamble_path: Option<PathBuf>,
    pub template: String,
    pub mode: String,
    pub no_email: bool,
    pub test_email: bool,
}

/// Sets up the stderr logger. Stdout is left for the rendered HTML.
pub fn initialize_logging(verbose: bool, quiet: bool) -> Result<()> {
    let level = if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Runs Jeeves once: load, validate, connect, build the header, then report
/// or remind.
///
/// Configuration problems are raised before Jenkins is contacted. When email
/// is suppressed the rendered document is printed to stdout.
pub fn run(options: &RunOptions) -> Result<()> {
    let mode: Mode = options.mode.parse()?;

    let manager = ConfigManager::new(&options.config_path, &options.blockers_path);
    let config = manager
        .load_config()
        .and_then(|raw| {
            Config::from_raw(
                raw,
                &ValidationOptions {
                    mode,
                    no_email: options.no_email,
                    test_email: options.test_email,
                },
            )
        })
        .context("Error loading configuration data")?;

    let blockers = manager
        .load_blockers()
        .context("Error loading blocker configuration data")?;

    let preamble = options
        .preamble_path
        .as_ref()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("Error reading preamble {}", path.display()))
        })
        .transpose()?;

    let template_name = match mode {
        Mode::Report => options.template.as_str(),
        Mode::Remind => config.remind_template.as_str(),
    };
    let template = HtmlTemplate::load(template_name).context("Error loading template")?;

    let auth = match (&config.jenkins_user, &config.jenkins_api_token) {
        (Some(user), Some(api_token)) => Some(JenkinsAuth {
            user: user.clone(),
            api_token: api_token.clone(),
        }),
        _ => None,
    };
    info!(url = %config.jenkins_url, "connecting to Jenkins");
    let server = JenkinsServer::connect(
        &config.jenkins_url,
        auth,
        config.jenkins_timeout,
        config.jenkins_verify_ssl,
    )
        .context("Error connecting to Jenkins server")?;

    let mailer: Box<dyn Mailer> = match &config.email {
        Some(settings) if !options.no_email => Box::new(SmtpMailer::from_settings(settings)),
        _ => Box::new(NoopMailer),
    };

    let today = chrono::Local::now().date_naive();
    let (html, emailed_to) = match mode {
        Mode::Report => {
            let header = generate_header(
                HeaderSource::SearchFields(&config.job_search_fields),
                config.filter.as_ref(),
                today,
            );
            let report = run_report(
                ReportRequest {
                    config: &config,
                    blockers: &blockers,
                    preamble,
                    header: &header,
                    no_email: options.no_email,
                    test_email: options.test_email,
                },
                &server,
                &template,
                mailer.as_ref(),
            )
            .context("Error generating report")?;
            (report.html, report.emailed_to)
        }
        Mode::Remind => {
            let header = generate_header(
                HeaderSource::Blockers(&blockers),
                config.filter.as_ref(),
                today,
            );
            let reminder = run_remind(
                RemindRequest {
                    config: &config,
                    blockers: &blockers,
                    header: &header,
                    no_email: options.no_email,
                    test_email: options.test_email,
                },
                &server,
                &template,
                mailer.as_ref(),
            )
            .context("Error generating reminder")?;
            (reminder.html, reminder.emailed_to)
        }
    };

    if options.no_email {
        println!("{html}");
    } else {
        info!(recipients = %emailed_to.join(", "), "{mode} sent");
    }
    Ok(())
}
