use html_escape::{encode_double_quoted_attribute, encode_text};
use std::collections::BTreeMap;
use tracing::info;

use crate::builders::header::Header;
use crate::builders::mailer::{dispatch, Mailer};
use crate::builders::template::{RenderContext, Renderer};
use crate::core::config::{BlockerSet, Config};
use crate::core::engine::{Criterion, CriterionMatch, JobMatcher, JobStatus};
use crate::core::error::JeevesError;
use crate::core::jenkins::{BuildResult, JenkinsClient};

/// Everything `run_report` needs besides its collaborators.
pub struct ReportRequest<'a> {
    pub config: &'a Config,
    /// Used to flag report rows whose job is tracked as a blocker.
    pub blockers: &'a BlockerSet,
    /// Trusted HTML placed between the header and the job sections.
    pub preamble: Option<String>,
    pub header: &'a Header,
    pub no_email: bool,
    pub test_email: bool,
}

/// Counts of job statuses across every section of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTally {
    counts: BTreeMap<BuildResult, usize>,
}

impl StatusTally {
    pub fn from_sections(sections: &[CriterionMatch]) -> Self {
        let mut counts = BTreeMap::new();
        for job in sections.iter().flat_map(|section| &section.jobs) {
            *counts.entry(job.status).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn count(&self, status: BuildResult) -> usize {
        self.counts.get(&status).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// E.g. `3 jobs: 2 success, 1 failure`.
    pub fn describe(&self) -> String {
        let total = self.total();
        let noun = if total == 1 { "job" } else { "jobs" };
        let parts: Vec<String> = BuildResult::ALL
            .iter()
            .filter(|status| self.count(**status) > 0)
            .map(|status| format!("{} {}", self.count(*status), status))
            .collect();

        if parts.is_empty() {
            format!("{total} {noun}")
        } else {
            format!("{total} {noun}: {}", parts.join(", "))
        }
    }
}

/// A finished report. The HTML is always present, whether or not it was mailed.
#[derive(Debug, Clone)]
pub struct Report {
    pub sections: Vec<CriterionMatch>,
    pub tally: StatusTally,
    pub html: String,
    /// Recipients of the single email sent, empty when email was suppressed.
    pub emailed_to: Vec<String>,
}

/// Evaluates every search field, renders the report and sends it at most once.
///
/// # Arguments
/// * `request`: Configuration, header, preamble and email switches.
/// * `client`: Source of the live job roster.
/// * `renderer`: Turns the assembled context into HTML.
/// * `mailer`: Used only when `no_email` is false.
///
/// # Returns
/// The rendered `Report`. Any matching failure aborts the run before
/// rendering, so a partial report is never produced.
pub fn run_report(
    request: ReportRequest<'_>,
    client: &dyn JenkinsClient,
    renderer: &dyn Renderer,
    mailer: &dyn Mailer,
) -> Result<Report, JeevesError> {
    let config = request.config;
    let matcher = JobMatcher::new(client, config.filter.as_ref());

    let sections = config
        .job_search_fields
        .iter()
        .map(|field| matcher.match_criterion(&Criterion::Search(field)))
        .collect::<Result<Vec<_>, _>>()?;

    let tally = StatusTally::from_sections(&sections);
    info!(
        sections = sections.len(),
        jobs = tally.total(),
        "report assembled"
    );

    let context = RenderContext {
        title: request.header.title.clone(),
        header: request.header.summary(),
        summary: tally.describe(),
        date: request.header.date.format("%Y-%m-%d").to_string(),
        preamble: request.preamble,
        body: render_sections(&sections, request.blockers, request.header.filter.as_deref()),
    };
    let html = renderer.render(&context)?;

    let emailed_to = if request.no_email {
        Vec::new()
    } else {
        dispatch(
            config,
            &request.header.title,
            &html,
            request.test_email,
            mailer,
        )?
    };

    Ok(Report {
        sections,
        tally,
        html,
        emailed_to,
    })
}

fn render_sections(sections: &[CriterionMatch], blockers: &BlockerSet, filter: Option<&str>) -> String {
    // job name -> ids of blockers tracking it
    let mut blocked_by: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (id, entry) in blockers {
        blocked_by.entry(entry.job.as_str()).or_default().push(id.as_str());
    }

    let mut body = String::new();
    for section in sections {
        body.push_str(&format!(
            "<h2 class=\"criterion\">{}</h2>\n",
            encode_text(&section.description)
        ));

        if section.is_empty() {
            body.push_str("<p class=\"no-match\">No matching jobs");
            if let (Some(filter), true) = (filter, section.filtered_out > 0) {
                body.push_str(&format!(
                    " ({} excluded by filter {})",
                    section.filtered_out,
                    encode_text(filter)
                ));
            }
            body.push_str("</p>\n");
            continue;
        }

        body.push_str(
            "<table class=\"jobs\">\n<tr><th>Job</th><th>Build</th><th>Status</th><th>Blockers</th></tr>\n",
        );
        for job in &section.jobs {
            let blockers = blocked_by
                .get(job.name.as_str())
                .map(|ids| ids.join(", "))
                .unwrap_or_default();
            body.push_str(&job_row(job, &blockers));
        }
        body.push_str("</table>\n");
    }
    body
}

fn job_row(job: &JobStatus, blockers: &str) -> String {
    let name = match &job.url {
        Some(url) => format!(
            "<a href=\"{}\">{}</a>",
            encode_double_quoted_attribute(url),
            encode_text(&job.name)
        ),
        None => encode_text(&job.name).into_owned(),
    };
    let build = job
        .build_number
        .map(|n| format!("#{n}"))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "<tr class=\"status-{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        job.status.as_str().replace(' ', "-"),
        name,
        build,
        job.status,
        encode_text(blockers)
    )
}
