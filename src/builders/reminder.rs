use html_escape::{encode_double_quoted_attribute, encode_text};
use tracing::{info, warn};

use crate::builders::header::Header;
use crate::builders::mailer::{dispatch, Mailer};
use crate::builders::template::{RenderContext, Renderer};
use crate::core::config::{BlockerEntry, BlockerSet, Config};
use crate::core::engine::{Criterion, JobMatcher, JobStatus};
use crate::core::error::JeevesError;
use crate::core::jenkins::{BuildResult, JenkinsClient};

pub struct RemindRequest<'a> {
    pub config: &'a Config,
    pub blockers: &'a BlockerSet,
    pub header: &'a Header,
    pub no_email: bool,
    pub test_email: bool,
}

/// Where a blocker stands on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerState {
    /// The job exists and its last build did not succeed.
    Active(BuildResult),
    /// The job exists but was excluded by the global filter, so its
    /// resolution cannot be confirmed.
    Filtered,
    /// The job no longer exists in Jenkins. Still reported as unresolved.
    Missing,
    Resolved,
}

impl BlockerState {
    pub fn is_resolved(&self) -> bool {
        matches!(self, BlockerState::Resolved)
    }

    fn label(&self) -> String {
        match self {
            BlockerState::Active(status) => status.to_string(),
            BlockerState::Filtered => "no build matching filter".to_string(),
            BlockerState::Missing => "unresolved: job missing".to_string(),
            BlockerState::Resolved => "resolved".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockerStatus {
    pub id: String,
    pub entry: BlockerEntry,
    pub state: BlockerState,
    pub job: Option<JobStatus>,
}

#[derive(Debug, Clone)]
pub struct Reminder {
    /// Unresolved blockers, in id order.
    pub active: Vec<BlockerStatus>,
    pub resolved: Vec<BlockerStatus>,
    pub html: String,
    pub emailed_to: Vec<String>,
}

/// Checks each blocker's job, renders the reminder and sends it at most once.
pub fn run_remind(
    request: RemindRequest<'_>,
    client: &dyn JenkinsClient,
    renderer: &dyn Renderer,
    mailer: &dyn Mailer,
) -> Result<Reminder, JeevesError> {
    let config = request.config;
    let matcher = JobMatcher::new(client, config.filter.as_ref());

    let mut active = Vec::new();
    let mut resolved = Vec::new();

    for (id, entry) in request.blockers {
        let result = matcher.match_criterion(&Criterion::Blocker {
            id: id.as_str(),
            entry,
        })?;
        let job = result.jobs.into_iter().next();

        let state = match &job {
            Some(job) if job.status == BuildResult::Success => BlockerState::Resolved,
            Some(job) => BlockerState::Active(job.status),
            None if result.filtered_out > 0 => BlockerState::Filtered,
            None => {
                warn!(blocker = %id, job = %entry.job, "blocker references a job missing from Jenkins");
                BlockerState::Missing
            }
        };

        let status = BlockerStatus {
            id: id.clone(),
            entry: entry.clone(),
            state,
            job,
        };
        if state.is_resolved() {
            resolved.push(status);
        } else {
            active.push(status);
        }
    }

    info!(
        active = active.len(),
        resolved = resolved.len(),
        "blockers evaluated"
    );

    let mut body = render_blockers("Active blockers", &active, "No active blockers");
    if config.show_resolved_blockers && !resolved.is_empty() {
        body.push_str(&render_blockers("Resolved blockers", &resolved, ""));
    }

    let context = RenderContext {
        title: request.header.title.clone(),
        header: request.header.summary(),
        summary: format!("{} active, {} resolved", active.len(), resolved.len()),
        date: request.header.date.format("%Y-%m-%d").to_string(),
        preamble: None,
        body,
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

    Ok(Reminder {
        active,
        resolved,
        html,
        emailed_to,
    })
}

fn render_blockers(title: &str, blockers: &[BlockerStatus], empty_marker: &str) -> String {
    let mut body = format!("<h2 class=\"blockers\">{}</h2>\n", encode_text(title));

    if blockers.is_empty() {
        body.push_str(&format!(
            "<p class=\"no-blockers\">{}</p>\n",
            encode_text(empty_marker)
        ));
        return body;
    }

    body.push_str(
        "<table class=\"blockers\">\n<tr><th>Blocker</th><th>Job</th><th>Status</th><th>Owner</th><th>Description</th><th>Tickets</th></tr>\n",
    );
    for blocker in blockers {
        let job = match blocker.job.as_ref().and_then(|j| j.url.as_ref()) {
            Some(url) => format!(
                "<a href=\"{}\">{}</a>",
                encode_double_quoted_attribute(url),
                encode_text(&blocker.entry.job)
            ),
            None => encode_text(&blocker.entry.job).into_owned(),
        };
        body.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            encode_text(&blocker.id),
            job,
            encode_text(&blocker.state.label()),
            encode_text(blocker.entry.owner.as_deref().unwrap_or("unassigned")),
            encode_text(blocker.entry.description.as_deref().unwrap_or("")),
            encode_text(&blocker.entry.tickets.join(", ")),
        ));
    }
    body.push_str("</table>\n");
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_labels() {
        assert_eq!(BlockerState::Active(BuildResult::Failure).label(), "failure");
        assert_eq!(BlockerState::Missing.label(), "unresolved: job missing");
        assert!(!BlockerState::Missing.is_resolved());
        assert!(!BlockerState::Filtered.is_resolved());
        assert!(BlockerState::Resolved.is_resolved());
    }

    #[test]
    fn test_render_lists_owner_and_tickets() {
        let mut entry = BlockerEntry::new("migrate-job");
        entry.owner = Some("alice".into());
        entry.tickets = vec!["BZ-1".into(), "BZ-2".into()];
        let blockers = vec![BlockerStatus {
            id: "db-migration".into(),
            entry,
            state: BlockerState::Active(BuildResult::Failure),
            job: None,
        }];

        let body = render_blockers("Active blockers", &blockers, "No active blockers");
        assert!(body.contains(
            "<tr><td>db-migration</td><td>migrate-job</td><td>failure</td><td>alice</td><td></td><td>BZ-1, BZ-2</td></tr>"
        ));
    }

    #[test]
    fn test_render_empty_marker() {
        let body = render_blockers("Active blockers", &[], "No active blockers");
        assert!(body.contains("<p class=\"no-blockers\">No active blockers</p>"));
    }
}
