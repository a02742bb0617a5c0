use chrono::NaiveDate;

use crate::builders::patterns::SearchField;
use crate::core::config::{BlockerSet, GlobalFilter, Mode};

/// Where the header's criteria come from.
#[derive(Debug, Clone, Copy)]
pub enum HeaderSource<'a> {
    /// `job_search_fields`, for a report.
    SearchFields(&'a [SearchField]),
    /// The loaded blockers file, for a reminder.
    Blockers(&'a BlockerSet),
}

/// The summary preface of a report or reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub mode: Mode,
    /// Title line, including the run date.
    pub title: String,
    /// One description per configured criterion, in configuration order.
    pub criteria: Vec<String>,
    /// The active global filter, rendered as `NAME=VALUE`.
    pub filter: Option<String>,
    pub date: NaiveDate,
}

impl Header {
    /// The date-free summary line.
    ///
    /// Identical inputs always produce identical text.
    pub fn summary(&self) -> String {
        let (label, noun) = match self.mode {
            Mode::Report => ("Report", plural(self.criteria.len(), "search criterion", "search criteria")),
            Mode::Remind => ("Reminder", plural(self.criteria.len(), "blocker", "blockers")),
        };

        let mut text = if self.criteria.is_empty() {
            format!("{label}: no criteria configured")
        } else {
            format!(
                "{label}: {} {noun} configured ({})",
                self.criteria.len(),
                self.criteria.join(", ")
            )
        };

        if let Some(filter) = &self.filter {
            text.push_str(&format!(" | filter: {filter}"));
        }
        text
    }
}

fn plural(count: usize, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 { one } else { many }
}

/// Builds the header for a run.
///
/// # Arguments
/// * `source`: The search fields (report) or blockers (remind) being evaluated.
/// * `filter`: The global filter, if one is configured.
/// * `date`: The run date shown in the title. It never affects [`Header::summary`].
pub fn generate_header(
    source: HeaderSource<'_>,
    filter: Option<&GlobalFilter>,
    date: NaiveDate,
) -> Header {
    let (mode, criteria, title): (Mode, Vec<String>, &str) = match source {
        HeaderSource::SearchFields(fields) => (
            Mode::Report,
            fields.iter().map(SearchField::describe).collect(),
            "Jeeves Jenkins Report",
        ),
        HeaderSource::Blockers(blockers) => (
            Mode::Remind,
            blockers.keys().cloned().collect(),
            "Jeeves Blocker Reminder",
        ),
    };

    Header {
        mode,
        title: format!("{title} - {}", date.format("%Y-%m-%d")),
        criteria,
        filter: filter.map(ToString::to_string),
        date,
    }
}
