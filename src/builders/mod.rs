// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. These modules turn configuration and job state into the
// finished report or reminder.

// `patterns` module:
// Defines the search-field definitions read from `job_search_fields` and the
// closed set of match kinds (exact, substring, pattern, glob) together with
// the `JobPredicate` that evaluates them, including the global filter.
pub mod patterns;

// `validator` module:
// Checks a loaded configuration for the keys the selected mode needs. It
// defines the `ConfigValidator` trait and the `StandardValidator` used by
// every run, and must succeed before Jenkins is contacted.
pub mod validator;

// `header` module:
// Builds the summary header (criteria, counts, active filter, mode) shown
// at the top of reports and reminders.
pub mod header;

// `reporter` module:
// The report synthesizer. Runs the job matcher over every search field,
// tallies statuses, renders the HTML and sends it at most once.
pub mod reporter;

// `reminder` module:
// The reminder synthesizer. Decides for each tracked blocker whether it is
// still active, resolved, or pointing at a job that no longer exists.
pub mod reminder;

// `template` module:
// The `Renderer` trait and the `HtmlTemplate` implementation that fills
// `{{ placeholder }}` slots in an HTML file.
pub mod template;

// `mailer` module:
// The `Mailer` trait, the plain-SMTP `SmtpMailer`, and the single-send
// dispatch shared by both synthesizers.
pub mod mailer;
