//! Jeeves: scheduled Jenkins status reports and blocker reminders.
//!
//! A run loads the configuration and blockers files, validates them, asks
//! Jenkins for its job roster, matches jobs against each configured
//! criterion, renders an HTML document and optionally emails it.

pub mod builders;
pub mod core;
pub mod utils;
