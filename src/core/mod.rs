// This file is the module declaration file for the `core` module.
// In Rust, a `mod.rs` file within a directory (e.g., `src/core/`)
// serves two main purposes:
//
// 1. It declares the submodules contained within that directory.
// 2. It exposes these submodules to the parent module (`src/` in this case),
//    making them accessible to the entire crate.

// `config` module:
// This module is responsible for managing the application's configuration.
// It defines the raw YAML shape (`RawConfig`), the validated `Config`, the
// blocker entries, and a `ConfigManager` that reads both YAML files.
pub mod config;

// `engine` module:
// The `JobMatcher`: selects the Jenkins jobs satisfying one criterion and
// the global filter, tagging each with its build status.
pub mod engine;

pub mod error;

// `jenkins` module:
// The `JenkinsClient` capability and its HTTP implementation.
pub mod jenkins;
