pub mod checks;
pub mod playthrough;
pub mod reports;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use checks::{price_build, validate_catalogue};
pub use playthrough::{PlaythroughPlan, run_playthrough};

/// Outcome of one tester check, whatever the mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    /// Informational lines shown in every report.
    pub details: Vec<String>,
    pub failures: Vec<String>,
    pub elapsed_micros: u64,
}

impl CheckResult {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        details: Vec<String>,
        failures: Vec<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            passed: failures.is_empty(),
            details,
            failures,
            elapsed_micros: u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
        }
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        Duration::from_micros(self.elapsed_micros)
    }
}
