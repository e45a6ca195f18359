use std::io;
use std::path::Path;

use serde::Serialize;

use crate::case::{TestCase, TestContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub name: String,
    pub compliance: String,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one group execution.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub group: String,
    pub total: usize,
    pub failures: usize,
    pub outcomes: Vec<CaseOutcome>,
}

impl RunReport {
    pub fn passed(&self) -> bool {
        self.failures == 0
    }

    pub fn print_summary(&self) {
        eprintln!(
            "{}: {} cases, {} failures",
            self.group, self.total, self.failures
        );
        for outcome in &self.outcomes {
            match outcome.status {
                CaseStatus::Failed => {
                    let error = outcome.error.as_deref().unwrap_or("unknown error");
                    eprintln!("  FAIL {}: {}", outcome.name, error);
                }
                CaseStatus::Skipped => eprintln!("  skip {}", outcome.name),
                CaseStatus::Passed => {}
            }
        }
    }

    pub fn write_json(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, contents)
    }
}

/// Runs a group's cases in declaration order.
///
/// A case failure is recorded and the runner moves on: failure isolation is
/// per scenario, so one broken case cannot take the rest of the group down
/// with it. The error-to-failure conversion happens here and nowhere else.
pub struct GroupRunner {
    group: &'static str,
    cases: Vec<Box<dyn TestCase>>,
}

impl GroupRunner {
    pub fn new(group: &'static str) -> Self {
        Self {
            group,
            cases: Vec::new(),
        }
    }

    pub fn add(&mut self, case: Box<dyn TestCase>) {
        self.cases.push(case);
    }

    pub fn run(&mut self, ctx: &mut TestContext) -> RunReport {
        let mut outcomes = Vec::with_capacity(self.cases.len());
        let mut failures = 0usize;
        let filter = ctx
            .config
            .filter
            .as_deref()
            .map(|f| f.to_ascii_lowercase());

        for case in &mut self.cases {
            let info = *case.info();
            if let Some(filter) = filter.as_deref() {
                if !info.name.to_ascii_lowercase().contains(filter) {
                    outcomes.push(CaseOutcome {
                        name: info.name.to_string(),
                        compliance: info.compliance.to_string(),
                        status: CaseStatus::Skipped,
                        error: None,
                    });
                    continue;
                }
            }

            tracing::info!(group = self.group, case = info.name, "running");
            let outcome = match case.run(ctx) {
                Ok(()) => {
                    tracing::info!(group = self.group, case = info.name, "passed");
                    CaseOutcome {
                        name: info.name.to_string(),
                        compliance: info.compliance.to_string(),
                        status: CaseStatus::Passed,
                        error: None,
                    }
                }
                Err(err) => {
                    failures += 1;
                    tracing::warn!(group = self.group, case = info.name, %err, "failed");
                    CaseOutcome {
                        name: info.name.to_string(),
                        compliance: info.compliance.to_string(),
                        status: CaseStatus::Failed,
                        error: Some(err.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        RunReport {
            group: self.group.to_string(),
            total: outcomes.len(),
            failures,
            outcomes,
        }
    }
}
