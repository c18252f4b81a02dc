//! Run log and report
//!
//! The run log is append-only: the interpreter pushes one entry per step it
//! attempted and nothing edits an entry afterwards. The report wraps the
//! final log with the aggregate verdict.

use std::time::Duration;

use colored::Colorize;
use serde::{Serialize, Serializer};

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failure,
    Skipped,
}

/// Verdict of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Success,
    Failure,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Success => write!(f, "success"),
            OverallStatus::Failure => write!(f, "failure"),
        }
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Recorded result of one attempted step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepResult {
    /// 1-based position in the test case; 0 for the setup entry
    pub step_index: usize,
    pub action_name: String,
    pub status: StepStatus,
    pub message: String,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
}

/// Ordered results of a run
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    entries: Vec<StepResult>,
    aborted: bool,
    cancelled: bool,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: StepResult) {
        self.entries.push(result);
    }

    /// Record that a fatal error stopped the remaining steps
    pub fn mark_aborted(&mut self) {
        self.aborted = true;
    }

    pub fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub fn entries(&self) -> &[StepResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aborted(&self) -> bool {
        self.aborted
    }

    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Success only if every entry succeeded and the run went to the end
    pub fn overall_status(&self) -> OverallStatus {
        let all_passed = self
            .entries
            .iter()
            .all(|entry| entry.status == StepStatus::Success);
        if all_passed && !self.aborted && !self.cancelled {
            OverallStatus::Success
        } else {
            OverallStatus::Failure
        }
    }
}

/// Everything a consumer gets back from a run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub name: String,
    pub overall_status: OverallStatus,
    pub log: Vec<StepResult>,
    pub cancelled: bool,
    #[serde(rename = "duration_secs", serialize_with = "as_secs")]
    pub duration: Duration,
}

impl RunReport {
    pub fn from_log(name: impl Into<String>, log: RunLog, duration: Duration) -> Self {
        Self {
            name: name.into(),
            overall_status: log.overall_status(),
            cancelled: log.cancelled(),
            log: log.entries,
            duration,
        }
    }

    pub fn passed(&self) -> bool {
        self.overall_status == OverallStatus::Success
    }

    /// Print a colored, human-readable summary to stdout
    pub fn print(&self) {
        println!(
            "\n{} {}",
            "Test Case:".blue().bold(),
            self.name.white().bold()
        );

        for entry in &self.log {
            let marker = match entry.status {
                StepStatus::Success => "✓".green(),
                StepStatus::Failure => "✗".red(),
                StepStatus::Skipped => "-".yellow(),
            };
            let label = if entry.step_index == 0 {
                entry.action_name.clone()
            } else {
                format!("Step {}: {}", entry.step_index, entry.action_name)
            };
            println!(
                "  {} {} {} {}",
                marker,
                label,
                entry.message.dimmed(),
                format!("({:.2}s)", entry.duration.as_secs_f64()).dimmed()
            );
        }

        if self.cancelled {
            println!("\n  {}", "Run cancelled".yellow());
        }

        let passed = self.log.iter().filter(|e| e.status == StepStatus::Success).count();
        let summary = format!(
            "{}/{} steps passed in {:.2}s",
            passed,
            self.log.len(),
            self.duration.as_secs_f64()
        );
        if self.passed() {
            println!("\n{} {} {}", "✓".green().bold(), "Test Passed".green().bold(), summary.dimmed());
        } else {
            println!("\n{} {} {}", "✗".red().bold(), "Test Failed".red().bold(), summary.dimmed());
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(index: usize, status: StepStatus) -> StepResult {
        StepResult {
            step_index: index,
            action_name: "click".to_string(),
            status,
            message: String::new(),
            duration: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_overall_status() {
        let mut log = RunLog::new();
        log.push(entry(1, StepStatus::Success));
        assert_eq!(log.overall_status(), OverallStatus::Success);

        log.push(entry(2, StepStatus::Skipped));
        assert_eq!(log.overall_status(), OverallStatus::Failure);
    }

    #[test]
    fn test_abort_and_cancel_fail_the_run() {
        let mut log = RunLog::new();
        log.push(entry(1, StepStatus::Success));
        log.mark_aborted();
        assert_eq!(log.overall_status(), OverallStatus::Failure);

        let mut log = RunLog::new();
        log.mark_cancelled();
        assert_eq!(log.overall_status(), OverallStatus::Failure);
    }

    #[test]
    fn test_report_json_shape() {
        let mut log = RunLog::new();
        log.push(entry(1, StepStatus::Failure));
        let report = RunReport::from_log("Login", log, Duration::from_secs(2));

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["name"], "Login");
        assert_eq!(value["overall_status"], "failure");
        assert_eq!(value["cancelled"], false);
        assert_eq!(value["duration_secs"], 2.0);
        assert_eq!(value["log"][0]["status"], "failure");
        assert_eq!(value["log"][0]["step_index"], 1);
        assert_eq!(value["log"][0]["duration_secs"], 0.25);
    }
}
