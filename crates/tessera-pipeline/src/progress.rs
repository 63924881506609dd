//! Progress extraction from pipeline output.
//!
//! The pipeline reports progress only through its log output. Each line is
//! classified by [`parse_line`] (first match wins):
//!
//! | Line                                   | Event                      |
//! |----------------------------------------|----------------------------|
//! | `[TES] Task submitted: <id>`           | [`ProgressEvent::JobSubmitted`] |
//! | starts with `total`                    | [`ProgressEvent::TotalJobs`]    |
//! | contains `Nothing to be done`          | [`ProgressEvent::NothingToDo`]  |
//! | `<n> of <m> steps ... done`            | [`ProgressEvent::Steps`]        |
//!
//! and folded into the record by [`apply`].

use std::sync::LazyLock;

use regex::Regex;
use tessera_types::{WorkflowRecord, WorkflowState};

/// Printed by the backend executor plugin for every submitted sub-job.
pub const JOB_SUBMITTED_MARKER: &str = "[TES] Task submitted: ";

static STEPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+) of (\d+) steps .* done$").expect("static regex"));

/// A structured event recognised in one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    JobSubmitted(String),
    TotalJobs(u32),
    NothingToDo,
    Steps { finished: u32, total: u32 },
}

/// Classify one line of output. Returns `None` for lines that carry no progress.
pub fn parse_line(line: &str) -> Option<ProgressEvent> {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(JOB_SUBMITTED_MARKER) {
        let job_id = rest.trim();
        return (!job_id.is_empty()).then(|| ProgressEvent::JobSubmitted(job_id.to_string()));
    }

    if line.starts_with("total") {
        return line
            .split_whitespace()
            .last()
            .and_then(|token| token.parse().ok())
            .map(ProgressEvent::TotalJobs);
    }

    if line.contains("Nothing to be done") {
        return Some(ProgressEvent::NothingToDo);
    }

    let caps = STEPS_RE.captures(line)?;
    let finished = caps[1].parse().ok()?;
    let total = caps[2].parse().ok()?;
    Some(ProgressEvent::Steps { finished, total })
}

/// Fold `event` into `record`. Returns `true` if anything changed.
///
/// Terminal states are never left; job ids and counters are still recorded
/// after a terminal state so the detail view stays complete.
pub fn apply(record: &mut WorkflowRecord, event: &ProgressEvent) -> bool {
    match event {
        ProgressEvent::JobSubmitted(job_id) => {
            let pushed = record.push_job(job_id.as_str());
            let moved = record.transition(WorkflowState::Running);
            pushed || moved
        }
        ProgressEvent::TotalJobs(total) => {
            let changed = record.total_jobs != *total;
            record.total_jobs = *total;
            changed
        }
        ProgressEvent::NothingToDo => record.transition(WorkflowState::Finished),
        ProgressEvent::Steps { finished, total } => {
            let counts_changed = record.finished_jobs != *finished || record.total_jobs != *total;
            record.finished_jobs = *finished;
            record.total_jobs = *total;
            let next = if finished == total {
                WorkflowState::Finished
            } else {
                WorkflowState::Running
            };
            record.transition(next) || counts_changed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record() -> WorkflowRecord {
        WorkflowRecord::new(Uuid::new_v4(), "h", "alice")
    }

    fn ingest(record: &mut WorkflowRecord, line: &str) -> bool {
        parse_line(line).is_some_and(|event| apply(record, &event))
    }

    #[test]
    fn test_parse_priority_order() {
        assert_eq!(
            parse_line("[TES] Task submitted: T1"),
            Some(ProgressEvent::JobSubmitted("T1".to_string()))
        );
        assert_eq!(parse_line("total                 7"), Some(ProgressEvent::TotalJobs(7)));
        assert_eq!(
            parse_line("Nothing to be done (all requested files are present and up to date)."),
            Some(ProgressEvent::NothingToDo)
        );
        assert_eq!(
            parse_line("5 of 10 steps (50%) done"),
            Some(ProgressEvent::Steps { finished: 5, total: 10 })
        );
        assert_eq!(parse_line("Building DAG of jobs..."), None);
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_total_line_with_non_numeric_tail_is_ignored() {
        assert_eq!(parse_line("total jobs pending"), None);
    }

    #[test]
    fn test_steps_must_span_the_whole_line() {
        assert_eq!(parse_line("Finished: 5 of 10 steps (50%) done"), None);
        assert_eq!(parse_line("5 of 10 steps (50%) done, more to come"), None);
    }

    #[test]
    fn test_submission_marker_appends_and_runs() {
        let mut r = record();
        assert!(ingest(&mut r, "[TES] Task submitted: T1"));
        assert_eq!(r.job_ids, vec!["T1"]);
        assert_eq!(r.state, WorkflowState::Running);
    }

    #[test]
    fn test_step_progression() {
        let mut r = record();
        assert!(ingest(&mut r, "5 of 10 steps (50%) done"));
        assert_eq!((r.finished_jobs, r.total_jobs, r.state), (5, 10, WorkflowState::Running));

        assert!(ingest(&mut r, "10 of 10 steps (100%) done"));
        assert_eq!((r.finished_jobs, r.total_jobs, r.state), (10, 10, WorkflowState::Finished));
    }

    #[test]
    fn test_total_sets_count_only() {
        let mut r = record();
        assert!(ingest(&mut r, "total 3"));
        assert_eq!(r.total_jobs, 3);
        assert_eq!(r.state, WorkflowState::Unknown);
        assert!(!ingest(&mut r, "total 3"));
    }

    #[test]
    fn test_nothing_to_do_finishes() {
        let mut r = record();
        assert!(ingest(&mut r, "Nothing to be done."));
        assert_eq!(r.state, WorkflowState::Finished);
    }

    #[test]
    fn test_terminal_state_is_sticky() {
        let mut r = record();
        r.state = WorkflowState::Canceled;
        ingest(&mut r, "[TES] Task submitted: T9");
        ingest(&mut r, "3 of 10 steps (30%) done");
        assert_eq!(r.state, WorkflowState::Canceled);
        // bookkeeping still lands
        assert_eq!(r.job_ids, vec!["T9"]);
        assert_eq!(r.finished_jobs, 3);
    }
}
