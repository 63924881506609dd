//! Pipeline process supervision.
//!
//! One [`TaskExecutor::execute`] call drives one run end to end:
//!
//! ```text
//! prepare workspace ──► spawn (own process group) ──► merged stdout/stderr
//!                                                        │
//!                          ┌─────────────────────────────┤ every line / poll tick
//!                          ▼                             ▼
//!                 run log + progress::apply        abort requested?
//!                 (atomic record update)           └─► SIGINT group, mark CANCELED
//!                                                        │
//!                               wait for exit ◄──────────┘
//!                               non-zero without abort ─► FAILED
//!                               remove workspace
//! ```

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use tessera_store::{RunLog, RunLogDir, WorkflowRepository};
use tessera_types::{WorkflowRecord, WorkflowState};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep, timeout_at};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{PipelineError, Result};
use crate::launch::{ExecutorSettings, WorkflowRun, build_launch};
use crate::progress;
use crate::workspace::RunWorkspace;

/// Exit code reported when a run is aborted before its process starts.
pub const ABORTED_BEFORE_LAUNCH: i32 = 130;

const LINE_BUFFER: usize = 256;

/// Whether the owner of a run has asked it to stop.
pub trait AbortSignal: Send + Sync {
    fn is_abort_requested(&self) -> bool;
}

impl AbortSignal for CancellationToken {
    fn is_abort_requested(&self) -> bool {
        self.is_cancelled()
    }
}

/// Never requests an abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAbort;

impl AbortSignal for NoAbort {
    fn is_abort_requested(&self) -> bool {
        false
    }
}

/// Runs pipelines and folds their output into workflow records.
pub struct TaskExecutor {
    settings: ExecutorSettings,
    repo: Arc<dyn WorkflowRepository>,
    logs: RunLogDir,
}

impl TaskExecutor {
    pub fn new(settings: ExecutorSettings, repo: Arc<dyn WorkflowRepository>, logs: RunLogDir) -> Self {
        Self {
            settings,
            repo,
            logs,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Execute `run` to completion and return the process exit code.
    ///
    /// Pipeline failures are recorded in the workflow state; an `Err` means
    /// the run could not be started at all.
    pub async fn execute(&self, run: &WorkflowRun, abort: &dyn AbortSignal) -> Result<i32> {
        let id = run.workflow_id;

        if abort.is_abort_requested() {
            tracing::info!(workflow_id = %id, "Run aborted before launch");
            self.mark(id, WorkflowState::Canceled);
            return Ok(ABORTED_BEFORE_LAUNCH);
        }

        let workspace = match RunWorkspace::prepare(
            &run.definition.template_dir,
            &self.settings.workflow_dir,
            &id.to_string(),
            &run.definition.entry_file,
            &run.placeholder_values(),
        ) {
            Ok(ws) => ws,
            Err(e) => {
                tracing::error!(workflow_id = %id, error = %e, "Workspace setup failed");
                self.mark(id, WorkflowState::Failed);
                return Err(e);
            }
        };

        let result = self.supervise(run, &workspace, abort).await;
        workspace.remove();

        if let Err(e) = &result {
            tracing::error!(workflow_id = %id, error = %e, "Pipeline execution failed");
            self.mark(id, WorkflowState::Failed);
        }
        result
    }

    async fn supervise(
        &self,
        run: &WorkflowRun,
        workspace: &RunWorkspace,
        abort: &dyn AbortSignal,
    ) -> Result<i32> {
        let id = run.workflow_id;
        let poll = self.settings.poll_interval;
        let spec = build_launch(&self.settings, run, workspace.path());

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .envs(&spec.env)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|e| {
            PipelineError::ExecutionFailed(format!(
                "failed to spawn {}: {e}",
                spec.program.display()
            ))
        })?;
        tracing::info!(workflow_id = %id, pid = ?child.id(), "Pipeline started");

        let mut log = match self.logs.create(&run.username, id) {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::warn!(workflow_id = %id, error = %e, "Run log unavailable");
                None
            }
        };

        let (tx, mut rx) = mpsc::channel(LINE_BUFFER);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        // Lines are read until the child exits; abort is only honoured while
        // it is still running.
        let mut aborted = false;
        let mut stream_open = true;
        let status = loop {
            tokio::select! {
                biased;
                line = rx.recv(), if stream_open => match line {
                    Some(line) => self.ingest(id, &line, log.as_mut()),
                    None => stream_open = false,
                },
                status = child.wait() => break status.map_err(|e| {
                    PipelineError::ExecutionFailed(format!("failed to wait for pipeline: {e}"))
                })?,
                _ = sleep(poll) => {}
            }
            if !aborted && abort.is_abort_requested() {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    _ => {
                        aborted = true;
                        self.interrupt(&mut child, id);
                    }
                }
            }
        };

        // Output already written by the exited child is still folded in, but
        // descendants holding the pipes open do not delay completion.
        let deadline = Instant::now() + poll;
        while let Ok(Some(line)) = timeout_at(deadline, rx.recv()).await {
            self.ingest(id, &line, log.as_mut());
        }

        let code = exit_code(status);
        if code != 0 && !aborted {
            self.mark(id, WorkflowState::Failed);
        }
        tracing::info!(workflow_id = %id, exit_code = code, aborted, "Pipeline exited");
        Ok(code)
    }

    fn ingest(&self, id: Uuid, line: &str, log: Option<&mut RunLog>) {
        if let Some(log) = log {
            if let Err(e) = log.append_line(line) {
                tracing::warn!(workflow_id = %id, error = %e, "Failed to append to run log");
            }
        }

        let Some(event) = progress::parse_line(line) else {
            return;
        };
        tracing::debug!(workflow_id = %id, ?event, "Pipeline progress");
        let mut fold = |record: &mut WorkflowRecord| progress::apply(record, &event);
        if let Err(e) = self.repo.modify(id, &mut fold) {
            tracing::warn!(workflow_id = %id, error = %e, "Failed to record progress");
        }
    }

    fn interrupt(&self, child: &mut Child, id: Uuid) {
        tracing::info!(workflow_id = %id, "Abort requested, interrupting pipeline");
        send_interrupt(child);
        self.mark(id, WorkflowState::Canceled);
    }

    fn mark(&self, id: Uuid, state: WorkflowState) {
        let mut to = |record: &mut WorkflowRecord| record.transition(state);
        match self.repo.modify(id, &mut to) {
            Ok(Some(_)) => {}
            Ok(None) => tracing::warn!(workflow_id = %id, %state, "Workflow record missing"),
            Err(e) => tracing::warn!(workflow_id = %id, %state, error = %e, "Failed to update workflow state"),
        }
    }
}

async fn forward_lines<R>(reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut segments = BufReader::new(reader).split(b'\n');
    while let Ok(Some(bytes)) = segments.next_segment().await {
        let line = String::from_utf8_lossy(&bytes)
            .trim_end_matches('\r')
            .to_string();
        if tx.send(line).await.is_err() {
            break;
        }
    }
}

#[cfg(unix)]
fn send_interrupt(child: &mut Child) {
    let Some(pid) = child.id() else {
        return; // already reaped
    };
    // The child leads its own process group, so its pid is the group id.
    let rc = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGINT) };
    if rc != 0 {
        tracing::warn!(pid, error = %std::io::Error::last_os_error(), "Failed to signal pipeline");
    }
}

#[cfg(not(unix))]
fn send_interrupt(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        tracing::warn!(error = %e, "Failed to stop pipeline");
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
