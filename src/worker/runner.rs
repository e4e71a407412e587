use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use crate::config::OrchestratorConfig;
use crate::scheduler::resource::ResourceId;
use crate::scheduler::JobResult;
use crate::worker::cancel::CancelSignal;
use crate::worker::command::CommandSpec;

/// Bytes of stdout/stderr kept per stream; older output is dropped.
const CAPTURE_LIMIT: usize = 64 * 1024;

/// How long to wait for the pipe readers once the process is gone. A
/// grandchild that inherited the pipes can keep them open indefinitely.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const OOM_MARKERS: &[&str] = &[
    "CUDA error: out of memory",
    "CUDA out of memory",
    "torch.OutOfMemoryError",
];

/// Lifecycle of one external process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    Completed,
    Cancelled,
    TimedOut,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Cancelled | RunState::TimedOut | RunState::Failed
        )
    }

    pub fn can_advance_to(&self, next: RunState) -> bool {
        match self {
            RunState::Starting => matches!(next, RunState::Running | RunState::Failed),
            RunState::Running => next.is_terminal(),
            _ => false,
        }
    }

    fn advance(self, job_id: &str, next: RunState) -> RunState {
        if !self.can_advance_to(next) {
            tracing::warn!(job_id, from = %self, to = %next, "Unexpected process state transition");
        }
        tracing::debug!(job_id, from = %self, to = %next, "Process state changed");
        next
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Starting => write!(f, "starting"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Cancelled => write!(f, "cancelled"),
            RunState::TimedOut => write!(f, "timed_out"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

enum Outcome {
    Exited(ExitStatus),
    Cancelled,
    TimedOut,
    WaitFailed(std::io::Error),
}

/// Spawned child running as the leader of its own process group, so
/// distributed launchers take their workers down with them.
///
/// Dropping an unreaped group SIGKILLs it; no process outlives an abandoned run.
struct ProcessGroup {
    child: Child,
    pgid: Option<u32>,
    reaped: bool,
}

impl ProcessGroup {
    fn spawn(spec: &CommandSpec) -> std::io::Result<Self> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = spec.cwd {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        let child = command.spawn()?;
        let pgid = child.id();
        Ok(Self {
            child,
            pgid,
            reaped: false,
        })
    }

    /// Signal the whole group. Returns false once nothing is left to signal.
    ///
    /// After the leader is reaped the group may still hold workers it
    /// spawned; those are reached through the pgid, and ESRCH means the
    /// group is empty.
    fn signal(&mut self, signal: Signal) -> bool {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            if kill_group(pgid, signal.number()) {
                return true;
            }
            if self.reaped {
                return false;
            }
        }
        if self.reaped {
            return false;
        }
        if let Err(e) = self.child.start_kill() {
            tracing::debug!(error = %e, "start_kill failed, process already exited");
            return false;
        }
        true
    }

    /// True while any member of the group (including zombies) exists.
    fn has_members(&self) -> bool {
        #[cfg(unix)]
        if let Some(pgid) = self.pgid {
            return kill_group(pgid, 0);
        }
        !self.reaped
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.try_wait()?;
        if status.is_some() {
            self.reaped = true;
        }
        Ok(status)
    }

    async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        let status = self.child.wait().await?;
        self.reaped = true;
        Ok(status)
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if !self.reaped {
            self.signal(Signal::Kill);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Terminate,
    Kill,
}

impl Signal {
    #[cfg(unix)]
    fn number(self) -> libc::c_int {
        match self {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

/// `kill(-pgid, signo)`; false when the group no longer exists.
#[cfg(unix)]
fn kill_group(pgid: u32, signo: libc::c_int) -> bool {
    // SAFETY: pgid is the id of a group whose leader we spawned. A group id
    // cannot be reused while any member is alive, and an empty group is ESRCH.
    unsafe { libc::kill(-(pgid as libc::pid_t), signo) == 0 }
}

/// Drives one external command to a terminal state.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
    grace_period: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::from_config(&OrchestratorConfig::default())
    }
}

impl ProcessRunner {
    pub fn new(poll_interval: Duration, grace_period: Duration) -> Self {
        Self {
            poll_interval,
            grace_period,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new(config.poll_interval(), config.grace_period())
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Launch `spec` and poll it until it exits, `cancel` fires, or `timeout`
    /// elapses. Each tick checks, in order: natural exit, cancellation, timeout.
    ///
    /// Never returns before the process has been reaped. `resource_ids` only
    /// feed the out-of-memory hint.
    pub async fn run<C>(
        &self,
        job_id: &str,
        spec: &CommandSpec,
        resource_ids: &[ResourceId],
        cancel: &C,
        timeout: Duration,
    ) -> JobResult
    where
        C: CancelSignal + ?Sized,
    {
        let started = Instant::now();
        let mut state = RunState::Starting;
        tracing::info!(
            job_id,
            command = %spec.display(),
            cwd = ?spec.cwd,
            gpus = ?resource_ids,
            "Launching generation process"
        );

        let mut group = match ProcessGroup::spawn(spec) {
            Ok(group) => group,
            Err(e) => {
                state.advance(job_id, RunState::Failed);
                tracing::error!(job_id, program = %spec.program, error = %e, "Failed to spawn process");
                return JobResult::failed(
                    format!("Generation error: {}", e),
                    started.elapsed().as_secs_f64(),
                );
            }
        };
        let stdout = group.child.stdout.take().map(|s| tokio::spawn(capture_tail(s)));
        let stderr = group.child.stderr.take().map(|s| tokio::spawn(capture_tail(s)));
        state = state.advance(job_id, RunState::Running);

        let outcome = loop {
            match group.try_wait() {
                Ok(Some(status)) => break Outcome::Exited(status),
                Ok(None) => {}
                Err(e) => {
                    self.terminate(job_id, &mut group).await;
                    break Outcome::WaitFailed(e);
                }
            }

            if cancel.is_cancelled() {
                tracing::info!(job_id, "Cancellation requested, stopping process");
                self.terminate(job_id, &mut group).await;
                break Outcome::Cancelled;
            }

            if started.elapsed() >= timeout {
                tracing::warn!(
                    job_id,
                    timeout_secs = timeout.as_secs_f64(),
                    "Process exceeded timeout, stopping"
                );
                self.terminate(job_id, &mut group).await;
                break Outcome::TimedOut;
            }

            tokio::time::sleep(self.poll_interval).await;
        };

        // Workers left behind by the leader still hold the pipes and the GPUs.
        self.sweep_group(job_id, &mut group).await;
        let (stdout, stderr) = tokio::join!(collect_output(stdout), collect_output(stderr));
        let elapsed = started.elapsed().as_secs_f64();

        let result = match outcome {
            Outcome::Exited(status) if status.success() => {
                state = state.advance(job_id, RunState::Completed);
                JobResult::success(stdout, elapsed)
            }
            Outcome::Exited(status) => {
                state = state.advance(job_id, RunState::Failed);
                JobResult::failed(failure_message(status, &stderr, &stdout, resource_ids), elapsed)
            }
            Outcome::Cancelled => {
                state = state.advance(job_id, RunState::Cancelled);
                JobResult::cancelled("Generation cancelled by user", elapsed)
            }
            Outcome::TimedOut => {
                state = state.advance(job_id, RunState::TimedOut);
                JobResult::timed_out(
                    format!("Generation timed out after {} seconds", format_secs(timeout)),
                    elapsed,
                )
            }
            Outcome::WaitFailed(e) => {
                state = state.advance(job_id, RunState::Failed);
                JobResult::failed(format!("Generation error: {}", e), elapsed)
            }
        };

        tracing::info!(
            job_id,
            state = %state,
            elapsed_secs = elapsed,
            "Generation process finished"
        );
        result
    }

    /// Terminate whatever is left of the group after the leader was reaped:
    /// SIGTERM, up to the grace period, then SIGKILL.
    async fn sweep_group(&self, job_id: &str, group: &mut ProcessGroup) {
        if !group.signal(Signal::Terminate) {
            return;
        }
        tracing::warn!(job_id, "Processes outlived the group leader, terminating them");
        let deadline = Instant::now() + self.grace_period;
        let tick = self.poll_interval.min(Duration::from_millis(50));
        while Instant::now() < deadline {
            tokio::time::sleep(tick).await;
            if !group.has_members() {
                return;
            }
        }
        if group.signal(Signal::Kill) {
            tracing::warn!(job_id, "Leftover processes ignored SIGTERM, killed");
        }
    }

    /// SIGTERM the group, give it the grace period, then SIGKILL. Always reaps.
    async fn terminate(&self, job_id: &str, group: &mut ProcessGroup) -> Option<ExitStatus> {
        group.signal(Signal::Terminate);
        match tokio::time::timeout(self.grace_period, group.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(job_id, status = %status, "Process exited after SIGTERM");
                return Some(status);
            }
            Ok(Err(e)) => {
                tracing::warn!(job_id, error = %e, "Waiting after SIGTERM failed, killing");
            }
            Err(_) => {
                tracing::warn!(
                    job_id,
                    grace_secs = self.grace_period.as_secs_f64(),
                    "Process ignored SIGTERM, killing"
                );
            }
        }

        group.signal(Signal::Kill);
        match group.wait().await {
            Ok(status) => Some(status),
            Err(e) => {
                tracing::error!(job_id, error = %e, "Failed to reap killed process");
                None
            }
        }
    }
}

async fn capture_tail<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut kept: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                kept.extend_from_slice(&buf[..n]);
                if kept.len() > 2 * CAPTURE_LIMIT {
                    let excess = kept.len() - CAPTURE_LIMIT;
                    kept.drain(..excess);
                }
            }
        }
    }
    if kept.len() > CAPTURE_LIMIT {
        let excess = kept.len() - CAPTURE_LIMIT;
        kept.drain(..excess);
    }
    String::from_utf8_lossy(&kept).into_owned()
}

async fn collect_output(handle: Option<JoinHandle<String>>) -> String {
    let Some(mut handle) = handle else {
        return String::new();
    };
    match tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut handle).await {
        Ok(Ok(output)) => output,
        Ok(Err(_)) => String::new(),
        Err(_) => {
            handle.abort();
            String::new()
        }
    }
}

fn format_secs(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.1}", secs)
    }
}

fn failure_message(
    status: ExitStatus,
    stderr: &str,
    stdout: &str,
    resource_ids: &[ResourceId],
) -> String {
    let cause = match status.code() {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    };
    let mut message = format!("Generation failed ({}):\n{}\n{}", cause, stderr, stdout);
    if let Some(hint) = oom_hint(&message, resource_ids) {
        message.push_str(&hint);
    }
    message
}

/// True if the output carries one of the CUDA out-of-memory markers.
pub fn is_out_of_memory(output: &str) -> bool {
    OOM_MARKERS.iter().any(|marker| output.contains(marker))
}

/// Remediation text appended to out-of-memory failures.
pub fn oom_hint(output: &str, resource_ids: &[ResourceId]) -> Option<String> {
    if !is_out_of_memory(output) {
        return None;
    }
    let mut hint = String::from("\n\nGPU Memory Issue Detected:");
    hint.push_str(&format!(
        "\n- Current configuration: {} GPU(s)",
        resource_ids.len()
    ));
    if !resource_ids.is_empty() {
        hint.push_str(&format!(" (IDs: {:?})", resource_ids));
    }
    hint.push_str("\n- Try reducing video duration or switching to a lower resolution");
    hint.push_str("\n- Try reducing the GPU count or selecting GPUs that are not busy");
    hint.push_str("\n- Run 'nvidia-smi' to check GPU memory availability");
    Some(hint)
}
