use chrono::{DateTime, Utc};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Which pipe of the child a captured line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    fn marker(self) -> &'static str {
        match self {
            OutputStream::Stdout => "--->",
            OutputStream::Stderr => "!!->",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Pending,
    Succeeded,
    Failed,
}

/// One run of the configured script. Lives only as long as its task.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct BuildInvocation {
    pub id: Uuid,
    pub script_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub output: Vec<OutputLine>,
    pub status: BuildStatus,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
}

impl BuildInvocation {
    fn new(script_path: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            script_path,
            started_at: Utc::now(),
            output: Vec::new(),
            status: BuildStatus::Pending,
            exit_code: None,
            error: None,
        }
    }

    fn succeed(&mut self, exit_code: Option<i32>) {
        self.status = BuildStatus::Succeeded;
        self.exit_code = exit_code;
        let elapsed = Utc::now() - self.started_at;
        info!(
            invocation = %self.id,
            "command ran: {} ({} lines, {}ms)",
            self.script_path.display(),
            self.output.len(),
            elapsed.num_milliseconds()
        );
    }

    fn fail(&mut self, exit_code: Option<i32>, message: String) {
        error!(
            invocation = %self.id,
            "build failed: {} ({})",
            self.script_path.display(),
            message
        );
        self.status = BuildStatus::Failed;
        self.exit_code = exit_code;
        self.error = Some(message);
    }

    #[cfg(test)]
    pub fn lines(&self, stream: OutputStream) -> impl Iterator<Item = &str> {
        self.output
            .iter()
            .filter(move |l| l.stream == stream)
            .map(|l| l.text.as_str())
    }
}

/// Seam between the trigger endpoint and whatever actually runs the build.
pub trait BuildLauncher: Send + Sync {
    /// Start a build for `git_ref` without waiting for it.
    fn launch(&self, git_ref: &str);
}

/// Runs the deploy script through a shell on its own task.
#[derive(Debug, Clone)]
pub struct ScriptRunner {
    shell: PathBuf,
    script_path: PathBuf,
}

impl ScriptRunner {
    pub fn new(shell: impl Into<PathBuf>, script_path: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
            script_path: script_path.into(),
        }
    }

    /// Spawn the script and return immediately. Awaiting the handle yields the
    /// finished invocation; dropping it leaves the build running detached.
    pub fn run_async(&self) -> JoinHandle<BuildInvocation> {
        let shell = self.shell.clone();
        let mut invocation = BuildInvocation::new(self.script_path.clone());
        tokio::spawn(async move {
            execute(&shell, &mut invocation).await;
            invocation
        })
    }
}

impl BuildLauncher for ScriptRunner {
    fn launch(&self, git_ref: &str) {
        info!(
            "executing script: {} (push to {})",
            self.script_path.display(),
            git_ref
        );
        // Fire and forget; the invocation reports itself through the logs.
        drop(self.run_async());
    }
}

async fn execute(shell: &Path, invocation: &mut BuildInvocation) {
    let mut cmd = Command::new(shell);
    cmd.arg(&invocation.script_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            invocation.fail(None, format!("couldn't start cmd: {}", e));
            return;
        }
    };

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill().await;
        invocation.fail(None, "couldn't get stdout/stderr pipes".to_string());
        return;
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let readers = [
        tokio::spawn(drain(stdout, OutputStream::Stdout, invocation.id, tx.clone())),
        tokio::spawn(drain(stderr, OutputStream::Stderr, invocation.id, tx)),
    ];

    info!(invocation = %invocation.id, "waiting for output");
    let waited = child.wait().await;
    // Background jobs can keep the pipes open long after the script is gone.
    info!(invocation = %invocation.id, "script finished: {}", describe_exit(&waited));

    // Readers finish once the pipes close; join them so no trailing output is lost.
    for reader in readers {
        if let Err(e) = reader.await {
            warn!(invocation = %invocation.id, "output reader aborted: {}", e);
        }
    }
    while let Some(line) = rx.recv().await {
        invocation.output.push(line);
    }

    match waited {
        Ok(status) if status.success() => invocation.succeed(status.code()),
        Ok(status) => invocation.fail(status.code(), format!("script exited with {}", status)),
        Err(e) => invocation.fail(None, format!("err waiting for cmd: {}", e)),
    }
}

fn describe_exit(waited: &std::io::Result<ExitStatus>) -> String {
    match waited {
        Ok(status) => match status.code() {
            Some(code) => format!("exit code {}", code),
            None => format!("{}", status),
        },
        Err(e) => format!("wait failed: {}", e),
    }
}

async fn drain<R>(
    pipe: R,
    stream: OutputStream,
    invocation: Uuid,
    tx: mpsc::UnboundedSender<OutputLine>,
) where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf)
                    .trim_end_matches(['\n', '\r'])
                    .to_string();
                info!(
                    invocation = %invocation,
                    stream = %stream,
                    "{} {}",
                    stream.marker(),
                    text
                );
                let _ = tx.send(OutputLine { stream, text });
            }
            Err(e) => {
                warn!(invocation = %invocation, "couldn't read {}: {}", stream, e);
                break;
            }
        }
    }
}
