//! Spawns the real `hookd` binary and drives it over HTTP.

#![cfg(unix)]

use hmac::{Hmac, Mac};
use sha1::Sha1;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

const SECRET: &str = "e2e-shared-secret";

struct DaemonHarness {
    child: Child,
    base: String,
    workdir: TempDir,
}

impl DaemonHarness {
    async fn spawn(script_body: &str) -> TestResult<Self> {
        let workdir = TempDir::new()?;
        let script = workdir.path().join("run.sh");
        std::fs::write(&script, script_body)?;
        std::fs::write(workdir.path().join("404.html"), "<h1>lost</h1>")?;

        let port = find_free_port()?;
        let log_file = std::fs::File::create(workdir.path().join("hookd.log"))?;
        let log_file_err = log_file.try_clone()?;

        let child = Command::new(env!("CARGO_BIN_EXE_hookd"))
            .current_dir(workdir.path())
            .env("SECRET", SECRET)
            .env("PORT", port.to_string())
            .env("SCRIPT", &script)
            .env("PUBLIC_DIR", workdir.path().join("public"))
            .env("TRIGGER_URL", "hook.test")
            .stdout(Stdio::from(log_file))
            .stderr(Stdio::from(log_file_err))
            .spawn()?;

        let mut harness = Self {
            child,
            base: format!("http://127.0.0.1:{}", port),
            workdir,
        };
        harness.wait_until_ready().await?;
        Ok(harness)
    }

    fn path(&self, name: &str) -> PathBuf {
        self.workdir.path().join(name)
    }

    async fn wait_until_ready(&mut self) -> TestResult<()> {
        for _ in 0..80 {
            if let Some(status) = self.child.try_wait()? {
                return Err(format!("hookd exited early with status: {}", status).into());
            }
            let res = reqwest::Client::new()
                .get(format!("{}/health", self.base))
                .timeout(Duration::from_millis(700))
                .send()
                .await;
            if let Ok(resp) = res
                && resp.status().is_success()
            {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
        Err("Timed out waiting for hookd readiness".into())
    }

    async fn push(&self, git_ref: &str, signature: Option<String>) -> TestResult<u16> {
        let body = format!(r#"{{"ref":"{}","after":"0000000"}}"#, git_ref);
        let signature = signature.unwrap_or_else(|| sign(body.as_bytes()));
        let resp = reqwest::Client::new()
            .post(format!("{}/", self.base))
            .header("host", "hook.test")
            .header("x-github-event", "push")
            .header("x-hub-signature", signature)
            .timeout(Duration::from_secs(5))
            .body(body)
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }
}

impl Drop for DaemonHarness {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn find_free_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha1>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha1={}", hex::encode(mac.finalize().into_bytes()))
}

async fn wait_for_file(path: &Path) -> bool {
    for _ in 0..100 {
        if path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn health_reports_up() -> TestResult<()> {
    let daemon = DaemonHarness::spawn("exit 0\n").await?;
    let resp = reqwest::get(format!("{}/health", daemon.base)).await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(resp.text().await?, "up");
    Ok(())
}

#[tokio::test]
async fn signed_master_push_runs_the_script() -> TestResult<()> {
    let daemon = DaemonHarness::spawn("echo built > built.txt\n").await?;

    let status = daemon.push("refs/heads/master", None).await?;

    assert_eq!(status, 204);
    assert!(wait_for_file(&daemon.path("built.txt")).await);
    Ok(())
}

#[tokio::test]
async fn failing_script_does_not_affect_response_or_server() -> TestResult<()> {
    let daemon = DaemonHarness::spawn("touch ran.txt\necho boom >&2\nexit 1\n").await?;

    let status = daemon.push("refs/heads/master", None).await?;
    assert_eq!(status, 204);
    assert!(wait_for_file(&daemon.path("ran.txt")).await);

    let resp = reqwest::get(format!("{}/health", daemon.base)).await?;
    assert_eq!(resp.status().as_u16(), 200);
    Ok(())
}

#[tokio::test]
async fn other_branches_and_bad_signatures_do_not_build() -> TestResult<()> {
    let daemon = DaemonHarness::spawn("touch ran.txt\n").await?;

    assert_eq!(daemon.push("refs/heads/feature-x", None).await?, 204);
    assert_eq!(
        daemon
            .push("refs/heads/master", Some("sha1=0000".to_string()))
            .await?,
        403
    );

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!daemon.path("ran.txt").exists());
    Ok(())
}

#[tokio::test]
async fn missing_secret_fails_fast() -> TestResult<()> {
    let output = Command::new(env!("CARGO_BIN_EXE_hookd"))
        .env_remove("SECRET")
        .output()?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("SECRET"));
    Ok(())
}
