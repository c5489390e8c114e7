//! User-defined hook scripts.
//!
//! Every executable file in the hooks directory runs once per engine event.
//! The event is described through `STATUSBAR_*` environment variables and
//! the JSON document is piped to stdin.

use crate::error::HookError;
use crate::sse::EngineEvent;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone)]
pub struct HookRunner {
    dir: PathBuf,
    timeout: Duration,
}

/// Environment passed to a hook for `event`.
pub fn hook_env(event: &EngineEvent) -> Vec<(&'static str, String)> {
    let mut env = vec![("STATUSBAR_EVENT", event.event_type().to_string())];
    match event {
        EngineEvent::Transition(p) => {
            env.push(("STATUSBAR_SOURCE_ID", p.source_id.clone()));
            env.push(("STATUSBAR_SOURCE_NAME", p.source.clone()));
            env.push(("STATUSBAR_SOURCE_URL", p.url.clone()));
            env.push(("STATUSBAR_TITLE", p.title.clone()));
            env.push(("STATUSBAR_BODY", p.body.clone()));
            env.push(("STATUSBAR_SEVERITY", p.severity.as_str().to_string()));
        }
        EngineEvent::RefreshComplete(s) => {
            env.push(("STATUSBAR_SOURCE_COUNT", s.source_count.to_string()));
            env.push(("STATUSBAR_WORST_LEVEL", s.worst.as_str().to_string()));
            env.push(("STATUSBAR_FAILED_COUNT", s.failed.to_string()));
        }
    }
    env
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

impl HookRunner {
    pub fn new(dir: PathBuf, timeout: Duration) -> Self {
        HookRunner { dir, timeout }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Executable files in the hooks directory, sorted by name. A missing directory yields none.
    pub fn discover(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(dir = %self.dir.display(), error = %e, "hooks directory unreadable");
                return vec![];
            }
        };
        let mut hooks: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_executable(path))
            .collect();
        hooks.sort();
        hooks
    }

    /// Run one hook to completion, killing it once the timeout elapses.
    pub async fn run_one(&self, path: &Path, event: &EngineEvent) -> Result<(), HookError> {
        let input = serde_json::to_vec(event).unwrap_or_default();
        let mut child = Command::new(path)
            .envs(hook_env(event))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child.stdin.take();
        let run = async {
            if let Some(pipe) = stdin.as_mut() {
                // A hook that ignores stdin may exit before reading it.
                let _ = pipe.write_all(&input).await;
            }
            drop(stdin.take());
            child.wait().await
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;
        match outcome {
            Ok(status) => {
                let status = status?;
                if status.success() {
                    Ok(())
                } else {
                    Err(HookError::ExitStatus(status))
                }
            }
            Err(_) => {
                let _ = child.kill().await;
                Err(HookError::Timeout(self.timeout.as_secs()))
            }
        }
    }

    /// Run every hook for `event` in name order. Failures are logged, never propagated.
    pub async fn run_all(&self, event: &EngineEvent) {
        for path in self.discover() {
            match self.run_one(&path, event).await {
                Ok(()) => tracing::debug!(hook = %path.display(), event = event.event_type(), "hook finished"),
                Err(e) => tracing::warn!(hook = %path.display(), event = event.event_type(), error = %e, "hook failed"),
            }
        }
    }
}
