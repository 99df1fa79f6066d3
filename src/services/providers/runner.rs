// src/services/providers/runner.rs
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::ProviderError;

/// Markers Python prints when an import fails.
const MISSING_MODULE_MARKERS: &[&str] = &["ModuleNotFoundError", "No module named"];

/// Runs an external data script and hands back its stdout as JSON.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script: &str, args: &[String]) -> Result<Value, ProviderError>;
}

/// Runs `<interpreter> <script_dir>/<script> args...` with a hard timeout.
#[derive(Debug, Clone)]
pub struct PythonRunner {
    interpreter: String,
    script_dir: PathBuf,
    timeout: Duration,
}

impl PythonRunner {
    pub fn new(
        interpreter: impl Into<String>,
        script_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        PythonRunner {
            interpreter: interpreter.into(),
            script_dir: script_dir.into(),
            timeout,
        }
    }
}

/// Turns a finished process into JSON or a classified failure.
pub(crate) fn classify_output(
    script: &str,
    success: bool,
    code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<Value, ProviderError> {
    if let Some(&marker) = MISSING_MODULE_MARKERS.iter().find(|m| stderr.contains(**m)) {
        let line = stderr
            .lines()
            .find(|l| l.contains(marker))
            .unwrap_or(marker)
            .trim();
        return Err(ProviderError::not_installed(line.to_string()));
    }

    let parsed: Option<Value> = serde_json::from_str(stdout.trim()).ok();

    // A bare {"error": "..."} is a failure. Scripts that hit trouble but still
    // print a default payload attach the error text to it and exit 0.
    if let Some(Value::Object(fields)) = &parsed {
        if let Some(message) = fields.get("error").and_then(Value::as_str) {
            if !success || fields.len() == 1 {
                return Err(ProviderError::process(format!("{} reported: {}", script, message)));
            }
            warn!("{} fell back to default values: {}", script, message);
        }
    }

    if !success {
        let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
        return Err(ProviderError::process(format!(
            "{} exited with code {}: {}",
            script,
            code,
            stderr.trim()
        )));
    }

    parsed.ok_or_else(|| {
        ProviderError::bad_output(format!("{} printed non-JSON output: {}", script, stdout.trim()))
    })
}

#[async_trait]
impl ScriptRunner for PythonRunner {
    async fn run(&self, script: &str, args: &[String]) -> Result<Value, ProviderError> {
        let path = self.script_dir.join(script);
        debug!("Running {} {} {:?}", self.interpreter, path.display(), args);

        let child = Command::new(&self.interpreter)
            .arg(&path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ProviderError::process(format!("failed to start {}: {}", self.interpreter, e))
            })?;

        // Dropping the wait future on timeout kills the child.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => {
                result.map_err(|e| ProviderError::process(format!("{} failed: {}", script, e)))?
            }
            Err(_) => {
                warn!("{} did not finish within {:?}, killed", script, self.timeout);
                return Err(ProviderError::timeout(format!(
                    "{} exceeded {}s",
                    script,
                    self.timeout.as_secs_f64()
                )));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", script, stderr.trim());
        }

        classify_output(script, output.status.success(), output.status.code(), &stdout, &stderr)
    }
}
