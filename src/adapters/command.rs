//! Adapters backed by external programs and workspace files
//!
//! Device and camera adapters run a configured argv and parse a JSON object
//! from its stdout. The child is polled until the deadline and killed when it
//! runs over.

use std::fs;
use std::io::Read;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    AdapterError, AdapterResult, CameraAdapter, CameraProbe, ChecklistProgress, ChecklistProvider,
    DeviceAdapter, DeviceList, DeviceStatus,
};
use crate::workspace::Workspace;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured output of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Run `argv` with extra environment, killing it after `timeout`.
pub fn run_command(
    argv: &[String],
    envs: &[(String, String)],
    timeout: Duration,
) -> AdapterResult<CommandOutput> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| AdapterError::Command("empty command".to_string()))?;

    let mut child = Command::new(program)
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| AdapterError::Command(format!("{}: {}", program, e)))?;

    // Drain pipes on their own threads so a chatty child cannot fill them and stall
    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if start.elapsed() >= timeout {
            kill(&mut child);
            return Err(AdapterError::Timeout(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    };

    let collect = |handle: Option<thread::JoinHandle<String>>| {
        handle.and_then(|h| h.join().ok()).unwrap_or_default()
    };
    let output = CommandOutput {
        success: status.success(),
        exit_code: status.code(),
        stdout: collect(stdout),
        stderr: collect(stderr),
    };
    debug!(program = %program, exit_code = ?output.exit_code, "adapter command finished");
    Ok(output)
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Run a command and parse its stdout as JSON
fn run_json<T: DeserializeOwned>(argv: &[String], timeout: Duration) -> AdapterResult<T> {
    let output = run_command(argv, &[], timeout)?;
    if !output.success {
        let detail = first_line(&output.stderr)
            .unwrap_or_else(|| format!("exit code {:?}", output.exit_code));
        return Err(AdapterError::Command(detail));
    }
    serde_json::from_str(output.stdout.trim()).map_err(|e| AdapterError::InvalidOutput(e.to_string()))
}

fn first_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Device adapter that shells out to the plotter driver
#[derive(Debug, Clone)]
pub struct CommandDeviceAdapter {
    status_command: Vec<String>,
    list_command: Vec<String>,
    timeout: Duration,
}

impl CommandDeviceAdapter {
    pub fn new(status_command: Vec<String>, list_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            status_command,
            list_command,
            timeout,
        }
    }
}

impl DeviceAdapter for CommandDeviceAdapter {
    fn get_status(&self) -> AdapterResult<DeviceStatus> {
        run_json(&self.status_command, self.timeout)
    }

    fn list_devices(&self) -> AdapterResult<DeviceList> {
        run_json(&self.list_command, self.timeout)
    }
}

/// Camera adapter that runs a probe program (e.g. an ffmpeg wrapper)
#[derive(Debug, Clone)]
pub struct CommandCameraAdapter {
    probe_command: Vec<String>,
    timeout: Duration,
}

impl CommandCameraAdapter {
    pub fn new(probe_command: Vec<String>, timeout: Duration) -> Self {
        Self {
            probe_command,
            timeout,
        }
    }
}

impl CameraAdapter for CommandCameraAdapter {
    fn probe(&self) -> AdapterResult<CameraProbe> {
        run_json(&self.probe_command, self.timeout)
    }
}

#[derive(Debug, Deserialize)]
struct ChecklistFile {
    #[serde(default)]
    items: Vec<ChecklistItem>,
}

#[derive(Debug, Deserialize)]
struct ChecklistItem {
    #[allow(dead_code)]
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    done: bool,
}

/// Reads `jobs/<job_id>/<file>`:
/// `{"items": [{"name": "...", "required": true, "done": false}]}`
#[derive(Debug, Clone)]
pub struct FileChecklistProvider {
    workspace: Workspace,
    file_name: String,
}

impl FileChecklistProvider {
    pub fn new(workspace: Workspace, file_name: impl Into<String>) -> Self {
        Self {
            workspace,
            file_name: file_name.into(),
        }
    }
}

impl ChecklistProvider for FileChecklistProvider {
    fn get_progress(&self, job_id: &str) -> AdapterResult<ChecklistProgress> {
        let path = self.workspace.job_dir(job_id).join(&self.file_name);
        if !path.exists() {
            return Err(AdapterError::Unavailable(format!(
                "no checklist at {}",
                path.display()
            )));
        }

        let text = fs::read_to_string(&path)?;
        let checklist: ChecklistFile =
            serde_json::from_str(&text).map_err(|e| AdapterError::InvalidOutput(e.to_string()))?;

        let required = checklist.items.iter().filter(|item| item.required);
        let (total, completed) = required.fold((0u32, 0u32), |(total, done), item| {
            (total + 1, done + u32::from(item.done))
        });
        Ok(ChecklistProgress {
            required_completed: completed,
            required_total: total,
        })
    }
}
