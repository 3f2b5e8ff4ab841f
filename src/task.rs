use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a remote task, folded down from the service's raw codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl Status {
    /// Map a raw status code. Total: every string lands somewhere.
    pub fn from_code(code: &str) -> Self {
        match code {
            "SUCCESS" | "COMPLETE" => Status::Succeeded,
            "FAILED" | "ERROR" | "CREATE_TASK_FAILED" | "GENERATE_AUDIO_FAILED" => Status::Failed,
            "" => Status::Pending,
            _ => Status::Processing,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }
}

/// One answer from the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// The raw code as sent by the service, e.g. `TEXT_SUCCESS`.
    pub code: String,
    pub status: Status,
    pub error_message: Option<String>,
}

impl StatusReport {
    pub fn new(code: impl Into<String>, error_message: Option<String>) -> Self {
        let code = code.into();
        Self {
            status: Status::from_code(&code),
            code,
            error_message,
        }
    }

    /// Message to surface when the task failed.
    pub fn failure_message(&self) -> String {
        match self.error_message.as_deref().map(str::trim) {
            Some(msg) if !msg.is_empty() => msg.to_string(),
            _ => format!("Generation failed with status {}", self.code),
        }
    }
}

/// The single live remote job a controller is tracking.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationTask {
    pub id: String,
    pub status: Status,
    pub error_message: Option<String>,
    pub started_at: DateTime<Local>,
}

impl GenerationTask {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: Status::Pending,
            error_message: None,
            started_at: Local::now(),
        }
    }

    pub fn apply(&mut self, report: &StatusReport) {
        self.status = report.status;
        self.error_message = report.error_message.clone();
    }
}
