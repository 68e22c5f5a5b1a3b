//! Load-test job status: the polled payload, the status panel view model, and
//! the reconciliation that decides what reaches the chat transcript.
//!
//! The backend repeats its last terminal status on every poll until a new job
//! starts. [`StatusTracker`] keeps an analyzed error from being re-appended to
//! the transcript on each tick while still showing a later error, including a
//! textually identical one after the job has left the error state.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::transcript::{display_value, pretty_json, truthy, ChatMessage};

/// The `status` tag of the job-status payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<String>")]
pub enum JobState {
    #[default]
    None,
    Running,
    Success,
    Error,
    ErrorAnalyzed,
    ErrorAnalysisFailed,
    GuiLaunched,
    GuiLaunchFailed,
    /// A status string this client does not know about, kept verbatim.
    Other(String),
}

/// How a status is presented and whether it can touch the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// The backend diagnosed the failure; the diagnosis goes to the chat once.
    AnalyzedError,
    /// Run finished or in progress; panel only.
    Outcome,
    /// JMeter GUI launch; panel only.
    Gui,
    /// Nothing has run yet, or an unknown status.
    Idle,
}

impl JobState {
    pub fn parse(s: &str) -> Self {
        match s {
            "none" => JobState::None,
            "running" => JobState::Running,
            "success" => JobState::Success,
            "error" => JobState::Error,
            "error_analyzed" => JobState::ErrorAnalyzed,
            "error_analysis_failed" => JobState::ErrorAnalysisFailed,
            "gui_launched" => JobState::GuiLaunched,
            "gui_launch_failed" => JobState::GuiLaunchFailed,
            other => JobState::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            JobState::None => "none",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Error => "error",
            JobState::ErrorAnalyzed => "error_analyzed",
            JobState::ErrorAnalysisFailed => "error_analysis_failed",
            JobState::GuiLaunched => "gui_launched",
            JobState::GuiLaunchFailed => "gui_launch_failed",
            JobState::Other(s) => s,
        }
    }

    pub fn class(&self) -> StatusClass {
        match self {
            JobState::ErrorAnalyzed | JobState::ErrorAnalysisFailed => StatusClass::AnalyzedError,
            JobState::Success | JobState::Running | JobState::Error => StatusClass::Outcome,
            JobState::GuiLaunched | JobState::GuiLaunchFailed => StatusClass::Gui,
            JobState::None | JobState::Other(_) => StatusClass::Idle,
        }
    }
}

impl From<Option<String>> for JobState {
    fn from(value: Option<String>) -> Self {
        value.as_deref().map(JobState::parse).unwrap_or_default()
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `GET /get_last_jmeter_result`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status: JobState,
    #[serde(default, deserialize_with = "loose_text")]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub output: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub report_path: Option<String>,
    #[serde(default, deserialize_with = "loose_text")]
    pub user_response: Option<String>,
    pub technical_action: Option<Value>,
    #[serde(default, deserialize_with = "loose_text")]
    pub original_error_message: Option<String>,
}

/// Text fields accept any JSON type: falsy values read as absent and
/// non-strings are kept as their JSON text (e.g. an `output` list of lines).
fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(truthy).map(|v| display_value(&v)))
}

// The backend sends "" and null interchangeably.
fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

impl JobStatus {
    pub fn with_state(status: JobState) -> Self {
        Self { status, ..Self::default() }
    }

    /// The suggested action, unless it is null or falsy (`false`, `0`, `""`).
    pub fn action(&self) -> Option<&Value> {
        self.technical_action.as_ref().filter(|v| truthy(v))
    }

    pub fn analysis(&self) -> Option<&str> {
        present(&self.user_response)
    }

    /// Run output, preferring `message` over `output`.
    pub fn output_text(&self) -> Option<&str> {
        present(&self.message).or_else(|| present(&self.output))
    }

    /// Identity of an analyzed error for deduplication: the original error
    /// text, or the analysis when the backend did not send it.
    pub fn error_identity(&self) -> Option<&str> {
        present(&self.original_error_message).or_else(|| self.analysis())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelEntry {
    pub label: &'static str,
    pub text: String,
}

impl PanelEntry {
    fn new(label: &'static str, text: impl Into<String>) -> Self {
        Self { label, text: text.into() }
    }
}

/// What the status panel shows. Rebuilt from scratch on every poll.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelView {
    pub running: bool,
    pub entries: Vec<PanelEntry>,
}

impl PanelView {
    pub fn error(detail: impl std::fmt::Display) -> Self {
        Self {
            running: false,
            entries: vec![PanelEntry::new("Error checking status", detail.to_string())],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Plain-text rendering: `Label: text`, with multi-line text starting on
    /// its own line.
    pub fn to_plain_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| {
                if entry.text.contains('\n') {
                    format!("{}:\n{}", entry.label, entry.text)
                } else {
                    format!("{}: {}", entry.label, entry.text)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn render_panel(status: &JobStatus) -> PanelView {
    let mut entries = vec![PanelEntry::new("Last Run Status", status.status.as_str())];

    match status.status.class() {
        StatusClass::AnalyzedError => {
            if let Some(analysis) = status.analysis() {
                entries.push(PanelEntry::new("AI Analysis", analysis));
            }
            let action = status
                .action()
                .map(pretty_json)
                .unwrap_or_else(|| "N/A".to_string());
            entries.push(PanelEntry::new("Suggested Action", action));
        }
        StatusClass::Outcome => {
            if let Some(path) = present(&status.report_path) {
                entries.push(PanelEntry::new("Report Path", path));
            }
            entries.push(PanelEntry::new("Output", status.output_text().unwrap_or("N/A")));
        }
        StatusClass::Gui | StatusClass::Idle => {
            if let Some(message) = present(&status.message) {
                entries.push(PanelEntry::new("Message", message));
            }
        }
    }

    PanelView {
        running: status.status == JobState::Running,
        entries,
    }
}

#[derive(Debug, Default)]
pub struct StatusTracker {
    last_shown_analyzed_error: Option<String>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_shown(&self) -> Option<&str> {
        self.last_shown_analyzed_error.as_deref()
    }

    /// Feed one polled status through the tracker and return the transcript
    /// messages it produces (usually none).
    pub fn reconcile(&mut self, status: &JobStatus) -> Vec<ChatMessage> {
        if status.status.class() != StatusClass::AnalyzedError {
            self.last_shown_analyzed_error = None;
            return Vec::new();
        }

        let Some(identity) = status.error_identity() else {
            return Vec::new();
        };
        if self.last_shown() == Some(identity) {
            return Vec::new();
        }

        let mut messages = Vec::new();
        if let Some(analysis) = status.analysis() {
            messages.push(ChatMessage::technical(format!("AI Analysis:\n{}", analysis)));
        }
        if let Some(action) = status.action() {
            messages.push(ChatMessage::technical(format!("Suggested Action:\n{}", pretty_json(action))));
        }

        self.last_shown_analyzed_error = Some(identity.to_string());
        messages
    }
}
