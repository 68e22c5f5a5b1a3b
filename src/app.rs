use ratatui::layout::Rect;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinHandle};

use crate::api::{ApiError, BackendClient, ChatReply, ValidationResult};
use crate::credentials::{CredentialStore, Credentials};
use crate::poller::StatusPoller;
use crate::status::{render_panel, JobStatus, PanelView, StatusTracker};
use crate::transcript::{reply_messages, ChatMessage, MessageId, Transcript, THINKING_TEXT};
use crate::tui::AppEvent;

pub const MISSING_FIELDS_ERROR: &str = "Both JMeter path and OpenAI key are required.";
pub const COPY_LABEL: &str = "Copy command";
pub const COPIED_LABEL: &str = "Copied!";
pub const COPY_FAILED_LABEL: &str = "Copy failed";
const COPY_LABEL_RESET: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Config,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    JmeterPath,
    OpenaiKey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// A single-line text field with a character-based cursor.
#[derive(Debug, Clone, Default)]
pub struct InputLine {
    value: String,
    cursor: usize,
}

impl InputLine {
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Replace the contents, cursor at the end.
    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
        self.cursor = self.value.chars().count();
    }

    pub fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    pub fn insert(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.value.chars().count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.value.chars().count());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.value.chars().count();
    }
}

struct PendingValidation {
    credentials: Credentials,
    task: JoinHandle<Result<ValidationResult, ApiError>>,
}

struct PendingChat {
    placeholder: MessageId,
    task: JoinHandle<Result<ChatReply, ApiError>>,
}

#[derive(Debug, Clone, Copy)]
pub struct CopyFeedback {
    pub label: &'static str,
    expires_at: Instant,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Config screen
    pub config_field: ConfigField,
    pub jmeter_path_input: InputLine,
    pub openai_key_input: InputLine,
    pub config_error: Option<String>,
    validation: Option<PendingValidation>,

    // Chat screen
    pub transcript: Transcript,
    pub chat_input: InputLine,
    pub chat_error: Option<String>,
    pending_chat: Option<PendingChat>,
    pub selected_message: Option<usize>,
    pub transcript_scroll: u16,
    pub transcript_height: u16, // inner height of the transcript pane, set during render
    pub transcript_width: u16,
    pub transcript_area: Option<Rect>, // for mouse hit-testing
    pub copy_feedback: Option<CopyFeedback>,

    // Job status
    pub panel: PanelView,
    pub show_status_panel: bool,
    pub tracker: StatusTracker,
    pub poller: StatusPoller,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Data
    pub credentials: Option<Credentials>,
    client: BackendClient,
    store: CredentialStore,
    events: UnboundedSender<AppEvent>,
}

impl App {
    /// Build the app and open the chat screen if credentials are already
    /// stored, otherwise the config screen. Must be called inside a tokio
    /// runtime since entering the chat screen starts the poller.
    pub fn new(
        client: BackendClient,
        store: CredentialStore,
        poll_interval: Duration,
        events: UnboundedSender<AppEvent>,
    ) -> Self {
        let credentials = store.get();
        let configured = credentials.is_some();

        let mut app = Self {
            should_quit: false,
            screen: Screen::Config,
            input_mode: InputMode::Editing,

            config_field: ConfigField::JmeterPath,
            jmeter_path_input: InputLine::default(),
            openai_key_input: InputLine::default(),
            config_error: None,
            validation: None,

            transcript: Transcript::new(),
            chat_input: InputLine::default(),
            chat_error: None,
            pending_chat: None,
            selected_message: None,
            transcript_scroll: 0,
            transcript_height: 0,
            transcript_width: 0,
            transcript_area: None,
            copy_feedback: None,

            panel: PanelView::default(),
            show_status_panel: true,
            tracker: StatusTracker::new(),
            poller: StatusPoller::new(poll_interval),

            animation_frame: 0,

            credentials,
            client,
            store,
            events,
        };

        if configured {
            app.show_chat_screen();
        } else {
            app.show_config_screen();
        }
        app
    }

    pub fn server_url(&self) -> &str {
        self.client.base_url()
    }

    // Screen transitions

    pub fn show_config_screen(&mut self) {
        self.screen = Screen::Config;
        self.input_mode = InputMode::Editing;
        self.config_field = ConfigField::JmeterPath;
        self.config_error = None;

        let stored = self.store.get();
        self.jmeter_path_input
            .set(stored.as_ref().map(|c| c.jmeter_path.as_str()).unwrap_or_default());
        self.openai_key_input
            .set(stored.as_ref().map(|c| c.openai_key.as_str()).unwrap_or_default());

        self.poller.stop();
        tracing::info!("Showing config screen");
    }

    /// Enter the chat screen. Starting the poller fires an immediate poll; if
    /// it is already running nothing extra is scheduled.
    pub fn show_chat_screen(&mut self) {
        self.screen = Screen::Chat;
        self.input_mode = InputMode::Editing;
        self.poller.start(&self.events);
        tracing::info!(server = %self.client.base_url(), "Showing chat screen");
    }

    // Config flow

    pub fn next_config_field(&mut self) {
        self.config_field = match self.config_field {
            ConfigField::JmeterPath => ConfigField::OpenaiKey,
            ConfigField::OpenaiKey => ConfigField::JmeterPath,
        };
    }

    pub fn active_config_input(&mut self) -> &mut InputLine {
        match self.config_field {
            ConfigField::JmeterPath => &mut self.jmeter_path_input,
            ConfigField::OpenaiKey => &mut self.openai_key_input,
        }
    }

    pub fn is_validating(&self) -> bool {
        self.validation.is_some()
    }

    /// Check the entered credentials locally, then ask the backend to validate them.
    pub fn submit_config(&mut self) {
        if self.validation.is_some() {
            return;
        }

        self.config_error = None;
        let credentials = Credentials::new(self.jmeter_path_input.value(), self.openai_key_input.value());
        if !credentials.is_complete() {
            self.config_error = Some(MISSING_FIELDS_ERROR.to_string());
            return;
        }

        let client = self.client.clone();
        let request = credentials.clone();
        let task = tokio::spawn(async move { client.validate_config(&request).await });
        self.validation = Some(PendingValidation { credentials, task });
    }

    pub fn finish_validation(&mut self, credentials: Credentials, result: Result<ValidationResult, ApiError>) {
        let verdict = match result {
            Ok(verdict) => verdict,
            Err(e) => {
                tracing::warn!(error = %e, "Config validation request failed");
                self.config_error = Some(format!("Error validating: {}", e));
                return;
            }
        };

        if let Some(errors) = validation_errors(&verdict) {
            tracing::info!(
                jmeter_valid = verdict.jmeter_valid,
                openai_valid = verdict.openai_valid,
                "Configuration rejected"
            );
            self.config_error = Some(errors);
            return;
        }

        if let Err(e) = self.store.set(&credentials) {
            tracing::warn!(error = %e, path = %self.store.path().display(), "Could not save credentials");
            self.config_error = Some(format!("Error saving configuration: {}", e));
            return;
        }

        tracing::info!("Configuration validated and saved");
        self.credentials = Some(credentials);
        self.show_chat_screen();
    }

    // Chat flow

    pub fn is_thinking(&self) -> bool {
        self.pending_chat.is_some()
    }

    pub fn placeholder_id(&self) -> Option<MessageId> {
        self.pending_chat.as_ref().map(|p| p.placeholder)
    }

    pub fn send_message(&mut self) {
        let text = self.chat_input.value().trim().to_string();
        if text.is_empty() || self.pending_chat.is_some() {
            return;
        }
        let Some(credentials) = self.credentials.clone() else {
            self.chat_error = Some("Error: credentials are not configured".to_string());
            return;
        };

        self.chat_input.clear();
        self.chat_error = None;
        self.transcript.push(ChatMessage::user(text.clone()));
        let placeholder = self.transcript.push(ChatMessage::bot(THINKING_TEXT));

        let client = self.client.clone();
        let task = tokio::spawn(async move { client.chat(&text, &credentials).await });
        self.pending_chat = Some(PendingChat { placeholder, task });

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_to_bottom();
    }

    pub fn finish_chat(&mut self, placeholder: MessageId, result: Result<ChatReply, ApiError>) {
        if let Some((index, _)) = self.transcript.remove(placeholder) {
            // Keep the selection on the same message as later entries shift up.
            if let Some(selected) = self.selected_message.filter(|&s| s > index) {
                self.selected_message = Some(selected - 1);
            }
        }

        match result {
            Ok(reply) => {
                for message in reply_messages(&reply) {
                    self.transcript.push(message);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Chat request failed");
                self.chat_error = Some(format!("Error: {}", e));
            }
        }

        self.clamp_selection();
        self.scroll_to_bottom();
    }

    pub fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.selected_message = None;
        self.transcript_scroll = 0;
    }

    // Status polling

    /// Fetch the job status in the background; the result comes back as
    /// [`AppEvent::StatusFetched`].
    pub fn poll_status(&mut self) {
        self.chat_error = None;

        let client = self.client.clone();
        let tx = self.events.clone();
        tokio::spawn(async move {
            let result = client.last_job_status().await;
            let _ = tx.send(AppEvent::StatusFetched(result));
        });
    }

    pub fn apply_status(&mut self, result: Result<JobStatus, ApiError>) {
        match result {
            Ok(status) => {
                self.panel = render_panel(&status);

                let messages = self.tracker.reconcile(&status);
                if !messages.is_empty() {
                    tracing::info!(status = %status.status, "Showing new analyzed error");
                    for message in messages {
                        self.transcript.push(message);
                    }
                    self.scroll_to_bottom();
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Status poll failed");
                self.panel = PanelView::error(&e);
                self.chat_error = Some(format!("Error checking status: {}", e));
            }
        }
    }

    pub fn toggle_status_panel(&mut self) {
        self.show_status_panel = !self.show_status_panel;
        if self.show_status_panel && self.screen == Screen::Chat {
            self.poller.start(&self.events);
        }
    }

    /// Pick up finished validation and chat requests.
    pub async fn poll_tasks(&mut self) {
        if self.validation.as_ref().is_some_and(|p| p.task.is_finished()) {
            if let Some(pending) = self.validation.take() {
                let result = flatten_join(pending.task.await);
                self.finish_validation(pending.credentials, result);
            }
        }

        if self.pending_chat.as_ref().is_some_and(|p| p.task.is_finished()) {
            if let Some(pending) = self.pending_chat.take() {
                let result = flatten_join(pending.task.await);
                self.finish_chat(pending.placeholder, result);
            }
        }
    }

    // Transcript selection and copy

    pub fn selected(&self) -> Option<&ChatMessage> {
        self.selected_message.and_then(|i| self.transcript.get(i))
    }

    pub fn select_next_message(&mut self) {
        let len = self.transcript.len();
        if len == 0 {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => (i + 1).min(len - 1),
            None => 0,
        });
    }

    pub fn select_prev_message(&mut self) {
        if self.transcript.is_empty() {
            return;
        }
        self.selected_message = Some(match self.selected_message {
            Some(i) => i.saturating_sub(1),
            None => self.transcript.len() - 1,
        });
    }

    pub fn select_first_message(&mut self) {
        if !self.transcript.is_empty() {
            self.selected_message = Some(0);
            self.transcript_scroll = 0;
        }
    }

    pub fn select_last_message(&mut self) {
        if !self.transcript.is_empty() {
            self.selected_message = Some(self.transcript.len() - 1);
            self.scroll_to_bottom();
        }
    }

    fn clamp_selection(&mut self) {
        self.selected_message = match self.selected_message {
            Some(_) if self.transcript.is_empty() => None,
            Some(i) => Some(i.min(self.transcript.len() - 1)),
            None => None,
        };
    }

    /// The command of the selected message, if it has one to copy.
    pub fn selected_command(&self) -> Option<&str> {
        self.selected().and_then(ChatMessage::command)
    }

    pub fn set_copy_feedback(&mut self, copied: bool) {
        self.copy_feedback = Some(CopyFeedback {
            label: if copied { COPIED_LABEL } else { COPY_FAILED_LABEL },
            expires_at: Instant::now() + COPY_LABEL_RESET,
        });
    }

    pub fn copy_label(&self) -> &'static str {
        self.copy_feedback.map(|f| f.label).unwrap_or(COPY_LABEL)
    }

    /// Tick animation frame and expire the copy label (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_thinking() || self.is_validating() || self.panel.running {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.copy_feedback.is_some_and(|f| Instant::now() >= f.expires_at) {
            self.copy_feedback = None;
        }
    }

    // Scrolling

    pub fn scroll_up(&mut self, lines: u16) {
        self.transcript_scroll = self.transcript_scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max = self.transcript_lines().saturating_sub(self.visible_height());
        self.transcript_scroll = self.transcript_scroll.saturating_add(lines).min(max);
    }

    pub fn scroll_to_bottom(&mut self) {
        let total_lines = self.transcript_lines();
        let visible_height = self.visible_height();

        if total_lines > visible_height {
            self.transcript_scroll = total_lines.saturating_sub(visible_height);
        }
    }

    fn visible_height(&self) -> u16 {
        if self.transcript_height > 0 {
            self.transcript_height
        } else {
            20
        }
    }

    /// Approximate rendered height of the transcript at the current pane width.
    fn transcript_lines(&self) -> u16 {
        // Use actual pane width for wrap calculation, default to 50 if not set
        let wrap_width = if self.transcript_width > 0 {
            self.transcript_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;
        for (_, message) in self.transcript.iter() {
            total_lines = total_lines.saturating_add(1); // "You:" / "Bot:" line
            for line in message.text.lines() {
                // Use character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                let wrapped = if char_count == 0 { 1 } else { (char_count / wrap_width) + 1 };
                total_lines = total_lines.saturating_add(wrapped as u16);
            }
            if message.command().is_some() {
                total_lines = total_lines.saturating_add(1); // copy hint
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }
        total_lines
    }
}

/// Combined error text for a validation verdict, or `None` when both fields passed.
pub fn validation_errors(result: &ValidationResult) -> Option<String> {
    let mut errors = Vec::new();

    if !result.jmeter_valid {
        let detail = result
            .jmeter_error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("Invalid path or permissions.");
        errors.push(format!("JMeter Path Error: {}", detail));
    }
    if !result.openai_valid {
        let detail = result
            .openai_error
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or("Invalid key.");
        errors.push(format!("OpenAI Key Error: {}", detail));
    }

    (!errors.is_empty()).then(|| errors.join(" "))
}

fn flatten_join<T>(joined: Result<Result<T, ApiError>, JoinError>) -> Result<T, ApiError> {
    joined.unwrap_or_else(|e| Err(ApiError::Task(format!("request task failed: {}", e))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::JobState;
    use reqwest::StatusCode;
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    const POLL: Duration = Duration::from_secs(5);

    // Nothing listens here; tests never let a request complete on its own.
    fn client() -> BackendClient {
        BackendClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap()
    }

    fn app_with(credentials: Option<Credentials>) -> (App, UnboundedReceiver<AppEvent>, TempDir) {
        let dir = tempdir().unwrap();
        let store = CredentialStore::in_dir(dir.path());
        if let Some(credentials) = &credentials {
            store.set(credentials).unwrap();
        }
        let (tx, rx) = mpsc::unbounded_channel();
        (App::new(client(), store, POLL, tx), rx, dir)
    }

    fn configured_app() -> (App, UnboundedReceiver<AppEvent>, TempDir) {
        app_with(Some(Credentials::new("/opt/jmeter/bin/jmeter", "sk-test")))
    }

    fn all_valid() -> ValidationResult {
        ValidationResult {
            jmeter_valid: true,
            jmeter_error: None,
            openai_valid: true,
            openai_error: None,
        }
    }

    fn drain(rx: &mut UnboundedReceiver<AppEvent>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    /// Abort the in-flight chat request and return its placeholder handle.
    fn take_pending_chat(app: &mut App) -> MessageId {
        let pending = app.pending_chat.take().expect("chat request pending");
        pending.task.abort();
        pending.placeholder
    }

    #[test]
    fn test_input_line_editing_is_char_based() {
        let mut input = InputLine::default();
        for c in "héllo".chars() {
            input.insert(c);
        }
        input.left();
        input.left();
        input.backspace();
        assert_eq!(input.value(), "hélo");
        assert_eq!(input.cursor(), 2);

        input.home();
        input.delete();
        assert_eq!(input.value(), "élo");
        input.end();
        input.right();
        assert_eq!(input.cursor(), 3);
    }

    #[test]
    fn test_validation_errors_joined_with_defaults() {
        let verdict = ValidationResult {
            jmeter_valid: false,
            jmeter_error: Some("not executable".to_string()),
            openai_valid: false,
            openai_error: None,
        };
        assert_eq!(
            validation_errors(&verdict).as_deref(),
            Some("JMeter Path Error: not executable OpenAI Key Error: Invalid key.")
        );

        let verdict = ValidationResult { jmeter_valid: false, ..all_valid() };
        assert_eq!(
            validation_errors(&verdict).as_deref(),
            Some("JMeter Path Error: Invalid path or permissions.")
        );
        assert_eq!(validation_errors(&all_valid()), None);
    }

    #[tokio::test]
    async fn test_starts_on_config_screen_without_credentials() {
        let (app, _rx, _dir) = app_with(None);
        assert_eq!(app.screen, Screen::Config);
        assert!(!app.poller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_on_chat_screen_with_credentials_and_polls_immediately() {
        let (app, mut rx, _dir) = configured_app();
        assert_eq!(app.screen, Screen::Chat);
        assert!(app.poller.is_running());

        let start = tokio::time::Instant::now();
        assert!(matches!(rx.recv().await, Some(AppEvent::PollStatus)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_missing_field_never_reaches_backend_or_storage() {
        let (mut app, _rx, dir) = app_with(None);
        app.jmeter_path_input.set("   ");
        app.openai_key_input.set("sk-test");

        app.submit_config();

        assert_eq!(app.config_error.as_deref(), Some(MISSING_FIELDS_ERROR));
        assert!(!app.is_validating());
        assert!(!dir.path().join("credentials.json").exists());
        assert_eq!(app.screen, Screen::Config);
    }

    #[tokio::test]
    async fn test_successful_validation_saves_and_enters_chat() {
        let (mut app, _rx, dir) = app_with(None);
        let credentials = Credentials::new("/opt/jmeter/bin/jmeter", "sk-test");

        app.finish_validation(credentials.clone(), Ok(all_valid()));

        assert_eq!(app.screen, Screen::Chat);
        assert!(app.poller.is_running());
        assert_eq!(app.credentials.as_ref(), Some(&credentials));
        assert_eq!(CredentialStore::in_dir(dir.path()).get(), Some(credentials));
    }

    #[tokio::test]
    async fn test_rejected_validation_does_not_persist() {
        let (mut app, _rx, dir) = app_with(None);
        let verdict = ValidationResult {
            openai_valid: false,
            openai_error: Some("Incorrect API key provided".to_string()),
            ..all_valid()
        };

        app.finish_validation(Credentials::new("/opt/jmeter", "sk-bad"), Ok(verdict));

        assert_eq!(app.screen, Screen::Config);
        assert_eq!(
            app.config_error.as_deref(),
            Some("OpenAI Key Error: Incorrect API key provided")
        );
        assert!(!CredentialStore::in_dir(dir.path()).has());
    }

    #[tokio::test]
    async fn test_failed_validation_request_is_reported() {
        let (mut app, _rx, dir) = app_with(None);

        app.finish_validation(
            Credentials::new("/opt/jmeter", "sk-test"),
            Err(ApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                detail: "Validation request failed".to_string(),
            }),
        );

        assert_eq!(app.config_error.as_deref(), Some("Error validating: Validation request failed"));
        assert_eq!(app.screen, Screen::Config);
        assert!(!CredentialStore::in_dir(dir.path()).has());
    }

    #[tokio::test(start_paused = true)]
    async fn test_screen_toggles_keep_a_single_timer() {
        let (mut app, mut rx, _dir) = configured_app();
        rx.recv().await;

        app.show_config_screen();
        assert!(!app.poller.is_running());
        assert_eq!(app.jmeter_path_input.value(), "/opt/jmeter/bin/jmeter");
        assert_eq!(app.openai_key_input.value(), "sk-test");

        app.show_chat_screen();
        app.show_chat_screen();
        app.toggle_status_panel();
        app.toggle_status_panel();
        assert!(app.poller.is_running());

        let start = tokio::time::Instant::now();
        assert!(matches!(rx.recv().await, Some(AppEvent::PollStatus)));
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(rx.recv().await, Some(AppEvent::PollStatus)));
        // A second timer would have delivered its immediate tick at t=0 too.
        assert_eq!(start.elapsed(), POLL);
        tokio::task::yield_now().await;
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test]
    async fn test_empty_message_is_ignored() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_input.set("   ");

        app.send_message();

        assert!(app.transcript.is_empty());
        assert!(!app.is_thinking());
    }

    #[tokio::test]
    async fn test_send_appends_user_message_and_placeholder() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_error = Some("Error: old".to_string());
        app.chat_input.set("  run the smoke test  ");

        app.send_message();

        assert_eq!(app.transcript.len(), 2);
        assert_eq!(app.transcript.get(0), Some(&ChatMessage::user("run the smoke test")));
        assert_eq!(app.transcript.get(1).map(|m| m.text.as_str()), Some(THINKING_TEXT));
        assert!(app.chat_input.is_empty());
        assert_eq!(app.chat_error, None);

        // A second send while one is in flight is ignored.
        app.chat_input.set("again");
        app.send_message();
        assert_eq!(app.transcript.len(), 2);

        take_pending_chat(&mut app);
    }

    #[tokio::test]
    async fn test_placeholder_removed_on_success() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_input.set("run it");
        app.send_message();
        let placeholder = take_pending_chat(&mut app);

        // An analyzed error lands while the chat request is in flight.
        app.transcript.push(ChatMessage::technical("AI Analysis:\nboom"));

        app.finish_chat(
            placeholder,
            Ok(ChatReply {
                user_response: Some("Started.".to_string()),
                technical_action: Some(serde_json::json!({"type": "shell", "command": "jmeter -n"})),
            }),
        );

        let texts: Vec<&str> = app.transcript.iter().map(|(_, m)| m.text.as_str()).collect();
        assert!(!texts.contains(&THINKING_TEXT));
        assert_eq!(texts[0], "run it");
        assert_eq!(texts[1], "AI Analysis:\nboom");
        assert_eq!(texts[2], "Started.");
        assert!(app.transcript.get(3).unwrap().technical);
    }

    #[tokio::test]
    async fn test_placeholder_removed_on_failure() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_input.set("run it");
        app.send_message();
        let placeholder = take_pending_chat(&mut app);

        app.finish_chat(
            placeholder,
            Err(ApiError::Http {
                status: StatusCode::BAD_REQUEST,
                detail: "JMeter path is not executable".to_string(),
            }),
        );

        assert_eq!(app.transcript.len(), 1);
        assert!(app.transcript.iter().all(|(_, m)| m.text != THINKING_TEXT));
        assert_eq!(app.chat_error.as_deref(), Some("Error: JMeter path is not executable"));
    }

    #[tokio::test]
    async fn test_selection_follows_message_when_placeholder_removed() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_input.set("run it");
        app.send_message();
        let placeholder = take_pending_chat(&mut app);
        app.transcript.push(ChatMessage::technical("AI Analysis:\nboom"));
        app.select_last_message();
        assert_eq!(app.selected_message, Some(2));

        app.finish_chat(placeholder, Ok(ChatReply::default()));

        assert_eq!(app.selected_message, Some(1));
        assert_eq!(app.selected().map(|m| m.text.as_str()), Some("AI Analysis:\nboom"));
    }

    #[tokio::test]
    async fn test_clear_during_pending_chat() {
        let (mut app, _rx, _dir) = configured_app();
        app.chat_input.set("run it");
        app.send_message();
        let placeholder = take_pending_chat(&mut app);

        app.clear_transcript();
        app.finish_chat(placeholder, Ok(ChatReply::default()));

        assert!(app.transcript.is_empty());
    }

    #[tokio::test]
    async fn test_status_poll_failure_leaves_transcript_and_tracker() {
        let (mut app, _rx, _dir) = configured_app();
        app.apply_status(Ok(JobStatus {
            status: JobState::ErrorAnalyzed,
            original_error_message: Some("boom".to_string()),
            user_response: Some("Root cause: X".to_string()),
            ..JobStatus::default()
        }));
        assert_eq!(app.transcript.len(), 1);

        app.apply_status(Err(ApiError::Http {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: "HTTP error! status: 503".to_string(),
        }));

        assert_eq!(app.panel.to_plain_text(), "Error checking status: HTTP error! status: 503");
        assert_eq!(
            app.chat_error.as_deref(),
            Some("Error checking status: HTTP error! status: 503")
        );
        assert_eq!(app.transcript.len(), 1);
        assert_eq!(app.tracker.last_shown(), Some("boom"));
    }

    #[tokio::test]
    async fn test_repeated_analyzed_status_appends_once() {
        let (mut app, _rx, _dir) = configured_app();
        let status = JobStatus {
            status: JobState::ErrorAnalyzed,
            original_error_message: Some("boom".to_string()),
            user_response: Some("Root cause: X".to_string()),
            ..JobStatus::default()
        };

        app.apply_status(Ok(status.clone()));
        app.apply_status(Ok(status));

        assert_eq!(app.transcript.len(), 1);
        let message = app.transcript.get(0).unwrap();
        assert!(message.technical);
        assert!(message.text.contains("Root cause: X"));
        assert_eq!(app.tracker.last_shown(), Some("boom"));
    }

    #[tokio::test]
    async fn test_success_status_updates_panel_only() {
        let (mut app, _rx, _dir) = configured_app();
        app.apply_status(Ok(JobStatus {
            status: JobState::Running,
            ..JobStatus::default()
        }));
        assert!(app.panel.running);

        app.apply_status(Ok(JobStatus {
            status: JobState::Success,
            report_path: Some("/r.html".to_string()),
            message: Some("OK".to_string()),
            ..JobStatus::default()
        }));

        assert!(!app.panel.running);
        assert!(app.panel.to_plain_text().contains("Report Path: /r.html"));
        assert!(app.transcript.is_empty());
        assert_eq!(app.tracker.last_shown(), None);
    }

    #[tokio::test]
    async fn test_copy_label_resets() {
        let (mut app, _rx, _dir) = configured_app();
        assert_eq!(app.copy_label(), COPY_LABEL);

        app.set_copy_feedback(true);
        assert_eq!(app.copy_label(), COPIED_LABEL);
        app.tick();
        assert_eq!(app.copy_label(), COPIED_LABEL);

        if let Some(feedback) = app.copy_feedback.as_mut() {
            feedback.expires_at = Instant::now();
        }
        app.tick();
        assert_eq!(app.copy_label(), COPY_LABEL);
    }

    #[tokio::test]
    async fn test_selection_and_command() {
        let (mut app, _rx, _dir) = configured_app();
        app.transcript.push(ChatMessage::user("how do I run headless?"));
        app.transcript
            .push(ChatMessage::technical("Technical Action:\nType: shell\nCommand:\njmeter -n -t plan.jmx"));

        app.select_prev_message();
        assert_eq!(app.selected_message, Some(1));
        assert_eq!(app.selected_command(), Some("jmeter -n -t plan.jmx"));

        app.select_prev_message();
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(0));
        assert_eq!(app.selected_command(), None);

        app.select_next_message();
        app.select_next_message();
        assert_eq!(app.selected_message, Some(1));

        app.clear_transcript();
        assert_eq!(app.selected_message, None);
    }
}
