use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::settings::AgentSettings;

/// Lifecycle tag for a workflow step. Steps are expected to move
/// `Pending -> Running -> (Complete | Error)`, but that progression is
/// orchestrator discipline; the container never enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Complete,
    Error,
}

/// One record of a workflow step the orchestrator executed. Immutable once
/// appended; the timestamp is assigned by the container, not the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowLogEntry {
    pub step: String,
    pub status: StepStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of the most recently completed fetch. A failed fetch is ordinary
/// data here (`success = false`, `error` set), not an error condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResult {
    pub success: bool,
    pub title: String,
    pub summary: String,
    pub file_path: String,
    pub error: Option<String>,
}

/// One candidate returned by a search step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
}

/// In-memory state for one client session of the fetching agent.
///
/// Plain owned data: no locks, no await points. Every mutation runs to
/// completion before anything else can observe the state, and every mutation
/// bumps a watch-channel version so observers can wait for changes instead of
/// polling. All mutations are infallible; nothing in here validates input.
#[derive(Debug)]
pub struct AgentSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    logs: Vec<WorkflowLogEntry>,
    is_running: bool,
    last_result: Option<FetchResult>,
    last_query: String,
    search_results: Vec<SearchResult>,
    settings: AgentSettings,
    version: watch::Sender<u64>,
}

impl AgentSession {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            logs: Vec::new(),
            is_running: false,
            last_result: None,
            last_query: String::new(),
            search_results: Vec::new(),
            settings: AgentSettings::default(),
            version,
        }
    }

    /// Appends a log entry stamped with the current time. Prior entries are
    /// never inspected; repeated or out-of-order statuses are accepted as-is.
    pub fn append_log(
        &mut self,
        step: impl Into<String>,
        status: StepStatus,
        message: impl Into<String>,
    ) {
        self.logs.push(WorkflowLogEntry {
            step: step.into(),
            status,
            message: message.into(),
            timestamp: Utc::now(),
        });
        self.bump();
    }

    /// Empties the log and discards the retained fetch result and search
    /// results. `is_running`, `last_query`, and `settings` are left alone: a
    /// user may clear the visible history mid-run without disturbing run
    /// state or configuration.
    pub fn clear_session(&mut self) {
        self.logs.clear();
        self.last_result = None;
        self.search_results.clear();
        self.bump();
    }

    pub fn set_running(&mut self, running: bool) {
        self.is_running = running;
        self.bump();
    }

    /// Replaces the single retained fetch result. Does not append a log
    /// entry; callers wanting both must make both calls.
    pub fn set_result(&mut self, result: FetchResult) {
        self.last_result = Some(result);
        self.bump();
    }

    /// Replaces the search-result candidates wholesale. An empty vec is
    /// valid and clears the previous batch.
    pub fn set_search_results(&mut self, results: Vec<SearchResult>) {
        self.search_results = results;
        self.bump();
    }

    /// Replaces the whole settings record. Partial updates are not supported
    /// at this layer; a caller changing one field reads, modifies, and
    /// passes the full record back.
    pub fn update_settings(&mut self, settings: AgentSettings) {
        self.settings = settings;
        self.bump();
    }

    pub fn set_last_query(&mut self, query: impl Into<String>) {
        self.last_query = query.into();
        self.bump();
    }

    pub fn logs(&self) -> &[WorkflowLogEntry] {
        &self.logs
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn last_result(&self) -> Option<&FetchResult> {
        self.last_result.as_ref()
    }

    pub fn last_query(&self) -> &str {
        &self.last_query
    }

    pub fn search_results(&self) -> &[SearchResult] {
        &self.search_results
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Current change version. Starts at 0; each mutation adds 1.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Hands out a receiver that resolves whenever a mutation lands, so the
    /// rendering layer can await changes instead of polling.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Owned copy of the full observable state.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            version: self.version(),
            logs: self.logs.clone(),
            is_running: self.is_running,
            last_result: self.last_result.clone(),
            last_query: self.last_query.clone(),
            search_results: self.search_results.clone(),
            settings: self.settings.clone(),
        }
    }

    fn bump(&mut self) {
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for AgentSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Fully-formed view of the session state, as served to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    pub logs: Vec<WorkflowLogEntry>,
    pub is_running: bool,
    pub last_result: Option<FetchResult>,
    pub last_query: String,
    pub search_results: Vec<SearchResult>,
    pub settings: AgentSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed_result(error: &str) -> FetchResult {
        FetchResult {
            success: false,
            title: String::new(),
            summary: String::new(),
            file_path: String::new(),
            error: Some(error.into()),
        }
    }

    #[test]
    fn append_log_grows_by_one_and_preserves_order() {
        let mut session = AgentSession::new();
        for i in 0..5 {
            session.append_log("fetch", StepStatus::Running, format!("attempt {i}"));
        }
        assert_eq!(session.logs().len(), 5);
        let messages: Vec<_> = session.logs().iter().map(|l| l.message.as_str()).collect();
        assert_eq!(
            messages,
            ["attempt 0", "attempt 1", "attempt 2", "attempt 3", "attempt 4"]
        );
    }

    #[test]
    fn append_log_accepts_repeated_and_out_of_order_statuses() {
        let mut session = AgentSession::new();
        session.append_log("search", StepStatus::Complete, "done before started");
        session.append_log("search", StepStatus::Pending, "queued late");
        session.append_log("search", StepStatus::Pending, "queued again");
        assert_eq!(session.logs().len(), 3);
        assert_eq!(session.logs()[0].status, StepStatus::Complete);
    }

    #[test]
    fn clear_session_resets_history_but_not_run_state_or_settings() {
        let mut session = AgentSession::new();
        session.set_running(true);
        session.set_last_query("rust watch channels");
        let mut settings = session.settings().clone();
        settings.selected_model = "mistral:7b".into();
        session.update_settings(settings.clone());
        session.append_log("search", StepStatus::Running, "querying");
        session.set_result(failed_result("timeout"));
        session.set_search_results(vec![SearchResult {
            url: "https://a".into(),
            title: "A".into(),
        }]);

        session.clear_session();

        assert!(session.logs().is_empty());
        assert!(session.last_result().is_none());
        assert!(session.search_results().is_empty());
        assert!(session.is_running());
        assert_eq!(session.last_query(), "rust watch channels");
        assert_eq!(session.settings(), &settings);
    }

    #[test]
    fn set_result_round_trips_identically() {
        let mut session = AgentSession::new();
        let result = FetchResult {
            success: true,
            title: "Watch Channels".into(),
            summary: "tokio's single-value broadcast".into(),
            file_path: "/vault/watch-channels.md".into(),
            error: None,
        };
        session.set_result(result.clone());
        assert_eq!(session.last_result(), Some(&result));
    }

    #[test]
    fn update_settings_replaces_the_whole_record() {
        let mut session = AgentSession::new();
        let settings = AgentSettings {
            ai_summarization: false,
            headless_mode: true,
            selected_model: "qwen2.5:3b".into(),
            obsidian_api_key: "secret".into(),
        };
        session.update_settings(settings.clone());
        assert_eq!(session.settings(), &settings);
    }

    #[test]
    fn search_scenario_keeps_log_and_results_in_step() {
        let mut session = AgentSession::new();
        session.append_log("search", StepStatus::Running, "querying");
        session.set_search_results(vec![SearchResult {
            url: "a".into(),
            title: "A".into(),
        }]);
        session.append_log("search", StepStatus::Complete, "found 1 result");

        assert_eq!(session.logs().len(), 2);
        assert_eq!(session.logs()[0].status, StepStatus::Running);
        assert_eq!(session.logs()[1].status, StepStatus::Complete);
        assert_eq!(session.search_results().len(), 1);
    }

    #[test]
    fn failed_fetch_scenario_ends_stopped_with_error_state() {
        let mut session = AgentSession::new();
        session.set_running(true);
        session.append_log("fetch", StepStatus::Error, "timeout");
        session.set_result(failed_result("timeout"));
        session.set_running(false);

        assert!(!session.is_running());
        assert_eq!(session.last_result().map(|r| r.success), Some(false));
        assert_eq!(session.logs().len(), 1);
        assert_eq!(session.logs()[0].status, StepStatus::Error);
    }

    #[test]
    fn every_mutation_bumps_the_version_once() {
        let mut session = AgentSession::new();
        assert_eq!(session.version(), 0);
        session.append_log("search", StepStatus::Pending, "queued");
        session.set_running(true);
        session.set_last_query("q");
        session.set_search_results(Vec::new());
        session.set_result(failed_result("nope"));
        session.update_settings(AgentSettings::default());
        session.clear_session();
        assert_eq!(session.version(), 7);
        let _ = session.snapshot();
        assert_eq!(session.version(), 7);
    }

    #[tokio::test]
    async fn subscriber_wakes_on_mutation() {
        let mut session = AgentSession::new();
        let mut rx = session.subscribe();
        session.set_running(true);
        rx.changed().await.expect("sender still alive");
        assert_eq!(*rx.borrow(), 1);
    }

    #[test]
    fn snapshot_serializes_with_camel_case_keys() {
        let session = AgentSession::new();
        let value = serde_json::to_value(session.snapshot()).unwrap();
        assert_eq!(value["isRunning"], serde_json::Value::Bool(false));
        assert!(value["lastResult"].is_null());
        assert_eq!(value["searchResults"], serde_json::json!([]));
        assert_eq!(value["settings"]["selectedModel"], "llama3.2:1b");
    }

    #[test]
    fn status_tags_use_lowercase_wire_names() {
        let entry = WorkflowLogEntry {
            step: "summarize".into(),
            status: StepStatus::Error,
            message: "model unavailable".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["status"], "error");
        let parsed: StepStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, StepStatus::Pending);
        assert!(serde_json::from_str::<StepStatus>("\"paused\"").is_err());
    }
}
