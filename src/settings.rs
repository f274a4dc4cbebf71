use serde::{Deserialize, Serialize};

/// User-configurable behavior for the fetching agent, replaced as a whole
/// record. Field names on the wire are camelCase to match the client shape.
/// Values are held verbatim; nothing here validates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSettings {
    /// Invoke AI summarization as part of a fetch.
    pub ai_summarization: bool,
    /// Hide the browser window during a fetch.
    pub headless_mode: bool,
    /// Which model the summarization step asks for.
    pub selected_model: String,
    /// Credential for the Obsidian note-saving integration.
    pub obsidian_api_key: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            ai_summarization: true,
            headless_mode: false,
            selected_model: "llama3.2:1b".into(),
            obsidian_api_key: String::new(),
        }
    }
}
