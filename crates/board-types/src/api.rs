use serde::{Deserialize, Serialize};

// -- Init config --

/// Connection configuration served by the host at `/__/board/init.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitConfig {
    pub project_id: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_presence_path")]
    pub presence_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub live_url: Option<String>,
}

fn default_collection() -> String {
    "comments".to_string()
}

fn default_presence_path() -> String {
    "presence".to_string()
}

impl InitConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            collection: default_collection(),
            presence_path: default_presence_path(),
            live_url: None,
        }
    }
}

// -- View model --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitControl {
    pub disabled: bool,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormView {
    pub author: String,
    pub body: String,
}

/// Everything the page shows, rebuilt from board state on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardView {
    /// Markup for the comment list container, author and body already escaped.
    pub list_html: String,
    /// Empty until the first presence count arrives.
    pub viewer_count: String,
    pub submit: SubmitControl,
    pub form: FormView,
}
