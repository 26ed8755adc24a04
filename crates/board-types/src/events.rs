use serde::{Deserialize, Serialize};

use crate::api::BoardView;

/// Frames sent FROM server TO a live page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveFrame {
    /// Replace the whole visible board
    Render(BoardView),

    /// Show a blocking message to the user
    Alert { message: String },
}

/// Commands sent FROM a live page TO the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LiveCommand {
    /// Post a comment from the form
    Submit { author: String, body: String },
}
