use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Sampling knobs, fixed once at service construction.
#[derive(Debug, Clone)]
pub struct ModelOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub num_ctx: u32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            num_ctx: 4096,
        }
    }
}
