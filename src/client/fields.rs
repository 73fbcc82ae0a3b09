//! The three user-selected values sent alongside every recording.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceFields {
    pub emotion: String,
    pub voice_id: String,
    pub prompt_template: String,
}

impl VoiceFields {
    pub fn has_known_template(&self) -> bool {
        PromptTemplate::from_name(&self.prompt_template).is_some()
    }

    pub fn apply(&mut self, update: FieldsUpdate) {
        if let Some(emotion) = update.emotion {
            self.emotion = emotion;
        }
        if let Some(voice_id) = update.voice_id {
            self.voice_id = voice_id;
        }
        if let Some(prompt_template) = update.prompt_template {
            self.prompt_template = prompt_template;
        }
    }
}

/// Partial change to [`VoiceFields`]; `None` leaves a field as it is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldsUpdate {
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default, alias = "prompt-template")]
    pub prompt_template: Option<String>,
}

/// Prompt templates the server knows about. Anything else falls back to
/// `assistant` on the server side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PromptTemplate {
    Assistant,
    Friend,
    Tutor,
}

impl PromptTemplate {
    pub const ALL: [PromptTemplate; 3] = [Self::Assistant, Self::Friend, Self::Tutor];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Friend => "friend",
            Self::Tutor => "tutor",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Assistant => "Polite, informative helper",
            Self::Friend => "Casual, relaxed companion",
            Self::Tutor => "Educational explanations",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// Shared, mutable view of the current field values. Read once per upload.
#[derive(Clone)]
pub struct FieldsHandle {
    inner: Arc<Mutex<VoiceFields>>,
}

impl FieldsHandle {
    pub fn new(fields: VoiceFields) -> Self {
        Self {
            inner: Arc::new(Mutex::new(fields)),
        }
    }

    pub async fn get(&self) -> VoiceFields {
        self.inner.lock().await.clone()
    }

    pub async fn update(&self, update: FieldsUpdate) -> VoiceFields {
        let mut fields = self.inner.lock().await;
        fields.apply(update);
        fields.clone()
    }
}
