use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role tag for one chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of the generation-backend conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Mutable per-attempt prompt state.
///
/// Created fresh when a round chain starts and carried across repair rounds
/// so that the latest candidate and its diagnostics steer the next call.
/// Never shared across tasks.
#[derive(Debug, Clone, Default)]
pub struct PromptInfo {
    pub has_dep: bool,
    pub class_name: String,
    pub method_name: String,
    pub method_signature: String,
    pub method_source: String,
    /// The assembled class-shell context handed to the backend.
    pub context: String,
    /// Dependency class name -> textual snippet, from method dependencies.
    pub method_deps: BTreeMap<String, String>,
    /// Dependency class name -> textual snippet, from constructor dependencies.
    pub constructor_deps: BTreeMap<String, String>,
    /// Latest generated test source, recorded before import reconciliation.
    pub unit_test: String,
    /// Latest validation diagnostics, fed into the next repair round.
    pub error_msg: Vec<String>,
}

impl PromptInfo {
    pub fn new(
        has_dep: bool,
        class_name: impl Into<String>,
        method_name: impl Into<String>,
        method_signature: impl Into<String>,
        method_source: impl Into<String>,
    ) -> Self {
        Self {
            has_dep,
            class_name: class_name.into(),
            method_name: method_name.into(),
            method_signature: method_signature.into(),
            method_source: method_source.into(),
            ..Default::default()
        }
    }

    pub fn record_failure(&mut self, diagnostics: Vec<String>) {
        self.error_msg = diagnostics;
    }

    pub fn has_feedback(&self) -> bool {
        !self.unit_test.is_empty() && !self.error_msg.is_empty()
    }
}
