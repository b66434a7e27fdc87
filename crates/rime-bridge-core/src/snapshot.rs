//! Externally visible result of a command.

use serde::{Deserialize, Serialize};

/// Preedit split around the active selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputBuffer {
    pub before: String,
    pub active: String,
    pub after: String,
}

impl InputBuffer {
    /// The whole preedit, spans rejoined.
    #[must_use]
    pub fn joined(&self) -> String {
        [self.before.as_str(), &self.active, &self.after].concat()
    }
}

/// One selectable candidate on the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub label: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Fields that only exist while composing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub input_buffer: InputBuffer,
    pub page: usize,
    pub is_last_page: bool,
    pub highlighted_index: usize,
    pub candidates: Vec<Candidate>,
}

/// State reported to the host after a command.
///
/// `composition` is `Some` exactly when `is_composing` is true; use the
/// constructors to keep the two in step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub committed_text: Option<String>,
    pub is_composing: bool,
    #[serde(flatten)]
    pub composition: Option<Composition>,
}

impl Snapshot {
    /// Nothing left in the composition buffer.
    #[must_use]
    pub const fn idle(success: bool, committed_text: Option<String>) -> Self {
        Self {
            success,
            committed_text,
            is_composing: false,
            composition: None,
        }
    }

    /// Composition in progress.
    #[must_use]
    pub const fn composing(
        success: bool,
        committed_text: Option<String>,
        composition: Composition,
    ) -> Self {
        Self {
            success,
            committed_text,
            is_composing: true,
            composition: Some(composition),
        }
    }

    /// Candidates on the current page, empty when idle.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        self.composition
            .as_ref()
            .map_or(&[], |c| c.candidates.as_slice())
    }
}
