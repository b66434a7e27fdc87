//! Reads the pending commit and current context after a command and turns
//! them into a `Snapshot`.

use rime_bridge_core::{
    Candidate, CommitGuard, Composition, ContextGuard, Engine, InputBuffer, SessionId, Snapshot,
};

/// Label for the candidate at zero-based `index` when the schema defines none:
/// `"1."` .. `"9."`, then `"0."`, cycling.
#[must_use]
pub fn fallback_label(index: usize) -> String {
    format!("{}.", (index + 1) % 10)
}

/// Split `preedit` at byte offsets `sel_start`/`sel_end`.
///
/// Offsets are clamped to the buffer and moved back to the nearest character
/// boundary, so the three spans always rejoin to `preedit`. An inverted
/// selection yields an empty active span.
#[must_use]
pub fn split_preedit(preedit: &str, sel_start: usize, sel_end: usize) -> InputBuffer {
    let start = char_floor(preedit, sel_start);
    let end = char_floor(preedit, sel_end).max(start);
    if start != sel_start.min(preedit.len()) || end != sel_end.clamp(start, preedit.len()) {
        tracing::debug!(sel_start, sel_end, start, end, "selection moved to character boundaries");
    }
    InputBuffer {
        before: preedit[..start].to_string(),
        active: preedit[start..end].to_string(),
        after: preedit[end..].to_string(),
    }
}

fn char_floor(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Builds snapshots against one engine.
pub struct SnapshotBuilder<'e, E: Engine + ?Sized> {
    engine: &'e E,
}

impl<'e, E: Engine + ?Sized> SnapshotBuilder<'e, E> {
    #[must_use]
    pub const fn new(engine: &'e E) -> Self {
        Self { engine }
    }

    /// Snapshot the session after a command whose own result was `success`.
    ///
    /// The commit is released before the context is fetched; both are
    /// released on every path out of this function.
    #[must_use]
    pub fn build(&self, session: SessionId, success: bool) -> Snapshot {
        let committed_text =
            CommitGuard::acquire(self.engine, session).and_then(|commit| commit.text.clone());

        let Some(context) = ContextGuard::acquire(self.engine, session) else {
            tracing::warn!(%session, "engine returned no context");
            return Snapshot::idle(success, committed_text);
        };

        let composition = &context.composition;
        if composition.length == 0 {
            return Snapshot::idle(success, committed_text);
        }

        let input_buffer = split_preedit(
            composition.preedit.as_deref().unwrap_or_default(),
            composition.sel_start,
            composition.sel_end,
        );

        let menu = &context.menu;
        let labels = context.select_labels.as_deref().unwrap_or_default();
        let candidates = menu
            .candidates
            .iter()
            .enumerate()
            .map(|(i, candidate)| Candidate {
                label: labels
                    .get(i)
                    .and_then(Option::as_deref)
                    .filter(|label| !label.is_empty())
                    .map_or_else(|| fallback_label(i), str::to_string),
                text: candidate.text.clone(),
                comment: candidate.comment.clone(),
            })
            .collect();

        Snapshot::composing(
            success,
            committed_text,
            Composition {
                input_buffer,
                page: menu.page_no,
                is_last_page: menu.is_last_page,
                highlighted_index: menu.highlighted_candidate_index,
                candidates,
            },
        )
    }
}
