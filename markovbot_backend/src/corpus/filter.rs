//! Ingestion policy for chat lines.
//!
//! Decides whether an inbound line is worth keeping as training text and
//! normalizes it before it reaches the store. Pure: persistence is the caller's
//! job.

/// Transport-level marker for action messages (`/me waves`).
const ACTION_MARKER: &str = "ACTION";
const ACTION_REPLACEMENT: &str = "/me";

/// A line that passed the filter and is ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedLine(String);

impl NormalizedLine {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalize `content` and decide whether it belongs in the corpus.
///
/// Rejects lines with fewer than two tokens (nothing to chain) and lines whose
/// first token addresses someone (`Name: ...`).
pub fn consider(content: &str) -> Option<NormalizedLine> {
    let replaced = content.trim().replace(ACTION_MARKER, ACTION_REPLACEMENT);

    let mut tokens = replaced.split_whitespace();
    let first = tokens.next()?;
    if tokens.next().is_none() {
        return None;
    }

    if is_highlight(first) {
        tracing::debug!("Found highlight message: {}", replaced);
        return None;
    }

    Some(NormalizedLine(replaced))
}

/// True when `token` is a non-whitespace run that contains a `:` after at
/// least one character, i.e. the `^[^\s]+:.*$` highlight form.
pub fn is_highlight(token: &str) -> bool {
    let run_len = token
        .find(char::is_whitespace)
        .unwrap_or(token.len());
    token[..run_len]
        .char_indices()
        .any(|(idx, ch)| ch == ':' && idx > 0)
}
