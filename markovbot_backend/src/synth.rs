use std::sync::Arc;

use crate::chain::{draw_length, generate, ChainModel};
use crate::corpus::CorpusStore;
use crate::rng::SharedRng;

/// Fetches the corpus, builds a fresh chain and walks it.
///
/// Shared by the on-demand trigger and the deferred reply worker so both see
/// the corpus as it is at the moment they run.
#[derive(Clone)]
pub struct Synthesizer {
    store: Arc<dyn CorpusStore>,
    rng: SharedRng,
    max_length: usize,
}

impl Synthesizer {
    pub fn new(store: Arc<dyn CorpusStore>, rng: SharedRng, max_length: usize) -> Self {
        Self {
            store,
            rng,
            max_length,
        }
    }

    /// Generate one line of text. A failed fetch is logged and treated as an
    /// empty corpus, which yields an empty string.
    pub fn compose(&self) -> String {
        let lines = match self.store.fetch_all_random_order() {
            Ok(lines) => lines,
            Err(e) => {
                tracing::warn!("Failed to fetch corpus, generating from nothing: {:#}", e);
                Vec::new()
            }
        };

        let model = ChainModel::from_lines(&lines);
        let (length, text) = self.rng.with(|rng| {
            let length = draw_length(rng, self.max_length);
            (length, generate(&model, length, rng))
        });

        tracing::debug!(
            "Composed {} of {} requested tokens from {} corpus lines",
            text.split_whitespace().count(),
            length,
            lines.len()
        );
        text
    }
}
