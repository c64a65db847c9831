use rand::seq::SliceRandom;
use rand::Rng;

use super::ChainModel;

/// Shortest generation request.
pub const MIN_GENERATION_LENGTH: usize = 1;

/// Draw a requested length uniformly from `[1, max_length]`.
pub fn draw_length<R: Rng + ?Sized>(rng: &mut R, max_length: usize) -> usize {
    let max_length = max_length.max(MIN_GENERATION_LENGTH);
    rng.gen_range(MIN_GENERATION_LENGTH..=max_length)
}

/// Random walk of at most `length` tokens from a uniformly chosen position of
/// the source text. Empty model gives an empty string.
pub fn generate<R: Rng + ?Sized>(model: &ChainModel, length: usize, rng: &mut R) -> String {
    if model.is_empty() {
        return String::new();
    }

    match model.tokens().choose(rng) {
        Some(start) => walk_from(model, start, length, rng),
        None => String::new(),
    }
}

/// Walk from `start`, stopping after `length` tokens or at the first token
/// with no observed successor.
pub fn walk_from<R: Rng + ?Sized>(
    model: &ChainModel,
    start: &str,
    length: usize,
    rng: &mut R,
) -> String {
    let mut output: Vec<&str> = Vec::with_capacity(length.min(64));
    let mut current = start;

    for _ in 0..length {
        output.push(current);
        match model.successors(current).and_then(|next| next.choose(rng)) {
            Some(next) => current = next.as_str(),
            None => break,
        }
    }

    output.join(" ")
}
