//! Model-agnostic beam search.
//!
//! The search only needs a callback returning next-token log-probabilities for a decoder prefix,
//! so it can be driven by the T5 decoder in production and by toy distributions in tests.

/// Knobs controlling a single beam search run.
#[derive(Debug, Clone, Copy)]
pub struct BeamSearchParams {
    /// Number of hypotheses kept alive per step.
    pub num_beams: usize,
    /// Upper bound on generated tokens, end-of-sequence included.
    pub max_new_tokens: usize,
    /// Exponent applied to the hypothesis length when ranking finished sequences.
    pub length_penalty: f32,
    /// Token every decoder prefix starts with.
    pub start_token: u32,
    /// Token that terminates a hypothesis.
    pub eos_token: u32,
}

#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f32,
}

#[derive(Debug)]
struct Finished {
    tokens: Vec<u32>,
    score: f32,
}

/// Run beam search and return the best generated sequence.
///
/// The returned tokens exclude the start token and the terminating end-of-sequence token.
/// `next_log_probs` receives the full prefix (start token included) and must return one
/// log-probability per vocabulary entry.
pub fn beam_search<E, F>(params: &BeamSearchParams, mut next_log_probs: F) -> Result<Vec<u32>, E>
where
    F: FnMut(&[u32]) -> Result<Vec<f32>, E>,
{
    let width = params.num_beams.max(1);
    let mut live = vec![Hypothesis {
        tokens: vec![params.start_token],
        log_prob: 0.0,
    }];
    let mut finished: Vec<Finished> = Vec::with_capacity(width + 1);

    for step in 0..params.max_new_tokens {
        let generated = step + 1;
        let mut candidates: Vec<(f32, usize, u32)> = Vec::with_capacity(live.len() * width * 2);
        for (beam_idx, beam) in live.iter().enumerate() {
            let log_probs = next_log_probs(&beam.tokens)?;
            for (token, log_prob) in top_k(&log_probs, width * 2) {
                candidates.push((beam.log_prob + log_prob, beam_idx, token));
            }
        }
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

        let mut next = Vec::with_capacity(width);
        for (rank, (log_prob, beam_idx, token)) in candidates.into_iter().enumerate() {
            if token == params.eos_token {
                // An end token outside the top `width` ranks would not have survived pruning.
                if rank < width {
                    let mut tokens = live[beam_idx].tokens.clone();
                    tokens.push(token);
                    push_finished(
                        &mut finished,
                        width,
                        Finished {
                            tokens,
                            score: normalize(log_prob, generated, params.length_penalty),
                        },
                    );
                }
                continue;
            }

            let mut tokens = live[beam_idx].tokens.clone();
            tokens.push(token);
            next.push(Hypothesis { tokens, log_prob });
            if next.len() == width {
                break;
            }
        }

        live = next;
        if live.is_empty() || is_done(&finished, &live, width, generated, params.length_penalty) {
            break;
        }
    }

    for beam in live {
        let generated = beam.tokens.len() - 1;
        let score = normalize(beam.log_prob, generated, params.length_penalty);
        push_finished(
            &mut finished,
            width,
            Finished {
                tokens: beam.tokens,
                score,
            },
        );
    }

    let best = finished
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|hypothesis| hypothesis.tokens)
        .unwrap_or_default();

    Ok(strip_markers(best, params))
}

fn normalize(log_prob: f32, generated: usize, length_penalty: f32) -> f32 {
    log_prob / (generated.max(1) as f32).powf(length_penalty)
}

fn push_finished(finished: &mut Vec<Finished>, width: usize, hypothesis: Finished) {
    finished.push(hypothesis);
    if finished.len() > width {
        finished.sort_by(|a, b| b.score.total_cmp(&a.score));
        finished.truncate(width);
    }
}

/// Stop once `width` sequences are finished and no live beam can still outrank the worst one.
fn is_done(
    finished: &[Finished],
    live: &[Hypothesis],
    width: usize,
    generated: usize,
    length_penalty: f32,
) -> bool {
    if finished.len() < width {
        return false;
    }
    let worst = finished
        .iter()
        .map(|hypothesis| hypothesis.score)
        .fold(f32::INFINITY, f32::min);
    let best_live = live
        .iter()
        .map(|beam| normalize(beam.log_prob, generated, length_penalty))
        .fold(f32::NEG_INFINITY, f32::max);
    best_live <= worst
}

fn top_k(log_probs: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut indexed: Vec<(u32, f32)> = log_probs
        .iter()
        .enumerate()
        .filter(|(_, value)| !value.is_nan() && **value > f32::NEG_INFINITY)
        .map(|(idx, value)| (idx as u32, *value))
        .collect();
    let k = k.min(indexed.len());
    if k == 0 {
        return Vec::new();
    }
    if k < indexed.len() {
        indexed.select_nth_unstable_by(k - 1, |a, b| b.1.total_cmp(&a.1));
        indexed.truncate(k);
    }
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));
    indexed
}

fn strip_markers(mut tokens: Vec<u32>, params: &BeamSearchParams) -> Vec<u32> {
    if tokens.last() == Some(&params.eos_token) {
        tokens.pop();
    }
    if tokens.first() == Some(&params.start_token) {
        tokens.remove(0);
    }
    tokens
}
