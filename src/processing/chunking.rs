//! Token-window chunking under the model tokenizer.
//!
//! The document is tokenized once without special tokens, the id sequence is cut into
//! contiguous non-overlapping windows of at most `max_tokens` ids, and each window is decoded
//! back into a string. Windows keep document order. Decoding is not guaranteed to reproduce the
//! source bytes exactly; whitespace handling depends on the tokenizer's decoder.

use tokenizers::Tokenizer;

use super::types::ChunkingError;

/// Split `text` into chunks whose token count never exceeds `max_tokens`.
///
/// Returns an empty vector when the input is empty or whitespace only.
pub fn split_text(
    tokenizer: &Tokenizer,
    text: &str,
    max_tokens: usize,
) -> Result<Vec<String>, ChunkingError> {
    if max_tokens == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let ids = encode_ids(tokenizer, text)?;
    let chunks = token_windows(&ids, max_tokens)
        .map(|window| {
            tokenizer
                .decode(window, true)
                .map_err(ChunkingError::decode)
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::debug!(
        tokens = ids.len(),
        chunks = chunks.len(),
        max_tokens,
        "Split document into token windows"
    );
    Ok(chunks)
}

/// Token ids for `text`, without special tokens.
pub fn encode_ids(tokenizer: &Tokenizer, text: &str) -> Result<Vec<u32>, ChunkingError> {
    let encoding = tokenizer
        .encode(text, false)
        .map_err(ChunkingError::encode)?;
    Ok(encoding.get_ids().to_vec())
}

/// Contiguous windows over `ids`; only the last one may be shorter than `max_tokens`.
pub fn token_windows(ids: &[u32], max_tokens: usize) -> impl Iterator<Item = &[u32]> {
    ids.chunks(max_tokens.max(1))
}
