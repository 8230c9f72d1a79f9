//! Abstractive summarization with a local T5-family seq2seq model.
//!
//! Weights are loaded once from a model directory containing `config.json`, `tokenizer.json`,
//! and `model.safetensors`. The decoder is stateful (`&mut self`), so every generation holds
//! the model mutex for the whole beam search and runs on the blocking thread pool.

pub mod beam;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use candle_core::{D, DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use thiserror::Error;
use tokenizers::Tokenizer;

use crate::config::Config;
use beam::{BeamSearchParams, beam_search};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";
const WEIGHTS_FILE: &str = "model.safetensors";

/// Errors raised while loading the model directory.
#[derive(Debug, Error)]
pub enum ModelLoadError {
    /// A required file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `config.json` did not describe a T5 model.
    #[error("invalid model config: {0}")]
    Config(#[from] serde_json::Error),
    /// `tokenizer.json` could not be parsed.
    #[error("failed to load tokenizer: {0}")]
    Tokenizer(#[source] anyhow::Error),
    /// Weights were missing or mismatched the config.
    #[error("failed to load model weights: {0}")]
    Weights(#[from] candle_core::Error),
}

/// Errors raised while generating a summary for one chunk.
#[derive(Debug, Error)]
pub enum SummarizationError {
    /// Tokenizer failed to encode the chunk or decode the output.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    /// Tensor computation failed.
    #[error("generation failed: {0}")]
    Model(#[from] candle_core::Error),
    /// A previous generation panicked while holding the model.
    #[error("model lock poisoned")]
    ModelPoisoned,
    /// Blocking generation task did not complete.
    #[error("generation task failed: {0}")]
    Task(String),
}

/// Decoding parameters applied to every chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    /// Encoder input cap; longer inputs are truncated.
    pub max_input_tokens: usize,
    /// Maximum summary length in decoder tokens, decoder start token included.
    pub max_summary_tokens: usize,
    /// Beam width.
    pub num_beams: usize,
    /// Sampling temperature. Beam search is deterministic, so this has no effect on output.
    pub temperature: f64,
    /// Length normalization exponent for finished beams.
    pub length_penalty: f32,
}

impl GenerationConfig {
    /// Tokens the decoder may generate after its start token.
    pub fn max_new_tokens(&self) -> usize {
        self.max_summary_tokens.saturating_sub(1).max(1)
    }

    /// Derive generation parameters from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_input_tokens: config.max_input_tokens,
            max_summary_tokens: config.summary_max_tokens,
            num_beams: config.num_beams,
            temperature: config.temperature,
            length_penalty: 1.0,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Pretrained seq2seq summarizer shared by every request.
#[derive(Clone)]
pub struct LocalSummarizer {
    state: Arc<ModelState>,
}

struct ModelState {
    tokenizer: Tokenizer,
    model: Mutex<t5::T5ForConditionalGeneration>,
    device: Device,
    generation: GenerationConfig,
    decoder_start_token: u32,
    eos_token: u32,
}

impl LocalSummarizer {
    /// Load tokenizer, config, and weights from `model_dir` onto the CPU.
    pub fn load(model_dir: &Path, generation: GenerationConfig) -> Result<Self, ModelLoadError> {
        let config_path = model_dir.join(CONFIG_FILE);
        let raw_config =
            std::fs::read_to_string(&config_path).map_err(|source| ModelLoadError::Io {
                path: config_path.clone(),
                source,
            })?;
        let mut model_config: t5::Config = serde_json::from_str(&raw_config)?;
        // Beam search re-feeds whole prefixes per hypothesis; a shared KV cache would mix beams.
        model_config.use_cache = false;

        let tokenizer = Tokenizer::from_file(model_dir.join(TOKENIZER_FILE))
            .map_err(|err| ModelLoadError::Tokenizer(anyhow::anyhow!(err)))?;

        let weights = model_dir.join(WEIGHTS_FILE);
        if !weights.exists() {
            return Err(ModelLoadError::Io {
                path: weights,
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let device = Device::Cpu;
        // SAFETY: the weights file is mapped read-only and must not be modified while serving.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        let model = t5::T5ForConditionalGeneration::load(vb, &model_config)?;

        let decoder_start_token = model_config
            .decoder_start_token_id
            .unwrap_or(model_config.pad_token_id) as u32;
        let eos_token = model_config.eos_token_id as u32;

        tracing::info!(
            model_dir = %model_dir.display(),
            vocab_size = model_config.vocab_size,
            num_beams = generation.num_beams,
            max_summary_tokens = generation.max_summary_tokens,
            temperature = generation.temperature,
            "Loaded summarization model (temperature is inert under beam search)"
        );

        Ok(Self {
            state: Arc::new(ModelState {
                tokenizer,
                model: Mutex::new(model),
                device,
                generation,
                decoder_start_token,
                eos_token,
            }),
        })
    }

    /// Tokenizer shared with the chunker so chunk budgets use the model vocabulary.
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.state.tokenizer
    }

    /// Generate one summary for `chunk` on the blocking pool.
    pub async fn summarize(&self, chunk: String) -> Result<String, SummarizationError> {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || state.generate(&chunk))
            .await
            .map_err(|err| SummarizationError::Task(err.to_string()))?
    }
}

impl ModelState {
    fn generate(&self, chunk: &str) -> Result<String, SummarizationError> {
        let input_ids = self.encode_input(chunk)?;
        let params = BeamSearchParams {
            num_beams: self.generation.num_beams,
            max_new_tokens: self.generation.max_new_tokens(),
            length_penalty: self.generation.length_penalty,
            start_token: self.decoder_start_token,
            eos_token: self.eos_token,
        };

        let mut model = self
            .model
            .lock()
            .map_err(|_| SummarizationError::ModelPoisoned)?;
        let input = Tensor::new(input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = model.encode(&input)?;

        let output_ids = beam_search(&params, |prefix: &[u32]| {
            let decoder_input = Tensor::new(prefix, &self.device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_input, &encoder_output)?;
            let logits = logits.squeeze(0)?.to_dtype(DType::F32)?;
            candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec1::<f32>()
        })?;
        drop(model);

        let summary = self
            .tokenizer
            .decode(&output_ids, true)
            .map_err(|err| SummarizationError::Tokenizer(err.to_string()))?;
        Ok(summary.trim().to_string())
    }

    fn encode_input(&self, chunk: &str) -> Result<Vec<u32>, SummarizationError> {
        let encoding = self
            .tokenizer
            .encode(chunk, true)
            .map_err(|err| SummarizationError::Tokenizer(err.to_string()))?;
        let ids = truncate_input(
            encoding.get_ids().to_vec(),
            self.generation.max_input_tokens,
            self.eos_token,
        );
        Ok(ids)
    }
}

/// Cap encoder input at `max_tokens`, keeping a trailing end-of-sequence marker in place.
fn truncate_input(mut ids: Vec<u32>, max_tokens: usize, eos_token: u32) -> Vec<u32> {
    if ids.is_empty() {
        ids.push(eos_token);
        return ids;
    }
    if ids.len() > max_tokens {
        let had_eos = ids.last() == Some(&eos_token);
        ids.truncate(max_tokens.max(1));
        if had_eos && let Some(last) = ids.last_mut() {
            *last = eos_token;
        }
    }
    ids
}
