//! Autoregressive sampling loop
//!
//! Encodes a prompt, feeds it through a [`CausalLm`] and draws successor
//! tokens with temperature-scaled top-k sampling until the token budget is
//! spent or the end-of-sequence token appears.

use bloomgen_core::{CancellationFlag, CoreError, GenerationParams};
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationDirection};

use crate::{Bloom, CandleError};

/// A model that maps a token window to next-token logits
pub trait CausalLm: Send {
    /// Logits of the last position, shape (batch, vocab)
    fn forward(&mut self, input_ids: &Tensor, seqlen_offset: usize) -> Result<Tensor, CandleError>;

    /// Forget all cached positions
    fn clear_kv_cache(&mut self);
}

impl CausalLm for Bloom {
    fn forward(&mut self, input_ids: &Tensor, seqlen_offset: usize) -> Result<Tensor, CandleError> {
        Bloom::forward(self, input_ids, seqlen_offset)
    }

    fn clear_kv_cache(&mut self) {
        Bloom::clear_kv_cache(self)
    }
}

/// Special token ids the loop needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    /// Seeds the context when the prompt encodes to nothing
    pub bos: u32,
    pub eos: u32,
}

/// Why a sampling run ended early
#[derive(Debug)]
pub enum SamplingError {
    Backend(CandleError),
    Cancelled,
}

impl From<CandleError> for SamplingError {
    fn from(err: CandleError) -> Self {
        SamplingError::Backend(err)
    }
}

impl From<candle_core::Error> for SamplingError {
    fn from(err: candle_core::Error) -> Self {
        SamplingError::Backend(CandleError::Candle(err))
    }
}

impl From<SamplingError> for CoreError {
    fn from(err: SamplingError) -> Self {
        match err {
            SamplingError::Backend(e) => e.into(),
            SamplingError::Cancelled => CoreError::Cancelled,
        }
    }
}

/// Map request parameters onto candle's sampling strategies
pub fn sampling_for(params: &GenerationParams) -> Sampling {
    let temperature = params.temperature;
    if temperature <= 0.0 {
        Sampling::ArgMax
    } else if params.top_k == 0 {
        Sampling::All { temperature }
    } else {
        Sampling::TopK {
            k: params.top_k,
            temperature,
        }
    }
}

/// Owns a model and its tokenizer and runs blocking generation
pub struct SamplingEngine<M: CausalLm> {
    model: Mutex<M>,
    tokenizer: Tokenizer,
    device: Device,
    special: SpecialTokens,
}

impl<M: CausalLm> SamplingEngine<M> {
    pub fn new(model: M, tokenizer: Tokenizer, device: Device, special: SpecialTokens) -> Self {
        Self {
            model: Mutex::new(model),
            tokenizer,
            device,
            special,
        }
    }

    /// Encode `prompt`, keeping at most `max_length` real tokens
    pub fn encode_prompt(&self, prompt: &str, max_length: usize) -> Result<Vec<u32>, CandleError> {
        let mut encoding = self.tokenizer.encode(prompt, true)?;
        encoding.truncate(max_length, 0, TruncationDirection::Right);

        let mut ids: Vec<u32> = encoding
            .get_ids()
            .iter()
            .zip(encoding.get_attention_mask())
            .filter(|&(_, &mask)| mask == 1)
            .map(|(&id, _)| id)
            .collect();

        if ids.is_empty() {
            ids.push(self.special.bos);
        }
        Ok(ids)
    }

    /// Sample `params.num_return_sequences` completions for `prompt`.
    ///
    /// Each completion is the decoded prompt plus its continuation, with
    /// special tokens removed.
    pub fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        cancel: &CancellationFlag,
    ) -> Result<Vec<String>, SamplingError> {
        let prompt_ids = self.encode_prompt(prompt, params.max_length)?;
        let seed = params.seed.unwrap_or_else(rand::random::<u64>);
        let mut logits_processor = LogitsProcessor::from_sampling(seed, sampling_for(params));

        let mut model = self
            .model
            .lock()
            .map_err(|_| CandleError::Other("model mutex poisoned".to_string()))?;

        tracing::debug!(
            prompt_tokens = prompt_ids.len(),
            max_length = params.max_length,
            sequences = params.num_return_sequences,
            seed,
            "sampling"
        );

        let mut completions = Vec::with_capacity(params.num_return_sequences);
        for sequence in 0..params.num_return_sequences {
            let tokens = self.sample_sequence(
                &mut *model,
                &prompt_ids,
                params.max_length,
                &mut logits_processor,
                cancel,
            )?;
            tracing::trace!(sequence, tokens = tokens.len(), "sequence finished");

            let text = self
                .tokenizer
                .decode(&tokens, true)
                .map_err(CandleError::Tokenizer)?;
            completions.push(text);
        }
        Ok(completions)
    }

    fn sample_sequence(
        &self,
        model: &mut M,
        prompt_ids: &[u32],
        max_length: usize,
        logits_processor: &mut LogitsProcessor,
        cancel: &CancellationFlag,
    ) -> Result<Vec<u32>, SamplingError> {
        model.clear_kv_cache();

        let mut tokens = prompt_ids.to_vec();
        let mut index_pos = 0;
        while tokens.len() < max_length {
            if cancel.is_cancelled() {
                return Err(SamplingError::Cancelled);
            }

            let ctxt = &tokens[index_pos..];
            let input = Tensor::new(ctxt, &self.device)?.unsqueeze(0)?;
            let logits = model.forward(&input, index_pos)?.squeeze(0)?;
            index_pos += ctxt.len();

            let next_token = logits_processor.sample(&logits)?;
            tokens.push(next_token);
            if next_token == self.special.eos {
                break;
            }
        }
        Ok(tokens)
    }
}
