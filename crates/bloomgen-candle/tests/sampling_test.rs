use bloomgen_candle::{CandleError, CandleGenerator, CausalLm, SamplingEngine, SpecialTokens};
use bloomgen_core::{CancellationFlag, CoreError, GenerationParams, GenerationRequest, Generator};
use candle_core::{Device, Tensor};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;

const VOCAB: [&str; 8] = ["<unk>", "<s>", "</s>", "<pad>", "hola", "mundo", "rust", "texto"];
const BOS: u32 = 1;
const EOS: u32 = 2;
const RUST: u32 = 6;

fn word_tokenizer() -> Tokenizer {
    let vocab = VOCAB
        .iter()
        .enumerate()
        .map(|(id, word)| format!("\"{}\": {}", word, id))
        .collect::<Vec<_>>()
        .join(", ");
    let added = VOCAB[..4]
        .iter()
        .enumerate()
        .map(|(id, word)| {
            format!(
                r#"{{"id": {}, "content": "{}", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}}"#,
                id, word
            )
        })
        .collect::<Vec<_>>()
        .join(", ");
    let json = format!(
        r#"{{
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [{added}],
            "normalizer": null,
            "pre_tokenizer": {{"type": "Whitespace"}},
            "post_processor": null,
            "decoder": null,
            "model": {{"type": "WordLevel", "vocab": {{{vocab}}}, "unk_token": "<unk>"}}
        }}"#
    );
    Tokenizer::from_str(&json).unwrap()
}

/// Returns the same logits every step and records (window length, offset)
struct ScriptedLm {
    logits: Vec<f32>,
    calls: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl CausalLm for ScriptedLm {
    fn forward(&mut self, input_ids: &Tensor, seqlen_offset: usize) -> Result<Tensor, CandleError> {
        let (_, seq_len) = input_ids.dims2()?;
        self.calls.lock().unwrap().push((seq_len, seqlen_offset));
        Ok(Tensor::from_slice(&self.logits, (1, self.logits.len()), &Device::Cpu)?)
    }

    fn clear_kv_cache(&mut self) {}
}

fn engine_with(logits: Vec<f32>) -> (SamplingEngine<ScriptedLm>, Arc<Mutex<Vec<(usize, usize)>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let model = ScriptedLm {
        logits,
        calls: Arc::clone(&calls),
    };
    let engine = SamplingEngine::new(
        model,
        word_tokenizer(),
        Device::Cpu,
        SpecialTokens { bos: BOS, eos: EOS },
    );
    (engine, calls)
}

/// Flat over the words, never EOS
fn flat_logits() -> Vec<f32> {
    let mut logits = vec![0.0; VOCAB.len()];
    logits[EOS as usize] = -1e9;
    logits
}

fn favouring(token: u32) -> Vec<f32> {
    let mut logits = flat_logits();
    logits[token as usize] = 10.0;
    logits
}

#[test]
fn test_returns_requested_number_of_completions() {
    let (engine, _) = engine_with(vec![0.0; VOCAB.len()]);
    let params = GenerationParams::default()
        .with_max_length(12)
        .with_num_return_sequences(4);

    let completions = engine
        .generate("hola mundo", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(completions.len(), 4);
    for text in &completions {
        assert!(text.starts_with("hola mundo"), "{text}");
    }
}

#[test]
fn test_special_tokens_are_stripped() {
    let (engine, _) = engine_with(favouring(EOS));
    let params = GenerationParams::default().with_num_return_sequences(5);

    let completions = engine
        .generate("hola", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(completions.len(), 5);
    for text in &completions {
        assert!(!text.contains("</s>"), "{text}");
        assert!(!text.contains("<s>"), "{text}");
    }
}

#[test]
fn test_empty_prompt_is_seeded_with_bos() {
    let (engine, calls) = engine_with(flat_logits());
    let params = GenerationParams::default()
        .with_max_length(4)
        .with_num_return_sequences(3);

    let completions = engine
        .generate("", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(completions.len(), 3);
    assert_eq!(calls.lock().unwrap()[0], (1, 0));
    assert_eq!(engine.encode_prompt("", 4).unwrap(), vec![BOS]);
}

#[test]
fn test_fixed_seed_is_reproducible() {
    let (engine, _) = engine_with(flat_logits());
    let params = GenerationParams::default()
        .with_max_length(20)
        .with_num_return_sequences(2)
        .with_seed(Some(42));

    let cancel = CancellationFlag::new();
    let first = engine.generate("texto", &params, &cancel).unwrap();
    let second = engine.generate("texto", &params, &cancel).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_greedy_fills_token_budget() {
    let (engine, calls) = engine_with(favouring(RUST));
    let params = GenerationParams::default()
        .with_max_length(5)
        .with_temperature(0.0);

    let completions = engine
        .generate("hola", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(completions, vec!["hola rust rust rust rust"]);

    // Prompt once, then one new token per step on top of the cache.
    let calls = calls.lock().unwrap();
    assert_eq!(*calls, vec![(1, 0), (1, 1), (1, 2), (1, 3)]);
}

#[test]
fn test_prompt_is_truncated_to_max_length() {
    let (engine, calls) = engine_with(favouring(RUST));
    let params = GenerationParams::default()
        .with_max_length(2)
        .with_temperature(0.0);

    let completions = engine
        .generate("hola mundo rust texto", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(completions, vec!["hola mundo"]);
    assert!(calls.lock().unwrap().is_empty());
}

#[test]
fn test_stops_at_eos() {
    let (engine, _) = engine_with(favouring(EOS));
    let params = GenerationParams::default()
        .with_max_length(50)
        .with_temperature(0.0);

    let tokens_after_prompt = engine
        .generate("hola mundo", &params, &CancellationFlag::new())
        .unwrap();
    assert_eq!(tokens_after_prompt, vec!["hola mundo"]);
}

#[tokio::test]
async fn test_generator_rejects_invalid_params() {
    let (engine, calls) = engine_with(flat_logits());
    let generator = CandleGenerator::from_engine("scripted", engine);
    let params = GenerationParams::default().with_num_return_sequences(0);

    let err = generator
        .generate(GenerationRequest::with_params("hola", params))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRequest(_)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generator_honours_cancellation() {
    let (engine, _) = engine_with(flat_logits());
    let generator = CandleGenerator::from_engine("scripted", engine);

    let request = GenerationRequest::simple("hola");
    request.cancel.cancel();

    let err = generator.generate(request).await.unwrap_err();
    assert!(matches!(err, CoreError::Cancelled));
}

#[tokio::test]
async fn test_generator_returns_completion_set() {
    let (engine, _) = engine_with(flat_logits());
    let generator = CandleGenerator::from_engine("scripted", engine);
    let params = GenerationParams::default()
        .with_max_length(8)
        .with_num_return_sequences(3)
        .with_seed(Some(7));

    let request = GenerationRequest::with_params("hola", params.clone());
    let id = request.id.clone();
    let set = generator.generate(request).await.unwrap();
    assert_eq!(set.request_id, id);
    assert_eq!(set.len(), 3);

    let again = generator
        .generate(GenerationRequest::with_params("hola", params))
        .await
        .unwrap();
    assert_eq!(set.completions, again.completions);
    assert_eq!(
        generator.metadata().name.as_deref(),
        Some("scripted")
    );
}

/// Sets the cancel flag while serving the `cancel_on`-th forward call
struct CancellingLm {
    inner: ScriptedLm,
    cancel: CancellationFlag,
    cancel_on: usize,
    seen: usize,
}

impl CausalLm for CancellingLm {
    fn forward(&mut self, input_ids: &Tensor, seqlen_offset: usize) -> Result<Tensor, CandleError> {
        self.seen += 1;
        if self.seen == self.cancel_on {
            self.cancel.cancel();
        }
        self.inner.forward(input_ids, seqlen_offset)
    }

    fn clear_kv_cache(&mut self) {}
}

fn cancelling_engine(cancel: &CancellationFlag, cancel_on: usize) -> SamplingEngine<CancellingLm> {
    let model = CancellingLm {
        inner: ScriptedLm {
            logits: favouring(RUST),
            calls: Arc::new(Mutex::new(Vec::new())),
        },
        cancel: cancel.clone(),
        cancel_on,
        seen: 0,
    };
    SamplingEngine::new(
        model,
        word_tokenizer(),
        Device::Cpu,
        SpecialTokens { bos: BOS, eos: EOS },
    )
}

#[test]
fn test_cancel_after_last_token_keeps_sequence() {
    let cancel = CancellationFlag::new();
    // "hola" plus two sampled tokens: the second forward call is the last one.
    let engine = cancelling_engine(&cancel, 2);
    let params = GenerationParams::default()
        .with_max_length(3)
        .with_temperature(0.0);

    let completions = engine.generate("hola", &params, &cancel).unwrap();
    assert_eq!(completions, vec!["hola rust rust"]);
    assert!(cancel.is_cancelled());
}

#[test]
fn test_cancel_mid_sequence_stops_sampling() {
    let cancel = CancellationFlag::new();
    let engine = cancelling_engine(&cancel, 1);
    let params = GenerationParams::default()
        .with_max_length(5)
        .with_temperature(0.0);

    let err = engine.generate("hola", &params, &cancel).unwrap_err();
    assert!(matches!(err, bloomgen_candle::sampling::SamplingError::Cancelled));
}
