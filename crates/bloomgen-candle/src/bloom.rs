//! BLOOM decoder implementation
//!
//! Fused QKV attention with ALiBi position biases, LayerNorm blocks with a
//! tanh-GeLU MLP, and an LM head tied to the word embeddings. Keys and values
//! of processed positions are kept per block so each sampling step only runs
//! the newest token.

use candle_core::{D, DType, Device, Module, Tensor};
use candle_nn::{Embedding, LayerNorm, Linear, VarBuilder, embedding, layer_norm, linear};
use serde::Deserialize;

use crate::CandleError;

/// Configuration for BLOOM
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub n_layer: usize,
    pub n_head: usize,
    pub layer_norm_epsilon: f64,
    pub apply_residual_connection_post_layernorm: bool,
    pub bos_token_id: u32,
    pub eos_token_id: u32,
    pub pad_token_id: Option<u32>,
}

/// `config.json` as published on the hub. Older checkpoints spell the hidden
/// size `n_embed`.
#[derive(Debug, Deserialize)]
struct RawConfig {
    vocab_size: usize,
    hidden_size: Option<usize>,
    n_embed: Option<usize>,
    #[serde(alias = "num_hidden_layers")]
    n_layer: usize,
    #[serde(alias = "num_attention_heads")]
    n_head: usize,
    #[serde(default = "default_layer_norm_epsilon")]
    layer_norm_epsilon: f64,
    #[serde(default)]
    apply_residual_connection_post_layernorm: bool,
    #[serde(default = "default_bos_token_id")]
    bos_token_id: u32,
    #[serde(default = "default_eos_token_id")]
    eos_token_id: u32,
    pad_token_id: Option<u32>,
}

fn default_layer_norm_epsilon() -> f64 {
    1e-5
}

fn default_bos_token_id() -> u32 {
    1
}

fn default_eos_token_id() -> u32 {
    2
}

impl Config {
    /// bigscience/bloom-560m
    pub fn bloom_560m() -> Self {
        Self {
            vocab_size: 250880,
            hidden_size: 1024,
            n_layer: 24,
            n_head: 16,
            layer_norm_epsilon: 1e-5,
            apply_residual_connection_post_layernorm: false,
            bos_token_id: 1,
            eos_token_id: 2,
            pad_token_id: Some(3),
        }
    }

    /// Parse a hub `config.json`
    pub fn from_json(json: &str) -> Result<Self, CandleError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| CandleError::Config(e.to_string()))?;
        let hidden_size = raw
            .hidden_size
            .or(raw.n_embed)
            .ok_or_else(|| CandleError::Config("missing hidden_size / n_embed".to_string()))?;

        let config = Self {
            vocab_size: raw.vocab_size,
            hidden_size,
            n_layer: raw.n_layer,
            n_head: raw.n_head,
            layer_norm_epsilon: raw.layer_norm_epsilon,
            apply_residual_connection_post_layernorm: raw
                .apply_residual_connection_post_layernorm,
            bos_token_id: raw.bos_token_id,
            eos_token_id: raw.eos_token_id,
            pad_token_id: raw.pad_token_id,
        };
        config.check()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, CandleError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn head_dim(&self) -> usize {
        self.hidden_size / self.n_head
    }

    fn check(&self) -> Result<(), CandleError> {
        if self.n_head == 0 || self.hidden_size % self.n_head != 0 {
            return Err(CandleError::Config(format!(
                "hidden_size {} is not divisible by n_head {}",
                self.hidden_size, self.n_head
            )));
        }
        Ok(())
    }
}

/// Per-head ALiBi slopes.
///
/// Heads up to the closest power of two get the geometric sequence
/// `base^1..base^n`; the remaining heads take the odd powers of the sequence
/// for twice that many heads.
pub fn alibi_slopes(n_head: usize) -> Vec<f32> {
    if n_head == 0 {
        return Vec::new();
    }
    let closest_power_of_2 = 1usize << n_head.ilog2();
    let geometric = |n: usize| {
        let base = 2f64.powf(-(2f64.powf(-((n as f64).log2() - 3.0))));
        move |power: usize| base.powi(power as i32) as f32
    };

    let mut slopes: Vec<f32> = (1..=closest_power_of_2)
        .map(geometric(closest_power_of_2))
        .collect();

    if closest_power_of_2 != n_head {
        let remaining = closest_power_of_2.min(n_head - closest_power_of_2);
        slopes.extend(
            (1..=2 * remaining)
                .step_by(2)
                .map(geometric(2 * closest_power_of_2)),
        );
    }
    slopes
}

/// Masked fill operation
fn masked_fill(on_false: &Tensor, mask: &Tensor, on_true: f32) -> candle_core::Result<Tensor> {
    let shape = mask.shape();
    let on_true = Tensor::new(on_true, on_false.device())?.broadcast_as(shape.dims())?;
    mask.where_cond(&on_true, on_false)
}

/// Causal mask for `seq_len` new queries attending over `offset + seq_len` keys
fn causal_mask(seq_len: usize, offset: usize, device: &Device) -> candle_core::Result<Tensor> {
    let kv_len = offset + seq_len;
    let mask: Vec<u8> = (0..seq_len)
        .flat_map(|i| (0..kv_len).map(move |j| u8::from(j > i + offset)))
        .collect();
    Tensor::from_slice(&mask, (seq_len, kv_len), device)
}

struct Attention {
    query_key_value: Linear,
    dense: Linear,
    n_head: usize,
    head_dim: usize,
    kv_cache: Option<(Tensor, Tensor)>,
}

impl Attention {
    fn load(vb: VarBuilder, cfg: &Config) -> Result<Self, CandleError> {
        let hidden = cfg.hidden_size;
        Ok(Self {
            query_key_value: linear(hidden, 3 * hidden, vb.pp("query_key_value"))?,
            dense: linear(hidden, hidden, vb.pp("dense"))?,
            n_head: cfg.n_head,
            head_dim: cfg.head_dim(),
            kv_cache: None,
        })
    }

    fn forward(
        &mut self,
        xs: &Tensor,
        alibi: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor, CandleError> {
        let (b_sz, seq_len, hidden_size) = xs.dims3()?;

        // The fused projection is laid out per head as [q | k | v].
        let fused = self
            .query_key_value
            .forward(xs)?
            .reshape((b_sz, seq_len, self.n_head, 3, self.head_dim))?;
        let split = |idx: usize| -> candle_core::Result<Tensor> {
            fused
                .narrow(3, idx, 1)?
                .squeeze(3)?
                .transpose(1, 2)?
                .contiguous()
        };
        let q = split(0)?;
        let mut k = split(1)?;
        let mut v = split(2)?;

        if let Some((cache_k, cache_v)) = &self.kv_cache {
            k = Tensor::cat(&[cache_k, &k], 2)?.contiguous()?;
            v = Tensor::cat(&[cache_v, &v], 2)?.contiguous()?;
        }
        self.kv_cache = Some((k.clone(), v.clone()));

        let in_dtype = q.dtype();
        let q = q.to_dtype(DType::F32)?;
        let k = k.to_dtype(DType::F32)?;
        let v = v.to_dtype(DType::F32)?;

        let scale = 1.0 / (self.head_dim as f64).sqrt();
        let att = (q.matmul(&k.t()?.contiguous()?)? * scale)?;
        let att = att.broadcast_add(alibi)?;
        let att = match mask {
            Some(mask) => masked_fill(&att, &mask.broadcast_as(att.shape())?, f32::NEG_INFINITY)?,
            None => att,
        };

        let att = candle_nn::ops::softmax(&att, D::Minus1)?;
        let y = att.matmul(&v)?.to_dtype(in_dtype)?;
        let y = y.transpose(1, 2)?.reshape((b_sz, seq_len, hidden_size))?;
        Ok(self.dense.forward(&y)?)
    }
}

struct Mlp {
    dense_h_to_4h: Linear,
    dense_4h_to_h: Linear,
}

impl Mlp {
    fn load(vb: VarBuilder, cfg: &Config) -> Result<Self, CandleError> {
        let hidden = cfg.hidden_size;
        Ok(Self {
            dense_h_to_4h: linear(hidden, 4 * hidden, vb.pp("dense_h_to_4h"))?,
            dense_4h_to_h: linear(4 * hidden, hidden, vb.pp("dense_4h_to_h"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> Result<Tensor, CandleError> {
        // BLOOM's GeLU is the tanh approximation.
        let xs = self.dense_h_to_4h.forward(xs)?.gelu()?;
        Ok(self.dense_4h_to_h.forward(&xs)?)
    }
}

struct Block {
    input_layernorm: LayerNorm,
    self_attention: Attention,
    post_attention_layernorm: LayerNorm,
    mlp: Mlp,
    residual_post_layernorm: bool,
}

impl Block {
    fn load(vb: VarBuilder, cfg: &Config) -> Result<Self, CandleError> {
        let eps = cfg.layer_norm_epsilon;
        Ok(Self {
            input_layernorm: layer_norm(cfg.hidden_size, eps, vb.pp("input_layernorm"))?,
            self_attention: Attention::load(vb.pp("self_attention"), cfg)?,
            post_attention_layernorm: layer_norm(
                cfg.hidden_size,
                eps,
                vb.pp("post_attention_layernorm"),
            )?,
            mlp: Mlp::load(vb.pp("mlp"), cfg)?,
            residual_post_layernorm: cfg.apply_residual_connection_post_layernorm,
        })
    }

    fn forward(
        &mut self,
        xs: &Tensor,
        alibi: &Tensor,
        mask: Option<&Tensor>,
    ) -> Result<Tensor, CandleError> {
        let normed = self.input_layernorm.forward(xs)?;
        let residual = if self.residual_post_layernorm {
            &normed
        } else {
            xs
        };
        let attn = (self.self_attention.forward(&normed, alibi, mask)? + residual)?;

        let normed = self.post_attention_layernorm.forward(&attn)?;
        let residual = if self.residual_post_layernorm {
            &normed
        } else {
            &attn
        };
        Ok((self.mlp.forward(&normed)? + residual)?)
    }
}

/// BLOOM causal language model
pub struct Bloom {
    word_embeddings: Embedding,
    word_embeddings_layernorm: LayerNorm,
    blocks: Vec<Block>,
    ln_f: LayerNorm,
    lm_head: Linear,
    slopes: Tensor,
    config: Config,
    device: Device,
}

impl Bloom {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self, CandleError> {
        config.check()?;

        // Checkpoints saved from the causal-LM wrapper nest everything under
        // `transformer.`; bare model exports do not.
        let vb = if vb.contains_tensor("transformer.word_embeddings.weight") {
            vb.pp("transformer")
        } else {
            vb
        };
        let device = vb.device().clone();
        let eps = config.layer_norm_epsilon;

        let word_embeddings = embedding(
            config.vocab_size,
            config.hidden_size,
            vb.pp("word_embeddings"),
        )?;
        let word_embeddings_layernorm = layer_norm(
            config.hidden_size,
            eps,
            vb.pp("word_embeddings_layernorm"),
        )?;

        let mut blocks = Vec::with_capacity(config.n_layer);
        for idx in 0..config.n_layer {
            tracing::trace!("loading block {}/{}", idx + 1, config.n_layer);
            blocks.push(Block::load(vb.pp(format!("h.{idx}")), config)?);
        }
        let ln_f = layer_norm(config.hidden_size, eps, vb.pp("ln_f"))?;

        let lm_head = Linear::new(word_embeddings.embeddings().clone(), None);

        let slopes = alibi_slopes(config.n_head);
        let slopes = Tensor::from_vec(slopes, (config.n_head, 1, 1), &device)?;

        Ok(Self {
            word_embeddings,
            word_embeddings_layernorm,
            blocks,
            ln_f,
            lm_head,
            slopes,
            config: config.clone(),
            device,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// ALiBi bias of shape (n_head, 1, kv_len)
    fn alibi(&self, kv_len: usize) -> candle_core::Result<Tensor> {
        let positions = Tensor::arange(0u32, kv_len as u32, &self.device)?
            .to_dtype(DType::F32)?
            .reshape((1, 1, kv_len))?;
        self.slopes.broadcast_mul(&positions)
    }

    /// Run `input_ids` (batch, seq) whose first token sits at `seqlen_offset`
    /// and return the logits of the last position, shape (batch, vocab).
    pub fn forward(
        &mut self,
        input_ids: &Tensor,
        seqlen_offset: usize,
    ) -> Result<Tensor, CandleError> {
        let (_b_sz, seq_len) = input_ids.dims2()?;
        let kv_len = seqlen_offset + seq_len;

        let alibi = self.alibi(kv_len)?;
        let mask = if seq_len > 1 {
            Some(causal_mask(seq_len, seqlen_offset, &self.device)?)
        } else {
            None
        };

        let xs = self.word_embeddings.forward(input_ids)?;
        let mut xs = self.word_embeddings_layernorm.forward(&xs)?;
        for block in self.blocks.iter_mut() {
            xs = block.forward(&xs, &alibi, mask.as_ref())?;
        }

        let xs = self.ln_f.forward(&xs.narrow(1, seq_len - 1, 1)?)?;
        let logits = self.lm_head.forward(&xs)?.squeeze(1)?;
        Ok(logits.to_dtype(DType::F32)?)
    }

    pub fn clear_kv_cache(&mut self) {
        for block in self.blocks.iter_mut() {
            block.self_attention.kv_cache = None;
        }
    }
}
