use anyhow::{Context, Result};
use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Encoder presets usable as `base_model_id` without a model directory
pub const PRESETS: [&str; 3] = ["bert-base-uncased", "bert-small", "bert-tiny"];

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct EncoderConfig {
    pub vocab_size:              usize,
    pub max_position_embeddings: usize,
    pub d_model:                 usize,
    pub num_heads:               usize,
    pub num_layers:              usize,
    pub d_ff:                    usize,
    #[config(default = 0.1)]
    pub dropout:                 f64,
}

impl EncoderConfig {
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "bert-base-uncased" => Some(Self::new(30522, 512, 768, 12, 12, 3072)),
            "bert-small"        => Some(Self::new(30522, 512, 512, 8, 4, 2048)),
            "bert-tiny"         => Some(Self::new(30522, 512, 128, 2, 2, 512)),
            _ => None,
        }
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Encoder<B> {
        let token_embedding    = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let position_embedding = EmbeddingConfig::new(self.max_position_embeddings, self.d_model).init(device);
        let layers: Vec<EncoderBlock<B>> = (0..self.num_layers)
            .map(|_| self.build_encoder_block(device))
            .collect();
        let final_norm = LayerNormConfig::new(self.d_model).init(device);
        let dropout    = DropoutConfig::new(self.dropout).init();
        Encoder {
            token_embedding, position_embedding, layers, final_norm, dropout,
            num_heads: self.num_heads,
            d_ff:      self.d_ff,
        }
    }

    fn build_encoder_block<B: Backend>(&self, device: &B::Device) -> EncoderBlock<B> {
        let self_attn   = MultiHeadAttentionConfig::new(self.d_model, self.num_heads)
            .with_dropout(self.dropout)
            .init(device);
        let ffn_linear1 = LinearConfig::new(self.d_model, self.d_ff).init(device);
        let ffn_linear2 = LinearConfig::new(self.d_ff, self.d_model).init(device);
        let norm1   = LayerNormConfig::new(self.d_model).init(device);
        let norm2   = LayerNormConfig::new(self.d_model).init(device);
        let dropout = DropoutConfig::new(self.dropout).init();
        EncoderBlock { self_attn, ffn_linear1, ffn_linear2, norm1, norm2, dropout }
    }
}

#[derive(Module, Debug)]
pub struct EncoderBlock<B: Backend> {
    pub self_attn:   MultiHeadAttention<B>,
    pub ffn_linear1: Linear<B>,
    pub ffn_linear2: Linear<B>,
    pub norm1:       LayerNorm<B>,
    pub norm2:       LayerNorm<B>,
    pub dropout:     Dropout,
}

impl<B: Backend> EncoderBlock<B> {
    /// `mask_pad` is true at padding positions
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn_input  = MhaInput::self_attn(x.clone()).mask_pad(mask_pad);
        let attn_output = self.self_attn.forward(attn_input).context;
        let x = self.norm1.forward(x + self.dropout.forward(attn_output));
        let ffn_out = self.ffn_linear2.forward(
            burn::tensor::activation::gelu(self.ffn_linear1.forward(x.clone()))
        );
        self.norm2.forward(x + self.dropout.forward(ffn_out))
    }
}

/// Shared transformer encoder
#[derive(Module, Debug)]
pub struct Encoder<B: Backend> {
    pub token_embedding:    Embedding<B>,
    pub position_embedding: Embedding<B>,
    pub layers:             Vec<EncoderBlock<B>>,
    pub final_norm:         LayerNorm<B>,
    pub dropout:            Dropout,
    pub num_heads:          usize,
    pub d_ff:               usize,
}

impl<B: Backend> Encoder<B> {
    /// input_ids, attention_mask: [batch, seq_len] → hidden: [batch, seq_len, d_model]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();

        let tok_emb = self.token_embedding.forward(input_ids);

        // Self-attention is permutation-invariant, so position must be injected explicitly.
        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &tok_emb.device())
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);
        let pos_emb = self.position_embedding.forward(positions);

        let mask_pad = attention_mask.equal_elem(0);

        let mut x = self.dropout.forward(tok_emb + pos_emb);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        self.final_norm.forward(x)
    }

    /// Rebuild the config this encoder was initialised from
    pub fn config(&self) -> EncoderConfig {
        let [vocab_size, d_model]   = self.token_embedding.weight.dims();
        let [max_position_embeddings, _] = self.position_embedding.weight.dims();
        EncoderConfig::new(
            vocab_size,
            max_position_embeddings,
            d_model,
            self.num_heads,
            self.layers.len(),
            self.d_ff,
        )
        .with_dropout(self.dropout.prob)
    }
}

#[derive(Config, Debug)]
pub struct ClassifierConfig {
    pub encoder:          EncoderConfig,
    pub num_browse_nodes: usize,
    pub num_brands:       usize,
}

impl ClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierModel<B> {
        self.init_with_encoder(self.encoder.init(device), device)
    }

    fn init_with_encoder<B: Backend>(&self, encoder: Encoder<B>, device: &B::Device) -> ClassifierModel<B> {
        let d_model = self.encoder.d_model;
        ClassifierModel {
            encoder,
            browse_node_head: LinearConfig::new(d_model, self.num_browse_nodes).init(device),
            brand_head:       LinearConfig::new(d_model, self.num_brands).init(device),
            dropout:          DropoutConfig::new(self.encoder.dropout).init(),
        }
    }
}

/// Encoder with two independent classification heads over the
/// first-token representation.
#[derive(Module, Debug)]
pub struct ClassifierModel<B: Backend> {
    pub encoder:          Encoder<B>,
    pub browse_node_head: Linear<B>,
    pub brand_head:       Linear<B>,
    pub dropout:          Dropout,
}

pub struct ClassifierOutput<B: Backend> {
    /// [batch, num_browse_nodes]
    pub browse_node_logits: Tensor<B, 2>,
    /// [batch, num_brands]
    pub brand_logits:       Tensor<B, 2>,
}

impl<B: Backend> ClassifierModel<B> {
    /// Build a classifier on top of the encoder named by `base_model_id`:
    /// a model directory (config.json, optional encoder weights) or a preset.
    pub fn from_pretrained(
        base_model_id:    &str,
        num_browse_nodes: usize,
        num_brands:       usize,
        device:           &B::Device,
    ) -> Result<Self> {
        let (encoder_cfg, weights) = resolve_encoder(base_model_id)?;
        let config  = ClassifierConfig::new(encoder_cfg, num_browse_nodes, num_brands);
        let encoder = config.encoder.init::<B>(device);

        let encoder = match weights {
            Some(path) => {
                let record = CompactRecorder::new()
                    .load(path.clone(), device)
                    .with_context(|| format!("Cannot load encoder weights '{}'", path.display()))?;
                tracing::info!("Loaded pretrained encoder from '{}'", path.display());
                encoder.load_record(record)
            }
            None => {
                tracing::warn!("No encoder weights for '{}', initialising from scratch", base_model_id);
                encoder
            }
        };

        Ok(config.init_with_encoder(encoder, device))
    }

    /// Same weights with every dropout layer set to `prob`.
    /// Dropout carries no parameters, so the record moves over unchanged.
    pub fn with_dropout(self, prob: f64, device: &B::Device) -> Self {
        let mut config = self.config();
        config.encoder.dropout = prob;
        config.init::<B>(device).load_record(self.into_record())
    }

    /// Write config.json, the full model record and the encoder record to `path`.
    pub fn save_pretrained(&self, path: impl AsRef<Path>) -> Result<()> {
        let dir = path.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        fs::write(dir.join("config.json"), serde_json::to_string_pretty(&self.config())?)
            .with_context(|| format!("Cannot write config to '{}'", dir.display()))?;

        let recorder = CompactRecorder::new();
        recorder
            .record(self.clone().into_record(), dir.join("model"))
            .with_context(|| format!("Failed to save model to '{}'", dir.display()))?;
        recorder
            .record(self.encoder.clone().into_record(), dir.join("encoder"))
            .with_context(|| format!("Failed to save encoder to '{}'", dir.display()))?;

        tracing::info!("Saved model to '{}'", dir.display());
        Ok(())
    }

    /// Rebuild a model written by `save_pretrained`.
    #[cfg(test)]
    pub fn load(path: impl AsRef<Path>, device: &B::Device) -> Result<Self> {
        let dir  = path.as_ref();
        let json = fs::read_to_string(dir.join("config.json"))
            .with_context(|| format!("Cannot read config from '{}'", dir.display()))?;
        let config: ClassifierConfig = serde_json::from_str(&json)?;

        let record = CompactRecorder::new()
            .load(dir.join("model"), device)
            .with_context(|| format!("Cannot load model from '{}'", dir.display()))?;
        Ok(config.init::<B>(device).load_record(record))
    }

    pub fn config(&self) -> ClassifierConfig {
        let [_, num_browse_nodes] = self.browse_node_head.weight.dims();
        let [_, num_brands]       = self.brand_head.weight.dims();
        ClassifierConfig::new(self.encoder.config(), num_browse_nodes, num_brands)
    }

    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> ClassifierOutput<B> {
        let hidden = self.encoder.forward(input_ids, attention_mask);
        let [batch_size, _, d_model] = hidden.dims();

        // Pool on the first ([CLS]) token
        let pooled = hidden
            .slice([0..batch_size, 0..1, 0..d_model])
            .reshape([batch_size, d_model]);
        let pooled = self.dropout.forward(pooled);

        ClassifierOutput {
            browse_node_logits: self.browse_node_head.forward(pooled.clone()),
            brand_logits:       self.brand_head.forward(pooled),
        }
    }
}

/// Find the encoder config for `base_model_id`, plus the path (without
/// extension) of its weights when the model directory has them.
pub fn resolve_encoder(base_model_id: &str) -> Result<(EncoderConfig, Option<PathBuf>)> {
    let dir         = Path::new(base_model_id);
    let config_path = dir.join("config.json");

    if config_path.exists() {
        let json  = fs::read_to_string(&config_path)
            .with_context(|| format!("Cannot read '{}'", config_path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&json)
            .with_context(|| format!("Invalid JSON in '{}'", config_path.display()))?;

        // A directory written by save_pretrained nests the encoder config
        let encoder_value = value.get("encoder").cloned().unwrap_or(value);
        let config: EncoderConfig = serde_json::from_value(encoder_value)
            .with_context(|| format!("'{}' is not an encoder config", config_path.display()))?;

        let weights = dir.join("encoder");
        let weights = dir.join("encoder.mpk.gz").exists().then_some(weights);
        return Ok((config, weights));
    }

    EncoderConfig::preset(base_model_id)
        .map(|config| (config, None))
        .ok_or_else(|| anyhow::anyhow!(
            "'{}' is neither a model directory with config.json nor a preset ({})",
            base_model_id,
            PRESETS.join(", ")
        ))
}
