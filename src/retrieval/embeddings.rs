//! Local sentence embeddings with candle.

use crate::error::{Result, RfpError};
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use tokenizers::{Tokenizer, TruncationParams};

/// Multilingual MiniLM; handles Korean text.
pub const DEFAULT_EMBEDDING_MODEL: &str =
    "sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2";

/// Position embeddings of BERT-style models stop at 512.
const MAX_TOKENS: usize = 512;

fn model_error(context: &str, err: impl std::fmt::Display) -> RfpError {
    RfpError::Retrieval(format!("{}: {}", context, err))
}

/// BERT sentence-transformer with mean pooling.
pub struct EmbeddingModel {
    model_id: String,
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl EmbeddingModel {
    /// Load the default multilingual model.
    pub fn load_default() -> Result<Self> {
        Self::load(DEFAULT_EMBEDDING_MODEL)
    }

    /// Load a sentence-transformers model from the Hugging Face Hub.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| model_error("Failed to create HF Hub API", e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| model_error("Failed to get config.json", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| model_error("Failed to get tokenizer.json", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| model_error("Failed to get model weights", e))?;

        let raw_config =
            std::fs::read_to_string(&config_path).map_err(|e| RfpError::io(&config_path, e))?;
        let config: BertConfig =
            serde_json::from_str(&raw_config).map_err(|e| model_error("Failed to parse config", e))?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| model_error("Failed to load tokenizer", e))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| model_error("Failed to configure truncation", e))?;

        // SAFETY: the weights file is owned by the hub cache and not modified while mapped.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| model_error("Failed to load model weights", e))?
        };
        let model = BertModel::load(vb, &config).map_err(|e| model_error("Failed to load BERT model", e))?;

        tracing::info!(model = model_id, dimension = config.hidden_size, "loaded embedding model");

        Ok(Self {
            model_id: model_id.to_string(),
            model,
            tokenizer,
            device,
            dimension: config.hidden_size,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed a single text.
    pub fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| RfpError::Retrieval("Embedding model returned no vector".to_string()))
    }

    /// Embed a batch of texts; vectors are L2-normalized.
    pub fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.forward(texts)
            .map_err(|e| model_error("Embedding failed", e))
    }

    fn forward(&self, texts: &[&str]) -> std::result::Result<Vec<Vec<f32>>, Box<dyn std::error::Error + Send + Sync>> {
        let encodings = self.tokenizer.encode_batch(texts.to_vec(), true)?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * max_len);
        let mut attention_mask = Vec::with_capacity(texts.len() * max_len);

        for encoding in &encodings {
            let mut ids = encoding.get_ids().to_vec();
            let mut mask = encoding.get_attention_mask().to_vec();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            input_ids.extend(ids);
            attention_mask.extend(mask);
        }

        let shape = (texts.len(), max_len);
        let input_ids = Tensor::from_vec(input_ids, shape, &self.device)?;
        let attention_mask = Tensor::from_vec(attention_mask, shape, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        // Mean pooling over non-padding tokens.
        let mask = attention_mask
            .unsqueeze(2)?
            .to_dtype(output.dtype())?
            .broadcast_as(output.shape())?;
        let summed = (output * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        let pooled = (summed / counts)?;

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        Ok(normalized.to_vec2::<f32>()?)
    }
}

/// Cosine similarity; 0.0 for mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
