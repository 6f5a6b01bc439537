use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array, Axis, Dimension, Ix2, Ix3};
use once_cell::sync::OnceCell;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Input, Session, SessionInputs};
use ort::tensor::TensorElementType;
use ort::value::{DynTensor, Tensor};
use ort::Error as OrtError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

pub const DEFAULT_DIMENSION: usize = 768;
pub const DEFAULT_MAX_LENGTH: usize = 512;
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub const MODEL_FILE_NAME: &str = "model.onnx";
pub const TOKENIZER_FILE_NAME: &str = "tokenizer.json";

pub const ENV_EMBEDDING_MODE: &str = "SEMEME_EMBEDDING_MODE";
pub const ENV_MODEL_DIR: &str = "SEMEME_MODEL_DIR";
pub const ENV_POOLING: &str = "SEMEME_POOLING";
pub const ENV_USE_CUDA: &str = "SEMEME_USE_CUDA";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMode {
    /// ONNX Runtime transformer encoder
    Onnx,
    /// Deterministic hash vectors, no model files needed
    Stub,
}

impl EmbeddingMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Stub => "stub",
        }
    }
}

impl FromStr for EmbeddingMode {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(Self::Onnx),
            "stub" => Ok(Self::Stub),
            other => Err(VectorStoreError::InvalidConfig(format!(
                "Unsupported embedding mode '{other}' (expected 'onnx' or 'stub')"
            ))),
        }
    }
}

impl fmt::Display for EmbeddingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How token representations collapse into one sentence vector
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Representation at the leading summary token
    #[default]
    Cls,
    /// Attention-masked mean over token positions
    Mean,
}

impl Pooling {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cls => "cls",
            Self::Mean => "mean",
        }
    }
}

impl FromStr for Pooling {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cls" => Ok(Self::Cls),
            "mean" => Ok(Self::Mean),
            other => Err(VectorStoreError::InvalidConfig(format!(
                "Unsupported pooling '{other}' (expected 'cls' or 'mean')"
            ))),
        }
    }
}

impl fmt::Display for Pooling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoder settings, read from the environment and overridable by callers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmbeddingConfig {
    pub mode: EmbeddingMode,
    /// Directory holding `model.onnx` and `tokenizer.json`
    pub model_dir: PathBuf,
    pub pooling: Pooling,
    pub max_length: usize,
    pub batch_size: usize,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: EmbeddingMode::Onnx,
            model_dir: PathBuf::from("models"),
            pooling: Pooling::Cls,
            max_length: DEFAULT_MAX_LENGTH,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension: DEFAULT_DIMENSION,
        }
    }
}

impl EmbeddingConfig {
    /// Stub configuration with the given dimension
    #[must_use]
    pub fn stub(dimension: usize) -> Self {
        Self {
            mode: EmbeddingMode::Stub,
            dimension,
            ..Self::default()
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from a variable lookup; unset variables keep their defaults
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_EMBEDDING_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(dir) = lookup(ENV_MODEL_DIR) {
            config.model_dir = PathBuf::from(dir);
        }
        if let Some(pooling) = lookup(ENV_POOLING) {
            config.pooling = pooling.parse()?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "batch_size must be greater than zero".into(),
            ));
        }
        if self.max_length == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "max_length must be greater than zero".into(),
            ));
        }
        if self.dimension == 0 {
            return Err(VectorStoreError::InvalidConfig(
                "dimension must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Text → unit-normalized vector
#[async_trait]
pub trait Encoder: Send + Sync {
    fn dimension(&self) -> usize;

    /// One vector per text, in input order
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn encode_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.encode(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("Empty embedding result".to_string()))
    }
}

struct OrtBackend {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
    batch_size: usize,
    dimension: usize,
}

#[derive(Clone, Debug)]
struct StubBackend {
    dimension: usize,
}

impl StubBackend {
    const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect()
    }
}

type BackendKey = (PathBuf, usize, usize, usize);

static BACKENDS: OnceCell<Mutex<HashMap<BackendKey, Arc<OrtBackend>>>> = OnceCell::new();

impl OrtBackend {
    fn new(config: &EmbeddingConfig) -> Result<Self> {
        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let model_path = config.model_dir.join(MODEL_FILE_NAME);
        let tokenizer_path = config.model_dir.join(TOKENIZER_FILE_NAME);
        if !model_path.exists() || !tokenizer_path.exists() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Model files are missing. Expected ONNX at {} and tokenizer at {}. Export the encoder into that directory (or set {ENV_MODEL_DIR}), or use {ENV_EMBEDDING_MODE}=stub.",
                model_path.display(),
                tokenizer_path.display(),
            )));
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VectorStoreError::EmbeddingError(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_length,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Tokenizer truncation failed: {e}"))
            })?;

        let providers = build_execution_providers()?;
        let (intra_threads, inter_threads) = default_ort_threads();
        let session = Session::builder()
            .map_err(|e| to_embedding_error(&e))?
            .with_intra_threads(intra_threads)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to set ORT intra threads: {e}"))
            })?
            .with_inter_threads(inter_threads)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to set ORT inter threads: {e}"))
            })?
            .with_execution_providers(providers)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!(
                    "Failed to register execution provider: {e}"
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&model_path)
            .map_err(|e| {
                VectorStoreError::EmbeddingError(format!("Failed to load ONNX model: {e}"))
            })?;

        log::info!(
            "Loaded ONNX encoder from {} (dim {}, max_length {}, batch {})",
            config.model_dir.display(),
            config.dimension,
            config.max_length,
            config.batch_size
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            max_length: config.max_length,
            batch_size: config.batch_size,
            dimension: config.dimension,
        })
    }

    fn shared(config: &EmbeddingConfig) -> Result<Arc<Self>> {
        let key = (
            config.model_dir.clone(),
            config.max_length,
            config.batch_size,
            config.dimension,
        );
        let cache = BACKENDS.get_or_init(|| Mutex::new(HashMap::new()));
        {
            let guard = cache.lock().map_err(|_| {
                VectorStoreError::EmbeddingError("Failed to lock backend cache".into())
            })?;
            if let Some(backend) = guard.get(&key) {
                return Ok(backend.clone());
            }
        }

        let backend = Arc::new(Self::new(config)?);
        let mut guard = cache
            .lock()
            .map_err(|_| VectorStoreError::EmbeddingError("Failed to lock backend cache".into()))?;
        Ok(guard.entry(key).or_insert(backend).clone())
    }

    fn embed_batch_blocking(&self, texts: &[String], pooling: Pooling) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let encodings = self
                .tokenizer
                .encode_batch(batch.to_vec(), true)
                .map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("Tokenization failed: {e}"))
                })?;

            let Some(first) = encodings.first() else {
                continue;
            };
            let seq_len = first.len();
            if seq_len > self.max_length {
                return Err(VectorStoreError::EmbeddingError(format!(
                    "Tokenized length {} exceeds max_length {}",
                    seq_len, self.max_length
                )));
            }
            if encodings.iter().any(|e| e.len() != seq_len) {
                return Err(VectorStoreError::EmbeddingError(
                    "Inconsistent sequence lengths after padding".to_string(),
                ));
            }
            let (ids, masks, type_ids, mask_rows) = build_flat_tensors(&encodings, seq_len);

            let ids_array = Array::from_shape_vec((batch.len(), seq_len), ids)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("IDs shape error: {e}")))?;
            let mask_array = Array::from_shape_vec((batch.len(), seq_len), masks)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Mask shape error: {e}")))?;
            let type_array = Array::from_shape_vec((batch.len(), seq_len), type_ids)
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Types shape error: {e}")))?;
            let ids_shape = ids_array.raw_dim().into_dyn();

            let ids_tensor = Tensor::from_array(ids_array.into_dyn())
                .map_err(|e| to_embedding_error(&e))?
                .upcast();
            let mask_tensor = Tensor::from_array(mask_array.into_dyn())
                .map_err(|e| to_embedding_error(&e))?
                .upcast();
            let type_tensor = Tensor::from_array(type_array.into_dyn())
                .map_err(|e| to_embedding_error(&e))?
                .upcast();

            let array = {
                let mut session = self.session.lock().map_err(|_| {
                    VectorStoreError::EmbeddingError("Failed to lock ONNX session".into())
                })?;

                let mut available: HashMap<String, DynTensor> = HashMap::new();
                available.insert("input_ids".to_string(), ids_tensor);
                available.insert("attention_mask".to_string(), mask_tensor);
                available.insert("token_type_ids".to_string(), type_tensor);

                let mut feed: HashMap<String, DynTensor> = HashMap::new();
                for input in &session.inputs {
                    let key = input.name.clone();
                    if let Some(value) = available.remove(&key) {
                        feed.insert(key, value);
                    } else {
                        feed.insert(key, zero_tensor(&ids_shape, input)?);
                    }
                }

                let outputs = session.run(SessionInputs::from(feed)).map_err(|e| {
                    VectorStoreError::EmbeddingError(format!("ONNX forward failed: {e}"))
                })?;
                if outputs.len() == 0 {
                    return Err(VectorStoreError::EmbeddingError(
                        "ONNX returned no outputs".to_string(),
                    ));
                }

                let array = outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(|e| {
                        VectorStoreError::EmbeddingError(format!(
                            "Failed to decode ONNX output: {e}"
                        ))
                    })?
                    .to_owned();
                drop(outputs);
                drop(session);
                array
            };
            results.extend(embeddings_from_output(
                array,
                &mask_rows,
                pooling,
                self.dimension,
            )?);
        }

        Ok(results)
    }
}

fn default_ort_threads() -> (usize, usize) {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let intra_threads = if cpus <= 4 {
        1
    } else if cpus <= 12 {
        2
    } else {
        4
    };
    (intra_threads, 1)
}

fn cuda_requested() -> bool {
    env::var(ENV_USE_CUDA)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn build_execution_providers() -> Result<Vec<ExecutionProviderDispatch>> {
    if !cuda_requested() {
        return Ok(vec![CPUExecutionProvider::default().build()]);
    }

    let cuda = CUDAExecutionProvider::default();
    match cuda.is_available() {
        Ok(true) => Ok(vec![cuda.build()]),
        Ok(false) => {
            log::warn!("CUDA execution provider unavailable, falling back to CPU embeddings");
            Ok(vec![CPUExecutionProvider::default().build()])
        }
        Err(err) => {
            log::warn!("CUDA execution provider check failed ({err}), falling back to CPU");
            Ok(vec![CPUExecutionProvider::default().build()])
        }
    }
}

fn zero_tensor(shape: &ndarray::IxDyn, input: &Input) -> Result<DynTensor> {
    let tensor = match &input.input_type {
        ort::value::ValueType::Tensor { ty, .. } => match ty {
            TensorElementType::Int64 => {
                Tensor::from_array(ndarray::Array::<i64, _>::zeros(shape.clone()))
                    .map_err(|e| to_embedding_error(&e))?
                    .upcast()
            }
            TensorElementType::Float32 => {
                Tensor::from_array(ndarray::Array::<f32, _>::zeros(shape.clone()))
                    .map_err(|e| to_embedding_error(&e))?
                    .upcast()
            }
            other => {
                return Err(VectorStoreError::EmbeddingError(format!(
                    "Cannot synthesize zeros for tensor type {other:?} (input {})",
                    input.name
                )))
            }
        },
        other => {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Unsupported ONNX input '{}': {other:?}",
                input.name
            )))
        }
    };
    Ok(tensor)
}

fn to_embedding_error(error: &OrtError) -> VectorStoreError {
    VectorStoreError::EmbeddingError(format!("{error}"))
}

const fn ensure_dimension(vec: &[f32], expected: usize) -> Result<()> {
    if vec.len() != expected {
        return Err(VectorStoreError::InvalidDimension {
            expected,
            actual: vec.len(),
        });
    }
    Ok(())
}

/// Turn a model output into one normalized vector per sample.
///
/// 2-D outputs are already pooled; 3-D outputs are pooled here.
fn embeddings_from_output(
    array: ndarray::ArrayD<f32>,
    mask_rows: &[Vec<i64>],
    pooling: Pooling,
    expected_dimension: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut out = Vec::new();
    match array.ndim() {
        2 => {
            let embeddings = array
                .into_dimensionality::<Ix2>()
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Bad output shape: {e}")))?;
            out.reserve(embeddings.len_of(Axis(0)));
            for row in embeddings.outer_iter() {
                let mut emb = row.to_vec();
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        3 => {
            let hidden = array
                .into_dimensionality::<Ix3>()
                .map_err(|e| VectorStoreError::EmbeddingError(format!("Bad output shape: {e}")))?;
            out.reserve(hidden.len_of(Axis(0)));
            for (idx, sample) in hidden.outer_iter().enumerate() {
                let mut emb = match pooling {
                    Pooling::Cls => sample
                        .outer_iter()
                        .next()
                        .map(|token| token.to_vec())
                        .unwrap_or_default(),
                    Pooling::Mean => {
                        let attn = mask_rows
                            .get(idx)
                            .cloned()
                            .unwrap_or_else(|| vec![1; sample.len_of(Axis(0))]);
                        mean_pool(sample.view(), &attn)
                    }
                };
                ensure_dimension(&emb, expected_dimension)?;
                normalize(&mut emb);
                out.push(emb);
            }
        }
        _ => {
            return Err(VectorStoreError::EmbeddingError(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )));
        }
    }
    Ok(out)
}

fn mean_pool(sample: ndarray::ArrayView2<'_, f32>, mask: &[i64]) -> Vec<f32> {
    if sample.is_empty() {
        return vec![];
    }

    let hidden = sample.len_of(Axis(1));
    let mut sum = vec![0.0f32; hidden];
    let mut count = 0.0f32;

    for (token_idx, token) in sample.outer_iter().enumerate() {
        if *mask.get(token_idx).unwrap_or(&0) == 0 {
            continue;
        }
        count += 1.0;
        for (dim, value) in token.iter().enumerate() {
            sum[dim] += value;
        }
    }

    if count == 0.0 {
        return sum;
    }
    for value in &mut sum {
        *value /= count;
    }
    sum
}

fn build_flat_tensors(
    encodings: &[Encoding],
    seq_len: usize,
) -> (Vec<i64>, Vec<i64>, Vec<i64>, Vec<Vec<i64>>) {
    let mut ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut masks = Vec::with_capacity(encodings.len() * seq_len);
    let mut type_ids = Vec::with_capacity(encodings.len() * seq_len);
    let mut mask_rows = Vec::with_capacity(encodings.len());

    for encoding in encodings {
        let encoding_ids = encoding.get_ids();
        let encoding_masks = encoding.get_attention_mask();
        let encoding_types = encoding.get_type_ids();

        for idx in 0..seq_len {
            ids.push(i64::from(*encoding_ids.get(idx).unwrap_or(&0)));
            masks.push(i64::from(*encoding_masks.get(idx).unwrap_or(&0)));
            type_ids.push(i64::from(*encoding_types.get(idx).unwrap_or(&0)));
        }

        mask_rows.push(
            encoding_masks
                .iter()
                .take(seq_len)
                .map(|v| i64::from(*v))
                .collect(),
        );
    }

    (ids, masks, type_ids, mask_rows)
}

/// Scale to unit length; zero vectors stay zero
pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

enum EmbeddingBackend {
    Ort(Arc<OrtBackend>),
    Stub(StubBackend),
}

/// Sentence encoder backed by ONNX Runtime or the deterministic stub
pub struct EmbeddingModel {
    backend: EmbeddingBackend,
    pooling: Pooling,
    dimension: usize,
}

impl fmt::Debug for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backend = match self.backend {
            EmbeddingBackend::Ort(_) => EmbeddingMode::Onnx,
            EmbeddingBackend::Stub(_) => EmbeddingMode::Stub,
        };
        f.debug_struct("EmbeddingModel")
            .field("backend", &backend)
            .field("pooling", &self.pooling)
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl EmbeddingModel {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let backend = match config.mode {
            EmbeddingMode::Stub => EmbeddingBackend::Stub(StubBackend::new(config.dimension)),
            EmbeddingMode::Onnx => EmbeddingBackend::Ort(OrtBackend::shared(config)?),
        };
        Ok(Self {
            backend,
            pooling: config.pooling,
            dimension: config.dimension,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&EmbeddingConfig::from_env()?)
    }

    #[must_use]
    pub const fn pooling(&self) -> Pooling {
        self.pooling
    }

    /// True when `model_dir` holds both the ONNX model and the tokenizer
    #[must_use]
    pub fn model_files_present(model_dir: &Path) -> bool {
        model_dir.join(MODEL_FILE_NAME).exists() && model_dir.join(TOKENIZER_FILE_NAME).exists()
    }
}

#[async_trait]
impl Encoder for EmbeddingModel {
    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        match &self.backend {
            EmbeddingBackend::Stub(stub) => Ok(stub.embed_batch(texts)),
            EmbeddingBackend::Ort(backend) => {
                let backend = backend.clone();
                let owned = texts.to_vec();
                let pooling = self.pooling;
                spawn_blocking(move || backend.embed_batch_blocking(&owned, pooling))
                    .await
                    .map_err(|e| VectorStoreError::EmbeddingError(format!("Join error: {e}")))?
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use pretty_assertions::assert_eq;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn stub_vectors_are_deterministic_and_normalized() {
        let model = EmbeddingModel::new(&EmbeddingConfig::stub(16)).unwrap();
        let texts = vec!["大雨".to_string(), "冷鋒".to_string(), "大雨".to_string()];
        let vectors = model.encode(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        for v in &vectors {
            assert_eq!(v.len(), 16);
            assert!((norm(v) - 1.0).abs() < 1e-5);
        }
        assert_eq!(model.encode_one("冷鋒").await.unwrap(), vectors[1]);
    }

    #[test]
    fn config_reads_variables() {
        let vars: HashMap<&str, &str> = [
            (ENV_EMBEDDING_MODE, "stub"),
            (ENV_MODEL_DIR, "/opt/encoder"),
            (ENV_POOLING, "mean"),
        ]
        .into_iter()
        .collect();
        let config =
            EmbeddingConfig::from_vars(|key| vars.get(key).map(|v| (*v).to_string())).unwrap();
        assert_eq!(config.mode, EmbeddingMode::Stub);
        assert_eq!(config.model_dir, PathBuf::from("/opt/encoder"));
        assert_eq!(config.pooling, Pooling::Mean);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);

        let defaults = EmbeddingConfig::from_vars(|_| None).unwrap();
        assert_eq!(defaults, EmbeddingConfig::default());
    }

    #[test]
    fn config_rejects_unknown_values() {
        assert!(EmbeddingConfig::from_vars(|k| (k == ENV_POOLING).then(|| "max".into())).is_err());
        assert!("gpu".parse::<EmbeddingMode>().is_err());
        assert!("fast".parse::<EmbeddingMode>().is_err());
        assert_eq!(" ONNX ".parse::<EmbeddingMode>().unwrap(), EmbeddingMode::Onnx);
        let config = EmbeddingConfig {
            batch_size: 0,
            ..EmbeddingConfig::stub(4)
        };
        assert!(EmbeddingModel::new(&config).is_err());
    }

    #[test]
    fn cls_pooling_takes_first_token() {
        let hidden = array![[[3.0f32, 4.0], [1.0, 0.0]]].into_dyn();
        let out = embeddings_from_output(hidden, &[vec![1, 1]], Pooling::Cls, 2).unwrap();
        assert_eq!(out, vec![vec![0.6, 0.8]]);
    }

    #[test]
    fn mean_pooling_respects_mask() {
        let hidden = array![[[2.0f32, 0.0], [0.0, 2.0], [100.0, 100.0]]].into_dyn();
        let out = embeddings_from_output(hidden, &[vec![1, 1, 0]], Pooling::Mean, 2).unwrap();
        let expected = std::f32::consts::FRAC_1_SQRT_2;
        assert!((out[0][0] - expected).abs() < 1e-6);
        assert!((out[0][1] - expected).abs() < 1e-6);
    }

    #[test]
    fn pooled_output_is_normalized_and_checked() {
        let pooled = array![[0.0f32, 5.0], [0.0, 0.0]].into_dyn();
        let out = embeddings_from_output(pooled, &[], Pooling::Cls, 2).unwrap();
        assert_eq!(out, vec![vec![0.0, 1.0], vec![0.0, 0.0]]);

        let wrong = array![[1.0f32, 2.0, 3.0]].into_dyn();
        assert!(matches!(
            embeddings_from_output(wrong, &[], Pooling::Cls, 2),
            Err(VectorStoreError::InvalidDimension {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn missing_model_files_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_dir: dir.path().to_path_buf(),
            ..EmbeddingConfig::default()
        };
        assert!(!EmbeddingModel::model_files_present(dir.path()));
        let err = EmbeddingModel::new(&config).unwrap_err();
        assert!(err.to_string().contains("Model files are missing"), "{err}");
    }
}
