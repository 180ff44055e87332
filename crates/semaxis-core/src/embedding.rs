//! Embedding provider contract and the precomputed-vector provider.
//!
//! Providers return one fixed-width vector per input text, in input order.
//! Batching only groups rows for throughput.

use std::path::Path;

use nalgebra::DMatrix;
use tracing::{debug, info};

use crate::error::{AxisError, AxisResult};
use crate::linalg::matrix_from_rows;

/// Output of one embedding call.
#[derive(Debug, Clone)]
pub struct EmbeddingBatch {
    /// `n × d_embed`, row `i` belongs to text `i`.
    pub matrix: DMatrix<f64>,
    /// Inference device used.
    pub device: String,
    /// Texts longer than the maximum length.
    pub truncated: usize,
}

/// Turns normalized texts into embedding vectors.
pub trait EmbeddingProvider {
    /// Model identifier recorded in baseline provenance.
    fn model_id(&self) -> &str;

    fn embed(&self, texts: &[String], batch_size: usize, max_len: usize) -> AxisResult<EmbeddingBatch>;
}

/// Whitespace token count, the length measure used for truncation accounting.
#[inline]
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Row-aligned vectors produced ahead of time by an external model run.
#[derive(Debug, Clone)]
pub struct PrecomputedEmbeddings {
    model: String,
    vectors: Vec<Vec<f64>>,
}

impl PrecomputedEmbeddings {
    pub fn new(model: impl Into<String>, vectors: Vec<Vec<f64>>) -> Self {
        Self {
            model: model.into(),
            vectors,
        }
    }

    /// Load from a JSON array of arrays (`.json`) or a header-less numeric CSV (anything else).
    pub fn from_path(model: impl Into<String>, path: &Path) -> AxisResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AxisError::io(format!("reading embeddings {}", path.display()), e))?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let vectors = if is_json {
            serde_json::from_str::<Vec<Vec<f64>>>(&content)
                .map_err(|e| AxisError::serialization(format!("parsing {}", path.display()), e))?
        } else {
            parse_csv_vectors(&content)?
        };
        info!(
            target: "semaxis::embedding",
            path = %path.display(),
            rows = vectors.len(),
            dim = vectors.first().map(|v| v.len()).unwrap_or(0),
            "Loaded precomputed embeddings"
        );
        Ok(Self::new(model, vectors))
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

fn parse_csv_vectors(content: &str) -> AxisResult<Vec<Vec<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let mut vectors = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.map_err(|e| AxisError::serialization("reading embedding csv", e))?;
        let row = record
            .iter()
            .map(|cell| {
                cell.parse::<f64>().map_err(|e| {
                    AxisError::Embedding(format!("row {}: '{}' is not a number ({})", line + 1, cell, e))
                })
            })
            .collect::<AxisResult<Vec<f64>>>()?;
        vectors.push(row);
    }
    Ok(vectors)
}

impl EmbeddingProvider for PrecomputedEmbeddings {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: &[String], batch_size: usize, max_len: usize) -> AxisResult<EmbeddingBatch> {
        if batch_size == 0 {
            return Err(AxisError::configuration("embedding batch size must be > 0"));
        }
        if self.vectors.len() != texts.len() {
            return Err(AxisError::Embedding(format!(
                "{} precomputed vectors for {} texts",
                self.vectors.len(),
                texts.len()
            )));
        }

        let mut rows = Vec::with_capacity(texts.len());
        let mut truncated = 0;
        for (batch_idx, (text_chunk, vec_chunk)) in texts
            .chunks(batch_size)
            .zip(self.vectors.chunks(batch_size))
            .enumerate()
        {
            truncated += text_chunk.iter().filter(|t| token_count(t) > max_len).count();
            rows.extend(vec_chunk.iter().cloned());
            debug!(target: "semaxis::embedding", batch = batch_idx, size = text_chunk.len(), "Embedded batch");
        }

        let matrix = matrix_from_rows(&rows).map_err(|e| AxisError::Embedding(e.to_string()))?;
        Ok(EmbeddingBatch {
            matrix,
            device: "precomputed".to_string(),
            truncated,
        })
    }
}
