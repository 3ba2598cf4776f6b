//! In-memory vector index over example records.
//!
//! Exact nearest-neighbour search with a fixed metric, optional field
//! filters, and a versioned binary file format. The index is read-only once
//! built, so shared references can search concurrently.

use crate::embeddings::EmbeddingProvider;
use crate::types::{ExampleRecord, MetadataFilter, ScoredExample};
use meteo_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

const MAGIC: &[u8; 4] = b"MTIX";
const FORMAT_VERSION: u32 = 1;
const PREAMBLE_LEN: usize = 12;

/// Similarity metric. Higher similarity means closer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    /// Similarity is the negated L2 distance
    Euclidean,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
        }
    }

    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b),
            Metric::Euclidean => -euclidean_distance(a, b),
        }
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(AppError::Configuration(format!(
                "Unknown metric: {}. Supported: cosine, euclidean",
                other
            ))),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Header stored in front of the raw vectors.
#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    metric: Metric,
    dimensions: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    embedding_model: Option<String>,
    records: Vec<ExampleRecord>,
}

/// Ordered collection of `(vector, record)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    metric: Metric,
    dimensions: usize,
    embedding_model: Option<String>,
    records: Vec<ExampleRecord>,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Empty index for vectors of `dimensions` length.
    pub fn new(dimensions: usize, metric: Metric) -> Self {
        Self {
            metric,
            dimensions,
            embedding_model: None,
            records: Vec::new(),
            vectors: Vec::new(),
        }
    }

    /// Embed and index every record.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` if `records` is empty or the provider
    /// returns vectors of the wrong length.
    pub fn build(
        records: Vec<ExampleRecord>,
        provider: &dyn EmbeddingProvider,
        input_keys: Option<&[String]>,
        metric: Metric,
    ) -> AppResult<Self> {
        if records.is_empty() {
            return Err(AppError::Configuration(
                "Cannot build a vector index from zero examples".to_string(),
            ));
        }

        let mut index = Self::new(provider.dimensions(), metric);
        index.embedding_model = Some(format!(
            "{}/{}",
            provider.provider_name(),
            provider.model_name()
        ));
        index.add(records, provider, input_keys)?;

        tracing::info!(
            records = index.len(),
            dimensions = index.dimensions,
            metric = %index.metric,
            "Built vector index"
        );
        Ok(index)
    }

    /// Embed and append records in bulk.
    ///
    /// Nothing is appended if any embedding fails.
    pub fn add(
        &mut self,
        records: Vec<ExampleRecord>,
        provider: &dyn EmbeddingProvider,
        input_keys: Option<&[String]>,
    ) -> AppResult<()> {
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.embedding_text(input_keys))
            .collect();
        let vectors = provider.embed_batch(&texts)?;

        if vectors.len() != records.len() {
            return Err(AppError::Configuration(format!(
                "Embedding provider returned {} vectors for {} texts",
                vectors.len(),
                records.len()
            )));
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }

        self.records.extend(records);
        self.vectors.extend(vectors);
        Ok(())
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.dimensions {
            return Err(AppError::Configuration(format!(
                "Embedding dimension mismatch: index holds {}-dimensional vectors, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Embed `query` and return the `k` closest records.
    pub fn search(
        &self,
        query: &str,
        provider: &dyn EmbeddingProvider,
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredExample>> {
        let query_vector = provider.embed(query)?;
        self.search_by_vector(&query_vector, k, filter)
    }

    /// Return the `k` records closest to `query_vector`, closest first.
    ///
    /// Equal scores keep insertion order. Fewer than `k` results come back
    /// when the filtered population is smaller.
    pub fn search_by_vector(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<ScoredExample>> {
        let hits = self
            .rank(query_vector, k, filter)?
            .into_iter()
            .map(|(position, score)| ScoredExample {
                record: self.records[position].clone(),
                score,
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            k,
            returned = hits.len(),
            top_score = hits.first().map(|h| h.score),
            "Vector search"
        );
        Ok(hits)
    }

    /// Positions and scores of the `k` best matches.
    pub(crate) fn rank(
        &self,
        query_vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> AppResult<Vec<(usize, f32)>> {
        self.check_dimensions(query_vector)?;

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, record)| filter.map_or(true, |f| f.matches(record)))
            .map(|(position, _)| {
                (
                    position,
                    self.metric.similarity(query_vector, &self.vectors[position]),
                )
            })
            .collect();

        // Stable sort keeps insertion order among ties
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);
        Ok(scored)
    }

    pub fn record(&self, position: usize) -> Option<&ExampleRecord> {
        self.records.get(position)
    }

    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(Vec::as_slice)
    }

    /// Records and their vectors in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&ExampleRecord, &[f32])> {
        self.records
            .iter()
            .zip(self.vectors.iter().map(Vec::as_slice))
    }

    pub fn records(&self) -> &[ExampleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// `provider/model` that produced the vectors, if known.
    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    /// Check that `provider` produces vectors comparable with the stored ones.
    ///
    /// # Errors
    /// Returns `AppError::Configuration` on a dimension mismatch, or when the
    /// index records a different `provider/model` than `provider`.
    pub fn check_provider(&self, provider: &dyn EmbeddingProvider) -> AppResult<()> {
        if provider.dimensions() != self.dimensions {
            return Err(AppError::Configuration(format!(
                "Index holds {}-dimensional vectors but provider {} produces {}",
                self.dimensions,
                provider.model_name(),
                provider.dimensions()
            )));
        }

        let expected = format!("{}/{}", provider.provider_name(), provider.model_name());
        match self.embedding_model.as_deref() {
            Some(model) if model != expected => Err(AppError::Configuration(format!(
                "Index was embedded with {} but the provider is {}",
                model, expected
            ))),
            _ => Ok(()),
        }
    }

    /// Serialize to the binary index format.
    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        let header = IndexHeader {
            metric: self.metric,
            dimensions: self.dimensions,
            embedding_model: self.embedding_model.clone(),
            records: self.records.clone(),
        };
        let header_json = serde_json::to_vec(&header)?;
        let header_len = u32::try_from(header_json.len()).map_err(|_| {
            AppError::Storage("Index header exceeds the 4 GiB format limit".to_string())
        })?;

        let mut bytes = Vec::with_capacity(
            PREAMBLE_LEN + header_json.len() + self.vectors.len() * self.dimensions * 4,
        );
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&header_len.to_le_bytes());
        bytes.extend_from_slice(&header_json);
        for value in self.vectors.iter().flatten() {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    /// Decode the binary index format.
    ///
    /// # Errors
    /// Returns `AppError::Storage` for any malformed input.
    pub fn from_bytes(bytes: &[u8]) -> AppResult<Self> {
        if bytes.len() < PREAMBLE_LEN || &bytes[..4] != MAGIC {
            return Err(AppError::Storage(
                "Not a vector index file (bad magic)".to_string(),
            ));
        }

        let version = read_u32(bytes, 4)?;
        if version != FORMAT_VERSION {
            return Err(AppError::Storage(format!(
                "Unsupported index format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let header_len = read_u32(bytes, 8)? as usize;
        let header_end = PREAMBLE_LEN
            .checked_add(header_len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| AppError::Storage("Truncated index header".to_string()))?;

        let header: IndexHeader = serde_json::from_slice(&bytes[PREAMBLE_LEN..header_end])
            .map_err(|e| AppError::Storage(format!("Corrupt index header: {}", e)))?;

        let body = &bytes[header_end..];
        let expected = header
            .records
            .len()
            .checked_mul(header.dimensions)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                AppError::Storage("Index header declares an impossible size".to_string())
            })?;
        if body.len() != expected {
            return Err(AppError::Storage(format!(
                "Index body holds {} bytes, expected {}",
                body.len(),
                expected
            )));
        }

        let values: Vec<f32> = body
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let vectors = if header.dimensions == 0 {
            vec![Vec::new(); header.records.len()]
        } else {
            values
                .chunks_exact(header.dimensions)
                .map(<[f32]>::to_vec)
                .collect()
        };

        Ok(Self {
            metric: header.metric,
            dimensions: header.dimensions,
            embedding_model: header.embedding_model,
            records: header.records,
            vectors,
        })
    }

    /// Write the index to `path`, replacing any existing file atomically.
    pub fn save(&self, path: &Path) -> AppResult<()> {
        let bytes = self.to_bytes()?;
        write_atomic(path, &bytes)?;
        tracing::info!("Saved vector index ({} records) to {:?}", self.len(), path);
        Ok(())
    }

    /// Read an index written by [`VectorIndex::save`].
    pub fn load(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Storage(format!(
                "Index file not found: {:?}",
                path
            )));
        }

        let bytes = std::fs::read(path)
            .map_err(|e| AppError::Storage(format!("Failed to read index {:?}: {}", path, e)))?;
        let index = Self::from_bytes(&bytes)?;
        tracing::info!("Loaded vector index ({} records) from {:?}", index.len(), path);
        Ok(index)
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> AppResult<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| AppError::Storage("Truncated index preamble".to_string()))
}

/// Write through a temp file in the target directory, then rename over `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> AppResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Storage(format!("Cannot write into {:?}: {}", dir, e)))?;
    temp.write_all(bytes)
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", path, e)))?;
    temp.persist(path)
        .map_err(|e| AppError::Storage(format!("Failed to replace {:?}: {}", path, e.error)))?;
    Ok(())
}

/// Calculate cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::providers::TrigramProvider;
    use crate::tests::TableProvider;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn provider() -> TableProvider {
        TableProvider::new(3)
            .with("north", [0.0, 1.0, 0.0])
            .with("north too", [0.0, 1.0, 0.0])
            .with("east", [1.0, 0.0, 0.0])
            .with("north east", [0.7, 0.7, 0.0])
            .with("up", [0.0, 0.0, 1.0])
    }

    fn records() -> Vec<ExampleRecord> {
        vec![
            ExampleRecord::new("north").with_metadata("kind", "cardinal"),
            ExampleRecord::new("east").with_metadata("kind", "cardinal"),
            ExampleRecord::new("north east").with_metadata("kind", "diagonal"),
            ExampleRecord::new("north too").with_metadata("kind", "cardinal"),
        ]
    }

    fn input_only() -> Vec<String> {
        vec!["input".to_string()]
    }

    fn build() -> VectorIndex {
        let fields = input_only();
        VectorIndex::build(records(), &provider(), Some(fields.as_slice()), Metric::Cosine).unwrap()
    }

    fn inputs(hits: &[ScoredExample]) -> Vec<&str> {
        hits.iter().map(|h| h.record.input.as_str()).collect()
    }

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c) - 0.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_build_empty_is_configuration_error() {
        let result = VectorIndex::build(Vec::new(), &provider(), None, Metric::Cosine);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_build_dimension_mismatch() {
        let mut index = VectorIndex::new(2, Metric::Cosine);
        let result = index.add(records(), &provider(), Some(input_only().as_slice()));
        assert!(matches!(result, Err(AppError::Configuration(_))));
        assert!(index.is_empty());
    }

    #[test]
    fn test_search_orders_by_similarity_with_insertion_tie_break() {
        let index = build();
        let hits = index.search("north", &provider(), 3, None).unwrap();

        // "north" and "north too" tie; the first inserted wins
        assert_eq!(inputs(&hits), vec!["north", "north too", "north east"]);
        assert!(hits[0].score >= hits[2].score);
    }

    #[test]
    fn test_search_with_filter_returns_partial_result() {
        let index = build();
        let filter = MetadataFilter::eq("kind", "diagonal");
        let hits = index.search("east", &provider(), 3, Some(&filter)).unwrap();
        assert_eq!(inputs(&hits), vec!["north east"]);
    }

    #[test]
    fn test_search_never_exceeds_k() {
        let index = build();
        assert_eq!(index.search("up", &provider(), 2, None).unwrap().len(), 2);
        assert_eq!(index.search("up", &provider(), 10, None).unwrap().len(), 4);
        assert!(index.search("up", &provider(), 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_euclidean_metric() {
        let fields = input_only();
        let index =
            VectorIndex::build(records(), &provider(), Some(fields.as_slice()), Metric::Euclidean)
                .unwrap();
        let hits = index.search("east", &provider(), 1, None).unwrap();
        assert_eq!(inputs(&hits), vec!["east"]);
        assert_eq!(hits[0].score, 0.0);
        assert_eq!("l2".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert!("dot".parse::<Metric>().is_err());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = build();
        let result = index.search_by_vector(&[1.0, 0.0], 1, None);
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }

    #[test]
    fn test_check_provider() {
        let index = build();
        assert!(index.check_provider(&provider()).is_ok());

        let narrower = TableProvider::new(2);
        assert!(matches!(
            index.check_provider(&narrower),
            Err(AppError::Configuration(_))
        ));

        let other_model = TrigramProvider::new(3);
        match index.check_provider(&other_model) {
            Err(AppError::Configuration(msg)) => assert!(msg.contains("table/table-v1")),
            other => panic!("Expected configuration error, got {:?}", other),
        }

        // Indexes assembled by hand record no model
        assert!(VectorIndex::new(3, Metric::Cosine).check_provider(&other_model).is_ok());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("examples.idx");

        let index = build();
        index.save(&path).unwrap();
        let loaded = VectorIndex::load(&path).unwrap();

        assert_eq!(loaded, index);
        assert_eq!(loaded.embedding_model(), Some("table/table-v1"));
    }

    #[test]
    fn test_save_replaces_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("examples.idx");
        std::fs::write(&path, b"old").unwrap();

        build().save(&path).unwrap();
        assert_eq!(VectorIndex::load(&path).unwrap().len(), 4);

        let leftovers = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_load_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = VectorIndex::load(&temp_dir.path().join("absent.idx"));
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[test]
    fn test_load_corrupt_bytes() {
        assert!(matches!(
            VectorIndex::from_bytes(b"nope"),
            Err(AppError::Storage(_))
        ));

        let mut bytes = build().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            VectorIndex::from_bytes(&bytes),
            Err(AppError::Storage(_))
        ));

        let mut bytes = build().to_bytes().unwrap();
        bytes[4] = 9;
        assert!(matches!(
            VectorIndex::from_bytes(&bytes),
            Err(AppError::Storage(_))
        ));

        // Header whose vector count times dimensions overflows usize
        let header = serde_json::to_vec(&serde_json::json!({
            "metric": "cosine",
            "dimensions": 4_611_686_018_427_387_904u64,
            "records": [{"input": "a"}],
        }))
        .unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(header.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&header);
        match VectorIndex::from_bytes(&bytes) {
            Err(AppError::Storage(msg)) => assert!(msg.contains("impossible size")),
            other => panic!("Expected storage error, got {:?}", other),
        }
    }
}
