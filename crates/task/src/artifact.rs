//! `.meteo` model artifacts.
//!
//! A gzip-compressed tar archive with two entries, named after the file
//! stem: `<name>` holds the serialized vector index and `<name>.init` the
//! JSON parameters needed to rebuild the pipeline.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use meteo_core::{AppError, AppResult};
use meteo_knowledge::VectorIndex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Required file extension.
pub const ARTIFACT_EXTENSION: &str = "meteo";

const INIT_SUFFIX: &str = ".init";

/// Check an artifact path and return the entry name.
///
/// # Errors
/// Returns `AppError::Validation` if the path does not end in `.meteo`, has
/// an empty stem, or its directory does not exist.
pub fn validate_artifact_path(path: &Path) -> AppResult<String> {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == ARTIFACT_EXTENSION);
    if !has_extension {
        return Err(AppError::Validation(format!(
            "Model path {:?} has a bad extension; it must end with `.{}` (e.g. ./model.{})",
            path, ARTIFACT_EXTENSION, ARTIFACT_EXTENSION
        )));
    }

    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!("Model path {:?} has an empty file name", path))
        })?;

    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !dir.is_dir() {
            return Err(AppError::Validation(format!(
                "Directory {:?} does not exist",
                dir
            )));
        }
    }

    Ok(name.to_string())
}

/// Write `index` and `init` to a `.meteo` archive, replacing `path` atomically.
pub fn save_artifact<T: Serialize>(path: &Path, index: &VectorIndex, init: &T) -> AppResult<()> {
    let name = validate_artifact_path(path)?;

    let index_bytes = index.to_bytes()?;
    let init_bytes = serde_json::to_vec_pretty(init)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| AppError::Storage(format!("Cannot write into {:?}: {}", dir, e)))?;

    let encoder = GzEncoder::new(temp, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    append_entry(&mut builder, &name, &index_bytes)?;
    append_entry(&mut builder, &format!("{}{}", name, INIT_SUFFIX), &init_bytes)?;

    let temp = builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", path, e)))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| AppError::Storage(format!("Failed to write {:?}: {}", path, e)))?;
    temp.persist(path)
        .map_err(|e| AppError::Storage(format!("Failed to replace {:?}: {}", path, e.error)))?;

    tracing::info!(
        "Saved model artifact {:?} ({} examples)",
        path,
        index.len()
    );
    Ok(())
}

fn append_entry<W: std::io::Write>(
    builder: &mut tar::Builder<W>,
    name: &str,
    bytes: &[u8],
) -> AppResult<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, name, bytes)
        .map_err(|e| AppError::Storage(format!("Failed to add {} to archive: {}", name, e)))
}

/// Entry name to read: the file stem, or the only pair in a renamed archive.
fn resolve_entry_name(
    entries: &BTreeMap<String, Vec<u8>>,
    stem: String,
    path: &Path,
) -> AppResult<String> {
    if entries.contains_key(&stem) {
        return Ok(stem);
    }

    let pairs: Vec<&str> = entries
        .keys()
        .filter_map(|k| k.strip_suffix(INIT_SUFFIX))
        .filter(|base| entries.contains_key(*base))
        .collect();

    match pairs.as_slice() {
        [only] => {
            tracing::warn!(
                "Model artifact {:?} was saved as {}; reading that entry",
                path,
                only
            );
            Ok(only.to_string())
        }
        _ => Err(AppError::Storage(format!(
            "Model artifact {:?} has no {} entry",
            path, stem
        ))),
    }
}

/// Read a `.meteo` archive written by [`save_artifact`].
///
/// # Errors
/// Returns `AppError::Validation` for a bad path, and `AppError::Storage`
/// if the file is missing, is not a gzip tar archive, lacks an entry, or
/// holds an undecodable index or parameter record.
pub fn load_artifact<T: DeserializeOwned>(path: &Path) -> AppResult<(VectorIndex, T)> {
    let name = validate_artifact_path(path)?;

    if !path.is_file() {
        return Err(AppError::Storage(format!(
            "Model artifact not found: {:?}",
            path
        )));
    }

    let file = File::open(path)
        .map_err(|e| AppError::Storage(format!("Failed to open {:?}: {}", path, e)))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));

    let corrupt = |e: std::io::Error| {
        AppError::Storage(format!("Corrupt model artifact {:?}: {}", path, e))
    };

    let mut entries: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let entry_name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(corrupt)?;
        entries.insert(entry_name, bytes);
    }

    let name = resolve_entry_name(&entries, name, path)?;
    let init_name = format!("{}{}", name, INIT_SUFFIX);

    let index_bytes = entries.remove(&name).ok_or_else(|| {
        AppError::Storage(format!("Model artifact {:?} has no {} entry", path, name))
    })?;
    let init_bytes = entries.remove(&init_name).ok_or_else(|| {
        AppError::Storage(format!(
            "Model artifact {:?} has no {} entry",
            path, init_name
        ))
    })?;

    let index = VectorIndex::from_bytes(&index_bytes)?;
    let init = serde_json::from_slice(&init_bytes).map_err(|e| {
        AppError::Storage(format!("Corrupt parameter record {}: {}", init_name, e))
    })?;

    tracing::info!("Loaded model artifact {:?} ({} examples)", path, index.len());
    Ok((index, init))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meteo_knowledge::embeddings::providers::TrigramProvider;
    use meteo_knowledge::{ExampleRecord, Metric};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::fs;
    use tempfile::TempDir;

    type Init = BTreeMap<String, Vec<String>>;

    fn index() -> VectorIndex {
        let records = vec![
            ExampleRecord::annotated("estoy feliz", "positivo"),
            ExampleRecord::annotated("no me gusta", "negativo"),
        ];
        VectorIndex::build(records, &TrigramProvider::new(32), None, Metric::Cosine).unwrap()
    }

    fn init() -> Init {
        let mut init = Init::new();
        init.insert(
            "labels".to_string(),
            vec!["positivo".to_string(), "negativo".to_string()],
        );
        init
    }

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(File::open(path).unwrap()));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sentiment.meteo");

        save_artifact(&path, &index(), &init()).unwrap();
        let (loaded_index, loaded_init): (VectorIndex, Init) = load_artifact(&path).unwrap();

        assert_eq!(loaded_index, index());
        assert_eq!(loaded_init, init());
        assert_eq!(entry_names(&path), vec!["sentiment", "sentiment.init"]);
    }

    #[test]
    fn test_wrong_extension_names_required_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.wrong_ext");

        match save_artifact(&path, &index(), &init()) {
            Err(AppError::Validation(msg)) => assert!(msg.contains(".meteo")),
            other => panic!("Expected validation error, got {:?}", other),
        }
        assert!(!path.exists());

        assert!(matches!(
            load_artifact::<Init>(&path),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent").join("model.meteo");

        assert!(matches!(
            save_artifact(&path, &index(), &init()),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_missing_file_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_artifact::<Init>(&temp_dir.path().join("model.meteo"));
        assert!(matches!(result, Err(AppError::Storage(_))));
    }

    #[test]
    fn test_corrupt_archive_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.meteo");
        fs::write(&path, b"definitely not gzip").unwrap();

        assert!(matches!(
            load_artifact::<Init>(&path),
            Err(AppError::Storage(_))
        ));
    }

    #[test]
    fn test_missing_init_entry_is_storage_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("model.meteo");

        let file = File::create(&path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        append_entry(&mut builder, "model", &index().to_bytes().unwrap()).unwrap();
        builder.into_inner().unwrap().finish().unwrap();

        match load_artifact::<Init>(&path) {
            Err(AppError::Storage(msg)) => assert!(msg.contains("model")),
            other => panic!("Expected storage error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_renamed_artifact_still_loads() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("first.meteo");
        save_artifact(&path, &index(), &init()).unwrap();

        let renamed = temp_dir.path().join("second.meteo");
        fs::rename(&path, &renamed).unwrap();

        let (loaded, _): (VectorIndex, Init) = load_artifact(&renamed).unwrap();
        assert_eq!(loaded.len(), 2);
    }
}
