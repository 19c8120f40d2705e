//! Saving and loading chunk indexes.
//!
//! JSON is readable and diffable; bincode is compact and loads fast, which
//! matters once embeddings are stored.

use crate::error::{Result, RfpError};
use crate::retrieval::ChunkIndex;
use std::fs;
use std::path::Path;

/// Default filename for the chunk index.
pub const DEFAULT_INDEX_FILENAME: &str = "rfp_index.bin";

/// On-disk format of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveFormat {
    Json,
    Bincode,
}

impl SaveFormat {
    /// Pick the format from the file extension; anything unknown is JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("bin") | Some("bincode") => SaveFormat::Bincode,
            _ => SaveFormat::Json,
        }
    }
}

/// Save an index, creating parent directories as needed.
pub fn save_index(index: &ChunkIndex, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| RfpError::io(parent, e))?;
        }
    }

    let data = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::to_vec_pretty(index)
            .map_err(|e| RfpError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => bincode::encode_to_vec(index, bincode::config::standard())
            .map_err(|e| RfpError::Serialization(e.to_string()))?,
    };

    fs::write(path, &data).map_err(|e| RfpError::io(path, e))?;
    tracing::info!(path = %path.display(), chunks = index.len(), bytes = data.len(), "saved index");
    Ok(())
}

/// Load an index saved by [`save_index`].
pub fn load_index(path: &Path) -> Result<ChunkIndex> {
    if !path.is_file() {
        return Err(RfpError::IndexNotFound(path.to_path_buf()));
    }

    let data = fs::read(path).map_err(|e| RfpError::io(path, e))?;
    let index: ChunkIndex = match SaveFormat::from_path(path) {
        SaveFormat::Json => serde_json::from_slice(&data)
            .map_err(|e| RfpError::Serialization(e.to_string()))?,
        SaveFormat::Bincode => {
            let (index, _): (ChunkIndex, usize) =
                bincode::decode_from_slice(&data, bincode::config::standard())
                    .map_err(|e| RfpError::Serialization(e.to_string()))?;
            index
        }
    };

    index.validate()?;
    tracing::debug!(path = %path.display(), chunks = index.len(), "loaded index");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::build_corpus;
    use crate::records::SourceRecord;
    use crate::retrieval::ChunkConfig;
    use tempfile::TempDir;

    fn create_test_index() -> ChunkIndex {
        let docs = build_corpus(&[
            SourceRecord::new("도서관 리모델링", "서울시", "1000", "lib.hwp", "열람실 개선"),
            SourceRecord::new("교통 정보 시스템", "서울교통공사", "2000", "metro.pdf", "신호 개량"),
        ]);
        let mut index = ChunkIndex::build(&docs, &ChunkConfig::default());
        index.embeddings = Some(vec![vec![0.5, 0.25], vec![1.0, 0.0]]);
        index.embedding_model = Some("test-model".to_string());
        index
    }

    #[test]
    fn test_save_and_load_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let original = create_test_index();
        save_index(&original, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("서울교통공사"));
        assert_eq!(load_index(&path).unwrap(), original);
    }

    #[test]
    fn test_save_and_load_bincode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("index.bin");

        let original = create_test_index();
        save_index(&original, &path).unwrap();

        let loaded = load_index(&path).unwrap();
        assert_eq!(loaded, original);
        assert!(loaded.has_embeddings());
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(SaveFormat::from_path(Path::new("a.json")), SaveFormat::Json);
        assert_eq!(SaveFormat::from_path(Path::new("a.bin")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("a.bincode")), SaveFormat::Bincode);
        assert_eq!(SaveFormat::from_path(Path::new("a")), SaveFormat::Json);
    }

    #[test]
    fn test_load_nonexistent() {
        let result = load_index(Path::new("/nonexistent/index.bin"));
        assert!(matches!(result, Err(RfpError::IndexNotFound(_))));
    }

    #[test]
    fn test_corrupt_file_is_serialization_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(load_index(&path), Err(RfpError::Serialization(_))));
    }

    #[test]
    fn test_index_with_id_gap_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.json");

        let mut index = create_test_index();
        index.chunks[1].id = 5;
        fs::write(&path, serde_json::to_vec(&index).unwrap()).unwrap();

        assert!(matches!(load_index(&path), Err(RfpError::Serialization(_))));
    }

    #[test]
    fn test_index_with_missing_embeddings_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = create_test_index();
        index.embeddings = Some(vec![vec![1.0, 0.0]]);
        save_index(&index, &path).unwrap();

        assert!(matches!(load_index(&path), Err(RfpError::Serialization(_))));
    }
}
