//! Filesystem implementations of the document source and result store

use prodex_domain::{DocumentRef, DocumentSource, IoFailure, ProductResult, ResultStore};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads documents from disk; inline references resolve to their text
pub struct FileSource;

impl DocumentSource for FileSource {
    fn fetch(&self, reference: &DocumentRef) -> Result<String, IoFailure> {
        match reference {
            DocumentRef::Inline { text, .. } => Ok(text.clone()),
            DocumentRef::File { path } => fs::read_to_string(path)
                .map_err(|e| IoFailure::critical(format!("read {}: {}", path.display(), e))),
        }
    }
}

/// Versioned JSON result layout under one root directory.
///
/// Each product gets its own directory; merged results are written as
/// `result_v<N>.json` with `N` one past the highest existing version,
/// never overwriting an earlier result. Raw LLM responses land in a
/// `raw/` subdirectory per product.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    /// Create a store rooted at `root`; directories are created lazily
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding a product's results
    pub fn product_dir(&self, product_id: &str) -> PathBuf {
        self.root.join(sanitize(product_id))
    }

    /// Load the newest persisted result for a product, if any
    pub fn load_latest(&self, product_id: &str) -> Result<Option<ProductResult>, IoFailure> {
        let dir = self.product_dir(product_id);
        let Some(version) = highest_version(&dir)? else {
            return Ok(None);
        };
        let path = dir.join(format!("result_v{}.json", version));
        let json = fs::read_to_string(&path)
            .map_err(|e| IoFailure::critical(format!("read {}: {}", path.display(), e)))?;
        let result = serde_json::from_str(&json)
            .map_err(|e| IoFailure::critical(format!("parse {}: {}", path.display(), e)))?;
        Ok(Some(result))
    }
}

impl ResultStore for JsonFileStore {
    fn save(&self, result: &ProductResult) -> Result<PathBuf, IoFailure> {
        let dir = self.product_dir(&result.product_id);
        fs::create_dir_all(&dir)
            .map_err(|e| IoFailure::recoverable(format!("mkdir {}: {}", dir.display(), e)))?;

        let version = highest_version(&dir)?.map(|v| v + 1).unwrap_or(1);
        let path = dir.join(format!("result_v{}.json", version));

        let mut versioned = result.clone();
        versioned.metadata.version = version;
        let json = serde_json::to_string_pretty(&versioned)
            .map_err(|e| IoFailure::critical(format!("serialize result: {}", e)))?;
        fs::write(&path, json)
            .map_err(|e| IoFailure::recoverable(format!("write {}: {}", path.display(), e)))?;

        debug!(product_id = %result.product_id, version, path = %path.display(), "result written");
        Ok(path)
    }

    fn save_raw(
        &self,
        product_id: &str,
        chunk_index: usize,
        raw: &str,
    ) -> Result<PathBuf, IoFailure> {
        let dir = self.product_dir(product_id).join("raw");
        fs::create_dir_all(&dir)
            .map_err(|e| IoFailure::recoverable(format!("mkdir {}: {}", dir.display(), e)))?;
        let path = dir.join(format!("chunk_{}.txt", chunk_index));
        fs::write(&path, raw)
            .map_err(|e| IoFailure::recoverable(format!("write {}: {}", path.display(), e)))?;
        Ok(path)
    }
}

/// Highest `result_v<N>.json` version present in `dir`, if any
fn highest_version(dir: &Path) -> Result<Option<u32>, IoFailure> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(IoFailure::recoverable(format!(
                "list {}: {}",
                dir.display(),
                e
            )))
        }
    };

    let mut highest = None;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(version) = name
            .strip_prefix("result_v")
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|v| v.parse::<u32>().ok())
        else {
            continue;
        };
        highest = Some(highest.map_or(version, |h: u32| h.max(version)));
    }
    Ok(highest)
}

/// Make a product id safe to use as a directory name
fn sanitize(product_id: &str) -> String {
    product_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_source_reads_files_and_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, "file body").unwrap();

        let source = FileSource;
        assert_eq!(
            source.fetch(&DocumentRef::File { path: path.clone() }).unwrap(),
            "file body"
        );
        assert_eq!(
            source
                .fetch(&DocumentRef::Inline {
                    name: "n".to_string(),
                    text: "inline body".to_string()
                })
                .unwrap(),
            "inline body"
        );

        let err = source
            .fetch(&DocumentRef::File {
                path: dir.path().join("missing.txt"),
            })
            .unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_versioned_saves_never_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let result = ProductResult::new("PX 100/B", 10);
        let first = store.save(&result).unwrap();
        let second = store.save(&result).unwrap();

        assert!(first.ends_with("result_v1.json"));
        assert!(second.ends_with("result_v2.json"));
        assert!(first.exists() && second.exists());

        let latest = store.load_latest("PX 100/B").unwrap().unwrap();
        assert_eq!(latest.metadata.version, 2);
        // Slash in the id never escapes the product directory
        assert!(store.product_dir("PX 100/B").ends_with("PX_100_B"));
    }

    #[test]
    fn test_load_latest_missing_product() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        assert!(store.load_latest("nope").unwrap().is_none());
    }

    #[test]
    fn test_raw_responses_archived_per_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        let path = store.save_raw("PX", 2, "raw text").unwrap();
        assert!(path.ends_with("chunk_2.txt"));
        assert_eq!(fs::read_to_string(path).unwrap(), "raw text");
    }
}
