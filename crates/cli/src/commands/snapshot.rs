//! Store snapshot files.

use std::path::{Path, PathBuf};

use odooflow_sync::Snapshot;

use super::CliError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Json,
}

/// A snapshot on disk; the format follows the file extension.
#[derive(Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    format: Format,
}

impl SnapshotFile {
    /// # Errors
    ///
    /// Returns `CliError::StoreFormat` for an unknown extension.
    pub fn new(path: &Path) -> Result<Self, CliError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let format = match extension.as_str() {
            "yaml" | "yml" => Format::Yaml,
            "json" => Format::Json,
            _ => return Err(CliError::StoreFormat(path.display().to_string())),
        };
        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    /// Read the snapshot. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `CliError::StoreFile` if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<Snapshot, CliError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "Store file not found, starting empty");
                return Ok(Snapshot::default());
            }
            Err(e) => return Err(self.error(e)),
        };
        self.decode(&content)
    }

    /// Write the snapshot back.
    ///
    /// # Errors
    ///
    /// Returns `CliError::StoreFile` if encoding or writing fails.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), CliError> {
        let content = self.encode(snapshot)?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| self.error(e))
    }

    fn decode(&self, content: &str) -> Result<Snapshot, CliError> {
        match self.format {
            Format::Yaml => serde_yaml::from_str(content).map_err(|e| self.error(e)),
            Format::Json => serde_json::from_str(content).map_err(|e| self.error(e)),
        }
    }

    fn encode(&self, snapshot: &Snapshot) -> Result<String, CliError> {
        match self.format {
            Format::Yaml => serde_yaml::to_string(snapshot).map_err(|e| self.error(e)),
            Format::Json => serde_json::to_string_pretty(snapshot).map_err(|e| self.error(e)),
        }
    }

    fn error(&self, e: impl std::fmt::Display) -> CliError {
        CliError::StoreFile {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_follows_extension() {
        assert_eq!(
            SnapshotFile::new(Path::new("store.YML")).unwrap().format,
            Format::Yaml
        );
        assert_eq!(
            SnapshotFile::new(Path::new("dump/store.json")).unwrap().format,
            Format::Json
        );
        assert!(matches!(
            SnapshotFile::new(Path::new("store.toml")),
            Err(CliError::StoreFormat(_))
        ));
    }

    #[test]
    fn test_empty_yaml_document_fields_default() {
        let file = SnapshotFile::new(Path::new("store.yaml")).unwrap();
        let snapshot = file.decode("orders: []\n").unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let path = std::env::temp_dir().join("odooflow-missing-store-file.json");
        let _ = std::fs::remove_file(&path);
        let snapshot = SnapshotFile::new(&path).unwrap().load().await.unwrap();
        assert_eq!(snapshot, Snapshot::default());
    }
}
