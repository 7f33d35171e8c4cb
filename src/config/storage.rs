use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 從本機檔案系統讀取匯入檔案；相對路徑以 base_path 為起點
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }
}

impl Default for LocalStorage {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(Path::new(path));
        tracing::debug!("Reading {}", full_path.display());
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ImportError;

    #[tokio::test]
    async fn test_reads_relative_to_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("incidencias.csv"), b"Numero;Cliente\n1;C1\n").unwrap();

        let storage = LocalStorage::new(dir.path());
        let data = storage.read_file("incidencias.csv").await.unwrap();
        assert!(data.starts_with(b"Numero"));

        let missing = storage.read_file("nope.csv").await;
        assert!(matches!(missing, Err(ImportError::IoError(_))));
    }
}
