//! LanceDB connection management.
//!
//! Provides `LanceVectorStore`, which wraps a `lancedb::Connection` at a
//! filesystem path and opens (or creates) tables from Arrow schemas.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow_schema::Schema;

/// LanceDB connection for the per-layer vector tables.
pub struct LanceVectorStore {
    db: lancedb::Connection,
    base_path: PathBuf,
}

impl LanceVectorStore {
    /// Open or create a LanceDB store at `base_path`.
    ///
    /// Creates the directory if it does not exist.
    pub async fn new(base_path: &Path) -> Result<Self, lancedb::Error> {
        std::fs::create_dir_all(base_path).map_err(|e| lancedb::Error::CreateDir {
            path: base_path.display().to_string(),
            source: e,
        })?;

        let uri = base_path.to_str().ok_or_else(|| lancedb::Error::InvalidInput {
            message: format!("Path contains invalid UTF-8: {}", base_path.display()),
        })?;

        let db = lancedb::connect(uri).execute().await?;

        Ok(Self {
            db,
            base_path: base_path.to_path_buf(),
        })
    }

    /// Open `table_name`, creating it empty with `schema` if missing.
    pub async fn ensure_table(
        &self,
        table_name: &str,
        schema: Arc<Schema>,
    ) -> Result<lancedb::Table, lancedb::Error> {
        match self.db.open_table(table_name).execute().await {
            Ok(table) => Ok(table),
            Err(lancedb::Error::TableNotFound { .. }) => {
                self.db
                    .create_empty_table(table_name, schema)
                    .execute()
                    .await
            }
            Err(e) => Err(e),
        }
    }

    /// List all table names in the database.
    pub async fn table_names(&self) -> Result<Vec<String>, lancedb::Error> {
        self.db.table_names().execute().await
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::schema::layer_vector_schema;

    #[tokio::test]
    async fn test_connection_creates_directory() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("vectors");

        let store = LanceVectorStore::new(&path).await.unwrap();

        assert!(path.is_dir());
        assert_eq!(store.base_path(), path.as_path());
        assert!(store.table_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_table_creates_and_reopens() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = LanceVectorStore::new(temp_dir.path()).await.unwrap();
        let schema = Arc::new(layer_vector_schema(4));

        let table = store
            .ensure_table("memory_personas", schema.clone())
            .await
            .unwrap();
        assert_eq!(table.count_rows(None).await.unwrap(), 0);

        store.ensure_table("memory_personas", schema).await.unwrap();
        assert_eq!(store.table_names().await.unwrap(), vec!["memory_personas"]);
    }
}
