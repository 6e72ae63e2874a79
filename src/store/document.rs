//! JSON document store.
//!
//! Records live in flat JSON-array files under the data directory, one file
//! per collection. Appends are read-modify-rewrite of the whole file under a
//! per-collection lock, which serializes writers within this process. Reads
//! never fail: a missing or corrupt file is treated as an empty collection,
//! so a damaged store degrades to losing history rather than wedging the
//! host.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::models::TestRecord;

/// Record collections the store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Tests,
    Images,
}

impl Collection {
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Tests => "tests.json",
            Collection::Images => "images.json",
        }
    }
}

pub struct DocumentStore {
    root: PathBuf,
    tests_lock: Mutex<()>,
    images_lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tests_lock: Mutex::new(()),
            images_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.file_name())
    }

    fn lock_for(&self, collection: Collection) -> &Mutex<()> {
        match collection {
            Collection::Tests => &self.tests_lock,
            Collection::Images => &self.images_lock,
        }
    }

    /// Create the data directory and seed each collection file with an empty
    /// array. Existing files are left alone, so this is safe to call on
    /// every startup.
    pub async fn ensure(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        for collection in [Collection::Tests, Collection::Images] {
            let path = self.collection_path(collection);
            if !path.exists() {
                tokio::fs::write(&path, "[]").await?;
            }
        }
        Ok(())
    }

    /// Read every record in a collection. Missing or unparseable files
    /// yield an empty list.
    pub async fn read_all(&self, collection: Collection) -> Vec<serde_json::Value> {
        let path = self.collection_path(collection);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(file = collection.file_name(), error = %e, "Corrupt collection file, treating as empty");
                Vec::new()
            }
        }
    }

    /// Append one record, rewriting the whole collection file.
    pub async fn append(&self, collection: Collection, record: serde_json::Value) -> Result<()> {
        let _guard = self.lock_for(collection).lock().await;

        let mut records = self.read_all(collection).await;
        records.push(record);

        let content = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(self.collection_path(collection), content).await?;
        Ok(())
    }

    /// Save a test record, assigning a fallback id when none was given.
    /// Returns the record as stored.
    pub async fn append_test(&self, mut test: TestRecord) -> Result<TestRecord> {
        test.ensure_id();
        self.append(Collection::Tests, serde_json::to_value(&test)?)
            .await?;
        Ok(test)
    }

    /// List test records, optionally filtered by patient, newest first.
    /// Records that no longer deserialize are skipped.
    pub async fn list_tests(&self, patient_id: Option<&str>) -> Vec<TestRecord> {
        let mut tests: Vec<TestRecord> = self
            .read_all(Collection::Tests)
            .await
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .filter(|test: &TestRecord| {
                patient_id.is_none_or(|id| test.patient_id == id)
            })
            .collect();
        tests.sort_by(|a, b| b.date.cmp(&a.date));
        tests
    }

    /// Look up a single test by id.
    pub async fn find_test(&self, id: &str) -> Option<TestRecord> {
        self.list_tests(None).await.into_iter().find(|t| t.id == id)
    }
}
