//! Captured-image persistence.
//!
//! Image bytes land under `<data>/images/<Kind>/` with a timestamped
//! filename; the metadata record is appended to the `images` collection only
//! after the file write succeeds, so the collection never references a file
//! that was not written.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::models::{ids, ImageRecord, SampleKind};
use crate::store::{Collection, DocumentStore};

impl DocumentStore {
    fn image_dir(&self, kind: SampleKind) -> PathBuf {
        self.root().join("images").join(kind.as_str())
    }

    /// Write image bytes to the kind's partition directory and append a
    /// record pointing at them. Returns the record as stored.
    pub async fn save_image(
        &self,
        test_id: &str,
        kind: SampleKind,
        data: &[u8],
    ) -> Result<ImageRecord> {
        let dir = self.image_dir(kind);
        tokio::fs::create_dir_all(&dir).await?;

        let path = dir.join(ids::generate_capture_name());
        tokio::fs::write(&path, data).await?;

        let record = ImageRecord {
            test_id: test_id.to_string(),
            kind,
            path: path.to_string_lossy().into_owned(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.append(Collection::Images, serde_json::to_value(&record)?)
            .await?;

        info!(test_id, kind = kind.as_str(), path = %path.display(), "Saved capture");
        Ok(record)
    }

    /// List image records, optionally filtered by the test they belong to.
    pub async fn list_images(&self, test_id: Option<&str>) -> Vec<ImageRecord> {
        self.read_all(Collection::Images)
            .await
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .filter(|record: &ImageRecord| {
                test_id.is_none_or(|id| record.test_id == id)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_image_writes_bytes_then_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure().await.unwrap();

        let record = store
            .save_image("test-1", SampleKind::Blood, b"\x89PNG fake")
            .await
            .unwrap();

        assert_eq!(record.test_id, "test-1");
        assert!(record.path.contains("images/Blood/capture-"));
        let bytes = tokio::fs::read(&record.path).await.unwrap();
        assert_eq!(bytes, b"\x89PNG fake");

        let listed = store.list_images(None).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0], record);
    }

    #[tokio::test]
    async fn test_images_partitioned_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure().await.unwrap();

        let blood = store
            .save_image("test-1", SampleKind::Blood, b"b")
            .await
            .unwrap();
        let stool = store
            .save_image("test-1", SampleKind::Stool, b"s")
            .await
            .unwrap();

        assert!(blood.path.contains("/Blood/"));
        assert!(stool.path.contains("/Stool/"));
    }

    #[tokio::test]
    async fn test_list_images_filters_by_test() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.ensure().await.unwrap();

        store
            .save_image("test-1", SampleKind::Blood, b"a")
            .await
            .unwrap();
        store
            .save_image("test-2", SampleKind::Blood, b"b")
            .await
            .unwrap();

        assert_eq!(store.list_images(Some("test-2")).await.len(), 1);
        assert_eq!(store.list_images(None).await.len(), 2);
    }
}
