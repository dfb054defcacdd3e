//! In-memory file storage used as the blob-store test double.

use resource_engine::blob::{FileStorage, MemoryFileStorage};
use resource_engine::record::attachments::append_name;

#[tokio::test]
async fn upload_then_delete_round_trip() {
    let storage = MemoryFileStorage::new();
    let name = storage.upload(b"bytes".to_vec(), "photo.png").await.unwrap();
    assert!(storage.contains(&name));
    storage.delete(&name).await.unwrap();
    assert!(!storage.contains(&name));
}

#[tokio::test]
async fn deleting_unknown_filename_is_not_an_error() {
    let storage = MemoryFileStorage::new();
    storage.delete("never-uploaded.png").await.unwrap();
    assert!(storage.is_empty());
}

#[tokio::test]
async fn uploaded_names_are_list_safe() {
    let storage = MemoryFileStorage::new();
    let name = storage
        .upload(b"x".to_vec(), "weird, name.png")
        .await
        .unwrap();
    // The generated filename must survive the comma-delimited list layout.
    let list = append_name(None, &name);
    assert_eq!(list.matches(',').count(), 1);
}
