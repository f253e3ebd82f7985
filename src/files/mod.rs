//! File Store collaborator
//!
//! Uploads happen before the message that references them: the client
//! uploads, gets an [`Attachment`] back, then posts the message.

mod http;
mod memory;

pub use http::HttpFileStore;
pub use memory::InMemoryFileStore;

use async_trait::async_trait;

use crate::error::{PortalError, PortalResult};
use crate::models::Attachment;

/// A file on its way to the store.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store the file and return where it lives. Outages are `Upstream`.
    async fn upload(&self, file: Upload) -> PortalResult<Attachment>;
}

/// Validate, then upload, retrying an upstream failure once.
pub async fn upload_with_retry(
    store: &dyn FileStore,
    file: Upload,
    max_bytes: u64,
) -> PortalResult<Attachment> {
    if file.name.trim().is_empty() {
        return Err(PortalError::validation("file name must not be empty"));
    }
    if file.bytes.is_empty() {
        return Err(PortalError::validation("file must not be empty"));
    }
    if file.bytes.len() as u64 > max_bytes {
        return Err(PortalError::validation(format!(
            "file exceeds {} bytes",
            max_bytes
        )));
    }

    match store.upload(file.clone()).await {
        Err(PortalError::Upstream(reason)) => {
            tracing::warn!("Upload of {} failed ({}), retrying once", file.name, reason);
            store.upload(file).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` uploads.
    struct FlakyStore {
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FileStore for FlakyStore {
        async fn upload(&self, file: Upload) -> PortalResult<Attachment> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(PortalError::Upstream("connection reset".into()));
            }
            Ok(Attachment {
                name: file.name,
                url: "https://files.example/1".into(),
                size: Some(file.bytes.len() as u64),
            })
        }
    }

    fn upload() -> Upload {
        Upload {
            name: "surat.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_retries_once() {
        let store = FlakyStore {
            failures: 1,
            calls: AtomicUsize::new(0),
        };
        let attachment = upload_with_retry(&store, upload(), 1024).await.unwrap();
        assert_eq!(attachment.size, Some(3));
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_second_failure() {
        let store = FlakyStore {
            failures: 5,
            calls: AtomicUsize::new(0),
        };
        let err = upload_with_retry(&store, upload(), 1024).await.unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_FAILURE");
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejects_bad_files_without_calling_store() {
        let store = FlakyStore {
            failures: 0,
            calls: AtomicUsize::new(0),
        };
        let mut empty = upload();
        empty.bytes.clear();
        let err = tokio_test::block_on(upload_with_retry(&store, empty, 1024)).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));

        let err = tokio_test::block_on(upload_with_retry(&store, upload(), 2)).unwrap_err();
        assert!(matches!(err, PortalError::Validation(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }
}
