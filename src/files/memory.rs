//! Process-local file store, used when no upload endpoint is configured

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{FileStore, Upload};
use crate::error::PortalResult;
use crate::models::Attachment;

#[derive(Default)]
pub struct InMemoryFileStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        let guard = self.files.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(url).cloned()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn upload(&self, file: Upload) -> PortalResult<Attachment> {
        let url = format!("memory://files/{}/{}", uuid::Uuid::new_v4(), file.name);
        let size = file.bytes.len() as u64;
        let mut guard = self.files.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(url.clone(), file.bytes);
        Ok(Attachment {
            name: file.name,
            url,
            size: Some(size),
        })
    }
}
