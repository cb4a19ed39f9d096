//! Shared photo gallery.
//!
//! Uploads land under `pairs/{pair_key}/memories/{millis}_{file_name}` in the
//! blob store; the record is created only after the upload succeeded.

use crate::binding::{BindingStatus, SharedStore};
use crate::model::feature::Memory;
use crate::model::record::{FeatureRecord, Fields, RecordId};
use crate::session::AppSession;
use crate::store::blob::sanitize_file_name;
use crate::store::{BlobStore, Clock};
use crate::view::{ScopedView, ViewError, ViewResult, ViewState};
use log::info;
use serde_json::Value;
use std::sync::Arc;

/// Blob store handle shared across views.
pub type SharedBlobStore = Arc<dyn BlobStore + Send + Sync>;

/// Most-recent-first gallery.
pub struct MemoriesView {
    view: ScopedView<Memory>,
    blobs: SharedBlobStore,
    clock: Arc<dyn Clock>,
}

impl MemoriesView {
    pub fn new(store: SharedStore, blobs: SharedBlobStore, clock: Arc<dyn Clock>) -> Self {
        Self {
            view: ScopedView::new(store),
            blobs,
            clock,
        }
    }

    pub fn sync_scope(&mut self, session: &AppSession) -> ViewState {
        self.view.sync_scope(session)
    }

    pub fn dispose(&mut self) {
        self.view.dispose();
    }

    pub fn state(&self) -> ViewState {
        self.view.state()
    }

    pub fn status(&self) -> Option<BindingStatus> {
        self.view.status()
    }

    /// Uploads a photo and records it with an empty description.
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> ViewResult<RecordId> {
        if bytes.is_empty() {
            return Err(ViewError::InvalidInput("file is empty".to_string()));
        }
        let (binding, me) = self.view.author()?;
        let path = format!(
            "pairs/{}/memories/{}_{}",
            binding.scope(),
            self.clock.now_ms(),
            sanitize_file_name(file_name)
        );
        let url = self.blobs.upload_blob(&path, bytes)?;
        let id = binding.create(&Memory {
            url,
            uploader: me.clone(),
            description: String::new(),
        })?;
        info!(
            "event=memory_upload module=view status=ok bytes={}",
            bytes.len()
        );
        Ok(id)
    }

    /// Overwrites the caption of a listed memory.
    pub fn describe(&self, id: &RecordId, description: &str) -> ViewResult<()> {
        let binding = self.view.binding()?;
        if binding.record(id).is_none() {
            return Err(ViewError::UnknownRecord(id.clone()));
        }
        let mut fields = Fields::new();
        fields.insert(
            "description".to_string(),
            Value::String(description.trim().to_string()),
        );
        binding.update_fields(id, fields)?;
        Ok(())
    }

    pub fn memories(&self) -> Vec<FeatureRecord<Memory>> {
        self.view.records()
    }
}
