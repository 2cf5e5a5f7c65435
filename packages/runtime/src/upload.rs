//! Upload manager
//!
//! Tracks one handle per file selection. The runtime never moves bytes: it
//! hands out an [`UploadRequest`], the driver performs the transfer and
//! reports back through [`UploadManager::complete`]. Completions for a
//! handle that was abandoned in the meantime (retry, clear, instance
//! removal, reset) are dropped.
//!
//! An abandoned handle is forgotten right away unless a suspended chain is
//! watching it; the watched record is kept until that chain resolves.

use crate::error::UploadError;
use crate::path::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(pub u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "upload#{}", self.0)
    }
}

/// File handle issued by the upload endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    /// Opaque server token identifying the stored temporary file
    pub upload_temp_name: String,
    pub content_type: String,
    #[serde(default)]
    pub content_type_extra: JsonValue,
    pub name: String,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub size: u64,
}

impl FileHandle {
    /// Submitted form of the handle
    pub fn to_json(&self) -> JsonValue {
        json!({
            "upload_temp_name": self.upload_temp_name,
            "content_type": self.content_type,
            "content_type_extra": self.content_type_extra,
            "name": self.name,
            "download_url": self.download_url,
            "thumbnail_url": self.thumbnail_url,
            "size": self.size,
        })
    }
}

/// A file the user picked, as the host reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSelection {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Transfer the driver must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub handle: HandleId,
    pub field: FieldPath,
    pub file: FileSelection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum UploadStatus {
    Pending,
    Uploaded { file: FileHandle },
    Failed { reason: String },
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadHandle {
    pub id: HandleId,
    pub field: FieldPath,
    pub file_name: String,
    pub status: UploadStatus,
}

impl UploadHandle {
    pub fn thumbnail(&self) -> Option<&str> {
        match &self.status {
            UploadStatus::Uploaded { file } => file.thumbnail_url.as_deref(),
            _ => None,
        }
    }

    pub fn is_settled(&self) -> bool {
        !matches!(self.status, UploadStatus::Pending)
    }

    /// Field value while the transfer runs
    pub(crate) fn pending_value(&self, selection: &FileSelection) -> JsonValue {
        json!([{
            "handle": self.id.0,
            "name": selection.name,
            "content_type": selection.content_type,
            "size": selection.bytes.len(),
            "status": "pending",
        }])
    }
}

#[derive(Debug, Default)]
pub struct UploadManager {
    handles: BTreeMap<HandleId, UploadHandle>,
    current: BTreeMap<FieldPath, HandleId>,
    /// handle -> number of suspended chains waiting on it
    watchers: BTreeMap<HandleId, usize>,
    next_id: u64,
}

impl UploadManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: HandleId) -> Option<&UploadHandle> {
        self.handles.get(&id)
    }

    pub fn current_for(&self, field: &FieldPath) -> Option<&UploadHandle> {
        self.current.get(field).and_then(|id| self.handles.get(id))
    }

    pub fn pending(&self) -> impl Iterator<Item = &UploadHandle> {
        self.handles
            .values()
            .filter(|h| h.status == UploadStatus::Pending)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// A chain suspended on `id`
    pub(crate) fn watch(&mut self, id: HandleId) {
        *self.watchers.entry(id).or_default() += 1;
    }

    /// The chain waiting on `id` resolved; drops the record if it was abandoned
    pub(crate) fn unwatch(&mut self, id: HandleId) {
        if let Some(count) = self.watchers.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.watchers.remove(&id);
            }
        }
        self.prune(id);
    }

    fn prune(&mut self, id: HandleId) {
        let abandoned = self
            .handles
            .get(&id)
            .map_or(false, |h| h.status == UploadStatus::Abandoned);
        if abandoned && !self.watchers.contains_key(&id) {
            self.handles.remove(&id);
        }
    }

    /// Start a new transfer for `field`, abandoning whatever it had before
    pub(crate) fn begin(&mut self, field: &FieldPath, file: FileSelection) -> (UploadRequest, JsonValue) {
        self.abandon_field(field);

        let id = HandleId(self.next_id);
        self.next_id += 1;

        let handle = UploadHandle {
            id,
            field: field.clone(),
            file_name: file.name.clone(),
            status: UploadStatus::Pending,
        };
        let value = handle.pending_value(&file);
        self.handles.insert(id, handle);
        self.current.insert(field.clone(), id);

        debug!(handle = %id, field = %field, "upload started");
        (
            UploadRequest {
                handle: id,
                field: field.clone(),
                file,
            },
            value,
        )
    }

    /// Record a transfer result; `None` if the handle is no longer current
    pub(crate) fn complete(
        &mut self,
        id: HandleId,
        result: Result<FileHandle, UploadError>,
    ) -> Option<&UploadHandle> {
        let handle = self.handles.get_mut(&id)?;
        if handle.status != UploadStatus::Pending {
            debug!(handle = %id, "ignoring late upload completion");
            return None;
        }

        handle.status = match result {
            Ok(file) => UploadStatus::Uploaded { file },
            Err(error) => UploadStatus::Failed {
                reason: error.to_string(),
            },
        };
        Some(handle)
    }

    pub(crate) fn abandon_field(&mut self, field: &FieldPath) {
        if let Some(id) = self.current.remove(field) {
            self.abandon(id);
        }
    }

    /// Abandon every handle whose field lies at or below `prefix`
    pub(crate) fn abandon_under(&mut self, prefix: &FieldPath) -> usize {
        let fields: Vec<FieldPath> = self
            .current
            .keys()
            .filter(|f| f.starts_with(prefix))
            .cloned()
            .collect();
        for field in &fields {
            self.abandon_field(field);
        }
        fields.len()
    }

    pub(crate) fn abandon_all(&mut self) {
        self.abandon_under(&FieldPath::root());
    }

    /// Forget every handle; chains still waiting resolve as failed
    pub(crate) fn clear(&mut self) {
        self.abandon_all();
        self.handles.clear();
        self.watchers.clear();
    }

    fn abandon(&mut self, id: HandleId) {
        if let Some(handle) = self.handles.get_mut(&id) {
            if handle.status != UploadStatus::Abandoned {
                debug!(handle = %id, field = %handle.field, "upload abandoned");
            }
            handle.status = UploadStatus::Abandoned;
        }
        self.prune(id);
    }
}
