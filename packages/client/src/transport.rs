//! Transport abstraction between the client and the server endpoint

use formset_runtime::{FieldPath, FileHandle, FileSelection, SubmitResponse, TransportError, UploadError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One remote choice for a select field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionItem {
    pub id: JsonValue,
    pub label: String,
}

/// Response of an option lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionsPage {
    pub query: String,
    pub count: usize,
    pub total_count: usize,
    pub items: Vec<OptionItem>,
}

/// Server exchanges a formset needs
///
/// Futures are not required to be `Send`; the client runs on one thread.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send a serialized submission body
    async fn submit(&self, body: &JsonValue) -> Result<SubmitResponse, TransportError>;

    /// Transfer one selected file
    async fn upload(&self, field: &FieldPath, file: &FileSelection) -> Result<FileHandle, UploadError>;

    /// Look up remote choices; `field` is `<form>.<field>`
    async fn fetch_options(&self, field: &str, query: &str) -> Result<OptionsPage, TransportError>;
}
