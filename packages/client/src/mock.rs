use crate::transport::{OptionsPage, Transport};
use formset_runtime::{
    FieldPath, FileHandle, FileSelection, SubmitResponse, TransportError, UploadError,
};
use serde_json::Value as JsonValue;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// Scripted transport for testing
///
/// Each call pops the next scripted result and yields once before
/// answering, so other tasks get a chance to run while a request is "in
/// flight". An exhausted script answers with a network error.
#[derive(Default)]
pub struct MockTransport {
    submissions: RefCell<VecDeque<Result<SubmitResponse, TransportError>>>,
    uploads: RefCell<VecDeque<Result<FileHandle, UploadError>>>,
    options: RefCell<VecDeque<Result<OptionsPage, TransportError>>>,
    pub submitted: RefCell<Vec<JsonValue>>,
    pub uploaded: RefCell<Vec<(FieldPath, String)>>,
    submit_calls: Cell<usize>,
    upload_calls: Cell<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_submit(&self, result: Result<SubmitResponse, TransportError>) -> &Self {
        self.submissions.borrow_mut().push_back(result);
        self
    }

    pub fn push_upload(&self, result: Result<FileHandle, UploadError>) -> &Self {
        self.uploads.borrow_mut().push_back(result);
        self
    }

    pub fn push_options(&self, result: Result<OptionsPage, TransportError>) -> &Self {
        self.options.borrow_mut().push_back(result);
        self
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.get()
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.get()
    }
}

fn exhausted(what: &str) -> TransportError {
    TransportError::Network(format!("no scripted {} response", what))
}

impl Transport for MockTransport {
    async fn submit(&self, body: &JsonValue) -> Result<SubmitResponse, TransportError> {
        self.submit_calls.set(self.submit_calls.get() + 1);
        self.submitted.borrow_mut().push(body.clone());
        tokio::task::yield_now().await;

        let next = self.submissions.borrow_mut().pop_front();
        next.unwrap_or_else(|| Err(exhausted("submit")))
    }

    async fn upload(&self, field: &FieldPath, file: &FileSelection) -> Result<FileHandle, UploadError> {
        self.upload_calls.set(self.upload_calls.get() + 1);
        self.uploaded
            .borrow_mut()
            .push((field.clone(), file.name.clone()));
        tokio::task::yield_now().await;

        let next = self.uploads.borrow_mut().pop_front();
        next.unwrap_or_else(|| Err(exhausted("upload").into()))
    }

    async fn fetch_options(&self, _field: &str, _query: &str) -> Result<OptionsPage, TransportError> {
        tokio::task::yield_now().await;
        let next = self.options.borrow_mut().pop_front();
        next.unwrap_or_else(|| Err(exhausted("options")))
    }
}
