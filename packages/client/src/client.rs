//! Async driver around a [`Formset`]

use crate::error::{ClientError, ClientResult};
use crate::transport::{OptionsPage, Transport};
use formset_runtime::{
    Effect, FieldPath, FileSelection, Formset, HandleId, Outcome, Progress, Resolution,
    Suspension, UploadStatus,
};
use serde_json::Value as JsonValue;
use std::cell::RefCell;
use std::collections::BTreeSet;
use tokio::sync::Notify;
use tracing::{debug, info, instrument};

pub struct FormsetClient<T> {
    formset: RefCell<Formset>,
    transport: T,
    upload_settled: Notify,
}

impl<T: Transport> FormsetClient<T> {
    pub fn new(formset: Formset, transport: T) -> Self {
        Self {
            formset: RefCell::new(formset),
            transport,
            upload_settled: Notify::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Inspect the formset; must not be called from inside `f` recursively
    pub fn read<R>(&self, f: impl FnOnce(&Formset) -> R) -> R {
        f(&self.formset.borrow())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Formset) -> R) -> R {
        f(&mut self.formset.borrow_mut())
    }

    pub fn into_inner(self) -> Formset {
        self.formset.into_inner()
    }

    pub fn set_value(&self, path: &FieldPath, value: JsonValue) -> ClientResult<BTreeSet<FieldPath>> {
        Ok(self.formset.borrow_mut().set_value(path, value)?)
    }

    pub fn take_effects(&self) -> Vec<Effect> {
        self.formset.borrow_mut().take_effects()
    }

    /// Run a control's chain to completion
    ///
    /// Returns `Progress::Ignored` when the chain was already in flight.
    #[instrument(skip(self))]
    pub async fn activate(&self, control: &str) -> ClientResult<Progress> {
        let mut progress = self.formset.borrow_mut().activate(control)?;

        loop {
            match progress {
                Progress::Suspended(suspension) => {
                    let resolution = self.fulfil(suspension).await;
                    progress = self.formset.borrow_mut().resume(control, resolution)?;
                }
                Progress::Aborted(reason) => {
                    return Err(ClientError::Aborted {
                        control: control.to_string(),
                        reason,
                    })
                }
                done => {
                    debug!(control, progress = ?done, "chain settled");
                    return Ok(done);
                }
            }
        }
    }

    async fn fulfil(&self, suspension: Suspension) -> Resolution {
        match suspension {
            Suspension::Submit(request) => {
                Resolution::Submitted(self.transport.submit(request.body()).await)
            }
            Suspension::Delay(duration) => {
                tokio::time::sleep(duration).await;
                Resolution::Elapsed
            }
            Suspension::AwaitUpload(handle) => {
                self.wait_for_upload(handle).await;
                Resolution::UploadSettled
            }
        }
    }

    async fn wait_for_upload(&self, handle: HandleId) {
        loop {
            // registered before the check so a completion in between is not missed
            let notified = self.upload_settled.notified();
            let settled = self
                .formset
                .borrow()
                .upload(handle)
                .map(|h| h.is_settled())
                .unwrap_or(true);
            if settled {
                return;
            }
            notified.await;
        }
    }

    /// Select a file for `path` and transfer it
    ///
    /// `Ok(None)` means the transfer finished after its handle was abandoned.
    #[instrument(skip(self, file), fields(path = %path, file = %file.name))]
    pub async fn upload(&self, path: &FieldPath, file: FileSelection) -> ClientResult<Option<UploadStatus>> {
        let request = self.formset.borrow_mut().select_file(path, file)?;
        let result = self.transport.upload(&request.field, &request.file).await;

        let status = self
            .formset
            .borrow_mut()
            .complete_upload(request.handle, result);
        self.upload_settled.notify_waiters();
        Ok(status?)
    }

    /// Submit outside any control's chain
    pub async fn submit(&self) -> ClientResult<Outcome> {
        let request = self.formset.borrow_mut().begin_submission();
        let result = self.transport.submit(request.body()).await;
        let outcome = self.formset.borrow_mut().finish_submission(&request, result);
        info!(?outcome, "submission finished");
        Ok(outcome)
    }

    pub async fn fetch_options(&self, field: &str, query: &str) -> ClientResult<OptionsPage> {
        Ok(self.transport.fetch_options(field, query).await?)
    }
}
