//! Browser bindings for the formset runtime
//!
//! Everything crosses the boundary as JSON strings. The page owns the
//! network: when a chain suspends, the returned progress tells it what to
//! do, and it answers through `resume`.

use formset_runtime::{
    FieldPath, FileHandle, FileSelection, Formset, HandleId, Progress, Resolution,
    SubmitRequest, SubmitResponse, Suspension, TransportError, UploadError,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

type BindingResult<T> = Result<T, String>;

fn to_js(message: String) -> JsValue {
    JsValue::from_str(&message)
}

fn parse_path(path: &str) -> BindingResult<FieldPath> {
    path.parse().map_err(|e| format!("Invalid path: {}", e))
}

fn parse_json<'a, T: Deserialize<'a>>(what: &str, source: &'a str) -> BindingResult<T> {
    serde_json::from_str(source).map_err(|e| format!("Invalid {}: {}", what, e))
}

fn to_json(value: &impl serde::Serialize) -> BindingResult<String> {
    serde_json::to_string(value).map_err(|e| format!("Serialization error: {}", e))
}

/// The page's answer to a suspended chain or a plain submission
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ResolutionInput {
    Submitted {
        #[serde(default)]
        response: Option<SubmitResponse>,
        #[serde(default)]
        error: Option<String>,
    },
    Elapsed,
    UploadSettled,
}

impl ResolutionInput {
    fn into_resolution(self) -> Resolution {
        match self {
            ResolutionInput::Submitted { response, error } => {
                Resolution::Submitted(submitted(response, error))
            }
            ResolutionInput::Elapsed => Resolution::Elapsed,
            ResolutionInput::UploadSettled => Resolution::UploadSettled,
        }
    }
}

fn submitted(
    response: Option<SubmitResponse>,
    error: Option<String>,
) -> Result<SubmitResponse, TransportError> {
    match (response, error) {
        (Some(response), None) => Ok(response),
        (_, Some(error)) => Err(TransportError::Network(error)),
        (None, None) => Err(TransportError::Network("no response".to_string())),
    }
}

/// Outcome of one transfer as reported by the page
#[derive(Debug, Deserialize)]
struct UploadResult {
    #[serde(default)]
    file: Option<FileHandle>,
    #[serde(default)]
    error: Option<String>,
}

fn progress_json(progress: &Progress) -> JsonValue {
    match progress {
        Progress::Ignored => json!({ "progress": "ignored" }),
        Progress::Completed(outcome) => json!({ "progress": "completed", "outcome": outcome }),
        Progress::Aborted(reason) => json!({ "progress": "aborted", "reason": reason }),
        Progress::Suspended(Suspension::Submit(request)) => json!({
            "progress": "suspended",
            "waiting": "submission",
            "body": request.body(),
        }),
        Progress::Suspended(Suspension::Delay(duration)) => json!({
            "progress": "suspended",
            "waiting": "delay",
            "ms": duration.as_millis() as u64,
        }),
        Progress::Suspended(Suspension::AwaitUpload(handle)) => json!({
            "progress": "suspended",
            "waiting": "upload",
            "handle": handle,
        }),
    }
}

#[wasm_bindgen]
pub struct FormsetHandle {
    formset: Formset,
    /// Plain submission awaiting `finishSubmission`
    pending: Option<SubmitRequest>,
}

impl FormsetHandle {
    fn build(schema: &str) -> BindingResult<Self> {
        let formset = Formset::from_json(schema).map_err(|e| e.to_string())?;
        Ok(Self {
            formset,
            pending: None,
        })
    }

    fn diagnostics_json(&self) -> JsonValue {
        let diagnostics: Vec<String> = self
            .formset
            .diagnostics()
            .iter()
            .map(|d| d.to_string())
            .collect();
        json!(diagnostics)
    }

    fn set(&mut self, path: &str, value: &str) -> BindingResult<String> {
        let path = parse_path(path)?;
        let value: JsonValue = parse_json("value", value)?;
        let changed = self
            .formset
            .set_value(&path, value)
            .map_err(|e| e.to_string())?;
        to_json(&changed)
    }

    fn run(&mut self, control: &str) -> BindingResult<String> {
        let progress = self.formset.activate(control).map_err(|e| e.to_string())?;
        to_json(&progress_json(&progress))
    }

    fn answer(&mut self, control: &str, resolution: &str) -> BindingResult<String> {
        let input: ResolutionInput = parse_json("resolution", resolution)?;
        let progress = self
            .formset
            .resume(control, input.into_resolution())
            .map_err(|e| e.to_string())?;
        to_json(&progress_json(&progress))
    }

    fn select(&mut self, path: &str, file: &str) -> BindingResult<u64> {
        let path = parse_path(path)?;
        let file: FileSelection = parse_json("file", file)?;
        let request = self
            .formset
            .select_file(&path, file)
            .map_err(|e| e.to_string())?;
        Ok(request.handle.0)
    }

    fn complete(&mut self, handle: u64, result: &str) -> BindingResult<String> {
        let result: UploadResult = parse_json("upload result", result)?;
        let result = match (result.file, result.error) {
            (Some(file), None) => Ok(file),
            (_, Some(error)) => Err(UploadError::Transfer(error)),
            (None, None) => Err(UploadError::Transfer("no file returned".to_string())),
        };
        let status = self
            .formset
            .complete_upload(HandleId(handle), result)
            .map_err(|e| e.to_string())?;
        to_json(&status)
    }

    fn finish(&mut self, resolution: &str) -> BindingResult<String> {
        let input: ResolutionInput = parse_json("resolution", resolution)?;
        let ResolutionInput::Submitted { response, error } = input else {
            return Err("Expected a submission result".to_string());
        };
        let request = self
            .pending
            .take()
            .ok_or_else(|| "No submission in flight".to_string())?;
        let result = submitted(response, error);
        to_json(&self.formset.finish_submission(&request, result))
    }
}

#[wasm_bindgen]
impl FormsetHandle {
    #[wasm_bindgen(constructor)]
    pub fn new(schema: &str) -> Result<FormsetHandle, JsValue> {
        Self::build(schema).map_err(to_js)
    }

    /// Init-time problems with conditions and action chains
    pub fn diagnostics(&self) -> String {
        self.diagnostics_json().to_string()
    }

    /// Returns the paths whose visibility, enablement or value changed
    #[wasm_bindgen(js_name = setValue)]
    pub fn set_value(&mut self, path: &str, value: &str) -> Result<String, JsValue> {
        self.set(path, value).map_err(to_js)
    }

    pub fn view(&self) -> Result<String, JsValue> {
        to_json(&self.formset.view()).map_err(to_js)
    }

    pub fn payload(&self) -> String {
        self.formset.submission_payload().to_string()
    }

    pub fn validate(&mut self) -> Result<String, JsValue> {
        to_json(&self.formset.validate()).map_err(to_js)
    }

    #[wasm_bindgen(js_name = addInstance)]
    pub fn add_instance(&mut self, collection: &str) -> Result<String, JsValue> {
        let collection = parse_path(collection).map_err(to_js)?;
        let path = self
            .formset
            .add_instance(&collection)
            .map_err(|e| to_js(e.to_string()))?;
        Ok(path.to_string())
    }

    #[wasm_bindgen(js_name = removeInstance)]
    pub fn remove_instance(&mut self, collection: &str, index: usize) -> Result<(), JsValue> {
        let collection = parse_path(collection).map_err(to_js)?;
        self.formset
            .remove_instance(&collection, index)
            .map_err(|e| to_js(e.to_string()))
    }

    pub fn activate(&mut self, control: &str) -> Result<String, JsValue> {
        self.run(control).map_err(to_js)
    }

    pub fn resume(&mut self, control: &str, resolution: &str) -> Result<String, JsValue> {
        self.answer(control, resolution).map_err(to_js)
    }

    /// Start a transfer; returns the handle to report its result against
    #[wasm_bindgen(js_name = selectFile)]
    pub fn select_file(&mut self, path: &str, file: &str) -> Result<u64, JsValue> {
        self.select(path, file).map_err(to_js)
    }

    #[wasm_bindgen(js_name = completeUpload)]
    pub fn complete_upload(&mut self, handle: u64, result: &str) -> Result<String, JsValue> {
        self.complete(handle, result).map_err(to_js)
    }

    /// Serialize for a submission made outside any control's chain
    #[wasm_bindgen(js_name = beginSubmission)]
    pub fn begin_submission(&mut self) -> String {
        let request = self.formset.begin_submission();
        let body = request.body().to_string();
        self.pending = Some(request);
        body
    }

    #[wasm_bindgen(js_name = finishSubmission)]
    pub fn finish_submission(&mut self, resolution: &str) -> Result<String, JsValue> {
        self.finish(resolution).map_err(to_js)
    }

    pub fn reset(&mut self) {
        self.formset.reset();
    }

    #[wasm_bindgen(js_name = takeEffects)]
    pub fn take_effects(&mut self) -> Result<String, JsValue> {
        to_json(&self.formset.take_effects()).map_err(to_js)
    }
}
