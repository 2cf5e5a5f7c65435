//! # Formset Runtime
//!
//! Client-side runtime for one submittable formset. The host describes the
//! rendered form as a [`FormsetSchema`]; the runtime keeps the field graph,
//! evaluates `show-if` / `hide-if` / `disable-if` conditions incrementally,
//! manages repeatable collections, tracks file uploads and interprets the
//! action chains attached to controls.
//!
//! Nothing here performs I/O. Submissions, uploads and delays surface as
//! [`Suspension`]s; a driver does the work and resumes the chain with a
//! [`Resolution`].

pub mod collection;
pub mod dependency_index;
pub mod error;
pub mod evaluator;
pub mod field;
pub mod field_graph;
pub mod formset;
pub mod graph;
pub mod interpreter;
pub mod path;
pub mod schema;
pub mod sync;
mod template;
pub mod upload;
pub mod value;

#[cfg(test)]
mod tests_conditions;

#[cfg(test)]
mod tests_collections;

#[cfg(test)]
mod tests_submission;

#[cfg(test)]
mod tests_uploads;

pub use collection::CollectionNode;
pub use dependency_index::{ConditionId, ConditionKind};
pub use error::{
    CapacityError, Diagnostic, FormsetError, FormsetResult, Problem, TransportError, UploadError,
};
pub use field::{Constraints, ErrorSource, FieldNode, InputKind, Validity};
pub use formset::{
    CollectionValidity, ControlStatus, FieldView, Formset, FormsetView, ValidationReport,
};
pub use interpreter::{
    ChainState, Effect, EffectKind, Outcome, Progress, Resolution, Suspension, Waiting,
};
pub use path::{FieldPath, InstanceKey};
pub use schema::{FormsetSchema, DEFAULT_ACTIONS};
pub use sync::{SubmitRequest, SubmitResponse};
pub use upload::{FileHandle, FileSelection, HandleId, UploadHandle, UploadRequest, UploadStatus};
pub use value::Value;
