pub mod check;
pub mod options;
pub mod payload;
pub mod submit;

pub use check::{check, CheckArgs};
pub use options::{options, OptionsArgs};
pub use payload::{payload, PayloadArgs};
pub use submit::{submit, SubmitArgs};

use anyhow::{anyhow, Context, Result};
use clap::Args;
use formset_runtime::{FieldPath, Formset, FormsetSchema};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

/// Schema input and edits shared by `payload` and `submit`
#[derive(Args, Debug)]
pub struct FormsetInput {
    /// Formset schema (JSON)
    pub schema: PathBuf,

    /// Set a field before acting: `path=value`, value parsed as JSON or taken as text
    #[arg(short, long = "set", value_name = "PATH=VALUE")]
    pub assignments: Vec<String>,

    /// Add an instance to a repeatable collection before acting
    #[arg(short, long = "add", value_name = "COLLECTION")]
    pub additions: Vec<String>,
}

impl FormsetInput {
    /// Build the formset and apply `--add` then `--set`
    pub fn load(&self) -> Result<Formset> {
        let mut formset = load_formset(&self.schema)?;

        for collection in &self.additions {
            let path: FieldPath = collection.parse()?;
            formset.add_instance(&path)?;
        }
        for assignment in &self.assignments {
            let (path, value) = parse_assignment(assignment)?;
            formset.set_value(&path, value)?;
        }

        Ok(formset)
    }
}

pub fn load_formset(path: &Path) -> Result<Formset> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let schema = FormsetSchema::from_json(&source)?;
    Ok(Formset::new(&schema)?)
}

/// `contacts[0].phone=+41` or `customer.vip=true`
pub fn parse_assignment(text: &str) -> Result<(FieldPath, JsonValue)> {
    let (path, raw) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("Expected PATH=VALUE, got '{}'", text))?;
    let path: FieldPath = path.trim().parse()?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()));
    Ok((path, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assignment() {
        let (path, value) = parse_assignment("customer.vip=true").unwrap();
        assert_eq!(path.to_string(), "customer.vip");
        assert_eq!(value, json!(true));

        let (path, value) = parse_assignment("contacts[0].phone=+41 44").unwrap();
        assert_eq!(path.to_string(), "contacts[0].phone");
        assert_eq!(value, json!("+41 44"));

        let (_, value) = parse_assignment("tags=[\"a\",\"b\"]").unwrap();
        assert_eq!(value, json!(["a", "b"]));
    }

    #[test]
    fn test_parse_assignment_requires_equals() {
        assert!(parse_assignment("customer.vip").is_err());
        assert!(parse_assignment("a..b=1").is_err());
    }
}
