//! Stable field and collection paths
//!
//! A path names one node of the formset tree: `contacts[2].phone`. Name
//! segments come from the schema, instance segments carry the stable key a
//! repeatable collection assigned when the instance was created. Keys are
//! never reused within a session, so removing `contacts[1]` leaves
//! `contacts[2]` untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Stable identity of one instance inside a repeatable collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceKey(pub u32);

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    Name(String),
    Instance(InstanceKey),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid field path '{0}'")]
pub struct PathError(pub String);

/// Serialized in its display form so paths can key JSON objects
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    segments: Vec<Segment>,
}

impl FieldPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Name(name.to_string()));
        Self { segments }
    }

    pub fn instance(&self, key: InstanceKey) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Instance(key));
        Self { segments }
    }

    /// Append a dotted reference (`contact.kind`) below this path
    pub fn join_names<S: AsRef<str>>(&self, names: &[S]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(names.iter().map(|n| Segment::Name(n.as_ref().to_string())));
        Self { segments }
    }

    pub fn parent(&self) -> Option<FieldPath> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn starts_with(&self, prefix: &FieldPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// The trailing name segment, if the path ends in one
    pub fn name(&self) -> Option<&str> {
        match self.segments.last() {
            Some(Segment::Name(name)) => Some(name),
            _ => None,
        }
    }

    pub fn last_instance(&self) -> Option<InstanceKey> {
        match self.segments.last() {
            Some(Segment::Instance(key)) => Some(*key),
            _ => None,
        }
    }

    /// Proper prefixes, innermost first, ending with the root
    pub fn ancestors(&self) -> impl Iterator<Item = FieldPath> + '_ {
        (0..self.segments.len()).rev().map(move |len| Self {
            segments: self.segments[..len].to_vec(),
        })
    }

    /// Schema-level name with instance keys dropped: `contacts.phone`
    pub fn declaration(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Name(name) => Some(name.as_str()),
                Segment::Instance(_) => None,
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for segment in &self.segments {
            match segment {
                Segment::Name(name) => {
                    if !first {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                Segment::Instance(key) => write!(f, "[{}]", key)?,
            }
            first = false;
        }
        Ok(())
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.to_string()
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PathError(s.to_string());
        let mut segments = Vec::new();

        if s.is_empty() {
            return Ok(Self::root());
        }

        for part in s.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(at) => (&part[..at], &part[at..]),
                None => (part, ""),
            };
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
                return Err(invalid());
            }
            segments.push(Segment::Name(name.to_string()));

            while !rest.is_empty() {
                let close = rest.find(']').ok_or_else(invalid)?;
                if !rest.starts_with('[') {
                    return Err(invalid());
                }
                let key = rest[1..close].parse::<u32>().map_err(|_| invalid())?;
                segments.push(Segment::Instance(InstanceKey(key)));
                rest = &rest[close + 1..];
            }
        }

        Ok(Self { segments })
    }
}
