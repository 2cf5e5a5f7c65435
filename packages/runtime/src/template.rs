//! Compiled schema templates
//!
//! The schema is checked and its condition attributes parsed once, up
//! front. Every instance of a repeatable collection then shares the same
//! `Arc<Expr>`s, so adding an instance never re-parses anything.

use crate::dependency_index::ConditionKind;
use crate::error::{Diagnostic, FormsetError, FormsetResult, Problem};
use crate::field::{Constraints, InputKind};
use crate::graph::DeclarationGraph;
use crate::schema::{Cardinality, CollectionSchema, ConditionSchema, FieldSchema, NodeSchema};
use formset_parser::{parse_expression, Expr};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub(crate) struct CompiledCondition {
    pub kind: ConditionKind,
    pub expr: Arc<Expr>,
}

#[derive(Debug)]
pub(crate) struct FieldTemplate {
    pub name: String,
    pub input: InputKind,
    pub initial: Option<JsonValue>,
    pub constraints: Constraints,
    pub conditions: Vec<CompiledCondition>,
}

#[derive(Debug)]
pub(crate) struct CollectionTemplate {
    pub name: String,
    pub cardinality: Cardinality,
    pub children: Vec<TemplateNode>,
    pub initial: Vec<JsonValue>,
    pub conditions: Vec<CompiledCondition>,
}

#[derive(Debug, Clone)]
pub(crate) enum TemplateNode {
    Field(Arc<FieldTemplate>),
    Collection(Arc<CollectionTemplate>),
}

/// One parsed attribute before cycle checking
struct Declared {
    kind: ConditionKind,
    text: String,
    expr: Arc<Expr>,
}

#[derive(Default)]
struct Declarations {
    fields: BTreeSet<String>,
    /// owner declaration -> parsed conditions
    conditions: BTreeMap<String, Vec<Declared>>,
    /// field declaration -> enclosing collection declarations
    enclosing: BTreeMap<String, Vec<String>>,
}

/// Check the schema and build the root template
pub(crate) fn compile(
    nodes: &[NodeSchema],
    diagnostics: &mut Vec<Diagnostic>,
) -> FormsetResult<Arc<CollectionTemplate>> {
    let mut declarations = Declarations::default();
    check_level(nodes, "", &[], &mut declarations, diagnostics)?;
    reject_cycles(&mut declarations, diagnostics);

    let children = build_children(nodes, "", &declarations);
    Ok(Arc::new(CollectionTemplate {
        name: String::new(),
        cardinality: Cardinality::Singleton,
        children,
        initial: Vec::new(),
        conditions: Vec::new(),
    }))
}

fn declaration_of(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn check_level(
    nodes: &[NodeSchema],
    prefix: &str,
    enclosing: &[String],
    declarations: &mut Declarations,
    diagnostics: &mut Vec<Diagnostic>,
) -> FormsetResult<()> {
    let mut seen = HashSet::new();

    for node in nodes {
        let name = node.name();
        if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-') {
            return Err(FormsetError::InvalidSchema(format!(
                "'{}' is not a valid name (under '{}')",
                name, prefix
            )));
        }
        if !seen.insert(name) {
            return Err(FormsetError::InvalidSchema(format!(
                "duplicate name '{}'",
                declaration_of(prefix, name)
            )));
        }

        let declaration = declaration_of(prefix, name);
        let parsed = parse_conditions(&declaration, node.conditions(), diagnostics);
        if !parsed.is_empty() {
            declarations.conditions.insert(declaration.clone(), parsed);
        }

        match node {
            NodeSchema::Field(field) => {
                check_field(field, &declaration)?;
                declarations.fields.insert(declaration.clone());
                declarations
                    .enclosing
                    .insert(declaration, enclosing.to_vec());
            }
            NodeSchema::Collection(collection) => {
                check_collection(collection, &declaration)?;
                let mut inner = enclosing.to_vec();
                inner.push(declaration.clone());
                check_level(&collection.children, &declaration, &inner, declarations, diagnostics)?;
            }
        }
    }

    Ok(())
}

fn check_field(field: &FieldSchema, declaration: &str) -> FormsetResult<()> {
    if let (Some(min), Some(max)) = (field.min_length, field.max_length) {
        if min > max {
            return Err(FormsetError::InvalidSchema(format!(
                "'{}' has minLength {} above maxLength {}",
                declaration, min, max
            )));
        }
    }
    Ok(())
}

fn check_collection(collection: &CollectionSchema, declaration: &str) -> FormsetResult<()> {
    if let Cardinality::Repeatable { min, max } = collection.cardinality {
        match max {
            Some(0) => {
                return Err(FormsetError::InvalidSchema(format!(
                    "'{}' allows no instances",
                    declaration
                )))
            }
            Some(max) if min > max => {
                return Err(FormsetError::InvalidSchema(format!(
                    "'{}' has min {} above max {}",
                    declaration, min, max
                )))
            }
            _ => {}
        }
        if let Some(max) = max {
            if collection.initial.len() > max {
                return Err(FormsetError::InvalidSchema(format!(
                    "'{}' has {} initial instances but allows at most {}",
                    declaration,
                    collection.initial.len(),
                    max
                )));
            }
        }
    }
    Ok(())
}

fn parse_conditions(
    declaration: &str,
    conditions: &ConditionSchema,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Declared> {
    let attributes = [
        (ConditionKind::ShowIf, &conditions.show_if),
        (ConditionKind::HideIf, &conditions.hide_if),
        (ConditionKind::DisableIf, &conditions.disable_if),
    ];

    let mut parsed = Vec::new();
    for (kind, text) in attributes {
        let Some(text) = text else { continue };
        match parse_expression(text) {
            Ok(expr) => parsed.push(Declared {
                kind,
                text: text.clone(),
                expr: Arc::new(expr),
            }),
            Err(error) => {
                warn!(origin = declaration, attribute = kind.attribute(), %error, "rejected condition");
                diagnostics.push(Diagnostic {
                    origin: declaration.to_string(),
                    attribute: kind.attribute().to_string(),
                    text: text.clone(),
                    problem: Problem::Parse(error),
                });
            }
        }
    }
    parsed
}

/// Resolve a reference the way the runtime does: innermost enclosing scope first
pub(crate) fn resolve_declaration(
    owner: &str,
    segments: &[String],
    fields: &BTreeSet<String>,
) -> Option<String> {
    let owner_names: Vec<&str> = if owner.is_empty() {
        Vec::new()
    } else {
        owner.split('.').collect()
    };
    let reference = segments.join(".");

    (0..owner_names.len()).rev().find_map(|len| {
        let candidate = if len == 0 {
            reference.clone()
        } else {
            format!("{}.{}", owner_names[..len].join("."), reference)
        };
        fields.contains(&candidate).then_some(candidate)
    })
}

fn build_graph(declarations: &Declarations) -> DeclarationGraph {
    let mut graph = DeclarationGraph::new();

    for (owner, conditions) in &declarations.conditions {
        for condition in conditions {
            for reference in condition.expr.references() {
                if let Some(target) =
                    resolve_declaration(owner, &reference.segments, &declarations.fields)
                {
                    graph.add_dependency(owner, &target);
                }
            }
        }
    }

    for (field, enclosing) in &declarations.enclosing {
        for collection in enclosing {
            if declarations.conditions.contains_key(collection) {
                graph.add_dependency(field, collection);
            }
        }
    }

    graph
}

/// Drop conditions until the dependency graph is acyclic
fn reject_cycles(declarations: &mut Declarations, diagnostics: &mut Vec<Diagnostic>) {
    while let Some(cycle) = build_graph(declarations).find_cycle() {
        // every cycle passes through at least one condition owner
        let Some(owner) = cycle
            .iter()
            .find(|node| declarations.conditions.contains_key(*node))
            .cloned()
        else {
            break;
        };

        let through = cycle.join(" -> ");
        warn!(origin = %owner, cycle = %through, "rejected circular condition");
        for condition in declarations.conditions.remove(&owner).unwrap_or_default() {
            diagnostics.push(Diagnostic {
                origin: owner.clone(),
                attribute: condition.kind.attribute().to_string(),
                text: condition.text,
                problem: Problem::Circular(through.clone()),
            });
        }
    }
}

fn conditions_for(declaration: &str, declarations: &Declarations) -> Vec<CompiledCondition> {
    declarations
        .conditions
        .get(declaration)
        .map(|conditions| {
            conditions
                .iter()
                .map(|c| CompiledCondition {
                    kind: c.kind,
                    expr: Arc::clone(&c.expr),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn build_children(
    nodes: &[NodeSchema],
    prefix: &str,
    declarations: &Declarations,
) -> Vec<TemplateNode> {
    nodes
        .iter()
        .map(|node| {
            let declaration = declaration_of(prefix, node.name());
            let conditions = conditions_for(&declaration, declarations);
            match node {
                NodeSchema::Field(field) => TemplateNode::Field(Arc::new(FieldTemplate {
                    name: field.name.clone(),
                    input: field.input,
                    initial: field.initial.clone(),
                    constraints: Constraints {
                        required: field.required,
                        min_length: field.min_length,
                        max_length: field.max_length,
                    },
                    conditions,
                })),
                NodeSchema::Collection(collection) => {
                    let children = build_children(&collection.children, &declaration, declarations);
                    TemplateNode::Collection(Arc::new(CollectionTemplate {
                        name: collection.name.clone(),
                        cardinality: collection.cardinality,
                        children,
                        initial: collection.initial.clone(),
                        conditions,
                    }))
                }
            }
        })
        .collect()
}
