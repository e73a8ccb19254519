//! Declarative record schema and the validation gate in front of the sinks.
//!
//! A schema document is JSON keyed by record kind (`node`, `node_tags`, `way`,
//! `way_nodes`, `way_tags`). Each kind maps field names to a rule:
//!
//! ```json
//! { "id": { "required": true, "type": "integer" },
//!   "type": { "required": true, "type": "string", "regex": "^[a-z_]+$" } }
//! ```
//!
//! Supported rule keys are `required`, `type` (`string`, `integer`, `float`),
//! `allowed`, `regex` (matched against the whole value) and `empty`. Numeric
//! types accept numeric strings, since every attribute arrives as text.

use crate::error::{FieldError, SchemaError, ValidationError};
use crate::models::{RecordKind, ShapedElement};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const EMBEDDED_SCHEMA: &str = include_str!("../schema/osm.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Integer,
    Float,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldRule {
    pub required: bool,
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub allowed: Option<Vec<String>>,
    pub regex: Option<String>,
    pub empty: bool,
}

impl Default for FieldRule {
    fn default() -> Self {
        Self {
            required: false,
            field_type: None,
            allowed: None,
            regex: None,
            empty: true,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledField {
    rule: FieldRule,
    pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct Schema {
    kinds: BTreeMap<RecordKind, BTreeMap<String, CompiledField>>,
}

impl Schema {
    pub fn from_json(text: &str) -> Result<Self, SchemaError> {
        let raw: BTreeMap<RecordKind, BTreeMap<String, FieldRule>> = serde_json::from_str(text)?;
        let mut kinds = BTreeMap::new();

        for (kind, fields) in raw {
            let mut compiled = BTreeMap::new();
            for (field, rule) in fields {
                let pattern = match &rule.regex {
                    Some(re) => Some(Regex::new(&format!("^(?:{})$", re)).map_err(|source| {
                        SchemaError::Regex {
                            kind,
                            field: field.clone(),
                            source,
                        }
                    })?),
                    None => None,
                };
                compiled.insert(field, CompiledField { rule, pattern });
            }
            kinds.insert(kind, compiled);
        }

        Ok(Self { kinds })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Failed to load schema from: {}", path.display()))
    }

    /// The schema shipped with the crate, matching the five output tables.
    pub fn embedded() -> Result<Self, SchemaError> {
        Self::from_json(EMBEDDED_SCHEMA)
    }

    pub fn covers(&self, kind: RecordKind) -> bool {
        self.kinds.contains_key(&kind)
    }

    /// Checks a single record, collecting every field error it has.
    pub fn validate_record<T: Serialize>(
        &self,
        kind: RecordKind,
        record: &T,
    ) -> Result<(), ValidationError> {
        let fail = |field: &str, message: String| ValidationError {
            kind,
            errors: vec![FieldError {
                field: field.to_string(),
                message,
            }],
        };

        let rules = self
            .kinds
            .get(&kind)
            .ok_or_else(|| fail("<record>", "no schema for this record kind".to_string()))?;
        let object = match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(fail("<record>", "record is not a field map".to_string())),
            Err(e) => return Err(fail("<record>", e.to_string())),
        };

        // report in column order so errors read like the table
        let column = |field: &str| kind.fields().iter().position(|c| *c == field);
        let mut ordered: Vec<_> = rules.iter().collect();
        ordered.sort_by_key(|(field, _)| column(field).unwrap_or(usize::MAX));

        let mut errors = Vec::new();
        for (field, compiled) in ordered {
            let value = object.get(field).unwrap_or(&Value::Null);
            if let Some(message) = check_field(compiled, value) {
                errors.push(FieldError {
                    field: field.clone(),
                    message,
                });
            }
        }
        for field in object.keys().filter(|f| !rules.contains_key(*f)) {
            errors.push(FieldError {
                field: field.clone(),
                message: "unknown field".to_string(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { kind, errors })
        }
    }
}

fn check_field(compiled: &CompiledField, value: &Value) -> Option<String> {
    let rule = &compiled.rule;

    if value.is_null() {
        return rule
            .required
            .then(|| "required field is missing".to_string());
    }

    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if let Some(field_type) = rule.field_type {
        let ok = match field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64() || text.parse::<i64>().is_ok(),
            FieldType::Float => {
                value.is_number() || text.parse::<f64>().map(f64::is_finite).unwrap_or(false)
            }
        };
        if !ok {
            return Some(format!("must be of {} type, got {:?}", field_type.as_str(), text));
        }
    }

    if !rule.empty && text.is_empty() {
        return Some("empty values not allowed".to_string());
    }

    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|a| *a == text) {
            return Some(format!("unallowed value {:?}", text));
        }
    }

    if let (Some(pattern), Some(source)) = (&compiled.pattern, &rule.regex) {
        if !pattern.is_match(&text) {
            return Some(format!("value does not match regex '{}'", source));
        }
    }

    None
}

/// Validates a whole shaped element, failing on the first record that does not conform.
pub fn validate(shaped: &ShapedElement, schema: &Schema) -> Result<(), ValidationError> {
    match shaped {
        ShapedElement::Node { node, tags } => {
            schema.validate_record(RecordKind::Node, node)?;
            for tag in tags {
                schema.validate_record(RecordKind::NodeTags, tag)?;
            }
        }
        ShapedElement::Way { way, nodes, tags } => {
            schema.validate_record(RecordKind::Way, way)?;
            for way_node in nodes {
                schema.validate_record(RecordKind::WayNodes, way_node)?;
            }
            for tag in tags {
                schema.validate_record(RecordKind::WayTags, tag)?;
            }
        }
    }
    Ok(())
}
