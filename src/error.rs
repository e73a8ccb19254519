use crate::models::RecordKind;
use std::fmt;
use thiserror::Error;

/// The input document is not well-formed XML.
#[derive(Debug, Error)]
#[error("malformed input at byte {position}: {reason}")]
pub struct MalformedInputError {
    pub position: u64,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum ShapeError {
    /// Only `node` and `way` elements can be shaped.
    #[error("unsupported element <{0}>: only <node> and <way> can be shaped")]
    Unsupported(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A shaped record failed its schema. Carries every field error of that record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub kind: RecordKind,
    pub errors: Vec<FieldError>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element of type '{}' has the following errors:", self.kind)?;
        for error in &self.errors {
            write!(f, "\n  {}", error)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema document is not valid: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid regex for {kind}.{field}: {source}")]
    Regex {
        kind: RecordKind,
        field: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_kind_and_fields() {
        let err = ValidationError {
            kind: RecordKind::Node,
            errors: vec![FieldError {
                field: "id".to_string(),
                message: "required field is missing".to_string(),
            }],
        };
        let text = err.to_string();
        assert!(text.contains("'node'"));
        assert!(text.contains("id: required field is missing"));
    }

    #[test]
    fn unsupported_names_the_element() {
        let err = ShapeError::Unsupported("relation".to_string());
        assert!(err.to_string().contains("<relation>"));
    }
}
