//! Compiler errors.
//!
//! Every failure is value-returned as a [`CompileError`]. Errors raised deep in
//! a walk are wrapped with breadcrumb frames on the way out, so the top-level
//! message reads `file.html > a:component[0] > div[2]: <what went wrong>`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR KINDS
// ═══════════════════════════════════════════════════════════════════════════════

/// The two families of compiler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorFamily {
    /// Malformed text inside one of the attribute-value mini-languages.
    Syntax,
    /// Well-formed input that violates a naming, scoping or structural rule.
    Semantic,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("syntax error in {grammar} at offset {offset}: {message}")]
    Syntax {
        grammar: &'static str,
        offset: usize,
        message: String,
    },

    #[error("duplicate attribute: {0}")]
    DuplicateAttribute(String),

    #[error("unknown attribute: {0}")]
    UnknownAttribute(String),

    #[error("missing attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid value for attribute {name}: {value:?}")]
    InvalidAttributeValue { name: String, value: String },

    #[error("unknown element: <{0}>")]
    UnknownElement(String),

    #[error("element not allowed here: <{0}>")]
    ElementNotAllowed(String),

    #[error("unexpected text content: {0:?}")]
    UnexpectedText(String),

    #[error("duplicate {what}: {name}")]
    Duplicate { what: &'static str, name: String },

    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    #[error("controller method {0} cannot be captured: all parameters must be scalar")]
    NotCapturable(String),

    #[error("handler {handler} has no parameter named {param}")]
    UnknownHandlerParam { handler: String, param: String },

    #[error("handler {handler} takes {expected} parameters, {given} positional mappings given")]
    TooManyMappings {
        handler: String,
        expected: usize,
        given: usize,
    },

    #[error("unknown import alias: {0}")]
    UnknownAlias(String),

    #[error("unknown package: {0}")]
    UnknownPackage(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("{name} takes {expected} arguments, {given} given")]
    ArgumentCount {
        name: String,
        expected: usize,
        given: usize,
    },

    #[error("form value {0} used outside of a form")]
    FormValueOutsideForm(String),

    #[error("form has no control named {0}")]
    UnknownFormControl(String),

    #[error("circular dependency: {}", arrow_join(.0))]
    CircularDependency(Vec<String>),

    #[error("recursive macro expansion: {}", arrow_join(.0))]
    RecursiveMacro(Vec<String>),

    #[error("invalid replacement: {0}")]
    InvalidReplacement(String),

    #[error("{0}")]
    Invalid(String),
}

fn arrow_join(names: &[String]) -> String {
    names.join(" -> ")
}

impl ErrorKind {
    pub fn family(&self) -> ErrorFamily {
        match self {
            ErrorKind::Syntax { .. } => ErrorFamily::Syntax,
            _ => ErrorFamily::Semantic,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{kind}", breadcrumb_prefix(.breadcrumb))]
pub struct CompileError {
    pub kind: ErrorKind,
    /// Outermost frame first.
    pub breadcrumb: Vec<String>,
}

fn breadcrumb_prefix(breadcrumb: &[String]) -> String {
    if breadcrumb.is_empty() {
        String::new()
    } else {
        format!("{}: ", breadcrumb.join(" > "))
    }
}

impl CompileError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            breadcrumb: Vec::new(),
        }
    }

    pub fn syntax(grammar: &'static str, offset: usize, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax {
            grammar,
            offset,
            message: message.into(),
        })
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Invalid(message.into()))
    }

    pub fn duplicate(what: &'static str, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate {
            what,
            name: name.into(),
        })
    }

    /// Prepends a breadcrumb frame describing the enclosing position.
    pub fn within(mut self, frame: impl Into<String>) -> Self {
        self.breadcrumb.insert(0, frame.into());
        self
    }

    pub fn family(&self) -> ErrorFamily {
        self.kind.family()
    }

    /// The message without breadcrumb.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

impl From<ErrorKind> for CompileError {
    fn from(kind: ErrorKind) -> Self {
        CompileError::new(kind)
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

/// Serializable form used in compile output and the Node bindings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub file: String,
    pub family: ErrorFamily,
    pub message: String,
    pub breadcrumb: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(file: &str, error: &CompileError) -> Self {
        Self {
            file: file.to_string(),
            family: error.family(),
            message: error.message(),
            breadcrumb: error.breadcrumb.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breadcrumb_rendering() {
        let err = CompileError::new(ErrorKind::UnknownHandler("save".to_string()))
            .within("button[0]")
            .within("a:component[1]")
            .within("widgets.html");
        assert_eq!(
            err.to_string(),
            "widgets.html > a:component[1] > button[0]: unknown handler: save"
        );
        assert_eq!(err.message(), "unknown handler: save");
    }

    #[test]
    fn test_cycle_message_lists_whole_cycle() {
        let err = CompileError::new(ErrorKind::CircularDependency(vec![
            "A".to_string(),
            "B".to_string(),
            "A".to_string(),
        ]));
        assert_eq!(err.to_string(), "circular dependency: A -> B -> A");
    }

    #[test]
    fn test_families() {
        assert_eq!(
            CompileError::syntax("bindings", 3, "expected ':'").family(),
            ErrorFamily::Syntax
        );
        assert_eq!(
            CompileError::duplicate("field", "x").family(),
            ErrorFamily::Semantic
        );
    }
}
