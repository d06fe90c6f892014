use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Child-index address of a node relative to a unit root.
pub type Path = Vec<usize>;

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Structural type descriptor. Only ever forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ParamType {
    Int,
    String,
    Bool,
    /// Opaque value of the host runtime (`js.Value`).
    HostValue,
    Named {
        namespace: Option<String>,
        name: String,
    },
    Array {
        element: Box<ParamType>,
    },
    Map {
        key: Box<ParamType>,
        value: Box<ParamType>,
    },
    Chan {
        element: Box<ParamType>,
    },
    Func {
        params: Vec<ParamType>,
        returns: Option<Box<ParamType>>,
    },
    Pointer {
        target: Box<ParamType>,
    },
}

impl ParamType {
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            ParamType::Int | ParamType::String | ParamType::Bool | ParamType::HostValue
        )
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Int => write!(f, "int"),
            ParamType::String => write!(f, "string"),
            ParamType::Bool => write!(f, "bool"),
            ParamType::HostValue => write!(f, "js.Value"),
            ParamType::Named {
                namespace: Some(ns),
                name,
            } => write!(f, "{}.{}", ns, name),
            ParamType::Named {
                namespace: None,
                name,
            } => write!(f, "{}", name),
            ParamType::Array { element } => write!(f, "[]{}", element),
            ParamType::Map { key, value } => write!(f, "map[{}]{}", key, value),
            ParamType::Chan { element } => write!(f, "chan {}", element),
            ParamType::Func { params, returns } => {
                let list = params
                    .iter()
                    .map(|p| p.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                match returns {
                    Some(ret) => write!(f, "func({}) {}", list, ret),
                    None => write!(f, "func({})", list),
                }
            }
            ParamType::Pointer { target } => write!(f, "*{}", target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// Declared with `var`: the parameter is kept as a stored field.
    #[serde(default)]
    pub is_var: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Signature {
    pub params: Vec<Param>,
    pub returns: Option<ParamType>,
}

impl Signature {
    pub fn returns_bool(&self) -> bool {
        matches!(self.returns, Some(ParamType::Bool))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerMethod {
    pub signature: Signature,
    /// All parameters are scalar, so a DOM event can invoke the method.
    pub capturable: bool,
}

impl ControllerMethod {
    pub fn new(signature: Signature) -> Self {
        let capturable = signature.params.iter().all(|p| p.ty.is_scalar());
        Self {
            signature,
            capturable,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// BOUND VALUES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundKind {
    Data,
    Property,
    Style,
    Class,
    FormValue,
    EventValue,
    #[serde(rename = "self")]
    SelfRef,
    RawExpr,
}

impl BoundKind {
    /// Keyword used in the bound-value grammar.
    pub fn keyword(self) -> &'static str {
        match self {
            BoundKind::Data => "data",
            BoundKind::Property => "prop",
            BoundKind::Style => "style",
            BoundKind::Class => "class",
            BoundKind::FormValue => "form",
            BoundKind::EventValue => "event",
            BoundKind::SelfRef => "self",
            BoundKind::RawExpr => "go",
        }
    }
}

/// A DOM-observable quantity targeted by a variable, assignment or handler
/// parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundValue {
    pub kind: BoundKind,
    /// One name, several for `class`, none for `self` and bare `event`. For
    /// `go` the single entry is the opaque expression.
    pub ids: Vec<String>,
    #[serde(default)]
    pub form_depth: usize,
    #[serde(default)]
    pub is_radio: bool,
}

impl BoundValue {
    pub fn new(kind: BoundKind, ids: Vec<String>) -> Self {
        Self {
            kind,
            ids,
            form_depth: 0,
            is_radio: false,
        }
    }

    pub fn data(name: &str) -> Self {
        Self::new(BoundKind::Data, vec![name.to_string()])
    }
}

impl fmt::Display for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.keyword(), self.ids.join(", "))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT CONTENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedName {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMapping {
    pub variable: TypedName,
    pub value: BoundValue,
    pub path: Path,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub target: BoundValue,
    pub expression: String,
    pub path: Path,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlBlockKind {
    If,
    For,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlBlock {
    pub kind: ControlBlockKind,
    pub expression: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub variable: String,
    pub path: Path,
    pub block: Block,
    /// Rendered children of the control element.
    pub template: String,
}

/// Assignments, control blocks and embeds scoped to one tree position.
///
/// `controlled` and `embeds` are each stored back-to-front (path
/// descending). A consumer applying both replays [`Block::insertions`]: an
/// embed recorded right before a control element shares its path, so
/// neither list may run ahead of the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub assignments: Vec<Assignment>,
    pub controlled: Vec<ControlBlock>,
    pub embeds: Vec<Embed>,
}

/// A position-shifting entry of a [`Block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion<'a> {
    Control(&'a ControlBlock),
    Embed(&'a Embed),
}

impl Insertion<'_> {
    pub fn path(&self) -> &Path {
        match self {
            Insertion::Control(block) => &block.path,
            Insertion::Embed(embed) => &embed.path,
        }
    }
}

impl Block {
    /// `controlled` and `embeds` merged back-to-front. At a shared path the
    /// control block comes first.
    pub fn insertions(&self) -> Vec<Insertion<'_>> {
        let mut merged = Vec::with_capacity(self.controlled.len() + self.embeds.len());
        let mut controlled = self.controlled.iter().peekable();
        let mut embeds = self.embeds.iter().peekable();
        loop {
            let control_first = match (controlled.peek(), embeds.peek()) {
                (Some(block), Some(embed)) => block.path >= embed.path,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let next = if control_first {
                controlled.next().map(Insertion::Control)
            } else {
                embeds.next().map(Insertion::Embed)
            };
            merged.extend(next);
        }
        merged
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EMBEDS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EmbedKind {
    Direct,
    List,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstructorKind {
    Direct,
    If,
    For,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Arguments {
    pub raw: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorCall {
    pub kind: ConstructorKind,
    pub args: Arguments,
    #[serde(default)]
    pub expression: String,
    #[serde(default)]
    pub index: String,
    #[serde(default)]
    pub variable: String,
}

/// Reference to the type of an embedded component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    /// Import alias the name was qualified with.
    pub namespace: Option<String>,
    pub name: String,
    /// Import path of the defining package; `None` outside the known packages.
    pub package: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embed {
    pub kind: EmbedKind,
    pub path: Path,
    pub field: String,
    pub target: TypeRef,
    pub args: Arguments,
    /// The embedded component's controller defaults to the host.
    pub control: bool,
    pub constructor_calls: Vec<ConstructorCall>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPTURES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventHandling {
    PreventDefault,
    DontPreventDefault,
    AskPreventDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamMapping {
    pub param: String,
    pub value: BoundValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMapping {
    pub event: String,
    pub handler: String,
    /// In handler parameter order.
    pub param_mappings: Vec<ParamMapping>,
    pub handling: EventHandling,
    pub from_controller: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capture {
    pub path: Path,
    pub mappings: Vec<EventMapping>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNITS
// ═══════════════════════════════════════════════════════════════════════════════

/// Anything owning a root block, variables and captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub block: Block,
    pub variables: Vec<VariableMapping>,
    pub captures: Vec<Capture>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    pub parameters: Vec<Param>,
    pub fields: Vec<Field>,
    pub handlers: BTreeMap<String, Signature>,
    pub controller: BTreeMap<String, ControllerMethod>,
    /// The component declares an init hook the backend calls after construction.
    #[serde(default)]
    pub has_init: bool,
    pub unit: Unit,
    pub template: String,
}

impl Component {
    pub fn embeds(&self) -> &[Embed] {
        &self.unit.block.embeds
    }
}

/// The top-level page skeleton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub html_file: String,
    pub js_file: String,
    pub unit: Unit,
    pub template: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_type_display() {
        let ty = ParamType::Map {
            key: Box::new(ParamType::String),
            value: Box::new(ParamType::Array {
                element: Box::new(ParamType::Named {
                    namespace: Some("ui".to_string()),
                    name: "Item".to_string(),
                }),
            }),
        };
        assert_eq!(ty.to_string(), "map[string][]ui.Item");

        let func = ParamType::Func {
            params: vec![ParamType::Int, ParamType::HostValue],
            returns: Some(Box::new(ParamType::Bool)),
        };
        assert_eq!(func.to_string(), "func(int, js.Value) bool");
    }

    #[test]
    fn test_controller_capturable() {
        let scalar = ControllerMethod::new(Signature {
            params: vec![Param {
                name: "n".to_string(),
                ty: ParamType::Int,
                is_var: false,
            }],
            returns: None,
        });
        assert!(scalar.capturable);

        let pointer = ControllerMethod::new(Signature {
            params: vec![Param {
                name: "p".to_string(),
                ty: ParamType::Pointer {
                    target: Box::new(ParamType::Int),
                },
                is_var: false,
            }],
            returns: None,
        });
        assert!(!pointer.capturable);
    }

    #[test]
    fn test_bound_value_serializes_camel_case() {
        let value = BoundValue::new(BoundKind::FormValue, vec!["color".to_string()]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["kind"], "formValue");
        assert_eq!(json["formDepth"], 0);
        assert_eq!(json["isRadio"], false);
        assert_eq!(value.to_string(), "form(color)");
    }
}
