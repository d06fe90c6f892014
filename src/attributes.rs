//! Attribute extraction.
//!
//! Ordinary elements carry namespaced attributes (`a:bindings`, `a:if`, ...)
//! that are removed from the element as they are read, so the rendered
//! template never contains them. Directive elements carry plain attributes
//! (`name`, `type`, ...) and are read whole.

use html5ever::Attribute;
use markup5ever_rcdom::{Handle, NodeData};
use std::collections::HashSet;

use crate::error::{CompileError, CompileResult, ErrorKind};

/// Receives one `(key, value)` pair at a time. Keys arrive lowercased and
/// stripped of the namespace prefix.
pub trait AttributeCollector {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()>;
}

fn attrs_of(node: &Handle) -> CompileResult<&std::cell::RefCell<Vec<Attribute>>> {
    match &node.data {
        NodeData::Element { attrs, .. } => Ok(attrs),
        _ => Err(CompileError::invalid("attributes requested on a non-element node")),
    }
}

fn strip_prefix<'a>(name: &'a str, namespace: &str) -> Option<&'a str> {
    let (head, rest) = name.split_once(':')?;
    if head.eq_ignore_ascii_case(namespace) && !rest.is_empty() {
        Some(rest)
    } else {
        None
    }
}

/// Forwards pairs to `collector`, rejecting a key seen twice.
fn forward<C: AttributeCollector + ?Sized>(
    pairs: Vec<(String, String)>,
    collector: &mut C,
) -> CompileResult<()> {
    let mut seen = HashSet::new();
    for (key, value) in pairs {
        if !seen.insert(key.clone()) {
            return Err(ErrorKind::DuplicateAttribute(key).into());
        }
        collector.collect(&key, &value)?;
    }
    Ok(())
}

/// Removes every `namespace:key` attribute from `node` and feeds it to
/// `collector`.
pub fn collect_namespaced<C: AttributeCollector + ?Sized>(
    node: &Handle,
    namespace: &str,
    collector: &mut C,
) -> CompileResult<()> {
    collect_namespaced_only(node, namespace, None, collector)
}

/// Like [`collect_namespaced`] but restricted to `keys`. Other namespaced
/// attributes stay on the element for a later pass.
pub fn collect_namespaced_only<C: AttributeCollector + ?Sized>(
    node: &Handle,
    namespace: &str,
    keys: Option<&[&str]>,
    collector: &mut C,
) -> CompileResult<()> {
    let attrs = attrs_of(node)?;
    let mut taken = Vec::new();
    attrs.borrow_mut().retain(|attr| {
        let name = attr.name.local.to_string().to_ascii_lowercase();
        match strip_prefix(&name, namespace) {
            Some(key) if keys.map(|k| k.contains(&key)).unwrap_or(true) => {
                taken.push((key.to_string(), attr.value.to_string()));
                false
            }
            _ => true,
        }
    });
    forward(taken, collector)
}

/// Feeds every attribute of a directive element to `collector`. An optional
/// namespace prefix is stripped, so `name` and `a:name` are duplicates.
pub fn collect_all<C: AttributeCollector + ?Sized>(
    node: &Handle,
    namespace: &str,
    collector: &mut C,
) -> CompileResult<()> {
    let pairs = attrs_of(node)?
        .borrow()
        .iter()
        .map(|attr| {
            let name = attr.name.local.to_string().to_ascii_lowercase();
            let key = strip_prefix(&name, namespace).unwrap_or(&name).to_string();
            (key, attr.value.to_string())
        })
        .collect();
    forward(pairs, collector)
}

/// `""` and `"true"` are true, `"false"` is false.
pub fn parse_bool(key: &str, value: &str) -> CompileResult<bool> {
    match value.trim() {
        "" | "true" => Ok(true),
        "false" => Ok(false),
        other => Err(ErrorKind::InvalidAttributeValue {
            name: key.to_string(),
            value: other.to_string(),
        }
        .into()),
    }
}

pub fn required(value: Option<String>, key: &str) -> CompileResult<String> {
    value.ok_or_else(|| ErrorKind::MissingAttribute(key.to_string()).into())
}

fn unknown(key: &str) -> CompileResult<()> {
    Err(ErrorKind::UnknownAttribute(key.to_string()).into())
}

// ═══════════════════════════════════════════════════════════════════════════════
// COLLECTORS
// ═══════════════════════════════════════════════════════════════════════════════

/// For directives that take no attributes at all.
pub struct NoAttributes;

impl AttributeCollector for NoAttributes {
    fn collect(&mut self, key: &str, _value: &str) -> CompileResult<()> {
        unknown(key)
    }
}

/// `a:component name params init`
#[derive(Debug, Default)]
pub struct ComponentAttrs {
    pub name: Option<String>,
    pub params: Option<String>,
    pub init: bool,
}

impl AttributeCollector for ComponentAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "name" => self.name = Some(value.trim().to_string()),
            "params" => self.params = Some(value.to_string()),
            "init" => self.init = parse_bool(key, value)?,
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// Namespaced attributes of an ordinary element.
#[derive(Debug, Default)]
pub struct ElementAttrs {
    pub bindings: Option<String>,
    pub capture: Option<String>,
    pub if_expr: Option<String>,
    pub for_expr: Option<String>,
    pub assign: Option<String>,
}

impl ElementAttrs {
    pub fn is_control(&self) -> bool {
        self.if_expr.is_some() || self.for_expr.is_some()
    }
}

impl AttributeCollector for ElementAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        let value = Some(value.to_string());
        match key {
            "bindings" => self.bindings = value,
            "capture" => self.capture = value,
            "if" => self.if_expr = value,
            "for" => self.for_expr = value,
            "assign" => self.assign = value,
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// `a:embed name type args list optional control`
#[derive(Debug, Default)]
pub struct EmbedAttrs {
    pub name: Option<String>,
    pub ty: Option<String>,
    pub args: Option<String>,
    pub list: bool,
    pub optional: bool,
    pub control: bool,
}

impl AttributeCollector for EmbedAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "name" => self.name = Some(value.trim().to_string()),
            "type" => self.ty = Some(value.trim().to_string()),
            "args" => self.args = Some(value.to_string()),
            "list" => self.list = parse_bool(key, value)?,
            "optional" => self.optional = parse_bool(key, value)?,
            "control" => self.control = parse_bool(key, value)?,
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// `a:construct args if for`
#[derive(Debug, Default)]
pub struct ConstructAttrs {
    pub args: Option<String>,
    pub if_expr: Option<String>,
    pub for_expr: Option<String>,
}

impl AttributeCollector for ConstructAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        let value = Some(value.to_string());
        match key {
            "args" => self.args = value,
            "if" => self.if_expr = value,
            "for" => self.for_expr = value,
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// A single `name` attribute (`a:include`, `a:macro`, `a:slot`).
#[derive(Debug, Default)]
pub struct NameAttr {
    pub name: Option<String>,
}

impl AttributeCollector for NameAttr {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "name" => self.name = Some(value.trim().to_string()),
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// `a:slot` on a direct child of `a:include`.
#[derive(Debug, Default)]
pub struct SlotTarget {
    pub slot: Option<String>,
}

impl AttributeCollector for SlotTarget {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "slot" => self.slot = Some(value.trim().to_string()),
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// `a:text expr`
#[derive(Debug, Default)]
pub struct TextAttrs {
    pub expr: Option<String>,
}

impl AttributeCollector for TextAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "expr" => self.expr = Some(value.to_string()),
            _ => return unknown(key),
        }
        Ok(())
    }
}

/// `a:site htmlFile jsFile`
#[derive(Debug, Default)]
pub struct SiteAttrs {
    pub html_file: Option<String>,
    pub js_file: Option<String>,
}

impl AttributeCollector for SiteAttrs {
    fn collect(&mut self, key: &str, value: &str) -> CompileResult<()> {
        match key {
            "htmlfile" => self.html_file = Some(value.trim().to_string()),
            "jsfile" => self.js_file = Some(value.trim().to_string()),
            _ => return unknown(key),
        }
        Ok(())
    }
}
