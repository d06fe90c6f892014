//! Markup adapter.
//!
//! Thin layer over html5ever + markup5ever_rcdom: fragment parsing, node
//! inspection and construction, and rendering subtrees back to HTML.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_fragment, Attribute, LocalName, Namespace, QualName};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use regex::Regex;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tendril::StrTendril;

use crate::error::{CompileError, CompileResult, ErrorKind};

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Attribute list of a start tag. Quoted values may contain `>`.
const ATTRIBUTES: &str = r#"(?:\s+[^\s=/>"']+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>"']+))?)*"#;

lazy_static! {
    /// `<ns:tag ... />`. HTML ignores the self-closing flag on non-void
    /// elements, which would nest every following sibling.
    static ref SELF_CLOSING_RE: Regex = Regex::new(&format!(
        r"<([A-Za-z][A-Za-z0-9]*:[A-Za-z][A-Za-z0-9-]*)({})\s*/>",
        ATTRIBUTES
    ))
    .unwrap();

    static ref START_TAG_RE: Regex =
        Regex::new(&format!(r"<([A-Za-z][A-Za-z0-9:-]*)({})\s*/?>", ATTRIBUTES)).unwrap();

    static ref ATTRIBUTE_RE: Regex =
        Regex::new(r#"([^\s=/>"']+)(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>"']+))?"#).unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites self-closing namespaced tags into explicit open/close pairs.
pub fn convert_self_closing_directives(html: &str) -> String {
    SELF_CLOSING_RE
        .replace_all(html, |caps: &regex::Captures| {
            let tag = &caps[1];
            let attrs = caps.get(2).map(|m| m.as_str().trim_end()).unwrap_or("");
            format!("<{}{}></{}>", tag, attrs, tag)
        })
        .to_string()
}

/// The tokenizer silently keeps only the first of two equal attribute names.
/// Namespaced tags and attributes must not lose a value that way.
pub fn check_duplicate_attributes(html: &str) -> CompileResult<()> {
    for tag in START_TAG_RE.captures_iter(html) {
        let tag_is_directive = tag[1].contains(':');
        let mut seen = HashSet::new();
        let attrs = tag.get(2).map(|m| m.as_str()).unwrap_or("");
        for attr in ATTRIBUTE_RE.captures_iter(attrs) {
            let name = attr[1].to_ascii_lowercase();
            if (tag_is_directive || name.contains(':')) && !seen.insert(name.clone()) {
                return Err(ErrorKind::DuplicateAttribute(name).into());
            }
        }
    }
    Ok(())
}

/// Parses `source` as a body fragment.
///
/// Returns the synthetic root element whose children are the fragment's
/// top-level nodes.
pub fn parse_fragment_root(source: &str) -> CompileResult<Handle> {
    let normalized = convert_self_closing_directives(source);
    check_duplicate_attributes(&normalized)?;
    let context = QualName::new(None, Namespace::from(HTML_NS), LocalName::from("body"));
    let dom: RcDom = parse_fragment(RcDom::default(), Default::default(), context, vec![])
        .one(normalized.as_str());

    // Dropping an rcdom node empties every descendant it still owns, so the
    // root leaves the document before `dom` goes away.
    take_children(&dom.document)
        .into_iter()
        .find(is_element)
        .ok_or_else(|| CompileError::invalid("parser produced no fragment root"))
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSPECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowercase local name of an element, `None` for other nodes.
pub fn element_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_string().to_ascii_lowercase()),
        _ => None,
    }
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// Value of a plain attribute (case-insensitive name).
pub fn attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| (&*a.name.local).eq_ignore_ascii_case(name))
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Concatenated text of the direct text children.
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    for child in node.children.borrow().iter() {
        if let NodeData::Text { contents } = &child.data {
            out.push_str(&contents.borrow());
        }
    }
    out
}

/// Text of a text node, `None` for other nodes.
pub fn text_of(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

pub fn is_whitespace_text(node: &Handle) -> bool {
    text_of(node).map(|t| t.trim().is_empty()).unwrap_or(false)
}

pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// Element children only.
pub fn element_children(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|c| is_element(c))
        .cloned()
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONSTRUCTION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn create_element(name: &str, attributes: &[(&str, &str)]) -> Handle {
    let attrs = attributes
        .iter()
        .map(|(k, v)| Attribute {
            name: QualName::new(None, Namespace::from(""), LocalName::from(*k)),
            value: StrTendril::from_slice(v),
        })
        .collect();
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NS), LocalName::from(name)),
        attrs: RefCell::new(attrs),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from_slice(text)),
    })
}

pub fn create_comment(text: &str) -> Handle {
    Node::new(NodeData::Comment {
        contents: StrTendril::from_slice(text),
    })
}

/// Appends `child` to `parent`, fixing the parent pointer.
pub fn append_child(parent: &Handle, child: Handle) {
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child);
}

/// Recursively copies a node. The copy has no parent.
pub fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(template_contents.borrow().as_ref().map(deep_clone)),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };
    let copy = Node::new(data);
    for child in node.children.borrow().iter() {
        append_child(&copy, deep_clone(child));
    }
    copy
}

/// Detaches and returns all children of `node`.
pub fn take_children(node: &Handle) -> Vec<Handle> {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in &children {
        child.parent.set(None);
    }
    children
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Serializes the children of `node` back to HTML text.
pub fn render_children(node: &Handle) -> CompileResult<String> {
    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..Default::default()
    };
    serialize(&mut bytes, &SerializableHandle::from(node.clone()), opts)
        .map_err(|e| CompileError::invalid(format!("failed to render template: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| CompileError::invalid(format!("rendered template is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_self_closing_directives() {
        assert_eq!(
            convert_self_closing_directives(r#"<a:embed name="x" type="Y"/>"#),
            r#"<a:embed name="x" type="Y"></a:embed>"#
        );
        assert_eq!(
            convert_self_closing_directives("<a:construct />"),
            "<a:construct></a:construct>"
        );
        // Plain void elements stay untouched.
        assert_eq!(convert_self_closing_directives("<br/>"), "<br/>");
    }

    #[test]
    fn test_self_closing_with_gt_in_values() {
        assert_eq!(
            convert_self_closing_directives(r#"<a:construct if="k > 0" args="k"/><a:construct args="1"/>"#),
            r#"<a:construct if="k > 0" args="k"></a:construct><a:construct args="1"></a:construct>"#
        );
        assert_eq!(
            convert_self_closing_directives(r#"<p><a:text expr='n > 0'/> items</p>"#),
            r#"<p><a:text expr='n > 0'></a:text> items</p>"#
        );

        let root = parse_fragment_root(r#"<p><a:text expr="a >= b"/> items</p>"#).unwrap();
        let p = element_children(&root).remove(0);
        assert_eq!(p.children.borrow().len(), 2);
        assert_eq!(attribute(&p.children.borrow()[0], "expr"), Some("a >= b".to_string()));
        assert_eq!(text_of(&p.children.borrow()[1]), Some(" items".to_string()));
    }

    #[test]
    fn test_duplicate_attributes_before_parsing() {
        let err = parse_fragment_root(r#"<div a:if="x" a:if="x"></div>"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateAttribute("a:if".to_string()));
        let err = parse_fragment_root(r#"<a:embed name="x" NAME="y"></a:embed>"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateAttribute("name".to_string()));
        // Ordinary attributes keep HTML semantics.
        assert!(parse_fragment_root(r#"<p class="a" class="b"></p>"#).is_ok());
    }

    #[test]
    fn test_parse_fragment_keeps_siblings_flat() {
        let root = parse_fragment_root(r#"<div><a:embed name="a" type="T"/><p>x</p></div>"#)
            .unwrap();
        let div = element_children(&root).remove(0);
        let names: Vec<_> = element_children(&div)
            .iter()
            .filter_map(element_name)
            .collect();
        assert_eq!(names, vec!["a:embed", "p"]);
    }

    #[test]
    fn test_attribute_names_are_lowercased() {
        let root = parse_fragment_root(r#"<a:site htmlFile="index.html"></a:site>"#).unwrap();
        let site = element_children(&root).remove(0);
        assert_eq!(attribute(&site, "htmlfile"), Some("index.html".to_string()));
        assert_eq!(attribute(&site, "htmlFile"), Some("index.html".to_string()));
    }

    #[test]
    fn test_deep_clone_is_independent() {
        let root = parse_fragment_root("<ul><li>a</li></ul>").unwrap();
        let ul = element_children(&root).remove(0);
        let copy = deep_clone(&ul);
        append_child(&copy, create_element("li", &[]));
        assert_eq!(ul.children.borrow().len(), 1);
        assert_eq!(copy.children.borrow().len(), 2);
        assert!(parent_of(&copy.children.borrow()[1]).is_some());
    }

    #[test]
    fn test_parsed_root_outlives_document() {
        let root = parse_fragment_root("<div><p>a</p></div><span></span>").unwrap();
        assert!(parent_of(&root).is_none());
        let top = element_children(&root);
        assert_eq!(top.len(), 2);
        assert_eq!(element_children(&top[0]).len(), 1);
        assert_eq!(text_content(&element_children(&top[0])[0]), "a");
    }

    #[test]
    fn test_render_children() {
        let root = parse_fragment_root(r#"<p class="x">hi</p>"#).unwrap();
        assert_eq!(render_children(&root).unwrap(), r#"<p class="x">hi</p>"#);
    }
}
