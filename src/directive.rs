use markup5ever_rcdom::{Handle, NodeData};

use crate::error::{CompileError, CompileResult, ErrorKind};

/// The fixed custom-element vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Package,
    Import,
    Macro,
    Component,
    Slot,
    Include,
    Embed,
    Construct,
    Handlers,
    Controller,
    Data,
    Templates,
    Site,
    Text,
}

impl Directive {
    pub const ALL: [Directive; 14] = [
        Directive::Package,
        Directive::Import,
        Directive::Macro,
        Directive::Component,
        Directive::Slot,
        Directive::Include,
        Directive::Embed,
        Directive::Construct,
        Directive::Handlers,
        Directive::Controller,
        Directive::Data,
        Directive::Templates,
        Directive::Site,
        Directive::Text,
    ];

    /// Element name without the namespace prefix.
    pub fn local_name(self) -> &'static str {
        match self {
            Directive::Package => "package",
            Directive::Import => "import",
            Directive::Macro => "macro",
            Directive::Component => "component",
            Directive::Slot => "slot",
            Directive::Include => "include",
            Directive::Embed => "embed",
            Directive::Construct => "construct",
            Directive::Handlers => "handlers",
            Directive::Controller => "controller",
            Directive::Data => "data",
            Directive::Templates => "templates",
            Directive::Site => "site",
            Directive::Text => "text",
        }
    }

    fn from_local_name(name: &str) -> Option<Directive> {
        Directive::ALL.iter().copied().find(|d| d.local_name() == name)
    }
}

/// How the walker treats a child node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRole {
    Directive(Directive),
    /// Any element outside the directive namespace.
    Element(String),
    Text,
    /// Comments, doctypes and processing instructions.
    Other,
}

/// Classifies `node` against the directive vocabulary of `namespace`.
pub fn classify(node: &Handle, namespace: &str) -> CompileResult<NodeRole> {
    match &node.data {
        NodeData::Element { name, .. } => {
            let local = name.local.to_string().to_ascii_lowercase();
            let prefix = format!("{}:", namespace);
            match local.strip_prefix(&prefix) {
                Some(rest) => Directive::from_local_name(rest)
                    .map(NodeRole::Directive)
                    .ok_or_else(|| CompileError::new(ErrorKind::UnknownElement(local.clone()))),
                None => Ok(NodeRole::Element(local)),
            }
        }
        NodeData::Text { .. } => Ok(NodeRole::Text),
        _ => Ok(NodeRole::Other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{create_comment, create_element, create_text};

    #[test]
    fn test_classify_directives() {
        let node = create_element("a:embed", &[]);
        assert_eq!(
            classify(&node, "a").unwrap(),
            NodeRole::Directive(Directive::Embed)
        );

        let node = create_element("A:Component", &[]);
        assert_eq!(
            classify(&node, "a").unwrap(),
            NodeRole::Directive(Directive::Component)
        );
    }

    #[test]
    fn test_classify_ordinary_and_other() {
        assert_eq!(
            classify(&create_element("div", &[]), "a").unwrap(),
            NodeRole::Element("div".to_string())
        );
        assert_eq!(classify(&create_text("x"), "a").unwrap(), NodeRole::Text);
        assert_eq!(
            classify(&create_comment("x"), "a").unwrap(),
            NodeRole::Other
        );
    }

    #[test]
    fn test_unknown_directive_is_error() {
        let err = classify(&create_element("a:widget", &[]), "a").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownElement("a:widget".to_string()));
    }

    #[test]
    fn test_other_namespace_is_ordinary() {
        assert_eq!(
            classify(&create_element("x:embed", &[]), "a").unwrap(),
            NodeRole::Element("x:embed".to_string())
        );
    }
}
