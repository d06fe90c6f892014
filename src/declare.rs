//! Declaration pass: imports, component signatures and macros of one file,
//! registered before any unit is built so later files can refer to them.

use markup5ever_rcdom::Handle;
use tracing::debug;

use crate::attributes::{collect_all, required, ComponentAttrs, NameAttr, NoAttributes};
use crate::cursor::is_identifier;
use crate::declarations::{parse_imports, parse_params};
use crate::directive::Directive;
use crate::dom::{element_children, element_name, is_whitespace_text, text_content, text_of};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::model::Component;
use crate::symbols::{FileId, MacroDef, SymbolTable};
use crate::walker::{NodeHandler, Step, StepResult, Walker};

struct Declarations<'a> {
    table: &'a mut SymbolTable,
    file: FileId,
    namespace: &'a str,
}

impl NodeHandler for Declarations<'_> {
    fn import(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        collect_all(node, self.namespace, &mut NoAttributes)?;
        if let Some(child) = element_children(node).first() {
            let name = element_name(child).unwrap_or_default();
            return Err(ErrorKind::ElementNotAllowed(name).into());
        }
        let imports = parse_imports(&text_content(node))?;
        let file = self.table.file_mut(self.file)?;
        for (alias, path) in imports {
            if file.imports.contains_key(&alias) {
                return Err(CompileError::duplicate("import alias", alias));
            }
            file.imports.insert(alias, path);
        }
        Ok(Step::remove())
    }

    fn component(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = ComponentAttrs::default();
        collect_all(node, self.namespace, &mut attrs)?;
        let name = required(attrs.name, "name")?;
        if !is_identifier(&name) {
            return Err(ErrorKind::InvalidIdentifier(name).into());
        }
        let parameters = match attrs.params {
            Some(params) => parse_params(&params)?,
            None => Vec::new(),
        };
        debug!(component = %name, params = parameters.len(), "declared component");
        self.table.declare_component(
            self.file,
            Component {
                name,
                parameters,
                has_init: attrs.init,
                ..Default::default()
            },
        )?;
        Ok(Step::skip())
    }

    fn macro_def(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = NameAttr::default();
        collect_all(node, self.namespace, &mut attrs)?;
        let name = required(attrs.name, "name")?;
        if !is_identifier(&name) {
            return Err(ErrorKind::InvalidIdentifier(name).into());
        }
        let mut finder = SlotFinder {
            namespace: self.namespace,
            slots: Vec::new(),
        };
        Walker::new(self.namespace).walk_children(node, &mut finder)?;
        debug!(name = %name, slots = finder.slots.len(), "declared macro");
        self.table.declare_macro(
            self.file,
            MacroDef {
                name,
                slots: finder.slots,
                body: node.clone(),
                origin: self.file,
            },
        )?;
        Ok(Step::remove())
    }

    fn templates(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        collect_all(node, self.namespace, &mut NoAttributes)?;
        Ok(Step::descend())
    }

    fn site(&mut self, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::skip())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], name: &str) -> StepResult {
        Err(ErrorKind::ElementNotAllowed(name.to_string()).into())
    }

    fn text(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        if is_whitespace_text(node) {
            Ok(Step::skip())
        } else {
            let text = text_of(node).unwrap_or_default();
            Err(ErrorKind::UnexpectedText(text.trim().to_string()).into())
        }
    }
}

/// Collects the slot names of a macro body. The unnamed slot is `""`.
struct SlotFinder<'a> {
    namespace: &'a str,
    slots: Vec<String>,
}

impl NodeHandler for SlotFinder<'_> {
    fn unhandled(&mut self, _directive: Directive, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::descend())
    }

    fn slot(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = NameAttr::default();
        collect_all(node, self.namespace, &mut attrs)?;
        let name = attrs.name.unwrap_or_default();
        if self.slots.contains(&name) {
            let shown = if name.is_empty() { "(unnamed)" } else { name.as_str() };
            return Err(CompileError::duplicate("slot", shown));
        }
        self.slots.push(name);
        Ok(Step::skip())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], _name: &str) -> StepResult {
        Ok(Step::descend())
    }
}

/// Registers the declarations of `file`, removing `a:import` and `a:macro`
/// elements from its tree.
pub fn declare_file(table: &mut SymbolTable, file: FileId, namespace: &str) -> CompileResult<()> {
    let root = table
        .file(file)?
        .root
        .clone()
        .ok_or_else(|| CompileError::invalid("file has no parsed tree"))?;
    let mut declarations = Declarations {
        table,
        file,
        namespace,
    };
    Walker::new(namespace).walk_children(&root, &mut declarations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{parse_fragment_root, render_children};
    use crate::symbols::File;

    fn declare(html: &str) -> CompileResult<(SymbolTable, FileId)> {
        let mut table = SymbolTable::new("example.com/app");
        let package = table.add_package("example.com/app").unwrap();
        let file = table
            .add_file(package, File::new("main.html", parse_fragment_root(html).unwrap()))
            .unwrap();
        declare_file(&mut table, file, "a")?;
        Ok((table, file))
    }

    #[test]
    fn test_declarations_registered() {
        let (table, file) = declare(
            r#"
            <a:import>
                "example.com/app/ui"
                x "example.org/ext"
            </a:import>
            <a:component name="Counter" params="start int, var step int" init></a:component>
            <a:macro name="Card"><div><a:slot name="title"></a:slot><a:slot></a:slot></div></a:macro>
            "#,
        )
        .unwrap();
        let f = table.file(file).unwrap();
        assert_eq!(f.imports["ui"], "example.com/app/ui");
        assert_eq!(f.imports["x"], "example.org/ext");
        let counter = f.component("Counter").unwrap();
        assert_eq!(counter.parameters.len(), 2);
        assert!(counter.has_init);
        assert_eq!(f.macros[0].slots, vec!["title".to_string(), String::new()]);

        // Imports and macros leave the tree, components stay for the builder.
        let rendered = render_children(f.root.as_ref().unwrap()).unwrap();
        assert!(!rendered.contains("a:import"));
        assert!(!rendered.contains("a:macro"));
        assert!(rendered.contains("a:component"));
    }

    #[test]
    fn test_duplicate_alias() {
        let err = declare("<a:import>\"a/ui\"\nui \"b/ui\"</a:import>").unwrap_err();
        assert_eq!(err.to_string(), "a:import[0]: duplicate import alias: ui");
    }

    #[test]
    fn test_component_and_macro_share_names() {
        let err = declare(
            r#"<a:component name="Card"></a:component><a:macro name="Card"></a:macro>"#,
        )
        .unwrap_err();
        assert_eq!(err.kind, CompileError::duplicate("macro", "Card").kind);
    }

    #[test]
    fn test_package_is_reserved() {
        let err = declare("<a:package></a:package>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ElementNotAllowed("a:package".to_string()));
    }

    #[test]
    fn test_templates_container_descends() {
        let (table, file) = declare(
            r#"<a:templates><a:component name="A"></a:component></a:templates>"#,
        )
        .unwrap();
        assert!(table.file(file).unwrap().component("A").is_some());
        assert!(declare("<div></div>").is_err());
        assert!(declare("stray text").is_err());
    }
}
