//! Macro expansion: replaces every `a:include` with a copy of the macro body,
//! filling its `a:slot`s with the include's children.

use markup5ever_rcdom::{Handle, NodeData};
use std::collections::BTreeMap;
use tracing::debug;

use crate::attributes::{collect_all, collect_namespaced_only, required, NameAttr, SlotTarget};
use crate::directive::Directive;
use crate::dom::{deep_clone, is_whitespace_text, take_children, text_of};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::symbols::{FileId, MacroDef, Resolution, SymbolTable};
use crate::walker::{NodeHandler, Step, StepResult, Walker};

struct Expander<'a> {
    table: &'a SymbolTable,
    /// File whose imports resolve include names.
    context: FileId,
    namespace: &'a str,
    /// Macros being expanded, outermost first, as (package, name).
    stack: Vec<(usize, String)>,
}

impl<'a> Expander<'a> {
    fn lookup(&self, name: &str) -> CompileResult<&'a MacroDef> {
        let table = self.table;
        match table.resolve_from(self.context, name)? {
            Resolution::Macro { definition, .. } => Ok(definition),
            Resolution::Component { .. } => Err(CompileError::invalid(format!(
                "{} is a component and cannot be included",
                name
            ))),
            Resolution::OutsideModule { .. } => {
                Err(ErrorKind::UnknownSymbol(name.to_string()).into())
            }
        }
    }

    /// Groups the include's children by target slot.
    fn provided_content(
        &self,
        include: &Handle,
        definition: &MacroDef,
    ) -> CompileResult<BTreeMap<String, Vec<Handle>>> {
        let mut provided: BTreeMap<String, Vec<Handle>> = BTreeMap::new();
        for child in take_children(include) {
            match &child.data {
                NodeData::Element { .. } => {
                    let mut target = SlotTarget::default();
                    collect_namespaced_only(&child, self.namespace, Some(&["slot"]), &mut target)?;
                    let slot = target.slot.unwrap_or_default();
                    if !definition.slots.contains(&slot) {
                        return Err(CompileError::invalid(format!(
                            "macro {} has no slot named {:?}",
                            definition.name, slot
                        )));
                    }
                    provided.entry(slot).or_default().push(child);
                }
                NodeData::Text { .. } if !is_whitespace_text(&child) => {
                    let text = text_of(&child).unwrap_or_default();
                    return Err(ErrorKind::UnexpectedText(text.trim().to_string()).into());
                }
                _ => {}
            }
        }
        Ok(provided)
    }
}

impl NodeHandler for Expander<'_> {
    fn unhandled(&mut self, _directive: Directive, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::descend())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], _name: &str) -> StepResult {
        Ok(Step::descend())
    }

    fn include(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = NameAttr::default();
        collect_all(node, self.namespace, &mut attrs)?;
        let name = required(attrs.name, "name")?;
        let definition = self.lookup(&name)?;

        let key = (definition.origin.package, definition.name.clone());
        if self.stack.contains(&key) {
            let mut cycle: Vec<String> = self.stack.iter().map(|(_, n)| n.clone()).collect();
            cycle.push(definition.name.clone());
            return Err(ErrorKind::RecursiveMacro(cycle).into());
        }

        // Caller content belongs to the caller's file.
        let mut provided = self.provided_content(node, definition)?;
        for nodes in provided.values_mut() {
            let taken = std::mem::take(nodes);
            *nodes = Walker::new(self.namespace).walk_detached(taken, self)?;
        }

        let body: Vec<Handle> = definition
            .body
            .children
            .borrow()
            .iter()
            .map(deep_clone)
            .collect();
        let mut filler = SlotFiller {
            namespace: self.namespace,
            provided: &provided,
        };
        let body = Walker::new(self.namespace).walk_detached(body, &mut filler)?;

        let mut stack = self.stack.clone();
        stack.push(key);
        let mut inner = Expander {
            table: self.table,
            context: definition.origin,
            namespace: self.namespace,
            stack,
        };
        let body = Walker::new(self.namespace).walk_detached(body, &mut inner)?;
        debug!(name = %definition.name, nodes = body.len(), "expanded macro");
        Ok(Step::replace(body))
    }
}

/// Replaces each `a:slot` of a cloned body with provided or default content.
struct SlotFiller<'a> {
    namespace: &'a str,
    provided: &'a BTreeMap<String, Vec<Handle>>,
}

impl NodeHandler for SlotFiller<'_> {
    fn unhandled(&mut self, _directive: Directive, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::descend())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], _name: &str) -> StepResult {
        Ok(Step::descend())
    }

    fn slot(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = NameAttr::default();
        collect_all(node, self.namespace, &mut attrs)?;
        let name = attrs.name.unwrap_or_default();
        let chain = match self.provided.get(&name) {
            Some(nodes) => nodes.iter().map(deep_clone).collect(),
            None => take_children(node),
        };
        Ok(Step::replace(chain))
    }
}

/// Expands every include in `file`. Declarations of all packages the file
/// can see must already be registered.
pub fn expand_file(table: &SymbolTable, file: FileId, namespace: &str) -> CompileResult<()> {
    let root = table
        .file(file)?
        .root
        .clone()
        .ok_or_else(|| CompileError::invalid("file has no parsed tree"))?;
    let mut expander = Expander {
        table,
        context: file,
        namespace,
        stack: Vec::new(),
    };
    Walker::new(namespace).walk_children(&root, &mut expander)
}
