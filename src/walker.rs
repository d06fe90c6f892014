use markup5ever_rcdom::{Handle, Node};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::directive::{classify, Directive, NodeRole};
use crate::dom::{create_element, element_name, parent_of, take_children};
use crate::error::{CompileError, CompileResult, ErrorKind};

/// What the walker does with a node after its handler ran.
#[derive(Debug, Default)]
pub struct Step {
    /// Recurse into the node's (current) children.
    pub descend: bool,
    /// Sibling chain taking the node's place. An empty chain removes it.
    pub replacement: Option<Vec<Handle>>,
}

impl Step {
    pub fn skip() -> Self {
        Step::default()
    }

    pub fn descend() -> Self {
        Step {
            descend: true,
            replacement: None,
        }
    }

    pub fn remove() -> Self {
        Step {
            descend: false,
            replacement: Some(Vec::new()),
        }
    }

    pub fn replace(chain: Vec<Handle>) -> Self {
        Step {
            descend: false,
            replacement: Some(chain),
        }
    }
}

pub type StepResult = CompileResult<Step>;

/// Per-role callbacks of a walk.
///
/// Rules:
/// 1. A directive role the handler does not override falls through to
///    `unhandled`, which rejects the element.
/// 2. Ordinary elements and text are skipped unless overridden.
/// 3. `path` is the visited node's own address; it is only valid during the call.
pub trait NodeHandler {
    fn unhandled(&mut self, _directive: Directive, node: &Handle, _path: &[usize]) -> StepResult {
        Err(CompileError::new(ErrorKind::ElementNotAllowed(
            element_name(node).unwrap_or_default(),
        )))
    }

    fn package(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Package, node, path)
    }

    fn import(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Import, node, path)
    }

    fn macro_def(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Macro, node, path)
    }

    fn component(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Component, node, path)
    }

    fn slot(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Slot, node, path)
    }

    fn include(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Include, node, path)
    }

    fn embed(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Embed, node, path)
    }

    fn construct(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Construct, node, path)
    }

    fn handlers(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Handlers, node, path)
    }

    fn controller(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Controller, node, path)
    }

    fn data(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Data, node, path)
    }

    fn templates(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Templates, node, path)
    }

    fn site(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Site, node, path)
    }

    fn text_directive(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        self.unhandled(Directive::Text, node, path)
    }

    /// Catch-all for elements outside the directive namespace.
    fn element(&mut self, _node: &Handle, _path: &[usize], _name: &str) -> StepResult {
        Ok(Step::skip())
    }

    fn text(&mut self, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::skip())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WALKER
// ═══════════════════════════════════════════════════════════════════════════════

/// Document-order walker owning the index-path stack.
pub struct Walker {
    namespace: String,
    path: Vec<usize>,
}

impl Walker {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            path: Vec::new(),
        }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// Visits the children of `parent` in document order.
    pub fn walk_children<H: NodeHandler + ?Sized>(
        &mut self,
        parent: &Handle,
        handler: &mut H,
    ) -> CompileResult<()> {
        self.path.push(0);
        let result = self.walk_siblings(parent, handler);
        self.path.pop();
        result
    }

    /// Walks a detached node list and returns the (possibly rewritten) list.
    pub fn walk_detached<H: NodeHandler + ?Sized>(
        &mut self,
        nodes: Vec<Handle>,
        handler: &mut H,
    ) -> CompileResult<Vec<Handle>> {
        let holder = create_element("template", &[]);
        let weak = Rc::downgrade(&holder);
        for node in &nodes {
            node.parent.set(Some(weak.clone()));
        }
        holder.children.borrow_mut().extend(nodes);
        self.walk_children(&holder, handler)?;
        Ok(take_children(&holder))
    }

    fn walk_siblings<H: NodeHandler + ?Sized>(
        &mut self,
        parent: &Handle,
        handler: &mut H,
    ) -> CompileResult<()> {
        let mut index = 0;
        let mut occurrences: HashMap<String, usize> = HashMap::new();
        loop {
            let child = match parent.children.borrow().get(index) {
                Some(c) => c.clone(),
                None => break,
            };
            if let Some(top) = self.path.last_mut() {
                *top = index;
            }
            let frame = frame_for(&child, &mut occurrences);
            let step = self
                .dispatch(&child, handler)
                .map_err(|e| e.within(frame.clone()))?;

            match step.replacement {
                Some(chain) => {
                    if step.descend {
                        return Err(CompileError::new(ErrorKind::InvalidReplacement(
                            "a replaced node cannot be descended into".to_string(),
                        ))
                        .within(frame));
                    }
                    let len = chain.len();
                    relink(parent, index, &child, chain).map_err(|e| e.within(frame))?;
                    index += len;
                }
                None => {
                    if step.descend {
                        self.walk_children(&child, handler)
                            .map_err(|e| e.within(frame))?;
                    }
                    index += 1;
                }
            }
        }
        Ok(())
    }

    fn dispatch<H: NodeHandler + ?Sized>(&self, node: &Handle, handler: &mut H) -> StepResult {
        let path = self.path.as_slice();
        match classify(node, &self.namespace)? {
            NodeRole::Directive(directive) => match directive {
                Directive::Package => handler.package(node, path),
                Directive::Import => handler.import(node, path),
                Directive::Macro => handler.macro_def(node, path),
                Directive::Component => handler.component(node, path),
                Directive::Slot => handler.slot(node, path),
                Directive::Include => handler.include(node, path),
                Directive::Embed => handler.embed(node, path),
                Directive::Construct => handler.construct(node, path),
                Directive::Handlers => handler.handlers(node, path),
                Directive::Controller => handler.controller(node, path),
                Directive::Data => handler.data(node, path),
                Directive::Templates => handler.templates(node, path),
                Directive::Site => handler.site(node, path),
                Directive::Text => handler.text_directive(node, path),
            },
            NodeRole::Element(name) => handler.element(node, path, &name),
            NodeRole::Text => handler.text(node, path),
            NodeRole::Other => Ok(Step::skip()),
        }
    }
}

/// Breadcrumb frame: element name plus its occurrence among same-named siblings.
fn frame_for(node: &Handle, occurrences: &mut HashMap<String, usize>) -> String {
    let name = element_name(node).unwrap_or_else(|| "#text".to_string());
    let seen = occurrences.entry(name.clone()).or_insert(0);
    let frame = format!("{}[{}]", name, seen);
    *seen += 1;
    frame
}

/// Breadcrumb frames of an attached `node` for its `depth` innermost levels,
/// outermost first. Matches the frames a walk adds for errors raised at the node.
pub fn breadcrumb_of(node: &Handle, depth: usize) -> Vec<String> {
    let mut frames = Vec::with_capacity(depth);
    let mut current = node.clone();
    for _ in 0..depth {
        let parent = match parent_of(&current) {
            Some(parent) => parent,
            None => break,
        };
        let mut occurrences = HashMap::new();
        for sibling in parent.children.borrow().iter() {
            let frame = frame_for(sibling, &mut occurrences);
            if Rc::ptr_eq(sibling, &current) {
                frames.push(frame);
                break;
            }
        }
        current = parent;
    }
    frames.reverse();
    frames
}

// ═══════════════════════════════════════════════════════════════════════════════
// RELINKING
// ═══════════════════════════════════════════════════════════════════════════════

fn invalid_replacement(message: &str) -> CompileError {
    CompileError::new(ErrorKind::InvalidReplacement(message.to_string()))
}

/// Replaces `parent.children[index]` (which must be `old`) with `chain`.
fn relink(parent: &Handle, index: usize, old: &Handle, chain: Vec<Handle>) -> CompileResult<()> {
    let mut seen: HashSet<*const Node> = HashSet::new();
    for node in &chain {
        if !seen.insert(Rc::as_ptr(node)) {
            return Err(invalid_replacement("node appears twice in the replacement chain"));
        }
        if Rc::ptr_eq(node, parent) || is_ancestor(node, parent) {
            return Err(invalid_replacement(
                "replacement chain contains an ancestor of its insertion point",
            ));
        }
        if !Rc::ptr_eq(node, old) && parent_of(node).is_some() {
            return Err(invalid_replacement(
                "replacement node is still attached elsewhere",
            ));
        }
    }

    let mut children = parent.children.borrow_mut();
    match children.get(index) {
        Some(current) if Rc::ptr_eq(current, old) => {}
        _ => return Err(invalid_replacement("replaced node moved during its visit")),
    }
    old.parent.set(None);
    let weak = Rc::downgrade(parent);
    for node in &chain {
        node.parent.set(Some(weak.clone()));
    }
    children.splice(index..index + 1, chain);
    Ok(())
}

fn is_ancestor(candidate: &Handle, node: &Handle) -> bool {
    let mut current = parent_of(node);
    while let Some(ancestor) = current {
        if Rc::ptr_eq(&ancestor, candidate) {
            return true;
        }
        current = parent_of(&ancestor);
    }
    false
}
