//! Form scopes: which named controls a `form(...)` bound value can refer to.

use markup5ever_rcdom::Handle;
use std::collections::BTreeMap;

use crate::directive::Directive;
use crate::dom::attribute;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::model::{BoundKind, BoundValue, ParamType};
use crate::walker::{NodeHandler, Step, StepResult, Walker};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormControl {
    pub ty: ParamType,
    pub is_radio: bool,
}

#[derive(Debug, Clone)]
struct FormScope {
    /// Path length of the form element, relative to the walk root. Negative
    /// for scopes inherited by a sub-walk that starts below the form.
    start: isize,
    controls: BTreeMap<String, FormControl>,
}

/// Read-only walk collecting the named controls below a form.
struct ControlFinder {
    controls: BTreeMap<String, FormControl>,
}

impl ControlFinder {
    fn add(&mut self, name: String, control: FormControl) -> CompileResult<()> {
        match self.controls.get(&name) {
            None => {
                self.controls.insert(name, control);
                Ok(())
            }
            Some(existing) if existing.is_radio && control.is_radio => Ok(()),
            Some(existing) if existing.is_radio != control.is_radio => Err(CompileError::invalid(
                format!("form control {} mixes radio and non-radio inputs", name),
            )),
            Some(_) => Err(CompileError::duplicate("form control", name)),
        }
    }
}

impl NodeHandler for ControlFinder {
    fn unhandled(&mut self, _directive: Directive, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::skip())
    }

    fn element(&mut self, node: &Handle, _path: &[usize], name: &str) -> StepResult {
        let control = match name {
            "input" => {
                let kind = attribute(node, "type")
                    .unwrap_or_default()
                    .to_ascii_lowercase();
                let ty = match kind.as_str() {
                    "checkbox" => ParamType::Bool,
                    "number" | "range" => ParamType::Int,
                    _ => ParamType::String,
                };
                Some(FormControl {
                    ty,
                    is_radio: kind == "radio",
                })
            }
            "select" | "textarea" => Some(FormControl {
                ty: ParamType::String,
                is_radio: false,
            }),
            _ => None,
        };
        if let (Some(control), Some(control_name)) = (control, attribute(node, "name")) {
            self.add(control_name, control)?;
        }
        Ok(Step::descend())
    }
}

/// Discovers the named controls below `form`.
pub fn discover_controls(
    form: &Handle,
    namespace: &str,
) -> CompileResult<BTreeMap<String, FormControl>> {
    let mut finder = ControlFinder {
        controls: BTreeMap::new(),
    };
    Walker::new(namespace).walk_children(form, &mut finder)?;
    Ok(finder.controls)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE STACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Enclosing forms of the node being visited, innermost last.
#[derive(Debug, Clone, Default)]
pub struct FormStack {
    scopes: Vec<FormScope>,
}

impl FormStack {
    /// Drops scopes whose form the walk has left: a node at `depth` is a
    /// sibling or ancestor of every form starting at the same depth or deeper.
    pub fn pop_exited(&mut self, depth: usize) {
        while let Some(scope) = self.scopes.last() {
            if depth as isize <= scope.start {
                self.scopes.pop();
            } else {
                break;
            }
        }
    }

    pub fn enter(&mut self, form: &Handle, depth: usize, namespace: &str) -> CompileResult<()> {
        let controls = discover_controls(form, namespace)?;
        self.scopes.push(FormScope {
            start: depth as isize,
            controls,
        });
        Ok(())
    }

    /// Scopes as seen by a sub-walk rooted at a node of path length `offset`.
    pub fn nested(&self, offset: usize) -> FormStack {
        FormStack {
            scopes: self
                .scopes
                .iter()
                .map(|s| FormScope {
                    start: s.start - offset as isize,
                    controls: s.controls.clone(),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn control(&self, name: &str) -> Option<&FormControl> {
        self.scopes.last().and_then(|s| s.controls.get(name))
    }

    /// Fills `formDepth` and `isRadio` of a form value used at `depth`.
    pub fn resolve(&self, value: &mut BoundValue, depth: usize) -> CompileResult<()> {
        if value.kind != BoundKind::FormValue {
            return Ok(());
        }
        let name = value.ids.first().cloned().unwrap_or_default();
        let scope = self
            .scopes
            .last()
            .ok_or_else(|| ErrorKind::FormValueOutsideForm(name.clone()))?;
        let control = scope
            .controls
            .get(&name)
            .ok_or(ErrorKind::UnknownFormControl(name))?;
        value.form_depth = (depth as isize - scope.start).max(0) as usize;
        value.is_radio = control.is_radio;
        Ok(())
    }
}
