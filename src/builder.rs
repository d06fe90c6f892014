//! Unit builder.
//!
//! Walks the subtree of one `a:component` or `a:site` and turns its
//! annotations into the [`Unit`] model:
//!
//! 1. namespaced attributes of ordinary elements become assignments,
//!    variables and captures stamped with the element's path,
//! 2. `a:if` / `a:for` elements start a nested [`Block`] built by a sub-walk,
//! 3. `a:embed` elements are removed and recorded at their insertion index,
//! 4. `a:text` is replaced by a text node bracketed by empty comments,
//! 5. `a:handlers`, `a:controller` and `a:data` declare the component body.
//!
//! Captures are resolved once the whole subtree is known, since handlers may
//! be declared after their first use.

use markup5ever_rcdom::Handle;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::attributes::{
    collect_all, collect_namespaced, required, ComponentAttrs, ConstructAttrs, ElementAttrs,
    EmbedAttrs, NoAttributes, SiteAttrs, TextAttrs,
};
use crate::bindings::{
    parse_assignments, parse_bindings, parse_captures, parse_expression, parse_for,
    RawEventMapping,
};
use crate::cursor::is_identifier;
use crate::declarations::{parse_arguments, parse_fields, parse_params, parse_signatures};
use crate::directive::Directive;
use crate::dom::{
    create_comment, create_text, element_children, element_name, is_whitespace_text,
    render_children, text_content, text_of,
};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::forms::FormStack;
use crate::model::{
    Arguments, Assignment, Block, BoundKind, BoundValue, Capture, Component, ConstructorCall,
    ConstructorKind, ControlBlock, ControlBlockKind, ControllerMethod, Embed, EmbedKind,
    EventHandling, EventMapping, Field, Param, ParamMapping, ParamType, Path, Signature, Site,
    TypeRef, TypedName, Unit, VariableMapping,
};
use crate::symbols::{FileId, Resolution, SymbolTable};
use crate::walker::{breadcrumb_of, NodeHandler, Step, StepResult, Walker};

/// Everything a builder needs from the surrounding compilation.
pub struct BuildContext<'a> {
    pub table: &'a SymbolTable,
    /// File whose imports resolve embed types.
    pub file: FileId,
    pub namespace: &'a str,
    pub warn_unchecked_embeds: bool,
}

/// Orders path-addressed operations for replay: later positions first, and
/// among equal positions the one recorded last first.
pub fn back_to_front<T>(items: &mut [T], path: impl Fn(&T) -> &Path) {
    items.reverse();
    items.sort_by(|a, b| path(b).cmp(path(a)));
}

fn check_count(type_name: &str, expected: Option<usize>, given: usize) -> CompileResult<()> {
    match expected {
        Some(expected) if expected != given => Err(ErrorKind::ArgumentCount {
            name: type_name.to_string(),
            expected,
            given,
        }
        .into()),
        _ => Ok(()),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// UNIT BUILDER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Component,
    Site,
    /// Inside an `a:if` / `a:for` element.
    Control,
}

/// A capture waiting for the handler declarations of its component.
struct RawCapture {
    path: Path,
    /// Breadcrumb of the capturing element below the unit root.
    frames: Vec<String>,
    mappings: Vec<RawEventMapping>,
}

struct UnitBuilder<'a> {
    ctx: &'a BuildContext<'a>,
    scope: ScopeKind,
    forms: FormStack,
    assignments: Vec<Assignment>,
    controlled: Vec<ControlBlock>,
    embeds: Vec<Embed>,
    variables: Vec<VariableMapping>,
    captures: Vec<RawCapture>,
    handlers: BTreeMap<String, Signature>,
    controller: BTreeMap<String, ControllerMethod>,
    fields: Vec<Field>,
}

/// A finished root scope.
struct UnitParts {
    unit: Unit,
    handlers: BTreeMap<String, Signature>,
    controller: BTreeMap<String, ControllerMethod>,
    fields: Vec<Field>,
}

impl<'a> UnitBuilder<'a> {
    fn new(ctx: &'a BuildContext<'a>, scope: ScopeKind, forms: FormStack) -> Self {
        Self {
            ctx,
            scope,
            forms,
            assignments: Vec::new(),
            controlled: Vec::new(),
            embeds: Vec::new(),
            variables: Vec::new(),
            captures: Vec::new(),
            handlers: BTreeMap::new(),
            controller: BTreeMap::new(),
            fields: Vec::new(),
        }
    }

    fn finish_block(&mut self) -> Block {
        let mut controlled = std::mem::take(&mut self.controlled);
        let mut embeds = std::mem::take(&mut self.embeds);
        back_to_front(&mut controlled, |c| &c.path);
        back_to_front(&mut embeds, |e| &e.path);
        Block {
            assignments: std::mem::take(&mut self.assignments),
            controlled,
            embeds,
        }
    }

    fn finish(mut self) -> CompileResult<UnitParts> {
        let block = self.finish_block();
        let mut captures = Vec::new();
        for raw in std::mem::take(&mut self.captures) {
            let mappings = raw
                .mappings
                .into_iter()
                .map(|m| resolve_event_mapping(m, &self.handlers, &self.controller))
                .collect::<CompileResult<Vec<_>>>()
                .map_err(|e| {
                    raw.frames
                        .iter()
                        .rev()
                        .fold(e, |e, frame| e.within(frame.as_str()))
                })?;
            captures.push(Capture {
                path: raw.path,
                mappings,
            });
        }
        Ok(UnitParts {
            unit: Unit {
                block,
                variables: self.variables,
                captures,
            },
            handlers: self.handlers,
            controller: self.controller,
            fields: self.fields,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Element attributes
    // ───────────────────────────────────────────────────────────────────────────

    fn control_block(
        &mut self,
        node: &Handle,
        path: &[usize],
        attrs: ElementAttrs,
    ) -> CompileResult<ControlBlock> {
        let (kind, expression, index, variable) = match (attrs.if_expr, attrs.for_expr) {
            (Some(condition), None) => (
                ControlBlockKind::If,
                parse_expression(&condition, "if")?,
                String::new(),
                String::new(),
            ),
            (None, Some(source)) => {
                let for_loop = parse_for(&source)?;
                (
                    ControlBlockKind::For,
                    for_loop.expression,
                    for_loop.index,
                    for_loop.variable,
                )
            }
            _ => return Err(CompileError::invalid("expected exactly one of if and for")),
        };

        let mut nested = UnitBuilder::new(self.ctx, ScopeKind::Control, self.forms.nested(path.len()));
        Walker::new(self.ctx.namespace).walk_children(node, &mut nested)?;
        let block = nested.finish_block();
        let template = render_children(node)?;
        Ok(ControlBlock {
            kind,
            expression,
            index,
            variable,
            path: path.to_vec(),
            block,
            template,
        })
    }

    fn add_assignments(&mut self, source: &str, path: &[usize]) -> CompileResult<()> {
        for (mut target, expression) in parse_assignments(source)? {
            match target.kind {
                BoundKind::Data
                | BoundKind::Property
                | BoundKind::Style
                | BoundKind::Class
                | BoundKind::FormValue => {}
                other => {
                    return Err(CompileError::invalid(format!(
                        "cannot assign to {}()",
                        other.keyword()
                    )))
                }
            }
            self.forms.resolve(&mut target, path.len())?;
            self.assignments.push(Assignment {
                target,
                expression,
                path: path.to_vec(),
            });
        }
        Ok(())
    }

    fn add_variables(&mut self, source: &str, path: &[usize]) -> CompileResult<()> {
        if self.scope == ScopeKind::Control {
            return Err(CompileError::invalid(
                "variables are not allowed inside control blocks",
            ));
        }
        for binding in parse_bindings(source)? {
            let mut value = binding.value;
            if matches!(value.kind, BoundKind::EventValue | BoundKind::RawExpr) {
                return Err(CompileError::invalid(format!(
                    "{}() values cannot be bound to a variable",
                    value.kind.keyword()
                )));
            }
            self.forms.resolve(&mut value, path.len())?;
            let multi_class = value.kind == BoundKind::Class && value.ids.len() > 1;
            let ty = match binding.ty {
                Some(ty) if multi_class && ty != ParamType::Int => {
                    return Err(CompileError::invalid(format!(
                        "variable {} binds several classes and must be int",
                        binding.variable
                    )))
                }
                Some(ty) => ty,
                None => self.auto_type(&value),
            };
            self.variables.push(VariableMapping {
                variable: TypedName {
                    name: binding.variable,
                    ty,
                },
                value,
                path: path.to_vec(),
            });
        }
        Ok(())
    }

    fn auto_type(&self, value: &BoundValue) -> ParamType {
        match value.kind {
            BoundKind::Class if value.ids.len() > 1 => ParamType::Int,
            BoundKind::Class => ParamType::Bool,
            BoundKind::SelfRef => ParamType::HostValue,
            BoundKind::FormValue => value
                .ids
                .first()
                .and_then(|name| self.forms.control(name))
                .map(|control| control.ty.clone())
                .unwrap_or(ParamType::String),
            _ => ParamType::String,
        }
    }

    fn add_captures(&mut self, source: &str, node: &Handle, path: &[usize]) -> CompileResult<()> {
        if self.scope == ScopeKind::Control {
            return Err(CompileError::invalid(
                "captures are not allowed inside control blocks",
            ));
        }
        let mut mappings = parse_captures(source)?;
        for mapping in &mut mappings {
            for param in &mut mapping.mappings {
                self.forms.resolve(&mut param.value, path.len())?;
            }
        }
        self.captures.push(RawCapture {
            path: path.to_vec(),
            frames: breadcrumb_of(node, path.len()),
            mappings,
        });
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Embeds
    // ───────────────────────────────────────────────────────────────────────────

    /// Resolves an embed type, returning its reference and, when the target
    /// is known, its parameter count.
    fn resolve_target(&self, type_name: &str) -> CompileResult<(TypeRef, Option<usize>)> {
        let (namespace, name) = match type_name.split_once('.') {
            Some((alias, name)) => (Some(alias.to_string()), name.to_string()),
            None => (None, type_name.to_string()),
        };
        match self.ctx.table.resolve_from(self.ctx.file, type_name)? {
            Resolution::Component { package, component } => Ok((
                TypeRef {
                    namespace,
                    name,
                    package: Some(package.to_string()),
                },
                Some(component.parameters.len()),
            )),
            Resolution::Macro { .. } => Err(CompileError::invalid(format!(
                "{} is a macro and cannot be embedded",
                type_name
            ))),
            Resolution::OutsideModule { package } => {
                if self.ctx.warn_unchecked_embeds {
                    warn!(target_type = %type_name, %package, "embedded component is outside the module and unchecked");
                } else {
                    debug!(target_type = %type_name, %package, "embedded component is outside the module and unchecked");
                }
                Ok((
                    TypeRef {
                        namespace,
                        name,
                        package: None,
                    },
                    None,
                ))
            }
        }
    }

    fn build_embed(&self, node: &Handle, path: &[usize]) -> CompileResult<Embed> {
        let namespace = self.ctx.namespace;
        let mut attrs = EmbedAttrs::default();
        collect_all(node, namespace, &mut attrs)?;
        let field = required(attrs.name, "name")?;
        if !is_identifier(&field) {
            return Err(ErrorKind::InvalidIdentifier(field).into());
        }
        let type_name = required(attrs.ty, "type")?;
        let kind = match (attrs.list, attrs.optional) {
            (true, true) => {
                return Err(CompileError::invalid(
                    "an embed cannot be both list and optional",
                ))
            }
            (true, false) => EmbedKind::List,
            (false, true) => EmbedKind::Optional,
            (false, false) => EmbedKind::Direct,
        };
        let (target, expected) = self.resolve_target(&type_name)?;

        let mut constructors = Constructors {
            namespace,
            type_name: &type_name,
            expected,
            calls: Vec::new(),
        };
        Walker::new(namespace).walk_children(node, &mut constructors)?;
        let calls = constructors.calls;

        let args = match kind {
            EmbedKind::Direct => {
                if !calls.is_empty() {
                    return Err(ErrorKind::ElementNotAllowed(format!("{}:construct", namespace)).into());
                }
                let args = parse_arguments(attrs.args.as_deref().unwrap_or(""))?;
                check_count(&type_name, expected, args.count)?;
                args
            }
            EmbedKind::List | EmbedKind::Optional => {
                if attrs.args.is_some() {
                    return Err(CompileError::invalid(
                        "list and optional embeds take their arguments from construct calls",
                    ));
                }
                if kind == EmbedKind::Optional {
                    if calls.len() > 1 {
                        return Err(CompileError::invalid(
                            "an optional embed takes at most one construct call",
                        ));
                    }
                    if calls.iter().any(|c| c.kind == ConstructorKind::For) {
                        return Err(CompileError::invalid(
                            "an optional embed cannot be constructed in a loop",
                        ));
                    }
                }
                Arguments::default()
            }
        };

        Ok(Embed {
            kind,
            path: path.to_vec(),
            field,
            target,
            args,
            control: attrs.control,
            constructor_calls: calls,
        })
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Component body
    // ───────────────────────────────────────────────────────────────────────────

    /// Text of a body declaration element, which must have no attributes and
    /// no element children.
    fn declaration_text(&self, node: &Handle) -> CompileResult<String> {
        collect_all(node, self.ctx.namespace, &mut NoAttributes)?;
        if let Some(child) = element_children(node).first() {
            return Err(ErrorKind::ElementNotAllowed(element_name(child).unwrap_or_default()).into());
        }
        Ok(text_content(node))
    }

    fn check_method_name(&self, what: &'static str, name: &str) -> CompileResult<()> {
        if self.handlers.contains_key(name) || self.controller.contains_key(name) {
            return Err(CompileError::duplicate(what, name));
        }
        Ok(())
    }
}

impl NodeHandler for UnitBuilder<'_> {
    fn element(&mut self, node: &Handle, path: &[usize], name: &str) -> StepResult {
        let depth = path.len();
        self.forms.pop_exited(depth);

        let mut attrs = ElementAttrs::default();
        collect_namespaced(node, self.ctx.namespace, &mut attrs)?;
        if attrs.if_expr.is_some() && attrs.for_expr.is_some() {
            return Err(CompileError::invalid(
                "an element cannot be both conditional and repeated",
            ));
        }
        if attrs.is_control()
            && (attrs.bindings.is_some() || attrs.capture.is_some() || attrs.assign.is_some())
        {
            return Err(CompileError::invalid(
                "bindings, captures and assignments are not allowed on a control element",
            ));
        }

        if name == "form" {
            self.forms.enter(node, depth, self.ctx.namespace)?;
        }

        if attrs.is_control() {
            let block = self.control_block(node, path, attrs)?;
            self.controlled.push(block);
            return Ok(Step::skip());
        }

        if let Some(source) = &attrs.assign {
            self.add_assignments(source, path)?;
        }
        if let Some(source) = &attrs.bindings {
            self.add_variables(source, path)?;
        }
        if let Some(source) = &attrs.capture {
            self.add_captures(source, node, path)?;
        }
        Ok(Step::descend())
    }

    fn embed(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        let embed = self.build_embed(node, path)?;
        self.embeds.push(embed);
        Ok(Step::remove())
    }

    fn text_directive(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        let mut attrs = TextAttrs::default();
        collect_all(node, self.ctx.namespace, &mut attrs)?;
        let expression = parse_expression(&required(attrs.expr, "expr")?, "text")?;
        if let Some(child) = element_children(node).first() {
            return Err(ErrorKind::ElementNotAllowed(element_name(child).unwrap_or_default()).into());
        }
        let fallback = text_content(node);
        let fallback = if fallback.trim().is_empty() {
            " ".to_string()
        } else {
            fallback
        };

        let mut text_path = path.to_vec();
        if let Some(last) = text_path.last_mut() {
            *last += 1;
        }
        self.assignments.push(Assignment {
            target: BoundValue::new(BoundKind::Property, vec!["textContent".to_string()]),
            expression,
            path: text_path,
        });
        Ok(Step::replace(vec![
            create_comment(""),
            create_text(&fallback),
            create_comment(""),
        ]))
    }

    fn handlers(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        if self.scope != ScopeKind::Component {
            return self.unhandled(Directive::Handlers, node, path);
        }
        for (name, signature) in parse_signatures(&self.declaration_text(node)?)? {
            if let Some(param) = signature.params.iter().find(|p| !p.ty.is_scalar()) {
                return Err(CompileError::invalid(format!(
                    "parameter {} of handler {} must have a scalar type",
                    param.name, name
                )));
            }
            self.check_method_name("handler", &name)?;
            self.handlers.insert(name, signature);
        }
        Ok(Step::remove())
    }

    fn controller(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        if self.scope != ScopeKind::Component {
            return self.unhandled(Directive::Controller, node, path);
        }
        for (name, signature) in parse_signatures(&self.declaration_text(node)?)? {
            self.check_method_name("controller method", &name)?;
            self.controller.insert(name, ControllerMethod::new(signature));
        }
        Ok(Step::remove())
    }

    fn data(&mut self, node: &Handle, path: &[usize]) -> StepResult {
        if self.scope != ScopeKind::Component {
            return self.unhandled(Directive::Data, node, path);
        }
        let fields = parse_fields(&self.declaration_text(node)?)?;
        self.fields.extend(fields);
        Ok(Step::remove())
    }
}

/// Collects the `a:construct` children of a list or optional embed.
struct Constructors<'a> {
    namespace: &'a str,
    type_name: &'a str,
    expected: Option<usize>,
    calls: Vec<ConstructorCall>,
}

impl NodeHandler for Constructors<'_> {
    fn construct(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let mut attrs = ConstructAttrs::default();
        collect_all(node, self.namespace, &mut attrs)?;
        if let Some(child) = element_children(node).first() {
            return Err(ErrorKind::ElementNotAllowed(element_name(child).unwrap_or_default()).into());
        }
        let args = parse_arguments(attrs.args.as_deref().unwrap_or(""))?;
        check_count(self.type_name, self.expected, args.count)?;
        let call = match (attrs.if_expr, attrs.for_expr) {
            (Some(_), Some(_)) => {
                return Err(CompileError::invalid(
                    "a construct call cannot be both conditional and repeated",
                ))
            }
            (Some(condition), None) => ConstructorCall {
                kind: ConstructorKind::If,
                args,
                expression: parse_expression(&condition, "if")?,
                index: String::new(),
                variable: String::new(),
            },
            (None, Some(source)) => {
                let for_loop = parse_for(&source)?;
                ConstructorCall {
                    kind: ConstructorKind::For,
                    args,
                    expression: for_loop.expression,
                    index: for_loop.index,
                    variable: for_loop.variable,
                }
            }
            (None, None) => ConstructorCall {
                kind: ConstructorKind::Direct,
                args,
                expression: String::new(),
                index: String::new(),
                variable: String::new(),
            },
        };
        self.calls.push(call);
        Ok(Step::skip())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], name: &str) -> StepResult {
        Err(ErrorKind::ElementNotAllowed(name.to_string()).into())
    }

    fn text(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        reject_text(node)
    }
}

fn reject_text(node: &Handle) -> StepResult {
    if is_whitespace_text(node) {
        Ok(Step::skip())
    } else {
        let text = text_of(node).unwrap_or_default();
        Err(ErrorKind::UnexpectedText(text.trim().to_string()).into())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPTURE RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

fn resolve_event_mapping(
    raw: RawEventMapping,
    handlers: &BTreeMap<String, Signature>,
    controller: &BTreeMap<String, ControllerMethod>,
) -> CompileResult<EventMapping> {
    let handler = raw.handler;
    let (signature, from_controller) = match (handlers.get(&handler), controller.get(&handler)) {
        (Some(signature), _) => (signature, false),
        (None, Some(method)) if method.capturable => (&method.signature, true),
        (None, Some(_)) => return Err(ErrorKind::NotCapturable(handler).into()),
        (None, None) => return Err(ErrorKind::UnknownHandler(handler).into()),
    };
    let params = &signature.params;

    let positional = raw.mappings.iter().filter(|m| m.name.is_none()).count();
    if positional > params.len() {
        return Err(ErrorKind::TooManyMappings {
            handler,
            expected: params.len(),
            given: positional,
        }
        .into());
    }

    let mut slots: Vec<Option<BoundValue>> = vec![None; params.len()];
    // Positional mappings always precede named ones, so `i` is their index.
    for (i, mapping) in raw.mappings.into_iter().enumerate() {
        let index = match &mapping.name {
            None => i,
            Some(name) => params.iter().position(|p| &p.name == name).ok_or_else(|| {
                ErrorKind::UnknownHandlerParam {
                    handler: handler.clone(),
                    param: name.clone(),
                }
            })?,
        };
        if slots[index].is_some() {
            return Err(CompileError::duplicate(
                "parameter mapping",
                params[index].name.clone(),
            ));
        }
        slots[index] = Some(mapping.value);
    }
    let param_mappings = params
        .iter()
        .zip(slots)
        .map(|(param, value): (&Param, Option<BoundValue>)| ParamMapping {
            param: param.name.clone(),
            value: value.unwrap_or_else(|| BoundValue::data(&param.name)),
        })
        .collect();

    let handling = match raw.handling {
        Some(EventHandling::AskPreventDefault) if !signature.returns_bool() => {
            return Err(CompileError::invalid(format!(
                "preventDefault(ask) needs {} to return bool",
                handler
            )))
        }
        Some(handling) => handling,
        None if signature.returns_bool() => EventHandling::AskPreventDefault,
        None => EventHandling::DontPreventDefault,
    };

    Ok(EventMapping {
        event: raw.event,
        handler,
        param_mappings,
        handling,
        from_controller,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENTS, SITES, FILES
// ═══════════════════════════════════════════════════════════════════════════════

fn embed_fields<'b>(block: &'b Block, out: &mut Vec<&'b str>) {
    out.extend(block.embeds.iter().map(|e| e.field.as_str()));
    for control in &block.controlled {
        embed_fields(&control.block, out);
    }
}

/// Variables, stored parameters, fields and embed fields share one name space.
fn check_member_names(parameters: &[Param], fields: &[Field], unit: &Unit) -> CompileResult<()> {
    let mut names: Vec<&str> = unit
        .variables
        .iter()
        .map(|v| v.variable.name.as_str())
        .collect();
    names.extend(parameters.iter().filter(|p| p.is_var).map(|p| p.name.as_str()));
    names.extend(fields.iter().map(|f| f.name.as_str()));
    embed_fields(&unit.block, &mut names);

    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(CompileError::duplicate("member", name));
        }
    }
    Ok(())
}

/// Builds the component declared by an `a:component` element.
pub fn build_component(ctx: &BuildContext, node: &Handle) -> CompileResult<Component> {
    let mut attrs = ComponentAttrs::default();
    collect_all(node, ctx.namespace, &mut attrs)?;
    let name = required(attrs.name, "name")?;
    let parameters = match attrs.params {
        Some(params) => parse_params(&params)?,
        None => Vec::new(),
    };
    debug!(component = %name, "building component");

    let mut builder = UnitBuilder::new(ctx, ScopeKind::Component, FormStack::default());
    Walker::new(ctx.namespace).walk_children(node, &mut builder)?;
    let parts = builder.finish()?;
    check_member_names(&parameters, &parts.fields, &parts.unit)?;

    Ok(Component {
        name,
        parameters,
        fields: parts.fields,
        handlers: parts.handlers,
        controller: parts.controller,
        has_init: attrs.init,
        unit: parts.unit,
        template: render_children(node)?,
    })
}

/// Builds the page skeleton of an `a:site` element.
pub fn build_site(ctx: &BuildContext, node: &Handle) -> CompileResult<Site> {
    let mut attrs = SiteAttrs::default();
    collect_all(node, ctx.namespace, &mut attrs)?;
    let html_file = required(attrs.html_file, "htmlFile")?;
    let js_file = required(attrs.js_file, "jsFile")?;
    debug!(%html_file, %js_file, "building site");

    let mut builder = UnitBuilder::new(ctx, ScopeKind::Site, FormStack::default());
    Walker::new(ctx.namespace).walk_children(node, &mut builder)?;
    let parts = builder.finish()?;
    check_member_names(&[], &[], &parts.unit)?;

    Ok(Site {
        html_file,
        js_file,
        unit: parts.unit,
        template: render_children(node)?,
    })
}

/// Components and site of one file.
#[derive(Debug, Default)]
pub struct FileUnits {
    pub components: Vec<Component>,
    pub site: Option<Site>,
}

struct FileBuilder<'a> {
    ctx: &'a BuildContext<'a>,
    units: FileUnits,
}

impl NodeHandler for FileBuilder<'_> {
    fn component(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        let component = build_component(self.ctx, node)?;
        self.units.components.push(component);
        Ok(Step::skip())
    }

    fn site(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        if self.units.site.is_some() {
            return Err(CompileError::duplicate(
                "site",
                format!("{}:site", self.ctx.namespace),
            ));
        }
        self.units.site = Some(build_site(self.ctx, node)?);
        Ok(Step::skip())
    }

    fn templates(&mut self, _node: &Handle, _path: &[usize]) -> StepResult {
        Ok(Step::descend())
    }

    fn element(&mut self, _node: &Handle, _path: &[usize], name: &str) -> StepResult {
        Err(ErrorKind::ElementNotAllowed(name.to_string()).into())
    }

    fn text(&mut self, node: &Handle, _path: &[usize]) -> StepResult {
        reject_text(node)
    }
}

/// Builds every unit of the file addressed by `ctx.file`.
pub fn build_file(ctx: &BuildContext) -> CompileResult<FileUnits> {
    let root = ctx
        .table
        .file(ctx.file)?
        .root
        .clone()
        .ok_or_else(|| CompileError::invalid("file has no parsed tree"))?;
    let mut builder = FileBuilder {
        ctx,
        units: FileUnits::default(),
    };
    Walker::new(ctx.namespace).walk_children(&root, &mut builder)?;
    Ok(builder.units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_back_to_front_keeps_ties_reversed() {
        let mut items = vec![
            (vec![0], "a"),
            (vec![0], "b"),
            (vec![0, 3], "c"),
            (vec![2], "d"),
        ];
        back_to_front(&mut items, |item| &item.0);
        let order: Vec<_> = items.iter().map(|item| item.1).collect();
        assert_eq!(order, vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_check_count() {
        assert!(check_count("Row", None, 3).is_ok());
        assert!(check_count("Row", Some(2), 2).is_ok());
        assert_eq!(
            check_count("Row", Some(1), 2).unwrap_err().to_string(),
            "Row takes 1 arguments, 2 given"
        );
    }
}
