//! Grammars of the element attributes: bound values, `bindings`, `assign`,
//! `capture` and `for`.

use crate::cursor::Cursor;
use crate::declarations::parse_type;
use crate::error::{CompileError, CompileResult};
use crate::model::{BoundKind, BoundValue, EventHandling, ParamType};

// ═══════════════════════════════════════════════════════════════════════════════
// BOUND VALUES
// ═══════════════════════════════════════════════════════════════════════════════

fn kind_from_keyword(keyword: &str) -> Option<BoundKind> {
    Some(match keyword {
        "data" => BoundKind::Data,
        "prop" => BoundKind::Property,
        "style" => BoundKind::Style,
        "class" => BoundKind::Class,
        "form" => BoundKind::FormValue,
        "event" => BoundKind::EventValue,
        "self" => BoundKind::SelfRef,
        "go" => BoundKind::RawExpr,
        _ => return None,
    })
}

/// `kind(arg, ...)`
pub fn parse_bound(c: &mut Cursor) -> CompileResult<BoundValue> {
    let start = c.pos();
    let keyword = c.identifier()?;
    let kind = kind_from_keyword(&keyword).ok_or_else(|| {
        CompileError::syntax("bound value", start, format!("unknown kind '{}'", keyword))
    })?;
    c.skip_ws();
    c.expect(b'(')?;
    c.skip_ws();

    let mut ids = Vec::new();
    if kind == BoundKind::RawExpr {
        let expr = c.opaque(b")")?;
        if expr.is_empty() {
            return Err(c.error("go() needs an expression"));
        }
        ids.push(expr);
    } else if c.peek() != Some(b')') {
        loop {
            ids.push(c.name()?);
            c.skip_ws();
            if c.peek() == Some(b')') {
                break;
            }
            c.expect(b',')?;
            c.skip_ws();
        }
    }
    c.expect(b')')?;

    let arity_ok = match kind {
        BoundKind::SelfRef => ids.is_empty(),
        BoundKind::Data | BoundKind::Property | BoundKind::Style | BoundKind::FormValue => {
            ids.len() == 1
        }
        BoundKind::Class => !ids.is_empty(),
        BoundKind::EventValue => ids.len() <= 1,
        BoundKind::RawExpr => true,
    };
    if !arity_ok {
        return Err(CompileError::syntax(
            "bound value",
            start,
            format!("wrong number of arguments for {}()", keyword),
        ));
    }
    Ok(BoundValue::new(kind, ids))
}

pub fn parse_bound_str(src: &str) -> CompileResult<BoundValue> {
    let mut c = Cursor::new(src.trim(), "bound value");
    let value = parse_bound(&mut c)?;
    c.expect_eof()?;
    Ok(value)
}

/// Runs `item` over a `,` separated list, trailing commas not allowed.
fn comma_list<T>(
    src: &str,
    grammar: &'static str,
    mut item: impl FnMut(&mut Cursor) -> CompileResult<T>,
) -> CompileResult<Vec<T>> {
    let mut c = Cursor::new(src, grammar);
    let mut items = Vec::new();
    c.skip_ws();
    if c.is_eof() {
        return Err(c.error("empty list"));
    }
    loop {
        c.skip_ws();
        items.push(item(&mut c)?);
        c.skip_ws();
        if c.is_eof() {
            break;
        }
        c.expect(b',')?;
    }
    Ok(items)
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDINGS & ASSIGNMENTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub value: BoundValue,
    pub variable: String,
    /// `None` when the type is left to be inferred from the bound kind.
    pub ty: Option<ParamType>,
}

/// `BOUND:VAR (',' BOUND:VAR)*` where VAR is `name` or `(name TYPE)`.
pub fn parse_bindings(src: &str) -> CompileResult<Vec<Binding>> {
    comma_list(src, "bindings", |c| {
        let value = parse_bound(c)?;
        c.skip_ws();
        c.expect(b':')?;
        c.skip_ws();
        let (variable, ty) = if c.eat(b'(') {
            c.skip_ws();
            let variable = c.identifier()?;
            c.skip_ws();
            let ty = parse_type(c)?;
            c.skip_ws();
            c.expect(b')')?;
            (variable, Some(ty))
        } else {
            (c.identifier()?, None)
        };
        Ok(Binding {
            value,
            variable,
            ty,
        })
    })
}

/// `BOUND=EXPR (',' BOUND=EXPR)*`
pub fn parse_assignments(src: &str) -> CompileResult<Vec<(BoundValue, String)>> {
    comma_list(src, "assignments", |c| {
        let target = parse_bound(c)?;
        c.skip_ws();
        c.expect(b'=')?;
        let expression = c.opaque(b",")?;
        if expression.is_empty() {
            return Err(c.error("expected expression"));
        }
        Ok((target, expression))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CAPTURES
// ═══════════════════════════════════════════════════════════════════════════════

/// One handler parameter mapping as written; `name` is `None` for
/// positional mappings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParamMapping {
    pub name: Option<String>,
    pub value: BoundValue,
}

/// An `event:handler(...){...}` entry before handler resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEventMapping {
    pub event: String,
    pub handler: String,
    pub mappings: Vec<RawParamMapping>,
    pub handling: Option<EventHandling>,
}

pub fn parse_captures(src: &str) -> CompileResult<Vec<RawEventMapping>> {
    comma_list(src, "captures", |c| {
        let event = c.name()?;
        c.skip_ws();
        c.expect(b':')?;
        c.skip_ws();
        let handler = c.identifier()?;
        c.skip_ws();

        let mut mappings = Vec::new();
        if c.eat(b'(') {
            c.skip_ws();
            if !c.eat(b')') {
                loop {
                    c.skip_ws();
                    let mapping = parse_param_mapping(c)?;
                    let after_named = mappings
                        .last()
                        .map(|m: &RawParamMapping| m.name.is_some())
                        .unwrap_or(false);
                    if mapping.name.is_none() && after_named {
                        return Err(c.error("positional mapping after a named mapping"));
                    }
                    mappings.push(mapping);
                    c.skip_ws();
                    if c.eat(b')') {
                        break;
                    }
                    c.expect(b',')?;
                }
            }
            c.skip_ws();
        }

        let mut handling = None;
        if c.eat(b'{') {
            c.skip_ws();
            if !c.eat(b'}') {
                loop {
                    c.skip_ws();
                    let tag = parse_tag(c)?;
                    if handling.replace(tag).is_some() {
                        return Err(c.error("duplicate preventDefault tag"));
                    }
                    c.skip_ws();
                    if c.eat(b'}') {
                        break;
                    }
                    c.expect(b',')?;
                }
            }
        }

        Ok(RawEventMapping {
            event,
            handler,
            mappings,
            handling,
        })
    })
}

/// `name=BOUND` or a bare positional `BOUND`.
fn parse_param_mapping(c: &mut Cursor) -> CompileResult<RawParamMapping> {
    let start = c.pos();
    let name = c.identifier()?;
    c.skip_ws();
    if c.eat(b'=') {
        c.skip_ws();
        let value = parse_bound(c)?;
        return Ok(RawParamMapping {
            name: Some(name),
            value,
        });
    }
    c.rewind(start);
    let value = parse_bound(c)?;
    Ok(RawParamMapping { name: None, value })
}

/// `preventDefault` or `preventDefault(true|false|ask)`.
fn parse_tag(c: &mut Cursor) -> CompileResult<EventHandling> {
    let start = c.pos();
    let tag = c.identifier()?;
    if tag != "preventDefault" {
        return Err(CompileError::syntax(
            "captures",
            start,
            format!("unknown tag '{}'", tag),
        ));
    }
    c.skip_ws();
    if !c.eat(b'(') {
        return Ok(EventHandling::PreventDefault);
    }
    c.skip_ws();
    let at = c.pos();
    let handling = match c.identifier()?.as_str() {
        "true" => EventHandling::PreventDefault,
        "false" => EventHandling::DontPreventDefault,
        "ask" => EventHandling::AskPreventDefault,
        other => {
            return Err(CompileError::syntax(
                "captures",
                at,
                format!("expected true, false or ask, found '{}'", other),
            ))
        }
    };
    c.skip_ws();
    c.expect(b')')?;
    Ok(handling)
}

/// A whole attribute value forwarded as one host expression (`a:if`,
/// `a:text expr`). Only checked for balance.
pub fn parse_expression(src: &str, grammar: &'static str) -> CompileResult<String> {
    let mut c = Cursor::new(src, grammar);
    let expression = c.opaque(b"")?;
    if expression.is_empty() {
        return Err(c.error("expected expression"));
    }
    Ok(expression)
}

// ═══════════════════════════════════════════════════════════════════════════════
// FOR LOOPS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoop {
    pub index: String,
    /// Empty when only the index is bound.
    pub variable: String,
    pub expression: String,
}

/// `VAR (',' VAR)? ':=' 'range' EXPR`
pub fn parse_for(src: &str) -> CompileResult<ForLoop> {
    let mut c = Cursor::new(src, "for");
    c.skip_ws();
    let index = c.identifier()?;
    c.skip_ws();
    let variable = if c.eat(b',') {
        c.skip_ws();
        let variable = c.identifier()?;
        c.skip_ws();
        variable
    } else {
        String::new()
    };
    if !c.eat_str(":=") {
        return Err(c.error("expected ':='"));
    }
    c.skip_ws();
    if !c.eat_keyword("range") {
        return Err(c.error("expected 'range'"));
    }
    let expression = c.opaque(b"")?;
    if expression.is_empty() {
        return Err(c.error("expected range expression"));
    }
    Ok(ForLoop {
        index,
        variable,
        expression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bound_value_kinds() {
        assert_eq!(
            parse_bound_str("class(active, is-open)").unwrap().ids,
            vec!["active", "is-open"]
        );
        assert_eq!(parse_bound_str("self()").unwrap().kind, BoundKind::SelfRef);
        assert_eq!(parse_bound_str("event()").unwrap().ids.len(), 0);
        assert_eq!(
            parse_bound_str("go(f(a, b))").unwrap().ids,
            vec!["f(a, b)"]
        );
        assert!(parse_bound_str("self(x)").is_err());
        assert!(parse_bound_str("data()").is_err());
        assert!(parse_bound_str("prop(a, b)").is_err());
        assert!(parse_bound_str("class()").is_err());
        assert!(parse_bound_str("widget(x)").is_err());
    }

    #[test]
    fn test_bindings_round_trip() {
        let src = "prop(value):v, class(a, b):(flags int), style(font-size):size, self():el";
        let bindings = parse_bindings(src).unwrap();
        assert_eq!(bindings.len(), 4);
        assert_eq!(bindings[1].ty, Some(ParamType::Int));
        assert_eq!(bindings[2].variable, "size");

        let printed = bindings
            .iter()
            .map(|b| match &b.ty {
                Some(ty) => format!("{}:({} {})", b.value, b.variable, ty),
                None => format!("{}:{}", b.value, b.variable),
            })
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(parse_bindings(&printed).unwrap(), bindings);
    }

    #[test]
    fn test_bindings_errors() {
        assert!(parse_bindings("").is_err());
        assert!(parse_bindings("data(x)").is_err());
        assert!(parse_bindings("data(x):v,").is_err());
    }

    #[test]
    fn test_assignments() {
        let assignments =
            parse_assignments("prop(textContent)=fmt.Sprint(a, b), class(on)=x > 1").unwrap();
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].1, "fmt.Sprint(a, b)");
        assert_eq!(assignments[1].0.kind, BoundKind::Class);
        assert!(parse_assignments("prop(x)=").is_err());
    }

    #[test]
    fn test_captures() {
        let captures = parse_captures(
            "click:save(event(), id=data(key)){preventDefault(ask)}, input:changed",
        )
        .unwrap();
        assert_eq!(captures.len(), 2);
        assert_eq!(captures[0].event, "click");
        assert_eq!(captures[0].mappings[0].name, None);
        assert_eq!(captures[0].mappings[1].name.as_deref(), Some("id"));
        assert_eq!(
            captures[0].handling,
            Some(EventHandling::AskPreventDefault)
        );
        assert_eq!(captures[1].handler, "changed");
        assert!(captures[1].mappings.is_empty());
        assert_eq!(captures[1].handling, None);
    }

    #[test]
    fn test_positional_after_named_is_error() {
        let err = parse_captures("click:save(id=data(key), event())").unwrap_err();
        assert!(err.to_string().contains("positional mapping after a named mapping"));
    }

    #[test]
    fn test_capture_tags() {
        let c = parse_captures("submit:send{preventDefault}").unwrap();
        assert_eq!(c[0].handling, Some(EventHandling::PreventDefault));
        let c = parse_captures("submit:send{preventDefault(false)}").unwrap();
        assert_eq!(c[0].handling, Some(EventHandling::DontPreventDefault));
        assert!(parse_captures("submit:send{stopPropagation}").is_err());
        assert!(parse_captures("submit:send{preventDefault, preventDefault}").is_err());
    }

    #[test]
    fn test_expression() {
        assert_eq!(parse_expression(" a && (b || c) ", "if").unwrap(), "a && (b || c)");
        assert!(parse_expression("f(", "if").is_err());
        assert!(parse_expression("  ", "if").is_err());
    }

    #[test]
    fn test_for_loop() {
        let f = parse_for("i, item := range c.Items()").unwrap();
        assert_eq!(f.index, "i");
        assert_eq!(f.variable, "item");
        assert_eq!(f.expression, "c.Items()");

        let f = parse_for("i := range 10").unwrap();
        assert_eq!(f.index, "i");
        assert_eq!(f.variable, "");

        assert!(parse_for("i in items").is_err());
        assert!(parse_for("i := range").is_err());
        assert!(parse_for("i := rangeItems").is_err());
    }
}
