//! Declaration grammars: types, parameters, fields, handler signatures,
//! imports and constructor arguments.

use crate::cursor::Cursor;
use crate::error::{CompileError, CompileResult};
use crate::model::{Arguments, Field, Param, ParamType, Signature};

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

pub fn parse_type(c: &mut Cursor) -> CompileResult<ParamType> {
    if c.eat_str("[]") {
        let element = Box::new(parse_type(c)?);
        return Ok(ParamType::Array { element });
    }
    if c.eat(b'*') {
        let target = Box::new(parse_type(c)?);
        return Ok(ParamType::Pointer { target });
    }
    if c.eat_str("map[") {
        c.skip_ws();
        let key = Box::new(parse_type(c)?);
        c.skip_ws();
        c.expect(b']')?;
        let value = Box::new(parse_type(c)?);
        return Ok(ParamType::Map { key, value });
    }
    if c.eat_keyword("chan") {
        c.skip_blanks();
        let element = Box::new(parse_type(c)?);
        return Ok(ParamType::Chan { element });
    }
    if c.eat_keyword("func") {
        return parse_func_type(c);
    }

    let first = c.identifier()?;
    if c.eat(b'.') {
        let name = c.identifier()?;
        if first == "js" && name == "Value" {
            return Ok(ParamType::HostValue);
        }
        return Ok(ParamType::Named {
            namespace: Some(first),
            name,
        });
    }
    Ok(match first.as_str() {
        "int" => ParamType::Int,
        "string" => ParamType::String,
        "bool" => ParamType::Bool,
        _ => ParamType::Named {
            namespace: None,
            name: first,
        },
    })
}

fn parse_func_type(c: &mut Cursor) -> CompileResult<ParamType> {
    c.expect(b'(')?;
    let mut params = Vec::new();
    c.skip_ws();
    if !c.eat(b')') {
        loop {
            c.skip_ws();
            params.push(parse_type(c)?);
            c.skip_ws();
            if c.eat(b')') {
                break;
            }
            c.expect(b',')?;
        }
    }
    c.skip_blanks();
    let returns = if starts_type(c) {
        Some(Box::new(parse_type(c)?))
    } else {
        None
    };
    Ok(ParamType::Func { params, returns })
}

fn starts_type(c: &Cursor) -> bool {
    matches!(c.peek(), Some(b) if b.is_ascii_alphabetic() || b == b'_' || b == b'[' || b == b'*')
}

/// Parses a complete type expression.
pub fn parse_type_str(src: &str) -> CompileResult<ParamType> {
    let mut c = Cursor::new(src.trim(), "type");
    let ty = parse_type(&mut c)?;
    c.expect_eof()?;
    Ok(ty)
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS & FIELDS
// ═══════════════════════════════════════════════════════════════════════════════

/// `('var')? NAME TYPE (',' ...)*`, the `params` attribute of a component.
pub fn parse_params(src: &str) -> CompileResult<Vec<Param>> {
    let mut c = Cursor::new(src, "params");
    let mut params = Vec::new();
    c.skip_ws();
    if c.is_eof() {
        return Ok(params);
    }
    loop {
        c.skip_ws();
        let is_var = c.eat_keyword("var");
        c.skip_ws();
        let name = c.identifier()?;
        c.skip_ws();
        let ty = parse_type(&mut c)?;
        params.push(Param { name, ty, is_var });
        c.skip_ws();
        if c.is_eof() {
            break;
        }
        c.expect(b',')?;
    }
    Ok(params)
}

/// Runs `item` over a `;`/newline separated list.
fn separated<T>(
    src: &str,
    grammar: &'static str,
    mut item: impl FnMut(&mut Cursor) -> CompileResult<T>,
) -> CompileResult<Vec<T>> {
    let mut c = Cursor::new(src, grammar);
    let mut items = Vec::new();
    loop {
        c.skip_ws();
        while c.eat(b';') {
            c.skip_ws();
        }
        if c.is_eof() {
            break;
        }
        items.push(item(&mut c)?);
        c.skip_blanks();
        match c.peek() {
            None | Some(b';') | Some(b'\n') => {}
            Some(_) => return Err(c.error(format!("unexpected '{}'", c.rest().trim_end()))),
        }
    }
    Ok(items)
}

/// Field declarations of `a:data`: `NAME(,NAME)* TYPE ('=' EXPR)?`.
pub fn parse_fields(src: &str) -> CompileResult<Vec<Field>> {
    let groups = separated(src, "fields", |c| {
        let mut names = vec![c.identifier()?];
        c.skip_blanks();
        while c.eat(b',') {
            c.skip_blanks();
            names.push(c.identifier()?);
            c.skip_blanks();
        }
        let ty = parse_type(c)?;
        c.skip_blanks();
        let default = if c.eat(b'=') {
            let expr = c.opaque(b";\n")?;
            if expr.is_empty() {
                return Err(c.error("expected default value"));
            }
            Some(expr)
        } else {
            None
        };
        Ok(names
            .into_iter()
            .map(|name| Field {
                name,
                ty: ty.clone(),
                default: default.clone(),
            })
            .collect::<Vec<_>>())
    })?;
    Ok(groups.into_iter().flatten().collect())
}

/// Method declarations of `a:handlers` and `a:controller`:
/// `NAME '(' (NAME TYPE),* ')' TYPE?`.
pub fn parse_signatures(src: &str) -> CompileResult<Vec<(String, Signature)>> {
    separated(src, "handlers", |c| {
        let name = c.identifier()?;
        c.skip_blanks();
        c.expect(b'(')?;
        let mut params = Vec::new();
        c.skip_ws();
        if !c.eat(b')') {
            loop {
                c.skip_ws();
                let param = c.identifier()?;
                c.skip_ws();
                let ty = parse_type(c)?;
                params.push(Param {
                    name: param,
                    ty,
                    is_var: false,
                });
                c.skip_ws();
                if c.eat(b')') {
                    break;
                }
                c.expect(b',')?;
            }
        }
        c.skip_blanks();
        let returns = if starts_type(c) {
            Some(parse_type(c)?)
        } else {
            None
        };
        Ok((name, Signature { params, returns }))
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS & ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Import clauses of `a:import`: `(ALIAS)? "PATH"`. Returns `(alias, path)`.
pub fn parse_imports(src: &str) -> CompileResult<Vec<(String, String)>> {
    separated(src, "imports", |c| {
        let alias = if c.peek() == Some(b'"') {
            None
        } else {
            let alias = c.identifier()?;
            c.skip_blanks();
            Some(alias)
        };
        let start = c.pos();
        let path = c.quoted()?;
        if path.is_empty() || path.starts_with('/') || path.ends_with('/') {
            return Err(CompileError::syntax(
                "imports",
                start,
                format!("invalid import path \"{}\"", path),
            ));
        }
        let alias = match alias {
            Some(alias) => alias,
            None => path.rsplit('/').next().unwrap_or(&path).to_string(),
        };
        Ok((alias, path))
    })
}

/// Constructor arguments: `EXPR (',' EXPR)*`.
pub fn parse_arguments(src: &str) -> CompileResult<Arguments> {
    let mut c = Cursor::new(src, "arguments");
    c.skip_ws();
    if c.is_eof() {
        return Ok(Arguments::default());
    }
    let mut count = 0;
    loop {
        let expr = c.opaque(b",")?;
        if expr.is_empty() {
            return Err(c.error("expected expression"));
        }
        count += 1;
        if !c.eat(b',') {
            break;
        }
    }
    Ok(Arguments {
        raw: src.trim().to_string(),
        count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_types() {
        assert_eq!(parse_type_str("int").unwrap(), ParamType::Int);
        assert_eq!(parse_type_str("js.Value").unwrap(), ParamType::HostValue);
        assert_eq!(
            parse_type_str("map[string][]*ui.Item").unwrap().to_string(),
            "map[string][]*ui.Item"
        );
        assert_eq!(
            parse_type_str("func(int, string) bool").unwrap().to_string(),
            "func(int, string) bool"
        );
        assert_eq!(parse_type_str("chan Event").unwrap().to_string(), "chan Event");
        assert!(parse_type_str("map[int").is_err());
        assert!(parse_type_str("int x").is_err());
    }

    #[test]
    fn test_params() {
        let params = parse_params("title string, var count int, cb func()").unwrap();
        assert_eq!(params.len(), 3);
        assert!(!params[0].is_var);
        assert!(params[1].is_var);
        assert_eq!(params[1].name, "count");
        assert_eq!(params[2].ty.to_string(), "func()");
        assert!(parse_params("  ").unwrap().is_empty());
        assert!(parse_params("title").is_err());
    }

    #[test]
    fn test_fields() {
        let fields = parse_fields(
            "
            a, b int = len(\"x;y\")
            items []string; open bool
            ",
        )
        .unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "items", "open"]);
        assert_eq!(fields[1].default.as_deref(), Some("len(\"x;y\")"));
        assert_eq!(fields[3].ty, ParamType::Bool);
    }

    #[test]
    fn test_signatures() {
        let sigs = parse_signatures("click(x int, y int) bool\nreset()").unwrap();
        assert_eq!(sigs.len(), 2);
        assert_eq!(sigs[0].0, "click");
        assert!(sigs[0].1.returns_bool());
        assert_eq!(sigs[1].1.params.len(), 0);
        assert!(sigs[1].1.returns.is_none());
        assert!(parse_signatures("click(x int) bool extra").is_err());
    }

    #[test]
    fn test_imports_default_alias() {
        let imports = parse_imports("\"example.com/app/widgets\"\nw2 \"example.com/other\"").unwrap();
        assert_eq!(
            imports,
            vec![
                ("widgets".to_string(), "example.com/app/widgets".to_string()),
                ("w2".to_string(), "example.com/other".to_string()),
            ]
        );
        assert!(parse_imports("\"unterminated").is_err());
    }

    #[test]
    fn test_arguments() {
        let args = parse_arguments(" item.Name, f(a, b), \"x,y\" ").unwrap();
        assert_eq!(args.count, 3);
        assert_eq!(args.raw, "item.Name, f(a, b), \"x,y\"");
        assert_eq!(parse_arguments("").unwrap().count, 0);
        assert!(parse_arguments("a,,b").is_err());
    }
}
