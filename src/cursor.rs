use crate::error::{CompileError, CompileResult};

/// Byte cursor shared by the attribute-value grammars.
///
/// Only ASCII bytes are ever compared, so every slice boundary the cursor
/// produces is a char boundary.
pub struct Cursor<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    grammar: &'static str,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str, grammar: &'static str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            grammar,
        }
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Backtracks to a position obtained from [`Cursor::pos`].
    pub fn rewind(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    pub fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    pub fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    pub fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::syntax(self.grammar, self.pos, message)
    }

    pub fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    /// Skips blanks but stops at line breaks, which separate declarations.
    pub fn skip_blanks(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r')) {
            self.pos += 1;
        }
    }

    pub fn eat(&mut self, byte: u8) -> bool {
        if self.peek() == Some(byte) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, byte: u8) -> CompileResult<()> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    pub fn eat_str(&mut self, s: &str) -> bool {
        if self.rest().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    /// Consumes `word` only when it is not the prefix of a longer identifier.
    pub fn eat_keyword(&mut self, word: &str) -> bool {
        if !self.rest().starts_with(word) {
            return false;
        }
        match self.bytes.get(self.pos + word.len()) {
            Some(b) if is_ident_continue(*b) => false,
            _ => {
                self.pos += word.len();
                true
            }
        }
    }

    /// `[A-Za-z_][A-Za-z0-9_]*`
    pub fn identifier(&mut self) -> CompileResult<String> {
        self.word(false)
    }

    /// An identifier that may also contain `-` (DOM and CSS names).
    pub fn name(&mut self) -> CompileResult<String> {
        self.word(true)
    }

    fn word(&mut self, dashes: bool) -> CompileResult<String> {
        let start = self.pos;
        match self.peek() {
            Some(b) if b.is_ascii_alphabetic() || b == b'_' => self.pos += 1,
            _ => return Err(self.error("expected identifier")),
        }
        while let Some(b) = self.peek() {
            if is_ident_continue(b) || (dashes && b == b'-') {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.src[start..self.pos].to_string())
    }

    /// Consumes host-language text up to a top-level terminator (not
    /// consumed) or the end of input, returning it trimmed.
    ///
    /// Brackets nest, and quoted strings are skipped with their escapes. A
    /// closing bracket with nothing open ends the expression when it is a
    /// terminator and is an error otherwise.
    pub fn opaque(&mut self, terminators: &[u8]) -> CompileResult<String> {
        let start = self.pos;
        let mut open: Vec<u8> = Vec::new();
        while let Some(b) = self.peek() {
            if open.is_empty() && terminators.contains(&b) {
                break;
            }
            match b {
                b'(' => open.push(b')'),
                b'[' => open.push(b']'),
                b'{' => open.push(b'}'),
                b')' | b']' | b'}' => {
                    if open.pop() != Some(b) {
                        return Err(self.error(format!("unbalanced '{}'", b as char)));
                    }
                }
                b'"' | b'\'' | b'`' => {
                    self.skip_string(b)?;
                    continue;
                }
                _ => {}
            }
            self.pos += 1;
        }
        if let Some(close) = open.last() {
            return Err(self.error(format!("expected '{}'", *close as char)));
        }
        Ok(self.src[start..self.pos].trim().to_string())
    }

    fn skip_string(&mut self, quote: u8) -> CompileResult<()> {
        let start = self.pos;
        self.pos += 1;
        while let Some(b) = self.peek() {
            if b == b'\\' {
                self.pos += 2;
                continue;
            }
            self.pos += 1;
            if b == quote {
                return Ok(());
            }
        }
        self.pos = start;
        Err(self.error("unterminated string"))
    }

    /// `"..."` with backslash escapes kept verbatim.
    pub fn quoted(&mut self) -> CompileResult<String> {
        if self.peek() != Some(b'"') {
            return Err(self.error("expected '\"'"));
        }
        let start = self.pos + 1;
        self.skip_string(b'"')?;
        Ok(self.src[start..self.pos - 1].to_string())
    }

    pub fn expect_eof(&mut self) -> CompileResult<()> {
        self.skip_ws();
        if self.is_eof() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected '{}'", self.rest())))
        }
    }
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Whether all of `s` is one identifier.
pub fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => bytes.all(is_ident_continue),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_and_name() {
        let mut c = Cursor::new("font-size rest", "test");
        assert_eq!(c.name().unwrap(), "font-size");
        c.skip_ws();
        assert_eq!(c.identifier().unwrap(), "rest");
        assert!(c.is_eof());

        let err = Cursor::new("9abc", "test").identifier().unwrap_err();
        assert_eq!(err.to_string(), "syntax error in test at offset 0: expected identifier");
    }

    #[test]
    fn test_opaque_stops_at_top_level_terminator() {
        let mut c = Cursor::new(r#"f(a, "x,)")} , next"#, "test");
        let err = c.opaque(b",").unwrap_err();
        assert!(err.to_string().contains("unbalanced '}'"));

        let mut c = Cursor::new(r#"f(a, "x,)"), {k: [1, 2]}, next"#, "test");
        assert_eq!(c.opaque(b",").unwrap(), r#"f(a, "x,)")"#);
        assert!(c.eat(b','));
        assert_eq!(c.opaque(b",").unwrap(), "{k: [1, 2]}");
    }

    #[test]
    fn test_opaque_closing_terminator() {
        let mut c = Cursor::new("a.b(c)) tail", "test");
        assert_eq!(c.opaque(b")").unwrap(), "a.b(c)");
        assert_eq!(c.peek(), Some(b')'));
    }

    #[test]
    fn test_opaque_errors() {
        assert!(Cursor::new("f(a", "test").opaque(b",").is_err());
        let err = Cursor::new("'abc", "test").opaque(b",").unwrap_err();
        assert!(err.to_string().contains("unterminated string"));
        // Escaped quote stays inside the string.
        let mut c = Cursor::new(r#""a\"b", z"#, "test");
        assert_eq!(c.opaque(b",").unwrap(), r#""a\"b""#);
    }

    #[test]
    fn test_keyword_boundary() {
        let mut c = Cursor::new("ranged", "test");
        assert!(!c.eat_keyword("range"));
        let mut c = Cursor::new("range xs", "test");
        assert!(c.eat_keyword("range"));
    }
}
