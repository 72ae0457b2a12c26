use crate::ast::*;
use crate::error::{DslError, Position};
use crate::tree::Scalar;
use regex::Regex;
use std::sync::LazyLock;

static NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?").expect("number pattern is valid")
});

/// Functions whose call syntax denotes a list literal in the Kotlin DSL.
const LIST_FUNCTIONS: &[&str] = &["listOf", "mutableListOf"];

/// Parser state: tracks position in the input string.
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

/// Where a value expression must end.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    /// Right-hand side of an assignment: newline, `;` or `}`.
    Statement,
    /// Inside `[...]` or `(...)`: `,` or the closer.
    Item,
}

/// Parse build-file source into a list of statements.
pub fn parse(input: &str) -> Result<Vec<Statement>, DslError> {
    let mut parser = Parser { input, pos: 0 };
    parser.parse_statements(None)
}

/// Whether `text` reads back as exactly one value expression.
pub fn is_single_value(text: &str) -> bool {
    matches!(
        parse(&format!("x = {}", text)).as_deref(),
        Ok([Statement::Assign { value, .. }]) if value.source == text.trim()
    )
}

/// Parse the content of an interpolated string without its quotes,
/// e.g. `${propC}rd`.
pub fn parse_template(text: &str) -> Result<Vec<StringPart>, DslError> {
    let mut parser = Parser { input: text, pos: 0 };
    let begin = parser.position();
    match parser.parse_string_body(None, true, begin)? {
        Some(parts) => Ok(parts),
        None => Err(DslError::syntax_error(
            "Interpolation must contain a property reference".to_string(),
            begin,
            parser.position(),
        )),
    }
}

impl<'a> Parser<'a> {
    // ── Helpers ──────────────────────────────────────────────────────

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.remaining().chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
    }

    fn starts_with(&self, s: &str) -> bool {
        self.remaining().starts_with(s)
    }

    fn eat_char(&mut self, ch: char) -> bool {
        if self.peek_char() == Some(ch) {
            self.advance(ch.len_utf8());
            true
        } else {
            false
        }
    }

    fn expect_char(&mut self, ch: char) -> Result<(), DslError> {
        if self.eat_char(ch) {
            Ok(())
        } else {
            Err(self.error_point(format!("Expected '{}'", ch)))
        }
    }

    /// Current position in the source.
    fn position(&self) -> Position {
        let consumed = &self.input[..self.pos];
        let line = consumed.matches('\n').count();
        let last_newline = consumed.rfind('\n').map(|i| i + 1).unwrap_or(0);
        let column = consumed[last_newline..].chars().count();
        Position {
            line,
            column,
            offset: self.pos,
        }
    }

    /// Create an error at a single point (current position).
    fn error_point(&self, message: String) -> DslError {
        let pos = self.position();
        DslError::syntax_error(message, pos, pos)
    }

    /// Create an error spanning from `begin` to the current position.
    fn error_span(&self, message: String, begin: Position) -> DslError {
        DslError::syntax_error(message, begin, self.position())
    }

    // ── Whitespace & Comments ───────────────────────────────────────

    /// Skip whitespace (including newlines) and comments.
    fn skip_ws(&mut self) {
        loop {
            while let Some(ch) = self.peek_char() {
                if ch.is_whitespace() {
                    self.advance(ch.len_utf8());
                } else {
                    break;
                }
            }
            if self.starts_with("//") || (self.pos == 0 && self.starts_with("#!")) {
                self.skip_line_comment();
            } else if self.starts_with("/*") {
                self.skip_block_comment();
            } else {
                break;
            }
        }
    }

    /// Skip spaces, tabs and block comments, stopping at a newline.
    fn skip_inline_ws(&mut self) {
        loop {
            while let Some(ch) = self.peek_char() {
                if ch == ' ' || ch == '\t' {
                    self.advance(1);
                } else {
                    break;
                }
            }
            if self.starts_with("/*") {
                self.skip_block_comment();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == '\r' || ch == '\n' {
                break;
            }
            self.advance(ch.len_utf8());
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(2);
        match self.remaining().find("*/") {
            Some(end) => self.advance(end + 2),
            None => self.pos = self.input.len(),
        }
    }

    /// Like `skip_ws`, but also eats `;`. Used between statements.
    fn skip_ws_and_separators(&mut self) {
        self.skip_ws();
        while self.peek_char() == Some(';') {
            self.advance(1);
            self.skip_ws();
        }
    }

    fn at_statement_end(&mut self) -> bool {
        self.skip_inline_ws();
        self.starts_with("//")
            || matches!(self.peek_char(), None | Some('\n' | '\r' | ';' | '}'))
    }

    fn at_item_end(&mut self) -> bool {
        self.skip_ws();
        matches!(self.peek_char(), Some(',' | ']' | ')'))
    }

    // ── Statements ──────────────────────────────────────────────────

    /// Parse statements until EOF, or until the `}` closing a block
    /// opened at `open`.
    fn parse_statements(&mut self, open: Option<Position>) -> Result<Vec<Statement>, DslError> {
        let mut statements = Vec::new();
        loop {
            self.skip_ws_and_separators();
            match self.peek_char() {
                None => {
                    return match open {
                        Some(begin) => Err(self.error_span("Unclosed '{'".to_string(), begin)),
                        None => Ok(statements),
                    };
                }
                Some('}') => {
                    if open.is_none() {
                        return Err(self.error_point("Unexpected '}'".to_string()));
                    }
                    self.advance(1);
                    return Ok(statements);
                }
                Some(_) => statements.push(self.parse_statement()?),
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Statement, DslError> {
        let start = self.pos;
        if let Some(stmt) = self.parse_property_statement()? {
            return Ok(stmt);
        }
        self.pos = start;
        let raw = self.capture_raw(Context::Statement)?;
        if raw.is_empty() {
            return Err(self.error_point("Expected a statement".to_string()));
        }
        Ok(Statement::Verbatim(raw))
    }

    /// `path = value`, `path(args)` or `path { ... }`. Returns `None` for
    /// anything else so the caller can keep it verbatim.
    fn parse_property_statement(&mut self) -> Result<Option<Statement>, DslError> {
        let path = match self.parse_dotted_name() {
            Some(path) => path,
            None => return Ok(None),
        };
        self.skip_inline_ws();

        match self.peek_char() {
            Some('=') if self.peek_second() != Some('=') => {
                self.advance(1);
                self.skip_inline_ws();
                let value = self.parse_value(Context::Statement)?;
                Ok(Some(Statement::Assign {
                    path,
                    value,
                    style: AssignStyle::Assign,
                }))
            }
            Some('(') => {
                let start = self.pos;
                let mut items = match self.parse_items('(', ')')? {
                    Some(items) => items,
                    None => return Ok(None),
                };
                let source = self.input[start + 1..self.pos - 1].trim().to_string();
                if !self.at_statement_end() {
                    return Ok(None);
                }
                let value = if items.len() == 1 {
                    items.remove(0)
                } else {
                    SourceExpr {
                        expr: Expr::List {
                            items,
                            style: ListStyle::Args,
                        },
                        source,
                    }
                };
                Ok(Some(Statement::Assign {
                    path,
                    value,
                    style: AssignStyle::Call,
                }))
            }
            Some('{') => {
                let begin = self.position();
                self.advance(1);
                let statements = self.parse_statements(Some(begin))?;
                Ok(Some(Statement::Block { path, statements }))
            }
            _ => Ok(None),
        }
    }

    fn parse_dotted_name(&mut self) -> Option<Vec<String>> {
        let mut path = vec![self.parse_identifier()?];
        while self.peek_char() == Some('.') && self.peek_second().map_or(false, is_ident_start) {
            self.advance(1);
            path.push(self.parse_identifier()?);
        }
        Some(path)
    }

    fn parse_identifier(&mut self) -> Option<String> {
        if !self.peek_char().map_or(false, is_ident_start) {
            return None;
        }
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if is_ident_char(ch) {
                self.advance(ch.len_utf8());
            } else {
                break;
            }
        }
        Some(self.input[start..self.pos].to_string())
    }

    // ── Values ──────────────────────────────────────────────────────

    /// Parse a value, keeping it verbatim as `Expr::Unknown` when it is not
    /// a supported expression or does not end where the context requires.
    fn parse_value(&mut self, context: Context) -> Result<SourceExpr, DslError> {
        let start = self.pos;
        if let Some(expr) = self.parse_expr()? {
            let end = self.pos;
            let ended = match context {
                Context::Statement => self.at_statement_end(),
                Context::Item => self.at_item_end(),
            };
            if ended {
                return Ok(SourceExpr {
                    expr,
                    source: self.input[start..end].to_string(),
                });
            }
        }
        self.pos = start;
        let raw = self.capture_raw(context)?;
        if raw.is_empty() {
            return Err(self.error_point("Expected a value".to_string()));
        }
        Ok(SourceExpr {
            expr: Expr::Unknown(raw.clone()),
            source: raw,
        })
    }

    fn parse_expr(&mut self) -> Result<Option<Expr>, DslError> {
        match self.peek_char() {
            Some('[') => Ok(self.parse_items('[', ']')?.map(|items| Expr::List {
                items,
                style: ListStyle::Brackets,
            })),
            Some('"') => {
                let begin = self.position();
                if self.starts_with("\"\"\"") {
                    self.advance(3);
                    self.parse_string_body(Some("\"\"\""), true, begin)
                        .map(|parts| parts.map(string_expr))
                } else {
                    self.advance(1);
                    self.parse_string_body(Some("\""), false, begin)
                        .map(|parts| parts.map(string_expr))
                }
            }
            Some('\'') => {
                let s = if self.starts_with("'''") {
                    self.parse_single_quoted("'''", true)?
                } else {
                    self.parse_single_quoted("'", false)?
                };
                Ok(Some(Expr::Literal(Scalar::String(s))))
            }
            Some(ch) if ch == '-' || ch.is_ascii_digit() => Ok(self.parse_number()),
            Some(ch) if is_ident_start(ch) => self.parse_word(),
            _ => Ok(None),
        }
    }

    fn parse_number(&mut self) -> Option<Expr> {
        let matched = NUMBER.find(self.remaining())?.as_str();
        let expr = if matched.contains(['.', 'e', 'E']) {
            Expr::Literal(Scalar::Decimal(matched.parse().ok()?))
        } else {
            Expr::Literal(Scalar::Integer(matched.parse().ok()?))
        };
        self.advance(matched.len());
        Some(expr)
    }

    /// `true`, `false`, `listOf(...)` or a reference path.
    fn parse_word(&mut self) -> Result<Option<Expr>, DslError> {
        let start = self.pos;
        let word = match self.parse_identifier() {
            Some(word) => word,
            None => return Ok(None),
        };
        match word.as_str() {
            "true" => return Ok(Some(Expr::Literal(Scalar::Boolean(true)))),
            "false" => return Ok(Some(Expr::Literal(Scalar::Boolean(false)))),
            w if LIST_FUNCTIONS.contains(&w) && self.peek_char() == Some('(') => {
                return Ok(self.parse_items('(', ')')?.map(|items| Expr::List {
                    items,
                    style: ListStyle::ListOf,
                }));
            }
            _ => {}
        }
        self.pos = start;
        Ok(self.parse_reference().map(Expr::Reference))
    }

    fn parse_reference(&mut self) -> Option<ReferencePath> {
        let mut path = vec![RefPathSegment::Name(self.parse_identifier()?)];
        loop {
            if self.peek_char() == Some('.') && self.peek_second().map_or(false, is_ident_start) {
                self.advance(1);
                path.push(RefPathSegment::Name(self.parse_identifier()?));
            } else if self.peek_char() == Some('[') {
                let saved = self.pos;
                self.advance(1);
                match self.parse_index() {
                    Some(idx) => path.push(RefPathSegment::Index(idx)),
                    None => {
                        self.pos = saved;
                        break;
                    }
                }
            } else {
                break;
            }
        }
        Some(ReferencePath(path))
    }

    /// The `digits]` part of an index, with surrounding blanks.
    fn parse_index(&mut self) -> Option<usize> {
        self.skip_inline_ws();
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_ascii_digit() {
                self.advance(1);
            } else {
                break;
            }
        }
        let idx = self.input[start..self.pos].parse().ok()?;
        self.skip_inline_ws();
        if self.eat_char(']') {
            Some(idx)
        } else {
            None
        }
    }

    // ── Lists ───────────────────────────────────────────────────────

    /// Parse `open item, item, ... close`. Returns `None` when the items
    /// are followed by something other than `,` or `close`.
    fn parse_items(
        &mut self,
        open: char,
        close: char,
    ) -> Result<Option<Vec<SourceExpr>>, DslError> {
        let begin = self.position();
        self.expect_char(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat_char(close) {
                return Ok(Some(items));
            }
            if self.peek_char().is_none() {
                return Err(self.error_span(format!("Unclosed '{}'", open), begin));
            }
            items.push(self.parse_value(Context::Item)?);
            self.skip_ws();
            if self.eat_char(',') {
                continue;
            }
            if self.eat_char(close) {
                return Ok(Some(items));
            }
            if self.peek_char().is_none() {
                return Err(self.error_span(format!("Unclosed '{}'", open), begin));
            }
            return Ok(None);
        }
    }

    // ── Strings ─────────────────────────────────────────────────────

    /// Parse the body of a double-quoted string after its opening quote,
    /// splitting out `$name` and `${path}` references. `close` is `None`
    /// when the body runs to the end of input.
    ///
    /// Returns `None` when a `${...}` holds something other than a
    /// reference path.
    fn parse_string_body(
        &mut self,
        close: Option<&str>,
        multiline: bool,
        begin: Position,
    ) -> Result<Option<Vec<StringPart>>, DslError> {
        let mut parts = Vec::new();
        let mut text = String::new();
        loop {
            if let Some(close) = close {
                if self.starts_with(close) {
                    self.advance(close.len());
                    break;
                }
            }
            match self.peek_char() {
                None if close.is_none() => break,
                None => return Err(self.error_span("Unterminated string".to_string(), begin)),
                Some('\r' | '\n') if !multiline => {
                    return Err(self.error_span("Unterminated string".to_string(), begin));
                }
                Some('\\') => {
                    self.advance(1);
                    let esc = self.parse_escape_char()?;
                    text.push_str(&esc);
                }
                Some('$') if self.peek_second() == Some('{') => {
                    self.advance(2);
                    let end = match self.remaining().find('}') {
                        Some(end) => end,
                        None => {
                            return Err(
                                self.error_span("Unterminated '${' in string".to_string(), begin)
                            )
                        }
                    };
                    let path = match ReferencePath::parse(self.remaining()[..end].trim()) {
                        Some(path) => path,
                        None => return Ok(None),
                    };
                    self.advance(end + 1);
                    flush_text(&mut parts, &mut text);
                    parts.push(StringPart::Reference(path));
                }
                Some('$') if self.peek_second().map_or(false, is_ident_start) => {
                    self.advance(1);
                    let mut path = Vec::new();
                    while let Some(name) = self.parse_identifier() {
                        path.push(RefPathSegment::Name(name));
                        if self.peek_char() == Some('.')
                            && self.peek_second().map_or(false, is_ident_start)
                        {
                            self.advance(1);
                        } else {
                            break;
                        }
                    }
                    flush_text(&mut parts, &mut text);
                    parts.push(StringPart::Reference(ReferencePath(path)));
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    text.push(ch);
                }
            }
        }
        flush_text(&mut parts, &mut text);
        Ok(Some(parts))
    }

    /// Parse a `'...'` or `'''...'''` string. No interpolation.
    fn parse_single_quoted(&mut self, quote: &str, multiline: bool) -> Result<String, DslError> {
        let begin = self.position();
        self.advance(quote.len());
        let mut result = String::new();
        loop {
            if self.starts_with(quote) {
                self.advance(quote.len());
                return Ok(result);
            }
            match self.peek_char() {
                None => return Err(self.error_span("Unterminated string".to_string(), begin)),
                Some('\r' | '\n') if !multiline => {
                    return Err(self.error_span("Unterminated string".to_string(), begin));
                }
                Some('\\') => {
                    self.advance(1);
                    let esc = self.parse_escape_char()?;
                    result.push_str(&esc);
                }
                Some(ch) => {
                    self.advance(ch.len_utf8());
                    result.push(ch);
                }
            }
        }
    }

    fn parse_escape_char(&mut self) -> Result<String, DslError> {
        match self.peek_char() {
            None => Err(self.error_point("Unterminated escape sequence".to_string())),
            Some('b') => {
                self.advance(1);
                Ok("\u{0008}".to_string())
            }
            Some('f') => {
                self.advance(1);
                Ok("\u{000C}".to_string())
            }
            Some('n') => {
                self.advance(1);
                Ok("\n".to_string())
            }
            Some('r') => {
                self.advance(1);
                Ok("\r".to_string())
            }
            Some('t') => {
                self.advance(1);
                Ok("\t".to_string())
            }
            Some('u') => {
                let begin = self.position();
                self.advance(1);
                let start = self.pos;
                for _ in 0..4 {
                    match self.peek_char() {
                        Some(ch) if ch.is_ascii_hexdigit() => self.advance(1),
                        _ => {
                            return Err(self
                                .error_span("Expected 4 hex digits in \\uXXXX".to_string(), begin))
                        }
                    }
                }
                let hex = &self.input[start..self.pos];
                let code_point = u32::from_str_radix(hex, 16).map_err(|_| {
                    self.error_span(format!("Invalid hex in \\u escape: {}", hex), begin)
                })?;
                match char::from_u32(code_point) {
                    Some(ch) => Ok(ch.to_string()),
                    None => {
                        Err(self
                            .error_span(format!("Invalid unicode code point: \\u{}", hex), begin))
                    }
                }
            }
            Some(ch) => {
                // Passthrough: \x -> x
                self.advance(ch.len_utf8());
                Ok(ch.to_string())
            }
        }
    }

    // ── Verbatim text ───────────────────────────────────────────────

    /// Consume source text up to the end of the current statement or list
    /// item, balancing brackets and skipping over strings.
    fn capture_raw(&mut self, context: Context) -> Result<String, DslError> {
        let begin = self.position();
        let start = self.pos;
        let mut depth = 0usize;
        while let Some(ch) = self.peek_char() {
            match ch {
                '"' | '\'' => {
                    self.skip_quoted()?;
                    continue;
                }
                '/' if self.starts_with("//") => {
                    if depth == 0 {
                        break;
                    }
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.starts_with("/*") => {
                    self.skip_block_comment();
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth > 0 => depth -= 1,
                '}' => break,
                ')' | ']' if context == Context::Item => break,
                ',' if depth == 0 && context == Context::Item => break,
                '\n' | '\r' | ';' if depth == 0 && context == Context::Statement => break,
                _ => {}
            }
            self.advance(ch.len_utf8());
        }
        if depth > 0 {
            return Err(self.error_span("Unclosed bracket".to_string(), begin));
        }
        Ok(self.input[start..self.pos].trim_end().to_string())
    }

    /// Skip a quoted string of any kind without interpreting it.
    fn skip_quoted(&mut self) -> Result<(), DslError> {
        let begin = self.position();
        let quote = if self.starts_with("\"\"\"") {
            "\"\"\""
        } else if self.starts_with("'''") {
            "'''"
        } else if self.starts_with("\"") {
            "\""
        } else {
            "'"
        };
        let multiline = quote.len() == 3;
        self.advance(quote.len());
        loop {
            if self.starts_with(quote) {
                self.advance(quote.len());
                return Ok(());
            }
            match self.peek_char() {
                None => return Err(self.error_span("Unterminated string".to_string(), begin)),
                Some('\r' | '\n') if !multiline => {
                    return Err(self.error_span("Unterminated string".to_string(), begin));
                }
                Some('\\') => {
                    self.advance(1);
                    if let Some(ch) = self.peek_char() {
                        self.advance(ch.len_utf8());
                    }
                }
                Some(ch) => self.advance(ch.len_utf8()),
            }
        }
    }
}

fn flush_text(parts: &mut Vec<StringPart>, text: &mut String) {
    if !text.is_empty() {
        parts.push(StringPart::Text(std::mem::take(text)));
    }
}

/// A string without references is a plain literal.
fn string_expr(parts: Vec<StringPart>) -> Expr {
    if parts.iter().any(|p| matches!(p, StringPart::Reference(_))) {
        return Expr::Interpolated(parts);
    }
    let mut s = String::new();
    for part in parts {
        if let StringPart::Text(text) = part {
            s.push_str(&text);
        }
    }
    Expr::Literal(Scalar::String(s))
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}
