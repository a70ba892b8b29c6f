//! Token-level syntax helpers: bracket matching, call chains, statements and
//! function shapes. This is deliberately shallow; it knows just enough of the
//! grammar to locate the idioms the migrator rewrites.

use crate::analysis::lexer::{tokenize, Token, TokenKind};
use crate::utils::error::{MigrateError, Result};
use std::ops::Range;

/// A lexed script. All passes share this representation.
#[derive(Debug, Clone)]
pub struct Script {
    name: String,
    source: String,
    tokens: Vec<Token>,
    pairs: Vec<Option<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Member { name: usize },
    Call { open: usize, close: usize, args: Vec<Range<usize>> },
    Index { open: usize, close: usize },
}

/// `root(.member | (args) | [index])*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain {
    pub root: usize,
    pub segments: Vec<Segment>,
    /// exclusive token index
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FnBody {
    /// token indices of `{` and `}`
    Block { open: usize, close: usize },
    Expr(Range<usize>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub start: usize,
    pub is_async: bool,
    pub is_arrow: bool,
    /// first token after an `async` keyword
    pub head: usize,
    pub params: Range<usize>,
    pub body: FnBody,
    pub end: usize,
}

impl Function {
    pub fn body_range(&self) -> Range<usize> {
        match &self.body {
            FnBody::Block { open, close } => open + 1..*close,
            FnBody::Expr(range) => range.clone(),
        }
    }
}

const STATEMENT_CONTINUATIONS: &[&str] = &[
    "else", "catch", "finally", "instanceof", "in", "of",
];

impl Script {
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let tokens = tokenize(source).map_err(|e| MigrateError::LexError {
            file: name.to_string(),
            line: e.line,
            message: e.message,
        })?;

        let mut pairs = vec![None; tokens.len()];
        let mut stack: Vec<usize> = Vec::new();
        for (idx, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Punct {
                continue;
            }
            match &source[token.span.start..token.span.end] {
                "(" | "[" | "{" => stack.push(idx),
                close @ (")" | "]" | "}") => {
                    let expected = match close {
                        ")" => "(",
                        "]" => "[",
                        _ => "{",
                    };
                    let open = stack.pop().filter(|open| {
                        let t = tokens[*open].span;
                        &source[t.start..t.end] == expected
                    });
                    let Some(open) = open else {
                        return Err(MigrateError::LexError {
                            file: name.to_string(),
                            line: token.span.line,
                            message: format!("unbalanced '{}'", close),
                        });
                    };
                    pairs[open] = Some(idx);
                    pairs[idx] = Some(open);
                }
                _ => {}
            }
        }
        if let Some(open) = stack.pop() {
            return Err(MigrateError::LexError {
                file: name.to_string(),
                line: tokens[open].span.line,
                message: "unclosed bracket".to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            tokens,
            pairs,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn token(&self, idx: usize) -> Option<&Token> {
        self.tokens.get(idx)
    }

    pub fn kind(&self, idx: usize) -> Option<TokenKind> {
        self.tokens.get(idx).map(|t| t.kind)
    }

    pub fn text(&self, idx: usize) -> &str {
        self.tokens
            .get(idx)
            .map(|t| &self.source[t.span.start..t.span.end])
            .unwrap_or("")
    }

    pub fn is(&self, idx: usize, text: &str) -> bool {
        self.tokens.get(idx).is_some() && self.text(idx) == text
    }

    pub fn is_ident(&self, idx: usize) -> bool {
        self.kind(idx) == Some(TokenKind::Ident)
    }

    pub fn line(&self, idx: usize) -> usize {
        self.tokens
            .get(idx)
            .or(self.tokens.last())
            .map(|t| t.span.line)
            .unwrap_or(1)
    }

    pub fn matching(&self, idx: usize) -> Option<usize> {
        self.pairs.get(idx).copied().flatten()
    }

    /// Source text covering tokens `lo..hi`, trivia between them included.
    pub fn range_text(&self, range: Range<usize>) -> &str {
        if range.start >= range.end || range.end > self.tokens.len() {
            return "";
        }
        &self.source[self.tokens[range.start].span.start..self.tokens[range.end - 1].span.end]
    }

    /// Trivia between token `idx - 1` and token `idx`.
    pub fn gap_before(&self, idx: usize) -> &str {
        let end = self
            .tokens
            .get(idx)
            .map(|t| t.span.start)
            .unwrap_or(self.source.len());
        let start = if idx == 0 {
            0
        } else {
            self.tokens
                .get(idx - 1)
                .map(|t| t.span.end)
                .unwrap_or(self.source.len())
        };
        &self.source[start.min(end)..end]
    }

    /// Whitespace that precedes the line of token `idx`.
    pub fn line_indent(&self, idx: usize) -> &str {
        let Some(token) = self.tokens.get(idx) else {
            return "";
        };
        let line_start = self.source[..token.span.start]
            .rfind('\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let prefix = &self.source[line_start..token.span.start];
        let width = prefix
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(prefix.len());
        &prefix[..width]
    }

    /// Whether the member or call at `idx` hangs off a previous expression.
    pub fn is_member_position(&self, idx: usize) -> bool {
        idx > 0 && (self.is(idx - 1, ".") || self.is(idx - 1, "?."))
    }

    /// Object literal key such as `{ name: value }`.
    pub fn is_object_key(&self, idx: usize) -> bool {
        idx > 0
            && self.is(idx + 1, ":")
            && (self.is(idx - 1, "{") || self.is(idx - 1, ","))
    }

    pub fn parse_chain(&self, idx: usize) -> Option<Chain> {
        if !self.is_ident(idx) || self.is_member_position(idx) {
            return None;
        }
        let mut segments = Vec::new();
        let mut pos = idx + 1;
        loop {
            if (self.is(pos, ".") || self.is(pos, "?.")) && self.is_ident(pos + 1) {
                segments.push(Segment::Member { name: pos + 1 });
                pos += 2;
            } else if self.is(pos, "(") {
                let close = self.matching(pos)?;
                segments.push(Segment::Call {
                    open: pos,
                    close,
                    args: self.split_args(pos, close),
                });
                pos = close + 1;
            } else if self.is(pos, "[") && !self.newline_before(pos) {
                let close = self.matching(pos)?;
                segments.push(Segment::Index { open: pos, close });
                pos = close + 1;
            } else {
                break;
            }
        }
        Some(Chain {
            root: idx,
            segments,
            end: pos,
        })
    }

    /// Arguments between `open` and `close`, split on top-level commas.
    pub fn split_args(&self, open: usize, close: usize) -> Vec<Range<usize>> {
        let mut args = Vec::new();
        let mut start = open + 1;
        let mut pos = open + 1;
        while pos < close {
            if self.is(pos, ",") {
                if pos > start {
                    args.push(start..pos);
                }
                start = pos + 1;
                pos += 1;
            } else if let Some(m) = self.opening_match(pos) {
                pos = m + 1;
            } else {
                pos += 1;
            }
        }
        if close > start {
            args.push(start..close);
        }
        args
    }

    fn opening_match(&self, idx: usize) -> Option<usize> {
        if matches!(self.text(idx), "(" | "[" | "{") {
            self.matching(idx)
        } else {
            None
        }
    }

    fn newline_before(&self, idx: usize) -> bool {
        self.gap_before(idx).contains('\n')
    }

    fn can_end_statement(&self, idx: usize) -> bool {
        match self.kind(idx) {
            Some(TokenKind::Punct) => {
                matches!(self.text(idx), ")" | "]" | "}" | "++" | "--")
            }
            Some(TokenKind::Ident) => !matches!(
                self.text(idx),
                "var" | "let" | "const" | "new" | "typeof" | "await" | "in" | "instanceof"
            ),
            Some(_) => true,
            None => false,
        }
    }

    fn can_start_statement(&self, idx: usize) -> bool {
        match self.kind(idx) {
            Some(TokenKind::Ident) => !STATEMENT_CONTINUATIONS.contains(&self.text(idx)),
            Some(TokenKind::Punct) => matches!(self.text(idx), "!" | "++" | "--" | "`"),
            Some(_) => true,
            None => false,
        }
    }

    /// Automatic semicolon insertion between `idx - 1` and `idx`.
    pub fn asi_break_before(&self, idx: usize) -> bool {
        idx > 0
            && self.newline_before(idx)
            && self.can_end_statement(idx - 1)
            && self.can_start_statement(idx)
    }

    /// Whether token `idx` begins a statement.
    pub fn starts_statement(&self, idx: usize) -> bool {
        if idx == 0 {
            return true;
        }
        matches!(self.text(idx - 1), ";" | "{" | "}" | "else") || self.asi_break_before(idx)
    }

    /// Whether a statement that ends right before `idx` is complete there.
    pub fn ends_statement(&self, idx: usize) -> bool {
        idx >= self.len() || matches!(self.text(idx), ";" | "}") || self.asi_break_before(idx)
    }

    /// Top-level statements of `range`. Each returned range includes a
    /// trailing `;` when present.
    pub fn statements(&self, range: Range<usize>) -> Vec<Range<usize>> {
        let mut statements = Vec::new();
        let mut start = range.start;
        let mut pos = range.start;
        while pos < range.end {
            if pos > start && self.asi_break_before(pos) {
                statements.push(start..pos);
                start = pos;
            }
            if self.is(pos, ";") {
                if pos > start {
                    statements.push(start..pos + 1);
                }
                start = pos + 1;
                pos += 1;
            } else if let Some(m) = self.opening_match(pos) {
                pos = (m + 1).min(range.end);
            } else {
                pos += 1;
            }
        }
        if range.end > start {
            statements.push(start..range.end);
        }
        statements
    }

    /// End (exclusive) of the expression starting at `start`, bounded by
    /// `limit`. Stops at a top-level `,`, `;`, closing bracket or ASI break.
    pub fn expression_end(&self, start: usize, limit: usize) -> usize {
        let mut pos = start;
        while pos < limit {
            if pos > start && self.asi_break_before(pos) {
                break;
            }
            match self.text(pos) {
                "," | ";" | ")" | "]" | "}" => break,
                _ => {}
            }
            if let Some(m) = self.opening_match(pos) {
                pos = m + 1;
            } else {
                pos += 1;
            }
        }
        pos.min(limit)
    }

    /// Function expression or declaration starting at `idx`.
    pub fn function_at(&self, idx: usize) -> Option<Function> {
        let is_async = self.is(idx, "async") && !self.is_member_position(idx);
        let head = if is_async { idx + 1 } else { idx };
        if self.is_member_position(head) {
            return None;
        }

        if self.is(head, "function") {
            let mut pos = head + 1;
            if self.is(pos, "*") {
                pos += 1;
            }
            if self.is_ident(pos) {
                pos += 1;
            }
            if !self.is(pos, "(") {
                return None;
            }
            let params_close = self.matching(pos)?;
            let open = params_close + 1;
            if !self.is(open, "{") {
                return None;
            }
            let close = self.matching(open)?;
            return Some(Function {
                start: idx,
                is_async,
                is_arrow: false,
                head,
                params: pos + 1..params_close,
                body: FnBody::Block { open, close },
                end: close + 1,
            });
        }

        let (params, arrow) = if self.is(head, "(") {
            let close = self.matching(head)?;
            (head + 1..close, close + 1)
        } else if self.is_ident(head) && self.is(head + 1, "=>") {
            (head..head + 1, head + 1)
        } else {
            return None;
        };
        if !self.is(arrow, "=>") {
            return None;
        }
        let body_start = arrow + 1;
        if self.is(body_start, "{") {
            let close = self.matching(body_start)?;
            Some(Function {
                start: idx,
                is_async,
                is_arrow: true,
                head,
                params,
                body: FnBody::Block {
                    open: body_start,
                    close,
                },
                end: close + 1,
            })
        } else {
            let end = self.expression_end(body_start, self.len());
            Some(Function {
                start: idx,
                is_async,
                is_arrow: true,
                head,
                params,
                body: FnBody::Expr(body_start..end),
                end,
            })
        }
    }

    /// Identifier names of a simple parameter list (`a, b = 1, { c }`).
    pub fn param_names(&self, params: Range<usize>) -> Vec<usize> {
        let mut names = Vec::new();
        for arg in self.split_args_range(params) {
            let first = arg.start;
            if self.is(first, "{") || self.is(first, "[") {
                let close = self.matching(first).unwrap_or(arg.end);
                for inner in self.split_args(first, close) {
                    if self.is_ident(inner.start) && !self.is(inner.start + 1, ":") {
                        names.push(inner.start);
                    } else if self.is(inner.start + 1, ":") && self.is_ident(inner.start + 2) {
                        names.push(inner.start + 2);
                    }
                }
            } else if self.is(first, "...") && self.is_ident(first + 1) {
                names.push(first + 1);
            } else if self.is_ident(first) {
                names.push(first);
            }
        }
        names
    }

    fn split_args_range(&self, range: Range<usize>) -> Vec<Range<usize>> {
        if range.start >= range.end {
            return Vec::new();
        }
        let mut args = Vec::new();
        let mut start = range.start;
        let mut pos = range.start;
        while pos < range.end {
            if self.is(pos, ",") {
                if pos > start {
                    args.push(start..pos);
                }
                start = pos + 1;
                pos += 1;
            } else if let Some(m) = self.opening_match(pos) {
                pos = m + 1;
            } else {
                pos += 1;
            }
        }
        if range.end > start {
            args.push(start..range.end);
        }
        args
    }

    /// Single string literal argument, unquoted.
    pub fn string_value(&self, range: &Range<usize>) -> Option<String> {
        if range.end != range.start + 1 || self.kind(range.start) != Some(TokenKind::Str) {
            return None;
        }
        Some(unquote(self.text(range.start)))
    }
}

/// Strips the quotes of a string literal and resolves simple escapes.
pub fn unquote(literal: &str) -> String {
    let inner = if literal.len() >= 2 {
        &literal[1..literal.len() - 1]
    } else {
        literal
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Quotes a value as a single-quoted script literal.
pub fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(source: &str) -> Script {
        Script::parse("test.js", source).unwrap()
    }

    #[test]
    fn test_bracket_matching() {
        let s = script("foo(a, [b], { c: d });");
        assert_eq!(s.matching(1), Some(s.len() - 2));
        assert_eq!(s.matching(s.len() - 2), Some(1));
    }

    #[test]
    fn test_unbalanced_brackets_fail() {
        assert!(Script::parse("bad.js", "foo(a;").is_err());
        assert!(Script::parse("bad.js", "foo(a]);").is_err());
    }

    #[test]
    fn test_parse_chain_segments() {
        let s = script("document.getElementById('user').value = 'bob';");
        let chain = s.parse_chain(0).unwrap();
        assert_eq!(chain.segments.len(), 3);
        assert!(matches!(chain.segments[1], Segment::Call { .. }));
        assert!(s.is(chain.end, "="));
    }

    #[test]
    fn test_chain_rejects_member_root() {
        let s = script("a.b.c");
        assert!(s.parse_chain(2).is_none());
    }

    #[test]
    fn test_split_args_respects_nesting() {
        let s = script("f(a, g(b, c), [d, e])");
        let args = s.split_args(1, s.len() - 1);
        assert_eq!(args.len(), 3);
        assert_eq!(s.range_text(args[1].clone()), "g(b, c)");
    }

    #[test]
    fn test_statements_with_and_without_semicolons() {
        let s = script("a();\nb()\nif (x) {\n  c();\n} else {\n  d();\n}\ne()");
        let statements = s.statements(0..s.len());
        let texts: Vec<&str> = statements.iter().map(|r| s.range_text(r.clone())).collect();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[0], "a();");
        assert_eq!(texts[1], "b()");
        assert!(texts[2].starts_with("if (x)"));
        assert!(texts[2].ends_with('}'));
        assert_eq!(texts[3], "e()");
    }

    #[test]
    fn test_chained_call_across_lines_is_one_statement() {
        let s = script("$('#a')\n  .click();\nb();");
        assert_eq!(s.statements(0..s.len()).len(), 2);
    }

    #[test]
    fn test_function_shapes() {
        let s = script("function named(a, b) { return a; }");
        let f = s.function_at(0).unwrap();
        assert!(!f.is_arrow);
        assert_eq!(s.param_names(f.params.clone()).len(), 2);
        assert_eq!(f.end, s.len());

        let s = script("async (x) => x + 1");
        let f = s.function_at(0).unwrap();
        assert!(f.is_async && f.is_arrow);
        assert_eq!(s.range_text(f.body_range()), "x + 1");

        let s = script("done => { done(); }");
        let f = s.function_at(0).unwrap();
        assert!(matches!(f.body, FnBody::Block { .. }));
    }

    #[test]
    fn test_parenthesised_expression_is_not_function() {
        let s = script("(a + b) * c");
        assert!(s.function_at(0).is_none());
    }

    #[test]
    fn test_unquote_and_quote() {
        assert_eq!(unquote(r#""it's""#), "it's");
        assert_eq!(unquote(r"'a\'b'"), "a'b");
        assert_eq!(quote("a'b"), r"'a\'b'");
    }
}
