//! Tokenizer for browser test scripts.
//!
//! Comments and whitespace are trivia: they never become tokens, but every
//! token keeps its byte span so emitters can copy the text between tokens
//! verbatim.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Ident,
    Number,
    Str,
    Template,
    Regex,
    Punct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// 1-based
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==",
    "!=", "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=",
    "|=", "^=", "**", "<<", ">>",
];

/// Keywords after which a `/` starts a regex literal rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    tokens: Vec<Token>,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        pos: 0,
        line: 1,
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

fn is_ident_continue(b: u8) -> bool {
    is_ident_start(b) || b.is_ascii_digit()
}

impl<'a> Lexer<'a> {
    fn peek(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn error<T>(&self, line: usize, message: &str) -> Result<T, LexError> {
        Err(LexError {
            line,
            message: message.to_string(),
        })
    }

    fn push(&mut self, kind: TokenKind, start: usize, line: usize) {
        self.tokens.push(Token {
            kind,
            span: Span {
                start,
                end: self.pos,
                line,
            },
        });
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(b) = self.peek(0) {
            match b {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'/' if self.peek(1) == Some(b'/') => self.skip_line_comment(),
                b'/' if self.peek(1) == Some(b'*') => self.skip_block_comment()?,
                b'/' if self.regex_allowed() => self.lex_regex()?,
                b'\'' | b'"' => {
                    let (start, line) = (self.pos, self.line);
                    self.scan_string(b)?;
                    self.push(TokenKind::Str, start, line);
                }
                b'`' => {
                    let (start, line) = (self.pos, self.line);
                    self.scan_template()?;
                    self.push(TokenKind::Template, start, line);
                }
                b'0'..=b'9' => self.lex_number(),
                b'.' if self.peek(1).is_some_and(|n| n.is_ascii_digit()) => self.lex_number(),
                _ if is_ident_start(b) => {
                    let (start, line) = (self.pos, self.line);
                    while self.peek(0).is_some_and(is_ident_continue) {
                        self.pos += 1;
                    }
                    self.push(TokenKind::Ident, start, line);
                }
                _ => self.lex_punct(),
            }
        }
        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let line = self.line;
        self.pos += 2;
        loop {
            match self.peek(0) {
                None => return self.error(line, "unterminated block comment"),
                Some(b'*') if self.peek(1) == Some(b'/') => {
                    self.pos += 2;
                    return Ok(());
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn regex_allowed(&self) -> bool {
        let Some(prev) = self.tokens.last() else {
            return true;
        };
        let text = &self.source[prev.span.start..prev.span.end];
        match prev.kind {
            TokenKind::Punct => !matches!(text, ")" | "]" | "}" | "++" | "--"),
            TokenKind::Ident => REGEX_PREFIX_KEYWORDS.contains(&text),
            _ => false,
        }
    }

    fn lex_regex(&mut self) -> Result<(), LexError> {
        let (start, line) = (self.pos, self.line);
        self.pos += 1;
        let mut in_class = false;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return self.error(line, "unterminated regular expression"),
                Some(b'\\') => self.pos += 2,
                Some(b'[') => {
                    in_class = true;
                    self.pos += 1;
                }
                Some(b']') => {
                    in_class = false;
                    self.pos += 1;
                }
                Some(b'/') if !in_class => {
                    self.pos += 1;
                    break;
                }
                Some(_) => self.pos += 1,
            }
        }
        while self.peek(0).is_some_and(|b| b.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        self.push(TokenKind::Regex, start, line);
        Ok(())
    }

    fn scan_string(&mut self, quote: u8) -> Result<(), LexError> {
        let line = self.line;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None | Some(b'\n') => return self.error(line, "unterminated string literal"),
                Some(b'\\') => {
                    // line continuation
                    if self.peek(1) == Some(b'\n') {
                        self.line += 1;
                    }
                    self.pos += 2;
                }
                Some(b) if b == quote => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_template(&mut self) -> Result<(), LexError> {
        let line = self.line;
        self.pos += 1;
        loop {
            match self.peek(0) {
                None => return self.error(line, "unterminated template literal"),
                Some(b'\\') => self.pos += 2,
                Some(b'`') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(b'$') if self.peek(1) == Some(b'{') => {
                    self.pos += 2;
                    self.scan_interpolation(line)?;
                }
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn scan_interpolation(&mut self, line: usize) -> Result<(), LexError> {
        let mut depth = 1usize;
        loop {
            match self.peek(0) {
                None => return self.error(line, "unterminated template literal"),
                Some(b'{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Some(b'}') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Some(q @ (b'\'' | b'"')) => self.scan_string(q)?,
                Some(b'`') => self.scan_template()?,
                Some(b'\n') => {
                    self.line += 1;
                    self.pos += 1;
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn lex_number(&mut self) {
        let (start, line) = (self.pos, self.line);
        let hex = self.peek(0) == Some(b'0') && matches!(self.peek(1), Some(b'x' | b'X'));
        while let Some(b) = self.peek(0) {
            let exponent_sign = !hex
                && matches!(b, b'+' | b'-')
                && self.pos > start
                && matches!(self.bytes[self.pos - 1], b'e' | b'E');
            if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, start, line);
    }

    fn lex_punct(&mut self) {
        let (start, line) = (self.pos, self.line);
        let rest = &self.source[self.pos..];
        let width = PUNCTUATORS
            .iter()
            .find(|p| rest.starts_with(**p))
            .map(|p| p.len())
            .unwrap_or_else(|| rest.chars().next().map(char::len_utf8).unwrap_or(1));
        self.pos += width;
        self.push(TokenKind::Punct, start, line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|t| source[t.span.start..t.span.end].to_string())
            .collect()
    }

    #[test]
    fn test_tokenizes_jquery_call() {
        assert_eq!(
            texts("$('#login').val('bob');"),
            vec!["$", "(", "'#login'", ")", ".", "val", "(", "'bob'", ")", ";"]
        );
    }

    #[test]
    fn test_comments_are_trivia() {
        let source = "// setup\nvar a = 1; /* inline */ a++;";
        assert_eq!(texts(source), vec!["var", "a", "=", "1", ";", "a", "++", ";"]);
    }

    #[test]
    fn test_multi_char_punctuators() {
        assert_eq!(
            texts("a === b && c => d ?. e"),
            vec!["a", "===", "b", "&&", "c", "=>", "d", "?.", "e"]
        );
    }

    #[test]
    fn test_regex_versus_division() {
        let tokens = tokenize("var r = /ab+c/gi; var d = a / b;").unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Regex);
        assert!(tokens.iter().filter(|t| t.kind == TokenKind::Regex).count() == 1);
    }

    #[test]
    fn test_template_with_nested_interpolation() {
        let source = "`total: ${items.map(i => `${i}`).join(', ')}` + x";
        let tokens = tokenize(source).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Template);
        assert_eq!(tokens.len(), 3);
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokenize("a\n/* two\nlines */\nb").unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 4);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(texts("1.5e-3 + 0xFF + 1_000"), vec!["1.5e-3", "+", "0xFF", "+", "1_000"]);
    }

    #[test]
    fn test_unterminated_string_reports_line() {
        let err = tokenize("var a = 1;\nvar b = 'oops;\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("string"));
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert!(tokenize("/* never closed").is_err());
    }
}
