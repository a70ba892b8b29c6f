use crate::analysis::idioms::{ActionArg, ActionKind, Idiom, IdiomKind, LocatorOrigin, NavAction, PageRead};
use crate::analysis::lexer::TokenKind;
use crate::analysis::syntax::{unquote, Script};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Var,
    Let,
    Const,
    Function,
    Param,
    CatchParam,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierQuality {
    Good,
    TooShort,
    Generic,
    Numbered,
}

impl IdentifierQuality {
    pub fn is_poor(&self) -> bool {
        !matches!(self, Self::Good)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::TooShort => "too_short",
            Self::Generic => "generic",
            Self::Numbered => "numbered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityRules {
    pub min_length: usize,
    pub allowed_short: Vec<String>,
    pub generic_names: Vec<String>,
}

impl Default for QualityRules {
    fn default() -> Self {
        Self {
            min_length: 3,
            allowed_short: ["i", "j", "k", "e", "_", "$"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            generic_names: [
                "temp", "tmp", "data", "val", "obj", "el", "elem", "x", "foo", "bar", "baz",
                "thing", "stuff", "res", "ret", "str",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    pub token: usize,
    pub kind: DeclKind,
    pub line: usize,
    pub init: Option<Range<usize>>,
}

/// What a declaration was initialised from. Indices point into the
/// analysis idiom list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Initializer {
    #[default]
    Missing,
    Locator(usize),
    ElementRead(usize),
    PageRead(PageRead),
    Literal { kind: TokenKind, value: String },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Use {
    /// target API method applied to an element binding
    Action(&'static str),
    FillValue(usize),
    Delay,
    Expected(Range<usize>),
    NavigateTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UsageContext {
    pub initializer: Initializer,
    pub uses: Vec<Use>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Identifier {
    pub name: String,
    pub line: usize,
    pub kind: DeclKind,
    pub quality: IdentifierQuality,
    #[serde(skip)]
    pub token: usize,
    #[serde(skip)]
    pub usage: UsageContext,
}

fn numbered_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]+[0-9]+$").expect("valid numbered-name regex"))
}

pub fn classify(name: &str, rules: &QualityRules) -> IdentifierQuality {
    if rules.allowed_short.iter().any(|allowed| allowed == name) {
        return IdentifierQuality::Good;
    }
    if rules
        .generic_names
        .iter()
        .any(|generic| generic.eq_ignore_ascii_case(name))
    {
        return IdentifierQuality::Generic;
    }
    if name.chars().count() < rules.min_length {
        return IdentifierQuality::TooShort;
    }
    if numbered_pattern().is_match(name) {
        return IdentifierQuality::Numbered;
    }
    IdentifierQuality::Good
}

/// Declared names in source order: declarators, function names, parameters
/// and catch parameters.
pub fn declarations(script: &Script) -> Vec<Declaration> {
    let mut out = Vec::new();
    for idx in 0..script.len() {
        if script.is(idx, "=>") {
            arrow_params(script, idx, &mut out);
            continue;
        }
        if !script.is_ident(idx) || script.is_member_position(idx) || script.is_object_key(idx) {
            continue;
        }
        match script.text(idx) {
            "var" => declarators(script, idx, DeclKind::Var, &mut out),
            "let" => declarators(script, idx, DeclKind::Let, &mut out),
            "const" => declarators(script, idx, DeclKind::Const, &mut out),
            "function" => {
                let Some(function) = script.function_at(idx) else {
                    continue;
                };
                let mut name = idx + 1;
                if script.is(name, "*") {
                    name += 1;
                }
                if script.is_ident(name) && !script.is(name, "(") {
                    push(script, &mut out, name, DeclKind::Function, None);
                }
                for param in script.param_names(function.params.clone()) {
                    push(script, &mut out, param, DeclKind::Param, None);
                }
            }
            "catch" if script.is(idx + 1, "(") => {
                if let Some(close) = script.matching(idx + 1) {
                    for param in script.param_names(idx + 2..close) {
                        push(script, &mut out, param, DeclKind::CatchParam, None);
                    }
                }
            }
            _ => {}
        }
    }
    out
}

fn push(script: &Script, out: &mut Vec<Declaration>, token: usize, kind: DeclKind, init: Option<Range<usize>>) {
    out.push(Declaration {
        name: script.text(token).to_string(),
        token,
        kind,
        line: script.line(token),
        init,
    });
}

fn arrow_params(script: &Script, arrow: usize, out: &mut Vec<Declaration>) {
    if arrow == 0 {
        return;
    }
    let prev = arrow - 1;
    let params = if script.is(prev, ")") {
        match script.matching(prev) {
            Some(open) => open + 1..prev,
            None => return,
        }
    } else if script.is_ident(prev) {
        prev..arrow
    } else {
        return;
    };
    for param in script.param_names(params) {
        push(script, out, param, DeclKind::Param, None);
    }
}

fn declarators(script: &Script, keyword: usize, kind: DeclKind, out: &mut Vec<Declaration>) {
    let mut pos = keyword + 1;
    loop {
        let (names, destructured) = if script.is_ident(pos) {
            pos += 1;
            (vec![pos - 1], false)
        } else if script.is(pos, "{") || script.is(pos, "[") {
            let Some(close) = script.matching(pos) else {
                return;
            };
            let names = script.param_names(pos..close + 1);
            pos = close + 1;
            (names, true)
        } else {
            return;
        };

        let init = if script.is(pos, "=") {
            let end = script.expression_end(pos + 1, script.len());
            let range = pos + 1..end;
            pos = end;
            Some(range)
        } else {
            None
        };

        for name in names {
            let init = if destructured { None } else { init.clone() };
            push(script, out, name, kind, init);
        }

        if script.is(pos, ",") {
            pos += 1;
        } else {
            return;
        }
    }
}

/// Token indices that refer to `name` as a variable: not a member, not an
/// object key, not the declaration itself.
pub fn references(script: &Script, name: &str, declared_at: usize) -> Vec<usize> {
    (0..script.len())
        .filter(|idx| {
            *idx != declared_at
                && script.is_ident(*idx)
                && script.text(*idx) == name
                && !script.is_member_position(*idx)
                && !script.is_object_key(*idx)
        })
        .collect()
}

pub fn usage_context(script: &Script, decl: &Declaration, idioms: &[Idiom]) -> UsageContext {
    let initializer = decl
        .init
        .as_ref()
        .map(|init| initializer(script, init, idioms))
        .unwrap_or_default();

    let refs: HashSet<usize> = references(script, &decl.name, decl.token).into_iter().collect();
    let is_ref = |range: &Range<usize>| range.end == range.start + 1 && refs.contains(&range.start);

    let mut uses = Vec::new();
    for (i, idiom) in idioms.iter().enumerate() {
        match &idiom.kind {
            IdiomKind::Locator(locator) => {
                if let LocatorOrigin::Binding { name } = locator.origin {
                    if refs.contains(&name) {
                        uses.extend(locator.actions.iter().map(|a| Use::Action(a.method)));
                    }
                }
                for action in &locator.actions {
                    if action.method != "fill" {
                        continue;
                    }
                    if let Some(ActionArg::Tokens(arg)) = action.args.first() {
                        if is_ref(arg) {
                            uses.push(Use::FillValue(i));
                        }
                    }
                }
            }
            IdiomKind::Sleep { delay: Some(delay) } | IdiomKind::Timeout { delay: Some(delay), .. } => {
                if is_ref(delay) {
                    uses.push(Use::Delay);
                }
            }
            IdiomKind::Assertion(assertion) => {
                if let Some(expected) = &assertion.expected {
                    if is_ref(expected) {
                        uses.push(Use::Expected(assertion.actual.clone()));
                    }
                }
            }
            IdiomKind::Navigate(NavAction::Goto(target)) => {
                if is_ref(target) {
                    uses.push(Use::NavigateTarget);
                }
            }
            _ => {}
        }
    }

    UsageContext { initializer, uses }
}

fn initializer(script: &Script, init: &Range<usize>, idioms: &[Idiom]) -> Initializer {
    let mut start = init.start;
    if script.is(start, "await") {
        start += 1;
    }
    let found = idioms
        .iter()
        .position(|idiom| idiom.tokens.start == start && idiom.tokens.end == init.end);
    if let Some(i) = found {
        match &idioms[i].kind {
            IdiomKind::Locator(locator) if locator.actions.is_empty() => return Initializer::Locator(i),
            IdiomKind::Locator(locator)
                if locator.actions.last().map(|a| a.kind) == Some(ActionKind::Read) =>
            {
                return Initializer::ElementRead(i)
            }
            IdiomKind::PageRead(read) => return Initializer::PageRead(*read),
            _ => return Initializer::Other,
        }
    }
    if init.end == init.start + 1 {
        let text = script.text(init.start);
        match script.kind(init.start) {
            Some(TokenKind::Str) => {
                return Initializer::Literal {
                    kind: TokenKind::Str,
                    value: unquote(text),
                }
            }
            Some(TokenKind::Template) if !text.contains("${") => {
                return Initializer::Literal {
                    kind: TokenKind::Str,
                    value: unquote(text),
                }
            }
            Some(TokenKind::Number) => {
                return Initializer::Literal {
                    kind: TokenKind::Number,
                    value: text.to_string(),
                }
            }
            _ => {}
        }
    }
    Initializer::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(source: &str) -> Vec<(String, DeclKind)> {
        let script = Script::parse("t.js", source).unwrap();
        declarations(&script)
            .into_iter()
            .map(|d| (d.name, d.kind))
            .collect()
    }

    #[test]
    fn test_classify() {
        let rules = QualityRules::default();
        assert_eq!(classify("i", &rules), IdentifierQuality::Good);
        assert_eq!(classify("a", &rules), IdentifierQuality::TooShort);
        assert_eq!(classify("el", &rules), IdentifierQuality::Generic);
        assert_eq!(classify("Temp", &rules), IdentifierQuality::Generic);
        assert_eq!(classify("input1", &rules), IdentifierQuality::Numbered);
        assert_eq!(classify("loginButton", &rules), IdentifierQuality::Good);
    }

    #[test]
    fn test_declarators() {
        let found = names("var a = 1, b; let { c, d: e } = obj; const [f] = list;");
        let found: Vec<&str> = found.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(found, vec!["a", "b", "c", "e", "f"]);
    }

    #[test]
    fn test_functions_params_and_catch() {
        let found = names("function go(x, y) { try { z(); } catch (err) {} }\nitems.map(v => v * 2);");
        assert_eq!(
            found,
            vec![
                ("go".to_string(), DeclKind::Function),
                ("x".to_string(), DeclKind::Param),
                ("y".to_string(), DeclKind::Param),
                ("err".to_string(), DeclKind::CatchParam),
                ("v".to_string(), DeclKind::Param),
            ]
        );
    }

    #[test]
    fn test_references_skip_members_and_keys() {
        let script = Script::parse("t.js", "var el = 1; foo.el = el; bar({ el: el });").unwrap();
        let decls = declarations(&script);
        let refs = references(&script, "el", decls[0].token);
        assert_eq!(refs.len(), 2);
    }

    #[test]
    fn test_literal_initializer() {
        let script = Script::parse("t.js", "var u = 'bob';").unwrap();
        let decls = declarations(&script);
        let usage = usage_context(&script, &decls[0], &[]);
        assert_eq!(
            usage.initializer,
            Initializer::Literal {
                kind: TokenKind::Str,
                value: "bob".to_string()
            }
        );
    }
}
