//! Recognition of DOM, jQuery, timing, navigation and assertion idioms.
//!
//! The recognizer only describes what it found, as token ranges into the
//! script. Turning an idiom into target code is the rewrite engine's job.

use crate::analysis::syntax::{Chain, FnBody, Function, Script, Segment};
use crate::analysis::lexer::TokenKind;
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum IdiomFamily {
    DomQuery,
    JQuery,
    ElementAction,
    Timing,
    PageLoad,
    Navigation,
    Assertion,
    Unsupported,
}

impl IdiomFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomQuery => "dom_query",
            Self::JQuery => "jquery",
            Self::ElementAction => "element_action",
            Self::Timing => "timing",
            Self::PageLoad => "page_load",
            Self::Navigation => "navigation",
            Self::Assertion => "assertion",
            Self::Unsupported => "unsupported",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    ById,
    Selector,
    SelectorAll,
    ByClass,
    ByTag,
    ByName,
}

impl QueryMethod {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "getElementById" => Some(Self::ById),
            "querySelector" => Some(Self::Selector),
            "querySelectorAll" => Some(Self::SelectorAll),
            "getElementsByClassName" => Some(Self::ByClass),
            "getElementsByTagName" => Some(Self::ByTag),
            "getElementsByName" => Some(Self::ByName),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorOrigin {
    Query { method: QueryMethod, arg: Range<usize> },
    JQuery { arg: Range<usize> },
    Binding { name: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refinement {
    Nth(Range<usize>),
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionArg {
    Tokens(Range<usize>),
    Literal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionKind {
    Interact,
    Read,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementAction {
    /// target API method, e.g. `fill` or `inputValue`
    pub method: &'static str,
    pub args: Vec<ActionArg>,
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorUse {
    pub origin: LocatorOrigin,
    pub refinements: Vec<Refinement>,
    pub actions: Vec<ElementAction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    Inline(Function),
    Named(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavAction {
    Goto(Range<usize>),
    Reload,
    Back,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageRead {
    Url,
    Pathname,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertKind {
    Equal,
    DeepEqual,
    Truthy,
    Falsy,
    IsTrue,
    IsFalse,
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    pub kind: AssertKind,
    pub negated: bool,
    pub actual: Range<usize>,
    pub expected: Option<Range<usize>>,
    pub message: Option<Range<usize>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdiomKind {
    Locator(LocatorUse),
    Timeout {
        callback: Callback,
        delay: Option<Range<usize>>,
    },
    Sleep {
        delay: Option<Range<usize>>,
    },
    PageReady {
        state: &'static str,
        callback: Callback,
    },
    Navigate(NavAction),
    PageRead(PageRead),
    Assertion(Assertion),
    Unsupported {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Idiom {
    pub kind: IdiomKind,
    pub tokens: Range<usize>,
    pub line: usize,
}

impl Idiom {
    pub fn family(&self) -> IdiomFamily {
        match &self.kind {
            IdiomKind::Locator(locator) => {
                if !locator.actions.is_empty() {
                    return IdiomFamily::ElementAction;
                }
                match locator.origin {
                    LocatorOrigin::Query { .. } => IdiomFamily::DomQuery,
                    LocatorOrigin::JQuery { .. } => IdiomFamily::JQuery,
                    LocatorOrigin::Binding { .. } => IdiomFamily::ElementAction,
                }
            }
            IdiomKind::Timeout { .. } | IdiomKind::Sleep { .. } => IdiomFamily::Timing,
            IdiomKind::PageReady { .. } => IdiomFamily::PageLoad,
            IdiomKind::Navigate(_) | IdiomKind::PageRead(_) => IdiomFamily::Navigation,
            IdiomKind::Assertion(_) => IdiomFamily::Assertion,
            IdiomKind::Unsupported { .. } => IdiomFamily::Unsupported,
        }
    }
}

const MUTATION_METHODS: &[&str] = &[
    "addClass",
    "removeClass",
    "toggleClass",
    "css",
    "hide",
    "show",
    "toggle",
    "fadeIn",
    "fadeOut",
    "slideUp",
    "slideDown",
    "append",
    "prepend",
    "after",
    "before",
    "remove",
    "empty",
    "appendChild",
    "removeChild",
    "insertBefore",
    "setAttribute",
    "removeAttribute",
    "removeAttr",
];

const LISTENER_METHODS: &[&str] = &["on", "off", "bind", "unbind", "addEventListener", "each"];

pub struct Recognizer<'a> {
    script: &'a Script,
    bindings: &'a HashSet<String>,
    sleep_helpers: &'a [String],
}

impl<'a> Recognizer<'a> {
    pub fn new(script: &'a Script, bindings: &'a HashSet<String>, sleep_helpers: &'a [String]) -> Self {
        Self {
            script,
            bindings,
            sleep_helpers,
        }
    }

    pub fn script(&self) -> &'a Script {
        self.script
    }

    /// Idiom starting at token `idx`, if any.
    pub fn recognize(&self, idx: usize) -> Option<Idiom> {
        let s = self.script;
        if s.is(idx, "new") {
            return self.promise_sleep(idx);
        }
        let chain = s.parse_chain(idx)?;
        let root = s.text(idx);
        match root {
            "document" => self.document_idiom(&chain),
            "$" | "jQuery" => self.jquery_idiom(&chain),
            "window" => self.window_idiom(&chain),
            "location" => self.location_idiom(&chain, 0),
            "history" => self.history_idiom(&chain, 0),
            "setTimeout" => self.timeout_idiom(&chain, 0),
            "setInterval" => Some(self.unsupported(&chain, chain.end, "setInterval polling has no direct equivalent; use expect.poll")),
            "assert" => self.assert_idiom(&chain),
            "console" if self.member_name(&chain, 0) == Some("assert") => {
                self.call_args(&chain, 1)
                    .and_then(|args| self.truthy_assertion(&chain, args, 2))
            }
            "expect" => self.chai_idiom(&chain),
            name if self.sleep_helpers.iter().any(|h| h == name) => self.sleep_idiom(&chain),
            name if self.bindings.contains(name) => {
                self.locator_idiom(&chain, LocatorOrigin::Binding { name: idx }, 0)
            }
            _ => None,
        }
    }

    fn idiom(&self, kind: IdiomKind, tokens: Range<usize>) -> Idiom {
        Idiom {
            line: self.script.line(tokens.start),
            kind,
            tokens,
        }
    }

    fn unsupported(&self, chain: &Chain, end: usize, reason: &str) -> Idiom {
        let end = self.assignment_end(end).unwrap_or(end);
        self.idiom(
            IdiomKind::Unsupported {
                reason: reason.to_string(),
            },
            chain.root..end,
        )
    }

    fn member_name(&self, chain: &Chain, seg: usize) -> Option<&'a str> {
        match chain.segments.get(seg) {
            Some(Segment::Member { name }) => Some(self.script.text(*name)),
            _ => None,
        }
    }

    fn call_args(&self, chain: &Chain, seg: usize) -> Option<Vec<Range<usize>>> {
        match chain.segments.get(seg) {
            Some(Segment::Call { args, .. }) => Some(args.clone()),
            _ => None,
        }
    }

    /// Token index right after segment `seg`.
    fn segment_end(&self, chain: &Chain, seg: usize) -> usize {
        match chain.segments.get(seg) {
            Some(Segment::Member { name }) => name + 1,
            Some(Segment::Call { close, .. }) | Some(Segment::Index { close, .. }) => close + 1,
            None => chain.end,
        }
    }

    /// `target = value` where `end` is the token after `target`; returns the
    /// end of the value expression.
    fn assignment_end(&self, end: usize) -> Option<usize> {
        if self.script.is(end, "=") {
            Some(self.script.expression_end(end + 1, self.script.len()))
        } else {
            None
        }
    }

    fn is_assigned(&self, chain: &Chain, seg: usize) -> bool {
        seg + 1 == chain.segments.len() && self.script.is(chain.end, "=")
    }

    fn inline_function(&self, arg: &Range<usize>) -> Option<Function> {
        self.script
            .function_at(arg.start)
            .filter(|f| f.end == arg.end)
    }

    fn callback(&self, arg: &Range<usize>) -> Option<Callback> {
        if let Some(function) = self.inline_function(arg) {
            return Some(Callback::Inline(function));
        }
        if arg.end == arg.start + 1 && self.script.is_ident(arg.start) {
            return Some(Callback::Named(arg.start));
        }
        None
    }

    fn document_idiom(&self, chain: &Chain) -> Option<Idiom> {
        let member = self.member_name(chain, 0)?;
        if let Some(method) = QueryMethod::from_name(member) {
            let args = self.call_args(chain, 1)?;
            if args.len() != 1 {
                return None;
            }
            let origin = LocatorOrigin::Query {
                method,
                arg: args[0].clone(),
            };
            return self.locator_idiom(chain, origin, 2);
        }
        match member {
            "title" if chain.segments.len() == 1 => {
                if self.is_assigned(chain, 0) {
                    Some(self.unsupported(chain, chain.end, "the page title cannot be assigned from a test"))
                } else {
                    Some(self.idiom(IdiomKind::PageRead(PageRead::Title), chain.root..chain.end))
                }
            }
            "location" => self.location_idiom(chain, 1),
            "addEventListener" => self.listener_ready(chain, 1),
            "createElement" | "write" => Some(self.unsupported(
                chain,
                self.segment_end(chain, 1),
                "creating page content has no test API equivalent",
            )),
            _ => None,
        }
    }

    fn jquery_idiom(&self, chain: &Chain) -> Option<Idiom> {
        let args = self.call_args(chain, 0)?;
        if args.len() != 1 {
            return None;
        }
        let arg = &args[0];
        let single = arg.end == arg.start + 1;
        if single && self.script.is(arg.start, "document") {
            if self.member_name(chain, 1) != Some("ready") {
                return None;
            }
            let ready_args = self.call_args(chain, 2)?;
            let callback = self.callback(ready_args.first()?)?;
            return Some(self.idiom(
                IdiomKind::PageReady {
                    state: "domcontentloaded",
                    callback,
                },
                chain.root..self.segment_end(chain, 2),
            ));
        }
        if let Some(function) = self.inline_function(arg) {
            return Some(self.idiom(
                IdiomKind::PageReady {
                    state: "domcontentloaded",
                    callback: Callback::Inline(function),
                },
                chain.root..self.segment_end(chain, 0),
            ));
        }
        if single && matches!(self.script.text(arg.start), "this" | "window") {
            return None;
        }
        // `$(el)` around an element binding is the binding itself
        if single && self.bindings.contains(self.script.text(arg.start)) {
            return self.locator_idiom(chain, LocatorOrigin::Binding { name: arg.start }, 1);
        }
        if let Some(html) = self.script.string_value(arg) {
            if html.trim_start().starts_with('<') {
                return Some(self.unsupported(
                    chain,
                    chain.end,
                    "creating page content has no test API equivalent",
                ));
            }
        }
        self.locator_idiom(chain, LocatorOrigin::JQuery { arg: arg.clone() }, 1)
    }

    fn window_idiom(&self, chain: &Chain) -> Option<Idiom> {
        match self.member_name(chain, 0)? {
            "location" => self.location_idiom(chain, 1),
            "history" => self.history_idiom(chain, 1),
            "setTimeout" => self.timeout_idiom(chain, 1),
            "setInterval" => Some(self.unsupported(
                chain,
                chain.end,
                "setInterval polling has no direct equivalent; use expect.poll",
            )),
            "addEventListener" => self.listener_ready(chain, 1),
            "onload" if self.is_assigned(chain, 0) => {
                let value = chain.end + 1..self.assignment_end(chain.end)?;
                let callback = self.callback(&value)?;
                Some(self.idiom(
                    IdiomKind::PageReady {
                        state: "load",
                        callback,
                    },
                    chain.root..value.end,
                ))
            }
            _ => None,
        }
    }

    fn listener_ready(&self, chain: &Chain, seg: usize) -> Option<Idiom> {
        let args = self.call_args(chain, seg)?;
        if args.len() != 2 || chain.segments.len() != seg + 1 {
            return None;
        }
        let state = match self.script.string_value(&args[0])?.as_str() {
            "DOMContentLoaded" => "domcontentloaded",
            "load" => "load",
            _ => return None,
        };
        let callback = self.callback(&args[1])?;
        Some(self.idiom(
            IdiomKind::PageReady { state, callback },
            chain.root..chain.end,
        ))
    }

    /// `segments[first..]` are the members after `location`.
    fn location_idiom(&self, chain: &Chain, first: usize) -> Option<Idiom> {
        let rest = chain.segments.len().saturating_sub(first);
        if rest == 0 {
            if self.script.is(chain.end, "=") {
                let end = self.assignment_end(chain.end)?;
                return Some(self.idiom(
                    IdiomKind::Navigate(NavAction::Goto(chain.end + 1..end)),
                    chain.root..end,
                ));
            }
            return None;
        }
        let member = self.member_name(chain, first)?;
        match member {
            "href" if rest == 1 => {
                if self.is_assigned(chain, first) {
                    let end = self.assignment_end(chain.end)?;
                    Some(self.idiom(
                        IdiomKind::Navigate(NavAction::Goto(chain.end + 1..end)),
                        chain.root..end,
                    ))
                } else {
                    Some(self.idiom(IdiomKind::PageRead(PageRead::Url), chain.root..chain.end))
                }
            }
            "pathname" if rest == 1 && !self.is_assigned(chain, first) => Some(self.idiom(
                IdiomKind::PageRead(PageRead::Pathname),
                chain.root..chain.end,
            )),
            "assign" | "replace" => {
                let args = self.call_args(chain, first + 1)?;
                if args.len() != 1 {
                    return None;
                }
                Some(self.idiom(
                    IdiomKind::Navigate(NavAction::Goto(args[0].clone())),
                    chain.root..self.segment_end(chain, first + 1),
                ))
            }
            "reload" => {
                self.call_args(chain, first + 1)?;
                Some(self.idiom(
                    IdiomKind::Navigate(NavAction::Reload),
                    chain.root..self.segment_end(chain, first + 1),
                ))
            }
            _ => None,
        }
    }

    fn history_idiom(&self, chain: &Chain, first: usize) -> Option<Idiom> {
        let member = self.member_name(chain, first)?;
        let args = self.call_args(chain, first + 1)?;
        let action = match member {
            "back" => NavAction::Back,
            "forward" => NavAction::Forward,
            "go" if args.len() == 1 => match self.script.range_text(args[0].clone()) {
                "-1" => NavAction::Back,
                "1" => NavAction::Forward,
                _ => return None,
            },
            _ => return None,
        };
        Some(self.idiom(
            IdiomKind::Navigate(action),
            chain.root..self.segment_end(chain, first + 1),
        ))
    }

    fn timeout_idiom(&self, chain: &Chain, seg: usize) -> Option<Idiom> {
        let args = self.call_args(chain, seg)?;
        if args.is_empty() || args.len() > 2 {
            return None;
        }
        let end = self.segment_end(chain, seg);
        let Some(callback) = self.callback(&args[0]) else {
            return Some(self.unsupported(chain, end, "string timer callbacks cannot be migrated"));
        };
        Some(self.idiom(
            IdiomKind::Timeout {
                callback,
                delay: args.get(1).cloned(),
            },
            chain.root..end,
        ))
    }

    fn sleep_idiom(&self, chain: &Chain) -> Option<Idiom> {
        let args = self.call_args(chain, 0)?;
        if chain.segments.len() != 1 || args.len() > 1 {
            return None;
        }
        Some(self.idiom(
            IdiomKind::Sleep {
                delay: args.first().cloned(),
            },
            chain.root..chain.end,
        ))
    }

    /// `new Promise(r => setTimeout(r, ms))`
    fn promise_sleep(&self, idx: usize) -> Option<Idiom> {
        let s = self.script;
        if !s.is(idx + 1, "Promise") || !s.is(idx + 2, "(") {
            return None;
        }
        let close = s.matching(idx + 2)?;
        let args = s.split_args(idx + 2, close);
        if args.len() != 1 {
            return None;
        }
        let function = self.inline_function(&args[0])?;
        let params = s.param_names(function.params.clone());
        if params.len() != 1 {
            return None;
        }
        let resolve = s.text(params[0]);
        let body = match &function.body {
            FnBody::Expr(range) => range.clone(),
            FnBody::Block { open, close } => {
                let statements = s.statements(open + 1..*close);
                if statements.len() != 1 {
                    return None;
                }
                let mut stmt = statements[0].clone();
                if s.is(stmt.end - 1, ";") {
                    stmt.end -= 1;
                }
                stmt
            }
        };
        let timer = s.parse_chain(body.start)?;
        if timer.end != body.end || !s.is(body.start, "setTimeout") {
            return None;
        }
        let timer_args = self.call_args(&timer, 0)?;
        if timer_args.is_empty() || s.range_text(timer_args[0].clone()) != resolve {
            return None;
        }
        Some(self.idiom(
            IdiomKind::Sleep {
                delay: timer_args.get(1).cloned(),
            },
            idx..close + 1,
        ))
    }

    fn truthy_assertion(&self, chain: &Chain, args: Vec<Range<usize>>, end_seg: usize) -> Option<Idiom> {
        if args.is_empty() || chain.segments.len() != end_seg {
            return None;
        }
        Some(self.idiom(
            IdiomKind::Assertion(Assertion {
                kind: AssertKind::Truthy,
                negated: false,
                actual: args[0].clone(),
                expected: None,
                message: args.get(1).cloned(),
            }),
            chain.root..chain.end,
        ))
    }

    fn assert_idiom(&self, chain: &Chain) -> Option<Idiom> {
        if let Some(args) = self.call_args(chain, 0) {
            return self.truthy_assertion(chain, args, 1);
        }
        let method = self.member_name(chain, 0)?;
        let args = self.call_args(chain, 1)?;
        if chain.segments.len() != 2 || args.is_empty() {
            return None;
        }
        let (kind, negated, binary) = match method {
            "equal" | "strictEqual" => (AssertKind::Equal, false, true),
            "notEqual" | "notStrictEqual" => (AssertKind::Equal, true, true),
            "deepEqual" | "deepStrictEqual" => (AssertKind::DeepEqual, false, true),
            "notDeepEqual" | "notDeepStrictEqual" => (AssertKind::DeepEqual, true, true),
            "include" | "includes" => (AssertKind::Contains, false, true),
            "ok" => (AssertKind::Truthy, false, false),
            "notOk" => (AssertKind::Falsy, false, false),
            "isTrue" => (AssertKind::IsTrue, false, false),
            "isFalse" => (AssertKind::IsFalse, false, false),
            _ => return None,
        };
        if binary && args.len() < 2 {
            return None;
        }
        let (expected, message) = if binary {
            (args.get(1).cloned(), args.get(2).cloned())
        } else {
            (None, args.get(1).cloned())
        };
        Some(self.idiom(
            IdiomKind::Assertion(Assertion {
                kind,
                negated,
                actual: args[0].clone(),
                expected,
                message,
            }),
            chain.root..chain.end,
        ))
    }

    /// chai style `expect(a).to.equal(b)`; Playwright-style expects are left alone.
    fn chai_idiom(&self, chain: &Chain) -> Option<Idiom> {
        let actual_args = self.call_args(chain, 0)?;
        if actual_args.len() != 1 || self.member_name(chain, 1) != Some("to") {
            return None;
        }
        let mut negated = false;
        let mut deep = false;
        let mut terminal = None;
        let mut seg = 2;
        while let Some(name) = self.member_name(chain, seg) {
            match name {
                "be" | "been" | "is" | "that" | "and" | "have" => {}
                "not" => negated = !negated,
                "deep" => deep = true,
                other => {
                    terminal = Some(other);
                    seg += 1;
                    break;
                }
            }
            seg += 1;
        }
        let terminal = terminal?;
        let call = self.call_args(chain, seg);
        let consumed = if call.is_some() { seg + 1 } else { seg };
        if consumed != chain.segments.len() {
            return None;
        }
        let call = call.unwrap_or_default();
        let (kind, expected) = match terminal {
            "equal" | "equals" | "eq" if call.len() == 1 => {
                let kind = if deep {
                    AssertKind::DeepEqual
                } else {
                    AssertKind::Equal
                };
                (kind, Some(call[0].clone()))
            }
            "eql" if call.len() == 1 => (AssertKind::DeepEqual, Some(call[0].clone())),
            "include" | "includes" | "contain" | "contains" if call.len() == 1 => {
                (AssertKind::Contains, Some(call[0].clone()))
            }
            "true" if call.is_empty() => (AssertKind::IsTrue, None),
            "false" if call.is_empty() => (AssertKind::IsFalse, None),
            "ok" if call.is_empty() => (AssertKind::Truthy, None),
            _ => return None,
        };
        Some(self.idiom(
            IdiomKind::Assertion(Assertion {
                kind,
                negated,
                actual: actual_args[0].clone(),
                expected,
                message: None,
            }),
            chain.root..chain.end,
        ))
    }

    fn locator_idiom(&self, chain: &Chain, origin: LocatorOrigin, first: usize) -> Option<Idiom> {
        let s = self.script;
        let mut refinements = Vec::new();
        let mut seg = first;

        loop {
            match chain.segments.get(seg) {
                Some(Segment::Index { open, close }) => {
                    refinements.push(Refinement::Nth(open + 1..*close));
                    seg += 1;
                }
                Some(Segment::Member { name }) => {
                    let call = self.call_args(chain, seg + 1);
                    match (s.text(*name), call) {
                        ("eq" | "get", Some(args)) if args.len() == 1 => {
                            refinements.push(Refinement::Nth(args[0].clone()));
                            seg += 2;
                        }
                        ("first", Some(args)) if args.is_empty() => {
                            refinements.push(Refinement::First);
                            seg += 2;
                        }
                        ("last", Some(args)) if args.is_empty() => {
                            refinements.push(Refinement::Last);
                            seg += 2;
                        }
                        _ => break,
                    }
                }
                _ => break,
            }
        }

        let wrapped = first > 0;
        let chainable = wrapped || !matches!(origin, LocatorOrigin::Binding { .. });
        let mut actions = Vec::new();
        let mut end = self.segment_end(chain, seg.saturating_sub(1)).max(chain.root + 1);
        if seg == 0 {
            end = chain.root + 1;
        }

        while let Some(Segment::Member { name }) = chain.segments.get(seg) {
            let name_text = s.text(*name);
            match self.call_args(chain, seg + 1) {
                Some(args) => {
                    if MUTATION_METHODS.contains(&name_text) {
                        return Some(self.unsupported(
                            chain,
                            self.segment_end(chain, seg + 1),
                            &format!("DOM mutation `.{}()` has no test API equivalent", name_text),
                        ));
                    }
                    if LISTENER_METHODS.contains(&name_text) {
                        return Some(self.unsupported(
                            chain,
                            self.segment_end(chain, seg + 1),
                            &format!("event handler `.{}()` must be rewritten by hand", name_text),
                        ));
                    }
                    let Some(action) = self.method_action(name_text, &args) else {
                        if matches!(name_text, "text" | "html" | "attr" | "prop" | "is") {
                            return Some(self.unsupported(
                                chain,
                                self.segment_end(chain, seg + 1),
                                &format!("`.{}()` with these arguments has no test API equivalent", name_text),
                            ));
                        }
                        break;
                    };
                    let is_read = action.kind == ActionKind::Read;
                    actions.push(action);
                    seg += 2;
                    end = self.segment_end(chain, seg - 1);
                    if is_read || !chainable {
                        break;
                    }
                }
                None => {
                    if self.is_assigned(chain, seg) {
                        let value_end = self.assignment_end(chain.end)?;
                        let value = chain.end + 1..value_end;
                        let action = match name_text {
                            "value" => ElementAction {
                                method: "fill",
                                args: vec![ActionArg::Tokens(value)],
                                kind: ActionKind::Interact,
                            },
                            "checked" => match s.range_text(value.clone()) {
                                "true" => interact("check"),
                                "false" => interact("uncheck"),
                                _ => {
                                    return Some(self.unsupported(
                                        chain,
                                        chain.end,
                                        "checked state must be a literal boolean",
                                    ))
                                }
                            },
                            other => {
                                return Some(self.unsupported(
                                    chain,
                                    chain.end,
                                    &format!("assigning `.{}` mutates the page", other),
                                ))
                            }
                        };
                        actions.push(action);
                        end = value_end;
                        break;
                    }
                    let last = seg + 1 == chain.segments.len();
                    if last && matches!(s.text(chain.end), "+=" | "-=" | "++" | "--") {
                        return Some(self.unsupported(
                            chain,
                            chain.end,
                            &format!("compound assignment to `.{}` mutates the page", name_text),
                        ));
                    }
                    if matches!(name_text, "style" | "classList" | "dataset") {
                        return Some(self.unsupported(
                            chain,
                            chain.end,
                            &format!("`.{}` access has no test API equivalent", name_text),
                        ));
                    }
                    let Some(action) = property_read(name_text) else {
                        break;
                    };
                    actions.push(action);
                    seg += 1;
                    end = self.segment_end(chain, seg - 1);
                    break;
                }
            }
        }

        if matches!(origin, LocatorOrigin::Binding { .. })
            && !wrapped
            && actions.is_empty()
            && refinements.is_empty()
        {
            return None;
        }

        Some(self.idiom(
            IdiomKind::Locator(LocatorUse {
                origin,
                refinements,
                actions,
            }),
            chain.root..end,
        ))
    }

    fn method_action(&self, name: &str, args: &[Range<usize>]) -> Option<ElementAction> {
        let s = self.script;
        let action = match (name, args.len()) {
            ("click" | "dblclick" | "focus" | "blur" | "hover", 0) => interact(static_name(name)?),
            ("mouseover" | "mouseenter", 0) => interact("hover"),
            ("scrollIntoView", _) => interact("scrollIntoViewIfNeeded"),
            ("submit", 0) => ElementAction {
                method: "dispatchEvent",
                args: vec![ActionArg::Literal("'submit'".to_string())],
                kind: ActionKind::Interact,
            },
            ("val", 0) => read("inputValue", Vec::new()),
            ("val", 1) => ElementAction {
                method: "fill",
                args: vec![ActionArg::Tokens(args[0].clone())],
                kind: ActionKind::Interact,
            },
            ("text", 0) => read("textContent", Vec::new()),
            ("html", 0) => read("innerHTML", Vec::new()),
            ("attr" | "getAttribute", 1) => {
                read("getAttribute", vec![ActionArg::Tokens(args[0].clone())])
            }
            ("is", 1) => match s.string_value(&args[0])?.as_str() {
                ":visible" => read("isVisible", Vec::new()),
                ":hidden" => read("isHidden", Vec::new()),
                ":checked" => read("isChecked", Vec::new()),
                ":disabled" => read("isDisabled", Vec::new()),
                ":enabled" => read("isEnabled", Vec::new()),
                _ => return None,
            },
            ("prop", 1) if s.string_value(&args[0]).as_deref() == Some("checked") => {
                read("isChecked", Vec::new())
            }
            ("prop", 2) if s.string_value(&args[0]).as_deref() == Some("checked") => {
                match s.range_text(args[1].clone()) {
                    "true" => interact("check"),
                    "false" => interact("uncheck"),
                    _ => return None,
                }
            }
            ("trigger", 1) => match s.string_value(&args[0]).as_deref() {
                Some("click") => interact("click"),
                Some("focus") => interact("focus"),
                Some("blur") => interact("blur"),
                _ => ElementAction {
                    method: "dispatchEvent",
                    args: vec![ActionArg::Tokens(args[0].clone())],
                    kind: ActionKind::Interact,
                },
            },
            ("getBoundingClientRect", 0) => read("boundingBox", Vec::new()),
            _ => return None,
        };
        Some(action)
    }
}

fn static_name(name: &str) -> Option<&'static str> {
    ["click", "dblclick", "focus", "blur", "hover"]
        .into_iter()
        .find(|n| *n == name)
}

fn interact(method: &'static str) -> ElementAction {
    ElementAction {
        method,
        args: Vec::new(),
        kind: ActionKind::Interact,
    }
}

fn read(method: &'static str, args: Vec<ActionArg>) -> ElementAction {
    ElementAction {
        method,
        args,
        kind: ActionKind::Read,
    }
}

fn property_read(name: &str) -> Option<ElementAction> {
    let action = match name {
        "value" => read("inputValue", Vec::new()),
        "textContent" => read("textContent", Vec::new()),
        "innerText" => read("innerText", Vec::new()),
        "innerHTML" => read("innerHTML", Vec::new()),
        "checked" => read("isChecked", Vec::new()),
        "disabled" => read("isDisabled", Vec::new()),
        "length" => read("count", Vec::new()),
        "id" | "href" | "src" | "title" | "name" | "placeholder" => read(
            "getAttribute",
            vec![ActionArg::Literal(format!("'{}'", name))],
        ),
        "className" => read("getAttribute", vec![ActionArg::Literal("'class'".to_string())]),
        _ => return None,
    };
    Some(action)
}

/// CSS selector for a locator whose selector argument is a string literal.
pub fn literal_selector(script: &Script, origin: &LocatorOrigin) -> Option<String> {
    match origin {
        LocatorOrigin::Query { method, arg } => {
            let value = script.string_value(arg)?;
            Some(match method {
                QueryMethod::ById => format!("#{}", value),
                QueryMethod::ByClass => value
                    .split_whitespace()
                    .map(|c| format!(".{}", c))
                    .collect::<String>(),
                QueryMethod::ByName => format!("[name=\"{}\"]", value),
                QueryMethod::Selector | QueryMethod::SelectorAll | QueryMethod::ByTag => value,
            })
        }
        LocatorOrigin::JQuery { arg } => script.string_value(arg),
        LocatorOrigin::Binding { .. } => None,
    }
}

/// Whether `idx` holds an identifier that can be the root of an idiom.
pub fn is_candidate(script: &Script, idx: usize) -> bool {
    script.kind(idx) == Some(TokenKind::Ident) && !script.is_member_position(idx)
}

/// Every idiom in the script, nested ones included, in source order.
pub fn collect(recognizer: &Recognizer<'_>) -> Vec<Idiom> {
    let script = recognizer.script();
    (0..script.len())
        .filter(|idx| is_candidate(script, *idx))
        .filter_map(|idx| recognizer.recognize(idx))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_idiom(source: &str) -> (Script, Option<Idiom>) {
        first_idiom_with(source, &[])
    }

    fn first_idiom_with(source: &str, bindings: &[&str]) -> (Script, Option<Idiom>) {
        let script = Script::parse("t.js", source).unwrap();
        let bindings: HashSet<String> = bindings.iter().map(|b| b.to_string()).collect();
        let helpers = vec!["sleep".to_string()];
        let idiom = {
            let recognizer = Recognizer::new(&script, &bindings, &helpers);
            collect(&recognizer).into_iter().next()
        };
        (script, idiom)
    }

    fn locator(idiom: &Idiom) -> &LocatorUse {
        match &idiom.kind {
            IdiomKind::Locator(locator) => locator,
            other => panic!("expected locator, got {:?}", other),
        }
    }

    #[test]
    fn test_get_element_by_id_with_value_assignment() {
        let (script, idiom) = first_idiom("document.getElementById('user').value = 'bob';");
        let idiom = idiom.unwrap();
        assert_eq!(idiom.family(), IdiomFamily::ElementAction);
        let loc = locator(&idiom);
        assert_eq!(loc.actions[0].method, "fill");
        assert_eq!(literal_selector(&script, &loc.origin).as_deref(), Some("#user"));
        assert_eq!(script.range_text(idiom.tokens.clone()), "document.getElementById('user').value = 'bob'");
    }

    #[test]
    fn test_jquery_chained_actions() {
        let (_, idiom) = first_idiom("$('#name').val('x').trigger('change');");
        let idiom = idiom.unwrap();
        let loc = locator(&idiom);
        assert_eq!(loc.actions.len(), 2);
        assert_eq!(loc.actions[0].method, "fill");
        assert_eq!(loc.actions[1].method, "dispatchEvent");
    }

    #[test]
    fn test_read_stops_chain() {
        let (script, idiom) = first_idiom("var t = $('.title').text().trim();");
        let idiom = idiom.unwrap();
        assert_eq!(locator(&idiom).actions[0].kind, ActionKind::Read);
        assert!(script.is(idiom.tokens.end, "."));
    }

    #[test]
    fn test_bare_locator_is_jquery_family() {
        let (_, idiom) = first_idiom("var rows = $('table tr');");
        let idiom = idiom.unwrap();
        assert_eq!(idiom.family(), IdiomFamily::JQuery);
        assert!(locator(&idiom).actions.is_empty());
    }

    #[test]
    fn test_refinements() {
        let (_, idiom) = first_idiom("$('li').eq(2).click();");
        let loc = locator(idiom.as_ref().unwrap()).clone();
        assert_eq!(loc.refinements.len(), 1);
        assert_eq!(loc.actions[0].method, "click");

        let (_, idiom) = first_idiom("document.getElementsByClassName('row')[0].click();");
        let loc = locator(idiom.as_ref().unwrap()).clone();
        assert!(matches!(loc.refinements[0], Refinement::Nth(_)));
    }

    #[test]
    fn test_binding_actions() {
        let (_, idiom) = first_idiom_with("btn.click();", &["btn"]);
        let idiom = idiom.unwrap();
        assert!(matches!(locator(&idiom).origin, LocatorOrigin::Binding { .. }));

        let (_, idiom) = first_idiom_with("foo(btn);", &["btn"]);
        assert!(idiom.is_none());
    }

    #[test]
    fn test_jquery_wrapped_binding() {
        let (script, idiom) = first_idiom_with("$(el).val('a').trigger('change');", &["el"]);
        let idiom = idiom.unwrap();
        let loc = locator(&idiom);
        let LocatorOrigin::Binding { name } = loc.origin else {
            panic!("expected binding origin, got {:?}", loc.origin);
        };
        assert_eq!(script.text(name), "el");
        assert_eq!(loc.actions.len(), 2);
        assert_eq!(script.range_text(idiom.tokens.clone()), "$(el).val('a').trigger('change')");

        let (_, idiom) = first_idiom_with("var h = $(el);", &["el"]);
        assert!(matches!(locator(&idiom.unwrap()).origin, LocatorOrigin::Binding { .. }));

        let (_, idiom) = first_idiom("$(el).click();");
        assert!(matches!(locator(&idiom.unwrap()).origin, LocatorOrigin::JQuery { .. }));
    }

    #[test]
    fn test_dom_mutation_is_unsupported() {
        let (_, idiom) = first_idiom("$('#banner').hide();");
        assert_eq!(idiom.unwrap().family(), IdiomFamily::Unsupported);

        let (_, idiom) = first_idiom("document.getElementById('x').innerHTML = '<b>';");
        assert_eq!(idiom.unwrap().family(), IdiomFamily::Unsupported);
    }

    #[test]
    fn test_document_ready_forms() {
        let (_, idiom) = first_idiom("$(document).ready(function () { go(); });");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::PageReady { state: "domcontentloaded", .. }));

        let (_, idiom) = first_idiom("$(function () { go(); });");
        assert_eq!(idiom.unwrap().family(), IdiomFamily::PageLoad);

        let (_, idiom) = first_idiom("window.onload = function () { go(); };");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::PageReady { state: "load", .. }));

        let (_, idiom) = first_idiom("document.addEventListener('DOMContentLoaded', init);");
        assert!(matches!(
            idiom.unwrap().kind,
            IdiomKind::PageReady { callback: Callback::Named(_), .. }
        ));
    }

    #[test]
    fn test_timing_forms() {
        let (_, idiom) = first_idiom("setTimeout(function () { done(); }, 500);");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::Timeout { delay: Some(_), .. }));

        let (script, idiom) = first_idiom("await new Promise(r => setTimeout(r, 250));");
        let idiom = idiom.unwrap();
        match &idiom.kind {
            IdiomKind::Sleep { delay: Some(delay) } => {
                assert_eq!(script.range_text(delay.clone()), "250")
            }
            other => panic!("unexpected {:?}", other),
        }

        let (_, idiom) = first_idiom("await sleep(100);");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::Sleep { .. }));

        let (_, idiom) = first_idiom("setInterval(poll, 100);");
        assert_eq!(idiom.unwrap().family(), IdiomFamily::Unsupported);
    }

    #[test]
    fn test_navigation_forms() {
        let (script, idiom) = first_idiom("window.location.href = 'https://a.test/login';");
        match idiom.unwrap().kind {
            IdiomKind::Navigate(NavAction::Goto(url)) => {
                assert_eq!(script.range_text(url), "'https://a.test/login'")
            }
            other => panic!("unexpected {:?}", other),
        }

        let (_, idiom) = first_idiom("location.reload();");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::Navigate(NavAction::Reload)));

        let (_, idiom) = first_idiom("history.go(-1);");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::Navigate(NavAction::Back)));

        let (_, idiom) = first_idiom("var here = window.location.href;");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::PageRead(PageRead::Url)));

        let (_, idiom) = first_idiom("var t = document.title;");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::PageRead(PageRead::Title)));
    }

    #[test]
    fn test_assertion_forms() {
        let (_, idiom) = first_idiom("assert.equal(a, 'b', 'message');");
        match idiom.unwrap().kind {
            IdiomKind::Assertion(a) => {
                assert_eq!(a.kind, AssertKind::Equal);
                assert!(a.message.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }

        let (_, idiom) = first_idiom("assert(visible);");
        assert!(matches!(idiom.unwrap().kind, IdiomKind::Assertion(Assertion { kind: AssertKind::Truthy, .. })));

        let (_, idiom) = first_idiom("expect(items).to.not.deep.equal([]);");
        match idiom.unwrap().kind {
            IdiomKind::Assertion(a) => {
                assert_eq!(a.kind, AssertKind::DeepEqual);
                assert!(a.negated);
            }
            other => panic!("unexpected {:?}", other),
        }

        let (_, idiom) = first_idiom("expect(ok).toBe(true);");
        assert!(idiom.is_none());
    }

    #[test]
    fn test_nested_idioms_are_collected() {
        let script = Script::parse("t.js", "assert.equal($('#a').val(), 'x');").unwrap();
        let bindings = HashSet::new();
        let helpers = Vec::new();
        let recognizer = Recognizer::new(&script, &bindings, &helpers);
        let families: Vec<IdiomFamily> = collect(&recognizer).iter().map(Idiom::family).collect();
        assert_eq!(families, vec![IdiomFamily::Assertion, IdiomFamily::ElementAction]);
    }
}
