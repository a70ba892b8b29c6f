//! Turns a rewritten Playwright test file into a Gherkin feature.
//!
//! Each `test(...)` becomes a scenario and each top-level statement of its
//! body a step. Locator bindings are inlined into step bodies, other
//! declarations are prepended to the later steps that use them, and fixed
//! waits are folded into the step before them.

use super::model::{
    Feature, ParamKind, Scenario, ScenarioSet, Step, StepDefinition, StepKeyword, StepParam,
};
use crate::analysis::lexer::TokenKind;
use crate::analysis::syntax::{unquote, Chain, FnBody, Function, Script, Segment};
use crate::rename::naming::{capitalize, element_words, selector_words, split_words};
use std::collections::{HashMap, HashSet};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct ScenarioOptions {
    pub feature_tag: String,
    /// `goto` URLs under this prefix are written as paths
    pub base_url: Option<String>,
    pub page_object: String,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            feature_tag: "@migrated".to_string(),
            base_url: None,
            page_object: "page".to_string(),
        }
    }
}

enum BlockForm {
    Describe,
    Test,
    BeforeEach,
    Unmapped(String),
}

struct TestCall {
    form: BlockForm,
    title: Option<String>,
    skip: bool,
    callback: Function,
    line: usize,
}

struct Declaration {
    names: Vec<String>,
    range: Range<usize>,
    locator: Option<Range<usize>>,
}

/// Keywords that look like calls but never name a step.
const CONTROL_WORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "typeof", "await",
];

struct Phrase {
    keyword: StepKeyword,
    text: String,
    params: Vec<(usize, StepParam)>,
    wait: bool,
}

impl Phrase {
    fn new(keyword: StepKeyword, text: impl Into<String>) -> Self {
        Self {
            keyword,
            text: text.into(),
            params: Vec::new(),
            wait: false,
        }
    }
}

pub fn build_feature(script: &Script, stem: &str, options: &ScenarioOptions) -> ScenarioSet {
    let mut builder = Builder {
        script,
        options,
        feature_name: None,
        background: Vec::new(),
        scenarios: Vec::new(),
        warnings: Vec::new(),
        preamble: Vec::new(),
    };
    builder.walk(0..script.len(), &[], true, false);

    let mut feature = Feature {
        name: builder.feature_name.take().unwrap_or_else(|| humanize(stem)),
        tag: normalize_tag(&options.feature_tag),
        description: Some(format!("Migrated from {}", script.name())),
        background: builder.background,
        scenarios: builder.scenarios,
    };
    let definitions = register_definitions(&mut feature);
    let common_js = (0..script.len()).any(|i| script.is(i, "require") && script.is(i + 1, "("));

    tracing::debug!(
        "🥒 {}: {} scenarios, {} step definitions",
        script.name(),
        feature.scenarios.len(),
        definitions.len()
    );

    ScenarioSet {
        feature,
        definitions,
        warnings: builder.warnings,
        preamble: builder.preamble,
        common_js,
    }
}

/// `@migrated` for both `migrated` and `@migrated`.
pub fn normalize_tag(tag: &str) -> String {
    let tag = tag.trim();
    if tag.starts_with('@') {
        tag.to_string()
    } else {
        format!("@{}", tag)
    }
}

/// `checkout_flow` becomes `Checkout flow`.
pub fn humanize(stem: &str) -> String {
    let words = split_words(stem);
    if words.is_empty() {
        return stem.to_string();
    }
    capitalize(&words.join(" "))
}

fn register_definitions(feature: &mut Feature) -> Vec<StepDefinition> {
    let mut definitions: Vec<StepDefinition> = Vec::new();
    let mut variants: HashMap<String, Vec<usize>> = HashMap::new();

    let steps = feature
        .background
        .iter_mut()
        .chain(feature.scenarios.iter_mut().flat_map(|s| s.steps.iter_mut()));
    for step in steps {
        let known = variants.entry(step.text.clone()).or_default();
        if let Some(&idx) = known.iter().find(|&&idx| definitions[idx].body == step.body) {
            step.text = definitions[idx].text.clone();
            continue;
        }
        // parentheses would read as optional text in a cucumber expression
        let text = if known.is_empty() {
            step.text.clone()
        } else {
            format!("{}, variant {}", step.text, known.len() + 1)
        };
        known.push(definitions.len());
        step.text = text.clone();
        definitions.push(StepDefinition {
            keyword: step.keyword,
            text,
            params: step.params.iter().map(|p| p.name.clone()).collect(),
            body: step.body.clone(),
        });
    }
    definitions
}

struct Builder<'a> {
    script: &'a Script,
    options: &'a ScenarioOptions,
    feature_name: Option<String>,
    background: Vec<Step>,
    scenarios: Vec<Scenario>,
    warnings: Vec<(usize, String)>,
    preamble: Vec<String>,
}

impl<'a> Builder<'a> {
    fn walk(&mut self, range: Range<usize>, prefix: &[String], module_level: bool, skipped: bool) {
        let s = self.script;
        for st in s.statements(range) {
            let Some(call) = self.test_call(st.start) else {
                if module_level {
                    self.keep_module_statement(&st);
                }
                continue;
            };
            let skip = skipped || call.skip;
            match call.form {
                BlockForm::Describe => {
                    let title = call.title.unwrap_or_default();
                    let body = call.callback.body_range();
                    if module_level && self.feature_name.is_none() {
                        self.feature_name = Some(title);
                        self.walk(body, prefix, false, skip);
                    } else {
                        let mut nested = prefix.to_vec();
                        nested.push(title);
                        self.walk(body, &nested, false, skip);
                    }
                }
                BlockForm::Test => {
                    let title = call
                        .title
                        .unwrap_or_else(|| format!("scenario {}", self.scenarios.len() + 1));
                    let name = if prefix.is_empty() {
                        title
                    } else {
                        format!("{} - {}", prefix.join(" - "), title)
                    };
                    let steps = self.body_steps(&call.callback);
                    self.scenarios.push(Scenario {
                        name,
                        tags: if skip { vec!["@skip".to_string()] } else { Vec::new() },
                        steps,
                    });
                }
                BlockForm::BeforeEach => {
                    let steps = self.body_steps(&call.callback);
                    self.background.extend(steps);
                }
                BlockForm::Unmapped(hook) => self.warnings.push((
                    call.line,
                    format!("`{}` has no scenario form; its code is left out of the steps", hook),
                )),
            }
        }
    }

    fn keep_module_statement(&mut self, st: &Range<usize>) {
        let s = self.script;
        if s.gap_before(st.start).contains("// MIGRATE:") {
            self.warnings.push((
                s.line(st.start),
                "statement outside the tests needs manual migration; left out of the steps file"
                    .to_string(),
            ));
            return;
        }
        let text = s.range_text(st.clone());
        if !text.contains("@playwright/test") {
            self.preamble.push(text.to_string());
        }
    }

    /// `test(...)`, `test.skip(...)`, `test.describe(...)` and hooks.
    fn test_call(&self, idx: usize) -> Option<TestCall> {
        let s = self.script;
        if !s.is(idx, "test") || s.is_member_position(idx) {
            return None;
        }
        let mut pos = idx + 1;
        let mut names = Vec::new();
        while s.is(pos, ".") && s.is_ident(pos + 1) {
            names.push(s.text(pos + 1));
            pos += 2;
        }
        if !s.is(pos, "(") {
            return None;
        }
        let skip = names.iter().any(|n| matches!(*n, "skip" | "fixme"));
        let form = match names
            .iter()
            .copied()
            .find(|n| !matches!(*n, "skip" | "only" | "fixme"))
        {
            None => BlockForm::Test,
            Some("describe") => BlockForm::Describe,
            Some("beforeEach") => BlockForm::BeforeEach,
            Some(hook @ ("afterEach" | "beforeAll" | "afterAll")) => {
                BlockForm::Unmapped(format!("test.{}", hook))
            }
            Some(_) => return None,
        };
        let close = s.matching(pos)?;
        let args = s.split_args(pos, close);
        let last = args.last()?;
        let callback = s.function_at(last.start).filter(|f| f.end == last.end)?;
        let title = if args.len() >= 2 {
            s.string_value(&args[0])
        } else {
            None
        };
        Some(TestCall {
            form,
            title,
            skip,
            callback,
            line: s.line(idx),
        })
    }

    fn body_steps(&mut self, function: &Function) -> Vec<Step> {
        let s = self.script;
        let statements = match &function.body {
            FnBody::Block { .. } => s.statements(function.body_range()),
            FnBody::Expr(range) => vec![range.clone()],
        };

        let mut bindings: HashMap<String, String> = HashMap::new();
        let mut declarations: Vec<Declaration> = Vec::new();
        let mut steps: Vec<Step> = Vec::new();

        for (i, st) in statements.iter().enumerate() {
            if let Some(decl) = self.declaration(st) {
                if let Some(locator) = &decl.locator {
                    let text = self.render(locator.clone(), &bindings, &HashMap::new());
                    bindings.insert(decl.names[0].clone(), text);
                    continue;
                }
                let used_later = statements[i + 1..].iter().any(|later| {
                    let refs = self.references(later.clone());
                    decl.names.iter().any(|n| refs.contains(n.as_str()))
                });
                if used_later {
                    declarations.push(decl);
                    continue;
                }
            }

            let (step, wait) = self.statement_step(st, &bindings, &declarations);
            match steps.last_mut() {
                Some(previous) if wait => {
                    previous.body.push('\n');
                    previous
                        .body
                        .push_str(&self.render(st.clone(), &bindings, &HashMap::new()));
                }
                _ => steps.push(step),
            }
        }
        steps
    }

    fn declaration(&self, st: &Range<usize>) -> Option<Declaration> {
        let s = self.script;
        let mut start = st.start;
        if s.is(start, "async") && s.is(start + 1, "function") {
            start += 1;
        }
        if s.is(start, "function") && s.is_ident(start + 1) {
            return Some(Declaration {
                names: vec![s.text(start + 1).to_string()],
                range: st.clone(),
                locator: None,
            });
        }
        if !matches!(s.text(st.start), "var" | "let" | "const") {
            return None;
        }
        let end = if s.is(st.end - 1, ";") { st.end - 1 } else { st.end };
        let declarators = self.split_top_level(st.start + 1..end, ",");

        let mut names = Vec::new();
        let mut single_init = None;
        for declarator in &declarators {
            let eq = self.find_top_level(declarator.clone(), "=");
            let pattern = declarator.start..eq.unwrap_or(declarator.end);
            for idx in pattern.clone() {
                if s.is_ident(idx) && !s.is_member_position(idx) && !s.is(idx + 1, ":") {
                    names.push(s.text(idx).to_string());
                }
            }
            if declarators.len() == 1 && pattern.len() == 1 {
                single_init = eq.map(|eq| eq + 1..declarator.end);
            }
        }
        let locator = single_init.filter(|init| self.is_locator_expr(init.clone()));
        Some(Declaration {
            names,
            range: st.clone(),
            locator,
        })
    }

    /// `page.locator(...)` with optional refinements and nothing awaited.
    fn is_locator_expr(&self, range: Range<usize>) -> bool {
        let s = self.script;
        if !s.is(range.start, &self.options.page_object)
            || !s.is(range.start + 1, ".")
            || !s.is(range.start + 2, "locator")
        {
            return false;
        }
        let Some(chain) = s.parse_chain(range.start) else {
            return false;
        };
        chain.end == range.end && !range.clone().any(|idx| s.is(idx, "await"))
    }

    fn split_top_level(&self, range: Range<usize>, separator: &str) -> Vec<Range<usize>> {
        let s = self.script;
        let mut parts = Vec::new();
        let mut start = range.start;
        let mut pos = range.start;
        while pos < range.end {
            if s.is(pos, separator) {
                parts.push(start..pos);
                start = pos + 1;
                pos += 1;
            } else if let Some(close) = s.matching(pos).filter(|close| *close > pos) {
                pos = close + 1;
            } else {
                pos += 1;
            }
        }
        if start < range.end {
            parts.push(start..range.end);
        }
        parts
    }

    fn find_top_level(&self, range: Range<usize>, text: &str) -> Option<usize> {
        let s = self.script;
        let mut pos = range.start;
        while pos < range.end {
            if s.is(pos, text) {
                return Some(pos);
            }
            pos = match s.matching(pos).filter(|close| *close > pos) {
                Some(close) => close + 1,
                None => pos + 1,
            };
        }
        None
    }

    /// Free identifier references in `range`.
    fn references(&self, range: Range<usize>) -> HashSet<&'a str> {
        let s = self.script;
        range
            .filter(|idx| s.is_ident(*idx) && !s.is_member_position(*idx) && !s.is_object_key(*idx))
            .map(|idx| s.text(idx))
            .collect()
    }

    /// Source of `range` with bindings inlined and lifted literals replaced
    /// by parameter names, dedented to the statement's indentation.
    fn render(
        &self,
        range: Range<usize>,
        bindings: &HashMap<String, String>,
        params: &HashMap<usize, String>,
    ) -> String {
        let s = self.script;
        let mut out = String::new();
        for idx in range.clone() {
            if idx > range.start {
                out.push_str(s.gap_before(idx));
            }
            if let Some(name) = params.get(&idx) {
                out.push_str(name);
                continue;
            }
            let text = s.text(idx);
            let is_reference =
                s.is_ident(idx) && !s.is_member_position(idx) && !s.is_object_key(idx);
            match bindings.get(text) {
                Some(locator) if is_reference => out.push_str(locator),
                _ => out.push_str(text),
            }
        }
        dedent(&out, s.line_indent(range.start))
    }

    fn statement_step(
        &self,
        st: &Range<usize>,
        bindings: &HashMap<String, String>,
        declarations: &[Declaration],
    ) -> (Step, bool) {
        let s = self.script;
        let mut core = st.clone();
        if core.end > core.start + 1 && s.is(core.end - 1, ";") {
            core.end -= 1;
        }
        let start = if s.is(core.start, "await") {
            core.start + 1
        } else {
            core.start
        };
        let mut phrase = self.describe(start, core.end);

        // declarations this statement needs, transitively
        let mut refs = self.references(st.clone());
        let mut needed = vec![false; declarations.len()];
        let mut changed = true;
        while changed {
            changed = false;
            for (i, decl) in declarations.iter().enumerate() {
                if !needed[i] && decl.names.iter().any(|n| refs.contains(n.as_str())) {
                    needed[i] = true;
                    refs.extend(self.references(decl.range.clone()));
                    changed = true;
                }
            }
        }

        let mut taken: HashSet<String> = refs.iter().map(|r| r.to_string()).collect();
        for decl in declarations.iter().zip(&needed).filter(|(_, n)| **n).map(|(d, _)| d) {
            taken.extend(decl.names.iter().cloned());
        }
        for (_, param) in phrase.params.iter_mut() {
            let base = param.name.clone();
            let mut n = 2;
            while taken.contains(&param.name) {
                param.name = format!("{}{}", base, n);
                n += 1;
            }
            taken.insert(param.name.clone());
        }

        let mut body = Vec::new();
        for (decl, _) in declarations.iter().zip(&needed).filter(|(_, n)| **n) {
            body.push(self.render(decl.range.clone(), bindings, &HashMap::new()));
        }
        let replacements: HashMap<usize, String> = phrase
            .params
            .iter()
            .map(|(idx, param)| (*idx, param.name.clone()))
            .collect();
        body.push(self.render(st.clone(), bindings, &replacements));

        let step = Step {
            keyword: phrase.keyword,
            text: phrase.text,
            params: phrase.params.into_iter().map(|(_, p)| p).collect(),
            body: body.join("\n"),
            line: s.line(st.start),
        };
        (step, phrase.wait)
    }

    fn describe(&self, start: usize, end: usize) -> Phrase {
        let s = self.script;
        if s.is(start, "expect") {
            return self
                .assertion_phrase(start, end)
                .or_else(|| self.matcher_phrase(start, end))
                .unwrap_or_else(|| Phrase::new(StepKeyword::Then, "the check passes"));
        }
        if let Some(chain) = s.parse_chain(start).filter(|c| c.end == end) {
            if s.is(start, &self.options.page_object) {
                if let Some(phrase) = self.page_phrase(&chain) {
                    return phrase;
                }
            }
            if let Some(phrase) = self.action_phrase(&chain) {
                return phrase;
            }
            if let Some(phrase) = self.call_phrase(&chain) {
                return phrase;
            }
        }
        self.fallback_phrase(start, end)
    }

    /// Declared names or the calls a statement makes, for statements no
    /// pattern above describes.
    fn fallback_phrase(&self, start: usize, end: usize) -> Phrase {
        let s = self.script;
        if matches!(s.text(start), "var" | "let" | "const") {
            let names: Vec<String> = (start + 1..end)
                .take_while(|idx| !s.is(*idx, "="))
                .filter(|idx| s.is_ident(*idx))
                .flat_map(|idx| split_words(s.text(idx)))
                .collect();
            if !names.is_empty() {
                return Phrase::new(StepKeyword::When, format!("I set the {}", names.join(" ")));
            }
        }
        let mut calls: Vec<String> = Vec::new();
        for idx in start..end {
            if !s.is_ident(idx) || !s.is(idx + 1, "(") || CONTROL_WORDS.contains(&s.text(idx)) {
                continue;
            }
            let call = split_words(s.text(idx)).join(" ");
            if !call.is_empty() && !calls.contains(&call) {
                calls.push(call);
            }
        }
        calls.truncate(3);
        if calls.is_empty() {
            return Phrase::new(StepKeyword::When, "I run the migrated code");
        }
        Phrase::new(StepKeyword::When, format!("I {}", calls.join(" and ")))
    }

    /// `expect(x).toMatch(...)` and other matchers without a dedicated phrase.
    fn matcher_phrase(&self, start: usize, end: usize) -> Option<Phrase> {
        let s = self.script;
        let chain = s.parse_chain(start).filter(|c| c.end == end)?;
        let Some(Segment::Call { args, .. }) = chain.segments.first() else {
            return None;
        };
        let negated = chain
            .segments
            .iter()
            .any(|seg| matches!(seg, Segment::Member { name } if s.is(*name, "not")));
        let matcher = chain.segments.iter().rev().find_map(|seg| match seg {
            Segment::Member { name } if !s.is(*name, "not") => Some(s.text(*name)),
            _ => None,
        })?;
        let mut words = split_words(matcher);
        if words.first().map(String::as_str) == Some("to") {
            words.remove(0);
        }
        if words.is_empty() {
            return None;
        }
        let (subject, _) = self.subject(args.first()?);
        let not = if negated { "not " } else { "" };
        Some(Phrase::new(
            StepKeyword::Then,
            format!("{} should {}{}", subject, not, words.join(" ")),
        ))
    }

    /// `{string}`-style placeholder for a literal argument, or words for anything else.
    fn lift(&self, range: &Range<usize>, name: &str) -> Option<(usize, StepParam)> {
        let s = self.script;
        if range.end != range.start + 1 {
            return None;
        }
        let idx = range.start;
        let text = s.text(idx);
        let (kind, value) = match s.kind(idx)? {
            TokenKind::Str => {
                let value = unquote(text);
                if value.contains('"') && value.contains('\'') {
                    return None;
                }
                (ParamKind::String, value)
            }
            TokenKind::Number if text.chars().all(|c| c.is_ascii_digit()) => {
                (ParamKind::Int, text.to_string())
            }
            TokenKind::Number if text.parse::<f64>().is_ok() => (ParamKind::Float, text.to_string()),
            _ => return None,
        };
        Some((
            idx,
            StepParam {
                name: name.to_string(),
                kind,
                value,
            },
        ))
    }

    /// Adds a placeholder for `range` to the phrase, or falls back to words.
    fn argument(&self, phrase: &mut Phrase, range: &Range<usize>, name: &str) -> String {
        match self.lift(range, name) {
            Some((idx, param)) => {
                let placeholder = param.kind.placeholder().to_string();
                phrase.params.push((idx, param));
                placeholder
            }
            None => format!("the {}", self.words(range.clone())),
        }
    }

    fn words(&self, range: Range<usize>) -> String {
        let s = self.script;
        let words: Vec<String> = range
            .filter(|idx| s.is_ident(*idx) && !matches!(s.text(*idx), "await" | "new"))
            .filter(|idx| !s.is(*idx, &self.options.page_object))
            .flat_map(|idx| split_words(s.text(idx)))
            .collect();
        if words.is_empty() {
            "given value".to_string()
        } else {
            words.join(" ")
        }
    }

    fn page_phrase(&self, chain: &Chain) -> Option<Phrase> {
        let s = self.script;
        let [Segment::Member { name }, Segment::Call { args, .. }] = chain.segments.as_slice() else {
            return None;
        };
        let phrase = match (s.text(*name), args.as_slice()) {
            ("goto", [url]) => {
                let mut phrase = Phrase::new(StepKeyword::Given, "");
                match self.lift(url, "url") {
                    Some((idx, mut param)) => {
                        if let Some(base) = self.options.base_url.as_deref() {
                            if let Some(rest) = param.value.strip_prefix(base.trim_end_matches('/')) {
                                param.value = if rest.starts_with('/') {
                                    rest.to_string()
                                } else {
                                    format!("/{}", rest)
                                };
                            }
                        }
                        phrase.text = "I open {string}".to_string();
                        phrase.params.push((idx, param));
                    }
                    None => phrase.text = format!("I open the {}", self.words(url.clone())),
                }
                phrase
            }
            ("waitForLoadState", [state]) => {
                let text = match s.string_value(state).as_deref() {
                    Some("load") => "the page has fully loaded",
                    Some("networkidle") => "the page is idle",
                    _ => "the page has loaded",
                };
                Phrase::new(StepKeyword::Given, text)
            }
            ("reload", []) => Phrase::new(StepKeyword::When, "I reload the page"),
            ("goBack", []) => Phrase::new(StepKeyword::When, "I go back"),
            ("goForward", []) => Phrase::new(StepKeyword::When, "I go forward"),
            ("waitForTimeout", [delay]) => {
                let mut phrase = Phrase::new(StepKeyword::When, "");
                let amount = self.argument(&mut phrase, delay, "ms");
                phrase.text = format!("I wait {} milliseconds", amount);
                phrase.wait = true;
                phrase
            }
            _ => return None,
        };
        Some(phrase)
    }

    /// Words for the element a chain targets, up to segment `action`.
    fn target(&self, chain: &Chain, action: usize, methods: &[&str], with_noun: bool) -> Option<String> {
        let s = self.script;
        let root = s.text(chain.root);
        let (mut words, mut seg) = if root == self.options.page_object {
            match (chain.segments.first(), chain.segments.get(1)) {
                (Some(Segment::Member { name }), Some(Segment::Call { args, .. }))
                    if s.is(*name, "locator") && args.len() == 1 =>
                {
                    let words = match s.string_value(&args[0]) {
                        Some(selector) if with_noun => element_words(&selector, false, methods),
                        Some(selector) => selector_words(&selector),
                        None => Vec::new(),
                    };
                    (words, 2)
                }
                _ => return None,
            }
        } else if s.is_ident(chain.root) {
            (split_words(root), 0)
        } else {
            return None;
        };

        let mut ordinal = None;
        while seg < action {
            let (Some(Segment::Member { name }), Some(Segment::Call { args, .. })) =
                (chain.segments.get(seg), chain.segments.get(seg + 1))
            else {
                return None;
            };
            ordinal = Some(match (s.text(*name), args.as_slice()) {
                ("first", []) => "first".to_string(),
                ("last", []) => "last".to_string(),
                ("nth", [index]) => ordinal_word(s.range_text(index.clone())),
                _ => return None,
            });
            seg += 2;
        }

        if words.is_empty() {
            words.push("element".to_string());
        }
        if let Some(ordinal) = ordinal {
            if let Some(last) = words.last_mut() {
                if last == "items" {
                    *last = "item".to_string();
                }
            }
            words.insert(0, ordinal);
        }
        Some(words.join(" "))
    }

    fn action_phrase(&self, chain: &Chain) -> Option<Phrase> {
        let s = self.script;
        let n = chain.segments.len();
        if n < 2 {
            return None;
        }
        let (Segment::Member { name }, Segment::Call { args, .. }) =
            (&chain.segments[n - 2], &chain.segments[n - 1])
        else {
            return None;
        };
        let method = s.text(*name);
        let target = self.target(chain, n - 2, &[method], true)?;

        let mut phrase = Phrase::new(StepKeyword::When, "");
        let text = match (method, args.as_slice()) {
            ("click", _) => format!("I click the {}", target),
            ("dblclick", _) => format!("I double-click the {}", target),
            ("fill", [value]) => {
                let value = self.argument(&mut phrase, value, "value");
                format!("I fill the {} with {}", target, value)
            }
            ("check", _) => format!("I check the {}", target),
            ("uncheck", _) => format!("I uncheck the {}", target),
            ("hover", _) => format!("I hover over the {}", target),
            ("focus", _) => format!("I focus the {}", target),
            ("blur", _) => format!("I move focus away from the {}", target),
            ("dispatchEvent", [event]) => {
                let event = self.argument(&mut phrase, event, "event");
                format!("I trigger {} on the {}", event, target)
            }
            ("press", [key]) => {
                let key = self.argument(&mut phrase, key, "key");
                format!("I press {} in the {}", key, target)
            }
            ("scrollIntoViewIfNeeded", _) => format!("I scroll to the {}", target),
            ("textContent" | "innerText" | "inputValue" | "innerHTML" | "getAttribute", _) => {
                format!("I read the {}", target)
            }
            _ => return None,
        };
        phrase.text = text;
        Some(phrase)
    }

    /// `helper(args)` and `obj.helper(args)` become `I helper with {string}`.
    fn call_phrase(&self, chain: &Chain) -> Option<Phrase> {
        let s = self.script;
        let (name, args) = match chain.segments.as_slice() {
            [Segment::Call { args, .. }] => (s.text(chain.root), args),
            [Segment::Member { name }, Segment::Call { args, .. }] => (s.text(*name), args),
            _ => return None,
        };
        let words = split_words(name);
        if words.is_empty() {
            return None;
        }
        let mut phrase = Phrase::new(StepKeyword::When, "");
        let mut placeholders = Vec::new();
        for (i, arg) in args.iter().enumerate() {
            if let Some((idx, param)) = self.lift(arg, &format!("arg{}", i + 1)) {
                placeholders.push(param.kind.placeholder().to_string());
                phrase.params.push((idx, param));
            }
        }
        phrase.text = format!("I {}", words.join(" "));
        if !placeholders.is_empty() {
            phrase.text.push_str(" with ");
            phrase.text.push_str(&placeholders.join(" and "));
        }
        Some(phrase)
    }

    fn assertion_phrase(&self, start: usize, end: usize) -> Option<Phrase> {
        let s = self.script;
        let chain = s.parse_chain(start).filter(|c| c.end == end)?;
        let segments = chain.segments.as_slice();
        let Some(Segment::Call { args: subject, .. }) = segments.first() else {
            return None;
        };
        let mut i = 1;
        let mut negated = false;
        if matches!(segments.get(i), Some(Segment::Member { name }) if s.is(*name, "not")) {
            negated = true;
            i += 1;
        }
        let (Some(Segment::Member { name }), Some(Segment::Call { args, .. })) =
            (segments.get(i), segments.get(i + 1))
        else {
            return None;
        };
        if i + 2 != segments.len() {
            return None;
        }
        let matcher = s.text(*name);
        let (subject, state) = self.subject(subject.first()?);
        let expected = args.first();
        let literal_bool = expected.map(|e| s.range_text(e.clone()));

        let mut phrase = Phrase::new(StepKeyword::Then, "");
        let not = if negated { "not " } else { "" };
        let text = match (matcher, state, literal_bool) {
            ("toBeTruthy" | "toBeFalsy", Some(state), _) | ("toBe", Some(state), Some("true" | "false")) => {
                let positive = matcher == "toBeTruthy" || literal_bool == Some("true");
                let verb = if positive != negated { "should be" } else { "should not be" };
                format!("{} {} {}", subject, verb, state)
            }
            ("toBeTruthy", _, _) => format!("{} should {}be set", subject, not),
            ("toBeFalsy", _, _) => format!("{} should {}be empty", subject, not),
            ("toBe" | "toEqual" | "toContain", _, _) => {
                let verb = match matcher {
                    "toBe" => "be",
                    "toEqual" => "equal",
                    _ => "contain",
                };
                let value = self.argument(&mut phrase, expected?, "expected");
                format!("{} should {}{} {}", subject, not, verb, value)
            }
            _ => return None,
        };
        phrase.text = text;
        Some(phrase)
    }

    /// Phrase for an asserted value plus the state a boolean read checks.
    fn subject(&self, actual: &Range<usize>) -> (String, Option<&'static str>) {
        let s = self.script;
        let start = if s.is(actual.start, "await") {
            actual.start + 1
        } else {
            actual.start
        };
        if s.is(start, "new") && s.is(start + 1, "URL") {
            return ("the page path".to_string(), None);
        }
        let Some(chain) = s.parse_chain(start).filter(|c| c.end == actual.end) else {
            return ("the result".to_string(), None);
        };
        if chain.segments.is_empty() {
            return (format!("the {}", split_words(s.text(chain.root)).join(" ")), None);
        }
        let n = chain.segments.len();
        let (Segment::Member { name }, Segment::Call { args, .. }) =
            (&chain.segments[n.saturating_sub(2)], &chain.segments[n - 1])
        else {
            return ("the result".to_string(), None);
        };
        let read = s.text(*name);
        if s.is(chain.root, &self.options.page_object) && n == 2 {
            match read {
                "url" => return ("the page url".to_string(), None),
                "title" => return ("the page title".to_string(), None),
                _ => {}
            }
        }
        let Some(target) = self.target(&chain, n - 2, &[read], false) else {
            return ("the result".to_string(), None);
        };
        match read {
            "textContent" | "innerText" => (format!("the {} text", target), None),
            "inputValue" => (format!("the {} value", target), None),
            "innerHTML" => (format!("the {} html", target), None),
            "count" => (format!("the {} count", target), None),
            "getAttribute" => {
                let attribute = args
                    .first()
                    .and_then(|a| s.string_value(a))
                    .map(|a| split_words(&a).join(" "))
                    .unwrap_or_else(|| "attribute".to_string());
                (format!("the {} {}", target, attribute), None)
            }
            "isVisible" => (format!("the {}", target), Some("visible")),
            "isHidden" => (format!("the {}", target), Some("hidden")),
            "isChecked" => (format!("the {}", target), Some("checked")),
            "isDisabled" => (format!("the {}", target), Some("disabled")),
            "isEnabled" => (format!("the {}", target), Some("enabled")),
            _ => ("the result".to_string(), None),
        }
    }
}

fn ordinal_word(index: &str) -> String {
    const ORDINALS: [&str; 5] = ["first", "second", "third", "fourth", "fifth"];
    match index.parse::<usize>() {
        Ok(n) if n < ORDINALS.len() => ORDINALS[n].to_string(),
        Ok(n) => format!("number {}", n + 1),
        Err(_) => "matching".to_string(),
    }
}

/// Strips `indent` from every line after the first.
fn dedent(text: &str, indent: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(i, line)| {
            if i == 0 {
                line
            } else {
                line.strip_prefix(indent).unwrap_or(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
