//! Idiom rewrite engine.
//!
//! A recursive emitter walks token ranges and copies the trivia between
//! tokens verbatim, so anything that is not a recognized idiom comes out
//! byte-identical. Functions are tracked as frames: a frame that emitted an
//! `await` turns its function `async`, and named functions made async are
//! awaited at their call sites on the next pass.

pub mod mappings;

use crate::analysis::idioms::{
    ActionArg, Callback, ElementAction, Idiom, IdiomKind, LocatorOrigin, LocatorUse, NavAction,
    Refinement,
};
use crate::analysis::lexer::TokenKind;
use crate::analysis::syntax::{quote, unquote, FnBody, Function, Script};
use crate::analysis::Analysis;
use crate::utils::error::{MigrateError, Result};
use mappings::BlockKind;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

const MAX_ASYNC_PASSES: usize = 8;

/// jQuery-only selector extensions Playwright's CSS engine rejects.
const JQUERY_PSEUDOS: &[&str] = &[
    ":eq(", ":gt(", ":lt(", ":first", ":last", ":even", ":odd", ":contains(", ":input",
    ":button", ":submit", ":hidden",
];

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub page_object: String,
    /// Title of the test wrapped around scripts without test blocks
    pub test_name: String,
    pub drop_modules: Vec<String>,
    pub annotate_unsupported: bool,
}

impl Default for RewriteOptions {
    fn default() -> Self {
        Self {
            page_object: "page".to_string(),
            test_name: "migrated script".to_string(),
            drop_modules: ["jquery", "chai", "assert", "node:assert", "assert/strict"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            annotate_unsupported: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteStatus {
    Rewritten,
    Unsupported,
    Warning,
    Dropped,
}

impl NoteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rewritten => "rewritten",
            Self::Unsupported => "unsupported",
            Self::Warning => "warning",
            Self::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RewriteNote {
    pub line: usize,
    pub family: &'static str,
    pub original: String,
    pub replacement: String,
    pub status: NoteStatus,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Rewrite {
    pub code: String,
    pub notes: Vec<RewriteNote>,
    /// Named functions that became `async`
    pub async_functions: Vec<String>,
}

impl Rewrite {
    pub fn count(&self, status: NoteStatus) -> usize {
        self.notes.iter().filter(|n| n.status == status).count()
    }
}

pub fn rewrite(script: &Script, analysis: &Analysis, options: &RewriteOptions) -> Result<Rewrite> {
    let mut async_fns: HashSet<String> = HashSet::new();
    for pass in 1..=MAX_ASYNC_PASSES {
        let (code, made_async, notes) = {
            let mut emitter = Emitter::new(script, analysis, options, &async_fns);
            let code = emitter.run();
            (code, emitter.made_async, emitter.notes)
        };
        if made_async.is_subset(&async_fns) {
            tracing::debug!(
                "🔁 {}: rewrite settled after {} pass(es)",
                script.name(),
                pass
            );
            let mut async_functions: Vec<String> = async_fns.into_iter().collect();
            async_functions.sort();
            return Ok(Rewrite {
                code,
                notes,
                async_functions,
            });
        }
        async_fns.extend(made_async);
    }
    Err(MigrateError::ProcessingError {
        message: format!(
            "async propagation in {} did not settle after {} passes",
            script.name(),
            MAX_ASYNC_PASSES
        ),
    })
}

#[derive(Debug, Default)]
struct Frame {
    label: String,
    line: usize,
    awaited: bool,
    page_scope: bool,
    uses_page: bool,
    /// page use stops here instead of bubbling to the parent
    boundary: bool,
}

struct Emitter<'a> {
    script: &'a Script,
    idioms: HashMap<usize, &'a Idiom>,
    options: &'a RewriteOptions,
    async_fns: &'a HashSet<String>,
    made_async: HashSet<String>,
    frames: Vec<Frame>,
    notes: Vec<RewriteNote>,
    /// an `await` or page use landed outside every function frame
    outside: bool,
    /// parameter of the enclosing test callback that Playwright does not pass
    done_param: Option<String>,
}

impl<'a> Emitter<'a> {
    fn new(
        script: &'a Script,
        analysis: &'a Analysis,
        options: &'a RewriteOptions,
        async_fns: &'a HashSet<String>,
    ) -> Self {
        Self {
            script,
            idioms: analysis
                .idioms
                .iter()
                .map(|idiom| (idiom.tokens.start, idiom))
                .collect(),
            options,
            async_fns,
            made_async: HashSet::new(),
            frames: Vec::new(),
            notes: Vec::new(),
            outside: false,
            done_param: None,
        }
    }

    fn run(&mut self) -> String {
        let s = self.script;
        let statements = s.statements(0..s.len());
        let has_tests = statements.iter().any(|st| self.is_test_statement(st.start));
        let uses_import = statements.iter().any(|st| s.is(st.start, "import"));
        let uses_require = (0..s.len()).any(|i| s.is(i, "require") && s.is(i + 1, "("));
        let has_playwright = s.source().contains("@playwright/test");

        let mut head = String::new();
        if !has_playwright {
            head.push_str(mappings::playwright_import(uses_require && !uses_import));
            head.push_str("\n\n");
        }

        let code = if has_tests {
            head + &self.emit_module(&statements)
        } else {
            head + &self.emit_wrapped(&statements)
        };
        if code.ends_with('\n') {
            code
        } else {
            code + "\n"
        }
    }

    fn emit_module(&mut self, statements: &[Range<usize>]) -> String {
        let s = self.script;
        let mut body = String::new();
        for st in statements {
            let gap = s.gap_before(st.start);
            if self.drop_statement(st) {
                body.push_str(gap.trim_end());
                continue;
            }
            if body.trim().is_empty() {
                body.push_str(gap.trim_start());
            } else {
                body.push_str(gap);
            }
            let text = self.emit_outside_test(st.clone());
            body.push_str(&text);
        }
        body.push_str(s.gap_before(s.len()));
        body
    }

    /// Emits a statement that runs outside any test. When it would need the
    /// page or an `await` there, it is copied unchanged and flagged.
    fn emit_outside_test(&mut self, st: Range<usize>) -> String {
        let s = self.script;
        let notes = self.notes.len();
        let made_async = self.made_async.clone();
        let outer = std::mem::replace(&mut self.outside, false);
        let text = self.emit_range(st.clone());
        if !std::mem::replace(&mut self.outside, outer) {
            return text;
        }

        self.notes.truncate(notes);
        self.made_async = made_async;
        let original = s.range_text(st.clone());
        let reason = format!(
            "code outside a test needs `{}`; move it into a test or a test.beforeEach hook",
            self.options.page_object
        );
        self.notes.push(RewriteNote {
            line: s.line(st.start),
            family: "structure",
            original: original.to_string(),
            replacement: String::new(),
            status: NoteStatus::Unsupported,
            message: reason.clone(),
        });
        if self.options.annotate_unsupported {
            format!("// MIGRATE: {}\n{}{}", reason, s.line_indent(st.start), original)
        } else {
            original.to_string()
        }
    }

    /// Body of a `describe` callback, statement by statement.
    fn emit_suite_block(&mut self, open: usize, close: usize) -> String {
        let s = self.script;
        let mut out = String::from("{");
        for st in s.statements(open + 1..close) {
            out.push_str(s.gap_before(st.start));
            let text = self.emit_outside_test(st);
            out.push_str(&text);
        }
        out.push_str(s.gap_before(close));
        out.push('}');
        out
    }

    /// Wraps a script without test blocks in a single test; imports stay outside.
    fn emit_wrapped(&mut self, statements: &[Range<usize>]) -> String {
        let s = self.script;
        let mut hoisted = String::new();
        let mut inner = String::new();

        self.frames.push(Frame {
            label: "test".to_string(),
            line: 1,
            page_scope: true,
            boundary: true,
            ..Frame::default()
        });
        for st in statements {
            let gap = s.gap_before(st.start);
            if self.drop_statement(st) {
                continue;
            }
            if self.is_hoisted(st) {
                let outer = std::mem::take(&mut self.frames);
                let text = self.emit_range(st.clone());
                self.frames = outer;
                hoisted.push_str(if hoisted.is_empty() { gap.trim_start() } else { gap });
                hoisted.push_str(&text);
                continue;
            }
            let text = self.emit_range(st.clone());
            inner.push_str(if inner.is_empty() { gap.trim_start() } else { gap });
            inner.push_str(&text);
        }
        self.pop_frame();

        let mut out = String::new();
        if !hoisted.is_empty() {
            out.push_str(hoisted.trim_end());
            out.push_str("\n\n");
        }
        out.push_str(&format!(
            "test({}, async ({}) => {{\n",
            quote(&self.options.test_name),
            self.fixture_param()
        ));
        out.push_str(&indent_lines(inner.trim_end(), "  "));
        out.push_str("\n});\n");
        out
    }

    fn fixture_param(&self) -> String {
        if self.options.page_object == "page" {
            "{ page }".to_string()
        } else {
            format!("{{ page: {} }}", self.options.page_object)
        }
    }

    fn is_test_statement(&self, idx: usize) -> bool {
        let s = self.script;
        let name = s.text(idx);
        let known = BlockKind::from_name(name).is_some() || name == "xdescribe";
        known && (s.is(idx + 1, "(") || s.is(idx + 1, "."))
    }

    fn is_hoisted(&self, st: &Range<usize>) -> bool {
        let s = self.script;
        if s.is(st.start, "import") {
            return true;
        }
        matches!(s.text(st.start), "var" | "let" | "const")
            && s.is(st.start + 2, "=")
            && s.is(st.start + 3, "require")
    }

    fn drop_statement(&mut self, st: &Range<usize>) -> bool {
        let Some(module) = self.dropped_module(st) else {
            return false;
        };
        let s = self.script;
        self.notes.push(RewriteNote {
            line: s.line(st.start),
            family: "import",
            original: s.range_text(st.clone()).to_string(),
            replacement: String::new(),
            status: NoteStatus::Dropped,
            message: format!("`{}` is not needed by the migrated test", module),
        });
        true
    }

    fn dropped_module(&self, st: &Range<usize>) -> Option<String> {
        let s = self.script;
        let is_import = s.is(st.start, "import");
        let is_decl = matches!(s.text(st.start), "var" | "let" | "const" | "require");
        if !is_import && !is_decl {
            return None;
        }
        st.clone().find_map(|idx| {
            if s.kind(idx) != Some(TokenKind::Str) {
                return None;
            }
            let via_require = idx >= 2 && s.is(idx - 1, "(") && s.is(idx - 2, "require");
            let module = unquote(s.text(idx));
            ((is_import || via_require) && self.options.drop_modules.contains(&module))
                .then_some(module)
        })
    }

    fn emit_range(&mut self, range: Range<usize>) -> String {
        let mut out = String::new();
        let mut pos = range.start;
        while pos < range.end {
            if pos > range.start {
                out.push_str(self.script.gap_before(pos));
            }
            pos = self.emit_at(pos, range.end, &mut out);
        }
        out
    }

    fn emit_at(&mut self, pos: usize, limit: usize, out: &mut String) -> usize {
        let s = self.script;
        if let Some(next) = self.try_test_block(pos, limit, out) {
            return next;
        }
        if let Some(next) = self.try_done_call(pos, limit, out) {
            return next;
        }
        if let Some(function) = s.function_at(pos).filter(|f| f.end <= limit) {
            let text = self.emit_function(&function);
            out.push_str(&text);
            return function.end;
        }
        if let Some(idiom) = self.idioms.get(&pos).copied() {
            if idiom.tokens.end <= limit {
                return self.emit_idiom(idiom, limit, out);
            }
        }
        if self.is_async_call(pos) {
            self.note_await();
            out.push_str("await ");
        }
        out.push_str(s.text(pos));
        pos + 1
    }

    fn is_async_call(&self, pos: usize) -> bool {
        let s = self.script;
        if !s.is_ident(pos)
            || s.is_member_position(pos)
            || !s.is(pos + 1, "(")
            || !self.async_fns.contains(s.text(pos))
        {
            return false;
        }
        if pos > 0 && matches!(s.text(pos - 1), "await" | "function" | "new") {
            return false;
        }
        let Some(close) = s.matching(pos + 1) else {
            return false;
        };
        !matches!(s.text(close + 1), "." | "?." | "[")
    }

    fn function_name(&self, function: &Function) -> Option<String> {
        let s = self.script;
        if s.is(function.head, "function") && s.is_ident(function.head + 1) {
            return Some(s.text(function.head + 1).to_string());
        }
        let start = function.start;
        if start >= 3
            && s.is(start - 1, "=")
            && s.is_ident(start - 2)
            && matches!(s.text(start - 3), "var" | "let" | "const")
        {
            return Some(s.text(start - 2).to_string());
        }
        None
    }

    fn emit_block(&mut self, open: usize, close: usize) -> String {
        let s = self.script;
        let mut out = String::from("{");
        if open + 1 < close {
            out.push_str(s.gap_before(open + 1));
            let inner = self.emit_range(open + 1..close);
            out.push_str(&inner);
        }
        out.push_str(s.gap_before(close));
        out.push('}');
        out
    }

    fn emit_body(&mut self, function: &Function) -> (usize, String) {
        match &function.body {
            FnBody::Block { open, close } => (*open, self.emit_block(*open, *close)),
            FnBody::Expr(range) => (range.start, self.emit_range(range.clone())),
        }
    }

    fn emit_function(&mut self, function: &Function) -> String {
        let s = self.script;
        let takes_page = s
            .param_names(function.params.clone())
            .iter()
            .any(|p| s.text(*p) == self.options.page_object);
        let parent_scope = self.frames.last().map(|f| f.page_scope).unwrap_or(false);
        let name = self.function_name(function);
        self.frames.push(Frame {
            label: match &name {
                Some(name) => format!("function `{}`", name),
                None => "callback".to_string(),
            },
            line: s.line(function.start),
            page_scope: parent_scope || takes_page,
            boundary: name.is_some() && self.frames.is_empty(),
            ..Frame::default()
        });
        let (body_start, body) = self.emit_body(function);
        let frame = self.pop_frame();

        let mut out = String::new();
        if frame.awaited && !function.is_async {
            out.push_str("async ");
            if let Some(name) = name {
                self.made_async.insert(name);
            }
        }
        out.push_str(s.range_text(function.start..body_start));
        out.push_str(s.gap_before(body_start));
        out.push_str(&body);
        out
    }

    fn pop_frame(&mut self) -> Frame {
        let frame = self.frames.pop().unwrap_or_default();
        if !frame.uses_page || frame.page_scope {
            return frame;
        }
        if !frame.boundary && !self.frames.is_empty() {
            if let Some(parent) = self.frames.last_mut() {
                parent.uses_page = true;
            }
        } else {
            let message = format!(
                "{} uses `{}` outside a test; pass it in as a parameter",
                frame.label, self.options.page_object
            );
            self.warn(frame.line, message);
        }
        frame
    }

    fn note_await(&mut self) {
        match self.frames.last_mut() {
            Some(frame) => frame.awaited = true,
            None => self.outside = true,
        }
    }

    fn note_page_use(&mut self) {
        match self.frames.last_mut() {
            Some(frame) => {
                if !frame.page_scope {
                    frame.uses_page = true;
                }
            }
            None => self.outside = true,
        }
    }

    fn warn(&mut self, line: usize, message: String) {
        self.notes.push(RewriteNote {
            line,
            family: "structure",
            original: String::new(),
            replacement: String::new(),
            status: NoteStatus::Warning,
            message,
        });
    }

    fn note(&mut self, idiom: &Idiom, replacement: &str, status: NoteStatus, message: String) {
        self.notes.push(RewriteNote {
            line: idiom.line,
            family: idiom.family().as_str(),
            original: self.script.range_text(idiom.tokens.clone()).to_string(),
            replacement: replacement.to_string(),
            status,
            message,
        });
    }

    /// `describe`/`it`/hooks become their Playwright counterparts.
    fn try_test_block(&mut self, pos: usize, limit: usize, out: &mut String) -> Option<usize> {
        let s = self.script;
        if !s.is_ident(pos) || s.is_member_position(pos) {
            return None;
        }
        let name = s.text(pos);
        let (kind, mut modifier) = match name {
            "xit" => (BlockKind::Test, Some("skip")),
            "xdescribe" => (BlockKind::Describe, Some("skip")),
            _ => (BlockKind::from_name(name)?, None),
        };
        let mut open = pos + 1;
        if s.is(pos + 1, ".") && matches!(s.text(pos + 2), "skip" | "only") && s.is(pos + 3, "(") {
            modifier = Some(if s.is(pos + 2, "skip") { "skip" } else { "only" });
            open = pos + 3;
        }
        if !s.is(open, "(") {
            return None;
        }
        let close = s.matching(open)?;
        if close >= limit {
            return None;
        }
        let args = s.split_args(open, close);
        let callback_arg = args
            .iter()
            .find(|arg| s.function_at(arg.start).is_some_and(|f| f.end == arg.end))?
            .clone();
        let callback = s.function_at(callback_arg.start)?;
        let titled = callback_arg.start > open + 1;
        if !titled && !matches!(kind, BlockKind::Hook { .. }) {
            return None;
        }
        let takes_page = s
            .param_names(callback.params.clone())
            .iter()
            .any(|p| s.text(*p) == "page");
        if takes_page {
            return None;
        }

        let mut text = kind.target().to_string();
        if let Some(modifier) = modifier {
            text.push('.');
            text.push_str(modifier);
        }
        text.push('(');
        if titled {
            text.push_str(s.gap_before(open + 1));
            let title = self.emit_range(open + 1..callback_arg.start);
            text.push_str(&title);
        }
        text.push_str(s.gap_before(callback_arg.start));
        let callback_text = self.emit_test_callback(kind, &callback);
        text.push_str(&callback_text);
        if callback.end < close {
            text.push_str(s.gap_before(callback.end));
            let rest = self.emit_range(callback.end..close);
            text.push_str(&rest);
        }
        text.push_str(s.gap_before(close));
        text.push(')');
        out.push_str(&text);
        Some(close + 1)
    }

    fn emit_test_callback(&mut self, kind: BlockKind, callback: &Function) -> String {
        let s = self.script;
        let line = s.line(callback.start);
        let params = s.param_names(callback.params.clone());
        if kind == BlockKind::Describe {
            // suite bodies run at collection time, outside every test
            let outer = std::mem::take(&mut self.frames);
            let (body_start, body) = match &callback.body {
                FnBody::Block { open, close } => (*open, self.emit_suite_block(*open, *close)),
                FnBody::Expr(range) => (range.start, self.emit_outside_test(range.clone())),
            };
            self.frames = outer;
            return format!(
                "{}{}{}",
                s.range_text(callback.start..body_start),
                s.gap_before(body_start),
                body
            );
        }
        let done = match params.as_slice() {
            [param] if !s.is(param.saturating_sub(1), "{") => Some(s.text(*param).to_string()),
            _ => None,
        };
        if let Some(param) = params.first() {
            self.warn(
                line,
                format!(
                    "callback parameter `{}` dropped; the test finishes when its promise resolves",
                    s.text(*param)
                ),
            );
        }
        if matches!(kind, BlockKind::Hook { each: false, .. }) {
            self.warn(
                line,
                format!("`{}` hook has no page fixture", kind.target()),
            );
        }

        self.frames.push(Frame {
            label: match kind {
                BlockKind::Hook { .. } => format!("`{}` hook", kind.target()),
                _ => "test".to_string(),
            },
            line,
            page_scope: kind.has_page(),
            boundary: true,
            ..Frame::default()
        });
        let outer_done = std::mem::replace(&mut self.done_param, done);
        let (_, body) = self.emit_body(callback);
        self.done_param = outer_done;
        self.pop_frame();

        let head = if kind.has_page() {
            format!("async ({}) => ", self.fixture_param())
        } else {
            "async () => ".to_string()
        };
        head + &body
    }

    /// `done()` finishing a statement is dropped and `done(err)` throws.
    fn try_done_call(&mut self, pos: usize, limit: usize, out: &mut String) -> Option<usize> {
        let s = self.script;
        let done = self.done_param.clone()?;
        if !s.is(pos, &done) || s.is_member_position(pos) || s.is_object_key(pos) {
            return None;
        }
        let line = s.line(pos);
        let call_end = s
            .is(pos + 1, "(")
            .then(|| s.matching(pos + 1))
            .flatten()
            .map(|close| close + 1)
            .filter(|end| *end <= limit && s.starts_statement(pos) && s.ends_statement(*end));
        let Some(end) = call_end else {
            self.notes.push(RewriteNote {
                line,
                family: "structure",
                original: done.clone(),
                replacement: String::new(),
                status: NoteStatus::Unsupported,
                message: format!("`{}` is used as a value; wait for the work with `await` instead", done),
            });
            out.push_str(&done);
            return Some(pos + 1);
        };

        let next = if s.is(end, ";") && end < limit { end + 1 } else { end };
        let original = s.range_text(pos..next).to_string();
        let args = s.split_args(pos + 1, end - 1);
        let (replacement, status) = match args.as_slice() {
            [] => (String::new(), NoteStatus::Dropped),
            [err] => {
                let value = self.emit_range(err.clone());
                let text = if err.end == err.start + 1 && s.is_ident(err.start) {
                    format!("if ({0}) throw {0};", value)
                } else {
                    format!("throw {};", value)
                };
                (text, NoteStatus::Rewritten)
            }
            _ => return None,
        };
        if replacement.is_empty() {
            // drop the blank line the call leaves behind
            let kept = out.trim_end_matches([' ', '\t']).len();
            out.truncate(kept);
            if out.ends_with('\n') {
                out.pop();
            }
        }
        out.push_str(&replacement);
        self.notes.push(RewriteNote {
            line,
            family: "structure",
            original,
            replacement,
            status,
            message: format!("`{}` callback replaced; the test finishes when its promise resolves", done),
        });
        Some(next)
    }

    fn emit_idiom(&mut self, idiom: &'a Idiom, limit: usize, out: &mut String) -> usize {
        let s = self.script;
        let start = idiom.tokens.start;
        let end = idiom.tokens.end;
        let in_source = start > 0 && s.is(start - 1, "await");
        let stmt_start = if in_source { start - 1 } else { start };
        let statement = s.starts_statement(stmt_start) && s.ends_statement(end);
        let page = self.options.page_object.clone();

        match &idiom.kind {
            IdiomKind::Locator(locator) => {
                self.emit_locator(idiom, locator, in_source, statement, limit, out)
            }
            IdiomKind::Timeout { callback, delay } => {
                if !statement || in_source {
                    return self.emit_unsupported(
                        idiom,
                        "timer handle is used as a value; rewrite by hand",
                        false,
                        out,
                    );
                }
                self.note_page_use();
                let delay = match delay {
                    Some(range) => self.emit_range(range.clone()),
                    None => "0".to_string(),
                };
                let wait = mappings::wait_for_timeout(&page, &delay);
                self.emit_inline(idiom, wait, callback, limit, out)
            }
            IdiomKind::PageReady { state, callback } => {
                if !statement || in_source {
                    return self.emit_unsupported(
                        idiom,
                        "page-ready handler is used as a value",
                        false,
                        out,
                    );
                }
                self.note_page_use();
                let wait = mappings::wait_for_load_state(&page, state);
                self.emit_inline(idiom, wait, callback, limit, out)
            }
            IdiomKind::Sleep { delay } => {
                self.note_page_use();
                let delay = match delay {
                    Some(range) => self.emit_range(range.clone()),
                    None => "0".to_string(),
                };
                let text = self.awaited(mappings::wait_for_timeout(&page, &delay), end, in_source);
                self.note(idiom, &text, NoteStatus::Rewritten, String::new());
                out.push_str(&text);
                end
            }
            IdiomKind::Navigate(action) => {
                self.note_page_use();
                let url = match action {
                    NavAction::Goto(range) => Some(self.emit_range(range.clone())),
                    _ => None,
                };
                let call = mappings::navigation(&page, action, url.as_deref());
                let text = self.awaited(call, end, in_source);
                self.note(idiom, &text, NoteStatus::Rewritten, String::new());
                out.push_str(&text);
                end
            }
            IdiomKind::PageRead(read) => {
                self.note_page_use();
                let expr = mappings::page_read(&page, *read);
                let text = if mappings::page_read_is_async(*read) {
                    self.awaited(expr, end, in_source)
                } else {
                    expr
                };
                self.note(idiom, &text, NoteStatus::Rewritten, String::new());
                out.push_str(&text);
                end
            }
            IdiomKind::Assertion(assertion) => {
                let actual = self.emit_range(assertion.actual.clone());
                let expected = assertion
                    .expected
                    .as_ref()
                    .map(|range| self.emit_range(range.clone()));
                let message = assertion
                    .message
                    .as_ref()
                    .map(|range| self.emit_range(range.clone()));
                let text = mappings::assertion(
                    assertion.kind,
                    assertion.negated,
                    &actual,
                    expected.as_deref(),
                    message.as_deref(),
                );
                self.note(idiom, &text, NoteStatus::Rewritten, String::new());
                out.push_str(&text);
                end
            }
            IdiomKind::Unsupported { reason } => {
                let reason = reason.clone();
                self.emit_unsupported(idiom, &reason, s.starts_statement(start), out)
            }
        }
    }

    fn emit_unsupported(&mut self, idiom: &Idiom, reason: &str, annotate: bool, out: &mut String) -> usize {
        let s = self.script;
        let original = s.range_text(idiom.tokens.clone());
        if annotate && self.options.annotate_unsupported {
            out.push_str(&format!(
                "// MIGRATE: {}\n{}",
                reason,
                s.line_indent(idiom.tokens.start)
            ));
        }
        out.push_str(original);
        self.note(idiom, original, NoteStatus::Unsupported, reason.to_string());
        idiom.tokens.end
    }

    /// Wraps a promise-returning call in `await`, parenthesised when the
    /// result is used further.
    fn awaited(&mut self, expr: String, end: usize, in_source: bool) -> String {
        self.note_await();
        let continues = matches!(self.script.text(end), "." | "?." | "[");
        if continues {
            format!("(await {})", expr)
        } else if in_source {
            expr
        } else {
            format!("await {}", expr)
        }
    }

    fn locator_base(&mut self, origin: &LocatorOrigin, refinements: &[Refinement]) -> String {
        let s = self.script;
        let page = self.options.page_object.clone();
        let mut base = match origin {
            LocatorOrigin::Query { method, arg } => {
                let literal = s.string_value(arg);
                let expr = self.emit_range(arg.clone());
                mappings::locator(
                    &page,
                    &mappings::query_selector(*method, literal.as_deref(), &expr),
                )
            }
            LocatorOrigin::JQuery { arg } => {
                let expr = self.emit_range(arg.clone());
                mappings::locator(&page, &expr)
            }
            LocatorOrigin::Binding { name } => s.text(*name).to_string(),
        };
        for refinement in refinements {
            let index = match refinement {
                Refinement::Nth(range) => Some(self.emit_range(range.clone())),
                _ => None,
            };
            base.push_str(&mappings::refinement(refinement, index.as_deref()));
        }
        base
    }

    fn action_args(&mut self, action: &ElementAction) -> Vec<String> {
        let s = self.script;
        let mut args = Vec::new();
        for arg in &action.args {
            match arg {
                ActionArg::Tokens(range) => {
                    let single_number = range.end == range.start + 1
                        && s.kind(range.start) == Some(TokenKind::Number);
                    if action.method == "fill" && single_number {
                        args.push(quote(s.text(range.start)));
                    } else {
                        let text = self.emit_range(range.clone());
                        args.push(text);
                    }
                }
                ActionArg::Literal(text) => args.push(text.clone()),
            }
        }
        args
    }

    fn emit_locator(
        &mut self,
        idiom: &'a Idiom,
        locator: &LocatorUse,
        in_source: bool,
        statement: bool,
        limit: usize,
        out: &mut String,
    ) -> usize {
        let s = self.script;
        let end = idiom.tokens.end;
        if locator.actions.len() > 1 && !statement {
            return self.emit_unsupported(
                idiom,
                "chained element actions inside an expression",
                false,
                out,
            );
        }
        if !matches!(locator.origin, LocatorOrigin::Binding { .. }) {
            self.note_page_use();
        }
        self.check_selector(idiom, &locator.origin);

        let base = self.locator_base(&locator.origin, &locator.refinements);
        let text = match locator.actions.as_slice() {
            [] => base,
            [action] => {
                let args = self.action_args(action);
                let call = mappings::action_call(&base, action.method, &args);
                self.awaited(call, end, in_source)
            }
            actions => {
                self.note_await();
                let indent = s.line_indent(idiom.tokens.start).to_string();
                let mut parts = Vec::new();
                for (i, action) in actions.iter().enumerate() {
                    let args = self.action_args(action);
                    let call = mappings::action_call(&base, action.method, &args);
                    if i == 0 && in_source {
                        parts.push(format!("{};", call));
                    } else {
                        parts.push(format!("await {};", call));
                    }
                }
                let text = parts.join(&format!("\n{}", indent));
                self.note(idiom, &text, NoteStatus::Rewritten, String::new());
                out.push_str(&text);
                return if s.is(end, ";") && end < limit { end + 1 } else { end };
            }
        };
        self.note(idiom, &text, NoteStatus::Rewritten, String::new());
        out.push_str(&text);
        end
    }

    fn check_selector(&mut self, idiom: &Idiom, origin: &LocatorOrigin) {
        let LocatorOrigin::JQuery { arg } = origin else {
            return;
        };
        let Some(selector) = self.script.string_value(arg) else {
            return;
        };
        if let Some(pseudo) = JQUERY_PSEUDOS.iter().find(|p| selector.contains(**p)) {
            self.notes.push(RewriteNote {
                line: idiom.line,
                family: idiom.family().as_str(),
                original: selector.clone(),
                replacement: String::new(),
                status: NoteStatus::Warning,
                message: format!(
                    "selector uses jQuery-only `{}`; use nth()/has-text or a CSS equivalent",
                    pseudo.trim_end_matches('(')
                ),
            });
        }
    }

    /// `await <wait>;` followed by the callback body, re-indented to the
    /// statement's indentation. Consumes the statement's `;`.
    fn emit_inline(
        &mut self,
        idiom: &'a Idiom,
        wait: String,
        callback: &Callback,
        limit: usize,
        out: &mut String,
    ) -> usize {
        let s = self.script;
        let end = idiom.tokens.end;
        let indent = s.line_indent(idiom.tokens.start).to_string();
        self.note_await();
        let head = format!("await {};", wait);
        let mut text = head.clone();

        match callback {
            Callback::Inline(function) => {
                let (body, body_indent) = match &function.body {
                    FnBody::Block { open, close } => {
                        let body = if open + 1 < *close {
                            self.emit_range(open + 1..*close)
                        } else {
                            String::new()
                        };
                        let first_line_start = (open + 1..*close)
                            .find(|idx| s.gap_before(*idx).contains('\n'))
                            .map(|idx| s.line_indent(idx).to_string())
                            .unwrap_or_default();
                        (body, first_line_start)
                    }
                    FnBody::Expr(range) => (format!("{};", self.emit_range(range.clone())), String::new()),
                };
                if !body.trim().is_empty() {
                    text.push('\n');
                    text.push_str(&indent);
                    text.push_str(&reindent(&body, &body_indent, &indent));
                }
            }
            Callback::Named(name) => {
                let name = s.text(*name);
                let call = if self.async_fns.contains(name) {
                    self.note_await();
                    format!("await {}();", name)
                } else {
                    format!("{}();", name)
                };
                text.push('\n');
                text.push_str(&indent);
                text.push_str(&call);
            }
        }

        self.note(idiom, &head, NoteStatus::Rewritten, String::new());
        out.push_str(&text);
        if s.is(end, ";") && end < limit {
            end + 1
        } else {
            end
        }
    }
}

/// Moves every line after the first from indentation `from` to `to`.
fn reindent(text: &str, from: &str, to: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
            if line.trim().is_empty() {
                continue;
            }
            match line.strip_prefix(from) {
                Some(rest) if !from.is_empty() => {
                    out.push_str(to);
                    out.push_str(rest);
                }
                _ => {
                    out.push_str(to);
                    out.push_str(line.trim_start());
                }
            }
        } else {
            out.push_str(line);
        }
    }
    out
}

fn indent_lines(text: &str, prefix: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{}{}", prefix, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions};

    fn migrate(source: &str) -> Rewrite {
        let script = Script::parse("login.js", source).unwrap();
        let analysis = analyze(&script, &AnalysisOptions::default());
        let options = RewriteOptions {
            test_name: "login".to_string(),
            ..RewriteOptions::default()
        };
        rewrite(&script, &analysis, &options).unwrap()
    }

    #[test]
    fn test_wraps_plain_script() {
        let out = migrate("$('#username').val('bob');\n$('#login-btn').click();\n");
        assert_eq!(
            out.code,
            "import { test, expect } from '@playwright/test';\n\n\
             test('login', async ({ page }) => {\n  \
             await page.locator('#username').fill('bob');\n  \
             await page.locator('#login-btn').click();\n\
             });\n"
        );
        assert_eq!(out.count(NoteStatus::Rewritten), 2);
    }

    #[test]
    fn test_mocha_suite_with_timeout() {
        let source = "const assert = require('assert');\n\n\
                      describe('Login', function () {\n  \
                      it('shows welcome', function () {\n    \
                      $('#user').val('bob');\n    \
                      setTimeout(function () {\n      \
                      assert.equal($('#welcome').text(), 'Hi bob');\n    \
                      }, 500);\n  \
                      });\n\
                      });\n";
        let out = migrate(source);
        assert_eq!(
            out.code,
            "const { test, expect } = require('@playwright/test');\n\n\
             test.describe('Login', function () {\n  \
             test('shows welcome', async ({ page }) => {\n    \
             await page.locator('#user').fill('bob');\n    \
             await page.waitForTimeout(500);\n    \
             expect(await page.locator('#welcome').textContent()).toBe('Hi bob');\n  \
             });\n\
             });\n"
        );
        assert_eq!(out.count(NoteStatus::Dropped), 1);
    }

    #[test]
    fn test_helper_becomes_async_and_is_awaited() {
        let source = "function login(name) {\n  $('#user').val(name);\n}\n\n\
                      it('logs in', () => {\n  login('bob');\n});\n";
        let out = migrate(source);
        assert_eq!(
            out.code,
            "import { test, expect } from '@playwright/test';\n\n\
             async function login(name) {\n  \
             await page.locator('#user').fill(name);\n\
             }\n\n\
             test('logs in', async ({ page }) => {\n  \
             await login('bob');\n\
             });\n"
        );
        assert_eq!(out.async_functions, vec!["login".to_string()]);
        assert!(out
            .notes
            .iter()
            .any(|n| n.status == NoteStatus::Warning && n.message.contains("`login`")));
    }

    #[test]
    fn test_playwright_code_is_untouched() {
        let source = "import { test, expect } from '@playwright/test';\n\n\
                      test('x', async ({ page }) => {\n  await page.goto('/');\n});\n";
        assert_eq!(migrate(source).code, source);
    }

    #[test]
    fn test_unsupported_is_annotated_and_copied() {
        let out = migrate("$('#banner').hide();\n");
        assert!(out.code.contains(
            "  // MIGRATE: DOM mutation `.hide()` has no test API equivalent\n  $('#banner').hide();"
        ));
        assert_eq!(out.count(NoteStatus::Unsupported), 1);
    }

    #[test]
    fn test_await_is_not_doubled() {
        let out = migrate("await sleep(500);\n");
        assert!(out.code.contains("  await page.waitForTimeout(500);\n"));
        assert!(!out.code.contains("await await"));
    }

    #[test]
    fn test_read_used_further_is_parenthesised() {
        let out = migrate("var heading = $('.title').text().trim();\n");
        assert!(out
            .code
            .contains("var heading = (await page.locator('.title').textContent()).trim();"));
    }

    #[test]
    fn test_chained_actions_split_into_statements() {
        let out = migrate("$('#q').val('rust').trigger('change');\n");
        assert!(out.code.contains(
            "  await page.locator('#q').fill('rust');\n  await page.locator('#q').dispatchEvent('change');\n"
        ));
    }

    #[test]
    fn test_document_ready_is_inlined() {
        let out = migrate("$(document).ready(function () {\n  $('#go').click();\n});\n");
        assert!(out.code.contains(
            "  await page.waitForLoadState('domcontentloaded');\n  await page.locator('#go').click();\n});"
        ));
    }

    #[test]
    fn test_dom_query_variants() {
        let out = migrate(
            "var rows = document.getElementsByClassName('row');\n\
             document.getElementById(id).click();\n\
             document.querySelectorAll('li')[2].click();\n",
        );
        assert!(out.code.contains("var rows = page.locator('.row');"));
        assert!(out.code.contains("await page.locator(`#${id}`).click();"));
        assert!(out.code.contains("await page.locator('li').nth(2).click();"));
    }

    #[test]
    fn test_navigation_and_page_reads() {
        let out = migrate(
            "window.location.href = 'https://shop.test/cart';\n\
             var where = window.location.href;\n\
             var heading = document.title;\n\
             history.back();\n",
        );
        assert!(out.code.contains("await page.goto('https://shop.test/cart');"));
        assert!(out.code.contains("var where = page.url();"));
        assert!(out.code.contains("var heading = await page.title();"));
        assert!(out.code.contains("await page.goBack();"));
    }

    #[test]
    fn test_element_binding_actions() {
        let out = migrate("const button = $('#submit');\nbutton.click();\nconst n = button.length;\n");
        assert!(out.code.contains("const button = page.locator('#submit');"));
        assert!(out.code.contains("await button.click();"));
        assert!(out.code.contains("const n = await button.count();"));
    }

    #[test]
    fn test_timer_handle_is_unsupported() {
        let out = migrate("var handle = setTimeout(tick, 100);\n");
        assert!(out.code.contains("var handle = setTimeout(tick, 100);"));
        assert_eq!(out.count(NoteStatus::Unsupported), 1);
    }

    #[test]
    fn test_jquery_pseudo_selector_warns() {
        let out = migrate("$('li:first').click();\n");
        assert!(out
            .notes
            .iter()
            .any(|n| n.status == NoteStatus::Warning && n.message.contains(":first")));
    }

    #[test]
    fn test_hooks_and_done_callbacks() {
        let source = "describe('Cart', () => {\n  \
                      beforeEach(() => {\n    location.reload();\n  });\n  \
                      it('adds', (done) => {\n    $('#add').click();\n    done();\n  });\n\
                      });\n";
        let out = migrate(source);
        assert!(out.code.contains("test.beforeEach(async ({ page }) => {\n    await page.reload();"));
        assert!(out.code.contains(
            "test('adds', async ({ page }) => {\n    await page.locator('#add').click();\n  });"
        ));
        assert!(!out.code.contains("done"));
        assert!(out
            .notes
            .iter()
            .any(|n| n.message.contains("`done` dropped")));
        assert!(out
            .notes
            .iter()
            .any(|n| n.status == NoteStatus::Dropped && n.original == "done();"));
    }

    #[test]
    fn test_done_with_error_throws() {
        let source = "it('saves', function (done) {\n  \
                      save(function (err) {\n    done(err);\n  });\n  \
                      load().catch(done);\n\
                      });\n";
        let out = migrate(source);
        assert!(out.code.contains("save(function (err) {\n    if (err) throw err;\n  });"));
        assert!(!out.code.contains("done(err)"));
        assert!(out
            .notes
            .iter()
            .any(|n| n.status == NoteStatus::Unsupported && n.message.contains("`done` is used as a value")));
    }

    #[test]
    fn test_code_outside_tests_is_not_awaited() {
        let out = migrate("$('#a').click();\nit('t', () => { $('#b').click(); });\n");
        assert!(out.code.contains(
            "// MIGRATE: code outside a test needs `page`; move it into a test or a test.beforeEach hook\n\
             $('#a').click();\n"
        ));
        assert!(out.code.contains("test('t', async ({ page }) => { await page.locator('#b').click(); });"));
        assert!(!out.code.lines().any(|line| line.starts_with("await ")));
        assert_eq!(out.count(NoteStatus::Unsupported), 1);
        assert_eq!(out.count(NoteStatus::Rewritten), 1);
    }

    #[test]
    fn test_suite_body_stays_synchronous() {
        let source = "describe('Menu', function () {\n  \
                      var items = $('.item');\n  \
                      it('opens', function () {\n    $('#menu').click();\n  });\n\
                      });\n";
        let out = migrate(source);
        assert!(out.code.contains("test.describe('Menu', function () {\n  // MIGRATE: code outside a test"));
        assert!(out.code.contains("\n  var items = $('.item');\n"));
        assert!(out.code.contains("await page.locator('#menu').click();"));
        assert!(!out.code.contains("async function"));
    }

    #[test]
    fn test_jquery_wrapped_binding_uses_binding() {
        let out = migrate("var el = document.getElementById('user');\n$(el).val('a');\n");
        assert!(out.code.contains("var el = page.locator('#user');"));
        assert!(out.code.contains("await el.fill('a');"));
        assert!(!out.code.contains("page.locator(el)"));
    }

    #[test]
    fn test_reindent() {
        assert_eq!(reindent("a();\n      b();", "      ", "  "), "a();\n  b();");
        assert_eq!(indent_lines("a\n\nb", "  "), "  a\n\n  b");
    }
}
