//! Target API text for each recognized idiom. Callers pass sub-expressions
//! that were already rewritten.

use crate::analysis::idioms::{AssertKind, NavAction, PageRead, QueryMethod, Refinement};
use crate::analysis::syntax::quote;

/// Test-framework calls and their Playwright counterparts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Describe,
    Test,
    Hook { each: bool, before: bool },
}

impl BlockKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "describe" | "context" | "suite" => Some(Self::Describe),
            "it" | "test" | "specify" | "xit" => Some(Self::Test),
            "beforeEach" => Some(Self::Hook { each: true, before: true }),
            "afterEach" => Some(Self::Hook { each: true, before: false }),
            "before" | "beforeAll" => Some(Self::Hook { each: false, before: true }),
            "after" | "afterAll" => Some(Self::Hook { each: false, before: false }),
            _ => None,
        }
    }

    pub fn target(&self) -> &'static str {
        match self {
            Self::Describe => "test.describe",
            Self::Test => "test",
            Self::Hook { each: true, before: true } => "test.beforeEach",
            Self::Hook { each: true, before: false } => "test.afterEach",
            Self::Hook { each: false, before: true } => "test.beforeAll",
            Self::Hook { each: false, before: false } => "test.afterAll",
        }
    }

    /// `beforeAll`/`afterAll` run once per worker and get no `page` fixture.
    pub fn has_page(&self) -> bool {
        !matches!(self, Self::Describe | Self::Hook { each: false, .. })
    }
}

/// Query selector expression for `page.locator(...)`. `literal` is the
/// unquoted string value when the argument is a plain string literal.
pub fn query_selector(method: QueryMethod, literal: Option<&str>, expr: &str) -> String {
    match (method, literal) {
        (QueryMethod::ById, Some(id)) => quote(&format!("#{}", id)),
        (QueryMethod::ById, None) => format!("`#${{{}}}`", expr),
        (QueryMethod::ByClass, Some(classes)) => quote(
            &classes
                .split_whitespace()
                .map(|c| format!(".{}", c))
                .collect::<String>(),
        ),
        (QueryMethod::ByClass, None) => format!("`.${{{}}}`", expr),
        (QueryMethod::ByName, Some(name)) => quote(&format!("[name=\"{}\"]", name)),
        (QueryMethod::ByName, None) => format!("`[name=\"${{{}}}\"]`", expr),
        (QueryMethod::Selector | QueryMethod::SelectorAll | QueryMethod::ByTag, _) => {
            expr.to_string()
        }
    }
}

pub fn locator(page: &str, selector: &str) -> String {
    format!("{}.locator({})", page, selector)
}

pub fn refinement(refinement: &Refinement, index_expr: Option<&str>) -> String {
    match refinement {
        Refinement::Nth(_) => format!(".nth({})", index_expr.unwrap_or("0")),
        Refinement::First => ".first()".to_string(),
        Refinement::Last => ".last()".to_string(),
    }
}

pub fn action_call(target: &str, method: &str, args: &[String]) -> String {
    format!("{}.{}({})", target, method, args.join(", "))
}

pub fn wait_for_timeout(page: &str, delay: &str) -> String {
    format!("{}.waitForTimeout({})", page, delay)
}

pub fn wait_for_load_state(page: &str, state: &str) -> String {
    format!("{}.waitForLoadState({})", page, quote(state))
}

pub fn navigation(page: &str, action: &NavAction, url: Option<&str>) -> String {
    match action {
        NavAction::Goto(_) => format!("{}.goto({})", page, url.unwrap_or("''")),
        NavAction::Reload => format!("{}.reload()", page),
        NavAction::Back => format!("{}.goBack()", page),
        NavAction::Forward => format!("{}.goForward()", page),
    }
}

pub fn page_read(page: &str, read: PageRead) -> String {
    match read {
        PageRead::Url => format!("{}.url()", page),
        PageRead::Pathname => format!("new URL({}.url()).pathname", page),
        PageRead::Title => format!("{}.title()", page),
    }
}

/// Whether the target expression returns a promise.
pub fn page_read_is_async(read: PageRead) -> bool {
    matches!(read, PageRead::Title)
}

pub fn assertion(
    kind: AssertKind,
    negated: bool,
    actual: &str,
    expected: Option<&str>,
    message: Option<&str>,
) -> String {
    let subject = match message {
        Some(message) => format!("expect({}, {})", actual, message),
        None => format!("expect({})", actual),
    };
    let not = if negated { ".not" } else { "" };
    let matcher = match kind {
        AssertKind::Equal => format!("toBe({})", expected.unwrap_or("undefined")),
        AssertKind::DeepEqual => format!("toEqual({})", expected.unwrap_or("undefined")),
        AssertKind::Contains => format!("toContain({})", expected.unwrap_or("undefined")),
        AssertKind::Truthy => "toBeTruthy()".to_string(),
        AssertKind::Falsy => "toBeFalsy()".to_string(),
        AssertKind::IsTrue => "toBe(true)".to_string(),
        AssertKind::IsFalse => "toBe(false)".to_string(),
    };
    format!("{}{}.{}", subject, not, matcher)
}

pub fn playwright_import(common_js: bool) -> &'static str {
    if common_js {
        "const { test, expect } = require('@playwright/test');"
    } else {
        "import { test, expect } from '@playwright/test';"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_selectors() {
        assert_eq!(query_selector(QueryMethod::ById, Some("user"), "'user'"), "'#user'");
        assert_eq!(query_selector(QueryMethod::ById, None, "id"), "`#${id}`");
        assert_eq!(
            query_selector(QueryMethod::ByClass, Some("row active"), "'row active'"),
            "'.row.active'"
        );
        assert_eq!(
            query_selector(QueryMethod::ByName, Some("email"), "'email'"),
            "'[name=\"email\"]'"
        );
        assert_eq!(query_selector(QueryMethod::Selector, Some("#a > b"), "'#a > b'"), "'#a > b'");
    }

    #[test]
    fn test_assertions() {
        assert_eq!(
            assertion(AssertKind::Equal, false, "title", Some("'Home'"), None),
            "expect(title).toBe('Home')"
        );
        assert_eq!(
            assertion(AssertKind::DeepEqual, true, "a", Some("b"), Some("'msg'")),
            "expect(a, 'msg').not.toEqual(b)"
        );
        assert_eq!(
            assertion(AssertKind::Truthy, false, "ok", None, None),
            "expect(ok).toBeTruthy()"
        );
    }

    #[test]
    fn test_block_targets() {
        assert_eq!(BlockKind::from_name("it").map(|b| b.target()), Some("test"));
        assert_eq!(
            BlockKind::from_name("before").map(|b| b.target()),
            Some("test.beforeAll")
        );
        assert!(!BlockKind::from_name("after").map(|b| b.has_page()).unwrap_or(true));
        assert!(BlockKind::from_name("beforeEach").map(|b| b.has_page()).unwrap_or(false));
        assert!(BlockKind::from_name("then").is_none());
    }
}
