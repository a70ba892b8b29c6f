//! Name inference from usage context.

use crate::analysis::identifiers::{Initializer, Use, UsageContext};
use crate::analysis::idioms::{
    literal_selector, ActionArg, IdiomKind, LocatorOrigin, LocatorUse, PageRead, QueryMethod,
};
use crate::analysis::lexer::TokenKind;
use crate::analysis::syntax::{unquote, Script};
use crate::analysis::Analysis;

const ABBREVIATIONS: &[(&str, &str)] = &[
    ("btn", "button"),
    ("txt", "text"),
    ("msg", "message"),
    ("pwd", "password"),
    ("pw", "password"),
    ("pass", "password"),
    ("usr", "user"),
    ("img", "image"),
    ("lbl", "label"),
    ("nav", "navigation"),
    ("chk", "checkbox"),
    ("cb", "checkbox"),
    ("num", "number"),
    ("qty", "quantity"),
    ("addr", "address"),
    ("desc", "description"),
    ("err", "error"),
    ("dlg", "dialog"),
    ("sel", "select"),
    ("frm", "form"),
    ("tbl", "table"),
    ("lnk", "link"),
    ("hdr", "header"),
    ("ftr", "footer"),
    ("cnt", "count"),
    ("val", "value"),
    ("el", "element"),
    ("elem", "element"),
];

/// Words that already name the kind of element.
const ELEMENT_NOUNS: &[&str] = &[
    "button", "input", "link", "dropdown", "form", "table", "image", "checkbox", "label", "list",
    "field", "element", "items", "select", "textarea",
];

pub fn expand(word: &str) -> String {
    ABBREVIATIONS
        .iter()
        .find(|(short, _)| *short == word)
        .map(|(_, long)| long.to_string())
        .unwrap_or_else(|| word.to_string())
}

/// Splits `login-btn`, `user_name`, `loginBtn` and `Login2` into lowercase words.
pub fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            if c.is_ascii_uppercase() && prev_lower && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            current.push(c.to_ascii_lowercase());
            prev_lower = c.is_ascii_lowercase();
        } else {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

pub fn camel_case(words: &[String]) -> String {
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(word);
        } else {
            out.push_str(&capitalize(word));
        }
    }
    out
}

pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Selector pieces of the last compound selector: tag, id, classes, attribute values.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SelectorParts {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    pub name: Option<String>,
    pub input_type: Option<String>,
}

pub fn selector_parts(selector: &str) -> SelectorParts {
    let last = selector
        .rsplit(|c: char| c.is_whitespace() || c == '>' || c == '+' || c == '~' || c == ',')
        .find(|part| !part.is_empty())
        .unwrap_or("");
    let mut parts = SelectorParts::default();

    let tag: String = last
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if !tag.is_empty() {
        parts.tag = Some(tag.to_ascii_lowercase());
    }

    let mut rest = &last[parts.tag.as_ref().map(|t| t.len()).unwrap_or(0)..];
    while let Some(c) = rest.chars().next() {
        match c {
            '#' | '.' => {
                let word: String = rest[1..]
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect();
                rest = &rest[1 + word.len()..];
                if c == '#' {
                    parts.id = Some(word);
                } else {
                    parts.classes.push(word);
                }
            }
            '[' => {
                let end = rest.find(']').unwrap_or(rest.len() - 1);
                let attr = &rest[1..end];
                if let Some((key, value)) = attr.split_once('=') {
                    let value = value.trim_matches(|c| c == '"' || c == '\'').to_string();
                    match key.trim() {
                        "name" => parts.name = Some(value),
                        "type" => parts.input_type = Some(value),
                        "id" => parts.id = Some(value),
                        _ => {}
                    }
                }
                rest = &rest[(end + 1).min(rest.len())..];
            }
            _ => {
                let skip = c.len_utf8();
                rest = &rest[skip..];
            }
        }
    }
    parts
}

/// Element noun implied by a tag or input type.
fn tag_noun(parts: &SelectorParts) -> Option<&'static str> {
    if let Some(kind) = parts.input_type.as_deref() {
        match kind {
            "checkbox" => return Some("checkbox"),
            "submit" | "button" => return Some("button"),
            "radio" => return Some("radio"),
            _ => {}
        }
    }
    match parts.tag.as_deref()? {
        "input" | "textarea" => Some("input"),
        "button" => Some("button"),
        "a" => Some("link"),
        "select" => Some("dropdown"),
        "form" => Some("form"),
        "table" => Some("table"),
        "img" => Some("image"),
        "label" => Some("label"),
        "ul" | "ol" => Some("list"),
        "li" | "tr" => Some("items"),
        _ => None,
    }
}

fn usage_noun(methods: &[&str]) -> Option<&'static str> {
    if methods.iter().any(|m| *m == "fill" || *m == "inputValue") {
        Some("input")
    } else if methods.iter().any(|m| matches!(*m, "check" | "uncheck" | "isChecked")) {
        Some("checkbox")
    } else if methods.iter().any(|m| matches!(*m, "click" | "dblclick")) {
        Some("button")
    } else if methods
        .iter()
        .any(|m| matches!(*m, "textContent" | "innerText"))
    {
        Some("label")
    } else {
        None
    }
}

/// Descriptive words for a selector, abbreviations expanded.
pub fn selector_words(selector: &str) -> Vec<String> {
    let parts = selector_parts(selector);
    let source = parts
        .id
        .clone()
        .or_else(|| parts.name.clone())
        .or_else(|| parts.classes.first().cloned())
        .or_else(|| parts.tag.clone())
        .unwrap_or_default();
    split_words(&source).iter().map(|w| expand(w)).collect()
}

fn locator_selector(script: &Script, locator: &LocatorUse) -> Option<String> {
    literal_selector(script, &locator.origin)
}

fn is_collection(locator: &LocatorUse) -> bool {
    locator.refinements.is_empty()
        && matches!(
            locator.origin,
            LocatorOrigin::Query {
                method: QueryMethod::SelectorAll | QueryMethod::ByClass | QueryMethod::ByTag,
                ..
            }
        )
}

/// Selector words plus an element noun taken from the tag or, failing that,
/// from how the element is used.
pub fn element_words(selector: &str, collection: bool, methods: &[&str]) -> Vec<String> {
    let mut words = selector_words(selector);
    if words.is_empty() {
        return words;
    }
    let parts = selector_parts(selector);
    let noun = if collection {
        Some("items")
    } else {
        tag_noun(&parts).or_else(|| usage_noun(methods))
    };
    let last = words.last().map(String::as_str).unwrap_or("");
    match noun {
        Some(noun) if last != noun && !(noun == "input" && last == "field") => {
            if !(ELEMENT_NOUNS.contains(&last) && noun == "items") {
                words.push(noun.to_string());
            }
        }
        None if !ELEMENT_NOUNS.contains(&last) => words.push("element".to_string()),
        _ => {}
    }
    words
}

/// `login-btn` used with `click` becomes `loginButton`; `username` filled becomes `usernameInput`.
pub fn element_name(script: &Script, locator: &LocatorUse, methods: &[&str]) -> Option<String> {
    let selector = locator_selector(script, locator)?;
    let words = element_words(&selector, is_collection(locator), methods);
    (!words.is_empty()).then(|| camel_case(&words))
}

/// Words naming the element itself, without a trailing element noun.
fn target_words(script: &Script, locator: &LocatorUse) -> Option<Vec<String>> {
    let selector = locator_selector(script, locator)?;
    let mut words = selector_words(&selector);
    while words.len() > 1
        && words
            .last()
            .is_some_and(|w| matches!(w.as_str(), "input" | "field" | "element"))
    {
        words.pop();
    }
    (!words.is_empty()).then_some(words)
}

/// `$('#email').val()` becomes `emailValue`; `.is(':visible')` becomes `isBannerVisible`.
pub fn read_name(script: &Script, locator: &LocatorUse) -> Option<String> {
    let action = locator.actions.last()?;
    let mut words = target_words(script, locator)?;
    let predicate = |suffix: &str, words: &[String]| {
        let mut all = vec!["is".to_string()];
        all.extend(words.iter().cloned());
        all.push(suffix.to_string());
        camel_case(&all)
    };
    let name = match action.method {
        "isVisible" => predicate("visible", &words),
        "isHidden" => predicate("hidden", &words),
        "isChecked" => predicate("checked", &words),
        "isDisabled" => predicate("disabled", &words),
        "isEnabled" => predicate("enabled", &words),
        method => {
            let suffix = match method {
                "inputValue" => "value".to_string(),
                "textContent" | "innerText" => "text".to_string(),
                "innerHTML" => "html".to_string(),
                "count" => "count".to_string(),
                "boundingBox" => "box".to_string(),
                "getAttribute" => match action.args.first() {
                    Some(ActionArg::Literal(lit)) => unquote(lit),
                    Some(ActionArg::Tokens(range)) => script.string_value(range)?,
                    None => return None,
                },
                _ => return None,
            };
            words.extend(split_words(&suffix));
            camel_case(&words)
        }
    };
    Some(name)
}

fn looks_like_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://") || value.starts_with('/')
}

/// Infers a descriptive name for a declaration, or `None` when the usage
/// context does not say enough.
pub fn infer_name(script: &Script, analysis: &Analysis, usage: &UsageContext) -> Option<String> {
    let locator_of = |idx: usize| match &analysis.idioms.get(idx)?.kind {
        IdiomKind::Locator(locator) => Some(locator),
        _ => None,
    };

    match &usage.initializer {
        Initializer::Locator(idx) => {
            let locator = locator_of(*idx)?;
            let methods: Vec<&str> = usage
                .uses
                .iter()
                .filter_map(|u| match u {
                    Use::Action(method) => Some(*method),
                    _ => None,
                })
                .collect();
            return element_name(script, locator, &methods);
        }
        Initializer::ElementRead(idx) => {
            let read = locator_of(*idx)?;
            let target = analysis.resolve_locator(script, read);
            let mut resolved = target.clone();
            resolved.actions = read.actions.clone();
            return read_name(script, &resolved);
        }
        Initializer::PageRead(read) => {
            return Some(
                match read {
                    PageRead::Url => "currentUrl",
                    PageRead::Pathname => "currentPath",
                    PageRead::Title => "pageTitle",
                }
                .to_string(),
            );
        }
        _ => {}
    }

    for usage_kind in &usage.uses {
        match usage_kind {
            Use::FillValue(idx) => {
                let locator = analysis.resolve_locator(script, locator_of(*idx)?);
                let mut words = target_words(script, locator)?;
                words.push("value".to_string());
                return Some(camel_case(&words));
            }
            Use::Delay => return Some("delayMs".to_string()),
            Use::NavigateTarget => return Some("targetUrl".to_string()),
            Use::Expected(actual) => {
                let subject = expected_subject(script, analysis, actual)?;
                return Some(format!("expected{}", capitalize(&subject)));
            }
            Use::Action(_) => {}
        }
    }

    if let Initializer::Literal {
        kind: TokenKind::Str,
        value,
    } = &usage.initializer
    {
        if looks_like_url(value) {
            return Some("targetUrl".to_string());
        }
    }
    None
}

fn expected_subject(
    script: &Script,
    analysis: &Analysis,
    actual: &std::ops::Range<usize>,
) -> Option<String> {
    let mut start = actual.start;
    if script.is(start, "await") {
        start += 1;
    }
    let idiom = analysis
        .idioms
        .iter()
        .find(|idiom| idiom.tokens.start == start && idiom.tokens.end == actual.end);
    if let Some(IdiomKind::Locator(read)) = idiom.map(|i| &i.kind) {
        let mut resolved = analysis.resolve_locator(script, read).clone();
        resolved.actions = read.actions.clone();
        return read_name(script, &resolved);
    }
    if actual.end == actual.start + 1 && script.is_ident(actual.start) {
        return Some(script.text(actual.start).to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("login-btn"), vec!["login", "btn"]);
        assert_eq!(split_words("userName_field"), vec!["user", "name", "field"]);
        assert_eq!(split_words("Login2"), vec!["login"]);
    }

    #[test]
    fn test_selector_parts() {
        let parts = selector_parts("form#login input[name=\"email\"]");
        assert_eq!(parts.tag.as_deref(), Some("input"));
        assert_eq!(parts.name.as_deref(), Some("email"));

        let parts = selector_parts("button.btn.primary");
        assert_eq!(parts.tag.as_deref(), Some("button"));
        assert_eq!(parts.classes, vec!["btn", "primary"]);
    }

    #[test]
    fn test_selector_words_expand_abbreviations() {
        assert_eq!(selector_words("#login-btn"), vec!["login", "button"]);
        assert_eq!(selector_words(".err-msg"), vec!["error", "message"]);
    }

    fn locator_for(script: &Script, idx: usize) -> LocatorUse {
        let bindings = Default::default();
        let helpers: Vec<String> = Vec::new();
        let recognizer = crate::analysis::idioms::Recognizer::new(script, &bindings, &helpers);
        match recognizer.recognize(idx).unwrap().kind {
            IdiomKind::Locator(locator) => locator,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_element_name_uses_tag_then_usage() {
        let script = Script::parse("t.js", "$('#login-btn')").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(element_name(&script, &locator, &["click"]).as_deref(), Some("loginButton"));

        let script = Script::parse("t.js", "$('#username')").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(element_name(&script, &locator, &["fill"]).as_deref(), Some("usernameInput"));
        assert_eq!(element_name(&script, &locator, &[]).as_deref(), Some("usernameElement"));

        let script = Script::parse("t.js", "$('select#country')").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(element_name(&script, &locator, &[]).as_deref(), Some("countryDropdown"));
    }

    #[test]
    fn test_read_names() {
        let script = Script::parse("t.js", "$('#email-input').val()").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(read_name(&script, &locator).as_deref(), Some("emailValue"));

        let script = Script::parse("t.js", "$('#banner').is(':visible')").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(read_name(&script, &locator).as_deref(), Some("isBannerVisible"));

        let script = Script::parse("t.js", "$('a.help').attr('href')").unwrap();
        let locator = locator_for(&script, 0);
        assert_eq!(read_name(&script, &locator).as_deref(), Some("helpHref"));
    }
}
