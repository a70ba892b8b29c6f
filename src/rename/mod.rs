//! Identifier renaming, independent of the API rewrite.

pub mod naming;

use crate::analysis::identifiers::{references, IdentifierQuality};
use crate::analysis::syntax::Script;
use crate::analysis::Analysis;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "new", "return", "super", "switch", "this", "throw", "try", "typeof", "var", "void", "while",
    "with", "yield", "let", "static", "enum", "await", "implements", "package", "protected",
    "interface", "private", "public", "null", "true", "false", "undefined", "arguments", "eval",
    "page", "expect", "test", "document", "window", "location", "history",
];

#[derive(Debug, Clone, Default)]
pub struct RenameOptions {
    /// Names that are never renamed
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from: String,
    pub to: String,
    pub line: usize,
    pub quality: IdentifierQuality,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRename {
    pub name: String,
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RenamePlan {
    pub renames: Vec<Rename>,
    pub skipped: Vec<SkippedRename>,
}

impl RenamePlan {
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    fn mapping(&self) -> HashMap<&str, &str> {
        self.renames
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect()
    }
}

pub fn plan(script: &Script, analysis: &Analysis, options: &RenameOptions) -> RenamePlan {
    let existing: HashSet<&str> = (0..script.len())
        .filter(|idx| script.is_ident(*idx))
        .map(|idx| script.text(idx))
        .collect();

    let mut declared: HashMap<&str, usize> = HashMap::new();
    for identifier in &analysis.identifiers {
        *declared.entry(identifier.name.as_str()).or_insert(0) += 1;
    }

    let mut result = RenamePlan::default();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut chosen: HashSet<String> = HashSet::new();

    for identifier in analysis.poor_identifiers() {
        let name = identifier.name.as_str();
        if !seen.insert(name) || options.exclude.iter().any(|e| e == name) {
            continue;
        }
        let mut skip = |reason: String| {
            result.skipped.push(SkippedRename {
                name: name.to_string(),
                line: identifier.line,
                reason,
            })
        };

        if declared.get(name).copied().unwrap_or(0) > 1 {
            skip("declared more than once".to_string());
            continue;
        }
        let Some(inferred) = naming::infer_name(script, analysis, &identifier.usage) else {
            skip("usage gives no hint for a better name".to_string());
            continue;
        };
        if RESERVED.contains(&inferred.as_str()) {
            skip(format!("inferred name `{}` is reserved", inferred));
            continue;
        }
        if existing.contains(inferred.as_str()) {
            skip(format!("inferred name `{}` is already in use", inferred));
            continue;
        }
        if !chosen.insert(inferred.clone()) {
            skip(format!("inferred name `{}` was already chosen for another identifier", inferred));
            continue;
        }

        result.renames.push(Rename {
            from: name.to_string(),
            to: inferred,
            line: identifier.line,
            quality: identifier.quality,
        });
    }

    tracing::debug!(
        "✏️ {}: {} renames planned, {} skipped",
        script.name(),
        result.renames.len(),
        result.skipped.len()
    );
    result
}

/// Emits the script with every planned rename applied. Member names and
/// object keys are never touched; shorthand properties keep their key.
pub fn apply(script: &Script, plan: &RenamePlan) -> String {
    let mapping = plan.mapping();
    if mapping.is_empty() {
        return script.source().to_string();
    }

    let targets: HashSet<usize> = plan
        .renames
        .iter()
        .flat_map(|rename| references(script, &rename.from, usize::MAX))
        .collect();

    let mut out = String::with_capacity(script.source().len() + 64);
    for idx in 0..script.len() {
        out.push_str(script.gap_before(idx));
        let text = script.text(idx);
        match mapping.get(text) {
            Some(to) if targets.contains(&idx) => {
                if is_shorthand_property(script, idx) {
                    out.push_str(text);
                    out.push_str(": ");
                }
                out.push_str(to);
            }
            _ => out.push_str(text),
        }
    }
    out.push_str(script.gap_before(script.len()));
    out
}

/// `{ name }` or `{ name = 1 }` inside an object literal or destructuring pattern.
fn is_shorthand_property(script: &Script, idx: usize) -> bool {
    if idx == 0 || !(script.is(idx - 1, "{") || script.is(idx - 1, ",")) {
        return false;
    }
    if !(script.is(idx + 1, "}") || script.is(idx + 1, ",") || script.is(idx + 1, "=")) {
        return false;
    }
    let Some(open) = enclosing_open(script, idx) else {
        return false;
    };
    // a `{` at the start of the file opens a block
    if !script.is(open, "{") || open == 0 {
        return false;
    }
    let before = script.text(open - 1);
    matches!(
        before,
        "=" | "(" | "," | ":" | "[" | "return" | "var" | "let" | "const" | "?" | "||" | "&&" | "??"
    )
}

fn enclosing_open(script: &Script, idx: usize) -> Option<usize> {
    let mut pos = idx;
    while pos > 0 {
        pos -= 1;
        match script.text(pos) {
            ")" | "]" | "}" => pos = script.matching(pos)?,
            "(" | "[" | "{" => return Some(pos),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{analyze, AnalysisOptions};

    fn rename(source: &str) -> (String, RenamePlan) {
        let script = Script::parse("t.js", source).unwrap();
        let analysis = analyze(&script, &AnalysisOptions::default());
        let plan = plan(&script, &analysis, &RenameOptions::default());
        (apply(&script, &plan), plan)
    }

    #[test]
    fn test_renames_binding_from_selector_and_usage() {
        let (out, plan) = rename("var b = $('#login-btn');\nb.click();");
        assert_eq!(plan.renames[0].to, "loginButton");
        assert_eq!(out, "var loginButton = $('#login-btn');\nloginButton.click();");
    }

    #[test]
    fn test_members_and_keys_untouched() {
        let (out, _) = rename("var x = 'bob';\n$('#user').val(x);\nsend({ x: x, y: obj.x });");
        assert_eq!(
            out,
            "var userValue = 'bob';\n$('#user').val(userValue);\nsend({ x: userValue, y: obj.x });"
        );
    }

    #[test]
    fn test_fill_through_wrapped_binding() {
        let (_, plan) = rename(
            "var el = document.getElementById('user');\nvar temp = 'alice';\n$(el).val(temp);",
        );
        assert!(plan
            .renames
            .iter()
            .any(|r| r.from == "temp" && r.to == "userValue"));
    }

    #[test]
    fn test_shorthand_property_keeps_key() {
        let (out, _) = rename("var t = 300;\nsleep(t);\nreport({ t });");
        assert_eq!(out, "var delayMs = 300;\nsleep(delayMs);\nreport({ t: delayMs });");
    }

    #[test]
    fn test_skips_redeclared_and_unresolved() {
        let (out, plan) = rename("var el = $('#a');\nvar el = $('#b');\nvar q = compute();");
        assert_eq!(out, "var el = $('#a');\nvar el = $('#b');\nvar q = compute();");
        let reasons: Vec<&str> = plan.skipped.iter().map(|s| s.reason.as_str()).collect();
        assert_eq!(reasons.len(), 2);
        assert!(reasons[0].contains("more than once"));
    }

    #[test]
    fn test_collision_is_skipped() {
        let (_, plan) = rename("var delayMs = 1;\nvar t = 300;\nsleep(t);");
        assert!(plan.renames.is_empty());
        assert!(plan.skipped[0].reason.contains("already in use"));
    }

    #[test]
    fn test_comments_survive() {
        let (out, _) = rename("// wait a bit\nvar t = 300; /* ms */\nsleep(t);\n");
        assert_eq!(out, "// wait a bit\nvar delayMs = 300; /* ms */\nsleep(delayMs);\n");
    }
}
