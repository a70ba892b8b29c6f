pub mod identifiers;
pub mod idioms;
pub mod lexer;
pub mod syntax;

use identifiers::{classify, declarations, references, usage_context, Identifier, QualityRules};
use idioms::{Idiom, IdiomFamily, IdiomKind, LocatorUse, Recognizer};
use std::collections::{BTreeMap, HashMap, HashSet};
use syntax::Script;

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Helpers such as `await sleep(500)` treated as fixed waits
    pub sleep_helpers: Vec<String>,
    pub quality: QualityRules,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            sleep_helpers: vec!["sleep".to_string(), "delay".to_string(), "wait".to_string()],
            quality: QualityRules::default(),
        }
    }
}

/// A variable whose every declaration is initialised from a locator.
#[derive(Debug, Clone)]
pub struct ElementBinding {
    pub name: String,
    pub token: usize,
    pub locator: LocatorUse,
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub idioms: Vec<Idiom>,
    pub bindings: BTreeMap<String, ElementBinding>,
    pub identifiers: Vec<Identifier>,
}

impl Analysis {
    pub fn binding_names(&self) -> HashSet<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn family_counts(&self) -> BTreeMap<IdiomFamily, usize> {
        let mut counts = BTreeMap::new();
        for idiom in &self.idioms {
            *counts.entry(idiom.family()).or_insert(0) += 1;
        }
        counts
    }

    pub fn poor_identifiers(&self) -> impl Iterator<Item = &Identifier> {
        self.identifiers.iter().filter(|id| id.quality.is_poor())
    }

    /// Locator behind an element-targeting idiom, following bindings.
    pub fn resolve_locator<'a>(&'a self, script: &Script, locator: &'a LocatorUse) -> &'a LocatorUse {
        match locator.origin {
            idioms::LocatorOrigin::Binding { name } => self
                .bindings
                .get(script.text(name))
                .map(|binding| &binding.locator)
                .unwrap_or(locator),
            _ => locator,
        }
    }
}

pub fn analyze(script: &Script, options: &AnalysisOptions) -> Analysis {
    let decls = declarations(script);
    let bindings = element_bindings(script, &decls, options);
    let names: HashSet<String> = bindings.keys().cloned().collect();

    let recognizer = Recognizer::new(script, &names, &options.sleep_helpers);
    let idioms = idioms::collect(&recognizer);

    let identifiers = decls
        .iter()
        .map(|decl| Identifier {
            name: decl.name.clone(),
            line: decl.line,
            kind: decl.kind,
            quality: classify(&decl.name, &options.quality),
            token: decl.token,
            usage: usage_context(script, decl, &idioms),
        })
        .collect();

    tracing::debug!(
        "🔎 {}: {} idioms, {} element bindings",
        script.name(),
        idioms.len(),
        bindings.len()
    );

    Analysis {
        idioms,
        bindings,
        identifiers,
    }
}

fn element_bindings(
    script: &Script,
    decls: &[identifiers::Declaration],
    options: &AnalysisOptions,
) -> BTreeMap<String, ElementBinding> {
    let empty = HashSet::new();
    let recognizer = Recognizer::new(script, &empty, &options.sleep_helpers);

    let mut candidates: HashMap<&str, Vec<Option<ElementBinding>>> = HashMap::new();
    for decl in decls {
        let binding = decl.init.as_ref().and_then(|init| {
            let idiom = recognizer.recognize(init.start)?;
            match idiom.kind {
                IdiomKind::Locator(locator)
                    if locator.actions.is_empty() && idiom.tokens == *init =>
                {
                    Some(ElementBinding {
                        name: decl.name.clone(),
                        token: decl.token,
                        locator,
                    })
                }
                _ => None,
            }
        });
        candidates.entry(decl.name.as_str()).or_default().push(binding);
    }

    let mut bindings = BTreeMap::new();
    for (name, found) in candidates {
        if found.iter().any(Option::is_none) {
            continue;
        }
        let Some(Some(first)) = found.into_iter().next() else {
            continue;
        };
        let reassigned = references(script, name, first.token)
            .into_iter()
            .any(|idx| script.is(idx + 1, "=") && !decls.iter().any(|d| d.token == idx));
        if reassigned {
            continue;
        }
        bindings.insert(name.to_string(), first);
    }
    bindings
}
