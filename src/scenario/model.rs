use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StepKeyword {
    Given,
    When,
    Then,
    And,
}

impl StepKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Given => "Given",
            Self::When => "When",
            Self::Then => "Then",
            Self::And => "And",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    String,
    Int,
    Float,
}

impl ParamKind {
    pub fn placeholder(&self) -> &'static str {
        match self {
            Self::String => "{string}",
            Self::Int => "{int}",
            Self::Float => "{float}",
        }
    }
}

/// A literal lifted out of a step body into the step text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepParam {
    pub name: String,
    pub kind: ParamKind,
    /// Unquoted value written into the feature file
    pub value: String,
}

impl StepParam {
    /// The value as it appears in a Gherkin step line.
    pub fn gherkin_value(&self) -> String {
        match self.kind {
            ParamKind::String if self.value.contains('"') => format!("'{}'", self.value),
            ParamKind::String => format!("\"{}\"", self.value),
            ParamKind::Int | ParamKind::Float => self.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Step {
    /// Given, When or Then; `And` is only chosen when rendering
    pub keyword: StepKeyword,
    /// Cucumber expression, e.g. `I fill the username input with {string}`
    pub text: String,
    pub params: Vec<StepParam>,
    /// Step definition body, referencing the params by name
    pub body: String,
    pub line: usize,
}

impl Step {
    /// Step text with every placeholder replaced by its value.
    pub fn gherkin_text(&self) -> String {
        let mut out = self.text.clone();
        for param in &self.params {
            if let Some(pos) = out.find(param.kind.placeholder()) {
                out.replace_range(pos..pos + param.kind.placeholder().len(), &param.gherkin_value());
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Feature {
    pub name: String,
    pub tag: String,
    pub description: Option<String>,
    pub background: Vec<Step>,
    pub scenarios: Vec<Scenario>,
}

impl Feature {
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.background
            .iter()
            .chain(self.scenarios.iter().flat_map(|s| s.steps.iter()))
    }
}

/// One generated step definition; feature steps with the same text share it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepDefinition {
    pub keyword: StepKeyword,
    pub text: String,
    pub params: Vec<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ScenarioSet {
    pub feature: Feature,
    pub definitions: Vec<StepDefinition>,
    /// `(line, message)` for constructs that have no scenario form
    pub warnings: Vec<(usize, String)>,
    /// Module-level helpers and constants copied into the steps file
    pub preamble: Vec<String>,
    pub common_js: bool,
}
