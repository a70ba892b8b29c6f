use super::model::{Feature, ScenarioSet, Step, StepKeyword};
use crate::analysis::syntax::quote;
use chrono::{DateTime, Utc};

pub const DEFAULT_STEPS_MODULE: &str = "playwright-bdd";

pub fn render_feature(feature: &Feature) -> String {
    let mut out = String::new();
    out.push_str(&feature.tag);
    out.push('\n');
    out.push_str(&format!("Feature: {}\n", feature.name));
    if let Some(description) = &feature.description {
        out.push_str(&format!("  {}\n", description));
    }
    if !feature.background.is_empty() {
        out.push_str("\n  Background:\n");
        render_step_lines(&feature.background, &mut out);
    }
    for scenario in &feature.scenarios {
        out.push('\n');
        if !scenario.tags.is_empty() {
            out.push_str(&format!("  {}\n", scenario.tags.join(" ")));
        }
        out.push_str(&format!("  Scenario: {}\n", scenario.name));
        render_step_lines(&scenario.steps, &mut out);
    }
    out
}

/// Repeated keywords read as `And`.
fn render_step_lines(steps: &[Step], out: &mut String) {
    let mut previous = None;
    for step in steps {
        let keyword = if previous == Some(step.keyword) {
            StepKeyword::And
        } else {
            step.keyword
        };
        previous = Some(step.keyword);
        out.push_str(&format!("    {} {}\n", keyword.as_str(), step.gherkin_text()));
    }
}

pub fn render_steps(
    set: &ScenarioSet,
    source_name: &str,
    steps_module: &str,
    base_url: Option<&str>,
    generated_at: DateTime<Utc>,
) -> String {
    let mut out = format!(
        "// Generated by bdd-migrate from {} on {}\n",
        source_name,
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(base_url) = base_url {
        out.push_str(&format!(
            "// `goto` paths are relative to baseURL ({}) in playwright.config\n",
            base_url
        ));
    }
    if set.common_js {
        out.push_str(&format!("const {{ createBdd }} = require({});\n", quote(steps_module)));
    } else {
        out.push_str(&format!("import {{ createBdd }} from {};\n", quote(steps_module)));
    }
    out.push_str("\nconst { Given, When, Then } = createBdd();\n");

    for block in &set.preamble {
        out.push('\n');
        out.push_str(block);
        out.push('\n');
    }

    for definition in &set.definitions {
        let mut params = vec!["{ page }".to_string()];
        params.extend(definition.params.iter().cloned());
        out.push_str(&format!(
            "\n{}({}, async ({}) => {{\n",
            definition.keyword.as_str(),
            quote(&definition.text),
            params.join(", ")
        ));
        for line in definition.body.lines() {
            if line.trim().is_empty() {
                out.push('\n');
            } else {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out.push_str("});\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::model::{ParamKind, Scenario, StepDefinition, StepParam};

    fn step(keyword: StepKeyword, text: &str, params: Vec<StepParam>) -> Step {
        Step {
            keyword,
            text: text.to_string(),
            params,
            body: String::new(),
            line: 1,
        }
    }

    fn sample() -> ScenarioSet {
        let url = StepParam {
            name: "url".to_string(),
            kind: ParamKind::String,
            value: "/login".to_string(),
        };
        let feature = Feature {
            name: "Login".to_string(),
            tag: "@migrated".to_string(),
            description: None,
            background: Vec::new(),
            scenarios: vec![Scenario {
                name: "signs in".to_string(),
                tags: vec!["@skip".to_string()],
                steps: vec![
                    step(StepKeyword::Given, "I open {string}", vec![url]),
                    step(StepKeyword::When, "I click the login button", Vec::new()),
                    step(StepKeyword::When, "I wait", Vec::new()),
                    step(StepKeyword::Then, "the page title should be set", Vec::new()),
                ],
            }],
        };
        ScenarioSet {
            feature,
            definitions: vec![StepDefinition {
                keyword: StepKeyword::Given,
                text: "I open {string}".to_string(),
                params: vec!["url".to_string()],
                body: "await page.goto(url);".to_string(),
            }],
            warnings: Vec::new(),
            preamble: vec!["const BASE = '/';".to_string()],
            common_js: false,
        }
    }

    #[test]
    fn test_render_feature_uses_and() {
        let text = render_feature(&sample().feature);
        assert_eq!(
            text,
            "@migrated\nFeature: Login\n\n  @skip\n  Scenario: signs in\n    \
             Given I open \"/login\"\n    When I click the login button\n    \
             And I wait\n    Then the page title should be set\n"
        );
    }

    #[test]
    fn test_render_steps_file() {
        let generated_at = DateTime::parse_from_rfc3339("2026-10-16T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = render_steps(&sample(), "login.js", DEFAULT_STEPS_MODULE, None, generated_at);
        assert!(text.starts_with("// Generated by bdd-migrate from login.js on 2026-10-16 08:00:00 UTC\n"));
        assert!(text.contains("import { createBdd } from 'playwright-bdd';\n"));
        assert!(text.contains("const { Given, When, Then } = createBdd();\n"));
        assert!(text.contains("\nconst BASE = '/';\n"));
        assert!(text.ends_with(
            "Given('I open {string}', async ({ page }, url) => {\n  await page.goto(url);\n});\n"
        ));
    }

    #[test]
    fn test_common_js_steps_file() {
        let mut set = sample();
        set.common_js = true;
        let text = render_steps(&set, "login.js", "playwright-bdd", Some("https://shop.test"), Utc::now());
        assert!(text.contains("const { createBdd } = require('playwright-bdd');"));
        assert!(text.contains("relative to baseURL (https://shop.test)"));
    }
}
