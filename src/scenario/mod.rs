//! Gherkin feature and playwright-bdd step generation.

pub mod builder;
pub mod model;
pub mod render;

pub use builder::{build_feature, humanize, normalize_tag, ScenarioOptions};
pub use model::{Feature, Scenario, ScenarioSet, Step, StepDefinition, StepKeyword};
pub use render::{render_feature, render_steps, DEFAULT_STEPS_MODULE};
