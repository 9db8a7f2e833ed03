//! Per-method rules for picking form control values.

use crate::endpoint::Method;
use crate::error::{Result, ScanError};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::HashMap;

/// Configured value asking the synthesizer to derive one from the control.
pub const INTELLIGENCE: &str = "intelligence";

/// Key used when a control type has no entry of its own.
pub const DEFAULT_KEY: &str = "default";

/// Shipped rules, also written out by `jick init-config`.
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config/form_parameters.toml");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    /// `values[ordinal % len]`
    #[default]
    Positional,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueRule {
    pub values: Vec<String>,
    pub mode: SelectionMode,
}

impl ValueRule {
    pub fn new<S: Into<String>>(values: impl IntoIterator<Item = S>, mode: SelectionMode) -> Self {
        Self {
            values: values.into_iter().map(Into::into).collect(),
            mode,
        }
    }

    pub fn pick<R: Rng + ?Sized>(&self, ordinal: usize, rng: &mut R) -> &str {
        let picked = match self.mode {
            SelectionMode::Positional => self.values.get(ordinal % self.values.len().max(1)),
            SelectionMode::Random => self.values.choose(rng),
        };
        picked.map(String::as_str).unwrap_or(INTELLIGENCE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodRules {
    pub submissions: usize,
    rules: HashMap<String, ValueRule>,
}

impl MethodRules {
    pub fn new(submissions: usize) -> Self {
        Self {
            submissions,
            rules: HashMap::new(),
        }
    }

    pub fn with_rule(mut self, key: &str, rule: ValueRule) -> Self {
        self.rules.insert(key.to_ascii_lowercase(), rule);
        self
    }

    /// Rule for `key`, else the `default` entry, else plain intelligence.
    pub fn rule(&self, key: &str) -> ValueRule {
        self.rules
            .get(&key.to_ascii_lowercase())
            .or_else(|| self.rules.get(DEFAULT_KEY))
            .cloned()
            .unwrap_or_else(|| ValueRule::new([INTELLIGENCE], SelectionMode::Positional))
    }
}

/// Immutable generation settings shared by every synthesizer in a run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    get: MethodRules,
    post: MethodRules,
}

impl GenerationConfig {
    pub fn new(get: MethodRules, post: MethodRules) -> Self {
        Self { get, post }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let raw: RawConfig =
            toml::from_str(content).map_err(|e| ScanError::Config(e.to_string()))?;
        Ok(Self {
            get: raw.get.into_rules("get")?,
            post: raw.post.into_rules("post")?,
        })
    }

    pub fn rules(&self, method: Method) -> &MethodRules {
        match method {
            Method::Get => &self.get,
            Method::Post => &self.post,
        }
    }

    pub fn rule(&self, method: Method, key: &str) -> ValueRule {
        self.rules(method).rule(key)
    }

    pub fn submissions(&self, method: Method) -> usize {
        self.rules(method).submissions
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::from_toml_str(DEFAULT_CONFIG_TOML).expect("bundled form parameters are valid")
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    get: RawSection,
    #[serde(default)]
    post: RawSection,
}

#[derive(Debug, Deserialize)]
struct RawSection {
    #[serde(default = "default_submissions")]
    submissions: usize,
    #[serde(default)]
    mode: SelectionMode,
    #[serde(default)]
    values: HashMap<String, RawRule>,
}

impl Default for RawSection {
    fn default() -> Self {
        Self {
            submissions: default_submissions(),
            mode: SelectionMode::default(),
            values: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRule {
    List(Vec<String>),
    Table {
        values: Vec<String>,
        mode: Option<SelectionMode>,
    },
}

fn default_submissions() -> usize {
    1
}

impl RawSection {
    fn into_rules(self, section: &str) -> Result<MethodRules> {
        let mut rules = MethodRules::new(self.submissions);
        for (key, raw) in self.values {
            let (values, mode) = match raw {
                RawRule::List(values) => (values, self.mode),
                RawRule::Table { values, mode } => (values, mode.unwrap_or(self.mode)),
            };
            if values.is_empty() {
                return Err(ScanError::Config(format!(
                    "[{}.values] entry '{}' has no values",
                    section, key
                )));
            }
            rules = rules.with_rule(&key, ValueRule { values, mode });
        }
        Ok(rules)
    }
}
