//! Action blueprints: the static shape of each action kind.
//!
//! A blueprint names the tag, declares its parameters and how to read them,
//! and carries the scheduling flags the dispatcher uses.

use codewright_core::error::{ActionError, ParamProblem};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::tags::{extract_tag, split_lines};

/// How a parameter's raw text is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// Free text, kept as-is
    Text,
    /// A decimal number, optionally bounded (inclusive)
    Number { min: Option<f64>, max: Option<f64> },
    /// One entry per non-blank line
    Lines,
    /// An `http://` or `https://` URL
    Url,
}

impl ParamKind {
    fn expected(&self) -> String {
        match self {
            Self::Text => "text".into(),
            Self::Number {
                min: Some(min),
                max: Some(max),
            } => format!("number between {min} and {max}"),
            Self::Number { min: Some(min), .. } => format!("number >= {min}"),
            Self::Number { max: Some(max), .. } => format!("number <= {max}"),
            Self::Number { .. } => "number".into(),
            Self::Lines => "list of lines".into(),
            Self::Url => "http(s) URL".into(),
        }
    }
}

/// Where a parameter's raw text lives inside the action tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// A `<name>…</name>` child element
    Child,
    /// The whole inner text of the action tag
    Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: ParamKind,
    pub source: ParamSource,
}

impl ParamSpec {
    /// A required text child.
    pub fn text(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            kind: ParamKind::Text,
            source: ParamSource::Child,
        }
    }

    pub fn number(name: &'static str, min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            name,
            required: true,
            kind: ParamKind::Number { min, max },
            source: ParamSource::Child,
        }
    }

    pub fn lines(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            kind: ParamKind::Lines,
            source: ParamSource::Child,
        }
    }

    pub fn url(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            kind: ParamKind::Url,
            source: ParamSource::Child,
        }
    }

    /// Read this parameter from the whole tag body instead of a child.
    pub fn body(mut self) -> Self {
        self.source = ParamSource::Body;
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// A parsed, typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    Lines(Vec<String>),
}

/// Parsed parameters for one invocation, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamBag {
    values: BTreeMap<String, ParamValue>,
}

impl ParamBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ParamValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ParamValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn lines(&self, name: &str) -> Option<&[String]> {
        match self.values.get(name) {
            Some(ParamValue::Lines(l)) => Some(l),
            _ => None,
        }
    }

    /// A text parameter the blueprint marks as required.
    pub fn require_text(&self, action: &str, name: &str) -> Result<&str, ActionError> {
        self.text(name)
            .ok_or_else(|| ActionError::missing(action, name))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Static registration record for one action kind.
#[derive(Debug, Clone)]
pub struct ActionBlueprint {
    /// Case-sensitive tag name
    pub tag: &'static str,

    /// Lower runs first when actions execute sequentially
    pub priority: u8,

    /// Safe to run concurrently with other parallel-safe actions
    pub can_run_in_parallel: bool,

    /// The runner inspects this action's parameters after it executes
    pub requires_post_processing: bool,

    /// A failure here does not stop the rest of a sequential round
    pub best_effort: bool,

    pub parameters: Vec<ParamSpec>,

    /// Correctly tagged usage, shown when the model gets the markup wrong
    pub example: &'static str,
}

impl ActionBlueprint {
    pub fn new(tag: &'static str, priority: u8) -> Self {
        Self {
            tag,
            priority,
            can_run_in_parallel: false,
            requires_post_processing: false,
            best_effort: false,
            parameters: Vec::new(),
            example: "",
        }
    }

    pub fn with_param(mut self, spec: ParamSpec) -> Self {
        self.parameters.push(spec);
        self
    }

    pub fn with_example(mut self, example: &'static str) -> Self {
        self.example = example;
        self
    }

    pub fn parallel(mut self) -> Self {
        self.can_run_in_parallel = true;
        self
    }

    pub fn post_processed(mut self) -> Self {
        self.requires_post_processing = true;
        self
    }

    pub fn best_effort(mut self) -> Self {
        self.best_effort = true;
        self
    }

    /// Extract and type-check every declared parameter from the tag's inner
    /// text. Fails on the first missing or malformed required parameter.
    pub fn parse_params(&self, inner: &str) -> Result<ParamBag, ActionError> {
        let mut bag = ParamBag::new();

        for spec in &self.parameters {
            let raw = match spec.source {
                ParamSource::Child => extract_tag(inner, spec.name),
                ParamSource::Body => Some(inner.trim().to_string()),
            };

            let raw = match raw {
                Some(r) if !r.is_empty() => r,
                _ if spec.required => return Err(ActionError::missing(self.tag, spec.name)),
                _ => continue,
            };

            let value = self.convert(spec, raw)?;
            bag.insert(spec.name, value);
        }

        Ok(bag)
    }

    fn convert(&self, spec: &ParamSpec, raw: String) -> Result<ParamValue, ActionError> {
        let wrong_type = |found: &str| ActionError::Validation {
            action: self.tag.to_string(),
            param: spec.name.to_string(),
            problem: ParamProblem::WrongType {
                expected: spec.kind.expected(),
                found: found.to_string(),
            },
        };

        match &spec.kind {
            ParamKind::Text => Ok(ParamValue::Text(raw)),
            ParamKind::Lines => Ok(ParamValue::Lines(split_lines(&raw))),
            ParamKind::Url => {
                if raw.starts_with("http://") || raw.starts_with("https://") {
                    Ok(ParamValue::Text(raw))
                } else {
                    Err(wrong_type(&raw))
                }
            }
            ParamKind::Number { min, max } => {
                let n: f64 = raw.parse().map_err(|_| wrong_type(&raw))?;
                if !n.is_finite()
                    || min.is_some_and(|m| n < m)
                    || max.is_some_and(|m| n > m)
                {
                    return Err(wrong_type(&raw));
                }
                Ok(ParamValue::Number(n))
            }
        }
    }
}
