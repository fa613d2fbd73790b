//! Typed tool parameters.
//!
//! Every tool declares a fixed list of [`ParamSpec`]s. Updates arrive as a
//! [`ParamMap`] and are checked against the declared domain before anything
//! is stored; text from a UI field is parsed structurally with
//! [`ParamKind::parse`], never evaluated.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, ValidationError};

/// Partial or full set of parameter values, keyed by parameter name.
pub type ParamMap = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Choice(String),
}

impl ParamValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Choice(_) => "choice",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Choice(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::Choice(v.to_string())
    }
}

/// Declared domain of a parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    Int {
        min: i64,
        max: i64,
        odd: bool,
    },
    Float {
        min: f64,
        max: f64,
        min_exclusive: bool,
    },
    Bool,
    Choice {
        options: &'static [&'static str],
    },
}

impl ParamKind {
    fn expected(&self) -> &'static str {
        match self {
            Self::Int { .. } => "int",
            Self::Float { .. } => "float",
            Self::Bool => "bool",
            Self::Choice { .. } => "choice",
        }
    }

    /// Check `value` against this domain, returning the normalized value.
    ///
    /// An `Int` is accepted for a float parameter and an integral `Float`
    /// for an int parameter. Choice names match case-insensitively and are
    /// stored in their declared spelling.
    pub fn check(&self, name: &str, value: &ParamValue) -> Result<ParamValue, ValidationError> {
        let mismatch = || ValidationError::TypeMismatch {
            name: name.to_string(),
            expected: self.expected(),
            found: value.type_name(),
        };

        match self {
            Self::Int { min, max, odd } => {
                let v = match value {
                    ParamValue::Int(v) => *v,
                    ParamValue::Float(f) if f.is_finite() && f.fract() == 0.0 => *f as i64,
                    _ => return Err(mismatch()),
                };
                if v < *min || v > *max {
                    return Err(ValidationError::OutOfRange {
                        name: name.to_string(),
                        value: v as f64,
                        min: *min as f64,
                        max: *max as f64,
                    });
                }
                if *odd && v % 2 == 0 {
                    return Err(ValidationError::NotOdd {
                        name: name.to_string(),
                        value: v,
                    });
                }
                Ok(ParamValue::Int(v))
            }
            Self::Float {
                min,
                max,
                min_exclusive,
            } => {
                let v = match value {
                    ParamValue::Float(f) => *f,
                    ParamValue::Int(i) => *i as f64,
                    _ => return Err(mismatch()),
                };
                let below = if *min_exclusive { v <= *min } else { v < *min };
                if !v.is_finite() || below || v > *max {
                    return Err(ValidationError::OutOfRange {
                        name: name.to_string(),
                        value: v,
                        min: *min,
                        max: *max,
                    });
                }
                Ok(ParamValue::Float(v))
            }
            Self::Bool => match value {
                ParamValue::Bool(_) => Ok(value.clone()),
                _ => Err(mismatch()),
            },
            Self::Choice { options } => {
                let ParamValue::Choice(text) = value else {
                    return Err(mismatch());
                };
                options
                    .iter()
                    .find(|opt| opt.eq_ignore_ascii_case(text.trim()))
                    .map(|opt| ParamValue::Choice((*opt).to_string()))
                    .ok_or_else(|| ValidationError::InvalidChoice {
                        name: name.to_string(),
                        value: text.clone(),
                        options: options.iter().map(|o| (*o).to_string()).collect(),
                    })
            }
        }
    }

    /// Parse caller-supplied text as a literal of this kind and check it.
    pub fn parse(&self, name: &str, text: &str) -> Result<ParamValue, ValidationError> {
        let text = text.trim();
        let unparseable = || ValidationError::Unparseable {
            name: name.to_string(),
            text: text.to_string(),
            expected: self.expected(),
        };

        let value = match self {
            Self::Int { .. } => match text.parse::<i64>() {
                Ok(v) => ParamValue::Int(v),
                Err(_) => ParamValue::Float(text.parse::<f64>().map_err(|_| unparseable())?),
            },
            Self::Float { .. } => ParamValue::Float(text.parse::<f64>().map_err(|_| unparseable())?),
            Self::Bool => match text.to_ascii_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => ParamValue::Bool(true),
                "false" | "no" | "off" | "0" => ParamValue::Bool(false),
                _ => return Err(unparseable()),
            },
            Self::Choice { .. } => ParamValue::Choice(text.to_string()),
        };
        self.check(name, &value)
    }
}

/// A named parameter with its domain and default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub default: ParamValue,
}

impl ParamSpec {
    pub fn int(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int {
                min,
                max,
                odd: false,
            },
            default: ParamValue::Int(default),
        }
    }

    /// Odd integer in `min..=max`, the usual shape of a kernel size.
    pub fn odd(name: &'static str, default: i64, min: i64, max: i64) -> Self {
        Self {
            name,
            kind: ParamKind::Int {
                min,
                max,
                odd: true,
            },
            default: ParamValue::Int(default),
        }
    }

    pub fn float(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float {
                min,
                max,
                min_exclusive: false,
            },
            default: ParamValue::Float(default),
        }
    }

    /// Float in `(min, max]`.
    pub fn positive(name: &'static str, default: f64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Float {
                min,
                max,
                min_exclusive: true,
            },
            default: ParamValue::Float(default),
        }
    }

    pub fn flag(name: &'static str, default: bool) -> Self {
        Self {
            name,
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
        }
    }

    pub fn choice(
        name: &'static str,
        default: &'static str,
        options: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Choice { options },
            default: ParamValue::Choice(default.to_string()),
        }
    }
}

/// Current values of a tool's declared parameters, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    entries: Vec<(ParamSpec, ParamValue)>,
}

impl ParamSet {
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        let entries = specs
            .into_iter()
            .map(|spec| {
                let value = spec.default.clone();
                (spec, value)
            })
            .collect();
        Self { entries }
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn specs(&self) -> impl Iterator<Item = &ParamSpec> {
        self.entries.iter().map(|(spec, _)| spec)
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(spec, _)| spec.name == name)
            .map(|(_, value)| value)
    }

    pub fn spec(&self, name: &str) -> Option<&ParamSpec> {
        self.specs().find(|spec| spec.name == name)
    }

    pub fn to_map(&self) -> ParamMap {
        self.entries
            .iter()
            .map(|(spec, value)| (spec.name.to_string(), value.clone()))
            .collect()
    }

    /// Build a candidate set with `updates` applied. `self` is untouched;
    /// the first invalid entry rejects the whole update.
    pub fn with_updates(&self, updates: &ParamMap) -> Result<Self, ValidationError> {
        let mut candidate = self.clone();
        for (name, value) in updates {
            let (spec, slot) = candidate
                .entries
                .iter_mut()
                .find(|(spec, _)| spec.name == name)
                .ok_or_else(|| ValidationError::UnknownParameter(name.clone()))?;
            *slot = spec.kind.check(name, value)?;
        }
        Ok(candidate)
    }

    /// Allowed values of every enumerated parameter.
    pub fn choice_options(&self) -> BTreeMap<String, Vec<String>> {
        self.specs()
            .filter_map(|spec| match spec.kind {
                ParamKind::Choice { options } => Some((
                    spec.name.to_string(),
                    options.iter().map(|o| (*o).to_string()).collect(),
                )),
                _ => None,
            })
            .collect()
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ProcessingError> {
        match self.get(name) {
            Some(ParamValue::Int(v)) => Ok(*v),
            _ => Err(missing(name)),
        }
    }

    pub fn get_float(&self, name: &str) -> Result<f64, ProcessingError> {
        match self.get(name) {
            Some(ParamValue::Float(v)) => Ok(*v),
            Some(ParamValue::Int(v)) => Ok(*v as f64),
            _ => Err(missing(name)),
        }
    }

    pub fn get_bool(&self, name: &str) -> Result<bool, ProcessingError> {
        match self.get(name) {
            Some(ParamValue::Bool(v)) => Ok(*v),
            _ => Err(missing(name)),
        }
    }

    pub fn get_choice(&self, name: &str) -> Result<&str, ProcessingError> {
        match self.get(name) {
            Some(ParamValue::Choice(v)) => Ok(v.as_str()),
            _ => Err(missing(name)),
        }
    }
}

fn missing(name: &str) -> ProcessingError {
    ProcessingError::Failed(format!("parameter `{name}` is missing or mistyped"))
}
