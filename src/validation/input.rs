use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A submitted request field. Deserializing never fails, so a wrongly typed
/// value still reaches the validator instead of rejecting the whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Text(String),
    /// Any JSON value other than a string or null.
    NotText,
}

impl Input {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Input::Text(s) => Some(s),
            Input::NotText => None,
        }
    }

    pub fn map_text(&self, f: impl FnOnce(&str) -> String) -> Input {
        match self {
            Input::Text(s) => Input::Text(f(s)),
            Input::NotText => Input::NotText,
        }
    }
}

impl From<&str> for Input {
    fn from(s: &str) -> Self {
        Input::Text(s.to_string())
    }
}

impl<'de> Deserialize<'de> for Input {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Input::Text(s),
            _ => Input::NotText,
        })
    }
}

/// What a rule sees for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Missing,
    Text(&'a str),
    NotText,
}

impl<'a> FieldValue<'a> {
    pub fn text(self) -> Option<&'a str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Missing, or text that is empty after trimming.
    pub fn is_blank(self) -> bool {
        match self {
            FieldValue::Missing => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::NotText => false,
        }
    }
}

impl<'a> From<Option<&'a str>> for FieldValue<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(FieldValue::Missing, FieldValue::Text)
    }
}

impl<'a> From<Option<&'a Input>> for FieldValue<'a> {
    fn from(value: Option<&'a Input>) -> Self {
        match value {
            None => FieldValue::Missing,
            Some(Input::Text(s)) => FieldValue::Text(s),
            Some(Input::NotText) => FieldValue::NotText,
        }
    }
}
