use std::fmt;

use crate::Value;

/// Array index of an indexed property path: `device[4000]` or
/// `extraConfig["guestinfo.ip"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKey {
    Int(i32),
    Str(String),
}

/// Parsed property path.
///
/// Grammar: `path`, `path[<int>]` or `path["<string>"]`, the indexed forms
/// optionally followed by `.item`. `path` itself may be dotted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub path: String,
    pub key: Option<FieldKey>,
    pub item: Option<String>,
}

impl Field {
    /// Returns `None` for malformed paths.
    pub fn parse(spec: &str) -> Option<Self> {
        let Some(open) = spec.find('[') else {
            if !valid_path(spec) {
                return None;
            }
            return Some(Field {
                path: spec.to_string(),
                key: None,
                item: None,
            });
        };

        let path = &spec[..open];
        if !valid_path(path) {
            return None;
        }

        let rest = &spec[open + 1..];
        let close = rest.find(']')?;
        let key = parse_key(&rest[..close])?;

        let tail = &rest[close + 1..];
        let item = if tail.is_empty() {
            None
        } else {
            let item = tail.strip_prefix('.')?;
            if !valid_path(item) {
                return None;
            }
            Some(item.to_string())
        };

        Some(Field {
            path: path.to_string(),
            key: Some(key),
            item,
        })
    }

    /// The path without its trailing `.item`: `device[4000]` for
    /// `device[4000].backing`.
    pub fn element(&self) -> Field {
        Field {
            path: self.path.clone(),
            key: self.key.clone(),
            item: None,
        }
    }

    /// First dotted segment; the property name on the owning object.
    pub fn root(&self) -> &str {
        self.path.split('.').next().unwrap_or(&self.path)
    }

    pub fn is_indexed(&self) -> bool {
        self.key.is_some()
    }
}

impl FieldKey {
    /// True when `element` is the array element this key selects.
    pub fn selects(
        &self,
        element: &Value,
    ) -> bool {
        match (self, element.element_key()) {
            (FieldKey::Int(i), Some(Value::Int(k))) => i64::from(*i) == *k,
            (FieldKey::Str(s), Some(Value::String(k))) => s == k,
            _ => false,
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            FieldKey::Int(i) => write!(f, "{i}"),
            FieldKey::Str(s) => write!(f, "\"{s}\""),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.path)?;
        if let Some(key) = &self.key {
            write!(f, "[{key}]")?;
        }
        if let Some(item) = &self.item {
            write!(f, ".{item}")?;
        }
        Ok(())
    }
}

fn valid_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}

fn parse_key(raw: &str) -> Option<FieldKey> {
    if let Some(quoted) = raw.strip_prefix('"') {
        let s = quoted.strip_suffix('"')?;
        if s.contains('"') {
            return None;
        }
        return Some(FieldKey::Str(s.to_string()));
    }
    raw.parse::<i32>().ok().map(FieldKey::Int)
}
