//! Dynamic configuration trees with defined-key discipline.
//!
//! A [`Params`] node is a runtime-configurable store of named values that
//! supports nested nodes, dotted-path access, list indexing, freezing, and
//! deep copy. Every key must be defined (with a default and a description)
//! before it can be read or assigned, so typos surface as errors instead of
//! silently creating new configuration.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConfigError, Result};
use crate::value::Value;

static PARAM_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("valid param regex"));

/// A single parameter entry: current value plus the description given at
/// definition time.
#[derive(Clone, Debug)]
pub(crate) struct ParamEntry {
    pub(crate) value: Value,
    pub(crate) description: String,
}

/// Configuration node with dotted-path access and freeze semantics.
#[derive(Clone, Debug, Default)]
pub struct Params {
    frozen: bool,
    pub(crate) entries: BTreeMap<String, ParamEntry>,
}

impl Params {
    /// Creates an empty, mutable node.
    pub fn new() -> Self {
        Self {
            frozen: false,
            entries: BTreeMap::new(),
        }
    }

    /// Defines a parameter with a default value and description.
    ///
    /// The name must match `^[a-z][a-z0-9_]*$` and must not already be
    /// defined on this node. Dotted paths are not accepted here; nesting
    /// is expressed by defining a child [`Params`] value.
    pub fn define(
        &mut self,
        name: &str,
        default_value: impl Into<Value>,
        description: &str,
    ) -> Result<()> {
        if self.frozen {
            return Err(ConfigError::Frozen {
                name: name.to_string(),
            });
        }
        if !PARAM_NAME_RE.is_match(name) {
            return Err(ConfigError::InvalidName {
                name: name.to_string(),
            });
        }
        if self.entries.contains_key(name) {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
            });
        }
        self.entries.insert(
            name.to_string(),
            ParamEntry {
                value: default_value.into(),
                description: description.to_string(),
            },
        );
        Ok(())
    }

    /// Returns true if the parameter is defined on this node.
    ///
    /// Only immediate keys are checked; dotted paths always return false.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Freezes this node and, transitively, every nested node reachable
    /// through its values (including nodes inside lists and dicts).
    pub fn freeze(&mut self) {
        if self.frozen {
            return;
        }
        self.frozen = true;
        for entry in self.entries.values_mut() {
            freeze_value(&mut entry.value);
        }
    }

    /// Returns whether this node is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns a deep copy of this node.
    ///
    /// Copies of a frozen node are themselves frozen; thaw by rebuilding
    /// from a template, not by copying.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Sets a parameter using dotted-path notation.
    ///
    /// The key must already be defined; assignment never creates keys.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.frozen {
            return Err(ConfigError::Frozen {
                name: name.to_string(),
            });
        }
        let (parent, key) = self.resolve_mut(name)?;
        if parent.frozen {
            return Err(ConfigError::Frozen {
                name: name.to_string(),
            });
        }
        match parent.entries.get_mut(&key) {
            Some(entry) => {
                entry.value = value.into();
                Ok(())
            }
            None => Err(parent.undefined_error(name, &key)),
        }
    }

    /// Gets a parameter using dotted-path notation.
    pub fn get(&self, name: &str) -> Result<&Value> {
        let (parent, key) = self.resolve(name)?;
        match parent.entries.get(&key) {
            Some(entry) => Ok(&entry.value),
            None => Err(parent.undefined_error(name, &key)),
        }
    }

    /// Returns the description recorded when `name` was defined.
    pub fn description(&self, name: &str) -> Result<&str> {
        let (parent, key) = self.resolve(name)?;
        match parent.entries.get(&key) {
            Some(entry) => Ok(entry.description.as_str()),
            None => Err(parent.undefined_error(name, &key)),
        }
    }

    /// Deletes a parameter using dotted-path notation.
    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.frozen {
            return Err(ConfigError::Frozen {
                name: name.to_string(),
            });
        }
        let (parent, key) = self.resolve_mut(name)?;
        if parent.frozen {
            return Err(ConfigError::Frozen {
                name: name.to_string(),
            });
        }
        if parent.entries.remove(&key).is_none() {
            let err = parent.undefined_error(name, &key);
            return Err(err);
        }
        Ok(())
    }

    /// Returns an iterator over the immediate (name, value) pairs, in
    /// sorted key order.
    pub fn iter_params(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.value))
    }

    /// Number of immediate keys on this node.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the node has no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Typed getter for `i64` values.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.get(name)? {
            Value::Int(v) => Ok(*v),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "int",
            }),
        }
    }

    /// Typed getter for `f64` values. Integer values widen.
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        match self.get(name)? {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "float",
            }),
        }
    }

    /// Typed getter for `bool` values.
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name)? {
            Value::Bool(v) => Ok(*v),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "bool",
            }),
        }
    }

    /// Typed getter for string values.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.get(name)? {
            Value::String(v) => Ok(v.as_str()),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "str",
            }),
        }
    }

    /// Typed getter for optional string values: `None` maps to `Ok(None)`.
    pub fn get_opt_str(&self, name: &str) -> Result<Option<&str>> {
        match self.get(name)? {
            Value::None => Ok(None),
            Value::String(v) => Ok(Some(v.as_str())),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "str or None",
            }),
        }
    }

    /// Typed getter for nested nodes.
    pub fn get_params(&self, name: &str) -> Result<&Params> {
        match self.get(name)? {
            Value::Params(p) => Ok(p.as_ref()),
            _ => Err(ConfigError::WrongType {
                key: name.to_string(),
                expected: "params",
            }),
        }
    }

    fn resolve<'a>(&'a self, name: &str) -> Result<(&'a Params, String)> {
        let parts: Vec<&str> = name.split('.').collect();
        self.resolve_parts(&parts, name)
    }

    fn resolve_parts<'a>(&'a self, parts: &[&str], full: &str) -> Result<(&'a Params, String)> {
        if parts.len() <= 1 {
            let key = parts.first().copied().unwrap_or(full);
            return Ok((self, key.to_string()));
        }
        let (base, index) = parse_list_index(parts[0])?;
        let entry = match self.entries.get(base) {
            Some(entry) => entry,
            None => return Err(self.undefined_error(full, base)),
        };
        let next = match (&entry.value, index) {
            (Value::Params(p), None) => p.as_ref(),
            (Value::List(list), Some(idx)) => match list.get(idx) {
                Some(Value::Params(p)) => p.as_ref(),
                _ => {
                    return Err(ConfigError::InvalidListIndex {
                        segment: parts[0].to_string(),
                    })
                }
            },
            _ => {
                return Err(ConfigError::CannotIntrospect {
                    segment: parts[0].to_string(),
                    path: full.to_string(),
                })
            }
        };
        next.resolve_parts(&parts[1..], full)
    }

    fn resolve_mut<'a>(&'a mut self, name: &str) -> Result<(&'a mut Params, String)> {
        let parts: Vec<&str> = name.split('.').collect();
        self.resolve_parts_mut(&parts, name)
    }

    fn resolve_parts_mut<'a>(
        &'a mut self,
        parts: &[&str],
        full: &str,
    ) -> Result<(&'a mut Params, String)> {
        if parts.len() <= 1 {
            let key = parts.first().copied().unwrap_or(full);
            return Ok((self, key.to_string()));
        }
        let (base, index) = parse_list_index(parts[0])?;
        if !self.entries.contains_key(base) {
            return Err(self.undefined_error(full, base));
        }
        let segment = parts[0].to_string();
        let entry = match self.entries.get_mut(base) {
            Some(entry) => entry,
            None => {
                return Err(ConfigError::UndefinedName {
                    name: full.to_string(),
                    suggestions: Vec::new(),
                })
            }
        };
        let next = match (&mut entry.value, index) {
            (Value::Params(p), None) => p.as_mut(),
            (Value::List(list), Some(idx)) => match list.get_mut(idx) {
                Some(Value::Params(p)) => p.as_mut(),
                _ => return Err(ConfigError::InvalidListIndex { segment }),
            },
            _ => {
                return Err(ConfigError::CannotIntrospect {
                    segment,
                    path: full.to_string(),
                })
            }
        };
        next.resolve_parts_mut(&parts[1..], full)
    }

    fn undefined_error(&self, full: &str, key: &str) -> ConfigError {
        ConfigError::UndefinedName {
            name: full.to_string(),
            suggestions: self.similar_keys(key),
        }
    }

    fn similar_keys(&self, name: &str) -> Vec<String> {
        // Trigram overlap; a candidate is suggested when more than half of
        // the requested name's trigrams occur in it. Trigrams are built over
        // chars, so a misspelled non-ASCII name degrades to no suggestions
        // instead of slicing mid-character.
        fn overlap(name: &str, key: &str) -> f32 {
            let chars: Vec<char> = name.chars().collect();
            if chars.len() < 3 || key.chars().count() < 3 {
                return 0.0;
            }
            let mut matches = 0;
            for tri in chars.windows(3) {
                let tri: String = tri.iter().collect();
                if key.contains(&tri) {
                    matches += 1;
                }
            }
            matches as f32 / (chars.len() - 2) as f32
        }
        self.entries
            .keys()
            .filter(|k| overlap(name, k) > 0.5)
            .cloned()
            .collect()
    }
}

impl PartialEq for Params {
    /// Structural equality over keys and values; freeze state and
    /// descriptions do not participate.
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((ka, ea), (kb, eb))| ka == kb && ea.value == eb.value)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{{")?;
        for (key, entry) in &self.entries {
            writeln!(f, "  {}: {}", key, crate::text::render_debug(&entry.value))?;
        }
        write!(f, "}}")
    }
}

fn freeze_value(value: &mut Value) {
    match value {
        Value::Params(p) => p.freeze(),
        Value::List(items) => {
            for item in items {
                freeze_value(item);
            }
        }
        Value::Dict(items) => {
            for item in items.values_mut() {
                freeze_value(item);
            }
        }
        _ => {}
    }
}

pub(crate) fn parse_list_index(part: &str) -> Result<(&str, Option<usize>)> {
    if let Some(start) = part.find('[') {
        let end = part.find(']').ok_or_else(|| ConfigError::InvalidListIndex {
            segment: part.to_string(),
        })?;
        let base = &part[..start];
        let idx: usize =
            part[start + 1..end]
                .parse()
                .map_err(|_| ConfigError::InvalidListIndex {
                    segment: part.to_string(),
                })?;
        Ok((base, Some(idx)))
    } else {
        Ok((part, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inner() -> Params {
        let mut p = Params::new();
        p.define("alpha", 2_i64, "An int").unwrap();
        p.define("beta", Value::None, "Unset").unwrap();
        p
    }

    fn outer() -> Params {
        let mut p = Params::new();
        p.define("activation", "RELU", "Activation function").unwrap();
        p.define("cost", 0.5, "Cost function").unwrap();
        p.define("inner", inner(), "Nested node").unwrap();
        p
    }

    #[test]
    fn test_define_and_get() {
        let p = outer();
        assert_eq!(p.get_str("activation").unwrap(), "RELU");
        assert_eq!(p.get_f64("cost").unwrap(), 0.5);
        assert_eq!(p.get_i64("inner.alpha").unwrap(), 2);
        assert!(p.contains("cost"));
        assert!(!p.contains("inner.alpha"));
    }

    #[test]
    fn test_define_rejects_bad_names() {
        let mut p = Params::new();
        assert!(matches!(
            p.define("_foo", 1_i64, ""),
            Err(ConfigError::InvalidName { .. })
        ));
        assert!(matches!(
            p.define("Foo", 1_i64, ""),
            Err(ConfigError::InvalidName { .. })
        ));
        p.define("foo", 1_i64, "").unwrap();
        assert!(matches!(
            p.define("foo", 2_i64, ""),
            Err(ConfigError::DuplicateName { .. })
        ));
    }

    #[test]
    fn test_set_requires_defined_key() {
        let mut p = outer();
        p.set("activation", "TANH").unwrap();
        assert_eq!(p.get_str("activation").unwrap(), "TANH");
        let err = p.set("actuvation", "TANH").unwrap_err();
        assert_eq!(err.to_string(), "actuvation (did you mean: [activation])");
    }

    #[test]
    fn test_nested_set_and_delete() {
        let mut p = outer();
        p.set("inner.alpha", 7_i64).unwrap();
        assert_eq!(p.get_i64("inner.alpha").unwrap(), 7);
        p.delete("inner.beta").unwrap();
        assert!(matches!(
            p.get("inner.beta"),
            Err(ConfigError::UndefinedName { .. })
        ));
        // deleting from the parent leaves the child untouched
        p.delete("cost").unwrap();
        assert_eq!(p.get_i64("inner.alpha").unwrap(), 7);
    }

    #[test]
    fn test_undefined_non_ascii_name_is_an_error() {
        // Names with multi-byte characters can never be defined, but asking
        // for one must surface an error, not a panic.
        let mut p = outer();
        let err = p.get("aктивация").unwrap_err();
        assert!(matches!(err, ConfigError::UndefinedName { .. }));
        assert!(matches!(
            p.set("köst", 1.0),
            Err(ConfigError::UndefinedName { .. })
        ));
        assert!(matches!(
            p.get("cöst.alpha"),
            Err(ConfigError::UndefinedName { .. })
        ));
    }

    #[test]
    fn test_intermediate_miss_reports_full_path() {
        let p = outer();
        let err = p.get("otter.alpha").unwrap_err();
        assert!(err.to_string().starts_with("otter.alpha"));
    }

    #[test]
    fn test_cannot_introspect_scalar() {
        let p = outer();
        let err = p.get("cost.alpha").unwrap_err();
        assert_eq!(err.to_string(), "cannot introspect cost for cost.alpha");
    }

    #[test]
    fn test_list_index_paths() {
        let mut p = Params::new();
        let mut first = Params::new();
        first.define("gamma", 1_i64, "").unwrap();
        let mut second = Params::new();
        second.define("gamma", 2_i64, "").unwrap();
        p.define("stages", vec![Value::from(first), Value::from(second)], "")
            .unwrap();
        assert_eq!(p.get_i64("stages[1].gamma").unwrap(), 2);
        p.set("stages[0].gamma", 9_i64).unwrap();
        assert_eq!(p.get_i64("stages[0].gamma").unwrap(), 9);
        assert!(matches!(
            p.get("stages[5].gamma"),
            Err(ConfigError::InvalidListIndex { .. })
        ));
    }

    #[test]
    fn test_freeze_is_deep_and_copies_stay_frozen() {
        let mut p = outer();
        p.freeze();
        assert!(p.is_frozen());
        assert!(matches!(
            p.set("activation", "TANH"),
            Err(ConfigError::Frozen { .. })
        ));
        assert!(matches!(
            p.set("inner.alpha", 3_i64),
            Err(ConfigError::Frozen { .. })
        ));
        assert!(matches!(
            p.delete("cost"),
            Err(ConfigError::Frozen { .. })
        ));
        assert!(matches!(
            p.define("extra", 1_i64, ""),
            Err(ConfigError::Frozen { .. })
        ));
        // reads still work
        assert_eq!(p.get_str("activation").unwrap(), "RELU");
        let q = p.copy();
        assert!(q.is_frozen());
    }

    #[test]
    fn test_freeze_reaches_params_inside_lists() {
        let mut nested = Params::new();
        nested.define("gamma", 1_i64, "").unwrap();
        let mut p = Params::new();
        p.define("stages", vec![Value::from(nested)], "").unwrap();
        p.freeze();
        assert!(matches!(
            p.set("stages[0].gamma", 2_i64),
            Err(ConfigError::Frozen { .. })
        ));
    }

    #[test]
    fn test_copy_is_deep() {
        let mut p = outer();
        let q = p.copy();
        p.set("inner.alpha", 11_i64).unwrap();
        assert_eq!(q.get_i64("inner.alpha").unwrap(), 2);
        assert_ne!(p, q);
    }

    #[test]
    fn test_equality_ignores_descriptions_and_freeze() {
        let mut a = Params::new();
        a.define("x", 1_i64, "one description").unwrap();
        let mut b = Params::new();
        b.define("x", 1_i64, "another description").unwrap();
        assert_eq!(a, b);
        b.freeze();
        assert_eq!(a, b);
        a.set("x", 2_i64).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_description_accessor() {
        let p = outer();
        assert_eq!(p.description("cost").unwrap(), "Cost function");
        assert_eq!(p.description("inner.alpha").unwrap(), "An int");
    }
}
