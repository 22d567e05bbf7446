//! Structured, typed serialization for [`Params`] trees.
//!
//! Unlike the flat text form, the structured form keeps every value tagged
//! with its type, so a tree round-trips without a template or type
//! overrides. Opaque values have no structural representation and are
//! rejected.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::hyperparams::Params;
use crate::value::{ProtoValue, Value};

/// Serializable form of a whole tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamsProto {
    pub entries: BTreeMap<String, ValueProto>,
}

/// Serializable, type-tagged form of a single value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ValueProto {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<ValueProto>),
    Dict(BTreeMap<String, ValueProto>),
    Params(ParamsProto),
    TypeRef { module: String, name: String },
    Proto {
        module: String,
        message: String,
        field: String,
        value: Box<ValueProto>,
    },
}

impl Params {
    /// Converts the tree to its structured form.
    pub fn to_proto(&self) -> Result<ParamsProto> {
        let mut entries = BTreeMap::new();
        for (name, value) in self.iter_params() {
            entries.insert(name.to_string(), value_to_proto(name, value)?);
        }
        Ok(ParamsProto { entries })
    }

    /// Rebuilds a tree from its structured form. All keys are defined with
    /// empty descriptions; the result is mutable.
    pub fn from_proto(proto: &ParamsProto) -> Result<Params> {
        let mut params = Params::new();
        for (name, value) in &proto.entries {
            params.define(name, value_from_proto(value), "")?;
        }
        Ok(params)
    }

    /// Serializes the structured form as JSON.
    pub fn to_proto_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_proto()?).map_err(|e| {
            ConfigError::Serialization {
                message: e.to_string(),
            }
        })
    }

    /// Rebuilds a tree from the JSON structured form.
    pub fn from_proto_json(json: &str) -> Result<Params> {
        let proto: ParamsProto =
            serde_json::from_str(json).map_err(|e| ConfigError::Serialization {
                message: e.to_string(),
            })?;
        Params::from_proto(&proto)
    }
}

fn value_to_proto(key: &str, value: &Value) -> Result<ValueProto> {
    Ok(match value {
        Value::None => ValueProto::None,
        Value::Bool(v) => ValueProto::Bool(*v),
        Value::Int(v) => ValueProto::Int(*v),
        Value::Float(v) => ValueProto::Float(*v),
        Value::String(v) => ValueProto::String(v.clone()),
        Value::List(items) => ValueProto::List(
            items
                .iter()
                .map(|v| value_to_proto(key, v))
                .collect::<Result<_>>()?,
        ),
        Value::Dict(items) => ValueProto::Dict(
            items
                .iter()
                .map(|(k, v)| Ok((k.clone(), value_to_proto(key, v)?)))
                .collect::<Result<_>>()?,
        ),
        Value::Params(p) => ValueProto::Params(p.to_proto()?),
        Value::TypeRef { module, name } => ValueProto::TypeRef {
            module: module.clone(),
            name: name.clone(),
        },
        Value::Proto(p) => ValueProto::Proto {
            module: p.module.clone(),
            message: p.message.clone(),
            field: p.field.clone(),
            value: Box::new(value_to_proto(key, &p.value)?),
        },
        Value::Opaque(_) => {
            return Err(ConfigError::Serialization {
                message: format!("opaque value at {key} cannot be structurally serialized"),
            })
        }
    })
}

fn value_from_proto(proto: &ValueProto) -> Value {
    match proto {
        ValueProto::None => Value::None,
        ValueProto::Bool(v) => Value::Bool(*v),
        ValueProto::Int(v) => Value::Int(*v),
        ValueProto::Float(v) => Value::Float(*v),
        ValueProto::String(v) => Value::String(v.clone()),
        ValueProto::List(items) => Value::List(items.iter().map(value_from_proto).collect()),
        ValueProto::Dict(items) => Value::Dict(
            items
                .iter()
                .map(|(k, v)| (k.clone(), value_from_proto(v)))
                .collect(),
        ),
        ValueProto::Params(p) => match Params::from_proto(p) {
            Ok(params) => Value::from(params),
            // from_proto only fails on invalid names, which to_proto
            // cannot produce; fall back to an empty node.
            Err(_) => Value::from(Params::new()),
        },
        ValueProto::TypeRef { module, name } => Value::type_ref(module.clone(), name.clone()),
        ValueProto::Proto {
            module,
            message,
            field,
            value,
        } => Value::Proto(ProtoValue {
            module: module.clone(),
            message: message.clone(),
            field: field.clone(),
            value: Box::new(value_from_proto(value)),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Params {
        let mut inner = Params::new();
        inner.define("float_val", 2.71, "").unwrap();
        inner.define("string_val", "rosalie et adrien", "").unwrap();
        inner.define("bool_val", true, "").unwrap();
        inner
            .define("range", (1_i64..3).collect::<Value>(), "")
            .unwrap();
        let mut outer = Params::new();
        outer.define("integer_val", 1_i64, "").unwrap();
        outer
            .define("cls_type", Value::type_ref("builtins", "int"), "")
            .unwrap();
        outer.define("inner", inner, "").unwrap();
        outer.define("empty_list", Vec::<Value>::new(), "").unwrap();
        outer
            .define("empty_dict", BTreeMap::<String, Value>::new(), "")
            .unwrap();
        outer
            .define(
                "payload",
                ProtoValue::new("runtime", "StepSpec", "int_val", 42_i64),
                "",
            )
            .unwrap();
        outer.define("nothing", Value::None, "").unwrap();
        outer
    }

    #[test]
    fn test_proto_round_trip() {
        let outer = sample();
        let rebuilt = Params::from_proto(&outer.to_proto().unwrap()).unwrap();
        assert_eq!(rebuilt, outer);
        assert_eq!(rebuilt.get_i64("integer_val").unwrap(), 1);
        assert_eq!(rebuilt.get_f64("inner.float_val").unwrap(), 2.71);
        assert_eq!(
            rebuilt.get("inner.range").unwrap(),
            &Value::List(vec![Value::Int(1), Value::Int(2)])
        );
        assert_eq!(rebuilt.get("empty_list").unwrap(), &Value::List(vec![]));
        assert_eq!(rebuilt.get("nothing").unwrap(), &Value::None);
    }

    #[test]
    fn test_json_round_trip() {
        let outer = sample();
        let json = outer.to_proto_json().unwrap();
        let rebuilt = Params::from_proto_json(&json).unwrap();
        assert_eq!(rebuilt, outer);
    }

    #[test]
    fn test_opaque_values_are_rejected() {
        let mut p = Params::new();
        p.define("handle", Value::opaque(0_u32), "").unwrap();
        let err = p.to_proto().unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
        assert!(err.to_string().contains("handle"));
    }

    #[test]
    fn test_rebuilt_tree_is_mutable() {
        let mut outer = sample();
        outer.freeze();
        let mut rebuilt = Params::from_proto(&outer.to_proto().unwrap()).unwrap();
        rebuilt.set("integer_val", 5_i64).unwrap();
        assert_eq!(rebuilt.get_i64("integer_val").unwrap(), 5);
    }
}
