//! Translation of the type schema MiniZinc reports for a model.
//!
//! Running `minizinc --model-interface-only` describes every parameter and output variable with a
//! small JSON object such as `{"type": "int", "set": true, "dim": 1}`. This module turns those
//! objects into a [`ValueType`], which describes the shape of [`Value`]s that are acceptable for
//! the declaration.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::fmt::Formatter;

use log::warn;
use serde::Deserialize;

use crate::model::Value;

/// A type as it is reported by the MiniZinc executable.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ParamType {
    #[serde(rename = "type")]
    pub base: String,
    #[serde(default)]
    pub set: bool,
    #[serde(default)]
    pub dim: usize,
}

/// The shape of values which may be assigned to a declaration.
///
/// Multi-dimensional arrays are represented by nesting [`ValueType::Array`]; the rectangular shape
/// of the array is not tracked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    Bool,
    Float,
    Int,
    String,
    Annotation,
    /// A base type this crate does not know about. Values are treated as integers.
    Unknown(String),
    Set(Box<ValueType>),
    /// A set of integers, which may also be given as a contiguous range.
    IntSetOrRange,
    Array(Box<ValueType>),
}

impl From<&ParamType> for ValueType {
    fn from(param: &ParamType) -> Self {
        let base = match param.base.as_str() {
            "bool" => ValueType::Bool,
            "float" => ValueType::Float,
            "int" => ValueType::Int,
            "string" => ValueType::String,
            "ann" => ValueType::Annotation,
            other => {
                warn!("Unable to determine MiniZinc type `{other}`, assuming integer type");
                ValueType::Unknown(other.to_owned())
            }
        };

        let mut value_type = if param.set {
            match base {
                ValueType::Int => ValueType::IntSetOrRange,
                base => ValueType::Set(Box::new(base)),
            }
        } else {
            base
        };

        for _ in 0..param.dim {
            value_type = ValueType::Array(Box::new(value_type));
        }

        value_type
    }
}

impl ValueType {
    /// The number of array dimensions of the type.
    pub fn dimensions(&self) -> usize {
        match self {
            ValueType::Array(element) => 1 + element.dimensions(),
            _ => 0,
        }
    }

    /// The type of the elements after all array dimensions are stripped.
    pub fn element(&self) -> &ValueType {
        match self {
            ValueType::Array(element) => element.element(),
            other => other,
        }
    }

    /// Whether the value is an instance of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (ValueType::Array(element), Value::Array(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            (ValueType::Bool, Value::Bool(_)) => true,
            (ValueType::Float, Value::Float(_) | Value::Int(_)) => true,
            (ValueType::Int | ValueType::Unknown(_), Value::Int(_) | Value::Enum(_)) => true,
            (ValueType::String, Value::String(_)) => true,
            (ValueType::Annotation, Value::Annotation(_) | Value::String(_)) => true,
            (ValueType::IntSetOrRange, Value::Range(_)) => true,
            (ValueType::IntSetOrRange, Value::Set(items)) => items
                .iter()
                .all(|item| matches!(item, Value::Int(_) | Value::Enum(_))),
            (ValueType::Set(element), Value::Range(_)) => {
                matches!(**element, ValueType::Unknown(_))
            }
            (ValueType::Set(element), Value::Set(items)) => {
                items.iter().all(|item| element.accepts(item))
            }
            _ => false,
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueType::Bool => write!(f, "bool"),
            ValueType::Float => write!(f, "float"),
            ValueType::Int => write!(f, "int"),
            ValueType::String => write!(f, "string"),
            ValueType::Annotation => write!(f, "ann"),
            ValueType::Unknown(name) => write!(f, "{name}"),
            ValueType::Set(element) => write!(f, "set of {element}"),
            ValueType::IntSetOrRange => write!(f, "set of int"),
            ValueType::Array(element) => write!(f, "array of {element}"),
        }
    }
}

/// The kind of problem a model describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Method {
    #[default]
    Satisfy,
    Minimize,
    Maximize,
}

impl Method {
    fn from_interface(method: &str) -> Method {
        match method {
            "min" => Method::Minimize,
            "max" => Method::Maximize,
            _ => Method::Satisfy,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInterface {
    #[serde(default)]
    method: String,
    #[serde(default)]
    input: BTreeMap<String, ParamType>,
    #[serde(default)]
    output: BTreeMap<String, ParamType>,
    #[serde(default)]
    has_output_item: bool,
    #[serde(default)]
    included_files: Vec<String>,
    #[serde(default)]
    globals: Vec<String>,
}

/// The interface of a model: its parameters, its output variables and the kind of problem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelInterface {
    pub method: Method,
    pub input: BTreeMap<String, ValueType>,
    pub output: BTreeMap<String, ValueType>,
    pub has_output_item: bool,
    pub included_files: Vec<String>,
    pub globals: Vec<String>,
}

impl ModelInterface {
    /// Decode the JSON produced by `minizinc --model-interface-only`.
    pub fn from_json(json: &[u8]) -> Result<ModelInterface, serde_json::Error> {
        let raw: RawInterface = serde_json::from_slice(json)?;

        let convert = |declarations: BTreeMap<String, ParamType>| {
            declarations
                .into_iter()
                .map(|(name, param)| {
                    let value_type = ValueType::from(&param);
                    (name, value_type)
                })
                .collect::<BTreeMap<_, _>>()
        };

        Ok(ModelInterface {
            method: Method::from_interface(&raw.method),
            input: convert(raw.input),
            output: convert(raw.output),
            has_output_item: raw.has_output_item,
            included_files: raw.included_files,
            globals: raw.globals,
        })
    }

    /// The declared type of a parameter or output variable.
    pub fn declaration(&self, name: &str) -> Option<&ValueType> {
        self.input.get(name).or_else(|| self.output.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(base: &str, set: bool, dim: usize) -> ParamType {
        ParamType {
            base: base.to_owned(),
            set,
            dim,
        }
    }

    #[test]
    fn scalar_types_map_directly() {
        assert_eq!(ValueType::from(&param("bool", false, 0)), ValueType::Bool);
        assert_eq!(ValueType::from(&param("float", false, 0)), ValueType::Float);
        assert_eq!(ValueType::from(&param("int", false, 0)), ValueType::Int);
        assert_eq!(ValueType::from(&param("string", false, 0)), ValueType::String);
        assert_eq!(ValueType::from(&param("ann", false, 0)), ValueType::Annotation);
    }

    #[test]
    fn unknown_types_fall_back_to_integers() {
        let value_type = ValueType::from(&param("tuple", false, 0));

        assert_eq!(value_type, ValueType::Unknown("tuple".to_owned()));
        assert!(value_type.accepts(&Value::Int(3)));
        assert!(!value_type.accepts(&Value::Bool(true)));
    }

    #[test]
    fn unknown_set_types_keep_their_name() {
        let value_type = ValueType::from(&param("tuple", true, 1));

        assert_eq!(
            value_type.element(),
            &ValueType::Set(Box::new(ValueType::Unknown("tuple".to_owned())))
        );
        assert_eq!(value_type.to_string(), "array of set of tuple");
        assert!(value_type.accepts(&Value::from(vec![Value::Range(1..=3)])));
        assert!(value_type.accepts(&Value::from(vec![Value::set([1, 4])])));
        assert!(!value_type.accepts(&Value::from(vec![Value::set([true])])));
    }

    #[test]
    fn unknown_types_are_reported() {
        crate::tests::logging::install();

        let _ = ValueType::from(&param("record_of_things", false, 0));

        assert!(crate::tests::logging::captured().iter().any(|(level, message)| {
            *level == log::Level::Warn && message.contains("`record_of_things`")
        }));
    }

    #[test]
    fn integer_sets_accept_ranges() {
        let value_type = ValueType::from(&param("int", true, 0));

        assert_eq!(value_type, ValueType::IntSetOrRange);
        assert!(value_type.accepts(&Value::Range(1..=5)));
        assert!(value_type.accepts(&Value::set([1, 3, 5])));
        assert!(!value_type.accepts(&Value::from(vec![1, 3, 5])));
    }

    #[test]
    fn other_sets_wrap_their_base_type() {
        let value_type = ValueType::from(&param("float", true, 0));

        assert_eq!(value_type, ValueType::Set(Box::new(ValueType::Float)));
        assert!(!value_type.accepts(&Value::Range(1..=5)));
    }

    #[test]
    fn dimensions_nest_arrays() {
        let value_type = ValueType::from(&param("int", false, 2));

        assert_eq!(
            value_type,
            ValueType::Array(Box::new(ValueType::Array(Box::new(ValueType::Int))))
        );
        assert_eq!(value_type.dimensions(), 2);
        assert_eq!(value_type.element(), &ValueType::Int);
        assert!(value_type.accepts(&Value::from(vec![vec![1, 2], vec![3]])));
    }

    #[test]
    fn interface_is_decoded() {
        let json = br#"{"type": "problem", "method": "min",
            "input": {"n": {"type": "int"}, "s": {"type": "int", "set": true}},
            "output": {"x": {"type": "int", "dim": 1}, "obj": {"type": "float"}},
            "has_output_item": false, "included_files": [], "globals": ["all_different"]}"#;

        let interface = ModelInterface::from_json(json).expect("valid interface");

        assert_eq!(interface.method, Method::Minimize);
        assert_eq!(interface.declaration("n"), Some(&ValueType::Int));
        assert_eq!(interface.declaration("s"), Some(&ValueType::IntSetOrRange));
        assert_eq!(interface.declaration("x").map(ValueType::dimensions), Some(1));
        assert_eq!(interface.declaration("y"), None);
        assert_eq!(interface.globals, vec!["all_different".to_owned()]);
    }
}
