use std::collections::BTreeSet;
use std::collections::HashSet;
use std::fmt::Display;
use std::fmt::Formatter;
use std::ops::RangeInclusive;

use log::warn;
use serde_json::json;

use crate::types::ValueType;
use crate::ConfigurationError;

/// A MiniZinc value, either assigned to a parameter or read back from a solution.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Raw MiniZinc annotation text, e.g. `int_search(x, input_order, indomain_min)`.
    Annotation(String),
    /// A member of an enumerated type, given by its identifier.
    Enum(String),
    /// The absent value `<>` of an optional type.
    Absent,
    Set(Vec<Value>),
    Range(RangeInclusive<i64>),
    /// An array; multi-dimensional arrays are nested.
    Array(Vec<Value>),
}

impl Value {
    pub fn set<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Value {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn annotation(text: impl Into<String>) -> Value {
        Value::Annotation(text.into())
    }

    pub fn enum_member(name: impl Into<String>) -> Value {
        Value::Enum(name.into())
    }

    /// The nesting depth of the value. An empty array counts as a single dimension.
    pub fn dimensions(&self) -> usize {
        match self {
            Value::Array(items) => 1 + items.first().map_or(0, Value::dimensions),
            _ => 0,
        }
    }

    /// Whether the value can be assigned to a declaration with the given number of dimensions.
    pub fn has_dimensions(&self, dimensions: usize) -> bool {
        match self {
            Value::Array(items) => {
                dimensions >= 1 && items.iter().all(|item| item.has_dimensions(dimensions - 1))
            }
            _ => dimensions == 0,
        }
    }

    pub(crate) fn contains_annotation(&self) -> bool {
        match self {
            Value::Annotation(_) => true,
            Value::Set(items) | Value::Array(items) => items.iter().any(Value::contains_annotation),
            _ => false,
        }
    }

    /// Whether every float in the value is finite. Neither MiniZinc JSON nor DZN can express NaN or
    /// infinity.
    pub(crate) fn is_finite(&self) -> bool {
        match self {
            Value::Float(value) => value.is_finite(),
            Value::Set(items) | Value::Array(items) => items.iter().all(Value::is_finite),
            _ => true,
        }
    }

    /// Encode the value in the JSON data format of MiniZinc. Annotations cannot be encoded.
    pub(crate) fn to_json(&self) -> Option<serde_json::Value> {
        let encoded = match self {
            Value::Bool(value) => json!(value),
            Value::Int(value) => json!(value),
            Value::Float(value) => json!(value),
            Value::String(value) => json!(value),
            Value::Annotation(_) => return None,
            Value::Enum(name) => json!({ "e": name }),
            Value::Absent => serde_json::Value::Null,
            Value::Set(items) => {
                let items = items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?;
                json!({ "set": items })
            }
            Value::Range(range) => json!({ "set": [[range.start(), range.end()]] }),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Option<Vec<_>>>()?,
            ),
        };

        Some(encoded)
    }

    /// Render `name = value;` as a DZN assignment. Nested arrays become `arrayNd` calls with
    /// 1-based index sets, which requires them to be rectangular.
    pub(crate) fn to_dzn_assignment(&self, name: &str) -> Result<String, ConfigurationError> {
        if self.dimensions() < 2 {
            return Ok(format!("{name} = {self};"));
        }

        let mut shape = Vec::new();
        let mut level = self;
        while let Value::Array(items) = level {
            shape.push(items.len());
            match items.first() {
                Some(first) => level = first,
                None => break,
            }
        }

        let mut flat = Vec::new();
        if !flatten(self, &shape, &mut flat) {
            return Err(ConfigurationError::RaggedArray(name.to_owned()));
        }

        let index_sets = shape
            .iter()
            .map(|length| format!("1..{length}"))
            .collect::<Vec<_>>()
            .join(", ");
        let elements = flat
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!(
            "{name} = array{}d({index_sets}, [{elements}]);",
            shape.len()
        ))
    }

    /// Decode a value from the JSON MiniZinc prints for solutions, guided by the declared type if
    /// it is known.
    pub fn from_json(json: &serde_json::Value, declared: Option<&ValueType>) -> Value {
        match json {
            serde_json::Value::Null => Value::Absent,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => match (number.as_i64(), declared) {
                (Some(value), Some(ValueType::Float)) => Value::Float(value as f64),
                (Some(value), _) => Value::Int(value),
                (None, _) => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => match declared {
                Some(ValueType::Annotation) => Value::Annotation(text.clone()),
                _ => Value::String(text.clone()),
            },
            serde_json::Value::Array(items) => {
                let element = match declared {
                    Some(ValueType::Array(element)) => Some(element.as_ref()),
                    _ => None,
                };

                Value::Array(
                    items
                        .iter()
                        .map(|item| Value::from_json(item, element))
                        .collect(),
                )
            }
            serde_json::Value::Object(object) => {
                if let Some(serde_json::Value::Array(items)) = object.get("set") {
                    let element = match declared {
                        Some(ValueType::Set(element)) => Some(element.as_ref()),
                        Some(ValueType::IntSetOrRange) => Some(&ValueType::Int),
                        _ => None,
                    };

                    decode_set(items, element)
                } else if let Some(serde_json::Value::String(name)) = object.get("e") {
                    Value::Enum(name.clone())
                } else {
                    warn!("Unable to decode MiniZinc value `{json}`, keeping its JSON text");
                    Value::String(json.to_string())
                }
            }
        }
    }
}

fn decode_set(items: &[serde_json::Value], element: Option<&ValueType>) -> Value {
    let as_range = |item: &serde_json::Value| match item {
        serde_json::Value::Array(bounds) if bounds.len() == 2 => {
            Some(bounds[0].as_i64()?..=bounds[1].as_i64()?)
        }
        _ => None,
    };

    if let [single] = items {
        if let Some(range) = as_range(single) {
            return Value::Range(range);
        }
    }

    let mut values = Vec::new();
    for item in items {
        match as_range(item) {
            Some(range) => values.extend(range.map(Value::Int)),
            None => values.push(Value::from_json(item, element)),
        }
    }

    Value::Set(values)
}

fn flatten<'a>(value: &'a Value, shape: &[usize], flat: &mut Vec<&'a Value>) -> bool {
    match (value, shape.split_first()) {
        (Value::Array(items), Some((&length, rest))) => {
            items.len() == length && items.iter().all(|item| flatten(item, rest, flat))
        }
        (Value::Array(_), None) => false,
        (_, Some(_)) => false,
        (scalar, None) => {
            flat.push(scalar);
            true
        }
    }
}

fn write_separated(f: &mut Formatter<'_>, items: &[Value]) -> std::fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }

    Ok(())
}

/// Values are displayed in DZN syntax.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value:?}"),
            Value::String(text) => {
                write!(f, "\"")?;
                for character in text.chars() {
                    match character {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        other => write!(f, "{other}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Annotation(text) | Value::Enum(text) => write!(f, "{text}"),
            Value::Absent => write!(f, "<>"),
            Value::Set(items) => {
                write!(f, "{{")?;
                write_separated(f, items)?;
                write!(f, "}}")
            }
            Value::Range(range) => write!(f, "{}..{}", range.start(), range.end()),
            Value::Array(items) => {
                write!(f, "[")?;
                write_separated(f, items)?;
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<RangeInclusive<i64>> for Value {
    fn from(value: RangeInclusive<i64>) -> Self {
        Value::Range(value)
    }
}

impl From<RangeInclusive<i32>> for Value {
    fn from(value: RangeInclusive<i32>) -> Self {
        Value::Range(i64::from(*value.start())..=i64::from(*value.end()))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::Array(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<BTreeSet<T>> for Value {
    fn from(value: BTreeSet<T>) -> Self {
        Value::set(value)
    }
}

impl<T: Into<Value>, S> From<HashSet<T, S>> for Value {
    fn from(value: HashSet<T, S>) -> Self {
        Value::set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sets_and_ranges_use_the_json_set_object() {
        assert_eq!(
            Value::set([1, 2, 4]).to_json(),
            Some(json!({ "set": [1, 2, 4] }))
        );
        assert_eq!(Value::from(1..=5).to_json(), Some(json!({ "set": [[1, 5]] })));
        assert_eq!(
            Value::enum_member("Red").to_json(),
            Some(json!({ "e": "Red" }))
        );
    }

    #[test]
    fn annotations_have_no_json_encoding() {
        let value = Value::from(vec![Value::annotation("int_search(x, input_order, indomain_min)")]);

        assert!(value.contains_annotation());
        assert_eq!(value.to_json(), None);
    }

    #[test]
    fn dzn_rendering() {
        assert_eq!(
            Value::from(vec![1, 2, 3]).to_dzn_assignment("x").expect("valid"),
            "x = [1, 2, 3];"
        );
        assert_eq!(
            Value::from(2.0).to_dzn_assignment("f").expect("valid"),
            "f = 2.0;"
        );
        assert_eq!(
            Value::from("say \"hi\"").to_dzn_assignment("s").expect("valid"),
            "s = \"say \\\"hi\\\"\";"
        );
        assert_eq!(
            Value::from(vec![vec![1, 2], vec![3, 4], vec![5, 6]])
                .to_dzn_assignment("grid")
                .expect("rectangular"),
            "grid = array2d(1..3, 1..2, [1, 2, 3, 4, 5, 6]);"
        );
    }

    #[test]
    fn ragged_arrays_are_rejected_for_dzn() {
        let ragged = Value::from(vec![vec![1, 2], vec![3]]);

        assert!(matches!(
            ragged.to_dzn_assignment("grid"),
            Err(ConfigurationError::RaggedArray(name)) if name == "grid"
        ));
    }

    #[test]
    fn nested_non_finite_floats_are_detected() {
        assert!(Value::from(vec![vec![1.0, 2.5]]).is_finite());
        assert!(!Value::from(vec![vec![1.0, f64::NAN]]).is_finite());
        assert!(!Value::Set(vec![Value::Float(f64::NEG_INFINITY)]).is_finite());
    }

    #[test]
    fn dimensions_are_checked_structurally() {
        let grid = Value::from(vec![vec![1, 2], vec![3, 4]]);

        assert_eq!(grid.dimensions(), 2);
        assert!(grid.has_dimensions(2));
        assert!(!grid.has_dimensions(1));
        assert!(Value::Array(vec![]).has_dimensions(3));
        assert!(!Value::Int(1).has_dimensions(1));
    }

    #[test]
    fn solutions_are_decoded_with_their_declared_type() {
        let array = ValueType::Array(Box::new(ValueType::Float));
        assert_eq!(
            Value::from_json(&json!([1, 2.5]), Some(&array)),
            Value::Array(vec![Value::Float(1.0), Value::Float(2.5)])
        );

        assert_eq!(
            Value::from_json(&json!({ "set": [[1, 3]] }), Some(&ValueType::IntSetOrRange)),
            Value::Range(1..=3)
        );
        assert_eq!(
            Value::from_json(&json!({ "set": [[1, 2], 5] }), None),
            Value::set([1, 2, 5])
        );
        assert_eq!(
            Value::from_json(&json!({ "e": "Blue" }), None),
            Value::enum_member("Blue")
        );
        assert_eq!(Value::from_json(&json!(null), None), Value::Absent);
    }
}
