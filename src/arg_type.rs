use std::{fmt, str::FromStr};

use serde::Deserialize;
use serde_json::{Number, Value};
use thiserror::Error;

/// Scalar types a bound parameter can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
}

impl ScalarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Float => "float",
        }
    }

    /// Coerces a dynamic value into this type.
    ///
    /// Returns `None` instead of truncating or guessing when the value has no
    /// exact representation in the target type.
    pub fn coerce(&self, value: &Value) -> Option<Scalar> {
        match self {
            Self::String => coerce_string(value).map(Scalar::Text),
            Self::Int => coerce_int(value).map(Scalar::Int),
            Self::Float => coerce_float(value).map(Scalar::Float),
        }
    }

    /// Infers the scalar type of a runtime value, as used when flattening
    /// list arguments. Booleans count as integers; anything that is not a
    /// number, a boolean or text has no inferred type.
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(Self::Int),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self::Int),
            Value::Number(_) => Some(Self::Float),
            Value::String(_) => Some(Self::String),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// 2^63 is exactly representable as f64, i64::MAX is not
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;

fn coerce_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            if let Some(u) = n.as_u64() {
                return i64::try_from(u).ok();
            }
            let f = n.as_f64()?;
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < TWO_POW_63 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

fn coerce_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unsupported argument type `{0}`")]
pub struct UnknownArgType(pub String);

/// Declared type of a template argument.
///
/// `List` arguments are only iterated by templates; they never become bound
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ArgType {
    Scalar(ScalarType),
    List,
}

impl ArgType {
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Self::Scalar(ty) => Some(*ty),
            Self::List => None,
        }
    }
}

impl FromStr for ArgType {
    type Err = UnknownArgType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(Self::Scalar(ScalarType::String)),
            "int" => Ok(Self::Scalar(ScalarType::Int)),
            "float" => Ok(Self::Scalar(ScalarType::Float)),
            "list" => Ok(Self::List),
            _ => Err(UnknownArgType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ArgType {
    type Error = UnknownArgType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScalarType> for ArgType {
    fn from(ty: ScalarType) -> Self {
        Self::Scalar(ty)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(ty) => ty.fmt(f),
            Self::List => f.write_str("list"),
        }
    }
}

/// A coerced scalar ready to be encoded into statement arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        match s {
            Scalar::Int(i) => Value::from(i),
            Scalar::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            Scalar::Text(t) => Value::String(t),
        }
    }
}

/// A declared parameter after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Bound {
    One(Scalar),
    /// `multiple` parameters keep the caller's element order.
    Many(Vec<Scalar>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_coercion() {
        assert_eq!(ScalarType::Int.coerce(&json!(5)), Some(Scalar::Int(5)));
        assert_eq!(ScalarType::Int.coerce(&json!(" -12 ")), Some(Scalar::Int(-12)));
        assert_eq!(ScalarType::Int.coerce(&json!(3.0)), Some(Scalar::Int(3)));
        assert_eq!(ScalarType::Int.coerce(&json!(true)), Some(Scalar::Int(1)));
        assert_eq!(ScalarType::Int.coerce(&json!("abc")), None);
        assert_eq!(ScalarType::Int.coerce(&json!("3.5")), None);
        assert_eq!(ScalarType::Int.coerce(&json!(3.5)), None);
        assert_eq!(ScalarType::Int.coerce(&json!(u64::MAX)), None);
        assert_eq!(ScalarType::Int.coerce(&Value::Null), None);
        assert_eq!(ScalarType::Int.coerce(&json!([1])), None);
    }

    #[test]
    fn test_float_coercion() {
        assert_eq!(ScalarType::Float.coerce(&json!(2)), Some(Scalar::Float(2.0)));
        assert_eq!(ScalarType::Float.coerce(&json!("2.5")), Some(Scalar::Float(2.5)));
        assert_eq!(ScalarType::Float.coerce(&json!("two")), None);
        assert_eq!(ScalarType::Float.coerce(&Value::Null), None);
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(
            ScalarType::String.coerce(&json!("x")),
            Some(Scalar::Text("x".into()))
        );
        assert_eq!(
            ScalarType::String.coerce(&json!(42)),
            Some(Scalar::Text("42".into()))
        );
        assert_eq!(
            ScalarType::String.coerce(&json!(1.5)),
            Some(Scalar::Text("1.5".into()))
        );
        assert_eq!(ScalarType::String.coerce(&Value::Null), None);
        assert_eq!(ScalarType::String.coerce(&json!({"a": 1})), None);
    }

    #[test]
    fn test_coercion_is_idempotent() {
        let cases = [
            (ScalarType::Int, json!("17")),
            (ScalarType::Int, json!(4.0)),
            (ScalarType::Float, json!("0.25")),
            (ScalarType::Float, json!(3)),
            (ScalarType::String, json!(99)),
            (ScalarType::String, json!(false)),
        ];
        for (ty, value) in cases {
            let once = ty.coerce(&value).unwrap();
            let twice = ty.coerce(&Value::from(once.clone())).unwrap();
            assert_eq!(once, twice, "{ty} on {value}");
        }
    }

    #[test]
    fn test_parse_arg_type() {
        assert_eq!("INT".parse(), Ok(ArgType::Scalar(ScalarType::Int)));
        assert_eq!("list".parse(), Ok(ArgType::List));
        assert_eq!(
            "date".parse::<ArgType>(),
            Err(UnknownArgType("date".to_string()))
        );
    }

    #[test]
    fn test_infer() {
        assert_eq!(ScalarType::infer(&json!(1)), Some(ScalarType::Int));
        assert_eq!(ScalarType::infer(&json!(1.5)), Some(ScalarType::Float));
        assert_eq!(ScalarType::infer(&json!("a")), Some(ScalarType::String));
        assert_eq!(ScalarType::infer(&Value::Null), None);
        assert_eq!(ScalarType::infer(&json!({"x": 1})), None);
        assert_eq!(ScalarType::infer(&json!(true)), Some(ScalarType::Int));
        assert_eq!(
            ScalarType::infer(&json!(false)).and_then(|ty| ty.coerce(&json!(false))),
            Some(Scalar::Int(0))
        );
    }
}
