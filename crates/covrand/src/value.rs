//! Dynamic values shared by coverage bins and random-variable domains.
//!
//! Coverage items match sampled values against bins, crosses combine bin keys
//! into tuples and random variables draw from domains of mixed element types,
//! so all of them speak the same small value language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A sampled value, bin key or domain element
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean (also the implicit bin of a bin-less cover point)
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// String label or symbolic value
    Str(String),
    /// Ordered tuple (multi-argument samples, cross bins)
    Tuple(Vec<Value>),
}

impl Value {
    /// Integer payload, if this is an integer
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean payload, if this is a boolean
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if this is a string
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Tuple elements, if this is a tuple
    #[must_use]
    pub fn as_tuple(&self) -> Option<&[Value]> {
        match self {
            Self::Tuple(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
            Self::Tuple(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::Int(v as i64)
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32, usize);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Self::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Tuple(vec![a.into(), b.into(), c.into()])
    }
}

/// Collect anything convertible into a list of values
///
/// ```
/// use covrand::{values, Value};
/// assert_eq!(values(0..3), vec![Value::Int(0), Value::Int(1), Value::Int(2)]);
/// ```
pub fn values<I, T>(items: I) -> Vec<Value>
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    items.into_iter().map(Into::into).collect()
}

/// Every combination taking one element from each list, in lexicographic order
///
/// No lists yield a single empty combination.
pub(crate) fn cartesian_product(lists: &[Vec<Value>]) -> Vec<Vec<Value>> {
    lists.iter().fold(vec![Vec::new()], |acc, list| {
        acc.iter()
            .flat_map(|prefix| {
                list.iter().map(move |item| {
                    let mut combo = prefix.clone();
                    combo.push(item.clone());
                    combo
                })
            })
            .collect()
    })
}

/// Named arguments of one instrumented call site
///
/// Call sites pass their argument names explicitly, so coverage items can
/// select a variable by name without inspecting a function signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    entries: Vec<(String, Value)>,
}

impl Args {
    /// Create an empty argument list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a named argument
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Append a named argument in place
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Look up an argument by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find_map(|(n, v)| (n == name).then_some(v))
    }

    /// Number of arguments
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if there are no arguments
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(name, value)` pairs in call order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// The value a cover point sees when it has no transform
    ///
    /// A single argument is returned as is, several arguments as a tuple in
    /// call order, and an empty argument list as `true`.
    #[must_use]
    pub fn as_sample(&self) -> Value {
        match self.entries.as_slice() {
            [] => Value::Bool(true),
            [(_, only)] => only.clone(),
            many => Value::Tuple(many.iter().map(|(_, v)| v.clone()).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tuple_display() {
        let v = Value::from((1, "a"));
        assert_eq!(v.to_string(), "(1, a)");
    }

    #[test]
    fn test_nested_tuple_display() {
        let v = Value::Tuple(vec![Value::from((1, 1)), Value::from(3)]);
        assert_eq!(v.to_string(), "((1, 1), 3)");
    }

    #[test]
    fn test_args_lookup() {
        let args = Args::new().arg("i", 3).arg("x", 7);
        assert_eq!(args.get("x"), Some(&Value::Int(7)));
        assert_eq!(args.get("y"), None);
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_as_sample_single_and_many() {
        assert_eq!(Args::new().arg("a", 5).as_sample(), Value::Int(5));
        assert_eq!(
            Args::new().arg("a", 1).arg("b", 2).as_sample(),
            Value::from((1, 2))
        );
        assert_eq!(Args::new().as_sample(), Value::Bool(true));
    }

    #[test]
    fn test_cartesian_product() {
        let combos = cartesian_product(&[values([1, 2]), values(["a", "b", "c"])]);
        assert_eq!(combos.len(), 6);
        assert_eq!(combos[1], vec![Value::Int(1), Value::from("b")]);
        assert_eq!(cartesian_product(&[]), vec![Vec::<Value>::new()]);
        assert!(cartesian_product(&[values([1]), Vec::new()]).is_empty());
    }

    #[test]
    fn test_ordering_is_total() {
        let mut v = values([3, 1, 2]);
        v.sort();
        assert_eq!(v, values([1, 2, 3]));
    }

    #[test]
    fn test_untagged_yaml_round_trip() {
        let v = Value::from((1, "small"));
        let yaml = serde_yaml_ng::to_string(&v).unwrap();
        let back: Value = serde_yaml_ng::from_str(&yaml).unwrap();
        assert_eq!(back, v);
    }
}
