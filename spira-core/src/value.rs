use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use std::fmt;

use crate::term::{Iri, Subject, Term};

/// A reference from one resource to another.
///
/// This is the data form of a relation value: it names the target subject
/// and the class it is projected as, without holding the target instance.
/// Instances are materialized on demand through the identity cache
/// (see `Resource::related`). When serialized, only the subject is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    subject: Subject,
    class: String,
}

impl ResourceRef {
    pub fn new(subject: Subject, class: impl Into<String>) -> Self {
        ResourceRef {
            subject,
            class: class.into(),
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

/// A decoded domain value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Double(f64),
    Decimal(BigDecimal),
    String(String),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    Uri(Iri),
    /// A raw term, passed through untouched.
    Term(Term),
    Resource(ResourceRef),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceRef> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Time(_) => "time",
            Value::Uri(_) => "uri",
            Value::Term(_) => "term",
            Value::Resource(_) => "resource",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Double(d) => write!(f, "{d}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => f.write_str(&dt.to_rfc3339()),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            Value::Uri(iri) => write!(f, "{iri}"),
            Value::Term(term) => write!(f, "{term}"),
            Value::Resource(r) => write!(f, "{}", r.subject),
        }
    }
}

/// An unordered collection of values without duplicates.
#[derive(Debug, Clone, Default)]
pub struct ValueSet(Vec<Value>);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value, returning false if an equal value was already present.
    pub fn insert(&mut self, value: Value) -> bool {
        if self.0.contains(&value) {
            return false;
        }
        self.0.push(value);
        true
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.0.contains(value)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

/// Order-insensitive comparison.
impl PartialEq for ValueSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|v| other.contains(v))
    }
}

impl FromIterator<Value> for ValueSet {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let mut set = ValueSet::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl IntoIterator for ValueSet {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValueSet {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// The value held by one property of an instance.
///
/// `Single(None)` is the "absent" sentinel, distinct from any present value
/// (including an empty string). Multi-valued properties with no matching
/// triples hold an empty set.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Single(Option<Value>),
    Multi(ValueSet),
}

impl Attribute {
    /// The absent single value; assigning it and saving deletes the property.
    pub const ABSENT: Attribute = Attribute::Single(None);

    /// An empty attribute of the given shape.
    pub fn empty(multi: bool) -> Self {
        if multi {
            Attribute::Multi(ValueSet::new())
        } else {
            Attribute::ABSENT
        }
    }

    /// The single value, if this is a present single-valued attribute.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Attribute::Single(value) => value.as_ref(),
            Attribute::Multi(_) => None,
        }
    }

    /// The set of values, if this is a multi-valued attribute.
    pub fn values(&self) -> Option<&ValueSet> {
        match self {
            Attribute::Multi(set) => Some(set),
            Attribute::Single(_) => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Attribute::Single(None))
    }

    /// Iterates over every contained value regardless of shape.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Value> + '_> {
        match self {
            Attribute::Single(value) => Box::new(value.iter()),
            Attribute::Multi(set) => Box::new(set.iter()),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => |$v:ident| $expr:expr),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $expr
                }
            }

            impl From<$ty> for Attribute {
                fn from(value: $ty) -> Self {
                    Attribute::Single(Some(Value::from(value)))
                }
            }
        )*
    };
}

impl_from_value! {
    bool => |v| Value::Bool(v),
    i64 => |v| Value::Integer(v),
    i32 => |v| Value::Integer(i64::from(v)),
    u32 => |v| Value::Integer(i64::from(v)),
    f64 => |v| Value::Double(v),
    BigDecimal => |v| Value::Decimal(v),
    String => |v| Value::String(v),
    &str => |v| Value::String(v.to_string()),
    NaiveDate => |v| Value::Date(v),
    DateTime<FixedOffset> => |v| Value::DateTime(v),
    NaiveTime => |v| Value::Time(v),
    Iri => |v| Value::Uri(v),
    Term => |v| Value::Term(v),
    ResourceRef => |v| Value::Resource(v),
}

impl From<Value> for Attribute {
    fn from(value: Value) -> Self {
        Attribute::Single(Some(value))
    }
}

impl From<Option<Value>> for Attribute {
    fn from(value: Option<Value>) -> Self {
        Attribute::Single(value)
    }
}

impl From<ValueSet> for Attribute {
    fn from(set: ValueSet) -> Self {
        Attribute::Multi(set)
    }
}

impl From<Vec<Value>> for Attribute {
    fn from(values: Vec<Value>) -> Self {
        Attribute::Multi(values.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn value_set_ignores_order_and_duplicates() {
        let a: ValueSet = vec![Value::from(1), Value::from(2), Value::from(1)].into_iter().collect();
        let b: ValueSet = vec![Value::from(2), Value::from(1)].into_iter().collect();
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);

        let c: ValueSet = vec![Value::from(2)].into_iter().collect();
        assert_ne!(a, c);
    }

    #[test]
    fn absent_differs_from_empty_string() {
        assert_ne!(Attribute::ABSENT, Attribute::from(""));
        assert!(Attribute::ABSENT.is_absent());
        assert!(!Attribute::from("").is_absent());
    }

    #[test]
    fn decimal_equality_is_numeric() {
        let a = Value::from(BigDecimal::from_str("5.15").unwrap());
        let b = Value::from(BigDecimal::from_str("5.150").unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn attribute_iter_covers_both_shapes() {
        let single = Attribute::from("x");
        assert_eq!(single.iter().count(), 1);
        assert_eq!(Attribute::ABSENT.iter().count(), 0);

        let multi = Attribute::from(vec![Value::from("a"), Value::from("b")]);
        assert_eq!(multi.iter().count(), 2);
        assert!(multi.value().is_none());
        assert_eq!(multi.values().map(ValueSet::len), Some(2));
    }
}
