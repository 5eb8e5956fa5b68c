use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::class::{ClassRegistry, ClassSchema};
use crate::error::Error;
use crate::term::{Iri, Literal, Term};
use crate::value::{ResourceRef, Value};
use crate::vocab::xsd;

/// A value the codec cannot represent, or a term it cannot decode.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CodecError(String);

impl CodecError {
    pub fn new(message: impl Into<String>) -> Self {
        CodecError(message.into())
    }

    fn expected(expected: &str, value: &Value) -> Self {
        CodecError(format!("expected {expected}, got {} {value}", value.kind()))
    }

    fn unparsable(expected: &str, term: &Term) -> Self {
        CodecError(format!("cannot read {term} as {expected}"))
    }
}

/// Converts between domain values and terms for one property type.
pub trait Codec: Send + Sync {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError>;

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError>;
}

/// Maps property type tags to codecs.
///
/// A fresh registry holds the built-in tags; each is also reachable under its
/// `xsd:` prefixed name and its full XSD IRI.
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn Codec>>,
    aliases: HashMap<String, String>,
}

impl CodecRegistry {
    /// Creates a registry with the built-in codecs.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("native", NativeCodec);
        registry.register("any", AnyCodec);
        registry.register("string", StringCodec);
        registry.register("boolean", BooleanCodec);
        for kind in IntegerKind::ALL {
            registry.register(kind.tag(), IntegerCodec(kind));
        }
        registry.register("double", DoubleCodec(xsd::double()));
        registry.register("float", DoubleCodec(xsd::float()));
        registry.register("decimal", DecimalCodec);
        registry.register("date", DateCodec);
        registry.register("datetime", DateTimeCodec);
        registry.register("time", TimeCodec);
        registry.register("uri", UriCodec);

        let xsd_names = [
            ("string", "string"),
            ("boolean", "boolean"),
            ("integer", "integer"),
            ("long", "long"),
            ("int", "int"),
            ("non_negative_integer", "nonNegativeInteger"),
            ("non_positive_integer", "nonPositiveInteger"),
            ("positive_integer", "positiveInteger"),
            ("negative_integer", "negativeInteger"),
            ("double", "double"),
            ("float", "float"),
            ("decimal", "decimal"),
            ("date", "date"),
            ("datetime", "dateTime"),
            ("time", "time"),
            ("uri", "anyURI"),
        ];
        for (tag, local) in xsd_names {
            registry.aliases.insert(format!("xsd:{local}"), tag.to_string());
            registry.aliases.insert(format!("{}{local}", xsd::NS), tag.to_string());
        }
        registry
    }

    /// Creates a registry without any codecs.
    pub fn empty() -> Self {
        CodecRegistry {
            codecs: HashMap::new(),
            aliases: HashMap::new(),
        }
    }

    /// Registers a codec, replacing any codec or alias with the same tag.
    pub fn register(&mut self, tag: impl Into<String>, codec: impl Codec + 'static) {
        let tag = tag.into();
        self.aliases.remove(&tag);
        self.codecs.insert(tag, Arc::new(codec));
    }

    /// Makes `tag` resolve to the same codec as `existing`.
    pub fn alias(&mut self, tag: impl Into<String>, existing: &str) -> Result<(), Error> {
        let target = self.canonical(existing);
        if !self.codecs.contains_key(target) {
            return Err(Error::UnknownType {
                tag: existing.to_string(),
                class: "codec registry".to_string(),
            });
        }
        let target = target.to_string();
        let tag = tag.into();
        self.codecs.remove(&tag);
        self.aliases.insert(tag, target);
        Ok(())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.codecs.contains_key(self.canonical(tag))
    }

    /// Returns the codec for a tag, if registered.
    pub fn get(&self, tag: &str) -> Option<Arc<dyn Codec>> {
        self.codecs.get(self.canonical(tag)).cloned()
    }

    /// Returns the codec for a tag requested by a class.
    pub fn resolve(&self, tag: &str, class: &str) -> Result<Arc<dyn Codec>, Error> {
        self.get(tag).ok_or_else(|| Error::UnknownType {
            tag: tag.to_string(),
            class: class.to_string(),
        })
    }

    pub fn serialize(&self, tag: &str, value: &Value) -> Result<Term, Error> {
        let codec = self.resolve(tag, "codec registry")?;
        codec.serialize(value).map_err(|e| mismatch(tag, e))
    }

    pub fn unserialize(&self, tag: &str, term: &Term) -> Result<Value, Error> {
        let codec = self.resolve(tag, "codec registry")?;
        codec.unserialize(term).map_err(|e| mismatch(tag, e))
    }

    fn canonical<'a>(&'a self, tag: &'a str) -> &'a str {
        self.aliases.get(tag).map(String::as_str).unwrap_or(tag)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn mismatch(tag: &str, err: CodecError) -> Error {
    Error::TypeMismatch {
        tag: tag.to_string(),
        message: err.0,
    }
}

/// Codec for properties whose type is another resource class.
///
/// Serializes a reference to its subject; unserializes a subject into a
/// reference of the declared class. References to classes outside the
/// declared class's hierarchy are rejected.
pub(crate) struct RelationCodec {
    target: Arc<ClassSchema>,
    classes: Arc<ClassRegistry>,
}

impl RelationCodec {
    pub(crate) fn new(target: Arc<ClassSchema>, classes: Arc<ClassRegistry>) -> Self {
        RelationCodec { target, classes }
    }
}

impl Codec for RelationCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Resource(reference) => {
                if self.classes.is_a(reference.class(), self.target.name()) {
                    Ok(Term::from(reference.subject().clone()))
                } else {
                    Err(CodecError::new(format!(
                        "{} is a {}, which is not a {}",
                        reference.subject(),
                        reference.class(),
                        self.target.name()
                    )))
                }
            }
            Value::Uri(iri) => Ok(Term::Iri(iri.clone())),
            other => Err(CodecError::expected(self.target.name(), other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        term.as_subject()
            .map(|subject| Value::Resource(ResourceRef::new(subject, self.target.name())))
            .ok_or_else(|| CodecError::unparsable(self.target.name(), term))
    }
}

/// Passes terms through untouched.
struct NativeCodec;

impl Codec for NativeCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        natural_term(value)
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        Ok(Value::Term(term.clone()))
    }
}

/// Infers the value from the literal's own datatype.
struct AnyCodec;

impl Codec for AnyCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        natural_term(value)
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        let literal = match term {
            Term::Iri(iri) => return Ok(Value::Uri(iri.clone())),
            Term::Blank(_) => return Ok(Value::Term(term.clone())),
            Term::Literal(literal) => literal,
        };
        let datatype = literal.datatype().as_str();
        let local = datatype.strip_prefix(xsd::NS).unwrap_or("");
        let decoded = match local {
            "string" => StringCodec.unserialize(term),
            "boolean" => BooleanCodec.unserialize(term),
            "double" | "float" => DoubleCodec(literal.datatype().clone()).unserialize(term),
            "decimal" => DecimalCodec.unserialize(term),
            "date" => DateCodec.unserialize(term),
            "dateTime" => DateTimeCodec.unserialize(term),
            "time" => TimeCodec.unserialize(term),
            "anyURI" => UriCodec.unserialize(term),
            _ => match IntegerKind::ALL.into_iter().find(|k| k.datatype().as_str() == datatype) {
                Some(kind) => IntegerCodec(kind).unserialize(term),
                None => Ok(Value::Term(term.clone())),
            },
        };
        Ok(decoded.unwrap_or_else(|_| Value::Term(term.clone())))
    }
}

/// The literal a value maps to when no type is declared.
fn natural_term(value: &Value) -> Result<Term, CodecError> {
    match value {
        Value::Bool(_) => BooleanCodec.serialize(value),
        Value::Integer(_) => IntegerCodec(IntegerKind::Integer).serialize(value),
        Value::Double(_) => DoubleCodec(xsd::double()).serialize(value),
        Value::Decimal(_) => DecimalCodec.serialize(value),
        Value::String(_) => StringCodec.serialize(value),
        Value::Date(_) => DateCodec.serialize(value),
        Value::DateTime(_) => DateTimeCodec.serialize(value),
        Value::Time(_) => TimeCodec.serialize(value),
        Value::Uri(iri) => Ok(Term::Iri(iri.clone())),
        Value::Term(term) => Ok(term.clone()),
        Value::Resource(reference) => Ok(Term::from(reference.subject().clone())),
    }
}

fn lexical<'a>(term: &'a Term, expected: &str) -> Result<&'a str, CodecError> {
    term.as_literal()
        .map(|literal| literal.lexical().trim())
        .ok_or_else(|| CodecError::unparsable(expected, term))
}

struct StringCodec;

impl Codec for StringCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::String(s) => Ok(Literal::string(s.as_str()).into()),
            Value::Term(Term::Literal(literal)) => Ok(Literal::string(literal.lexical()).into()),
            Value::Resource(_) | Value::Term(_) => Err(CodecError::expected("string", value)),
            other => Ok(Literal::string(other.to_string()).into()),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        match term {
            Term::Literal(literal) => Ok(Value::String(literal.lexical().to_string())),
            Term::Iri(iri) => Ok(Value::String(iri.to_string())),
            Term::Blank(_) => Err(CodecError::unparsable("string", term)),
        }
    }
}

struct BooleanCodec;

impl Codec for BooleanCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Bool(b) => Ok(Literal::typed(b.to_string(), xsd::boolean()).into()),
            other => Err(CodecError::expected("boolean", other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        match lexical(term, "boolean")? {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(CodecError::unparsable("boolean", term)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntegerKind {
    Integer,
    Long,
    Int,
    NonNegative,
    NonPositive,
    Positive,
    Negative,
}

impl IntegerKind {
    const ALL: [IntegerKind; 7] = [
        IntegerKind::Integer,
        IntegerKind::Long,
        IntegerKind::Int,
        IntegerKind::NonNegative,
        IntegerKind::NonPositive,
        IntegerKind::Positive,
        IntegerKind::Negative,
    ];

    fn tag(self) -> &'static str {
        match self {
            IntegerKind::Integer => "integer",
            IntegerKind::Long => "long",
            IntegerKind::Int => "int",
            IntegerKind::NonNegative => "non_negative_integer",
            IntegerKind::NonPositive => "non_positive_integer",
            IntegerKind::Positive => "positive_integer",
            IntegerKind::Negative => "negative_integer",
        }
    }

    fn datatype(self) -> Iri {
        match self {
            IntegerKind::Integer => xsd::integer(),
            IntegerKind::Long => xsd::long(),
            IntegerKind::Int => xsd::int(),
            IntegerKind::NonNegative => xsd::non_negative_integer(),
            IntegerKind::NonPositive => xsd::non_positive_integer(),
            IntegerKind::Positive => xsd::positive_integer(),
            IntegerKind::Negative => xsd::negative_integer(),
        }
    }

    fn admits(self, n: i64) -> bool {
        match self {
            IntegerKind::Integer | IntegerKind::Long => true,
            IntegerKind::Int => i32::try_from(n).is_ok(),
            IntegerKind::NonNegative => n >= 0,
            IntegerKind::NonPositive => n <= 0,
            IntegerKind::Positive => n > 0,
            IntegerKind::Negative => n < 0,
        }
    }
}

struct IntegerCodec(IntegerKind);

impl Codec for IntegerCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Integer(n) if self.0.admits(*n) => {
                Ok(Literal::typed(n.to_string(), self.0.datatype()).into())
            }
            Value::Integer(n) => Err(CodecError::new(format!("{n} is out of range for {}", self.0.tag()))),
            other => Err(CodecError::expected(self.0.tag(), other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        let lexical = lexical(term, self.0.tag())?;
        let lexical = lexical.strip_prefix('+').unwrap_or(lexical);
        lexical
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| CodecError::unparsable(self.0.tag(), term))
    }
}

/// `xsd:double` or `xsd:float`, both decoded to `f64`.
struct DoubleCodec(Iri);

impl Codec for DoubleCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        let d = match value {
            Value::Double(d) => *d,
            Value::Integer(n) => *n as f64,
            other => return Err(CodecError::expected("double", other)),
        };
        let lexical = if d.is_nan() {
            "NaN".to_string()
        } else if d == f64::INFINITY {
            "INF".to_string()
        } else if d == f64::NEG_INFINITY {
            "-INF".to_string()
        } else {
            format!("{d:?}")
        };
        Ok(Literal::typed(lexical, self.0.clone()).into())
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        let d = match lexical(term, "double")? {
            "INF" | "+INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            other => other
                .parse::<f64>()
                .map_err(|_| CodecError::unparsable("double", term))?,
        };
        Ok(Value::Double(d))
    }
}

/// Arbitrary-precision `xsd:decimal`.
struct DecimalCodec;

impl Codec for DecimalCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        let decimal = match value {
            Value::Decimal(d) => d.clone(),
            Value::Integer(n) => BigDecimal::from(*n),
            other => return Err(CodecError::expected("decimal", other)),
        };
        Ok(Literal::typed(decimal.to_string(), xsd::decimal()).into())
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        BigDecimal::from_str(lexical(term, "decimal")?)
            .map(Value::Decimal)
            .map_err(|_| CodecError::unparsable("decimal", term))
    }
}

struct DateCodec;

impl Codec for DateCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Date(date) => Ok(Literal::typed(date.format("%Y-%m-%d").to_string(), xsd::date()).into()),
            other => Err(CodecError::expected("date", other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        NaiveDate::parse_from_str(lexical(term, "date")?, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|_| CodecError::unparsable("date", term))
    }
}

/// `xsd:dateTime`; values without an offset are read as UTC.
struct DateTimeCodec;

impl Codec for DateTimeCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::DateTime(dt) => Ok(Literal::typed(dt.to_rfc3339(), xsd::date_time()).into()),
            other => Err(CodecError::expected("datetime", other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        let lexical = lexical(term, "datetime")?;
        if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
            return Ok(Value::DateTime(dt));
        }
        NaiveDateTime::parse_from_str(lexical, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Value::DateTime(naive.and_utc().fixed_offset()))
            .map_err(|_| CodecError::unparsable("datetime", term))
    }
}

struct TimeCodec;

impl Codec for TimeCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Time(time) => Ok(Literal::typed(time.format("%H:%M:%S%.f").to_string(), xsd::time()).into()),
            other => Err(CodecError::expected("time", other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        let lexical = lexical(term, "time")?;
        let lexical = lexical.strip_suffix('Z').unwrap_or(lexical);
        NaiveTime::parse_from_str(lexical, "%H:%M:%S%.f")
            .map(Value::Time)
            .map_err(|_| CodecError::unparsable("time", term))
    }
}

/// IRI references, stored as IRI nodes rather than literals.
struct UriCodec;

impl Codec for UriCodec {
    fn serialize(&self, value: &Value) -> Result<Term, CodecError> {
        match value {
            Value::Uri(iri) => Ok(Term::Iri(iri.clone())),
            Value::String(s) => Iri::new(s.as_str())
                .map(Term::Iri)
                .map_err(|_| CodecError::new(format!("{s:?} is not an absolute IRI"))),
            Value::Resource(reference) => match reference.subject().as_iri() {
                Some(iri) => Ok(Term::Iri(iri.clone())),
                None => Err(CodecError::expected("uri", value)),
            },
            other => Err(CodecError::expected("uri", other)),
        }
    }

    fn unserialize(&self, term: &Term) -> Result<Value, CodecError> {
        match term {
            Term::Iri(iri) => Ok(Value::Uri(iri.clone())),
            Term::Literal(literal) => Iri::new(literal.lexical())
                .map(Value::Uri)
                .map_err(|_| CodecError::unparsable("uri", term)),
            Term::Blank(_) => Err(CodecError::unparsable("uri", term)),
        }
    }
}
