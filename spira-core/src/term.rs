use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Error;
use crate::vocab;

/// An absolute IRI.
///
/// Construction checks for a scheme (`scheme:rest`) and rejects characters
/// that cannot appear in an N-Triples IRI reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Iri(String);

impl Iri {
    /// Creates an IRI, failing with `InvalidIdentifier` if it is not absolute.
    pub fn new(iri: impl Into<String>) -> Result<Self, Error> {
        let iri = iri.into();
        if Self::is_absolute(&iri) {
            Ok(Iri(iri))
        } else {
            Err(Error::InvalidIdentifier { identifier: iri })
        }
    }

    /// Wraps a string known to be absolute (vocabulary constants).
    pub(crate) fn from_static(iri: &'static str) -> Self {
        debug_assert!(Self::is_absolute(iri), "{iri} is not an absolute IRI");
        Iri(iri.to_string())
    }

    /// Returns true if the string has a scheme and no forbidden characters.
    pub fn is_absolute(candidate: &str) -> bool {
        let Some((scheme, rest)) = candidate.split_once(':') else {
            return false;
        };
        let mut chars = scheme.chars();
        let scheme_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        scheme_ok
            && !rest.is_empty()
            && !candidate
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Iri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

static BLANK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// An anonymous node, only meaningful inside the store that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlankNode(String);

impl BlankNode {
    /// Creates a blank node with the given label (without the `_:` prefix).
    pub fn new(id: impl Into<String>) -> Self {
        BlankNode(id.into())
    }

    /// Creates a blank node with a label unique within this process.
    pub fn fresh() -> Self {
        let n = BLANK_COUNTER.fetch_add(1, Ordering::Relaxed);
        BlankNode(format!("spira{n}"))
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// The resource a triple is about: an IRI or a blank node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Subject {
    Iri(Iri),
    Blank(BlankNode),
}

impl Subject {
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            Subject::Iri(iri) => Some(iri),
            Subject::Blank(_) => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Subject::Blank(_))
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Iri(iri) => write!(f, "<{iri}>"),
            Subject::Blank(node) => node.fmt(f),
        }
    }
}

impl From<Iri> for Subject {
    fn from(iri: Iri) -> Self {
        Subject::Iri(iri)
    }
}

impl From<BlankNode> for Subject {
    fn from(node: BlankNode) -> Self {
        Subject::Blank(node)
    }
}

/// A literal value with its datatype and optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: String,
    datatype: Iri,
    language: Option<String>,
}

impl Literal {
    pub fn typed(lexical: impl Into<String>, datatype: Iri) -> Self {
        Literal {
            lexical: lexical.into(),
            datatype,
            language: None,
        }
    }

    /// A plain `xsd:string` literal.
    pub fn string(lexical: impl Into<String>) -> Self {
        Self::typed(lexical, vocab::xsd::string())
    }

    /// A language-tagged `rdf:langString` literal.
    pub fn lang(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Literal {
            lexical: lexical.into(),
            datatype: vocab::rdf::lang_string(),
            language: Some(language.into().to_ascii_lowercase()),
        }
    }

    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    pub fn datatype(&self) -> &Iri {
        &self.datatype
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"")?;
        for c in self.lexical.chars() {
            match c {
                '"' => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                _ => write!(f, "{c}")?,
            }
        }
        f.write_str("\"")?;
        match &self.language {
            Some(lang) => write!(f, "@{lang}"),
            None => write!(f, "^^<{}>", self.datatype),
        }
    }
}

/// Any node that can appear in object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Term {
    Iri(Iri),
    Blank(BlankNode),
    Literal(Literal),
}

impl Term {
    /// Returns the term as a subject if it is an IRI or blank node.
    pub fn as_subject(&self) -> Option<Subject> {
        match self {
            Term::Iri(iri) => Some(Subject::Iri(iri.clone())),
            Term::Blank(node) => Some(Subject::Blank(node.clone())),
            Term::Literal(_) => None,
        }
    }

    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{iri}>"),
            Term::Blank(node) => node.fmt(f),
            Term::Literal(literal) => literal.fmt(f),
        }
    }
}

impl From<Subject> for Term {
    fn from(subject: Subject) -> Self {
        match subject {
            Subject::Iri(iri) => Term::Iri(iri),
            Subject::Blank(node) => Term::Blank(node),
        }
    }
}

impl From<Iri> for Term {
    fn from(iri: Iri) -> Self {
        Term::Iri(iri)
    }
}

impl From<Literal> for Term {
    fn from(literal: Literal) -> Self {
        Term::Literal(literal)
    }
}

/// A single (subject, predicate, object) fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Subject,
    pub predicate: Iri,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Subject, predicate: Iri, object: impl Into<Term>) -> Self {
        Triple {
            subject,
            predicate,
            object: object.into(),
        }
    }
}

/// Formats the triple as one N-Triples line.
impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} .", self.subject, self.predicate, self.object)
    }
}

/// A triple filter; `None` positions match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    pub subject: Option<Subject>,
    pub predicate: Option<Iri>,
    pub object: Option<Term>,
}

impl Pattern {
    /// Matches every triple.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn subject(subject: Subject) -> Self {
        Pattern {
            subject: Some(subject),
            ..Self::default()
        }
    }

    pub fn object(object: impl Into<Term>) -> Self {
        Pattern {
            object: Some(object.into()),
            ..Self::default()
        }
    }

    pub fn with_predicate(mut self, predicate: Iri) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_object(mut self, object: impl Into<Term>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == triple.subject)
            && self.predicate.as_ref().is_none_or(|p| *p == triple.predicate)
            && self.object.as_ref().is_none_or(|o| *o == triple.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iri_requires_scheme() {
        assert!(Iri::new("http://example.org/a").is_ok());
        assert!(Iri::new("urn:isbn:0451450523").is_ok());
        assert!(Iri::new("alice").is_err());
        assert!(Iri::new("1http://bad").is_err());
        assert!(Iri::new("http://example.org/with space").is_err());
        assert!(Iri::new("mailto:").is_err());
    }

    #[test]
    fn blank_nodes_are_unique() {
        let a = BlankNode::fresh();
        let b = BlankNode::fresh();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("_:"));
    }

    #[test]
    fn literal_ntriples_form() {
        let plain = Literal::string("say \"hi\"\n");
        assert_eq!(
            plain.to_string(),
            "\"say \\\"hi\\\"\\n\"^^<http://www.w3.org/2001/XMLSchema#string>"
        );
        assert_eq!(Literal::lang("Alice", "EN").to_string(), "\"Alice\"@en");
    }

    #[test]
    fn triple_display() {
        let triple = Triple::new(
            Subject::Iri(Iri::new("http://example.org/alice").unwrap()),
            Iri::new("http://www.w3.org/2000/01/rdf-schema#label").unwrap(),
            Literal::string("Alice"),
        );
        assert_eq!(
            triple.to_string(),
            "<http://example.org/alice> <http://www.w3.org/2000/01/rdf-schema#label> \
             \"Alice\"^^<http://www.w3.org/2001/XMLSchema#string> ."
        );
    }

    #[test]
    fn pattern_matching() {
        let alice = Subject::Iri(Iri::new("http://example.org/alice").unwrap());
        let bob = Subject::Iri(Iri::new("http://example.org/bob").unwrap());
        let knows = Iri::new("http://xmlns.com/foaf/0.1/knows").unwrap();
        let triple = Triple::new(alice.clone(), knows.clone(), bob.clone());

        assert!(Pattern::any().matches(&triple));
        assert!(Pattern::subject(alice.clone()).matches(&triple));
        assert!(Pattern::subject(alice.clone()).with_predicate(knows).matches(&triple));
        assert!(Pattern::object(bob.clone()).matches(&triple));
        assert!(!Pattern::subject(bob).matches(&triple));
        assert!(!Pattern::object(alice).matches(&triple));
    }
}
