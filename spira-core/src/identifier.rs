use crate::error::Error;
use crate::term::{BlankNode, Iri, Subject};

/// A user-supplied identifier for a resource.
///
/// Strings are classified on conversion: `_:label` becomes a blank node, a
/// string with a scheme becomes an absolute subject, anything else is a name
/// relative to the class base URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Subject(Subject),
    Name(String),
}

impl From<Subject> for Identifier {
    fn from(subject: Subject) -> Self {
        Identifier::Subject(subject)
    }
}

impl From<Iri> for Identifier {
    fn from(iri: Iri) -> Self {
        Identifier::Subject(Subject::Iri(iri))
    }
}

impl From<BlankNode> for Identifier {
    fn from(node: BlankNode) -> Self {
        Identifier::Subject(Subject::Blank(node))
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        if let Some(label) = value.strip_prefix("_:") {
            return Identifier::Subject(Subject::Blank(BlankNode::new(label)));
        }
        match Iri::new(value) {
            Ok(iri) => Identifier::Subject(Subject::Iri(iri)),
            Err(_) => Identifier::Name(value.to_string()),
        }
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::from(value.as_str())
    }
}

impl From<u64> for Identifier {
    fn from(value: u64) -> Self {
        Identifier::Name(value.to_string())
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Name(value.to_string())
    }
}

/// Resolves an identifier to an absolute subject.
///
/// Absolute subjects and blank nodes are returned unchanged even when a base
/// is configured. Relative names are appended to the base, inserting `/`
/// unless the base already ends with `/` or `#`.
pub fn resolve(identifier: impl Into<Identifier>, base: Option<&str>) -> Result<Subject, Error> {
    match identifier.into() {
        Identifier::Subject(subject) => Ok(subject),
        Identifier::Name(name) => match base {
            Some(base) if !name.is_empty() => Iri::new(join(base, &name)).map(Subject::Iri),
            _ => Err(Error::InvalidIdentifier { identifier: name }),
        },
    }
}

/// Strips the base from an IRI subject, returning the relative name.
///
/// Returns `None` for blank nodes and for IRIs outside the base.
pub fn relative_id(subject: &Subject, base: &str) -> Option<String> {
    let iri = subject.as_iri()?.as_str();
    let prefix = if base.ends_with('/') || base.ends_with('#') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    iri.strip_prefix(prefix.as_str())
        .filter(|rest| !rest.is_empty())
        .map(str::to_string)
}

pub(crate) fn join(base: &str, name: &str) -> String {
    if base.ends_with('/') || base.ends_with('#') {
        format!("{base}{name}")
    } else {
        format!("{base}/{name}")
    }
}
