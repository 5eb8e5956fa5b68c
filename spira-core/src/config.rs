use serde::Deserialize;
use tracing::debug;

use crate::class::{Cardinality, ClassBuilder, ClassRegistry};
use crate::error::Error;

/// Class schemas described in TOML.
///
/// ```toml
/// [[class]]
/// name = "app::Person"
/// base_uri = "http://example.org/people/"
/// types = ["http://xmlns.com/foaf/0.1/Person"]
///
/// [[class.property]]
/// name = "name"
/// predicate = "http://www.w3.org/2000/01/rdf-schema#label"
/// type = "string"
/// ```
#[derive(Debug, Deserialize, Default)]
pub struct SchemaConfig {
    #[serde(default, rename = "class")]
    pub classes: Vec<ClassConfig>,
}

#[derive(Debug, Deserialize)]
pub struct ClassConfig {
    pub name: String,
    pub extends: Option<String>,
    pub base_uri: Option<String>,
    pub vocabulary: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub replace_types: bool,
    #[serde(default, rename = "property")]
    pub properties: Vec<PropertyConfig>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    /// Falls back to the class vocabulary when omitted.
    pub predicate: Option<String>,
    #[serde(default = "default_type")]
    pub r#type: String,
    #[serde(default)]
    pub multi: bool,
}

fn default_type() -> String {
    "any".to_string()
}

impl SchemaConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        Ok(toml::from_str(content)?)
    }

    /// Registers every class, parents before children regardless of the
    /// order they appear in.
    pub fn into_registry(self) -> Result<ClassRegistry, Error> {
        let mut registry = ClassRegistry::new();
        self.register_into(&mut registry)?;
        Ok(registry)
    }

    /// Registers every class into an existing registry; parents may already
    /// be registered there.
    pub fn register_into(self, registry: &mut ClassRegistry) -> Result<(), Error> {
        let mut pending: Vec<ClassBuilder> = self.classes.into_iter().map(ClassConfig::into_builder).collect();

        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending
                .into_iter()
                .partition(|b| b.parent().is_none_or(|parent| registry.contains(parent)));
            if ready.is_empty() {
                let stuck = &waiting[0];
                return Err(Error::UnknownClass(stuck.parent().unwrap_or_default().to_string()));
            }
            for builder in ready {
                let class = registry.register(builder)?;
                debug!(class = class.name(), "registered class from config");
            }
            pending = waiting;
        }
        Ok(())
    }
}

impl ClassConfig {
    fn into_builder(self) -> ClassBuilder {
        let mut builder = ClassBuilder::new(self.name);
        if let Some(parent) = self.extends {
            builder = builder.extends(parent);
        }
        if let Some(base) = self.base_uri {
            builder = builder.base_uri(base);
        }
        if let Some(vocabulary) = self.vocabulary {
            builder = builder.vocabulary(vocabulary);
        }
        for ty in self.types {
            builder = builder.rdf_type(ty);
        }
        if self.replace_types {
            builder = builder.replace_types();
        }
        for property in self.properties {
            let cardinality = if property.multi {
                Cardinality::Multi
            } else {
                Cardinality::Single
            };
            builder = builder.declare(property.name, property.predicate, property.r#type, cardinality);
        }
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEOPLE: &str = r#"
[[class]]
name = "app::Employee"
extends = "app::Person"
types = ["http://example.org/Employee"]

[[class.property]]
name = "employer"
predicate = "http://example.org/employer"
type = "Company"

[[class]]
name = "app::Person"
base_uri = "http://example.org/people/"
vocabulary = "http://xmlns.com/foaf/0.1/"
types = ["http://xmlns.com/foaf/0.1/Person"]

[[class.property]]
name = "name"
predicate = "http://www.w3.org/2000/01/rdf-schema#label"
type = "string"

[[class.property]]
name = "age"
type = "integer"

[[class.property]]
name = "nick"
multi = true
"#;

    #[test]
    fn parse_and_register_out_of_order() {
        let registry = SchemaConfig::from_toml_str(PEOPLE).unwrap().into_registry().unwrap();
        assert_eq!(registry.len(), 2);

        let person = registry.require("app::Person").unwrap();
        let age = person.require("age").unwrap();
        assert_eq!(age.predicate().as_str(), "http://xmlns.com/foaf/0.1/age");
        assert_eq!(age.type_tag(), "integer");

        let nick = person.require("nick").unwrap();
        assert!(nick.is_multi());
        assert_eq!(nick.type_tag(), "any");

        let employee = registry.require("app::Employee").unwrap();
        assert_eq!(employee.types().len(), 2);
        assert_eq!(employee.base_uri(), Some("http://example.org/people/"));
        let names: Vec<_> = employee.properties().map(|p| p.name()).collect();
        assert_eq!(names, ["name", "age", "nick", "employer"]);
    }

    #[test]
    fn missing_parent() {
        let config = SchemaConfig::from_toml_str(
            r#"
[[class]]
name = "Orphan"
extends = "Nobody"
"#,
        )
        .unwrap();
        assert!(matches!(config.into_registry(), Err(Error::UnknownClass(name)) if name == "Nobody"));
    }

    #[test]
    fn malformed_toml() {
        let err = SchemaConfig::from_toml_str("[[class]]\nname = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn empty_config() {
        let registry = SchemaConfig::from_toml_str("").unwrap().into_registry().unwrap();
        assert!(registry.is_empty());
    }
}
