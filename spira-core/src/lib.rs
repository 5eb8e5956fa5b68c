//! Spira maps RDF subjects onto typed, lazily loaded resource instances.
//!
//! Core concepts:
//! - **Triple / Term**: The RDF data model a graph store holds
//! - **GraphStore**: Pattern query, insert and delete over triples
//! - **ClassSchema**: Ordered properties, base URI, vocabulary and RDF types of a class
//! - **Codec**: Converts between native values and RDF terms for one type tag
//! - **Resource**: One subject seen through a class, with an attribute cache
//!   that loads on first read and writes only what changed
//!
//! # Example
//!
//! ```
//! use spira_core::{Attribute, ClassBuilder, ClassRegistry, CodecRegistry, MemoryGraph, Repository};
//!
//! let mut classes = ClassRegistry::new();
//! classes.register(
//!     ClassBuilder::new("Person")
//!         .base_uri("http://example.org/people/")
//!         .rdf_type("http://xmlns.com/foaf/0.1/Person")
//!         .property("name", "http://www.w3.org/2000/01/rdf-schema#label", "string")
//!         .property("age", "http://xmlns.com/foaf/0.1/age", "integer"),
//! )?;
//! let repo = Repository::new(MemoryGraph::new(), CodecRegistry::new(), classes);
//!
//! let alice = repo.for_subject("Person", "alice")?;
//! alice.set("name", "Alice")?;
//! alice.set("age", 15)?;
//! alice.save()?;
//!
//! let again = repo.for_subject("Person", "http://example.org/people/alice")?;
//! assert_eq!(again.get("age")?, Attribute::from(15));
//! assert!(again.exists()?);
//! # Ok::<(), spira_core::Error>(())
//! ```
//!
//! # Saves Are Not Atomic
//!
//! A save writes one property at a time, in declaration order, each as a
//! delete followed by an insert. If the store fails midway, earlier
//! properties stay written and the failing one is reported with its name.

mod async_store;
mod cache;
mod class;
mod codec;
mod config;
mod error;
mod identifier;
mod persistence;
mod resource;
mod scope;
mod store;
mod term;
mod value;
pub mod vocab;

pub use async_store::AsyncGraphStore;
pub use cache::AttributeCache;
pub use class::{Cardinality, ClassBuilder, ClassRegistry, ClassSchema, PropertySchema};
pub use codec::{Codec, CodecError, CodecRegistry};
pub use config::{ClassConfig, PropertyConfig, SchemaConfig};
pub use error::{BoxError, DestroyError, Error, PersistError, StoreFailure};
pub use identifier::{Identifier, relative_id, resolve};
pub use persistence::DestroyMode;
pub use resource::{Repository, Resource};
pub use store::{GraphStore, MemoryGraph};
pub use term::{BlankNode, Iri, Literal, Pattern, Subject, Term, Triple};
pub use value::{Attribute, ResourceRef, Value, ValueSet};
