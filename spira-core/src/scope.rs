use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::error::Error;
use crate::resource::{Resource, ResourceInner, Repository};
use crate::store::GraphStore;
use crate::term::Subject;
use crate::value::ResourceRef;

/// Identity cache for one load tree.
///
/// Every instance created while following relations from a top-level
/// instance shares that instance's scope. Resolving a reference returns the
/// live instance for the same class and subject if there is one; otherwise
/// an unloaded placeholder is registered first and then returned, so a cycle
/// such as A → B → A resolves back to A without loading anything.
///
/// The scope holds weak references only; instances keep it alive. Entries of
/// dropped instances are pruned whenever the map doubles past its live size.
pub(crate) struct LoadScope<S> {
    instances: RefCell<HashMap<(String, Subject), Weak<ResourceInner<S>>>>,
    prune_at: Cell<usize>,
}

const MIN_PRUNE_AT: usize = 16;

impl<S: GraphStore> LoadScope<S> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(LoadScope {
            instances: RefCell::new(HashMap::new()),
            prune_at: Cell::new(MIN_PRUNE_AT),
        })
    }

    pub(crate) fn register(&self, resource: &Resource<S>) {
        let key = (resource.class().name().to_string(), resource.subject().clone());
        let mut instances = self.instances.borrow_mut();
        if instances.len() >= self.prune_at.get() {
            instances.retain(|_, weak| weak.strong_count() > 0);
            self.prune_at.set((instances.len() * 2).max(MIN_PRUNE_AT));
        }
        instances.insert(key, resource.downgrade());
    }

    pub(crate) fn get(&self, class: &str, subject: &Subject) -> Option<Resource<S>> {
        self.instances
            .borrow()
            .get(&(class.to_string(), subject.clone()))
            .and_then(Resource::upgrade)
    }

    /// Returns the instance for a reference, creating a placeholder on a miss.
    pub(crate) fn resolve(
        self: &Rc<Self>,
        repository: &Repository<S>,
        reference: &ResourceRef,
    ) -> Result<Resource<S>, Error> {
        if let Some(existing) = self.get(reference.class(), reference.subject()) {
            debug!(subject = %reference.subject(), "identity cache hit");
            return Ok(existing);
        }
        let class = repository.classes().require(reference.class())?;
        Ok(Resource::in_scope(
            repository.clone(),
            class,
            reference.subject().clone(),
            Rc::clone(self),
        ))
    }

    /// Number of instances in the scope that are still alive.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.instances
            .borrow()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
