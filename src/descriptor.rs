//! Declarative bindings between a domain model and its build-file
//! properties.
//!
//! A [`ModelDescriptor`] knows how to get a model's resolved state `R`, the
//! part of the build file `P` the model's properties live in, and how to
//! flag the model as modified. Each property defined from it is bound to a
//! concrete model instance with `bind`.

use crate::error::PropertyError;
use crate::list::ListPropertyCore;
use crate::model::PropertyRef;
use crate::property::PropertyCore;
use crate::value::Codec;
use std::rc::Rc;

pub struct ModelDescriptor<M, R, P> {
    resolved: Rc<dyn Fn(&M) -> Option<R>>,
    parsed: Rc<dyn Fn(&M) -> Option<P>>,
    modified: Rc<dyn Fn(&M)>,
}

impl<M, R, P> Clone for ModelDescriptor<M, R, P> {
    fn clone(&self) -> Self {
        ModelDescriptor {
            resolved: self.resolved.clone(),
            parsed: self.parsed.clone(),
            modified: self.modified.clone(),
        }
    }
}

impl<M: 'static, R: 'static, P: 'static> ModelDescriptor<M, R, P> {
    pub fn new(
        resolved: impl Fn(&M) -> Option<R> + 'static,
        parsed: impl Fn(&M) -> Option<P> + 'static,
        modified: impl Fn(&M) + 'static,
    ) -> Self {
        ModelDescriptor {
            resolved: Rc::new(resolved),
            parsed: Rc::new(parsed),
            modified: Rc::new(modified),
        }
    }

    /// Define a scalar property. `resolved` picks the value out of the
    /// model's resolved state, `parsed` locates the property node.
    pub fn property<T: 'static>(
        &self,
        description: &str,
        resolved: impl Fn(&R) -> Option<T> + 'static,
        parsed: impl Fn(&P) -> Option<PropertyRef> + 'static,
        codec: Codec<T>,
    ) -> ModelProperty<M, R, P, T> {
        ModelProperty {
            descriptor: self.clone(),
            description: description.to_string(),
            resolved: Rc::new(resolved),
            parsed: Rc::new(parsed),
            codec,
        }
    }

    pub fn list_property<T: 'static>(
        &self,
        description: &str,
        resolved: impl Fn(&R) -> Option<Vec<T>> + 'static,
        parsed: impl Fn(&P) -> Option<PropertyRef> + 'static,
        codec: Codec<T>,
    ) -> ModelListProperty<M, R, P, T> {
        ModelListProperty {
            descriptor: self.clone(),
            description: description.to_string(),
            resolved: Rc::new(resolved),
            parsed: Rc::new(parsed),
            codec,
        }
    }

    fn locate(
        &self,
        model: &M,
        parsed: &dyn Fn(&P) -> Option<PropertyRef>,
        description: &str,
    ) -> Result<PropertyRef, PropertyError> {
        (self.parsed)(model)
            .and_then(|node| parsed(&node))
            .ok_or_else(|| PropertyError::NotBound {
                description: description.to_string(),
            })
    }

    fn marker(&self, model: &M) -> Rc<dyn Fn()>
    where
        M: Clone,
    {
        let modified = self.modified.clone();
        let owner = model.clone();
        Rc::new(move || modified(&owner))
    }

    fn external<T: 'static>(
        &self,
        model: &M,
        get: Rc<dyn Fn(&R) -> Option<T>>,
    ) -> Rc<dyn Fn() -> Option<T>>
    where
        M: Clone,
    {
        let resolved = self.resolved.clone();
        let owner = model.clone();
        Rc::new(move || resolved(&owner).and_then(|state| get(&state)))
    }
}

/// A scalar property definition, not yet bound to a model instance.
pub struct ModelProperty<M, R, P, T> {
    descriptor: ModelDescriptor<M, R, P>,
    description: String,
    resolved: Rc<dyn Fn(&R) -> Option<T>>,
    parsed: Rc<dyn Fn(&P) -> Option<PropertyRef>>,
    codec: Codec<T>,
}

impl<M, R, P, T> ModelProperty<M, R, P, T>
where
    M: Clone + 'static,
    R: 'static,
    P: 'static,
    T: 'static,
{
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bind to `model`. Mutations through the handle call the descriptor's
    /// modified-marker with `model`.
    pub fn bind(&self, model: &M) -> Result<PropertyCore<T>, PropertyError> {
        let node = self
            .descriptor
            .locate(model, self.parsed.as_ref(), &self.description)?;
        let core = node.scalar(self.codec);
        let binding = core
            .binding()
            .describe(self.description.clone())
            .with_marker(self.descriptor.marker(model));
        Ok(core
            .with_binding(binding)
            .with_external(self.descriptor.external(model, self.resolved.clone())))
    }
}

/// A list property definition, not yet bound to a model instance.
pub struct ModelListProperty<M, R, P, T> {
    descriptor: ModelDescriptor<M, R, P>,
    description: String,
    resolved: Rc<dyn Fn(&R) -> Option<Vec<T>>>,
    parsed: Rc<dyn Fn(&P) -> Option<PropertyRef>>,
    codec: Codec<T>,
}

impl<M, R, P, T> ModelListProperty<M, R, P, T>
where
    M: Clone + 'static,
    R: 'static,
    P: 'static,
    T: 'static,
{
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Bind to `model`. Element handles share the list's modified-marker.
    pub fn bind(&self, model: &M) -> Result<ListPropertyCore<T>, PropertyError> {
        let node = self
            .descriptor
            .locate(model, self.parsed.as_ref(), &self.description)?;
        let core = node.list(self.codec);
        let binding = core
            .binding()
            .describe(self.description.clone())
            .with_marker(self.descriptor.marker(model));
        Ok(core
            .with_binding(binding)
            .with_external(self.descriptor.external(model, self.resolved.clone())))
    }
}
