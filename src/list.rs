use crate::error::PropertyError;
use crate::model::{Binding, Document};
use crate::property::{reference_path, PropertyCore, Target};
use crate::resolve::{Located, Resolved, Resolver};
use crate::tree::{DslFile, Element, ElementValue, NodeId};
use crate::value::Codec;
use std::rc::Rc;
use tracing::debug;

/// A list property binding.
///
/// The property either holds a list, or is a reference to another list
/// property (`propListRef = propList`). In the second case the elements
/// of the referenced list are visible through this binding but cannot be
/// changed through it.
pub struct ListPropertyCore<T> {
    binding: Binding,
    path: Vec<String>,
    codec: Codec<T>,
    external: Option<Rc<dyn Fn() -> Option<Vec<T>>>>,
}

/// The list a binding's elements live in, read out of one tree snapshot.
struct ListTarget {
    path: Vec<String>,
    /// The referenced path, when reached through an alias.
    alias_of: Option<String>,
    ids: Vec<NodeId>,
}

impl<T> ListPropertyCore<T> {
    pub(crate) fn new(binding: Binding, path: Vec<String>, codec: Codec<T>) -> Self {
        ListPropertyCore {
            binding,
            path,
            codec,
            external: None,
        }
    }

    pub(crate) fn with_external(mut self, external: Rc<dyn Fn() -> Option<Vec<T>>>) -> Self {
        self.external = Some(external);
        self
    }

    pub(crate) fn with_binding(mut self, binding: Binding) -> Self {
        self.binding = binding;
        self
    }

    pub(crate) fn binding(&self) -> &Binding {
        &self.binding
    }

    pub fn description(&self) -> &str {
        &self.binding.description
    }

    /// One handle per element, in file order. Handles report each
    /// element's own parsed form; unset slots are included.
    pub fn editable_values(&self) -> Result<Vec<PropertyCore<T>>, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        let Some(target) = self.target(&doc.file)? else {
            return Ok(Vec::new());
        };
        Ok(target
            .ids
            .iter()
            .enumerate()
            .map(|(index, id)| self.element(&target, index, *id))
            .collect())
    }

    pub fn len(&self) -> Result<usize, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        Ok(self.target(&doc.file)?.map_or(0, |target| target.ids.len()))
    }

    pub fn is_empty(&self) -> Result<bool, PropertyError> {
        Ok(self.len()? == 0)
    }

    /// Remove the element at `index`. Later elements move down by one and
    /// their old handles go stale.
    pub fn delete_item(&self, index: usize) -> Result<(), PropertyError> {
        self.mutate("delete_item", |doc, len| {
            if index >= len {
                return Err(self.out_of_range(index, len));
            }
            if let Some(items) = doc.file.property_mut(&self.path).and_then(Element::items_mut) {
                items.remove(index);
            }
            Ok(())
        })
    }

    /// Insert an unset element at `index` (`index == len` appends) and
    /// return its handle. An absent property becomes a new list first.
    pub fn add_item(&self, index: usize) -> Result<PropertyCore<T>, PropertyError> {
        let mut added = None;
        self.mutate("add_item", |doc, len| {
            if index > len {
                return Err(self.out_of_range(index, len));
            }
            let element = doc.file.element(ElementValue::Unset);
            added = Some(element.id);
            match doc.file.property_mut(&self.path).and_then(Element::items_mut) {
                Some(items) => items.insert(index, element),
                None => {
                    let list = ElementValue::List {
                        items: vec![element],
                        style: doc.config.dialect.list_style(),
                    };
                    doc.file.assign(&self.path, list);
                }
            }
            Ok(())
        })?;
        let id = added.ok_or_else(|| self.binding.stale())?;
        let target = ListTarget {
            path: self.path.clone(),
            alias_of: None,
            ids: Vec::new(),
        };
        Ok(self.element(&target, index, id))
    }

    /// The resolved value of every set element. `None` entries did not
    /// resolve.
    pub fn resolved_value(&self) -> Result<Vec<Option<T>>, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        let Some(element) = doc.file.property(&self.path) else {
            return Ok(Vec::new());
        };
        let scope = self.path.split_last().map_or(&[][..], |(_, parent)| parent);
        let mut resolver = Resolver::new(&doc.file);
        match resolver.resolve(scope, element) {
            Some(Resolved::List(items)) => Ok(items
                .into_iter()
                .map(|item| match item {
                    Some(Resolved::Scalar(scalar)) => (self.codec.parse)(&scalar),
                    _ => None,
                })
                .collect()),
            Some(Resolved::Scalar(_)) => Err(self.not_a_list()),
            None => Ok(Vec::new()),
        }
    }

    pub fn external_value(&self) -> Option<Vec<T>> {
        self.external.as_ref().and_then(|external| external())
    }

    /// The property this list aliases, if it is a reference.
    pub fn alias_of(&self) -> Result<Option<String>, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        Ok(match doc.file.property(&self.path).map(|e| &e.value) {
            Some(ElementValue::Reference(path)) => Some(path.to_string()),
            _ => None,
        })
    }

    /// Make the whole property an alias of another list.
    pub fn set_reference(&self, name: &str) -> Result<(), PropertyError> {
        let path = reference_path(name)?;
        self.replace("set_reference", |file| {
            file.assign(&self.path, ElementValue::Reference(path))
        })
    }

    /// Remove the whole property.
    pub fn delete(&self) -> Result<(), PropertyError> {
        self.replace("delete", |file| {
            file.remove_property(&self.path);
        })
    }

    // ── Internals ───────────────────────────────────────────────────

    fn element(&self, target: &ListTarget, index: usize, id: NodeId) -> PropertyCore<T> {
        let binding = self
            .binding
            .describe(format!("{}[{}]", self.binding.description, index));
        PropertyCore::for_element(
            binding,
            Target::Element {
                list: target.path.clone(),
                index,
                id,
            },
            self.codec,
            target.alias_of.clone(),
        )
    }

    /// Find the list, following a chain of references. A dangling or
    /// cyclic alias has no elements but is still an alias.
    fn target(&self, file: &DslFile) -> Result<Option<ListTarget>, PropertyError> {
        let Some(element) = file.property(&self.path) else {
            return Ok(None);
        };
        let start = Located::property(element, &self.path);
        let (found, alias_of) = match &element.value {
            ElementValue::Reference(path) => match Resolver::new(file).follow(start) {
                Some(found) => (found, Some(path.to_string())),
                None => {
                    return Ok(Some(ListTarget {
                        path: self.path.clone(),
                        alias_of: Some(path.to_string()),
                        ids: Vec::new(),
                    }))
                }
            },
            _ => (start, None),
        };
        match (found.element.items(), found.property_path) {
            (Some(items), Some(path)) => Ok(Some(ListTarget {
                path,
                alias_of,
                ids: items.iter().map(|item| item.id).collect(),
            })),
            _ => Err(self.not_a_list()),
        }
    }

    /// Run a structural list mutation. `apply` gets the current length and
    /// must leave the tree alone when it fails.
    fn mutate(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut Document, usize) -> Result<(), PropertyError>,
    ) -> Result<(), PropertyError> {
        let doc = self.binding.document()?;
        {
            let mut doc = doc.borrow_mut();
            let len = match self.target(&doc.file)? {
                Some(ListTarget {
                    alias_of: Some(target),
                    ..
                }) => {
                    return Err(PropertyError::ReadOnlyAlias {
                        property: self.binding.description.clone(),
                        target,
                    })
                }
                Some(target) => target.ids.len(),
                None => 0,
            };
            apply(&mut *doc, len)?;
            doc.modified = true;
        }
        debug!(property = %self.binding.description, operation, "list updated");
        self.binding.mark_modified();
        Ok(())
    }

    /// Rewrite the property itself, whatever it holds.
    fn replace(&self, operation: &str, apply: impl FnOnce(&mut DslFile)) -> Result<(), PropertyError> {
        let doc = self.binding.document()?;
        {
            let mut doc = doc.borrow_mut();
            apply(&mut doc.file);
            doc.modified = true;
        }
        debug!(property = %self.binding.description, operation, "list updated");
        self.binding.mark_modified();
        Ok(())
    }

    fn out_of_range(&self, index: usize, len: usize) -> PropertyError {
        PropertyError::IndexOutOfRange {
            property: self.binding.description.clone(),
            index,
            len,
        }
    }

    fn not_a_list(&self) -> PropertyError {
        PropertyError::NotAList {
            property: self.binding.description.clone(),
        }
    }
}
