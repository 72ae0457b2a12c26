use crate::ast::{ReferencePath, StringPart};
use crate::error::PropertyError;
use crate::model::{Binding, Document};
use crate::parser::{is_single_value, parse_template};
use crate::resolve::{Resolved, Resolver};
use crate::tree::{DslFile, Element, ElementValue, NodeId, Scalar};
use crate::value::{classify, Codec, ParsedValue, PropertyValue, Segment};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// The node a scalar handle is bound to.
#[derive(Debug, Clone)]
pub(crate) enum Target {
    /// A whole property, by path. It may be absent.
    Property(Vec<String>),
    /// One slot of the list held by the property at `list`. The slot is
    /// only valid while the node at `index` still has id `id`.
    Element {
        list: Vec<String>,
        index: usize,
        id: NodeId,
    },
}

impl Target {
    /// The block the node's own references are resolved from.
    fn scope(&self) -> &[String] {
        let path = match self {
            Target::Property(path) => path,
            Target::Element { list, .. } => list,
        };
        path.split_last().map_or(&[][..], |(_, parent)| parent)
    }
}

/// A scalar property binding: one property node, or one list element.
///
/// Handles are cheap views. They are never cached by the session and go
/// stale once the file is reparsed or, for list elements, once a list
/// mutation moves another node into their slot.
pub struct PropertyCore<T> {
    binding: Binding,
    target: Target,
    codec: Codec<T>,
    /// Set for elements reached through a list alias.
    alias_of: Option<String>,
    external: Option<Rc<dyn Fn() -> Option<T>>>,
}

impl<T> Clone for PropertyCore<T> {
    fn clone(&self) -> Self {
        PropertyCore {
            binding: self.binding.clone(),
            target: self.target.clone(),
            codec: self.codec,
            alias_of: self.alias_of.clone(),
            external: self.external.clone(),
        }
    }
}

impl<T> PropertyCore<T> {
    pub(crate) fn for_property(binding: Binding, path: Vec<String>, codec: Codec<T>) -> Self {
        PropertyCore {
            binding,
            target: Target::Property(path),
            codec,
            alias_of: None,
            external: None,
        }
    }

    pub(crate) fn for_element(
        binding: Binding,
        target: Target,
        codec: Codec<T>,
        alias_of: Option<String>,
    ) -> Self {
        PropertyCore {
            binding,
            target,
            codec,
            alias_of,
            external: None,
        }
    }

    pub(crate) fn with_external(mut self, external: Rc<dyn Fn() -> Option<T>>) -> Self {
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

    /// Dotted path of the property this handle is bound to, with `[i]`
    /// for list elements.
    pub fn path(&self) -> String {
        match &self.target {
            Target::Property(path) => path.join("."),
            Target::Element { list, index, .. } => format!("{}[{}]", list.join("."), index),
        }
    }

    // ── Reading ─────────────────────────────────────────────────────

    /// The node as written, with references and interpolations unresolved.
    pub fn parsed_value(&self) -> Result<ParsedValue<T>, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        let element = self.locate(&doc.file)?;
        Ok(classify(element, &self.codec, &doc.config))
    }

    /// The value after following references and interpolations in the file.
    /// `None` when the node is absent, dangling, cyclic or not of type `T`.
    pub fn resolved_value(&self) -> Result<Option<T>, PropertyError> {
        let doc = self.binding.document()?;
        let doc = doc.borrow();
        let Some(element) = self.locate(&doc.file)? else {
            return Ok(None);
        };
        let mut resolver = Resolver::new(&doc.file);
        Ok(match resolver.resolve(self.target.scope(), element) {
            Some(Resolved::Scalar(scalar)) => (self.codec.parse)(&scalar),
            _ => None,
        })
    }

    /// The value supplied by the model's own resolution, if attached.
    pub fn external_value(&self) -> Option<T> {
        self.external.as_ref().and_then(|external| external())
    }

    pub fn value(&self) -> Result<PropertyValue<T>, PropertyError> {
        Ok(PropertyValue {
            parsed: self.parsed_value()?,
            resolved: self.resolved_value()?,
            external: self.external_value(),
        })
    }

    fn locate<'d>(&self, file: &'d DslFile) -> Result<Option<&'d Element>, PropertyError> {
        match &self.target {
            Target::Property(path) => Ok(file.property(path)),
            Target::Element { list, index, id } => {
                match file
                    .property(list)
                    .and_then(Element::items)
                    .and_then(|items| items.get(*index))
                {
                    Some(element) if element.id == *id => Ok(Some(element)),
                    _ => Err(self.binding.stale()),
                }
            }
        }
    }

    // ── Writing ─────────────────────────────────────────────────────

    pub fn set_literal(&self, value: T) -> Result<(), PropertyError> {
        let scalar = (self.codec.format)(&value);
        if !scalar.has_literal_form() {
            return Err(self.invalid_literal(scalar.to_string()));
        }
        self.write("set_literal", ElementValue::Literal(scalar))
    }

    /// Replace the node with a bare reference. The name has to be a valid
    /// reference path; whether it currently resolves is not checked.
    pub fn set_reference(&self, name: &str) -> Result<(), PropertyError> {
        let path = reference_path(name)?;
        self.write("set_reference", ElementValue::Reference(path))
    }

    /// Replace the node with one double-quoted string, segments in order.
    pub fn set_interpolated(&self, segments: &[Segment]) -> Result<(), PropertyError> {
        let parts = segments
            .iter()
            .map(|segment| match segment {
                Segment::Text(text) => Ok(StringPart::Text(text.clone())),
                Segment::Reference(name) => reference_path(name).map(StringPart::Reference),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.write("set_interpolated", interpolated(parts))
    }

    /// Like [`set_interpolated`](Self::set_interpolated), from a template
    /// such as `${propB}nd`.
    pub fn set_interpolated_str(&self, template: &str) -> Result<(), PropertyError> {
        let parts = parse_template(template).map_err(|_| PropertyError::InvalidReference {
            reference: template.to_string(),
        })?;
        self.write("set_interpolated", interpolated(parts))
    }

    pub fn set_parsed_value(&self, value: ParsedValue<T>) -> Result<(), PropertyError> {
        match value {
            ParsedValue::NotSet => self.delete(),
            ParsedValue::Literal(value, _) => self.set_literal(value),
            ParsedValue::Reference(name) => self.set_reference(&name),
            ParsedValue::InterpolatedString(segments) => self.set_interpolated(&segments),
            ParsedValue::Unknown(raw) => {
                if !is_single_value(&raw) {
                    return Err(self.invalid_literal(raw));
                }
                self.write("set_unknown", ElementValue::Unknown(raw.trim().to_string()))
            }
        }
    }

    /// Remove the property. A list element becomes an unset slot instead,
    /// so the indices of the other elements do not move.
    pub fn delete(&self) -> Result<(), PropertyError> {
        self.mutate("delete", |file| {
            match &self.target {
                Target::Property(path) => {
                    file.remove_property(path);
                }
                Target::Element { .. } => {
                    if let Some(element) = self.locate_mut(file)? {
                        element.set_value(ElementValue::Unset);
                    }
                }
            }
            Ok(())
        })
    }

    fn write(&self, operation: &str, value: ElementValue) -> Result<(), PropertyError> {
        self.mutate(operation, |file| {
            match &self.target {
                Target::Property(path) => file.assign(path, value),
                Target::Element { .. } => {
                    if let Some(element) = self.locate_mut(file)? {
                        element.set_value(value);
                    }
                }
            }
            Ok(())
        })
    }

    /// Run one mutation against the live tree and notify the owner.
    fn mutate(
        &self,
        operation: &str,
        apply: impl FnOnce(&mut DslFile) -> Result<(), PropertyError>,
    ) -> Result<(), PropertyError> {
        if let Some(target) = &self.alias_of {
            return Err(PropertyError::ReadOnlyAlias {
                property: self.binding.description.clone(),
                target: target.clone(),
            });
        }
        let doc: Rc<RefCell<Document>> = self.binding.document()?;
        {
            let mut doc = doc.borrow_mut();
            apply(&mut doc.file)?;
            doc.modified = true;
        }
        debug!(property = %self.binding.description, operation, "property updated");
        self.binding.mark_modified();
        Ok(())
    }

    fn invalid_literal(&self, text: String) -> PropertyError {
        PropertyError::InvalidLiteral {
            property: self.binding.description.clone(),
            text,
        }
    }

    fn locate_mut<'d>(&self, file: &'d mut DslFile) -> Result<Option<&'d mut Element>, PropertyError> {
        match &self.target {
            Target::Property(path) => Ok(file.property_mut(path)),
            Target::Element { list, index, id } => {
                match file
                    .property_mut(list)
                    .and_then(Element::items_mut)
                    .and_then(|items| items.get_mut(*index))
                {
                    Some(element) if element.id == *id => Ok(Some(element)),
                    _ => Err(self.binding.stale()),
                }
            }
        }
    }
}

pub(crate) fn reference_path(name: &str) -> Result<ReferencePath, PropertyError> {
    ReferencePath::parse(name).ok_or_else(|| PropertyError::InvalidReference {
        reference: name.to_string(),
    })
}

/// Text without any reference is stored as a plain string literal.
fn interpolated(parts: Vec<StringPart>) -> ElementValue {
    if parts.iter().all(|part| matches!(part, StringPart::Text(_))) {
        let text = parts
            .into_iter()
            .map(|part| match part {
                StringPart::Text(text) => text,
                StringPart::Reference(_) => String::new(),
            })
            .collect();
        return ElementValue::Literal(Scalar::String(text));
    }
    ElementValue::Interpolated(parts)
}
