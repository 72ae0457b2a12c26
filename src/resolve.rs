use crate::ast::{RefPathSegment, ReferencePath, StringPart};
use crate::tree::*;
use serde::Serialize;
use tracing::{trace, warn};

/// The result of following references and interpolations.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Scalar(Scalar),
    /// Unset slots are skipped; items that do not resolve are `None`.
    List(Vec<Option<Resolved>>),
}

/// An element found by reference lookup.
pub(crate) struct Located<'a> {
    pub element: &'a Element,
    /// Block path the element's own references are resolved from.
    pub scope: Vec<String>,
    /// Absolute path, used for cycle detection (`ext.propList[1]`).
    pub key: String,
    /// Set when the element is the value of a whole property.
    pub property_path: Option<Vec<String>>,
}

impl<'a> Located<'a> {
    pub fn property(element: &'a Element, path: &[String]) -> Self {
        let scope = path
            .split_last()
            .map(|(_, parents)| parents.to_vec())
            .unwrap_or_default();
        Located {
            element,
            scope,
            key: path.join("."),
            property_path: Some(path.to_vec()),
        }
    }
}

/// Resolves references over one snapshot of the tree.
///
/// Every reference being followed is kept on a stack of absolute paths, so
/// a cyclic chain ends in a failed resolution instead of recursing forever.
pub(crate) struct Resolver<'a> {
    file: &'a DslFile,
    visiting: Vec<String>,
    /// Set once a cycle has been seen.
    pub cycle: bool,
}

impl<'a> Resolver<'a> {
    pub fn new(file: &'a DslFile) -> Self {
        Resolver {
            file,
            visiting: Vec::new(),
            cycle: false,
        }
    }

    /// Find the element a reference points to. The first name is looked up
    /// in `scope` and then in each enclosing block up to the root.
    pub fn lookup(&self, scope: &[String], path: &ReferencePath) -> Option<Located<'a>> {
        let (first, rest) = match path.0.split_first() {
            Some((RefPathSegment::Name(first), rest)) => (first, rest),
            _ => return None,
        };
        for depth in (0..=scope.len()).rev() {
            let block = self.file.block_at(&scope[..depth])?;
            if block.entry(first).is_some() {
                let found_in = scope[..depth].join(".");
                trace!(reference = %path, scope = %found_in, "reference lookup");
                return walk(block, scope[..depth].to_vec(), first, rest);
            }
        }
        None
    }

    /// Resolve an element found in `scope`.
    pub fn resolve(&mut self, scope: &[String], element: &'a Element) -> Option<Resolved> {
        match &element.value {
            ElementValue::Unset | ElementValue::Unknown(_) => None,
            ElementValue::Literal(scalar) => Some(Resolved::Scalar(scalar.clone())),
            ElementValue::Reference(path) => self.resolve_reference(scope, path),
            ElementValue::Interpolated(parts) => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        StringPart::Text(text) => out.push_str(text),
                        StringPart::Reference(path) => match self.resolve_reference(scope, path)? {
                            Resolved::Scalar(scalar) => out.push_str(&scalar.to_string()),
                            Resolved::List(_) => return None,
                        },
                    }
                }
                Some(Resolved::Scalar(Scalar::String(out)))
            }
            ElementValue::List { items, .. } => Some(Resolved::List(
                set_items(items)
                    .map(|item| self.resolve(scope, item))
                    .collect(),
            )),
        }
    }

    pub fn resolve_reference(&mut self, scope: &[String], path: &ReferencePath) -> Option<Resolved> {
        let target = self.enter(scope, path)?;
        let resolved = self.resolve(&target.scope, target.element);
        self.visiting.pop();
        resolved
    }

    /// Follow a chain of plain references from `start` to the first element
    /// that is not a reference.
    pub fn follow(&mut self, start: Located<'a>) -> Option<Located<'a>> {
        let depth = self.visiting.len();
        self.visiting.push(start.key.clone());
        let mut current = start;
        let result = loop {
            let element: &'a Element = current.element;
            let path = match &element.value {
                ElementValue::Reference(path) => path,
                _ => break Some(current),
            };
            let next = match self.lookup(&current.scope, path) {
                Some(next) => next,
                None => break None,
            };
            if self.is_visiting(&next.key) {
                break None;
            }
            self.visiting.push(next.key.clone());
            current = next;
        };
        self.visiting.truncate(depth);
        result
    }

    /// Look up a reference and push it on the visiting stack.
    fn enter(&mut self, scope: &[String], path: &ReferencePath) -> Option<Located<'a>> {
        let target = self.lookup(scope, path)?;
        if self.is_visiting(&target.key) {
            return None;
        }
        self.visiting.push(target.key.clone());
        Some(target)
    }

    fn is_visiting(&mut self, key: &str) -> bool {
        if self.visiting.iter().any(|k| k == key) {
            warn!(reference = key, chain = %self.visiting.join(" -> "), "cyclic reference");
            self.cycle = true;
            return true;
        }
        false
    }
}

/// The items of a list as they read in the text. Indexed references count
/// these, not the unset slots a list edit may leave behind.
pub(crate) fn set_items(items: &[Element]) -> impl Iterator<Item = &Element> {
    items.iter().filter(|item| !item.is_unset())
}

/// Navigate from the entry `name` of `block` through the remaining path
/// segments: names descend into nested blocks, indices into list items.
fn walk<'a>(
    mut block: &'a Block,
    mut block_path: Vec<String>,
    first: &str,
    mut rest: &[RefPathSegment],
) -> Option<Located<'a>> {
    let mut name = first;
    loop {
        match &block.entry(name)?.kind {
            EntryKind::Block(child) => match rest.split_first() {
                Some((RefPathSegment::Name(next), tail)) => {
                    block_path.push(name.to_string());
                    block = child;
                    name = next.as_str();
                    rest = tail;
                }
                _ => return None,
            },
            EntryKind::Property { value, .. } => {
                let mut key = block_path
                    .iter()
                    .map(String::as_str)
                    .chain(std::iter::once(name))
                    .collect::<Vec<_>>()
                    .join(".");
                let mut element = value;
                for seg in rest {
                    match seg {
                        RefPathSegment::Index(idx) => {
                            element = set_items(element.items()?).nth(*idx)?;
                            key.push_str(&format!("[{}]", idx));
                        }
                        RefPathSegment::Name(_) => return None,
                    }
                }
                let property_path = rest.is_empty().then(|| {
                    let mut path = block_path.clone();
                    path.push(name.to_string());
                    path
                });
                return Some(Located {
                    element,
                    scope: block_path,
                    key,
                    property_path,
                });
            }
            EntryKind::Verbatim(_) => return None,
        }
    }
}

// ── Reference validation ────────────────────────────────────────────

/// A reference that does not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceError {
    pub message: String,
    /// Property path where the reference was found (list items as `[i]`).
    pub path: Vec<String>,
    /// Machine-readable error code.
    pub code: &'static str,
}

/// Check every reference in the file, directly assigned or embedded in an
/// interpolated string. Dangling and cyclic references are reported;
/// references to values that exist but are not resolvable are not.
pub fn validate_references(file: &DslFile) -> Vec<ReferenceError> {
    let mut errors = Vec::new();
    for path in file.property_paths() {
        if let Some(element) = file.property(&path) {
            let scope = &path[..path.len() - 1];
            let mut at = path.clone();
            walk_element(file, scope, element, &mut at, &mut errors);
        }
    }
    errors
}

fn walk_element(
    file: &DslFile,
    scope: &[String],
    element: &Element,
    at: &mut Vec<String>,
    errors: &mut Vec<ReferenceError>,
) {
    match &element.value {
        ElementValue::Reference(reference) => check_reference(file, scope, reference, at, errors),
        ElementValue::Interpolated(parts) => {
            for part in parts {
                if let StringPart::Reference(reference) = part {
                    check_reference(file, scope, reference, at, errors);
                }
            }
        }
        ElementValue::List { items, .. } => {
            for (i, item) in set_items(items).enumerate() {
                at.push(format!("[{}]", i));
                walk_element(file, scope, item, at, errors);
                at.pop();
            }
        }
        _ => {}
    }
}

fn check_reference(
    file: &DslFile,
    scope: &[String],
    reference: &ReferencePath,
    at: &[String],
    errors: &mut Vec<ReferenceError>,
) {
    let mut resolver = Resolver::new(file);
    if resolver.lookup(scope, reference).is_none() {
        errors.push(ReferenceError {
            message: format!("Reference {} does not name a property", reference),
            path: at.to_vec(),
            code: "unresolved-reference",
        });
        return;
    }
    if resolver.resolve_reference(scope, reference).is_none() && resolver.cycle {
        errors.push(ReferenceError {
            message: format!("Reference {} is part of a cycle", reference),
            path: at.to_vec(),
            code: "cyclic-reference",
        });
    }
}
