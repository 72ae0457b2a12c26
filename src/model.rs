use crate::config::DslConfig;
use crate::error::{DslError, PropertyError};
use crate::list::ListPropertyCore;
use crate::printer::print_file;
use crate::property::PropertyCore;
use crate::resolve::{validate_references, ReferenceError};
use crate::tree::DslFile;
use crate::value::Codec;
use crate::parse_build_file;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, warn};

/// The committed text of a build file and the tree parsed from it.
pub(crate) struct Document {
    pub text: String,
    pub file: DslFile,
    /// Bumped on every reparse; handles from an older generation are stale.
    pub generation: u64,
    pub config: DslConfig,
    /// Set by mutations, cleared by `apply`.
    pub modified: bool,
}

/// An editing session over one build file.
///
/// Cloning gives another view of the same session. Property handles only
/// hold weak references, so they become stale once every `BuildModel` for
/// the session is dropped.
#[derive(Clone)]
pub struct BuildModel {
    doc: Rc<RefCell<Document>>,
}

impl BuildModel {
    pub fn parse(text: &str) -> Result<Self, DslError> {
        Self::with_config(text, DslConfig::default())
    }

    pub fn with_config(text: &str, config: DslConfig) -> Result<Self, DslError> {
        let file = parse_build_file(text)?;
        Ok(BuildModel {
            doc: Rc::new(RefCell::new(Document {
                text: text.to_string(),
                file,
                generation: 0,
                config,
                modified: false,
            })),
        })
    }

    /// The committed text. Mutations show up here only after [`apply`](Self::apply).
    pub fn text(&self) -> String {
        self.doc.borrow().text.clone()
    }

    pub fn config(&self) -> DslConfig {
        self.doc.borrow().config.clone()
    }

    pub fn generation(&self) -> u64 {
        self.doc.borrow().generation
    }

    /// Whether the tree has changes that were not applied yet.
    pub fn is_modified(&self) -> bool {
        self.doc.borrow().modified
    }

    pub fn root(&self) -> BlockRef {
        BlockRef {
            model: self.clone(),
            path: Vec::new(),
        }
    }

    /// The `ext { }` block, where shared properties usually live.
    pub fn ext(&self) -> BlockRef {
        self.block("ext")
    }

    pub fn block(&self, name: &str) -> BlockRef {
        self.root().block(name)
    }

    /// Locate a property by dotted path, e.g. `ext.propList`. The property
    /// does not need to exist.
    pub fn find_property(&self, path: &str) -> PropertyRef {
        PropertyRef {
            model: self.clone(),
            path: path.split('.').map(str::to_string).collect(),
        }
    }

    /// Dotted paths of every property, in file order.
    pub fn property_paths(&self) -> Vec<String> {
        self.doc
            .borrow()
            .file
            .property_paths()
            .iter()
            .map(|path| path.join("."))
            .collect()
    }

    /// Serialize the tree and commit it as the new text. Text that would
    /// not parse again is not committed.
    pub fn apply(&self) -> Result<(), DslError> {
        let mut doc = self.doc.borrow_mut();
        let text = print_file(&doc.file, &doc.config);
        if let Err(err) = parse_build_file(&text) {
            warn!(generation = doc.generation, error = %err, "printed build file does not parse");
            return Err(err);
        }
        debug!(generation = doc.generation, bytes = text.len(), "applied changes");
        doc.text = text;
        doc.modified = false;
        Ok(())
    }

    /// Rebuild the tree from the committed text. Every handle obtained
    /// before this call becomes stale, and changes not applied are lost.
    pub fn reparse(&self) -> Result<(), DslError> {
        let mut doc = self.doc.borrow_mut();
        let file = parse_build_file(&doc.text)?;
        doc.file = file;
        doc.generation += 1;
        doc.modified = false;
        debug!(generation = doc.generation, "reparsed build file");
        Ok(())
    }

    pub fn apply_and_reparse(&self) -> Result<(), DslError> {
        self.apply()?;
        self.reparse()
    }

    pub fn validate_references(&self) -> Vec<ReferenceError> {
        validate_references(&self.doc.borrow().file)
    }

    pub(crate) fn handle(&self, description: String) -> Binding {
        Binding {
            description,
            doc: Rc::downgrade(&self.doc),
            generation: self.generation(),
            on_modified: None,
        }
    }
}

/// A block of the build file, by path.
#[derive(Clone)]
pub struct BlockRef {
    model: BuildModel,
    path: Vec<String>,
}

impl BlockRef {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn block(&self, name: &str) -> BlockRef {
        let mut path = self.path.clone();
        path.push(name.to_string());
        BlockRef {
            model: self.model.clone(),
            path,
        }
    }

    pub fn find_property(&self, name: &str) -> PropertyRef {
        let mut path = self.path.clone();
        path.push(name.to_string());
        PropertyRef {
            model: self.model.clone(),
            path,
        }
    }

    /// Names of the properties directly in this block.
    pub fn property_names(&self) -> Vec<String> {
        let doc = self.model.doc.borrow();
        let Some(block) = doc.file.block_at(&self.path) else {
            return Vec::new();
        };
        block
            .entries
            .iter()
            .filter(|entry| block.property(&entry.name).is_some())
            .map(|entry| entry.name.clone())
            .collect()
    }
}

/// A property of the build file, by path. It may or may not exist.
#[derive(Clone)]
pub struct PropertyRef {
    model: BuildModel,
    path: Vec<String>,
}

impl PropertyRef {
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn name(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    pub fn exists(&self) -> bool {
        self.model.doc.borrow().file.property(&self.path).is_some()
    }

    /// Bind the property as a scalar of type `T`.
    pub fn scalar<T>(&self, codec: Codec<T>) -> PropertyCore<T> {
        PropertyCore::for_property(self.binding(), self.path.clone(), codec)
    }

    /// Bind the property as a list of `T`.
    pub fn list<T>(&self, codec: Codec<T>) -> ListPropertyCore<T> {
        ListPropertyCore::new(self.binding(), self.path.clone(), codec)
    }

    fn binding(&self) -> Binding {
        self.model.handle(self.path.join("."))
    }
}

// ── Handle plumbing ─────────────────────────────────────────────────

/// What every property handle carries: a weak link to the session, the
/// generation it was created in and the change callback.
#[derive(Clone)]
pub(crate) struct Binding {
    pub description: String,
    doc: Weak<RefCell<Document>>,
    generation: u64,
    on_modified: Option<Rc<dyn Fn()>>,
}

impl Binding {
    /// The live document, or `StaleHandle`.
    pub fn document(&self) -> Result<Rc<RefCell<Document>>, PropertyError> {
        match self.doc.upgrade() {
            Some(doc) if doc.borrow().generation == self.generation => Ok(doc),
            _ => Err(self.stale()),
        }
    }

    pub fn stale(&self) -> PropertyError {
        PropertyError::StaleHandle {
            property: self.description.clone(),
        }
    }

    pub fn describe(&self, description: String) -> Binding {
        Binding {
            description,
            ..self.clone()
        }
    }

    pub fn with_marker(mut self, marker: Rc<dyn Fn()>) -> Binding {
        self.on_modified = Some(marker);
        self
    }

    /// Must be called with no borrow of the document held: the callback
    /// may read the session.
    pub fn mark_modified(&self) {
        if let Some(marker) = &self.on_modified {
            marker();
        }
    }
}
