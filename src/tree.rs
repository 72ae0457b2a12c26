use crate::ast::{AssignStyle, ListStyle, ReferencePath, StringPart};
use std::fmt;

/// Identity of an element node, unique within one parsed file.
pub type NodeId = u64;

/// A literal value in the property tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
}

impl Scalar {
    /// Whether the value can be written as a literal that reads back as
    /// itself. Infinite and NaN decimals cannot.
    pub fn has_literal_form(&self) -> bool {
        match self {
            Scalar::Decimal(d) => d.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for Scalar {
    /// The string form used for interpolation and string-typed bindings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => f.write_str(s),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Decimal(d) => write!(f, "{:?}", d),
            Scalar::Boolean(b) => write!(f, "{}", b),
        }
    }
}

/// The value held by an element node.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
    /// A list slot that was added but not assigned yet. Never printed.
    Unset,
    Literal(Scalar),
    Reference(ReferencePath),
    Interpolated(Vec<StringPart>),
    List {
        items: Vec<Element>,
        style: ListStyle,
    },
    /// Raw text the parser kept verbatim.
    Unknown(String),
}

/// A value node: a property's value or one list item.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: NodeId,
    pub value: ElementValue,
    /// The text this node was parsed from. Dropped when the value is
    /// replaced, after which the node prints in canonical form.
    pub source: Option<String>,
}

impl Element {
    pub fn set_value(&mut self, value: ElementValue) {
        self.value = value;
        self.source = None;
    }

    pub fn items(&self) -> Option<&[Element]> {
        match &self.value {
            ElementValue::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn items_mut(&mut self) -> Option<&mut Vec<Element>> {
        match &mut self.value {
            ElementValue::List { items, .. } => Some(items),
            _ => None,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self.value, ElementValue::Unset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryKind {
    Block(Block),
    Property { style: AssignStyle, value: Element },
    /// A statement outside the property subset; printed as written.
    Verbatim(String),
}

/// One named entry of a block, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub entries: Vec<Entry>,
}

impl Block {
    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name == name && !matches!(e.kind, EntryKind::Verbatim(_)))
    }

    pub fn entry(&self, name: &str) -> Option<&Entry> {
        self.position(name).map(|i| &self.entries[i])
    }

    pub fn block(&self, name: &str) -> Option<&Block> {
        match self.entry(name).map(|e| &e.kind) {
            Some(EntryKind::Block(b)) => Some(b),
            _ => None,
        }
    }

    pub fn block_mut(&mut self, name: &str) -> Option<&mut Block> {
        let i = self.position(name)?;
        match &mut self.entries[i].kind {
            EntryKind::Block(b) => Some(b),
            _ => None,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Element> {
        match self.entry(name).map(|e| &e.kind) {
            Some(EntryKind::Property { value, .. }) => Some(value),
            _ => None,
        }
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Element> {
        let i = self.position(name)?;
        match &mut self.entries[i].kind {
            EntryKind::Property { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Get or create the nested block `name`. An existing property of the
    /// same name is replaced by an empty block.
    pub fn block_or_insert(&mut self, name: &str) -> &mut Block {
        let i = match self.position(name) {
            Some(i) => {
                if !matches!(self.entries[i].kind, EntryKind::Block(_)) {
                    self.entries[i].kind = EntryKind::Block(Block::default());
                }
                i
            }
            None => {
                self.entries.push(Entry {
                    name: name.to_string(),
                    kind: EntryKind::Block(Block::default()),
                });
                self.entries.len() - 1
            }
        };
        match &mut self.entries[i].kind {
            EntryKind::Block(b) => b,
            _ => unreachable!(),
        }
    }

    /// Assign a property, keeping its position and call style if it
    /// already exists. New properties are appended.
    pub fn set_property(&mut self, name: &str, style: Option<AssignStyle>, value: Element) {
        match self.position(name) {
            Some(i) => {
                let style = match (&self.entries[i].kind, style) {
                    (_, Some(style)) => style,
                    (EntryKind::Property { style, .. }, None) => *style,
                    _ => AssignStyle::Assign,
                };
                self.entries[i].kind = EntryKind::Property { style, value };
            }
            None => self.entries.push(Entry {
                name: name.to_string(),
                kind: EntryKind::Property {
                    style: style.unwrap_or(AssignStyle::Assign),
                    value,
                },
            }),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.entries.remove(i);
                true
            }
            None => false,
        }
    }
}

/// The in-memory property tree of one build file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DslFile {
    pub root: Block,
    next_id: NodeId,
}

impl DslFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(&mut self, value: ElementValue) -> Element {
        self.next_id += 1;
        Element {
            id: self.next_id,
            value,
            source: None,
        }
    }

    pub fn block_at(&self, path: &[String]) -> Option<&Block> {
        let mut current = &self.root;
        for segment in path {
            current = current.block(segment)?;
        }
        Some(current)
    }

    pub fn block_at_mut(&mut self, path: &[String]) -> Option<&mut Block> {
        let mut current = &mut self.root;
        for segment in path {
            current = current.block_mut(segment)?;
        }
        Some(current)
    }

    /// Navigate to the block holding `path[..len-1]`, creating intermediate
    /// blocks as needed.
    pub fn ensure_block(&mut self, path: &[String]) -> &mut Block {
        let mut current = &mut self.root;
        for segment in path {
            current = current.block_or_insert(segment);
        }
        current
    }

    /// The value of the property at `path` (enclosing blocks, then name).
    pub fn property(&self, path: &[String]) -> Option<&Element> {
        let (name, parent) = path.split_last()?;
        self.block_at(parent)?.property(name)
    }

    pub fn property_mut(&mut self, path: &[String]) -> Option<&mut Element> {
        let (name, parent) = path.split_last()?;
        self.block_at_mut(parent)?.property_mut(name)
    }

    /// Replace the value of the property at `path`, creating it (and any
    /// missing blocks) if absent. An existing node keeps its id and style.
    pub fn assign(&mut self, path: &[String], value: ElementValue) {
        if let Some(element) = self.property_mut(path) {
            element.set_value(value);
            return;
        }
        let Some((name, parent)) = path.split_last() else {
            return;
        };
        let element = self.element(value);
        self.ensure_block(parent).set_property(name, None, element);
    }

    pub fn remove_property(&mut self, path: &[String]) -> bool {
        match path.split_last() {
            Some((name, parent)) => match self.block_at_mut(parent) {
                Some(block) if block.property(name).is_some() => block.remove(name),
                _ => false,
            },
            None => false,
        }
    }

    /// Paths of every property in declaration order, depth first.
    pub fn property_paths(&self) -> Vec<Vec<String>> {
        let mut paths = Vec::new();
        let mut prefix = Vec::new();
        collect_paths(&self.root, &mut prefix, &mut paths);
        paths
    }
}

fn collect_paths(block: &Block, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
    for entry in &block.entries {
        match &entry.kind {
            EntryKind::Block(child) => {
                prefix.push(entry.name.clone());
                collect_paths(child, prefix, out);
                prefix.pop();
            }
            EntryKind::Property { .. } => {
                let mut path = prefix.clone();
                path.push(entry.name.clone());
                out.push(path);
            }
            EntryKind::Verbatim(_) => {}
        }
    }
}
