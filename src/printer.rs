use crate::ast::{AssignStyle, ListStyle, StringPart};
use crate::config::{Dialect, DslConfig};
use crate::resolve::set_items;
use crate::tree::*;
use std::fmt::Write;

/// Serialize a property tree to build-file text.
///
/// Comments and spacing between statements are not kept. Values that were
/// not edited keep their original text; edited ones are written in the
/// configured dialect. Unset properties and list slots are left out.
pub fn print_file(file: &DslFile, config: &DslConfig) -> String {
    let mut writer = DslWriter::new(config);
    writer.write_entries(&file.root);
    writer.buf
}

/// The text of a single value node, as it would appear after `=`.
pub fn element_text(element: &Element, config: &DslConfig) -> String {
    let mut writer = DslWriter::new(config);
    writer.write_element(element);
    writer.buf
}

struct DslWriter<'a> {
    buf: String,
    config: &'a DslConfig,
    depth: usize,
}

impl<'a> DslWriter<'a> {
    fn new(config: &'a DslConfig) -> Self {
        DslWriter {
            buf: String::new(),
            config,
            depth: 0,
        }
    }

    fn indent(&mut self) {
        for _ in 0..self.depth * self.config.indent_width {
            self.buf.push(' ');
        }
    }

    fn write_entries(&mut self, block: &Block) {
        for entry in &block.entries {
            self.write_entry(entry);
        }
    }

    fn write_entry(&mut self, entry: &Entry) {
        match &entry.kind {
            EntryKind::Block(block) => {
                self.indent();
                self.buf.push_str(&entry.name);
                self.buf.push_str(" {\n");
                self.depth += 1;
                self.write_entries(block);
                self.depth -= 1;
                self.indent();
                self.buf.push_str("}\n");
            }
            EntryKind::Property { value, .. } if value.is_unset() => {}
            EntryKind::Property {
                style: AssignStyle::Assign,
                value,
            } => {
                self.indent();
                self.buf.push_str(&entry.name);
                self.buf.push_str(" = ");
                self.write_element(value);
                self.buf.push('\n');
            }
            EntryKind::Property {
                style: AssignStyle::Call,
                value,
            } => {
                self.indent();
                self.buf.push_str(&entry.name);
                self.buf.push('(');
                match &value.value {
                    // A single argument would read back as a scalar.
                    ElementValue::List {
                        items,
                        style: ListStyle::Args,
                    } if set_items(items).count() > 1 => self.write_items(items),
                    _ => self.write_element(value),
                }
                self.buf.push_str(")\n");
            }
            EntryKind::Verbatim(raw) => {
                self.indent();
                self.buf.push_str(raw);
                self.buf.push('\n');
            }
        }
    }

    fn write_element(&mut self, element: &Element) {
        // Untouched leaves are written as they were read.
        if let Some(source) = &element.source {
            if !matches!(element.value, ElementValue::List { .. }) {
                self.buf.push_str(source);
                return;
            }
        }
        match &element.value {
            ElementValue::Unset => {}
            ElementValue::Literal(scalar) => self.write_scalar(scalar),
            ElementValue::Reference(path) => {
                let _ = write!(self.buf, "{}", path);
            }
            ElementValue::Interpolated(parts) => {
                self.buf.push('"');
                for part in parts {
                    match part {
                        StringPart::Text(text) => self.write_escaped(text, '"'),
                        StringPart::Reference(path) => {
                            let _ = write!(self.buf, "${{{}}}", path);
                        }
                    }
                }
                self.buf.push('"');
            }
            ElementValue::List { items, style } => match style {
                ListStyle::ListOf => {
                    self.buf.push_str("listOf(");
                    self.write_items(items);
                    self.buf.push(')');
                }
                ListStyle::Brackets | ListStyle::Args => {
                    self.buf.push('[');
                    self.write_items(items);
                    self.buf.push(']');
                }
            },
            ElementValue::Unknown(raw) => self.buf.push_str(raw),
        }
    }

    fn write_items(&mut self, items: &[Element]) {
        for (i, item) in set_items(items).enumerate() {
            if i > 0 {
                self.buf.push_str(", ");
            }
            self.write_element(item);
        }
    }

    fn write_scalar(&mut self, scalar: &Scalar) {
        match scalar {
            Scalar::String(s) => {
                let quote = match self.config.dialect {
                    Dialect::Groovy => '\'',
                    Dialect::Kotlin => '"',
                };
                self.buf.push(quote);
                self.write_escaped(s, quote);
                self.buf.push(quote);
            }
            Scalar::Integer(i) => {
                let _ = write!(self.buf, "{}", i);
            }
            Scalar::Decimal(d) => {
                let _ = write!(self.buf, "{:?}", d);
            }
            Scalar::Boolean(b) => self.buf.push_str(if *b { "true" } else { "false" }),
        }
    }

    /// Escape string content for a `quote`-delimited string. `$` is only
    /// special inside double quotes.
    fn write_escaped(&mut self, s: &str, quote: char) {
        for ch in s.chars() {
            match ch {
                '\\' => self.buf.push_str("\\\\"),
                '\n' => self.buf.push_str("\\n"),
                '\r' => self.buf.push_str("\\r"),
                '\t' => self.buf.push_str("\\t"),
                '\u{0008}' => self.buf.push_str("\\b"),
                '\u{000C}' => self.buf.push_str("\\f"),
                '$' if quote == '"' => self.buf.push_str("\\$"),
                c if c == quote => {
                    self.buf.push('\\');
                    self.buf.push(c);
                }
                c if c < '\u{0020}' => {
                    let _ = write!(self.buf, "\\u{:04x}", c as u32);
                }
                c => self.buf.push(c),
            }
        }
    }
}
