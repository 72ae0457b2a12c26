use crate::ast::*;
use crate::tree::*;

/// Execute parsed statements against a property tree, creating blocks and
/// properties in declaration order.
///
/// Repeated blocks merge; a repeated assignment replaces the earlier value
/// in place.
pub fn execute(statements: &[Statement], file: &mut DslFile) {
    let mut scope = Vec::new();
    execute_in(statements, file, &mut scope);
}

fn execute_in(statements: &[Statement], file: &mut DslFile, scope: &mut Vec<String>) {
    for stmt in statements {
        execute_statement(stmt, file, scope);
    }
}

fn execute_statement(stmt: &Statement, file: &mut DslFile, scope: &mut Vec<String>) {
    match stmt {
        Statement::Assign { path, value, style } => {
            let Some((name, parents)) = path.split_last() else {
                return;
            };
            let element = build_element(file, value);
            let depth = scope.len();
            scope.extend(parents.iter().cloned());
            file.ensure_block(&scope[..])
                .set_property(name, Some(*style), element);
            scope.truncate(depth);
        }
        Statement::Block { path, statements } => {
            let depth = scope.len();
            scope.extend(path.iter().cloned());
            file.ensure_block(&scope[..]);
            execute_in(statements, file, scope);
            scope.truncate(depth);
        }
        Statement::Verbatim(raw) => {
            file.ensure_block(&scope[..]).entries.push(Entry {
                name: String::new(),
                kind: EntryKind::Verbatim(raw.clone()),
            });
        }
    }
}

/// Convert a parsed value into element nodes with fresh ids. Each node
/// remembers the text it came from.
pub fn build_element(file: &mut DslFile, node: &SourceExpr) -> Element {
    let value = match &node.expr {
        Expr::Literal(scalar) => ElementValue::Literal(scalar.clone()),
        Expr::Reference(path) => ElementValue::Reference(path.clone()),
        Expr::Interpolated(parts) => ElementValue::Interpolated(parts.clone()),
        Expr::List { items, style } => ElementValue::List {
            items: items.iter().map(|item| build_element(file, item)).collect(),
            style: *style,
        },
        Expr::Unknown(raw) => ElementValue::Unknown(raw.clone()),
    };
    let mut element = file.element(value);
    element.source = Some(node.source.clone());
    element
}
