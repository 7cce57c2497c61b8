//! Small helpers over tree-sitter nodes shared by the analysis passes.

use tree_sitter::Node;

/// Source text covered by a node.
pub fn text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

/// Unquoted value of a string literal node.
pub fn string_value(node: Node<'_>, source: &str) -> String {
    let mut cursor = node.walk();
    let mut value = String::new();
    let mut saw_fragment = false;
    for child in node.named_children(&mut cursor) {
        saw_fragment = true;
        value.push_str(text(child, source));
    }
    if saw_fragment {
        value
    } else {
        text(node, source).trim_matches(['"', '\'', '`']).to_string()
    }
}

/// Decorator nodes attached to a class or class member, in source order.
///
/// The grammar hangs decorators off the declaration node itself, off a
/// wrapping export statement, or as preceding siblings inside a class body,
/// depending on where the declaration appears.
pub fn decorators_of(node: Node<'_>) -> Vec<Node<'_>> {
    let mut found: Vec<Node<'_>> = Vec::new();

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "decorator" {
            found.push(child);
        }
    }

    if let Some(parent) = node.parent() {
        if parent.kind() == "export_statement" {
            let mut cursor = parent.walk();
            for child in parent.named_children(&mut cursor) {
                if child.kind() == "decorator" {
                    found.push(child);
                }
            }
        }
    }

    let mut sibling = node.prev_named_sibling();
    while let Some(candidate) = sibling {
        if candidate.kind() != "decorator" {
            break;
        }
        found.push(candidate);
        sibling = candidate.prev_named_sibling();
    }

    found.sort_by_key(|n| n.start_byte());
    found.dedup_by_key(|n| n.id());
    found
}

/// `@Query(...)` and `@Query` both yield `Query`.
pub fn decorator_name<'a>(decorator: Node<'_>, source: &'a str) -> Option<&'a str> {
    let expression = decorator.named_child(0)?;
    match expression.kind() {
        "identifier" => Some(text(expression, source)),
        "call_expression" => {
            let callee = expression.child_by_field_name("function")?;
            (callee.kind() == "identifier").then(|| text(callee, source))
        }
        _ => None,
    }
}

/// First argument of a decorator call expression, if any.
pub fn decorator_argument(decorator: Node<'_>) -> Option<Node<'_>> {
    let expression = decorator.named_child(0)?;
    if expression.kind() != "call_expression" {
        return None;
    }
    expression.child_by_field_name("arguments")?.named_child(0)
}

/// Plain name of an object-literal or class-member key.
pub fn property_key_name(key: Node<'_>, source: &str) -> String {
    match key.kind() {
        "string" => string_value(key, source),
        _ => text(key, source).to_string(),
    }
}

/// Looks up `key` in an object literal, returning the value node.
pub fn object_property<'t>(object: Node<'t>, source: &str, key: &str) -> Option<Node<'t>> {
    if object.kind() != "object" {
        return None;
    }
    let mut cursor = object.walk();
    for entry in object.named_children(&mut cursor) {
        if entry.kind() != "pair" {
            continue;
        }
        let Some(key_node) = entry.child_by_field_name("key") else {
            continue;
        };
        if property_key_name(key_node, source) == key {
            return entry.child_by_field_name("value");
        }
    }
    None
}

/// Finds a named method inside a class declaration's body.
pub fn class_method<'t>(class_node: Node<'t>, source: &str, name: &str) -> Option<Node<'t>> {
    let body = class_node.child_by_field_name("body")?;
    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if member.kind() != "method_definition" {
            continue;
        }
        let matches = member
            .child_by_field_name("name")
            .is_some_and(|n| property_key_name(n, source) == name);
        if matches {
            return Some(member);
        }
    }
    None
}

/// Innermost identifier of a member/call chain: `a.b().c` yields `a`.
pub fn chain_root(node: Node<'_>) -> Option<Node<'_>> {
    match node.kind() {
        "identifier" => Some(node),
        "member_expression" | "subscript_expression" => {
            chain_root(node.child_by_field_name("object")?)
        }
        "call_expression" => chain_root(node.child_by_field_name("function")?),
        "parenthesized_expression" => chain_root(node.named_child(0)?),
        _ => None,
    }
}

/// First named descendant (preorder) satisfying the predicate.
pub fn find_descendant<'t>(
    node: Node<'t>,
    predicate: &dyn Fn(Node<'t>) -> bool,
) -> Option<Node<'t>> {
    if predicate(node) {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = find_descendant(child, predicate) {
            return Some(found);
        }
    }
    None
}
