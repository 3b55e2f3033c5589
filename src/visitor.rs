use crate::validate::{
    AttributeValue, ElementNode, EmbeddedJsx, ExpressionNode, TemplateIR, TemplateNode, TextNode,
};

/// The TemplateVisitor trait defines the single authoritative traversal mechanism for Template IRs.
///
/// Rules:
/// 1. Traversal order is fixed: attribute expressions, then children in document order.
/// 2. Implementers override `visit_*` methods to add behavior.
/// 3. Implementers MUST call `walk_*` functions to continue traversal unless pruning is intended.
///    A post-order pass calls `walk_element` first and rewrites afterwards.
/// 4. JSX embedded in expressions is walked like any other subtree.
pub trait TemplateVisitor {
    fn visit_root(&mut self, root: &mut TemplateIR) {
        walk_root(self, root);
    }

    fn visit_node(&mut self, node: &mut TemplateNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &mut TextNode) {
        // Leaf node, nothing to walk by default
    }

    fn visit_expression(&mut self, expression: &mut ExpressionNode) {
        walk_expression(self, expression);
    }

    fn visit_embedded(&mut self, embedded: &mut EmbeddedJsx) {
        self.visit_children(&mut embedded.nodes);
    }

    fn visit_children(&mut self, children: &mut Vec<TemplateNode>) {
        walk_children(self, children);
    }
}

pub fn walk_root<V: TemplateVisitor + ?Sized>(visitor: &mut V, root: &mut TemplateIR) {
    visitor.visit_children(&mut root.nodes);
}

pub fn walk_children<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    children: &mut Vec<TemplateNode>,
) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: TemplateVisitor + ?Sized>(visitor: &mut V, node: &mut TemplateNode) {
    match node {
        TemplateNode::Element(el) => visitor.visit_element(el),
        TemplateNode::Text(t) => visitor.visit_text(t),
        TemplateNode::Expression(e) => visitor.visit_expression(e),
    }
}

pub fn walk_element<V: TemplateVisitor + ?Sized>(visitor: &mut V, element: &mut ElementNode) {
    for attr in &mut element.attributes {
        if let Some(AttributeValue::Dynamic(expr)) = &mut attr.value {
            for embedded in &mut expr.embedded {
                visitor.visit_embedded(embedded);
            }
        }
    }
    visitor.visit_children(&mut element.children);
}

pub fn walk_expression<V: TemplateVisitor + ?Sized>(
    visitor: &mut V,
    expression: &mut ExpressionNode,
) {
    for embedded in &mut expression.embedded {
        visitor.visit_embedded(embedded);
    }
}
