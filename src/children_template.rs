//! Dynamic child extraction.
//!
//! Every expression child of a non-component element becomes a `<template>`
//! reference resolved at runtime by a shared dispatch template:
//!
//! ```text
//! <V>{a}{x && f()}</V>
//! ```
//!
//! lowers to
//!
//! ```text
//! <V>
//!     <template datakey="cd0" tempVnode={a} wx:if="{{cd0}} !== undefined" is="child0" data="{{d: cd0}}"/>
//!     <template datakey="cd1" tempVnode={x && f()} wx:if="{{cd1}} !== undefined" is="child0" data="{{d: cd1}}"/>
//! </V>
//! ```
//!
//! and registers `child0` once. `child<n>` dispatches over array / nested
//! component / literal values. JSX embedded in an expression child is lowered
//! before the child itself is wrapped, so `tempVnode` carries the rewritten
//! markup. Children that call a function-valued prop
//! (`this.props.f()`) use a `propchild<n>` template instead, which only
//! branches between a literal and the nested `fCPT` component.

use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Statement};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::transform::{
    LoweringContext, PropChildTemplate, ATTR_DATA, ATTR_DATAKEY, ATTR_IS, ATTR_IS_TEXT_ELEMENT,
    ATTR_TEMP_VNODE, ATTR_WX_IF, CHILD_COMP_SUFFIX, TEMPLATE_TAG,
};
use crate::validate::{
    AttributeIR, ElementNode, ExpressionIR, ExpressionNode, TemplateIR, TemplateNode,
};
use crate::visitor::{walk_element, TemplateVisitor};

/// Rewrites expression children into child template references.
pub fn children_to_template(ir: &mut TemplateIR, ctx: &mut LoweringContext) {
    let mut extractor = ChildTemplateExtractor { ctx };
    extractor.visit_root(ir);
}

struct ChildTemplateExtractor<'c, 'a> {
    ctx: &'c mut LoweringContext<'a>,
}

impl TemplateVisitor for ChildTemplateExtractor<'_, '_> {
    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);

        if self.ctx.classifier.is_child_comp(&element.tag) {
            return;
        }
        self.lower_children(element);
    }
}

impl ChildTemplateExtractor<'_, '_> {
    fn lower_children(&mut self, element: &mut ElementNode) {
        let is_text = self.ctx.classifier.is_text_element(element);
        let mut temp_name: Option<String> = None;
        // (prop, selector) in allocation order
        let mut prop_templates: Vec<(String, String)> = Vec::new();

        let children = std::mem::take(&mut element.children);
        let mut lowered = Vec::with_capacity(children.len());

        for child in children {
            let expression = match child {
                TemplateNode::Expression(expression) => expression,
                other => {
                    lowered.push(other);
                    continue;
                }
            };

            let selector = match prop_call_name(&expression.expression) {
                Some(prop) => match prop_templates.iter().position(|(p, _)| *p == prop) {
                    Some(index) => prop_templates[index].1.clone(),
                    None => {
                        let selector = self.ctx.orders.prop_template_names.next_name();
                        prop_templates.push((prop, selector.clone()));
                        selector
                    }
                },
                None => temp_name
                    .get_or_insert_with(|| self.ctx.orders.template_names.next_name())
                    .clone(),
            };

            let reference = self.build_reference(expression, selector, is_text);
            lowered.push(TemplateNode::Element(reference));
        }

        element.children = lowered;

        if let Some(name) = temp_name {
            tracing::debug!(tag = %element.tag, template = %name, "registered child template");
            self.ctx.info.child_templates.push(name);
        }
        for (prop, name) in prop_templates {
            tracing::debug!(tag = %element.tag, template = %name, prop = %prop, "registered prop child template");
            self.ctx.info.prop_child_templates.push(PropChildTemplate {
                name,
                component: format!("{}{}", prop, CHILD_COMP_SUFFIX),
            });
        }
    }

    fn build_reference(
        &mut self,
        expression: ExpressionNode,
        selector: String,
        is_text: bool,
    ) -> ElementNode {
        let datakey = self.ctx.orders.data_keys.next_name();
        tracing::debug!(datakey = %datakey, selector = %selector, "generated child template reference");

        let location = expression.location.clone();
        let mut attributes = vec![
            AttributeIR::new_static(ATTR_DATAKEY, datakey.as_str()),
            AttributeIR::dynamic(
                ATTR_TEMP_VNODE,
                ExpressionIR {
                    code: expression.expression,
                    embedded: expression.embedded,
                    location: expression.location,
                },
            ),
            AttributeIR::new_static(ATTR_WX_IF, format!("{{{{{datakey}}}}} !== undefined")),
            AttributeIR::new_static(ATTR_IS, selector),
            AttributeIR::new_static(ATTR_DATA, format!("{{{{d: {datakey}}}}}")),
        ];
        if is_text {
            attributes.push(AttributeIR::marker(ATTR_IS_TEXT_ELEMENT));
        }

        ElementNode {
            tag: TEMPLATE_TAG.to_string(),
            attributes,
            children: Vec::new(),
            location,
        }
    }
}

/// Name of the prop when `code` is a call like `this.props.f()` or `props.f()`.
fn prop_call_name(code: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    let ret = Parser::new(&allocator, code, source_type).parse();
    if !ret.errors.is_empty() || ret.program.body.len() != 1 {
        return None;
    }

    match ret.program.body.first()? {
        Statement::ExpressionStatement(stmt) => prop_callee(&stmt.expression),
        _ => None,
    }
}

fn prop_callee(expr: &Expression) -> Option<String> {
    match expr {
        Expression::ParenthesizedExpression(paren) => prop_callee(&paren.expression),
        Expression::CallExpression(call) => match &call.callee {
            Expression::StaticMemberExpression(member) if is_props_object(&member.object) => {
                Some(member.property.name.to_string())
            }
            _ => None,
        },
        _ => None,
    }
}

fn is_props_object(expr: &Expression) -> bool {
    match expr {
        Expression::Identifier(id) => id.name.as_str() == "props",
        Expression::StaticMemberExpression(member) => {
            matches!(member.object, Expression::ThisExpression(_))
                && member.property.name.as_str() == "props"
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{CompileInfo, DefaultClassifier, NameOrders};
    use crate::validate::{SourceLocation, TextNode};

    fn expr(code: &str) -> TemplateNode {
        TemplateNode::Expression(ExpressionNode {
            expression: code.to_string(),
            embedded: Vec::new(),
            location: SourceLocation::default(),
        })
    }

    fn text(value: &str) -> TemplateNode {
        TemplateNode::Text(TextNode {
            value: value.to_string(),
            location: SourceLocation::default(),
        })
    }

    fn element(tag: &str, children: Vec<TemplateNode>) -> TemplateNode {
        let mut el = ElementNode::new(tag);
        el.children = children;
        TemplateNode::Element(el)
    }

    fn lower(nodes: Vec<TemplateNode>) -> (TemplateIR, CompileInfo) {
        let mut ir = TemplateIR {
            file_path: "test.jsx".to_string(),
            nodes,
        };
        let classifier = DefaultClassifier::new();
        let mut orders = NameOrders::new();
        let mut info = CompileInfo::new();
        let mut ctx = LoweringContext::new(&mut orders, &mut info, &classifier);
        children_to_template(&mut ir, &mut ctx);
        (ir, info)
    }

    fn as_element(node: &TemplateNode) -> &ElementNode {
        match node {
            TemplateNode::Element(el) => el,
            other => panic!("expected element, got {:?}", other),
        }
    }

    #[test]
    fn expression_children_share_one_selector() {
        let (ir, info) = lower(vec![element("V", vec![expr("a"), expr("x && f()")])]);

        let v = as_element(&ir.nodes[0]);
        let first = as_element(&v.children[0]);
        let second = as_element(&v.children[1]);

        assert_eq!(first.tag, "template");
        assert_eq!(first.static_attribute("datakey"), Some("cd0"));
        assert_eq!(second.static_attribute("datakey"), Some("cd1"));
        assert_eq!(first.static_attribute("is"), Some("child0"));
        assert_eq!(second.static_attribute("is"), Some("child0"));
        assert_eq!(info.child_templates, vec!["child0".to_string()]);
    }

    #[test]
    fn reference_carries_full_attribute_shape() {
        let (ir, _) = lower(vec![element("view", vec![expr("a")])]);
        let reference = as_element(&as_element(&ir.nodes[0]).children[0]);

        let names: Vec<&str> = reference.attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["datakey", "tempVnode", "wx:if", "is", "data"]);
        assert_eq!(
            reference.static_attribute("wx:if"),
            Some("{{cd0}} !== undefined")
        );
        assert_eq!(reference.static_attribute("data"), Some("{{d: cd0}}"));
        match &reference.attribute("tempVnode").unwrap().value {
            Some(crate::validate::AttributeValue::Dynamic(e)) => assert_eq!(e.code, "a"),
            other => panic!("unexpected tempVnode {:?}", other),
        }
    }

    #[test]
    fn text_children_are_left_in_place() {
        let (ir, info) = lower(vec![element("view", vec![text("hello")])]);
        let view = as_element(&ir.nodes[0]);
        assert_eq!(view.children, vec![text("hello")]);
        assert!(info.child_templates.is_empty());
    }

    #[test]
    fn child_components_are_skipped() {
        let (ir, info) = lower(vec![element("fCPT", vec![expr("a")])]);
        let comp = as_element(&ir.nodes[0]);
        assert_eq!(comp.children, vec![expr("a")]);
        assert!(info.child_templates.is_empty());
    }

    #[test]
    fn descendants_of_child_components_are_still_lowered() {
        let (ir, info) = lower(vec![element(
            "fCPT",
            vec![element("view", vec![expr("a")])],
        )]);
        let view = as_element(&as_element(&ir.nodes[0]).children[0]);
        assert!(view.children.iter().all(|c| matches!(c, TemplateNode::Element(_))));
        assert_eq!(info.child_templates, vec!["child0".to_string()]);
    }

    #[test]
    fn each_element_gets_its_own_selector_in_post_order() {
        let (ir, info) = lower(vec![element(
            "view",
            vec![expr("outer"), element("view", vec![expr("inner")])],
        )]);

        let outer = as_element(&ir.nodes[0]);
        let outer_ref = as_element(&outer.children[0]);
        let inner_ref = as_element(&as_element(&outer.children[1]).children[0]);

        // inner element is finished first
        assert_eq!(inner_ref.static_attribute("is"), Some("child0"));
        assert_eq!(inner_ref.static_attribute("datakey"), Some("cd0"));
        assert_eq!(outer_ref.static_attribute("is"), Some("child1"));
        assert_eq!(outer_ref.static_attribute("datakey"), Some("cd1"));
        assert_eq!(
            info.child_templates,
            vec!["child0".to_string(), "child1".to_string()]
        );
    }

    #[test]
    fn text_container_marks_references() {
        let (ir, _) = lower(vec![element(
            "view",
            vec![element("text", vec![expr("a")]), expr("b")],
        )]);
        let view = as_element(&ir.nodes[0]);
        let in_text = as_element(&as_element(&view.children[0]).children[0]);
        let in_view = as_element(&view.children[1]);
        assert!(in_text.has_attribute("isTextElement"));
        assert!(!in_view.has_attribute("isTextElement"));
    }

    #[test]
    fn prop_calls_use_prop_child_templates() {
        let (ir, info) = lower(vec![element(
            "view",
            vec![expr("this.props.f()"), expr("props.f(1)"), expr("a")],
        )]);
        let view = as_element(&ir.nodes[0]);
        let selectors: Vec<&str> = view
            .children
            .iter()
            .map(|c| as_element(c).static_attribute("is").unwrap())
            .collect();
        assert_eq!(selectors, vec!["propchild0", "propchild0", "child0"]);

        let keys: Vec<&str> = view
            .children
            .iter()
            .map(|c| as_element(c).static_attribute("datakey").unwrap())
            .collect();
        assert_eq!(keys, vec!["cd0", "cd1", "cd2"]);

        assert_eq!(info.child_templates, vec!["child0".to_string()]);
        assert_eq!(
            info.prop_child_templates,
            vec![PropChildTemplate {
                name: "propchild0".to_string(),
                component: "fCPT".to_string(),
            }]
        );
    }

    #[test]
    fn embedded_jsx_is_lowered_before_its_container() {
        let inner = element("view", vec![expr("i.name")]);
        let mapped = TemplateNode::Expression(ExpressionNode {
            expression: "list.map(i => <view>{i.name}</view>)".to_string(),
            embedded: vec![crate::validate::EmbeddedJsx {
                start: 14,
                end: 35,
                fragment: false,
                nodes: vec![inner],
            }],
            location: SourceLocation::default(),
        });
        let (ir, info) = lower(vec![element("view", vec![mapped])]);

        assert_eq!(
            info.child_templates,
            vec!["child0".to_string(), "child1".to_string()]
        );
        let outer_ref = as_element(&as_element(&ir.nodes[0]).children[0]);
        assert_eq!(outer_ref.static_attribute("datakey"), Some("cd1"));
        assert_eq!(outer_ref.static_attribute("is"), Some("child1"));

        let vnode = match &outer_ref.attribute("tempVnode").unwrap().value {
            Some(crate::validate::AttributeValue::Dynamic(e)) => e,
            other => panic!("unexpected tempVnode {:?}", other),
        };
        let inner_view = as_element(&vnode.embedded[0].nodes[0]);
        let inner_ref = as_element(&inner_view.children[0]);
        assert_eq!(inner_ref.static_attribute("datakey"), Some("cd0"));
        assert_eq!(inner_ref.static_attribute("is"), Some("child0"));
    }

    #[test]
    fn prop_call_detection() {
        assert_eq!(prop_call_name("this.props.renderItem()"), Some("renderItem".to_string()));
        assert_eq!(prop_call_name("(props.footer())"), Some("footer".to_string()));
        assert_eq!(prop_call_name("this.state.f()"), None);
        assert_eq!(prop_call_name("this.props.f"), None);
        assert_eq!(prop_call_name("x && this.props.f()"), None);
    }
}
