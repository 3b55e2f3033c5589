//! Codegen module
//!
//! Serializes the lowered IR to WXML, materializes the dispatch templates
//! registered in the info record, and collects the `tempVnode` bindings the
//! JS side evaluates into data keys.

use serde::{Deserialize, Serialize};

use crate::transform::{CompileInfo, PropChildTemplate, ATTR_DATAKEY, ATTR_TEMP_VNODE};
use crate::validate::{
    AttributeIR, AttributeValue, ElementNode, EmbeddedJsx, SourceLocation, TemplateNode,
};

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// A data key and the expression whose value fills it at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBinding {
    pub datakey: String,
    pub code: String,
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// WXML SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

pub fn generate_wxml(nodes: &[TemplateNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(&mut out, node);
    }
    out
}

fn write_node(out: &mut String, node: &TemplateNode) {
    match node {
        TemplateNode::Element(el) => write_element(out, el),
        TemplateNode::Text(t) => out.push_str(&t.value),
        TemplateNode::Expression(e) => {
            out.push_str("{{");
            out.push_str(&render_code(&e.expression, &e.embedded));
            out.push_str("}}");
        }
    }
}

fn write_element(out: &mut String, element: &ElementNode) {
    out.push('<');
    out.push_str(&element.tag);
    for attr in &element.attributes {
        write_attribute(out, attr);
    }
    out.push('>');
    for child in &element.children {
        write_node(out, child);
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

fn write_attribute(out: &mut String, attr: &AttributeIR) {
    // tempVnode is evaluated on the JS side, never rendered
    if attr.name == ATTR_TEMP_VNODE {
        return;
    }

    out.push(' ');
    out.push_str(&attr.name);
    match &attr.value {
        None => {}
        Some(AttributeValue::Static(value)) => {
            out.push_str("=\"");
            out.push_str(&escape_attribute(value));
            out.push('"');
        }
        Some(AttributeValue::Dynamic(expr)) => {
            // mustache code keeps `&&` and `<` as written
            out.push_str("=\"{{");
            out.push_str(&render_code(&expr.code, &expr.embedded).replace('"', "&quot;"));
            out.push_str("}}\"");
        }
    }
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Expression code with every embedded JSX tree re-emitted from its current,
/// possibly rewritten, nodes.
pub fn render_code(code: &str, embedded: &[EmbeddedJsx]) -> String {
    if embedded.is_empty() {
        return code.to_string();
    }

    let mut out = String::with_capacity(code.len());
    let mut cursor = 0;
    for jsx in embedded {
        let start = jsx.start as usize;
        out.push_str(code.get(cursor..start).unwrap_or_default());
        if jsx.fragment {
            out.push_str("<>");
        }
        for node in &jsx.nodes {
            write_jsx_node(&mut out, node);
        }
        if jsx.fragment {
            out.push_str("</>");
        }
        cursor = cursor.max(jsx.end as usize);
    }
    out.push_str(code.get(cursor..).unwrap_or_default());
    out
}

fn write_jsx_node(out: &mut String, node: &TemplateNode) {
    match node {
        TemplateNode::Element(el) => write_jsx_element(out, el),
        TemplateNode::Text(t) => out.push_str(&t.value),
        TemplateNode::Expression(e) => {
            out.push('{');
            out.push_str(&render_code(&e.expression, &e.embedded));
            out.push('}');
        }
    }
}

fn write_jsx_element(out: &mut String, element: &ElementNode) {
    out.push('<');
    out.push_str(&element.tag);
    for attr in &element.attributes {
        out.push(' ');
        out.push_str(&attr.name);
        match &attr.value {
            None => {}
            Some(AttributeValue::Static(value)) => {
                out.push_str("=\"");
                out.push_str(&value.replace('"', "&quot;"));
                out.push('"');
            }
            Some(AttributeValue::Dynamic(expr)) => {
                out.push_str("={");
                out.push_str(&render_code(&expr.code, &expr.embedded));
                out.push('}');
            }
        }
    }

    if element.children.is_empty() {
        out.push_str(" />");
        return;
    }
    out.push('>');
    for child in &element.children {
        write_jsx_node(out, child);
    }
    out.push_str("</");
    out.push_str(&element.tag);
    out.push('>');
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISPATCH TEMPLATES
// ═══════════════════════════════════════════════════════════════════════════════

/// Array / nested component / literal dispatch over the bound value `d`.
pub fn generate_child_template(name: &str) -> String {
    [
        format!("<template name=\"{}\">", name),
        "  <block wx:if=\"{{d.isArray}}\">".to_string(),
        "    <block wx:for=\"{{d.v}}\" wx:key=\"key\">".to_string(),
        "      <template is=\"{{item.tempName}}\" data=\"{{...item}}\"></template>".to_string(),
        "    </block>".to_string(),
        "  </block>".to_string(),
        "  <block wx:elif=\"{{d.isJSX}}\">".to_string(),
        "    <template is=\"{{d.v.tempName}}\" data=\"{{...d.v}}\"></template>".to_string(),
        "  </block>".to_string(),
        "  <block wx:elif=\"{{d.isLiteral}}\">{{d.v}}</block>".to_string(),
        "</template>".to_string(),
    ]
    .join("\n")
}

/// Literal / nested prop component dispatch.
pub fn generate_prop_child_template(template: &PropChildTemplate) -> String {
    [
        format!("<template name=\"{}\">", template.name),
        "  <block wx:if=\"{{d.isLiteral}}\">{{d.v}}</block>".to_string(),
        "  <block wx:elif=\"{{d.isCPT}}\">".to_string(),
        format!(
            "    <{} diuu=\"{{{{d.diuu}}}}\"></{}>",
            template.component, template.component
        ),
        "  </block>".to_string(),
        "</template>".to_string(),
    ]
    .join("\n")
}

/// Every dispatch template in registration order, child templates first.
pub fn generate_dispatch_templates(info: &CompileInfo) -> String {
    info.child_templates
        .iter()
        .map(|name| generate_child_template(name))
        .chain(
            info.prop_child_templates
                .iter()
                .map(generate_prop_child_template),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

// ═══════════════════════════════════════════════════════════════════════════════
// BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// `tempVnode` expressions of the references still present, in document order.
///
/// References inside embedded JSX are evaluated with their enclosing
/// expression, so they appear in its rendered code rather than here.
pub fn collect_template_bindings(nodes: &[TemplateNode]) -> Vec<TemplateBinding> {
    let mut bindings = Vec::new();
    for node in nodes {
        collect_bindings_node(node, &mut bindings);
    }
    bindings
}

fn collect_bindings_node(node: &TemplateNode, bindings: &mut Vec<TemplateBinding>) {
    let TemplateNode::Element(el) = node else {
        return;
    };

    if el.is_template_reference() {
        let datakey = el.static_attribute(ATTR_DATAKEY);
        let vnode = el.attribute(ATTR_TEMP_VNODE).and_then(|a| a.value.as_ref());
        if let (Some(datakey), Some(AttributeValue::Dynamic(expr))) = (datakey, vnode) {
            bindings.push(TemplateBinding {
                datakey: datakey.to_string(),
                code: render_code(&expr.code, &expr.embedded),
                location: expr.location.clone(),
            });
        }
    }

    for child in &el.children {
        collect_bindings_node(child, bindings);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{ExpressionIR, ExpressionNode, TextNode};

    fn reference(datakey: &str, code: &str) -> ElementNode {
        let mut el = ElementNode::new("template");
        el.attributes.push(AttributeIR::new_static("datakey", datakey));
        el.attributes.push(AttributeIR::dynamic(
            "tempVnode",
            ExpressionIR {
                code: code.to_string(),
                embedded: Vec::new(),
                location: SourceLocation { line: 2, column: 5 },
            },
        ));
        el.attributes.push(AttributeIR::new_static("is", "child0"));
        el
    }

    #[test]
    fn test_reference_drops_temp_vnode() {
        let mut el = reference("cd0", "a");
        el.attributes.push(AttributeIR::marker("isTextElement"));
        let wxml = generate_wxml(&[TemplateNode::Element(el)]);
        assert_eq!(
            wxml,
            "<template datakey=\"cd0\" is=\"child0\" isTextElement></template>"
        );
    }

    #[test]
    fn test_text_expression_and_dynamic_attributes() {
        let mut view = ElementNode::new("view");
        view.attributes.push(AttributeIR::dynamic(
            "class",
            ExpressionIR {
                code: "cls".to_string(),
                embedded: Vec::new(),
                location: SourceLocation::default(),
            },
        ));
        view.attributes.push(AttributeIR::new_static("title", "say \"hi\""));
        view.children.push(TemplateNode::Text(TextNode {
            value: "count: ".to_string(),
            location: SourceLocation::default(),
        }));
        view.children.push(TemplateNode::Expression(ExpressionNode {
            expression: "n".to_string(),
            embedded: Vec::new(),
            location: SourceLocation::default(),
        }));

        assert_eq!(
            generate_wxml(&[TemplateNode::Element(view)]),
            "<view class=\"{{cls}}\" title=\"say &quot;hi&quot;\">count: {{n}}</view>"
        );
    }

    #[test]
    fn test_static_attributes_escape_ampersand_before_quote() {
        let mut view = ElementNode::new("view");
        view.attributes.push(AttributeIR::new_static("title", "a & \"b\" &quot;"));
        view.attributes.push(AttributeIR::dynamic(
            "hidden",
            ExpressionIR {
                code: "a && b < 2".to_string(),
                embedded: Vec::new(),
                location: SourceLocation::default(),
            },
        ));
        assert_eq!(
            generate_wxml(&[TemplateNode::Element(view)]),
            "<view title=\"a &amp; &quot;b&quot; &amp;quot;\" hidden=\"{{a && b < 2}}\"></view>"
        );
    }

    #[test]
    fn test_render_code_splices_rewritten_jsx() {
        let mut item = ElementNode::new("view");
        item.attributes.push(AttributeIR::new_static("class", "row"));
        item.children.push(TemplateNode::Element(reference("cd0", "i.name")));
        let code = "list.map(i => <view>{i.name}</view>)";
        let embedded = vec![EmbeddedJsx {
            start: 14,
            end: 35,
            fragment: false,
            nodes: vec![TemplateNode::Element(item)],
        }];

        assert_eq!(
            render_code(code, &embedded),
            "list.map(i => <view class=\"row\"><template datakey=\"cd0\" tempVnode={i.name} is=\"child0\" /></view>)"
        );
    }

    #[test]
    fn test_render_code_keeps_fragments_and_plain_code() {
        assert_eq!(render_code("a + b", &[]), "a + b");
        let embedded = vec![EmbeddedJsx {
            start: 5,
            end: 13,
            fragment: true,
            nodes: vec![TemplateNode::Text(TextNode {
                value: "{{cd2}}".to_string(),
                location: SourceLocation::default(),
            })],
        }];
        assert_eq!(render_code("ok ? <>{b}</> : null", &embedded), "ok ? <>{{cd2}}</> : null");
    }

    #[test]
    fn test_dispatch_templates_follow_registration_order() {
        let info = CompileInfo {
            child_templates: vec!["child0".to_string(), "child1".to_string()],
            prop_child_templates: vec![PropChildTemplate {
                name: "propchild0".to_string(),
                component: "fCPT".to_string(),
            }],
        };
        let out = generate_dispatch_templates(&info);
        let child0 = out.find("<template name=\"child0\">").unwrap();
        let child1 = out.find("<template name=\"child1\">").unwrap();
        let prop = out.find("<template name=\"propchild0\">").unwrap();
        assert!(child0 < child1 && child1 < prop);
        assert!(out.contains("<fCPT diuu=\"{{d.diuu}}\"></fCPT>"));
        assert!(out.contains("<block wx:elif=\"{{d.isLiteral}}\">{{d.v}}</block>"));
    }

    #[test]
    fn test_no_templates_for_empty_info() {
        assert_eq!(generate_dispatch_templates(&CompileInfo::default()), "");
    }

    #[test]
    fn test_collect_bindings_in_document_order() {
        let mut view = ElementNode::new("view");
        view.children.push(TemplateNode::Element(reference("cd1", "a")));
        let mut inner = ElementNode::new("view");
        inner.children.push(TemplateNode::Element(reference("cd0", "b()")));
        view.children.push(TemplateNode::Element(inner));

        let bindings = collect_template_bindings(&[TemplateNode::Element(view)]);
        let pairs: Vec<(&str, &str)> = bindings
            .iter()
            .map(|b| (b.datakey.as_str(), b.code.as_str()))
            .collect();
        assert_eq!(pairs, vec![("cd1", "a"), ("cd0", "b()")]);
        assert_eq!(bindings[0].location, SourceLocation { line: 2, column: 5 });
    }
}
