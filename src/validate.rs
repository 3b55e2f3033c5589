#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::transform::{
    CompileInfo, ElementClassifier, ATTR_DATAKEY, ATTR_IS, ATTR_IS_TEXT_ELEMENT, ATTR_TEMP_VNODE,
    TEMPLATE_TAG,
};

// ═══════════════════════════════════════════════════════════════════════════════
// INVARIANT CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_PARSE: &str = "WX-ERR-PARSE";
pub const ERR_NO_JSX: &str = "WX-ERR-NO-JSX";
pub const ERR_SPREAD: &str = "WX-ERR-SPREAD";
pub const INV_MISSING_DATAKEY: &str = "WX-INV-DATAKEY";
pub const INV_DUPLICATE_DATAKEY: &str = "WX-INV-DUPLICATE-DATAKEY";
pub const INV_UNREGISTERED_TEMPLATE: &str = "WX-INV-UNREGISTERED-TEMPLATE";
pub const INV_DUPLICATE_TEMPLATE: &str = "WX-INV-DUPLICATE-TEMPLATE";
pub const INV_TEXT_MARKER: &str = "WX-INV-TEXT-MARKER";
pub const WARN_EMPTY_EXPRESSION: &str = "WX-WARN-EMPTY-EXPRESSION";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_PARSE => "Only syntactically valid JSX reaches the lowering passes.",
        ERR_NO_JSX => "Every compiled source renders a component tree.",
        ERR_SPREAD => "WXML attributes and children are statically enumerable.",
        INV_MISSING_DATAKEY => "Every child template reference binds a runtime data slot.",
        INV_DUPLICATE_DATAKEY => "Data keys are unique across the compiled tree.",
        INV_UNREGISTERED_TEMPLATE => {
            "Every dispatch selector used by a reference is emitted as a template."
        }
        INV_DUPLICATE_TEMPLATE => "Each dispatch template is emitted exactly once.",
        INV_TEXT_MARKER => {
            "isTextElement is set iff the reference lives inside a pure-text container."
        }
        WARN_EMPTY_EXPRESSION => "Empty expression containers never become references.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message} ({file}:{line}:{column})")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn at(code: &str, message: &str, file: &str, location: &SourceLocation) -> Self {
        Self::new(code, message, file, location.line, location.column)
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        let error_type = if code.starts_with("WX-INV") {
            "COMPILER_INVARIANT_VIOLATION"
        } else if code.starts_with("WX-WARN") {
            "COMPILE_WARNING"
        } else {
            "COMPILE_ERROR"
        };
        CompilerError {
            code: code.to_string(),
            error_type: error_type.to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IR TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// An unevaluated JS expression, kept as source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionIR {
    pub code: String,
    /// JSX written inside `code`, lowered so the passes can rewrite it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded: Vec<EmbeddedJsx>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// A JSX element or fragment occupying `start..end` (byte offsets) of the
/// owning expression's code. Rendering splices the rewritten nodes back in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedJsx {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub fragment: bool,
    pub nodes: Vec<TemplateNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Static(String),
    Dynamic(ExpressionIR),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeIR {
    pub name: String,
    /// `None` for bare marker attributes such as `isTextElement`.
    #[serde(default)]
    pub value: Option<AttributeValue>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl AttributeIR {
    pub fn new_static(name: &str, value: impl Into<String>) -> Self {
        AttributeIR {
            name: name.to_string(),
            value: Some(AttributeValue::Static(value.into())),
            location: SourceLocation::default(),
        }
    }

    pub fn dynamic(name: &str, expression: ExpressionIR) -> Self {
        AttributeIR {
            name: name.to_string(),
            location: expression.location.clone(),
            value: Some(AttributeValue::Dynamic(expression)),
        }
    }

    pub fn marker(name: &str) -> Self {
        AttributeIR {
            name: name.to_string(),
            value: None,
            location: SourceLocation::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum TemplateNode {
    Element(ElementNode),
    Text(TextNode),
    Expression(ExpressionNode),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementNode {
    pub tag: String,
    pub attributes: Vec<AttributeIR>,
    pub children: Vec<TemplateNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ElementNode {
    pub fn new(tag: &str) -> Self {
        ElementNode {
            tag: tag.to_string(),
            attributes: Vec::new(),
            children: Vec::new(),
            location: SourceLocation::default(),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeIR> {
        self.attributes.iter().find(|attr| attr.name == name)
    }

    /// Value of a string-literal attribute; `None` when absent, bare or dynamic.
    pub fn static_attribute(&self, name: &str) -> Option<&str> {
        match self.attribute(name)?.value.as_ref()? {
            AttributeValue::Static(value) => Some(value.as_str()),
            AttributeValue::Dynamic(_) => None,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// A `<template>` carrying either half of the generated reference shape.
    pub fn is_template_reference(&self) -> bool {
        self.tag == TEMPLATE_TAG
            && (self.has_attribute(ATTR_DATAKEY) || self.has_attribute(ATTR_TEMP_VNODE))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: String,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionNode {
    pub expression: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedded: Vec<EmbeddedJsx>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateIR {
    pub file_path: String,
    pub nodes: Vec<TemplateNode>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION FUNCTIONS
// ═══════════════════════════════════════════════════════════════════════════════

struct ReferenceCheck<'a> {
    file: &'a str,
    registered: HashSet<&'a str>,
    classifier: &'a dyn ElementClassifier,
    seen_keys: HashSet<String>,
    errors: Vec<CompilerError>,
}

impl<'a> ReferenceCheck<'a> {
    fn check_nodes(&mut self, nodes: &[TemplateNode]) {
        for node in nodes {
            match node {
                TemplateNode::Element(el) => self.check_element(el),
                TemplateNode::Expression(e) => self.check_embedded(&e.embedded),
                TemplateNode::Text(_) => {}
            }
        }
    }

    fn check_embedded(&mut self, embedded: &[EmbeddedJsx]) {
        for jsx in embedded {
            self.check_nodes(&jsx.nodes);
        }
    }

    fn check_element(&mut self, element: &ElementNode) {
        for attr in &element.attributes {
            if let Some(AttributeValue::Dynamic(expr)) = &attr.value {
                self.check_embedded(&expr.embedded);
            }
        }

        let parent_is_text = self.classifier.is_text_element(element);
        let parent_is_comp = self.classifier.is_child_comp(&element.tag);

        for child in &element.children {
            let TemplateNode::Element(reference) = child else {
                continue;
            };
            if !reference.is_template_reference() {
                continue;
            }
            self.check_reference(reference, parent_is_text && !parent_is_comp);
        }

        self.check_nodes(&element.children);
    }

    fn check_reference(&mut self, reference: &ElementNode, parent_is_text: bool) {
        match reference.static_attribute(ATTR_DATAKEY) {
            Some(key) => {
                if !self.seen_keys.insert(key.to_string()) {
                    self.errors.push(CompilerError::at(
                        INV_DUPLICATE_DATAKEY,
                        &format!("Data key \"{}\" is bound by more than one reference.", key),
                        self.file,
                        &reference.location,
                    ));
                }
            }
            None => self.errors.push(CompilerError::at(
                INV_MISSING_DATAKEY,
                "Child template reference has no datakey attribute.",
                self.file,
                &reference.location,
            )),
        }

        if let Some(selector) = reference.static_attribute(ATTR_IS) {
            if !selector.is_empty() && !self.registered.contains(selector) {
                self.errors.push(CompilerError::with_details(
                    INV_UNREGISTERED_TEMPLATE,
                    &format!("Selector \"{}\" has no registered dispatch template.", selector),
                    self.file,
                    reference.location.line,
                    reference.location.column,
                    None,
                    vec!["Run children_to_template with the same CompileInfo.".to_string()],
                ));
            }
        }

        if reference.has_attribute(ATTR_IS_TEXT_ELEMENT) != parent_is_text {
            self.errors.push(CompilerError::at(
                INV_TEXT_MARKER,
                "isTextElement marker does not match the parent container.",
                self.file,
                &reference.location,
            ));
        }
    }
}

/// Checks every generated child template reference against the info record.
pub fn validate_template_references(
    ir: &TemplateIR,
    info: &CompileInfo,
    classifier: &dyn ElementClassifier,
) -> Vec<CompilerError> {
    let mut errors = Vec::new();
    let mut registered = HashSet::new();
    for name in info.selector_names() {
        if !registered.insert(name) {
            errors.push(CompilerError::new(
                INV_DUPLICATE_TEMPLATE,
                &format!("Dispatch template \"{}\" is registered twice.", name),
                &ir.file_path,
                1,
                1,
            ));
        }
    }

    let mut check = ReferenceCheck {
        file: &ir.file_path,
        registered,
        classifier,
        seen_keys: HashSet::new(),
        errors,
    };
    check.check_nodes(&ir.nodes);
    check.errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_attribute_skips_bare_and_dynamic_values() {
        let mut el = ElementNode::new("template");
        el.attributes.push(AttributeIR::new_static("datakey", "cd0"));
        el.attributes.push(AttributeIR::marker("isTextElement"));
        el.attributes.push(AttributeIR::dynamic(
            "tempVnode",
            ExpressionIR {
                code: "a".to_string(),
                embedded: Vec::new(),
                location: SourceLocation::default(),
            },
        ));

        assert_eq!(el.static_attribute("datakey"), Some("cd0"));
        assert_eq!(el.static_attribute("isTextElement"), None);
        assert_eq!(el.static_attribute("tempVnode"), None);
        assert!(el.has_attribute("isTextElement"));
        assert!(el.is_template_reference());
    }

    #[test]
    fn user_template_is_not_a_reference() {
        let mut el = ElementNode::new("template");
        el.attributes.push(AttributeIR::new_static("is", "card"));
        assert!(!el.is_template_reference());
    }

    #[test]
    fn error_type_follows_code_family() {
        let inv = CompilerError::new(INV_MISSING_DATAKEY, "m", "a.jsx", 1, 1);
        assert_eq!(inv.error_type, "COMPILER_INVARIANT_VIOLATION");
        let err = CompilerError::new(ERR_PARSE, "m", "a.jsx", 1, 1);
        assert_eq!(err.error_type, "COMPILE_ERROR");
        assert_eq!(
            err.to_string(),
            "[WX-ERR-PARSE] m (a.jsx:1:1)"
        );
    }

    #[test]
    fn references_inside_embedded_jsx_are_checked() {
        let mut inner = ElementNode::new("view");
        let mut reference = ElementNode::new("template");
        reference.attributes.push(AttributeIR::dynamic(
            "tempVnode",
            ExpressionIR {
                code: "i.name".to_string(),
                embedded: Vec::new(),
                location: SourceLocation::default(),
            },
        ));
        reference.attributes.push(AttributeIR::new_static("is", "child0"));
        inner.children.push(TemplateNode::Element(reference));

        let mut outer = ElementNode::new("view");
        outer.children.push(TemplateNode::Expression(ExpressionNode {
            expression: "list.map(i => <view />)".to_string(),
            embedded: vec![EmbeddedJsx {
                start: 14,
                end: 22,
                fragment: false,
                nodes: vec![TemplateNode::Element(inner)],
            }],
            location: SourceLocation::default(),
        }));
        let ir = TemplateIR {
            file_path: "a.jsx".to_string(),
            nodes: vec![TemplateNode::Element(outer)],
        };
        let info = CompileInfo {
            child_templates: vec!["child0".to_string()],
            prop_child_templates: vec![],
        };

        let errors = validate_template_references(&ir, &info, &crate::transform::DefaultClassifier::new());
        let codes: Vec<&str> = errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec![INV_MISSING_DATAKEY]);
    }

    #[test]
    fn warning_codes_have_their_own_type() {
        let warn = CompilerError::new(WARN_EMPTY_EXPRESSION, "m", "a.jsx", 2, 3);
        assert_eq!(warn.error_type, "COMPILE_WARNING");
    }

    #[test]
    fn node_serializes_with_kebab_type_tag() {
        let node = TemplateNode::Text(TextNode {
            value: "hi".to_string(),
            location: SourceLocation { line: 1, column: 2 },
        });
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], "text");
        assert_eq!(value["value"], "hi");
        assert_eq!(value["location"]["column"], 2);
    }
}
