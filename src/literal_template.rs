//! Literal inlining.
//!
//! Inside a pure-text container the dispatch template can only take its
//! literal branch, so each child template reference collapses to a direct
//! interpolation of its data key: `<template datakey="cd3" .../>` → `{{cd3}}`.
//! The info record is left untouched; other call sites may still need the
//! dispatch template. Text containers inside embedded JSX are inlined too.

use crate::codegen::{render_code, TemplateBinding};
use crate::transform::{ElementClassifier, ATTR_DATAKEY, ATTR_TEMP_VNODE, TEMPLATE_TAG};
use crate::validate::{
    AttributeValue, CompilerError, ElementNode, TemplateIR, TemplateNode, TextNode,
    INV_MISSING_DATAKEY,
};
use crate::visitor::{walk_element, TemplateVisitor};

/// Replaces template references inside text containers with `{{datakey}}`.
///
/// Returns the `tempVnode` bindings of the references it removed, in the
/// order they were inlined. A reference without a `datakey` aborts the pass.
pub fn literal_template(
    ir: &mut TemplateIR,
    classifier: &dyn ElementClassifier,
) -> Result<Vec<TemplateBinding>, CompilerError> {
    let mut inliner = LiteralInliner {
        classifier,
        file_path: ir.file_path.clone(),
        inlined: Vec::new(),
        error: None,
    };
    inliner.visit_root(ir);

    match inliner.error {
        Some(err) => Err(err),
        None => Ok(inliner.inlined),
    }
}

struct LiteralInliner<'c> {
    classifier: &'c dyn ElementClassifier,
    file_path: String,
    inlined: Vec<TemplateBinding>,
    error: Option<CompilerError>,
}

impl TemplateVisitor for LiteralInliner<'_> {
    fn visit_element(&mut self, element: &mut ElementNode) {
        walk_element(self, element);

        if self.error.is_some() || !self.classifier.is_text_element(element) {
            return;
        }

        for child in element.children.iter_mut() {
            let inlined = match child {
                TemplateNode::Element(reference) if reference.tag == TEMPLATE_TAG => {
                    match reference.static_attribute(ATTR_DATAKEY) {
                        Some(datakey) => TextNode {
                            value: format!("{{{{{}}}}}", datakey),
                            location: reference.location.clone(),
                        },
                        None => {
                            self.error = Some(CompilerError::with_details(
                                INV_MISSING_DATAKEY,
                                &format!(
                                    "<template> inside <{}> has no datakey to inline.",
                                    element.tag
                                ),
                                &self.file_path,
                                reference.location.line,
                                reference.location.column,
                                None,
                                vec!["Run children_to_template before literal_template.".to_string()],
                            ));
                            return;
                        }
                    }
                }
                _ => continue,
            };
            tracing::trace!(value = %inlined.value, tag = %element.tag, "inlined literal template");
            if let TemplateNode::Element(reference) =
                std::mem::replace(child, TemplateNode::Text(inlined))
            {
                self.keep_binding(reference);
            }
        }
    }
}

impl LiteralInliner<'_> {
    fn keep_binding(&mut self, reference: ElementNode) {
        let datakey = reference.static_attribute(ATTR_DATAKEY).map(str::to_string);
        let vnode = reference
            .attributes
            .into_iter()
            .find(|attr| attr.name == ATTR_TEMP_VNODE)
            .and_then(|attr| attr.value);
        if let (Some(datakey), Some(AttributeValue::Dynamic(expr))) = (datakey, vnode) {
            self.inlined.push(TemplateBinding {
                datakey,
                code: render_code(&expr.code, &expr.embedded),
                location: expr.location,
            });
        }
    }
}
