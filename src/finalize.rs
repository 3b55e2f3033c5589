//! Finalize Module
//!
//! Runs the full pipeline for one source (parse → child templates → literal
//! inlining → validation → WXML) and for independent batches in parallel.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::children_template::children_to_template;
use crate::codegen::{
    collect_template_bindings, generate_dispatch_templates, generate_wxml, TemplateBinding,
};
use crate::literal_template::literal_template;
use crate::parse::{parse_jsx_with_warnings, CompileOptions};
use crate::style::generate_wxss_imports;
use crate::transform::{CompileInfo, DefaultClassifier, ElementClassifier, LoweringContext, NameOrders};
use crate::validate::{validate_template_references, CompilerError, TemplateIR};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub file_path: String,
    pub wxml: String,
    /// Dispatch template definitions for every registered selector.
    pub child_templates: String,
    pub info: CompileInfo,
    pub bindings: Vec<TemplateBinding>,
    /// Stylesheet path → import block, empty without a `finalJsPath`.
    pub styles: BTreeMap<String, String>,
    /// Recoverable front-end oddities, such as dropped empty expressions.
    pub warnings: Vec<CompilerError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub file_path: String,
    pub code: String,
    #[serde(default)]
    pub final_js_path: Option<String>,
}

/// Runs both dynamic-children passes in their required order and validates
/// the outcome. Returns the bindings of every generated reference in the
/// tree, including the ones inlined afterwards, in document order.
///
/// When validation fails the first violation is returned; the others are
/// logged and summarized in its `context`.
pub fn lower_dynamic_children(
    ir: &mut TemplateIR,
    orders: &mut NameOrders,
    info: &mut CompileInfo,
    classifier: &dyn ElementClassifier,
    inline_literals: bool,
) -> Result<Vec<TemplateBinding>, CompilerError> {
    {
        let mut ctx = LoweringContext::new(orders, info, classifier);
        children_to_template(ir, &mut ctx);
    }
    let mut bindings = collect_template_bindings(&ir.nodes);

    if inline_literals {
        let inlined = literal_template(ir, classifier)?;
        // inlining also rewrites text containers nested in tempVnode JSX
        let mut current: HashMap<String, TemplateBinding> = collect_template_bindings(&ir.nodes)
            .into_iter()
            .chain(inlined)
            .map(|binding| (binding.datakey.clone(), binding))
            .collect();
        bindings = bindings
            .into_iter()
            .map(|binding| current.remove(&binding.datakey).unwrap_or(binding))
            .collect();
    }

    let mut errors = validate_template_references(ir, info, classifier).into_iter();
    if let Some(mut first) = errors.next() {
        let rest: Vec<String> = errors
            .map(|err| {
                tracing::warn!(code = %err.code, file = %err.file, line = err.line, "{}", err.message);
                err.to_string()
            })
            .collect();
        if !rest.is_empty() {
            first.context = Some(format!(
                "{} further violation(s): {}",
                rest.len(),
                rest.join("; ")
            ));
        }
        return Err(first);
    }
    Ok(bindings)
}

pub fn compile_jsx(code: &str, options: &CompileOptions) -> Result<CompileResult, CompilerError> {
    let (mut ir, warnings) = parse_jsx_with_warnings(code, &options.file_path)?;

    let classifier = DefaultClassifier::from_options(options);
    let mut orders = NameOrders::new();
    let mut info = CompileInfo::new();
    let bindings = lower_dynamic_children(
        &mut ir,
        &mut orders,
        &mut info,
        &classifier,
        options.inline_literals,
    )?;

    let styles = match &options.final_js_path {
        Some(js_path) => generate_wxss_imports(
            js_path,
            &options.out_comps,
            options.is_page,
            &options.output_root,
        ),
        None => BTreeMap::new(),
    };

    tracing::info!(
        file = %options.file_path,
        templates = info.child_templates.len() + info.prop_child_templates.len(),
        bindings = bindings.len(),
        warnings = warnings.len(),
        "compiled template"
    );

    Ok(CompileResult {
        file_path: options.file_path.clone(),
        wxml: generate_wxml(&ir.nodes),
        child_templates: generate_dispatch_templates(&info),
        info,
        bindings,
        styles,
        warnings,
    })
}

/// Compiles independent sources in parallel; each gets its own name orders.
pub fn compile_batch(
    files: &[SourceFile],
    options: &CompileOptions,
) -> Vec<Result<CompileResult, CompilerError>> {
    files
        .par_iter()
        .map(|file| {
            let file_options = CompileOptions {
                file_path: file.file_path.clone(),
                final_js_path: file.final_js_path.clone(),
                ..options.clone()
            };
            compile_jsx(&file.code, &file_options)
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(feature = "napi")]
#[napi]
pub fn compile_wxml_native(code: String, options_json: String) -> napi::Result<String> {
    let options: CompileOptions = serde_json::from_str(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid options: {}", e)))?;
    let result = compile_jsx(&code, &options).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_string(&result)
        .map_err(|e| napi::Error::from_reason(format!("Invalid CompileResult: {}", e)))
}
