//! # WXML Compiler Native: Dynamic Children Lowering
//!
//! Lowers JSX component trees to mini-program templates. Expression children
//! cannot be rendered directly by WXML, so they go through a shared runtime
//! dispatch template.
//!
//! ## Pipeline
//!
//! 1. **Parse** (`parse`): JSX source → `TemplateIR` (Element / Expression / Text).
//!    JSX written inside expressions is lowered as well and rides along with
//!    its expression as `EmbeddedJsx`.
//! 2. **Child templates** (`children_template`): every expression child of a
//!    non-component element becomes a `<template datakey is data>` reference;
//!    selectors are registered in `CompileInfo`.
//! 3. **Literal inlining** (`literal_template`): inside pure-text containers,
//!    references collapse to `{{datakey}}`.
//! 4. **Validate** (`validate`), then **emit** WXML and dispatch templates
//!    (`codegen`) plus stylesheet imports (`style`).
//!
//! ## Naming Invariants
//!
//! 1. **Data keys** (`cd<n>`) are unique across the compiled tree.
//! 2. **Selectors** (`child<n>`) are allocated once per element and shared by
//!    all its expression children; each is registered exactly once.
//! 3. **Prop children** (`this.props.f()`) use `propchild<n>` dispatching to `fCPT`.
//! 4. **Generators** live in a caller-owned `NameOrders`; there is no global
//!    counter, so files compile independently and in parallel.
//!
//! ## Ordering
//!
//! `children_to_template` must run before `literal_template`; the inliner
//! trusts that every `<template>` in a text container carries a `datakey`.
//! Both passes are post-order, so JSX inside an expression child is rewritten
//! before the child becomes a reference and its `tempVnode` is rendered.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod children_template;
mod codegen;
mod finalize;
mod literal_template;
mod parse;
mod style;
mod transform;
mod validate;
mod visitor;


pub use children_template::children_to_template;
pub use codegen::{
    collect_template_bindings, generate_child_template, generate_dispatch_templates,
    generate_prop_child_template, generate_wxml, render_code, TemplateBinding,
};
pub use finalize::{compile_batch, compile_jsx, lower_dynamic_children, CompileResult, SourceFile};
pub use literal_template::literal_template;
pub use parse::{normalize_jsx_text, parse_jsx, parse_jsx_with_warnings, CompileOptions};
pub use style::{generate_wxss_imports, root_path_prefix, wxss_path};
pub use transform::*;
pub use validate::*;
pub use visitor::{
    walk_children, walk_element, walk_expression, walk_node, walk_root, TemplateVisitor,
};

#[cfg(feature = "napi")]
pub use finalize::compile_wxml_native;

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "WXML Native Bridge Connected".to_string()
}
