//! Stylesheet imports for compiled components.
//!
//! Every component output gets a `.wxss` next to its JS file importing the
//! shared component stylesheet; the default output of a page also imports
//! the shared page stylesheet.

use lazy_static::lazy_static;
use regex::{NoExpand, Regex};
use std::collections::BTreeMap;
use std::path::{Component, Path};

pub const PAGE_COMMON_WXSS: &str = "pageCommon.wxss";
pub const COMP_COMMON_WXSS: &str = "compCommon.wxss";
pub const DEFAULT_OUT_COMP: &str = "default";

lazy_static! {
    static ref JS_EXT_RE: Regex = Regex::new(r"\.js$").unwrap();
}

/// Relative path from the directory of `file_path` up to `output_root`.
pub fn root_path_prefix(file_path: &str, output_root: &str) -> String {
    let dir = Path::new(file_path).parent().unwrap_or_else(|| Path::new(""));
    let relative = dir.strip_prefix(output_root).unwrap_or(dir);
    let depth = relative
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .count();

    if depth == 0 {
        ".".to_string()
    } else {
        vec![".."; depth].join("/")
    }
}

pub fn wxss_path(final_js_path: &str, out_comp: &str) -> String {
    let replacement = if out_comp == DEFAULT_OUT_COMP {
        ".wxss".to_string()
    } else {
        format!("{}.wxss", out_comp)
    };
    JS_EXT_RE
        .replace(final_js_path, NoExpand(&replacement))
        .into_owned()
}

/// Stylesheet path → stylesheet source for every out component.
pub fn generate_wxss_imports(
    final_js_path: &str,
    out_comps: &[String],
    is_page: bool,
    output_root: &str,
) -> BTreeMap<String, String> {
    let prefix = root_path_prefix(final_js_path, output_root);
    let page_common = format!("{}/{}", prefix, PAGE_COMMON_WXSS);
    let comp_common = format!("{}/{}", prefix, COMP_COMMON_WXSS);

    out_comps
        .iter()
        .map(|name| {
            let code = if name == DEFAULT_OUT_COMP && is_page {
                format!("@import '{}';\n@import '{}';", page_common, comp_common)
            } else {
                format!("@import '{}';", comp_common)
            };
            (wxss_path(final_js_path, name), code)
        })
        .collect()
}
