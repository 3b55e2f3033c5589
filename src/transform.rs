use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::parse::CompileOptions;
use crate::validate::ElementNode;

// ═══════════════════════════════════════════════════════════════════════════════
// GENERATED NAME PREFIXES
// ═══════════════════════════════════════════════════════════════════════════════

pub const CHILD_TEMPLATE_NAME_PREFIX: &str = "child";
pub const CHILD_TEMPLATE_DATA_KEY_PREFIX: &str = "cd";
pub const PROP_CHILD_TEMPLATE_NAME_PREFIX: &str = "propchild";
/// Suffix shared by prop-passed child components, e.g. `fCPT`.
pub const CHILD_COMP_SUFFIX: &str = "CPT";

// ═══════════════════════════════════════════════════════════════════════════════
// TEMPLATE REFERENCE SHAPE
// ═══════════════════════════════════════════════════════════════════════════════

pub const TEMPLATE_TAG: &str = "template";
pub const ATTR_DATAKEY: &str = "datakey";
pub const ATTR_TEMP_VNODE: &str = "tempVnode";
pub const ATTR_WX_IF: &str = "wx:if";
pub const ATTR_IS: &str = "is";
pub const ATTR_DATA: &str = "data";
pub const ATTR_IS_TEXT_ELEMENT: &str = "isTextElement";

pub const DEFAULT_TEXT_TAGS: [&str; 3] = ["text", "Text", "label"];

// ═══════════════════════════════════════════════════════════════════════════════
// ORDER GENERATORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Monotonic id source for one category of generated names.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    prefix: &'static str,
    next: u64,
}

impl OrderGenerator {
    pub fn new(prefix: &'static str) -> Self {
        OrderGenerator { prefix, next: 0 }
    }

    pub fn next_value(&mut self) -> u64 {
        let value = self.next;
        self.next += 1;
        value
    }

    pub fn next_name(&mut self) -> String {
        let value = self.next_value();
        format!("{}{}", self.prefix, value)
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Number of values handed out so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}

/// The generators one compile threads through its passes.
///
/// Reusing a `NameOrders` across several extractor runs keeps every name
/// distinct; a fresh one restarts at zero.
#[derive(Debug, Clone)]
pub struct NameOrders {
    pub template_names: OrderGenerator,
    pub data_keys: OrderGenerator,
    pub prop_template_names: OrderGenerator,
}

impl NameOrders {
    pub fn new() -> Self {
        NameOrders {
            template_names: OrderGenerator::new(CHILD_TEMPLATE_NAME_PREFIX),
            data_keys: OrderGenerator::new(CHILD_TEMPLATE_DATA_KEY_PREFIX),
            prop_template_names: OrderGenerator::new(PROP_CHILD_TEMPLATE_NAME_PREFIX),
        }
    }
}

impl Default for NameOrders {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFO RECORD
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropChildTemplate {
    pub name: String,
    pub component: String,
}

/// Dispatch templates the emitter must materialize. Append-only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileInfo {
    pub child_templates: Vec<String>,
    #[serde(default)]
    pub prop_child_templates: Vec<PropChildTemplate>,
}

impl CompileInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every registered selector, child templates first.
    pub fn selector_names(&self) -> impl Iterator<Item = &str> {
        self.child_templates
            .iter()
            .map(String::as_str)
            .chain(self.prop_child_templates.iter().map(|t| t.name.as_str()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELEMENT CLASSIFICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Predicates supplied by the surrounding compiler.
pub trait ElementClassifier: Sync {
    /// Encapsulated components never receive child template references.
    fn is_child_comp(&self, tag: &str) -> bool;

    /// Containers whose target tag may only hold text.
    fn is_text_element(&self, element: &ElementNode) -> bool;
}

#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    text_tags: HashSet<String>,
    child_comp_suffix: String,
}

impl DefaultClassifier {
    pub fn new() -> Self {
        DefaultClassifier {
            text_tags: DEFAULT_TEXT_TAGS.iter().map(|t| t.to_string()).collect(),
            child_comp_suffix: CHILD_COMP_SUFFIX.to_string(),
        }
    }

    pub fn from_options(options: &CompileOptions) -> Self {
        DefaultClassifier {
            text_tags: options.text_tags.iter().cloned().collect(),
            child_comp_suffix: options.child_comp_suffix.clone(),
        }
    }
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementClassifier for DefaultClassifier {
    fn is_child_comp(&self, tag: &str) -> bool {
        !self.child_comp_suffix.is_empty()
            && tag.len() > self.child_comp_suffix.len()
            && tag.ends_with(&self.child_comp_suffix)
    }

    fn is_text_element(&self, element: &ElementNode) -> bool {
        self.text_tags.contains(&element.tag)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERING CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

pub struct LoweringContext<'a> {
    pub orders: &'a mut NameOrders,
    pub info: &'a mut CompileInfo,
    pub classifier: &'a dyn ElementClassifier,
}

impl<'a> LoweringContext<'a> {
    pub fn new(
        orders: &'a mut NameOrders,
        info: &'a mut CompileInfo,
        classifier: &'a dyn ElementClassifier,
    ) -> Self {
        LoweringContext {
            orders,
            info,
            classifier,
        }
    }
}
