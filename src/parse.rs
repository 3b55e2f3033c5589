//! Parse Module
//!
//! Turns JSX source into the owned component-tree IR the lowering passes
//! rewrite. Every outermost JSX element (or fragment) in the program becomes a
//! root, in source order. Expression code is kept verbatim from the source; JSX
//! written inside an expression is lowered too and attached to it as
//! `EmbeddedJsx`, so `items.map(i => <view>{i}</view>)` is rewritten like any
//! other element.

use oxc_allocator::Allocator;
use oxc_ast::ast::{
    JSXAttributeItem, JSXAttributeName, JSXAttributeValue, JSXChild, JSXElement, JSXElementName,
    JSXExpression, JSXExpressionContainer, JSXFragment, JSXMemberExpression,
    JSXMemberExpressionObject,
};
use oxc_ast_visit::Visit;
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use serde::{Deserialize, Serialize};

use crate::transform::{CHILD_COMP_SUFFIX, DEFAULT_TEXT_TAGS};
use crate::validate::{
    AttributeIR, AttributeValue, CompilerError, ElementNode, EmbeddedJsx, ExpressionIR,
    ExpressionNode, SourceLocation, TemplateIR, TemplateNode, TextNode, ERR_NO_JSX, ERR_PARSE,
    ERR_SPREAD, WARN_EMPTY_EXPRESSION,
};

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILE OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    pub file_path: String,
    /// Tags the target markup treats as text-only containers.
    pub text_tags: Vec<String>,
    pub child_comp_suffix: String,
    pub inline_literals: bool,
    pub is_page: bool,
    /// Component outputs that receive a stylesheet; `default` is the main one.
    pub out_comps: Vec<String>,
    pub output_root: String,
    /// Emitted JS path; stylesheet imports are generated only when set.
    pub final_js_path: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            file_path: String::new(),
            text_tags: DEFAULT_TEXT_TAGS.iter().map(|t| t.to_string()).collect(),
            child_comp_suffix: CHILD_COMP_SUFFIX.to_string(),
            inline_literals: true,
            is_page: false,
            out_comps: vec!["default".to_string()],
            output_root: String::new(),
            final_js_path: None,
        }
    }
}

impl CompileOptions {
    pub fn for_file(file_path: &str) -> Self {
        CompileOptions {
            file_path: file_path.to_string(),
            ..Self::default()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// JSX PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse JSX source into a template IR holding every top-level JSX tree.
pub fn parse_jsx(code: &str, file_path: &str) -> Result<TemplateIR, CompilerError> {
    parse_jsx_with_warnings(code, file_path).map(|(ir, _)| ir)
}

/// Like [`parse_jsx`], also returning the recoverable oddities met on the way.
pub fn parse_jsx_with_warnings(
    code: &str,
    file_path: &str,
) -> Result<(TemplateIR, Vec<CompilerError>), CompilerError> {
    let allocator = Allocator::default();
    let source_type = SourceType::default().with_module(true).with_jsx(true);
    let ret = Parser::new(&allocator, code, source_type).parse();

    if !ret.errors.is_empty() {
        let message = ret
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(CompilerError::new(ERR_PARSE, &message, file_path, 1, 1));
    }

    let mut lowerer = NodeLowerer::new(code, file_path);
    let mut roots = JsxCollector::new(&mut lowerer, 0);
    roots.visit_program(&ret.program);
    let roots = roots.finish()?;

    if roots.is_empty() {
        return Err(CompilerError::new(
            ERR_NO_JSX,
            "No JSX element found in source.",
            file_path,
            1,
            1,
        ));
    }

    let ir = TemplateIR {
        file_path: file_path.to_string(),
        nodes: roots.into_iter().flat_map(|jsx| jsx.nodes).collect(),
    };
    Ok((ir, lowerer.warnings))
}

/// Lowers the outermost JSX trees reachable from wherever it is started.
/// JSX nested inside a found tree is handled by lowering that tree.
struct JsxCollector<'l, 's> {
    lowerer: &'l mut NodeLowerer<'s>,
    /// Source offset that `EmbeddedJsx` ranges are relative to.
    base: u32,
    found: Vec<EmbeddedJsx>,
    error: Option<CompilerError>,
}

impl<'l, 's> JsxCollector<'l, 's> {
    fn new(lowerer: &'l mut NodeLowerer<'s>, base: u32) -> Self {
        JsxCollector {
            lowerer,
            base,
            found: Vec::new(),
            error: None,
        }
    }

    fn push(&mut self, span: Span, fragment: bool, nodes: Result<Vec<TemplateNode>, CompilerError>) {
        match nodes {
            Ok(nodes) => self.found.push(EmbeddedJsx {
                start: span.start.saturating_sub(self.base),
                end: span.end.saturating_sub(self.base),
                fragment,
                nodes,
            }),
            Err(err) => self.error = Some(err),
        }
    }

    fn finish(self) -> Result<Vec<EmbeddedJsx>, CompilerError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.found),
        }
    }
}

impl<'a> Visit<'a> for JsxCollector<'_, '_> {
    fn visit_jsx_element(&mut self, element: &JSXElement<'a>) {
        if self.error.is_none() {
            let nodes = self.lowerer.lower_element(element).map(|node| vec![node]);
            self.push(element.span, false, nodes);
        }
    }

    fn visit_jsx_fragment(&mut self, fragment: &JSXFragment<'a>) {
        if self.error.is_none() {
            let nodes = self.lowerer.lower_children(&fragment.children);
            self.push(fragment.span, true, nodes);
        }
    }
}

struct NodeLowerer<'s> {
    source: &'s str,
    file_path: &'s str,
    /// Byte offset of the first character of every line.
    line_starts: Vec<usize>,
    warnings: Vec<CompilerError>,
}

impl<'s> NodeLowerer<'s> {
    fn new(source: &'s str, file_path: &'s str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        NodeLowerer {
            source,
            file_path,
            line_starts,
            warnings: Vec::new(),
        }
    }

    fn lower_element(&mut self, element: &JSXElement) -> Result<TemplateNode, CompilerError> {
        let opening = &element.opening_element;
        let mut attributes = Vec::with_capacity(opening.attributes.len());

        for item in &opening.attributes {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let name = match &attr.name {
                        JSXAttributeName::Identifier(id) => id.name.to_string(),
                        JSXAttributeName::NamespacedName(ns) => {
                            format!("{}:{}", ns.namespace.name, ns.name.name)
                        }
                    };
                    let value = match &attr.value {
                        None => None,
                        Some(JSXAttributeValue::StringLiteral(s)) => {
                            Some(AttributeValue::Static(s.value.to_string()))
                        }
                        Some(JSXAttributeValue::ExpressionContainer(container)) => Some(
                            AttributeValue::Dynamic(self.container_expression(container)?),
                        ),
                        Some(JSXAttributeValue::Element(el)) => {
                            let nodes = self.lower_element(el).map(|node| vec![node]);
                            Some(AttributeValue::Dynamic(self.jsx_expression(el.span, false, nodes)?))
                        }
                        Some(JSXAttributeValue::Fragment(frag)) => {
                            let nodes = self.lower_children(&frag.children);
                            Some(AttributeValue::Dynamic(self.jsx_expression(frag.span, true, nodes)?))
                        }
                    };
                    attributes.push(AttributeIR {
                        name,
                        value,
                        location: self.location_at(attr.span.start),
                    });
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    return Err(self.error_at(
                        ERR_SPREAD,
                        "Spread attributes cannot be lowered to template attributes.",
                        spread.span,
                    ));
                }
            }
        }

        Ok(TemplateNode::Element(ElementNode {
            tag: tag_name(&opening.name),
            attributes,
            children: self.lower_children(&element.children)?,
            location: self.location_at(element.span.start),
        }))
    }

    fn lower_children(&mut self, children: &[JSXChild]) -> Result<Vec<TemplateNode>, CompilerError> {
        let mut nodes = Vec::with_capacity(children.len());
        for child in children {
            match child {
                JSXChild::Text(t) => {
                    let value = normalize_jsx_text(&t.value);
                    if !value.is_empty() {
                        nodes.push(TemplateNode::Text(TextNode {
                            value,
                            location: self.location_at(t.span.start),
                        }));
                    }
                }
                JSXChild::Element(el) => nodes.push(self.lower_element(el)?),
                JSXChild::Fragment(frag) => nodes.extend(self.lower_children(&frag.children)?),
                JSXChild::ExpressionContainer(container) => {
                    if matches!(container.expression, JSXExpression::EmptyExpression(_)) {
                        let location = self.location_at(container.span.start);
                        tracing::warn!(
                            file = %self.file_path,
                            line = location.line,
                            column = location.column,
                            "dropped empty expression container"
                        );
                        self.warnings.push(CompilerError::at(
                            WARN_EMPTY_EXPRESSION,
                            "Empty expression container dropped.",
                            self.file_path,
                            &location,
                        ));
                        continue;
                    }
                    let expression = self.container_expression(container)?;
                    nodes.push(TemplateNode::Expression(ExpressionNode {
                        expression: expression.code,
                        embedded: expression.embedded,
                        location: expression.location,
                    }));
                }
                JSXChild::Spread(spread) => {
                    return Err(self.error_at(
                        ERR_SPREAD,
                        "Spread children cannot be lowered to template children.",
                        spread.span,
                    ));
                }
            }
        }
        Ok(nodes)
    }

    /// Trimmed source text between the braces of `container`, with the JSX
    /// it contains lowered.
    fn container_expression(
        &mut self,
        container: &JSXExpressionContainer,
    ) -> Result<ExpressionIR, CompilerError> {
        let span = container.span;
        let inner = Span::new(span.start + 1, span.end.saturating_sub(1).max(span.start + 1));
        let (code, base) = self.trimmed_source(inner);

        let mut collector = JsxCollector::new(self, base);
        collector.visit_jsx_expression(&container.expression);
        let embedded = collector.finish()?;

        Ok(ExpressionIR {
            code,
            embedded,
            location: self.location_at(span.start),
        })
    }

    /// A JSX attribute value written without braces: the whole code is JSX.
    fn jsx_expression(
        &mut self,
        span: Span,
        fragment: bool,
        nodes: Result<Vec<TemplateNode>, CompilerError>,
    ) -> Result<ExpressionIR, CompilerError> {
        let (code, base) = self.trimmed_source(span);
        Ok(ExpressionIR {
            code,
            embedded: vec![EmbeddedJsx {
                start: span.start.saturating_sub(base),
                end: span.end.saturating_sub(base),
                fragment,
                nodes: nodes?,
            }],
            location: self.location_at(span.start),
        })
    }

    /// Trimmed source text of `span` and the offset where it starts.
    fn trimmed_source(&self, span: Span) -> (String, u32) {
        let raw = self
            .source
            .get(span.start as usize..span.end as usize)
            .unwrap_or_default();
        let leading = raw.len() - raw.trim_start().len();
        (raw.trim().to_string(), span.start + leading as u32)
    }

    fn location_at(&self, offset: u32) -> SourceLocation {
        let offset = (offset as usize).min(self.source.len());
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line - 1];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(0, |prefix| prefix.chars().count());
        SourceLocation {
            line: line as u32,
            column: column as u32 + 1,
        }
    }

    fn error_at(&self, code: &str, message: &str, span: Span) -> CompilerError {
        CompilerError::at(code, message, self.file_path, &self.location_at(span.start))
    }
}

fn tag_name(name: &JSXElementName) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn member_name(me: &JSXMemberExpression) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => member_name(inner),
        _ => "this".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

/// JSX whitespace rules: lines are trimmed where they meet a line break and
/// blank lines disappear; the survivors are joined by single spaces.
pub fn normalize_jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut out = String::new();

    for (i, line) in lines.iter().enumerate() {
        let mut trimmed = line.trim_end_matches('\r');
        if i != 0 {
            trimmed = trimmed.trim_start();
        }
        if i != last {
            trimmed = trimmed.trim_end();
        }
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }

    out
}
