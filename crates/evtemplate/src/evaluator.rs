/*
 * evaluator.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template evaluation engine.
//!
//! A compiled template is a tree of [`CompiledNode`]s. Evaluating a node
//! writes its output for one event straight into a [`Utf8Writer`]; nothing
//! is built up in between, and the tree itself is never mutated, so one
//! tree can render many events from many threads at once.

use chrono::{DateTime, FixedOffset};
use evtemplate_events::{Level, Scalar, Value};

use crate::ast::Alignment;
use crate::eval_context::{EvalContext, Evaluated, Local};
use crate::expression::CompiledExpr;
use crate::format::{FormatProvider, write_scalar};
use crate::json::JsonValueFormatter;
use crate::level::level_monikers;
use crate::message::{MessageRenderer, MessageTemplate};
use crate::padding;
use crate::theme::{Style, TemplateTheme, ThemeStyle};
use crate::timestamp::TimestampFormatter;
use crate::writer::{Utf8Writer, buffer_exhausted};

/// Window reserved for the second attempt at an atomic write.
const RETRY_WINDOW: usize = 64;

/// Stack frame lines of an exception start with this prefix.
const STACK_FRAME_PREFIX: &str = "   ";

/// A compiled template fragment.
#[derive(Debug, Clone)]
pub enum CompiledNode {
    Literal(LiteralText),
    Sequence(Vec<CompiledNode>),
    FormattedExpression(FormattedExpression),
    Level(LevelToken),
    Timestamp(TimestampToken),
    Message(MessageToken),
    Exception(ExceptionToken),
    Conditional(Conditional),
    Repetition(Repetition),
}

impl CompiledNode {
    pub fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        match self {
            CompiledNode::Literal(literal) => literal.evaluate(out),
            CompiledNode::Sequence(nodes) => {
                for node in nodes {
                    node.evaluate(ctx, out);
                }
            }
            CompiledNode::FormattedExpression(expression) => expression.evaluate(ctx, out),
            CompiledNode::Level(token) => token.evaluate(ctx, out),
            CompiledNode::Timestamp(token) => token.evaluate(ctx, out),
            CompiledNode::Message(token) => token.evaluate(ctx, out),
            CompiledNode::Exception(token) => token.evaluate(ctx, out),
            CompiledNode::Conditional(conditional) => conditional.evaluate(ctx, out),
            CompiledNode::Repetition(repetition) => repetition.evaluate(ctx, out),
        }
    }

    /// Number of nodes in this subtree.
    pub fn node_count(&self) -> usize {
        1 + match self {
            CompiledNode::Sequence(nodes) => nodes.iter().map(CompiledNode::node_count).sum(),
            CompiledNode::Conditional(conditional) => {
                conditional
                    .branches
                    .iter()
                    .map(|(_, body)| body.node_count())
                    .sum::<usize>()
                    + conditional.otherwise.as_ref().map_or(0, |n| n.node_count())
            }
            CompiledNode::Repetition(repetition) => {
                repetition.body.node_count()
                    + repetition.delimiter.as_ref().map_or(0, |n| n.node_count())
                    + repetition.alternative.as_ref().map_or(0, |n| n.node_count())
            }
            _ => 0,
        }
    }
}

// ============================================================================
// Text and expressions
// ============================================================================

#[derive(Debug, Clone)]
pub struct LiteralText {
    text: Box<[u8]>,
    style: Style,
}

impl LiteralText {
    pub fn new(text: &str, theme: &TemplateTheme) -> Self {
        Self {
            text: text.as_bytes().into(),
            style: theme.style(ThemeStyle::TertiaryText),
        }
    }

    fn evaluate(&self, out: &mut Utf8Writer<'_>) {
        let mut invisible = 0;
        self.style.set(out, &mut invisible);
        out.write(&self.text);
        self.style.reset(out);
    }
}

/// `{expr,alignment:format}` for an arbitrary expression.
///
/// Undefined and null both render as nothing. Scalars are formatted as
/// text; anything else is written as JSON.
#[derive(Debug, Clone)]
pub struct FormattedExpression {
    expression: CompiledExpr,
    format: Option<String>,
    /// Used when the value turns out to be a timestamp.
    timestamps: TimestampFormatter,
    alignment: Option<Alignment>,
    provider: FormatProvider,
    secondary_text: Style,
    json: JsonValueFormatter,
}

impl FormattedExpression {
    pub fn new(
        expression: CompiledExpr,
        format: Option<String>,
        alignment: Option<Alignment>,
        provider: FormatProvider,
        theme: &TemplateTheme,
    ) -> Self {
        let timestamps = format
            .as_deref()
            .map_or_else(TimestampFormatter::default, TimestampFormatter::new);
        Self {
            expression,
            format,
            timestamps,
            alignment,
            provider,
            secondary_text: theme.style(ThemeStyle::SecondaryText),
            json: JsonValueFormatter::new(theme),
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let start = out.position();
        let mut invisible = 0;

        let value = self.expression.evaluate(ctx);
        match value.as_value() {
            None => {}
            Some(Value::Scalar(scalar)) => {
                self.secondary_text.set(out, &mut invisible);
                match scalar {
                    Scalar::DateTime(timestamp) => write_timestamp(&self.timestamps, timestamp, out),
                    _ => write_scalar(out, scalar, self.format.as_deref(), &self.provider),
                }
                self.secondary_text.reset(out);
            }
            Some(structured) => invisible += self.json.format(structured, out),
        }

        if let Some(alignment) = self.alignment {
            padding::apply(out, start, invisible, alignment);
        }
    }
}

/// Format a timestamp directly into the output buffer.
///
/// The formatter's own bound is reserved first; if that is not enough the
/// write is retried once with a larger window.
pub fn write_timestamp(
    formatter: &TimestampFormatter,
    timestamp: &DateTime<FixedOffset>,
    out: &mut Utf8Writer<'_>,
) {
    let reserved = formatter.max_len();
    out.reserve(reserved);
    if let Some(written) = formatter.try_format(timestamp, out.span()) {
        out.advance(written);
        return;
    }

    let reserved = RETRY_WINDOW.max(reserved * 2);
    out.reserve(reserved);
    match formatter.try_format(timestamp, out.span()) {
        Some(written) => out.advance(written),
        None => buffer_exhausted("a timestamp", reserved),
    }
}

// ============================================================================
// Event tokens
// ============================================================================

/// `{@l}`: the level moniker, from a table built at compile time.
#[derive(Debug, Clone)]
pub struct LevelToken {
    monikers: [Box<[u8]>; 6],
    styles: [Style; 6],
    alignment: Option<Alignment>,
}

impl LevelToken {
    pub fn new(format: Option<&str>, alignment: Option<Alignment>, theme: &TemplateTheme) -> Self {
        Self {
            monikers: level_monikers(format),
            styles: Level::ALL.map(|level| theme.style(ThemeStyle::for_level(level))),
            alignment,
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let ordinal = ctx.event.level.ordinal();
        let style = &self.styles[ordinal];
        let mut invisible = 0;
        style.set(out, &mut invisible);
        padding::apply_ascii(out, &self.monikers[ordinal], self.alignment);
        style.reset(out);
    }
}

/// `{@t}`.
#[derive(Debug, Clone)]
pub struct TimestampToken {
    formatter: TimestampFormatter,
    alignment: Option<Alignment>,
    style: Style,
}

impl TimestampToken {
    pub fn new(format: Option<&str>, alignment: Option<Alignment>, theme: &TemplateTheme) -> Self {
        Self {
            formatter: format.map_or_else(TimestampFormatter::default, TimestampFormatter::new),
            alignment,
            style: theme.style(ThemeStyle::SecondaryText),
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let start = out.position();
        let mut invisible = 0;
        self.style.set(out, &mut invisible);
        write_timestamp(&self.formatter, &ctx.event.timestamp, out);
        self.style.reset(out);
        if let Some(alignment) = self.alignment {
            padding::apply(out, start, invisible, alignment);
        }
    }
}

/// `{@m}`: the event's message template rendered with its properties.
#[derive(Debug, Clone)]
pub struct MessageToken {
    renderer: MessageRenderer,
    alignment: Option<Alignment>,
}

impl MessageToken {
    pub fn new(alignment: Option<Alignment>, provider: FormatProvider, theme: &TemplateTheme) -> Self {
        Self {
            renderer: MessageRenderer::new(theme, provider),
            alignment,
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let template = MessageTemplate::cached(&ctx.event.message_template);
        let start = out.position();
        let invisible = self.renderer.render(&template, &ctx.event.properties, out);
        if let Some(alignment) = self.alignment {
            padding::apply(out, start, invisible, alignment);
        }
    }
}

/// `{@x}`: the exception text, one styled line at a time. Never aligned.
#[derive(Debug, Clone)]
pub struct ExceptionToken {
    text: Style,
    secondary_text: Style,
}

impl ExceptionToken {
    pub fn new(theme: &TemplateTheme) -> Self {
        Self {
            text: theme.style(ThemeStyle::Text),
            secondary_text: theme.style(ThemeStyle::SecondaryText),
        }
    }

    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let Some(exception) = ctx.event.exception.as_deref() else {
            return;
        };
        for line in exception.lines() {
            let style = if line.starts_with(STACK_FRAME_PREFIX) {
                &self.secondary_text
            } else {
                &self.text
            };
            let mut invisible = 0;
            style.set(out, &mut invisible);
            out.write_text(line);
            style.reset(out);
            out.write_byte(b'\n');
        }
    }
}

// ============================================================================
// Directives
// ============================================================================

/// `{#if}` with its `{#else if}` chain and `{#else}`.
#[derive(Debug, Clone)]
pub struct Conditional {
    pub branches: Vec<(CompiledExpr, CompiledNode)>,
    pub otherwise: Option<Box<CompiledNode>>,
}

impl Conditional {
    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        for (condition, body) in &self.branches {
            if condition.evaluate(ctx).is_true() {
                body.evaluate(ctx, out);
                return;
            }
        }
        if let Some(otherwise) = &self.otherwise {
            otherwise.evaluate(ctx, out);
        }
    }
}

/// `{#each}`.
///
/// Sequences bind (element, index), structures (name, value) and
/// dictionaries (key, value). The delimiter is rendered between
/// iterations, in the enclosing scope.
#[derive(Debug, Clone)]
pub struct Repetition {
    pub collection: CompiledExpr,
    /// One or two slots, in declaration order.
    pub slots: Vec<usize>,
    pub body: Box<CompiledNode>,
    pub delimiter: Option<Box<CompiledNode>>,
    pub alternative: Option<Box<CompiledNode>>,
}

impl Repetition {
    fn evaluate(&self, ctx: &EvalContext<'_>, out: &mut Utf8Writer<'_>) {
        let collection = self.collection.evaluate(ctx);
        let iterations = match collection.as_value() {
            Some(Value::Sequence(items)) => {
                for (index, item) in items.iter().enumerate() {
                    self.iteration(
                        ctx,
                        index == 0,
                        Evaluated::borrowed(item),
                        Evaluated::scalar(Scalar::UInt(index as u64)),
                        out,
                    );
                }
                items.len()
            }
            Some(Value::Structure(structure)) => {
                for (i, property) in structure.properties.iter().enumerate() {
                    self.iteration(
                        ctx,
                        i == 0,
                        Evaluated::string(property.name.as_str()),
                        Evaluated::borrowed(&property.value),
                        out,
                    );
                }
                structure.properties.len()
            }
            Some(Value::Dictionary(entries)) => {
                for (i, (key, value)) in entries.iter().enumerate() {
                    self.iteration(
                        ctx,
                        i == 0,
                        Evaluated::scalar(key.clone()),
                        Evaluated::borrowed(value),
                        out,
                    );
                }
                entries.len()
            }
            _ => 0,
        };

        if iterations == 0 {
            if let Some(alternative) = &self.alternative {
                alternative.evaluate(ctx, out);
            }
        }
    }

    fn iteration(
        &self,
        ctx: &EvalContext<'_>,
        first: bool,
        key_or_element: Evaluated<'_>,
        value_or_index: Evaluated<'_>,
        out: &mut Utf8Writer<'_>,
    ) {
        if !first {
            if let Some(delimiter) = &self.delimiter {
                delimiter.evaluate(ctx, out);
            }
        }

        let outer = Local {
            slot: self.slots[0],
            value: key_or_element,
            parent: ctx.locals,
        };
        let inner;
        let scope = match self.slots.get(1) {
            Some(&slot) => {
                inner = Local {
                    slot,
                    value: value_or_index,
                    parent: Some(&outer),
                };
                EvalContext {
                    event: ctx.event,
                    locals: Some(&inner),
                }
            }
            None => EvalContext {
                event: ctx.event,
                locals: Some(&outer),
            },
        };
        self.body.evaluate(&scope, out);
    }
}
