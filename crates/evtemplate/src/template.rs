/*
 * template.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The public entry point: [`ExpressionTemplate`].

use std::fmt;
use std::sync::Arc;

use evtemplate_events::LogEvent;

use crate::binder::bind;
use crate::compiler::compile;
use crate::error::TemplateResult;
use crate::eval_context::EvalContext;
use crate::evaluator::CompiledNode;
use crate::format::FormatProvider;
use crate::parser::parse;
use crate::resolver::NameResolver;
use crate::theme::TemplateTheme;
use crate::writer::Utf8Writer;

/// Options applied when a template is compiled.
#[derive(Clone, Default)]
pub struct TemplateOptions {
    pub format_provider: Option<FormatProvider>,
    pub theme: Option<TemplateTheme>,
    pub name_resolver: Option<Arc<dyn NameResolver>>,
}

impl TemplateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format_provider(mut self, provider: FormatProvider) -> Self {
        self.format_provider = Some(provider);
        self
    }

    pub fn with_theme(mut self, theme: TemplateTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_name_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.name_resolver = Some(resolver);
        self
    }
}

impl fmt::Debug for TemplateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateOptions")
            .field("format_provider", &self.format_provider)
            .field("theme", &self.theme)
            .field("name_resolver", &self.name_resolver.as_ref().map(|_| "..."))
            .finish()
    }
}

/// A compiled output template.
///
/// Compilation parses, binds and resolves everything up front; formatting an
/// event then only walks the compiled tree. Instances are immutable and can
/// be shared between threads.
///
/// # Example
///
/// ```ignore
/// use evtemplate::ExpressionTemplate;
/// use evtemplate_events::{Level, LogEvent};
///
/// let template = ExpressionTemplate::new("[{@l:u3}] {@m}\n")?;
/// let event = LogEvent::now(Level::Information, "Hello, {Name}!").with_property("Name", "World");
/// assert_eq!(template.render_to_string(&event), "[INF] Hello, World!\n");
/// ```
#[derive(Debug, Clone)]
pub struct ExpressionTemplate {
    source: String,
    root: CompiledNode,
}

impl ExpressionTemplate {
    pub fn new(source: &str) -> TemplateResult<Self> {
        Self::with_options(source, &TemplateOptions::default())
    }

    pub fn with_options(source: &str, options: &TemplateOptions) -> TemplateResult<Self> {
        let bound = bind(parse(source)?)?;
        let theme = options.theme.clone().unwrap_or_default();
        let provider = options.format_provider.clone().unwrap_or_default();
        let root = compile(&bound, &theme, &provider, options.name_resolver.as_deref())?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Append the rendering of `event` to `output`.
    pub fn format(&self, event: &LogEvent, output: &mut Vec<u8>) {
        let mut out = Utf8Writer::new(output);
        self.root.evaluate(&EvalContext::new(event), &mut out);
        out.flush();
    }

    pub fn render_to_string(&self, event: &LogEvent) -> String {
        let mut output = Vec::with_capacity(self.source.len() * 2);
        self.format(event, &mut output);
        String::from_utf8_lossy(&output).into_owned()
    }
}
