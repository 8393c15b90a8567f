/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Function name resolution.
//!
//! This module provides the [`NameResolver`] trait through which callers
//! supply their own functions, an in-memory implementation, and the
//! compile-time lookup that merges caller functions with the built-ins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{TemplateError, TemplateResult};
use crate::eval_context::Evaluated;
use crate::functions::{self, BuiltinFunction};

/// A caller-supplied function.
///
/// Implemented for plain functions of the right shape:
///
/// ```ignore
/// fn shout<'a>(args: Vec<Evaluated<'a>>) -> Evaluated<'a> {
///     args[0].as_str().map_or(Evaluated::Undefined, |s| Evaluated::string(s.to_uppercase()))
/// }
/// ```
pub trait TemplateFunction: Send + Sync {
    fn call<'a>(&self, args: Vec<Evaluated<'a>>) -> Evaluated<'a>;
}

impl<F> TemplateFunction for F
where
    F: for<'a> Fn(Vec<Evaluated<'a>>) -> Evaluated<'a> + Send + Sync,
{
    fn call<'a>(&self, args: Vec<Evaluated<'a>>) -> Evaluated<'a> {
        self(args)
    }
}

/// Trait for looking up caller-supplied functions.
///
/// Resolution happens once, while a template is compiled.
pub trait NameResolver: Send + Sync {
    /// Find a function accepting `arity` arguments, or `None`.
    fn resolve_function(&self, name: &str, arity: usize) -> Option<Arc<dyn TemplateFunction>>;
}

struct Registered {
    arity: Option<usize>,
    function: Arc<dyn TemplateFunction>,
}

/// Resolver backed by an in-memory table. Names match case-insensitively.
#[derive(Default)]
pub struct StaticNameResolver {
    functions: HashMap<String, Vec<Registered>>,
}

impl StaticNameResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function accepting any number of arguments.
    pub fn add(&mut self, name: &str, function: impl TemplateFunction + 'static) -> &mut Self {
        self.register(name, None, Arc::new(function))
    }

    /// Register a function for exactly `arity` arguments.
    pub fn add_with_arity(
        &mut self,
        name: &str,
        arity: usize,
        function: impl TemplateFunction + 'static,
    ) -> &mut Self {
        self.register(name, Some(arity), Arc::new(function))
    }

    fn register(
        &mut self,
        name: &str,
        arity: Option<usize>,
        function: Arc<dyn TemplateFunction>,
    ) -> &mut Self {
        self.functions
            .entry(name.to_lowercase())
            .or_default()
            .push(Registered { arity, function });
        self
    }
}

impl NameResolver for StaticNameResolver {
    fn resolve_function(&self, name: &str, arity: usize) -> Option<Arc<dyn TemplateFunction>> {
        let candidates = self.functions.get(&name.to_lowercase())?;
        candidates
            .iter()
            .find(|r| r.arity == Some(arity))
            .or_else(|| candidates.iter().find(|r| r.arity.is_none()))
            .map(|r| Arc::clone(&r.function))
    }
}

impl fmt::Debug for StaticNameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticNameResolver")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A function call target fixed at compile time.
#[derive(Clone)]
pub enum ResolvedFunction {
    Builtin(&'static BuiltinFunction),
    Custom {
        name: String,
        function: Arc<dyn TemplateFunction>,
    },
}

impl ResolvedFunction {
    pub fn call<'a>(&self, args: Vec<Evaluated<'a>>, case_insensitive: bool) -> Evaluated<'a> {
        match self {
            ResolvedFunction::Builtin(builtin) => (builtin.call)(args, case_insensitive),
            ResolvedFunction::Custom { function, .. } => function.call(args),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ResolvedFunction::Builtin(builtin) => builtin.name,
            ResolvedFunction::Custom { name, .. } => name,
        }
    }
}

impl fmt::Debug for ResolvedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedFunction::Builtin(builtin) => write!(f, "Builtin({})", builtin.name),
            ResolvedFunction::Custom { name, .. } => write!(f, "Custom({})", name),
        }
    }
}

/// Resolve a call to exactly one implementation.
///
/// A caller function that matches a built-in of the same arity is
/// ambiguous and rejected, as is `ci` on a function that ignores case.
pub fn resolve_function(
    name: &str,
    arity: usize,
    case_insensitive: bool,
    position: usize,
    resolver: Option<&dyn NameResolver>,
) -> TemplateResult<ResolvedFunction> {
    let builtin = functions::builtin(name);
    let matching_builtin = builtin.filter(|b| b.accepts(arity));
    let custom = resolver.and_then(|r| r.resolve_function(name, arity));

    let resolved = match (matching_builtin, custom) {
        (Some(builtin), Some(_)) => {
            return Err(TemplateError::resolution(
                name,
                arity,
                format!(
                    "`{}` with {} argument(s) is both a built-in and a caller-supplied function",
                    builtin.name, arity
                ),
                position,
            ));
        }
        (Some(builtin), None) => {
            if case_insensitive && !builtin.case_aware {
                return Err(TemplateError::resolution(
                    name,
                    arity,
                    format!("`{}` does not support the `ci` modifier", builtin.name),
                    position,
                ));
            }
            ResolvedFunction::Builtin(builtin)
        }
        (None, Some(function)) => {
            if case_insensitive {
                return Err(TemplateError::resolution(
                    name,
                    arity,
                    format!("`{}` does not support the `ci` modifier", name),
                    position,
                ));
            }
            ResolvedFunction::Custom {
                name: name.to_string(),
                function,
            }
        }
        (None, None) => {
            let message = match builtin {
                Some(builtin) if builtin.min_arity == builtin.max_arity => format!(
                    "`{}` expects {} argument(s), found {}",
                    builtin.name, builtin.min_arity, arity
                ),
                Some(builtin) => {
                    let (bound, limit) = if arity < builtin.min_arity {
                        ("at least", builtin.min_arity)
                    } else {
                        ("at most", builtin.max_arity)
                    };
                    format!(
                        "`{}` expects {} {} argument(s), found {}",
                        builtin.name, bound, limit, arity
                    )
                }
                None => format!("unknown function `{}`", name),
            };
            return Err(TemplateError::resolution(name, arity, message, position));
        }
    };

    tracing::trace!(name, arity, resolved = resolved.name(), "resolved function");
    Ok(resolved)
}
