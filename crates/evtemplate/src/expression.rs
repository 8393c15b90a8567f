/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Compiled expressions.
//!
//! [`ExpressionCompiler`] lowers parsed [`Expr`] trees into [`CompiledExpr`]
//! trees: function names are resolved, `@p.Name` is flattened to a property
//! lookup, and wildcard indexers are rewritten into comprehensions over
//! local slots. A compiled expression is immutable and evaluates against
//! any number of events.

use evtemplate_events::{LogEvent, Property, Scalar, Structure, Value};
use std::collections::HashSet;

use crate::ast::{ArrayElement, BinaryOp, BuiltinProperty, Expr, ObjectMember, UnaryOp, WildcardKind};
use crate::error::TemplateResult;
use crate::eval_context::{EvalContext, Evaluated, Local};
use crate::expression_parser::parse_expression;
use crate::functions;
use crate::message::{MessageRenderer, MessageTemplate, render_message};
use crate::operators;
use crate::resolver::{NameResolver, ResolvedFunction, resolve_function};

#[derive(Debug, Clone)]
pub enum CompiledArrayElement {
    Item(CompiledExpr),
    Spread(CompiledExpr),
}

#[derive(Debug, Clone)]
pub enum CompiledObjectMember {
    Property { name: String, value: CompiledExpr },
    Spread(CompiledExpr),
}

/// An expression ready for evaluation.
#[derive(Debug, Clone)]
pub enum CompiledExpr {
    Constant(Evaluated<'static>),
    Property(String),
    Builtin(BuiltinProperty),
    Local(usize),
    Member {
        target: Box<CompiledExpr>,
        name: String,
    },
    Index {
        target: Box<CompiledExpr>,
        index: Box<CompiledExpr>,
    },
    Call {
        function: ResolvedFunction,
        args: Vec<CompiledExpr>,
        case_insensitive: bool,
    },
    Unary {
        op: UnaryOp,
        operand: Box<CompiledExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
        case_insensitive: bool,
    },
    Conditional {
        condition: Box<CompiledExpr>,
        consequent: Box<CompiledExpr>,
        alternative: Option<Box<CompiledExpr>>,
    },
    Array(Vec<CompiledArrayElement>),
    Object(Vec<CompiledObjectMember>),
    /// Evaluate `body` once per element of `collection`, with the element
    /// bound to `slot`. `Any` is true if some evaluation is true, `All` if
    /// every evaluation is.
    Comprehension {
        kind: WildcardKind,
        collection: Box<CompiledExpr>,
        slot: usize,
        body: Box<CompiledExpr>,
    },
    /// `rest()`: properties not named by the message template nor in
    /// `excluded`.
    Rest { excluded: HashSet<String> },
}

impl CompiledExpr {
    pub fn evaluate<'a>(&'a self, ctx: &EvalContext<'a>) -> Evaluated<'a> {
        match self {
            CompiledExpr::Constant(value) => value.reborrow(),
            CompiledExpr::Property(name) => Evaluated::from_option(ctx.event.properties.get(name)),
            CompiledExpr::Builtin(property) => builtin_property(*property, ctx.event),
            CompiledExpr::Local(slot) => ctx.local(*slot),
            CompiledExpr::Member { target, name } => target.evaluate(ctx).project(|value| match value {
                Value::Structure(structure) => structure.get(name),
                _ => None,
            }),
            CompiledExpr::Index { target, index } => {
                let index = index.evaluate(ctx);
                functions::element_at(target.evaluate(ctx), &index)
            }
            CompiledExpr::Call {
                function,
                args,
                case_insensitive,
            } => {
                let args = args.iter().map(|arg| arg.evaluate(ctx)).collect();
                function.call(args, *case_insensitive)
            }
            CompiledExpr::Unary { op, operand } => operators::unary(*op, &operand.evaluate(ctx)),
            CompiledExpr::Binary {
                op: BinaryOp::And,
                left,
                right,
                ..
            } => Evaluated::bool(left.evaluate(ctx).is_true() && right.evaluate(ctx).is_true()),
            CompiledExpr::Binary {
                op: BinaryOp::Or,
                left,
                right,
                ..
            } => Evaluated::bool(left.evaluate(ctx).is_true() || right.evaluate(ctx).is_true()),
            CompiledExpr::Binary {
                op,
                left,
                right,
                case_insensitive,
            } => operators::binary(
                *op,
                &left.evaluate(ctx),
                &right.evaluate(ctx),
                *case_insensitive,
            ),
            CompiledExpr::Conditional {
                condition,
                consequent,
                alternative,
            } => {
                if condition.evaluate(ctx).is_true() {
                    consequent.evaluate(ctx)
                } else {
                    alternative
                        .as_ref()
                        .map_or(Evaluated::Undefined, |alt| alt.evaluate(ctx))
                }
            }
            CompiledExpr::Array(elements) => evaluate_array(elements, ctx),
            CompiledExpr::Object(members) => evaluate_object(members, ctx),
            CompiledExpr::Comprehension {
                kind,
                collection,
                slot,
                body,
            } => evaluate_comprehension(*kind, collection, *slot, body, ctx),
            CompiledExpr::Rest { excluded } => rest(excluded, ctx.event),
        }
    }
}

fn evaluate_array<'a>(elements: &'a [CompiledArrayElement], ctx: &EvalContext<'a>) -> Evaluated<'a> {
    let mut items = Vec::with_capacity(elements.len());
    for element in elements {
        match element {
            CompiledArrayElement::Item(expr) => items.extend(expr.evaluate(ctx).into_value()),
            CompiledArrayElement::Spread(expr) => {
                if let Some(Value::Sequence(spread)) = expr.evaluate(ctx).into_value() {
                    items.extend(spread);
                }
            }
        }
    }
    Evaluated::owned(Value::Sequence(items))
}

fn evaluate_object<'a>(members: &'a [CompiledObjectMember], ctx: &EvalContext<'a>) -> Evaluated<'a> {
    let mut properties: Vec<Property> = Vec::with_capacity(members.len());
    let mut set = |name: String, value: Value| {
        match properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => properties.push(Property::new(name, value)),
        }
    };
    for member in members {
        match member {
            CompiledObjectMember::Property { name, value } => {
                if let Some(value) = value.evaluate(ctx).into_value() {
                    set(name.clone(), value);
                }
            }
            CompiledObjectMember::Spread(expr) => match expr.evaluate(ctx).into_value() {
                Some(Value::Structure(structure)) => {
                    for property in structure.properties {
                        set(property.name, property.value);
                    }
                }
                Some(Value::Dictionary(entries)) => {
                    for (key, value) in entries {
                        if let Scalar::String(name) = key {
                            set(name, value);
                        }
                    }
                }
                _ => {}
            },
        }
    }
    Evaluated::owned(Value::Structure(Structure::new(properties)))
}

/// The elements a wildcard ranges over.
enum Elements<'v> {
    Sequence(std::slice::Iter<'v, Value>),
    Structure(std::slice::Iter<'v, Property>),
    Dictionary(std::slice::Iter<'v, (Scalar, Value)>),
}

impl<'v> Elements<'v> {
    fn of(value: &'v Value) -> Option<Self> {
        match value {
            Value::Sequence(items) => Some(Elements::Sequence(items.iter())),
            Value::Structure(structure) => Some(Elements::Structure(structure.properties.iter())),
            Value::Dictionary(entries) => Some(Elements::Dictionary(entries.iter())),
            Value::Scalar(_) => None,
        }
    }
}

impl<'v> Iterator for Elements<'v> {
    type Item = &'v Value;

    fn next(&mut self) -> Option<&'v Value> {
        match self {
            Elements::Sequence(items) => items.next(),
            Elements::Structure(properties) => properties.next().map(|p| &p.value),
            Elements::Dictionary(entries) => entries.next().map(|(_, v)| v),
        }
    }
}

fn evaluate_comprehension<'a>(
    kind: WildcardKind,
    collection: &'a CompiledExpr,
    slot: usize,
    body: &'a CompiledExpr,
    ctx: &EvalContext<'a>,
) -> Evaluated<'a> {
    let collection = collection.evaluate(ctx);
    let Some(elements) = collection.as_value().and_then(Elements::of) else {
        return Evaluated::Undefined;
    };

    for element in elements {
        let local = Local {
            slot,
            value: Evaluated::borrowed(element),
            parent: ctx.locals,
        };
        let inner = EvalContext {
            event: ctx.event,
            locals: Some(&local),
        };
        let matched = body.evaluate(&inner).is_true();
        match kind {
            WildcardKind::Any if matched => return Evaluated::bool(true),
            WildcardKind::All if !matched => return Evaluated::bool(false),
            _ => {}
        }
    }
    Evaluated::bool(kind == WildcardKind::All)
}

fn rest<'a>(excluded: &HashSet<String>, event: &'a LogEvent) -> Evaluated<'a> {
    let template = MessageTemplate::cached(&event.message_template);
    let in_message: HashSet<&str> = template.property_tokens().map(|t| t.name.as_str()).collect();
    let properties = event
        .properties
        .iter()
        .filter(|(name, _)| !excluded.contains(*name) && !in_message.contains(name.as_str()))
        .map(|(name, value)| Property::new(name.clone(), value.clone()))
        .collect();
    Evaluated::owned(Value::Structure(Structure::new(properties)))
}

/// Evaluate an `@`-property of `event`.
pub fn builtin_property(property: BuiltinProperty, event: &LogEvent) -> Evaluated<'_> {
    match property {
        BuiltinProperty::Timestamp => Evaluated::scalar(Scalar::DateTime(event.timestamp)),
        BuiltinProperty::Message => Evaluated::string(render_message(event)),
        BuiltinProperty::MessageTemplate => Evaluated::string(event.message_template.as_str()),
        BuiltinProperty::Level => Evaluated::string(event.level.name()),
        BuiltinProperty::Exception => event
            .exception
            .as_deref()
            .map_or(Evaluated::Undefined, Evaluated::string),
        BuiltinProperty::Properties => Evaluated::owned(Value::Structure(Structure::new(
            event
                .properties
                .iter()
                .map(|(name, value)| Property::new(name.clone(), value.clone()))
                .collect(),
        ))),
        BuiltinProperty::EventId => {
            Evaluated::scalar(Scalar::UInt(u64::from(event_id(&event.message_template))))
        }
        BuiltinProperty::Renderings => {
            let template = MessageTemplate::cached(&event.message_template);
            let renderings = MessageRenderer::plain().renderings(&template, &event.properties);
            if renderings.is_empty() {
                Evaluated::Undefined
            } else {
                Evaluated::owned(Value::Sequence(
                    renderings.into_iter().map(Value::from).collect(),
                ))
            }
        }
    }
}

/// Jenkins one-at-a-time hash of the message template's UTF-16 code units.
pub fn event_id(message_template: &str) -> u32 {
    let mut hash: u32 = 0;
    for unit in message_template.encode_utf16() {
        hash = hash.wrapping_add(u32::from(unit));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Lowers [`Expr`] trees to [`CompiledExpr`] trees.
pub struct ExpressionCompiler<'c> {
    resolver: Option<&'c dyn NameResolver>,
    /// Next free local slot for wildcard comprehensions.
    next_slot: usize,
    /// Property names `rest()` leaves out.
    referenced: HashSet<String>,
}

impl<'c> ExpressionCompiler<'c> {
    /// `first_free_slot` must be past every slot already bound by
    /// directives.
    pub fn new(
        resolver: Option<&'c dyn NameResolver>,
        first_free_slot: usize,
        referenced: HashSet<String>,
    ) -> Self {
        Self {
            resolver,
            next_slot: first_free_slot,
            referenced,
        }
    }

    /// Slots in use so far.
    pub fn slot_count(&self) -> usize {
        self.next_slot
    }

    pub fn compile(&mut self, expr: &Expr) -> TemplateResult<CompiledExpr> {
        Ok(match expr {
            Expr::Constant(Scalar::Null) => CompiledExpr::Constant(Evaluated::Null),
            Expr::Constant(scalar) => CompiledExpr::Constant(Evaluated::scalar(scalar.clone())),
            Expr::Property(name) => CompiledExpr::Property(name.clone()),
            Expr::Builtin(property) => CompiledExpr::Builtin(*property),
            Expr::Local(slot) => CompiledExpr::Local(*slot),

            Expr::Member { target, name } if **target == Expr::Builtin(BuiltinProperty::Properties) => {
                CompiledExpr::Property(name.clone())
            }
            Expr::Indexer { target, index } if **target == Expr::Builtin(BuiltinProperty::Properties) => {
                match &**index {
                    Expr::Constant(Scalar::String(name)) => CompiledExpr::Property(name.clone()),
                    _ => CompiledExpr::Index {
                        target: Box::new(self.compile(target)?),
                        index: Box::new(self.compile(index)?),
                    },
                }
            }
            Expr::Member { .. } | Expr::Indexer { .. } | Expr::Wildcard { .. } => {
                match self.split_wildcard(expr) {
                    Some((kind, collection, slot, element)) => {
                        self.comprehension(kind, &collection, slot, &element)?
                    }
                    None => self.compile_path(expr)?,
                }
            }

            Expr::Call { .. } | Expr::Unary { .. } | Expr::Binary { .. } => {
                match self.split_operand_wildcard(expr) {
                    Some((kind, collection, slot, body)) => {
                        self.comprehension(kind, &collection, slot, &body)?
                    }
                    None => self.compile_operation(expr)?,
                }
            }

            Expr::Conditional {
                condition,
                consequent,
                alternative,
            } => CompiledExpr::Conditional {
                condition: Box::new(self.compile(condition)?),
                consequent: Box::new(self.compile(consequent)?),
                alternative: match alternative {
                    Some(alternative) => Some(Box::new(self.compile(alternative)?)),
                    None => None,
                },
            },
            Expr::Array(elements) => CompiledExpr::Array(
                elements
                    .iter()
                    .map(|element| {
                        Ok(match element {
                            ArrayElement::Item(e) => CompiledArrayElement::Item(self.compile(e)?),
                            ArrayElement::Spread(e) => CompiledArrayElement::Spread(self.compile(e)?),
                        })
                    })
                    .collect::<TemplateResult<_>>()?,
            ),
            Expr::Object(members) => CompiledExpr::Object(
                members
                    .iter()
                    .map(|member| {
                        Ok(match member {
                            ObjectMember::Property { name, value } => CompiledObjectMember::Property {
                                name: name.clone(),
                                value: self.compile(value)?,
                            },
                            ObjectMember::Spread(e) => CompiledObjectMember::Spread(self.compile(e)?),
                        })
                    })
                    .collect::<TemplateResult<_>>()?,
            ),
        })
    }

    fn comprehension(
        &mut self,
        kind: WildcardKind,
        collection: &Expr,
        slot: usize,
        body: &Expr,
    ) -> TemplateResult<CompiledExpr> {
        Ok(CompiledExpr::Comprehension {
            kind,
            collection: Box::new(self.compile(collection)?),
            slot,
            body: Box::new(self.compile(body)?),
        })
    }

    /// Member and index chains without wildcards.
    fn compile_path(&mut self, expr: &Expr) -> TemplateResult<CompiledExpr> {
        Ok(match expr {
            Expr::Member { target, name } => CompiledExpr::Member {
                target: Box::new(self.compile(target)?),
                name: name.clone(),
            },
            Expr::Indexer { target, index } => CompiledExpr::Index {
                target: Box::new(self.compile(target)?),
                index: Box::new(self.compile(index)?),
            },
            other => self.compile(other)?,
        })
    }

    fn compile_operation(&mut self, expr: &Expr) -> TemplateResult<CompiledExpr> {
        Ok(match expr {
            Expr::Call {
                name,
                args,
                case_insensitive,
                position,
            } => {
                if args.is_empty() && !case_insensitive && name.eq_ignore_ascii_case("rest") {
                    return Ok(CompiledExpr::Rest {
                        excluded: self.referenced.clone(),
                    });
                }
                let function =
                    resolve_function(name, args.len(), *case_insensitive, *position, self.resolver)?;
                CompiledExpr::Call {
                    function,
                    args: args
                        .iter()
                        .map(|arg| self.compile(arg))
                        .collect::<TemplateResult<_>>()?,
                    case_insensitive: *case_insensitive,
                }
            }
            Expr::Unary { op, operand } => CompiledExpr::Unary {
                op: *op,
                operand: Box::new(self.compile(operand)?),
            },
            Expr::Binary {
                op,
                left,
                right,
                case_insensitive,
                ..
            } => CompiledExpr::Binary {
                op: *op,
                left: Box::new(self.compile(left)?),
                right: Box::new(self.compile(right)?),
                case_insensitive: *case_insensitive,
            },
            other => self.compile(other)?,
        })
    }

    /// If the member/index chain `expr` contains a wildcard, replace the
    /// innermost one with a fresh local and return `(kind, collection,
    /// slot, rewritten)`.
    fn split_wildcard(&mut self, expr: &Expr) -> Option<(WildcardKind, Expr, usize, Expr)> {
        let slot = self.next_slot;
        let (kind, collection, rewritten) = replace_innermost_wildcard(expr, slot)?;
        self.next_slot += 1;
        Some((kind, collection, slot, rewritten))
    }

    /// Like [`Self::split_wildcard`], for the first operand of a call or
    /// operator whose path contains a wildcard. The rewritten operation
    /// becomes the comprehension body.
    fn split_operand_wildcard(&mut self, expr: &Expr) -> Option<(WildcardKind, Expr, usize, Expr)> {
        let slot = self.next_slot;
        let found = match expr {
            Expr::Call {
                name,
                args,
                case_insensitive,
                position,
            } => args.iter().enumerate().find_map(|(i, arg)| {
                let (kind, collection, rewritten) = replace_innermost_wildcard(arg, slot)?;
                let mut args = args.clone();
                args[i] = rewritten;
                let body = Expr::Call {
                    name: name.clone(),
                    args,
                    case_insensitive: *case_insensitive,
                    position: *position,
                };
                Some((kind, collection, body))
            }),
            Expr::Unary { op, operand } => {
                replace_innermost_wildcard(operand, slot).map(|(kind, collection, rewritten)| {
                    let body = Expr::Unary {
                        op: *op,
                        operand: Box::new(rewritten),
                    };
                    (kind, collection, body)
                })
            }
            Expr::Binary {
                op,
                left,
                right,
                case_insensitive,
                position,
            } => {
                let rebuild = |left: Expr, right: Expr| Expr::Binary {
                    op: *op,
                    left: Box::new(left),
                    right: Box::new(right),
                    case_insensitive: *case_insensitive,
                    position: *position,
                };
                if let Some((kind, collection, rewritten)) = replace_innermost_wildcard(left, slot) {
                    Some((kind, collection, rebuild(rewritten, (**right).clone())))
                } else {
                    replace_innermost_wildcard(right, slot).map(|(kind, collection, rewritten)| {
                        (kind, collection, rebuild((**left).clone(), rewritten))
                    })
                }
            }
            _ => None,
        };
        let (kind, collection, body) = found?;
        self.next_slot += 1;
        Some((kind, collection, slot, body))
    }
}

/// Replace the wildcard nearest the root of the member/index chain's
/// target path, i.e. the first one applied, with `Local(slot)`.
fn replace_innermost_wildcard(expr: &Expr, slot: usize) -> Option<(WildcardKind, Expr, Expr)> {
    match expr {
        Expr::Wildcard { target, kind } => match replace_innermost_wildcard(target, slot) {
            Some((inner_kind, collection, rewritten)) => Some((
                inner_kind,
                collection,
                Expr::Wildcard {
                    target: Box::new(rewritten),
                    kind: *kind,
                },
            )),
            None => Some((*kind, (**target).clone(), Expr::Local(slot))),
        },
        Expr::Member { target, name } => {
            replace_innermost_wildcard(target, slot).map(|(kind, collection, rewritten)| {
                (
                    kind,
                    collection,
                    Expr::Member {
                        target: Box::new(rewritten),
                        name: name.clone(),
                    },
                )
            })
        }
        Expr::Indexer { target, index } => {
            replace_innermost_wildcard(target, slot).map(|(kind, collection, rewritten)| {
                (
                    kind,
                    collection,
                    Expr::Indexer {
                        target: Box::new(rewritten),
                        index: index.clone(),
                    },
                )
            })
        }
        _ => None,
    }
}

/// Names of event properties referenced directly by `expr`.
pub fn referenced_properties(expr: &Expr, names: &mut HashSet<String>) {
    expr.walk(&mut |e| match e {
        Expr::Property(name) => {
            names.insert(name.clone());
        }
        Expr::Member { target, name } if **target == Expr::Builtin(BuiltinProperty::Properties) => {
            names.insert(name.clone());
        }
        Expr::Indexer { target, index } if **target == Expr::Builtin(BuiltinProperty::Properties) => {
            if let Expr::Constant(Scalar::String(name)) = &**index {
                names.insert(name.clone());
            }
        }
        _ => {}
    });
}

/// A standalone compiled expression, evaluated against events.
///
/// ```ignore
/// let expr = Expression::compile("Items[?] like 'a%'")?;
/// assert!(expr.evaluate(&event).is_true());
/// ```
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    compiled: CompiledExpr,
}

impl Expression {
    pub fn compile(source: &str) -> TemplateResult<Self> {
        Self::compile_with_resolver(source, None)
    }

    pub fn compile_with_resolver(
        source: &str,
        resolver: Option<&dyn NameResolver>,
    ) -> TemplateResult<Self> {
        let expr = parse_expression(source)?;
        let mut referenced = HashSet::new();
        referenced_properties(&expr, &mut referenced);
        let compiled = ExpressionCompiler::new(resolver, 0, referenced).compile(&expr)?;
        Ok(Self {
            source: source.to_string(),
            compiled,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate<'a>(&'a self, event: &'a LogEvent) -> Evaluated<'a> {
        self.compiled.evaluate(&EvalContext::new(event))
    }

    /// Evaluate and convert to an owned value; `None` when undefined.
    pub fn evaluate_to_value(&self, event: &LogEvent) -> Option<Value> {
        self.evaluate(event).into_value()
    }
}
