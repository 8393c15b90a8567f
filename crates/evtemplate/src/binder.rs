/*
 * binder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Directive nesting and local-name binding.
//!
//! Takes the flat element list from the parser, checks that `#if`/`#each`
//! blocks are balanced, and builds the nested [`BoundTemplate`]. Each
//! `#each` iteration name receives a slot; property references to an
//! in-scope name are rewritten to [`Expr::Local`] so that evaluation never
//! looks names up by string.

use crate::ast::{
    ArrayElement, BoundTemplate, Directive, DirectiveKind, EachBlock, Expr, IfBlock,
    ObjectMember, ParsedTemplate, Placeholder, TemplateElement, TemplateNode,
};
use crate::error::{TemplateError, TemplateResult};

/// Nest directives and resolve local names.
pub fn bind(parsed: ParsedTemplate) -> TemplateResult<BoundTemplate> {
    let mut binder = Binder::default();
    for element in parsed.elements {
        binder.element(element)?;
    }
    binder.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EachSection {
    Body,
    Delimiter,
    Alternative,
}

enum Frame {
    If {
        block: IfBlock,
        /// Condition of the branch currently being filled, or `None` once
        /// inside `#else`.
        condition: Option<Expr>,
    },
    Each {
        block: EachBlock,
        section: EachSection,
        /// Number of names this block pushed onto the scope stack.
        scoped: usize,
    },
}

#[derive(Default)]
struct Binder {
    frames: Vec<Frame>,
    /// Collected nodes for the innermost open section.
    sections: Vec<Vec<TemplateNode>>,
    root: Vec<TemplateNode>,
    /// Active iteration names, innermost last.
    scope: Vec<(String, usize)>,
    next_slot: usize,
}

impl Binder {
    fn current(&mut self) -> &mut Vec<TemplateNode> {
        match self.sections.last_mut() {
            Some(section) => section,
            None => &mut self.root,
        }
    }

    fn element(&mut self, element: TemplateElement) -> TemplateResult<()> {
        match element {
            TemplateElement::Text(text) => {
                self.current().push(TemplateNode::Text(text));
            }
            TemplateElement::Placeholder(placeholder) => {
                let expression = self.bind_expr(placeholder.expression);
                self.current().push(TemplateNode::Placeholder(Placeholder {
                    expression,
                    ..placeholder
                }));
            }
            TemplateElement::Directive(directive) => self.directive(directive)?,
        }
        Ok(())
    }

    fn directive(&mut self, directive: Directive) -> TemplateResult<()> {
        let Directive { kind, position } = directive;
        match kind {
            DirectiveKind::If(condition) => {
                let condition = self.bind_expr(condition);
                self.frames.push(Frame::If {
                    block: IfBlock {
                        branches: Vec::new(),
                        else_branch: None,
                        position,
                    },
                    condition: Some(condition),
                });
                self.sections.push(Vec::new());
            }

            DirectiveKind::ElseIf(condition) => {
                let condition = self.bind_expr(condition);
                let body = self.sections.pop().unwrap_or_default();
                match self.frames.last_mut() {
                    Some(Frame::If {
                        block,
                        condition: current @ Some(_),
                    }) => {
                        if let Some(previous) = current.replace(condition) {
                            block.branches.push((previous, body));
                        }
                        self.sections.push(Vec::new());
                    }
                    Some(Frame::If { condition: None, .. }) => {
                        return Err(TemplateError::bind(
                            "`#else if` cannot follow `#else`",
                            position,
                        ));
                    }
                    _ => {
                        return Err(TemplateError::bind(
                            "`#else if` is only valid inside `#if`",
                            position,
                        ));
                    }
                }
            }

            DirectiveKind::Else => match self.frames.last_mut() {
                Some(Frame::If {
                    block,
                    condition: current @ Some(_),
                }) => {
                    let body = self.sections.pop().unwrap_or_default();
                    if let Some(previous) = current.take() {
                        block.branches.push((previous, body));
                    }
                    self.sections.push(Vec::new());
                }
                Some(Frame::Each {
                    block,
                    section: section @ (EachSection::Body | EachSection::Delimiter),
                    scoped,
                }) => {
                    let nodes = self.sections.pop().unwrap_or_default();
                    match section {
                        EachSection::Body => block.body = nodes,
                        _ => block.delimiter = Some(nodes),
                    }
                    *section = EachSection::Alternative;
                    // Iteration names are not visible in the alternative.
                    let scoped = std::mem::take(scoped);
                    self.scope.truncate(self.scope.len() - scoped);
                    self.sections.push(Vec::new());
                }
                Some(_) => {
                    return Err(TemplateError::bind("duplicate `#else`", position));
                }
                None => {
                    return Err(TemplateError::bind(
                        "`#else` is only valid inside `#if` or `#each`",
                        position,
                    ));
                }
            },

            DirectiveKind::Each { names, collection } => {
                // The collection is evaluated outside the loop's own scope.
                let collection = self.bind_expr(collection);
                if names.len() == 2 && names[0] == names[1] {
                    return Err(TemplateError::bind(
                        format!("`{}` is declared twice in the same `#each`", names[0]),
                        position,
                    ));
                }
                let slots: Vec<usize> = names
                    .iter()
                    .map(|name| {
                        let slot = self.next_slot;
                        self.next_slot += 1;
                        self.scope.push((name.clone(), slot));
                        slot
                    })
                    .collect();
                let slots_len = slots.len();
                self.frames.push(Frame::Each {
                    block: EachBlock {
                        names,
                        slots,
                        collection,
                        body: Vec::new(),
                        delimiter: None,
                        alternative: None,
                        position,
                    },
                    section: EachSection::Body,
                    scoped: slots_len,
                });
                self.sections.push(Vec::new());
            }

            DirectiveKind::Delimit => match self.frames.last_mut() {
                Some(Frame::Each {
                    block,
                    section: section @ EachSection::Body,
                    ..
                }) => {
                    block.body = self.sections.pop().unwrap_or_default();
                    *section = EachSection::Delimiter;
                    self.sections.push(Vec::new());
                }
                Some(Frame::Each { .. }) => {
                    return Err(TemplateError::bind(
                        "`#delimit` must appear once, before any `#else`",
                        position,
                    ));
                }
                _ => {
                    return Err(TemplateError::bind(
                        "`#delimit` is only valid inside `#each`",
                        position,
                    ));
                }
            },

            DirectiveKind::End => {
                let nodes = self.sections.pop().unwrap_or_default();
                let node = match self.frames.pop() {
                    Some(Frame::If {
                        mut block,
                        condition,
                    }) => {
                        match condition {
                            Some(condition) => block.branches.push((condition, nodes)),
                            None => block.else_branch = Some(nodes),
                        }
                        TemplateNode::If(block)
                    }
                    Some(Frame::Each {
                        mut block,
                        section,
                        scoped,
                    }) => {
                        match section {
                            EachSection::Body => block.body = nodes,
                            EachSection::Delimiter => block.delimiter = Some(nodes),
                            EachSection::Alternative => block.alternative = Some(nodes),
                        }
                        self.scope.truncate(self.scope.len() - scoped);
                        TemplateNode::Each(block)
                    }
                    None => {
                        return Err(TemplateError::bind(
                            "`#end` without a matching `#if` or `#each`",
                            position,
                        ));
                    }
                };
                self.current().push(node);
            }
        }
        Ok(())
    }

    fn finish(self) -> TemplateResult<BoundTemplate> {
        if let Some(frame) = self.frames.last() {
            let (keyword, position) = match frame {
                Frame::If { block, .. } => ("#if", block.position),
                Frame::Each { block, .. } => ("#each", block.position),
            };
            return Err(TemplateError::bind(
                format!("`{}` is missing its `#end`", keyword),
                position,
            ));
        }
        Ok(BoundTemplate {
            nodes: self.root,
            slot_count: self.next_slot,
        })
    }

    fn lookup(&self, name: &str) -> Option<usize> {
        self.scope
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| *slot)
    }

    fn bind_expr(&self, expr: Expr) -> Expr {
        if self.scope.is_empty() {
            return expr;
        }
        self.rewrite(expr)
    }

    fn rewrite(&self, expr: Expr) -> Expr {
        let boxed = |e: Box<Expr>| Box::new(self.rewrite(*e));
        match expr {
            Expr::Property(name) => match self.lookup(&name) {
                Some(slot) => Expr::Local(slot),
                None => Expr::Property(name),
            },
            Expr::Constant(_) | Expr::Builtin(_) | Expr::Local(_) => expr,
            Expr::Member { target, name } => Expr::Member {
                target: boxed(target),
                name,
            },
            Expr::Indexer { target, index } => Expr::Indexer {
                target: boxed(target),
                index: boxed(index),
            },
            Expr::Wildcard { target, kind } => Expr::Wildcard {
                target: boxed(target),
                kind,
            },
            Expr::Call {
                name,
                args,
                case_insensitive,
                position,
            } => Expr::Call {
                name,
                args: args.into_iter().map(|a| self.rewrite(a)).collect(),
                case_insensitive,
                position,
            },
            Expr::Unary { op, operand } => Expr::Unary {
                op,
                operand: boxed(operand),
            },
            Expr::Binary {
                op,
                left,
                right,
                case_insensitive,
                position,
            } => Expr::Binary {
                op,
                left: boxed(left),
                right: boxed(right),
                case_insensitive,
                position,
            },
            Expr::Conditional {
                condition,
                consequent,
                alternative,
            } => Expr::Conditional {
                condition: boxed(condition),
                consequent: boxed(consequent),
                alternative: alternative.map(boxed),
            },
            Expr::Array(elements) => Expr::Array(
                elements
                    .into_iter()
                    .map(|element| match element {
                        ArrayElement::Item(e) => ArrayElement::Item(self.rewrite(e)),
                        ArrayElement::Spread(e) => ArrayElement::Spread(self.rewrite(e)),
                    })
                    .collect(),
            ),
            Expr::Object(members) => Expr::Object(
                members
                    .into_iter()
                    .map(|member| match member {
                        ObjectMember::Property { name, value } => ObjectMember::Property {
                            name,
                            value: self.rewrite(value),
                        },
                        ObjectMember::Spread(e) => ObjectMember::Spread(self.rewrite(e)),
                    })
                    .collect(),
            ),
        }
    }
}
