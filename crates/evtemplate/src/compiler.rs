/*
 * compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Lowering of bound templates to [`CompiledNode`] trees.
//!
//! Styles, level tables, timestamp formatters and function targets are all
//! fixed here, once per template.

use std::collections::HashSet;

use crate::ast::{BoundTemplate, BuiltinProperty, EachBlock, Expr, IfBlock, Placeholder, TemplateNode};
use crate::error::TemplateResult;
use crate::evaluator::{
    CompiledNode, Conditional, ExceptionToken, FormattedExpression, LevelToken, LiteralText,
    MessageToken, Repetition, TimestampToken,
};
use crate::expression::{ExpressionCompiler, referenced_properties};
use crate::format::FormatProvider;
use crate::resolver::NameResolver;
use crate::theme::TemplateTheme;

/// Compile a bound template.
pub fn compile(
    bound: &BoundTemplate,
    theme: &TemplateTheme,
    provider: &FormatProvider,
    resolver: Option<&dyn NameResolver>,
) -> TemplateResult<CompiledNode> {
    let mut referenced = HashSet::new();
    collect_referenced(&bound.nodes, &mut referenced);

    let mut compiler = Compiler {
        expressions: ExpressionCompiler::new(resolver, bound.slot_count, referenced),
        theme,
        provider,
    };
    let root = compiler.nodes(&bound.nodes)?;

    tracing::debug!(
        nodes = root.node_count(),
        slots = compiler.expressions.slot_count(),
        "compiled template"
    );
    Ok(root)
}

struct Compiler<'c> {
    expressions: ExpressionCompiler<'c>,
    theme: &'c TemplateTheme,
    provider: &'c FormatProvider,
}

impl Compiler<'_> {
    fn nodes(&mut self, nodes: &[TemplateNode]) -> TemplateResult<CompiledNode> {
        let mut compiled = nodes
            .iter()
            .map(|node| self.node(node))
            .collect::<TemplateResult<Vec<_>>>()?;
        Ok(if compiled.len() == 1 {
            compiled.swap_remove(0)
        } else {
            CompiledNode::Sequence(compiled)
        })
    }

    fn node(&mut self, node: &TemplateNode) -> TemplateResult<CompiledNode> {
        match node {
            TemplateNode::Text(text) => Ok(CompiledNode::Literal(LiteralText::new(text, self.theme))),
            TemplateNode::Placeholder(placeholder) => self.placeholder(placeholder),
            TemplateNode::If(block) => self.conditional(block),
            TemplateNode::Each(block) => self.repetition(block),
        }
    }

    fn placeholder(&mut self, placeholder: &Placeholder) -> TemplateResult<CompiledNode> {
        let format = placeholder.format.as_deref();
        let alignment = placeholder.alignment;

        if let Expr::Builtin(property) = &placeholder.expression {
            match property {
                BuiltinProperty::Timestamp => {
                    return Ok(CompiledNode::Timestamp(TimestampToken::new(format, alignment, self.theme)));
                }
                BuiltinProperty::Level => {
                    return Ok(CompiledNode::Level(LevelToken::new(format, alignment, self.theme)));
                }
                BuiltinProperty::Message => {
                    return Ok(CompiledNode::Message(MessageToken::new(
                        alignment,
                        self.provider.clone(),
                        self.theme,
                    )));
                }
                BuiltinProperty::Exception => {
                    return Ok(CompiledNode::Exception(ExceptionToken::new(self.theme)));
                }
                _ => {}
            }
        }

        let expression = self.expressions.compile(&placeholder.expression)?;
        Ok(CompiledNode::FormattedExpression(FormattedExpression::new(
            expression,
            placeholder.format.clone(),
            alignment,
            self.provider.clone(),
            self.theme,
        )))
    }

    fn conditional(&mut self, block: &IfBlock) -> TemplateResult<CompiledNode> {
        let branches = block
            .branches
            .iter()
            .map(|(condition, body)| Ok((self.expressions.compile(condition)?, self.nodes(body)?)))
            .collect::<TemplateResult<Vec<_>>>()?;
        let otherwise = match &block.else_branch {
            Some(body) => Some(Box::new(self.nodes(body)?)),
            None => None,
        };
        Ok(CompiledNode::Conditional(Conditional { branches, otherwise }))
    }

    fn repetition(&mut self, block: &EachBlock) -> TemplateResult<CompiledNode> {
        let collection = self.expressions.compile(&block.collection)?;
        let body = Box::new(self.nodes(&block.body)?);
        let delimiter = match &block.delimiter {
            Some(nodes) => Some(Box::new(self.nodes(nodes)?)),
            None => None,
        };
        let alternative = match &block.alternative {
            Some(nodes) => Some(Box::new(self.nodes(nodes)?)),
            None => None,
        };
        Ok(CompiledNode::Repetition(Repetition {
            collection,
            slots: block.slots.clone(),
            body,
            delimiter,
            alternative,
        }))
    }
}

/// Every property named anywhere in the template; `rest()` leaves these out.
fn collect_referenced(nodes: &[TemplateNode], names: &mut HashSet<String>) {
    for node in nodes {
        match node {
            TemplateNode::Text(_) => {}
            TemplateNode::Placeholder(placeholder) => {
                referenced_properties(&placeholder.expression, names);
            }
            TemplateNode::If(block) => {
                for (condition, body) in &block.branches {
                    referenced_properties(condition, names);
                    collect_referenced(body, names);
                }
                if let Some(body) = &block.else_branch {
                    collect_referenced(body, names);
                }
            }
            TemplateNode::Each(block) => {
                referenced_properties(&block.collection, names);
                collect_referenced(&block.body, names);
                for section in [&block.delimiter, &block.alternative].into_iter().flatten() {
                    collect_referenced(section, names);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind;
    use crate::parser::parse;

    fn compiled(source: &str) -> CompiledNode {
        let bound = bind(parse(source).unwrap()).unwrap();
        compile(&bound, &TemplateTheme::none(), &FormatProvider::invariant(), None).unwrap()
    }

    #[test]
    fn test_special_placeholders_become_tokens() {
        let CompiledNode::Sequence(nodes) = compiled("{@t} {@l} {@m} {@x}") else {
            panic!("expected a sequence");
        };
        assert!(matches!(nodes[0], CompiledNode::Timestamp(_)));
        assert!(matches!(nodes[2], CompiledNode::Level(_)));
        assert!(matches!(nodes[4], CompiledNode::Message(_)));
        assert!(matches!(nodes[6], CompiledNode::Exception(_)));
    }

    #[test]
    fn test_other_builtins_are_expressions() {
        assert!(matches!(compiled("{@mt}"), CompiledNode::FormattedExpression(_)));
        assert!(matches!(compiled("{@l = 'Warning'}"), CompiledNode::FormattedExpression(_)));
    }

    #[test]
    fn test_directives_compile() {
        assert!(matches!(
            compiled("{#if A}a{#else}b{#end}"),
            CompiledNode::Conditional(_)
        ));
        let CompiledNode::Repetition(repetition) = compiled("{#each k, v in @p}{k}{#delimit},{#end}") else {
            panic!("expected a repetition");
        };
        assert_eq!(repetition.slots, vec![0, 1]);
        assert!(repetition.delimiter.is_some());
    }

    #[test]
    fn test_referenced_names_cover_all_sections() {
        let bound = bind(parse("{#if A}{B}{#else}{@p.C}{#end}{#each x in D}{x.E}{#end}").unwrap()).unwrap();
        let mut names = HashSet::new();
        collect_referenced(&bound.nodes, &mut names);
        let mut names: Vec<_> = names.into_iter().collect();
        names.sort();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
    }
}
