/*
 * ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template and expression AST types.
//!
//! Parsing produces a flat [`ParsedTemplate`]: literal text, placeholders,
//! and directive markers in source order. Binding (see [`crate::binder`])
//! nests the directives into a [`BoundTemplate`] tree and rewrites
//! references to `#each` iteration names into [`Expr::Local`] slots.
//!
//! All positions are byte offsets into the template source.

use evtemplate_events::Scalar;

// ============================================================================
// Alignment
// ============================================================================

/// Which side of the rendered value receives padding spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentDirection {
    /// Value flush left, padding appended.
    Left,
    /// Value flush right, padding prepended.
    Right,
}

/// Minimum printable width for a rendered value.
///
/// Written as `,N` (right-aligned) or `,-N` (left-aligned). Values wider
/// than `width` are never truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub direction: AlignmentDirection,
    pub width: usize,
}

impl Alignment {
    pub fn left(width: usize) -> Self {
        Self {
            direction: AlignmentDirection::Left,
            width,
        }
    }

    pub fn right(width: usize) -> Self {
        Self {
            direction: AlignmentDirection::Right,
            width,
        }
    }

    /// Parse the text after the comma in `{expr,-10}`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (direction, digits) = match text.strip_prefix('-') {
            Some(rest) => (AlignmentDirection::Left, rest),
            None => (
                AlignmentDirection::Right,
                text.strip_prefix('+').unwrap_or(text),
            ),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let width = digits.parse().ok()?;
        Some(Self { direction, width })
    }
}

// ============================================================================
// Expressions
// ============================================================================

/// The `@`-prefixed built-in event properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinProperty {
    /// `@t`: event timestamp
    Timestamp,
    /// `@m`: rendered message
    Message,
    /// `@mt`: raw message template
    MessageTemplate,
    /// `@l`: level name
    Level,
    /// `@x`: exception text
    Exception,
    /// `@p`: all properties as a structure
    Properties,
    /// `@i`: event id computed from the message template
    EventId,
    /// `@r`: renderings of formatted message template tokens
    Renderings,
}

impl BuiltinProperty {
    /// Look up a built-in by its name without the `@` prefix.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "t" => BuiltinProperty::Timestamp,
            "m" => BuiltinProperty::Message,
            "mt" => BuiltinProperty::MessageTemplate,
            "l" => BuiltinProperty::Level,
            "x" => BuiltinProperty::Exception,
            "p" => BuiltinProperty::Properties,
            "i" => BuiltinProperty::EventId,
            "r" => BuiltinProperty::Renderings,
            _ => return None,
        })
    }

    /// The source spelling, including the `@`.
    pub fn token(self) -> &'static str {
        match self {
            BuiltinProperty::Timestamp => "@t",
            BuiltinProperty::Message => "@m",
            BuiltinProperty::MessageTemplate => "@mt",
            BuiltinProperty::Level => "@l",
            BuiltinProperty::Exception => "@x",
            BuiltinProperty::Properties => "@p",
            BuiltinProperty::EventId => "@i",
            BuiltinProperty::Renderings => "@r",
        }
    }
}

/// Wildcard indexers: `[?]` (any element) and `[*]` (all elements).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WildcardKind {
    Any,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Like,
    NotLike,
    In,
    NotIn,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

impl BinaryOp {
    /// Whether the `ci` modifier changes this operator's behavior.
    pub fn is_case_aware(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Like
                | BinaryOp::NotLike
                | BinaryOp::In
                | BinaryOp::NotIn
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Or => "or",
            BinaryOp::And => "and",
            BinaryOp::Equal => "=",
            BinaryOp::NotEqual => "<>",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Like => "like",
            BinaryOp::NotLike => "not like",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Power => "^",
        }
    }
}

/// An element of an array literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    Item(Expr),
    /// `..expr`: splice the elements of a sequence.
    Spread(Expr),
}

/// A member of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectMember {
    Property { name: String, value: Expr },
    /// `..expr`: splice the members of a structure.
    Spread(Expr),
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal scalar: number, string, boolean or `null`.
    Constant(Scalar),

    /// Event property reference by name.
    Property(String),

    /// Built-in event property such as `@t`.
    Builtin(BuiltinProperty),

    /// Reference to an `#each` iteration name or wildcard element, by slot.
    Local(usize),

    /// `target.name`
    Member { target: Box<Expr>, name: String },

    /// `target[index]`
    Indexer { target: Box<Expr>, index: Box<Expr> },

    /// `target[?]` or `target[*]`
    Wildcard { target: Box<Expr>, kind: WildcardKind },

    /// `name(args)`, optionally followed by `ci`.
    Call {
        name: String,
        args: Vec<Expr>,
        case_insensitive: bool,
        position: usize,
    },

    Unary { op: UnaryOp, operand: Box<Expr> },

    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        case_insensitive: bool,
        position: usize,
    },

    /// `if c then t else e`; a missing `else` evaluates to undefined.
    Conditional {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternative: Option<Box<Expr>>,
    },

    Array(Vec<ArrayElement>),

    Object(Vec<ObjectMember>),
}

impl Expr {
    /// Visit this expression and all of its sub-expressions, parents first.
    pub fn walk(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Constant(_) | Expr::Property(_) | Expr::Builtin(_) | Expr::Local(_) => {}
            Expr::Member { target, .. } | Expr::Wildcard { target, .. } => target.walk(f),
            Expr::Indexer { target, index } => {
                target.walk(f);
                index.walk(f);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.walk(f);
                }
            }
            Expr::Unary { operand, .. } => operand.walk(f),
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Conditional {
                condition,
                consequent,
                alternative,
            } => {
                condition.walk(f);
                consequent.walk(f);
                if let Some(alternative) = alternative {
                    alternative.walk(f);
                }
            }
            Expr::Array(elements) => {
                for element in elements {
                    match element {
                        ArrayElement::Item(e) | ArrayElement::Spread(e) => e.walk(f),
                    }
                }
            }
            Expr::Object(members) => {
                for member in members {
                    match member {
                        ObjectMember::Property { value, .. } => value.walk(f),
                        ObjectMember::Spread(e) => e.walk(f),
                    }
                }
            }
        }
    }
}

// ============================================================================
// Parsed (flat) template
// ============================================================================

/// A `{expr,alignment:format}` hole in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder {
    pub expression: Expr,
    pub format: Option<String>,
    pub alignment: Option<Alignment>,
    pub position: usize,
}

/// The kinds of `{#...}` directive.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveKind {
    If(Expr),
    ElseIf(Expr),
    Else,
    Each { names: Vec<String>, collection: Expr },
    Delimit,
    End,
}

impl DirectiveKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            DirectiveKind::If(_) => "#if",
            DirectiveKind::ElseIf(_) => "#else if",
            DirectiveKind::Else => "#else",
            DirectiveKind::Each { .. } => "#each",
            DirectiveKind::Delimit => "#delimit",
            DirectiveKind::End => "#end",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub kind: DirectiveKind,
    pub position: usize,
}

/// One element of the flat parse output.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateElement {
    /// Literal text with `{{`/`}}` escapes already collapsed.
    Text(String),
    Placeholder(Placeholder),
    Directive(Directive),
}

/// The flat output of [`crate::parser::parse`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTemplate {
    pub elements: Vec<TemplateElement>,
}

// ============================================================================
// Bound (nested) template
// ============================================================================

/// `{#if}` with any number of `{#else if}` branches and an optional `{#else}`.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBlock {
    pub branches: Vec<(Expr, Vec<TemplateNode>)>,
    pub else_branch: Option<Vec<TemplateNode>>,
    pub position: usize,
}

/// `{#each a, b in coll}` with optional `{#delimit}` and `{#else}` sections.
#[derive(Debug, Clone, PartialEq)]
pub struct EachBlock {
    /// One or two iteration names, in source order.
    pub names: Vec<String>,
    /// Local slot assigned to each name.
    pub slots: Vec<usize>,
    pub collection: Expr,
    pub body: Vec<TemplateNode>,
    /// Rendered between consecutive iterations.
    pub delimiter: Option<Vec<TemplateNode>>,
    /// Rendered when the collection yields no elements.
    pub alternative: Option<Vec<TemplateNode>>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateNode {
    Text(String),
    Placeholder(Placeholder),
    If(IfBlock),
    Each(EachBlock),
}

/// The output of [`crate::binder::bind`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundTemplate {
    pub nodes: Vec<TemplateNode>,
    /// Number of local slots allocated by `#each` names. Slots at or above
    /// this index are free for the compiler.
    pub slot_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_parse() {
        assert_eq!(Alignment::parse("10"), Some(Alignment::right(10)));
        assert_eq!(Alignment::parse("-7"), Some(Alignment::left(7)));
        assert_eq!(Alignment::parse("+3"), Some(Alignment::right(3)));
        assert_eq!(Alignment::parse("-"), None);
        assert_eq!(Alignment::parse("1x"), None);
        assert_eq!(Alignment::parse(""), None);
    }

    #[test]
    fn test_builtin_names_round_trip() {
        for name in ["t", "m", "mt", "l", "x", "p", "i", "r"] {
            let builtin = BuiltinProperty::from_name(name).unwrap();
            assert_eq!(builtin.token(), format!("@{}", name));
        }
        assert_eq!(BuiltinProperty::from_name("q"), None);
    }

    #[test]
    fn test_walk_visits_nested_expressions() {
        let expr = Expr::Binary {
            op: BinaryOp::Add,
            left: Box::new(Expr::Property("A".into())),
            right: Box::new(Expr::Member {
                target: Box::new(Expr::Property("B".into())),
                name: "C".into(),
            }),
            case_insensitive: false,
            position: 0,
        };
        let mut names = Vec::new();
        expr.walk(&mut |e| {
            if let Expr::Property(name) = e {
                names.push(name.clone());
            }
        });
        assert_eq!(names, vec!["A", "B"]);
    }
}
