//! Target program representation.
//!
//! The code generator lowers bracket trees into this statement/expression
//! tree. It is deliberately close to a conventional imperative language so
//! that it can be interpreted (see [`crate::interp`]), printed as readable
//! pseudo-source (see [`crate::pretty`]) or handed to another backend.

use std::rc::Rc;

use chrono::NaiveDateTime;
use makrell_foundation::Span;

/// A compiled unit: its program and the source text of every meta block it
/// ran, so importers can replay them.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledUnit {
    /// The generated program.
    pub program: Program,
    /// Source text of the meta blocks, in the order they ran.
    pub meta_sources: Vec<String>,
}

/// An ordered list of statements.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Program {
    /// Top-level statements.
    pub body: Vec<Stmt>,
}

/// A statement with its source span.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Stmt {
    /// Statement kind.
    pub kind: StmtKind,
    /// Span of the node the statement was generated from.
    pub span: Span,
}

/// A named function definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionDef {
    /// Function name.
    pub name: String,
    /// Parameter names.
    pub params: Vec<String>,
    /// Body statements.
    pub body: Vec<Stmt>,
    /// Whether calling the function yields a coroutine.
    pub is_async: bool,
}

/// One `catch` clause of a `try` statement.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Handler {
    /// Exception class to match; `None` catches everything.
    pub class: Option<Expr>,
    /// Name bound to the caught exception.
    pub name: Option<String>,
    /// Handler body.
    pub body: Vec<Stmt>,
}

/// An imported name with an optional alias.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImportAlias {
    /// Dotted module name, or member name for `ImportFrom`.
    pub name: String,
    /// Local binding name.
    pub alias: Option<String>,
}

/// Statement variants.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StmtKind {
    /// An expression evaluated for its effect.
    Expr(Expr),
    /// `target = value`.
    Assign {
        /// Name, attribute, subscript or destructuring list.
        target: Expr,
        /// Assigned value.
        value: Expr,
    },
    /// Function definition.
    FunctionDef(Rc<FunctionDef>),
    /// Class definition.
    ClassDef {
        /// Class name.
        name: String,
        /// Base classes.
        bases: Vec<Expr>,
        /// `name=value` header entries.
        keywords: Vec<Keyword>,
        /// Class body.
        body: Vec<Stmt>,
    },
    /// Return from the enclosing function.
    Return(Option<Expr>),
    /// Conditional statement.
    If {
        /// Condition.
        test: Expr,
        /// Statements run when the condition holds.
        body: Vec<Stmt>,
        /// Statements run otherwise.
        orelse: Vec<Stmt>,
    },
    /// Loop while a condition holds.
    While {
        /// Condition.
        test: Expr,
        /// Loop body.
        body: Vec<Stmt>,
    },
    /// Loop over an iterable.
    For {
        /// Loop variable or destructuring pattern.
        target: Expr,
        /// Iterated value.
        iter: Expr,
        /// Loop body.
        body: Vec<Stmt>,
        /// Whether this is an `async for`.
        is_async: bool,
    },
    /// Scoped resource.
    With {
        /// Context manager expression.
        context: Expr,
        /// Name bound to the entered value.
        target: Option<String>,
        /// Body.
        body: Vec<Stmt>,
        /// Whether this is an `async with`.
        is_async: bool,
    },
    /// Exception handling.
    Try {
        /// Protected statements.
        body: Vec<Stmt>,
        /// `catch` clauses.
        handlers: Vec<Handler>,
        /// Statements run when no exception was raised.
        orelse: Vec<Stmt>,
        /// Statements run on every exit path.
        finalbody: Vec<Stmt>,
    },
    /// Raise an exception, or re-raise the active one.
    Raise {
        /// Exception value.
        exc: Option<Expr>,
        /// Explicit cause.
        cause: Option<Expr>,
    },
    /// Assertion.
    Assert {
        /// Asserted condition.
        test: Expr,
        /// Optional message.
        msg: Option<Expr>,
    },
    /// Remove a binding, attribute or item.
    Delete(Vec<Expr>),
    /// `import a.b`.
    Import(Vec<ImportAlias>),
    /// `import names from module`.
    ImportFrom {
        /// Dotted module name.
        module: String,
        /// Imported members.
        names: Vec<ImportAlias>,
    },
    /// Declare names as module-level.
    Global(Vec<String>),
    /// Declare names as belonging to an enclosing function.
    Nonlocal(Vec<String>),
    /// No operation.
    Pass,
    /// Leave the innermost loop.
    Break,
    /// Next iteration of the innermost loop.
    Continue,
}

/// A keyword argument or class header entry.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Keyword {
    /// Argument name.
    pub name: String,
    /// Argument value.
    pub value: Expr,
}

/// An expression with its source span.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    /// Expression kind.
    pub kind: ExprKind,
    /// Span of the node the expression was generated from.
    pub span: Span,
}

/// Constant values.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Constant {
    /// `null`.
    None,
    /// `true` / `false`.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// Complex number `(re, im)`.
    Complex(f64, f64),
    /// String.
    Str(String),
    /// Date and time.
    DateTime(NaiveDateTime),
    /// Regular expression pattern.
    Regex(String),
}

/// Arithmetic and bitwise operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOperator {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mult,
    /// `/`
    Div,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `<<<`
    LShift,
    /// `>>>`
    RShift,
    /// `|||`
    BitOr,
    /// `^^^`
    BitXor,
    /// `&&&`
    BitAnd,
}

impl BinOperator {
    /// Maps a source operator symbol.
    #[must_use]
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mult,
            "/" => Self::Div,
            "//" => Self::FloorDiv,
            "%" => Self::Mod,
            "**" => Self::Pow,
            "<<<" => Self::LShift,
            ">>>" => Self::RShift,
            "|||" => Self::BitOr,
            "^^^" => Self::BitXor,
            "&&&" => Self::BitAnd,
            _ => return None,
        })
    }

    /// Source symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mult => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::LShift => "<<<",
            Self::RShift => ">>>",
            Self::BitOr => "|||",
            Self::BitXor => "^^^",
            Self::BitAnd => "&&&",
        }
    }
}

/// Short-circuit boolean operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoolOperator {
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BoolOperator {
    /// Maps a source operator symbol.
    #[must_use]
    pub fn from_symbol(op: &str) -> Option<Self> {
        match op {
            "&&" => Some(Self::And),
            "||" => Some(Self::Or),
            _ => None,
        }
    }
}

/// Comparison operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CmpOperator {
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtE,
    /// `>`
    Gt,
    /// `>=`
    GtE,
}

impl CmpOperator {
    /// Maps a source operator symbol.
    #[must_use]
    pub fn from_symbol(op: &str) -> Option<Self> {
        Some(match op {
            "==" => Self::Eq,
            "!=" => Self::NotEq,
            "<" => Self::Lt,
            "<=" => Self::LtE,
            ">" => Self::Gt,
            ">=" => Self::GtE,
            _ => return None,
        })
    }

    /// Source symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtE => "<=",
            Self::Gt => ">",
            Self::GtE => ">=",
        }
    }
}

/// Expression variants.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    /// A constant.
    Constant(Constant),
    /// A variable reference.
    Name(String),
    /// Arithmetic or bitwise operation.
    BinOp {
        /// Left operand.
        left: Box<Expr>,
        /// Operator.
        op: BinOperator,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Short-circuit boolean operation.
    BoolOp {
        /// Operator.
        op: BoolOperator,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand, evaluated only when needed.
        right: Box<Expr>,
    },
    /// Chained comparison.
    Compare {
        /// First operand.
        left: Box<Expr>,
        /// Operators, one per comparator.
        ops: Vec<CmpOperator>,
        /// Remaining operands.
        comparators: Vec<Expr>,
    },
    /// Function call.
    Call {
        /// Callee.
        func: Box<Expr>,
        /// Positional arguments.
        args: Vec<Expr>,
        /// Keyword arguments.
        keywords: Vec<Keyword>,
    },
    /// Single-expression anonymous function.
    Lambda {
        /// Parameter names.
        params: Vec<String>,
        /// Body expression.
        body: Box<Expr>,
    },
    /// Anonymous function with a statement body.
    Function(Rc<FunctionDef>),
    /// Conditional expression.
    IfExp {
        /// Condition.
        test: Box<Expr>,
        /// Value when true.
        body: Box<Expr>,
        /// Value when false.
        orelse: Box<Expr>,
    },
    /// Member access.
    Attribute {
        /// Object.
        value: Box<Expr>,
        /// Member name.
        attr: String,
    },
    /// Indexing.
    Subscript {
        /// Indexed value.
        value: Box<Expr>,
        /// Index or slice.
        index: Box<Expr>,
    },
    /// Slice value.
    Slice {
        /// Start bound.
        lower: Option<Box<Expr>>,
        /// End bound.
        upper: Option<Box<Expr>>,
        /// Step.
        step: Option<Box<Expr>>,
    },
    /// List display.
    List(Vec<Expr>),
    /// Tuple display.
    Tuple(Vec<Expr>),
    /// Set display.
    Set(Vec<Expr>),
    /// Dictionary display.
    Dict(Vec<(Expr, Expr)>),
    /// Yield a value from a generator.
    Yield(Option<Box<Expr>>),
    /// Yield every value of an iterable.
    YieldFrom(Box<Expr>),
    /// Wait for a coroutine.
    Await(Box<Expr>),
}

impl Expr {
    /// Creates an expression.
    #[must_use]
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A constant expression.
    #[must_use]
    pub const fn constant(value: Constant, span: Span) -> Self {
        Self::new(ExprKind::Constant(value), span)
    }

    /// The `null` constant.
    #[must_use]
    pub const fn null(span: Span) -> Self {
        Self::constant(Constant::None, span)
    }

    /// A variable reference.
    #[must_use]
    pub fn name(name: impl Into<String>, span: Span) -> Self {
        Self::new(ExprKind::Name(name.into()), span)
    }

    /// A positional-only call.
    #[must_use]
    pub fn call(func: Self, args: Vec<Self>, span: Span) -> Self {
        Self::new(
            ExprKind::Call {
                func: Box::new(func),
                args,
                keywords: Vec::new(),
            },
            span,
        )
    }

    /// A single-expression anonymous function.
    #[must_use]
    pub fn lambda(params: Vec<String>, body: Self, span: Span) -> Self {
        Self::new(
            ExprKind::Lambda {
                params,
                body: Box::new(body),
            },
            span,
        )
    }

    /// Wraps this expression into an expression statement.
    #[must_use]
    pub fn into_stmt(self) -> Stmt {
        let span = self.span;
        Stmt::new(StmtKind::Expr(self), span)
    }
}

impl Stmt {
    /// Creates a statement.
    #[must_use]
    pub const fn new(kind: StmtKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// A `pass` statement.
    #[must_use]
    pub const fn pass(span: Span) -> Self {
        Self::new(StmtKind::Pass, span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_symbols_map_both_ways() {
        for op in ["+", "-", "*", "/", "//", "%", "**", "<<<", ">>>", "|||", "^^^", "&&&"] {
            let mapped = BinOperator::from_symbol(op).expect("arithmetic operator");
            assert_eq!(mapped.symbol(), op);
        }
        for op in ["==", "!=", "<", "<=", ">", ">="] {
            assert_eq!(CmpOperator::from_symbol(op).expect("comparison").symbol(), op);
        }
        assert_eq!(BoolOperator::from_symbol("&&"), Some(BoolOperator::And));
        assert!(BinOperator::from_symbol("->").is_none());
    }

    #[test]
    fn expression_statement_keeps_span() {
        let span = Span::new(3, 4, (1, 4), (1, 5));
        let stmt = Expr::name("x", span).into_stmt();
        assert_eq!(stmt.span, span);
        assert!(matches!(stmt.kind, StmtKind::Expr(_)));
    }
}
