// AST node types for tag and guard expressions.
//
// An expression is integer arithmetic with comparisons and logic over two
// variable scopes: context variables (`#N`, fixed once per run) and local
// variables (the enclosing step's tag variables, bare or `@`-prefixed).
// Scopes are resolved by the parser; evaluation never inspects names for
// lead characters.
//
// Preconditions: produced by the parser or built directly by tests.
// Postconditions: none (data-only module).
// Failure modes: none.
// Side effects: none.

use std::fmt;

// ── Variables ──

/// Which name scope a variable is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Run-global context parameter.
    Context,
    /// Tag/key variable of the enclosing step or item.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Var {
    pub scope: Scope,
    pub name: String,
}

impl Var {
    pub fn context(name: impl Into<String>) -> Self {
        Var {
            scope: Scope::Context,
            name: name.into(),
        }
    }

    pub fn local(name: impl Into<String>) -> Self {
        Var {
            scope: Scope::Local,
            name: name.into(),
        }
    }
}

// ── Operators ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinOp {
    /// Binding strength; higher binds tighter. All levels associate left.
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
            BinOp::Add | BinOp::Sub => 5,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::And => 2,
            BinOp::Or => 1,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

// ── Expressions ──

/// A plain arithmetic/boolean expression. Booleans are integers
/// (0 is false, anything else is true).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expr {
    Int(i64),
    Var(Var),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn unary(op: UnOp, operand: Expr) -> Self {
        Expr::Unary(op, Box::new(operand))
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary(op, _, _) => op.precedence(),
            Expr::Unary(..) => 7,
            Expr::Int(_) | Expr::Var(_) => 8,
        }
    }
}

/// A bounded integer interval whose bounds are plain expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeExpr {
    pub start: Expr,
    pub end: Expr,
    /// `..=` when true, `..` otherwise.
    pub inclusive: bool,
}

/// One positional component of a step tag or item key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TagExpr {
    Plain(Expr),
    Ranged(RangeExpr),
    /// Denotes `value` where `guard` holds and no tag otherwise.
    Conditional { guard: Expr, value: Box<TagExpr> },
}

// ── Display ──

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Scope::Context => write!(f, "#{}", self.name),
            Scope::Local => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Unary(op, operand) => {
                let sym = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                };
                if operand.precedence() < 7 {
                    write!(f, "{sym}({operand})")
                } else {
                    write!(f, "{sym}{operand}")
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let prec = op.precedence();
                if lhs.precedence() < prec {
                    write!(f, "({lhs})")?;
                } else {
                    write!(f, "{lhs}")?;
                }
                write!(f, " {} ", op.symbol())?;
                // Left associativity: an equal-precedence right operand needs parens.
                if rhs.precedence() <= prec {
                    write!(f, "({rhs})")
                } else {
                    write!(f, "{rhs}")
                }
            }
        }
    }
}

impl fmt::Display for TagExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagExpr::Plain(e) => write!(f, "{e}"),
            TagExpr::Ranged(r) => {
                let op = if r.inclusive { "..=" } else { ".." };
                write!(f, "{} {} {}", r.start, op, r.end)
            }
            TagExpr::Conditional { guard, value } => write!(f, "{value} if {guard}"),
        }
    }
}
