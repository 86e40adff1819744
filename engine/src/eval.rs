// eval.rs — Substitution and evaluation of plain expressions
//
// Context variables are bound once per run by `substitute_context`; local
// variables are bound per producing call through an `Env`. Arithmetic is
// checked: overflow and division by zero are errors, never wraps or panics.

use std::collections::BTreeSet;

use crate::ast::*;
use crate::context::ContextValues;
use crate::env::Env;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unbound variable `{0}`")]
    Unbound(String),
    #[error("context variable `#{0}` has no known value")]
    UnknownContext(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

impl Expr {
    /// Evaluate to a concrete integer. Context variables must already have
    /// been substituted; any that remain are reported as unknown.
    pub fn eval(&self, env: &Env) -> Result<i64, EvalError> {
        match self {
            Expr::Int(n) => Ok(*n),
            Expr::Var(var) => match var.scope {
                Scope::Context => Err(EvalError::UnknownContext(var.name.clone())),
                Scope::Local => env
                    .get(&var.name)
                    .copied()
                    .ok_or_else(|| EvalError::Unbound(var.name.clone())),
            },
            Expr::Unary(op, operand) => {
                let v = operand.eval(env)?;
                match op {
                    UnOp::Neg => v.checked_neg().ok_or(EvalError::Overflow),
                    UnOp::Not => Ok((v == 0) as i64),
                }
            }
            Expr::Binary(BinOp::And, lhs, rhs) => {
                if lhs.eval(env)? == 0 {
                    return Ok(0);
                }
                Ok((rhs.eval(env)? != 0) as i64)
            }
            Expr::Binary(BinOp::Or, lhs, rhs) => {
                if lhs.eval(env)? != 0 {
                    return Ok(1);
                }
                Ok((rhs.eval(env)? != 0) as i64)
            }
            Expr::Binary(op, lhs, rhs) => apply(*op, lhs.eval(env)?, rhs.eval(env)?),
        }
    }

    /// Truth value of a guard.
    pub fn holds(&self, env: &Env) -> Result<bool, EvalError> {
        Ok(self.eval(env)? != 0)
    }

    /// Replace every context variable with a known value. Unknown context
    /// values stay symbolic. Constant subtrees are folded.
    pub fn substitute_context(&self, ctx: &ContextValues) -> Expr {
        self.substitute(Scope::Context, &|name| ctx.known(name))
    }

    fn substitute(&self, scope: Scope, lookup: &dyn Fn(&str) -> Option<i64>) -> Expr {
        match self {
            Expr::Int(n) => Expr::Int(*n),
            Expr::Var(var) if var.scope == scope => match lookup(&var.name) {
                Some(v) => Expr::Int(v),
                None => self.clone(),
            },
            Expr::Var(_) => self.clone(),
            Expr::Unary(op, operand) => {
                fold(Expr::unary(*op, operand.substitute(scope, lookup)))
            }
            Expr::Binary(op, lhs, rhs) => fold(Expr::binary(
                *op,
                lhs.substitute(scope, lookup),
                rhs.substitute(scope, lookup),
            )),
        }
    }

    /// Collect the names of free variables in `scope`.
    pub fn free_vars(&self, scope: Scope, out: &mut BTreeSet<String>) {
        match self {
            Expr::Int(_) => {}
            Expr::Var(var) => {
                if var.scope == scope {
                    out.insert(var.name.clone());
                }
            }
            Expr::Unary(_, operand) => operand.free_vars(scope, out),
            Expr::Binary(_, lhs, rhs) => {
                lhs.free_vars(scope, out);
                rhs.free_vars(scope, out);
            }
        }
    }

    /// View the expression as `a * var + b`, with every other local variable
    /// bound by `env`. Returns `None` when it is not affine in `var` under
    /// integer arithmetic (products of unknowns, division of an unknown,
    /// comparisons, unbound names).
    pub fn affine_in(&self, var: &str, env: &Env) -> Option<(i64, i64)> {
        match self {
            Expr::Int(n) => Some((0, *n)),
            Expr::Var(v) if v.scope == Scope::Local && v.name == var => Some((1, 0)),
            Expr::Var(v) if v.scope == Scope::Local => env.get(&v.name).map(|&n| (0, n)),
            Expr::Var(_) => None,
            Expr::Unary(UnOp::Neg, operand) => {
                let (a, b) = operand.affine_in(var, env)?;
                Some((a.checked_neg()?, b.checked_neg()?))
            }
            Expr::Binary(op, lhs, rhs) => {
                let (la, lb) = lhs.affine_in(var, env)?;
                let (ra, rb) = rhs.affine_in(var, env)?;
                match op {
                    BinOp::Add => Some((la.checked_add(ra)?, lb.checked_add(rb)?)),
                    BinOp::Sub => Some((la.checked_sub(ra)?, lb.checked_sub(rb)?)),
                    BinOp::Mul if la == 0 => Some((ra.checked_mul(lb)?, rb.checked_mul(lb)?)),
                    BinOp::Mul if ra == 0 => Some((la.checked_mul(rb)?, lb.checked_mul(rb)?)),
                    BinOp::Div | BinOp::Rem if la == 0 && ra == 0 => {
                        Some((0, apply(*op, lb, rb).ok()?))
                    }
                    _ => None,
                }
            }
            Expr::Unary(UnOp::Not, _) => None,
        }
    }
}

fn apply(op: BinOp, l: i64, r: i64) -> Result<i64, EvalError> {
    let checked = |v: Option<i64>| v.ok_or(EvalError::Overflow);
    match op {
        BinOp::Add => checked(l.checked_add(r)),
        BinOp::Sub => checked(l.checked_sub(r)),
        BinOp::Mul => checked(l.checked_mul(r)),
        BinOp::Div if r == 0 => Err(EvalError::DivisionByZero),
        BinOp::Rem if r == 0 => Err(EvalError::DivisionByZero),
        BinOp::Div => checked(l.checked_div(r)),
        BinOp::Rem => checked(l.checked_rem(r)),
        BinOp::Lt => Ok((l < r) as i64),
        BinOp::Le => Ok((l <= r) as i64),
        BinOp::Gt => Ok((l > r) as i64),
        BinOp::Ge => Ok((l >= r) as i64),
        BinOp::Eq => Ok((l == r) as i64),
        BinOp::Ne => Ok((l != r) as i64),
        BinOp::And => Ok((l != 0 && r != 0) as i64),
        BinOp::Or => Ok((l != 0 || r != 0) as i64),
    }
}

/// Fold a node whose operands are all literals. Faulting arithmetic is left
/// unfolded so evaluation reports it later.
fn fold(expr: Expr) -> Expr {
    match &expr {
        Expr::Unary(_, operand) if matches!(**operand, Expr::Int(_)) => {
            match expr.eval(&Env::new()) {
                Ok(v) => Expr::Int(v),
                Err(_) => expr,
            }
        }
        Expr::Binary(_, lhs, rhs)
            if matches!(**lhs, Expr::Int(_)) && matches!(**rhs, Expr::Int(_)) =>
        {
            match expr.eval(&Env::new()) {
                Ok(v) => Expr::Int(v),
                Err(_) => expr,
            }
        }
        _ => expr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextParam, ContextValue};
    use crate::parser::parse_expr;

    fn env(pairs: &[(&str, i64)]) -> Env {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn ctx(pairs: &[(&str, ContextValue)]) -> ContextValues {
        let mut values = ContextValues::default();
        for (name, value) in pairs {
            values.insert(&ContextParam::int(*name), *value);
        }
        values
    }

    #[test]
    fn arithmetic_truncates_toward_zero() {
        let e = parse_expr("-7 / 2").unwrap();
        assert_eq!(e.eval(&Env::new()), Ok(-3));
        let e = parse_expr("-7 % 2").unwrap();
        assert_eq!(e.eval(&Env::new()), Ok(-1));
    }

    #[test]
    fn locals_and_unbound() {
        let e = parse_expr("i * 2 + j").unwrap();
        assert_eq!(e.eval(&env(&[("i", 3), ("j", 1)])), Ok(7));
        assert_eq!(
            e.eval(&env(&[("i", 3)])),
            Err(EvalError::Unbound("j".into()))
        );
    }

    #[test]
    fn faults_are_errors() {
        let e = parse_expr("i / (j - j)").unwrap();
        assert_eq!(e.eval(&env(&[("i", 1), ("j", 4)])), Err(EvalError::DivisionByZero));
        let e = parse_expr("9223372036854775807 + 1").unwrap();
        assert_eq!(e.eval(&Env::new()), Err(EvalError::Overflow));
    }

    #[test]
    fn guards_short_circuit() {
        // The right operand would divide by zero.
        let e = parse_expr("i > 0 && 10 / i > 1").unwrap();
        assert_eq!(e.holds(&env(&[("i", 0)])), Ok(false));
        assert_eq!(e.holds(&env(&[("i", 5)])), Ok(true));
        let e = parse_expr("i == 0 || 10 / i > 1").unwrap();
        assert_eq!(e.holds(&env(&[("i", 0)])), Ok(true));
    }

    #[test]
    fn context_substitution_folds_constants() {
        let e = parse_expr("#N - 1").unwrap();
        let s = e.substitute_context(&ctx(&[("N", ContextValue::Known(5))]));
        assert_eq!(s, Expr::Int(4));
    }

    #[test]
    fn unknown_context_stays_symbolic() {
        let e = parse_expr("i + #N").unwrap();
        let s = e.substitute_context(&ctx(&[("N", ContextValue::Unknown)]));
        assert_eq!(s, e);
        assert_eq!(
            s.eval(&env(&[("i", 1)])),
            Err(EvalError::UnknownContext("N".into()))
        );
    }

    #[test]
    fn affine_forms() {
        let e = parse_expr("2 * i + 1").unwrap();
        assert_eq!(e.affine_in("i", &Env::new()), Some((2, 1)));
        let e = parse_expr("j - (i - 3)").unwrap();
        assert_eq!(e.affine_in("i", &env(&[("j", 10)])), Some((-1, 13)));
        let e = parse_expr("i * i").unwrap();
        assert_eq!(e.affine_in("i", &Env::new()), None);
        let e = parse_expr("i / 2").unwrap();
        assert_eq!(e.affine_in("i", &Env::new()), None);
        let e = parse_expr("i + k").unwrap();
        assert_eq!(e.affine_in("i", &Env::new()), None);
    }

    #[test]
    fn free_vars_by_scope() {
        let e = parse_expr("i + #N * j").unwrap();
        let mut locals = BTreeSet::new();
        e.free_vars(Scope::Local, &mut locals);
        assert_eq!(locals.into_iter().collect::<Vec<_>>(), vec!["i", "j"]);
        let mut ctxs = BTreeSet::new();
        e.free_vars(Scope::Context, &mut ctxs);
        assert_eq!(ctxs.into_iter().collect::<Vec<_>>(), vec!["N"]);
    }
}
