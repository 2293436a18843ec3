//! Constant folding for release builds.

use tinker_module::{BinOp, Op, UnOp};

use crate::ast::Expr;

/// A value known at compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Const {
    Int(i64),
    Bool(bool),
}

impl Const {
    pub fn to_op(self) -> Op {
        match self {
            Const::Int(v) => Op::PushInt(v),
            Const::Bool(v) => Op::PushBool(v),
        }
    }
}

/// Evaluates `expr` if it consists only of integer and boolean literals.
///
/// Operations that would overflow, divide by zero or mix types are left for
/// run time.
pub(crate) fn evaluate(expr: &Expr) -> Option<Const> {
    match expr {
        Expr::Int { value, .. } => Some(Const::Int(*value)),
        Expr::Bool { value, .. } => Some(Const::Bool(*value)),
        Expr::Unary { op, operand, .. } => match (op, evaluate(operand)?) {
            (UnOp::Neg, Const::Int(v)) => v.checked_neg().map(Const::Int),
            (UnOp::Not, Const::Bool(v)) => Some(Const::Bool(!v)),
            _ => None,
        },
        Expr::Binary { op, lhs, rhs, .. } => binary(*op, evaluate(lhs)?, evaluate(rhs)?),
        _ => None,
    }
}

fn binary(op: BinOp, lhs: Const, rhs: Const) -> Option<Const> {
    use Const::{Bool, Int};
    match (lhs, rhs) {
        (Int(a), Int(b)) => match op {
            BinOp::Add => a.checked_add(b).map(Int),
            BinOp::Sub => a.checked_sub(b).map(Int),
            BinOp::Mul => a.checked_mul(b).map(Int),
            BinOp::Div => a.checked_div(b).map(Int),
            BinOp::Rem => a.checked_rem(b).map(Int),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            BinOp::Lt => Some(Bool(a < b)),
            BinOp::Le => Some(Bool(a <= b)),
            BinOp::Gt => Some(Bool(a > b)),
            BinOp::Ge => Some(Bool(a >= b)),
            BinOp::And | BinOp::Or => None,
        },
        (Bool(a), Bool(b)) => match op {
            BinOp::And => Some(Bool(a && b)),
            BinOp::Or => Some(Bool(a || b)),
            BinOp::Eq => Some(Bool(a == b)),
            BinOp::Ne => Some(Bool(a != b)),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinker_source::Span;

    fn int(v: i64) -> Box<Expr> {
        Box::new(Expr::Int {
            value: v,
            span: Span::DUMMY,
        })
    }

    fn bin(op: BinOp, lhs: Box<Expr>, rhs: Box<Expr>) -> Box<Expr> {
        Box::new(Expr::Binary {
            op,
            lhs,
            rhs,
            span: Span::DUMMY,
        })
    }

    #[test]
    fn folds_nested_arithmetic() {
        let e = bin(BinOp::Mul, bin(BinOp::Add, int(2), int(3)), int(4));
        assert_eq!(evaluate(&e), Some(Const::Int(20)));
    }

    #[test]
    fn comparison_yields_bool() {
        let e = bin(BinOp::Lt, int(1), int(2));
        assert_eq!(evaluate(&e), Some(Const::Bool(true)));
    }

    #[test]
    fn division_by_zero_not_folded() {
        assert_eq!(evaluate(&bin(BinOp::Div, int(1), int(0))), None);
    }

    #[test]
    fn overflow_not_folded() {
        assert_eq!(evaluate(&bin(BinOp::Add, int(i64::MAX), int(1))), None);
    }

    #[test]
    fn variables_block_folding() {
        let var = Box::new(Expr::Var {
            name: tinker_common::Ident::from_raw(0),
            span: Span::DUMMY,
        });
        assert_eq!(evaluate(&bin(BinOp::Add, var, int(1))), None);
    }
}
