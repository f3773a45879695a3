use super::*;
use rill_core::ops::{BinOpKind, UnOpKind};
use std::cmp::Ordering;

impl Interpreter {
    pub(super) fn evaluate_binop(
        &self,
        op: BinOpKind,
        lhs: Value,
        rhs: Value,
    ) -> EvalResult<Value> {
        match op {
            BinOpKind::Add => self.binop_add(lhs, rhs),
            BinOpKind::Sub | BinOpKind::Mul => self.binop_arith(op, lhs, rhs),
            BinOpKind::Div => self.binop_div(lhs, rhs),
            BinOpKind::Mod => self.binop_mod(lhs, rhs),
            BinOpKind::Gt | BinOpKind::Ge | BinOpKind::Lt | BinOpKind::Le => {
                self.binop_ordering(op, lhs, rhs)
            }
            BinOpKind::Eq | BinOpKind::Ne => self.binop_equality(op, lhs, rhs),
            BinOpKind::Or | BinOpKind::And => self.binop_logical(op, lhs, rhs),
        }
    }

    pub(super) fn evaluate_unop(&self, op: UnOpKind, operand: Value) -> EvalResult<Value> {
        match (op, operand) {
            (UnOpKind::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (UnOpKind::Neg, Value::Int(v)) => match v.checked_neg() {
                Some(v) => Ok(Value::Int(v)),
                None => rt_bail!("integer overflow"),
            },
            (UnOpKind::Neg, Value::Float(v)) => Ok(Value::Float(-v)),
            (op, other) => rt_bail!("unsupported operand for '{op}': {}", other.type_name()),
        }
    }

    fn binop_add(&self, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (lhs, rhs) {
            (Value::String(l), Value::String(r)) => Ok(Value::string(format!("{l}{r}"))),
            (lhs, rhs) => self.binop_arith(BinOpKind::Add, lhs, rhs),
        }
    }

    fn binop_arith(&self, op: BinOpKind, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (&lhs, &rhs) {
            (Value::Int(l), Value::Int(r)) => {
                let result = match op {
                    BinOpKind::Add => l.checked_add(*r),
                    BinOpKind::Sub => l.checked_sub(*r),
                    _ => l.checked_mul(*r),
                };
                match result {
                    Some(v) => Ok(Value::Int(v)),
                    None => rt_bail!("integer overflow"),
                }
            }
            _ => {
                let (l, r) = numeric_pair(op, &lhs, &rhs)?;
                Ok(Value::Float(match op {
                    BinOpKind::Add => l + r,
                    BinOpKind::Sub => l - r,
                    _ => l * r,
                }))
            }
        }
    }

    fn binop_div(&self, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => rt_bail!("division by zero"),
            (Value::Int(l), Value::Int(r)) => match l.checked_div(*r) {
                Some(v) => Ok(Value::Int(v)),
                None => rt_bail!("integer overflow"),
            },
            _ => {
                let (l, r) = numeric_pair(BinOpKind::Div, &lhs, &rhs)?;
                rt_ensure!(r != 0.0, "division by zero");
                Ok(Value::Float(l / r))
            }
        }
    }

    fn binop_mod(&self, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (&lhs, &rhs) {
            (Value::Int(_), Value::Int(0)) => rt_bail!("division by zero"),
            (Value::Int(l), Value::Int(r)) => match l.checked_rem(*r) {
                Some(v) => Ok(Value::Int(v)),
                None => rt_bail!("integer overflow"),
            },
            _ => {
                let (l, r) = numeric_pair(BinOpKind::Mod, &lhs, &rhs)?;
                rt_ensure!(r != 0.0, "division by zero");
                Ok(Value::Float(l % r))
            }
        }
    }

    fn binop_ordering(&self, op: BinOpKind, lhs: Value, rhs: Value) -> EvalResult<Value> {
        let ordering = match (&lhs, &rhs) {
            (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
            (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
            _ => match (lhs.as_f64(), rhs.as_f64()) {
                (Some(l), Some(r)) => l.partial_cmp(&r),
                _ => rt_bail!(
                    "unsupported operands for '{op}': {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                ),
            },
        };
        // NaN compares false both ways.
        let Some(ordering) = ordering else {
            return Ok(Value::Bool(false));
        };
        Ok(Value::Bool(match op {
            BinOpKind::Gt => ordering == Ordering::Greater,
            BinOpKind::Ge => ordering != Ordering::Less,
            BinOpKind::Lt => ordering == Ordering::Less,
            _ => ordering != Ordering::Greater,
        }))
    }

    fn binop_equality(&self, op: BinOpKind, lhs: Value, rhs: Value) -> EvalResult<Value> {
        let equal = lhs == rhs;
        Ok(Value::Bool(if op == BinOpKind::Eq { equal } else { !equal }))
    }

    fn binop_logical(&self, op: BinOpKind, lhs: Value, rhs: Value) -> EvalResult<Value> {
        match (lhs, rhs) {
            (Value::Bool(l), Value::Bool(r)) => {
                Ok(Value::Bool(if op == BinOpKind::And { l && r } else { l || r }))
            }
            (lhs, rhs) => rt_bail!(
                "unsupported operands for '{op}': {} and {}",
                lhs.type_name(),
                rhs.type_name()
            ),
        }
    }
}

fn numeric_pair(op: BinOpKind, lhs: &Value, rhs: &Value) -> EvalResult<(f64, f64)> {
    match (lhs.as_f64(), rhs.as_f64()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => rt_bail!(
            "unsupported operands for '{op}': {} and {}",
            lhs.type_name(),
            rhs.type_name()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ast::Program;
    use rill_core::module::ResolvedProgram;

    fn interpreter() -> Interpreter {
        let resolved = ResolvedProgram::single("main", Rc::new(Program::new(Vec::new())));
        let checked = rill_typing::check_program(&resolved).expect("empty program checks");
        Interpreter::new(
            &checked,
            Default::default(),
            Box::new(crate::gateway::NullGateway::default()),
        )
    }

    fn message(result: EvalResult<Value>) -> String {
        match result {
            Err(Unwind::Error(err)) => err.message,
            other => panic!("expected an error, got {other:?}"),
        }
    }

    #[test]
    fn integer_arithmetic_is_checked() {
        let interp = interpreter();
        assert_eq!(
            interp.evaluate_binop(BinOpKind::Add, Value::Int(2), Value::Int(3)).expect("add"),
            Value::Int(5)
        );
        assert_eq!(
            message(interp.evaluate_binop(BinOpKind::Mul, Value::Int(i64::MAX), Value::Int(2))),
            "integer overflow"
        );
        assert_eq!(
            message(interp.evaluate_binop(BinOpKind::Div, Value::Int(1), Value::Int(0))),
            "division by zero"
        );
        assert_eq!(
            message(interp.evaluate_binop(BinOpKind::Div, Value::Float(1.0), Value::Float(0.0))),
            "division by zero"
        );
        assert_eq!(
            interp.evaluate_binop(BinOpKind::Div, Value::Int(7), Value::Int(2)).expect("div"),
            Value::Int(3)
        );
    }

    #[test]
    fn mixed_numbers_widen_to_float() {
        let interp = interpreter();
        assert_eq!(
            interp.evaluate_binop(BinOpKind::Add, Value::Int(1), Value::Float(0.5)).expect("add"),
            Value::Float(1.5)
        );
        assert_eq!(
            interp.evaluate_binop(BinOpKind::Lt, Value::Int(1), Value::Float(1.5)).expect("lt"),
            Value::Bool(true)
        );
    }

    #[test]
    fn strings_concatenate_and_compare() {
        let interp = interpreter();
        assert_eq!(
            interp
                .evaluate_binop(BinOpKind::Add, Value::string("ab"), Value::string("c"))
                .expect("concat"),
            Value::string("abc")
        );
        assert_eq!(
            interp
                .evaluate_binop(BinOpKind::Ge, Value::string("b"), Value::string("a"))
                .expect("ge"),
            Value::Bool(true)
        );
        assert_eq!(
            message(interp.evaluate_binop(BinOpKind::Sub, Value::string("a"), Value::Int(1))),
            "unsupported operands for '-': String and Int"
        );
    }
}
