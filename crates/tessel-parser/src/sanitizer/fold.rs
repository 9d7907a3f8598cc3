//! Compile-time evaluation of operators on constant values.
//!
//! Operands are expected to be type-checked already: both sides of a binary
//! operation share a base type. Every function returns `None` when the
//! operation has no constant result, and the caller keeps the expression.

use tessel_core::constant::{ConstantSingleValue as Value, ConstantValue, ConstantVector};

use crate::ast::{BinaryOp, UnaryOp};

trait Scalar: Copy + PartialOrd {
    fn arithmetic(op: BinaryOp, a: Self, b: Self) -> Option<Self>;
}

macro_rules! integer_scalar {
    ($($ty:ty),+) => {
        $(
            impl Scalar for $ty {
                fn arithmetic(op: BinaryOp, a: Self, b: Self) -> Option<Self> {
                    Some(match op {
                        BinaryOp::Add => a.wrapping_add(b),
                        BinaryOp::Subtract => a.wrapping_sub(b),
                        BinaryOp::Multiply => a.wrapping_mul(b),
                        BinaryOp::Divide => a.checked_div(b)?,
                        BinaryOp::Modulo => a.checked_rem(b)?,
                        BinaryOp::BitwiseAnd => a & b,
                        BinaryOp::BitwiseOr => a | b,
                        BinaryOp::BitwiseXor => a ^ b,
                        BinaryOp::ShiftLeft => a.checked_shl(u32::try_from(b).ok()?)?,
                        BinaryOp::ShiftRight => a.checked_shr(u32::try_from(b).ok()?)?,
                        _ => return None,
                    })
                }
            }
        )+
    };
}

macro_rules! float_scalar {
    ($($ty:ty),+) => {
        $(
            impl Scalar for $ty {
                fn arithmetic(op: BinaryOp, a: Self, b: Self) -> Option<Self> {
                    Some(match op {
                        BinaryOp::Add => a + b,
                        BinaryOp::Subtract => a - b,
                        BinaryOp::Multiply => a * b,
                        BinaryOp::Divide => a / b,
                        BinaryOp::Modulo => a % b,
                        _ => return None,
                    })
                }
            }
        )+
    };
}

integer_scalar!(i32, u32, i64);
float_scalar!(f32, f64);

fn compare<T: PartialOrd>(op: BinaryOp, a: T, b: T) -> Option<bool> {
    Some(match op {
        BinaryOp::CompEq => a == b,
        BinaryOp::CompNe => a != b,
        BinaryOp::CompLt => a < b,
        BinaryOp::CompLe => a <= b,
        BinaryOp::CompGt => a > b,
        BinaryOp::CompGe => a >= b,
        _ => return None,
    })
}

fn scalar(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    if op.is_comparison() {
        let result = match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => compare(op, a, b)?,
            (Value::I32(a), Value::I32(b)) => compare(op, a, b)?,
            (Value::U32(a), Value::U32(b)) => compare(op, a, b)?,
            (Value::UntypedInteger(a), Value::UntypedInteger(b)) => compare(op, a, b)?,
            (Value::F32(a), Value::F32(b)) => compare(op, a, b)?,
            (Value::F64(a), Value::F64(b)) | (Value::UntypedFloat(a), Value::UntypedFloat(b)) => {
                compare(op, a, b)?
            }
            _ => return None,
        };
        return Some(Value::Bool(result));
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::LogicalAnd => Some(Value::Bool(*a && *b)),
            BinaryOp::LogicalOr => Some(Value::Bool(*a || *b)),
            _ => None,
        },
        (Value::I32(a), Value::I32(b)) => i32::arithmetic(op, *a, *b).map(Value::I32),
        (Value::U32(a), Value::U32(b)) => u32::arithmetic(op, *a, *b).map(Value::U32),
        (Value::UntypedInteger(a), Value::UntypedInteger(b)) => {
            i64::arithmetic(op, *a, *b).map(Value::UntypedInteger)
        }
        (Value::F32(a), Value::F32(b)) => f32::arithmetic(op, *a, *b).map(Value::F32),
        (Value::F64(a), Value::F64(b)) => f64::arithmetic(op, *a, *b).map(Value::F64),
        (Value::UntypedFloat(a), Value::UntypedFloat(b)) => {
            f64::arithmetic(op, *a, *b).map(Value::UntypedFloat)
        }
        _ => None,
    }
}

fn collect_vector(components: Option<Vec<Value>>) -> Option<Value> {
    ConstantVector::from_components(components?).map(Value::Vector)
}

/// Applies `op` component-wise, broadcasting a scalar operand over a vector.
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Vector(l), Value::Vector(r)) => {
            let (l, r) = (l.components(), r.components());
            if l.len() != r.len() {
                return None;
            }
            collect_vector(l.iter().zip(&r).map(|(a, b)| scalar(op, a, b)).collect())
        }
        (Value::Vector(l), r) => {
            collect_vector(l.components().iter().map(|a| scalar(op, a, r)).collect())
        }
        (l, Value::Vector(r)) => {
            collect_vector(r.components().iter().map(|b| scalar(op, l, b)).collect())
        }
        _ => scalar(op, left, right),
    }
}

pub fn unary(op: UnaryOp, value: &Value) -> Option<Value> {
    if let Value::Vector(v) = value {
        return collect_vector(v.components().iter().map(|c| unary(op, c)).collect());
    }
    Some(match (op, value) {
        (UnaryOp::Plus, Value::Bool(_) | Value::String(_)) => return None,
        (UnaryOp::Plus, v) => v.clone(),
        (UnaryOp::Minus, Value::I32(v)) => Value::I32(v.wrapping_neg()),
        (UnaryOp::Minus, Value::UntypedInteger(v)) => Value::UntypedInteger(v.checked_neg()?),
        (UnaryOp::Minus, Value::F32(v)) => Value::F32(-v),
        (UnaryOp::Minus, Value::F64(v)) => Value::F64(-v),
        (UnaryOp::Minus, Value::UntypedFloat(v)) => Value::UntypedFloat(-v),
        (UnaryOp::LogicalNot, Value::Bool(b)) => Value::Bool(!b),
        (UnaryOp::BitwiseNot, Value::I32(v)) => Value::I32(!v),
        (UnaryOp::BitwiseNot, Value::U32(v)) => Value::U32(!v),
        (UnaryOp::BitwiseNot, Value::UntypedInteger(v)) => Value::UntypedInteger(!v),
        _ => return None,
    })
}

/// Picks `components` out of a vector, or repeats a scalar.
pub fn swizzle(value: &Value, components: &[u8]) -> Option<Value> {
    let source = match value {
        Value::Vector(v) => v.components(),
        scalar => vec![scalar.clone()],
    };
    let mut picked = components
        .iter()
        .map(|&c| source.get(usize::from(c)).cloned())
        .collect::<Option<Vec<_>>>()?;
    if picked.len() == 1 {
        return picked.pop();
    }
    collect_vector(Some(picked))
}

/// Element `index` of a constant array or vector.
pub fn index(value: &ConstantValue, index: usize) -> Option<Value> {
    match value {
        ConstantValue::Array(array) => array.values().get(index).cloned(),
        ConstantValue::Single(Value::Vector(v)) => v.components().get(index).cloned(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vec_i32(values: &[i32]) -> Value {
        collect_vector(Some(values.iter().copied().map(Value::I32).collect())).unwrap()
    }

    #[test]
    fn test_scalar_arithmetic() {
        assert_eq!(binary(BinaryOp::Add, &Value::I32(2), &Value::I32(3)), Some(Value::I32(5)));
        assert_eq!(
            binary(BinaryOp::Subtract, &Value::U32(0), &Value::U32(1)),
            Some(Value::U32(u32::MAX))
        );
        assert_eq!(
            binary(BinaryOp::Multiply, &Value::F32(1.5), &Value::F32(2.0)),
            Some(Value::F32(3.0))
        );
        assert_eq!(
            binary(BinaryOp::ShiftLeft, &Value::UntypedInteger(1), &Value::UntypedInteger(4)),
            Some(Value::UntypedInteger(16))
        );
    }

    #[test]
    fn test_integral_division_by_zero_does_not_fold() {
        assert_eq!(binary(BinaryOp::Divide, &Value::I32(1), &Value::I32(0)), None);
        assert_eq!(binary(BinaryOp::Modulo, &Value::U32(1), &Value::U32(0)), None);
    }

    #[test]
    fn test_vector_broadcast_and_comparison() {
        assert_eq!(
            binary(BinaryOp::Multiply, &vec_i32(&[1, 2, 3]), &Value::I32(2)),
            Some(vec_i32(&[2, 4, 6]))
        );
        let eq = binary(BinaryOp::CompEq, &vec_i32(&[1, 2]), &vec_i32(&[1, 3])).unwrap();
        assert_eq!(eq.to_string(), "vec2[bool](true, false)");
        assert_eq!(binary(BinaryOp::Add, &vec_i32(&[1, 2]), &vec_i32(&[1, 2, 3])), None);
    }

    #[test]
    fn test_logical_and_unary() {
        assert_eq!(
            binary(BinaryOp::LogicalOr, &Value::Bool(false), &Value::Bool(true)),
            Some(Value::Bool(true))
        );
        assert_eq!(unary(UnaryOp::Minus, &Value::I32(4)), Some(Value::I32(-4)));
        assert_eq!(unary(UnaryOp::Minus, &Value::U32(4)), None);
        assert_eq!(unary(UnaryOp::LogicalNot, &Value::Bool(true)), Some(Value::Bool(false)));
        assert_eq!(unary(UnaryOp::BitwiseNot, &Value::U32(0)), Some(Value::U32(u32::MAX)));
    }

    #[test]
    fn test_swizzle_and_index() {
        let v = vec_i32(&[1, 2, 3]);
        assert_eq!(swizzle(&v, &[2, 1, 0]), Some(vec_i32(&[3, 2, 1])));
        assert_eq!(swizzle(&v, &[1]), Some(Value::I32(2)));
        assert_eq!(swizzle(&Value::I32(7), &[0, 0]), Some(vec_i32(&[7, 7])));
        assert_eq!(swizzle(&v, &[3]), None);
        assert_eq!(index(&ConstantValue::Single(v), 2), Some(Value::I32(3)));
    }
}
