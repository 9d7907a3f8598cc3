//! Compile-time constant values.
//!
//! A [`ConstantValue`] is either absent, a single scalar/vector/string, or a
//! homogeneous array of single values. Values know their own type
//! ([`ConstantValue::constant_type`]) and render back to literal syntax via
//! `Display`, with type suffixes (`_f32`, `_i32`, ...) and bracketed vector
//! base tags (`vec3[f32](...)`).

use std::fmt;

use thiserror::Error;

use crate::types::{ExpressionType, PrimitiveType};

/// A vector of 2 to 4 components of the same scalar type.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T> {
    components: Vec<T>,
}

impl<T: Copy> Vector<T> {
    /// Creates a vector, returning `None` unless there are 2 to 4 components.
    pub fn new(components: Vec<T>) -> Option<Self> {
        (2..=4)
            .contains(&components.len())
            .then_some(Self { components })
    }

    pub fn dims(&self) -> u8 {
        self.components.len() as u8
    }

    pub fn components(&self) -> &[T] {
        &self.components
    }

    pub fn x(&self) -> T {
        self.components[0]
    }

    pub fn y(&self) -> T {
        self.components[1]
    }

    pub fn z(&self) -> Option<T> {
        self.components.get(2).copied()
    }

    pub fn w(&self) -> Option<T> {
        self.components.get(3).copied()
    }
}

/// A constant vector, tagged by base type.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantVector {
    Bool(Vector<bool>),
    F32(Vector<f32>),
    F64(Vector<f64>),
    I32(Vector<i32>),
    U32(Vector<u32>),
    UntypedInteger(Vector<i64>),
    UntypedFloat(Vector<f64>),
}

impl ConstantVector {
    pub fn base_type(&self) -> PrimitiveType {
        match self {
            ConstantVector::Bool(_) => PrimitiveType::Bool,
            ConstantVector::F32(_) => PrimitiveType::F32,
            ConstantVector::F64(_) => PrimitiveType::F64,
            ConstantVector::I32(_) => PrimitiveType::I32,
            ConstantVector::U32(_) => PrimitiveType::U32,
            ConstantVector::UntypedInteger(_) => PrimitiveType::UntypedInteger,
            ConstantVector::UntypedFloat(_) => PrimitiveType::UntypedFloat,
        }
    }

    pub fn dims(&self) -> u8 {
        match self {
            ConstantVector::Bool(v) => v.dims(),
            ConstantVector::F32(v) => v.dims(),
            ConstantVector::F64(v) => v.dims(),
            ConstantVector::I32(v) => v.dims(),
            ConstantVector::U32(v) => v.dims(),
            ConstantVector::UntypedInteger(v) => v.dims(),
            ConstantVector::UntypedFloat(v) => v.dims(),
        }
    }

    /// Splits the vector into scalar values.
    pub fn components(&self) -> Vec<ConstantSingleValue> {
        fn map<T: Copy>(
            v: &Vector<T>,
            f: impl Fn(T) -> ConstantSingleValue,
        ) -> Vec<ConstantSingleValue> {
            v.components().iter().copied().map(f).collect()
        }

        match self {
            ConstantVector::Bool(v) => map(v, ConstantSingleValue::Bool),
            ConstantVector::F32(v) => map(v, ConstantSingleValue::F32),
            ConstantVector::F64(v) => map(v, ConstantSingleValue::F64),
            ConstantVector::I32(v) => map(v, ConstantSingleValue::I32),
            ConstantVector::U32(v) => map(v, ConstantSingleValue::U32),
            ConstantVector::UntypedInteger(v) => map(v, ConstantSingleValue::UntypedInteger),
            ConstantVector::UntypedFloat(v) => map(v, ConstantSingleValue::UntypedFloat),
        }
    }

    /// Builds a vector from scalars of one type. Returns `None` for mixed
    /// types, non-scalars, strings, or a component count outside 2..=4.
    pub fn from_components(values: Vec<ConstantSingleValue>) -> Option<Self> {
        fn collect<T: Copy>(
            values: &[ConstantSingleValue],
            f: impl Fn(&ConstantSingleValue) -> Option<T>,
        ) -> Option<Vector<T>> {
            Vector::new(values.iter().map(f).collect::<Option<Vec<T>>>()?)
        }

        let first = values.first()?;
        Some(match first {
            ConstantSingleValue::Bool(_) => ConstantVector::Bool(collect(&values, |v| match v {
                ConstantSingleValue::Bool(b) => Some(*b),
                _ => None,
            })?),
            ConstantSingleValue::F32(_) => ConstantVector::F32(collect(&values, |v| match v {
                ConstantSingleValue::F32(x) => Some(*x),
                _ => None,
            })?),
            ConstantSingleValue::F64(_) => ConstantVector::F64(collect(&values, |v| match v {
                ConstantSingleValue::F64(x) => Some(*x),
                _ => None,
            })?),
            ConstantSingleValue::I32(_) => ConstantVector::I32(collect(&values, |v| match v {
                ConstantSingleValue::I32(x) => Some(*x),
                _ => None,
            })?),
            ConstantSingleValue::U32(_) => ConstantVector::U32(collect(&values, |v| match v {
                ConstantSingleValue::U32(x) => Some(*x),
                _ => None,
            })?),
            ConstantSingleValue::UntypedInteger(_) => {
                ConstantVector::UntypedInteger(collect(&values, |v| match v {
                    ConstantSingleValue::UntypedInteger(x) => Some(*x),
                    _ => None,
                })?)
            }
            ConstantSingleValue::UntypedFloat(_) => {
                ConstantVector::UntypedFloat(collect(&values, |v| match v {
                    ConstantSingleValue::UntypedFloat(x) => Some(*x),
                    _ => None,
                })?)
            }
            ConstantSingleValue::String(_) | ConstantSingleValue::Vector(_) => return None,
        })
    }
}

/// Why an untyped constant could not take a concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoerceError {
    /// The value kind cannot convert to the target type at all.
    #[error("constant cannot take the target type")]
    Mismatch,
    /// The value does not fit in the target type.
    #[error("constant is out of range for the target type")]
    OutOfRange,
}

/// A single constant: scalar, string or vector.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantSingleValue {
    Bool(bool),
    F32(f32),
    F64(f64),
    I32(i32),
    U32(u32),
    UntypedInteger(i64),
    UntypedFloat(f64),
    String(String),
    Vector(ConstantVector),
}

impl ConstantSingleValue {
    pub fn expression_type(&self) -> ExpressionType {
        match self {
            ConstantSingleValue::Vector(v) => ExpressionType::vector(v.base_type(), v.dims()),
            scalar => ExpressionType::Primitive(scalar.scalar_type().unwrap_or(PrimitiveType::String)),
        }
    }

    /// Scalar type for scalars and strings; `None` for vectors.
    pub fn scalar_type(&self) -> Option<PrimitiveType> {
        Some(match self {
            ConstantSingleValue::Bool(_) => PrimitiveType::Bool,
            ConstantSingleValue::F32(_) => PrimitiveType::F32,
            ConstantSingleValue::F64(_) => PrimitiveType::F64,
            ConstantSingleValue::I32(_) => PrimitiveType::I32,
            ConstantSingleValue::U32(_) => PrimitiveType::U32,
            ConstantSingleValue::UntypedInteger(_) => PrimitiveType::UntypedInteger,
            ConstantSingleValue::UntypedFloat(_) => PrimitiveType::UntypedFloat,
            ConstantSingleValue::String(_) => PrimitiveType::String,
            ConstantSingleValue::Vector(_) => return None,
        })
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstantSingleValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral scalar value, widened to `i64`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            ConstantSingleValue::I32(v) => Some(i64::from(*v)),
            ConstantSingleValue::U32(v) => Some(i64::from(*v)),
            ConstantSingleValue::UntypedInteger(v) => Some(*v),
            _ => None,
        }
    }

    /// Numerical scalar value, widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConstantSingleValue::F32(v) => Some(f64::from(*v)),
            ConstantSingleValue::F64(v) | ConstantSingleValue::UntypedFloat(v) => Some(*v),
            other => other.as_integer().map(|v| v as f64),
        }
    }

    /// Whether the value is an integral zero, as a scalar or in any vector
    /// component.
    pub fn has_integral_zero(&self) -> bool {
        match self {
            ConstantSingleValue::Vector(v) => v.components().iter().any(|c| c.has_integral_zero()),
            other => other.as_integer() == Some(0),
        }
    }

    /// Gives an untyped value the concrete base type `target`.
    ///
    /// Typed values are returned unchanged if they already have the target
    /// base, and rejected otherwise.
    pub fn coerce_to(&self, target: PrimitiveType) -> Result<ConstantSingleValue, CoerceError> {
        match self {
            ConstantSingleValue::UntypedInteger(v) => coerce_untyped_integer(*v, target),
            ConstantSingleValue::UntypedFloat(v) => match target {
                PrimitiveType::F32 => {
                    let narrowed = *v as f32;
                    if v.is_finite() && !narrowed.is_finite() {
                        return Err(CoerceError::OutOfRange);
                    }
                    Ok(ConstantSingleValue::F32(narrowed))
                }
                PrimitiveType::F64 => Ok(ConstantSingleValue::F64(*v)),
                PrimitiveType::UntypedFloat => Ok(ConstantSingleValue::UntypedFloat(*v)),
                _ => Err(CoerceError::Mismatch),
            },
            ConstantSingleValue::Vector(vector) => {
                let components = vector
                    .components()
                    .iter()
                    .map(|c| c.coerce_to(target))
                    .collect::<Result<Vec<_>, _>>()?;
                ConstantVector::from_components(components)
                    .map(ConstantSingleValue::Vector)
                    .ok_or(CoerceError::Mismatch)
            }
            typed if typed.scalar_type() == Some(target) => Ok(typed.clone()),
            _ => Err(CoerceError::Mismatch),
        }
    }

    /// Explicit numerical conversion with `as` semantics, component-wise for
    /// vectors. Booleans and strings do not convert.
    pub fn cast_to(&self, target: PrimitiveType) -> Option<ConstantSingleValue> {
        if let ConstantSingleValue::Vector(vector) = self {
            let components = vector
                .components()
                .iter()
                .map(|c| c.cast_to(target))
                .collect::<Option<Vec<_>>>()?;
            return ConstantVector::from_components(components).map(ConstantSingleValue::Vector);
        }
        if self.scalar_type() == Some(target) {
            return Some(self.clone());
        }
        if let ConstantSingleValue::UntypedInteger(v) = self {
            return coerce_untyped_integer(*v, target).ok();
        }

        let value = match self {
            ConstantSingleValue::I32(v) => Numeric::Int(i64::from(*v)),
            ConstantSingleValue::U32(v) => Numeric::Int(i64::from(*v)),
            ConstantSingleValue::F32(v) => Numeric::Float(f64::from(*v)),
            ConstantSingleValue::F64(v) | ConstantSingleValue::UntypedFloat(v) => Numeric::Float(*v),
            _ => return None,
        };
        Some(match (target, value) {
            (PrimitiveType::I32, Numeric::Int(v)) => ConstantSingleValue::I32(v as i32),
            (PrimitiveType::I32, Numeric::Float(v)) => ConstantSingleValue::I32(v as i32),
            (PrimitiveType::U32, Numeric::Int(v)) => ConstantSingleValue::U32(v as u32),
            (PrimitiveType::U32, Numeric::Float(v)) => ConstantSingleValue::U32(v as u32),
            (PrimitiveType::F32, Numeric::Int(v)) => ConstantSingleValue::F32(v as f32),
            (PrimitiveType::F32, Numeric::Float(v)) => ConstantSingleValue::F32(v as f32),
            (PrimitiveType::F64, Numeric::Int(v)) => ConstantSingleValue::F64(v as f64),
            (PrimitiveType::F64, Numeric::Float(v)) => ConstantSingleValue::F64(v),
            _ => return None,
        })
    }

    /// Replaces untyped values with their default concrete types.
    pub fn resolve_untyped(&self) -> Result<ConstantSingleValue, CoerceError> {
        match self.expression_type().base_type() {
            Some(base) if base.is_untyped() => self.coerce_to(base.resolve_untyped()),
            _ => Ok(self.clone()),
        }
    }
}

enum Numeric {
    Int(i64),
    Float(f64),
}

fn coerce_untyped_integer(
    value: i64,
    target: PrimitiveType,
) -> Result<ConstantSingleValue, CoerceError> {
    match target {
        PrimitiveType::I32 => i32::try_from(value)
            .map(ConstantSingleValue::I32)
            .map_err(|_| CoerceError::OutOfRange),
        PrimitiveType::U32 => u32::try_from(value)
            .map(ConstantSingleValue::U32)
            .map_err(|_| CoerceError::OutOfRange),
        PrimitiveType::F32 => Ok(ConstantSingleValue::F32(value as f32)),
        PrimitiveType::F64 => Ok(ConstantSingleValue::F64(value as f64)),
        PrimitiveType::UntypedInteger => Ok(ConstantSingleValue::UntypedInteger(value)),
        PrimitiveType::UntypedFloat => Ok(ConstantSingleValue::UntypedFloat(value as f64)),
        PrimitiveType::Bool | PrimitiveType::String => Err(CoerceError::Mismatch),
    }
}

/// A homogeneous array of single values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstantArrayValue {
    element_type: ExpressionType,
    values: Vec<ConstantSingleValue>,
}

impl ConstantArrayValue {
    /// Creates an array, returning `None` if any value has a type other than
    /// `element_type`.
    pub fn new(element_type: ExpressionType, values: Vec<ConstantSingleValue>) -> Option<Self> {
        values
            .iter()
            .all(|v| v.expression_type() == element_type)
            .then_some(Self {
                element_type,
                values,
            })
    }

    /// Creates an array whose element type is taken from the first value.
    pub fn from_values(values: Vec<ConstantSingleValue>) -> Option<Self> {
        let element_type = values.first()?.expression_type();
        Self::new(element_type, values)
    }

    pub fn element_type(&self) -> &ExpressionType {
        &self.element_type
    }

    pub fn values(&self) -> &[ConstantSingleValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A compile-time value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConstantValue {
    #[default]
    NoValue,
    Single(ConstantSingleValue),
    Array(ConstantArrayValue),
}

impl ConstantValue {
    /// Derives the type of a value. Vectors map to vector types and arrays to
    /// array types of their element type and length.
    pub fn constant_type(&self) -> ExpressionType {
        match self {
            ConstantValue::NoValue => ExpressionType::NoType,
            ConstantValue::Single(value) => value.expression_type(),
            ConstantValue::Array(array) => {
                ExpressionType::array(array.element_type.clone(), array.values.len() as u32)
            }
        }
    }

    pub fn as_single(&self) -> Option<&ConstantSingleValue> {
        match self {
            ConstantValue::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_no_value(&self) -> bool {
        matches!(self, ConstantValue::NoValue)
    }
}

impl From<ConstantSingleValue> for ConstantValue {
    fn from(value: ConstantSingleValue) -> Self {
        ConstantValue::Single(value)
    }
}

/// Renders an `f64` with up to 15 fractional digits, trailing zeros
/// stripped down to one digit after the decimal point.
pub fn float64_to_string(value: f64, suffix: bool) -> String {
    let text = strip_trailing_zeros(format!("{value:.15}"));
    if suffix { text + "_f64" } else { text }
}

/// Renders an `f32` with up to 6 fractional digits, trailing zeros stripped
/// down to one digit after the decimal point.
pub fn float32_to_string(value: f32, suffix: bool) -> String {
    let text = strip_trailing_zeros(format!("{value:.6}"));
    if suffix { text + "_f32" } else { text }
}

/// Renders an `i32`. `i32::MIN` has no positive literal, so it is written as
/// a subtraction that folds back to the same value.
pub fn int32_to_string(value: i32, suffix: bool) -> String {
    let suffix = if suffix { "_i32" } else { "" };
    if value == i32::MIN {
        return format!("(-{}{suffix} - 1{suffix})", i32::MAX);
    }
    format!("{value}{suffix}")
}

pub fn uint32_to_string(value: u32, suffix: bool) -> String {
    format!("{value}{}", if suffix { "_u32" } else { "" })
}

fn strip_trailing_zeros(mut text: String) -> String {
    while text.len() > 2 {
        let bytes = text.as_bytes();
        if bytes[bytes.len() - 1] != b'0' || bytes[bytes.len() - 2] == b'.' {
            break;
        }
        text.pop();
    }
    text
}

/// Escapes a string for literal syntax, optionally surrounding it with quotes.
pub fn escape_string(value: &str, quote: bool) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    if quote {
        escaped.push('"');
    }
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            c if c.is_control() => escaped.push_str(&format!("\\u{{{:x}}}", c as u32)),
            c => escaped.push(c),
        }
    }
    if quote {
        escaped.push('"');
    }
    escaped
}

fn scalar_to_string(value: &ConstantSingleValue) -> String {
    match value {
        ConstantSingleValue::Bool(b) => b.to_string(),
        ConstantSingleValue::F32(v) => float32_to_string(*v, true),
        ConstantSingleValue::F64(v) => float64_to_string(*v, true),
        ConstantSingleValue::I32(v) => int32_to_string(*v, true),
        ConstantSingleValue::U32(v) => uint32_to_string(*v, true),
        ConstantSingleValue::UntypedInteger(v) => v.to_string(),
        ConstantSingleValue::UntypedFloat(v) => float64_to_string(*v, false),
        ConstantSingleValue::String(s) => escape_string(s, true),
        ConstantSingleValue::Vector(v) => vector_to_string(v),
    }
}

fn vector_to_string(vector: &ConstantVector) -> String {
    let tag = match vector.base_type() {
        base if base.is_untyped() => String::new(),
        base => format!("[{base}]"),
    };
    let components = vector
        .components()
        .iter()
        .map(scalar_to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("vec{}{tag}({components})", vector.dims())
}

impl fmt::Display for ConstantSingleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&scalar_to_string(self))
    }
}

impl fmt::Display for ConstantArrayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.element_type.contains_untyped() {
            f.write_str("array(")?;
        } else {
            write!(f, "array[{}](", self.element_type)?;
        }
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}

impl fmt::Display for ConstantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstantValue::NoValue => f.write_str("<no value>"),
            ConstantValue::Single(value) => write!(f, "{value}"),
            ConstantValue::Array(array) => write!(f, "{array}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn vec3_f32(x: f32, y: f32, z: f32) -> ConstantSingleValue {
        ConstantSingleValue::Vector(ConstantVector::F32(
            Vector::new(vec![x, y, z]).expect("three components"),
        ))
    }

    #[test]
    fn test_float_rendering() {
        assert_eq!(float64_to_string(0.1000000000000000, false), "0.1");
        assert_eq!(float32_to_string(1.0, true), "1.0_f32");
        assert_eq!(float64_to_string(2.5, true), "2.5_f64");
        assert_eq!(float64_to_string(10.0, false), "10.0");
        assert_eq!(float32_to_string(-0.25, false), "-0.25");
        assert_eq!(float64_to_string(0.0, false), "0.0");
    }

    #[test]
    fn test_integer_rendering() {
        assert_eq!(int32_to_string(-42, true), "-42_i32");
        assert_eq!(int32_to_string(i32::MIN, true), "(-2147483647_i32 - 1_i32)");
        assert_eq!(int32_to_string(i32::MIN, false), "(-2147483647 - 1)");
        assert_eq!(uint32_to_string(7, true), "7_u32");
        assert_eq!(uint32_to_string(7, false), "7");
        assert_eq!(ConstantSingleValue::UntypedInteger(12).to_string(), "12");
        assert_eq!(ConstantSingleValue::UntypedFloat(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_vector_rendering() {
        assert_eq!(vec3_f32(1.0, 2.5, 0.0).to_string(), "vec3[f32](1.0_f32, 2.5_f32, 0.0_f32)");

        let bools = ConstantSingleValue::Vector(ConstantVector::Bool(
            Vector::new(vec![true, false]).expect("two components"),
        ));
        assert_eq!(bools.to_string(), "vec2[bool](true, false)");

        let untyped = ConstantSingleValue::Vector(ConstantVector::UntypedInteger(
            Vector::new(vec![1, 2, 3, 4]).expect("four components"),
        ));
        assert_eq!(untyped.to_string(), "vec4(1, 2, 3, 4)");
    }

    #[test]
    fn test_string_rendering() {
        let value = ConstantSingleValue::String("say \"hi\"\n".to_string());
        assert_eq!(value.to_string(), r#""say \"hi\"\n""#);
        assert_eq!(escape_string("tab\there", false), "tab\\there");
    }

    #[test]
    fn test_array_rendering() {
        let array = ConstantArrayValue::from_values(vec![
            ConstantSingleValue::I32(1),
            ConstantSingleValue::I32(-2),
        ])
        .expect("homogeneous array");
        assert_eq!(
            ConstantValue::Array(array).to_string(),
            "array[i32](1_i32, -2_i32)"
        );
    }

    #[test]
    fn test_constant_type() {
        assert_eq!(
            ConstantValue::from(vec3_f32(0.0, 0.0, 0.0)).constant_type(),
            ExpressionType::vector(PrimitiveType::F32, 3)
        );

        let array = ConstantArrayValue::from_values(vec![
            vec3_f32(1.0, 0.0, 0.0),
            vec3_f32(0.0, 1.0, 0.0),
        ])
        .expect("homogeneous array");
        assert_eq!(
            ConstantValue::Array(array).constant_type(),
            ExpressionType::array(ExpressionType::vector(PrimitiveType::F32, 3), 2)
        );
        assert_eq!(ConstantValue::NoValue.constant_type(), ExpressionType::NoType);
    }

    #[test]
    fn test_array_rejects_mixed_types() {
        assert!(
            ConstantArrayValue::from_values(vec![
                ConstantSingleValue::I32(1),
                ConstantSingleValue::U32(1),
            ])
            .is_none()
        );
    }

    #[test]
    fn test_vector_bounds() {
        assert!(Vector::new(vec![1.0_f32]).is_none());
        assert!(Vector::new(vec![1.0_f32; 5]).is_none());
        let v = Vector::new(vec![1, 2, 3]).expect("three components");
        assert_eq!((v.x(), v.y(), v.z(), v.w()), (1, 2, Some(3), None));
    }

    #[test]
    fn test_coerce_untyped() {
        let int = ConstantSingleValue::UntypedInteger(5);
        assert_eq!(int.coerce_to(PrimitiveType::U32), Ok(ConstantSingleValue::U32(5)));
        assert_eq!(
            ConstantSingleValue::UntypedInteger(-1).coerce_to(PrimitiveType::U32),
            Err(CoerceError::OutOfRange)
        );
        assert_eq!(
            ConstantSingleValue::UntypedInteger(1 << 40).coerce_to(PrimitiveType::I32),
            Err(CoerceError::OutOfRange)
        );
        assert_eq!(
            ConstantSingleValue::UntypedFloat(1.5).coerce_to(PrimitiveType::I32),
            Err(CoerceError::Mismatch)
        );
        assert_eq!(
            ConstantSingleValue::I32(1).coerce_to(PrimitiveType::U32),
            Err(CoerceError::Mismatch)
        );

        match ConstantSingleValue::UntypedFloat(0.1).coerce_to(PrimitiveType::F32) {
            Ok(ConstantSingleValue::F32(v)) => assert!(approx_eq!(f32, v, 0.1, ulps = 2)),
            other => panic!("unexpected coercion result {other:?}"),
        }
    }

    #[test]
    fn test_cast_to() {
        assert_eq!(
            ConstantSingleValue::F32(3.75).cast_to(PrimitiveType::I32),
            Some(ConstantSingleValue::I32(3))
        );
        assert_eq!(
            ConstantSingleValue::I32(-1).cast_to(PrimitiveType::U32),
            Some(ConstantSingleValue::U32(u32::MAX))
        );
        assert_eq!(ConstantSingleValue::Bool(true).cast_to(PrimitiveType::I32), None);

        match vec3_f32(1.5, 2.0, -3.0).cast_to(PrimitiveType::F64) {
            Some(ConstantSingleValue::Vector(ConstantVector::F64(v))) => {
                assert!(approx_eq!(f64, v.x(), 1.5));
                assert!(approx_eq!(f64, v.z().unwrap_or_default(), -3.0));
            }
            other => panic!("unexpected cast result {other:?}"),
        }
    }

    #[test]
    fn test_integral_zero_detection() {
        assert!(ConstantSingleValue::UntypedInteger(0).has_integral_zero());
        assert!(!ConstantSingleValue::F32(0.0).has_integral_zero());
        let v = ConstantSingleValue::Vector(ConstantVector::I32(
            Vector::new(vec![1, 0]).expect("two components"),
        ));
        assert!(v.has_integral_zero());
    }

    proptest! {
        #[test]
        fn float_rendering_keeps_one_fractional_digit(value in -1.0e6f64..1.0e6) {
            let text = float64_to_string(value, false);
            let (_, fraction) = text.split_once('.').expect("decimal point");
            prop_assert!(!fraction.is_empty());
            prop_assert!(fraction.len() == 1 || !fraction.ends_with('0'));
        }

        #[test]
        fn vector_type_matches_components(components in prop::collection::vec(any::<i32>(), 2..=4)) {
            let dims = components.len() as u8;
            let value = ConstantSingleValue::Vector(ConstantVector::I32(
                Vector::new(components).expect("valid dimension"),
            ));
            prop_assert_eq!(
                ConstantValue::from(value).constant_type(),
                ExpressionType::vector(PrimitiveType::I32, dims)
            );
        }

        #[test]
        fn array_type_matches_length(values in prop::collection::vec(any::<u32>(), 1..16)) {
            let length = values.len() as u32;
            let array = ConstantArrayValue::from_values(
                values.into_iter().map(ConstantSingleValue::U32).collect(),
            )
            .expect("homogeneous array");
            prop_assert_eq!(
                ConstantValue::Array(array).constant_type(),
                ExpressionType::array(PrimitiveType::U32.into(), length)
            );
        }
    }
}
