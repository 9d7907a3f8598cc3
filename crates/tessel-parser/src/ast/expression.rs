//! Expression nodes.

use std::fmt;

use tessel_core::{
    constant::ConstantValue, intrinsic::IntrinsicType, types::ExpressionType,
};

use crate::span::{SourceLocation, Spanned};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    CompEq,
    CompNe,
    CompLt,
    CompLe,
    CompGt,
    CompGe,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    BitwiseXor,
    ShiftLeft,
    ShiftRight,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::CompEq => "==",
            BinaryOp::CompNe => "!=",
            BinaryOp::CompLt => "<",
            BinaryOp::CompLe => "<=",
            BinaryOp::CompGt => ">",
            BinaryOp::CompGe => ">=",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
        }
    }

    /// Binding strength, higher binds tighter.
    pub fn precedence(&self) -> u8 {
        match self {
            BinaryOp::LogicalOr => 1,
            BinaryOp::LogicalAnd => 2,
            BinaryOp::BitwiseOr => 3,
            BinaryOp::BitwiseXor => 4,
            BinaryOp::BitwiseAnd => 5,
            BinaryOp::CompEq | BinaryOp::CompNe => 6,
            BinaryOp::CompLt | BinaryOp::CompLe | BinaryOp::CompGt | BinaryOp::CompGe => 7,
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => 8,
            BinaryOp::Add | BinaryOp::Subtract => 9,
            BinaryOp::Multiply | BinaryOp::Divide | BinaryOp::Modulo => 10,
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::CompEq
                | BinaryOp::CompNe
                | BinaryOp::CompLt
                | BinaryOp::CompLe
                | BinaryOp::CompGt
                | BinaryOp::CompGe
        )
    }

    pub fn is_shift(&self) -> bool {
        matches!(self, BinaryOp::ShiftLeft | BinaryOp::ShiftRight)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    BitwiseNot,
    LogicalNot,
    Minus,
    Plus,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::BitwiseNot => "~",
            UnaryOp::LogicalNot => "!",
            UnaryOp::Minus => "-",
            UnaryOp::Plus => "+",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignOp {
    Simple,
    CompoundAdd,
    CompoundSubtract,
    CompoundMultiply,
    CompoundDivide,
    CompoundModulo,
}

impl AssignOp {
    /// The binary operation a compound assignment applies.
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Simple => None,
            AssignOp::CompoundAdd => Some(BinaryOp::Add),
            AssignOp::CompoundSubtract => Some(BinaryOp::Subtract),
            AssignOp::CompoundMultiply => Some(BinaryOp::Multiply),
            AssignOp::CompoundDivide => Some(BinaryOp::Divide),
            AssignOp::CompoundModulo => Some(BinaryOp::Modulo),
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            AssignOp::Simple => "=",
            AssignOp::CompoundAdd => "+=",
            AssignOp::CompoundSubtract => "-=",
            AssignOp::CompoundMultiply => "*=",
            AssignOp::CompoundDivide => "/=",
            AssignOp::CompoundModulo => "%=",
        }
    }
}

/// An attribute argument: an expression until the sanitizer evaluates it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue<T> {
    Value(T),
    Expression(Box<Expression>),
}

impl<T> AttributeValue<T> {
    /// The evaluated value, if the attribute has been resolved.
    pub fn value(&self) -> Option<&T> {
        match self {
            AttributeValue::Value(value) => Some(value),
            AttributeValue::Expression(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, AttributeValue::Value(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// `expr.name`, before it is resolved to a field, swizzle, method or
    /// module member.
    AccessIdentifier {
        expr: Box<Expression>,
        identifier: Spanned<String>,
    },
    /// A resolved struct field access.
    AccessField {
        expr: Box<Expression>,
        field_index: u32,
    },
    /// `expr[a, b]`: indexing, or the specialization of a partial type.
    AccessIndex {
        expr: Box<Expression>,
        indices: Vec<Expression>,
    },
    /// A reference to an `alias` declaration.
    Alias(usize),
    Assign {
        op: AssignOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    CallFunction {
        target: Box<Expression>,
        parameters: Vec<Expression>,
    },
    /// `T(args)` where `T` names a type.
    Cast {
        target: Box<Expression>,
        expressions: Vec<Expression>,
    },
    Constant(ConstantValue),
    Function(usize),
    Identifier(String),
    Intrinsic {
        intrinsic: IntrinsicType,
        parameters: Vec<Expression>,
    },
    IntrinsicFunction(IntrinsicType),
    Module(usize),
    /// An option whose value is only known when the shader is specialized.
    Option(usize),
    Swizzle {
        expr: Box<Expression>,
        components: Vec<u8>,
    },
    /// An expression naming a type.
    Type(ExpressionType),
    Unary {
        op: UnaryOp,
        expr: Box<Expression>,
    },
    Variable(usize),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub location: SourceLocation,
    /// Set by the sanitizer.
    pub cached_type: Option<ExpressionType>,
}

impl Expression {
    pub fn new(kind: ExpressionKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            cached_type: None,
        }
    }

    pub fn typed(kind: ExpressionKind, location: SourceLocation, ty: ExpressionType) -> Self {
        Self {
            kind,
            location,
            cached_type: Some(ty),
        }
    }

    pub fn constant(value: impl Into<ConstantValue>, location: SourceLocation) -> Self {
        Self::new(ExpressionKind::Constant(value.into()), location)
    }

    pub fn identifier(name: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(ExpressionKind::Identifier(name.into()), location)
    }

    /// The resolved type, or `NoType` before sanitization.
    pub fn expression_type(&self) -> &ExpressionType {
        static NO_TYPE: ExpressionType = ExpressionType::NoType;
        self.cached_type.as_ref().unwrap_or(&NO_TYPE)
    }

    pub fn as_constant(&self) -> Option<&ConstantValue> {
        match &self.kind {
            ExpressionKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expression]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Source-like rendering, used in diagnostics and AST dumps.
impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExpressionKind::AccessIdentifier { expr, identifier } => {
                write!(f, "{expr}.{identifier}")
            }
            ExpressionKind::AccessField { expr, field_index } => {
                write!(f, "{expr}.#{field_index}")
            }
            ExpressionKind::AccessIndex { expr, indices } => {
                write!(f, "{expr}[")?;
                write_list(f, indices)?;
                f.write_str("]")
            }
            ExpressionKind::Alias(index) => write!(f, "alias#{index}"),
            ExpressionKind::Assign { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            ExpressionKind::Binary { op, left, right } => write!(f, "{left} {op} {right}"),
            ExpressionKind::CallFunction { target, parameters } => {
                write!(f, "{target}(")?;
                write_list(f, parameters)?;
                f.write_str(")")
            }
            ExpressionKind::Cast {
                target,
                expressions,
            } => {
                write!(f, "{target}(")?;
                write_list(f, expressions)?;
                f.write_str(")")
            }
            ExpressionKind::Constant(value) => write!(f, "{value}"),
            ExpressionKind::Function(index) => write!(f, "function#{index}"),
            ExpressionKind::Identifier(name) => f.write_str(name),
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => {
                write!(f, "{intrinsic}(")?;
                write_list(f, parameters)?;
                f.write_str(")")
            }
            ExpressionKind::IntrinsicFunction(intrinsic) => write!(f, "{intrinsic}"),
            ExpressionKind::Module(index) => write!(f, "module#{index}"),
            ExpressionKind::Option(index) => write!(f, "option#{index}"),
            ExpressionKind::Swizzle { expr, components } => {
                write!(f, "{expr}.")?;
                for component in components {
                    f.write_str(match component {
                        0 => "x",
                        1 => "y",
                        2 => "z",
                        _ => "w",
                    })?;
                }
                Ok(())
            }
            ExpressionKind::Type(ty) => write!(f, "{ty}"),
            ExpressionKind::Unary { op, expr } => {
                if matches!(
                    expr.kind,
                    ExpressionKind::Binary { .. } | ExpressionKind::Assign { .. }
                ) {
                    write!(f, "{}({expr})", op.symbol())
                } else {
                    write!(f, "{}{expr}", op.symbol())
                }
            }
            ExpressionKind::Variable(index) => write!(f, "var#{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tessel_core::constant::ConstantSingleValue;

    use super::*;

    fn constant(value: ConstantSingleValue) -> Expression {
        Expression::constant(value, SourceLocation::unknown())
    }

    #[test]
    fn test_display_binary() {
        let expr = Expression::new(
            ExpressionKind::Binary {
                op: BinaryOp::Divide,
                left: Box::new(constant(ConstantSingleValue::I32(1))),
                right: Box::new(Expression::identifier("x", SourceLocation::unknown())),
            },
            SourceLocation::unknown(),
        );
        assert_eq!(expr.to_string(), "1_i32 / x");
    }

    #[test]
    fn test_display_call_and_swizzle() {
        let call = Expression::new(
            ExpressionKind::CallFunction {
                target: Box::new(Expression::identifier("f", SourceLocation::unknown())),
                parameters: vec![
                    Expression::identifier("a", SourceLocation::unknown()),
                    Expression::identifier("b", SourceLocation::unknown()),
                ],
            },
            SourceLocation::unknown(),
        );
        assert_eq!(call.to_string(), "f(a, b)");

        let swizzle = Expression::new(
            ExpressionKind::Swizzle {
                expr: Box::new(Expression::identifier("v", SourceLocation::unknown())),
                components: vec![2, 1, 0],
            },
            SourceLocation::unknown(),
        );
        assert_eq!(swizzle.to_string(), "v.zyx");
    }

    #[test]
    fn test_precedence_order() {
        assert!(BinaryOp::Multiply.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::ShiftLeft.precedence());
        assert!(BinaryOp::CompLt.precedence() > BinaryOp::CompEq.precedence());
        assert!(BinaryOp::LogicalAnd.precedence() > BinaryOp::LogicalOr.precedence());
    }

    #[test]
    fn test_attribute_value() {
        let value: AttributeValue<u32> = AttributeValue::Value(3);
        assert_eq!(value.value(), Some(&3));
        let unresolved: AttributeValue<u32> =
            AttributeValue::Expression(Box::new(constant(ConstantSingleValue::U32(3))));
        assert!(!unresolved.is_resolved());
    }
}
