//! Expression resolution, typing and folding.

use tessel_core::{
    constant::{CoerceError, ConstantArrayValue, ConstantSingleValue, ConstantValue},
    intrinsic::IntrinsicType,
    types::{AliasType, ExpressionType, MethodType, PartialType, PrimitiveType, StorageType},
};

use crate::{
    ast::{AssignOp, BinaryOp, Expression, ExpressionKind, UnaryOp},
    error::{Diagnostic, ErrorKind, Result},
    span::{SourceLocation, Spanned},
};

use super::{
    Sanitizer, fold,
    scope::{IdentifierCategory, IdentifierData},
};

/// An expression naming `ty`, typed the way type expressions are.
pub(super) fn type_expression(ty: ExpressionType, location: SourceLocation) -> Expression {
    match ty {
        ExpressionType::PartialType(partial) => Expression::typed(
            ExpressionKind::Type(ExpressionType::PartialType(partial)),
            location,
            ExpressionType::PartialType(partial),
        ),
        full => {
            let cached = ExpressionType::Type(Box::new(full.clone()));
            Expression::typed(ExpressionKind::Type(full), location, cached)
        }
    }
}

pub(super) fn constant_expression(value: ConstantValue, location: SourceLocation) -> Expression {
    let ty = value.constant_type();
    Expression::typed(ExpressionKind::Constant(value), location, ty)
}

/// The type a builtin type name stands for.
pub(super) fn builtin_type(name: &str) -> Option<ExpressionType> {
    let primitive = match name {
        "bool" => PrimitiveType::Bool,
        "f32" => PrimitiveType::F32,
        "f64" => PrimitiveType::F64,
        "i32" => PrimitiveType::I32,
        "u32" => PrimitiveType::U32,
        _ => return PartialType::from_name(name).map(ExpressionType::PartialType),
    };
    Some(ExpressionType::Primitive(primitive))
}

/// Names user declarations may not take.
pub(super) fn is_reserved_name(name: &str) -> bool {
    builtin_type(name).is_some() || PartialType::is_builtin_family(name)
}

/// Base type of the untyped parts of `ty`, if any.
fn untyped_base(ty: &ExpressionType) -> Option<PrimitiveType> {
    let base = match ty {
        ExpressionType::Array(array) => array.contained.base_type(),
        other => other.base_type(),
    };
    base.filter(PrimitiveType::is_untyped)
}

fn swizzle_components(name: &str) -> Option<Vec<u8>> {
    if name.is_empty() || name.len() > 4 {
        return None;
    }
    let set = ["xyzw", "rgba"]
        .into_iter()
        .find(|set| name.chars().all(|c| set.contains(c)))?;
    name.chars()
        .map(|c| set.find(c).and_then(|i| u8::try_from(i).ok()))
        .collect()
}

fn swizzle_name(components: &[u8]) -> String {
    components
        .iter()
        .map(|&c| ['x', 'y', 'z', 'w'].get(usize::from(c)).copied().unwrap_or('?'))
        .collect()
}

/// Method intrinsics reachable through `name` on a value of type `ty`.
fn method_for(ty: &ExpressionType, name: &str) -> Option<IntrinsicType> {
    const METHODS: [IntrinsicType; 4] = [
        IntrinsicType::ArraySize,
        IntrinsicType::TextureRead,
        IntrinsicType::TextureSampleImplicitLod,
        IntrinsicType::TextureWrite,
    ];
    METHODS.into_iter().find(|method| {
        method.name() == name
            && match method {
                IntrinsicType::ArraySize => {
                    matches!(ty, ExpressionType::Array(_) | ExpressionType::DynArray(_))
                }
                IntrinsicType::TextureRead | IntrinsicType::TextureWrite => {
                    matches!(ty, ExpressionType::Texture(_))
                }
                IntrinsicType::TextureSampleImplicitLod => matches!(ty, ExpressionType::Sampler(_)),
                _ => false,
            }
    })
}

/// Struct index behind struct values and block wrappers.
fn struct_index(ty: &ExpressionType) -> Option<usize> {
    match ty {
        ExpressionType::Struct(index)
        | ExpressionType::Uniform(index)
        | ExpressionType::PushConstant(index)
        | ExpressionType::Storage(StorageType {
            struct_index: index,
            ..
        }) => Some(*index),
        _ => None,
    }
}

/// Whether `expr` denotes storage that may be written to.
fn is_assignable(expr: &Expression) -> bool {
    match &expr.kind {
        ExpressionKind::Variable(_) => true,
        ExpressionKind::AccessField { expr, .. } | ExpressionKind::AccessIndex { expr, .. } => {
            is_assignable(expr)
        }
        ExpressionKind::Swizzle { expr, components } => {
            let mut seen = [false; 4];
            let unique = components.iter().all(|&c| {
                let slot = &mut seen[usize::from(c) % 4];
                !std::mem::replace(slot, true)
            });
            unique && is_assignable(expr)
        }
        // Unresolved under partial analysis.
        ExpressionKind::Identifier(_) | ExpressionKind::AccessIdentifier { .. } => {
            expr.expression_type().is_no_type()
        }
        _ => false,
    }
}

fn constant_index(expr: &Expression) -> Option<i64> {
    expr.as_constant()
        .and_then(ConstantValue::as_single)
        .and_then(ConstantSingleValue::as_integer)
}

impl Sanitizer<'_> {
    pub(super) fn expressions(&mut self, expressions: Vec<Expression>) -> Result<Vec<Expression>> {
        expressions
            .into_iter()
            .map(|expr| self.expression(expr))
            .collect()
    }

    /// Resolves `expr` and everything below it.
    pub(super) fn expression(&mut self, expr: Expression) -> Result<Expression> {
        let Expression { kind, location, .. } = expr;
        match kind {
            ExpressionKind::Constant(value) => Ok(constant_expression(value, location)),
            ExpressionKind::Identifier(name) => self.identifier(name, location),
            ExpressionKind::AccessIdentifier { expr, identifier } => {
                self.access_identifier(*expr, identifier, location)
            }
            ExpressionKind::AccessIndex { expr, indices } => {
                self.access_index(*expr, indices, location)
            }
            ExpressionKind::AccessField { expr, field_index } => {
                let target = self.expression(*expr)?;
                let index = Expression::constant(
                    ConstantSingleValue::I32(i32::try_from(field_index).unwrap_or(i32::MAX)),
                    location.clone(),
                );
                let index = self.expression(index)?;
                self.index_value(target, index, &location)
            }
            ExpressionKind::Assign { op, left, right } => self.assign(op, *left, *right, location),
            ExpressionKind::Binary { op, left, right } => {
                let left = self.expression(*left)?;
                let right = self.expression(*right)?;
                self.binary_operation(op, left, right, location)
            }
            ExpressionKind::Unary { op, expr } => self.unary(op, *expr, location),
            ExpressionKind::CallFunction { target, parameters } => {
                self.call(*target, parameters, location)
            }
            ExpressionKind::Cast {
                target,
                expressions,
            } => {
                let target = self.expression(*target)?;
                self.cast(target, expressions, location)
            }
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            } => {
                let parameters = self.expressions(parameters)?;
                self.intrinsic(intrinsic, parameters, location)
            }
            ExpressionKind::Swizzle { expr, components } => {
                let target = self.expression(*expr)?;
                let name = swizzle_name(&components);
                self.swizzle(target, components, &name, location)
            }
            ExpressionKind::Type(ty) => Ok(type_expression(ty, location)),
            ExpressionKind::Variable(index) => self.identifier_reference(
                String::new(),
                IdentifierData::new(IdentifierCategory::Variable, index),
                location,
            ),
            ExpressionKind::Function(index) => {
                self.registries.functions.get(index, &location)?;
                Ok(Expression::typed(
                    ExpressionKind::Function(index),
                    location,
                    ExpressionType::Function(index),
                ))
            }
            ExpressionKind::Alias(index) => self.identifier_reference(
                String::new(),
                IdentifierData::new(IdentifierCategory::Alias, index),
                location,
            ),
            ExpressionKind::Module(index) => self.identifier_reference(
                String::new(),
                IdentifierData::new(IdentifierCategory::Module, index),
                location,
            ),
            ExpressionKind::Option(index) => self.option_reference(index, location),
            ExpressionKind::IntrinsicFunction(intrinsic) => Ok(Expression::typed(
                ExpressionKind::IntrinsicFunction(intrinsic),
                location,
                ExpressionType::IntrinsicFunction(intrinsic),
            )),
        }
    }

    // ============================================================================
    // Names
    // ============================================================================

    fn identifier(&mut self, name: String, location: SourceLocation) -> Result<Expression> {
        if let Some(data) = self.state.scopes.lookup(&name) {
            return self.identifier_reference(name, data, location);
        }
        if let Some(ty) = builtin_type(&name) {
            return Ok(type_expression(ty, location));
        }
        if let Some(intrinsic) = IntrinsicType::from_name(&name) {
            return Ok(Expression::typed(
                ExpressionKind::IntrinsicFunction(intrinsic),
                location,
                ExpressionType::IntrinsicFunction(intrinsic),
            ));
        }
        Err(Diagnostic::new(ErrorKind::UnknownIdentifier(name), location))
    }

    /// The expression a name bound to `data` stands for.
    pub(super) fn identifier_reference(
        &self,
        name: String,
        data: IdentifierData,
        location: SourceLocation,
    ) -> Result<Expression> {
        let index = data.index;
        match data.category {
            IdentifierCategory::Alias => {
                let target = self.registries.aliases.get(index, &location)?.target.clone();
                Ok(Expression::typed(
                    ExpressionKind::Alias(index),
                    location,
                    ExpressionType::Alias(AliasType {
                        alias_index: index,
                        target: Box::new(target),
                    }),
                ))
            }
            IdentifierCategory::Constant => {
                let value = &self.registries.constants.get(index, &location)?.value;
                if value.is_no_value() {
                    return Ok(Expression::typed(
                        ExpressionKind::Identifier(name),
                        location,
                        ExpressionType::NoType,
                    ));
                }
                Ok(constant_expression(value.clone(), location))
            }
            IdentifierCategory::Function => {
                self.registries.functions.get(index, &location)?;
                Ok(Expression::typed(
                    ExpressionKind::Function(index),
                    location,
                    ExpressionType::Function(index),
                ))
            }
            IdentifierCategory::Module => {
                self.registries.modules.get(index, &location)?;
                Ok(Expression::typed(
                    ExpressionKind::Module(index),
                    location,
                    ExpressionType::Module(index),
                ))
            }
            IdentifierCategory::Option => self.option_reference(index, location),
            IdentifierCategory::Struct => {
                self.registries.structs.get(index, &location)?;
                Ok(type_expression(ExpressionType::Struct(index), location))
            }
            IdentifierCategory::Variable => {
                let ty = self.registries.variables.get(index, &location)?.ty.clone();
                Ok(Expression::typed(ExpressionKind::Variable(index), location, ty))
            }
            IdentifierCategory::Unresolved => Ok(Expression::typed(
                ExpressionKind::Identifier(name),
                location,
                ExpressionType::NoType,
            )),
        }
    }

    fn option_reference(&self, index: usize, location: SourceLocation) -> Result<Expression> {
        let option = self.registries.options.get(index, &location)?;
        match &option.value {
            Some(value) => Ok(constant_expression(value.clone(), location)),
            None => Ok(Expression::typed(
                ExpressionKind::Option(index),
                location,
                option.ty.clone(),
            )),
        }
    }

    // ============================================================================
    // Untyped Literals
    // ============================================================================

    /// Gives an untyped constant the base type `target`.
    ///
    /// A value that does not fit is an error; a value of another kind is
    /// returned unchanged for the caller's type check to report.
    pub(super) fn coerce(&self, expr: Expression, target: PrimitiveType) -> Result<Expression> {
        if !expr.expression_type().contains_untyped() {
            return Ok(expr);
        }
        let coerced = match expr.as_constant() {
            Some(ConstantValue::Single(value)) => value.coerce_to(target).map(ConstantValue::Single),
            Some(ConstantValue::Array(array)) => array
                .values()
                .iter()
                .map(|value| value.coerce_to(target))
                .collect::<std::result::Result<Vec<_>, _>>()
                .and_then(|values| {
                    ConstantArrayValue::from_values(values)
                        .map(ConstantValue::Array)
                        .ok_or(CoerceError::Mismatch)
                }),
            _ => return Ok(expr),
        };
        match coerced {
            Ok(value) => Ok(constant_expression(value, expr.location)),
            Err(CoerceError::OutOfRange) => Err(Diagnostic::new(
                ErrorKind::InvalidCast(target.to_string()),
                expr.location,
            )),
            Err(CoerceError::Mismatch) => Ok(expr),
        }
    }

    /// Coerces `expr` towards the base type of `target`.
    pub(super) fn coerce_to_type(
        &self,
        expr: Expression,
        target: &ExpressionType,
    ) -> Result<Expression> {
        let base = match target.resolve_alias() {
            ExpressionType::Array(array) => array.contained.base_type(),
            other => other.base_type(),
        };
        match base {
            Some(base) => self.coerce(expr, base),
            None => Ok(expr),
        }
    }

    /// Gives remaining untyped literals their default type.
    pub(super) fn resolve_default(&self, expr: Expression) -> Result<Expression> {
        match untyped_base(expr.expression_type()) {
            Some(base) => self.coerce(expr, base.resolve_untyped()),
            None => Ok(expr),
        }
    }

    /// An untyped operand takes the base type of the other one.
    fn unify_operands(
        &self,
        left: Expression,
        right: Expression,
    ) -> Result<(Expression, Expression)> {
        let left_base = left.expression_type().base_type();
        let right_base = right.expression_type().base_type();
        match (left_base, right_base) {
            (Some(l), Some(r)) if l.is_untyped() && !r.is_untyped() => {
                Ok((self.coerce(left, r)?, right))
            }
            (Some(l), Some(r)) if r.is_untyped() && !l.is_untyped() => {
                Ok((left, self.coerce(right, l)?))
            }
            (Some(PrimitiveType::UntypedInteger), Some(PrimitiveType::UntypedFloat)) => {
                Ok((self.coerce(left, PrimitiveType::UntypedFloat)?, right))
            }
            (Some(PrimitiveType::UntypedFloat), Some(PrimitiveType::UntypedInteger)) => {
                Ok((left, self.coerce(right, PrimitiveType::UntypedFloat)?))
            }
            _ => Ok((left, right)),
        }
    }

    // ============================================================================
    // Operators
    // ============================================================================

    /// Types, checks and folds `left op right`, both sides already resolved.
    pub(super) fn binary_operation(
        &self,
        op: BinaryOp,
        left: Expression,
        right: Expression,
        location: SourceLocation,
    ) -> Result<Expression> {
        let (left, right) = self.unify_operands(left, right)?;
        if self.is_deferred(left.expression_type()) || self.is_deferred(right.expression_type()) {
            return Ok(Expression::typed(
                ExpressionKind::Binary {
                    op,
                    left: Box::new(self.resolve_default(left)?),
                    right: Box::new(self.resolve_default(right)?),
                },
                location,
                ExpressionType::NoType,
            ));
        }

        let result_type =
            self.binary_type(op, left.expression_type(), right.expression_type(), &location)?;
        self.check_constant_operand(op, &left, &right, &location)?;

        if let (Some(ConstantValue::Single(l)), Some(ConstantValue::Single(r))) =
            (left.as_constant(), right.as_constant())
        {
            if let Some(value) = fold::binary(op, l, r) {
                if value.expression_type() == result_type {
                    return Ok(constant_expression(value.into(), location));
                }
            }
        }

        let left = self.resolve_default(left)?;
        let right = self.resolve_default(right)?;
        Ok(Expression::typed(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            location,
            result_type.resolve_untyped(),
        ))
    }

    /// Result type of `left op right`.
    pub(super) fn binary_type(
        &self,
        op: BinaryOp,
        left: &ExpressionType,
        right: &ExpressionType,
        location: &SourceLocation,
    ) -> Result<ExpressionType> {
        use ExpressionType as Ty;

        let error = |kind| Diagnostic::new(kind, location.clone());
        let unsupported = |side: &str, ty: &ExpressionType| {
            error(ErrorKind::BinaryUnsupported(side.to_string(), self.type_name(ty)))
        };
        let incompatible = || {
            error(ErrorKind::BinaryIncompatibleTypes(
                self.type_name(left),
                self.type_name(right),
            ))
        };

        let Some(left_base) = left.base_type() else {
            return Err(unsupported("left", left));
        };
        let Some(right_base) = right.base_type() else {
            return Err(unsupported("right", right));
        };

        match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => {
                if !left_base.is_numerical() {
                    return Err(unsupported("left", left));
                }
                if !right_base.is_numerical() {
                    return Err(unsupported("right", right));
                }
                let arithmetic_on_matrices = matches!(
                    op,
                    BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply
                );
                match (op, left, right) {
                    (BinaryOp::Multiply, Ty::Matrix(l), Ty::Matrix(r))
                        if l.base == r.base && l.columns == r.rows =>
                    {
                        Ok(Ty::matrix(l.base, r.columns, l.rows))
                    }
                    (BinaryOp::Multiply, Ty::Matrix(m), Ty::Vector(v))
                        if m.base == v.base && m.columns == v.dims =>
                    {
                        Ok(Ty::vector(m.base, m.rows))
                    }
                    (BinaryOp::Multiply, Ty::Vector(v), Ty::Matrix(m))
                        if m.base == v.base && m.rows == v.dims =>
                    {
                        Ok(Ty::vector(m.base, m.columns))
                    }
                    (BinaryOp::Multiply, Ty::Matrix(m), Ty::Primitive(p))
                    | (BinaryOp::Multiply, Ty::Primitive(p), Ty::Matrix(m))
                        if m.base == *p =>
                    {
                        Ok(Ty::Matrix(*m))
                    }
                    (BinaryOp::Add | BinaryOp::Subtract, Ty::Matrix(_), Ty::Matrix(_))
                        if left == right =>
                    {
                        Ok(left.clone())
                    }
                    (_, Ty::Matrix(_), _) if !arithmetic_on_matrices => {
                        Err(unsupported("left", left))
                    }
                    (_, _, Ty::Matrix(_)) if !arithmetic_on_matrices => {
                        Err(unsupported("right", right))
                    }
                    (_, Ty::Matrix(_), _) | (_, _, Ty::Matrix(_)) => Err(incompatible()),
                    _ if left == right => Ok(left.clone()),
                    (_, Ty::Vector(v), Ty::Primitive(p)) if v.base == *p => Ok(left.clone()),
                    (_, Ty::Primitive(p), Ty::Vector(v)) if v.base == *p => Ok(right.clone()),
                    _ => Err(incompatible()),
                }
            }
            BinaryOp::CompEq
            | BinaryOp::CompNe
            | BinaryOp::CompLt
            | BinaryOp::CompLe
            | BinaryOp::CompGt
            | BinaryOp::CompGe => {
                let ordering = !matches!(op, BinaryOp::CompEq | BinaryOp::CompNe);
                if matches!(left, Ty::Matrix(_)) || (ordering && !left_base.is_numerical()) {
                    return Err(unsupported("left", left));
                }
                if matches!(right, Ty::Matrix(_)) || (ordering && !right_base.is_numerical()) {
                    return Err(unsupported("right", right));
                }
                if left != right {
                    return Err(incompatible());
                }
                Ok(match left {
                    Ty::Vector(v) => Ty::vector(PrimitiveType::Bool, v.dims),
                    _ => Ty::bool(),
                })
            }
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
                if *left != Ty::bool() {
                    return Err(unsupported("left", left));
                }
                if *right != Ty::bool() {
                    return Err(unsupported("right", right));
                }
                Ok(Ty::bool())
            }
            BinaryOp::BitwiseAnd
            | BinaryOp::BitwiseOr
            | BinaryOp::BitwiseXor
            | BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight => {
                if !left_base.is_integral() || matches!(left, Ty::Matrix(_)) {
                    return Err(unsupported("left", left));
                }
                if !right_base.is_integral() || matches!(right, Ty::Matrix(_)) {
                    return Err(unsupported("right", right));
                }
                if left != right {
                    return Err(incompatible());
                }
                Ok(left.clone())
            }
        }
    }

    /// Checks a constant right operand: integral division by zero and shift
    /// amounts are rejected whether or not the whole expression folds.
    pub(super) fn check_constant_operand(
        &self,
        op: BinaryOp,
        left: &Expression,
        right: &Expression,
        location: &SourceLocation,
    ) -> Result<()> {
        let Some(ConstantValue::Single(value)) = right.as_constant() else {
            return Ok(());
        };
        let integral = right
            .expression_type()
            .base_type()
            .is_some_and(|base| base.is_integral());

        match op {
            BinaryOp::Divide if integral && value.has_integral_zero() => Err(Diagnostic::new(
                ErrorKind::IntegralDivisionByZero(left.to_string(), right.to_string()),
                location.clone(),
            )),
            BinaryOp::Modulo if integral && value.has_integral_zero() => Err(Diagnostic::new(
                ErrorKind::IntegralModuloByZero(left.to_string(), right.to_string()),
                location.clone(),
            )),
            BinaryOp::ShiftLeft | BinaryOp::ShiftRight => {
                let amounts: Vec<i64> = match value {
                    ConstantSingleValue::Vector(vector) => vector
                        .components()
                        .iter()
                        .filter_map(ConstantSingleValue::as_integer)
                        .collect(),
                    scalar => scalar.as_integer().into_iter().collect(),
                };
                if amounts.iter().any(|&amount| amount < 0) {
                    return Err(Diagnostic::new(
                        ErrorKind::BinaryNegativeShift(
                            left.to_string(),
                            op.symbol().to_string(),
                            right.to_string(),
                        ),
                        location.clone(),
                    ));
                }
                let width = left
                    .expression_type()
                    .base_type()
                    .and_then(|base| base.bit_width());
                if let Some(width) = width {
                    if amounts.iter().any(|&amount| amount >= i64::from(width)) {
                        return Err(Diagnostic::new(
                            ErrorKind::BinaryTooLargeShift(
                                left.to_string(),
                                op.symbol().to_string(),
                                right.to_string(),
                                self.type_name(left.expression_type()),
                            ),
                            location.clone(),
                        ));
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn unary(&mut self, op: UnaryOp, expr: Expression, location: SourceLocation) -> Result<Expression> {
        let expr = self.expression(expr)?;
        let ty = expr.expression_type().clone();
        if self.is_deferred(&ty) {
            return Ok(Expression::typed(
                ExpressionKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
                location,
                ExpressionType::NoType,
            ));
        }

        let is_matrix = matches!(ty, ExpressionType::Matrix(_));
        let supported = ty.base_type().is_some_and(|base| match op {
            UnaryOp::Minus => base.is_numerical() && base.is_signed(),
            UnaryOp::Plus => base.is_numerical(),
            UnaryOp::LogicalNot => base == PrimitiveType::Bool && !is_matrix,
            UnaryOp::BitwiseNot => base.is_integral() && !is_matrix,
        });
        if !supported {
            return Err(Diagnostic::new(
                ErrorKind::UnaryUnsupported(self.type_name(&ty)),
                location,
            ));
        }

        if let Some(ConstantValue::Single(value)) = expr.as_constant() {
            if let Some(folded) = fold::unary(op, value) {
                return Ok(constant_expression(folded.into(), location));
            }
        }

        let expr = self.resolve_default(expr)?;
        let ty = expr.expression_type().clone();
        Ok(Expression::typed(
            ExpressionKind::Unary {
                op,
                expr: Box::new(expr),
            },
            location,
            ty,
        ))
    }

    // ============================================================================
    // Accesses
    // ============================================================================

    fn access_index(
        &mut self,
        expr: Expression,
        indices: Vec<Expression>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let target = self.expression(expr)?;
        match target.expression_type().resolve_alias() {
            ExpressionType::PartialType(partial) => {
                let partial = *partial;
                let ty = self.specialize(partial, indices, &location)?;
                return Ok(type_expression(ty, location));
            }
            ExpressionType::Type(inner) => {
                return Err(Diagnostic::new(
                    ErrorKind::ExpectedPartialType(self.type_name(inner)),
                    location,
                ));
            }
            _ => {}
        }

        if indices.is_empty() {
            return Err(Diagnostic::new(ErrorKind::NoIndex, location));
        }
        let mut current = target;
        for index in indices {
            let index = self.expression(index)?;
            current = self.index_value(current, index, &location)?;
        }
        Ok(current)
    }

    /// `target[index]` for a single index.
    fn index_value(
        &self,
        target: Expression,
        index: Expression,
        location: &SourceLocation,
    ) -> Result<Expression> {
        let target_type = target.expression_type().resolve_alias().clone();

        if let Some(struct_index) = struct_index(&target_type) {
            let index = self.coerce(index, PrimitiveType::I32)?;
            let field = match index.as_constant().and_then(ConstantValue::as_single) {
                Some(ConstantSingleValue::I32(field)) => *field,
                _ => {
                    return Err(Diagnostic::new(
                        ErrorKind::IndexStructRequiresInt32Indices(
                            self.type_name(index.expression_type()),
                        ),
                        index.location.clone(),
                    ));
                }
            };
            let data = self.registries.structs.get(struct_index, location)?;
            let member = usize::try_from(field)
                .ok()
                .and_then(|field| data.fields.get(field))
                .ok_or_else(|| {
                    Diagnostic::new(
                        ErrorKind::IndexOutOfBounds("struct", field),
                        index.location.clone(),
                    )
                })?;
            return Ok(Expression::typed(
                ExpressionKind::AccessField {
                    expr: Box::new(target),
                    field_index: field.unsigned_abs(),
                },
                location.clone(),
                member.ty.clone(),
            ));
        }

        let (element_type, bound, what) = match &target_type {
            ExpressionType::Array(array) => {
                ((*array.contained).clone(), Some(i64::from(array.length)), "array")
            }
            ExpressionType::DynArray(inner) => ((**inner).clone(), None, "array"),
            ExpressionType::Vector(vector) => (
                ExpressionType::Primitive(vector.base),
                Some(i64::from(vector.dims)),
                "vector",
            ),
            ExpressionType::Matrix(matrix) => (
                ExpressionType::vector(matrix.base, matrix.rows),
                Some(i64::from(matrix.columns)),
                "matrix",
            ),
            ty if self.is_deferred(ty) => {
                return Ok(Expression::typed(
                    ExpressionKind::AccessIndex {
                        expr: Box::new(target),
                        indices: vec![self.resolve_default(index)?],
                    },
                    location.clone(),
                    ExpressionType::NoType,
                ));
            }
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::IndexUnexpectedType(self.type_name(other)),
                    location.clone(),
                ));
            }
        };

        let index = self.resolve_default(index)?;
        let index_type = index.expression_type();
        let integral = matches!(
            index_type,
            ExpressionType::Primitive(PrimitiveType::I32 | PrimitiveType::U32)
        );
        if !integral && !self.is_deferred(index_type) {
            return Err(Diagnostic::new(
                ErrorKind::IndexRequiresIntegerIndices(self.type_name(index_type)),
                index.location.clone(),
            ));
        }

        if let Some(value) = constant_index(&index) {
            if value < 0 || bound.is_some_and(|bound| value >= bound) {
                return Err(Diagnostic::new(
                    ErrorKind::IndexOutOfBounds(what, i32::try_from(value).unwrap_or(i32::MAX)),
                    index.location.clone(),
                ));
            }
            let folded = target.as_constant().and_then(|constant| {
                usize::try_from(value)
                    .ok()
                    .and_then(|value| fold::index(constant, value))
            });
            if let Some(folded) = folded {
                return Ok(constant_expression(folded.into(), location.clone()));
            }
        }

        Ok(Expression::typed(
            ExpressionKind::AccessIndex {
                expr: Box::new(target),
                indices: vec![index],
            },
            location.clone(),
            element_type,
        ))
    }

    fn access_identifier(
        &mut self,
        expr: Expression,
        identifier: Spanned<String>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let target = self.expression(expr)?;
        let target_type = target.expression_type().resolve_alias().clone();
        let name = identifier.inner().clone();

        if let ExpressionType::Module(module) = target_type {
            let exported = self
                .registries
                .modules
                .get(module, &location)?
                .exports
                .get(&name)
                .copied();
            let Some(data) = exported else {
                return Err(Diagnostic::new(
                    ErrorKind::UnknownIdentifier(name),
                    identifier.location().clone(),
                ));
            };
            return self.identifier_reference(name, data, location);
        }

        if let Some(struct_index) = struct_index(&target_type) {
            let data = self.registries.structs.get(struct_index, &location)?;
            let Some((field_index, field)) = data.field(&name) else {
                return Err(Diagnostic::new(
                    ErrorKind::UnknownField(name),
                    identifier.location().clone(),
                ));
            };
            let field_type = field.ty.clone();
            return Ok(Expression::typed(
                ExpressionKind::AccessField {
                    expr: Box::new(target),
                    field_index: u32::try_from(field_index).unwrap_or(u32::MAX),
                },
                location,
                field_type,
            ));
        }

        match &target_type {
            ExpressionType::Primitive(PrimitiveType::String) => Err(Diagnostic::new(
                ErrorKind::SwizzleUnexpectedType(self.type_name(&target_type)),
                location,
            )),
            ExpressionType::Primitive(_) | ExpressionType::Vector(_) => {
                let Some(components) = swizzle_components(&name) else {
                    return Err(Diagnostic::new(
                        ErrorKind::InvalidSwizzle(name),
                        identifier.location().clone(),
                    ));
                };
                self.swizzle(target, components, &name, location)
            }
            ExpressionType::Array(_)
            | ExpressionType::DynArray(_)
            | ExpressionType::Sampler(_)
            | ExpressionType::Texture(_) => {
                let Some(method) = method_for(&target_type, &name) else {
                    return Err(Diagnostic::new(
                        ErrorKind::UnknownMethod(self.type_name(&target_type), name),
                        identifier.location().clone(),
                    ));
                };
                let method_type = ExpressionType::Method(MethodType {
                    object: Box::new(target_type.clone()),
                    method,
                });
                Ok(Expression::typed(
                    ExpressionKind::AccessIdentifier {
                        expr: Box::new(target),
                        identifier,
                    },
                    location,
                    method_type,
                ))
            }
            ty if self.is_deferred(ty) => Ok(Expression::typed(
                ExpressionKind::AccessIdentifier {
                    expr: Box::new(target),
                    identifier,
                },
                location,
                ExpressionType::NoType,
            )),
            ExpressionType::Function(_)
            | ExpressionType::IntrinsicFunction(_)
            | ExpressionType::Method(_)
            | ExpressionType::Type(_)
            | ExpressionType::PartialType(_)
            | ExpressionType::NoType => {
                Err(Diagnostic::new(ErrorKind::UnexpectedAccessedType, location))
            }
            other => Err(Diagnostic::new(
                ErrorKind::SwizzleUnexpectedType(self.type_name(other)),
                location,
            )),
        }
    }

    fn swizzle(
        &self,
        target: Expression,
        components: Vec<u8>,
        name: &str,
        location: SourceLocation,
    ) -> Result<Expression> {
        let (base, dims) = match target.expression_type() {
            ExpressionType::Primitive(base) if *base != PrimitiveType::String => (*base, 1),
            ExpressionType::Vector(vector) => (vector.base, vector.dims),
            ty if self.is_deferred(ty) => {
                return Ok(Expression::typed(
                    ExpressionKind::Swizzle {
                        expr: Box::new(target),
                        components,
                    },
                    location,
                    ExpressionType::NoType,
                ));
            }
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::SwizzleUnexpectedType(self.type_name(other)),
                    location,
                ));
            }
        };

        if components.is_empty() || components.len() > 4 {
            return Err(Diagnostic::new(
                ErrorKind::InvalidSwizzle(name.to_string()),
                location,
            ));
        }
        if dims == 1 {
            if components.iter().any(|&c| c != 0) {
                return Err(Diagnostic::new(ErrorKind::InvalidScalarSwizzle, location));
            }
        } else if components.iter().any(|&c| c >= dims) {
            return Err(Diagnostic::new(
                ErrorKind::InvalidSwizzle(name.to_string()),
                location,
            ));
        }

        if let Some(ConstantValue::Single(value)) = target.as_constant() {
            if let Some(folded) = fold::swizzle(value, &components) {
                return Ok(constant_expression(folded.into(), location));
            }
        }

        let result_type = match components.len() {
            1 => ExpressionType::Primitive(base),
            count => ExpressionType::vector(base, u8::try_from(count).unwrap_or(4)),
        };
        let target = self.resolve_default(target)?;
        Ok(Expression::typed(
            ExpressionKind::Swizzle {
                expr: Box::new(target),
                components,
            },
            location,
            result_type.resolve_untyped(),
        ))
    }

    fn assign(
        &mut self,
        op: AssignOp,
        left: Expression,
        right: Expression,
        location: SourceLocation,
    ) -> Result<Expression> {
        let left = self.expression(left)?;
        let right = self.expression(right)?;
        if !is_assignable(&left) {
            return Err(Diagnostic::new(ErrorKind::AssignTemporary, left.location.clone()));
        }

        let left_type = left.expression_type().clone();
        let right = self.coerce_to_type(right, &left_type)?;
        let right = self.resolve_default(right)?;
        let right_type = right.expression_type();

        if !self.is_deferred(&left_type) && !self.is_deferred(right_type) {
            let value_type = match op.binary_op() {
                Some(binary) => {
                    let ty = self.binary_type(binary, &left_type, right_type, &location)?;
                    self.check_constant_operand(binary, &left, &right, &location)?;
                    ty
                }
                None => right_type.clone(),
            };
            if value_type != left_type {
                return Err(Diagnostic::new(
                    ErrorKind::UnmatchingTypes(
                        self.type_name(&left_type),
                        self.type_name(&value_type),
                    ),
                    location,
                ));
            }
        }

        Ok(Expression::typed(
            ExpressionKind::Assign {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            location,
            left_type,
        ))
    }

    // ============================================================================
    // Calls
    // ============================================================================

    fn call(
        &mut self,
        target: Expression,
        parameters: Vec<Expression>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let target = self.expression(target)?;
        match target.expression_type().resolve_alias() {
            ExpressionType::Type(_) => return self.cast(target, parameters, location),
            ExpressionType::PartialType(partial) => {
                return Err(Diagnostic::new(
                    ErrorKind::FullTypeExpected(partial.to_string()),
                    target.location.clone(),
                ));
            }
            _ => {}
        }

        let mut parameters = self.expressions(parameters)?;
        match target.expression_type().resolve_alias().clone() {
            ExpressionType::Function(index) => {
                self.call_function(target, index, parameters, location)
            }
            ExpressionType::IntrinsicFunction(intrinsic) => {
                self.intrinsic(intrinsic, parameters, location)
            }
            ExpressionType::Method(method) => {
                let ExpressionKind::AccessIdentifier { expr: object, .. } = target.kind else {
                    return Err(Diagnostic::new(
                        ErrorKind::Internal("method without an object".to_string()),
                        location,
                    ));
                };
                parameters.insert(0, *object);
                self.intrinsic(method.method, parameters, location)
            }
            ty if self.is_deferred(&ty) => {
                let parameters = parameters
                    .into_iter()
                    .map(|parameter| self.resolve_default(parameter))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Expression::typed(
                    ExpressionKind::CallFunction {
                        target: Box::new(target),
                        parameters,
                    },
                    location,
                    ExpressionType::NoType,
                ))
            }
            _ => Err(Diagnostic::new(
                ErrorKind::FunctionCallExpectedFunction,
                target.location.clone(),
            )),
        }
    }

    fn call_function(
        &mut self,
        target: Expression,
        index: usize,
        parameters: Vec<Expression>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let Some(caller) = self.state.current_function else {
            return Err(Diagnostic::new(ErrorKind::FunctionCallOutsideOfFunction, location));
        };
        let function = self.registries.functions.get(index, &location)?;
        if function.stage.is_some() {
            return Err(Diagnostic::new(
                ErrorKind::FunctionCallUnexpectedEntryFunction(function.name.clone()),
                location,
            ));
        }
        let name = function.name.clone();
        let expected = function.parameters.clone();
        let return_type = function.return_type.clone();

        if parameters.len() != expected.len() {
            return Err(Diagnostic::new(
                ErrorKind::FunctionCallUnmatchingParameterCount(
                    name,
                    u32::try_from(expected.len()).unwrap_or(u32::MAX),
                    u32::try_from(parameters.len()).unwrap_or(u32::MAX),
                ),
                location,
            ));
        }

        let mut checked = Vec::with_capacity(parameters.len());
        for (position, (parameter, expected)) in parameters.into_iter().zip(&expected).enumerate() {
            let parameter = self.coerce_to_type(parameter, expected)?;
            let parameter = self.resolve_default(parameter)?;
            let actual = parameter.expression_type();
            if actual != expected && !self.is_deferred(actual) {
                return Err(Diagnostic::new(
                    ErrorKind::FunctionCallUnmatchingParameterType(
                        name,
                        u32::try_from(position).unwrap_or(u32::MAX),
                        self.type_name(expected),
                        self.type_name(actual),
                    ),
                    parameter.location.clone(),
                ));
            }
            checked.push(parameter);
        }

        self.registries
            .functions
            .get_mut(caller, &location)?
            .calls
            .push((index, location.clone()));

        Ok(Expression::typed(
            ExpressionKind::CallFunction {
                target: Box::new(target),
                parameters: checked,
            },
            location,
            return_type,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swizzle_components() {
        assert_eq!(swizzle_components("xyz"), Some(vec![0, 1, 2]));
        assert_eq!(swizzle_components("bgra"), Some(vec![2, 1, 0, 3]));
        assert_eq!(swizzle_components("xg"), None);
        assert_eq!(swizzle_components("xyzwx"), None);
        assert_eq!(swizzle_components(""), None);
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_name("f32"));
        assert!(is_reserved_name("vec3"));
        assert!(is_reserved_name("mat9"));
        assert!(is_reserved_name("sampler2D"));
        assert!(!is_reserved_name("color"));
    }

    #[test]
    fn test_method_lookup() {
        let array = ExpressionType::array(ExpressionType::primitive(PrimitiveType::F32), 4);
        assert_eq!(method_for(&array, "Size"), Some(IntrinsicType::ArraySize));
        assert_eq!(method_for(&array, "Sample"), None);
    }
}
