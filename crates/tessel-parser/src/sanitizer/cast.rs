//! Type constructors: `f32(x)`, `vec3[f32](a, b)`, `mat2[f32](c0, c1)`,
//! `array[i32](1, 2, 3)`.

use tessel_core::{
    constant::{ConstantArrayValue, ConstantSingleValue, ConstantValue, ConstantVector},
    types::{ArrayType, ExpressionType, MatrixType, PrimitiveType, VectorType},
};

use crate::{
    ast::{Expression, ExpressionKind},
    error::{Diagnostic, ErrorKind, Result},
    span::SourceLocation,
};

use super::{
    Sanitizer,
    expression::{constant_expression, type_expression},
};

fn count(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Components of the scalar and vector values in `values`, in order.
fn flatten(values: &[&ConstantSingleValue]) -> Vec<ConstantSingleValue> {
    values
        .iter()
        .flat_map(|value| match value {
            ConstantSingleValue::Vector(vector) => vector.components(),
            scalar => vec![(*scalar).clone()],
        })
        .collect()
}

impl Sanitizer<'_> {
    /// Resolves a constructor call. `target` is already sanitized, the
    /// arguments are not.
    pub(super) fn cast(
        &mut self,
        target: Expression,
        expressions: Vec<Expression>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let target_type = match target.expression_type().resolve_alias() {
            ExpressionType::Type(inner) => (**inner).clone(),
            ExpressionType::PartialType(partial) => {
                return Err(Diagnostic::new(
                    ErrorKind::FullTypeExpected(partial.to_string()),
                    target.location.clone(),
                ));
            }
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::InvalidCast(self.type_name(other)),
                    target.location.clone(),
                ));
            }
        };
        let arguments = self.expressions(expressions)?;

        let (result_type, arguments) = match &target_type {
            ExpressionType::Primitive(primitive) => {
                self.cast_primitive(*primitive, arguments, &location)?
            }
            ExpressionType::Vector(vector) => self.cast_vector(*vector, arguments, &location)?,
            ExpressionType::Matrix(matrix) => self.cast_matrix(*matrix, arguments, &location)?,
            ExpressionType::Array(array) => self.cast_array(array, arguments, &location)?,
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::InvalidCast(self.type_name(other)),
                    location,
                ));
            }
        };

        if let Some(value) = fold_cast(&result_type, &arguments) {
            return Ok(constant_expression(value, location));
        }

        Ok(Expression::typed(
            ExpressionKind::Cast {
                target: Box::new(type_expression(result_type.clone(), target.location)),
                expressions: arguments,
            },
            location,
            result_type,
        ))
    }

    /// Untyped literals take `base` when they can, their default otherwise.
    fn cast_argument(&self, argument: Expression, base: PrimitiveType) -> Result<Expression> {
        let argument = self.coerce(argument, base)?;
        self.resolve_default(argument)
    }

    fn cast_primitive(
        &self,
        target: PrimitiveType,
        arguments: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<(ExpressionType, Vec<Expression>)> {
        let [argument] = <[Expression; 1]>::try_from(arguments).map_err(|arguments| {
            Diagnostic::new(
                ErrorKind::CastComponentMismatch(count(arguments.len()), 1),
                location.clone(),
            )
        })?;
        let argument = self.cast_argument(argument, target)?;
        match argument.expression_type() {
            ExpressionType::Primitive(source) => {
                let convertible = *source == target || (source.is_numerical() && target.is_numerical());
                if !convertible {
                    return Err(Diagnostic::new(
                        ErrorKind::CastIncompatibleBaseTypes(target.to_string(), source.to_string()),
                        argument.location.clone(),
                    ));
                }
            }
            ty if self.is_deferred(ty) => {}
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::CastIncompatibleTypes(target.to_string(), self.type_name(other)),
                    argument.location.clone(),
                ));
            }
        }
        Ok((ExpressionType::Primitive(target), vec![argument]))
    }

    fn cast_vector(
        &self,
        target: VectorType,
        arguments: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<(ExpressionType, Vec<Expression>)> {
        let result = ExpressionType::Vector(target);
        let arguments = arguments
            .into_iter()
            .map(|argument| self.cast_argument(argument, target.base))
            .collect::<Result<Vec<_>>>()?;

        // A single vector of the same size converts its components.
        if let [argument] = arguments.as_slice() {
            if let ExpressionType::Vector(source) = argument.expression_type() {
                if source.dims == target.dims {
                    let convertible = source.base == target.base
                        || (source.base.is_numerical() && target.base.is_numerical());
                    if !convertible {
                        return Err(Diagnostic::new(
                            ErrorKind::CastIncompatibleBaseTypes(
                                target.base.to_string(),
                                source.base.to_string(),
                            ),
                            argument.location.clone(),
                        ));
                    }
                    return Ok((result, arguments));
                }
            }
        }

        let mut components = 0u32;
        for argument in &arguments {
            let ty = argument.expression_type();
            if self.is_deferred(ty) {
                return Ok((result, arguments));
            }
            let (base, dims) = match ty {
                ExpressionType::Primitive(base) => (*base, 1),
                ExpressionType::Vector(vector) => (vector.base, vector.dims),
                other => {
                    return Err(Diagnostic::new(
                        ErrorKind::CastIncompatibleTypes(
                            self.type_name(&result),
                            self.type_name(other),
                        ),
                        argument.location.clone(),
                    ));
                }
            };
            if base != target.base {
                return Err(Diagnostic::new(
                    ErrorKind::CastIncompatibleBaseTypes(target.base.to_string(), base.to_string()),
                    argument.location.clone(),
                ));
            }
            components += u32::from(dims);
        }

        // A single scalar is splatted.
        let splat = arguments.len() == 1 && components == 1;
        if !splat && components != u32::from(target.dims) {
            return Err(Diagnostic::new(
                ErrorKind::CastComponentMismatch(components, u32::from(target.dims)),
                location.clone(),
            ));
        }
        Ok((result, arguments))
    }

    fn cast_matrix(
        &self,
        target: MatrixType,
        arguments: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<(ExpressionType, Vec<Expression>)> {
        let result = ExpressionType::Matrix(target);
        let arguments = arguments
            .into_iter()
            .map(|argument| self.cast_argument(argument, target.base))
            .collect::<Result<Vec<_>>>()?;

        if let [argument] = arguments.as_slice() {
            match argument.expression_type() {
                ExpressionType::Matrix(source) => {
                    if !source.base.is_floating_point() {
                        return Err(Diagnostic::new(
                            ErrorKind::CastIncompatibleBaseTypes(
                                target.base.to_string(),
                                source.base.to_string(),
                            ),
                            argument.location.clone(),
                        ));
                    }
                    return Ok((result, arguments));
                }
                // Diagonal matrix.
                ExpressionType::Primitive(base) if *base == target.base => {
                    return Ok((result, arguments));
                }
                _ => {}
            }
        }

        let mut components = 0u32;
        for argument in &arguments {
            let (base, dims) = match argument.expression_type() {
                ExpressionType::Primitive(base) => (*base, 1),
                ExpressionType::Vector(vector) => {
                    if vector.dims != target.rows {
                        return Err(Diagnostic::new(
                            ErrorKind::CastMatrixVectorComponentMismatch(
                                u32::from(vector.dims),
                                u32::from(target.rows),
                            ),
                            argument.location.clone(),
                        ));
                    }
                    (vector.base, vector.dims)
                }
                ty if self.is_deferred(ty) => return Ok((result, arguments)),
                other => {
                    return Err(Diagnostic::new(
                        ErrorKind::CastMatrixExpectedVectorOrScalar(self.type_name(other)),
                        argument.location.clone(),
                    ));
                }
            };
            if base != target.base {
                return Err(Diagnostic::new(
                    ErrorKind::CastIncompatibleBaseTypes(target.base.to_string(), base.to_string()),
                    argument.location.clone(),
                ));
            }
            components += u32::from(dims);
        }

        let expected = u32::from(target.columns) * u32::from(target.rows);
        if components != expected {
            return Err(Diagnostic::new(
                ErrorKind::CastComponentMismatch(components, expected),
                location.clone(),
            ));
        }
        Ok((result, arguments))
    }

    fn cast_array(
        &self,
        target: &ArrayType,
        arguments: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<(ExpressionType, Vec<Expression>)> {
        let contained = (*target.contained).clone();
        let arguments = arguments
            .into_iter()
            .map(|argument| {
                let argument = self.coerce_to_type(argument, &contained)?;
                self.resolve_default(argument)
            })
            .collect::<Result<Vec<_>>>()?;

        for argument in &arguments {
            let ty = argument.expression_type();
            if *ty != contained && !self.is_deferred(ty) {
                return Err(Diagnostic::new(
                    ErrorKind::CastIncompatibleTypes(self.type_name(&contained), self.type_name(ty)),
                    argument.location.clone(),
                ));
            }
        }

        let length = match target.length {
            0 if arguments.is_empty() => {
                return Err(Diagnostic::new(ErrorKind::ArrayLengthRequired, location.clone()));
            }
            0 => count(arguments.len()),
            length if count(arguments.len()) != length => {
                return Err(Diagnostic::new(
                    ErrorKind::CastComponentMismatch(count(arguments.len()), length),
                    location.clone(),
                ));
            }
            length => length,
        };
        Ok((ExpressionType::array(contained, length), arguments))
    }
}

/// Evaluates a constructor whose arguments are all constants.
fn fold_cast(result_type: &ExpressionType, arguments: &[Expression]) -> Option<ConstantValue> {
    let values = arguments
        .iter()
        .map(|argument| argument.as_constant().and_then(ConstantValue::as_single))
        .collect::<Option<Vec<_>>>()?;

    match result_type {
        ExpressionType::Primitive(target) => {
            let [value] = values.as_slice() else {
                return None;
            };
            value.cast_to(*target).map(ConstantValue::Single)
        }
        ExpressionType::Vector(target) => {
            let mut components = flatten(&values);
            if components.len() == 1 {
                components = vec![components[0].clone(); usize::from(target.dims)];
            }
            let components = components
                .iter()
                .map(|component| component.cast_to(target.base))
                .collect::<Option<Vec<_>>>()?;
            if components.len() != usize::from(target.dims) {
                return None;
            }
            ConstantVector::from_components(components)
                .map(|vector| ConstantValue::Single(ConstantSingleValue::Vector(vector)))
        }
        ExpressionType::Array(array) => {
            ConstantArrayValue::new((*array.contained).clone(), values.into_iter().cloned().collect())
                .map(ConstantValue::Array)
        }
        _ => None,
    }
}
