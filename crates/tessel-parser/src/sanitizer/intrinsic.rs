//! Intrinsic call checking against the rules of the intrinsic catalogue.

use tessel_core::{
    intrinsic::{IntrinsicType, ParameterRule, ReturnRule},
    types::{ExpressionType, PrimitiveType},
};

use crate::{
    ast::{Expression, ExpressionKind},
    error::{Diagnostic, ErrorKind, Result},
    span::SourceLocation,
};

use super::Sanitizer;

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Scalar for one coordinate, vector otherwise.
fn coordinates(base: PrimitiveType, dims: u8) -> ExpressionType {
    if dims == 1 {
        ExpressionType::Primitive(base)
    } else {
        ExpressionType::vector(base, dims)
    }
}

/// Parameter a rule ties parameter `index` to.
fn group_of(rules: &[ParameterRule], index: usize) -> usize {
    match rules[index] {
        ParameterRule::SameAs(other) => other,
        _ => index,
    }
}

/// The base type untyped literals of a `SameAs` group take: the first
/// concrete base in the group, else untyped float if any member is a float.
fn group_base(
    parameters: &[Expression],
    rules: &[ParameterRule],
    root: usize,
) -> Option<PrimitiveType> {
    let bases: Vec<PrimitiveType> = (0..rules.len())
        .filter(|&i| group_of(rules, i) == root)
        .filter_map(|i| parameters[i].expression_type().base_type())
        .collect();
    bases
        .iter()
        .copied()
        .find(|base| !base.is_untyped())
        .or_else(|| bases.contains(&PrimitiveType::UntypedFloat).then_some(PrimitiveType::UntypedFloat))
}

impl Sanitizer<'_> {
    /// Checks and types a call to `intrinsic` with resolved `parameters`.
    pub(super) fn intrinsic(
        &mut self,
        intrinsic: IntrinsicType,
        parameters: Vec<Expression>,
        location: SourceLocation,
    ) -> Result<Expression> {
        let rules = intrinsic.parameters();
        if parameters.len() != rules.len() {
            return Err(Diagnostic::new(
                ErrorKind::IntrinsicExpectedParameterCount(position(rules.len())),
                location,
            ));
        }

        let targets: Vec<Option<PrimitiveType>> = (0..rules.len())
            .map(|i| group_base(&parameters, rules, group_of(rules, i)))
            .collect();
        let parameters = parameters
            .into_iter()
            .zip(targets)
            .map(|(parameter, target)| {
                let parameter = match target {
                    Some(target) => self.coerce(parameter, target)?,
                    None => parameter,
                };
                self.resolve_default(parameter)
            })
            .collect::<Result<Vec<_>>>()?;

        let deferred = parameters
            .iter()
            .any(|parameter| self.is_deferred(parameter.expression_type()));
        if !deferred {
            for (index, rule) in rules.iter().enumerate() {
                self.check_parameter(index, *rule, &parameters)?;
            }
            for (index, rule) in intrinsic.component_constraints() {
                self.check_parameter(*index, *rule, &parameters)?;
            }
        }

        let return_type = if deferred {
            ExpressionType::NoType
        } else {
            self.intrinsic_return_type(intrinsic.return_rule(), &parameters, &location)?
        };
        Ok(Expression::typed(
            ExpressionKind::Intrinsic {
                intrinsic,
                parameters,
            },
            location,
            return_type,
        ))
    }

    fn check_parameter(
        &self,
        index: usize,
        rule: ParameterRule,
        parameters: &[Expression],
    ) -> Result<()> {
        let parameter = &parameters[index];
        let ty = parameter.expression_type().resolve_alias();
        let error = |kind: ErrorKind| -> Result<()> {
            Err(Diagnostic::new(kind, parameter.location.clone()))
        };
        let expected = |what: String| {
            error(ErrorKind::IntrinsicExpectedType(
                position(index),
                what,
                self.type_name(ty),
            ))
        };
        let is_bool = ty.base_type() == Some(PrimitiveType::Bool);
        let scalar_or_vector = matches!(ty, ExpressionType::Primitive(_) | ExpressionType::Vector(_));

        match rule {
            ParameterRule::Array => match ty {
                ExpressionType::Array(_) | ExpressionType::DynArray(_) => Ok(()),
                _ => expected("array".to_string()),
            },
            ParameterRule::BoolVector => match ty {
                ExpressionType::Vector(vector) if vector.base == PrimitiveType::Bool => Ok(()),
                _ => expected("vector of booleans".to_string()),
            },
            ParameterRule::Boolean => {
                if is_bool && scalar_or_vector {
                    Ok(())
                } else {
                    expected("bool".to_string())
                }
            }
            ParameterRule::Float => match ty.base_type() {
                Some(base) if scalar_or_vector && base.is_floating_point() => Ok(()),
                Some(_) if scalar_or_vector => error(ErrorKind::IntrinsicExpectedFloat),
                _ => expected("floating-point scalar or vector".to_string()),
            },
            ParameterRule::FloatMatrix => match ty {
                ExpressionType::Matrix(matrix) if matrix.base.is_floating_point() => Ok(()),
                _ => expected("floating-point matrix".to_string()),
            },
            ParameterRule::SquareFloatMatrix => match ty {
                ExpressionType::Matrix(matrix)
                    if matrix.base.is_floating_point() && matrix.columns == matrix.rows =>
                {
                    Ok(())
                }
                _ => expected("square floating-point matrix".to_string()),
            },
            ParameterRule::FloatVector => match ty {
                ExpressionType::Vector(vector) if vector.base.is_floating_point() => Ok(()),
                _ if is_bool => error(ErrorKind::IntrinsicUnexpectedBoolean),
                _ => expected("floating-point vector".to_string()),
            },
            ParameterRule::FloatVector3 => match ty {
                ExpressionType::Vector(vector)
                    if vector.base.is_floating_point() && vector.dims == 3 =>
                {
                    Ok(())
                }
                _ => expected("floating-point vec3".to_string()),
            },
            ParameterRule::Numerical => match ty.base_type() {
                Some(PrimitiveType::Bool) => error(ErrorKind::IntrinsicUnexpectedBoolean),
                Some(base) if base.is_numerical() => Ok(()),
                _ => expected("numerical".to_string()),
            },
            ParameterRule::SignedNumerical => match ty.base_type() {
                Some(PrimitiveType::Bool) => error(ErrorKind::IntrinsicUnexpectedBoolean),
                Some(base) if scalar_or_vector && base.is_numerical() && base.is_signed() => Ok(()),
                _ => expected("signed scalar or vector".to_string()),
            },
            ParameterRule::SameAs(other) => {
                if parameters[other].expression_type().resolve_alias() == ty {
                    Ok(())
                } else {
                    error(ErrorKind::IntrinsicUnmatchingParameterType(
                        position(other),
                        position(index),
                    ))
                }
            }
            ParameterRule::SameComponentCountAs(other) => {
                let other_count = parameters[other].expression_type().component_count();
                if ty.component_count().is_some() && ty.component_count() == other_count {
                    Ok(())
                } else {
                    error(ErrorKind::IntrinsicUnmatchingVecComponent(
                        position(other),
                        position(index),
                    ))
                }
            }
            ParameterRule::Sampler => match ty {
                ExpressionType::Sampler(_) => Ok(()),
                _ => expected("sampler".to_string()),
            },
            ParameterRule::Texture => match ty {
                ExpressionType::Texture(_) => Ok(()),
                _ => expected("texture".to_string()),
            },
            ParameterRule::SamplerCoordinates(other) => {
                let ExpressionType::Sampler(sampler) = parameters[other].expression_type() else {
                    return Ok(());
                };
                let wanted = coordinates(PrimitiveType::F32, sampler.dim.coordinate_count());
                if *ty == wanted {
                    Ok(())
                } else {
                    expected(self.type_name(&wanted))
                }
            }
            ParameterRule::TextureCoordinates(other) => {
                let ExpressionType::Texture(texture) = parameters[other].expression_type() else {
                    return Ok(());
                };
                let wanted = coordinates(PrimitiveType::I32, texture.dim.coordinate_count());
                if *ty == wanted {
                    Ok(())
                } else {
                    expected(self.type_name(&wanted))
                }
            }
            ParameterRule::TextureTexel(other) => {
                let ExpressionType::Texture(texture) = parameters[other].expression_type() else {
                    return Ok(());
                };
                let wanted = ExpressionType::vector(texture.base, 4);
                if *ty == wanted {
                    Ok(())
                } else {
                    expected(self.type_name(&wanted))
                }
            }
        }
    }

    fn intrinsic_return_type(
        &self,
        rule: ReturnRule,
        parameters: &[Expression],
        location: &SourceLocation,
    ) -> Result<ExpressionType> {
        let parameter = |index: usize| {
            parameters
                .get(index)
                .map(|parameter| parameter.expression_type().resolve_alias())
                .ok_or_else(|| {
                    Diagnostic::new(
                        ErrorKind::Internal(format!("intrinsic return refers to parameter #{index}")),
                        location.clone(),
                    )
                })
        };
        let unexpected = |ty: &ExpressionType| {
            Diagnostic::new(
                ErrorKind::Internal(format!("unexpected intrinsic parameter type {}", self.type_name(ty))),
                location.clone(),
            )
        };

        Ok(match rule {
            ReturnRule::Bool => ExpressionType::bool(),
            ReturnRule::U32 => ExpressionType::primitive(PrimitiveType::U32),
            ReturnRule::Void => ExpressionType::NoType,
            ReturnRule::Parameter(index) => parameter(index)?.clone(),
            ReturnRule::ParameterBase(index) => {
                let ty = parameter(index)?;
                ExpressionType::Primitive(ty.base_type().ok_or_else(|| unexpected(ty))?)
            }
            ReturnRule::SampledTexel(index) => match parameter(index)? {
                ExpressionType::Sampler(sampler) => ExpressionType::vector(sampler.base, 4),
                ExpressionType::Texture(texture) => ExpressionType::vector(texture.base, 4),
                other => return Err(unexpected(other)),
            },
            ReturnRule::Transposed(index) => match parameter(index)? {
                ExpressionType::Matrix(matrix) => {
                    ExpressionType::matrix(matrix.base, matrix.rows, matrix.columns)
                }
                other => return Err(unexpected(other)),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_as_group_base() {
        let rules = IntrinsicType::Max.parameters();
        let untyped = Expression::typed(
            ExpressionKind::Constant(tessel_core::constant::ConstantSingleValue::UntypedInteger(1).into()),
            SourceLocation::unknown(),
            ExpressionType::primitive(PrimitiveType::UntypedInteger),
        );
        let typed = Expression::typed(
            ExpressionKind::Variable(0),
            SourceLocation::unknown(),
            ExpressionType::primitive(PrimitiveType::U32),
        );
        assert_eq!(group_base(&[untyped.clone(), typed], rules, 0), Some(PrimitiveType::U32));
        assert_eq!(group_base(&[untyped.clone(), untyped], rules, 0), None);
    }

    #[test]
    fn test_coordinates_shape() {
        assert_eq!(coordinates(PrimitiveType::I32, 1), ExpressionType::primitive(PrimitiveType::I32));
        assert_eq!(coordinates(PrimitiveType::F32, 3), ExpressionType::vector(PrimitiveType::F32, 3));
    }
}
