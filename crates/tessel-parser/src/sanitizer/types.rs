//! Type expressions, partial type specialization and attribute values.

use std::str::FromStr;

use tessel_core::{
    attribute::{AccessPolicy, AttributeType, ImageFormat},
    constant::{ConstantSingleValue, ConstantValue},
    types::{
        ExpressionType, PartialType, PartialTypeParameter, PrimitiveType, SamplerType,
        StorageType, TextureType,
    },
};

use crate::{
    ast::{AttributeValue, Expression},
    error::{Diagnostic, ErrorKind, Result},
    span::SourceLocation,
};

use super::Sanitizer;

fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Specialization arguments, sorted by kind.
#[derive(Default)]
struct Arguments {
    types: Vec<(ExpressionType, SourceLocation)>,
    identifiers: Vec<(String, SourceLocation)>,
    constants: Vec<(ConstantValue, SourceLocation)>,
}

/// Outcome of a compile-time condition.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Condition {
    Active,
    Inactive,
    /// Not foldable yet; only under partial analysis.
    Deferred(Expression),
}

impl Sanitizer<'_> {
    /// Resolves an expression that must name a full type.
    pub(super) fn resolve_type(&mut self, expr: Expression) -> Result<(Expression, ExpressionType)> {
        let expr = self.expression(expr)?;
        let ty = match expr.expression_type().resolve_alias() {
            ExpressionType::Type(inner) => (**inner).clone(),
            ExpressionType::PartialType(partial) => {
                return Err(Diagnostic::new(
                    ErrorKind::FullTypeExpected(partial.to_string()),
                    expr.location.clone(),
                ));
            }
            ty if self.is_deferred(ty) => ExpressionType::NoType,
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::FullTypeExpected(self.type_name(other)),
                    expr.location.clone(),
                ));
            }
        };
        Ok((expr, ty))
    }

    /// Rejects arrays whose length was left to be inferred.
    pub(super) fn check_sized(&self, ty: &ExpressionType, location: &SourceLocation) -> Result<()> {
        match ty {
            ExpressionType::Array(array) if array.length == 0 => {
                Err(Diagnostic::new(ErrorKind::ArrayLengthRequired, location.clone()))
            }
            ExpressionType::Array(array) => self.check_sized(&array.contained, location),
            ExpressionType::DynArray(inner) => self.check_sized(inner, location),
            _ => Ok(()),
        }
    }

    // ============================================================================
    // Partial Types
    // ============================================================================

    /// Builds the full type `partial[arguments...]`.
    pub(super) fn specialize(
        &mut self,
        partial: PartialType,
        arguments: Vec<Expression>,
        location: &SourceLocation,
    ) -> Result<ExpressionType> {
        let required = partial.required_parameters();
        let optional = partial.optional_parameters();
        if arguments.len() < required.len() {
            return Err(Diagnostic::new(
                ErrorKind::PartialTypeTooFewParameters(
                    position(required.len()),
                    position(arguments.len()),
                ),
                location.clone(),
            ));
        }
        if arguments.len() > required.len() + optional.len() {
            return Err(Diagnostic::new(
                ErrorKind::PartialTypeTooManyParameters(
                    position(required.len() + optional.len()),
                    position(arguments.len()),
                ),
                location.clone(),
            ));
        }

        let mut sorted = Arguments::default();
        let kinds = required.iter().chain(optional);
        for (index, (argument, kind)) in arguments.into_iter().zip(kinds).enumerate() {
            let expect = |what: String, location: SourceLocation| {
                Diagnostic::new(ErrorKind::PartialTypeExpect(what, position(index)), location)
            };
            match kind {
                PartialTypeParameter::Identifier => {
                    let Some(name) = argument.as_identifier() else {
                        return Err(expect(kind.to_string(), argument.location));
                    };
                    sorted.identifiers.push((name.to_string(), argument.location.clone()));
                }
                PartialTypeParameter::Type => {
                    let argument = self.expression(argument)?;
                    match argument.expression_type().resolve_alias() {
                        ExpressionType::Type(inner) => {
                            sorted.types.push(((**inner).clone(), argument.location.clone()));
                        }
                        _ => return Err(expect(kind.to_string(), argument.location)),
                    }
                }
                PartialTypeParameter::ConstantValue => {
                    let argument = self.expression(argument)?;
                    let argument = self.resolve_default(argument)?;
                    let Some(value) = argument.as_constant() else {
                        return Err(Diagnostic::new(
                            ErrorKind::ConstantExpressionRequired,
                            argument.location,
                        ));
                    };
                    sorted.constants.push((value.clone(), argument.location.clone()));
                }
            }
        }

        self.build_type(partial, sorted, location)
    }

    fn build_type(
        &self,
        partial: PartialType,
        arguments: Arguments,
        location: &SourceLocation,
    ) -> Result<ExpressionType> {
        let Some((element, element_location)) = arguments.types.into_iter().next() else {
            return Err(Diagnostic::new(
                ErrorKind::PartialTypeExpect(PartialTypeParameter::Type.to_string(), 0),
                location.clone(),
            ));
        };
        let error = |kind| Err(Diagnostic::new(kind, element_location.clone()));
        let struct_of = |ty: &ExpressionType| match ty {
            ExpressionType::Struct(index) => Ok(*index),
            other => Err(Diagnostic::new(
                ErrorKind::StructExpected(self.type_name(other)),
                element_location.clone(),
            )),
        };

        match partial {
            PartialType::Array => {
                let length = match arguments.constants.first() {
                    None => 0,
                    Some((value, value_location)) => {
                        let length = value
                            .as_single()
                            .and_then(ConstantSingleValue::as_integer)
                            .and_then(|length| u32::try_from(length).ok())
                            .filter(|&length| length > 0);
                        match length {
                            Some(length) => length,
                            None => {
                                return Err(Diagnostic::new(
                                    ErrorKind::ArrayLength(value.to_string()),
                                    value_location.clone(),
                                ));
                            }
                        }
                    }
                };
                Ok(ExpressionType::array(element, length))
            }
            PartialType::DynArray => Ok(ExpressionType::DynArray(Box::new(element))),
            PartialType::Matrix { columns, rows } => match element {
                ExpressionType::Primitive(base) if base.is_floating_point() => {
                    Ok(ExpressionType::matrix(base, columns, rows))
                }
                other => error(ErrorKind::MatrixExpectedFloat(self.type_name(&other))),
            },
            PartialType::Vector { dims } => match element {
                ExpressionType::Primitive(base) if base != PrimitiveType::String => {
                    Ok(ExpressionType::vector(base, dims))
                }
                _ => error(ErrorKind::PartialTypeExpect("primitive".to_string(), 0)),
            },
            PartialType::Sampler { dim, depth } => match element {
                ExpressionType::Primitive(PrimitiveType::F32) => {
                    Ok(ExpressionType::Sampler(SamplerType {
                        dim,
                        base: PrimitiveType::F32,
                        depth,
                    }))
                }
                other => error(ErrorKind::SamplerUnexpectedType(self.type_name(&other))),
            },
            PartialType::Texture { dim } => {
                if element != ExpressionType::Primitive(PrimitiveType::F32) {
                    return error(ErrorKind::TextureUnexpectedType(self.type_name(&element)));
                }
                let mut identifiers = arguments.identifiers.into_iter();
                let (access, access_location) = identifiers.next().unwrap_or_default();
                let Ok(access) = AccessPolicy::from_str(&access) else {
                    return Err(Diagnostic::new(
                        ErrorKind::TextureUnexpectedAccess(access),
                        access_location,
                    ));
                };
                let (format, format_location) = identifiers.next().unwrap_or_default();
                let Ok(format) = ImageFormat::from_str(&format) else {
                    return Err(Diagnostic::new(
                        ErrorKind::TextureUnexpectedFormat(format),
                        format_location,
                    ));
                };
                Ok(ExpressionType::Texture(TextureType {
                    dim,
                    base: PrimitiveType::F32,
                    access,
                    format,
                }))
            }
            PartialType::Uniform => Ok(ExpressionType::Uniform(struct_of(&element)?)),
            PartialType::PushConstant => Ok(ExpressionType::PushConstant(struct_of(&element)?)),
            PartialType::Storage => {
                let struct_index = struct_of(&element)?;
                let access = match arguments.identifiers.first() {
                    None => AccessPolicy::ReadWrite,
                    Some((name, name_location)) => AccessPolicy::from_str(name).map_err(|()| {
                        Diagnostic::new(
                            ErrorKind::PartialTypeExpect("access policy".to_string(), 1),
                            name_location.clone(),
                        )
                    })?,
                };
                Ok(ExpressionType::Storage(StorageType {
                    struct_index,
                    access,
                }))
            }
        }
    }

    // ============================================================================
    // Attribute Values
    // ============================================================================

    /// Folds an attribute argument to a constant.
    ///
    /// Returns `None` when the value is not known yet, which only partial
    /// analysis accepts.
    fn attribute_constant(
        &mut self,
        expr: Expression,
        attribute: AttributeType,
    ) -> Result<Option<ConstantSingleValue>> {
        let expr = self.expression(expr)?;
        match expr.as_constant().and_then(ConstantValue::as_single) {
            Some(value) => Ok(Some(value.clone())),
            None if self.is_partial() => Ok(None),
            None => Err(Diagnostic::new(
                ErrorKind::AttributeRequiresValue(attribute),
                expr.location,
            )),
        }
    }

    /// Evaluates an unsigned integer attribute.
    pub(super) fn attribute_u32(
        &mut self,
        value: AttributeValue<u32>,
        attribute: AttributeType,
    ) -> Result<AttributeValue<u32>> {
        let AttributeValue::Expression(expr) = value else {
            return Ok(value);
        };
        let location = expr.location.clone();
        let Some(constant) = self.attribute_constant((*expr).clone(), attribute)? else {
            return Ok(AttributeValue::Expression(expr));
        };
        let integer = match &constant {
            ConstantSingleValue::I32(_)
            | ConstantSingleValue::U32(_)
            | ConstantSingleValue::UntypedInteger(_) => constant.as_integer(),
            _ => None,
        };
        let Some(integer) = integer else {
            return Err(Diagnostic::new(
                ErrorKind::AttributeUnexpectedType(
                    PrimitiveType::U32.to_string(),
                    constant.expression_type().to_string(),
                ),
                location,
            ));
        };
        if integer < 0 {
            return Err(Diagnostic::new(
                ErrorKind::AttributeUnexpectedNegative(integer.to_string()),
                location,
            ));
        }
        let value = u32::try_from(integer).map_err(|_| {
            Diagnostic::new(ErrorKind::InvalidCast(PrimitiveType::U32.to_string()), location)
        })?;
        Ok(AttributeValue::Value(value))
    }

    /// Evaluates a boolean attribute.
    pub(super) fn attribute_bool(
        &mut self,
        value: AttributeValue<bool>,
        attribute: AttributeType,
    ) -> Result<AttributeValue<bool>> {
        let AttributeValue::Expression(expr) = value else {
            return Ok(value);
        };
        let location = expr.location.clone();
        let Some(constant) = self.attribute_constant((*expr).clone(), attribute)? else {
            return Ok(AttributeValue::Expression(expr));
        };
        match constant.as_bool() {
            Some(flag) => Ok(AttributeValue::Value(flag)),
            None => Err(Diagnostic::new(
                ErrorKind::AttributeUnexpectedType(
                    PrimitiveType::Bool.to_string(),
                    constant.expression_type().to_string(),
                ),
                location,
            )),
        }
    }

    /// Evaluates a `cond` attribute.
    pub(super) fn condition(&mut self, cond: Option<Expression>) -> Result<Condition> {
        let Some(cond) = cond else {
            return Ok(Condition::Active);
        };
        match self.attribute_bool(AttributeValue::Expression(Box::new(cond)), AttributeType::Cond)? {
            AttributeValue::Value(true) => Ok(Condition::Active),
            AttributeValue::Value(false) => Ok(Condition::Inactive),
            AttributeValue::Expression(expr) => Ok(Condition::Deferred(*expr)),
        }
    }
}
