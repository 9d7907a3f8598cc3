//! Read-only traversal of resolved statements.

use crate::{
    ast::{Expression, ExpressionKind, Statement, StatementKind},
    error::{Diagnostic, ErrorKind, Result},
};

/// Calls `visit` on every expression below `statement`, parents first.
pub(super) fn statement<F>(statement: &Statement, visit: &mut F) -> Result<()>
where
    F: FnMut(&Expression) -> Result<()>,
{
    match &statement.kind {
        StatementKind::Branch(branch) => {
            for arm in &branch.branches {
                expression(&arm.condition, visit)?;
                self::statement(&arm.statement, visit)?;
            }
            if let Some(else_statement) = &branch.else_statement {
                self::statement(else_statement, visit)?;
            }
        }
        StatementKind::DeclareAlias(decl) => expression(&decl.expression, visit)?,
        StatementKind::DeclareConst(decl) => {
            decl.ty.iter().chain(&decl.expression).try_for_each(|e| expression(e, visit))?;
        }
        StatementKind::DeclareExternal(decl) => {
            for variable in &decl.variables {
                expression(&variable.ty, visit)?;
            }
        }
        StatementKind::DeclareFunction(decl) => {
            for parameter in &decl.parameters {
                expression(&parameter.ty, visit)?;
            }
            if let Some(ty) = &decl.return_type {
                expression(ty, visit)?;
            }
            statements(&decl.statements, visit)?;
        }
        StatementKind::DeclareOption(decl) => {
            expression(&decl.ty, visit)?;
            if let Some(default) = &decl.default {
                expression(default, visit)?;
            }
        }
        StatementKind::DeclareStruct(decl) => {
            for member in &decl.members {
                expression(&member.ty, visit)?;
            }
        }
        StatementKind::DeclareVariable(decl) => {
            decl.ty.iter().chain(&decl.initial).try_for_each(|e| expression(e, visit))?;
        }
        StatementKind::Expression(expr) => expression(expr, visit)?,
        StatementKind::For(decl) => {
            expression(&decl.from, visit)?;
            expression(&decl.to, visit)?;
            if let Some(step) = &decl.step {
                expression(step, visit)?;
            }
            self::statement(&decl.body, visit)?;
        }
        StatementKind::ForEach(decl) => {
            expression(&decl.expression, visit)?;
            self::statement(&decl.body, visit)?;
        }
        StatementKind::Multi(inner) | StatementKind::Scoped(inner) => statements(inner, visit)?,
        StatementKind::Return(Some(value)) => expression(value, visit)?,
        StatementKind::While(decl) => {
            expression(&decl.condition, visit)?;
            self::statement(&decl.body, visit)?;
        }
        StatementKind::Break
        | StatementKind::Continue
        | StatementKind::Discard
        | StatementKind::Import(_)
        | StatementKind::NoOp
        | StatementKind::Return(None) => {}
    }
    Ok(())
}

pub(super) fn statements<F>(statements: &[Statement], visit: &mut F) -> Result<()>
where
    F: FnMut(&Expression) -> Result<()>,
{
    statements.iter().try_for_each(|s| statement(s, visit))
}

pub(super) fn expression<F>(expr: &Expression, visit: &mut F) -> Result<()>
where
    F: FnMut(&Expression) -> Result<()>,
{
    visit(expr)?;
    match &expr.kind {
        ExpressionKind::AccessIdentifier { expr, .. }
        | ExpressionKind::AccessField { expr, .. }
        | ExpressionKind::Swizzle { expr, .. }
        | ExpressionKind::Unary { expr, .. } => expression(expr, visit),
        ExpressionKind::AccessIndex { expr, indices } => {
            expression(expr, visit)?;
            indices.iter().try_for_each(|index| expression(index, visit))
        }
        ExpressionKind::Assign { left, right, .. } | ExpressionKind::Binary { left, right, .. } => {
            expression(left, visit)?;
            expression(right, visit)
        }
        ExpressionKind::CallFunction { target, parameters } => {
            expression(target, visit)?;
            parameters.iter().try_for_each(|p| expression(p, visit))
        }
        ExpressionKind::Cast {
            target,
            expressions,
        } => {
            expression(target, visit)?;
            expressions.iter().try_for_each(|e| expression(e, visit))
        }
        ExpressionKind::Intrinsic { parameters, .. } => {
            parameters.iter().try_for_each(|p| expression(p, visit))
        }
        ExpressionKind::Alias(_)
        | ExpressionKind::Constant(_)
        | ExpressionKind::Function(_)
        | ExpressionKind::Identifier(_)
        | ExpressionKind::IntrinsicFunction(_)
        | ExpressionKind::Module(_)
        | ExpressionKind::Option(_)
        | ExpressionKind::Type(_)
        | ExpressionKind::Variable(_) => Ok(()),
    }
}

/// Fails if an untyped literal type survived sanitization.
pub(super) fn check_resolved(module_statements: &[Statement]) -> Result<()> {
    statements(module_statements, &mut |expr: &Expression| {
        match &expr.cached_type {
            Some(ty) if ty.contains_untyped() => Err(Diagnostic::new(
                ErrorKind::Internal(format!("expression {expr} still has untyped type {ty}")),
                expr.location.clone(),
            )),
            _ => Ok(()),
        }
    })
}
