//! Declarations, function bodies and control flow.

use std::collections::HashSet;

use log::trace;

use tessel_core::{
    attribute::{AttributeType, LoopUnroll, MemoryLayout, ModuleFeature, ShaderStage},
    constant::ConstantValue,
    types::{ExpressionType, PrimitiveType},
};

use crate::{
    ast::{
        AliasDeclaration, AttributeValue, BranchStatement, ConditionalBranch, ConstDeclaration,
        Expression, ExternalDeclaration, ForEachStatement, ForStatement, FunctionDeclaration,
        OptionDeclaration, Statement, StatementKind, StructDeclaration, VariableDeclaration,
        WhileStatement,
    },
    error::{Diagnostic, ErrorKind, Result},
    span::{SourceLocation, Spanned},
};

use super::{
    Sanitizer,
    crc32::option_hash,
    expression::{constant_expression, is_reserved_name},
    registry::{
        AliasData, ConstantData, FunctionData, OptionData, StructData, StructField, VariableData,
    },
    scope::{IdentifierCategory, IdentifierData},
    types::Condition,
};

/// Types external blocks accept.
fn is_external_type(ty: &ExpressionType, primitives: bool) -> bool {
    match ty {
        ExpressionType::Uniform(_)
        | ExpressionType::Storage(_)
        | ExpressionType::PushConstant(_)
        | ExpressionType::Sampler(_)
        | ExpressionType::Texture(_) => true,
        ExpressionType::Primitive(_) | ExpressionType::Vector(_) | ExpressionType::Matrix(_) => {
            primitives
        }
        ExpressionType::Array(array) => is_external_type(&array.contained, primitives),
        _ => false,
    }
}

/// Outcome of a `const if` chain.
enum ConstBranch {
    Taken(Statement),
    NotTaken,
    /// Some condition is not known yet; the chain is kept unresolved.
    Deferred(BranchStatement),
}

fn flatten(statement: Statement) -> Vec<Statement> {
    match statement.kind {
        StatementKind::Multi(statements) | StatementKind::Scoped(statements) => statements,
        StatementKind::NoOp => Vec::new(),
        kind => vec![Statement::new(kind, statement.location)],
    }
}

impl Sanitizer<'_> {
    /// Binds a declaration name in the current scope.
    fn declare(
        &mut self,
        name: &Spanned<String>,
        data: IdentifierData,
        condition: &Condition,
    ) -> Result<()> {
        if is_reserved_name(name) {
            return Err(Diagnostic::new(
                ErrorKind::IdentifierAlreadyUsed(name.to_string()),
                name.location().clone(),
            ));
        }
        if !self.state.scopes.declare(name, data) && !matches!(condition, Condition::Deferred(_)) {
            return Err(Diagnostic::new(
                ErrorKind::IdentifierAlreadyUsed(name.to_string()),
                name.location().clone(),
            ));
        }
        Ok(())
    }

    fn is_in_function(&self) -> bool {
        self.state.current_function.is_some()
    }

    /// Unresolved `cond` of a kept declaration.
    fn deferred_cond(condition: Condition) -> Option<Expression> {
        match condition {
            Condition::Deferred(expr) => Some(expr),
            Condition::Active | Condition::Inactive => None,
        }
    }

    // ============================================================================
    // Module Level
    // ============================================================================

    /// First pass over a module-level statement.
    pub(super) fn top_level_statement(&mut self, statement: Statement) -> Result<Statement> {
        let Statement { kind, location } = statement;
        match kind {
            StatementKind::Import(import) => self.import(import, location),
            StatementKind::DeclareAlias(decl) => self.alias_declaration(decl, location),
            StatementKind::DeclareConst(decl) => self.const_declaration(decl, location),
            StatementKind::DeclareExternal(decl) => self.external_declaration(decl, location),
            StatementKind::DeclareFunction(decl) => self.function_signature(decl, location),
            StatementKind::DeclareOption(decl) => self.option_declaration(decl, location),
            StatementKind::DeclareStruct(decl) => self.struct_declaration(decl, location),
            StatementKind::Branch(branch) if branch.is_const => {
                match self.const_branch(branch)? {
                    ConstBranch::Taken(taken) => {
                        let statements = flatten(taken)
                            .into_iter()
                            .map(|statement| self.top_level_statement(statement))
                            .collect::<Result<Vec<_>>>()?;
                        Ok(Statement::new(StatementKind::Multi(statements), location))
                    }
                    ConstBranch::NotTaken => Ok(Statement::no_op(location)),
                    ConstBranch::Deferred(branch) => {
                        Ok(Statement::new(StatementKind::Branch(branch), location))
                    }
                }
            }
            StatementKind::Multi(statements) | StatementKind::Scoped(statements) => {
                let statements = statements
                    .into_iter()
                    .map(|statement| self.top_level_statement(statement))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Statement::new(StatementKind::Multi(statements), location))
            }
            StatementKind::Branch(_)
            | StatementKind::For(_)
            | StatementKind::ForEach(_)
            | StatementKind::While(_)
            | StatementKind::Return(_) => {
                Err(Diagnostic::new(ErrorKind::BranchOutsideOfFunction, location))
            }
            StatementKind::DeclareVariable(_) => {
                Err(Diagnostic::new(ErrorKind::VarDeclarationOutsideOfFunction, location))
            }
            StatementKind::Discard => {
                Err(Diagnostic::new(ErrorKind::DiscardOutsideOfFunction, location))
            }
            StatementKind::Break => {
                Err(Diagnostic::new(ErrorKind::LoopControlOutsideOfLoop("break"), location))
            }
            StatementKind::Continue => {
                Err(Diagnostic::new(ErrorKind::LoopControlOutsideOfLoop("continue"), location))
            }
            StatementKind::Expression(expr) => {
                let expr = self.expression(expr)?;
                let expr = self.resolve_default(expr)?;
                Ok(Statement::new(StatementKind::Expression(expr), location))
            }
            StatementKind::NoOp => Ok(Statement::no_op(location)),
        }
    }

    /// Second pass: sanitizes the bodies of the functions declared by
    /// `statement`.
    pub(super) fn function_bodies(&mut self, statement: Statement) -> Result<Statement> {
        let Statement { kind, location } = statement;
        match kind {
            StatementKind::DeclareFunction(decl) => {
                let decl = self.function_body(decl, &location)?;
                Ok(Statement::new(StatementKind::DeclareFunction(decl), location))
            }
            StatementKind::Multi(statements) => {
                let statements = statements
                    .into_iter()
                    .map(|statement| self.function_bodies(statement))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Statement::new(StatementKind::Multi(statements), location))
            }
            kind => Ok(Statement::new(kind, location)),
        }
    }

    /// Evaluates the conditions of a `const if` chain.
    fn const_branch(&mut self, branch: BranchStatement) -> Result<ConstBranch> {
        let original = branch.clone();
        for arm in branch.branches {
            let condition = self.expression(arm.condition)?;
            match condition.as_constant().and_then(ConstantValue::as_single) {
                Some(value) => match value.as_bool() {
                    Some(true) => return Ok(ConstBranch::Taken(*arm.statement)),
                    Some(false) => {}
                    None => {
                        return Err(Diagnostic::new(
                            ErrorKind::ConditionExpectedBool(
                                self.type_name(condition.expression_type()),
                            ),
                            condition.location,
                        ));
                    }
                },
                None if self.is_deferred(condition.expression_type()) => {
                    trace!(location:% = condition.location; "Keeping unresolved const branch");
                    return Ok(ConstBranch::Deferred(original));
                }
                None => {
                    return Err(Diagnostic::new(
                        ErrorKind::ConstantExpressionRequired,
                        condition.location,
                    ));
                }
            }
        }
        Ok(match branch.else_statement {
            Some(statement) => ConstBranch::Taken(*statement),
            None => ConstBranch::NotTaken,
        })
    }

    // ============================================================================
    // Declarations
    // ============================================================================

    fn alias_declaration(
        &mut self,
        mut decl: AliasDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        let condition = self.condition(decl.cond.take())?;
        if condition == Condition::Inactive {
            return Ok(Statement::no_op(location));
        }

        let expression = self.expression(decl.expression)?;
        let target = match expression.expression_type() {
            ty @ (ExpressionType::Function(_) | ExpressionType::Alias(_)) => ty.clone(),
            ty @ ExpressionType::Type(inner) if matches!(**inner, ExpressionType::Struct(_)) => {
                ty.clone()
            }
            ty if self.is_deferred(ty) => ExpressionType::NoType,
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::AliasUnexpectedType(self.type_name(other)),
                    expression.location.clone(),
                ));
            }
        };

        let index = self.registries.aliases.register(
            AliasData {
                name: decl.name.to_string(),
                target,
            },
            decl.index,
            &location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Alias, index),
            &condition,
        )?;

        decl.index = Some(index);
        decl.expression = expression;
        decl.cond = Self::deferred_cond(condition);
        Ok(Statement::new(StatementKind::DeclareAlias(decl), location))
    }

    fn const_declaration(
        &mut self,
        mut decl: ConstDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        let condition = self.condition(decl.cond.take())?;
        if condition == Condition::Inactive {
            return Ok(Statement::no_op(location));
        }
        let Some(expression) = decl.expression.take() else {
            return Err(Diagnostic::new(ErrorKind::ConstMissingExpression, location));
        };

        let declared = match decl.ty.take() {
            Some(ty) => {
                let (ty, resolved) = self.resolve_type(ty)?;
                decl.ty = Some(ty);
                Some(resolved)
            }
            None => None,
        };

        let mut expression = self.expression(expression)?;
        if let Some(declared) = &declared {
            expression = self.coerce_to_type(expression, declared)?;
            expression = self.resolve_default(expression)?;
            let actual = expression.expression_type();
            if actual != declared && !self.is_deferred(actual) && !self.is_deferred(declared) {
                return Err(Diagnostic::new(
                    ErrorKind::VarDeclarationTypeUnmatching(
                        self.type_name(actual),
                        self.type_name(declared),
                    ),
                    expression.location.clone(),
                ));
            }
        }

        let value = match expression.as_constant() {
            Some(value) => {
                let ty = value.constant_type();
                if !ty.is_constant_type() {
                    return Err(Diagnostic::new(
                        ErrorKind::ExpectedConstantType(self.type_name(&ty)),
                        expression.location.clone(),
                    ));
                }
                value.clone()
            }
            None if self.is_deferred(expression.expression_type()) => ConstantValue::NoValue,
            None => {
                return Err(Diagnostic::new(
                    ErrorKind::ConstantExpressionRequired,
                    expression.location.clone(),
                ));
            }
        };

        let index = self.registries.constants.register(
            ConstantData { value },
            decl.index,
            &location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Constant, index),
            &condition,
        )?;

        decl.index = Some(index);
        decl.expression = Some(self.resolve_default(expression)?);
        decl.cond = Self::deferred_cond(condition);
        Ok(Statement::new(StatementKind::DeclareConst(decl), location))
    }

    fn option_declaration(
        &mut self,
        mut decl: OptionDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        if self.is_in_function() {
            return Err(Diagnostic::new(ErrorKind::OptionDeclarationInsideFunction, location));
        }

        let (ty_expression, ty) = self.resolve_type(decl.ty)?;
        decl.ty = ty_expression;
        if !ty.is_constant_type() && !self.is_deferred(&ty) {
            return Err(Diagnostic::new(
                ErrorKind::ExpectedConstantType(self.type_name(&ty)),
                decl.ty.location.clone(),
            ));
        }

        let hash = option_hash(&decl.name);
        if let Some((_, other)) = self
            .registries
            .options
            .iter()
            .find(|(_, other)| other.hash == hash && other.name != *decl.name)
        {
            return Err(Diagnostic::new(
                ErrorKind::OptionHashCollision(decl.name.to_string(), other.name.clone()),
                decl.name.location().clone(),
            ));
        }

        let overridden = match self.options.option_values.get(&hash) {
            Some(value) => {
                let value = constant_expression(value.clone(), decl.name.location().clone());
                let value = self.typed_option_value(value, &ty)?;
                value.as_constant().cloned()
            }
            None => None,
        };

        let default = match decl.default.take() {
            Some(default) => {
                let default = self.expression(default)?;
                let default = self.typed_option_value(default, &ty)?;
                if default.as_constant().is_none() && !self.is_deferred(default.expression_type()) {
                    return Err(Diagnostic::new(
                        ErrorKind::ConstantExpressionRequired,
                        default.location,
                    ));
                }
                Some(default)
            }
            None => None,
        };

        let value = overridden.or_else(|| default.as_ref().and_then(|d| d.as_constant().cloned()));
        if value.is_none() && !self.is_partial() {
            return Err(Diagnostic::new(
                ErrorKind::MissingOptionValue(decl.name.to_string()),
                decl.name.location().clone(),
            ));
        }

        let index = self.registries.options.register(
            OptionData {
                name: decl.name.to_string(),
                ty,
                hash,
                value,
            },
            decl.index,
            &location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Option, index),
            &Condition::Active,
        )?;

        decl.index = Some(index);
        decl.hash = hash;
        decl.default = default;
        Ok(Statement::new(StatementKind::DeclareOption(decl), location))
    }

    /// Gives an option value the option type.
    fn typed_option_value(&self, value: Expression, ty: &ExpressionType) -> Result<Expression> {
        let value = self.coerce_to_type(value, ty)?;
        let value = self.resolve_default(value)?;
        let actual = value.expression_type();
        if actual != ty && !self.is_deferred(actual) && !self.is_deferred(ty) {
            return Err(Diagnostic::new(
                ErrorKind::VarDeclarationTypeUnmatching(self.type_name(actual), self.type_name(ty)),
                value.location.clone(),
            ));
        }
        Ok(value)
    }

    fn struct_declaration(
        &mut self,
        mut decl: StructDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        if self.is_in_function() {
            return Err(Diagnostic::new(ErrorKind::StructDeclarationInsideFunction, location));
        }
        let condition = self.condition(decl.cond.take())?;
        if condition == Condition::Inactive {
            return Ok(Statement::no_op(location));
        }
        let layout = decl.layout.as_ref().and_then(AttributeValue::value).copied();

        let mut members = Vec::with_capacity(decl.members.len());
        let mut fields: Vec<StructField> = Vec::with_capacity(decl.members.len());
        let mut active = HashSet::new();
        for mut member in std::mem::take(&mut decl.members) {
            let member_condition = self.condition(member.cond.take())?;
            if member_condition == Condition::Inactive {
                continue;
            }

            let (ty_expression, ty) = self.resolve_type(member.ty)?;
            self.check_sized(&ty, &ty_expression.location)?;
            member.ty = ty_expression;

            let location_index = match member.location_index.take() {
                Some(value) => Some(self.attribute_u32(value, AttributeType::Location)?),
                None => None,
            };
            let builtin = member.builtin.as_ref().and_then(AttributeValue::value).copied();
            if builtin.is_some() && location_index.is_some() {
                return Err(Diagnostic::new(
                    ErrorKind::StructFieldBuiltinLocation,
                    member.name.location().clone(),
                ));
            }
            if let Some(builtin) = builtin {
                let expected = ExpressionType::from(builtin.expected_shape());
                if ty != expected && !self.is_deferred(&ty) {
                    return Err(Diagnostic::new(
                        ErrorKind::BuiltinUnexpectedType(
                            builtin,
                            builtin.expected_shape().to_string(),
                            self.type_name(&ty),
                        ),
                        member.ty.location.clone(),
                    ));
                }
            }
            if let Some(layout) = layout {
                self.check_layout_type(&ty, layout, &member.ty.location)?;
            }

            let deferred = matches!(member_condition, Condition::Deferred(_));
            if !deferred && !active.insert(member.name.to_string()) {
                return Err(Diagnostic::new(
                    ErrorKind::StructFieldMultiple(member.name.to_string()),
                    member.name.location().clone(),
                ));
            }
            if fields.iter().all(|field| field.name != *member.name) {
                fields.push(StructField {
                    name: member.name.to_string(),
                    ty,
                    builtin,
                    location_index: location_index.as_ref().and_then(AttributeValue::value).copied(),
                });
            }

            member.location_index = location_index;
            member.cond = Self::deferred_cond(member_condition);
            members.push(member);
        }

        let index = self.registries.structs.register(
            StructData {
                name: decl.name.to_string(),
                fields,
                layout,
            },
            decl.index,
            &location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Struct, index),
            &condition,
        )?;

        decl.index = Some(index);
        decl.members = members;
        decl.cond = Self::deferred_cond(condition);
        Ok(Statement::new(StatementKind::DeclareStruct(decl), location))
    }

    /// Checks that a field of type `ty` fits in a struct declared with
    /// `layout`.
    fn check_layout_type(
        &self,
        ty: &ExpressionType,
        layout: MemoryLayout,
        location: &SourceLocation,
    ) -> Result<()> {
        let not_allowed = || {
            Err(Diagnostic::new(
                ErrorKind::StructLayoutTypeNotAllowed(self.type_name(ty), layout.to_string()),
                location.clone(),
            ))
        };
        match ty {
            ExpressionType::Primitive(PrimitiveType::Bool) => not_allowed(),
            ExpressionType::Vector(vector) if vector.base == PrimitiveType::Bool => not_allowed(),
            ExpressionType::Sampler(_)
            | ExpressionType::Texture(_)
            | ExpressionType::Uniform(_)
            | ExpressionType::Storage(_)
            | ExpressionType::PushConstant(_) => not_allowed(),
            ExpressionType::Array(array) => self.check_layout_type(&array.contained, layout, location),
            ExpressionType::DynArray(inner) => self.check_layout_type(inner, layout, location),
            ExpressionType::Struct(index) => {
                let inner = self.registries.structs.get(*index, location)?.layout;
                if inner == Some(layout) {
                    Ok(())
                } else {
                    Err(Diagnostic::new(
                        ErrorKind::StructLayoutInnerMismatch(
                            layout.to_string(),
                            inner.map_or_else(|| "none".to_string(), |inner| inner.to_string()),
                        ),
                        location.clone(),
                    ))
                }
            }
            _ => Ok(()),
        }
    }

    fn external_declaration(
        &mut self,
        mut decl: ExternalDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        let block_set = match decl.set.take() {
            Some(set) => Some(self.attribute_u32(set, AttributeType::Set)?),
            None => None,
        };
        if let Some(auto_binding) = decl.auto_binding.take() {
            decl.auto_binding = Some(self.attribute_bool(auto_binding, AttributeType::AutoBinding)?);
        }
        let primitives = self.state.features.contains(&ModuleFeature::PrimitiveExternals);

        let mut variables = Vec::with_capacity(decl.variables.len());
        for mut variable in std::mem::take(&mut decl.variables) {
            let condition = self.condition(variable.cond.take())?;
            if condition == Condition::Inactive {
                continue;
            }

            let (ty_expression, ty) = self.resolve_type(variable.ty)?;
            variable.ty = ty_expression;
            if !is_external_type(&ty, primitives) && !self.is_deferred(&ty) {
                return Err(Diagnostic::new(
                    ErrorKind::ExtTypeNotAllowed(variable.name.to_string(), self.type_name(&ty)),
                    variable.ty.location.clone(),
                ));
            }

            let is_push_constant = matches!(ty, ExpressionType::PushConstant(_));
            if is_push_constant {
                let unexpected = [
                    (variable.set.is_some(), AttributeType::Set),
                    (variable.binding.is_some(), AttributeType::Binding),
                ];
                if let Some((_, attribute)) = unexpected.into_iter().find(|(present, _)| *present) {
                    return Err(Diagnostic::new(
                        ErrorKind::UnexpectedAttributeOnPushConstant(attribute),
                        variable.name.location().clone(),
                    ));
                }
            }

            if self.state.scopes.is_declared_in_current(&variable.name) {
                return Err(Diagnostic::new(
                    ErrorKind::ExtAlreadyDeclared(variable.name.to_string()),
                    variable.name.location().clone(),
                ));
            }

            if !is_push_constant {
                let set = match variable.set.take() {
                    Some(set) => self.attribute_u32(set, AttributeType::Set)?,
                    None => block_set.clone().unwrap_or(AttributeValue::Value(0)),
                };
                let binding = match variable.binding.take() {
                    Some(binding) => Some(self.attribute_u32(binding, AttributeType::Binding)?),
                    None => None,
                };
                if let (Some(&set), Some(&binding)) =
                    (set.value(), binding.as_ref().and_then(AttributeValue::value))
                {
                    self.bind(set, binding, variable.name.location())?;
                }
                variable.set = Some(set);
                variable.binding = binding;
            }

            let index = self.registries.variables.register(
                VariableData { ty },
                variable.index,
                &location,
            )?;
            self.declare(
                &variable.name,
                IdentifierData::new(IdentifierCategory::Variable, index),
                &condition,
            )?;
            variable.index = Some(index);
            variable.cond = Self::deferred_cond(condition);
            variables.push(variable);
        }

        decl.set = block_set;
        decl.variables = variables;
        Ok(Statement::new(StatementKind::DeclareExternal(decl), location))
    }

    /// Claims `(set, binding)` for the external variable at `location`.
    fn bind(&mut self, set: u32, binding: u32, location: &SourceLocation) -> Result<()> {
        if let Some(first) = self.bindings.get(&(set, binding)) {
            return Err(
                Diagnostic::new(ErrorKind::ExtBindingAlreadyUsed(set, binding), location.clone())
                    .with_secondary_label(first.clone(), "first bound here"),
            );
        }
        self.bindings.insert((set, binding), location.clone());
        Ok(())
    }

    /// Gives the unbound variables of `[auto_binding]` blocks the lowest free
    /// binding of their set; any other unbound variable is an error.
    pub(super) fn assign_auto_bindings(&mut self, statements: &mut [Statement]) -> Result<()> {
        for statement in statements {
            let decl = match &mut statement.kind {
                StatementKind::DeclareExternal(decl) => decl,
                StatementKind::Multi(inner) => {
                    self.assign_auto_bindings(inner)?;
                    continue;
                }
                _ => continue,
            };
            let auto_binding = decl.auto_binding.as_ref().map(|value| value.value().copied());
            for variable in &mut decl.variables {
                if variable.binding.is_some() {
                    continue;
                }
                let Some(set) = variable.set.as_ref() else {
                    // Push constants.
                    continue;
                };
                let Some(&set) = set.value() else {
                    continue;
                };
                match auto_binding {
                    Some(Some(true)) => {
                        let mut binding = 0;
                        while self.bindings.contains_key(&(set, binding)) {
                            binding += 1;
                        }
                        self.bind(set, binding, variable.name.location())?;
                        trace!(variable = variable.name.as_str(), set = set, binding = binding; "Auto binding");
                        variable.binding = Some(AttributeValue::Value(binding));
                    }
                    Some(None) if self.is_partial() => {}
                    _ => {
                        return Err(Diagnostic::new(
                            ErrorKind::ExtMissingBindingIndex,
                            variable.name.location().clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    // ============================================================================
    // Functions
    // ============================================================================

    /// First pass over a function: resolves its signature and attributes and
    /// registers it. The body is left for [`Self::function_bodies`].
    fn function_signature(
        &mut self,
        mut decl: FunctionDeclaration,
        location: SourceLocation,
    ) -> Result<Statement> {
        if self.is_in_function() {
            return Err(Diagnostic::new(ErrorKind::FunctionDeclarationInsideFunction, location));
        }
        let condition = self.condition(decl.cond.take())?;
        if condition == Condition::Inactive {
            return Ok(Statement::no_op(location));
        }

        let mut parameters = Vec::with_capacity(decl.parameters.len());
        let mut declared = Vec::with_capacity(decl.parameters.len());
        for mut parameter in std::mem::take(&mut decl.parameters) {
            let (ty_expression, ty) = self.resolve_type(parameter.ty)?;
            self.check_sized(&ty, &ty_expression.location)?;
            parameter.ty = ty_expression;
            parameters.push(ty);
            declared.push(parameter);
        }
        decl.parameters = declared;
        let return_type = match decl.return_type.take() {
            Some(ty) => {
                let (ty_expression, ty) = self.resolve_type(ty)?;
                decl.return_type = Some(ty_expression);
                ty
            }
            None => ExpressionType::NoType,
        };

        if let Some(workgroup) = decl.workgroup.take() {
            let [x, y, z] = workgroup;
            decl.workgroup = Some([
                self.attribute_u32(x, AttributeType::Workgroup)?,
                self.attribute_u32(y, AttributeType::Workgroup)?,
                self.attribute_u32(z, AttributeType::Workgroup)?,
            ]);
        }
        if let Some(early) = decl.early_fragment_tests.take() {
            decl.early_fragment_tests =
                Some(self.attribute_bool(early, AttributeType::EarlyFragmentTests)?);
        }

        let stage = decl.stage();
        match stage {
            Some(stage) => self.check_entry_point(&decl, stage, &parameters, &return_type, &location)?,
            None => {
                let unexpected = [
                    (decl.workgroup.is_some(), AttributeType::Workgroup),
                    (decl.early_fragment_tests.is_some(), AttributeType::EarlyFragmentTests),
                    (decl.depth_write.is_some(), AttributeType::DepthWrite),
                ];
                if let Some((_, attribute)) = unexpected.into_iter().find(|(present, _)| *present) {
                    return Err(Diagnostic::new(
                        ErrorKind::UnexpectedAttribute(attribute, "non-entry function".to_string()),
                        location,
                    ));
                }
            }
        }

        let early_fragment_tests = matches!(
            decl.early_fragment_tests.as_ref().and_then(AttributeValue::value),
            Some(true)
        );
        let index = self.registries.functions.register(
            FunctionData {
                name: decl.name.to_string(),
                parameters,
                return_type,
                stage,
                early_fragment_tests,
                calls: Vec::new(),
                discard: None,
                location: decl.name.location().clone(),
            },
            decl.index,
            &location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Function, index),
            &condition,
        )?;
        if stage.is_some() {
            self.state.entry_functions.push(index);
        }

        decl.index = Some(index);
        decl.cond = Self::deferred_cond(condition);
        Ok(Statement::new(StatementKind::DeclareFunction(decl), location))
    }

    fn check_entry_point(
        &mut self,
        decl: &FunctionDeclaration,
        stage: ShaderStage,
        parameters: &[ExpressionType],
        return_type: &ExpressionType,
        location: &SourceLocation,
    ) -> Result<()> {
        if self.state.is_root {
            if let Some(first) = self.state.entry_points.get(&stage) {
                return Err(Diagnostic::new(ErrorKind::EntryPointAlreadyDefined(stage), location.clone())
                    .with_secondary_label(first.clone(), "first defined here"));
            }
            self.state.entry_points.insert(stage, location.clone());
        }

        let struct_parameter = match parameters {
            [] => None,
            [ExpressionType::Struct(index)] => Some(*index),
            [ty] if self.is_deferred(ty) => None,
            _ => {
                return Err(Diagnostic::new(ErrorKind::EntryFunctionParameter, location.clone()));
            }
        };

        let unsupported = [
            (
                decl.workgroup.is_some() && stage != ShaderStage::Compute,
                AttributeType::Workgroup,
            ),
            (
                decl.early_fragment_tests.is_some() && stage != ShaderStage::Fragment,
                AttributeType::EarlyFragmentTests,
            ),
            (
                decl.depth_write.is_some() && stage != ShaderStage::Fragment,
                AttributeType::DepthWrite,
            ),
        ];
        if let Some((_, attribute)) = unsupported.into_iter().find(|(present, _)| *present) {
            return Err(Diagnostic::new(
                ErrorKind::UnsupportedAttributeOnStage(
                    stage.display_name().to_string(),
                    attribute.to_string(),
                ),
                location.clone(),
            ));
        }

        if stage == ShaderStage::Compute {
            let Some(workgroup) = &decl.workgroup else {
                return Err(Diagnostic::new(ErrorKind::MissingWorkgroupAttribute, location.clone()));
            };
            let values: Option<Vec<u32>> = workgroup.iter().map(|v| v.value().copied()).collect();
            if let Some(values) = values {
                if values.contains(&0) {
                    return Err(Diagnostic::new(
                        ErrorKind::InvalidWorkgroup(format!(
                            "({}, {}, {})",
                            values[0], values[1], values[2]
                        )),
                        location.clone(),
                    ));
                }
            }
        }

        let return_struct = match return_type {
            ExpressionType::Struct(index) => Some(*index),
            _ => None,
        };
        for index in struct_parameter.into_iter().chain(return_struct) {
            let data = self.registries.structs.get(index, location)?;
            for field in &data.fields {
                if let Some(builtin) = field.builtin {
                    if builtin.stage() != stage {
                        return Err(Diagnostic::new(
                            ErrorKind::BuiltinUnsupportedStage(builtin, stage),
                            location.clone(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn function_body(
        &mut self,
        mut decl: FunctionDeclaration,
        location: &SourceLocation,
    ) -> Result<FunctionDeclaration> {
        let Some(index) = decl.index else {
            return Err(Diagnostic::new(
                ErrorKind::Internal(format!("function {} was not registered", decl.name.inner())),
                location.clone(),
            ));
        };
        let parameter_types = self.registries.functions.get(index, location)?.parameters.clone();

        self.state.current_function = Some(index);
        self.state.scopes.push();
        for (parameter, ty) in decl.parameters.iter_mut().zip(parameter_types) {
            let variable = self.registries.variables.register(
                VariableData { ty },
                parameter.index,
                parameter.name.location(),
            )?;
            self.declare(
                &parameter.name,
                IdentifierData::new(IdentifierCategory::Variable, variable),
                &Condition::Active,
            )?;
            parameter.index = Some(variable);
        }

        let statements = std::mem::take(&mut decl.statements);
        decl.statements = self.statements(statements)?;

        self.state.scopes.pop();
        self.state.current_function = None;
        Ok(decl)
    }

    // ============================================================================
    // Function Bodies
    // ============================================================================

    fn statements(&mut self, statements: Vec<Statement>) -> Result<Vec<Statement>> {
        statements
            .into_iter()
            .map(|statement| self.statement(statement))
            .collect()
    }

    /// Sanitizes a statement inside a function body.
    fn statement(&mut self, statement: Statement) -> Result<Statement> {
        let Statement { kind, location } = statement;
        let kind = match kind {
            StatementKind::Branch(branch) if branch.is_const => {
                return match self.const_branch(branch)? {
                    ConstBranch::Taken(taken) => self.statement(taken),
                    ConstBranch::NotTaken => Ok(Statement::no_op(location)),
                    ConstBranch::Deferred(branch) => {
                        Ok(Statement::new(StatementKind::Branch(branch), location))
                    }
                };
            }
            StatementKind::Branch(branch) => StatementKind::Branch(self.branch(branch)?),
            StatementKind::Break => {
                self.check_loop_control("break", &location)?;
                StatementKind::Break
            }
            StatementKind::Continue => {
                self.check_loop_control("continue", &location)?;
                StatementKind::Continue
            }
            StatementKind::DeclareAlias(decl) => return self.alias_declaration(decl, location),
            StatementKind::DeclareConst(decl) => return self.const_declaration(decl, location),
            StatementKind::DeclareExternal(_) => {
                return Err(Diagnostic::new(ErrorKind::VarDeclarationOutsideOfFunction, location));
            }
            StatementKind::DeclareFunction(_) => {
                return Err(Diagnostic::new(ErrorKind::FunctionDeclarationInsideFunction, location));
            }
            StatementKind::DeclareOption(_) => {
                return Err(Diagnostic::new(ErrorKind::OptionDeclarationInsideFunction, location));
            }
            StatementKind::DeclareStruct(_) => {
                return Err(Diagnostic::new(ErrorKind::StructDeclarationInsideFunction, location));
            }
            StatementKind::DeclareVariable(decl) => {
                StatementKind::DeclareVariable(self.variable_declaration(decl, &location)?)
            }
            StatementKind::Discard => {
                if let Some(function) = self.state.current_function {
                    let data = self.registries.functions.get_mut(function, &location)?;
                    if data.discard.is_none() {
                        data.discard = Some(location.clone());
                    }
                }
                StatementKind::Discard
            }
            StatementKind::Expression(expr) => {
                let expr = self.expression(expr)?;
                StatementKind::Expression(self.resolve_default(expr)?)
            }
            StatementKind::For(decl) => StatementKind::For(self.for_statement(decl)?),
            StatementKind::ForEach(decl) => StatementKind::ForEach(self.for_each_statement(decl)?),
            StatementKind::Import(_) => {
                return Err(Diagnostic::new(
                    ErrorKind::Internal("import statement inside a function".to_string()),
                    location,
                ));
            }
            StatementKind::Multi(statements) => StatementKind::Multi(self.statements(statements)?),
            StatementKind::NoOp => StatementKind::NoOp,
            StatementKind::Return(value) => StatementKind::Return(self.return_value(value, &location)?),
            StatementKind::Scoped(statements) => {
                self.state.scopes.push();
                let statements = self.statements(statements)?;
                self.state.scopes.pop();
                StatementKind::Scoped(statements)
            }
            StatementKind::While(decl) => StatementKind::While(self.while_statement(decl)?),
        };
        Ok(Statement::new(kind, location))
    }

    fn check_loop_control(&self, name: &'static str, location: &SourceLocation) -> Result<()> {
        if self.state.loop_depth == 0 {
            return Err(Diagnostic::new(
                ErrorKind::LoopControlOutsideOfLoop(name),
                location.clone(),
            ));
        }
        Ok(())
    }

    /// Resolves a condition that must be a boolean.
    fn bool_condition(&mut self, condition: Expression) -> Result<Expression> {
        let condition = self.expression(condition)?;
        let condition = self.resolve_default(condition)?;
        let ty = condition.expression_type();
        if *ty != ExpressionType::bool() && !self.is_deferred(ty) {
            return Err(Diagnostic::new(
                ErrorKind::ConditionExpectedBool(self.type_name(ty)),
                condition.location.clone(),
            ));
        }
        Ok(condition)
    }

    fn branch(&mut self, branch: BranchStatement) -> Result<BranchStatement> {
        let branches = branch
            .branches
            .into_iter()
            .map(|arm| {
                Ok(ConditionalBranch {
                    condition: self.bool_condition(arm.condition)?,
                    statement: Box::new(self.statement(*arm.statement)?),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let else_statement = match branch.else_statement {
            Some(statement) => Some(Box::new(self.statement(*statement)?)),
            None => None,
        };
        Ok(BranchStatement {
            branches,
            else_statement,
            is_const: false,
        })
    }

    fn variable_declaration(
        &mut self,
        mut decl: VariableDeclaration,
        location: &SourceLocation,
    ) -> Result<VariableDeclaration> {
        let declared = match decl.ty.take() {
            Some(ty) => {
                let (ty, resolved) = self.resolve_type(ty)?;
                decl.ty = Some(ty);
                Some(resolved)
            }
            None => None,
        };
        let initial = match decl.initial.take() {
            Some(initial) => {
                let initial = self.expression(initial)?;
                let initial = match &declared {
                    Some(declared) => self.coerce_to_type(initial, declared)?,
                    None => initial,
                };
                Some(self.resolve_default(initial)?)
            }
            None => None,
        };

        let ty = match (declared, &initial) {
            (None, None) => {
                return Err(Diagnostic::new(
                    ErrorKind::VarDeclarationMissingTypeAndValue,
                    location.clone(),
                ));
            }
            (None, Some(initial)) => initial.expression_type().clone(),
            (Some(declared), None) => declared,
            (Some(declared), Some(initial)) => {
                let actual = initial.expression_type();
                // `array[T]` takes its length from the initializer.
                let declared = match (&declared, actual) {
                    (ExpressionType::Array(wanted), ExpressionType::Array(got))
                        if wanted.length == 0 && wanted.contained == got.contained =>
                    {
                        actual.clone()
                    }
                    _ => declared,
                };
                if *actual != declared && !self.is_deferred(actual) && !self.is_deferred(&declared) {
                    return Err(Diagnostic::new(
                        ErrorKind::VarDeclarationTypeUnmatching(
                            self.type_name(actual),
                            self.type_name(&declared),
                        ),
                        initial.location.clone(),
                    ));
                }
                declared
            }
        };
        self.check_sized(&ty, location)?;

        let index = self.registries.variables.register(
            VariableData { ty },
            decl.index,
            location,
        )?;
        self.declare(
            &decl.name,
            IdentifierData::new(IdentifierCategory::Variable, index),
            &Condition::Active,
        )?;
        decl.index = Some(index);
        decl.initial = initial;
        Ok(decl)
    }

    fn return_value(
        &mut self,
        value: Option<Expression>,
        location: &SourceLocation,
    ) -> Result<Option<Expression>> {
        let expected = match self.state.current_function {
            Some(function) => self.registries.functions.get(function, location)?.return_type.clone(),
            None => return Err(Diagnostic::new(ErrorKind::BranchOutsideOfFunction, location.clone())),
        };
        let Some(value) = value else {
            if !expected.is_no_type() {
                return Err(Diagnostic::new(
                    ErrorKind::UnmatchingTypes(self.type_name(&expected), self.type_name(&ExpressionType::NoType)),
                    location.clone(),
                ));
            }
            return Ok(None);
        };

        let value = self.expression(value)?;
        let value = self.coerce_to_type(value, &expected)?;
        let value = self.resolve_default(value)?;
        let actual = value.expression_type();
        if *actual != expected && !self.is_deferred(actual) {
            return Err(Diagnostic::new(
                ErrorKind::UnmatchingTypes(self.type_name(&expected), self.type_name(actual)),
                value.location.clone(),
            ));
        }
        Ok(Some(value))
    }

    // ============================================================================
    // Loops
    // ============================================================================

    /// Sanitizes a loop body, with `variable` bound to a fresh variable of
    /// type `ty` when given.
    fn loop_body(
        &mut self,
        body: Statement,
        variable: Option<(&Spanned<String>, ExpressionType)>,
    ) -> Result<(Statement, Option<usize>)> {
        self.state.scopes.push();
        let index = match variable {
            Some((name, ty)) => {
                let index = self.registries.variables.register(
                    VariableData { ty },
                    None,
                    name.location(),
                )?;
                self.declare(
                    name,
                    IdentifierData::new(IdentifierCategory::Variable, index),
                    &Condition::Active,
                )?;
                Some(index)
            }
            None => None,
        };
        self.state.loop_depth += 1;
        let body = self.statement(body);
        self.state.loop_depth -= 1;
        self.state.scopes.pop();
        Ok((body?, index))
    }

    fn for_statement(&mut self, mut decl: ForStatement) -> Result<ForStatement> {
        let from = self.expression(decl.from)?;
        let from = self.resolve_default(from)?;
        let from_type = from.expression_type().clone();
        let integral = matches!(
            from_type,
            ExpressionType::Primitive(PrimitiveType::I32 | PrimitiveType::U32)
        );
        if !integral && !self.is_deferred(&from_type) {
            return Err(Diagnostic::new(
                ErrorKind::ForFromTypeExpectIntegerType(self.type_name(&from_type)),
                from.location.clone(),
            ));
        }

        let bound = |sanitizer: &mut Self,
                     expr: Expression,
                     error: fn(String, String) -> ErrorKind|
         -> Result<Expression> {
            let expr = sanitizer.expression(expr)?;
            let expr = sanitizer.coerce_to_type(expr, &from_type)?;
            let expr = sanitizer.resolve_default(expr)?;
            let ty = expr.expression_type();
            if *ty != from_type && !sanitizer.is_deferred(ty) && !sanitizer.is_deferred(&from_type) {
                return Err(Diagnostic::new(
                    error(sanitizer.type_name(ty), sanitizer.type_name(&from_type)),
                    expr.location.clone(),
                ));
            }
            Ok(expr)
        };
        let to = bound(self, decl.to, ErrorKind::ForToUnmatchingType)?;
        let step = match decl.step.take() {
            Some(step) => Some(bound(self, step, ErrorKind::ForStepUnmatchingType)?),
            None => None,
        };

        let (body, index) = self.loop_body(*decl.body, Some((&decl.variable, from_type.clone())))?;
        decl.from = from;
        decl.to = to;
        decl.step = step;
        decl.index = index;
        decl.body = Box::new(body);
        Ok(decl)
    }

    fn for_each_statement(&mut self, mut decl: ForEachStatement) -> Result<ForEachStatement> {
        let expression = self.expression(decl.expression)?;
        let element = match expression.expression_type().resolve_alias() {
            ExpressionType::Array(array) => (*array.contained).clone(),
            ExpressionType::DynArray(inner) => (**inner).clone(),
            ty if self.is_deferred(ty) => ExpressionType::NoType,
            other => {
                return Err(Diagnostic::new(
                    ErrorKind::ForEachUnsupportedType(self.type_name(other)),
                    expression.location.clone(),
                ));
            }
        };
        let expression = self.resolve_default(expression)?;
        let element = element.resolve_untyped();

        let (body, index) = self.loop_body(*decl.body, Some((&decl.variable, element)))?;
        decl.expression = expression;
        decl.index = index;
        decl.body = Box::new(body);
        Ok(decl)
    }

    fn while_statement(&mut self, mut decl: WhileStatement) -> Result<WhileStatement> {
        if matches!(
            decl.unroll.as_ref().and_then(AttributeValue::value),
            Some(LoopUnroll::Always)
        ) {
            return Err(Diagnostic::new(
                ErrorKind::WhileUnrollNotSupported,
                decl.condition.location.clone(),
            ));
        }
        decl.condition = self.bool_condition(decl.condition)?;
        let (body, _) = self.loop_body(*decl.body, None)?;
        decl.body = Box::new(body);
        Ok(decl)
    }
}
