//! Parser for Tessel source tokens.
//!
//! This module transforms a token stream from the [`lexer`](super::lexer) into
//! an unresolved AST defined in [`ast`](super::ast). The public entry point is
//! [`parse`].
//!
//! The grammar is LL(1) almost everywhere: statements dispatch on their first
//! token, and only `const if` and the two `import` forms look one construct
//! ahead. The first syntax error aborts the unit.

use std::{collections::HashSet, str::FromStr};

use log::debug;
use winnow::{
    Parser as _,
    combinator::peek,
    error::{ContextError, ErrMode},
    stream::{Stream, TokenSlice},
    token::any,
};

use tessel_core::{
    attribute::{
        AttributeType, BuiltinEntry, DepthWriteMode, LoopUnroll, MemoryLayout, ModuleFeature,
        ShaderStage,
    },
    constant::{ConstantSingleValue, ConstantValue},
    types::PartialType,
};

use crate::{
    ast::{
        AliasDeclaration, AssignOp, AttributeValue, BinaryOp, BranchStatement, ConditionalBranch,
        ConstDeclaration, Expression, ExpressionKind, ExternalDeclaration, ExternalVariable,
        ForEachStatement, ForStatement, FunctionDeclaration, FunctionParameter, ImportIdentifier,
        ImportStatement, LangVersion, Module, ModuleMetadata, OptionDeclaration, Statement,
        StatementKind, StructDeclaration, StructMember, UnaryOp, VariableDeclaration,
        WhileStatement,
    },
    error::{Diagnostic, ErrorKind, Result},
    span::{SourceLocation, Spanned},
    tokens::{NumericSuffix, Token, TokenKind, TokenValue},
};

/// Context type for parser errors
#[derive(Debug, Clone, PartialEq, Eq)]
enum Context {
    /// Description of what is currently being parsed
    Label(&'static str),
    /// A fully formed diagnostic raised by a grammar rule
    Failure(Box<Diagnostic>),
}

type Input<'a, 'src> = TokenSlice<'a, Token<'src>>;
type IResult<O> = std::result::Result<O, ErrMode<ContextError<Context>>>;

/// Identifiers kept back for future language versions.
const RESERVED_IDENTIFIERS: &[&str] = &[
    "and", "case", "default", "do", "goto", "not", "or", "self", "static", "super", "switch",
    "template", "typedef",
];

fn failure(kind: ErrorKind, location: &SourceLocation) -> ErrMode<ContextError<Context>> {
    let mut error = ContextError::new();
    error.push(Context::Failure(Box::new(Diagnostic::new(
        kind,
        location.clone(),
    ))));
    ErrMode::Cut(error)
}

/// Error for a token that cannot appear at this position.
fn unexpected(token: &Token<'_>) -> ErrMode<ContextError<Context>> {
    match token.kind {
        TokenKind::EndOfStream => failure(ErrorKind::UnexpectedEndOfFile, &token.location),
        kind => failure(ErrorKind::UnexpectedToken(kind), &token.location),
    }
}

fn expected(kind: TokenKind, token: &Token<'_>) -> ErrMode<ContextError<Context>> {
    match token.kind {
        TokenKind::EndOfStream => failure(ErrorKind::UnexpectedEndOfFile, &token.location),
        actual => failure(ErrorKind::ExpectedToken(kind, actual), &token.location),
    }
}

fn peek_token<'a, 'src>(input: &mut Input<'a, 'src>) -> IResult<&'a Token<'src>> {
    peek(any).parse_next(input)
}

fn peek_kind(input: &mut Input<'_, '_>) -> IResult<TokenKind> {
    Ok(peek_token(input)?.kind)
}

fn next_token<'a, 'src>(input: &mut Input<'a, 'src>) -> IResult<&'a Token<'src>> {
    any.parse_next(input)
}

/// Consume a token of the given kind or fail with `ExpectedToken`.
fn expect<'a, 'src>(input: &mut Input<'a, 'src>, kind: TokenKind) -> IResult<&'a Token<'src>> {
    let token = next_token(input)?;
    if token.kind == kind {
        Ok(token)
    } else {
        Err(expected(kind, token))
    }
}

/// Consume a token of the given kind if it is next.
fn eat<'a, 'src>(input: &mut Input<'a, 'src>, kind: TokenKind) -> IResult<Option<&'a Token<'src>>> {
    if peek_kind(input)? == kind {
        next_token(input).map(Some)
    } else {
        Ok(None)
    }
}

fn check_identifier(name: &str, location: &SourceLocation) -> IResult<()> {
    if RESERVED_IDENTIFIERS.contains(&name) {
        return Err(failure(ErrorKind::ReservedKeyword, location));
    }
    if PartialType::is_builtin_family(name) && PartialType::from_name(name).is_none() {
        return Err(failure(ErrorKind::UnknownType, location));
    }
    Ok(())
}

/// Parse an identifier with span preservation
fn identifier(input: &mut Input<'_, '_>) -> IResult<Spanned<String>> {
    let token = expect(input, TokenKind::Identifier)?;
    let name = token.identifier().unwrap_or_default();
    check_identifier(name, &token.location)?;
    Ok(Spanned::new(name.to_string(), token.location.clone()))
}

/// Parse `A.B.C` or a string literal naming a module.
fn module_name(input: &mut Input<'_, '_>) -> IResult<Spanned<String>> {
    let token = peek_token(input)?;
    if let TokenValue::String(name) = &token.value {
        next_token(input)?;
        return Ok(Spanned::new(name.clone(), token.location.clone()));
    }

    let first = identifier(input)?;
    let mut location = first.location().clone();
    let mut name = first.into_inner();
    while eat(input, TokenKind::Dot)?.is_some() {
        let segment = identifier(input)?;
        location = location.extend_to(segment.location());
        name.push('.');
        name.push_str(segment.inner());
    }
    Ok(Spanned::new(name, location))
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

/// An attribute as written, before the decorated construct interprets it.
#[derive(Debug, Clone)]
struct Attribute {
    kind: AttributeType,
    args: Vec<Expression>,
    location: SourceLocation,
}

impl Attribute {
    fn parameter_count_error(&self, expected: usize) -> ErrMode<ContextError<Context>> {
        failure(
            ErrorKind::AttributeUnexpectedParameterCount(self.kind, expected, self.args.len()),
            &self.location,
        )
    }

    fn expect_parameters(&self, count: usize) -> IResult<&[Expression]> {
        if self.args.len() != count {
            return Err(self.parameter_count_error(count));
        }
        Ok(&self.args)
    }

    fn single(&self) -> IResult<&Expression> {
        Ok(&self.expect_parameters(1)?[0])
    }

    fn string(&self) -> IResult<String> {
        let arg = self.single()?;
        match &arg.kind {
            ExpressionKind::Constant(ConstantValue::Single(ConstantSingleValue::String(s))) => {
                Ok(s.clone())
            }
            _ => Err(failure(
                ErrorKind::AttributeExpectString(self.kind),
                &arg.location,
            )),
        }
    }

    fn identifier_value<T: FromStr>(&self, arg: &Expression) -> IResult<T> {
        let name = arg.as_identifier().ok_or_else(|| {
            failure(
                ErrorKind::AttributeParameterIdentifier(self.kind),
                &arg.location,
            )
        })?;
        name.parse().map_err(|_| {
            failure(
                ErrorKind::AttributeInvalidParameter(name.to_string(), self.kind),
                &arg.location,
            )
        })
    }

    fn identifier<T: FromStr>(&self) -> IResult<T> {
        let arg = self.single()?;
        self.identifier_value(arg)
    }

    fn expression<T>(&self) -> IResult<AttributeValue<T>> {
        Ok(AttributeValue::Expression(Box::new(self.single()?.clone())))
    }

    /// A flag defaults to `true` when written without argument.
    fn flag(&self) -> IResult<AttributeValue<bool>> {
        match self.args.as_slice() {
            [] => Ok(AttributeValue::Value(true)),
            [arg] => Ok(AttributeValue::Expression(Box::new(arg.clone()))),
            _ => Err(self.parameter_count_error(1)),
        }
    }
}

/// Parse `[name(args), ...]` groups, possibly several in a row.
fn attributes(input: &mut Input<'_, '_>) -> IResult<Vec<Attribute>> {
    let mut attributes = Vec::new();
    while eat(input, TokenKind::OpenSquareBracket)?.is_some() {
        loop {
            attributes.push(attribute(input)?);
            let token = next_token(input)?;
            match token.kind {
                TokenKind::Comma => {}
                TokenKind::ClosingSquareBracket => break,
                _ => return Err(expected(TokenKind::ClosingSquareBracket, token)),
            }
        }
    }
    Ok(attributes)
}

fn attribute(input: &mut Input<'_, '_>) -> IResult<Attribute> {
    let name_token = expect(input, TokenKind::Identifier)?;
    let name = name_token.identifier().unwrap_or_default();
    let kind: AttributeType = name.parse().map_err(|()| {
        failure(
            ErrorKind::UnknownAttribute(name.to_string()),
            &name_token.location,
        )
    })?;

    let mut location = name_token.location.clone();
    let mut args = Vec::new();
    if eat(input, TokenKind::OpenParenthesis)?.is_some() {
        args = expression_list(input, TokenKind::ClosingParenthesis)?;
        let close = expect(input, TokenKind::ClosingParenthesis)?;
        location = location.extend_to(&close.location);
    }

    Ok(Attribute {
        kind,
        args,
        location,
    })
}

/// Reject attributes the target does not accept and repeated unique ones.
fn check_attributes(
    attributes: &[Attribute],
    allowed: &[AttributeType],
    target: &'static str,
) -> IResult<()> {
    let mut seen = HashSet::new();
    for attribute in attributes {
        if !allowed.contains(&attribute.kind) {
            return Err(failure(
                ErrorKind::UnexpectedAttribute(attribute.kind, target.to_string()),
                &attribute.location,
            ));
        }
        if attribute.kind.is_unique() && !seen.insert(attribute.kind) {
            return Err(failure(
                ErrorKind::AttributeMultipleUnique(attribute.kind),
                &attribute.location,
            ));
        }
    }
    Ok(())
}

fn find_attribute(attributes: &[Attribute], kind: AttributeType) -> Option<&Attribute> {
    attributes.iter().find(|attribute| attribute.kind == kind)
}

fn export_attribute(attributes: &[Attribute]) -> IResult<bool> {
    match find_attribute(attributes, AttributeType::Export) {
        Some(attribute) => attribute.expect_parameters(0).map(|_| true),
        None => Ok(false),
    }
}

fn cond_attribute(attributes: &[Attribute]) -> IResult<Option<Expression>> {
    find_attribute(attributes, AttributeType::Cond)
        .map(|attribute| attribute.single().cloned())
        .transpose()
}

fn tag_attribute(attributes: &[Attribute]) -> IResult<Option<String>> {
    find_attribute(attributes, AttributeType::Tag)
        .map(Attribute::string)
        .transpose()
}

fn expression_attribute(
    attributes: &[Attribute],
    kind: AttributeType,
) -> IResult<Option<AttributeValue<u32>>> {
    find_attribute(attributes, kind)
        .map(Attribute::expression)
        .transpose()
}

fn unroll_attribute(attributes: &[Attribute]) -> IResult<Option<AttributeValue<LoopUnroll>>> {
    let Some(attribute) = find_attribute(attributes, AttributeType::Unroll) else {
        return Ok(None);
    };
    match attribute.args.as_slice() {
        [] => Ok(Some(AttributeValue::Value(LoopUnroll::Always))),
        [arg] => Ok(Some(AttributeValue::Value(attribute.identifier_value(arg)?))),
        _ => Err(attribute.parameter_count_error(1)),
    }
}

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

fn module_metadata(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
    module_token: &Token<'_>,
) -> IResult<ModuleMetadata> {
    check_attributes(
        attributes,
        &[
            AttributeType::Author,
            AttributeType::Description,
            AttributeType::Feature,
            AttributeType::LangVersion,
            AttributeType::License,
        ],
        "module",
    )?;

    let mut metadata = ModuleMetadata::default();

    let version = find_attribute(attributes, AttributeType::LangVersion).ok_or_else(|| {
        failure(
            ErrorKind::MissingAttribute(AttributeType::LangVersion),
            &module_token.location,
        )
    })?;
    let text = version.string()?;
    metadata.lang_version = LangVersion::parse(&text)
        .ok_or_else(|| failure(ErrorKind::InvalidVersion(text.clone()), &version.location))?;

    for attribute in attributes {
        match attribute.kind {
            AttributeType::Feature => {
                let feature: ModuleFeature = attribute.identifier()?;
                if metadata.enabled_features.contains(&feature) {
                    return Err(failure(
                        ErrorKind::ModuleFeatureMultipleUnique(feature),
                        &attribute.location,
                    ));
                }
                metadata.enabled_features.push(feature);
            }
            AttributeType::Author => metadata.author = Some(attribute.string()?),
            AttributeType::Description => metadata.description = Some(attribute.string()?),
            AttributeType::License => metadata.license = Some(attribute.string()?),
            _ => {}
        }
    }

    if peek_kind(input)? != TokenKind::Semicolon {
        metadata.module_name = Some(module_name(input)?.into_inner());
    }
    expect(input, TokenKind::Semicolon)?;

    Ok(metadata)
}

fn module(input: &mut Input<'_, '_>) -> IResult<Module> {
    let module_attributes = attributes(input)?;
    let token = next_token(input)?;
    if token.kind != TokenKind::Module {
        return Err(expected(TokenKind::Module, token));
    }
    let metadata = module_metadata(input, &module_attributes, token)?;

    let mut statements = Vec::new();
    loop {
        let attributes = attributes(input)?;
        let token = peek_token(input)?;
        match token.kind {
            TokenKind::EndOfStream if attributes.is_empty() => break,
            TokenKind::EndOfStream => return Err(unexpected(token)),
            TokenKind::Module => return Err(failure(ErrorKind::DuplicateModule, &token.location)),
            _ => statements.push(statement(input, attributes, true)?),
        }
    }

    check_duplicate_identifiers(&statements)?;

    Ok(Module {
        metadata,
        statements,
        imported_modules: Vec::new(),
    })
}

/// Unconditional top-level declarations must have distinct names.
fn check_duplicate_identifiers(statements: &[Statement]) -> IResult<()> {
    let mut names = HashSet::new();
    for statement in statements.iter().filter(|s| !s.is_conditional()) {
        let Some(name) = statement.declared_name() else {
            continue;
        };
        if !names.insert(name.inner().as_str()) {
            return Err(failure(ErrorKind::DuplicateIdentifier, name.location()));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

fn statement(
    input: &mut Input<'_, '_>,
    attributes: Vec<Attribute>,
    top_level: bool,
) -> IResult<Statement> {
    let token = peek_token(input)?;
    match token.kind {
        TokenKind::Alias => alias_declaration(input, &attributes),
        TokenKind::Const => {
            let checkpoint = input.checkpoint();
            next_token(input)?;
            let is_const_if = peek_kind(input)? == TokenKind::If;
            input.reset(&checkpoint);
            if is_const_if {
                branch_statement(input, &attributes, top_level)
            } else {
                const_declaration(input, &attributes)
            }
        }
        TokenKind::External if top_level => external_declaration(input, &attributes),
        TokenKind::Fn => function_declaration(input, &attributes),
        TokenKind::For => for_statement(input, &attributes),
        TokenKind::If => branch_statement(input, &attributes, top_level),
        TokenKind::Import if top_level => import_statement(input, &attributes),
        TokenKind::Let => variable_declaration(input, &attributes),
        TokenKind::OpenCurlyBracket => {
            check_attributes(&attributes, &[], "statement")?;
            let (statements, location) = block(input, top_level)?;
            Ok(Statement::new(StatementKind::Scoped(statements), location))
        }
        TokenKind::Option => option_declaration(input, &attributes),
        TokenKind::Return => return_statement(input, &attributes),
        TokenKind::Struct => struct_declaration(input, &attributes),
        TokenKind::While => while_statement(input, &attributes),
        TokenKind::Break | TokenKind::Continue | TokenKind::Discard => {
            check_attributes(&attributes, &[], "statement")?;
            next_token(input)?;
            let end = expect(input, TokenKind::Semicolon)?;
            let kind = match token.kind {
                TokenKind::Break => StatementKind::Break,
                TokenKind::Continue => StatementKind::Continue,
                _ => StatementKind::Discard,
            };
            Ok(Statement::new(kind, token.location.extend_to(&end.location)))
        }
        TokenKind::External | TokenKind::Import | TokenKind::Module => Err(unexpected(token)),
        _ => expression_statement(input, &attributes),
    }
}

/// A statement nested in another one (branch or loop body).
fn inner_statement(input: &mut Input<'_, '_>, top_level: bool) -> IResult<Statement> {
    let attributes = attributes(input)?;
    statement(input, attributes, top_level)
}

/// Parse `{ statement* }`.
fn block(input: &mut Input<'_, '_>, top_level: bool) -> IResult<(Vec<Statement>, SourceLocation)> {
    let open = expect(input, TokenKind::OpenCurlyBracket)?;
    let mut statements = Vec::new();
    loop {
        if let Some(close) = eat(input, TokenKind::ClosingCurlyBracket)? {
            return Ok((statements, open.location.extend_to(&close.location)));
        }
        statements.push(inner_statement(input, top_level)?);
    }
}

fn alias_declaration(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(
        attributes,
        &[AttributeType::Export, AttributeType::Cond],
        "alias",
    )?;
    let start = expect(input, TokenKind::Alias)?;
    let name = identifier(input)?;
    expect(input, TokenKind::Assign)?;
    let expression = expression(input)?;
    let end = expect(input, TokenKind::Semicolon)?;

    Ok(Statement::new(
        StatementKind::DeclareAlias(AliasDeclaration {
            index: None,
            name,
            expression,
            is_exported: export_attribute(attributes)?,
            cond: cond_attribute(attributes)?,
        }),
        start.location.extend_to(&end.location),
    ))
}

fn const_declaration(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(
        attributes,
        &[AttributeType::Export, AttributeType::Cond],
        "const",
    )?;
    let start = expect(input, TokenKind::Const)?;
    let name = identifier(input)?;
    let ty = match eat(input, TokenKind::Colon)? {
        Some(_) => Some(type_expression(input)?),
        None => None,
    };
    let expression = match eat(input, TokenKind::Assign)? {
        Some(_) => Some(expression(input)?),
        None => None,
    };
    let end = expect(input, TokenKind::Semicolon)?;

    Ok(Statement::new(
        StatementKind::DeclareConst(ConstDeclaration {
            index: None,
            name,
            ty,
            expression,
            is_exported: export_attribute(attributes)?,
            cond: cond_attribute(attributes)?,
        }),
        start.location.extend_to(&end.location),
    ))
}

fn option_declaration(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(attributes, &[AttributeType::Tag], "option")?;
    let start = expect(input, TokenKind::Option)?;
    let name = identifier(input)?;
    expect(input, TokenKind::Colon)?;
    let ty = type_expression(input)?;
    let default = match eat(input, TokenKind::Assign)? {
        Some(_) => Some(expression(input)?),
        None => None,
    };
    let end = expect(input, TokenKind::Semicolon)?;

    Ok(Statement::new(
        StatementKind::DeclareOption(OptionDeclaration {
            index: None,
            name,
            ty,
            default,
            tag: tag_attribute(attributes)?,
            hash: 0,
        }),
        start.location.extend_to(&end.location),
    ))
}

/// Parse the `{ [attrs] name: type, ... }` body shared by structs and
/// external blocks. The callback builds one member from its attributes.
fn member_list<T>(
    input: &mut Input<'_, '_>,
    mut member: impl FnMut(Vec<Attribute>, Spanned<String>, Expression) -> IResult<T>,
) -> IResult<(Vec<T>, SourceLocation)> {
    expect(input, TokenKind::OpenCurlyBracket)?;
    let mut members = Vec::new();
    loop {
        if let Some(close) = eat(input, TokenKind::ClosingCurlyBracket)? {
            return Ok((members, close.location.clone()));
        }
        let attributes = attributes(input)?;
        let name = identifier(input)?;
        expect(input, TokenKind::Colon)?;
        let ty = type_expression(input)?;
        members.push(member(attributes, name, ty)?);

        if eat(input, TokenKind::Comma)?.is_none() {
            let close = expect(input, TokenKind::ClosingCurlyBracket)?;
            return Ok((members, close.location.clone()));
        }
    }
}

fn struct_declaration(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(
        attributes,
        &[AttributeType::Export, AttributeType::Cond, AttributeType::Layout],
        "struct",
    )?;
    let start = expect(input, TokenKind::Struct)?;
    let name = identifier(input)?;

    let (members, end) = member_list(input, |attributes, name, ty| {
        check_attributes(
            &attributes,
            &[AttributeType::Builtin, AttributeType::Cond, AttributeType::Location],
            "struct member",
        )?;
        Ok(StructMember {
            name,
            ty,
            builtin: find_attribute(&attributes, AttributeType::Builtin)
                .map(|attribute| attribute.identifier::<BuiltinEntry>().map(AttributeValue::Value))
                .transpose()?,
            location_index: expression_attribute(&attributes, AttributeType::Location)?,
            cond: cond_attribute(&attributes)?,
        })
    })?;

    let layout = find_attribute(attributes, AttributeType::Layout)
        .map(|attribute| attribute.identifier::<MemoryLayout>().map(AttributeValue::Value))
        .transpose()?;

    Ok(Statement::new(
        StatementKind::DeclareStruct(StructDeclaration {
            index: None,
            name,
            is_exported: export_attribute(attributes)?,
            cond: cond_attribute(attributes)?,
            layout,
            members,
        }),
        start.location.extend_to(&end),
    ))
}

fn external_declaration(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
) -> IResult<Statement> {
    check_attributes(
        attributes,
        &[AttributeType::AutoBinding, AttributeType::Set, AttributeType::Tag],
        "external block",
    )?;
    let start = expect(input, TokenKind::External)?;

    let (variables, end) = member_list(input, |attributes, name, ty| {
        check_attributes(
            &attributes,
            &[
                AttributeType::Binding,
                AttributeType::Cond,
                AttributeType::Set,
                AttributeType::Tag,
            ],
            "external variable",
        )?;
        Ok(ExternalVariable {
            index: None,
            name,
            ty,
            set: expression_attribute(&attributes, AttributeType::Set)?,
            binding: expression_attribute(&attributes, AttributeType::Binding)?,
            tag: tag_attribute(&attributes)?,
            cond: cond_attribute(&attributes)?,
        })
    })?;

    Ok(Statement::new(
        StatementKind::DeclareExternal(ExternalDeclaration {
            set: expression_attribute(attributes, AttributeType::Set)?,
            auto_binding: find_attribute(attributes, AttributeType::AutoBinding)
                .map(Attribute::flag)
                .transpose()?,
            tag: tag_attribute(attributes)?,
            variables,
        }),
        start.location.extend_to(&end),
    ))
}

fn function_declaration(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
) -> IResult<Statement> {
    check_attributes(
        attributes,
        &[
            AttributeType::Cond,
            AttributeType::DepthWrite,
            AttributeType::EarlyFragmentTests,
            AttributeType::Entry,
            AttributeType::Export,
            AttributeType::Workgroup,
        ],
        "function",
    )?;
    let start = expect(input, TokenKind::Fn)?;
    let name = identifier(input)?;

    expect(input, TokenKind::OpenParenthesis)?;
    let mut parameters = Vec::new();
    while peek_kind(input)? != TokenKind::ClosingParenthesis {
        let name = identifier(input)?;
        expect(input, TokenKind::Colon)?;
        let ty = type_expression(input)?;
        parameters.push(FunctionParameter {
            index: None,
            name,
            ty,
        });
        if eat(input, TokenKind::Comma)?.is_none() {
            break;
        }
    }
    expect(input, TokenKind::ClosingParenthesis)?;

    let return_type = match eat(input, TokenKind::Arrow)? {
        Some(_) => Some(type_expression(input)?),
        None => None,
    };
    let (statements, body_location) = block(input, false)?;

    let workgroup = match find_attribute(attributes, AttributeType::Workgroup) {
        Some(attribute) => {
            let [x, y, z] = attribute.expect_parameters(3)? else {
                return Err(attribute.parameter_count_error(3));
            };
            Some([x, y, z].map(|e| AttributeValue::Expression(Box::new(e.clone()))))
        }
        None => None,
    };

    Ok(Statement::new(
        StatementKind::DeclareFunction(FunctionDeclaration {
            index: None,
            name,
            parameters,
            return_type,
            statements,
            entry_stage: find_attribute(attributes, AttributeType::Entry)
                .map(|attribute| attribute.identifier::<ShaderStage>().map(AttributeValue::Value))
                .transpose()?,
            workgroup,
            early_fragment_tests: find_attribute(attributes, AttributeType::EarlyFragmentTests)
                .map(Attribute::flag)
                .transpose()?,
            depth_write: find_attribute(attributes, AttributeType::DepthWrite)
                .map(|attribute| attribute.identifier::<DepthWriteMode>().map(AttributeValue::Value))
                .transpose()?,
            is_exported: export_attribute(attributes)?,
            cond: cond_attribute(attributes)?,
        }),
        start.location.extend_to(&body_location),
    ))
}

fn variable_declaration(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
) -> IResult<Statement> {
    check_attributes(attributes, &[], "let")?;
    let start = expect(input, TokenKind::Let)?;
    let name = identifier(input)?;
    let ty = match eat(input, TokenKind::Colon)? {
        Some(_) => Some(type_expression(input)?),
        None => None,
    };
    let initial = match eat(input, TokenKind::Assign)? {
        Some(_) => Some(expression(input)?),
        None => None,
    };
    let end = expect(input, TokenKind::Semicolon)?;

    Ok(Statement::new(
        StatementKind::DeclareVariable(VariableDeclaration {
            index: None,
            name,
            ty,
            initial,
        }),
        start.location.extend_to(&end.location),
    ))
}

fn parenthesized(input: &mut Input<'_, '_>) -> IResult<Expression> {
    expect(input, TokenKind::OpenParenthesis)?;
    let expression = expression(input)?;
    expect(input, TokenKind::ClosingParenthesis)?;
    Ok(expression)
}

fn branch_statement(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
    top_level: bool,
) -> IResult<Statement> {
    check_attributes(attributes, &[], "statement")?;
    let start = peek_token(input)?;
    let is_const = eat(input, TokenKind::Const)?.is_some();
    expect(input, TokenKind::If)?;

    let condition = parenthesized(input)?;
    let statement = inner_statement(input, top_level)?;
    let mut location = start.location.extend_to(&statement.location);
    let mut branches = vec![ConditionalBranch {
        condition,
        statement: Box::new(statement),
    }];
    let mut else_statement = None;

    while eat(input, TokenKind::Else)?.is_some() {
        if eat(input, TokenKind::If)?.is_some() {
            let condition = parenthesized(input)?;
            let statement = inner_statement(input, top_level)?;
            location = location.extend_to(&statement.location);
            branches.push(ConditionalBranch {
                condition,
                statement: Box::new(statement),
            });
        } else {
            let statement = inner_statement(input, top_level)?;
            location = location.extend_to(&statement.location);
            else_statement = Some(Box::new(statement));
            break;
        }
    }

    Ok(Statement::new(
        StatementKind::Branch(BranchStatement {
            branches,
            else_statement,
            is_const,
        }),
        location,
    ))
}

fn for_statement(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(attributes, &[AttributeType::Unroll], "for")?;
    let unroll = unroll_attribute(attributes)?;
    let start = expect(input, TokenKind::For)?;
    let variable = identifier(input)?;
    expect(input, TokenKind::In)?;
    let from = expression(input)?;

    if eat(input, TokenKind::Arrow)?.is_some() {
        let to = expression(input)?;
        let step = match eat(input, TokenKind::Colon)? {
            Some(_) => Some(expression(input)?),
            None => None,
        };
        let body = inner_statement(input, false)?;
        let location = start.location.extend_to(&body.location);
        return Ok(Statement::new(
            StatementKind::For(ForStatement {
                index: None,
                variable,
                from,
                to,
                step,
                unroll,
                body: Box::new(body),
            }),
            location,
        ));
    }

    let body = inner_statement(input, false)?;
    let location = start.location.extend_to(&body.location);
    Ok(Statement::new(
        StatementKind::ForEach(ForEachStatement {
            index: None,
            variable,
            expression: from,
            unroll,
            body: Box::new(body),
        }),
        location,
    ))
}

fn while_statement(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(attributes, &[AttributeType::Unroll], "while")?;
    let unroll = unroll_attribute(attributes)?;
    let start = expect(input, TokenKind::While)?;
    let condition = parenthesized(input)?;
    let body = inner_statement(input, false)?;
    let location = start.location.extend_to(&body.location);

    Ok(Statement::new(
        StatementKind::While(WhileStatement {
            condition,
            unroll,
            body: Box::new(body),
        }),
        location,
    ))
}

fn return_statement(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(attributes, &[], "statement")?;
    let start = expect(input, TokenKind::Return)?;
    let value = if peek_kind(input)? == TokenKind::Semicolon {
        None
    } else {
        Some(expression(input)?)
    };
    let end = expect(input, TokenKind::Semicolon)?;
    Ok(Statement::new(
        StatementKind::Return(value),
        start.location.extend_to(&end.location),
    ))
}

fn import_identifier(input: &mut Input<'_, '_>) -> IResult<ImportIdentifier> {
    let (name, mut location) = match eat(input, TokenKind::Multiply)? {
        Some(star) => (None, star.location.clone()),
        None => {
            let name = identifier(input)?;
            let location = name.location().clone();
            (Some(name.into_inner()), location)
        }
    };
    let rename = match eat(input, TokenKind::As)? {
        Some(_) => {
            let rename = identifier(input)?;
            location = location.extend_to(rename.location());
            Some(rename.into_inner())
        }
        None => None,
    };
    Ok(ImportIdentifier {
        identifier: name,
        rename,
        location,
    })
}

fn import_statement(input: &mut Input<'_, '_>, attributes: &[Attribute]) -> IResult<Statement> {
    check_attributes(attributes, &[], "import")?;
    let start = expect(input, TokenKind::Import)?;

    // `import a, b as c from Mod;` versus `import Mod as M;`
    let is_list = match peek_kind(input)? {
        TokenKind::Multiply => true,
        TokenKind::Identifier => {
            let checkpoint = input.checkpoint();
            next_token(input)?;
            if eat(input, TokenKind::As)?.is_some() {
                next_token(input)?;
            }
            let follower = peek_kind(input)?;
            input.reset(&checkpoint);
            matches!(follower, TokenKind::Comma | TokenKind::From)
        }
        _ => false,
    };

    let mut identifiers = Vec::new();
    let mut module_alias = None;
    let module = if is_list {
        loop {
            identifiers.push(import_identifier(input)?);
            if eat(input, TokenKind::Comma)?.is_none() {
                break;
            }
        }
        expect(input, TokenKind::From)?;
        module_name(input)?
    } else {
        let module = module_name(input)?;
        if eat(input, TokenKind::As)?.is_some() {
            module_alias = Some(identifier(input)?);
        }
        module
    };
    let end = expect(input, TokenKind::Semicolon)?;

    Ok(Statement::new(
        StatementKind::Import(ImportStatement {
            module_name: module,
            module_alias,
            identifiers,
        }),
        start.location.extend_to(&end.location),
    ))
}

fn assign_operator(kind: TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Assign => AssignOp::Simple,
        TokenKind::PlusAssign => AssignOp::CompoundAdd,
        TokenKind::MinusAssign => AssignOp::CompoundSubtract,
        TokenKind::MultiplyAssign => AssignOp::CompoundMultiply,
        TokenKind::DivideAssign => AssignOp::CompoundDivide,
        TokenKind::ModuloAssign => AssignOp::CompoundModulo,
        _ => return None,
    })
}

fn expression_statement(
    input: &mut Input<'_, '_>,
    attributes: &[Attribute],
) -> IResult<Statement> {
    check_attributes(attributes, &[], "statement")?;
    let mut value = expression
        .context(Context::Label("expression statement"))
        .parse_next(input)?;

    if let Some(op) = assign_operator(peek_kind(input)?) {
        next_token(input)?;
        let right = expression(input)?;
        let location = value.location.extend_to(&right.location);
        value = Expression::new(
            ExpressionKind::Assign {
                op,
                left: Box::new(value),
                right: Box::new(right),
            },
            location,
        );
    }

    let end = expect(input, TokenKind::Semicolon)?;
    let location = value.location.extend_to(&end.location);
    Ok(Statement::new(StatementKind::Expression(value), location))
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// Parse a full expression.
fn expression(input: &mut Input<'_, '_>) -> IResult<Expression> {
    binary_expression(input, 0)
}

/// Parse a type: a name followed by `.member` or `[parameters]` suffixes.
fn type_expression(input: &mut Input<'_, '_>) -> IResult<Expression> {
    let token = peek_token(input)?;
    if token.kind != TokenKind::Identifier {
        return Err(unexpected(token));
    }
    let name = identifier
        .context(Context::Label("type"))
        .parse_next(input)?;
    let base = Expression::identifier(name.inner().clone(), name.location().clone());
    postfix_expression(input, base, false)
}

/// Parse a comma separated list up to (not including) `terminator`.
fn expression_list(input: &mut Input<'_, '_>, terminator: TokenKind) -> IResult<Vec<Expression>> {
    let mut expressions = Vec::new();
    while peek_kind(input)? != terminator {
        expressions.push(expression(input)?);
        if eat(input, TokenKind::Comma)?.is_none() {
            break;
        }
    }
    Ok(expressions)
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::Multiply => BinaryOp::Multiply,
        TokenKind::Divide => BinaryOp::Divide,
        TokenKind::Modulo => BinaryOp::Modulo,
        TokenKind::Equal => BinaryOp::CompEq,
        TokenKind::NotEqual => BinaryOp::CompNe,
        TokenKind::LessThan => BinaryOp::CompLt,
        TokenKind::LessThanEqual => BinaryOp::CompLe,
        TokenKind::GreaterThan => BinaryOp::CompGt,
        TokenKind::GreaterThanEqual => BinaryOp::CompGe,
        TokenKind::LogicalAnd => BinaryOp::LogicalAnd,
        TokenKind::LogicalOr => BinaryOp::LogicalOr,
        TokenKind::BitwiseAnd => BinaryOp::BitwiseAnd,
        TokenKind::BitwiseOr => BinaryOp::BitwiseOr,
        TokenKind::BitwiseXor => BinaryOp::BitwiseXor,
        TokenKind::ShiftLeft => BinaryOp::ShiftLeft,
        TokenKind::ShiftRight => BinaryOp::ShiftRight,
        _ => return None,
    })
}

/// Precedence climbing; operators of equal precedence associate to the left.
fn binary_expression(input: &mut Input<'_, '_>, min_precedence: u8) -> IResult<Expression> {
    let mut left = unary_expression(input)?;
    while let Some(op) = binary_operator(peek_kind(input)?) {
        let precedence = op.precedence();
        if precedence <= min_precedence {
            break;
        }
        next_token(input)?;
        let right = binary_expression(input, precedence)?;
        let location = left.location.extend_to(&right.location);
        left = Expression::new(
            ExpressionKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            location,
        );
    }
    Ok(left)
}

fn unary_expression(input: &mut Input<'_, '_>) -> IResult<Expression> {
    let token = peek_token(input)?;
    let op = match token.kind {
        TokenKind::Minus => UnaryOp::Minus,
        TokenKind::Plus => UnaryOp::Plus,
        TokenKind::Not => UnaryOp::LogicalNot,
        TokenKind::BitwiseNot => UnaryOp::BitwiseNot,
        _ => {
            let primary = primary_expression(input)?;
            return postfix_expression(input, primary, true);
        }
    };
    next_token(input)?;
    let operand = unary_expression(input)?;
    let location = token.location.extend_to(&operand.location);
    Ok(Expression::new(
        ExpressionKind::Unary {
            op,
            expr: Box::new(operand),
        },
        location,
    ))
}

/// Converts a literal token into its constant value. Unsuffixed literals are
/// untyped.
fn literal_value(value: &TokenValue<'_>) -> Option<ConstantSingleValue> {
    Some(match value {
        TokenValue::Integer { value, suffix } => match suffix {
            None => ConstantSingleValue::UntypedInteger(*value),
            Some(NumericSuffix::I32) => ConstantSingleValue::I32(*value as i32),
            Some(NumericSuffix::U32) => ConstantSingleValue::U32(*value as u32),
            Some(NumericSuffix::F32) => ConstantSingleValue::F32(*value as f32),
            Some(NumericSuffix::F64) => ConstantSingleValue::F64(*value as f64),
        },
        TokenValue::Float { value, suffix } => match suffix {
            None => ConstantSingleValue::UntypedFloat(*value),
            Some(NumericSuffix::F32) => ConstantSingleValue::F32(*value as f32),
            // integer suffixes never reach a float token
            Some(_) => ConstantSingleValue::F64(*value),
        },
        TokenValue::String(text) => ConstantSingleValue::String(text.clone()),
        TokenValue::None | TokenValue::Identifier(_) => return None,
    })
}

fn primary_expression(input: &mut Input<'_, '_>) -> IResult<Expression> {
    let token = next_token(input)?;
    match token.kind {
        TokenKind::Identifier => {
            let name = token.identifier().unwrap_or_default();
            check_identifier(name, &token.location)?;
            Ok(Expression::identifier(name, token.location.clone()))
        }
        TokenKind::IntegerValue | TokenKind::FloatingPointValue | TokenKind::StringValue => {
            let value = literal_value(&token.value).ok_or_else(|| unexpected(token))?;
            Ok(Expression::constant(value, token.location.clone()))
        }
        TokenKind::BoolTrue | TokenKind::BoolFalse => Ok(Expression::constant(
            ConstantSingleValue::Bool(token.kind == TokenKind::BoolTrue),
            token.location.clone(),
        )),
        TokenKind::OpenParenthesis => {
            let inner = expression(input)?;
            let close = expect(input, TokenKind::ClosingParenthesis)?;
            Ok(Expression {
                location: token.location.extend_to(&close.location),
                ..inner
            })
        }
        _ => Err(unexpected(token)),
    }
}

/// Parse member access, indexing and (when `allow_call` is set) calls.
fn postfix_expression(
    input: &mut Input<'_, '_>,
    mut expr: Expression,
    allow_call: bool,
) -> IResult<Expression> {
    loop {
        let token = peek_token(input)?;
        expr = match token.kind {
            TokenKind::Dot => {
                next_token(input)?;
                let identifier = identifier(input)?;
                let location = expr.location.extend_to(identifier.location());
                Expression::new(
                    ExpressionKind::AccessIdentifier {
                        expr: Box::new(expr),
                        identifier,
                    },
                    location,
                )
            }
            TokenKind::OpenSquareBracket => {
                next_token(input)?;
                let indices = expression_list(input, TokenKind::ClosingSquareBracket)?;
                let close = expect(input, TokenKind::ClosingSquareBracket)?;
                let location = expr.location.extend_to(&close.location);
                Expression::new(
                    ExpressionKind::AccessIndex {
                        expr: Box::new(expr),
                        indices,
                    },
                    location,
                )
            }
            TokenKind::OpenParenthesis if allow_call => {
                next_token(input)?;
                let parameters = expression_list(input, TokenKind::ClosingParenthesis)?;
                let close = expect(input, TokenKind::ClosingParenthesis)?;
                let location = expr.location.extend_to(&close.location);
                Expression::new(
                    ExpressionKind::CallFunction {
                        target: Box::new(expr),
                        parameters,
                    },
                    location,
                )
            }
            _ => return Ok(expr),
        };
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn convert_error(
    error: ErrMode<ContextError<Context>>,
    tokens: &[Token<'_>],
    remaining: usize,
) -> Diagnostic {
    let current = tokens
        .get(tokens.len().saturating_sub(remaining))
        .or(tokens.last());
    let location = current
        .map(|token| token.location.clone())
        .unwrap_or_default();
    let at_end = current.is_none_or(|token| token.kind == TokenKind::EndOfStream);

    match error {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => {
            if let Some(diagnostic) = e.context().find_map(|ctx| match ctx {
                Context::Failure(diagnostic) => Some(diagnostic.as_ref().clone()),
                Context::Label(_) => None,
            }) {
                return diagnostic;
            }

            let diagnostic = match current {
                Some(token) if !at_end => {
                    Diagnostic::new(ErrorKind::UnexpectedToken(token.kind), location)
                }
                _ => Diagnostic::new(ErrorKind::UnexpectedEndOfFile, location),
            };
            let label = e.context().find_map(|ctx| match ctx {
                Context::Label(label) => Some(*label),
                Context::Failure(_) => None,
            });
            match label {
                Some(label) => diagnostic.with_help(format!("while parsing {label}")),
                None => diagnostic,
            }
        }
        // Token slices are never partial.
        ErrMode::Incomplete(_) => Diagnostic::new(ErrorKind::UnexpectedEndOfFile, location),
    }
}

/// Build an unresolved module from tokens.
///
/// The first statement must be the `module` statement carrying the
/// `nzsl_version` attribute.
///
/// # Example
///
/// ```
/// use tessel_parser::{lexer, parser};
///
/// let tokens = lexer::tokenize("[nzsl_version(\"1.0\")] module; fn main() {}", None).unwrap();
/// let module = parser::parse(&tokens).unwrap();
/// assert_eq!(module.statements.len(), 1);
/// ```
pub fn parse(tokens: &[Token<'_>]) -> Result<Module> {
    let mut input = TokenSlice::new(tokens);
    match module.parse_next(&mut input) {
        Ok(module) => {
            debug!(
                statements = module.statements.len(),
                features = module.metadata.enabled_features.len();
                "Parsed module"
            );
            Ok(module)
        }
        Err(err) => Err(convert_error(err, tokens, input.eof_offset())),
    }
}
