//! The expression type lattice.
//!
//! Every resolved expression carries an [`ExpressionType`]. Declarations are
//! referenced by registry index (structs, functions, aliases, modules), never
//! by pointer, so types stay plain data that can be cloned and compared.

use std::fmt;

use crate::{
    attribute::{AccessPolicy, BuiltinShape, ImageFormat, ImageType},
    intrinsic::IntrinsicType,
};

/// Scalar types, including the two untyped literal types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    F32,
    F64,
    I32,
    U32,
    String,
    /// Integer literal whose concrete type is chosen by its context.
    UntypedInteger,
    /// Floating-point literal whose concrete type is chosen by its context.
    UntypedFloat,
}

impl PrimitiveType {
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::UntypedInteger
        )
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(
            self,
            PrimitiveType::F32 | PrimitiveType::F64 | PrimitiveType::UntypedFloat
        )
    }

    /// Integral or floating point.
    pub fn is_numerical(&self) -> bool {
        self.is_integral() || self.is_floating_point()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            PrimitiveType::I32
                | PrimitiveType::F32
                | PrimitiveType::F64
                | PrimitiveType::UntypedInteger
                | PrimitiveType::UntypedFloat
        )
    }

    pub fn is_untyped(&self) -> bool {
        matches!(
            self,
            PrimitiveType::UntypedInteger | PrimitiveType::UntypedFloat
        )
    }

    /// Width in bits of a concrete integral type, used to validate shifts.
    pub fn bit_width(&self) -> Option<u32> {
        match self {
            PrimitiveType::I32 | PrimitiveType::U32 => Some(32),
            PrimitiveType::UntypedInteger => Some(64),
            _ => None,
        }
    }

    /// The concrete type an untyped literal falls back to without context.
    pub fn resolve_untyped(&self) -> PrimitiveType {
        match self {
            PrimitiveType::UntypedInteger => PrimitiveType::I32,
            PrimitiveType::UntypedFloat => PrimitiveType::F32,
            other => *other,
        }
    }

    /// Whether a value of `self` may be implicitly given type `target`.
    ///
    /// Only untyped literals convert: untyped integers to any numerical type,
    /// untyped floats to floating-point types.
    pub fn is_coercible_to(&self, target: PrimitiveType) -> bool {
        match self {
            PrimitiveType::UntypedInteger => target.is_numerical(),
            PrimitiveType::UntypedFloat => target.is_floating_point(),
            other => *other == target,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::I32 => "i32",
            PrimitiveType::U32 => "u32",
            PrimitiveType::String => "string",
            PrimitiveType::UntypedInteger => "{integer}",
            PrimitiveType::UntypedFloat => "{float}",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorType {
    pub base: PrimitiveType,
    pub dims: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MatrixType {
    pub base: PrimitiveType,
    pub columns: u8,
    pub rows: u8,
}

/// A fixed-size array. The contained type is boxed so arrays of arrays have
/// a finite size.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub contained: Box<ExpressionType>,
    pub length: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerType {
    pub dim: ImageType,
    pub base: PrimitiveType,
    pub depth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureType {
    pub dim: ImageType,
    pub base: PrimitiveType,
    pub access: AccessPolicy,
    pub format: ImageFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageType {
    pub struct_index: usize,
    pub access: AccessPolicy,
}

/// An alias and the type it resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasType {
    pub alias_index: usize,
    pub target: Box<ExpressionType>,
}

/// A method bound to an object, awaiting its call arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodType {
    pub object: Box<ExpressionType>,
    pub method: IntrinsicType,
}

/// Generic builtin types that must be specialized with `[...]` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartialType {
    Array,
    DynArray,
    Matrix { columns: u8, rows: u8 },
    PushConstant,
    Sampler { dim: ImageType, depth: bool },
    Storage,
    Texture { dim: ImageType },
    Uniform,
    Vector { dims: u8 },
}

/// The kind of argument a partial type expects at a parameter position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialTypeParameter {
    ConstantValue,
    Identifier,
    Type,
}

impl fmt::Display for PartialTypeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PartialTypeParameter::ConstantValue => "constant value",
            PartialTypeParameter::Identifier => "identifier",
            PartialTypeParameter::Type => "type",
        })
    }
}

impl PartialType {
    /// Parameters every specialization must provide.
    pub fn required_parameters(&self) -> &'static [PartialTypeParameter] {
        use PartialTypeParameter::*;
        match self {
            PartialType::Array => &[Type],
            PartialType::Texture { .. } => &[Type, Identifier, Identifier],
            _ => &[Type],
        }
    }

    /// Parameters that may be omitted.
    pub fn optional_parameters(&self) -> &'static [PartialTypeParameter] {
        use PartialTypeParameter::*;
        match self {
            PartialType::Array => &[ConstantValue],
            PartialType::Storage => &[Identifier],
            _ => &[],
        }
    }

    /// Looks up the partial type a builtin type name refers to.
    pub fn from_name(name: &str) -> Option<PartialType> {
        Some(match name {
            "array" => PartialType::Array,
            "dyn_array" => PartialType::DynArray,
            "push_constant" => PartialType::PushConstant,
            "storage" => PartialType::Storage,
            "uniform" => PartialType::Uniform,
            "vec2" => PartialType::Vector { dims: 2 },
            "vec3" => PartialType::Vector { dims: 3 },
            "vec4" => PartialType::Vector { dims: 4 },
            _ => {
                if let Some(dims) = name.strip_prefix("mat") {
                    let (columns, rows) = parse_matrix_dims(dims)?;
                    return Some(PartialType::Matrix { columns, rows });
                }
                if let Some(dim) = name.strip_prefix("sampler") {
                    let (dim, depth) = match dim.strip_suffix("_depth") {
                        Some(dim) => (dim, true),
                        None => (dim, false),
                    };
                    return Some(PartialType::Sampler {
                        dim: dim.parse().ok()?,
                        depth,
                    });
                }
                if let Some(dim) = name.strip_prefix("texture") {
                    return Some(PartialType::Texture {
                        dim: dim.parse().ok()?,
                    });
                }
                return None;
            }
        })
    }

    /// Whether `name` looks like a builtin type family (`vecN`, `matN`,
    /// `samplerX`, `textureX`) even if its dimensions are invalid.
    pub fn is_builtin_family(name: &str) -> bool {
        let rest = ["vec", "mat", "sampler", "texture"]
            .iter()
            .find_map(|prefix| name.strip_prefix(prefix));
        rest.is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
    }
}

fn parse_matrix_dims(dims: &str) -> Option<(u8, u8)> {
    let valid = |n: u8| (2..=4).contains(&n);
    let (columns, rows) = match dims.split_once('x') {
        Some((c, r)) => (c.parse().ok()?, r.parse().ok()?),
        None => {
            let n = dims.parse().ok()?;
            (n, n)
        }
    };
    (valid(columns) && valid(rows)).then_some((columns, rows))
}

impl fmt::Display for PartialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialType::Array => f.write_str("array"),
            PartialType::DynArray => f.write_str("dyn_array"),
            PartialType::Matrix { columns, rows } if columns == rows => write!(f, "mat{columns}"),
            PartialType::Matrix { columns, rows } => write!(f, "mat{columns}x{rows}"),
            PartialType::PushConstant => f.write_str("push_constant"),
            PartialType::Sampler { dim, depth } => {
                write!(f, "sampler{dim}{}", if *depth { "_depth" } else { "" })
            }
            PartialType::Storage => f.write_str("storage"),
            PartialType::Texture { dim } => write!(f, "texture{dim}"),
            PartialType::Uniform => f.write_str("uniform"),
            PartialType::Vector { dims } => write!(f, "vec{dims}"),
        }
    }
}

/// The type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ExpressionType {
    /// Statements, void functions, and unresolved names under partial analysis.
    #[default]
    NoType,
    Primitive(PrimitiveType),
    Vector(VectorType),
    Matrix(MatrixType),
    Array(ArrayType),
    DynArray(Box<ExpressionType>),
    Struct(usize),
    Sampler(SamplerType),
    Texture(TextureType),
    Uniform(usize),
    Storage(StorageType),
    PushConstant(usize),
    Function(usize),
    IntrinsicFunction(IntrinsicType),
    Method(MethodType),
    Module(usize),
    Alias(AliasType),
    /// An expression naming a full type, such as `f32` or `vec3[f32]`.
    Type(Box<ExpressionType>),
    /// An expression naming a partial type, such as `vec3` or `array`.
    PartialType(PartialType),
}

impl ExpressionType {
    pub fn primitive(base: PrimitiveType) -> Self {
        ExpressionType::Primitive(base)
    }

    pub fn vector(base: PrimitiveType, dims: u8) -> Self {
        ExpressionType::Vector(VectorType { base, dims })
    }

    pub fn matrix(base: PrimitiveType, columns: u8, rows: u8) -> Self {
        ExpressionType::Matrix(MatrixType {
            base,
            columns,
            rows,
        })
    }

    pub fn array(contained: ExpressionType, length: u32) -> Self {
        ExpressionType::Array(ArrayType {
            contained: Box::new(contained),
            length,
        })
    }

    pub fn bool() -> Self {
        ExpressionType::Primitive(PrimitiveType::Bool)
    }

    pub fn is_no_type(&self) -> bool {
        matches!(self, ExpressionType::NoType)
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match self {
            ExpressionType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Base scalar type of scalars, vectors and matrices.
    pub fn base_type(&self) -> Option<PrimitiveType> {
        match self {
            ExpressionType::Primitive(p) => Some(*p),
            ExpressionType::Vector(v) => Some(v.base),
            ExpressionType::Matrix(m) => Some(m.base),
            _ => None,
        }
    }

    /// Number of scalar components for scalars and vectors.
    pub fn component_count(&self) -> Option<u8> {
        match self {
            ExpressionType::Primitive(_) => Some(1),
            ExpressionType::Vector(v) => Some(v.dims),
            _ => None,
        }
    }

    /// Whether any part of the type is an untyped literal type.
    pub fn contains_untyped(&self) -> bool {
        match self {
            ExpressionType::Primitive(p) => p.is_untyped(),
            ExpressionType::Vector(v) => v.base.is_untyped(),
            ExpressionType::Matrix(m) => m.base.is_untyped(),
            ExpressionType::Array(a) => a.contained.contains_untyped(),
            ExpressionType::DynArray(inner) => inner.contains_untyped(),
            _ => false,
        }
    }

    /// Replaces untyped bases with their default concrete types.
    pub fn resolve_untyped(&self) -> ExpressionType {
        match self {
            ExpressionType::Primitive(p) => ExpressionType::Primitive(p.resolve_untyped()),
            ExpressionType::Vector(v) => ExpressionType::vector(v.base.resolve_untyped(), v.dims),
            ExpressionType::Array(a) => ExpressionType::array(a.contained.resolve_untyped(), a.length),
            other => other.clone(),
        }
    }

    /// Returns the same shape with a different scalar base.
    pub fn with_base(&self, base: PrimitiveType) -> ExpressionType {
        match self {
            ExpressionType::Primitive(_) => ExpressionType::Primitive(base),
            ExpressionType::Vector(v) => ExpressionType::vector(base, v.dims),
            ExpressionType::Matrix(m) => ExpressionType::matrix(base, m.columns, m.rows),
            ExpressionType::Array(a) => ExpressionType::array(a.contained.with_base(base), a.length),
            other => other.clone(),
        }
    }

    /// Whether a value of this type may be implicitly converted to `target`.
    pub fn is_coercible_to(&self, target: &ExpressionType) -> bool {
        if self == target {
            return true;
        }
        match (self, target) {
            (ExpressionType::Primitive(a), ExpressionType::Primitive(b)) => a.is_coercible_to(*b),
            (ExpressionType::Vector(a), ExpressionType::Vector(b)) => {
                a.dims == b.dims && a.base.is_coercible_to(b.base)
            }
            (ExpressionType::Array(a), ExpressionType::Array(b)) => {
                a.length == b.length && a.contained.is_coercible_to(&b.contained)
            }
            _ => false,
        }
    }

    /// Scalars, vectors, or arrays of those: the types constants can have.
    pub fn is_constant_type(&self) -> bool {
        match self {
            ExpressionType::Primitive(_) | ExpressionType::Vector(_) => true,
            ExpressionType::Array(a) => matches!(
                *a.contained,
                ExpressionType::Primitive(_) | ExpressionType::Vector(_)
            ),
            _ => false,
        }
    }

    /// Follows alias indirections to the aliased type.
    pub fn resolve_alias(&self) -> &ExpressionType {
        match self {
            ExpressionType::Alias(alias) => alias.target.resolve_alias(),
            other => other,
        }
    }

    /// Renders the type using `names` to print declaration names.
    pub fn display<'a>(&'a self, names: &'a dyn TypeNames) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, names }
    }
}

impl From<PrimitiveType> for ExpressionType {
    fn from(value: PrimitiveType) -> Self {
        ExpressionType::Primitive(value)
    }
}

impl From<BuiltinShape> for ExpressionType {
    fn from(shape: BuiltinShape) -> Self {
        match shape {
            BuiltinShape::F32 => ExpressionType::primitive(PrimitiveType::F32),
            BuiltinShape::I32 => ExpressionType::primitive(PrimitiveType::I32),
            BuiltinShape::U32 => ExpressionType::primitive(PrimitiveType::U32),
            BuiltinShape::Vec3U32 => ExpressionType::vector(PrimitiveType::U32, 3),
            BuiltinShape::Vec4F32 => ExpressionType::vector(PrimitiveType::F32, 4),
        }
    }
}

/// Resolves declaration indices to names when rendering types.
pub trait TypeNames {
    fn struct_name(&self, index: usize) -> Option<String>;
    fn function_name(&self, index: usize) -> Option<String>;
    fn alias_name(&self, index: usize) -> Option<String>;
    fn module_name(&self, index: usize) -> Option<String>;
}

/// Renders indices as `#n` placeholders.
pub struct NoTypeNames;

impl TypeNames for NoTypeNames {
    fn struct_name(&self, _: usize) -> Option<String> {
        None
    }

    fn function_name(&self, _: usize) -> Option<String> {
        None
    }

    fn alias_name(&self, _: usize) -> Option<String> {
        None
    }

    fn module_name(&self, _: usize) -> Option<String> {
        None
    }
}

/// `Display` adapter returned by [`ExpressionType::display`].
pub struct TypeDisplay<'a> {
    ty: &'a ExpressionType,
    names: &'a dyn TypeNames,
}

impl TypeDisplay<'_> {
    fn nested<'b>(&'b self, ty: &'b ExpressionType) -> TypeDisplay<'b> {
        TypeDisplay {
            ty,
            names: self.names,
        }
    }
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let named = |f: &mut fmt::Formatter<'_>, kind: &str, name: Option<String>, index: usize| {
            match name {
                Some(name) => f.write_str(&name),
                None => write!(f, "{kind} #{index}"),
            }
        };

        match self.ty {
            ExpressionType::NoType => f.write_str("()"),
            ExpressionType::Primitive(p) => write!(f, "{p}"),
            ExpressionType::Vector(v) => write!(f, "vec{}[{}]", v.dims, v.base),
            ExpressionType::Matrix(m) if m.columns == m.rows => {
                write!(f, "mat{}[{}]", m.columns, m.base)
            }
            ExpressionType::Matrix(m) => write!(f, "mat{}x{}[{}]", m.columns, m.rows, m.base),
            ExpressionType::Array(a) => {
                write!(f, "array[{}, {}]", self.nested(&a.contained), a.length)
            }
            ExpressionType::DynArray(inner) => write!(f, "dyn_array[{}]", self.nested(inner)),
            ExpressionType::Struct(index) => {
                named(f, "struct", self.names.struct_name(*index), *index)
            }
            ExpressionType::Sampler(s) => write!(
                f,
                "sampler{}{}[{}]",
                s.dim,
                if s.depth { "_depth" } else { "" },
                s.base
            ),
            ExpressionType::Texture(t) => {
                write!(f, "texture{}[{}, {}, {}]", t.dim, t.base, t.access, t.format)
            }
            ExpressionType::Uniform(index) => {
                f.write_str("uniform[")?;
                named(f, "struct", self.names.struct_name(*index), *index)?;
                f.write_str("]")
            }
            ExpressionType::Storage(s) => {
                f.write_str("storage[")?;
                named(f, "struct", self.names.struct_name(s.struct_index), s.struct_index)?;
                write!(f, ", {}]", s.access)
            }
            ExpressionType::PushConstant(index) => {
                f.write_str("push_constant[")?;
                named(f, "struct", self.names.struct_name(*index), *index)?;
                f.write_str("]")
            }
            ExpressionType::Function(index) => {
                f.write_str("function ")?;
                named(f, "function", self.names.function_name(*index), *index)
            }
            ExpressionType::IntrinsicFunction(intrinsic) => write!(f, "intrinsic {intrinsic}"),
            ExpressionType::Method(method) => {
                write!(f, "method {} of {}", method.method, self.nested(&method.object))
            }
            ExpressionType::Module(index) => {
                f.write_str("module ")?;
                named(f, "module", self.names.module_name(*index), *index)
            }
            ExpressionType::Alias(alias) => {
                named(f, "alias", self.names.alias_name(alias.alias_index), alias.alias_index)
            }
            ExpressionType::Type(inner) => write!(f, "{}", self.nested(inner)),
            ExpressionType::PartialType(partial) => write!(f, "{partial}"),
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.display(&NoTypeNames), f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ExpressionType::bool().to_string(), "bool");
        assert_eq!(
            ExpressionType::vector(PrimitiveType::F32, 3).to_string(),
            "vec3[f32]"
        );
        assert_eq!(
            ExpressionType::matrix(PrimitiveType::F32, 4, 4).to_string(),
            "mat4[f32]"
        );
        assert_eq!(
            ExpressionType::matrix(PrimitiveType::F64, 2, 3).to_string(),
            "mat2x3[f64]"
        );
        assert_eq!(
            ExpressionType::array(ExpressionType::vector(PrimitiveType::I32, 2), 8).to_string(),
            "array[vec2[i32], 8]"
        );
        assert_eq!(
            ExpressionType::primitive(PrimitiveType::UntypedFloat).to_string(),
            "{float}"
        );
        assert_eq!(ExpressionType::Struct(3).to_string(), "struct #3");
    }

    #[test]
    fn test_display_with_names() {
        struct Names;
        impl TypeNames for Names {
            fn struct_name(&self, index: usize) -> Option<String> {
                (index == 0).then(|| "Light".to_string())
            }
            fn function_name(&self, _: usize) -> Option<String> {
                None
            }
            fn alias_name(&self, _: usize) -> Option<String> {
                None
            }
            fn module_name(&self, _: usize) -> Option<String> {
                None
            }
        }

        let ty = ExpressionType::array(ExpressionType::Struct(0), 4);
        assert_eq!(ty.display(&Names).to_string(), "array[Light, 4]");
        assert_eq!(
            ExpressionType::Uniform(0).display(&Names).to_string(),
            "uniform[Light]"
        );
    }

    #[test]
    fn test_untyped_coercion() {
        let int = ExpressionType::primitive(PrimitiveType::UntypedInteger);
        let float = ExpressionType::primitive(PrimitiveType::UntypedFloat);

        assert!(int.is_coercible_to(&PrimitiveType::U32.into()));
        assert!(int.is_coercible_to(&PrimitiveType::F64.into()));
        assert!(float.is_coercible_to(&PrimitiveType::F32.into()));
        assert!(!float.is_coercible_to(&PrimitiveType::I32.into()));
        assert!(!ExpressionType::from(PrimitiveType::I32).is_coercible_to(&PrimitiveType::U32.into()));
        assert_eq!(int.resolve_untyped(), PrimitiveType::I32.into());
        assert_eq!(float.resolve_untyped(), PrimitiveType::F32.into());
    }

    #[test]
    fn test_nested_arrays_contain_untyped() {
        let inner = ExpressionType::array(PrimitiveType::UntypedInteger.into(), 2);
        let outer = ExpressionType::array(inner, 3);
        assert!(outer.contains_untyped());
        assert!(!outer.resolve_untyped().contains_untyped());
    }

    #[test]
    fn test_partial_type_names() {
        assert_eq!(
            PartialType::from_name("vec3"),
            Some(PartialType::Vector { dims: 3 })
        );
        assert_eq!(
            PartialType::from_name("mat2x4"),
            Some(PartialType::Matrix { columns: 2, rows: 4 })
        );
        assert_eq!(
            PartialType::from_name("sampler2D_array"),
            Some(PartialType::Sampler {
                dim: ImageType::E2DArray,
                depth: false
            })
        );
        assert_eq!(PartialType::from_name("vec5"), None);
        assert_eq!(PartialType::from_name("mat1"), None);
        assert_eq!(PartialType::from_name("sampler4D"), None);
        assert!(PartialType::is_builtin_family("vec5"));
        assert!(PartialType::is_builtin_family("sampler4D"));
        assert!(!PartialType::is_builtin_family("vector"));
        assert!(!PartialType::is_builtin_family("material"));
    }

    #[test]
    fn test_constant_types() {
        assert!(ExpressionType::vector(PrimitiveType::F32, 2).is_constant_type());
        assert!(ExpressionType::array(PrimitiveType::I32.into(), 2).is_constant_type());
        assert!(!ExpressionType::matrix(PrimitiveType::F32, 2, 2).is_constant_type());
        assert!(!ExpressionType::Struct(0).is_constant_type());
    }
}
