//! Catalogue of intrinsic functions and their signature rules.
//!
//! Each intrinsic declares one [`ParameterRule`] per parameter and a
//! [`ReturnRule`]. The semantic analyzer walks these rules in order, so a
//! rule may refer back to an earlier parameter (`SameAs`, `SameComponentCountAs`).

use std::fmt;

/// Intrinsic functions callable by name or through methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntrinsicType {
    Abs,
    All,
    Any,
    ArcCos,
    ArcSin,
    ArcTan,
    ArraySize,
    Ceil,
    Clamp,
    Cos,
    CrossProduct,
    Distance,
    DotProduct,
    Exp,
    Exp2,
    Floor,
    Fract,
    InverseSqrt,
    Length,
    Lerp,
    Log,
    Log2,
    MatrixInverse,
    MatrixTranspose,
    Max,
    Min,
    Normalize,
    Pow,
    Reflect,
    Round,
    Select,
    Sign,
    Sin,
    Sqrt,
    Tan,
    TextureRead,
    TextureSampleImplicitLod,
    TextureWrite,
    Trunc,
}

/// Constraint on a single intrinsic parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterRule {
    /// A static or dynamic array.
    Array,
    /// A vector of booleans.
    BoolVector,
    /// A boolean scalar or vector.
    Boolean,
    /// A floating-point scalar or vector.
    Float,
    /// A floating-point matrix.
    FloatMatrix,
    /// A floating-point vector.
    FloatVector,
    /// A floating-point three-component vector.
    FloatVector3,
    /// A scalar, vector or matrix of any non-boolean type.
    Numerical,
    /// Exactly the same type as the referenced parameter.
    SameAs(usize),
    /// A scalar or vector whose component count matches the referenced
    /// parameter; booleans only.
    SameComponentCountAs(usize),
    /// A sampler.
    Sampler,
    /// Floating-point coordinates matching the referenced sampler's dimension.
    SamplerCoordinates(usize),
    /// A square floating-point matrix.
    SquareFloatMatrix,
    /// A signed scalar or vector.
    SignedNumerical,
    /// A storage texture.
    Texture,
    /// Integer coordinates matching the referenced texture's dimension.
    TextureCoordinates(usize),
    /// A texel value for the referenced texture.
    TextureTexel(usize),
}

/// How the result type of an intrinsic is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnRule {
    /// `bool`.
    Bool,
    /// The type of the given parameter.
    Parameter(usize),
    /// The scalar base type of the given parameter.
    ParameterBase(usize),
    /// A four-component vector of the sampler or texture base type.
    SampledTexel(usize),
    /// The transposed matrix type of the given parameter.
    Transposed(usize),
    /// `u32`.
    U32,
    /// Nothing.
    Void,
}

impl IntrinsicType {
    /// Intrinsics callable by name (methods are excluded).
    pub const NAMED: &'static [IntrinsicType] = &[
        IntrinsicType::Abs,
        IntrinsicType::All,
        IntrinsicType::Any,
        IntrinsicType::ArcCos,
        IntrinsicType::ArcSin,
        IntrinsicType::ArcTan,
        IntrinsicType::Ceil,
        IntrinsicType::Clamp,
        IntrinsicType::Cos,
        IntrinsicType::CrossProduct,
        IntrinsicType::Distance,
        IntrinsicType::DotProduct,
        IntrinsicType::Exp,
        IntrinsicType::Exp2,
        IntrinsicType::Floor,
        IntrinsicType::Fract,
        IntrinsicType::InverseSqrt,
        IntrinsicType::Length,
        IntrinsicType::Lerp,
        IntrinsicType::Log,
        IntrinsicType::Log2,
        IntrinsicType::MatrixInverse,
        IntrinsicType::MatrixTranspose,
        IntrinsicType::Max,
        IntrinsicType::Min,
        IntrinsicType::Normalize,
        IntrinsicType::Pow,
        IntrinsicType::Reflect,
        IntrinsicType::Round,
        IntrinsicType::Select,
        IntrinsicType::Sign,
        IntrinsicType::Sin,
        IntrinsicType::Sqrt,
        IntrinsicType::Tan,
        IntrinsicType::Trunc,
    ];

    /// Name used in source (function name or method name).
    pub fn name(&self) -> &'static str {
        match self {
            IntrinsicType::Abs => "abs",
            IntrinsicType::All => "all",
            IntrinsicType::Any => "any",
            IntrinsicType::ArcCos => "acos",
            IntrinsicType::ArcSin => "asin",
            IntrinsicType::ArcTan => "atan",
            IntrinsicType::ArraySize => "Size",
            IntrinsicType::Ceil => "ceil",
            IntrinsicType::Clamp => "clamp",
            IntrinsicType::Cos => "cos",
            IntrinsicType::CrossProduct => "cross",
            IntrinsicType::Distance => "distance",
            IntrinsicType::DotProduct => "dot",
            IntrinsicType::Exp => "exp",
            IntrinsicType::Exp2 => "exp2",
            IntrinsicType::Floor => "floor",
            IntrinsicType::Fract => "fract",
            IntrinsicType::InverseSqrt => "inverse_sqrt",
            IntrinsicType::Length => "length",
            IntrinsicType::Lerp => "lerp",
            IntrinsicType::Log => "log",
            IntrinsicType::Log2 => "log2",
            IntrinsicType::MatrixInverse => "inverse",
            IntrinsicType::MatrixTranspose => "transpose",
            IntrinsicType::Max => "max",
            IntrinsicType::Min => "min",
            IntrinsicType::Normalize => "normalize",
            IntrinsicType::Pow => "pow",
            IntrinsicType::Reflect => "reflect",
            IntrinsicType::Round => "round",
            IntrinsicType::Select => "select",
            IntrinsicType::Sign => "sign",
            IntrinsicType::Sin => "sin",
            IntrinsicType::Sqrt => "sqrt",
            IntrinsicType::Tan => "tan",
            IntrinsicType::TextureRead => "Read",
            IntrinsicType::TextureSampleImplicitLod => "Sample",
            IntrinsicType::TextureWrite => "Write",
            IntrinsicType::Trunc => "trunc",
        }
    }

    /// Finds a named intrinsic.
    pub fn from_name(name: &str) -> Option<IntrinsicType> {
        Self::NAMED.iter().copied().find(|i| i.name() == name)
    }

    /// Parameter rules, one per parameter.
    pub fn parameters(&self) -> &'static [ParameterRule] {
        use ParameterRule::*;
        match self {
            IntrinsicType::Abs | IntrinsicType::Sign => &[SignedNumerical],
            IntrinsicType::All | IntrinsicType::Any => &[BoolVector],
            IntrinsicType::ArcCos
            | IntrinsicType::ArcSin
            | IntrinsicType::ArcTan
            | IntrinsicType::Ceil
            | IntrinsicType::Cos
            | IntrinsicType::Exp
            | IntrinsicType::Exp2
            | IntrinsicType::Floor
            | IntrinsicType::Fract
            | IntrinsicType::InverseSqrt
            | IntrinsicType::Log
            | IntrinsicType::Log2
            | IntrinsicType::Round
            | IntrinsicType::Sin
            | IntrinsicType::Sqrt
            | IntrinsicType::Tan
            | IntrinsicType::Trunc => &[Float],
            IntrinsicType::ArraySize => &[Array],
            IntrinsicType::Clamp => &[Numerical, SameAs(0), SameAs(0)],
            IntrinsicType::CrossProduct => &[FloatVector3, SameAs(0)],
            IntrinsicType::Distance | IntrinsicType::DotProduct | IntrinsicType::Reflect => {
                &[FloatVector, SameAs(0)]
            }
            IntrinsicType::Length | IntrinsicType::Normalize => &[FloatVector],
            IntrinsicType::Lerp => &[Float, SameAs(0), SameAs(0)],
            IntrinsicType::MatrixInverse => &[SquareFloatMatrix],
            IntrinsicType::MatrixTranspose => &[FloatMatrix],
            IntrinsicType::Max | IntrinsicType::Min => &[Numerical, SameAs(0)],
            IntrinsicType::Pow => &[Float, SameAs(0)],
            IntrinsicType::Select => &[Boolean, Numerical, SameAs(1)],
            IntrinsicType::TextureRead => &[Texture, TextureCoordinates(0)],
            IntrinsicType::TextureSampleImplicitLod => &[Sampler, SamplerCoordinates(0)],
            IntrinsicType::TextureWrite => &[Texture, TextureCoordinates(0), TextureTexel(0)],
        }
    }

    /// Extra cross-parameter component-count constraints, checked after the
    /// per-parameter rules.
    pub fn component_constraints(&self) -> &'static [(usize, ParameterRule)] {
        match self {
            IntrinsicType::Select => &[(0, ParameterRule::SameComponentCountAs(1))],
            _ => &[],
        }
    }

    pub fn return_rule(&self) -> ReturnRule {
        match self {
            IntrinsicType::All | IntrinsicType::Any => ReturnRule::Bool,
            IntrinsicType::ArraySize => ReturnRule::U32,
            IntrinsicType::Distance | IntrinsicType::DotProduct | IntrinsicType::Length => {
                ReturnRule::ParameterBase(0)
            }
            IntrinsicType::MatrixTranspose => ReturnRule::Transposed(0),
            IntrinsicType::Select => ReturnRule::Parameter(1),
            IntrinsicType::TextureRead | IntrinsicType::TextureSampleImplicitLod => {
                ReturnRule::SampledTexel(0)
            }
            IntrinsicType::TextureWrite => ReturnRule::Void,
            _ => ReturnRule::Parameter(0),
        }
    }

    /// Whether the intrinsic is reached through method call syntax.
    pub fn is_method(&self) -> bool {
        matches!(
            self,
            IntrinsicType::ArraySize
                | IntrinsicType::TextureRead
                | IntrinsicType::TextureSampleImplicitLod
                | IntrinsicType::TextureWrite
        )
    }
}

impl fmt::Display for IntrinsicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
