//! Attribute kinds and the enumerations their parameters select from.
//!
//! Attributes are written `[name(args)]` in source. Each kind has a stable
//! source name, used both by the parser to recognize it and by diagnostics
//! to refer to it.

use std::{fmt, str::FromStr};

use serde::Deserialize;

/// Declares a source-named enumeration with `as_str`, `Display` and `FromStr`.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the name used in source.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(()),
                }
            }
        }
    };
}

named_enum! {
    /// Every attribute kind the language knows about.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum AttributeType {
        Author => "author",
        AutoBinding => "auto_binding",
        Binding => "binding",
        Builtin => "builtin",
        Cond => "cond",
        DepthWrite => "depth_write",
        Description => "desc",
        EarlyFragmentTests => "early_fragment_tests",
        Entry => "entry",
        Export => "export",
        Feature => "feature",
        LangVersion => "nzsl_version",
        Layout => "layout",
        License => "license",
        Location => "location",
        Set => "set",
        Tag => "tag",
        Unroll => "unroll",
        Workgroup => "workgroup",
    }
}

impl AttributeType {
    /// Whether the attribute may only appear once on a given target.
    pub fn is_unique(&self) -> bool {
        !matches!(self, AttributeType::Feature)
    }
}

/// Shader pipeline stages an entry point can target.
///
/// Parsed from the `entry` attribute names (`compute`, `frag`, `vert`);
/// `Display` gives the human readable name used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Compute,
    Fragment,
    Vertex,
}

impl ShaderStage {
    pub const ALL: &'static [ShaderStage] =
        &[ShaderStage::Compute, ShaderStage::Fragment, ShaderStage::Vertex];

    /// Returns the name used in source.
    pub fn as_str(&self) -> &'static str {
        match self {
            ShaderStage::Compute => "compute",
            ShaderStage::Fragment => "frag",
            ShaderStage::Vertex => "vert",
        }
    }

    /// Human readable stage name used in diagnostics.
    pub fn display_name(&self) -> &'static str {
        match self {
            ShaderStage::Compute => "compute",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Vertex => "vertex",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ShaderStage {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShaderStage::ALL
            .iter()
            .find(|stage| stage.as_str() == s)
            .copied()
            .ok_or(())
    }
}

named_enum! {
    /// Optional language features a module may require.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
    #[serde(try_from = "String")]
    pub enum ModuleFeature {
        Float64 => "float64",
        PrimitiveExternals => "primitive_externals",
        Texture1D => "texture1D",
    }
}

impl TryFrom<String> for ModuleFeature {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value
            .parse()
            .map_err(|()| format!("unknown module feature `{value}`"))
    }
}

named_enum! {
    /// Memory layouts a struct can be declared with.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum MemoryLayout {
        Scalar => "scalar",
        Std140 => "std140",
        Std430 => "std430",
    }
}

named_enum! {
    /// Loop unrolling hints.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum LoopUnroll {
        Always => "always",
        #[default]
        Hint => "hint",
        Never => "never",
    }
}

named_enum! {
    /// Depth write modes for fragment entry points.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum DepthWriteMode {
        Greater => "greater",
        Less => "less",
        Replace => "replace",
        Unchanged => "unchanged",
    }
}

named_enum! {
    /// Access qualifiers for storage buffers and textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub enum AccessPolicy {
        #[default]
        ReadOnly => "readonly",
        ReadWrite => "readwrite",
        WriteOnly => "writeonly",
    }
}

named_enum! {
    /// Texel formats for storage textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ImageFormat {
        Rgba8 => "rgba8",
    }
}

named_enum! {
    /// Dimensionality of samplers and textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ImageType {
        E1D => "1D",
        E1DArray => "1D_array",
        E2D => "2D",
        E2DArray => "2D_array",
        E3D => "3D",
        Cubemap => "cube",
    }
}

impl ImageType {
    /// Number of coordinate components needed to address the image.
    pub fn coordinate_count(&self) -> u8 {
        match self {
            ImageType::E1D => 1,
            ImageType::E1DArray | ImageType::E2D => 2,
            ImageType::E2DArray | ImageType::E3D | ImageType::Cubemap => 3,
        }
    }
}

/// Builtin shader inputs and outputs a struct field can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinEntry {
    BaseInstance,
    BaseVertex,
    DrawIndex,
    FragCoord,
    FragDepth,
    GlobalInvocationIndices,
    InstanceIndex,
    LocalInvocationIndex,
    LocalInvocationIndices,
    VertexIndex,
    VertexPosition,
    WorkgroupCount,
    WorkgroupIndices,
}

/// Scalar or vector shape a builtin must be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinShape {
    F32,
    I32,
    U32,
    Vec3U32,
    Vec4F32,
}

impl fmt::Display for BuiltinShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuiltinShape::F32 => "f32",
            BuiltinShape::I32 => "i32",
            BuiltinShape::U32 => "u32",
            BuiltinShape::Vec3U32 => "vec3[u32]",
            BuiltinShape::Vec4F32 => "vec4[f32]",
        })
    }
}

impl BuiltinEntry {
    pub const ALL: &'static [BuiltinEntry] = &[
        BuiltinEntry::BaseInstance,
        BuiltinEntry::BaseVertex,
        BuiltinEntry::DrawIndex,
        BuiltinEntry::FragCoord,
        BuiltinEntry::FragDepth,
        BuiltinEntry::GlobalInvocationIndices,
        BuiltinEntry::InstanceIndex,
        BuiltinEntry::LocalInvocationIndex,
        BuiltinEntry::LocalInvocationIndices,
        BuiltinEntry::VertexIndex,
        BuiltinEntry::VertexPosition,
        BuiltinEntry::WorkgroupCount,
        BuiltinEntry::WorkgroupIndices,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinEntry::BaseInstance => "base_instance",
            BuiltinEntry::BaseVertex => "base_vertex",
            BuiltinEntry::DrawIndex => "draw_index",
            BuiltinEntry::FragCoord => "frag_coord",
            BuiltinEntry::FragDepth => "frag_depth",
            BuiltinEntry::GlobalInvocationIndices => "global_invocation_indices",
            BuiltinEntry::InstanceIndex => "instance_index",
            BuiltinEntry::LocalInvocationIndex => "local_invocation_index",
            BuiltinEntry::LocalInvocationIndices => "local_invocation_indices",
            BuiltinEntry::VertexIndex => "vertex_index",
            BuiltinEntry::VertexPosition => "position",
            BuiltinEntry::WorkgroupCount => "workgroup_count",
            BuiltinEntry::WorkgroupIndices => "workgroup_indices",
        }
    }

    /// The only stage in which the builtin is available.
    pub fn stage(&self) -> ShaderStage {
        match self {
            BuiltinEntry::BaseInstance
            | BuiltinEntry::BaseVertex
            | BuiltinEntry::DrawIndex
            | BuiltinEntry::InstanceIndex
            | BuiltinEntry::VertexIndex
            | BuiltinEntry::VertexPosition => ShaderStage::Vertex,
            BuiltinEntry::FragCoord | BuiltinEntry::FragDepth => ShaderStage::Fragment,
            BuiltinEntry::GlobalInvocationIndices
            | BuiltinEntry::LocalInvocationIndex
            | BuiltinEntry::LocalInvocationIndices
            | BuiltinEntry::WorkgroupCount
            | BuiltinEntry::WorkgroupIndices => ShaderStage::Compute,
        }
    }

    /// The type a field bound to this builtin must have.
    pub fn expected_shape(&self) -> BuiltinShape {
        match self {
            BuiltinEntry::BaseInstance
            | BuiltinEntry::BaseVertex
            | BuiltinEntry::DrawIndex
            | BuiltinEntry::InstanceIndex
            | BuiltinEntry::VertexIndex => BuiltinShape::I32,
            BuiltinEntry::FragCoord | BuiltinEntry::VertexPosition => BuiltinShape::Vec4F32,
            BuiltinEntry::FragDepth => BuiltinShape::F32,
            BuiltinEntry::LocalInvocationIndex => BuiltinShape::U32,
            BuiltinEntry::GlobalInvocationIndices
            | BuiltinEntry::LocalInvocationIndices
            | BuiltinEntry::WorkgroupCount
            | BuiltinEntry::WorkgroupIndices => BuiltinShape::Vec3U32,
        }
    }
}

impl fmt::Display for BuiltinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinEntry {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuiltinEntry::ALL
            .iter()
            .copied()
            .find(|entry| entry.as_str() == s)
            .ok_or(())
    }
}
