//! Call linkage metadata: call descriptors and fast API C signatures.
//!
//! Call nodes refer to these by id; the tables live in the [`Graph`].
//!
//! [`Graph`]: super::graph::Graph

use crate::repr::MachineType;

// =============================================================================
// Call Descriptor
// =============================================================================

/// Index of a [`CallDescriptor`] in the graph's linkage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallDescriptorId(pub u32);

/// Machine signature of a call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallDescriptor {
    /// Machine type of each declared parameter (target excluded).
    pub parameters: Vec<MachineType>,
    /// Machine type of each return value.
    pub returns: Vec<MachineType>,
}

impl CallDescriptor {
    pub fn new(parameters: Vec<MachineType>, returns: Vec<MachineType>) -> Self {
        Self {
            parameters,
            returns,
        }
    }

    /// Descriptor of a JavaScript call with `argc` tagged arguments.
    pub fn js_call(argc: usize) -> Self {
        Self {
            parameters: vec![MachineType::any_tagged(); argc],
            returns: vec![MachineType::any_tagged()],
        }
    }

    #[inline]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    #[inline]
    pub fn return_count(&self) -> usize {
        self.returns.len()
    }
}

// =============================================================================
// Fast API C Types
// =============================================================================

/// Scalar C type of a fast API argument or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    Void,
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
    Pointer,
    /// An engine value passed as a handle.
    V8Value,
    SeqOneByteString,
}

/// Conversion flags on a C parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CTypeFlags {
    #[default]
    None,
    /// Throw on values outside the integer range.
    EnforceRange,
    /// Saturate values outside the integer range.
    Clamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CTypeInfo {
    pub ty: CType,
    pub flags: CTypeFlags,
}

impl CTypeInfo {
    pub const fn new(ty: CType) -> Self {
        Self {
            ty,
            flags: CTypeFlags::None,
        }
    }

    pub const fn with_flags(ty: CType, flags: CTypeFlags) -> Self {
        Self { ty, flags }
    }

    /// Machine type of a value of this C type.
    pub const fn machine_type(&self) -> MachineType {
        match self.ty {
            CType::Void => MachineType::any_tagged(),
            CType::Bool => MachineType::bool(),
            CType::Int32 => MachineType::int32(),
            CType::Uint32 => MachineType::uint32(),
            CType::Int64 => MachineType::int64(),
            CType::Uint64 => MachineType::uint64(),
            CType::Float32 => MachineType::float32(),
            CType::Float64 => MachineType::float64(),
            CType::Pointer | CType::V8Value | CType::SeqOneByteString => {
                MachineType::any_tagged()
            }
        }
    }
}

/// Index of a [`FastApiCallInfo`] in the graph's linkage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FastApiCallId(pub u32);

/// Signature of a fast C function plus its slow fallback.
///
/// A fast API call node's value inputs are the C arguments followed by the
/// slow call's target and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastApiCallInfo {
    pub arguments: Vec<CTypeInfo>,
    pub return_info: CTypeInfo,
    /// 64-bit integers cross the boundary as BigInts.
    pub int64_as_bigint: bool,
}

impl FastApiCallInfo {
    pub fn new(arguments: Vec<CTypeInfo>, return_info: CTypeInfo) -> Self {
        Self {
            arguments,
            return_info,
            int64_as_bigint: false,
        }
    }

    #[inline]
    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }
}
