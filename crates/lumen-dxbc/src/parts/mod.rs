//! Typed part codecs.

pub mod interfaces;
pub mod rdef;
pub mod shader;
pub mod signature;
pub mod stats;

pub use interfaces::{ClassInstance, ClassType, InterfaceSlot, Interfaces};
pub use rdef::{
    ConstantBuffer, ConstantBufferType, Rd11Header, RdefProgramType, ResourceBinding,
    ResourceDefinition, ResourceReturnType, ShaderInputFlags, ShaderInputType, TypeId, Variable,
    VariableClass, VariableFlags, VariableKind, VariableMember, VariableType, ViewDimension,
};
pub use shader::{ProgramType, ShaderPart};
pub use signature::{RegisterComponentType, Signature, SignatureElement, SystemValue};
pub use stats::{Stats, StatsCounters, StatsExtension};
