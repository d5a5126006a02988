//! The shared semantic project: type system entities, copy-on-write
//! snapshots and the source file model

pub mod snapshot;
pub mod source_model;
pub mod type_system;

pub use snapshot::{ProjectContent, SharedProject, UnresolvedFile};
pub use source_model::SourceModel;
pub use type_system::{
    AssemblyIdentity, MemberDef, MemberKind, ParameterDef, TypeDef, TypeKind, UnresolvedAssembly,
};
