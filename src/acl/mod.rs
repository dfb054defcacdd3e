//! Object-level access control: sids, permission masks, ordered entries,
//! and the evaluation engine.

pub mod engine;
pub mod model;

pub use engine::AclEngine;
pub use model::{
    evaluate, permission, AccessControlEntry, ObjectClass, ObjectIdentity, Principal,
    PrincipalPermission, Sid,
};
