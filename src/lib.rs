//! Resource engine: template-driven dynamic record storage over PostgreSQL.
//!
//! Users define record schemas ("templates") at runtime; each template maps
//! to one physical table with one column per declared parameter. Records are
//! validated against the template's schema at the boundary, and every
//! mutating operation is gated by an object-level ACL keyed by owner, group,
//! and permission bitmask.

pub mod acl;
pub mod blob;
pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod naming;
pub mod page;
pub mod record;
pub mod relation;
pub mod sql;
pub mod store;
pub mod template;

pub use acl::{permission, AclEngine, ObjectClass, ObjectIdentity, Principal, Sid};
pub use blob::{FileStorage, MemoryFileStorage, S3FileStorage};
pub use config::{init_tracing, EngineConfig};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use group::{Group, GroupDirectory, GroupMember};
pub use naming::ParameterType;
pub use page::Page;
pub use record::{RecordPatch, RecordSaveRequest, RecordStore, ResourceRecord};
pub use relation::RelationResolver;
pub use store::{ensure_database_exists, ensure_engine_tables};
pub use template::{ParameterDef, ResourceParameter, ResourceTemplate, TemplateRegistry};
