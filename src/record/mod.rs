//! Generic record CRUD over dynamically named tables, attachment list
//! bookkeeping, and attribute validation.

pub mod attachments;
pub mod model;
pub mod store;
pub mod validate;

pub use model::{RecordPatch, RecordSaveRequest, ResourceRecord};
pub use store::RecordStore;
