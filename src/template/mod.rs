//! Template catalog: schema metadata, parameter definitions, and the
//! registry orchestrating physical DDL and the publish lifecycle.

pub mod model;
pub mod registry;

pub use model::{ParameterDef, ResourceParameter, ResourceTemplate, TemplatePatch};
pub use registry::TemplateRegistry;
