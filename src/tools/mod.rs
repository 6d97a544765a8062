//! 能力层：Capability trait、注册表、schema 校验、执行器与内置能力

pub mod echo;
pub mod executor;
pub mod registry;
pub mod router_update;
pub mod schema;
pub mod write_mail;

pub use echo::EchoTool;
pub use executor::CapabilityExecutor;
pub use registry::{Capability, CapabilityRegistry};
pub use router_update::{RouterUpdateArgs, RouterUpdateTool};
pub use schema::tool_call_schema_json;
pub use write_mail::{WriteMailArgs, WriteMailTool};
