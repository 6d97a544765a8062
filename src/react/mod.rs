//! 认知层：模型后端、Planner、生命周期事件、编排主循环

pub mod backend;
pub mod events;
pub mod loop_;
pub mod planner;

pub use backend::{ModelBackend, ModelDecision, ScriptedBackend};
pub use events::{
    AgentEvent, ChannelObserver, ConsoleObserver, EventChannel, EventRecorder, LoggingObserver,
    Observer, ObserverError,
};
pub use loop_::Orchestrator;
pub use planner::{parse_llm_output, Planner};
