//! 核心层：错误类型、运行状态机、批次调度

pub mod error;
pub mod state;
pub mod task_scheduler;

pub use error::{ResearchError, Stage};
pub use state::{ResearchPhase, RunState};
pub use task_scheduler::TaskScheduler;
