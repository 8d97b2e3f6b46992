pub mod orchestrator;
pub mod pool;
pub mod registry;
pub mod trainer;

pub use orchestrator::{OrchestratorConfig, TuningDependencies, TuningOrchestrator};
pub use pool::TuningWorkerPool;
pub use registry::{JobCounts, JobStatusRegistry};
pub use trainer::GridSearchTrainer;
