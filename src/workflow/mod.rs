pub mod types;
pub mod graph;
pub mod builder;
pub mod planner;
pub mod engine;

pub use types::*;
pub use graph::DependencyScheduler;
pub use builder::PlanBuilder;
pub use planner::{Planner, TemplatePlanner};
pub use engine::{Orchestrator, WorkflowRequest};
