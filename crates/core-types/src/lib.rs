//! Shared types for flow discovery and execution.

pub mod element;
pub mod flow;
pub mod manifest;
pub mod result;

pub use element::InteractiveElement;
pub use flow::{
    AssertKind, Expectation, ExecutionContext, Flow, FlowCategory, Step, StepAction, StepInput,
};
pub use manifest::{FlowManifest, SourceFileRecord};
pub use result::ExecutionResult;
