//! Combine Pipeline
//!
//! Merges the finished recordings of the source directory into one file:
//! a plain conversion for one input, an xstack/amix grid for 2 to 12.

mod layout;
mod pipeline;

pub use layout::{layout_for, MAX_INPUTS, MIN_INPUTS};
pub use pipeline::{
    plan, scan_inputs, CombineOutcome, CombinePipeline, CombinePlan, CombineStatus, SystemRunner,
    ToolOutput, ToolRunner, MEDIA_EXTENSIONS,
};
