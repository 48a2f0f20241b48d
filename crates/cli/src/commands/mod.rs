//! CLI command implementations.

pub mod ingest;
pub mod plan;
pub mod status;

pub use ingest::{run_ingest, IngestArgs};
pub use plan::{run_plan, PlanArgs};
pub use status::{run_status, StatusArgs};
