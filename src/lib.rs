pub mod app;
pub mod config;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod gene;
pub mod infra;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod registry;
pub mod report;
pub mod storage;
pub mod tasks;
pub mod types;

pub use config::Config;
pub use consensus::{AgreementDenominator, ConsensusGroup};
pub use error::{ErrorKind, GeneError, Result};
pub use gene::{Direction, Gene};
pub use pipeline::{Pipeline, RunHandle, RunOutcome, TaskEvent};
pub use registry::SourceRegistry;
pub use types::{SequenceInput, SourceKind, ToolResult};
