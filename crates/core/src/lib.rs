pub mod config;
pub mod domain;
pub mod errors;
pub mod format;

pub use domain::conversation::{ChatTurn, Question, Role};
pub use domain::envelope::{ExecutionResult, ResultEnvelope, RowRecord};
pub use domain::intent::Intent;
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use format::format_result_for_ui;
