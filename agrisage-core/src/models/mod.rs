pub mod advisory;
pub mod diagnostic;

pub use advisory::{AdvisoryRecord, NewAdvisory};
pub use diagnostic::{DiagnosticRecord, NewDiagnostic};
