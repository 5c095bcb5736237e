// Measurement campaign log: immutable capture rows, the JSON store, and the
// consistency checks that run before any analysis trusts a capture.

mod record;
mod store;

pub use record::{CaptureRecord, RowIssue};
pub use store::{CaptureLog, LogError};
