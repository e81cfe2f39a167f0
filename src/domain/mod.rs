//! Domain types for ticket processing.
//!
//! - `ticket`: tracker work items and the change references extracted
//!   from their text
//! - `files`: changed-file metadata and the testable-file filter
//! - `artifact`: generated test artifacts and filename derivation
//! - `outcome`: terminal per-ticket dispositions and pass aggregates

pub mod artifact;
pub mod files;
pub mod outcome;
pub mod ticket;

pub use artifact::{detect_language, test_filename, GeneratedArtifact};
pub use files::{ChangedFile, FileFilter, SourceFile};
pub use outcome::{ItemResult, PassOutcome, TicketDisposition};
pub use ticket::{ChangeRef, Ticket};
