//! Types shared across the crate, gathered in one place.

pub use crate::doc::{Actor, AwarenessState, CursorState, RelativePosition};
pub use crate::error::{FixError, FixResult};
pub use crate::op::{ClientId, Opcode, OpcodeTag, Operation, OperationBatch};
pub use crate::selection::SelectionSpan;

/// Name of a hosted document.
pub type DocName = String;
