//! This module defines the edit language of the shared document
//! ([Operation] and [OperationBatch]) and the per-line alignment
//! descriptor ([Opcode]) that the line differ produces.

use serde::{Deserialize, Serialize};

// *** Types

/// Client id on the presence channel.
pub type ClientId = u32;

/// An ordered group of operations applied to the document atomically.
pub type OperationBatch = Vec<Operation>;

// *** Operation

/// A step in the document's edit language. Positions are implicit: a
/// batch walks a cursor from the start of the document, `Retain`
/// moves it forward, `Delete` removes text after it, and `Insert`
/// puts text at it and moves past the inserted text.
///
/// Serializes to the rich-text delta shape: `{"retain": 4}`,
/// `{"insert": "x"}`, `{"delete": 3}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Retain(u64),
    Insert(String),
    Delete(u64),
}

impl Operation {
    /// Return true if this is a delete.
    pub fn is_delete(&self) -> bool {
        matches!(self, Operation::Delete(_))
    }

    /// Return true if this is an insert.
    pub fn is_insert(&self) -> bool {
        matches!(self, Operation::Insert(_))
    }
}

pub fn replace_whitespace_char(string: String) -> String {
    // Other return symbols aren't well supported by terminals.
    string.replace("\n", "\\n")
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Retain(n) => write!(f, "retain({n})"),
            Operation::Delete(n) => write!(f, "delete({n})"),
            Operation::Insert(content) => {
                let content = replace_whitespace_char(content.to_string());
                write!(f, "insert({content})")
            }
        }
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Retain(n) => write!(f, "retain({n})"),
            Operation::Delete(n) => write!(f, "delete({n})"),
            Operation::Insert(content) => write!(f, "insert({:?})", content),
        }
    }
}

/// Format a batch like `[retain(4), delete(3), insert(ran)]`, for
/// logging.
pub fn batch_to_string(batch: &[Operation]) -> String {
    let ops: Vec<String> = batch.iter().map(|op| op.to_string()).collect();
    format!("[{}]", ops.join(", "))
}

// *** Opcode

#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum OpcodeTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// How a range of the source line maps onto a range of the
/// destination line. `i1..i2` indexes the source, `j1..j2` the
/// destination, both in chars. The opcodes of a line, in order,
/// cover both lines completely.
#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub struct Opcode {
    pub tag: OpcodeTag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

impl Opcode {
    pub fn new(tag: OpcodeTag, i1: usize, i2: usize, j1: usize, j2: usize) -> Opcode {
        Opcode {
            tag,
            i1,
            i2,
            j1,
            j2,
        }
    }

    /// Length of the source range.
    pub fn src_len(&self) -> usize {
        self.i2 - self.i1
    }

    /// Length of the destination range.
    pub fn dest_len(&self) -> usize {
        self.j2 - self.j1
    }
}
