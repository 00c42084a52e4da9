//! This module defines what the correction engine needs from the
//! shared document ([SharedText]) and from the presence channel
//! ([Presence]), plus [LocalDoc], an in-memory document that
//! implements both. The server hosts [LocalDoc]s; a replicated
//! document only needs to implement the two traits.

use crate::error::{FixError, FixResult};
use crate::op::{ClientId, Operation};
use crate::selection::SelectionSpan;
use gapbuf::GapBuffer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// *** Types

/// A position in the document that survives concurrent edits. Created
/// from an offset by [SharedText::relative_position], turned back
/// into an offset by [SharedText::resolve].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelativePosition(u64);

/// Name and color shown next to a cursor on the presence channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub name: String,
    pub color: String,
}

impl Default for Actor {
    fn default() -> Self {
        Actor {
            name: "AI".to_string(),
            color: "red".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorState {
    pub anchor: RelativePosition,
    pub head: RelativePosition,
}

/// What a client broadcasts on the presence channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwarenessState {
    pub user: Actor,
    pub cursor: Option<CursorState>,
}

// *** Traits

pub trait SharedText {
    /// Length of the document in chars.
    fn len(&self) -> u64;
    /// Content of the document.
    fn text(&self) -> String;
    /// Apply `batch` atomically: either every operation applies or
    /// the document is left untouched.
    fn apply_batch(&mut self, batch: &[Operation]) -> FixResult<()>;
    /// Return a relative position for `index`. Indexes past the end
    /// are clamped to the end.
    fn relative_position(&mut self, index: u64) -> RelativePosition;
    /// Return the current offset of `pos`, or None if it's unknown
    /// to this document.
    fn resolve(&self, pos: &RelativePosition) -> Option<u64>;
}

pub trait Presence {
    /// Set the local client's state to `actor` selecting `anchor`
    /// to `head`. States of other clients are left alone.
    fn publish_selection(&mut self, anchor: RelativePosition, head: RelativePosition, actor: &Actor);
    /// The local client's state, if it published one.
    fn local_state(&self) -> Option<&AwarenessState>;
}

// *** LocalDoc

/// An in-memory document with a presence map.
#[derive(Debug)]
pub struct LocalDoc {
    /// Our own id on the presence channel.
    client_id: ClientId,
    buffer: GapBuffer<char>,
    /// Current offset of every live relative position.
    anchors: HashMap<RelativePosition, u64>,
    next_anchor: u64,
    /// Presence states, including our own.
    states: HashMap<ClientId, AwarenessState>,
}

impl LocalDoc {
    pub fn new(client_id: ClientId, content: &str) -> LocalDoc {
        let mut buffer = GapBuffer::new();
        buffer.insert_many(0, content.chars());
        LocalDoc {
            client_id,
            buffer,
            anchors: HashMap::new(),
            next_anchor: 1,
            states: HashMap::new(),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Set the presence state of a remote client.
    pub fn set_remote_state(&mut self, client_id: ClientId, state: AwarenessState) {
        if client_id == self.client_id {
            tracing::warn!("Ignoring remote state that claims our client id {}", client_id);
            return;
        }
        self.states.insert(client_id, state);
    }

    /// All presence states, keyed by client.
    pub fn states(&self) -> &HashMap<ClientId, AwarenessState> {
        &self.states
    }

    /// Resolve the cursor in `state` into a span, or None if it has no
    /// cursor.
    pub fn resolve_selection(&self, state: &AwarenessState) -> Option<SelectionSpan> {
        let cursor = state.cursor?;
        let anchor = self.resolve(&cursor.anchor)?;
        let head = self.resolve(&cursor.head)?;
        Some(SelectionSpan {
            index: anchor.min(head),
            length: anchor.max(head) - anchor.min(head),
        })
    }

    /// Check that `batch` fits the document without changing anything.
    fn check_batch(&self, batch: &[Operation]) -> FixResult<()> {
        let mut len = self.len();
        let mut cursor = 0;
        for op in batch {
            match op {
                Operation::Retain(n) => {
                    cursor += n;
                    if cursor > len {
                        return Err(FixError::OpOutOfBound(op.clone(), len));
                    }
                }
                Operation::Delete(n) => {
                    if cursor + n > len {
                        return Err(FixError::OpOutOfBound(op.clone(), len));
                    }
                    len -= n;
                }
                Operation::Insert(content) => {
                    let count = content.chars().count() as u64;
                    cursor += count;
                    len += count;
                }
            }
        }
        Ok(())
    }

    fn shift_anchors_for_insert(&mut self, pos: u64, count: u64) {
        for offset in self.anchors.values_mut() {
            if *offset >= pos {
                *offset += count;
            }
        }
    }

    fn shift_anchors_for_delete(&mut self, start: u64, end: u64) {
        for offset in self.anchors.values_mut() {
            if *offset >= end {
                *offset -= end - start;
            } else if *offset > start {
                *offset = start;
            }
        }
    }

    /// Forget the anchors held by our current cursor.
    fn release_local_cursor(&mut self) {
        let cursor = self
            .states
            .get(&self.client_id)
            .and_then(|state| state.cursor);
        if let Some(cursor) = cursor {
            self.anchors.remove(&cursor.anchor);
            self.anchors.remove(&cursor.head);
        }
    }
}

impl SharedText for LocalDoc {
    fn len(&self) -> u64 {
        self.buffer.len() as u64
    }

    fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    fn apply_batch(&mut self, batch: &[Operation]) -> FixResult<()> {
        self.check_batch(batch)?;
        let mut cursor = 0;
        for op in batch {
            match op {
                Operation::Retain(n) => cursor += n,
                Operation::Delete(n) => {
                    self.buffer
                        .drain((cursor as usize)..((cursor + n) as usize));
                    self.shift_anchors_for_delete(cursor, cursor + n);
                }
                Operation::Insert(content) => {
                    let count = content.chars().count() as u64;
                    self.buffer.insert_many(cursor as usize, content.chars());
                    self.shift_anchors_for_insert(cursor, count);
                    cursor += count;
                }
            }
        }
        Ok(())
    }

    fn relative_position(&mut self, index: u64) -> RelativePosition {
        let pos = RelativePosition(self.next_anchor);
        self.next_anchor += 1;
        self.anchors.insert(pos, index.min(self.len()));
        pos
    }

    fn resolve(&self, pos: &RelativePosition) -> Option<u64> {
        self.anchors.get(pos).copied()
    }
}

impl Presence for LocalDoc {
    fn publish_selection(&mut self, anchor: RelativePosition, head: RelativePosition, actor: &Actor) {
        self.release_local_cursor();
        self.states.insert(
            self.client_id,
            AwarenessState {
                user: actor.clone(),
                cursor: Some(CursorState { anchor, head }),
            },
        );
    }

    fn local_state(&self) -> Option<&AwarenessState> {
        self.states.get(&self.client_id)
    }
}
