//! Selection deriver. Before each edit is replayed the correction
//! actor highlights the range it's about to touch, like a person
//! selecting a word before retyping it. This module computes those
//! highlights from the compiled batches.

use crate::op::{Operation, OperationBatch};
use serde::{Deserialize, Serialize};

/// A highlighted range in document offsets (chars).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSpan {
    pub index: u64,
    pub length: u64,
}

impl SelectionSpan {
    /// The collapsed cursor at the start of the document.
    pub const START: SelectionSpan = SelectionSpan {
        index: 0,
        length: 0,
    };
}

/// Return one span per batch, plus a final span that parks the cursor
/// at the start of the document.
///
/// A delete directly followed by an insert (a replacement) highlights
/// the length of the inserted text, so the highlight previews the
/// replacement rather than what it removes.
pub fn derive_selections(batches: &[OperationBatch]) -> Vec<SelectionSpan> {
    let mut selections = vec![];

    for batch in batches {
        let mut selection_index = 0;
        for (idx, op) in batch.iter().enumerate() {
            match op {
                Operation::Retain(n) => selection_index = *n,
                Operation::Delete(n) => {
                    let length = match batch.get(idx + 1) {
                        Some(Operation::Insert(content)) => content.chars().count() as u64,
                        _ => *n,
                    };
                    selections.push(SelectionSpan {
                        index: selection_index,
                        length,
                    });
                }
                Operation::Insert(content) => {
                    let after_delete = idx > 0 && batch[idx - 1].is_delete();
                    if !after_delete {
                        selections.push(SelectionSpan {
                            index: selection_index,
                            length: content.chars().count() as u64,
                        });
                    }
                }
            }
        }
    }

    selections.push(SelectionSpan::START);
    selections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::compile_document;

    fn span(index: u64, length: u64) -> SelectionSpan {
        SelectionSpan { index, length }
    }

    #[test]
    fn test_replace_previews_inserted_length() {
        let batches = vec![vec![
            Operation::Retain(4),
            Operation::Delete(3),
            Operation::Insert("ran".to_string()),
        ]];
        assert_eq!(derive_selections(&batches), vec![span(4, 3), span(0, 0)]);

        let batches = vec![vec![
            Operation::Retain(2),
            Operation::Delete(1),
            Operation::Insert("four".to_string()),
        ]];
        assert_eq!(derive_selections(&batches), vec![span(2, 4), span(0, 0)]);
    }

    #[test]
    fn test_each_kind_of_batch() {
        let batches = vec![
            vec![Operation::Retain(0), Operation::Delete(2)],
            vec![Operation::Insert("Hi ".to_string())],
            vec![Operation::Retain(9), Operation::Delete(5)],
            vec![Operation::Retain(12), Operation::Insert("!".to_string())],
            vec![Operation::Delete(1), Operation::Insert("W".to_string())],
        ];
        assert_eq!(
            derive_selections(&batches),
            vec![
                span(0, 2),
                span(0, 3),
                span(9, 5),
                span(12, 1),
                span(0, 1),
                span(0, 0),
            ]
        );
    }

    #[test]
    fn test_index_resets_per_batch() {
        // The second batch has no retain, so it starts from 0 again.
        let batches = vec![
            vec![Operation::Retain(7), Operation::Delete(1)],
            vec![Operation::Insert("x".to_string())],
        ];
        assert_eq!(
            derive_selections(&batches),
            vec![span(7, 1), span(0, 1), span(0, 0)]
        );
    }

    #[test]
    fn test_empty_script_parks_cursor() {
        assert_eq!(derive_selections(&[]), vec![SelectionSpan::START]);
    }

    #[test]
    fn test_one_span_per_compiled_batch() {
        let batches = compile_document(
            "The mouse was chased by the cat.\nIt is very big.",
            "The cat chased the mouse.\nIt is big.",
        )
        .unwrap();
        let selections = derive_selections(&batches);
        assert_eq!(selections.len(), batches.len() + 1);
        assert_eq!(selections.last(), Some(&SelectionSpan::START));
    }
}
