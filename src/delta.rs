//! Delta compiler. Turns the opcodes of each line into operation
//! batches in document coordinates. Each batch is self-contained
//! (it retains from the document start), and batches are meant to
//! be applied in order: every batch is computed against the document
//! as left by the batches before it.

use crate::differ::diff_line;
use crate::error::{FixError, FixResult};
use crate::op::{Opcode, OpcodeTag, Operation, OperationBatch};

/// Compile the opcodes of one line into batches. `dest_line` is the
/// corrected line, `start_offset` the document offset of the line's
/// first char. Return the batches and the offset just past the end of
/// the (corrected) line.
pub fn compile_line(
    opcodes: &[Opcode],
    dest_line: &str,
    start_offset: u64,
) -> (Vec<OperationBatch>, u64) {
    let mut batches = vec![];
    let mut index = start_offset;

    for opcode in opcodes {
        match opcode.tag {
            OpcodeTag::Equal => {
                index += opcode.src_len() as u64;
            }
            OpcodeTag::Delete => {
                batches.push(vec![
                    Operation::Retain(index),
                    Operation::Delete(opcode.src_len() as u64),
                ]);
            }
            OpcodeTag::Insert => {
                let mut batch = vec![];
                if index != 0 {
                    batch.push(Operation::Retain(index));
                }
                batch.push(Operation::Insert(slice_chars(
                    dest_line, opcode.j1, opcode.j2,
                )));
                batches.push(batch);
                index += (opcode.src_len() + opcode.dest_len()) as u64;
            }
            OpcodeTag::Replace => {
                let mut batch = vec![];
                if index != 0 {
                    batch.push(Operation::Retain(index));
                }
                batch.push(Operation::Delete(opcode.src_len() as u64));
                batch.push(Operation::Insert(slice_chars(
                    dest_line, opcode.j1, opcode.j2,
                )));
                batches.push(batch);
                index += opcode.dest_len() as u64;
            }
        }
    }
    (batches, index)
}

/// Compile the whole edit script from `a` to `b`. Return
/// [FixError::CorrectionRejected] if the two texts don't have the
/// same number of lines.
pub fn compile_document(a: &str, b: &str) -> FixResult<Vec<OperationBatch>> {
    let a_lines: Vec<&str> = a.split('\n').collect();
    let b_lines: Vec<&str> = b.split('\n').collect();
    if a_lines.len() != b_lines.len() {
        return Err(FixError::CorrectionRejected {
            original_lines: a_lines.len(),
            corrected_lines: b_lines.len(),
        });
    }

    let mut batches = vec![];
    let mut line_offset = 0;
    for (line_a, line_b) in a_lines.iter().zip(b_lines.iter()) {
        let opcodes = diff_line(line_a, line_b);
        let (line_batches, next) = compile_line(&opcodes, line_b, line_offset);
        batches.extend(line_batches);
        // Skip the newline.
        line_offset = next + 1;
    }
    Ok(batches)
}

/// Return chars `start..end` of `s`.
fn slice_chars(s: &str, start: usize, end: usize) -> String {
    s.chars().skip(start).take(end - start).collect()
}
