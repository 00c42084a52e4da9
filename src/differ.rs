//! Line differ. Aligns each line of the original text with the same
//! line of the corrected text and reports how it changed as a list
//! of [Opcode]s.

use crate::op::{Opcode, OpcodeTag};
use similar::{Algorithm, DiffTag, TextDiff};

/// Return the opcodes that turn `a` into `b`. Indices are in chars.
pub fn diff_line(a: &str, b: &str) -> Vec<Opcode> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_chars(a, b);

    diff.ops()
        .iter()
        .map(|op| {
            let (tag, old, new) = op.as_tag_tuple();
            let tag = match tag {
                DiffTag::Equal => OpcodeTag::Equal,
                DiffTag::Delete => OpcodeTag::Delete,
                DiffTag::Insert => OpcodeTag::Insert,
                DiffTag::Replace => OpcodeTag::Replace,
            };
            Opcode::new(tag, old.start, old.end, new.start, new.end)
        })
        .collect()
}

/// Diff `a` and `b` line by line: line i of `a` is compared with line
/// i of `b`. Both must have the same number of lines; extra lines on
/// either side are ignored.
pub fn diff_lines(a: &str, b: &str) -> Vec<Vec<Opcode>> {
    a.split('\n')
        .zip(b.split('\n'))
        .map(|(line_a, line_b)| diff_line(line_a, line_b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Check that `opcodes` partition both lines: consecutive,
    /// starting at 0, ending at the line lengths.
    fn assert_partition(opcodes: &[Opcode], a: &str, b: &str) {
        let mut i = 0;
        let mut j = 0;
        for opcode in opcodes {
            assert_eq!(opcode.i1, i, "gap in source range: {:?}", opcodes);
            assert_eq!(opcode.j1, j, "gap in dest range: {:?}", opcodes);
            match opcode.tag {
                OpcodeTag::Equal => assert_eq!(opcode.src_len(), opcode.dest_len()),
                OpcodeTag::Insert => assert_eq!(opcode.src_len(), 0),
                OpcodeTag::Delete => assert_eq!(opcode.dest_len(), 0),
                OpcodeTag::Replace => {
                    assert!(opcode.src_len() > 0 && opcode.dest_len() > 0)
                }
            }
            i = opcode.i2;
            j = opcode.j2;
        }
        assert_eq!(i, a.chars().count());
        assert_eq!(j, b.chars().count());
    }

    #[test]
    fn test_diff_line_single_replace() {
        let opcodes = diff_line("cat sat", "cat sit");
        assert_eq!(
            opcodes,
            vec![
                Opcode::new(OpcodeTag::Equal, 0, 5, 0, 5),
                Opcode::new(OpcodeTag::Replace, 5, 6, 5, 6),
                Opcode::new(OpcodeTag::Equal, 6, 7, 6, 7),
            ]
        );
    }

    #[test]
    fn test_diff_line_pure_insert_and_delete() {
        assert_eq!(
            diff_line("", "abc"),
            vec![Opcode::new(OpcodeTag::Insert, 0, 0, 0, 3)]
        );
        assert_eq!(
            diff_line("abc", ""),
            vec![Opcode::new(OpcodeTag::Delete, 0, 3, 0, 0)]
        );
        assert!(diff_line("", "").is_empty());
    }

    #[test]
    fn test_diff_line_identical() {
        let opcodes = diff_line("hello", "hello");
        assert!(opcodes.iter().all(|op| op.tag == OpcodeTag::Equal));
        assert_partition(&opcodes, "hello", "hello");
    }

    #[test]
    fn test_diff_line_partitions() {
        let pairs = [
            ("cat sat", "cat ran"),
            ("He is a man who runs.", "He runs."),
            ("utilize the tool", "use the tool"),
            ("naïve café", "naive cafe!"),
            ("abc", "xyz"),
        ];
        for (a, b) in pairs {
            assert_partition(&diff_line(a, b), a, b);
        }
    }

    #[test]
    fn test_diff_lines_per_line() {
        let all = diff_lines("hello\nworld", "hello\nworld!");
        assert_eq!(all.len(), 2);
        assert!(all[0].iter().all(|op| op.tag == OpcodeTag::Equal));
        assert_eq!(
            all[1].last(),
            Some(&Opcode::new(OpcodeTag::Insert, 5, 5, 5, 6))
        );
    }
}
