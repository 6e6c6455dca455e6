use super::LineTransform;
use crate::error::TransformResult;

/// Keep only the characters in columns `[from, to)`.
///
/// Columns are 0-based char offsets, so a multi-byte character counts as one
/// column. A `to` past the end of the line keeps everything from `from`
/// onwards; `to <= from` always yields an empty line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnTrim {
    from: usize,
    to: usize,
}

impl ColumnTrim {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn trim(&self, line: &str) -> String {
        if self.to <= self.from {
            return String::new();
        }
        line.chars().skip(self.from).take(self.to - self.from).collect()
    }
}

impl LineTransform for ColumnTrim {
    fn apply(&self, _line_no: usize, line: &str) -> TransformResult<String> {
        Ok(self.trim(line))
    }
}
