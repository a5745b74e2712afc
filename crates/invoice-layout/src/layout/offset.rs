use crate::config::RowOffset;

/// Distance the row cursor moves down after a row whose tallest line is `max_line_height`
pub fn next_row_offset(offset: &RowOffset, max_line_height: f32) -> f32 {
    match *offset {
        RowOffset::Fixed { offset } => offset,
        RowOffset::LineHeight { extra } => max_line_height + extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_height_adds_extra() {
        let offset = RowOffset::LineHeight { extra: 1.0 };
        assert_eq!(next_row_offset(&offset, 14.0), 15.0);
    }

    #[test]
    fn test_fixed_ignores_line_height() {
        let offset = RowOffset::Fixed { offset: 14.8 };
        assert_eq!(next_row_offset(&offset, 14.0), 14.8);
        assert_eq!(next_row_offset(&offset, 40.0), 14.8);
    }
}
