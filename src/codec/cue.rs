//! Cue-block helpers shared by the SubRip and WebVTT decoders.

use crate::codec::timestamp::parse_clock;
use crate::{Error, Result};

/// A run of consecutive non-blank lines.
pub(crate) struct Block<'a> {
    /// 1-based line number of the first line in the block.
    pub first_line: usize,
    pub lines: Vec<&'a str>,
}

/// Split normalized content into blank-line separated blocks.
pub(crate) fn split_blocks(content: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                first_line: idx + 1,
                lines: Vec::new(),
            })
            .lines
            .push(line);
    }

    if let Some(block) = current {
        blocks.push(block);
    }
    blocks
}

/// Parse a timing line such as `00:00:01,000 --> 00:00:02,500 align:start`.
///
/// Anything after the end timestamp (WebVTT cue settings) is ignored.
pub(crate) fn parse_timing_line(line: &str, line_no: usize) -> Result<(u64, u64)> {
    let invalid = || Error::format(format!("invalid cue timing at line {line_no}: '{line}'"));

    let (start, rest) = line.split_once("-->").ok_or_else(invalid)?;
    let end = rest.split_whitespace().next().ok_or_else(invalid)?;

    let start_ms = parse_clock(start).ok_or_else(invalid)?;
    let end_ms = parse_clock(end).ok_or_else(invalid)?;
    Ok((start_ms, end_ms))
}

/// Decode one cue block into `(start_ms, end_ms, text)`.
///
/// The timing line may be preceded by exactly one identifier line (the SRT index or a WebVTT
/// cue id). Text lines are trimmed and joined with `\n`.
pub(crate) fn parse_cue_block(block: &Block<'_>) -> Result<(u64, u64, String)> {
    let timing_idx = block
        .lines
        .iter()
        .take(2)
        .position(|l| l.contains("-->"))
        .ok_or_else(|| {
            Error::format(format!(
                "cue block without a timing line at line {}",
                block.first_line
            ))
        })?;

    let (start_ms, end_ms) =
        parse_timing_line(block.lines[timing_idx], block.first_line + timing_idx)?;

    let text = block.lines[timing_idx + 1..]
        .iter()
        .map(|l| l.trim())
        .collect::<Vec<_>>()
        .join("\n");

    Ok((start_ms, end_ms, text))
}

/// Strip a UTF-8 BOM and normalize line endings to `\n`.
pub(crate) fn normalize(content: &str) -> String {
    content
        .trim_start_matches('\u{feff}')
        .replace("\r\n", "\n")
        .replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_track_their_first_line() {
        let blocks = split_blocks("a\nb\n\n\nc\n");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].first_line, 1);
        assert_eq!(blocks[0].lines, vec!["a", "b"]);
        assert_eq!(blocks[1].first_line, 5);
    }

    #[test]
    fn timing_line_ignores_cue_settings() -> anyhow::Result<()> {
        let (start, end) = parse_timing_line("00:00:01.000 --> 00:00:02.500 align:start", 3)?;
        assert_eq!((start, end), (1000, 2500));
        Ok(())
    }

    #[test]
    fn timing_line_error_names_the_line() {
        let err = parse_timing_line("00:00:xx --> 00:00:02", 7).unwrap_err();
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn cue_block_accepts_optional_identifier() -> anyhow::Result<()> {
        let blocks = split_blocks("12\n00:00:01,000 --> 00:00:02,000\n hello \nworld\n");
        let (start, end, text) = parse_cue_block(&blocks[0])?;
        assert_eq!((start, end), (1000, 2000));
        assert_eq!(text, "hello\nworld");
        Ok(())
    }

    #[test]
    fn normalize_handles_bom_and_crlf() {
        assert_eq!(normalize("\u{feff}a\r\nb\rc"), "a\nb\nc");
    }
}
