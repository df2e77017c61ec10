use std::io::Write;

use crate::Result;
use crate::codec::cue::normalize;
use crate::codec::single_line;
use crate::codec::timestamp::{format_lrc, parse_clock};
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};

/// Duration given to the last decoded LRC line, which has no successor to end it.
pub const LRC_DEFAULT_DURATION_MS: u64 = 3000;

/// A `SegmentEncoder` that writes `[mm:ss.xx]text` lines.
///
/// LRC has no end times; they are dropped on output.
pub struct LrcEncoder<W: Write> {
    w: W,
    closed: bool,
}

impl<W: Write> LrcEncoder<W> {
    pub fn new(w: W) -> Self {
        Self { w, closed: false }
    }
}

impl<W: Write> SegmentEncoder for LrcEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        writeln!(
            &mut self.w,
            "{}{}",
            format_lrc(seg.start_ms),
            single_line(&seg.text)
        )?;
        self.w.flush()?;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.w.flush()?;
        self.closed = true;
        Ok(())
    }
}

/// Parse LRC content.
///
/// - ID tags (`[ar:...]`, `[ti:...]`) and lines without a time tag are skipped.
/// - A line with several time tags yields one segment per tag.
/// - Segments are ordered by start time; each ends where the next one starts, and the last one
///   lasts [`LRC_DEFAULT_DURATION_MS`].
pub fn decode(content: &str) -> Result<Transcript> {
    let content = normalize(content);
    let mut starts: Vec<(u64, String)> = Vec::new();

    for line in content.lines() {
        let mut rest = line.trim();
        let mut times = Vec::new();

        while let Some(tag_body) = rest.strip_prefix('[') {
            let Some(close) = tag_body.find(']') else {
                break;
            };
            match parse_clock(&tag_body[..close]) {
                Some(ms) => times.push(ms),
                // An ID tag, not a time tag.
                None => break,
            }
            rest = &tag_body[close + 1..];
        }

        let text = rest.trim();
        starts.extend(times.into_iter().map(|ms| (ms, text.to_owned())));
    }

    // Stable sort keeps file order for identical timestamps.
    starts.sort_by_key(|(ms, _)| *ms);

    let segments = starts
        .iter()
        .enumerate()
        .map(|(idx, (start_ms, text))| {
            let end_ms = match starts.get(idx + 1) {
                Some((next, _)) => *next,
                None => start_ms + LRC_DEFAULT_DURATION_MS,
            };
            Segment::new(*start_ms, end_ms, text.clone())
        })
        .collect();

    Ok(Transcript::new(UNDETERMINED_LANGUAGE, segments))
}
