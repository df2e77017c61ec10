use std::io::Write;

use crate::Result;
use crate::codec::cue::{normalize, parse_cue_block, split_blocks};
use crate::codec::cue_text_lines;
use crate::codec::timestamp::format_clock;
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};

/// A `SegmentEncoder` that writes SubRip cues.
///
/// Cue numbers are assigned sequentially from 1 in write order; the numbering of a decoded file
/// is not preserved.
pub struct SrtEncoder<W: Write> {
    w: W,

    /// Number of the next cue to write.
    next_index: usize,

    closed: bool,
}

impl<W: Write> SrtEncoder<W> {
    pub fn new(w: W) -> Self {
        Self {
            w,
            next_index: 1,
            closed: false,
        }
    }
}

impl<W: Write> SegmentEncoder for SrtEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }

        // SubRip timestamps use a comma before the milliseconds: `HH:MM:SS,mmm`.
        let start = format_clock(seg.start_ms, ',');
        let end = format_clock(seg.end_ms, ',');

        writeln!(&mut self.w, "{}", self.next_index)?;
        writeln!(&mut self.w, "{start} --> {end}")?;
        for line in cue_text_lines(&seg.text) {
            writeln!(&mut self.w, "{line}")?;
        }
        writeln!(&mut self.w)?;
        self.w.flush()?;

        self.next_index += 1;
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

/// Parse SubRip content.
///
/// Index lines are optional and ignored. Both `,` and `.` are accepted before the milliseconds
/// since many tools emit the latter.
pub fn decode(content: &str) -> Result<Transcript> {
    let content = normalize(content);

    let segments = split_blocks(&content)
        .iter()
        .map(|block| {
            parse_cue_block(block).map(|(start_ms, end_ms, text)| Segment::new(start_ms, end_ms, text))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Transcript::new(UNDETERMINED_LANGUAGE, segments))
}
