use std::io::Write;

use crate::Result;
use crate::codec::cue::normalize;
use crate::codec::single_line;
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};

/// A `SegmentEncoder` for plain transcription dumps: one line per segment, no timing.
pub struct TxtEncoder<W: Write> {
    w: W,
    closed: bool,
}

impl<W: Write> TxtEncoder<W> {
    pub fn new(w: W) -> Self {
        Self { w, closed: false }
    }
}

impl<W: Write> SegmentEncoder for TxtEncoder<W> {
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        writeln!(&mut self.w, "{}", single_line(&seg.text))?;
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

/// Parse a plain text dump. Every non-blank line becomes a segment with zero timing.
pub fn decode(content: &str) -> Result<Transcript> {
    let segments = normalize(content)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| Segment::new(0, 0, l))
        .collect();
    Ok(Transcript::new(UNDETERMINED_LANGUAGE, segments))
}
