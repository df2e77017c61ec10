use std::io::Write;

use crate::Result;
use crate::codec::cue::{normalize, parse_cue_block, split_blocks};
use crate::codec::timestamp::format_clock;
use crate::codec::cue_text_lines;
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript, UNDETERMINED_LANGUAGE};

/// A `SegmentEncoder` that writes segments in WebVTT format.
///
/// Design:
/// - We stream output directly to a `Write` implementation.
/// - We write the WebVTT header lazily on the first segment so that callers can construct the
///   encoder without immediately writing output.
/// - `close` writes the header if nothing was written yet, so an empty transcript is still a
///   valid WebVTT file.
pub struct VttEncoder<W: Write> {
    /// The underlying writer we stream VTT into.
    w: W,

    /// Whether we've written the `WEBVTT` header.
    started: bool,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> VttEncoder<W> {
    /// Create a new VTT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            started: false,
            closed: false,
        }
    }

    /// Write the WebVTT header if we haven't written it yet.
    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            // WebVTT files begin with a mandatory header line followed by a blank line.
            self.w.write_all(b"WEBVTT\n\n")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> SegmentEncoder for VttEncoder<W> {
    /// Write a single cue in WebVTT format.
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }

        self.start_if_needed()?;

        // WebVTT timestamps use `HH:MM:SS.mmm`.
        let start = format_clock(seg.start_ms, '.');
        let end = format_clock(seg.end_ms, '.');
        writeln!(&mut self.w, "{start} --> {end}")?;

        // Blank lines would terminate the cue early, so only non-blank lines are written.
        for line in cue_text_lines(&seg.text) {
            writeln!(&mut self.w, "{line}")?;
        }

        // Blank line separates cues.
        writeln!(&mut self.w)?;

        // Flush so streaming consumers (stdout, pipes, sockets) see output promptly.
        self.w.flush()?;

        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;
        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Parse WebVTT content.
///
/// The `WEBVTT` signature is required. `NOTE`, `STYLE` and `REGION` blocks are skipped, cue
/// identifiers and cue settings are accepted and dropped.
pub fn decode(content: &str) -> Result<Transcript> {
    let content = normalize(content);
    let blocks = split_blocks(&content);

    let Some((header, cues)) = blocks.split_first() else {
        return Err(crate::Error::format("empty input: missing WEBVTT header"));
    };
    let signature = header.lines[0];
    if !(signature == "WEBVTT" || signature.starts_with("WEBVTT ") || signature.starts_with("WEBVTT\t"))
    {
        return Err(crate::Error::format(format!(
            "missing WEBVTT header at line {}",
            header.first_line
        )));
    }

    let mut segments = Vec::new();
    for block in cues {
        let first = block.lines[0];
        if first.starts_with("NOTE") || first.starts_with("STYLE") || first.starts_with("REGION")
        {
            continue;
        }
        let (start_ms, end_ms, text) = parse_cue_block(block)?;
        segments.push(Segment::new(start_ms, end_ms, text));
    }

    Ok(Transcript::new(UNDETERMINED_LANGUAGE, segments))
}
