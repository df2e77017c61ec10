use std::io::Write;

use crate::Result;
use crate::segment_encoder::{SegmentEncoder, closed_error};
use crate::segments::{Segment, Transcript};

/// A `SegmentEncoder` that writes a transcript as a single JSON object.
///
/// Design:
/// - We stream output directly to a `Write` implementation to avoid buffering
///   all segments in memory.
/// - The encoder is stateful so we can emit a well-formed JSON document incrementally.
/// - Timing is integer milliseconds, so decoding is exact.
///
/// Example output:
/// ```json
/// {"language":"en","source_duration_ms":2500,"segments":[
/// {"start_ms":0,"end_ms":1200,"text":"hello"},
/// {"start_ms":1200,"end_ms":2500,"text":"world"}
/// ]}
/// ```
pub struct JsonEncoder<W: Write> {
    /// The underlying writer we stream JSON into.
    w: W,

    /// Transcript-level fields written before the segment array.
    language: String,
    source_duration_ms: Option<u64>,

    /// Whether we have written the document prefix up to the opening `[`.
    started: bool,

    /// Whether the next element will be the first element in the array.
    /// This lets us correctly place commas between elements.
    first: bool,

    /// Whether the encoder has been closed.
    /// Once closed, no further writes are allowed.
    closed: bool,
}

impl<W: Write> JsonEncoder<W> {
    /// Create a new JSON encoder that writes to the given writer.
    ///
    /// The document is opened lazily on the first write or on close.
    pub fn new(w: W, language: impl Into<String>, source_duration_ms: Option<u64>) -> Self {
        Self {
            w,
            language: language.into(),
            source_duration_ms,
            started: false,
            first: true,
            closed: false,
        }
    }

    /// Write the metadata and the opening `[` of the segment array if we have not already done so.
    ///
    /// We defer this so that empty output still results in a valid document and we do not emit
    /// partial output unless something is actually written.
    fn start_if_needed(&mut self) -> Result<()> {
        if !self.started {
            self.w.write_all(b"{\"language\":")?;
            serde_json::to_writer(&mut self.w, &self.language)?;
            self.w.write_all(b",\"source_duration_ms\":")?;
            serde_json::to_writer(&mut self.w, &self.source_duration_ms)?;
            self.w.write_all(b",\"segments\":[")?;
            self.started = true;
        }
        Ok(())
    }
}

impl<W: Write> SegmentEncoder for JsonEncoder<W> {
    /// Serialize a single segment and append it to the segment array.
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            return Err(closed_error());
        }

        self.start_if_needed()?;

        // Write a comma before every element except the first.
        if !self.first {
            self.w.write_all(b",")?;
        }
        self.first = false;

        // One segment per line keeps large files diffable.
        self.w.write_all(b"\n")?;
        serde_json::to_writer(&mut self.w, seg)?;

        // Flush so streaming consumers (stdout, pipes, sockets) see output promptly.
        self.w.flush()?;

        Ok(())
    }

    /// Finalize the document and flush the underlying writer.
    ///
    /// This method is idempotent:
    /// - Calling `close()` multiple times is safe.
    /// - After closing, no further segments may be written.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.start_if_needed()?;

        self.w.write_all(b"\n]}\n")?;
        self.w.flush()?;

        self.closed = true;
        Ok(())
    }
}

/// Parse a document produced by [`JsonEncoder`].
pub fn decode(content: &str) -> Result<Transcript> {
    serde_json::from_str(content.trim_start_matches('\u{feff}'))
        .map_err(|e| crate::Error::format(format!("invalid JSON transcript: {e}")))
}
