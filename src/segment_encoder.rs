use crate::Result;
use crate::segments::Segment;

/// A streaming serializer for one subtitle format.
///
/// Encoders write to an underlying `io::Write` as segments arrive. `close` must be called exactly
/// when the caller is done; it is idempotent, and writing after `close` is an error.
pub trait SegmentEncoder {
    fn write_segment(&mut self, seg: &Segment) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Shared "already closed" error so every encoder reports it the same way.
pub(crate) fn closed_error() -> crate::Error {
    crate::Error::format("cannot write segment: encoder is already closed")
}
