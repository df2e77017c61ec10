use serde::{Deserialize, Serialize};

/// Language code used when a source does not declare one.
///
/// Prefers `"und"` (“undetermined”) because it’s the common convention in language tagging
/// systems and makes the meaning obvious.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// One timed span of recognized text.
///
/// Timing is kept in integer milliseconds so every format conversion starts from the same exact
/// values. Segments coming out of a third-party file may violate the usual invariants
/// (`end_ms < start_ms`, empty text); it is the validator's job to flag them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl Segment {
    pub fn new(start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            text: text.into(),
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Duration in milliseconds (zero for inverted segments).
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Ordered segments for one input file, plus transcript-level metadata.
///
/// Insertion order is chronological order. Overlapping segments may exist in raw engine output;
/// they are reported by [`crate::validator::validate`], never silently rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    #[serde(default)]
    pub source_duration_ms: Option<u64>,
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn new(language: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            language: language.into(),
            source_duration_ms: None,
            segments,
        }
    }

    pub fn with_source_duration_ms(mut self, duration_ms: u64) -> Self {
        self.source_duration_ms = Some(duration_ms);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// End of the last segment, if any.
    pub fn last_end_ms(&self) -> Option<u64> {
        self.segments.iter().map(|s| s.end_ms).max()
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new(UNDETERMINED_LANGUAGE, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_saturates_for_inverted_segments() {
        assert_eq!(Segment::new(1000, 2500, "a").duration_ms(), 1500);
        assert_eq!(Segment::new(2500, 1000, "a").duration_ms(), 0);
    }

    #[test]
    fn last_end_is_the_maximum_end() {
        let t = Transcript::new(
            "en",
            vec![Segment::new(0, 4000, "a"), Segment::new(1000, 2000, "b")],
        );
        assert_eq!(t.last_end_ms(), Some(4000));
        assert_eq!(Transcript::default().last_end_ms(), None);
    }

    #[test]
    fn confidence_is_omitted_from_json_when_absent() -> anyhow::Result<()> {
        let json = serde_json::to_string(&Segment::new(0, 10, "x"))?;
        assert!(!json.contains("confidence"));
        let json = serde_json::to_string(&Segment::new(0, 10, "x").with_confidence(0.5))?;
        assert!(json.contains("\"confidence\":0.5"));
        Ok(())
    }
}
