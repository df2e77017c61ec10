//! Structural and timing checks over a [`Transcript`].
//!
//! Validation never mutates its input. Generated output is validated advisorily (issues are
//! logged); third-party files being converted are validated authoritatively via
//! [`ValidationResult::into_result`].

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::output_type::OutputType;
use crate::segments::Transcript;
use crate::{Error, Result, codec};

/// Knobs for [`validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationOpts {
    /// Overlap between consecutive segments that is still accepted, in milliseconds.
    pub overlap_tolerance_ms: u64,
}

/// Category of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A segment starts before its predecessor.
    NonMonotonicStart,
    /// A segment ends before it starts.
    EndBeforeStart,
    /// A segment starts before its predecessor ends (beyond the tolerance).
    Overlap,
    /// A segment has no visible text.
    EmptyText,
    /// A confidence score lies outside `[0, 1]`.
    ConfidenceOutOfRange,
    /// The last segment ends after the declared source duration. Always a warning.
    DurationExceedsSource,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::NonMonotonicStart => "non-monotonic start",
            IssueKind::EndBeforeStart => "end before start",
            IssueKind::Overlap => "overlap",
            IssueKind::EmptyText => "empty text",
            IssueKind::ConfidenceOutOfRange => "confidence out of range",
            IssueKind::DurationExceedsSource => "duration exceeds source",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Index of the offending segment, if the issue is tied to one.
    pub segment_index: Option<usize>,
    pub message: String,
}

impl ValidationIssue {
    fn at(kind: IssueKind, index: usize, message: String) -> Self {
        Self {
            kind,
            segment_index: Some(index),
            message,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Human-readable error strings, in detection order.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    pub fn has_kind(&self, kind: IssueKind) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|issue| issue.kind == kind)
    }

    /// `Ok(())` when valid, otherwise [`Error::Validation`] carrying every error message.
    pub fn into_result(self) -> Result<()> {
        if self.is_valid {
            Ok(())
        } else {
            Err(Error::Validation(self.messages()))
        }
    }
}

/// Run every check over `transcript`.
pub fn validate(transcript: &Transcript, opts: &ValidationOpts) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut latest_end: Option<(usize, u64)> = None;

    for (i, seg) in transcript.segments.iter().enumerate() {
        let n = i + 1;

        if seg.end_ms < seg.start_ms {
            errors.push(ValidationIssue::at(
                IssueKind::EndBeforeStart,
                i,
                format!(
                    "segment {n}: end {}ms is before start {}ms",
                    seg.end_ms, seg.start_ms
                ),
            ));
        }

        if seg.text.trim().is_empty() {
            errors.push(ValidationIssue::at(
                IssueKind::EmptyText,
                i,
                format!("segment {n}: text is empty"),
            ));
        }

        if let Some(c) = seg.confidence.filter(|c| !(0.0..=1.0).contains(c)) {
            errors.push(ValidationIssue::at(
                IssueKind::ConfidenceOutOfRange,
                i,
                format!("segment {n}: confidence {c} is outside [0, 1]"),
            ));
        }

        if let Some(prev) = i.checked_sub(1).map(|p| &transcript.segments[p]) {
            if seg.start_ms < prev.start_ms {
                errors.push(ValidationIssue::at(
                    IssueKind::NonMonotonicStart,
                    i,
                    format!(
                        "segment {n}: start {}ms is before previous start {}ms",
                        seg.start_ms, prev.start_ms
                    ),
                ));
            } else if let Some((j, end)) = latest_end
                .filter(|&(_, end)| seg.start_ms.saturating_add(opts.overlap_tolerance_ms) < end)
            {
                errors.push(ValidationIssue::at(
                    IssueKind::Overlap,
                    i,
                    format!(
                        "segment {n}: overlaps segment {} by {}ms",
                        j + 1,
                        end - seg.start_ms
                    ),
                ));
            }
        }

        // Furthest end seen so far and the segment that reached it.
        if latest_end.is_none_or(|(_, end)| seg.end_ms > end) {
            latest_end = Some((i, seg.end_ms));
        }
    }

    if let (Some(source), Some(last_end)) =
        (transcript.source_duration_ms, transcript.last_end_ms())
    {
        if last_end > source {
            warnings.push(ValidationIssue {
                kind: IssueKind::DurationExceedsSource,
                segment_index: None,
                message: format!(
                    "last segment ends at {last_end}ms, after source duration {source}ms"
                ),
            });
        }
    }

    ValidationResult {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}

/// Decode a subtitle file (format from its extension) and validate it.
pub fn validate_file(path: &Path, opts: &ValidationOpts) -> Result<ValidationResult> {
    let ty = OutputType::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    let transcript = codec::decode(&content, ty)?;
    Ok(validate(&transcript, opts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::Segment;

    fn transcript(segments: Vec<Segment>) -> Transcript {
        Transcript::new("en", segments)
    }

    #[test]
    fn overlapping_segments_are_invalid() {
        let t = transcript(vec![Segment::new(0, 1000, "a"), Segment::new(500, 1500, "b")]);
        let res = validate(&t, &ValidationOpts::default());
        assert!(!res.is_valid);
        assert!(res.has_kind(IssueKind::Overlap));
        assert_eq!(res.errors[0].segment_index, Some(1));
        assert!(res.messages()[0].contains("overlaps"));
    }

    #[test]
    fn overlap_with_a_long_earlier_segment_is_reported_for_each_segment() {
        let res = validate(
            &transcript(vec![
                Segment::new(0, 5000, "a"),
                Segment::new(1000, 2000, "b"),
                Segment::new(3000, 4000, "c"),
            ]),
            &ValidationOpts::default(),
        );
        let overlaps: Vec<Option<usize>> = res
            .errors
            .iter()
            .filter(|e| e.kind == IssueKind::Overlap)
            .map(|e| e.segment_index)
            .collect();
        assert_eq!(overlaps, vec![Some(1), Some(2)]);
        assert!(res.errors[1].message.contains("overlaps segment 1 by 2000ms"));
    }

    #[test]
    fn touching_segments_are_valid() {
        let t = transcript(vec![Segment::new(0, 1000, "a"), Segment::new(1000, 2000, "b")]);
        let res = validate(&t, &ValidationOpts::default());
        assert!(res.is_valid, "{:?}", res.errors);
        assert!(res.warnings.is_empty());
    }

    #[test]
    fn overlap_within_tolerance_is_accepted() {
        let t = transcript(vec![Segment::new(0, 1000, "a"), Segment::new(950, 2000, "b")]);
        let opts = ValidationOpts {
            overlap_tolerance_ms: 50,
        };
        assert!(validate(&t, &opts).is_valid);
        let opts = ValidationOpts {
            overlap_tolerance_ms: 49,
        };
        assert!(!validate(&t, &opts).is_valid);
    }

    #[test]
    fn each_category_is_reported_separately() {
        let t = transcript(vec![
            Segment::new(2000, 3000, "a"),
            Segment::new(1000, 1500, "b"),
            Segment::new(4000, 3500, "c"),
            Segment::new(5000, 6000, "   "),
            Segment::new(6000, 7000, "d").with_confidence(1.5),
        ]);
        let res = validate(&t, &ValidationOpts::default());
        let kinds: Vec<IssueKind> = res.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                IssueKind::NonMonotonicStart,
                IssueKind::EndBeforeStart,
                IssueKind::EmptyText,
                IssueKind::ConfidenceOutOfRange,
            ]
        );
    }

    #[test]
    fn exceeding_source_duration_only_warns() {
        let t = transcript(vec![Segment::new(0, 5000, "a")]).with_source_duration_ms(4000);
        let res = validate(&t, &ValidationOpts::default());
        assert!(res.is_valid);
        assert_eq!(res.warnings.len(), 1);
        assert_eq!(res.warnings[0].kind, IssueKind::DurationExceedsSource);
    }

    #[test]
    fn validation_does_not_touch_input() {
        let t = transcript(vec![Segment::new(500, 100, "")]);
        let before = t.clone();
        let _ = validate(&t, &ValidationOpts::default());
        assert_eq!(t, before);
    }

    #[test]
    fn into_result_carries_messages() {
        let t = transcript(vec![Segment::new(0, 1000, "a"), Segment::new(500, 1500, "b")]);
        let err = validate(&t, &ValidationOpts::default())
            .into_result()
            .unwrap_err();
        match err {
            Error::Validation(msgs) => assert_eq!(msgs.len(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_file_decodes_by_extension() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clip.srt");
        std::fs::write(&path, "1\n00:00:00,000 --> 00:00:01,000\nhi\n")?;
        let res = validate_file(&path, &ValidationOpts::default())?;
        assert!(res.is_valid);
        Ok(())
    }
}
