//! Subtitle encode/decode for every supported [`OutputType`].
//!
//! Encoding is a pure function of the [`Transcript`]: the same transcript and format always give
//! byte-identical output. Decoding is used by the validator and by format conversion.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::output_type::OutputType;
use crate::segment_encoder::SegmentEncoder;
use crate::segments::Transcript;
use crate::validator::{self, ValidationOpts};
use crate::Result;

pub mod ass;
pub(crate) mod cue;
pub mod json;
pub mod lrc;
pub mod srt;
pub(crate) mod timestamp;
pub mod ttml;
pub mod txt;
pub mod vtt;

pub use lrc::LRC_DEFAULT_DURATION_MS;

/// Non-blank, trimmed lines of a segment's text.
pub(crate) fn cue_text_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Segment text flattened onto one line, for formats without multi-line cues.
pub(crate) fn single_line(text: &str) -> String {
    cue_text_lines(text).collect::<Vec<_>>().join(" ")
}

/// Build the streaming encoder for `ty` on top of `w`.
///
/// `language` and `source_duration_ms` are only used by formats that carry document metadata.
pub fn encoder_for<'a, W>(
    ty: OutputType,
    w: W,
    language: &str,
    source_duration_ms: Option<u64>,
) -> Box<dyn SegmentEncoder + 'a>
where
    W: Write + 'a,
{
    match ty {
        OutputType::Vtt => Box::new(vtt::VttEncoder::new(w)),
        OutputType::Srt => Box::new(srt::SrtEncoder::new(w)),
        OutputType::Txt => Box::new(txt::TxtEncoder::new(w)),
        OutputType::Json => Box::new(json::JsonEncoder::new(w, language, source_duration_ms)),
        OutputType::Lrc => Box::new(lrc::LrcEncoder::new(w)),
        OutputType::Ass => Box::new(ass::AssEncoder::new(w)),
        OutputType::Ttml => Box::new(ttml::TtmlEncoder::new(w, language)),
    }
}

/// Stream every segment of `transcript` through `encoder`, then close it.
///
/// The encoder is closed even when a write fails; the first error wins.
pub fn write_transcript(encoder: &mut dyn SegmentEncoder, transcript: &Transcript) -> Result<()> {
    let run_res = transcript
        .segments
        .iter()
        .try_for_each(|seg| encoder.write_segment(seg));
    merge_run_and_close(run_res, encoder.close())
}

/// Encode a whole transcript into the text of one subtitle document.
pub fn encode(transcript: &Transcript, ty: OutputType) -> Result<String> {
    let mut out = Vec::new();
    {
        let mut encoder = encoder_for(
            ty,
            &mut out,
            &transcript.language,
            transcript.source_duration_ms,
        );
        write_transcript(encoder.as_mut(), transcript)?;
    }
    Ok(String::from_utf8(out)?)
}

/// Decode subtitle text in format `ty` back into a transcript.
pub fn decode(content: &str, ty: OutputType) -> Result<Transcript> {
    match ty {
        OutputType::Vtt => vtt::decode(content),
        OutputType::Srt => srt::decode(content),
        OutputType::Txt => txt::decode(content),
        OutputType::Json => json::decode(content),
        OutputType::Lrc => lrc::decode(content),
        OutputType::Ass => ass::decode(content),
        OutputType::Ttml => ttml::decode(content),
    }
}

/// Re-encode subtitle text from one format into another.
pub fn convert(content: &str, from: OutputType, to: OutputType) -> Result<String> {
    let transcript = decode(content, from)?;
    encode(&transcript, to)
}

/// Convert a subtitle file on disk.
///
/// Formats default to the ones implied by the file extensions. The decoded transcript must pass
/// validation before anything is written.
pub fn convert_file(
    input: &Path,
    output: &Path,
    from: Option<OutputType>,
    to: Option<OutputType>,
    opts: &ValidationOpts,
) -> Result<Transcript> {
    let from = match from {
        Some(ty) => ty,
        None => OutputType::from_path(input)?,
    };
    let to = match to {
        Some(ty) => ty,
        None => OutputType::from_path(output)?,
    };

    let content = std::fs::read_to_string(input)?;
    let transcript = decode(&content, from)?;
    validator::validate(&transcript, opts).into_result()?;

    let encoded = encode(&transcript, to)?;
    std::fs::write(output, encoded)?;
    debug!(
        input = %input.display(),
        output = %output.display(),
        %from,
        %to,
        segments = transcript.len(),
        "converted subtitle file"
    );
    Ok(transcript)
}

fn merge_run_and_close(run_res: Result<()>, close_res: Result<()>) -> Result<()> {
    match (run_res, close_res) {
        (Ok(()), Ok(())) => Ok(()),
        (Ok(()), Err(close_err)) => Err(close_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            debug!(error = %close_err, "encoder close failed after a write error");
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::segments::Segment;

    fn sample() -> Transcript {
        Transcript::new(
            "en",
            vec![
                Segment::new(0, 1200, "hello"),
                Segment::new(1200, 2500, "big\nworld"),
                Segment::new(65_250, 67_000, "fish, chips & <peas>"),
                Segment::new(3_600_000, 3_601_500, "an hour in"),
            ],
        )
        .with_source_duration_ms(3_700_000)
    }

    fn timings(t: &Transcript) -> Vec<(u64, u64, &str)> {
        t.segments
            .iter()
            .map(|s| (s.start_ms, s.end_ms, s.text.as_str()))
            .collect()
    }

    #[test]
    fn srt_literal_timestamp_line() -> anyhow::Result<()> {
        let t = Transcript::new("en", vec![Segment::new(65_250, 67_000, "hello")]);
        let out = encode(&t, OutputType::Srt)?;
        assert_eq!(out, "1\n00:01:05,250 --> 00:01:07,000\nhello\n\n");
        Ok(())
    }

    #[test]
    fn vtt_literal_timestamp_line() -> anyhow::Result<()> {
        let t = Transcript::new("en", vec![Segment::new(65_250, 67_000, "hello")]);
        let out = encode(&t, OutputType::Vtt)?;
        assert_eq!(out, "WEBVTT\n\n00:01:05.250 --> 00:01:07.000\nhello\n\n");
        Ok(())
    }

    #[test]
    fn exact_formats_round_trip() -> anyhow::Result<()> {
        let original = sample();
        for ty in [
            OutputType::Vtt,
            OutputType::Srt,
            OutputType::Json,
            OutputType::Ttml,
        ] {
            let decoded = decode(&encode(&original, ty)?, ty)?;
            assert_eq!(timings(&decoded), timings(&original), "format {ty}");
        }
        Ok(())
    }

    #[test]
    fn ass_round_trips_at_centisecond_precision() -> anyhow::Result<()> {
        let original = Transcript::new(
            "en",
            vec![Segment::new(1230, 4560, "a"), Segment::new(4560, 7000, "b\nc")],
        );
        let decoded = decode(&encode(&original, OutputType::Ass)?, OutputType::Ass)?;
        assert_eq!(timings(&decoded), timings(&original));
        Ok(())
    }

    #[test]
    fn awkward_text_round_trips() -> anyhow::Result<()> {
        let texts = [
            "{laughs} hello",
            "a\\nb",
            "back\\slash {x}",
            "two  spaces",
            "one\n\ntwo",
        ];
        let original = Transcript::new(
            "en",
            texts
                .iter()
                .enumerate()
                .map(|(i, text)| Segment::new(i as u64 * 1000, i as u64 * 1000 + 500, *text))
                .collect(),
        );

        for ty in [OutputType::Ass, OutputType::Ttml, OutputType::Json] {
            let decoded = decode(&encode(&original, ty)?, ty)?;
            assert_eq!(timings(&decoded), timings(&original), "format {ty}");
        }

        // A blank line ends a cue, so cue formats fold blank interior lines away.
        for ty in [OutputType::Srt, OutputType::Vtt] {
            let decoded = decode(&encode(&original, ty)?, ty)?;
            let got: Vec<&str> = decoded.segments.iter().map(|s| s.text.as_str()).collect();
            assert_eq!(got[..4], texts[..4], "format {ty}");
            assert_eq!(got[4], "one\ntwo", "format {ty}");
        }
        Ok(())
    }

    #[test]
    fn json_and_ttml_keep_language() -> anyhow::Result<()> {
        let original = sample();
        let json = decode(&encode(&original, OutputType::Json)?, OutputType::Json)?;
        assert_eq!(json, original);
        let ttml = decode(&encode(&original, OutputType::Ttml)?, OutputType::Ttml)?;
        assert_eq!(ttml.language, "en");
        assert_eq!(ttml.source_duration_ms, None);
        Ok(())
    }

    #[test]
    fn lrc_round_trip_keeps_starts_and_synthesizes_ends() -> anyhow::Result<()> {
        let original = Transcript::new(
            "en",
            vec![Segment::new(1000, 1500, "a"), Segment::new(2000, 2600, "b")],
        );
        let decoded = decode(&encode(&original, OutputType::Lrc)?, OutputType::Lrc)?;
        assert_eq!(
            timings(&decoded),
            vec![(1000, 2000, "a"), (2000, 2000 + LRC_DEFAULT_DURATION_MS, "b")]
        );
        Ok(())
    }

    #[test]
    fn encoding_is_deterministic() -> anyhow::Result<()> {
        for ty in OutputType::ALL {
            assert_eq!(encode(&sample(), ty)?, encode(&sample(), ty)?);
        }
        Ok(())
    }

    #[test]
    fn empty_transcripts_decode_back_to_empty() -> anyhow::Result<()> {
        let empty = Transcript::default();
        for ty in OutputType::ALL {
            let decoded = decode(&encode(&empty, ty)?, ty)?;
            assert!(decoded.is_empty(), "format {ty}");
        }
        Ok(())
    }

    #[test]
    fn convert_srt_to_vtt() -> anyhow::Result<()> {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,000\r\nhi\r\n";
        let vtt = convert(srt, OutputType::Srt, OutputType::Vtt)?;
        assert_eq!(vtt, "WEBVTT\n\n00:00:01.000 --> 00:00:02.000\nhi\n\n");
        Ok(())
    }

    #[test]
    fn convert_file_rejects_invalid_input() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in.srt");
        let output = dir.path().join("out.vtt");
        std::fs::write(
            &input,
            "1\n00:00:00,000 --> 00:00:01,000\na\n\n2\n00:00:00,500 --> 00:00:01,500\nb\n",
        )?;

        let err = convert_file(&input, &output, None, None, &ValidationOpts::default())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!output.exists());
        Ok(())
    }

    #[test]
    fn convert_file_infers_formats_from_extensions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in.vtt");
        let output = dir.path().join("out.srt");
        std::fs::write(&input, "WEBVTT\n\n00:01.000 --> 00:02.000\nhi\n")?;

        let t = convert_file(&input, &output, None, None, &ValidationOpts::default())?;
        assert_eq!(t.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&output)?,
            "1\n00:00:01,000 --> 00:00:02,000\nhi\n\n"
        );
        Ok(())
    }
}
