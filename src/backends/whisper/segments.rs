use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperSegment};

use crate::engine::TranscribeOpts;
use crate::segments::Segment;
use crate::{Error, Result};

/// Run a full whisper pass over `samples` and collect non-empty segments in order.
pub(super) fn transcribe_samples(
    ctx: &WhisperContext,
    opts: &TranscribeOpts,
    samples: &[f32],
) -> Result<Vec<Segment>> {
    let params = build_full_params(opts);

    let mut state = ctx
        .create_state()
        .map_err(|e| Error::Transcription(format!("failed to create whisper state: {e}")))?;

    state
        .full(params, samples)
        .map_err(|e| Error::Transcription(format!("whisper full() failed: {e}")))?;

    let mut segments = Vec::new();
    for whisper_segment in state.as_iter() {
        if let Some(segment) = to_segment(&whisper_segment)? {
            segments.push(segment);
        }
    }
    Ok(segments)
}

fn to_segment(segment: &WhisperSegment) -> Result<Option<Segment>> {
    let text = segment
        .to_str()
        .map_err(|e| Error::Transcription(format!("failed to get segment text: {e}")))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let start_ms = centiseconds_to_ms(segment.start_timestamp());
    let end_ms = centiseconds_to_ms(segment.end_timestamp()).max(start_ms);

    let mut out = Segment::new(start_ms, end_ms, text);
    if let Some(p) = mean_token_probability(segment) {
        out = out.with_confidence(p);
    }
    Ok(Some(out))
}

/// Average probability of the segment's text tokens, skipping whisper control tokens such as
/// `[_BEG_]` and `[_TT_50]`.
fn mean_token_probability(segment: &WhisperSegment) -> Option<f32> {
    let count = usize::try_from(segment.n_tokens()).ok()?;
    let mut sum = 0.0f32;
    let mut n = 0usize;

    for idx in 0..count {
        let Some(token) = segment.get_token(idx as i32) else {
            continue;
        };
        let is_control = token
            .to_str()
            .map(|t| t.starts_with("[_") && t.ends_with("_]"))
            .unwrap_or(true);
        if is_control {
            continue;
        }
        sum += token.token_data().p;
        n += 1;
    }

    (n > 0).then(|| (sum / n as f32).clamp(0.0, 1.0))
}

/// whisper reports centiseconds and uses -1 for unknown.
fn centiseconds_to_ms(value: i64) -> u64 {
    u64::try_from(value).map(|cs| cs * 10).unwrap_or(0)
}

fn build_full_params(opts: &TranscribeOpts) -> FullParams<'_, '_> {
    let mut params = FullParams::new(SamplingStrategy::BeamSearch {
        beam_size: 5,
        patience: 1.0,
    });

    params.set_n_threads(i32::try_from(opts.threads.max(1)).unwrap_or(i32::MAX));
    params.set_translate(opts.translate);
    params.set_language(opts.language.as_deref());
    params.set_no_context(true);
    params.set_single_segment(false);

    params.set_print_progress(false);
    params.set_print_special(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    params
}
