use std::io::{Read, Seek};
use std::path::Path;

use hound::{WavReader, WavSpec};

use crate::media::TARGET_SAMPLE_RATE;
use crate::{Error, Result};

/// Load WAV audio from a reader and return normalized audio samples.
///
/// What we return:
/// - A `Vec<f32>` containing mono audio samples normalized to `[-1.0, 1.0]`
/// - The associated `WavSpec` so callers still have access to metadata
///
/// Format requirements:
/// - Mono (1 channel)
/// - 16 kHz, which is what the extraction step produces
pub fn get_samples_from_wav_reader<R>(reader: R) -> Result<(Vec<f32>, WavSpec)>
where
    R: Read + Seek,
{
    let mut reader = WavReader::new(reader).map_err(wav_error)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(Error::AudioExtraction(format!(
            "expected mono WAV (1 channel), got {} channels",
            spec.channels
        )));
    }

    if spec.sample_rate != TARGET_SAMPLE_RATE {
        return Err(Error::AudioExtraction(format!(
            "expected {TARGET_SAMPLE_RATE} Hz sample rate, got {} Hz",
            spec.sample_rate
        )));
    }

    // Normalize from i16 PCM to f32 in [-1.0, 1.0].
    let mut samples = Vec::with_capacity(reader.duration() as usize);
    for sample in reader.samples::<i16>() {
        let pcm = sample.map_err(wav_error)?;
        samples.push(pcm as f32 / i16::MAX as f32);
    }

    Ok((samples, spec))
}

/// Duration of a WAV file in milliseconds, read from its header.
pub fn duration_ms(path: &Path) -> Result<u64> {
    let reader = WavReader::open(path).map_err(wav_error)?;
    let rate = u64::from(reader.spec().sample_rate);
    if rate == 0 {
        return Err(Error::AudioExtraction("WAV header has a zero sample rate".into()));
    }
    Ok(u64::from(reader.duration()) * 1000 / rate)
}

fn wav_error(err: hound::Error) -> Error {
    match err {
        hound::Error::IoError(io) => Error::Io(io),
        other => Error::AudioExtraction(format!("invalid WAV data: {other}")),
    }
}

#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, seconds: f32) -> anyhow::Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..(seconds * TARGET_SAMPLE_RATE as f32) as usize {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}
