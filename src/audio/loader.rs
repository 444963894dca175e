use std::fs::File;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::probe::Hint;

use crate::error::DecodeError;

/// Decoded audio, carrying both the mono downmix every extractor needs and
/// the original per-channel samples stereo extractors need (C3 §4.3
/// "Stereo"). `channels.len() == 1` for mono sources; `channels[0]`/`[1]`
/// are left/right for stereo sources (anything beyond 2 channels is folded
/// into the stereo pair's average, matching how the mono mix already
/// averages all channels).
#[derive(Debug, Clone)]
pub struct AudioData {
    pub samples: Vec<f64>,
    pub channels_raw: Vec<Vec<f64>>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioData {
    pub fn duration_sec(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_stereo(&self) -> bool {
        self.channels_raw.len() >= 2
    }

    /// Left/right channel slices for stereo analysis. Returns `None` for
    /// mono sources.
    pub fn left_right(&self) -> Option<(&[f64], &[f64])> {
        if self.channels_raw.len() >= 2 {
            Some((&self.channels_raw[0], &self.channels_raw[1]))
        } else {
            None
        }
    }
}

/// Async entry point used by the HTTP server handler (spawns the blocking
/// decode work off the tokio runtime, since symphonia is synchronous).
pub async fn load_audio(filepath: &str) -> Result<AudioData, DecodeError> {
    let filepath = filepath.to_string();
    tokio::task::spawn_blocking(move || load_audio_sync(&filepath))
        .await
        .map_err(|e| DecodeError::Corrupt(format!("decode task panicked: {e}")))?
}

/// Synchronous entry point used directly from pipeline worker threads (C9),
/// which are plain OS threads with no tokio runtime to spawn_blocking onto.
pub fn load_audio_sync(filepath: &str) -> Result<AudioData, DecodeError> {
    tracing::debug!(filepath, "loading audio");

    if !std::path::Path::new(filepath).exists() {
        return Err(DecodeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            filepath.to_string(),
        )));
    }

    let file = File::open(filepath)?;
    let source = ReadOnlySource::new(file);
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = std::path::Path::new(filepath).extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &Default::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| DecodeError::Corrupt("no audio tracks found".to_string()))?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::Corrupt("no sample rate found".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| DecodeError::Corrupt("no channel info found".to_string()))?
        .count() as u16;

    tracing::debug!(sample_rate, channels, "probed audio format");

    let mut samples = Vec::new();
    let mut channels_raw: Vec<Vec<f64>> = Vec::new();
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(format!("no decoder: {e}")))?;

    loop {
        match format.next_packet() {
            Ok(packet) => match decoder.decode(&packet) {
                Ok(buf) => collect_samples(&mut samples, &mut channels_raw, &buf, channels as usize),
                Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
            },
            Err(symphonia::core::errors::Error::IoError(_)) => break,
            Err(symphonia::core::errors::Error::Unsupported(_)) => break,
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Corrupt("no audio samples decoded".to_string()));
    }
    if !samples.iter().all(|s| s.is_finite()) {
        return Err(DecodeError::Corrupt(
            "audio contains NaN or infinite values".to_string(),
        ));
    }

    tracing::debug!(samples = samples.len(), sample_rate, filepath, "loaded audio");

    Ok(AudioData {
        samples,
        channels_raw,
        sample_rate,
        channels,
    })
}

/// Appends one buffer's worth of decoded samples to both the mono mix and,
/// when the source is stereo, the per-channel raw vectors.
fn collect_samples(
    samples: &mut Vec<f64>,
    channels_raw: &mut Vec<Vec<f64>>,
    buf: &AudioBufferRef,
    channels: usize,
) {
    macro_rules! process_buffer {
        ($buf:expr, $norm_fn:expr) => {{
            if $buf.frames() == 0 {
                return;
            }
            let n_frames = $buf.frames();
            let ch_count = std::cmp::min(channels, $buf.spec().channels.count());
            if channels_raw.is_empty() {
                channels_raw.resize(ch_count.max(1), Vec::new());
            }
            for frame_idx in 0..n_frames {
                let mut sum = 0.0f64;
                for ch in 0..ch_count {
                    let v = $norm_fn($buf.chan(ch)[frame_idx]);
                    sum += v;
                    if ch < channels_raw.len() {
                        channels_raw[ch].push(v);
                    }
                }
                samples.push(sum / ch_count as f64);
            }
        }};
    }

    match buf {
        AudioBufferRef::F32(fbuf) => process_buffer!(fbuf, |v: f32| v as f64),
        AudioBufferRef::F64(fbuf) => process_buffer!(fbuf, |v: f64| v),
        AudioBufferRef::S8(ibuf) => process_buffer!(ibuf, |v: i8| v as f64 / i8::MAX as f64),
        AudioBufferRef::S16(ibuf) => process_buffer!(ibuf, |v: i16| v as f64 / i16::MAX as f64),
        AudioBufferRef::S24(ibuf) => process_buffer!(ibuf, |v: symphonia::core::sample::i24| {
            v.into_i32() as f64 / (2_i32.pow(23) - 1) as f64
        }),
        AudioBufferRef::S32(ibuf) => process_buffer!(ibuf, |v: i32| v as f64 / i32::MAX as f64),
        AudioBufferRef::U8(ubuf) => process_buffer!(ubuf, |v: u8| ((v as f64 / 255.0) - 0.5) * 2.0),
        AudioBufferRef::U16(ubuf) => {
            process_buffer!(ubuf, |v: u16| ((v as f64 / 65535.0) - 0.5) * 2.0)
        }
        AudioBufferRef::U24(ubuf) => process_buffer!(ubuf, |v: symphonia::core::sample::u24| {
            let norm = v.into_u32() as f64 / (2_u32.pow(24) - 1) as f64;
            (norm - 0.5) * 2.0
        }),
        AudioBufferRef::U32(ubuf) => {
            process_buffer!(ubuf, |v: u32| ((v as f64 / u32::MAX as f64) - 0.5) * 2.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_not_found() {
        let err = load_audio_sync("/nonexistent/path/track.wav").unwrap_err();
        assert!(matches!(err, DecodeError::Io(_)));
    }
}
