//! Microphone capture using cpal
//!
//! Collects the default input device into fixed-length phrase windows,
//! each encoded as 16 kHz mono 16-bit PCM WAV.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError, TrySendError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::SpeechError;

/// Sample rate expected by the speech service
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Callback buffers held for the capture loop before audio is dropped
const SAMPLE_QUEUE: usize = 64;

/// Check whether the host has a default input device
pub fn input_available() -> bool {
    cpal::default_host().default_input_device().is_some()
}

/// Capture audio until `running` is cleared or the receiver goes away
///
/// Blocks the calling thread; the cpal stream lives and dies on it.
pub fn capture(
    window: Duration,
    running: &AtomicBool,
    chunk_tx: mpsc::Sender<Vec<u8>>,
) -> Result<(), SpeechError> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or(SpeechError::NoInputDevice)?;
    let supported = device
        .default_input_config()
        .map_err(|e| SpeechError::Device(e.to_string()))?;

    let sample_rate = supported.sample_rate().0;
    let channels = usize::from(supported.channels()).max(1);
    let config: cpal::StreamConfig = supported.config();

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels,
        "microphone capture started"
    );

    let (sample_tx, sample_rx) = std_mpsc::sync_channel::<Vec<f32>>(SAMPLE_QUEUE);
    let err_fn = |err: cpal::StreamError| warn!(%err, "input stream error");

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                queue_samples(&sample_tx, downmix(data.iter().copied(), channels));
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let samples = data.iter().map(|&s| f32::from(s) / 32768.0);
                queue_samples(&sample_tx, downmix(samples, channels));
            },
            err_fn,
            None,
        ),
        other => {
            return Err(SpeechError::Device(format!(
                "unsupported sample format {other:?}"
            )))
        }
    }
    .map_err(|e| SpeechError::Device(e.to_string()))?;

    stream
        .play()
        .map_err(|e| SpeechError::Device(e.to_string()))?;

    let window_len = (u64::from(sample_rate) * window.as_millis() as u64 / 1000) as usize;
    let mut buffer: Vec<f32> = Vec::with_capacity(window_len * 2);

    while running.load(Ordering::SeqCst) {
        match sample_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(samples) => buffer.extend(samples),
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if buffer.len() >= window_len {
            let phrase: Vec<f32> = buffer.drain(..window_len).collect();
            let wav = encode_wav(&resample(&phrase, sample_rate, TARGET_SAMPLE_RATE))?;
            debug!(bytes = wav.len(), "phrase window captured");

            if chunk_tx.blocking_send(wav).is_err() {
                debug!("phrase receiver closed");
                break;
            }
        }
    }

    drop(stream);
    info!("microphone capture stopped");
    Ok(())
}

/// Hand one callback buffer to the capture loop without blocking
///
/// Returns false when the buffer was dropped.
fn queue_samples(sample_tx: &std_mpsc::SyncSender<Vec<f32>>, samples: Vec<f32>) -> bool {
    match sample_tx.try_send(samples) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!("capture loop behind, dropping audio");
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Average interleaved frames down to one channel
fn downmix(samples: impl Iterator<Item = f32>, channels: usize) -> Vec<f32> {
    let interleaved: Vec<f32> = samples.collect();
    if channels == 1 {
        return interleaved;
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Linear-interpolation resampler
fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from) / f64::from(to);
    let out_len = (samples.len() as f64 / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples.get(idx + 1).copied().unwrap_or(a);
            a + (b - a) * frac
        })
        .collect()
}

/// Encode mono samples as an in-memory 16-bit PCM WAV file
fn encode_wav(samples: &[f32]) -> Result<Vec<u8>, SpeechError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * f32::from(i16::MAX)) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix([0.5, -0.5, 1.0, 0.0].into_iter(), 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn test_downmix_mono_passthrough() {
        let mono = downmix([0.1, 0.2].into_iter(), 1);
        assert_eq!(mono, vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_48k_to_16k() {
        let input: Vec<f32> = (0..4800).map(|i| i as f32).collect();
        let output = resample(&input, 48_000, TARGET_SAMPLE_RATE);
        assert_eq!(output.len(), 1600);
        assert_eq!(output[1], 3.0);
    }

    #[test]
    fn test_encoded_wav_header() {
        let wav = encode_wav(&[0.0, 0.5, -0.5, 2.0]).unwrap();
        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, TARGET_SAMPLE_RATE);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_full_queue_drops_audio() {
        let (tx, rx) = std_mpsc::sync_channel(2);
        assert!(queue_samples(&tx, vec![0.1]));
        assert!(queue_samples(&tx, vec![0.2]));
        assert!(!queue_samples(&tx, vec![0.3]));

        assert_eq!(rx.recv().unwrap(), vec![0.1]);
        assert_eq!(rx.recv().unwrap(), vec![0.2]);
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(!queue_samples(&tx, vec![0.4]));
    }
}
