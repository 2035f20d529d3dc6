//! WAV codec
//!
//! Decodes canonical PCM WAV (8/16/24/32-bit integer, mono or stereo) into a
//! [`SampleBuffer`] and encodes buffers back to integer PCM. Everything goes
//! through `hound`, reading and writing every integer depth as `i32`.
//!
//! Integer samples map to floats as `sample / 2^(bits-1)`; encoding is the
//! inverse with rounding and clipping to the representable range.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::{debug, warn};

use crate::engine::buffer::SampleBuffer;
use crate::error::{AuraError, Result};

/// Integer bit depths accepted by the codec
pub const SUPPORTED_BIT_DEPTHS: [u16; 4] = [8, 16, 24, 32];

/// Header summary of a WAV stream
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub num_frames: u32,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f64 {
        self.num_frames as f64 / self.sample_rate as f64
    }
}

fn unsupported(format: impl Into<String>) -> AuraError {
    AuraError::UnsupportedFormat {
        format: format.into(),
    }
}

fn map_read_error(e: hound::Error) -> AuraError {
    unsupported(format!("malformed WAV: {}", e))
}

fn map_write_error(e: hound::Error) -> AuraError {
    match e {
        hound::Error::IoError(io) => AuraError::Io(io),
        other => unsupported(other.to_string()),
    }
}

fn check_spec(spec: &WavSpec) -> Result<()> {
    if spec.sample_format == SampleFormat::Float {
        return Err(unsupported(format!(
            "{}-bit IEEE float (only integer PCM supported)",
            spec.bits_per_sample
        )));
    }
    if !SUPPORTED_BIT_DEPTHS.contains(&spec.bits_per_sample) {
        return Err(unsupported(format!(
            "{}-bit integer audio",
            spec.bits_per_sample
        )));
    }
    if spec.channels == 0 || spec.channels > 2 {
        return Err(unsupported(format!(
            "{}-channel audio (only mono/stereo supported)",
            spec.channels
        )));
    }
    Ok(())
}

/// Read header information without decoding samples
pub fn probe(bytes: &[u8]) -> Result<WavInfo> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(map_read_error)?;
    let spec = reader.spec();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        num_frames: reader.duration(),
    })
}

/// Decode a complete WAV file image
///
/// Fails without producing a partial buffer on any malformed or unsupported
/// input.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer> {
    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(map_read_error)?;
    let spec = reader.spec();
    check_spec(&spec)?;

    let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f64;
    let samples = reader
        .samples::<i32>()
        .map(|s| s.map(|v| v as f64 * scale))
        .collect::<std::result::Result<Vec<f64>, _>>()
        .map_err(map_read_error)?;

    debug!(
        sample_rate = spec.sample_rate,
        channels = spec.channels,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        "decoded WAV"
    );
    SampleBuffer::from_interleaved(samples, spec.channels as usize, spec.sample_rate)
}

/// Encode a buffer as integer PCM WAV
pub fn encode(buffer: &SampleBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    if !SUPPORTED_BIT_DEPTHS.contains(&bit_depth) {
        return Err(unsupported(format!(
            "{}-bit export (only 8, 16, 24, 32 supported)",
            bit_depth
        )));
    }

    let spec = WavSpec {
        channels: buffer.channels() as u16,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: bit_depth,
        sample_format: SampleFormat::Int,
    };

    let full_scale = (1u64 << (bit_depth - 1)) as f64;
    let (min, max) = (-full_scale, full_scale - 1.0);
    let clipped = buffer
        .samples()
        .iter()
        .filter(|s| (*s * full_scale).round() > max || (*s * full_scale).round() < min)
        .count();
    if clipped > 0 {
        warn!(clipped, bit_depth, "samples clipped during encode");
    }

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.samples().len() * 4));
    {
        let mut writer = WavWriter::new(&mut cursor, spec).map_err(map_write_error)?;
        for &sample in buffer.samples() {
            let value = (sample * full_scale).round().clamp(min, max) as i32;
            writer.write_sample(value).map_err(map_write_error)?;
        }
        writer.finalize().map_err(map_write_error)?;
    }
    Ok(cursor.into_inner())
}

/// Read and decode a WAV file from disk
pub fn read_wav_file(path: &Path) -> Result<SampleBuffer> {
    let bytes = fs::read(path).map_err(|source| AuraError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes)
}

/// Encode and write a WAV file, returning the bytes written
pub fn write_wav_file(path: &Path, buffer: &SampleBuffer, bit_depth: u16) -> Result<Vec<u8>> {
    let bytes = encode(buffer, bit_depth)?;
    fs::write(path, &bytes).map_err(|source| AuraError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(bytes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;
    use test_case::test_case;

    fn raw_wav(spec: WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn int_spec(channels: u16, bits: u16) -> WavSpec {
        WavSpec {
            channels,
            sample_rate: 44100,
            bits_per_sample: bits,
            sample_format: SampleFormat::Int,
        }
    }

    #[test]
    fn test_decode_scales_by_bit_depth() {
        let bytes = raw_wav(int_spec(1, 16), &[0, 16384, -32768, 32767]);
        let buffer = decode(&bytes).unwrap();
        assert_eq!(buffer.samples(), &[0.0, 0.5, -1.0, 32767.0 / 32768.0]);
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.layout(), ChannelLayout::Mono);
    }

    #[test]
    fn test_decode_stereo_interleaving() {
        let bytes = raw_wav(int_spec(2, 24), &[4194304, -4194304, 0, 8388607]);
        let buffer = decode(&bytes).unwrap();
        assert_eq!(buffer.num_frames(), 2);
        assert_eq!(buffer.frame(0).unwrap(), &[0.5, -0.5]);
    }

    #[test_case(8 ; "8-bit")]
    #[test_case(16 ; "16-bit")]
    #[test_case(24 ; "24-bit")]
    #[test_case(32 ; "32-bit")]
    fn test_encode_decode_within_one_lsb(bits: u16) {
        let original = SampleBuffer::stereo_sine(440.0, 880.0, 0.9, 2048, 44100);
        let decoded = decode(&encode(&original, bits).unwrap()).unwrap();
        assert_eq!(decoded.num_frames(), original.num_frames());
        assert_eq!(decoded.channels(), 2);

        let lsb = 1.0 / (1u64 << (bits - 1)) as f64;
        for (a, b) in original.samples().iter().zip(decoded.samples()) {
            assert!((a - b).abs() <= lsb, "{} vs {} at {} bits", a, b, bits);
        }
    }

    #[test]
    fn test_encode_clips_out_of_range() {
        let buffer = SampleBuffer::from_interleaved(vec![1.5, -1.5, 1.0], 1, 44100).unwrap();
        let decoded = decode(&encode(&buffer, 16).unwrap()).unwrap();
        assert_abs_diff_eq!(decoded.samples()[0], 32767.0 / 32768.0);
        assert_eq!(decoded.samples()[1], -1.0);
        assert_abs_diff_eq!(decoded.samples()[2], 32767.0 / 32768.0);
    }

    #[test]
    fn test_float_wav_rejected() {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            writer.write_sample(0.25f32).unwrap();
            writer.finalize().unwrap();
        }
        assert!(matches!(
            decode(&cursor.into_inner()),
            Err(AuraError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_multichannel_rejected() {
        let bytes = raw_wav(int_spec(4, 16), &[0; 8]);
        assert!(matches!(
            decode(&bytes),
            Err(AuraError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            decode(b"RIFF\x00\x00not a wave file"),
            Err(AuraError::UnsupportedFormat { .. })
        ));
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_unsupported_export_depth() {
        let buffer = SampleBuffer::silence(ChannelLayout::Mono, 4, 44100);
        assert!(matches!(
            encode(&buffer, 12),
            Err(AuraError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_probe() {
        let bytes = raw_wav(int_spec(2, 16), &[0; 200]);
        let info = probe(&bytes).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.num_frames, 100);
        assert_abs_diff_eq!(info.duration_secs(), 100.0 / 44100.0);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let original = SampleBuffer::sine(440.0, 0.5, 4410, 44100);

        let bytes = write_wav_file(&path, &original, 24).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), bytes.len() as u64);

        let loaded = read_wav_file(&path).unwrap();
        assert_eq!(loaded.num_frames(), 4410);
    }

    #[test]
    fn test_missing_file() {
        let err = read_wav_file(Path::new("/nonexistent/path/audio.wav")).unwrap_err();
        assert!(matches!(err, AuraError::FileRead { .. }));
        assert_eq!(err.error_code(), "IO_FAILURE");
    }
}
