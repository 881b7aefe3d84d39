//! WAV file output for offline renders.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};

use crate::Result;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Interleaved channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// 16 or 24 for integer PCM, 32 for float.
    pub bits_per_sample: u16,
}

impl Default for WavSpec {
    fn default() -> Self {
        Self {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
        }
    }
}

impl From<WavSpec> for hound::WavSpec {
    fn from(spec: WavSpec) -> Self {
        hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: spec.bits_per_sample,
            sample_format: if spec.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Header facts of a WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct WavInfo {
    /// Channel count.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth.
    pub bits_per_sample: u16,
    /// Frames in the file.
    pub frames: u64,
    /// Length in seconds.
    pub duration_secs: f64,
}

/// Write interleaved samples. Integer formats are clamped to full scale.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    let mut writer = WavWriter::create(path, hound::WavSpec::from(spec))?;
    if spec.bits_per_sample == 32 {
        for s in samples {
            writer.write_sample(*s)?;
        }
    } else {
        let full_scale = (1i32 << (spec.bits_per_sample - 1)) as f32;
        for s in samples {
            let v = (*s * full_scale).clamp(-full_scale, full_scale - 1.0) as i32;
            writer.write_sample(v)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Read a WAV header without loading samples.
pub fn read_wav_info<P: AsRef<Path>>(path: P) -> Result<WavInfo> {
    let reader = WavReader::open(path)?;
    let spec = reader.spec();
    let frames = u64::from(reader.len()) / u64::from(spec.channels.max(1));
    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        frames,
        duration_secs: frames as f64 / f64::from(spec.sample_rate),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_readable_16_bit_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.wav");
        write_wav(&path, &vec![0.25; 96_000], WavSpec::default()).unwrap();

        let info = read_wav_info(&path).unwrap();
        assert_eq!(info.channels, 2);
        assert_eq!(info.frames, 48_000);
        assert_eq!(info.duration_secs, 1.0);

        let mut reader = WavReader::open(&path).unwrap();
        let first: i16 = reader.samples::<i16>().next().unwrap().unwrap();
        assert_eq!(first, 8192);
    }

    #[test]
    fn float_format_keeps_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("float.wav");
        let spec = WavSpec {
            bits_per_sample: 32,
            ..WavSpec::default()
        };
        write_wav(&path, &[0.5, -0.5], spec).unwrap();
        let mut reader = WavReader::open(&path).unwrap();
        let values: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(values, [0.5, -0.5]);
    }

    #[test]
    fn clipping_is_clamped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        write_wav(&path, &[2.0, -2.0], WavSpec::default()).unwrap();
        let mut reader = WavReader::open(&path).unwrap();
        let values: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(values, [i16::MAX, i16::MIN]);
    }
}
