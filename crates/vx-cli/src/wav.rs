//! WAV reading and writing

use std::path::Path;

use anyhow::{Context, Result, bail};
use vx_core::Waveform;

/// Load a WAV file as planar f32
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let path = path.as_ref();
    let reader =
        hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("decoding {}", path.display()))?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                bail!("{}: unsupported bit depth {}", path.display(), spec.bits_per_sample);
            }
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .with_context(|| format!("decoding {}", path.display()))?
        }
    };

    let waveform = Waveform::from_interleaved(&samples, spec.channels as usize, spec.sample_rate)
        .with_context(|| format!("{} is not a valid waveform", path.display()))?;

    log::debug!(
        "Read {}: {} ch, {} Hz, {:.2}s",
        path.display(),
        waveform.num_channels(),
        waveform.sample_rate(),
        waveform.duration_secs()
    );
    Ok(waveform)
}

/// Write 32-bit float WAV
pub fn write_wav<P: AsRef<Path>>(path: P, waveform: &Waveform) -> Result<()> {
    let path = path.as_ref();
    let spec = hound::WavSpec {
        channels: waveform.num_channels() as u16,
        sample_rate: waveform.sample_rate(),
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer =
        hound::WavWriter::create(path, spec).with_context(|| format!("creating {}", path.display()))?;
    for sample in waveform.interleaved() {
        writer.write_sample(sample)?;
    }
    writer
        .finalize()
        .with_context(|| format!("finalizing {}", path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_float_roundtrip_keeps_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let wave = Waveform::from_channels(vec![vec![0.25, -0.5], vec![1.0, 0.0]], 22050).unwrap();

        write_wav(&path, &wave).unwrap();
        let back = read_wav(&path).unwrap();

        assert_eq!(back, wave);
    }

    #[test]
    fn test_read_int16() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("int.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(16384i16).unwrap();
        writer.write_sample(-32768i16).unwrap();
        writer.finalize().unwrap();

        let wave = read_wav(&path).unwrap();
        assert_relative_eq!(wave.samples()[0], 0.5);
        assert_relative_eq!(wave.samples()[1], -1.0);
    }

    #[test]
    fn test_missing_file() {
        assert!(read_wav("/nonexistent/input.wav").is_err());
    }
}
