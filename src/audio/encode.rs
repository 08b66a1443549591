//! In-memory WAV encoding for utterance clips.
//!
//! The segment recorder captures mono `f32` PCM; the transcription endpoint
//! wants a self-contained audio file.  `hound` writes a 16-bit PCM WAV into
//! a memory buffer — 44 header bytes plus two bytes per sample.

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

/// MIME type of clips produced by [`wav_bytes`].
pub const WAV_MIME: &str = "audio/wav";

/// Encode mono `f32` samples as a complete 16-bit PCM WAV file in memory.
///
/// Samples outside `[-1.0, 1.0]` are clamped before quantisation.
pub fn wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_plus_two_bytes_per_sample() {
        let bytes = wav_bytes(&vec![0.0_f32; 1_000], 16_000).unwrap();
        assert_eq!(bytes.len(), 44 + 2_000);
    }

    #[test]
    fn starts_with_riff_magic() {
        let bytes = wav_bytes(&[0.0_f32; 4], 16_000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }

    #[test]
    fn empty_clip_is_header_only() {
        let bytes = wav_bytes(&[], 16_000).unwrap();
        assert_eq!(bytes.len(), 44);
    }

    #[test]
    fn out_of_range_samples_are_clamped() {
        // Clamping must not panic and must stay within i16 range.
        let bytes = wav_bytes(&[2.0_f32, -2.0], 16_000).unwrap();
        assert_eq!(bytes.len(), 44 + 4);
    }
}
