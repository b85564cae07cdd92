//! Streaming WAV container writer
//!
//! Writes the canonical 44-byte header up front with the two size fields
//! zeroed (they cannot be known until the stream ends), appends raw
//! little-endian sample data, and patches the size fields on finalize.
//!
//! A process crash before [`WavWriter::finalize`] leaves a header that
//! reports zero-length data despite a non-empty file. The size fields are
//! not updated incrementally.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::FileError;

/// Size of the canonical WAV header in bytes
pub const WAV_HEADER_SIZE: usize = 44;

/// Byte offset of the RIFF chunk size field
const CHUNK_SIZE_OFFSET: u64 = 4;

/// Byte offset of the data chunk size field
const DATA_SIZE_OFFSET: u64 = 40;

/// Size of the fmt chunk payload
const FMT_CHUNK_SIZE: u32 = 16;

/// Integer PCM format tag
pub const FORMAT_PCM: u16 = 1;
/// IEEE floating-point format tag
pub const FORMAT_IEEE_FLOAT: u16 = 3;
/// A-law format tag
pub const FORMAT_ALAW: u16 = 6;
/// mu-law format tag
pub const FORMAT_MULAW: u16 = 7;
/// Extensible format tag
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Streaming WAV writer: `Closed -> Open -> Closed`
///
/// Exists only while a recording is active; dropping it without
/// [`finalize`](Self::finalize) closes the file with placeholder sizes.
#[derive(Debug)]
pub struct WavWriter {
    file: BufWriter<File>,
    path: PathBuf,
    num_samples: u64,
    channels: u16,
    bits_per_sample: u16,
    sample_rate: u32,
}

impl WavWriter {
    /// Creates the file and writes the fixed header with zeroed size fields.
    ///
    /// No writer is returned if the file cannot be created.
    pub fn create(
        path: impl AsRef<Path>,
        format_tag: u16,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> Result<Self, FileError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| FileError::Create {
            path: path.clone(),
            source: e,
        })?;

        let mut writer = Self {
            file: BufWriter::new(file),
            path,
            num_samples: 0,
            channels,
            bits_per_sample,
            sample_rate,
        };
        writer
            .write_header(format_tag)
            .map_err(FileError::Write)?;
        Ok(writer)
    }

    fn write_header(&mut self, format_tag: u16) -> std::io::Result<()> {
        let bytes_per_sample = u32::from(self.bits_per_sample) / 8;
        let byte_rate = self.sample_rate * u32::from(self.channels) * bytes_per_sample;
        let block_align = self.channels * self.bits_per_sample / 8;

        self.file.write_all(b"RIFF")?;
        self.file.write_all(&0u32.to_le_bytes())?; // chunk size placeholder
        self.file.write_all(b"WAVE")?;

        self.file.write_all(b"fmt ")?;
        self.file.write_all(&FMT_CHUNK_SIZE.to_le_bytes())?;
        self.file.write_all(&format_tag.to_le_bytes())?;
        self.file.write_all(&self.channels.to_le_bytes())?;
        self.file.write_all(&self.sample_rate.to_le_bytes())?;
        self.file.write_all(&byte_rate.to_le_bytes())?;
        self.file.write_all(&block_align.to_le_bytes())?;
        self.file.write_all(&self.bits_per_sample.to_le_bytes())?;

        self.file.write_all(b"data")?;
        self.file.write_all(&0u32.to_le_bytes())?; // data size placeholder
        Ok(())
    }

    /// Appends raw little-endian sample bytes verbatim.
    ///
    /// Returns the number of bytes written so short writes are visible to
    /// the caller. Full frames are counted toward the sample total.
    pub fn write(&mut self, bytes: &[u8]) -> Result<usize, FileError> {
        self.file.write_all(bytes).map_err(FileError::Write)?;

        let block = u64::from(self.channels) * u64::from(self.bits_per_sample) / 8;
        if block > 0 {
            self.num_samples += bytes.len() as u64 / block;
        }
        Ok(bytes.len())
    }

    /// Appends interleaved f32 samples as little-endian bytes.
    ///
    /// Convenience over [`write`](Self::write) for the capture path;
    /// returns bytes written.
    pub fn write_samples(&mut self, samples: &[f32]) -> Result<usize, FileError> {
        for s in samples {
            self.file
                .write_all(&s.to_le_bytes())
                .map_err(FileError::Write)?;
        }

        let bytes = samples.len() * 4;
        if self.channels > 0 {
            self.num_samples += samples.len() as u64 / u64::from(self.channels);
        }
        Ok(bytes)
    }

    /// Patches the deferred size fields and closes the file.
    ///
    /// Writes `data_size = num_samples * channels * bits/8` at offset 40
    /// and `36 + data_size` at offset 4. Mandatory: without it the header
    /// reports an empty data chunk.
    pub fn finalize(mut self) -> Result<(), FileError> {
        let data_size = (self.num_samples
            * u64::from(self.channels)
            * u64::from(self.bits_per_sample)
            / 8) as u32;

        self.file
            .seek(SeekFrom::Start(DATA_SIZE_OFFSET))
            .map_err(FileError::Finalize)?;
        self.file
            .write_all(&data_size.to_le_bytes())
            .map_err(FileError::Finalize)?;

        let chunk_size = 36 + data_size;
        self.file
            .seek(SeekFrom::Start(CHUNK_SIZE_OFFSET))
            .map_err(FileError::Finalize)?;
        self.file
            .write_all(&chunk_size.to_le_bytes())
            .map_err(FileError::Finalize)?;

        self.file.flush().map_err(FileError::Finalize)?;
        Ok(())
    }

    /// Frames written so far (one sample per channel)
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }

    /// Path of the file being written
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn read_u32(data: &[u8], off: usize) -> u32 {
        u32::from_le_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]])
    }

    fn read_u16(data: &[u8], off: usize) -> u16 {
        u16::from_le_bytes([data[off], data[off + 1]])
    }

    #[test]
    fn test_header_has_zero_placeholders_before_finalize() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("open.wav");

        let w = WavWriter::create(&path, FORMAT_IEEE_FLOAT, 44_100, 1, 32).unwrap();
        // dropping flushes the buffered header
        drop(w);

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len(), WAV_HEADER_SIZE);
        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(read_u32(&data, 4), 0);
        assert_eq!(&data[8..12], b"WAVE");
        assert_eq!(&data[12..16], b"fmt ");
        assert_eq!(read_u32(&data, 16), 16);
        assert_eq!(read_u16(&data, 20), FORMAT_IEEE_FLOAT);
        assert_eq!(&data[36..40], b"data");
        assert_eq!(read_u32(&data, 40), 0);
    }

    #[test]
    fn test_round_trip_sizes_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");

        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let mut w = WavWriter::create(&path, FORMAT_IEEE_FLOAT, 44_100, 1, 32).unwrap();
        let written = w.write_samples(&samples).unwrap();
        assert_eq!(written, 400);
        assert_eq!(w.num_samples(), 100);
        w.finalize().unwrap();

        let data = std::fs::read(&path).unwrap();
        let data_size = read_u32(&data, 40);
        assert_eq!(data_size, 100 * 4);
        assert_eq!(read_u32(&data, 4), 36 + data_size);
        assert_eq!(data.len(), WAV_HEADER_SIZE + 400);
    }

    #[test]
    fn test_round_trip_sizes_stereo() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        // 25 interleaved stereo frames
        let samples = vec![0.25f32; 50];
        let mut w = WavWriter::create(&path, FORMAT_IEEE_FLOAT, 44_100, 2, 32).unwrap();
        w.write_samples(&samples).unwrap();
        assert_eq!(w.num_samples(), 25);
        w.finalize().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(read_u16(&data, 22), 2);
        assert_eq!(read_u32(&data, 24), 44_100);
        assert_eq!(read_u32(&data, 28), 44_100 * 2 * 4); // byte rate
        assert_eq!(read_u16(&data, 32), 8); // block align
        assert_eq!(read_u16(&data, 34), 32);
        assert_eq!(read_u32(&data, 40), 25 * 2 * 4);
        assert_eq!(read_u32(&data, 4), 36 + 25 * 2 * 4);
    }

    #[test]
    fn test_sample_bytes_are_little_endian() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("le.wav");

        let mut w = WavWriter::create(&path, FORMAT_IEEE_FLOAT, 44_100, 1, 32).unwrap();
        w.write_samples(&[1.0f32]).unwrap();
        w.finalize().unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(&data[WAV_HEADER_SIZE..], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_raw_write_counts_whole_frames() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("raw.wav");

        let mut w = WavWriter::create(&path, FORMAT_IEEE_FLOAT, 44_100, 2, 32).unwrap();
        // 3 full stereo frames (24 bytes) plus a dangling 4 bytes
        let n = w.write(&[0u8; 28]).unwrap();
        assert_eq!(n, 28);
        assert_eq!(w.num_samples(), 3);
        w.finalize().unwrap();
    }

    #[test]
    fn test_create_fails_cleanly() {
        let err = WavWriter::create(
            "/nonexistent-dir/rec.wav",
            FORMAT_IEEE_FLOAT,
            44_100,
            1,
            32,
        )
        .unwrap_err();
        assert!(err.to_string().contains("nonexistent-dir"));
    }
}
