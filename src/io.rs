//! Map persistence
//!
//! Snapshots are written as a small framed container: an 8-byte magic and
//! version header, then per-frame headers carrying uncompressed/compressed
//! lengths and a CRC32 of the compressed payload, then the LZ4-compressed
//! frames themselves. The map snapshot is CBOR inside frame 0.
//!
//! The container is stream-oriented: writers and readers work over any
//! `Write`/`Read`, so tests can run against in-memory buffers.

use crate::error::{Error, Result};
use crate::grid::VoxelGrid;
use crc32fast::Hasher;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"VOXMAP\0\0";
const FORMAT_VERSION: u8 = 1;

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    pub uncompressed_len: u32,
    pub compressed_len: u32,
    pub crc32: u32,
}

/// Container writer
pub struct ContainerWriter<W: Write> {
    frames: Vec<(FrameMetadata, Vec<u8>)>,
    writer: W,
}

impl<W: Write> ContainerWriter<W> {
    /// Create a new container writer
    pub fn new(writer: W) -> Self {
        Self {
            frames: Vec::new(),
            writer,
        }
    }

    /// Append a frame of data
    pub fn write_frame(&mut self, data: &[u8]) -> Result<()> {
        let uncompressed_len = data.len() as u32;
        let compressed = lz4_flex::compress_prepend_size(data);
        let compressed_len = compressed.len() as u32;

        let mut hasher = Hasher::new();
        hasher.update(&compressed);
        let crc32 = hasher.finalize();

        self.frames.push((
            FrameMetadata {
                uncompressed_len,
                compressed_len,
                crc32,
            },
            compressed,
        ));
        Ok(())
    }

    /// Write headers and frame data, consuming the writer
    pub fn finish(mut self) -> Result<()> {
        let frame_count = self.frames.len() as u32;

        // File header (16 bytes)
        self.writer.write_all(MAGIC)?;
        self.writer.write_all(&[FORMAT_VERSION])?;
        self.writer.write_all(&[0])?; // flags
        self.writer.write_all(&frame_count.to_be_bytes())?;
        self.writer.write_all(&[0, 0])?; // reserved

        // Frame headers (12 bytes each)
        for (meta, _) in &self.frames {
            let mut header = [0u8; 12];
            header[0..4].copy_from_slice(&meta.uncompressed_len.to_be_bytes());
            header[4..8].copy_from_slice(&meta.compressed_len.to_be_bytes());
            header[8..12].copy_from_slice(&meta.crc32.to_be_bytes());
            self.writer.write_all(&header)?;
        }

        for (_, compressed) in &self.frames {
            self.writer.write_all(compressed)?;
        }
        Ok(())
    }
}

/// Container reader
pub struct ContainerReader<R: Read> {
    reader: R,
    frames: Vec<FrameMetadata>,
    current_frame: usize,
}

impl<R: Read> ContainerReader<R> {
    /// Open a container, reading and checking its headers
    pub fn open(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 8];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(Error::InvalidFormat("bad magic number".to_string()));
        }

        let mut version = [0u8; 1];
        reader.read_exact(&mut version)?;
        if version[0] != FORMAT_VERSION {
            return Err(Error::InvalidFormat(format!(
                "unsupported format version {}",
                version[0]
            )));
        }

        let mut flags = [0u8; 1];
        reader.read_exact(&mut flags)?;

        let mut frame_count = [0u8; 4];
        reader.read_exact(&mut frame_count)?;
        let frame_count = u32::from_be_bytes(frame_count);

        let mut reserved = [0u8; 2];
        reader.read_exact(&mut reserved)?;

        let mut frames = Vec::with_capacity(frame_count as usize);
        for _ in 0..frame_count {
            let mut header = [0u8; 12];
            reader.read_exact(&mut header)?;
            frames.push(FrameMetadata {
                uncompressed_len: u32::from_be_bytes([header[0], header[1], header[2], header[3]]),
                compressed_len: u32::from_be_bytes([header[4], header[5], header[6], header[7]]),
                crc32: u32::from_be_bytes([header[8], header[9], header[10], header[11]]),
            });
        }

        Ok(Self {
            reader,
            frames,
            current_frame: 0,
        })
    }

    /// Read and verify the next frame, or `None` past the end
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.current_frame >= self.frames.len() {
            return Ok(None);
        }
        let meta = &self.frames[self.current_frame];

        let mut compressed = vec![0u8; meta.compressed_len as usize];
        self.reader.read_exact(&mut compressed)?;

        let mut hasher = Hasher::new();
        hasher.update(&compressed);
        let actual = hasher.finalize();
        if actual != meta.crc32 {
            return Err(Error::CrcMismatch {
                expected: meta.crc32,
                actual,
            });
        }

        let decompressed = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| Error::Codec(format!("LZ4 decompression failed: {}", e)))?;
        if decompressed.len() != meta.uncompressed_len as usize {
            return Err(Error::InvalidFormat(format!(
                "frame length {} does not match header {}",
                decompressed.len(),
                meta.uncompressed_len
            )));
        }

        self.current_frame += 1;
        Ok(Some(decompressed))
    }

    /// Total number of frames
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a, V: Serialize> {
    resolution: f64,
    grid: &'a VoxelGrid<V>,
}

#[derive(Deserialize)]
#[serde(bound = "V: DeserializeOwned")]
struct SnapshotOwned<V> {
    resolution: f64,
    grid: VoxelGrid<V>,
}

/// Write a map snapshot (resolution + all slots) into a container
pub fn write_map<W, V>(writer: W, resolution: f64, grid: &VoxelGrid<V>) -> Result<()>
where
    W: Write,
    V: Serialize,
{
    let bytes = serde_cbor::to_vec(&SnapshotRef { resolution, grid })?;
    let mut container = ContainerWriter::new(writer);
    container.write_frame(&bytes)?;
    container.finish()
}

/// Read a map snapshot back out of a container
pub fn read_map<R, V>(reader: R) -> Result<(f64, VoxelGrid<V>)>
where
    R: Read,
    V: DeserializeOwned,
{
    let mut container = ContainerReader::open(reader)?;
    let frame = container
        .next_frame()?
        .ok_or_else(|| Error::InvalidFormat("map container holds no frames".to_string()))?;
    let snapshot: SnapshotOwned<V> = serde_cbor::from_slice(&frame)?;
    if !(snapshot.resolution > 0.0 && snapshot.resolution.is_finite()) {
        return Err(Error::InvalidFormat(format!(
            "non-positive resolution {}",
            snapshot.resolution
        )));
    }
    Ok((snapshot.resolution, snapshot.grid))
}

/// Timestamped snapshot path inside the configured map directory
pub fn timestamped_map_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    dir.join(format!("{}_map.vxm", stamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Coord;
    use std::io::Cursor;

    #[test]
    fn test_container_write_read() {
        let data1 = b"occupied voxels ahead".repeat(100);
        let data2 = b"another frame".repeat(50);

        let mut buffer = Vec::new();
        {
            let mut writer = ContainerWriter::new(Cursor::new(&mut buffer));
            writer.write_frame(&data1).unwrap();
            writer.write_frame(&data2).unwrap();
            writer.finish().unwrap();
        }

        let mut reader = ContainerReader::open(Cursor::new(&buffer)).unwrap();
        assert_eq!(reader.frame_count(), 2);
        assert_eq!(reader.next_frame().unwrap().unwrap(), data1);
        assert_eq!(reader.next_frame().unwrap().unwrap(), data2);
        assert!(reader.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let buffer = b"NOTAMAP\0rest of the file".to_vec();
        assert!(matches!(
            ContainerReader::open(Cursor::new(&buffer)),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_corruption_detected() {
        let mut buffer = Vec::new();
        {
            let mut writer = ContainerWriter::new(Cursor::new(&mut buffer));
            writer.write_frame(&b"some payload data".repeat(20)).unwrap();
            writer.finish().unwrap();
        }

        // Flip a byte inside the compressed payload, past the headers
        let last = buffer.len() - 1;
        buffer[last] ^= 0xff;

        let mut reader = ContainerReader::open(Cursor::new(&buffer)).unwrap();
        assert!(matches!(
            reader.next_frame(),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn test_map_snapshot_roundtrip() {
        let mut grid: VoxelGrid<f32> = VoxelGrid::new();
        grid.set_value(Coord::new(3, -2, 8), 1.25, true);
        grid.set_value(Coord::new(0, 0, 0), -0.5, false);

        let mut buffer = Vec::new();
        write_map(Cursor::new(&mut buffer), 0.05, &grid).unwrap();

        let (resolution, back): (f64, VoxelGrid<f32>) =
            read_map(Cursor::new(&buffer)).unwrap();
        assert_eq!(resolution, 0.05);
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(Coord::new(3, -2, 8)), Some((&1.25, true)));
        assert_eq!(back.get(Coord::new(0, 0, 0)), Some((&-0.5, false)));
    }
}
