//! The memory-mapped frame file shared with external readers.
//!
//! Writers and readers agree only on the path and the frame dimensions. The
//! file is rewritten in place once per frame with no locking, so a reader may
//! observe a frame in progress.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use memmap2::{Mmap, MmapMut, MmapOptions};
use renderer::frame_len;

/// Allocation granularity of the backing file.
pub const BLOCK_SIZE: usize = 4096;

/// Producer side: owns the file and a shared read/write mapping.
pub struct FrameBuffer {
    map: MmapMut,
    file: File,
    path: PathBuf,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    /// Size of the backing file: the frame rounded up to whole blocks.
    pub fn mapped_len(width: u32, height: u32) -> usize {
        frame_len(width, height).div_ceil(BLOCK_SIZE) * BLOCK_SIZE
    }

    /// Opens (creating with mode 0700 if needed) and truncates `path`,
    /// zero-fills it block by block, then maps it shared.
    pub fn create(path: &Path, width: u32, height: u32) -> Result<Self> {
        let len = Self::mapped_len(width, height);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o700)
            .open(path)
            .with_context(|| format!("failed to open frame buffer {}", path.display()))?;

        let zeros = [0u8; BLOCK_SIZE];
        let mut writer = &file;
        for _ in 0..len / BLOCK_SIZE {
            writer
                .write_all(&zeros)
                .with_context(|| format!("failed to zero-fill {}", path.display()))?;
        }
        writer.flush()?;

        // SAFETY: the mapping covers exactly the bytes written above. Other
        // processes may map the same file; they only ever read it.
        let map = unsafe { MmapOptions::new().len(len).map_mut(&file) }
            .with_context(|| format!("failed to map frame buffer {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            width,
            height,
            bytes = len,
            "frame buffer mapped"
        );

        Ok(Self {
            map,
            file,
            path: path.to_path_buf(),
            width,
            height,
        })
    }

    /// The frame itself, without the block padding at the end.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let len = frame_len(self.width, self.height);
        &mut self.map[..len]
    }

    #[cfg(test)]
    pub fn pixels(&self) -> &[u8] {
        &self.map[..frame_len(self.width, self.height)]
    }

    pub fn mapped_bytes(&self) -> usize {
        self.map.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and unmaps, then closes the descriptor.
    pub fn close(self) -> Result<()> {
        let FrameBuffer { map, file, path, .. } = self;
        let flushed = map.flush();
        drop(map);
        drop(file);
        flushed.with_context(|| format!("failed to flush frame buffer {}", path.display()))?;
        tracing::debug!(path = %path.display(), "frame buffer unmapped");
        Ok(())
    }
}

/// Reader side: a read-only mapping of a frame file somebody else writes.
pub struct MappedFrame {
    map: Mmap,
    width: u32,
    height: u32,
}

impl MappedFrame {
    pub fn open(path: &Path, width: u32, height: u32) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open frame buffer {}", path.display()))?;
        let available = file
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();
        let needed = frame_len(width, height);
        if available < needed as u64 {
            bail!(
                "{} holds {available} bytes but a {width}x{height} frame needs {needed}",
                path.display()
            );
        }

        // SAFETY: read-only mapping of a file at least `needed` bytes long;
        // concurrent writes by the producer only make the contents torn.
        let map = unsafe { MmapOptions::new().len(needed).map(&file) }
            .with_context(|| format!("failed to map {}", path.display()))?;

        Ok(Self { map, width, height })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.map[..]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
