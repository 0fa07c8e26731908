// WarpSpeed Engine - file_manager.rs

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

/// Name of the file a download writes into until it is finalized.
pub fn part_path(local_file: &Path) -> PathBuf {
    let mut name = local_file.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Exclusive handle on a download's partial file. Fetch workers write disjoint
/// ranges through it, one chunk at a time.
#[derive(Debug)]
pub struct FileManager {
    path: PathBuf,
    file: File,
}

impl FileManager {
    /// Opens (or creates) the partial file without truncating data from a
    /// previous run, and sizes it to `total_size`.
    pub async fn open(path: &Path, total_size: u64) -> Result<Self, std::io::Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .open(path)
            .await?;
        if file.metadata().await?.len() != total_size {
            file.set_len(total_size).await?;
        }

        Ok(FileManager {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns once the bytes are in the file. tokio hands writes to a
    /// blocking task, so the flush is what surfaces this chunk's error.
    pub async fn write_chunk(&mut self, offset: u64, data: &[u8]) -> Result<(), std::io::Error> {
        self.file.seek(SeekFrom::Start(offset)).await?;
        self.file.write_all(data).await?;
        self.file.flush().await
    }

    /// Flushes everything to disk and moves the partial file to `destination`.
    pub async fn finalize(mut self, destination: &Path) -> Result<(), std::io::Error> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);
        fs::rename(&self.path, destination).await
    }
}

/// Deletes a partial file; a file that is already gone is not an error.
pub async fn discard(path: &Path) -> Result<(), std::io::Error> {
    match fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}
