use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

/// A file received from a client and parked on disk until validation
/// decides its fate. Dropping it removes the file.
#[derive(Debug)]
pub struct ReceivedFile {
    temp: NamedTempFile,
    original_name: String,
    declared_mime: Option<String>,
    size: u64,
    truncated: bool,
}

fn new_temp_file(dir: &Path) -> std::io::Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".upload-")
        .suffix(".part")
        .tempfile_in(dir)
}

impl ReceivedFile {
    /// Stores an in-memory payload so it can go through the same pipeline
    /// as a streamed one.
    pub fn from_bytes(
        dir: &Path,
        original_name: &str,
        declared_mime: Option<&str>,
        bytes: &[u8],
    ) -> std::io::Result<Self> {
        let mut temp = new_temp_file(dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;

        Ok(Self {
            temp,
            original_name: original_name.to_string(),
            declared_mime: declared_mime.map(|m| m.to_string()),
            size: bytes.len() as u64,
            truncated: false,
        })
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    /// Bytes actually written to disk
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True when the stream was cut off by the request body limit, so the
    /// real upload is larger than `size()`.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Best-effort removal; failures are logged and swallowed.
    pub(crate) fn discard(self) {
        let path = self.temp.path().to_path_buf();
        if let Err(e) = self.temp.close() {
            tracing::warn!("Failed to remove temp file {}: {}", path.display(), e);
        }
    }

    /// Renames the temp file to `file_name` in the same directory.
    pub(crate) fn persist_as(self, file_name: &str) -> std::io::Result<PathBuf> {
        let dir = self
            .temp
            .path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let target = dir.join(file_name);

        // On failure the temp handle inside the error is dropped, which deletes it
        self.temp.persist_noclobber(&target).map_err(|e| e.error)?;
        Ok(target)
    }
}

/// Streams one multipart field to a uniquely named temp file.
pub struct FileReceiver {
    file: ReceivedFile,
    writer: tokio::fs::File,
}

impl FileReceiver {
    pub fn create(
        dir: &Path,
        original_name: &str,
        declared_mime: Option<&str>,
    ) -> std::io::Result<Self> {
        let temp = new_temp_file(dir)?;
        let writer = tokio::fs::File::from_std(temp.as_file().try_clone()?);

        Ok(Self {
            file: ReceivedFile {
                temp,
                original_name: original_name.to_string(),
                declared_mime: declared_mime.map(|m| m.to_string()),
                size: 0,
                truncated: false,
            },
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(chunk).await?;
        self.file.size += chunk.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> std::io::Result<ReceivedFile> {
        self.writer.flush().await?;
        Ok(self.file)
    }

    /// Keeps what arrived before the body limit cut the stream off.
    pub async fn finish_truncated(mut self) -> std::io::Result<ReceivedFile> {
        self.file.truncated = true;
        self.finish().await
    }
}
