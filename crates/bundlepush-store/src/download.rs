use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

use bundlepush_core::{HeaderSniffer, PayloadKind};
use reqwest::Url;
use tracing::{debug, info};

use crate::error::{Result, StorageContext, UpdateError};
use crate::source::PackageSource;

pub const DOWNLOAD_BUFFER_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    /// `None` when the transport did not declare a length.
    pub total_bytes: Option<u64>,
    pub received_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPayload {
    pub path: PathBuf,
    pub kind: PayloadKind,
    pub received_bytes: u64,
}

/// Copies `reader` into `writer` chunk by chunk, reporting progress after
/// every write and classifying the payload from its first bytes.
pub fn stream_to_writer<R, W, P>(
    reader: &mut R,
    total_bytes: Option<u64>,
    writer: &mut W,
    progress: &mut P,
) -> Result<(PayloadKind, u64)>
where
    R: Read + ?Sized,
    W: Write,
    P: FnMut(DownloadProgress),
{
    let mut sniffer = HeaderSniffer::new();
    let mut buffer = vec![0_u8; DOWNLOAD_BUFFER_SIZE];
    let mut received_bytes = 0_u64;

    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                return Err(UpdateError::Transfer(format!(
                    "stream failed after {received_bytes} bytes: {err}"
                )));
            }
        };

        let chunk = &buffer[..read];
        if !sniffer.is_complete() {
            sniffer.feed(chunk);
        }
        writer
            .write_all(chunk)
            .storage_context(|| "failed to write download staging file")?;
        received_bytes += read as u64;
        progress(DownloadProgress {
            total_bytes,
            received_bytes,
        });
    }

    if let Some(expected) = total_bytes {
        if expected != received_bytes {
            return Err(UpdateError::TruncatedTransfer {
                expected,
                received: received_bytes,
            });
        }
    }

    Ok((sniffer.kind(), received_bytes))
}

/// Streams `url` into `staging_path` on a worker thread and blocks until it
/// finishes. `progress` runs on the worker thread.
pub fn download_to_staging<P>(
    source: &dyn PackageSource,
    url: &Url,
    staging_path: &Path,
    progress: P,
) -> Result<DownloadedPayload>
where
    P: FnMut(DownloadProgress) + Send,
{
    if let Some(parent) = staging_path.parent() {
        fs::create_dir_all(parent)
            .storage_context(|| format!("failed to create {}", parent.display()))?;
    }

    info!(%url, "downloading package");
    let worker_result = thread::scope(|scope| {
        scope
            .spawn(move || transfer(source, url, staging_path, progress))
            .join()
    });

    let (kind, received_bytes) = worker_result
        .map_err(|_| UpdateError::Transfer("download worker panicked".to_string()))??;
    debug!(
        received_bytes,
        kind = kind.as_str(),
        path = %staging_path.display(),
        "download finished"
    );

    Ok(DownloadedPayload {
        path: staging_path.to_path_buf(),
        kind,
        received_bytes,
    })
}

fn transfer<P>(
    source: &dyn PackageSource,
    url: &Url,
    staging_path: &Path,
    mut progress: P,
) -> Result<(PayloadKind, u64)>
where
    P: FnMut(DownloadProgress),
{
    let mut stream = source.open(url)?;
    match stream.total_bytes {
        Some(total) => debug!(total, "transfer length declared"),
        None => debug!("transfer length unknown"),
    }

    let file = File::create(staging_path)
        .storage_context(|| format!("failed to create {}", staging_path.display()))?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFFER_SIZE, file);
    let outcome = stream_to_writer(
        stream.reader.as_mut(),
        stream.total_bytes,
        &mut writer,
        &mut progress,
    )?;
    writer
        .flush()
        .storage_context(|| format!("failed to flush {}", staging_path.display()))?;
    Ok(outcome)
}
