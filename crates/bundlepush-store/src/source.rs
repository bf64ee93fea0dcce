use std::fs::File;
use std::io::Read;

use reqwest::Url;

use crate::error::{Result, StorageContext, UpdateError};

/// An open payload stream.
pub struct Transfer {
    /// Declared length, when the transport reports one.
    pub total_bytes: Option<u64>,
    pub reader: Box<dyn Read + Send>,
}

/// Transport collaborator consumed by the downloader.
///
/// Timeouts and retries belong to the implementation; the store treats any
/// failure as terminal for the current cycle.
pub trait PackageSource: Sync {
    fn open(&self, url: &Url) -> Result<Transfer>;
}

pub fn parse_download_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|err| UpdateError::MalformedInput(format!("invalid download url '{raw}': {err}")))
}

/// `http`/`https` over a blocking reqwest client, `file` from local disk.
#[derive(Debug, Default)]
pub struct DefaultPackageSource {
    client: reqwest::blocking::Client,
}

impl DefaultPackageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    fn open_http(&self, url: &Url) -> Result<Transfer> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|err| UpdateError::Transfer(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdateError::Transfer(format!(
                "request to {url} returned HTTP {status}"
            )));
        }

        Ok(Transfer {
            total_bytes: response.content_length(),
            reader: Box::new(response),
        })
    }

    fn open_file(&self, url: &Url) -> Result<Transfer> {
        let path = url
            .to_file_path()
            .map_err(|()| UpdateError::MalformedInput(format!("invalid file url '{url}'")))?;
        let file = File::open(&path)
            .storage_context(|| format!("failed to open {}", path.display()))?;
        let total_bytes = file
            .metadata()
            .storage_context(|| format!("failed to stat {}", path.display()))?
            .len();
        Ok(Transfer {
            total_bytes: Some(total_bytes),
            reader: Box::new(file),
        })
    }
}

impl PackageSource for DefaultPackageSource {
    fn open(&self, url: &Url) -> Result<Transfer> {
        match url.scheme() {
            "http" | "https" => self.open_http(url),
            "file" => self.open_file(url),
            other => Err(UpdateError::MalformedInput(format!(
                "unsupported download url scheme '{other}' in {url}"
            ))),
        }
    }
}
