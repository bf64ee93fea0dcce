/// Leading bytes of a ZIP local file header.
pub const ZIP_LOCAL_FILE_HEADER_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Multi-file archive, either a full or a diff update.
    Container,
    /// A single bundle file shipped as-is.
    RawBundle,
}

impl PayloadKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::RawBundle => "raw-bundle",
        }
    }

    pub fn is_container(self) -> bool {
        matches!(self, Self::Container)
    }
}

/// Collects the first bytes of a stream so the payload can be classified
/// without buffering the whole download.
#[derive(Debug, Clone, Default)]
pub struct HeaderSniffer {
    header: [u8; 4],
    filled: usize,
}

impl HeaderSniffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies bytes from `chunk` until four header bytes have been seen.
    /// Later calls are no-ops.
    pub fn feed(&mut self, chunk: &[u8]) {
        let wanted = self.header.len() - self.filled;
        let take = wanted.min(chunk.len());
        self.header[self.filled..self.filled + take].copy_from_slice(&chunk[..take]);
        self.filled += take;
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.header.len()
    }

    pub fn header(&self) -> &[u8] {
        &self.header[..self.filled]
    }

    /// Payloads shorter than the magic are never containers.
    pub fn kind(&self) -> PayloadKind {
        if self.is_complete() && self.header == ZIP_LOCAL_FILE_HEADER_MAGIC {
            PayloadKind::Container
        } else {
            PayloadKind::RawBundle
        }
    }
}
