use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::FetchError;

/// Blocking HTTP downloader.
///
/// The timeout bounds connecting and each read from the socket, not the
/// whole transfer: a slide that keeps streaming never times out. A non-2xx
/// status is an error (`ureq` reports it as `Error::Status`).
#[derive(Clone)]
pub struct HttpDownloader {
    agent: ureq::Agent,
}

impl HttpDownloader {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
        }
    }

    /// Stream `url` into `dest`, creating parent directories. Returns the
    /// number of bytes written.
    pub fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let response = self.agent.get(url).call()?;
        let mut body = response.into_reader();

        let io_err = |source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        };
        let mut file = BufWriter::new(File::create(dest).map_err(io_err)?);
        let written = io::copy(&mut body, &mut file).map_err(io_err)?;
        file.flush().map_err(io_err)?;
        Ok(written)
    }
}
