//! # Transport
//!
//! Byte transfer from a URL into a writer.
//!
//! The [`Transport`] trait is the only place the pipeline touches the
//! network. The fetcher owns retries and atomicity; a transport performs
//! exactly one attempt and classifies its failure:
//!
//! | failure | error |
//! |---|---|
//! | timeout, connect/reset, 5xx, 429 | [`GraphError::TransientNetwork`] |
//! | any other 4xx | [`GraphError::RemoteNotAvailable`] |
//! | writing into the sink | [`GraphError::Storage`] naming [`DownloadSink::target`] |

use crate::GraphError;
use crate::progress::ProgressSink;
use std::io::Write;
use std::path::Path;

/// A writer that knows the cache file it ends up as.
pub trait DownloadSink: Write {
    /// Final path of the bytes written here.
    fn target(&self) -> &Path;

    /// [`GraphError::Storage`] for a failed write into this sink.
    fn write_error(&self, err: &std::io::Error) -> GraphError {
        GraphError::storage(self.target(), err)
    }
}

/// One-shot download of a URL.
pub trait Transport: Send + Sync {
    /// Stream the body of `url` into `sink`, reporting progress.
    ///
    /// Returns the number of bytes written.
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn DownloadSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, GraphError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn DownloadSink,
        progress: &mut dyn ProgressSink,
    ) -> Result<u64, GraphError> {
        (**self).fetch(url, sink, progress)
    }
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::{DownloadSink, Transport};
    use crate::GraphError;
    use crate::primitives::DOWNLOAD_CHUNK_SIZE;
    use crate::progress::ProgressSink;
    use reqwest::StatusCode;
    use reqwest::blocking::Client;
    use std::io::{Read, Write};
    use std::time::Duration;

    /// Blocking HTTP(S) transport over `reqwest` with rustls.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        /// Build a client whose requests time out after `timeout`.
        pub fn new(timeout: Duration) -> Result<Self, GraphError> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("grafetch/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| GraphError::Config(format!("cannot build HTTP client: {e}")))?;
            Ok(Self { client })
        }

        fn classify_request_error(url: &str, err: &reqwest::Error) -> GraphError {
            if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
                GraphError::TransientNetwork {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            } else {
                GraphError::RemoteNotAvailable {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        }

        fn classify_status(url: &str, status: StatusCode) -> Option<GraphError> {
            if status.is_success() {
                return None;
            }
            let reason = format!("HTTP {status}");
            if status == StatusCode::TOO_MANY_REQUESTS
                || status == StatusCode::REQUEST_TIMEOUT
                || status.is_server_error()
            {
                Some(GraphError::TransientNetwork {
                    url: url.to_string(),
                    reason,
                })
            } else {
                Some(GraphError::RemoteNotAvailable {
                    url: url.to_string(),
                    reason,
                })
            }
        }
    }

    impl Transport for HttpTransport {
        fn fetch(
            &self,
            url: &str,
            sink: &mut dyn DownloadSink,
            progress: &mut dyn ProgressSink,
        ) -> Result<u64, GraphError> {
            let mut response = self
                .client
                .get(url)
                .send()
                .map_err(|e| Self::classify_request_error(url, &e))?;

            if let Some(err) = Self::classify_status(url, response.status()) {
                return Err(err);
            }

            // Progress failures never abort a download.
            let _ = progress.start(url, response.content_length());

            let mut buffer = vec![0u8; DOWNLOAD_CHUNK_SIZE];
            let mut written: u64 = 0;
            loop {
                let n = match response.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _ = progress.finish();
                        return Err(GraphError::TransientNetwork {
                            url: url.to_string(),
                            reason: format!("body read failed after {written} bytes: {e}"),
                        });
                    }
                };
                if let Err(e) = sink.write_all(&buffer[..n]) {
                    let _ = progress.finish();
                    return Err(sink.write_error(&e));
                }
                written = written.saturating_add(n as u64);
                let _ = progress.advance(n as u64);
            }

            sink.flush().map_err(|e| sink.write_error(&e))?;
            let _ = progress.finish();
            Ok(written)
        }
    }

}
