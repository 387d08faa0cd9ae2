use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;
use crate::error::{EmbedError, Result};

/// Where document bytes come from.
pub trait ByteSource: Sync {
    /// Single GET for a binary body. No retries.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;

    /// GET the JSON metadata document for a note.
    fn fetch_metadata(&self, url: &str) -> Result<DocumentMetadata> {
        let bytes = self.fetch(url)?;
        let envelope: MetadataEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| fetch_error(url, e))?;
        Ok(envelope.document)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub document_id: String,
    pub document_name: String,
    #[serde(default)]
    pub pdf_download_url: Option<String>,
    #[serde(default)]
    pub document_url: Option<String>,
}

#[derive(Deserialize)]
struct MetadataEnvelope {
    document: DocumentMetadata,
}

pub struct HttpByteSource {
    timeout: Duration,
    user_agent: String,
    max_size: u64,
}

impl HttpByteSource {
    pub fn new(config: &Config) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            user_agent: config.user_agent.clone(),
            max_size: config.max_document_bytes,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl ByteSource for HttpByteSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::info!("Fetching {}", url);
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        let agent: ureq::Agent = config.into();

        let mut response = agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| fetch_error(url, e))?;

        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_size)
            .read_to_vec()
            .map_err(|e| fetch_error(url, e))?;

        if bytes.is_empty() {
            return Err(fetch_error(url, "empty response body"));
        }
        log::info!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }
}

fn fetch_error(url: &str, reason: impl std::fmt::Display) -> EmbedError {
    EmbedError::Fetch {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
