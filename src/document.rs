use crate::config::Config;

/// Identity of a hosted Notability note: an opaque id plus, when known, the
/// display name used in download URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentReference {
    id: String,
    name: Option<String>,
}

impl DocumentReference {
    pub fn from_id(id: impl Into<String>, name: Option<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() {
            return None;
        }
        Some(Self {
            id,
            name: name.filter(|n| !n.is_empty()),
        })
    }

    /// Parse `https://notability.com/n/{id}`. The name is never part of a note URL.
    pub fn from_note_url(url: &str) -> Option<Self> {
        let segments: Vec<&str> = url.split('/').collect();
        if segments.len() < 5 {
            return None;
        }
        let id = strip_query(segments[4]);
        Self::from_id(id, None)
    }

    /// Parse `https://notability.com/n/download/pdf/{id}/{name}.pdf`.
    pub fn from_pdf_url(url: &str) -> Option<Self> {
        let segments: Vec<&str> = url.split('/').collect();
        if segments.len() < 5 {
            return None;
        }
        let id_index = segments
            .windows(2)
            .position(|pair| pair[0] == "download" && pair[1] == "pdf")
            .map(|i| i + 2)
            .unwrap_or(4);
        let id = segments.get(id_index)?;
        let name = segments
            .get(id_index + 1)
            .map(|raw| decode_name(strip_query(raw)));
        Self::from_id(*id, name)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Record a name learned out-of-band (block field or metadata lookup).
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !name.is_empty() {
            self.name = Some(name);
        }
    }

    pub fn note_url(&self, config: &Config) -> String {
        format!("{}{}", config.note_base_url, self.id)
    }

    /// Download URL of the rendered PDF, optionally pointing at one page.
    pub fn pdf_download_url(&self, config: &Config, page: Option<u32>) -> String {
        let mut url = format!(
            "{}{}/{}.pdf",
            config.pdf_base_url,
            self.id,
            self.escaped_name()
        );
        if let Some(page) = page {
            url.push_str(&format!("#page={}", page));
        }
        url
    }

    /// Endpoint serving the raw PDF bytes.
    pub fn byte_source_url(&self, config: &Config) -> String {
        format!(
            "{}{}/{}",
            config.fetch_base_url,
            self.id,
            self.escaped_name()
        )
    }

    /// Endpoint serving the JSON metadata document.
    pub fn metadata_url(&self, config: &Config) -> String {
        format!("{}{}", config.fetch_base_url, self.id)
    }

    fn escaped_name(&self) -> String {
        self.name
            .as_deref()
            .map(|n| urlencoding::encode(n).into_owned())
            .unwrap_or_default()
    }
}

fn strip_query(segment: &str) -> &str {
    segment.split(['?', '#']).next().unwrap_or(segment)
}

fn decode_name(raw: &str) -> String {
    let raw = raw.strip_suffix(".pdf").unwrap_or(raw);
    urlencoding::decode(raw)
        .map(|n| n.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}
