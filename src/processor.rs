use serde::Deserialize;
use serde_json::Value;

use crate::config::Config;
use crate::document::DocumentReference;
use crate::error::{EmbedError, Result};
use crate::fetch::ByteSource;
use crate::params;
use crate::render::{Canvas, PdfDocument, RegionRenderer};

/// Fenced block languages this crate renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Notability,
    OneNote,
}

impl BlockKind {
    pub fn from_language(lang: &str) -> Option<Self> {
        match lang.trim() {
            "notability" => Some(BlockKind::Notability),
            "onenote" => Some(BlockKind::OneNote),
            _ => None,
        }
    }
}

/// Inline frame for a web-hosted note page.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub url: String,
    pub width: &'static str,
    pub height: &'static str,
    /// Id of the page header element to strip once the frame document is reachable.
    pub header_id: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Canvas(Canvas),
    Frame(Frame),
    /// Replaces the block's visual output. Headings are used for failures
    /// after the document was fetched.
    Error { text: String, heading: bool },
}

/// Everything one block contributes to the rendered note, in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BlockOutput {
    pub elements: Vec<Element>,
}

impl BlockOutput {
    fn span(&mut self, text: impl ToString) {
        self.elements.push(Element::Error {
            text: text.to_string(),
            heading: false,
        });
    }

    fn heading(&mut self, text: impl ToString) {
        self.elements.push(Element::Error {
            text: text.to_string(),
            heading: true,
        });
    }

    pub fn canvases(&self) -> impl Iterator<Item = &Canvas> {
        self.elements.iter().filter_map(|e| match e {
            Element::Canvas(c) => Some(c),
            _ => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|e| match e {
            Element::Error { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IdentityFields {
    id: Option<String>,
    name: Option<String>,
    note_url: Option<String>,
    pdf_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OneNoteFields {
    url: Option<String>,
}

/// Runs fenced blocks. Every failure ends up as an [`Element::Error`]; nothing
/// escapes to the caller.
pub struct BlockProcessor<'a> {
    config: &'a Config,
    source: &'a dyn ByteSource,
}

impl<'a> BlockProcessor<'a> {
    pub fn new(config: &'a Config, source: &'a dyn ByteSource) -> Self {
        Self { config, source }
    }

    pub fn process(&self, kind: BlockKind, text: &str) -> BlockOutput {
        match kind {
            BlockKind::Notability => self.process_notability(text),
            BlockKind::OneNote => self.process_onenote(text),
        }
    }

    pub fn process_notability(&self, text: &str) -> BlockOutput {
        let mut output = BlockOutput::default();

        let mut reference = match parse_reference(text) {
            Ok(reference) => reference,
            Err(e) => {
                log::warn!("Block rejected: {}", e);
                output.span(e);
                return output;
            }
        };

        if self.config.lookup_names && reference.name().is_none() {
            self.lookup_name(&mut reference);
        }

        let bytes = match self.source.fetch(&reference.byte_source_url(self.config)) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("{}", e);
                output.span(e);
                return output;
            }
        };

        let plan = match params::resolve(text, self.config) {
            Ok(plan) => plan,
            Err(e @ EmbedError::Validation { .. }) => {
                output.span(e);
                return output;
            }
            Err(e) => {
                output.heading(format!("PDF Parameters invalid: {}", e));
                return output;
            }
        };

        let doc = match PdfDocument::open(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("{}", e);
                output.heading(e);
                return output;
            }
        };

        let outcome = RegionRenderer::new(self.config).render_pages(&doc, &plan, &reference);
        output
            .elements
            .extend(outcome.canvases.into_iter().map(Element::Canvas));
        if let Some(e) = outcome.error {
            output.heading(e);
        }
        output
    }

    pub fn process_onenote(&self, text: &str) -> BlockOutput {
        let mut output = BlockOutput::default();
        let fields: OneNoteFields = match serde_json::from_str(text.trim()) {
            Ok(fields) => fields,
            Err(e) => {
                output.span(e);
                return output;
            }
        };
        match fields.url.filter(|u| !u.is_empty()) {
            Some(url) => output.elements.push(Element::Frame(Frame {
                url,
                width: "100%",
                height: "100vh",
                header_id: "Header",
            })),
            None => output.span("Enter a valid OneNote URL"),
        }
        output
    }

    fn lookup_name(&self, reference: &mut DocumentReference) {
        match self
            .source
            .fetch_metadata(&reference.metadata_url(self.config))
        {
            Ok(meta) => {
                log::info!("Resolved name {:?} for {}", meta.document_name, reference.id());
                reference.set_name(meta.document_name);
            }
            Err(e) => log::warn!("Name lookup failed for {}: {}", reference.id(), e),
        }
    }
}

/// Identity precedence: `noteUrl`, then `pdfUrl`, then `id`; the last one
/// present wins.
fn parse_reference(text: &str) -> Result<DocumentReference> {
    let value: Value = serde_json::from_str(text.trim())?;
    let fields = IdentityFields::deserialize(&value)?;
    let non_empty = |s: Option<String>| s.filter(|s| !s.is_empty());
    let id = non_empty(fields.id);
    let name = non_empty(fields.name);
    let note_url = non_empty(fields.note_url);
    let pdf_url = non_empty(fields.pdf_url);

    if id.is_none() && note_url.is_none() && pdf_url.is_none() {
        return Err(EmbedError::Config(
            "Enter a valid Notability Document ID".into(),
        ));
    }

    let mut reference = None;
    if let Some(url) = note_url {
        let mut doc = DocumentReference::from_note_url(&url)
            .ok_or_else(|| EmbedError::Reference("Invalid Note URL".into()))?;
        if let Some(name) = &name {
            doc.set_name(name.clone());
        }
        reference = Some(doc);
    }
    if let Some(url) = pdf_url {
        let doc = DocumentReference::from_pdf_url(&url)
            .ok_or_else(|| EmbedError::Reference("Invalid PDF URL".into()))?;
        reference = Some(doc);
    }
    if let Some(id) = id {
        reference = DocumentReference::from_id(id, name);
    }

    reference.ok_or_else(|| {
        EmbedError::Config(
            "Invalid Notability Document: Enter a valid Notability Document ID, a Note URL or a PDF URL"
                .into(),
        )
    })
}
