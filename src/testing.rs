//! Fixtures shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{EmbedError, Result};
use crate::fetch::ByteSource;

/// Build a valid PDF with `count` blank pages of the given size in points.
pub fn pdf_with_pages(count: usize, width: f64, height: f64) -> Vec<u8> {
    pdf_with_content(count, width, height, "")
}

/// Like [`pdf_with_pages`], but every page draws the same content stream.
/// An empty stream leaves the pages blank.
pub fn pdf_with_content(count: usize, width: f64, height: f64, content: &str) -> Vec<u8> {
    let first_page = if content.is_empty() { 3 } else { 4 };
    let kids: Vec<String> = (0..count)
        .map(|i| format!("{} 0 R", i + first_page))
        .collect();
    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), count),
    ];
    let contents = if content.is_empty() {
        String::new()
    } else {
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ));
        " /Contents 3 0 R".to_string()
    };
    for _ in 0..count {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {} {}]{} >>",
            width, height, contents
        ));
    }

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, obj) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, obj));
    }
    let xref = out.len();
    out.push_str(&format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1));
    for offset in offsets {
        out.push_str(&format!("{:010} 00000 n \n", offset));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref
    ));
    out.into_bytes()
}

/// A 200x300 pt page with a 40 pt red square whose top-left corner sits at
/// (20, 20) in top-down page coordinates.
pub fn pdf_with_red_square() -> Vec<u8> {
    pdf_with_content(1, 200.0, 300.0, "1 0 0 rg 20 240 40 40 re f")
}

/// In-memory byte source keyed by URL. Records every request.
#[derive(Default)]
pub struct FakeSource {
    responses: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn with(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.responses.insert(url.to_string(), bytes);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl ByteSource for FakeSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| EmbedError::Fetch {
                url: url.to_string(),
                reason: "http status: 404".into(),
            })
    }
}
