//! Markdown host: finds embed blocks in a note, runs them, and writes the
//! note out as HTML with each block replaced by its rendered output.

use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use pulldown_cmark::{html, CodeBlockKind, Event, Parser, Tag, TagEnd};

use crate::processor::{BlockKind, BlockOutput, BlockProcessor, Element};
use crate::render::Canvas;

#[derive(Debug, Clone, PartialEq)]
pub struct FencedBlock {
    pub kind: BlockKind,
    pub source: String,
}

fn block_kind(info: &str) -> Option<BlockKind> {
    info.split_whitespace()
        .next()
        .and_then(BlockKind::from_language)
}

/// Fenced `notability` and `onenote` blocks, in document order.
pub fn scan_blocks(markdown: &str) -> Vec<FencedBlock> {
    let mut blocks = Vec::new();
    let mut current: Option<FencedBlock> = None;

    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                current = block_kind(&info).map(|kind| FencedBlock {
                    kind,
                    source: String::new(),
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks
}

/// Run every block, one worker thread per block. Outputs keep block order.
pub fn process_blocks(processor: &BlockProcessor<'_>, blocks: &[FencedBlock]) -> Vec<BlockOutput> {
    thread::scope(|s| {
        let handles: Vec<_> = blocks
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let spawned = thread::Builder::new()
                    .name(format!("block-{}", i + 1))
                    .spawn_scoped(s, move || processor.process(block.kind, &block.source));
                (block, spawned)
            })
            .collect();

        handles
            .into_iter()
            .map(|(block, spawned)| match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    log::error!("Block worker panicked");
                    BlockOutput {
                        elements: vec![Element::Error {
                            text: "Rendering failed".into(),
                            heading: true,
                        }],
                    }
                }),
                Err(e) => {
                    log::warn!("Failed to spawn block worker: {}, rendering inline", e);
                    processor.process(block.kind, &block.source)
                }
            })
            .collect()
    })
}

/// Render a note to an HTML fragment. Canvas images are written into
/// `out_dir` as `{stem}-b{block}-{n}-p{page}.png`.
pub fn render_note(
    markdown: &str,
    processor: &BlockProcessor<'_>,
    out_dir: &Path,
    stem: &str,
) -> Result<String> {
    let blocks = scan_blocks(markdown);
    log::info!("Found {} embed block(s)", blocks.len());
    let outputs = process_blocks(processor, &blocks);

    let mut fragments = Vec::with_capacity(outputs.len());
    for (i, output) in outputs.iter().enumerate() {
        fragments.push(block_html(output, out_dir, &format!("{}-b{}", stem, i + 1))?);
    }
    let mut fragments = fragments.into_iter();

    let mut events = Vec::new();
    let mut in_block = false;
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                if block_kind(info).is_some() =>
            {
                in_block = true;
                if let Some(fragment) = fragments.next() {
                    events.push(Event::Html(fragment.into()));
                }
            }
            Event::End(TagEnd::CodeBlock) if in_block => in_block = false,
            _ if in_block => {}
            other => events.push(other),
        }
    }

    let mut body = String::new();
    html::push_html(&mut body, events.into_iter());
    Ok(body)
}

/// Wrap a rendered body into a standalone page.
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        body
    )
}

fn block_html(output: &BlockOutput, out_dir: &Path, prefix: &str) -> Result<String> {
    let mut html = String::from("<div class=\"notability-embed\">\n");
    for (n, element) in output.elements.iter().enumerate() {
        match element {
            Element::Canvas(canvas) => {
                let file = format!("{}-{}-p{}.png", prefix, n + 1, canvas.page);
                html.push_str(&canvas_html(canvas, out_dir, &file)?);
            }
            Element::Frame(frame) => {
                html.push_str(&format!(
                    "<div onclick=\"window.open(this.dataset.url)\" data-url=\"{url}\"><iframe src=\"{url}\" style=\"width:{};height:{}\" data-strip-header=\"{}\"></iframe></div>\n",
                    frame.width,
                    frame.height,
                    frame.header_id,
                    url = escape(&frame.url),
                ));
            }
            Element::Error { text, heading } => {
                let tag = if *heading { "h2" } else { "span" };
                html.push_str(&format!("<{tag}>{}</{tag}>\n", escape(text), tag = tag));
            }
        }
    }
    html.push_str("</div>\n");
    Ok(html)
}

fn canvas_html(canvas: &Canvas, out_dir: &Path, file: &str) -> Result<String> {
    let style = if canvas.fit {
        " style=\"width:100%;height:auto\""
    } else {
        ""
    };
    let inner = if canvas.width == 0 || canvas.height == 0 {
        format!("<canvas width=\"{}\" height=\"{}\"></canvas>", canvas.width, canvas.height)
    } else {
        write_png(canvas, &out_dir.join(file))?;
        format!(
            "<img src=\"{}\" width=\"{}\" height=\"{}\"{}>",
            escape(file),
            canvas.width,
            canvas.height,
            style
        )
    };
    Ok(format!(
        "<a href=\"{}\" target=\"_blank\">{}</a>\n",
        escape(&canvas.click_url),
        inner
    ))
}

fn write_png(canvas: &Canvas, path: &Path) -> Result<()> {
    let image = image::RgbImage::from_raw(canvas.width, canvas.height, canvas.pixels.clone())
        .context("canvas buffer does not match its size")?;
    image
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
