use anyhow::{anyhow, Result};
use mupdf::{Colorspace, Matrix};

use crate::config::Config;
use crate::document::DocumentReference;
use crate::error::EmbedError;
use crate::params::{self, RenderPlan};

/// Intrinsic page size in points, at scale 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

/// Page-to-pixel transform for one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    /// Normalized to 0, 90, 180 or 270.
    pub rotation: u32,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Size of the whole rotated page at `scale`, in pixels.
    pub width: f64,
    pub height: f64,
}

/// Pixels of a whole page rendered at some viewport, before cropping.
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub channels: usize,
    pub samples: Vec<u8>,
}

impl Raster {
    fn rgb_at(&self, x: u32, y: u32) -> [u8; 3] {
        let i = y as usize * self.stride + x as usize * self.channels;
        match self.channels {
            1 => [self.samples[i]; 3],
            _ => [self.samples[i], self.samples[i + 1], self.samples[i + 2]],
        }
    }
}

/// Rendered output for one page of a block: an RGB pixel buffer plus how the
/// host should present it.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    /// Display at 100% of the container width.
    pub fit: bool,
    pub click_url: String,
    pub pixels: Vec<u8>,
}

pub trait PageHandle {
    fn size(&self) -> Result<PageSize>;
    /// Render the whole page at `scale` and clockwise `rotation`, with the
    /// rotated page's top-left corner at pixel (0, 0).
    fn rasterize(&self, scale: f64, rotation: u32) -> Result<Raster>;
}

pub trait DocumentHandle {
    type Page: PageHandle;

    fn page_count(&self) -> Result<u32>;
    /// 1-based.
    fn page(&self, number: u32) -> Result<Self::Page>;
}

/// A PDF opened through MuPDF.
pub struct PdfDocument {
    doc: mupdf::Document,
}

impl PdfDocument {
    pub fn open(bytes: &[u8]) -> Result<Self, EmbedError> {
        let doc = mupdf::Document::from_bytes(bytes, "application/pdf")
            .map_err(|e| EmbedError::DocumentOpen(e.to_string()))?;
        Ok(Self { doc })
    }
}

impl DocumentHandle for PdfDocument {
    type Page = mupdf::Page;

    fn page_count(&self) -> Result<u32> {
        let count = self.doc.page_count()?;
        Ok(count.max(0) as u32)
    }

    fn page(&self, number: u32) -> Result<mupdf::Page> {
        let count = self.page_count()?;
        if number == 0 || number > count {
            return Err(anyhow!(
                "page {} is out of range, document has {} page(s)",
                number,
                count
            ));
        }
        Ok(self.doc.load_page(number as i32 - 1)?)
    }
}

impl PageHandle for mupdf::Page {
    fn size(&self) -> Result<PageSize> {
        let bounds = self.bounds()?;
        Ok(PageSize {
            width: (bounds.x1 - bounds.x0) as f64,
            height: (bounds.y1 - bounds.y0) as f64,
        })
    }

    fn rasterize(&self, scale: f64, rotation: u32) -> Result<Raster> {
        let (sin, cos) = match rotation {
            90 => (1.0, 0.0),
            180 => (0.0, -1.0),
            270 => (-1.0, 0.0),
            _ => (0.0, 1.0),
        };
        let s = scale as f32;
        // MuPDF places the pixmap at the transformed page bbox, so the rotated
        // page always starts at the pixmap origin.
        let matrix = Matrix::new(s * cos, s * sin, -s * sin, s * cos, 0.0, 0.0);
        let pixmap = self.to_pixmap(&matrix, &Colorspace::device_rgb(), false, true)?;

        let width = pixmap.width();
        let height = pixmap.height();
        let samples = pixmap.samples().to_vec();
        let stride = if height > 0 {
            samples.len() / height as usize
        } else {
            0
        };
        let channels = if width > 0 { stride / width as usize } else { 3 };

        Ok(Raster {
            width,
            height,
            stride,
            channels,
            samples,
        })
    }
}

/// Build the viewport for one page.
///
/// `plan.scale` is relative to the container when a layout width is known:
/// a scale of 1 then makes the page exactly as wide as the container.
pub fn viewport(
    size: PageSize,
    plan: &RenderPlan,
    layout_width: Option<f64>,
) -> Result<Viewport> {
    let rotation = plan.rotation.rem_euclid(360);
    if rotation % 90 != 0 {
        return Err(anyhow!(
            "rotation must be a multiple of 90 degrees, got {}",
            plan.rotation
        ));
    }
    let rotation = rotation as u32;

    let offset_x = (plan.crop_x() * -1.0 * plan.scale).floor();
    let offset_y = (plan.crop_y() * -1.0 * plan.scale).floor();

    let base_scale = match layout_width {
        Some(width) if size.width > 0.0 => width / size.width,
        _ => 1.0,
    };
    let scale = base_scale * plan.scale;

    let (page_w, page_h) = if rotation % 180 == 0 {
        (size.width, size.height)
    } else {
        (size.height, size.width)
    };

    Ok(Viewport {
        scale,
        rotation,
        offset_x,
        offset_y,
        width: page_w * scale,
        height: page_h * scale,
    })
}

/// Pixel size of the canvas. An explicit crop size wins over the viewport,
/// clipping the page to the requested region.
pub fn canvas_size(plan: &RenderPlan, viewport: &Viewport) -> (u32, u32) {
    if plan.has_crop_size() {
        (
            (plan.crop_width() * plan.scale).floor() as u32,
            (plan.crop_height() * plan.scale).floor() as u32,
        )
    } else {
        (viewport.width.floor() as u32, viewport.height.floor() as u32)
    }
}

/// Pages rendered for one block, and the failure that stopped rendering, if any.
#[derive(Debug, Default)]
pub struct RenderOutcome {
    pub canvases: Vec<Canvas>,
    pub error: Option<EmbedError>,
}

pub struct RegionRenderer<'a> {
    config: &'a Config,
}

impl<'a> RegionRenderer<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Render every page of the plan in order. The first failure stops the
    /// loop; canvases rendered before it are kept.
    pub fn render_pages<D: DocumentHandle>(
        &self,
        doc: &D,
        plan: &RenderPlan,
        reference: &DocumentReference,
    ) -> RenderOutcome {
        let mut outcome = RenderOutcome::default();

        let pages = if plan.pages.contains(&params::ALL_PAGES) {
            match doc.page_count() {
                Ok(total) => params::expand_all_pages(&plan.pages, total),
                Err(e) => {
                    outcome.error = Some(EmbedError::DocumentOpen(e.to_string()));
                    return outcome;
                }
            }
        } else {
            plan.pages.clone()
        };

        for page_number in pages {
            let rendered = doc
                .page(page_number)
                .map_err(|e| page_error(page_number, e))
                .and_then(|page| self.render_page(&page, page_number, plan, reference));
            match rendered {
                Ok(canvas) => outcome.canvases.push(canvas),
                Err(e) => {
                    log::warn!("{}", e);
                    outcome.error = Some(e);
                    break;
                }
            }
        }
        outcome
    }

    pub fn render_page<P: PageHandle>(
        &self,
        page: &P,
        page_number: u32,
        plan: &RenderPlan,
        reference: &DocumentReference,
    ) -> Result<Canvas, EmbedError> {
        log::info!("Rendering page {}", page_number);
        let size = page.size().map_err(|e| page_error(page_number, e))?;
        let viewport = viewport(size, plan, self.config.layout_width())
            .map_err(|e| page_error(page_number, e))?;
        let (width, height) = canvas_size(plan, &viewport);
        let limit = self.config.max_canvas_pixels;
        check_pixels("canvas", width, height, limit).map_err(|e| page_error(page_number, e))?;
        check_pixels(
            "page raster",
            viewport.width.ceil() as u32,
            viewport.height.ceil() as u32,
            limit,
        )
        .map_err(|e| page_error(page_number, e))?;

        let raster = page
            .rasterize(viewport.scale, viewport.rotation)
            .map_err(|e| page_error(page_number, e))?;
        let pixels = blit(&raster, &viewport, width, height);

        let click_url = if plan.link {
            reference.pdf_download_url(self.config, Some(page_number))
        } else {
            reference.note_url(self.config)
        };

        Ok(Canvas {
            page: page_number,
            width,
            height,
            fit: plan.fit,
            click_url,
            pixels,
        })
    }
}

/// Refuse buffers larger than `limit` pixels before anything is allocated.
fn check_pixels(what: &str, width: u32, height: u32, limit: u64) -> Result<()> {
    match u64::from(width).checked_mul(u64::from(height)) {
        Some(pixels) if pixels <= limit => Ok(()),
        _ => Err(anyhow!(
            "{} of {}x{} exceeds the limit of {} pixels",
            what,
            width,
            height,
            limit
        )),
    }
}

fn page_error(page: u32, e: anyhow::Error) -> EmbedError {
    EmbedError::PageRender {
        page,
        reason: e.to_string(),
    }
}

/// Copy the raster into a white canvas, shifted by the viewport offsets.
fn blit(raster: &Raster, viewport: &Viewport, width: u32, height: u32) -> Vec<u8> {
    let mut pixels = vec![255u8; width as usize * height as usize * 3];
    let dx = viewport.offset_x as i64;
    let dy = viewport.offset_y as i64;

    for y in 0..height {
        let sy = y as i64 - dy;
        if sy < 0 || sy >= raster.height as i64 {
            continue;
        }
        for x in 0..width {
            let sx = x as i64 - dx;
            if sx < 0 || sx >= raster.width as i64 {
                continue;
            }
            let rgb = raster.rgb_at(sx as u32, sy as u32);
            let i = (y as usize * width as usize + x as usize) * 3;
            pixels[i..i + 3].copy_from_slice(&rgb);
        }
    }
    pixels
}
