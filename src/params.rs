//! Normalizes the JSON body of a `notability` block into a [`RenderPlan`].
//!
//! Block authors can leave almost everything out, give pages as a scalar, a
//! list, a list mixing scalars and `[start, end]` pairs, or a top-level
//! `range`, and crop either with a point rectangle or an anchor-grid triple.
//! Resolution fills in every default so the renderer never sees a missing field.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::Config;
use crate::error::{EmbedError, Result};
use crate::grid::AnchorRect;

pub const MIN_SCALE: f64 = 0.1;
pub const MAX_SCALE: f64 = 10.0;

/// Page value meaning "every page of the document".
pub const ALL_PAGES: u32 = 0;

/// Fully resolved rendering parameters for one block.
///
/// Serializes back into the block dialect (`page`, `scale`, ...), so a plan
/// written out and resolved again yields the same plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderPlan {
    /// Pages in render order. May repeat and may contain [`ALL_PAGES`].
    #[serde(rename = "page")]
    pub pages: Vec<u32>,
    pub scale: f64,
    /// Clockwise, in degrees.
    pub rotation: i32,
    /// Stretch canvases to the full container width.
    pub fit: bool,
    /// Clicking a canvas opens the PDF download rather than the note page.
    pub link: bool,
    /// `[x, y, width, height]` in page points. A width below 1 means the whole page.
    pub rect: [f64; 4],
}

impl RenderPlan {
    pub fn crop_x(&self) -> f64 {
        self.rect[0]
    }

    pub fn crop_y(&self) -> f64 {
        self.rect[1]
    }

    pub fn crop_width(&self) -> f64 {
        self.rect[2]
    }

    pub fn crop_height(&self) -> f64 {
        self.rect[3]
    }

    /// True when the rect asks for an explicit crop size.
    pub fn has_crop_size(&self) -> bool {
        self.crop_width() >= 1.0
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawParams {
    range: Option<[Whole; 2]>,
    page: Option<PageField>,
    scale: Option<f64>,
    fit: Option<bool>,
    rotation: Option<Whole>,
    rect: Option<[f64; 4]>,
    link: Option<bool>,
    #[serde(rename = "pRect")]
    p_rect: Option<[Whole; 3]>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageField {
    Single(Whole),
    List(Vec<PageEntry>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum PageEntry {
    Page(Whole),
    Range([Whole; 2]),
}

/// A JSON number with no fractional part; `2` and `2.0` both qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Whole(i64);

impl<'de> Deserialize<'de> for Whole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if value.fract() != 0.0 || value.abs() > i32::MAX as f64 {
            return Err(D::Error::custom(format!(
                "expected a whole number, got {}",
                value
            )));
        }
        Ok(Whole(value as i64))
    }
}

impl Whole {
    fn page(self) -> Result<u32> {
        u32::try_from(self.0)
            .map_err(|_| EmbedError::Config(format!("invalid page number {}", self.0)))
    }
}

/// Parse and resolve the raw text of a block.
pub fn resolve(source: &str, config: &Config) -> Result<RenderPlan> {
    let value: Value = serde_json::from_str(source.trim())?;
    resolve_value(&value, config)
}

pub fn resolve_value(value: &Value, config: &Config) -> Result<RenderPlan> {
    if !value.is_object() {
        return Err(EmbedError::Config("expected a JSON object".into()));
    }
    let raw = RawParams::deserialize(value)?;

    let link = raw.link.unwrap_or(true);

    let entries = match (raw.range, raw.page) {
        (Some(range), _) => vec![PageEntry::Range(range)],
        (None, Some(PageField::Single(page))) => vec![PageEntry::Page(page)],
        (None, Some(PageField::List(entries))) => entries,
        (None, None) => vec![PageEntry::Page(Whole(1))],
    };
    let pages = expand_ranges(&entries, config.max_plan_pages)?;

    let scale = match raw.scale {
        Some(scale) if (MIN_SCALE..=MAX_SCALE).contains(&scale) => scale,
        _ => config.default_scale,
    };

    let fit = raw.fit.unwrap_or(true);
    // |rotation| is bounded by i32::MAX in `Whole`.
    let rotation = raw.rotation.map_or(0, |r| r.0 as i32);
    let mut rect = raw.rect.unwrap_or([0.0; 4]);

    if let Some([anchor, width, height]) = raw.p_rect {
        rect = AnchorRect::new(anchor.0, width.0, height.0)?.to_rect();
    }

    Ok(RenderPlan {
        pages,
        scale,
        rotation,
        fit,
        link,
        rect,
    })
}

/// Single left-to-right pass; each `[start, end]` becomes `start..=end` inline.
/// Fails once the expanded list would exceed `limit` entries.
fn expand_ranges(entries: &[PageEntry], limit: usize) -> Result<Vec<u32>> {
    let too_many = || {
        EmbedError::Config(format!("too many pages, at most {} may be listed", limit))
    };
    let mut pages = Vec::with_capacity(entries.len().min(limit));
    for entry in entries {
        match *entry {
            PageEntry::Page(page) => {
                if pages.len() >= limit {
                    return Err(too_many());
                }
                pages.push(page.page()?);
            }
            PageEntry::Range([start, end]) => {
                let (start, end) = (start.page()?, end.page()?);
                let span = if end < start {
                    0
                } else {
                    (end - start) as usize + 1
                };
                if span > limit - pages.len() {
                    return Err(too_many());
                }
                pages.extend(start..=end);
            }
        }
    }
    Ok(pages)
}

/// Replace every [`ALL_PAGES`] entry with `1..=total`, keeping the other
/// entries where they are. Only possible once the document is open.
pub fn expand_all_pages(pages: &[u32], total: u32) -> Vec<u32> {
    if !pages.contains(&ALL_PAGES) {
        return pages.to_vec();
    }
    let mut expanded = Vec::with_capacity(pages.len() + total as usize);
    for &page in pages {
        if page == ALL_PAGES {
            expanded.extend(1..=total);
        } else {
            expanded.push(page);
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridField;

    fn plan(source: &str) -> RenderPlan {
        resolve(source, &Config::default()).unwrap()
    }

    #[test]
    fn test_defaults() {
        let plan = plan(r#"{"id": "ABC"}"#);
        assert_eq!(plan.pages, vec![1]);
        assert_eq!(plan.scale, 5.0);
        assert_eq!(plan.rotation, 0);
        assert!(plan.fit);
        assert!(plan.link);
        assert_eq!(plan.rect, [0.0; 4]);
        assert!(!plan.has_crop_size());
    }

    #[test]
    fn test_range_expands_inclusive() {
        assert_eq!(plan(r#"{"range": [2, 5]}"#).pages, vec![2, 3, 4, 5]);
        assert_eq!(plan(r#"{"range": [4, 4]}"#).pages, vec![4]);
    }

    #[test]
    fn test_reversed_range_is_empty() {
        assert!(plan(r#"{"range": [5, 2]}"#).pages.is_empty());
    }

    #[test]
    fn test_range_overrides_page() {
        assert_eq!(plan(r#"{"page": [9, 10], "range": [1, 2]}"#).pages, vec![1, 2]);
    }

    #[test]
    fn test_scalar_page_is_wrapped() {
        assert_eq!(plan(r#"{"page": 7}"#).pages, vec![7]);
    }

    #[test]
    fn test_mixed_page_list_expands_in_place() {
        assert_eq!(plan(r#"{"page": [2, [4, 6], 8]}"#).pages, vec![2, 4, 5, 6, 8]);
        assert_eq!(plan(r#"{"page": [3, [5, 7], 9]}"#).pages, vec![3, 5, 6, 7, 9]);
        assert_eq!(
            plan(r#"{"page": [[1, 2], 2, [6, 5], [3, 3]]}"#).pages,
            vec![1, 2, 2, 3]
        );
    }

    #[test]
    fn test_page_order_and_duplicates_kept() {
        assert_eq!(plan(r#"{"page": [3, 1, 3]}"#).pages, vec![3, 1, 3]);
    }

    #[test]
    fn test_scale_in_range_passes_through() {
        for scale in [0.1, 1.0, 2.5, 10.0] {
            let source = format!(r#"{{"scale": {}}}"#, scale);
            assert_eq!(plan(&source).scale, scale);
        }
    }

    #[test]
    fn test_scale_out_of_range_uses_default() {
        for scale in ["0.09", "10.5", "-1", "0"] {
            let source = format!(r#"{{"scale": {}}}"#, scale);
            assert_eq!(plan(&source).scale, 5.0);
        }
        let config = Config {
            default_scale: 1.0,
            ..Config::default()
        };
        assert_eq!(resolve(r#"{"scale": 50}"#, &config).unwrap().scale, 1.0);
    }

    #[test]
    fn test_explicit_fields_kept() {
        let plan = plan(r#"{"fit": false, "link": false, "rotation": 90, "rect": [10, 20, 300, 400]}"#);
        assert!(!plan.fit);
        assert!(!plan.link);
        assert_eq!(plan.rotation, 90);
        assert_eq!(plan.rect, [10.0, 20.0, 300.0, 400.0]);
        assert!(plan.has_crop_size());
    }

    #[test]
    fn test_anchor_grid_overrides_rect() {
        let plan = plan(r#"{"rect": [1, 2, 3, 4], "pRect": [1, 1, 1]}"#);
        assert_eq!(plan.rect, [62.5, 83.5, 0.0, 0.0]);

        let plan = self::plan(r#"{"pRect": [2, 3, 4]}"#);
        assert_eq!(plan.rect, [62.5, 128.0, 89.0, 133.5]);
    }

    #[test]
    fn test_anchor_grid_validation() {
        let cases = [
            (r#"{"pRect": [0, 1, 1]}"#, GridField::Anchor),
            (r#"{"pRect": [21, 1, 1]}"#, GridField::Anchor),
            (r#"{"pRect": [1, 0, 1]}"#, GridField::Width),
            (r#"{"pRect": [1, 1, 21]}"#, GridField::Height),
        ];
        for (source, expected) in cases {
            match resolve(source, &Config::default()) {
                Err(EmbedError::Validation { field }) => assert_eq!(field, expected),
                other => panic!("{}: expected validation failure, got {:?}", source, other),
            }
        }
    }

    #[test]
    fn test_shape_errors() {
        for source in [
            "",
            "{not json",
            "[1, 2]",
            r#"{"range": [1]}"#,
            r#"{"range": [1, 2, 3]}"#,
            r#"{"range": "1-3"}"#,
            r#"{"page": "2"}"#,
            r#"{"page": [1, [2]]}"#,
            r#"{"page": [1, [2, [3, 4]]]}"#,
            r#"{"rect": [1, 2]}"#,
            r#"{"fit": "yes"}"#,
            r#"{"pRect": [1, 1]}"#,
        ] {
            assert!(
                matches!(resolve(source, &Config::default()), Err(EmbedError::Config(_))),
                "expected config error for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_integral_floats_accepted() {
        let plan = plan(r#"{"page": [2.0, [4.0, 5]], "rotation": 90.0, "pRect": [1.0, 2, 1]}"#);
        assert_eq!(plan.pages, vec![2, 4, 5]);
        assert_eq!(plan.rotation, 90);
        assert_eq!(plan.rect, [62.5, 83.5, 44.5, 0.0]);
        assert_eq!(self::plan(r#"{"range": [1.0, 3.0]}"#).pages, vec![1, 2, 3]);
        assert_eq!(self::plan(r#"{"page": 4.0}"#).pages, vec![4]);
    }

    #[test]
    fn test_fractional_and_negative_pages_rejected() {
        for source in [
            r#"{"page": 2.5}"#,
            r#"{"page": -1}"#,
            r#"{"range": [-2, 3]}"#,
            r#"{"rotation": 45.5}"#,
            r#"{"page": 1e12}"#,
        ] {
            assert!(
                matches!(resolve(source, &Config::default()), Err(EmbedError::Config(_))),
                "expected config error for {:?}",
                source
            );
        }
    }

    #[test]
    fn test_huge_range_rejected() {
        for source in [
            r#"{"range": [1, 4000000000]}"#,
            r#"{"page": [1, [1, 10000]]}"#,
            r#"{"page": [[1, 6000], [1, 6000]]}"#,
        ] {
            assert!(
                matches!(resolve(source, &Config::default()), Err(EmbedError::Config(_))),
                "expected config error for {:?}",
                source
            );
        }
        assert_eq!(plan(r#"{"range": [1, 10000]}"#).pages.len(), 10_000);
    }

    #[test]
    fn test_page_limit_is_configurable() {
        let config = Config {
            max_plan_pages: 3,
            ..Config::default()
        };
        assert!(resolve(r#"{"page": [1, 2, 3]}"#, &config).is_ok());
        assert!(matches!(
            resolve(r#"{"page": [1, 2, 3, 4]}"#, &config),
            Err(EmbedError::Config(_))
        ));
        assert!(matches!(
            resolve(r#"{"page": [1, [2, 4]]}"#, &config),
            Err(EmbedError::Config(_))
        ));
        assert!(resolve(r#"{"range": [5, 2]}"#, &config).unwrap().pages.is_empty());
    }

    #[test]
    fn test_expand_all_pages() {
        assert_eq!(expand_all_pages(&[0], 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(expand_all_pages(&[7, 0, 2], 3), vec![7, 1, 2, 3, 2]);
        assert_eq!(expand_all_pages(&[2, 3], 5), vec![2, 3]);
        assert!(expand_all_pages(&[0], 0).is_empty());
    }

    #[test]
    fn test_resolution_is_idempotent_on_complete_input() {
        let plan = plan(
            r#"{"page": [1, [3, 4], 0], "scale": 2.0, "rotation": 180,
                "fit": false, "link": false, "rect": [5.5, 6, 100, 50]}"#,
        );
        let written = serde_json::to_string(&plan).unwrap();
        let again = resolve(&written, &Config::default()).unwrap();
        assert_eq!(again, plan);
        assert_eq!(again.pages, vec![1, 3, 4, 0]);
    }
}
