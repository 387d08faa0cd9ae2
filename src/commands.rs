use crate::document::DocumentReference;
use crate::error::{EmbedError, Result};
use crate::grid::AnchorRect;

/// Build a `notability` block for the note URL in `selection`. With a grid
/// triple the block also gets the crop rect for that grid region.
pub fn insert_block(selection: &str, grid: Option<AnchorRect>) -> Result<String> {
    let doc = DocumentReference::from_note_url(selection.trim())
        .ok_or_else(|| EmbedError::Reference("Invalid Document URL".into()))?;
    let id = serde_json::to_string(doc.id())?;

    let block = match grid {
        Some(grid) => {
            let rect: Vec<String> = grid.to_rect().iter().map(|v| v.to_string()).collect();
            format!(
                "```notability\n{{\n\"id\": {},\n\"rect\": [{}]\n }}\n```",
                id,
                rect.join(",")
            )
        }
        None => format!("```notability\n{{\n\"id\": {}\n }}\n```", id),
    };
    Ok(block)
}

/// Command id for one grid region, e.g. `add-notability-document-3-4-2`.
pub fn command_id(grid: Option<AnchorRect>) -> String {
    match grid {
        Some(g) => format!(
            "add-notability-document-{}-{}-{}",
            g.anchor, g.width_cells, g.height_cells
        ),
        None => "add-notability-document".into(),
    }
}

/// Parse a command id back into its grid triple, validating the ranges.
pub fn parse_command_id(id: &str) -> Result<Option<AnchorRect>> {
    let Some(rest) = id.strip_prefix("add-notability-document") else {
        return Err(EmbedError::Config(format!("Unknown command {}", id)));
    };
    if rest.is_empty() {
        return Ok(None);
    }
    let parts: Vec<i64> = rest
        .strip_prefix('-')
        .unwrap_or(rest)
        .split('-')
        .map(|p| p.parse::<i64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| EmbedError::Config(format!("Unknown command {}: {}", id, e)))?;
    match parts.as_slice() {
        [anchor, width, height] => Ok(Some(AnchorRect::new(*anchor, *width, *height)?)),
        _ => Err(EmbedError::Config(format!("Unknown command {}", id))),
    }
}
