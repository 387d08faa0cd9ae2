use std::io::Read;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use notability_embed::{commands, note, params, AnchorRect, BlockProcessor, Config, HttpByteSource};

#[derive(Parser)]
#[command(
    name = "notability-embed",
    version,
    about = "Render Notability and OneNote embed blocks from markdown notes"
)]
struct Cli {
    /// Config file to use instead of the one in the platform config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a markdown note to HTML, embedding its blocks
    Render(RenderArgs),

    /// Print the resolved render plan for a block body
    Resolve {
        /// File holding the block JSON, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
    },

    /// Print a new block for a note URL
    Insert(InsertArgs),
}

#[derive(clap::Args)]
struct RenderArgs {
    /// Markdown note to render
    note: PathBuf,

    /// Directory for the HTML page and canvas images
    #[arg(short, long, default_value = ".")]
    out: PathBuf,

    /// Container width in pixels; page scales become relative to it
    #[arg(long)]
    layout_width: Option<f64>,
}

#[derive(clap::Args)]
struct InsertArgs {
    /// Note URL, e.g. https://notability.com/n/<id>
    url: String,

    /// Grid row the crop starts at (1-20)
    #[arg(long, requires_all = ["width", "height"])]
    anchor: Option<i64>,

    /// Crop width in grid cells (1-20)
    #[arg(long, requires = "anchor")]
    width: Option<i64>,

    /// Crop height in grid cells (1-20)
    #[arg(long, requires = "anchor")]
    height: Option<i64>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Command::Render(args) => {
            if let Some(width) = args.layout_width {
                config.layout_width = width;
            }
            render(&config, &args)
        }
        Command::Resolve { input } => {
            let text = read_input(&input)?;
            let plan = params::resolve(&text, &config)?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Insert(args) => {
            let grid = match (args.anchor, args.width, args.height) {
                (Some(anchor), Some(width), Some(height)) => {
                    Some(AnchorRect::new(anchor, width, height)?)
                }
                _ => None,
            };
            log::info!("Running command {}", commands::command_id(grid));
            println!("{}", commands::insert_block(&args.url, grid)?);
            Ok(())
        }
    }
}

fn render(config: &Config, args: &RenderArgs) -> Result<()> {
    let markdown = std::fs::read_to_string(&args.note)
        .with_context(|| format!("reading {}", args.note.display()))?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating {}", args.out.display()))?;

    let stem = args
        .note
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "note".to_string());

    let source = HttpByteSource::new(config);
    let processor = BlockProcessor::new(config, &source);
    let body = note::render_note(&markdown, &processor, &args.out, &stem)?;

    let path = args.out.join(format!("{}.html", stem));
    std::fs::write(&path, note::html_page(&stem, &body))
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    println!("{}", path.display());
    Ok(())
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("reading {}", input))
    }
}
