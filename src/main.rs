use clap::{Parser, ValueEnum};
use erdcanvas::config::CanvasConfig;
use erdcanvas::layout::AutoStyle;
use erdcanvas::render_document;
use erdcanvas::serializer;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "erdcanvas", version, about = "Route and render diagram documents to SVG")]
struct Args {
    /// Diagram document (.json)
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Canvas config JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Edge style for auto-routed edges, overriding the config
    #[arg(short, long, value_enum)]
    style: Option<StyleArg>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum StyleArg {
    Straight,
    Orthogonal,
    Avoiding,
}

impl From<StyleArg> for AutoStyle {
    fn from(style: StyleArg) -> Self {
        match style {
            StyleArg::Straight => AutoStyle::Straight,
            StyleArg::Orthogonal => AutoStyle::Orthogonal,
            StyleArg::Avoiding => AutoStyle::Avoiding,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(message) = run(Args::parse()) {
        eprintln!("{}", message);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), String> {
    let mut config = match &args.config {
        Some(path) => CanvasConfig::load(path).map_err(|e| format!("{}: {}", path.display(), e))?,
        None => CanvasConfig::default(),
    };
    if let Some(style) = args.style {
        config.path.auto_style = style.into();
    }

    let input = fs::read_to_string(&args.input)
        .map_err(|e| format!("Failed to read {}: {}", args.input.display(), e))?;
    let document = serializer::from_json(&input)
        .map_err(|e| format!("{}: {}", args.input.display(), e))?;
    let svg = render_document(&document, &config);

    match &args.output {
        Some(path) => fs::write(path, &svg)
            .map_err(|e| format!("Failed to write {}: {}", path.display(), e)),
        None => {
            print!("{}", svg);
            Ok(())
        }
    }
}
