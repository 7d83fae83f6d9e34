use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use vid_gif::logging::{init_logging, LogConfig};
use vid_gif::{convert, ConversionRequest, DEFAULT_INPUT, DEFAULT_OUTPUT};

#[derive(Parser)]
#[command(name = "vid-gif")]
#[command(version, about = "Convert a gameplay capture into a looping animated GIF", long_about = None)]
struct Cli {
    /// Source video
    #[arg(value_name = "INPUT", default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// Destination GIF
    #[arg(value_name = "OUTPUT", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let _ = init_logging("vid_gif", LogConfig::default().with_level(level));

    let request = ConversionRequest::new(cli.input, cli.output);
    let report = convert(&request);

    if !report.success {
        eprintln!("❌ {}", report.message);
        std::process::exit(1);
    }

    println!(
        "🎉 Conversion complete! File size: {:.1} MB",
        report.output_size_mib().unwrap_or(0.0)
    );
    if report.oversized() {
        println!("⚠️  The GIF is rather large; lowering the frame rate or width will shrink it");
    }

    Ok(())
}
