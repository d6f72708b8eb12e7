use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use chroma_nn::{GeneratorConfig, Module};
use chroma_pipeline::{ChannelOrder, Colorizer, ColorizerConfig};

const BANNER: &str = r#"
  ____ _
 / ___| |__  _ __ ___  _ __ ___   __ _
| |   | '_ \| '__/ _ \| '_ ` _ \ / _` |
| |___| | | | | | (_) | | | | | | (_| |
 \____|_| |_|_|  \___/|_| |_| |_|\__,_|"#;

#[derive(Parser)]
#[command(
    name = "chroma",
    about = "Chroma colorization engine CLI",
    long_about = "Colorize images with an encoder-decoder generator running on the\nChroma inference engine. Weights are loaded from safetensors artifacts.",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Colorize an image
    Colorize {
        /// Input image path (any format the image crate decodes)
        input: PathBuf,
        /// Output image path (format chosen by extension)
        output: PathBuf,
        /// Path to the safetensors parameter artifact
        #[arg(long)]
        weights: PathBuf,
        /// Working resolution of the forward pass
        #[arg(long, default_value = "256")]
        size: u32,
        /// Channel order the weights were trained against: rgb, bgr
        #[arg(long, default_value = "rgb")]
        channel_order: String,
    },
    /// Show the generator topology and parameter counts
    Info {
        /// Optional artifact to load and verify against the topology
        #[arg(long)]
        weights: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Colorize {
            input,
            output,
            weights,
            size,
            channel_order,
        } => cmd_colorize(&input, &output, &weights, size, &channel_order),
        Commands::Info { weights } => cmd_info(weights.as_deref()),
    }
}

fn cmd_colorize(
    input: &std::path::Path,
    output: &std::path::Path,
    weights: &std::path::Path,
    size: u32,
    channel_order: &str,
) {
    let order = match channel_order {
        "rgb" => ChannelOrder::Rgb,
        "bgr" => ChannelOrder::Bgr,
        other => {
            eprintln!("Unknown channel order: {}. Use rgb or bgr.", other);
            std::process::exit(1);
        }
    };

    let image = match image::open(input) {
        Ok(img) => img,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    let config = ColorizerConfig::new(weights)
        .with_input_size(size)
        .with_channel_order(order);
    let colorizer = match Colorizer::new(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading weights from {}: {}", weights.display(), e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let result = match colorizer.colorize_rgb8(&image) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error colorizing {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };
    println!(
        "Colorized {}x{} image in {:.2}s",
        image.width(),
        image.height(),
        start.elapsed().as_secs_f64()
    );

    if let Err(e) = result.save(output) {
        eprintln!("Error writing {}: {}", output.display(), e);
        std::process::exit(1);
    }
    println!("Wrote {}", output.display());
}

fn cmd_info(weights: Option<&std::path::Path>) {
    println!("{}", BANNER);
    println!("  v{}  —  colorization inference engine\n", env!("CARGO_PKG_VERSION"));

    let plan = GeneratorConfig::default();
    println!("Topology");
    println!("  encoder stages: {:?}", plan.down_channels);
    println!("  decoder stages: {:?}", plan.up_channels);
    println!("  stride factor:  {}", plan.stride_factor());
    println!("  io channels:    {} in / {} out", plan.input_channels, plan.output_channels);

    match weights {
        Some(path) => {
            let config = ColorizerConfig::new(path);
            match Colorizer::new(config) {
                Ok(colorizer) => {
                    println!("\nArtifact: {}", path.display());
                    println!("  parameters: {}", colorizer.generator().num_parameters());
                    println!("  status:     compatible");
                }
                Err(e) => {
                    eprintln!("\nArtifact {} failed to load: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            let params = plan.zeroed_parameters();
            println!("\nParameter tensors expected: {}", params.len());
        }
    }
}
