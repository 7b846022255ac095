//! # mathviewer CLI
//!
//! Command-line interface for the mathviewer formula renderer.

mod commands;

use clap::{Parser, Subcommand};
use mathviewer_types::ViewerMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mathviewer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults apply when it does not exist)
    #[arg(long, default_value = "mathviewer.yml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the formulas of an HTML file and print the result
    Render {
        /// HTML file to render (`-` for stdin)
        input: PathBuf,

        /// Viewer mode (none, image, latex, mathml)
        #[arg(long)]
        viewer: Option<ViewerMode>,

        /// Backend services root URL
        #[arg(long, env = "MATHVIEWER_SERVICE_ROOT")]
        service_root: Option<String>,

        /// Extra properties as a query string, e.g. `lang=fr&dpi=192`
        #[arg(long)]
        query: Option<String>,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert LaTeX to annotated MathML
    Latex2mathml {
        latex: String,

        /// Backend services root URL
        #[arg(long, env = "MATHVIEWER_SERVICE_ROOT")]
        service_root: Option<String>,
    },

    /// Convert MathML to LaTeX
    Mathml2latex {
        mathml: String,

        /// Backend services root URL
        #[arg(long, env = "MATHVIEWER_SERVICE_ROOT")]
        service_root: Option<String>,
    },

    /// Encode MathML with the safe alphabet
    Encode {
        /// MathML (read from stdin when omitted)
        input: Option<String>,
    },

    /// Decode safe MathML
    Decode {
        /// Safe MathML (read from stdin when omitted)
        input: Option<String>,

        /// Fix operators left unescaped by the blackboard integration
        #[arg(long)]
        blackboard: bool,
    },

    /// Print the metrics embedded in an SVG or PNG formula image
    Metrics {
        file: PathBuf,

        /// Convert to CSS pixels using the embedded dpi
        #[arg(long)]
        css: bool,
    },

    /// Turn annotated MathML and formula images of an HTML file into `$$latex$$`
    ToLatex {
        /// HTML file (`-` for stdin)
        input: PathBuf,
    },

    /// Convert `$$latex$$` and formula images of an HTML file to their stored form
    Save {
        /// HTML file (`-` for stdin)
        input: PathBuf,

        /// Backend services root URL
        #[arg(long, env = "MATHVIEWER_SERVICE_ROOT")]
        service_root: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(if cli.verbose {
                tracing::Level::DEBUG.into()
            } else {
                tracing::Level::INFO.into()
            }),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Render {
            input,
            viewer,
            service_root,
            query,
            output,
        } => {
            let opts = commands::RenderOptions {
                viewer,
                service_root,
                query,
                output,
            };
            commands::render_file(&cli.config, &input, opts).await
        }
        Commands::Latex2mathml {
            latex,
            service_root,
        } => commands::latex_to_mathml(&cli.config, &latex, service_root).await,
        Commands::Mathml2latex {
            mathml,
            service_root,
        } => commands::mathml_to_latex(&cli.config, &mathml, service_root).await,
        Commands::Encode { input } => commands::encode(input),
        Commands::Decode { input, blackboard } => commands::decode(input, blackboard),
        Commands::Metrics { file, css } => commands::print_metrics(&file, css),
        Commands::ToLatex { input } => commands::to_latex(&cli.config, &input),
        Commands::Save {
            input,
            service_root,
        } => commands::save_file(&cli.config, &input, service_root).await,
    }
}
