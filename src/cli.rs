//! Command-line interface parsing
//!
//! One-shot invocation: look up a single cadastral number, print the reply
//! text, and report the rendered map path.

use std::path::PathBuf;

use clap::Parser;

/// Cadastral parcel lookup with map rendering
#[derive(Parser, Debug)]
#[command(name = "kadastr")]
#[command(about = "Look up a cadastral parcel and render its polygon on a map")]
#[command(version)]
pub struct Cli {
    /// Cadastral number to look up, e.g. 77:06:0012018:1000
    #[arg(value_name = "NUMBER")]
    pub number: String,

    /// Fetch fresh data from the registry, bypassing any cached record
    #[arg(long)]
    pub refresh: bool,

    /// Directory the rendered map image is written into
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub out_dir: PathBuf,
}
