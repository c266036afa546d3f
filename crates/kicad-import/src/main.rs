use clap::{Parser, ValueEnum};
use kicad_import::{generate_import, load, load_footprint, ImportConfig, ImportError};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kicad-import", about = "Read a KiCad board into JSON records")]
struct Cli {
    /// Input board file (.kicad_pcb), or footprint file with --footprint
    input: PathBuf,

    /// Output JSON file (stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,

    /// Emit placements, parts and packages instead of the board model
    #[arg(long)]
    summary: bool,

    /// Read the input as a footprint library file (.kicad_mod) and emit its package
    #[arg(long, conflicts_with = "summary")]
    footprint: bool,

    /// Measure placements from the aux axis origin
    #[arg(long)]
    aux_origin: bool,

    /// Select footprints marked dnp or excluded from position files
    #[arg(long)]
    include_dnp: bool,

    /// Do not select SMD footprints
    #[arg(long)]
    skip_smd: bool,

    /// Do not select through-hole footprints
    #[arg(long)]
    skip_through_hole: bool,

    /// Board sides to select
    #[arg(long, value_enum, default_value_t = SideFilter::Both)]
    side: SideFilter,
}

#[derive(Clone, Copy, ValueEnum)]
enum SideFilter {
    Both,
    Top,
    Bottom,
}

impl Cli {
    fn import_config(&self) -> ImportConfig {
        ImportConfig {
            use_aux_origin: self.aux_origin,
            include_dnp: self.include_dnp,
            include_smd: !self.skip_smd,
            include_through_hole: !self.skip_through_hole,
            include_top: matches!(self.side, SideFilter::Both | SideFilter::Top),
            include_bottom: matches!(self.side, SideFilter::Both | SideFilter::Bottom),
        }
    }
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn run(cli: &Cli) -> Result<(), ImportError> {
    let json = if cli.footprint {
        to_json(&load_footprint(&cli.input)?, cli.pretty)?
    } else {
        // Rejected footprints are logged while the board is built.
        let board = load(&cli.input)?;
        if cli.summary {
            to_json(&generate_import(&board, &cli.import_config()), cli.pretty)?
        } else {
            to_json(&board, cli.pretty)?
        }
    };

    if let Some(output_path) = &cli.output {
        std::fs::write(output_path, &json)?;
        eprintln!("Written to {}", output_path.display());
    } else {
        println!("{json}");
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
