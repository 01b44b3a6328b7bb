use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};

use duke_scraper::{
    extractor::{load_palette, AssetExtractor, ExtractError},
    graphics::sheet::AtlasConfig,
    level::Generation,
};

/// Converts extracted game assets to PNG, JSON, WAV and IMF.
#[derive(Parser)]
#[command(name = "duke-scraper")]
#[command(version)]
struct Cli {
    /// Directory the converted files are written to
    #[arg(short, long, default_value = "./output", global = true)]
    output: PathBuf,

    /// Palette file (48-byte EGA fade or 768-byte VGA); default EGA otherwise
    #[arg(short, long, global = true)]
    palette: Option<PathBuf>,

    #[command(flatten)]
    sheet: SheetArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SheetArgs {
    /// Keep identical tiles/frames as separate sheet cells
    #[arg(long, global = true)]
    no_dedup: bool,

    /// Skip oxipng recompression of sheets
    #[arg(long, global = true)]
    no_optimise: bool,

    /// Cells per sheet row (near-square when omitted)
    #[arg(long, global = true)]
    per_row: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenerationArg {
    #[value(name = "1")]
    One,
    #[value(name = "2")]
    Two,
}

#[derive(Subcommand)]
enum Commands {
    /// CZONE tileset to a tile sheet
    Czone { file: PathBuf },

    /// Generation-1 16x16 tile file to a tile sheet
    Gen1Tiles { files: Vec<PathBuf> },

    /// 320x200 full-screen planar image to PNG
    Image { files: Vec<PathBuf> },

    /// Backdrop (40x25 solid tiles) to PNG
    Backdrop { files: Vec<PathBuf> },

    /// Level map to JSON, and to PNG when a CZONE is given
    Level {
        file: PathBuf,
        #[arg(short, long, value_enum, default_value = "2")]
        generation: GenerationArg,
        #[arg(long)]
        czone: Option<PathBuf>,
    },

    /// Actor frames and metaframes to sheets
    Sprites {
        actor_info: PathBuf,
        sprite_data: PathBuf,
        /// JSON sprite definitions for metaframes
        #[arg(long)]
        definitions: Option<PathBuf>,
    },

    /// Creative Voice Files to WAV
    Voc { files: Vec<PathBuf> },

    /// AdLib sound effects to IMF
    Adlib { files: Vec<PathBuf> },

    /// PC speaker effects to WAV
    PcSpeaker {
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 11_025)]
        sample_rate: u32,
    },
}

fn run(cli: Cli) -> Result<usize, ExtractError> {
    let config = AtlasConfig {
        deduplicate_frames: !cli.sheet.no_dedup,
        optimise_png: !cli.sheet.no_optimise,
        frames_per_row: cli.sheet.per_row,
    };
    let extractor = AssetExtractor::new(&cli.output, config)?;
    let palette = load_palette(cli.palette.as_deref())?;

    let mut failures = 0;
    let mut report = |result: Result<String, ExtractError>| match result {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            eprintln!("Error: {}", e);
            failures += 1;
        }
    };

    match cli.command {
        Commands::Czone { file } => report(
            extractor
                .extract_czone(&file, &palette)
                .map(|r| format!("{} ({} unique tiles)", r.image_path.display(), r.unique_frames)),
        ),
        Commands::Gen1Tiles { files } => {
            for file in files {
                report(
                    extractor
                        .extract_gen1_tiles(&file, &palette)
                        .map(|r| format!("{} ({} unique tiles)", r.image_path.display(), r.unique_frames)),
                );
            }
        }
        Commands::Image { files } => {
            for file in files {
                report(
                    extractor
                        .extract_image(&file, &palette)
                        .map(|p| p.display().to_string()),
                );
            }
        }
        Commands::Backdrop { files } => {
            for file in files {
                report(
                    extractor
                        .extract_backdrop(&file, &palette)
                        .map(|p| p.display().to_string()),
                );
            }
        }
        Commands::Level {
            file,
            generation,
            czone,
        } => {
            let generation = match generation {
                GenerationArg::One => Generation::Gen1,
                GenerationArg::Two => Generation::Gen2,
            };
            report(
                extractor
                    .extract_level(&file, generation, czone.as_deref(), &palette)
                    .map(|paths| join_paths(&paths)),
            );
        }
        Commands::Sprites {
            actor_info,
            sprite_data,
            definitions,
        } => report(
            extractor
                .extract_sprites(&actor_info, &sprite_data, definitions.as_deref(), &palette)
                .map(|sheets| {
                    sheets
                        .iter()
                        .map(|s| format!("{} ({} unique)", s.image_path.display(), s.unique_frames))
                        .collect::<Vec<_>>()
                        .join("\n")
                }),
        ),
        Commands::Voc { files } => {
            for file in files {
                report(extractor.extract_voc(&file).map(|paths| join_paths(&paths)));
            }
        }
        Commands::Adlib { files } => {
            for file in files {
                report(extractor.extract_adlib(&file).map(|p| p.display().to_string()));
            }
        }
        Commands::PcSpeaker { files, sample_rate } => {
            for file in files {
                report(
                    extractor
                        .extract_pc_speaker(&file, sample_rate)
                        .map(|p| p.display().to_string()),
                );
            }
        }
    }

    Ok(failures)
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    println!("Output Dir: {:?}", cli.output);
    match run(cli) {
        Ok(0) => {
            println!("Processing complete!");
            ExitCode::SUCCESS
        }
        Ok(failures) => {
            eprintln!("{} asset(s) failed", failures);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
