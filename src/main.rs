use clap::{Parser, Subcommand};
use dnpak::archive::{LocationStyle, PakArchive, PakOptions};
use dnpak::codec::DEFAULT_COMPRESSION_LEVEL;
use dnpak::entry::EntryInfo;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dnpak", about = "Pack, unpack and inspect .pak archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack every file below a folder into a new .pak archive
    Pack {
        output: PathBuf,
        folder: PathBuf,
        /// zlib level 0-9
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: u32,
        /// Store locations with backslashes
        #[arg(short, long)]
        windows: bool,
    },
    /// Add single files to an archive, creating it if needed
    Add {
        archive: PathBuf,
        /// Location inside the archive, e.g. /resource/ext/table.dnt
        location: String,
        source: PathBuf,
    },
    /// Extract a .pak archive
    Unpack {
        input: PathBuf,
        /// Defaults to the archive path without ".pak"
        #[arg(short = 'C', long)]
        output_dir: Option<PathBuf>,
        /// Skip zero-size placeholder entries
        #[arg(short, long)]
        strict: bool,
    },
    /// List archive contents
    List {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Show archive header fields
    Info {
        input: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, folder, level, windows } => {
            let opts = PakOptions {
                compression_level: level,
                location_style: if windows { LocationStyle::Windows } else { LocationStyle::Unix },
            };
            let mut pak = PakArchive::create_with_options(&output, opts)?;
            let added = pak.add_files(&folder)?;
            let header = pak.close()?;
            println!("Created: {} ({added} files, table at {})", output.display(), header.table_offset);
        }

        // ── Add ──────────────────────────────────────────────────────────────
        Commands::Add { archive, location, source } => {
            let mut pak = if archive.exists() {
                PakArchive::open(&archive)?
            } else {
                PakArchive::create(&archive)?
            };
            pak.add_file(&source, &location)?;
            let header = pak.close()?;
            println!("  added  {location}  ({} files)", header.file_count);
        }

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output_dir, strict } => {
            let pak = PakArchive::open(&input)?;
            let dir = output_dir.unwrap_or_else(|| pak.default_extract_dir());
            let summary = pak.extract(&dir, strict)?;
            pak.close()?;
            println!("Unpacked {} file(s) to: {}", summary.written, dir.display());
            if summary.skipped_empty > 0 {
                println!("  skipped {} empty placeholder(s)", summary.skipped_empty);
            }
            if summary.skipped_denied > 0 {
                println!("  skipped {} file(s): permission denied", summary.skipped_denied);
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, json } => {
            let pak = PakArchive::open(&input)?;
            let infos: Vec<EntryInfo> = pak.entries().iter().map(EntryInfo::from).collect();
            if json {
                println!("{}", serde_json::to_string_pretty(&infos)?);
            } else {
                println!("Archive: {}", input.display());
                println!("{:<48} {:>12} {:>12} {:>12}", "Location", "Size", "Compressed", "Offset");
                for info in &infos {
                    println!("{:<48} {:>12} {:>12} {:>12}",
                        info.location, info.raw_size, info.compressed_size, info.offset);
                }
            }
            pak.close()?;
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pak = PakArchive::open(&input)?;
            let header = pak.header();
            let raw: u64 = pak.entries().iter().map(|e| u64::from(e.raw_size())).sum();
            let packed: u64 = pak.entries().iter().map(|e| u64::from(e.compressed_size())).sum();

            println!("── .pak Archive ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Magic          {}", String::from_utf8_lossy(&header.magic).trim_end_matches('\0'));
            println!("  Version        {:#x}", header.version);
            println!("  Files          {}", header.file_count);
            println!("  Table offset   {} B", header.table_offset);
            println!("  Raw size       {raw} B");
            println!("  Packed size    {packed} B");
            pak.close()?;
        }
    }

    Ok(())
}
