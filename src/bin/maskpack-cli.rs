//! maskpack-cli - Command-line interface for MaskPack
//!
//! A command-line tool for packing files of symbol blocks into flits and back.

use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use maskpack::{frame_headers, FlitDecoder, FlitEncoder, FrameFormat};
use maskpack::{BusWidth, SymbolCount};
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "maskpack-cli")]
#[command(about = "A CLI tool for mask-payload flit compression and decompression")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file of whole symbol blocks into flits
    Compress {
        /// Input file of raw symbols
        input: PathBuf,

        /// Output flit file
        output: PathBuf,

        /// Symbols per block
        #[arg(short, long, value_enum, default_value_t = CliSymbolCount::Sym64)]
        symbols: CliSymbolCount,

        /// LUT set written into every flit header
        #[arg(short, long, default_value_t = 0)]
        lut: u8,

        /// Predefined classification layer
        #[arg(short = 'y', long, default_value_t = 0)]
        layer: u8,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Decompress a flit file
    Decompress {
        /// Input flit file
        input: PathBuf,

        /// Output symbol file
        output: PathBuf,

        /// Symbols per block
        #[arg(short, long, value_enum, default_value_t = CliSymbolCount::Sym64)]
        symbols: CliSymbolCount,

        /// Force overwrite of output file
        #[arg(short, long)]
        force: bool,
    },

    /// Get information about a flit file
    Info {
        /// Flit file to analyze
        input: PathBuf,

        /// Symbols per block
        #[arg(short, long, value_enum, default_value_t = CliSymbolCount::Sym64)]
        symbols: CliSymbolCount,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum CliSymbolCount {
    /// 64 symbols per block
    #[value(name = "64")]
    Sym64,
    /// 128 symbols per block
    #[value(name = "128")]
    Sym128,
}

impl From<CliSymbolCount> for SymbolCount {
    fn from(count: CliSymbolCount) -> Self {
        match count {
            CliSymbolCount::Sym64 => SymbolCount::Sym64,
            CliSymbolCount::Sym128 => SymbolCount::Sym128,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let result = match cli.command {
        Commands::Compress {
            input,
            output,
            symbols,
            lut,
            layer,
            force,
        } => compress_file(
            &input,
            &output,
            symbols.into(),
            lut,
            layer,
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Decompress {
            input,
            output,
            symbols,
            force,
        } => decompress_file(
            &input,
            &output,
            symbols.into(),
            force,
            cli.verbose,
            cli.quiet,
        ),
        Commands::Info { input, symbols } => show_file_info(&input, symbols.into(), cli.verbose),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn check_paths(
    input: &Path,
    output: &Path,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    if output.exists() && !force {
        return Err(format!(
            "Output file '{}' already exists. Use --force to overwrite",
            output.display()
        )
        .into());
    }
    Ok(())
}

fn progress_bar(
    len: u64,
    quiet: bool,
    message: &'static str,
) -> Result<Option<ProgressBar>, Box<dyn std::error::Error>> {
    // Only worth drawing for inputs past a megabyte
    if quiet || len < 1024 * 1024 / 64 {
        return Ok(None);
    }

    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(Some(pb))
}

#[allow(clippy::too_many_arguments)]
fn compress_file(
    input: &Path,
    output: &Path,
    num_sym: SymbolCount,
    lut: u8,
    layer: u8,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;

    let mut encoder = FlitEncoder::new(num_sym, BusWidth::W32)?;
    encoder.set_lut_num(lut)?;
    encoder.set_layer(layer)?;

    if verbose {
        println!(
            "Compressing '{}' to '{}'",
            input.display(),
            output.display()
        );
        println!(
            "Symbols: {}, LUT: {}, Layer: {}",
            num_sym.count(),
            lut,
            layer
        );
    }

    let start_time = Instant::now();

    let input_data = fs::read(input)?;
    let input_size = input_data.len();
    let block_len = num_sym.count();
    if input_size % block_len != 0 {
        return Err(format!(
            "Input size {} is not a multiple of the {}-symbol block",
            input_size, block_len
        )
        .into());
    }

    let blocks = (input_size / block_len) as u64;
    let progress = progress_bar(blocks, quiet, "Compressing...")?;

    let mut compressed_data = Vec::with_capacity(input_size);
    let mut counts = [0usize; 3];
    for block in input_data.chunks(block_len) {
        let encoded = encoder
            .compress_packet(block)
            .map_err(|e| format!("Compression failed: {}", e))?;
        match encoded.format {
            FrameFormat::Uncompressed => counts[0] += 1,
            FrameFormat::AllPri0 => counts[1] += 1,
            _ => counts[2] += 1,
        }
        compressed_data.extend_from_slice(&encoded.data);
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(ref pb) = progress {
        pb.finish_with_message("Compression complete");
    }

    fs::write(output, &compressed_data)?;

    let compression_time = start_time.elapsed();
    let output_size = compressed_data.len();
    let compression_ratio = if input_size == 0 {
        0.0
    } else {
        (output_size as f64 / input_size as f64) * 100.0
    };

    if !quiet {
        println!("✓ Compression successful!");
        println!("  Input:  {} bytes ({} blocks)", input_size, blocks);
        println!("  Output: {} bytes", output_size);
        println!("  Ratio:  {:.1}%", compression_ratio);
        println!("  Time:   {:.2?}", compression_time);
        if verbose {
            println!(
                "  Flits:  {} uncompressed, {} all-pri0, {} compressed",
                counts[0], counts[1], counts[2]
            );
        }
    }

    Ok(())
}

fn decompress_file(
    input: &Path,
    output: &Path,
    num_sym: SymbolCount,
    force: bool,
    verbose: bool,
    quiet: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    check_paths(input, output, force)?;

    if verbose {
        println!(
            "Decompressing '{}' to '{}'",
            input.display(),
            output.display()
        );
    }

    let start_time = Instant::now();

    let compressed_data = fs::read(input)?;
    let input_size = compressed_data.len();

    if verbose {
        println!("Compressed size: {} bytes", input_size);
    }

    let headers = frame_headers(&compressed_data, num_sym)
        .map_err(|e| format!("Decompression failed: {}", e))?;
    let progress = progress_bar(headers.len() as u64, quiet, "Decompressing...")?;

    let decoder = FlitDecoder::new(num_sym);
    let mut decompressed_data = Vec::with_capacity(headers.len() * num_sym.count());
    let mut offset = 0;
    for header in &headers {
        let flit = &compressed_data[offset..offset + header.packet_len];
        let symbols = decoder
            .decompress_frame(flit)
            .map_err(|e| format!("Decompression failed at offset {}: {}", offset, e))?;
        decompressed_data.extend_from_slice(&symbols);
        offset += header.packet_len;
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
    }

    if let Some(ref pb) = progress {
        pb.finish_with_message("Decompression complete");
    }

    fs::write(output, &decompressed_data)?;

    let decompression_time = start_time.elapsed();
    let output_size = decompressed_data.len();
    let compression_ratio = if output_size == 0 {
        0.0
    } else {
        (input_size as f64 / output_size as f64) * 100.0
    };

    if !quiet {
        println!("✓ Decompression successful!");
        println!("  Input:  {} bytes ({} flits)", input_size, headers.len());
        println!("  Output: {} bytes", output_size);
        println!("  Ratio:  {:.1}%", compression_ratio);
        println!("  Time:   {:.2?}", decompression_time);
    }

    Ok(())
}

fn show_file_info(
    input: &Path,
    num_sym: SymbolCount,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input file '{}' does not exist", input.display()).into());
    }

    let data = fs::read(input)?;
    let file_size = data.len();

    println!("MaskPack File Information:");
    println!("  File: {}", input.display());
    println!("  Size: {} bytes", file_size);
    println!("  Symbols per block: {}", num_sym.count());

    match frame_headers(&data, num_sym) {
        Ok(headers) => {
            let mut counts = [0usize; 3];
            let mut luts = [0usize; 8];
            for header in &headers {
                match header.format {
                    FrameFormat::Uncompressed => counts[0] += 1,
                    FrameFormat::AllPri0 => counts[1] += 1,
                    _ => counts[2] += 1,
                }
                luts[header.lut_num as usize & 7] += 1;
            }

            let decompressed_size = headers.len() * num_sym.count();
            println!("  Flits: {}", headers.len());
            println!("    Uncompressed: {}", counts[0]);
            println!("    All-PRI0:     {}", counts[1]);
            println!("    Compressed:   {}", counts[2]);
            println!("  Decompressed Size: {} bytes", decompressed_size);
            if decompressed_size > 0 {
                println!(
                    "  Compression Ratio: {:.1}%",
                    (file_size as f64 / decompressed_size as f64) * 100.0
                );
            }

            if verbose {
                for (lut, count) in luts.iter().enumerate().filter(|(_, count)| **count > 0) {
                    println!("  LUT {}: {} flits", lut, count);
                }
            }

            match FlitDecoder::new(num_sym).decompress_stream(&data) {
                Ok(_) => println!("  Status: ✓ Valid flit stream"),
                Err(e) => {
                    println!("  Status: ✗ Flit bodies do not decode");
                    if verbose {
                        println!("  Error: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            println!("  Status: ✗ Invalid or corrupted flit stream");
            if verbose {
                println!("  Error: {}", e);
            }
        }
    }

    Ok(())
}
