// sable - Bytecode virtual machine for the Sable scripting language
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Command-line driver: run or disassemble compiled Sable images.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sable_bytecode::{Executable, decode_image, disassemble};
use sable_vm::{Vm, VmConfig};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sable")]
#[command(version, about = "Run compiled Sable programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link images as one program and run main.main
    Run {
        /// Image files (.sbx), linked in order
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Operand stack slots allocated up front
        #[arg(long)]
        stack_size: Option<usize>,

        /// Live objects at which the first collection triggers
        #[arg(long)]
        gc_threshold: Option<usize>,

        /// Headroom added to the live count after each collection
        #[arg(long)]
        gc_increment: Option<usize>,
    },
    /// Print the disassembly of an image
    Disasm {
        /// Image file (.sbx)
        image: PathBuf,
    },
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,sable=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            images,
            stack_size,
            gc_threshold,
            gc_increment,
        } => {
            let mut config = VmConfig::default();
            if let Some(slots) = stack_size {
                config = config.with_stack_size(slots);
            }
            if let Some(objects) = gc_threshold {
                config = config.with_gc_threshold(objects);
            }
            if let Some(objects) = gc_increment {
                config = config.with_gc_increment(objects);
            }
            run(&images, config)
        }
        Command::Disasm { image } => disasm(&image),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn load_image(path: &Path) -> Result<Vec<Executable>> {
    let bytes = fs::read(path).with_context(|| format!("reading image {}", path.display()))?;
    let units =
        decode_image(&bytes).with_context(|| format!("decoding image {}", path.display()))?;
    debug!(path = %path.display(), units = units.len(), "loaded image");
    Ok(units)
}

fn run(images: &[PathBuf], config: VmConfig) -> Result<()> {
    let mut units = Vec::new();
    for path in images {
        units.extend(load_image(path)?);
    }

    let mut vm = Vm::with_config(config);
    vm.link(units).context("linking program")?;
    let results = vm.run().context("running program")?;

    let stats = vm.gc_stats();
    info!(
        collections = stats.collections,
        allocated = stats.total_allocated,
        peak_live = stats.peak_live,
        "program finished"
    );
    for value in results {
        println!("{}", vm.display(value));
    }
    Ok(())
}

fn disasm(image: &Path) -> Result<()> {
    for exe in load_image(image)? {
        let text = disassemble(&exe)
            .with_context(|| format!("disassembling package {}", exe.package))?;
        print!("{}", text);
    }
    Ok(())
}
