use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pagewalk::{
    Dataset, ResultWriter, Schedule, Summary, batch,
    console::{self, Console},
};
use paging::{Translation, VirtualAddress, WalkOptions};

#[derive(Parser)]
#[command(name = "pagewalk")]
#[command(about = "Four-level page table walk simulator")]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translate every query in a dataset and write one result per line
    Translate {
        /// Dataset with the memory dump and the queries
        #[arg(short, long, default_value = "dataset.txt")]
        input: PathBuf,

        /// File receiving one physical address or "fault" per query
        #[arg(short, long, default_value = "results.txt")]
        output: PathBuf,

        /// Flush the output after this many results (0 flushes only at the end)
        #[arg(long, default_value_t = 100)]
        flush_every: u64,

        /// Number of queries translated in parallel before being written out
        #[arg(long, default_value_t = 4096)]
        batch_size: usize,

        /// Translate queries one at a time on a single thread
        #[arg(long)]
        sequential: bool,

        #[command(flatten)]
        walk: WalkArgs,
    },
    /// Trace the walk of a single address through a dataset's page tables
    Walk {
        /// Dataset with the memory dump (its queries are ignored)
        #[arg(short, long, default_value = "dataset.txt")]
        input: PathBuf,

        /// Virtual address to translate (decimal, or hexadecimal with a 0x prefix)
        #[arg(short, long)]
        address: String,

        #[command(flatten)]
        walk: WalkArgs,
    },
}

#[derive(ClapArgs)]
struct WalkArgs {
    /// Ignore the large page bit and always walk down to the page table
    #[arg(long)]
    no_large_pages: bool,
}

impl WalkArgs {
    fn options(&self) -> WalkOptions {
        WalkOptions {
            large_pages: !self.no_large_pages,
        }
    }
}

fn load(input: &Path) -> Result<Dataset, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)
        .map_err(|e| format!("Failed to read {}: {}", input.display(), e))?;
    let dataset =
        Dataset::parse(&text).map_err(|e| format!("Failed to parse {}: {}", input.display(), e))?;
    Ok(dataset)
}

fn translate(
    input: PathBuf,
    output: PathBuf,
    flush_every: u64,
    schedule: Schedule,
    options: WalkOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = load(&input)?;

    let file = fs::File::create(&output)
        .map_err(|e| format!("Failed to create {}: {}", output.display(), e))?;
    let writer = ResultWriter::new(file, flush_every);

    translate_into(dataset, writer, schedule, options)?;
    Ok(())
}

/// Runs every query of `dataset` and writes the results through `writer`.
fn translate_into<W: Write>(
    dataset: Dataset,
    mut writer: ResultWriter<W>,
    schedule: Schedule,
    options: WalkOptions,
) -> io::Result<(W, Summary)> {
    let (context, queries) = dataset.into_context(options);

    let summary = batch::run(&context, &queries, schedule, |translation| {
        writer.write(translation)
    })?;
    let out = writer.finish()?;

    log::info!(
        "Translated {} queries: {} mapped, {} faulted",
        queries.len(),
        summary.mapped,
        summary.faults
    );
    Ok((out, summary))
}

fn parse_address(address_str: &str) -> Result<VirtualAddress, Box<dyn std::error::Error>> {
    let address = if let Some(hex) = address_str.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)?
    } else {
        address_str.parse::<u64>()?
    };
    Ok(VirtualAddress::new(address))
}

fn walk(
    input: PathBuf,
    address_str: String,
    options: WalkOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let address = parse_address(&address_str)?;
    let (context, _) = load(&input)?.into_context(options);

    let walk = context.walk(address);
    println!("{:#x}", address.as_u64());
    for step in &walk.steps {
        match step.descriptor {
            Some(descriptor) => println!(
                "  {:<10} index {:>3}  entry {:#x} -> {:#x} [{}]",
                step.level.to_string(),
                step.index,
                step.entry_address.as_u64(),
                descriptor.as_u64(),
                descriptor.flags()
            ),
            None => println!(
                "  {:<10} index {:>3}  entry {:#x} -> <none>",
                step.level.to_string(),
                step.index,
                step.entry_address.as_u64()
            ),
        }
    }

    match walk.translation {
        Translation::Mapped { address, size } => {
            println!("=> {:#x} ({} page)", address.as_u64(), size)
        }
        Translation::Fault(fault) => println!("=> fault: {}", fault),
    }

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    Console::init(console::level_for_verbosity(args.verbose));

    match args.command {
        Command::Translate {
            input,
            output,
            flush_every,
            batch_size,
            sequential,
            walk,
        } => {
            let schedule = if sequential {
                Schedule::Sequential
            } else {
                Schedule::Parallel { batch_size }
            };
            translate(input, output, flush_every, schedule, walk.options())
        }
        Command::Walk {
            input,
            address,
            walk: walk_args,
        } => walk(input, address, walk_args.options()),
    }
}
