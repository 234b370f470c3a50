use anyhow::{bail, Context, Result};
use clap::Parser;
use mapred::io::{input_files, read_lines, PartWriters};
use mapred::partitioner::parse_unsigned;
use mapred::{Emitter, EngineConfig, Mapper, Pipeline, Reducer, SortedPartitioner, Values};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Sorts unsigned 32-bit numbers (one per line) by range-partitioning them, so that the
/// output parts read in file order are globally ascending.
#[derive(Parser, Debug)]
struct Args {
    /// Input directory
    #[arg(long)]
    input: PathBuf,
    /// Output directory
    #[arg(long)]
    output: PathBuf,
    #[arg(long, default_value_t = 4)]
    mappers: usize,
    #[arg(long, default_value_t = 4)]
    reducers: usize,
    /// Rounded up to a power of two
    #[arg(long, default_value_t = 16)]
    partitions: usize,
    /// Re-read the output and check it is ascending
    #[arg(long)]
    verify: bool,
}

/// Fixed-width hex so byte order matches numeric order and the partitioner can parse it.
fn sort_key(n: u32) -> String {
    format!("0x{n:08x}")
}

struct NumsortMapper;

impl Mapper for NumsortMapper {
    fn map(&self, input: &str, emit: &Emitter<'_>) -> Result<()> {
        for (lineno, line) in read_lines(input)?.enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            let Ok(n) = text.parse::<u32>() else {
                warn!(input, line = lineno + 1, text, "skipping non-numeric line");
                continue;
            };
            emit.emit(&sort_key(n), text)?;
        }
        Ok(())
    }
}

struct NumsortReducer {
    parts: PartWriters,
}

impl Reducer for NumsortReducer {
    fn reduce(&self, key: &str, values: &mut Values<'_>, partition: usize) -> Result<()> {
        let occurrences = values.count();
        self.parts.write_row(partition, &parse_unsigned(key).to_string(), occurrences)
    }
}

fn verify_ascending(output: &Path) -> Result<u64> {
    let parts = input_files(output)?;
    let mut previous: Option<u64> = None;
    let mut rows = 0;
    for part in &parts {
        for line in read_lines(part)? {
            let line = line?;
            let (number, _) = line.split_once('\t').with_context(|| format!("malformed row in {}", part.display()))?;
            let number: u64 = number.parse()?;
            if previous.is_some_and(|p| p >= number) {
                bail!("{} is not ascending at {number}", part.display());
            }
            previous = Some(number);
            rows += 1;
        }
    }
    Ok(rows)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let partitions = args.partitions.max(1).next_power_of_two();
    let config = EngineConfig::new(args.mappers, args.reducers, partitions);
    let mut pipeline = Pipeline::new(config);
    pipeline.add_input_dir(&args.input)?;

    let reducer = NumsortReducer { parts: PartWriters::new(&args.output, partitions) };
    let stats = pipeline.map_reduce(&NumsortMapper, &reducer, &SortedPartitioner)?;
    let files = reducer.parts.finish()?;
    info!(files, numbers = stats.map.total_emits, distinct = stats.reduce.total_groups, partitions, "numsort done");

    if args.verify {
        let rows = verify_ascending(&args.output)?;
        info!(rows, "output is ascending");
    }
    Ok(())
}
