use anyhow::{Context, Result};
use clap::Parser;
use mapred::io::{read_lines, PartWriters};
use mapred::{Emitter, EngineConfig, HashPartitioner, Mapper, Pipeline, Reducer, Values};
use regex::Regex;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
struct Args {
    /// Input directory
    #[arg(long)]
    input: PathBuf,
    /// Output directory
    #[arg(long)]
    output: PathBuf,
    /// JSON engine config; MAPRED_* environment variables are used when absent
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    mappers: Option<usize>,
    #[arg(long)]
    reducers: Option<usize>,
    #[arg(long)]
    partitions: Option<usize>,
}

struct WordcountMapper {
    word_re: Regex,
}

impl Mapper for WordcountMapper {
    fn map(&self, input: &str, emit: &Emitter<'_>) -> Result<()> {
        for line in read_lines(input)? {
            let line = line.with_context(|| format!("read {input}"))?;
            for m in self.word_re.find_iter(&line) {
                emit.emit(&m.as_str().to_lowercase(), "1")?;
            }
        }
        Ok(())
    }
}

struct WordcountReducer {
    parts: PartWriters,
}

impl Reducer for WordcountReducer {
    fn reduce(&self, key: &str, values: &mut Values<'_>, partition: usize) -> Result<()> {
        self.parts.write_row(partition, key, values.count())
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    config.num_mappers = args.mappers.unwrap_or(config.num_mappers);
    config.num_reducers = args.reducers.unwrap_or(config.num_reducers);
    config.num_partitions = args.partitions.unwrap_or(config.num_partitions);

    let mut pipeline = Pipeline::new(config);
    pipeline.add_input_dir(&args.input)?;

    let mapper = WordcountMapper { word_re: Regex::new(r"[A-Za-z0-9_']+")? };
    let reducer = WordcountReducer { parts: PartWriters::new(&args.output, pipeline.config().num_partitions) };
    let stats = pipeline.map_reduce(&mapper, &reducer, &HashPartitioner)?;
    let files = reducer.parts.finish()?;

    info!(output = %args.output.display(), files, words = stats.reduce.total_groups, "wordcount done");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
