use clap::Parser;

use sql_replay::cli::{self, Args};
use sql_replay::logging::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let args = Args::parse();
    let cache_path = cli::resolve_cache_path(args.cache);
    let output = args.command.run(&cache_path, args.format)?;
    println!("{}", output);
    Ok(())
}
