use clap::Parser;
use training::cli::{run_encode, EncodeArgs};
use training::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = EncodeArgs::parse();
    run_encode(args)
}
