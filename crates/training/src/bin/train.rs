use clap::Parser;
use training::cli::{run_train, TrainArgs};
use training::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = TrainArgs::parse();
    run_train(args)
}
