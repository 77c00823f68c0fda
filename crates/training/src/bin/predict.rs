use clap::Parser;
use training::cli::{run_predict, PredictArgs};
use training::telemetry::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = PredictArgs::parse();
    run_predict(args)
}
