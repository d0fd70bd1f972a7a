use anyhow::Context;
use blocking_queue::demo::{self, DemoConfig};
use blocking_queue::trace::init_tracing;

fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = DemoConfig::from_env().context("invalid demo configuration")?;
    demo::run(&config).context("demo failed")?;
    Ok(())
}
