mod controls;
mod driver;
mod scene;

use anyhow::Context;
use strata_engine::device::GpuInit;
use strata_engine::logging::{init_logging, LoggingConfig};
use strata_engine::window::{Runtime, RuntimeConfig};

use driver::{FrameDriver, Studio};

fn main() -> anyhow::Result<()> {
    init_logging(LoggingConfig::default());

    let mut driver = FrameDriver::new();
    driver.load_scene().context("failed to load scene")?;

    let config = RuntimeConfig {
        title: "strata studio".to_string(),
        ..RuntimeConfig::default()
    };
    Runtime::run(config, GpuInit::default(), Studio::new(driver))
}
