//! lenswarp-studio: command-line front end for the lenswarp engine.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use lenswarp_engine::logging::{init_logging, LoggingConfig};

use cli::{chroma_mode, Cli, Command};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(match cli.log.clone() {
        Some(filter) => LoggingConfig::with_filter(filter),
        None => LoggingConfig::default(),
    });

    let config = commands::load_config(cli.profile.as_deref(), cli.fit())?;

    match cli.command {
        Command::Lookup { target, png } => commands::lookup(
            &config,
            target.size,
            target.eye.into(),
            chroma_mode(target.chroma),
            png.as_deref(),
        ),
        Command::Mesh { grid, eye, chroma, json } => {
            commands::mesh(&config, grid, eye.into(), chroma_mode(chroma), json.as_deref())
        }
        Command::Preview { size, chroma, square, out } => {
            commands::preview(&config, size, chroma_mode(chroma), square, &out)
        }
        Command::GpuCheck { size, grid, chroma, fallback, png } => commands::gpu_check(
            &config,
            commands::GpuCheck {
                size,
                grid,
                mode: chroma_mode(chroma),
                fallback,
                png: png.as_deref(),
            },
        ),
    }
}
