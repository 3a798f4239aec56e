use anyhow::Result;
use clap::Parser;
use imgstego::cli::{CommandLineHandler, CommandLineInterface};

fn main() -> Result<()> {
    let cli = CommandLineInterface::parse();
    let mut handler = CommandLineHandler::new();
    handler.process_command(cli)?;
    Ok(())
}
