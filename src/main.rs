//! promtable CLI entry point.

use promtable::cli::{self, Cli};

fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli)?;
    Ok(())
}
