//! The querysim server binary.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use anyhow::Result;

fn main() -> Result<()> {
    querysim_server::cli::execute()
}
