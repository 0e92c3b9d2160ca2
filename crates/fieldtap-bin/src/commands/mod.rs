// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI subcommands. `run` is the only one that touches a server.

mod info;
mod run;
mod validate;
mod version;

pub use info::info;
pub use run::run;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;

/// Dispatches to the selected subcommand; `run` when none was given.
pub async fn execute(cli: Cli) -> BinResult<()> {
    match cli.effective_command() {
        Commands::Run(args) => run(&cli, args).await,
        Commands::Validate(args) => validate(&cli, args),
        Commands::Info(args) => info(&cli, args),
        Commands::Version => version(&cli),
    }
}
