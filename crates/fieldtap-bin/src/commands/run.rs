// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::time::Duration;

use tracing::info;

use crate::cli::{Cli, RunArgs};
use crate::error::BinResult;
use crate::runtime::RuntimeBuilder;

/// Executes the `run` command to start the gateway.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    info!(config = %cli.config.display(), simulate = args.simulate, "Starting fieldtap");

    let mut builder = RuntimeBuilder::new().config_path(&cli.config);
    if args.simulate {
        builder = builder.simulate(Duration::from_millis(args.tick_ms.max(1)));
    }

    builder.build()?.run().await
}
