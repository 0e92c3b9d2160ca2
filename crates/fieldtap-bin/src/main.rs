// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! fieldtap - OPC UA data change gateway
//!
//! Main binary entry point.

use fieldtap_bin::error::report_error_and_exit;
use fieldtap_bin::{Cli, commands, init_for_cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_for_cli(&cli);

    if let Err(e) = commands::execute(cli).await {
        report_error_and_exit(e);
    }
}
