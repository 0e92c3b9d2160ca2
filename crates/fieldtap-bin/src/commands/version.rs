// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use std::fmt::Write as _;

use fieldtap_config::info::{INTERFACE_VERSION, PLUGIN_NAME};

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints the crate, plugin and transport versions.
pub fn version(_cli: &Cli) -> BinResult<()> {
    print!("{}", render());
    Ok(())
}

fn render() -> String {
    let transport = if cfg!(feature = "real-transport") {
        "opc.tcp client"
    } else {
        "simulation only"
    };

    let mut out = String::new();
    let _ = writeln!(out, "fieldtap {}", crate::VERSION);
    let _ = writeln!(out, "  plugin:    {} (interface {})", PLUGIN_NAME, INTERFACE_VERSION);
    let _ = writeln!(out, "  transport: {}", transport);
    let _ = writeln!(
        out,
        "  platform:  {}-{}",
        std::env::consts::ARCH,
        std::env::consts::OS
    );
    out
}
