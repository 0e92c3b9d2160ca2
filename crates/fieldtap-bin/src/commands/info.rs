// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `info` command.

use fieldtap_config::{default_category, plugin_info};

use crate::cli::{Cli, InfoArgs};
use crate::error::BinResult;

/// Prints the plugin information, or only its default category.
pub fn info(_cli: &Cli, args: InfoArgs) -> BinResult<()> {
    println!("{}", render(&args)?);
    Ok(())
}

fn render(args: &InfoArgs) -> BinResult<String> {
    let value = if args.category {
        default_category()
    } else {
        serde_json::to_value(plugin_info())?
    };

    Ok(if args.compact {
        serde_json::to_string(&value)?
    } else {
        serde_json::to_string_pretty(&value)?
    })
}
