/*
 * ipcheck - external IP status for Waybar
 * Copyright (C) 2025 Akaere Networks
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::io;

use ipcheck::config::Cli;
use ipcheck::core::logger;
use ipcheck::{Checker, Formatter, GeoClient, log_debug};

fn main() -> Result<()> {
    let args = Cli::parse();

    logger::init_from_args(args.verbosity, args.debug)?;
    log_debug!("{:?}", args);

    // Bad templates are a configuration error: fail before any request
    let formatter = Formatter::new(&args.text_fmt, &args.alt_fmt, &args.tooltip_fmt)
        .context("invalid output format")?;

    let client = GeoClient::new(args.endpoints(), args.timeout())
        .context("failed to build HTTP client")?;

    let mut checker = Checker::new(client, formatter, args.checker_options());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    checker.run(&args.ips, &mut out)
}
