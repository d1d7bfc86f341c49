//-
// Copyright (c) 2020, Jason Lingle
//
// This file is part of Mailextract.
//
// Mailextract is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Mailextract is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Mailextract. If not, see <http://www.gnu.org/licenses/>.

use log::{error, info};

use super::main::ExtractCommand;
use crate::extract::progress::{LogSink, ProgressChannel};
use crate::extract::target::{DirectoryTarget, ExtractionTarget, NullTarget};
use crate::extract::walker::ExtractionWalker;
use crate::store::local::LocalStore;
use crate::support::extract_config::ExtractConfig;
use crate::support::sysexits::*;

macro_rules! fatal {
    ($ex:expr, $($stuff:tt)*) => {{
        error!($($stuff)*);
        $ex.exit()
    }}
}

pub(super) fn extract(cmd: ExtractCommand) {
    let mut config = match cmd.config {
        None => ExtractConfig::default(),
        Some(ref path) => match ExtractConfig::load(path) {
            Ok(config) => config,
            Err(e) => fatal!(
                EX_CONFIG,
                "Error in config file at '{}': {}",
                path.display(),
                e
            ),
        },
    };

    if let Some(level) = cmd.level {
        config.progress.level = level;
    }
    if let Some(step) = cmd.step {
        config.progress.step = step;
    }

    let threshold = match config.progress_filter() {
        Ok(threshold) => threshold,
        Err(e) => fatal!(EX_CONFIG, "{}", e),
    };

    let mut store = match LocalStore::open(&cmd.source) {
        Ok(store) => store,
        Err(e) => fatal!(
            Sysexit::for_error(&e),
            "Unable to open '{}': {}",
            cmd.source.display(),
            e
        ),
    };

    let target: Box<dyn ExtractionTarget> = match cmd.output {
        _ if cmd.dry_run => Box::new(NullTarget),
        None => fatal!(EX_USAGE, "Neither --output nor --dry-run given"),
        Some(ref output) => {
            match DirectoryTarget::new(
                output.clone(),
                config.output.max_name_length,
            ) {
                Ok(target) => Box::new(target),
                Err(e) => fatal!(
                    EX_CANTCREAT,
                    "Unable to create '{}': {}",
                    output.display(),
                    e
                ),
            }
        },
    };

    // The log already carries every event; standard output only gets the
    // periodic item counts.
    let channel = ProgressChannel::new(threshold)
        .with_sink(LogSink)
        .with_pause(config.pause())
        .with_callback(config.progress.step, |counter, message| {
            if counter >= 0 {
                println!("{}", message);
            }
            Ok(())
        });

    let mut walker = ExtractionWalker::new(channel, target);
    match walker.run(&mut store) {
        Ok(summary) => {
            info!("Extraction of '{}' complete", cmd.source.display());
            println!("{}", summary);
        },
        Err(failure) => {
            println!("{}", failure.summary);
            fatal!(Sysexit::for_error(&failure.error), "{}", failure)
        },
    }
}
