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

use std::path::PathBuf;

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use structopt::StructOpt;

use crate::support::sysexits::*;

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    Extract(ExtractCommand),
    /// Inspect individual header values.
    Header(HeaderCommand),
}

/// Walk a mail store and write out its normalised contents.
///
/// The source is a directory tree: every directory is a folder, `*.eml`
/// files are messages, `*.vcf` files contacts and `*.ics` files
/// appointments. Each `*.mbox` file is treated as a folder of its own.
///
/// The output directory mirrors the folder hierarchy. Every message becomes
/// a `message_N.toml` file describing its normalised headers, and each
/// folder gets a `folder.toml` with its counts and date range.
///
/// Progress events go to the log (standard error unless `--log-config` says
/// otherwise). Standard output only gets a running item count every `--step`
/// items and the final summary. The level names accepted by `--level` are
/// OFF, GLOBAL, WARNING, FOLDER, MESSAGE_GROUP, MESSAGE and MESSAGE_DETAILS.
#[derive(StructOpt)]
pub(super) struct ExtractCommand {
    /// The mail store to read.
    #[structopt(long, short, parse(from_os_str))]
    pub(super) source: PathBuf,

    /// Where to write the normalised hierarchy.
    #[structopt(
        long,
        short,
        parse(from_os_str),
        required_unless = "dry-run"
    )]
    pub(super) output: Option<PathBuf>,

    /// Walk the store and report progress without writing anything.
    #[structopt(long)]
    pub(super) dry_run: bool,

    /// The least important progress level to report, overriding the
    /// configuration file.
    #[structopt(long, short)]
    pub(super) level: Option<String>,

    /// How many items pass between two group progress reports, overriding
    /// the configuration file.
    #[structopt(long)]
    pub(super) step: Option<u64>,

    /// TOML file with extraction settings.
    #[structopt(long, short, parse(from_os_str))]
    pub(super) config: Option<PathBuf>,

    /// log4rs TOML file to configure logging with, instead of logging to
    /// standard error.
    #[structopt(long, parse(from_os_str))]
    pub(super) log_config: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) enum HeaderCommand {
    /// Decode RFC 2047 encoded words and print the result.
    Decode {
        /// The raw header value.
        text: String,
    },
    /// Parse an address list header and print each normalised, distinct
    /// address on its own line.
    ///
    /// A value which does not parse as an address list is printed verbatim,
    /// with a warning on standard error.
    Addresses {
        /// The raw header value.
        text: String,
    },
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        },
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        },
    });

    match cmd {
        Command::Extract(cmd) => {
            init_log(cmd.log_config.as_ref());
            super::extract::extract(cmd);
        },
        Command::Header(cmd) => {
            init_log(None);
            super::header::header(cmd);
        },
    }
}

fn init_log(log_config_file: Option<&PathBuf>) {
    if let Some(log_config_file) = log_config_file {
        if let Err(e) = log4rs::init_file(
            log_config_file,
            log4rs::file::Deserializers::new(),
        ) {
            die!(
                EX_CONFIG,
                "Error in logging config at '{}': {}",
                log_config_file.display(),
                e
            );
        }
        return;
    }

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S%.3f)} [{l}][{t}] {m}{n}",
        )))
        .build();
    let config = match Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Info))
    {
        Ok(config) => config,
        Err(e) => die!(EX_SOFTWARE, "Failed to configure logging: {}", e),
    };

    if let Err(e) = log4rs::init_config(config) {
        die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
    }
}
