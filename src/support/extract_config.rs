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

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;
use crate::extract::progress::ProgressLevelFilter;

/// The configuration of an extraction run.
///
/// This is usually read from a TOML file passed with `--config`; every field
/// has a default, so an empty file (or no file at all) is valid. Command-line
/// options override whatever is loaded here.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ExtractConfig {
    /// How much progress information is reported.
    #[serde(default)]
    pub progress: ProgressConfig,

    /// Options for the normalised output tree.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// The least important progress level which is still reported.
    ///
    /// One of `OFF`, `GLOBAL`, `WARNING`, `FOLDER`, `MESSAGE_GROUP`,
    /// `MESSAGE`, or `MESSAGE_DETAILS`. An unknown name is rejected before
    /// extraction begins.
    pub level: String,

    /// The number of items between two `MESSAGE_GROUP` notifications to the
    /// progress callback.
    pub step: u64,

    /// How long, in milliseconds, to pause after each event handed to the
    /// progress callback, so that a UI consuming the callback gets a chance
    /// to redraw.
    pub pause_millis: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        ProgressConfig {
            level: "FOLDER".to_owned(),
            step: 1000,
            pause_millis: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// The maximum length, in characters, of a directory name derived from a
    /// folder name.
    pub max_name_length: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            max_name_length: 64,
        }
    }
}

impl ExtractConfig {
    /// Load the configuration from the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let data = fs::read(path)?;
        Ok(toml::from_slice(&data)?)
    }

    pub fn progress_filter(&self) -> Result<ProgressLevelFilter, Error> {
        self.progress.level.parse()
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.progress.pause_millis)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extract::progress::ProgressLevel;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ExtractConfig = toml::from_str("").unwrap();
        assert_eq!(
            ProgressLevelFilter::Level(ProgressLevel::Folder),
            config.progress_filter().unwrap()
        );
        assert_eq!(1000, config.progress.step);
        assert_eq!(Duration::from_millis(1), config.pause());
        assert_eq!(64, config.output.max_name_length);
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let config: ExtractConfig = toml::from_str(
            "\
[progress]
level = \"message_group\"
step = 50

[output]
max_name_length = 20
",
        )
        .unwrap();

        assert_eq!(
            ProgressLevelFilter::Level(ProgressLevel::MessageGroup),
            config.progress_filter().unwrap()
        );
        assert_eq!(50, config.progress.step);
        assert_eq!(1, config.progress.pause_millis);
        assert_eq!(20, config.output.max_name_length);
    }

    #[test]
    fn unknown_level_is_rejected() {
        let config: ExtractConfig =
            toml::from_str("[progress]\nlevel = \"CHATTY\"\n").unwrap();
        assert_matches!(
            Err(Error::UnknownProgressLevel(_)),
            config.progress_filter()
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("mailextract.toml");
        fs::write(&path, "[progress]\nlevel = \"OFF\"\n").unwrap();

        let config = ExtractConfig::load(&path).unwrap();
        assert_eq!(ProgressLevelFilter::Off, config.progress_filter().unwrap());

        fs::write(&path, "[progress\n").unwrap();
        assert_matches!(
            Err(Error::ConfigSyntax(_)),
            ExtractConfig::load(&path)
        );
    }
}
