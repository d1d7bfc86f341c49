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

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown progress level '{0}'")]
    UnknownProgressLevel(String),
    #[error("Extraction interrupted")]
    Interrupted,
    #[error("Progress callback failed: {0}")]
    Callback(String),
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Not a supported mail store: {0}")]
    UnsupportedSource(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    ConfigSyntax(#[from] toml::de::Error),
    #[error(transparent)]
    Serialise(#[from] toml::ser::Error),
}

impl Error {
    /// Whether this error represents a stop requested by the host rather than
    /// something going wrong.
    pub fn is_interrupt(&self) -> bool {
        matches!(*self, Error::Interrupted)
    }
}
