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

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::date_range::DateRange;
use crate::store::ItemKind;
use crate::support::error::Error;

/// Running totals of an extraction.
///
/// Items that fail are still counted under their kind, and additionally
/// under `skipped`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionCounters {
    pub folders: u64,
    pub messages: u64,
    pub contacts: u64,
    pub appointments: u64,
    pub skipped: u64,
    /// Total size of all items read, in bytes.
    pub total_size: u64,
}

impl ExtractionCounters {
    pub fn count_item(&mut self, kind: ItemKind) {
        match kind {
            ItemKind::Message => self.messages += 1,
            ItemKind::Contact => self.contacts += 1,
            ItemKind::Appointment => self.appointments += 1,
        }
    }

    pub fn of_kind(&self, kind: ItemKind) -> u64 {
        match kind {
            ItemKind::Message => self.messages,
            ItemKind::Contact => self.contacts,
            ItemKind::Appointment => self.appointments,
        }
    }

    pub fn items(&self) -> u64 {
        self.messages + self.contacts + self.appointments
    }

    /// Everything counted since `earlier`, which must be a snapshot of this
    /// same set of counters.
    pub fn since(&self, earlier: &ExtractionCounters) -> ExtractionCounters {
        ExtractionCounters {
            folders: self.folders - earlier.folders,
            messages: self.messages - earlier.messages,
            contacts: self.contacts - earlier.contacts,
            appointments: self.appointments - earlier.appointments,
            skipped: self.skipped - earlier.skipped,
            total_size: self.total_size - earlier.total_size,
        }
    }
}

impl fmt::Display for ExtractionCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} folders, {} messages, {} contacts, {} appointments, \
             {} skipped, {} bytes",
            self.folders,
            self.messages,
            self.contacts,
            self.appointments,
            self.skipped,
            self.total_size
        )
    }
}

/// What is recorded about a folder once it has been fully walked.
///
/// Counts and range include all descendant folders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub name: String,
    pub path: String,
    #[serde(flatten)]
    pub counters: ExtractionCounters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

impl FolderSummary {
    pub fn new(
        name: &str,
        path: String,
        counters: ExtractionCounters,
        range: &DateRange,
    ) -> Self {
        FolderSummary {
            name: name.to_owned(),
            path,
            counters,
            start: range.iso_start(),
            end: range.iso_end(),
        }
    }
}

/// The outcome of a complete (or, within a `RunFailure`, partial) run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub counters: ExtractionCounters,
    pub range: DateRange,
}

impl ExtractionSummary {
    pub fn iso_start(&self) -> Option<String> {
        self.range.iso_start()
    }

    pub fn iso_end(&self) -> Option<String> {
        self.range.iso_end()
    }
}

impl fmt::Display for ExtractionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}; {}", self.counters, self.range)
    }
}

/// A run which stopped before the whole store had been walked.
#[derive(Error, Debug)]
#[error("Extraction stopped after {summary}: {error}")]
pub struct RunFailure {
    /// What had been done up to the failure.
    pub summary: ExtractionSummary,
    #[source]
    pub error: Error,
}

impl RunFailure {
    pub fn is_interrupted(&self) -> bool {
        self.error.is_interrupt()
    }
}
