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

use chrono::prelude::*;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The span of time covered by the messages of a folder (and, once folded
/// up, its descendants).
///
/// Either both ends are known or neither is; the range only ever grows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl DateRange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widen the range to include `t`.
    pub fn extend_instant(&mut self, t: DateTime<Utc>) {
        self.bounds = Some(match self.bounds {
            None => (t, t),
            Some((start, end)) => (start.min(t), end.max(t)),
        });
    }

    /// Widen the range to include all of `other`.
    pub fn extend_range(&mut self, other: &DateRange) {
        if let Some((start, end)) = other.bounds {
            self.extend_instant(start);
            self.extend_instant(end);
        }
    }

    pub fn is_defined(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.bounds.map(|(start, _)| start)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.bounds.map(|(_, end)| end)
    }

    pub fn iso_start(&self) -> Option<String> {
        format_iso(self.start())
    }

    pub fn iso_end(&self) -> Option<String> {
        format_iso(self.end())
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.iso_start(), self.iso_end()) {
            (Some(start), Some(end)) => write!(f, "{} .. {}", start, end),
            _ => write!(f, "no dates"),
        }
    }
}

/// Format `t` as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_iso(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(|t| t.format(ISO_FORMAT).to_string())
}
