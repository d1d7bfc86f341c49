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

//! The depth-first walk over a mail store.
//!
//! Failures are split into two classes. Anything that goes wrong with a single
//! item (it can't be read, isn't a message, or can't be written) is reported
//! as a `WARNING` and the item is counted as skipped. Anything else (a folder
//! that can't be listed, the target refusing a folder, the progress callback
//! failing, or an interrupt) ends the run, and the caller gets a
//! `RunFailure` holding what had been extracted up to that point.

use log::warn;

use super::date_range::DateRange;
use super::message::{parse_message, ParsedMessage};
use super::progress::{ProgressChannel, ProgressLevel};
use super::summary::{
    ExtractionCounters, ExtractionSummary, FolderSummary, RunFailure,
};
use super::target::{ExtractionTarget, FolderPath};
use crate::store::{ItemFailure, ItemKind, MailStore, StoreFolder, StoreItem};
use crate::support::error::Error;

#[derive(Debug)]
pub struct ExtractionWalker<T> {
    channel: ProgressChannel,
    target: T,
    counters: ExtractionCounters,
    range: DateRange,
}

impl<T: ExtractionTarget> ExtractionWalker<T> {
    pub fn new(channel: ProgressChannel, target: T) -> Self {
        ExtractionWalker {
            channel,
            target,
            counters: ExtractionCounters::default(),
            range: DateRange::new(),
        }
    }

    #[cfg(test)]
    pub fn target(&self) -> &T {
        &self.target
    }

    #[cfg(test)]
    pub fn into_target(self) -> T {
        self.target
    }

    /// Extract everything in `store` into the target.
    ///
    /// Counters and the date range start from zero on every call.
    pub fn run<S: MailStore>(
        &mut self,
        store: &mut S,
    ) -> Result<ExtractionSummary, RunFailure> {
        self.counters = ExtractionCounters::default();
        self.range = DateRange::new();

        match self.walk_store(store) {
            Ok(()) => Ok(self.summary()),
            Err(error) => Err(self.fail(error)),
        }
    }

    fn summary(&self) -> ExtractionSummary {
        ExtractionSummary {
            counters: self.counters,
            range: self.range,
        }
    }

    /// Report a fatal error and build the `RunFailure` for it.
    fn fail(&mut self, error: Error) -> RunFailure {
        let summary = self.summary();
        let message = if error.is_interrupt() {
            format!("Extraction interrupted after {}", summary)
        } else {
            format!("Extraction failed after {}: {}", summary, error)
        };

        if let Err(e) = self
            .channel
            .emit_without_suspension(ProgressLevel::Global, &message)
        {
            warn!("Failed to report end of extraction: {}", e);
        }

        RunFailure { summary, error }
    }

    fn walk_store<S: MailStore>(&mut self, store: &mut S) -> Result<(), Error> {
        let description = store.description();
        self.channel.emit(
            ProgressLevel::Global,
            &format!("Starting extraction of {}", description),
        )?;

        let mut root = store.root()?;
        self.walk_folder(&mut root, &FolderPath::root())?;

        let summary = self.summary();
        self.channel.emit(
            ProgressLevel::Global,
            &format!("Finished extraction of {}: {}", description, summary),
        )
    }

    /// Walk `folder` and everything beneath it, returning the range of
    /// dates found.
    fn walk_folder<F: StoreFolder>(
        &mut self,
        folder: &mut F,
        path: &FolderPath,
    ) -> Result<DateRange, Error> {
        let before = self.counters;
        self.counters.folders += 1;

        self.channel.emit(
            ProgressLevel::Folder,
            &format!("Entering folder {} ({})", folder.name(), path),
        )?;
        self.target.enter_folder(path)?;

        let mut range = DateRange::new();
        for item in folder.items()? {
            self.process_item(path, &before, item, &mut range)?;
        }

        for mut subfolder in folder.subfolders()? {
            let sub_path = path.child(subfolder.name());
            let sub_range = self.walk_folder(&mut subfolder, &sub_path)?;
            range.extend_range(&sub_range);
        }

        let summary = FolderSummary::new(
            folder.name(),
            path.to_string(),
            self.counters.since(&before),
            &range,
        );
        self.target.leave_folder(path, &summary)?;
        self.channel.emit(
            ProgressLevel::Folder,
            &format!(
                "Finished folder {} ({}): {}; {}",
                folder.name(),
                path,
                summary.counters,
                range
            ),
        )?;

        Ok(range)
    }

    /// Handle one item of the folder at `path`.
    ///
    /// `before` is the counter snapshot taken on entering the folder. The only
    /// errors returned are fatal ones.
    fn process_item(
        &mut self,
        path: &FolderPath,
        before: &ExtractionCounters,
        item: Result<StoreItem, ItemFailure>,
        range: &mut DateRange,
    ) -> Result<(), Error> {
        let (kind, id) = match item {
            Ok(ref item) => (item.kind, item.id.clone()),
            Err(ref failure) => (failure.kind, failure.id.clone()),
        };

        self.counters.count_item(kind);
        let ordinal = self.counters.since(before).of_kind(kind);
        let processed = self.counters.items();

        self.channel.emit(
            ProgressLevel::Message,
            &format!("Processing {} {} in {}", kind, id, path),
        )?;
        self.channel.emit_if_step(
            ProgressLevel::MessageGroup,
            processed,
            &format!("{} items processed", processed),
        )?;

        let item = match item {
            Ok(item) => item,
            Err(failure) => return self.skip(&id, &failure.error),
        };
        self.counters.total_size += item.data.len() as u64;

        let result = match kind {
            ItemKind::Message => self
                .extract_message(path, ordinal, &item)
                .map(Some),
            ItemKind::Contact | ItemKind::Appointment => self
                .target
                .write_item(path, ordinal, &item)
                .map(|()| None),
        };

        match result {
            Ok(Some(parsed)) => self.message_extracted(&id, parsed, range),
            Ok(None) => Ok(()),
            Err(error) => self.skip(&id, &error),
        }
    }

    fn extract_message(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        item: &StoreItem,
    ) -> Result<ParsedMessage, Error> {
        let parsed = parse_message(&item.id, &item.data)?;
        self.target.write_message(path, ordinal, &parsed.record)?;
        Ok(parsed)
    }

    fn message_extracted(
        &mut self,
        id: &str,
        parsed: ParsedMessage,
        range: &mut DateRange,
    ) -> Result<(), Error> {
        for warning in &parsed.warnings {
            self.channel
                .emit(ProgressLevel::Warning, &format!("{}: {}", id, warning))?;
        }

        let record = &parsed.record;
        if let Some(sent) = record.sent {
            range.extend_instant(sent);
            self.range.extend_instant(sent);
        }

        // The event still has to go through the channel so that interrupts
        // are noticed, but there is no point describing it if it's filtered.
        let enabled = self.channel.is_enabled(ProgressLevel::MessageDetails);
        let details = if !enabled {
            String::new()
        } else if record.sent.is_some() {
            format!(
                "{}: sent {}, subject {:?}",
                id,
                record.date.as_deref().unwrap_or("?"),
                record.subject.as_deref().unwrap_or("")
            )
        } else {
            format!("{} has no usable Date header", id)
        };
        self.channel.emit(ProgressLevel::MessageDetails, &details)
    }

    fn skip(&mut self, id: &str, error: &Error) -> Result<(), Error> {
        self.counters.skipped += 1;
        self.channel.emit(
            ProgressLevel::Warning,
            &format!("Skipped {}: {}", id, error),
        )
    }
}
