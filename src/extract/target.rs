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

//! Destinations for extracted data.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

use log::debug;

use super::message::MessageRecord;
use super::summary::FolderSummary;
use crate::store::{ItemKind, StoreItem};
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::safe_name::sanitise_name;

const FOLDER_SUMMARY_FILE: &str = "folder.toml";

/// The position of a folder within the store, as the names of the folders
/// leading to it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct FolderPath(Vec<String>);

impl FolderPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_owned());
        FolderPath(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FolderPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.0.join("/"))
        }
    }
}

/// Receives the normalised contents of a store.
///
/// Calls arrive in walk order: `enter_folder` for a folder, then its items,
/// then (recursively) its subfolders, then `leave_folder`. Ordinals count
/// items of the same kind within a folder, starting at 1.
///
/// An error from `write_message` or `write_item` only causes that item to be
/// skipped; an error from `enter_folder` or `leave_folder` ends the run.
pub trait ExtractionTarget {
    fn enter_folder(&mut self, path: &FolderPath) -> Result<(), Error>;

    fn write_message(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        record: &MessageRecord,
    ) -> Result<(), Error>;

    /// Write a contact or appointment.
    fn write_item(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        item: &StoreItem,
    ) -> Result<(), Error>;

    fn leave_folder(
        &mut self,
        path: &FolderPath,
        summary: &FolderSummary,
    ) -> Result<(), Error>;
}

impl<T: ExtractionTarget + ?Sized> ExtractionTarget for Box<T> {
    fn enter_folder(&mut self, path: &FolderPath) -> Result<(), Error> {
        (**self).enter_folder(path)
    }

    fn write_message(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        record: &MessageRecord,
    ) -> Result<(), Error> {
        (**self).write_message(path, ordinal, record)
    }

    fn write_item(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        item: &StoreItem,
    ) -> Result<(), Error> {
        (**self).write_item(path, ordinal, item)
    }

    fn leave_folder(
        &mut self,
        path: &FolderPath,
        summary: &FolderSummary,
    ) -> Result<(), Error> {
        (**self).leave_folder(path, summary)
    }
}

/// A target which discards everything, for dry runs.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTarget;

impl ExtractionTarget for NullTarget {
    fn enter_folder(&mut self, _: &FolderPath) -> Result<(), Error> {
        Ok(())
    }

    fn write_message(
        &mut self,
        _: &FolderPath,
        _: u64,
        _: &MessageRecord,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn write_item(
        &mut self,
        _: &FolderPath,
        _: u64,
        _: &StoreItem,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn leave_folder(
        &mut self,
        _: &FolderPath,
        _: &FolderSummary,
    ) -> Result<(), Error> {
        Ok(())
    }
}

/// Writes the normalised hierarchy into a directory tree.
///
/// Each folder becomes a directory named after it (made safe for the file
/// system), holding `message_N.toml` for each message, `contact_N.vcf` and
/// `appointment_N.ics` copies of the other items, and `folder.toml` with the
/// folder's summary.
///
/// Sibling folders whose names come out the same once made safe (including
/// names differing only in case) get distinct directories by appending `_2`,
/// `_3`, etc. Item files are never overwritten; an item whose file already
/// exists fails instead.
#[derive(Clone, Debug)]
pub struct DirectoryTarget {
    root: PathBuf,
    max_name_length: usize,
    /// The directory of every folder which has been entered but not left.
    dirs: HashMap<FolderPath, PathBuf>,
    /// For each open folder, the lower-cased directory names taken by its
    /// children so far.
    taken: HashMap<FolderPath, HashSet<String>>,
}

impl DirectoryTarget {
    /// Create a target writing under `root`, which is created if needed.
    pub fn new(root: PathBuf, max_name_length: usize) -> Result<Self, Error> {
        fs::create_dir_all(&root)?;
        Ok(DirectoryTarget {
            root,
            max_name_length,
            dirs: HashMap::new(),
            taken: HashMap::new(),
        })
    }

    fn folder_dir(&self, path: &FolderPath) -> Result<PathBuf, Error> {
        if path.segments().is_empty() {
            return Ok(self.root.clone());
        }

        self.dirs.get(path).cloned().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Folder {} has not been entered", path),
            ))
        })
    }

    /// Choose the directory for `path`, whose parent must already be open.
    fn allocate_dir(&mut self, path: &FolderPath) -> Result<PathBuf, Error> {
        let segments = path.segments();
        let (name, parent_segments) = match segments.split_last() {
            Some(split) => split,
            None => return Ok(self.root.clone()),
        };

        let parent = FolderPath(parent_segments.to_vec());
        let parent_dir = self.folder_dir(&parent)?;
        let taken = self.taken.entry(parent).or_insert_with(HashSet::new);

        let base = sanitise_name(name, self.max_name_length);
        let mut dir_name = base.clone();
        let mut n = 1;
        while !taken.insert(dir_name.to_lowercase()) {
            n += 1;
            dir_name = format!("{}_{}", base, n);
        }

        Ok(parent_dir.join(dir_name))
    }
}

impl ExtractionTarget for DirectoryTarget {
    fn enter_folder(&mut self, path: &FolderPath) -> Result<(), Error> {
        if self.dirs.contains_key(path) {
            return Ok(());
        }

        let dir = self.allocate_dir(path)?;
        debug!("Creating {}", dir.display());
        fs::create_dir(&dir).ignore_already_exists()?;
        self.dirs.insert(path.clone(), dir);
        Ok(())
    }

    fn write_message(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        record: &MessageRecord,
    ) -> Result<(), Error> {
        let data = toml::to_string(record)?;
        file_ops::spit(
            self.folder_dir(path)?
                .join(format!("message_{}.toml", ordinal)),
            false,
            data.as_bytes(),
        )?;
        Ok(())
    }

    fn write_item(
        &mut self,
        path: &FolderPath,
        ordinal: u64,
        item: &StoreItem,
    ) -> Result<(), Error> {
        let file_name = match item.kind {
            ItemKind::Message => format!("message_{}.eml", ordinal),
            ItemKind::Contact => format!("contact_{}.vcf", ordinal),
            ItemKind::Appointment => format!("appointment_{}.ics", ordinal),
        };
        file_ops::spit(
            self.folder_dir(path)?.join(file_name),
            false,
            &item.data,
        )?;
        Ok(())
    }

    fn leave_folder(
        &mut self,
        path: &FolderPath,
        summary: &FolderSummary,
    ) -> Result<(), Error> {
        let data = toml::to_string(summary)?;
        file_ops::spit(
            self.folder_dir(path)?.join(FOLDER_SUMMARY_FILE),
            true,
            data.as_bytes(),
        )?;

        self.dirs.remove(path);
        self.taken.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::extract::date_range::DateRange;
    use crate::extract::summary::ExtractionCounters;

    #[test]
    fn folder_paths() {
        let root = FolderPath::root();
        assert_eq!("/", root.to_string());
        assert!(root.segments().is_empty());

        let inbox = root.child("Mail").child("Inbox");
        assert_eq!("Mail/Inbox", inbox.to_string());
        assert_eq!(["Mail", "Inbox"], inbox.segments());
    }

    #[test]
    fn directory_target_layout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().join("out");
        let mut target = DirectoryTarget::new(out.clone(), 10).unwrap();

        let top = FolderPath::root().child("Mail");
        let sub = top.child("../Very long folder name");

        target.enter_folder(&top).unwrap();
        target.enter_folder(&top).unwrap();
        target.enter_folder(&sub).unwrap();

        let record = MessageRecord {
            id: "a.eml".to_owned(),
            subject: Some("Hello".to_owned()),
            size: 42,
            ..MessageRecord::default()
        };
        target.write_message(&sub, 1, &record).unwrap();
        target
            .write_item(
                &sub,
                3,
                &StoreItem {
                    kind: ItemKind::Contact,
                    id: "x.vcf".to_owned(),
                    data: b"BEGIN:VCARD\r\n".to_vec(),
                },
            )
            .unwrap();
        target
            .leave_folder(
                &sub,
                &FolderSummary::new(
                    "../Very long folder name",
                    sub.to_string(),
                    ExtractionCounters::default(),
                    &DateRange::new(),
                ),
            )
            .unwrap();

        let sub_dir = out.join("Mail").join("_._Very lo");
        let message =
            fs::read_to_string(sub_dir.join("message_1.toml")).unwrap();
        assert!(message.contains("subject = \"Hello\""));
        assert!(message.contains("size = 42"));
        assert_eq!(
            b"BEGIN:VCARD\r\n",
            &fs::read(sub_dir.join("contact_3.vcf")).unwrap()[..]
        );
        assert!(fs::read_to_string(sub_dir.join("folder.toml"))
            .unwrap()
            .contains("name = \"../Very long folder name\""));
    }

    #[test]
    fn colliding_siblings_get_distinct_directories() {
        let tmp = tempfile::TempDir::new().unwrap();
        let out = tmp.path().to_owned();
        let mut target = DirectoryTarget::new(out.clone(), 7).unwrap();

        let root = FolderPath::root();
        let record = MessageRecord::default();
        let names = [
            "Sent",
            "Sent",
            "SENT",
            "a/b",
            "a_b",
            "Archive2019",
            "Archive2020",
        ];
        for name in &names {
            let path = root.child(name);
            target.enter_folder(&path).unwrap();
            target.write_message(&path, 1, &record).unwrap();
        }

        for dir in &[
            "Sent", "Sent_2", "SENT_3", "a_b", "a_b_2", "Archive", "Archive_2",
        ] {
            assert!(
                out.join(dir).join("message_1.toml").is_file(),
                "{} was not written",
                dir
            );
        }

        // Names are only reserved while the parent is open
        let inbox = root.child("Inbox");
        target.enter_folder(&inbox).unwrap();
        target.enter_folder(&inbox.child("Sent")).unwrap();
        assert!(out.join("Inbox").join("Sent").is_dir());
    }

    #[test]
    fn existing_items_are_not_overwritten() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut target =
            DirectoryTarget::new(tmp.path().to_owned(), 64).unwrap();
        let path = FolderPath::root().child("Inbox");
        target.enter_folder(&path).unwrap();

        let first = MessageRecord {
            subject: Some("first".to_owned()),
            ..MessageRecord::default()
        };
        let second = MessageRecord {
            subject: Some("second".to_owned()),
            ..MessageRecord::default()
        };
        target.write_message(&path, 1, &first).unwrap();
        assert_matches!(
            Err(Error::Io(_)),
            target.write_message(&path, 1, &second)
        );
        assert!(fs::read_to_string(
            tmp.path().join("Inbox").join("message_1.toml")
        )
        .unwrap()
        .contains("first"));
    }

    #[test]
    fn extraction_keeps_messages_of_colliding_folders() {
        use crate::extract::progress::{ProgressChannel, ProgressLevelFilter};
        use crate::extract::walker::ExtractionWalker;
        use crate::store::local::LocalStore;

        let tmp = tempfile::TempDir::new().unwrap();
        let source = tmp.path().join("source");
        let out = tmp.path().join("out");
        fs::create_dir_all(source.join("Sent")).unwrap();
        fs::write(
            source.join("Sent").join("a.eml"),
            "Subject: from the directory\r\n\r\nbody\r\n",
        )
        .unwrap();
        fs::write(
            source.join("Sent.mbox"),
            "From someone Mon May 14 19:36:00 2001\n\
             Subject: from the mbox\n\
             \n\
             body\n",
        )
        .unwrap();

        let mut store = LocalStore::open(&source).unwrap();
        let mut walker = ExtractionWalker::new(
            ProgressChannel::new(ProgressLevelFilter::Off),
            DirectoryTarget::new(out.clone(), 64).unwrap(),
        );
        let summary = walker.run(&mut store).unwrap();
        assert_eq!(2, summary.counters.messages);
        assert_eq!(0, summary.counters.skipped);

        assert!(fs::read_to_string(out.join("Sent").join("message_1.toml"))
            .unwrap()
            .contains("from the directory"));
        assert!(
            fs::read_to_string(out.join("Sent_2").join("message_1.toml"))
                .unwrap()
                .contains("from the mbox")
        );
    }

    #[test]
    fn writing_into_missing_folder_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut target =
            DirectoryTarget::new(tmp.path().to_owned(), 64).unwrap();
        assert_matches!(
            Err(Error::Io(_)),
            target.write_message(
                &FolderPath::root().child("never-entered"),
                1,
                &MessageRecord::default()
            )
        );
    }

    #[test]
    fn boxed_target_delegates() {
        let mut target: Box<dyn ExtractionTarget> = Box::new(NullTarget);
        target.enter_folder(&FolderPath::root()).unwrap();
    }
}
