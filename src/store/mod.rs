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

//! The interface to mail store drivers.
//!
//! A store is a tree of folders, each holding items. Reading an individual
//! item may fail without the folder as a whole being unusable, which is why
//! item iterators yield a `Result` per item.

use std::fmt;

use crate::support::error::Error;

pub mod local;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// An RFC 822 message.
    Message,
    /// A vCard.
    Contact,
    /// An iCalendar object.
    Appointment,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ItemKind::Message => "message",
            ItemKind::Contact => "contact",
            ItemKind::Appointment => "appointment",
        })
    }
}

/// One item read out of a folder.
#[derive(Clone, Debug)]
pub struct StoreItem {
    pub kind: ItemKind,
    /// Identifies the item within the store, for use in diagnostics.
    pub id: String,
    pub data: Vec<u8>,
}

/// An item of a folder that could not be read.
#[derive(Debug)]
pub struct ItemFailure {
    pub kind: ItemKind,
    pub id: String,
    pub error: Error,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to read {} {}: {}", self.kind, self.id, self.error)
    }
}

pub type ItemIter<'a> =
    Box<dyn Iterator<Item = Result<StoreItem, ItemFailure>> + 'a>;

pub trait MailStore {
    type Folder: StoreFolder;

    /// A human-readable description of the store, such as its path.
    fn description(&self) -> String;

    /// Open the root folder of the store.
    fn root(&mut self) -> Result<Self::Folder, Error>;
}

pub trait StoreFolder: Sized {
    fn name(&self) -> &str;

    /// List the items directly in this folder.
    ///
    /// An `Err` means the folder could not be read at all.
    fn items(&mut self) -> Result<ItemIter<'_>, Error>;

    fn subfolders(&mut self) -> Result<Vec<Self>, Error>;
}
