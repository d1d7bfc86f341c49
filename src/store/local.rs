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

//! A mail store made of plain files on the local file system.
//!
//! Every directory is a folder. Within a directory, `*.eml` files are
//! messages, `*.vcf` files contacts and `*.ics` files appointments; each
//! `*.mbox` file is a folder of its own, holding the messages it contains.
//! Hidden files and directories are ignored.

use std::fs;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use log::debug;

use super::*;
use crate::support::error::Error;

const MBOX_EXTENSION: &str = "mbox";

#[derive(Clone, Debug)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Open the store rooted at `path`, which must be a directory or an mbox
    /// file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let md = fs::metadata(path)?;
        if md.is_dir() || (md.is_file() && is_mbox(path)) {
            Ok(LocalStore {
                path: path.to_owned(),
            })
        } else {
            Err(Error::UnsupportedSource(path.display().to_string()))
        }
    }
}

impl MailStore for LocalStore {
    type Folder = LocalFolder;

    fn description(&self) -> String {
        self.path.display().to_string()
    }

    fn root(&mut self) -> Result<LocalFolder, Error> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string());
        Ok(LocalFolder::new(name, self.path.clone()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FolderKind {
    Directory,
    Mbox,
}

#[derive(Clone, Debug)]
pub struct LocalFolder {
    name: String,
    path: PathBuf,
    kind: FolderKind,
}

impl LocalFolder {
    fn new(name: String, path: PathBuf) -> Self {
        let (name, kind) = if is_mbox(&path) && !path.is_dir() {
            let name = Path::new(&name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or(name);
            (name, FolderKind::Mbox)
        } else {
            (name, FolderKind::Directory)
        };

        LocalFolder { name, path, kind }
    }

    /// List the non-hidden entries of this directory, sorted by name.
    fn entries(&self) -> Result<Vec<(String, PathBuf, fs::FileType)>, Error> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }

            entries.push((name, entry.path(), entry.file_type()?));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

impl StoreFolder for LocalFolder {
    fn name(&self) -> &str {
        &self.name
    }

    fn items(&mut self) -> Result<ItemIter<'_>, Error> {
        match self.kind {
            FolderKind::Directory => {
                let files = self
                    .entries()?
                    .into_iter()
                    .filter(|&(_, _, ref file_type)| !file_type.is_dir())
                    .filter_map(|(name, path, _)| {
                        item_kind(&path).map(|kind| (kind, name, path))
                    })
                    .collect::<Vec<_>>();

                Ok(Box::new(files.into_iter().map(|(kind, id, path)| {
                    match fs::read(&path) {
                        Ok(data) => Ok(StoreItem { kind, id, data }),
                        Err(e) => Err(ItemFailure {
                            kind,
                            id,
                            error: e.into(),
                        }),
                    }
                })))
            },

            FolderKind::Mbox => {
                let file = fs::File::open(&self.path)?;
                Ok(Box::new(MboxMessages::new(
                    self.name.clone(),
                    BufReader::new(file),
                )))
            },
        }
    }

    fn subfolders(&mut self) -> Result<Vec<LocalFolder>, Error> {
        if FolderKind::Mbox == self.kind {
            return Ok(Vec::new());
        }

        Ok(self
            .entries()?
            .into_iter()
            .filter(|&(_, ref path, ref file_type)| {
                file_type.is_dir() || (file_type.is_file() && is_mbox(path))
            })
            .map(|(name, path, _)| LocalFolder::new(name, path))
            .collect())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

fn is_mbox(path: &Path) -> bool {
    has_extension(path, MBOX_EXTENSION)
}

fn item_kind(path: &Path) -> Option<ItemKind> {
    if has_extension(path, "eml") {
        Some(ItemKind::Message)
    } else if has_extension(path, "vcf") {
        Some(ItemKind::Contact)
    } else if has_extension(path, "ics") {
        Some(ItemKind::Appointment)
    } else {
        None
    }
}

/// Splits an mbox file into its messages.
///
/// Messages are separated by lines starting with `From `. Lines in the body
/// which were escaped as `>From ` (or `>>From `, etc) lose one `>`. After an
/// I/O error the iterator ends, since there is no telling where the next
/// message would start.
struct MboxMessages<R> {
    folder: String,
    reader: R,
    /// The number of messages returned so far.
    count: usize,
    /// Whether the separator of the next message has already been consumed.
    in_message: bool,
    done: bool,
}

impl<R: BufRead> MboxMessages<R> {
    fn new(folder: String, reader: R) -> Self {
        MboxMessages {
            folder,
            reader,
            count: 0,
            in_message: false,
            done: false,
        }
    }

    fn next_id(&mut self) -> String {
        self.count += 1;
        format!("{}#{}", self.folder, self.count)
    }

    /// Read the next message, returning `None` at EOF.
    fn read_message(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut data = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if 0 == self.reader.read_until(b'\n', &mut line)? {
                self.done = true;
                break;
            }

            if line.starts_with(b"From ") {
                let had_content = self.in_message && !is_blank(&data);
                self.in_message = true;
                if had_content {
                    break;
                }

                data.clear();
                continue;
            }

            self.in_message = true;
            let quotes = line.iter().take_while(|&&b| b'>' == b).count();
            if quotes > 0 && line[quotes..].starts_with(b"From ") {
                data.extend_from_slice(&line[1..]);
            } else {
                data.extend_from_slice(&line);
            }
        }

        if is_blank(&data) {
            return Ok(None);
        }

        // The blank line before the next separator belongs to the separator
        if data.ends_with(b"\r\n\r\n") {
            data.truncate(data.len() - 2);
        } else if data.ends_with(b"\n\n") {
            data.truncate(data.len() - 1);
        }

        Ok(Some(data))
    }
}

impl<R: BufRead> Iterator for MboxMessages<R> {
    type Item = Result<StoreItem, ItemFailure>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.read_message() {
            Ok(Some(data)) => Some(Ok(StoreItem {
                kind: ItemKind::Message,
                id: self.next_id(),
                data,
            })),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                let id = self.next_id();
                debug!("{}: giving up on mbox after error: {}", id, e);
                Some(Err(ItemFailure {
                    kind: ItemKind::Message,
                    id,
                    error: e.into(),
                }))
            },
        }
    }
}

fn is_blank(data: &[u8]) -> bool {
    data.iter().all(u8::is_ascii_whitespace)
}

#[cfg(test)]
mod test {
    use std::io::Read;

    use super::*;

    fn item_summary(folder: &mut LocalFolder) -> Vec<(ItemKind, String)> {
        folder
            .items()
            .unwrap()
            .map(|item| {
                let item = item.unwrap();
                (item.kind, item.id)
            })
            .collect()
    }

    #[test]
    fn directory_layout() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path();
        fs::write(path.join("b.eml"), "Subject: b\r\n\r\n").unwrap();
        fs::write(path.join("a.VCF"), "BEGIN:VCARD\r\n").unwrap();
        fs::write(path.join("c.ics"), "BEGIN:VCALENDAR\r\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();
        fs::write(path.join(".hidden.eml"), "ignored").unwrap();
        fs::create_dir(path.join(".git")).unwrap();
        fs::create_dir(path.join("Sent")).unwrap();
        fs::create_dir(path.join("folder.eml")).unwrap();
        fs::write(path.join("Archive.mbox"), "").unwrap();

        let mut store = LocalStore::open(path).unwrap();
        let mut root_folder = store.root().unwrap();
        assert_eq!(
            vec![
                (ItemKind::Contact, "a.VCF".to_owned()),
                (ItemKind::Message, "b.eml".to_owned()),
                (ItemKind::Appointment, "c.ics".to_owned()),
            ],
            item_summary(&mut root_folder)
        );

        let subfolders = root_folder.subfolders().unwrap();
        assert_eq!(
            vec!["Archive", "Sent", "folder.eml"],
            subfolders.iter().map(|f| f.name()).collect::<Vec<_>>()
        );
        assert_eq!(FolderKind::Mbox, subfolders[0].kind);
        assert_eq!(FolderKind::Directory, subfolders[1].kind);
    }

    #[test]
    fn open_rejects_other_files() {
        let root = tempfile::TempDir::new().unwrap();
        let txt = root.path().join("notes.txt");
        fs::write(&txt, "hello").unwrap();

        assert_matches!(
            Err(Error::UnsupportedSource(_)),
            LocalStore::open(&txt)
        );
        assert_matches!(
            Err(Error::Io(_)),
            LocalStore::open(root.path().join("nonexistent"))
        );
    }

    #[test]
    fn mbox_file_as_root() {
        let root = tempfile::TempDir::new().unwrap();
        let mbox = root.path().join("inbox.mbox");
        fs::write(
            &mbox,
            "From a@b.c Thu Jan  1 00:00:00 1970\n\
             Subject: one\n\
             \n\
             body\n",
        )
        .unwrap();

        let mut store = LocalStore::open(&mbox).unwrap();
        let mut folder = store.root().unwrap();
        assert_eq!("inbox", folder.name());
        assert_eq!(
            vec![(ItemKind::Message, "inbox#1".to_owned())],
            item_summary(&mut folder)
        );
        assert!(folder.subfolders().unwrap().is_empty());
    }

    fn split(mbox: &str) -> Vec<String> {
        MboxMessages::new("box".to_owned(), mbox.as_bytes())
            .map(|item| String::from_utf8(item.unwrap().data).unwrap())
            .collect()
    }

    #[test]
    fn mbox_splitting() {
        assert_eq!(
            vec![
                "Subject: one\n\nbody one\n".to_owned(),
                "Subject: two\n\nFrom here on\n>From quoted\n".to_owned(),
                "Subject: three\n\nlast".to_owned(),
            ],
            split(
                "From a@b.c Thu Jan  1 00:00:00 1970\n\
                 Subject: one\n\
                 \n\
                 body one\n\
                 \n\
                 From a@b.c Thu Jan  1 00:00:00 1970\n\
                 Subject: two\n\
                 \n\
                 >From here on\n\
                 >>From quoted\n\
                 \n\
                 From a@b.c Thu Jan  1 00:00:00 1970\n\
                 Subject: three\n\
                 \n\
                 last"
            )
        );

        assert!(split("").is_empty());
        assert!(split("From x\n\n").is_empty());
        assert_eq!(
            vec!["Subject: no separator\n".to_owned()],
            split("Subject: no separator\n")
        );
    }

    struct FailingReader(Vec<u8>);

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() {
                return Err(io::Error::new(io::ErrorKind::Other, "bad sector"));
            }

            let n = buf.len().min(self.0.len());
            buf[..n].copy_from_slice(&self.0[..n]);
            self.0.drain(..n);
            Ok(n)
        }
    }

    #[test]
    fn mbox_read_error_ends_iteration() {
        let reader = BufReader::with_capacity(
            16,
            FailingReader(b"From x\nSubject: a\n\nFrom y\nSubject: b".to_vec()),
        );
        let results = MboxMessages::new("box".to_owned(), reader)
            .collect::<Vec<_>>();

        assert_eq!(2, results.len());
        assert_eq!("box#1", results[0].as_ref().unwrap().id);
        match results[1] {
            Err(ref failure) => {
                assert_eq!("box#2", failure.id);
                assert_matches!(Error::Io(_), &failure.error);
            },
            Ok(ref item) => panic!("Unexpected item: {:?}", item),
        }
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_item_is_item_failure() {
        let root = tempfile::TempDir::new().unwrap();
        fs::write(root.path().join("a.eml"), "Subject: a\r\n\r\n").unwrap();
        std::os::unix::fs::symlink(
            root.path().join("nowhere"),
            root.path().join("b.eml"),
        )
        .unwrap();

        let mut store = LocalStore::open(root.path()).unwrap();
        let mut folder = store.root().unwrap();
        let results = folder.items().unwrap().collect::<Vec<_>>();
        assert_eq!(2, results.len());
        assert!(results[0].is_ok());
        match results[1] {
            Err(ref failure) => {
                assert_eq!("b.eml", failure.id);
                assert_eq!(ItemKind::Message, failure.kind);
            },
            Ok(_) => panic!("Dangling symlink was readable"),
        }
    }
}
