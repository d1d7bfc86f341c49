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

//! Miscellaneous functions for working with files.

use std::io::{self, Write};
use std::path::Path;

/// Write `data` into the file at `path`, atomically.
///
/// The file is first staged as a temporary file in the same directory as
/// `path`, so a reader never sees a half-written file.
///
/// If `overwrite` is true, this will replace anything already at `path`. If
/// false, the call will fail with `AlreadyExists` if `path` already exists.
pub fn spit(
    path: impl AsRef<Path>,
    overwrite: bool,
    data: &[u8],
) -> io::Result<()> {
    let path = path.as_ref();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tf = tempfile::NamedTempFile::new_in(dir)?;
    tf.as_file_mut().write_all(data)?;
    if overwrite {
        tf.persist(path).map_err(|e| e.error)?;
    } else {
        tf.persist_noclobber(path).map_err(|e| e.error)?;
    }
    Ok(())
}

pub trait IgnoreKinds {
    fn ignore_already_exists(self) -> Self;
}

impl<R: Default> IgnoreKinds for Result<R, io::Error> {
    fn ignore_already_exists(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                Ok(R::default())
            },
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    #[test]
    fn spit_replaces_existing_content() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("out.txt");

        spit(&path, true, b"first").unwrap();
        spit(&path, true, b"second").unwrap();
        assert_eq!(b"second", &fs::read(&path).unwrap()[..]);
        // Nothing staged is left behind
        assert_eq!(1, fs::read_dir(root.path()).unwrap().count());
    }

    #[test]
    fn spit_without_overwrite_keeps_existing_content() {
        let root = tempfile::TempDir::new().unwrap();
        let path = root.path().join("out.txt");

        spit(&path, false, b"first").unwrap();
        let err = spit(&path, false, b"second").unwrap_err();
        assert_eq!(io::ErrorKind::AlreadyExists, err.kind());
        assert_eq!(b"first", &fs::read(&path).unwrap()[..]);
        assert_eq!(1, fs::read_dir(root.path()).unwrap().count());
    }

    #[test]
    fn already_exists_is_ignored() {
        let root = tempfile::TempDir::new().unwrap();
        let dir = root.path().join("d");
        fs::create_dir(&dir).unwrap();
        fs::create_dir(&dir).ignore_already_exists().unwrap();
        assert!(fs::create_dir(root.path().join("x/y"))
            .ignore_already_exists()
            .is_err());
    }
}
