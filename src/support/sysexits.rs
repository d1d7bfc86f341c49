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

//! Exit codes from `sysexits.h`, and the mapping from extraction errors onto
//! them.

use std::io;

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_CANTCREAT: Sysexit = Sysexit(73);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }

    /// Choose the exit code a failed run should terminate with.
    pub fn for_error(error: &Error) -> Self {
        match *error {
            Error::Interrupted => EX_TEMPFAIL,
            Error::UnknownProgressLevel(_) | Error::ConfigSyntax(_) => {
                EX_CONFIG
            },
            Error::UnsupportedSource(_) => EX_NOINPUT,
            Error::Io(ref e) if io::ErrorKind::NotFound == e.kind() => {
                EX_NOINPUT
            },
            Error::Io(_) => EX_IOERR,
            Error::MalformedMessage(_) => EX_DATAERR,
            Error::Callback(_) | Error::Serialise(_) => EX_SOFTWARE,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn interrupt_is_temporary_failure() {
        assert_eq!(EX_TEMPFAIL, Sysexit::for_error(&Error::Interrupted));
        assert_eq!(
            EX_CONFIG,
            Sysexit::for_error(&Error::UnknownProgressLevel("LOUD".to_owned()))
        );
        assert_eq!(
            EX_NOINPUT,
            Sysexit::for_error(&Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "gone"
            )))
        );
        assert_eq!(
            EX_IOERR,
            Sysexit::for_error(&Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "dropped"
            )))
        );
    }
}
