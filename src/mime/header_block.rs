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

use std::io::{self, BufRead, Read};

/// Lines longer than this are cut off rather than buffered indefinitely.
///
/// The remainder of an over-long line is read as if it were a line of its
/// own, which at worst produces a header line without a colon that gets
/// ignored.
const MAX_HEADER_LINE: u64 = 65536;

/// A single header as it appears in the message.
///
/// The value still contains any folding line breaks (minus the final line
/// ending), so that decoding can tell where the folds were.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
}

impl RawHeader {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Read the header block of a message from `r`.
///
/// Reading stops at the first blank line or at EOF; the body is never
/// touched. An mbox `From ` separator line at the very start is skipped.
/// Lines which are neither a header nor a continuation are silently ignored.
pub fn read_header_block(mut r: impl BufRead) -> io::Result<Vec<RawHeader>> {
    let mut headers: Vec<RawHeader> = Vec::new();
    let mut buf = Vec::new();
    let mut first = true;

    loop {
        buf.clear();
        let nread = r
            .by_ref()
            .take(MAX_HEADER_LINE)
            .read_until(b'\n', &mut buf)?;
        if 0 == nread {
            break;
        }

        let line = trim_line_ending(&buf);
        if line.is_empty() {
            break;
        }

        if first && line.starts_with(b"From ") {
            first = false;
            continue;
        }
        first = false;

        if b' ' == line[0] || b'\t' == line[0] {
            if let Some(last) = headers.last_mut() {
                last.value.push_str("\r\n");
                last.value.push_str(&String::from_utf8_lossy(line));
            }
            continue;
        }

        if let Some(colon) = memchr::memchr(b':', line) {
            let name = &line[..colon];
            if name.is_empty() || name.iter().any(|b| b.is_ascii_whitespace())
            {
                continue;
            }

            headers.push(RawHeader {
                name: String::from_utf8_lossy(name).into_owned(),
                value: String::from_utf8_lossy(&line[colon + 1..])
                    .into_owned(),
            });
        }
    }

    Ok(headers)
}

fn trim_line_ending(mut line: &[u8]) -> &[u8] {
    if line.ends_with(b"\n") {
        line = &line[..line.len() - 1];
    }
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }
    line
}

#[cfg(test)]
mod test {
    use super::*;

    fn read(s: &str) -> Vec<(String, String)> {
        read_header_block(s.as_bytes())
            .unwrap()
            .into_iter()
            .map(|h| (h.name, h.value))
            .collect()
    }

    fn h(name: &str, value: &str) -> (String, String) {
        (name.to_owned(), value.to_owned())
    }

    #[test]
    fn reads_until_blank_line() {
        assert_eq!(
            vec![
                h("From", " foo@bar.com"),
                h("Subject", " hello"),
                h("X-Empty", ""),
            ],
            read(
                "From: foo@bar.com\r\n\
                 Subject: hello\r\n\
                 X-Empty:\r\n\
                 \r\n\
                 Not: a header\r\n"
            )
        );
    }

    #[test]
    fn preserves_folds() {
        assert_eq!(
            vec![
                h("Subject", " =?UTF-8?Q?Hello?=\r\n\t=?UTF-8?Q?_World?="),
                h("To", " a@b.c,\r\n  d@e.f"),
            ],
            read(
                "Subject: =?UTF-8?Q?Hello?=\n\
                 \t=?UTF-8?Q?_World?=\n\
                 To: a@b.c,\n  d@e.f\n"
            )
        );
    }

    #[test]
    fn skips_mbox_separator_and_junk() {
        assert_eq!(
            vec![h("Subject", " hi"), h("Date", " today")],
            read(
                "From someone@example.com Mon Jan  1 00:00:00 2001\n\
                 \tstray continuation\n\
                 Subject: hi\n\
                 garbage line\n\
                 Bad Name: x\n\
                 Date: today"
            )
        );
    }

    #[test]
    fn empty_input() {
        assert!(read("").is_empty());
        assert!(read("\r\nSubject: body\r\n").is_empty());
    }

    #[test]
    fn non_utf8_is_lossy() {
        let headers =
            read_header_block(&b"Subject: caf\xe9\r\n\r\n"[..]).unwrap();
        assert_eq!(1, headers.len());
        assert!(headers[0].is("subject"));
        assert_eq!(" caf\u{fffd}", headers[0].value);
    }
}
