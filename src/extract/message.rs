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

use bitflags::bitflags;
use chrono::prelude::*;
use serde::Serialize;

use super::date_range::format_iso;
use crate::mime::address::{
    parse_address_list, remove_invalid_and_duplicates, HeaderWarning,
};
use crate::mime::encoded_word::decode_encoded_words;
use crate::mime::header;
use crate::mime::header_block::{read_header_block, RawHeader};
use crate::support::error::Error;

/// The normalised form of a message, as written to the extraction output.
///
/// Only the first occurrence of each header is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Where the message came from in the store.
    pub id: String,
    /// The `Message-ID` header, trimmed to the `<...>` token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// The `Subject` header, decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// The `Date` header, in UTC ISO 8601 form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// The `Date` header verbatim, if it could not be understood.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub from: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sender: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub return_path: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_reply_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    /// The size of the raw message, in bytes.
    pub size: u64,

    /// The parsed `Date` header.
    #[serde(skip)]
    pub sent: Option<DateTime<Utc>>,
}

/// The result of normalising one message.
#[derive(Debug, Clone)]
pub struct ParsedMessage {
    pub record: MessageRecord,
    /// Headers which had to be kept verbatim.
    pub warnings: Vec<HeaderWarning>,
}

bitflags! {
    struct HeaderParts: u32 {
        const DATE = 1 << 0;
        const SUBJECT = 1 << 1;
        const FROM = 1 << 2;
        const SENDER = 1 << 3;
        const REPLY_TO = 1 << 4;
        const TO = 1 << 5;
        const CC = 1 << 6;
        const BCC = 1 << 7;
        const RETURN_PATH = 1 << 8;
        const MESSAGE_ID = 1 << 9;
        const IN_REPLY_TO = 1 << 10;
        const REFERENCES = 1 << 11;
    }
}

/// Parse the headers of the raw message `data` into a `MessageRecord`.
///
/// Fails only if `data` has no headers at all, in which case it is not
/// plausibly a message.
pub fn parse_message(id: &str, data: &[u8]) -> Result<ParsedMessage, Error> {
    let headers = read_header_block(data)?;
    if headers.is_empty() {
        return Err(Error::MalformedMessage(format!(
            "{} has no headers",
            id
        )));
    }

    let mut builder = RecordBuilder::new(id, data.len());
    for header in &headers {
        builder.header(header);
    }

    Ok(builder.finish())
}

struct RecordBuilder {
    record: MessageRecord,
    warnings: Vec<HeaderWarning>,
    has_parts: HeaderParts,
}

impl RecordBuilder {
    fn new(id: &str, size: usize) -> Self {
        RecordBuilder {
            record: MessageRecord {
                id: id.to_owned(),
                size: size as u64,
                ..MessageRecord::default()
            },
            warnings: Vec::new(),
            has_parts: HeaderParts::empty(),
        }
    }

    fn header(&mut self, header: &RawHeader) {
        use HeaderParts as H;

        let name = header.name.as_str();
        let value = header.value.as_str();

        if header.is("Date") {
            self.date(value)
        } else if header.is("Subject") {
            self.subject(value)
        } else if header.is("From") {
            self.addr_list(H::FROM, name, |r| &mut r.from, value)
        } else if header.is("Sender") {
            self.addr_list(H::SENDER, name, |r| &mut r.sender, value)
        } else if header.is("Reply-To") {
            self.addr_list(H::REPLY_TO, name, |r| &mut r.reply_to, value)
        } else if header.is("To") {
            self.addr_list(H::TO, name, |r| &mut r.to, value)
        } else if header.is("CC") {
            self.addr_list(H::CC, name, |r| &mut r.cc, value)
        } else if header.is("BCC") {
            self.addr_list(H::BCC, name, |r| &mut r.bcc, value)
        } else if header.is("Return-Path") {
            self.return_path(name, value)
        } else if header.is("Message-Id") {
            self.message_id(H::MESSAGE_ID, |r| &mut r.message_id, value)
        } else if header.is("In-Reply-To") {
            self.message_id(H::IN_REPLY_TO, |r| &mut r.in_reply_to, value)
        } else if header.is("References") {
            self.references(value)
        }
    }

    fn finish(self) -> ParsedMessage {
        ParsedMessage {
            record: self.record,
            warnings: self.warnings,
        }
    }

    /// Marks `part` as seen, returning whether it had not been seen before.
    fn first(&mut self, part: HeaderParts) -> bool {
        let first = !self.has_parts.contains(part);
        self.has_parts |= part;
        first
    }

    fn date(&mut self, value: &str) {
        if !self.first(HeaderParts::DATE) {
            return;
        }

        match header::parse_datetime(value) {
            Some(dt) => {
                let dt = dt.with_timezone(&Utc);
                self.record.sent = Some(dt);
                self.record.date = format_iso(Some(dt));
            },
            // Keep whatever there was so a human can try to make sense of it
            None => {
                self.record.raw_date = Some(value.trim().to_owned())
                    .filter(|v| !v.is_empty())
            },
        }
    }

    fn subject(&mut self, value: &str) {
        if self.first(HeaderParts::SUBJECT) {
            self.record.subject =
                Some(decode_encoded_words(value).trim().to_owned());
        }
    }

    fn addr_list(
        &mut self,
        part: HeaderParts,
        name: &str,
        accessor: impl FnOnce(&mut MessageRecord) -> &mut Vec<String>,
        value: &str,
    ) {
        if !self.first(part) {
            return;
        }

        let addresses = remove_invalid_and_duplicates(parse_address_list(
            name,
            value,
            &mut self.warnings,
        ));
        *accessor(&mut self.record) = addresses;
    }

    fn return_path(&mut self, name: &str, value: &str) {
        // The null return path of bounces is not an address, but it's not
        // malformed either
        if "<>" == value.trim() {
            self.first(HeaderParts::RETURN_PATH);
            return;
        }

        self.addr_list(
            HeaderParts::RETURN_PATH,
            name,
            |r| &mut r.return_path,
            value,
        )
    }

    fn message_id(
        &mut self,
        part: HeaderParts,
        accessor: impl FnOnce(&mut MessageRecord) -> &mut Option<String>,
        value: &str,
    ) {
        if self.first(part) {
            *accessor(&mut self.record) = header::parse_message_id(value);
        }
    }

    fn references(&mut self, value: &str) {
        if self.first(HeaderParts::REFERENCES) {
            self.record.references = header::parse_message_id_list(value);
        }
    }
}
