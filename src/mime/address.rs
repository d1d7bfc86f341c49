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

//! Normalisation of address headers into flat lists of display strings.

use std::collections::HashSet;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use super::encoded_word::decode_encoded_words;
use super::header::{self, Address, Mailbox};

/// A header whose value could not be parsed as an address list.
///
/// These are not errors: the raw value is still used. They are reported so
/// the user can tell which messages had damaged headers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeaderWarning {
    pub header: String,
    pub value: String,
}

impl fmt::Display for HeaderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Malformed {} header, kept verbatim: {:?}",
            self.header, self.value
        )
    }
}

/// Parse the value of the address header `header_name` into one display
/// string per address.
///
/// Mailboxes come out as `Name <local@domain>`, or `<local@domain>` if they
/// have no display name. Groups are kept together as
/// `Group: member, member;`. Encoded words anywhere in the result are
/// decoded.
///
/// If the value does not parse, a warning is added to `warnings` and the
/// whole (decoded, trimmed) value is returned as the only element. An empty
/// value yields an empty list without a warning.
pub fn parse_address_list(
    header_name: &str,
    value: &str,
    warnings: &mut Vec<HeaderWarning>,
) -> Vec<String> {
    if value.trim().is_empty() {
        return Vec::new();
    }

    match header::parse_address_list(value.as_bytes()) {
        Some(addresses) => addresses
            .iter()
            .map(|address| decode_if_encoded(format_address(address)))
            .collect(),
        None => {
            warnings.push(HeaderWarning {
                header: header_name.to_owned(),
                value: value.trim().to_owned(),
            });
            vec![decode_encoded_words(value.trim())]
        },
    }
}

fn decode_if_encoded(s: String) -> String {
    if s.contains("=?") {
        decode_encoded_words(&s)
    } else {
        s
    }
}

fn format_address(address: &Address<'_>) -> String {
    match *address {
        Address::Mailbox(ref mbox) => format_mailbox(mbox),
        Address::Group(ref group) => format!(
            "{}: {};",
            header::decode_phrase(&group.name),
            group
                .boxes
                .iter()
                .map(format_mailbox)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn format_mailbox(mbox: &Mailbox<'_>) -> String {
    let addr = format!(
        "<{}@{}>",
        header::decode_dotted(&mbox.addr.local),
        header::decode_dotted(&mbox.addr.domain)
    );

    if mbox.name.is_empty() {
        addr
    } else {
        format!("{} {}", header::decode_phrase(&mbox.name), addr)
    }
}

lazy_static! {
    /// An optional display name followed by exactly one well-formed
    /// `<local@domain>`.
    static ref VALID_ADDRESS: Regex = Regex::new(
        r"(?i)^[^<>]*<[^<>\s@]+@[^<>\s@.]+(\.[^<>\s@.]+)*>$"
    )
    .unwrap();
}

/// Clean up a list of address display strings.
///
/// Entries which don't end in a single well-formed `<local@domain>` are
/// dropped, the rest are lower-cased and trimmed, and duplicates are removed
/// keeping the first occurrence.
///
/// Lists with at most one entry are returned untouched. If nothing at all
/// survives the filter, the original list is returned instead, on the theory
/// that a list of odd-looking addresses is more useful than no addresses.
pub fn remove_invalid_and_duplicates(addresses: Vec<String>) -> Vec<String> {
    if addresses.len() <= 1 {
        return addresses;
    }

    let mut seen = HashSet::new();
    let cleaned: Vec<String> = addresses
        .iter()
        .map(|address| address.trim())
        .filter(|address| VALID_ADDRESS.is_match(address))
        .map(str::to_lowercase)
        .filter(|address| seen.insert(address.clone()))
        .collect();

    if cleaned.is_empty() {
        addresses
    } else {
        cleaned
    }
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn s(v: &str) -> String {
        v.to_owned()
    }

    fn parse(value: &str) -> (Vec<String>, Vec<HeaderWarning>) {
        let mut warnings = Vec::new();
        let parsed = parse_address_list("To", value, &mut warnings);
        (parsed, warnings)
    }

    #[test]
    fn formats_mailboxes() {
        let (parsed, warnings) = parse(
            "Kenneth Lay <kenneth.lay@enron.com>, jeff@enron.com,\r\n \
             \"Skilling, Jeff\" <jeff.skilling@enron.com>",
        );
        assert!(warnings.is_empty());
        assert_eq!(
            vec![
                s("Kenneth Lay <kenneth.lay@enron.com>"),
                s("<jeff@enron.com>"),
                s("Skilling, Jeff <jeff.skilling@enron.com>"),
            ],
            parsed
        );
    }

    #[test]
    fn formats_groups() {
        let (parsed, warnings) =
            parse("Team: a@x.org, Bee <b@x.org>;, Undisclosed:;");
        assert!(warnings.is_empty());
        assert_eq!(
            vec![s("Team: <a@x.org>, Bee <b@x.org>;"), s("Undisclosed: ;")],
            parsed
        );
    }

    #[test]
    fn decodes_encoded_names() {
        let (parsed, warnings) =
            parse("=?ISO-8859-1?Q?Andr=E9?= Pirard <PIRARD@vm1.ulg.ac.be>");
        assert!(warnings.is_empty());
        assert_eq!(vec![s("André Pirard <PIRARD@vm1.ulg.ac.be>")], parsed);
    }

    #[test]
    fn malformed_value_is_kept_with_warning() {
        let (parsed, warnings) =
            parse("  Doe, =?UTF-8?Q?J=C3=B6rg?= <jdoe@example.com>  ");
        assert_eq!(vec![s("Doe, Jörg <jdoe@example.com>")], parsed);
        assert_eq!(
            vec![HeaderWarning {
                header: s("To"),
                value: s("Doe, =?UTF-8?Q?J=C3=B6rg?= <jdoe@example.com>"),
            }],
            warnings
        );
        assert!(warnings[0].to_string().contains("Malformed To header"));
    }

    #[test]
    fn empty_value_is_empty_list() {
        let (parsed, warnings) = parse(" \r\n ");
        assert!(parsed.is_empty());
        assert!(warnings.is_empty());
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        assert_eq!(
            vec![s("a <x@y.com>"), s("<z@y.com>")],
            remove_invalid_and_duplicates(vec![
                s("A <X@Y.COM>"),
                s(" <z@y.com> "),
                s("a <x@y.com>"),
                s("<Z@y.com>"),
            ])
        );
    }

    #[test]
    fn dedup_is_case_insensitive() {
        assert_eq!(
            vec![s("a <a@x.com>")],
            remove_invalid_and_duplicates(vec![
                s("A <a@x.com>"),
                s("a <A@X.COM>"),
                s("not-an-address"),
            ])
        );
    }

    #[test]
    fn dedup_drops_invalid() {
        assert_eq!(
            vec![s("<ok@x.org>")],
            remove_invalid_and_duplicates(vec![
                s("garbage"),
                s("<ok@x.org>"),
                s("Two <a@x.org> <b@x.org>"),
                s("<no-at-sign>"),
                s("<dots@.x.org>"),
                s("<trailing@x.org.>"),
            ])
        );
    }

    #[test]
    fn dedup_short_lists_untouched() {
        assert!(remove_invalid_and_duplicates(vec![]).is_empty());
        assert_eq!(
            vec![s("  Not An Address ")],
            remove_invalid_and_duplicates(vec![s("  Not An Address ")])
        );
    }

    #[test]
    fn dedup_fails_open() {
        let all_bad = vec![s("garbage1"), s("garbage2")];
        assert_eq!(all_bad.clone(), remove_invalid_and_duplicates(all_bad));

        let all_bad = vec![s("Team: <a@x.org>;"), s("garbage")];
        assert_eq!(all_bad.clone(), remove_invalid_and_duplicates(all_bad));
    }

    proptest! {
        #[test]
        fn parse_never_panics(value in ".*") {
            let mut warnings = Vec::new();
            let parsed = parse_address_list("Cc", &value, &mut warnings);
            prop_assert!(warnings.len() <= 1);
            if !warnings.is_empty() {
                prop_assert_eq!(1, parsed.len());
            }
        }

        #[test]
        fn dedup_output_is_unique_and_valid(
            addresses in prop::collection::vec(
                "[a-c]{0,2} <[a-cA-C]{1,2}@[xy]\\.org>|[a-c ]{0,5}", 2..8)
        ) {
            let cleaned = remove_invalid_and_duplicates(addresses.clone());
            if cleaned != addresses {
                let unique: HashSet<&String> = cleaned.iter().collect();
                prop_assert_eq!(unique.len(), cleaned.len());
                for address in &cleaned {
                    prop_assert!(VALID_ADDRESS.is_match(address));
                    prop_assert_eq!(&address.to_lowercase(), address);
                }
            }
        }
    }
}
