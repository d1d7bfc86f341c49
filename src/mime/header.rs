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

//! Utilities for working with individual RFC 2822 headers.
//!
//! The parsers operate on complete header values (never on a stream), so all
//! of them are built from nom's `complete` combinators.

use std::borrow::Cow;

use chrono::prelude::*;
use lazy_static::lazy_static;
use nom::branch::alt;
use nom::bytes::complete::{
    is_a, is_not, tag_no_case, take, take_while1, take_while_m_n,
};
use nom::character::complete::char;
use nom::character::is_digit;
use nom::combinator::{map, opt};
use nom::multi::{
    fold_many0, many0, many0_count, many1_count, separated_nonempty_list,
};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use regex::Regex;

type PResult<'a, T> = IResult<&'a [u8], T>;

/// An RFC 2822 `addr-spec`, still split into its dotted components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

/// A single mailbox with its (possibly empty) display name phrase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mailbox<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

/// A named group of mailboxes, as in `Friends: a@example.com, b@example.com;`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<Mailbox<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(Mailbox<'a>),
    Group(Group<'a>),
}

/// Parse a full address-list header value (`From`, `To`, `Cc`, etc).
///
/// Returns `None` if the value is not syntactically valid in its entirety;
/// there is no partial result.
pub fn parse_address_list(value: &[u8]) -> Option<Vec<Address<'_>>> {
    match address_list(value) {
        Ok((rest, addresses)) if rest.is_empty() => Some(addresses),
        _ => None,
    }
}

/// Parse an RFC 2822 date-time, including the obsolete forms.
pub fn parse_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    date_time(value.as_bytes()).ok().and_then(|(_, dt)| dt)
}

lazy_static! {
    static ref MSG_ID: Regex = Regex::new(r"<[^<>\s]*>").unwrap();
}

/// Extract the message id from a `Message-ID` or `In-Reply-To` header.
///
/// The first `<...>` token wins. Agents that leave out the angle brackets are
/// common enough that a bare value is accepted as-is.
pub fn parse_message_id(value: &str) -> Option<String> {
    MSG_ID
        .find(value)
        .map(|m| m.as_str().to_owned())
        .or_else(|| {
            value
                .split_whitespace()
                .next()
                .map(str::to_owned)
        })
}

/// Split a `References` header into its message ids, in order.
pub fn parse_message_id_list(value: &str) -> Vec<String> {
    let ids: Vec<String> = MSG_ID
        .find_iter(value)
        .map(|m| m.as_str().to_owned())
        .collect();
    if ids.is_empty() {
        value.split_whitespace().map(str::to_owned).collect()
    } else {
        ids
    }
}

/// Join the words of a phrase (e.g. a display name) with single spaces.
///
/// The unquoted `.` allowed by the obsolete phrase syntax sticks to the word
/// before it, so `Joe Q. Public` comes back out the way it went in.
pub fn decode_phrase(phrase: &[Cow<[u8]>]) -> String {
    let mut accum = Vec::new();
    for word in phrase {
        if !accum.is_empty() && b"." != &word[..] {
            accum.push(b' ');
        }
        accum.extend_from_slice(word);
    }
    to_utf8(accum)
}

/// Join the components of a local part or domain with dots.
pub fn decode_dotted(components: &[Cow<[u8]>]) -> String {
    let mut accum = Vec::new();
    for (ix, component) in components.iter().enumerate() {
        if 0 != ix {
            accum.push(b'.');
        }
        accum.extend_from_slice(component);
    }
    to_utf8(accum)
}

fn to_utf8(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> PResult<'_, &[u8]> {
    preceded(char('\\'), take(1usize))(i)
}

// RFC 2822 3.2.3 "Folding white space".
// Header values reach us with their line breaks still in place, so the
// line-ending characters are just treated as whitespace.
fn fws(i: &[u8]) -> PResult<'_, ()> {
    map(is_a(" \t\r\n"), |_| ())(i)
}

// RFC 2822 3.2.3 "Comment text".
fn ctext(i: &[u8]) -> PResult<'_, &[u8]> {
    is_not("()\\ \t\r\n")(i)
}

// RFC 2822 3.2.3 "Comment content".
// FWS is moved in here from the comment rule itself, which is equivalent and
// a lot simpler.
fn ccontent(i: &[u8]) -> PResult<'_, ()> {
    alt((
        map(ctext, |_| ()),
        map(quoted_pair, |_| ()),
        fws,
        comment,
    ))(i)
}

// RFC 2822 3.2.3 "Comment". Note it is recursive.
fn comment(i: &[u8]) -> PResult<'_, ()> {
    map(delimited(char('('), many0_count(ccontent), char(')')), |_| ())(i)
}

// RFC 2822 3.2.3 "Comment or folding white space". Matches the empty string.
fn cfws(i: &[u8]) -> PResult<'_, ()> {
    map(many0_count(alt((fws, comment))), |_| ())(i)
}

// RFC 2822 3.2.4 "Atom text", amended by RFC 6532 to include all non-ASCII
// characters
fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        || ch >= 0x80
}

fn atext(i: &[u8]) -> PResult<'_, &[u8]> {
    take_while1(is_atext)(i)
}

// RFC 2822 3.2.4 "Atom"
fn atom(i: &[u8]) -> PResult<'_, &[u8]> {
    delimited(opt(cfws), atext, opt(cfws))(i)
}

// RFC 2822 3.2.5 "Quoted [string] text", amended by RFC 6532
fn qtext(i: &[u8]) -> PResult<'_, &[u8]> {
    is_not(" \t\r\n\\\"")(i)
}

// RFC 2822 3.2.5 "Quoted [string] content". Any run of FWS becomes a single
// space.
fn qcontent(i: &[u8]) -> PResult<'_, &[u8]> {
    alt((qtext, quoted_pair, map(fws, |_| &b" "[..])))(i)
}

// RFC 2822 3.2.5 "Quoted string"
fn quoted_string(i: &[u8]) -> PResult<'_, Cow<'_, [u8]>> {
    delimited(
        pair(opt(cfws), char('"')),
        fold_many0(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut accum: Cow<[u8]>, item| {
                if accum.is_empty() {
                    accum = Cow::Borrowed(item);
                } else {
                    accum.to_mut().extend_from_slice(item);
                }
                accum
            },
        ),
        pair(char('"'), opt(cfws)),
    )(i)
}

// RFC 2822 3.2.6 "word"
fn word(i: &[u8]) -> PResult<'_, Cow<'_, [u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// The `.` that many agents put unquoted into display names; part of the
// RFC 2822 `obs-phrase` syntax.
fn obs_dot(i: &[u8]) -> PResult<'_, Cow<'_, [u8]>> {
    terminated(map(char('.'), |_| Cow::Borrowed(&b"."[..])), opt(cfws))(i)
}

// RFC 2822 3.2.6 "phrase", plus the "obsolete phrase" syntax
fn phrase(i: &[u8]) -> PResult<'_, Vec<Cow<'_, [u8]>>> {
    map(pair(word, many0(alt((word, obs_dot)))), |(head, mut tail)| {
        tail.insert(0, head);
        tail
    })(i)
}

// RFC 2822 3.3 date/time syntax, including obsolete forms.
// The obsolete forms allow CFWS between all terms, so that is accepted
// everywhere instead of the rather arbitrary distribution the RFC uses.
fn digits_value(s: &[u8]) -> u32 {
    s.iter().fold(0, |accum, &d| accum * 10 + u32::from(d - b'0'))
}

fn year(i: &[u8]) -> PResult<'_, u32> {
    map(take_while_m_n(2, 4, is_digit), |s: &[u8]| {
        let mut y = digits_value(s);
        // Y2K compliance workarounds described by RFC 2822 4.3
        if 2 == s.len() && y < 50 {
            y += 2000;
        } else if s.len() < 4 {
            y += 1900;
        }
        y
    })(i)
}

fn month(i: &[u8]) -> PResult<'_, u32> {
    alt((
        map(tag_no_case("jan"), |_| 1),
        map(tag_no_case("feb"), |_| 2),
        map(tag_no_case("mar"), |_| 3),
        map(tag_no_case("apr"), |_| 4),
        map(tag_no_case("may"), |_| 5),
        map(tag_no_case("jun"), |_| 6),
        map(tag_no_case("jul"), |_| 7),
        map(tag_no_case("aug"), |_| 8),
        map(tag_no_case("sep"), |_| 9),
        map(tag_no_case("oct"), |_| 10),
        map(tag_no_case("nov"), |_| 11),
        map(tag_no_case("dec"), |_| 12),
    ))(i)
}

fn day(i: &[u8]) -> PResult<'_, u32> {
    map(take_while_m_n(1, 2, is_digit), digits_value)(i)
}

fn two_digit(i: &[u8]) -> PResult<'_, u32> {
    map(take_while_m_n(2, 2, is_digit), digits_value)(i)
}

/// Returns `(year, month, day)`.
fn date(i: &[u8]) -> PResult<'_, (u32, u32, u32)> {
    map(
        tuple((
            terminated(day, opt(cfws)),
            terminated(month, opt(cfws)),
            terminated(year, opt(cfws)),
        )),
        |(d, m, y)| (y, m, d),
    )(i)
}

fn time_colon(i: &[u8]) -> PResult<'_, ()> {
    map(tuple((opt(cfws), char(':'), opt(cfws))), |_| ())(i)
}

// Seconds are optional in RFC 2822
fn time_of_day(i: &[u8]) -> PResult<'_, (u32, u32, u32)> {
    map(
        tuple((
            terminated(two_digit, time_colon),
            two_digit,
            opt(preceded(time_colon, two_digit)),
        )),
        |(h, m, s)| (h, m, s.unwrap_or(0)),
    )(i)
}

/// A `+hhmm`/`-hhmm` zone, in seconds east of UTC.
fn numeric_zone(i: &[u8]) -> PResult<'_, i32> {
    map(
        pair(
            alt((char('+'), char('-'))),
            take_while_m_n(4, 4, is_digit),
        ),
        |(sign, s)| {
            let hhmm = digits_value(s) as i32;
            let secs = hhmm / 100 * 3600 + hhmm % 100 * 60;
            if '-' == sign {
                -secs
            } else {
                secs
            }
        },
    )(i)
}

const HOUR: i32 = 3600;

/// Any zone, in seconds east of UTC.
fn zone(i: &[u8]) -> PResult<'_, i32> {
    alt((
        numeric_zone,
        // UTC
        map(alt((tag_no_case("ut"), tag_no_case("gmt"))), |_| 0),
        // US time zones
        map(tag_no_case("edt"), |_| -4 * HOUR),
        map(alt((tag_no_case("est"), tag_no_case("cdt"))), |_| -5 * HOUR),
        map(alt((tag_no_case("cst"), tag_no_case("mdt"))), |_| -6 * HOUR),
        map(alt((tag_no_case("mst"), tag_no_case("pdt"))), |_| -7 * HOUR),
        map(tag_no_case("pst"), |_| -8 * HOUR),
        // RFC 2822 says the military zones were so poorly defined that they
        // must be treated as 0 unless additional information is available.
        // Unknown time zones must also be treated as 0.
        map(atext, |_| 0),
    ))(i)
}

fn time(i: &[u8]) -> PResult<'_, ((u32, u32, u32), i32)> {
    map(
        terminated(
            pair(terminated(time_of_day, opt(cfws)), opt(zone)),
            opt(cfws),
        ),
        |(tod, zone)| (tod, zone.unwrap_or(0)),
    )(i)
}

fn date_time(i: &[u8]) -> PResult<'_, Option<DateTime<FixedOffset>>> {
    map(
        // We don't care what day of week it was
        preceded(
            tuple((opt(cfws), opt(pair(atom, char(','))), opt(cfws))),
            pair(date, time),
        ),
        |((year, month, day), ((hour, minute, second), zone))| {
            FixedOffset::east_opt(zone).and_then(|off| {
                off.with_ymd_and_hms(
                    year as i32,
                    month,
                    day,
                    hour,
                    minute,
                    second,
                )
                .single()
            })
        },
    )(i)
}

// RFC 2822 3.4.1 local part of address
// Formally, this is `dot-atom / quoted-string / obs-local-part`, with
// `obs-local-part` being `word *("." word)`. Any dot-atom or quoted-string
// conforms to obs-local-part, so we just parse that.
fn local_part(i: &[u8]) -> PResult<'_, Vec<Cow<'_, [u8]>>> {
    separated_nonempty_list(char('.'), word)(i)
}

// RFC 2822 4.4 obsolete domain format, which subsumes dot-atom
fn obs_domain(i: &[u8]) -> PResult<'_, Vec<Cow<'_, [u8]>>> {
    separated_nonempty_list(char('.'), map(atom, Cow::Borrowed))(i)
}

// RFC 2822 3.4.1 domain name text, amended by RFC 6532
fn dtext(i: &[u8]) -> PResult<'_, &[u8]> {
    is_not("[]\\ \t\r\n")(i)
}

// RFC 2822 3.4.1 domain literal content, with the FWS moved in here as with
// quoted strings. Whitespace inside a literal is dropped.
fn dcontent(i: &[u8]) -> PResult<'_, &[u8]> {
    alt((dtext, quoted_pair, map(fws, |_| &b""[..])))(i)
}

// RFC 2822 3.4.1 domain literal, brackets included in the result
fn domain_literal(i: &[u8]) -> PResult<'_, Vec<u8>> {
    delimited(
        pair(opt(cfws), char('[')),
        fold_many0(dcontent, vec![b'['], |mut accum: Vec<u8>, item| {
            accum.extend_from_slice(item);
            accum
        }),
        pair(char(']'), opt(cfws)),
    )(i)
    .map(|(rest, mut literal)| {
        literal.push(b']');
        (rest, literal)
    })
}

// RFC 2822 3.4.1 domain
fn domain(i: &[u8]) -> PResult<'_, Vec<Cow<'_, [u8]>>> {
    alt((
        obs_domain,
        map(domain_literal, |literal| vec![Cow::Owned(literal)]),
    ))(i)
}

// RFC 2822 3.4.1 address specification
fn addr_spec(i: &[u8]) -> PResult<'_, AddrSpec<'_>> {
    map(pair(local_part, preceded(char('@'), domain)), |(local, domain)| {
        AddrSpec { local, domain }
    })(i)
}

// RFC 2822 4.4 obsolete routing information, which we discard
fn obs_route(i: &[u8]) -> PResult<'_, ()> {
    map(
        tuple((
            char('@'),
            domain,
            many0_count(tuple((
                many0_count(alt((fws, comment, map(char(','), |_| ())))),
                char('@'),
                domain,
            ))),
            char(':'),
        )),
        |_| (),
    )(i)
}

// RFC 2822 3.4 angle-delimited address, including the 4.4 obsolete routing
// information
fn angle_addr(i: &[u8]) -> PResult<'_, AddrSpec<'_>> {
    delimited(
        tuple((opt(cfws), char('<'), opt(obs_route))),
        addr_spec,
        pair(char('>'), opt(cfws)),
    )(i)
}

// RFC 2822 3.4 mailbox
fn mailbox(i: &[u8]) -> PResult<'_, Mailbox<'_>> {
    map(
        alt((
            pair(opt(phrase), angle_addr),
            map(addr_spec, |addr| (None, addr)),
        )),
        |(name, addr)| Mailbox {
            name: name.unwrap_or_default(),
            addr,
        },
    )(i)
}

// Used in the obsolete list syntax, which allows empty list elements
fn obs_list_delim(i: &[u8]) -> PResult<'_, ()> {
    map(
        many1_count(tuple((opt(cfws), char(','), opt(cfws)))),
        |_| (),
    )(i)
}

// RFC 2822 3.4 mailbox list, including 4.4 obsolete syntax
fn mailbox_list(i: &[u8]) -> PResult<'_, Vec<Mailbox<'_>>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, mailbox),
        opt(obs_list_delim),
    )(i)
}

// RFC 2822 3.4 group
fn group(i: &[u8]) -> PResult<'_, Group<'_>> {
    map(
        pair(
            terminated(phrase, char(':')),
            terminated(
                opt(mailbox_list),
                tuple((opt(cfws), char(';'), opt(cfws))),
            ),
        ),
        |(name, boxes)| Group {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 2822 3.4 address
fn address(i: &[u8]) -> PResult<'_, Address<'_>> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 2822 3.4 address list, including 4.4 obsolete syntax
fn address_list(i: &[u8]) -> PResult<'_, Vec<Address<'_>>> {
    delimited(
        opt(obs_list_delim),
        separated_nonempty_list(obs_list_delim, address),
        pair(opt(obs_list_delim), opt(cfws)),
    )(i)
}
