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

//! Decoding of RFC 2047 "encoded words" as they are found in real mail
//! archives, which is to say frequently damaged.

use std::borrow::Cow;

use encoding_rs::Encoding;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::q_decode;

lazy_static! {
    /// A complete encoded word, capturing charset, encoding and payload.
    ///
    /// The payload may contain whitespace since damaged words are repaired
    /// before being decoded.
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([^?\s]+)\?([^?\s]+)\?([^?]*)\?=$").unwrap();
    /// An encoded word somewhere inside a larger header value.
    static ref EMBEDDED_WORD: Regex =
        Regex::new(r"=\?[^?\s]+\?[^?\s]+\?[^?]*\?=").unwrap();
    /// The start of an encoded word, used to detect unterminated words.
    static ref WORD_OPENER: Regex =
        Regex::new(r"=\?[^?\s]+\?[^?\s]+\?").unwrap();
    /// A line break followed by the whitespace that makes it a fold. Only the
    /// line break is removed; the whitespace is part of the value.
    static ref FOLD: Regex = Regex::new(r"\r?\n([ \t])").unwrap();
}

const OPENER: &str = "=?";
const TERMINATOR: &str = "?=";

/// Decode every RFC 2047 encoded word in `raw`.
///
/// This is deliberately tolerant of the ways encoded words get damaged:
///
/// - Folded lines are unfolded before anything else happens, so a word split
///   across a fold still decodes.
///
/// - If the last encoded word was never terminated (usually because the
///   header was truncated), the terminator is supplied.
///
/// - Spaces inside a `Q` word (which are supposed to be written as `_`) are
///   taken as spaces, and stray tabs are dropped.
///
/// - `B` words with whitespace or missing padding are cleaned up and padded.
///
/// Whitespace between two adjacent encoded words is removed, as RFC 2047
/// requires; all other text is left alone. Any encoded word which still
/// cannot be decoded (bad base64, unknown charset) is passed through
/// verbatim, so the worst case is that the input comes back unchanged.
pub fn decode_encoded_words(raw: &str) -> String {
    if !raw.contains(OPENER) {
        return FOLD.replace_all(raw, "$1").into_owned();
    }

    let mut text = FOLD.replace_all(raw, "$1").into_owned();
    let terminated = has_unterminated_word(&text);
    if terminated {
        text.push_str(TERMINATOR);
    }

    let mut decoded = String::with_capacity(text.len());
    let mut last_end = 0;
    let mut previous_was_word = false;
    let mut last_word_failed = false;

    for word in EMBEDDED_WORD.find_iter(&text) {
        let between = &text[last_end..word.start()];
        last_end = word.end();

        match decode_word(word.as_str()) {
            Some(content) => {
                let adjacent = previous_was_word
                    && between.chars().all(char::is_whitespace);
                if !adjacent {
                    decoded.push_str(between);
                }
                decoded.push_str(&content);
                previous_was_word = true;
                last_word_failed = false;
            },

            None => {
                decoded.push_str(between);
                decoded.push_str(word.as_str());
                previous_was_word = false;
                last_word_failed = true;
            },
        }
    }

    decoded.push_str(&text[last_end..]);

    // Don't leave the terminator we invented attached to a word we couldn't
    // decode anyway.
    if terminated && last_word_failed && decoded.ends_with(TERMINATOR) {
        decoded.truncate(decoded.len() - TERMINATOR.len());
    }

    decoded
}

/// Whether the text after the last complete encoded word in `text` starts
/// another encoded word that never ends.
fn has_unterminated_word(text: &str) -> bool {
    let tail_start = EMBEDDED_WORD
        .find_iter(text)
        .last()
        .map(|word| word.end())
        .unwrap_or(0);
    WORD_OPENER.is_match(&text[tail_start..])
}

/// Decode a single encoded word, which must make up the whole of `word`.
///
/// Returns `None` if `word` is not an encoded word or could not be decoded.
pub fn decode_word(word: &str) -> Option<String> {
    let captures = ENCODED_WORD.captures(word)?;

    // RFC 2231 allows a language suffix on the charset, as in `UTF-8*en`
    let charset = captures.get(1)?.as_str();
    let charset = charset.split('*').next().unwrap_or(charset);
    let transfer_encoding = captures.get(2)?.as_str();
    let payload = captures.get(3)?.as_str();

    let content = decode_xfer(transfer_encoding, payload)?;
    decode_charset(charset, &content)
}

fn decode_xfer<'a>(xfer: &str, payload: &'a str) -> Option<Cow<'a, [u8]>> {
    match xfer {
        "q" | "Q" => Some(q_decode_repaired(payload)),
        "b" | "B" => base64::decode(&repair_base64(payload))
            .ok()
            .map(Cow::Owned),
        _ => None,
    }
}

/// Q-decode `payload`, first treating raw spaces as `_` and dropping tabs.
///
/// Neither should be there in the first place, but both show up in the wild,
/// usually as a result of some agent folding the header in the middle of a
/// word.
fn q_decode_repaired(payload: &str) -> Cow<[u8]> {
    if payload.contains(|c: char| ' ' == c || '\t' == c) {
        let repaired: Vec<u8> = payload
            .bytes()
            .filter(|&b| b'\t' != b)
            .map(|b| if b' ' == b { b'_' } else { b })
            .collect();
        Cow::Owned(q_decode(&repaired).into_owned())
    } else {
        q_decode(payload.as_bytes())
    }
}

/// Strip whitespace from a base64 payload and pad it out to a multiple of 4.
fn repair_base64(payload: &str) -> String {
    let mut repaired: String =
        payload.chars().filter(|c| !c.is_whitespace()).collect();
    while 0 != repaired.len() % 4 {
        repaired.push('=');
    }
    repaired
}

fn decode_charset(charset: &str, content: &[u8]) -> Option<String> {
    Some(
        Encoding::for_label_no_replacement(charset.as_bytes())?
            .decode_with_bom_removal(content)
            .0
            .into_owned(),
    )
}
