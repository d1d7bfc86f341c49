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

use std::borrow::Cow;

/// Decodes the "Q" encoding used inside RFC 2047 encoded words.
///
/// This is quoted-printable (RFC 2045) restricted to a single line, with the
/// addition that `_` always stands for ASCII space regardless of charset.
///
/// This never fails. Invalid or truncated escape sequences are passed through
/// untransformed, as are 8-bit characters.
pub fn q_decode(s: &[u8]) -> Cow<[u8]> {
    if !s.iter().any(|&b| b'=' == b || b'_' == b) {
        return Cow::Borrowed(s);
    }

    let mut transformed = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        match s[ix] {
            b'_' => {
                transformed.push(b' ');
                ix += 1;
            },

            b'=' => match s.get(ix + 1..ix + 3).and_then(hex_byte) {
                Some(ch) => {
                    transformed.push(ch);
                    ix += 3;
                },
                None => {
                    // Invalid encoding, keep the = verbatim
                    transformed.push(b'=');
                    ix += 1;
                },
            },

            ch => {
                transformed.push(ch);
                ix += 1;
            },
        }
    }

    Cow::Owned(transformed)
}

fn hex_byte(digits: &[u8]) -> Option<u8> {
    // u8::from_str_radix would also accept a leading '+'
    if !digits.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }

    digits.iter().try_fold(0u8, |accum, &digit| {
        let value = (digit as char).to_digit(16)? as u8;
        Some(accum * 16 + value)
    })
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn assert_q(expected: &[u8], input: &[u8]) {
        assert_eq!(expected, &q_decode(input)[..]);
    }

    #[test]
    fn test_q_decode() {
        assert_q(b"hello world", b"hello world");
        assert_q(b"hello world", b"hello_world");
        assert_q(b"\xabfoo", b"=ABfoo");
        assert_q(b"fo\xabo", b"fo=abo");
        assert_q(b"foo\xab\xcd", b"foo=AB=CD");
        assert_q(b"Andr\xc3\xa9", b"Andr=C3=A9");
        assert_q(b"a=b", b"a=3Db");

        assert_q(b"foo=()bar", b"foo=()bar");
        assert_q(b"foo=+1bar", b"foo=+1bar");
        assert_q(b"foo=\xabbar", b"foo==ABbar");
        assert_q(b"foo=", b"foo=");
        assert_q(b"foo=A", b"foo=A");
        assert_q("foo=ゑbar".as_bytes(), "foo=ゑbar".as_bytes());
    }

    #[test]
    fn unencoded_input_is_borrowed() {
        assert_matches!(Cow::Borrowed(_), q_decode(b"plain text"));
    }

    proptest! {
        #[test]
        fn q_decode_never_fails_for_str(s in ".*") {
            q_decode(s.as_bytes());
        }

        #[test]
        fn q_decode_never_fails_for_bytes(
            s in prop::collection::vec(prop::num::u8::ANY, 0..20)
        ) {
            q_decode(&s);
        }
    }
}
