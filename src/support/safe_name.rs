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

/// Whether `ch` may appear in a file system element we create.
///
/// This excludes path separators (both kinds, since a `\` in a folder name
/// causes trouble as soon as the output is copied to Windows), ASCII control
/// characters, and the characters Windows refuses in file names.
fn is_safe_char(ch: char) -> bool {
    !ch.is_control()
        && !matches!(ch, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|')
}

/// Derive a safe file system name from the name of a mail folder.
///
/// Unsafe characters become `_`, a leading `.` becomes `_`, and the result is
/// truncated to at most `max_len` characters. The result is never empty.
pub fn sanitise_name(name: &str, max_len: usize) -> String {
    let mut sanitised: String = name
        .trim()
        .chars()
        .take(max_len.max(1))
        .map(|ch| if is_safe_char(ch) { ch } else { '_' })
        .collect();

    if sanitised.starts_with('.') {
        sanitised.replace_range(..1, "_");
    }

    let trimmed_len = sanitised.trim_end().len();
    sanitised.truncate(trimmed_len);

    if sanitised.is_empty() {
        sanitised.push('_');
    }

    sanitised
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sanitise_name() {
        assert_eq!("Inbox", sanitise_name("Inbox", 64));
        assert_eq!("a_b_c", sanitise_name("a/b\\c", 64));
        assert_eq!("_hidden", sanitise_name(".hidden", 64));
        assert_eq!("_.", sanitise_name("..", 64));
        assert_eq!("_", sanitise_name("", 64));
        assert_eq!("_", sanitise_name("   ", 64));
        assert_eq!("Entw", sanitise_name("Entwürfe", 4));
        assert_eq!("abc", sanitise_name("abc   def", 5));
        assert_eq!("Entwürfe", sanitise_name("Entwürfe", 64));
        assert_eq!("郵便", sanitise_name("郵便", 64));
        assert_eq!("_ foo_0", sanitise_name(". foo\00", 64));

        let sanitised = sanitise_name("Sent: <old> |*?", 64);
        assert_eq!("Sent_ _old_ ___", sanitised);
        assert!(sanitised.chars().all(is_safe_char));
    }
}
