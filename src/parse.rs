// Copyright 2018 Ian Johnson

// This file is part of Chip-8.

// Chip-8 is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Chip-8 is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Chip-8.  If not, see <http://www.gnu.org/licenses/>.

//! Parsers for the text formats: save-state sections and key bindings.

use combine::{between, many, many1, none_of, satisfy, sep_by, token};
use combine::char::{digit, spaces};
use combine::{Parser, Stream};

/// Returns whether the given character may appear in a host key name.
fn is_host_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parses a tagged section of the form `t{payload}`, where the tag is a
/// single lowercase letter and the payload contains no braces.
parser!{
    pub fn section[I]()(I) -> (char, String)
    where [I: Stream<Item = char>]
    {
        let payload = many(none_of("{}".chars()));

        satisfy(|c: char| c.is_ascii_lowercase())
            .expected("section tag")
            .and(between(token('{'), token('}'), payload))
    }
}

/// Parses a comma-separated list of digit strings, possibly empty.
///
/// The entries are left as strings so that the caller can range-check them
/// against the right integer type.
parser!{
    pub fn decimal_list[I]()(I) -> Vec<String>
    where [I: Stream<Item = char>]
    {
        sep_by(many1::<String, _>(digit()), token(','))
    }
}

/// Parses a key binding of the form `HOST_KEY = VALUE`.
parser!{
    pub fn binding[I]()(I) -> (String, String)
    where [I: Stream<Item = char>]
    {
        let host_key = many1(satisfy(is_host_key_char)).expected("host key name");
        let value = many1(satisfy(|c: char| !c.is_whitespace())).expected("key name");

        spaces()
            .with(host_key)
            .skip(spaces())
            .skip(token('='))
            .skip(spaces())
            .and(value)
            .skip(spaces())
    }
}

#[cfg(test)]
mod tests {
    use combine::Parser;

    use super::*;

    #[test]
    fn sections() {
        let cases = [
            ("c{12}", ('c', "12"), ""),
            ("k{}", ('k', ""), ""),
            ("o{#00E0 CLS}", ('o', "#00E0 CLS"), ""),
            ("a{1}rest", ('a', "1"), "rest"),
        ];

        for &(input, (tag, payload), rest) in cases.iter() {
            let ((t, p), r) = section().parse(input).unwrap();
            assert_eq!((t, p.as_str(), r), (tag, payload, rest), "case {:?}", input);
        }
        for &input in ["C{1}", "c1}", "c{1", "c{a{b}}", "{1}", ""].iter() {
            assert!(section().parse(input).is_err(), "case {:?}", input);
        }
    }

    #[test]
    fn decimal_lists() {
        let cases: [(&str, &[&str], &str); 4] = [
            ("", &[], ""),
            ("7", &["7"], ""),
            ("1,22,333", &["1", "22", "333"], ""),
            ("0101,1100", &["0101", "1100"], ""),
        ];

        for &(input, expected, rest) in cases.iter() {
            let (list, r) = decimal_list().parse(input).unwrap();
            assert_eq!(list, expected, "case {:?}", input);
            assert_eq!(r, rest, "case {:?}", input);
        }
        for &input in ["1,", "1,,2", ",1"].iter() {
            let consumed_all = decimal_list()
                .parse(input)
                .map(|(_, rest)| rest.is_empty())
                .unwrap_or(false);
            assert!(!consumed_all, "case {:?}", input);
        }
    }

    #[test]
    fn bindings() {
        let cases = [
            ("X = 0", ("X", "0")),
            ("  DIGIT1=1", ("DIGIT1", "1")),
            ("NUMPAD_5 =\tF  ", ("NUMPAD_5", "F")),
            ("Q = NOP", ("Q", "NOP")),
        ];

        for &(input, (key, value)) in cases.iter() {
            let ((k, v), rest) = binding().parse(input).unwrap();
            assert_eq!((k.as_str(), v.as_str()), (key, value), "case {:?}", input);
            assert_eq!(rest, "", "case {:?}", input);
        }
        for &input in ["= 1", "X 1", "X =", ""].iter() {
            assert!(binding().parse(input).is_err(), "case {:?}", input);
        }
    }
}
