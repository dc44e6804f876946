/*
 * Copyright 2018 Ian Johnson
 *
 * This is free software, distributed under the MIT license.  A copy of the
 * license can be found in the LICENSE file in the project root, or at
 * https://opensource.org/licenses/MIT.
 */

//! Helpers shared by the text format readers.

use std::fmt::Display;

use combine::{ParseError, Stream};

/// Formats a parse error as a single compact line, suitable for embedding in
/// a save state or key configuration error message.
///
/// The default `combine` formatting spans several lines and repeats the
/// input position, which reads badly inside a log line.
pub fn format_parse_error<S>(e: &ParseError<S>) -> String
where
    S: Stream,
    S::Range: Display,
    S::Item: Display,
{
    use combine::primitives::Error::*;
    use combine::primitives::Info;

    fn info_string<T, R>(i: &Info<T, R>) -> String
    where
        T: Display,
        R: Display,
    {
        use combine::primitives::Info::*;
        match *i {
            Token(ref t) => format!("'{}'", t),
            Range(ref t) => format!("'{}'", t),
            Owned(ref t) => t.clone(),
            Borrowed(t) => t.to_owned(),
        }
    }

    e.errors
        .iter()
        .map(|e| match *e {
            Unexpected(ref info) => format!("unexpected {}", info_string(info)),
            Expected(ref info) => format!("expected {}", info_string(info)),
            Message(ref info) => info_string(info),
            Other(ref err) => err.to_string(),
        })
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use combine::Parser;

    use parse::section;
    use super::*;

    #[test]
    fn compact_messages() {
        let err = section().parse("c{1").unwrap_err();
        let message = format_parse_error(&err);

        assert!(!message.contains('\n'), "{}", message);
        assert!(message.contains("expected '}'"), "{}", message);
    }
}
