//! URL query string parsing, percent-decoding, and location folding.

use memchr::memchr;
use std::{error, fmt};

/// Splits a query string into decoded `(key, value)` pairs.
///
/// Accepts the query with or without the leading `?`. Order is preserved;
/// a key without `=` yields an empty value. Keys and values are
/// percent-decoded independently, so `location=link%C3%B6ping` comes out
/// as `("location", "linköping")`.
///
/// # Examples
/// ```
/// use weathervane::query;
///
/// let pairs = query::parse(b"?lat=59.33&lon=18.07").unwrap();
/// assert_eq!(pairs[0], ("lat".to_string(), "59.33".to_string()));
/// assert_eq!(pairs[1], ("lon".to_string(), "18.07".to_string()));
/// ```
pub fn parse(query: &[u8]) -> Result<Vec<(String, String)>, Error> {
    let data = match query.first() {
        Some(b'?') => &query[1..],
        _ => query,
    };

    let mut pairs = Vec::new();
    let mut start = 0;
    while start < data.len() {
        // Next '&' or end of string
        let end = memchr(b'&', &data[start..])
            .map(|pos| start + pos)
            .unwrap_or(data.len());

        if start < end {
            let split = memchr(b'=', &data[start..end]).unwrap_or(end - start);
            let split_index = start + split;

            let key = decode(&data[start..split_index])?;
            let value = match split_index < end {
                true => decode(&data[split_index + 1..end])?,
                false => String::new(),
            };

            pairs.push((key, value));
        }

        start = end + 1;
    }

    Ok(pairs)
}

/// Returns the first value for `key` among parsed pairs.
#[inline]
pub fn first<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Percent-decodes one query component into UTF-8.
///
/// `+` decodes to a space, `%XX` to the byte it names. The decoded bytes
/// must form valid UTF-8.
pub fn decode(raw: &[u8]) -> Result<String, Error> {
    let mut bytes = Vec::with_capacity(raw.len());

    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'+' => {
                bytes.push(b' ');
                i += 1;
            }
            b'%' => {
                let hi = raw.get(i + 1).and_then(|b| hex_value(*b));
                let lo = raw.get(i + 2).and_then(|b| hex_value(*b));
                match (hi, lo) {
                    (Some(hi), Some(lo)) => bytes.push(hi << 4 | lo),
                    _ => return Err(Error::BadEscape),
                }
                i += 3;
            }
            byte => {
                bytes.push(byte);
                i += 1;
            }
        }
    }

    match simdutf8::basic::from_utf8(&bytes) {
        Ok(s) => Ok(s.to_string()),
        Err(_) => Err(Error::NotUtf8),
    }
}

/// Folds a location name for catalogue lookup.
///
/// ASCII letters are lowercased, as are the Swedish letters Å, Ä, Ö.
/// Everything else passes through unchanged.
#[inline]
pub fn fold_location(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'Å' => 'å',
            'Ä' => 'ä',
            'Ö' => 'ö',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

#[inline(always)]
const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Query component decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A `%` escape is truncated or names a non-hex digit.
    BadEscape,
    /// The decoded bytes are not valid UTF-8.
    NotUtf8,
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadEscape => write!(f, "invalid percent escape in query"),
            Error::NotUtf8 => write!(f, "query component is not valid UTF-8"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic() {
        let cases = ["a=1&b=2", "?a=1&b=2"];

        for line in cases {
            let pairs = parse(line.as_bytes()).unwrap();

            assert_eq!(pairs.len(), 2);
            assert_eq!(pairs[0], ("a".into(), "1".into()));
            assert_eq!(pairs[1], ("b".into(), "2".into()));
        }
    }

    #[test]
    fn full() {
        let pairs = parse(b"flag&empty=&=val&&key=value").unwrap();

        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], ("flag".into(), "".into()));
        assert_eq!(pairs[1], ("empty".into(), "".into()));
        assert_eq!(pairs[2], ("".into(), "val".into()));
        assert_eq!(pairs[3], ("key".into(), "value".into()));
    }

    #[test]
    fn first_wins() {
        let pairs = parse(b"a=1&a=2&b=3").unwrap();

        assert_eq!(first(&pairs, "a"), Some("1"));
        assert_eq!(first(&pairs, "b"), Some("3"));
        assert_eq!(first(&pairs, "c"), None);
    }

    #[test]
    fn decoding() {
        #[rustfmt::skip]
        let cases = [
            ("plain",            Ok("plain")),
            ("a+b",              Ok("a b")),
            ("link%C3%B6ping",   Ok("linköping")),
            ("%C3%85re",         Ok("Åre")),
            ("100%25",           Ok("100%")),

            ("bad%",             Err(Error::BadEscape)),
            ("bad%2",            Err(Error::BadEscape)),
            ("bad%zz",           Err(Error::BadEscape)),
            ("bad%ff",           Err(Error::NotUtf8)),
        ];

        for (raw, expected) in cases {
            assert_eq!(
                decode(raw.as_bytes()),
                expected.map(str::to_string),
                "case: {raw}"
            );
        }
    }

    #[test]
    fn decoded_pairs() {
        let pairs = parse(b"location=G%C3%B6teborg&unit=C").unwrap();

        assert_eq!(first(&pairs, "location"), Some("Göteborg"));
        assert_eq!(first(&pairs, "unit"), Some("C"));
    }

    #[test]
    fn folding() {
        #[rustfmt::skip]
        let cases = [
            ("Stockholm",  "stockholm"),
            ("GÖTEBORG",   "göteborg"),
            ("Göteborg",   "göteborg"),
            ("MALMÖ",      "malmö"),
            ("Malmö",      "malmö"),
            ("Åre",        "åre"),
            ("Västerås",   "västerås"),
            ("X1 -2",      "x1 -2"),
        ];

        for (name, folded) in cases {
            assert_eq!(fold_location(name), folded, "case: {name}");
        }
    }
}
