use crate::{
    errors::ParseError,
    http::types::{Method, Version},
};
use memchr::{memchr, memmem};

/// The byte sequence terminating an HTTP/1.x request head.
pub(crate) const FRAME_MARKER: &[u8] = b"\r\n\r\n";

/// Returns true once `buf` holds a complete request head.
#[inline(always)]
pub(crate) fn head_complete(buf: &[u8]) -> bool {
    memmem::find(buf, FRAME_MARKER).is_some()
}

/// A parsed HTTP request.
///
/// Owns copies of everything it retains, so it stays valid after the
/// connection's read buffer is reused or dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    version: Version,
    url: String,
    headers: Vec<Header>,
    body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) name: String,
    pub(crate) value: String,
}

impl Request {
    /// Parses one complete request out of `buf`.
    ///
    /// `buf` must contain the framing marker; the caller accumulates bytes
    /// until [`head_complete`] says so. Bytes after the marker become the
    /// body verbatim. Unknown method or protocol tokens parse fine and are
    /// rejected later by routing.
    pub(crate) fn parse(buf: &[u8], max_url_len: usize) -> Result<Self, ParseError> {
        let head_end = memmem::find(buf, FRAME_MARKER).ok_or(ParseError::Malformed)?;
        let head = &buf[..head_end];
        let body = buf[head_end + FRAME_MARKER.len()..].to_vec();

        let (line, header_block) = match memmem::find(head, b"\r\n") {
            Some(pos) => (&head[..pos], &head[pos + 2..]),
            None => (head, &head[head.len()..]),
        };

        let (method, url, version) = Self::parse_request_line(line, max_url_len)?;
        let headers = Self::parse_headers(header_block);

        Ok(Request {
            method,
            version,
            url,
            headers,
            body,
        })
    }

    // Exactly three tokens separated by exactly two single spaces.
    fn parse_request_line(
        line: &[u8],
        max_url_len: usize,
    ) -> Result<(Method, String, Version), ParseError> {
        let first = memchr(b' ', line).ok_or(ParseError::Malformed)?;
        let rest = &line[first + 1..];
        let second = memchr(b' ', rest).ok_or(ParseError::Malformed)?;

        let method = &line[..first];
        let url = &rest[..second];
        let version = &rest[second + 1..];

        if method.is_empty() || url.is_empty() || version.is_empty() {
            return Err(ParseError::Malformed);
        }
        if memchr(b' ', version).is_some() {
            return Err(ParseError::Malformed);
        }
        if url.len() > max_url_len {
            return Err(ParseError::UrlTooLong);
        }

        let url = std::str::from_utf8(url)
            .map_err(|_| ParseError::Malformed)?
            .to_string();

        Ok((
            Method::from_token(method),
            url,
            Version::from_token(version),
        ))
    }

    // A line without the ": " separator ends header parsing; whatever was
    // collected up to that point is kept.
    fn parse_headers(block: &[u8]) -> Vec<Header> {
        let mut headers = Vec::new();

        let mut start = 0;
        while start < block.len() {
            // Next line break or end of block; the block carries no
            // trailing CRLF.
            let end = memmem::find(&block[start..], b"\r\n")
                .map(|pos| start + pos)
                .unwrap_or(block.len());

            match Self::parse_header(&block[start..end]) {
                Some(header) => headers.push(header),
                None => break,
            }

            start = end + 2;
        }

        headers
    }

    #[inline]
    fn parse_header(line: &[u8]) -> Option<Header> {
        let split = memmem::find(line, b": ")?;

        Some(Header {
            name: String::from_utf8_lossy(&line[..split]).into_owned(),
            value: String::from_utf8_lossy(&line[split + 2..]).into_owned(),
        })
    }
}

// Public API
impl Request {
    #[inline(always)]
    pub const fn method(&self) -> Method {
        self.method
    }

    #[inline(always)]
    pub const fn version(&self) -> Version {
        self.version
    }

    /// The raw request target, query string included.
    #[inline(always)]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The request target without the query string.
    #[inline]
    pub fn path(&self) -> &str {
        match self.url.split_once('?') {
            Some((path, _)) => path,
            None => &self.url,
        }
    }

    /// The raw query string after `?`, if any.
    #[inline]
    pub fn query_raw(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, q)| q)
    }

    /// First header value with case-insensitive name matching
    /// (per [RFC 7230](https://tools.ietf.org/html/rfc7230#section-3.2)).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    #[cfg(test)]
    pub(crate) fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// The request body, empty unless the client sent bytes past the head.
    #[inline(always)]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_URL: usize = 256;

    fn parse(raw: &str) -> Result<Request, ParseError> {
        Request::parse(raw.as_bytes(), MAX_URL)
    }

    #[test]
    fn head_completion() {
        assert!(!head_complete(b""));
        assert!(!head_complete(b"GET / HTTP/1.1\r\n"));
        assert!(!head_complete(b"GET / HTTP/1.1\r\nHost: x\r\n"));
        assert!(head_complete(b"GET / HTTP/1.1\r\n\r\n"));
        assert!(head_complete(b"GET / HTTP/1.1\r\nHost: x\r\n\r\ntrailing"));
    }

    #[test]
    fn parse_valid_request() {
        #[rustfmt::skip]
        let cases = [
            (
                "GET / HTTP/1.1\r\n\r\n",
                (Method::Get, "/", Version::Http11, vec![], b"" as &[u8]),
            ),
            (
                "GET /weather?location=ume%C3%A5 HTTP/1.1\r\n\r\n",
                (Method::Get, "/weather?location=ume%C3%A5", Version::Http11, vec![], b"" as &[u8]),
            ),
            (
                "POST /submit HTTP/1.0\r\nHost: 127.0.0.1\r\n\r\n",
                (Method::Post, "/submit", Version::Http10,
                 vec![("Host", "127.0.0.1")], b"" as &[u8]),
            ),
            (
                "GET /h HTTP/1.1\r\nHost: x\r\nUser-Agent: curl\r\nX-Empty: \r\n\r\n",
                (Method::Get, "/h", Version::Http11,
                 vec![("Host", "x"), ("User-Agent", "curl"), ("X-Empty", "")], b"" as &[u8]),
            ),
            (
                "POST /upload HTTP/1.1\r\nContent-Length: 4\r\n\r\nbody",
                (Method::Post, "/upload", Version::Http11,
                 vec![("Content-Length", "4")], b"body" as &[u8]),
            ),
            (
                "PUT /x HTTP/1.1\r\n\r\n",
                (Method::Unknown, "/x", Version::Http11, vec![], b"" as &[u8]),
            ),
            (
                "GET /x HTTP/2.0\r\n\r\n",
                (Method::Get, "/x", Version::Unknown, vec![], b"" as &[u8]),
            ),
        ];

        for (raw, (method, url, version, headers, body)) in cases {
            let req = parse(raw).unwrap_or_else(|e| panic!("case: {raw:?} -> {e}"));

            assert_eq!(req.method(), method, "case: {raw:?}");
            assert_eq!(req.url(), url, "case: {raw:?}");
            assert_eq!(req.version(), version, "case: {raw:?}");
            assert_eq!(req.body(), body, "case: {raw:?}");

            let got: Vec<(&str, &str)> = req
                .headers()
                .iter()
                .map(|h| (h.name.as_str(), h.value.as_str()))
                .collect();
            assert_eq!(got, headers, "case: {raw:?}");
        }
    }

    #[test]
    fn parse_invalid_request() {
        #[rustfmt::skip]
        let cases = [
            "",
            "\r\n\r\n",
            "GET /\r\n\r\n",
            "GET/ HTTP/1.1\r\n\r\n",
            "GET  / HTTP/1.1\r\n\r\n",
            "GET / HTTP/1.1 \r\n\r\n",
            "GET / HTTP /1.1\r\n\r\n",
            " GET / HTTP/1.1\r\n\r\n",
        ];

        for raw in cases {
            assert_eq!(
                Request::parse(raw.as_bytes(), MAX_URL),
                Err(ParseError::Malformed),
                "case: {raw:?}"
            );
        }
    }

    #[test]
    fn url_length_boundary() {
        let fits = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_URL - 1));
        let req = parse(&fits).unwrap();
        assert_eq!(req.url().len(), MAX_URL);

        let over = format!("GET /{} HTTP/1.1\r\n\r\n", "a".repeat(MAX_URL));
        assert_eq!(parse(&over), Err(ParseError::UrlTooLong));
    }

    #[test]
    fn header_without_separator_stops_parsing() {
        let req = parse("GET / HTTP/1.1\r\nHost: x\r\nbroken-line\r\nNext: kept?\r\n\r\n").unwrap();

        let got: Vec<&str> = req.headers().iter().map(|h| h.name.as_str()).collect();
        assert_eq!(got, vec!["Host"]);
    }

    #[test]
    fn colon_without_space_is_not_a_separator() {
        let req = parse("GET / HTTP/1.1\r\nHost:nospace\r\n\r\n").unwrap();
        assert!(req.headers().is_empty());
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = parse("GET / HTTP/1.1\r\nHost: here\r\n\r\n").unwrap();

        assert_eq!(req.header("host"), Some("here"));
        assert_eq!(req.header("HOST"), Some("here"));
        assert_eq!(req.header("missing"), None);
    }

    #[test]
    fn path_and_query_split() {
        let req = parse("GET /weather?lat=1&lon=2 HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(req.path(), "/weather");
        assert_eq!(req.query_raw(), Some("lat=1&lon=2"));

        let req = parse("GET /health HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(req.path(), "/health");
        assert_eq!(req.query_raw(), None);
    }

    #[test]
    fn stops_at_first_frame_marker() {
        let raw = "GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";
        let req = parse(raw).unwrap();

        assert_eq!(req.url(), "/a");
        assert_eq!(req.body(), b"GET /b HTTP/1.1\r\n\r\n");
    }
}
