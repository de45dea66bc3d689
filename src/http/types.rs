//! Core HTTP protocol types

// METHOD

/// HTTP request methods understood by the router.
///
/// Everything else parses as [`Unknown`](Method::Unknown) and is rejected
/// at routing time with `400`, not by the parser.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET method - transfer a current representation of the target resource
    /// [[RFC7231, Section 4.3.1](https://tools.ietf.org/html/rfc7231#section-4.3.1)]
    Get,
    /// POST method - perform resource-specific processing on the request payload
    /// [[RFC7231, Section 4.3.3](https://tools.ietf.org/html/rfc7231#section-4.3.3)]
    Post,
    /// Any other token in the method position.
    Unknown,
}

impl Method {
    #[inline(always)]
    pub(crate) fn from_token(src: &[u8]) -> Self {
        match src {
            b"GET" => Method::Get,
            b"POST" => Method::Post,
            _ => Method::Unknown,
        }
    }
}

// VERSION

/// HTTP protocol version tag from the request line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Version {
    /// HTTP/1.0 [RFC 1945](https://tools.ietf.org/html/rfc1945)
    Http10,
    /// HTTP/1.1 [RFC 7230](https://tools.ietf.org/html/rfc7230) and related
    Http11,
    /// Any other token in the version position.
    Unknown,
}

impl Version {
    #[inline(always)]
    pub(crate) const fn from_token(src: &[u8]) -> Self {
        match src {
            b"HTTP/1.1" => Version::Http11,
            b"HTTP/1.0" => Version::Http10,
            _ => Version::Unknown,
        }
    }
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])+
        $name:ident = ($num:expr, $str:expr);
    )+) => {
        /// HTTP status codes the server can emit.
        ///
        /// Responses are always HTTP/1.1. The set covers what the route
        /// table and error paths produce, plus the redirect and auth
        /// codes usable through the general response builder.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])+
            $name = $num,
        )+ }

        impl StatusCode {
            // Returns the first line as bytes (e.g., `b"HTTP/1.1 200 OK\r\n"`).
            #[inline]
            pub(crate) const fn status_line(&self) -> &'static [u8] {
                match self { $(
                    StatusCode::$name => {
                        concat!("HTTP/1.1 ", $num, " ", $str, "\r\n").as_bytes()
                    },
                )+ }
            }
        }
    }
}

set_status_codes! {
    /// [[RFC9110, Section 15.3.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.3.1)]
    Ok = (200, "OK");

    /// [[RFC9110, Section 15.4.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.2)]
    MovedPermanently = (301, "Moved Permanently");
    /// [[RFC9110, Section 15.4.3](https://datatracker.ietf.org/doc/html/rfc9110#section-15.4.3)]
    Found = (302, "Found");

    /// [[RFC9110, Section 15.5.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.1)]
    BadRequest = (400, "Bad Request");
    /// [[RFC9110, Section 15.5.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.2)]
    Unauthorized = (401, "Unauthorized");
    /// [[RFC9110, Section 15.5.5](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.5)]
    NotFound = (404, "Not Found");
    /// [[RFC9110, Section 15.5.6](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.6)]
    MethodNotAllowed = (405, "Method Not Allowed");
    /// [[RFC9110, Section 15.5.9](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.9)]
    RequestTimeout = (408, "Request Timeout");
    /// [[RFC9110, Section 15.5.14](https://datatracker.ietf.org/doc/html/rfc9110#section-15.5.14)]
    ContentTooLarge = (413, "Content Too Large");
    /// [[RFC6585, Section 4](https://datatracker.ietf.org/doc/html/rfc6585#section-4)]
    TooManyRequests = (429, "Too Many Requests");

    /// [[RFC9110, Section 15.6.1](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.1)]
    InternalServerError = (500, "Internal Server Error");
    /// [[RFC9110, Section 15.6.2](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.2)]
    NotImplemented = (501, "Not Implemented");
    /// [[RFC9110, Section 15.6.4](https://datatracker.ietf.org/doc/html/rfc9110#section-15.6.4)]
    ServiceUnavailable = (503, "Service Unavailable");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_from_token() {
        #[rustfmt::skip]
        let cases = [
            (b"GET" as &[u8],  Method::Get),
            (b"POST" as &[u8], Method::Post),
            (b"PUT" as &[u8],  Method::Unknown),
            (b"get" as &[u8],  Method::Unknown),
            (b"" as &[u8],     Method::Unknown),
        ];

        for (token, expected) in cases {
            assert_eq!(Method::from_token(token), expected);
        }
    }

    #[test]
    fn version_from_token() {
        #[rustfmt::skip]
        let cases = [
            (b"HTTP/1.1" as &[u8], Version::Http11),
            (b"HTTP/1.0" as &[u8], Version::Http10),
            (b"HTTP/2.0" as &[u8], Version::Unknown),
            (b"http/1.1" as &[u8], Version::Unknown),
            (b"" as &[u8],         Version::Unknown),
        ];

        for (token, expected) in cases {
            assert_eq!(Version::from_token(token), expected);
        }
    }

    #[test]
    fn status_lines() {
        let cases = [
            (StatusCode::Ok, "HTTP/1.1 200 OK\r\n"),
            (StatusCode::BadRequest, "HTTP/1.1 400 Bad Request\r\n"),
            (StatusCode::ContentTooLarge, "HTTP/1.1 413 Content Too Large\r\n"),
            (
                StatusCode::InternalServerError,
                "HTTP/1.1 500 Internal Server Error\r\n",
            ),
        ];

        for (status, line) in cases {
            assert_eq!(status.status_line(), line.as_bytes());
        }
    }
}
