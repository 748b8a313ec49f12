//! Human-readable labels for HTTP methods and response codes

/// Reason phrase for a response code, including common non-standard ones
pub fn status_text(code: u16) -> Option<&'static str> {
    let text = match code {
        // 1xx
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",

        // 2xx
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        207 => "Multi-Status",
        208 => "Already Reported",
        226 => "IM Used",

        // 3xx
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        306 => "Switch Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",

        // 4xx
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",

        // nginx
        444 => "No Response",
        495 => "SSL Certificate Error",
        496 => "SSL Certificate Required",
        497 => "HTTP Request Sent to HTTPS Port",
        499 => "Client Closed Request",

        // 5xx
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        506 => "Variant Also Negotiates",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        510 => "Not Extended",
        511 => "Network Authentication Required",

        // Cloudflare and proxies
        520 => "Unknown Error",
        521 => "Web Server Is Down",
        522 => "Connection Timed Out",
        523 => "Origin Is Unreachable",
        524 => "A Timeout Occurred",
        598 => "Network Read Timeout Error",

        _ => return None,
    };
    Some(text)
}

/// Short description of a request method, matched case-sensitively
pub fn method_description(method: &str) -> Option<&'static str> {
    let description = match method {
        "GET" => "Retrieve a resource",
        "POST" => "Create a new resource",
        "PUT" => "Update an existing resource",
        "PATCH" => "Partially update an existing resource",
        "DELETE" => "Delete a resource",
        "HEAD" => "Retrieve metadata about a resource",
        "OPTIONS" => "Describe the HTTP methods supported by a resource",
        "CONNECT" => "Establish a tunnel to the server",
        "TRACE" => "Perform a message loop-back test",
        "LINK" => "Create a relationship between two existing resources",
        "UNLINK" => "Remove a relationship between two existing resources",
        "SEARCH" => "Query resources",
        "MKCALENDAR" => "Create a new calendar",
        "MKCOL" => "Create a new collection",
        "COPY" => "Copy a resource",
        "MOVE" => "Move a resource",
        "LOCK" => "Lock a resource",
        "UNLOCK" => "Unlock a resource",
        "PROPFIND" => "Retrieve properties of a resource",
        "PROPPATCH" => "Update properties of a resource",
        _ => return None,
    };
    Some(description)
}

/// "404 Not Found", or just the number for unknown codes
pub fn status_label(code: u16) -> String {
    match status_text(code) {
        Some(text) => format!("{code} {text}"),
        None => code.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_codes() {
        assert_eq!(status_text(200), Some("OK"));
        assert_eq!(status_text(404), Some("Not Found"));
        assert_eq!(status_text(499), Some("Client Closed Request"));
        assert_eq!(status_text(299), None);
    }

    #[test]
    fn labels() {
        assert_eq!(status_label(301), "301 Moved Permanently");
        assert_eq!(status_label(999), "999");
    }

    #[test]
    fn methods() {
        assert_eq!(method_description("GET"), Some("Retrieve a resource"));
        assert_eq!(method_description("PROPFIND"), Some("Retrieve properties of a resource"));
        assert_eq!(method_description("get"), None);
        assert_eq!(method_description("-"), None);
    }
}
