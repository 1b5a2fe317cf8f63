//! Just enough HTTP/1.0 to talk to echo services and DDNS update endpoints
//! over a raw [`Transport`](crate::transport::Transport).

/// Format a complete `GET` request, ready to be written to the wire.
pub fn get_request(host: &str, path_and_query: &str) -> String {
    format!("GET {path_and_query} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    /// `None` when the peer answered with a bare body and no status line.
    pub status: Option<u16>,
    pub body: &'a str,
}

impl<'a> Response<'a> {
    /// Split raw response text into status and body. Text that does not open
    /// with an `HTTP/` status line is taken to be the body in its entirety.
    pub fn parse(raw: &'a str) -> Self {
        if !raw.starts_with("HTTP/") {
            return Self {
                status: None,
                body: raw,
            };
        }

        let status = raw
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().nth(1))
            .and_then(|code| code.parse::<u16>().ok());

        let crlf = raw.find("\r\n\r\n").map(|at| at + 4);
        let lf = raw.find("\n\n").map(|at| at + 2);

        // Whichever blank line comes first ends the header block.
        let body_start = match (crlf, lf) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Self {
            status,
            body: body_start.map(|at| &raw[at..]).unwrap_or_default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.map_or(true, |code| (200..300).contains(&code))
    }
}
