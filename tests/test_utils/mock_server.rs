//! Minimal HTTP/1.1 collector used by the integration tests.
//!
//! Each accepted connection serves exactly one request and answers with
//! `Connection: close`, so every upload arrives on a fresh socket.

use std::{
    io::{BufRead, BufReader, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::mpsc,
    thread,
    time::Duration,
};

use rstest::fixture;

#[derive(Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    /// Header value by lower-case name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[fixture]
pub fn tcp_listener() -> TcpListener {
    TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener")
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        202 => "Accepted",
        400 => "Bad Request",
        403 => "Forbidden",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn parse_header_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    line.split_once(':')
        .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
}

fn read_http_request(stream: &mut TcpStream) -> Option<CapturedRequest> {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream.try_clone().ok()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;
    let mut parts = request_line.trim().split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        if line.trim().is_empty() {
            break;
        }
        let Some((key, value)) = parse_header_line(&line) else {
            continue;
        };
        if key == "content-length" {
            content_length = value.parse().unwrap_or(0);
        }
        headers.push((key, value));
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).ok()?;
    }
    Some(CapturedRequest {
        method,
        target,
        headers,
        body,
    })
}

/// Serve requests forever, answering with `statuses` in order and then
/// repeating `fallback`.
pub fn spawn_status_server(
    listener: TcpListener,
    statuses: Vec<u16>,
    fallback: u16,
) -> (SocketAddr, mpsc::Receiver<CapturedRequest>) {
    let addr = listener.local_addr().expect("listener has address");
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let mut statuses = statuses.into_iter();
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else {
                break;
            };
            let Some(captured) = read_http_request(&mut stream) else {
                continue;
            };
            let status = statuses.next().unwrap_or(fallback);
            let response = format!(
                "HTTP/1.1 {status} {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                status_text(status)
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.flush();
            if tx.send(captured).is_err() {
                break;
            }
        }
    });

    (addr, rx)
}
