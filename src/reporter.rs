//! # Reporting Module
//!
//! Delivers BPM readings to the remote collector over plain HTTP.
//!
//! ## Key Components
//! - `Reporter`: the capability the estimator calls once per interval
//! - `HttpReporter`: blocking GET against a fixed host and port
//! - `LogReporter`: stand-in used when no server is configured
//! - `FetchPolicy`: inactivity timeout and poll interval for response reads
//!
//! ## Exchange
//! Each reading becomes `GET /api/add_data/{bpm}`. The status is kept, the
//! body is logged but never interpreted. Each body read waits at most one
//! poll interval; data resets the inactivity clock, and a full inactivity
//! timeout without data abandons the exchange.
//!
//! The reporter owns a current-thread Tokio runtime and blocks on it, so the
//! caller sees an ordinary synchronous call. Run it behind the uploader when
//! the caller must not stall.

use crate::error::ReportError;
use core::fmt::Write as _;
use reqwest::header::CONNECTION;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::{timeout, Instant};

/// Path template for a reading; the BPM is appended
pub const REPORT_PATH_PREFIX: &str = "/api/add_data/";
/// One-time startup request
pub const STARTUP_PATH: &str = "/get_data";
/// Body bytes kept for logging; the rest is counted and dropped
pub const MAX_BODY_LEN: usize = 1024;

const USER_AGENT: &str = "pulse-relay";

/// Outcome of a successful `Reporter::send`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Server answered with this HTTP status
    Status(u16),
    /// Handed to the background uploader
    Queued,
    /// Only written to the log
    Logged,
}

/// Capability that transmits one BPM reading
pub trait Reporter {
    fn send(&mut self, bpm: u32) -> Result<Delivery, ReportError>;
}

/// How long to wait on a response that is slow to arrive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Give up after this long without receiving anything
    pub inactivity_timeout: Duration,
    /// Longest single wait for data before checking the timeout again
    pub poll_interval: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_millis(30_000),
            poll_interval: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    /// Body bytes received, including any beyond `MAX_BODY_LEN`
    pub received: usize,
    /// First `MAX_BODY_LEN` bytes of the body
    pub body: String,
}

/// Request path for one reading, formatted without allocating
pub fn report_path(bpm: u32) -> Result<heapless::String<32>, ReportError> {
    let mut path = heapless::String::new();
    write!(path, "{}{}", REPORT_PATH_PREFIX, bpm).map_err(|_| ReportError::PathOverflow(bpm))?;
    Ok(path)
}

pub struct HttpReporter {
    host: String,
    port: u16,
    base_url: String,
    policy: FetchPolicy,
    client: Client,
    runtime: Runtime,
}

impl HttpReporter {
    pub fn new(host: impl Into<String>, port: u16, policy: FetchPolicy) -> Result<Self, ReportError> {
        let host = host.into();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ReportError::Runtime(e.to_string()))?;

        // One exchange per connection, like the device
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| ReportError::Runtime(e.to_string()))?;

        Ok(Self {
            base_url: format!("http://{}:{}", host, port),
            host,
            port,
            policy,
            client,
            runtime,
        })
    }

    /// Block until a TCP connection to the server succeeds.
    ///
    /// Retries forever, sleeping `retry` between attempts. Returns the number
    /// of attempts it took.
    pub fn wait_for_link(&self, retry: Duration) -> u32 {
        log::info!("Connecting to {}:{}", self.host, self.port);
        let mut attempts = 0u32;
        loop {
            attempts = attempts.saturating_add(1);
            let probe = self.runtime.block_on(async {
                timeout(
                    self.policy.inactivity_timeout,
                    TcpStream::connect((self.host.as_str(), self.port)),
                )
                .await
            });
            match probe {
                Ok(Ok(_stream)) => {
                    log::info!("Link up after {} attempt(s)", attempts);
                    return attempts;
                }
                Ok(Err(e)) => log::debug!("Link attempt {} failed: {}", attempts, e),
                Err(_) => log::debug!("Link attempt {} timed out", attempts),
            }
            std::thread::sleep(retry);
        }
    }

    /// Issue a GET for `path` and collect the response under the fetch policy
    pub fn fetch(&self, path: &str) -> Result<HttpResponse, ReportError> {
        let url = format!("{}{}", self.base_url, path);
        self.runtime
            .block_on(exchange(&self.client, &url, self.policy))
    }
}

impl Reporter for HttpReporter {
    fn send(&mut self, bpm: u32) -> Result<Delivery, ReportError> {
        let path = report_path(bpm)?;

        let response = self.fetch(&path)?;
        log::info!("Got status code: {}", response.status);
        if let Some(len) = response.content_length {
            log::debug!("Content length is: {}", len);
        }
        if !response.body.is_empty() {
            log::info!("Body returned follows: {}", response.body);
        }
        if response.received > response.body.len() {
            log::debug!("Body cut at {} of {} bytes", response.body.len(), response.received);
        }
        Ok(Delivery::Status(response.status))
    }
}

/// Writes readings to the log instead of the network
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn send(&mut self, bpm: u32) -> Result<Delivery, ReportError> {
        log::info!("BPM: {}", bpm);
        Ok(Delivery::Logged)
    }
}

async fn exchange(client: &Client, url: &str, policy: FetchPolicy) -> Result<HttpResponse, ReportError> {
    let request = client.get(url).header(CONNECTION, "close").send();
    let mut response = match timeout(policy.inactivity_timeout, request).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) if e.is_connect() => return Err(ReportError::Connect(e)),
        Ok(Err(e)) => return Err(ReportError::Request(e)),
        Err(_) => return Err(ReportError::Timeout { received: 0 }),
    };
    log::debug!("startedRequest ok: GET {}", url);

    let status = response.status().as_u16();
    let content_length = response.content_length();

    let mut body = Vec::new();
    let mut received = 0usize;
    let mut last_data = Instant::now();
    loop {
        match timeout(policy.poll_interval, response.chunk()).await {
            Ok(Ok(Some(chunk))) => {
                log::debug!("Received {} body bytes", chunk.len());
                received += chunk.len();
                let room = MAX_BODY_LEN.saturating_sub(body.len());
                body.extend_from_slice(&chunk[..chunk.len().min(room)]);
                last_data = Instant::now();
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => return Err(ReportError::Body(e)),
            Err(_) => {
                if last_data.elapsed() >= policy.inactivity_timeout {
                    return Err(ReportError::Timeout { received });
                }
            }
        }
    }

    Ok(HttpResponse {
        status,
        content_length,
        received,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::thread;

    /// One-shot server: records the request head and replies with `response`
    fn serve_once(response: Vec<u8>, hold_open: Duration) -> (u16, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut head = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap() <= 2 {
                    break;
                }
                head.push_str(&line);
            }
            tx.send(head).unwrap();
            stream.write_all(&response).unwrap();
            stream.flush().unwrap();
            thread::sleep(hold_open);
        });
        (port, rx)
    }

    fn quick_policy() -> FetchPolicy {
        FetchPolicy {
            inactivity_timeout: Duration::from_millis(300),
            poll_interval: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_default_policy_values() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.inactivity_timeout, Duration::from_secs(30));
        assert_eq!(policy.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_report_path_fits_any_reading() {
        assert_eq!(report_path(72).unwrap().as_str(), "/api/add_data/72");
        assert_eq!(report_path(u32::MAX).unwrap().as_str(), "/api/add_data/4294967295");
    }

    #[test]
    fn test_send_requests_reading_path() {
        let (port, requests) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok".to_vec(),
            Duration::from_millis(0),
        );
        let mut reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        let delivery = reporter.send(72).unwrap();

        assert_eq!(delivery, Delivery::Status(200));
        let head = requests.recv().unwrap();
        assert!(head.starts_with("GET /api/add_data/72 HTTP/1.1\r\n"), "got {:?}", head);
    }

    #[test]
    fn test_host_header_carries_port() {
        let (port, requests) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n".to_vec(),
            Duration::from_millis(0),
        );
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        reporter.fetch(STARTUP_PATH).unwrap();

        let head = requests.recv().unwrap().to_ascii_lowercase();
        assert!(head.starts_with("get /get_data http/1.1\r\n"));
        assert!(head.contains(&format!("host: 127.0.0.1:{}\r\n", port)), "got {:?}", head);
        assert!(head.contains("connection: close\r\n"));
        assert!(head.contains("user-agent: pulse-relay\r\n"));
    }

    #[test]
    fn test_fetch_stops_at_content_length_without_close() {
        // Server keeps the socket open well past the inactivity timeout
        let (port, _requests) = serve_once(
            b"HTTP/1.1 201 Created\r\ncontent-length: 5\r\n\r\nhello".to_vec(),
            Duration::from_millis(2_000),
        );
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        let response = reporter.fetch(STARTUP_PATH).unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.content_length, Some(5));
        assert_eq!(response.body, "hello");
    }

    #[test]
    fn test_fetch_reads_until_close_without_length() {
        let (port, _requests) = serve_once(
            b"HTTP/1.0 404 Not Found\r\nServer: test\r\n\r\nmissing".to_vec(),
            Duration::from_millis(0),
        );
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        let response = reporter.fetch(STARTUP_PATH).unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.content_length, None);
        assert_eq!(response.body, "missing");
    }

    #[test]
    fn test_long_body_is_counted_but_capped() {
        let mut reply = b"HTTP/1.0 200 OK\r\n\r\n".to_vec();
        reply.extend(std::iter::repeat(b'x').take(5_000));
        let (port, _requests) = serve_once(reply, Duration::from_millis(0));
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        let response = reporter.fetch(STARTUP_PATH).unwrap();

        assert_eq!(response.received, 5_000);
        assert_eq!(response.body.len(), MAX_BODY_LEN);
    }

    #[test]
    fn test_stalled_body_times_out() {
        let (port, _requests) = serve_once(
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial".to_vec(),
            Duration::from_millis(2_000),
        );
        let mut reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        match reporter.send(60) {
            Err(ReportError::Timeout { received }) => assert_eq!(received, 7),
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_response_is_request_error() {
        let (port, _requests) = serve_once(b"SSH-2.0-OpenSSH\r\n\r\n".to_vec(), Duration::from_millis(0));
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        assert!(matches!(
            reporter.fetch(STARTUP_PATH),
            Err(ReportError::Request(_))
        ));
    }

    #[test]
    fn test_connect_refused_is_connect_error() {
        use std::error::Error;
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let mut reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        match reporter.send(80) {
            Err(e @ ReportError::Connect(_)) => assert!(e.source().is_some()),
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[test]
    fn test_wait_for_link_returns_once_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let reporter = HttpReporter::new("127.0.0.1", port, quick_policy()).unwrap();

        assert_eq!(reporter.wait_for_link(Duration::from_millis(10)), 1);
    }

    #[test]
    fn test_log_reporter_always_succeeds() {
        let mut reporter = LogReporter;
        assert!(matches!(reporter.send(0), Ok(Delivery::Logged)));
    }
}
