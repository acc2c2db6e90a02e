//! Loopback-only HTTP health endpoints: `/health`, `/health/ready`,
//! `/health/live`, `/health/details`. Hand-rolled over `std::net`
//! rather than a web framework — four fixed routes and a JSON body
//! do not need one.

use crate::monitor::{HealthReading, HealthStatus, ProcessMonitor};
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Runs the health server on a dedicated thread until [`HealthServer::stop`].
pub struct HealthServer {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HealthServer {
    /// Bind `addr` (loopback expected) and start serving.
    pub fn start(addr: &str, monitor: Arc<ProcessMonitor>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_thread = stop_flag.clone();

        let handle = std::thread::spawn(move || {
            while !stop_flag_thread.load(Ordering::Relaxed) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let _ = handle_connection(stream, &monitor);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(std::time::Duration::from_millis(20));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "health server accept error");
                    }
                }
            }
        });

        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(mut stream: TcpStream, monitor: &ProcessMonitor) -> std::io::Result<()> {
    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("");

    if method != "GET" {
        return write_response(&mut stream, 405, "Method Not Allowed", &json!({"error": "method not allowed"}));
    }

    let reading = monitor.reading(0.0);
    match path {
        "/health" => {
            let (code, text) = match reading.status {
                HealthStatus::Healthy => (200, "OK"),
                _ => (503, "Service Unavailable"),
            };
            write_response(&mut stream, code, text, &status_body(&reading))
        }
        "/health/ready" => {
            let ready = matches!(reading.status, HealthStatus::Healthy | HealthStatus::Degraded);
            let (code, text) = if ready { (200, "OK") } else { (503, "Service Unavailable") };
            write_response(&mut stream, code, text, &json!({"ready": ready}))
        }
        "/health/live" => {
            let alive = !matches!(reading.status, HealthStatus::Stopped);
            let (code, text) = if alive { (200, "OK") } else { (503, "Service Unavailable") };
            write_response(&mut stream, code, text, &json!({"alive": alive}))
        }
        "/health/details" => {
            let mut body = status_body(&reading);
            body["assessment"] = json!(assessment_str(monitor));
            write_response(&mut stream, 200, "OK", &body)
        }
        _ => write_response(&mut stream, 404, "Not Found", &json!({"error": "not found"})),
    }
}

fn assessment_str(monitor: &ProcessMonitor) -> &'static str {
    match monitor.assessment_level() {
        crate::monitor::AssessmentLevel::Good => "good",
        crate::monitor::AssessmentLevel::Warning => "warning",
        crate::monitor::AssessmentLevel::Critical => "critical",
        crate::monitor::AssessmentLevel::Info => "info",
    }
}

fn status_body(reading: &HealthReading) -> serde_json::Value {
    serde_json::to_value(reading).unwrap_or(json!({}))
}

fn write_response(stream: &mut TcpStream, code: u16, text: &str, body: &serde_json::Value) -> std::io::Result<()> {
    let payload = serde_json::to_vec(body).unwrap_or_default();
    write!(
        stream,
        "HTTP/1.1 {code} {text}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        payload.len()
    )?;
    stream.write_all(&payload)?;
    stream.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::HealthThresholds;
    use std::io::Read;
    use std::net::TcpStream as ClientStream;

    fn get(addr: &str, path: &str) -> (u16, String) {
        let mut stream = ClientStream::connect(addr).unwrap();
        write!(stream, "GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n").unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        let code: u16 = response.split_whitespace().nth(1).unwrap().parse().unwrap();
        (code, response)
    }

    #[test]
    fn health_returns_503_when_starting() {
        let monitor = Arc::new(ProcessMonitor::new("rt", 1, HealthThresholds::default()));
        let server = HealthServer::start("127.0.0.1:18901", monitor).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(30));
        let (code, _) = get("127.0.0.1:18901", "/health");
        assert_eq!(code, 503);
        server.stop();
    }

    #[test]
    fn health_returns_200_once_healthy() {
        let monitor = Arc::new(ProcessMonitor::new("rt", 1, HealthThresholds::default()));
        monitor.record_heartbeat(5.0, 50.0);
        let server = HealthServer::start("127.0.0.1:18902", monitor).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(30));
        let (code, _) = get("127.0.0.1:18902", "/health");
        assert_eq!(code, 200);
        server.stop();
    }

    #[test]
    fn unknown_path_is_404() {
        let monitor = Arc::new(ProcessMonitor::new("rt", 1, HealthThresholds::default()));
        let server = HealthServer::start("127.0.0.1:18903", monitor).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(30));
        let (code, _) = get("127.0.0.1:18903", "/nope");
        assert_eq!(code, 404);
        server.stop();
    }
}
