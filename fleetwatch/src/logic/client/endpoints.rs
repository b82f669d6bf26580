use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// Rotating list of fleet-service base URLs.
///
/// The service is reachable through several mirrors; every network failure
/// advances to the next one so a dead host does not pin the client.
#[derive(Debug)]
pub struct EndpointBook {
    hosts: Vec<String>,
    active: AtomicUsize,
}

impl EndpointBook {
    pub fn new(hosts: Vec<String>) -> Result<Self> {
        if hosts.is_empty() {
            bail!("at least one server endpoint is required");
        }
        let mut cleaned = Vec::with_capacity(hosts.len());
        for host in hosts {
            let host = host.trim_end_matches('/').to_string();
            Url::parse(&host).with_context(|| format!("invalid endpoint {}", host))?;
            cleaned.push(host);
        }
        Ok(Self {
            hosts: cleaned,
            active: AtomicUsize::new(0),
        })
    }

    /// Build from host/port the way the CLI takes them. A host that
    /// already carries a protocol is used as-is.
    pub fn from_host_port(host: &str, port: u16) -> Result<Self> {
        let base = if host.starts_with("http://") || host.starts_with("https://") {
            host.trim_end_matches('/').to_string()
        } else {
            format!("http://{}:{}", host, port)
        };
        Self::new(vec![base])
    }

    /// Base URL requests should currently use
    pub fn current(&self) -> String {
        self.hosts[self.active.load(Ordering::SeqCst) % self.hosts.len()].clone()
    }

    /// Note one network failure and rotate; returns the new active base
    pub fn note_failure(&self) -> String {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.current()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Join a base URL and an absolute path
pub fn build_api_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_api_url() {
        assert_eq!(
            build_api_url("https://fleet.example.com", "/api/fleet/mlist"),
            "https://fleet.example.com/api/fleet/mlist"
        );
        assert_eq!(
            build_api_url("https://fleet.example.com/", "/api/fleet/mlist"),
            "https://fleet.example.com/api/fleet/mlist"
        );
    }

    #[test]
    fn test_rotation_wraps_around() {
        let book = EndpointBook::new(vec![
            "http://one.example.com".to_string(),
            "http://two.example.com".to_string(),
        ])
        .unwrap();
        assert_eq!(book.current(), "http://one.example.com");
        assert_eq!(book.note_failure(), "http://two.example.com");
        assert_eq!(book.note_failure(), "http://one.example.com");
        assert_eq!(book.current(), "http://one.example.com");
    }

    #[test]
    fn test_rejects_empty_and_invalid() {
        assert!(EndpointBook::new(vec![]).is_err());
        assert!(EndpointBook::new(vec!["not a url".to_string()]).is_err());
    }

    #[test]
    fn test_from_host_port() {
        let book = EndpointBook::from_host_port("127.0.0.1", 3030).unwrap();
        assert_eq!(book.current(), "http://127.0.0.1:3030");
        let book = EndpointBook::from_host_port("https://fleet.example.com/", 3030).unwrap();
        assert_eq!(book.current(), "https://fleet.example.com");
    }
}
