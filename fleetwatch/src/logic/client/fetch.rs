use crate::logic::client::endpoints::{build_api_url, EndpointBook};
use crate::logic::poll::TelemetryFeed;
use crate::logic::types::{FetchOutcome, TelemetryRecord};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{Local, Offset};
use reqwest::Client;
use std::time::Duration;

/// Responses at or under this length never carry usable fleet data,
/// whatever they parse as
pub const NO_DATA_MAX_LEN: usize = 18;

const APP_USER_AGENT: &str = concat!("fleetwatch/", env!("CARGO_PKG_VERSION"));

/// How the caller authenticates against the fleet service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    Account,
    Imei,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub mode: LoginMode,
    pub user: String,
    pub password: String,
}

/// HTTP implementation of the scheduler's network collaborator
pub struct HttpFeed {
    client: Client,
    endpoints: EndpointBook,
    creds: Credentials,
    zone: String,
}

impl HttpFeed {
    pub fn new(endpoints: EndpointBook, creds: Credentials, timeout_secs: u64) -> Result<Self> {
        if creds.mode == LoginMode::Imei && creds.user.len() != 15 {
            bail!(
                "imei login needs a 15-digit identifier, got {} characters",
                creds.user.len()
            );
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(APP_USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoints,
            creds,
            zone: local_zone_hours().to_string(),
        })
    }

    /// Fleet-list URL for the active endpoint and login mode
    fn list_url(&self) -> String {
        let base = self.endpoints.current();
        match self.creds.mode {
            LoginMode::Account => format!(
                "{}?login={}&pw={}&exp=1&tm={}",
                build_api_url(&base, "/api/fleet/mlist"),
                self.creds.user,
                self.creds.password,
                self.zone
            ),
            LoginMode::Imei => format!(
                "{}?imei={}&pw={}&exp=1&tm={}",
                build_api_url(&base, "/api/fleet/ilist"),
                self.creds.user,
                self.creds.password,
                self.zone
            ),
        }
    }
}

#[async_trait]
impl TelemetryFeed for HttpFeed {
    async fn fetch_fleet(&self) -> Result<FetchOutcome> {
        let url = self.list_url();
        log::debug!("fetching fleet list from {}", url);
        let body = async {
            let resp = self.client.get(&url).send().await?;
            resp.text().await
        }
        .await;
        match body {
            Ok(body) => {
                log::debug!("fleet response: {} bytes", body.len());
                Ok(parse_fleet(&body))
            }
            Err(err) => {
                // rotate before the scheduler's retry fires
                let next = self.endpoints.note_failure();
                log::warn!("fleet fetch failed, next endpoint {}", next);
                Err(err).context("fetching fleet list")
            }
        }
    }
}

/// Apply the short-body rule and parse the JSON array. Protocol
/// violations (non-JSON, wrong shape) read as "no data", not errors.
pub fn parse_fleet(body: &str) -> FetchOutcome {
    if body.len() <= NO_DATA_MAX_LEN {
        return FetchOutcome::NoData;
    }
    match serde_json::from_str::<Vec<TelemetryRecord>>(body) {
        Ok(records) if !records.is_empty() => FetchOutcome::Fleet(records),
        _ => FetchOutcome::NoData,
    }
}

/// Local UTC offset in whole hours, sent as the `tm` query parameter
fn local_zone_hours() -> i32 {
    Local::now().offset().fix().local_minus_utc() / 3600
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> EndpointBook {
        EndpointBook::new(vec!["http://fleet.example.com".to_string()]).unwrap()
    }

    #[test]
    fn test_account_list_url() {
        let feed = HttpFeed::new(
            book(),
            Credentials {
                mode: LoginMode::Account,
                user: "herder".to_string(),
                password: "pw123".to_string(),
            },
            15,
        )
        .unwrap();
        let url = feed.list_url();
        assert!(url.starts_with("http://fleet.example.com/api/fleet/mlist?login=herder&pw=pw123&exp=1&tm="));
    }

    #[test]
    fn test_imei_list_url_and_length_rule() {
        let feed = HttpFeed::new(
            book(),
            Credentials {
                mode: LoginMode::Imei,
                user: "861234567890123".to_string(),
                password: "pw123".to_string(),
            },
            15,
        )
        .unwrap();
        assert!(feed.list_url().contains("/api/fleet/ilist?imei=861234567890123&"));

        // anything but 15 characters is refused up front
        let err = HttpFeed::new(
            book(),
            Credentials {
                mode: LoginMode::Imei,
                user: "12345".to_string(),
                password: "pw123".to_string(),
            },
            15,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_short_body_is_nodata() {
        assert!(matches!(parse_fleet(""), FetchOutcome::NoData));
        assert!(matches!(parse_fleet("[]"), FetchOutcome::NoData));
        // 18 characters exactly still counts as empty
        assert!(matches!(
            parse_fleet(r#"[{"result":"NUL"}]"#),
            FetchOutcome::NoData
        ));
    }

    #[test]
    fn test_garbage_body_is_nodata() {
        assert!(matches!(
            parse_fleet("<html>service moved</html>"),
            FetchOutcome::NoData
        ));
        assert!(matches!(
            parse_fleet(r#"{"error":"wrong shape, not an array"}"#),
            FetchOutcome::NoData
        ));
    }

    #[test]
    fn test_fleet_body_parses() {
        let body = r#"[{"imei":"861234567890123","name":"collar","device":"6001",
            "bat":"85","log":"IN 2024-01-01 11:00:00",
            "gps":"2024-01-01 11:00:00,22.5,113.9,0,0","marker":1,"icon":1}]"#;
        match parse_fleet(body) {
            FetchOutcome::Fleet(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].name, "collar");
            }
            FetchOutcome::NoData => panic!("expected fleet"),
        }
    }
}
