//! Bulk fetch of the records assigned to one identity.

use chrono::{Local, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::FetchConfig;
use crate::context::Context;
use crate::form::FormPayload;
use crate::reading::SourceRecord;
use crate::transport::{Exchange, Method, TransportClient, TransportError};

/// Date format of the `tgllogin` field.
pub const LOGIN_DATE_FORMAT: &str = "%m/%d/%Y";

const FETCH_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to decode fetch response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("API returned unsuccessful response (success = {success})")]
    Unsuccessful { success: i64 },

    #[error("no data returned from API")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    stan: Vec<SourceRecord>,
    #[serde(default)]
    success: i64,
}

/// Form body of a fetch for `username` on `today`.
pub fn fetch_form(username: &str, unitup: &str, today: NaiveDate) -> FormPayload {
    FormPayload::new()
        .field("username", username)
        .field("tgllogin", today.format(LOGIN_DATE_FORMAT).to_string())
        .field("unitup", unitup)
}

/// Fetch every record assigned to `username` in `unitup`.
///
/// Fails unless the API answers `success == 1` with at least one record.
pub async fn fetch_records<E: Exchange>(
    transport: &TransportClient<E>,
    ctx: &Context,
    base_url: &str,
    config: &FetchConfig,
    username: &str,
    unitup: &str,
) -> Result<Vec<SourceRecord>, FetchError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), config.path);
    let payload = fetch_form(username, unitup, Local::now().date_naive()).encode();
    let headers = [
        ("User-Agent".to_string(), config.user_agent.clone()),
        ("Content-Type".to_string(), FETCH_CONTENT_TYPE.to_string()),
        ("Connection".to_string(), "Keep-Alive".to_string()),
    ];

    debug!(url = %url, username = username, "Fetching records");
    let body = transport
        .send(ctx, Method::POST, &url, &payload, &headers)
        .await?;

    let records = decode_response(&body)?;
    info!(username = username, records = records.len(), "Fetched records");
    Ok(records)
}

fn decode_response(body: &[u8]) -> Result<Vec<SourceRecord>, FetchError> {
    let response: FetchResponse = serde_json::from_slice(body)?;
    if response.success != 1 {
        return Err(FetchError::Unsuccessful {
            success: response.success,
        });
    }
    if response.stan.is_empty() {
        return Err(FetchError::Empty);
    }
    Ok(response.stan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::testing::{MockExchange, MockOutcome};

    const BASE: &str = "http://api.test/mobile";
    const URL: &str = "http://api.test/mobile/getAllStanPrabayar";

    fn transport() -> TransportClient<MockExchange> {
        TransportClient::new(MockExchange::new(), &TransportConfig::default())
    }

    async fn fetch(
        transport: &TransportClient<MockExchange>,
    ) -> Result<Vec<SourceRecord>, FetchError> {
        fetch_records(
            transport,
            &Context::background(),
            BASE,
            &FetchConfig::default(),
            "52260.j07",
            "52260",
        )
        .await
    }

    #[test]
    fn test_fetch_form() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 4).unwrap();
        assert_eq!(
            fetch_form("52260.j07", "52260", today).encode(),
            "username=52260.j07&tgllogin=03%2F04%2F2026&unitup=52260"
        );
    }

    #[tokio::test]
    async fn test_fetch_decodes_records() {
        let transport = transport();
        transport.exchange().push(
            URL,
            MockOutcome::ok(
                br#"{"success": 1, "stan": [
                    {"idpel": "1", "kdrbm": "A1", "daya": "900", "extra": "ignored"},
                    {"idpel": "2", "kdrbm": "B2"}
                ]}"#,
            ),
        );

        let records = fetch(&transport).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].daya, "900");
        assert_eq!(records[1].kdrbm, "B2");

        let request = &transport.exchange().recorded_for(URL)[0];
        assert_eq!(request.method, Method::POST);
        assert_eq!(
            request.header("user-agent").as_deref(),
            Some("Apache-HttpClient/UNAVAILABLE (java 1.4)")
        );
        assert_eq!(
            request.header("content-type").as_deref(),
            Some(FETCH_CONTENT_TYPE)
        );
        assert_eq!(request.form_value("username").as_deref(), Some("52260.j07"));
        assert_eq!(request.form_value("unitup").as_deref(), Some("52260"));
        let date = request.form_value("tgllogin").unwrap();
        assert!(NaiveDate::parse_from_str(&date, LOGIN_DATE_FORMAT).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_unsuccessful() {
        let transport = transport();
        transport
            .exchange()
            .push(URL, MockOutcome::ok(br#"{"success": 0, "stan": []}"#));

        let err = fetch(&transport).await.unwrap_err();
        assert!(matches!(err, FetchError::Unsuccessful { success: 0 }));
    }

    #[tokio::test]
    async fn test_fetch_empty() {
        let transport = transport();
        transport
            .exchange()
            .push(URL, MockOutcome::ok(br#"{"success": 1, "stan": []}"#));

        assert!(matches!(fetch(&transport).await, Err(FetchError::Empty)));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let transport = transport();
        transport.exchange().push(URL, MockOutcome::ok(b"<html>"));

        assert!(matches!(fetch(&transport).await, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_fetch_bad_status() {
        let transport = transport();
        transport.exchange().push(URL, MockOutcome::status(503));

        let err = fetch(&transport).await.unwrap_err();
        assert!(matches!(
            err,
            FetchError::Transport(TransportError::Status { status: 503 })
        ));
        assert_eq!(transport.exchange().calls(URL), 1);
    }
}
