//! Testing utilities and mock implementations.
//!
//! [`MockExchange`] stands in for the network below [`TransportClient`], so the
//! retry loop, the orchestrator and the client can be exercised without a
//! server.
//!
//! # Example
//!
//! ```rust,ignore
//! use stanpost_core::testing::{MockExchange, MockOutcome};
//!
//! let transport = TransportClient::new(MockExchange::new(), &TransportConfig::default());
//! transport.exchange().push(url, MockOutcome::connect_error());
//! transport.exchange().push(url, MockOutcome::ok(b"{}"));
//! ```
//!
//! [`TransportClient`]: crate::transport::TransportClient

mod mock_exchange;

pub use mock_exchange::{MockExchange, MockOutcome, RecordedRequest};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::reading::SourceRecord;

    /// Create a source record with reasonable defaults.
    pub fn source_record(idpel: &str, kdrbm: &str, daya: &str) -> SourceRecord {
        SourceRecord {
            idpel: idpel.to_string(),
            nama: format!("Customer {}", idpel),
            tarif: "R1".to_string(),
            daya: daya.to_string(),
            kdrbm: kdrbm.to_string(),
            blth: "202610".to_string(),
            merk_meter: "ITRON".to_string(),
            nomor_meter: format!("140{}", idpel),
        }
    }

    /// JSON body of a successful bulk fetch.
    pub fn fetch_body(records: &[SourceRecord]) -> Vec<u8> {
        serde_json::json!({ "success": 1, "stan": records })
            .to_string()
            .into_bytes()
    }
}
