//! Submission orchestrator implementation.
//!
//! Fans one reading out into a primary task and an auxiliary group task; the
//! group in turn spawns one task per auxiliary endpoint and waits for all of
//! them before publishing its results.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SubmissionConfig;
use crate::context::Context;
use crate::form::default_headers;
use crate::reading::{MeterReading, PhotoUpload};
use crate::transport::{Exchange, Method, ReqwestExchange, TransportClient};

use super::types::{AuxiliaryResult, SubmissionError, SubmissionResult};

/// Endpoint URLs and headers resolved once from configuration.
#[derive(Debug)]
struct Endpoints {
    primary_url: String,
    auxiliary: Vec<(String, String)>,
    primary_user_agent: String,
    auxiliary_user_agent: String,
}

/// Submits readings over a shared [`TransportClient`].
pub struct SubmissionOrchestrator<E = ReqwestExchange> {
    transport: Arc<TransportClient<E>>,
    endpoints: Arc<Endpoints>,
}

impl<E: Exchange + 'static> SubmissionOrchestrator<E> {
    pub fn new(
        transport: Arc<TransportClient<E>>,
        base_url: &str,
        config: &SubmissionConfig,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        let endpoints = Endpoints {
            primary_url: format!("{}{}", base, config.primary_path),
            auxiliary: config
                .auxiliary_paths
                .iter()
                .map(|path| (path.clone(), format!("{}{}", base, path)))
                .collect(),
            primary_user_agent: config.primary_user_agent.clone(),
            auxiliary_user_agent: config.auxiliary_user_agent.clone(),
        };

        Self {
            transport,
            endpoints: Arc::new(endpoints),
        }
    }

    pub fn transport(&self) -> &Arc<TransportClient<E>> {
        &self.transport
    }

    /// Configured auxiliary endpoint paths, in result order.
    pub fn auxiliary_endpoints(&self) -> Vec<&str> {
        self.endpoints
            .auxiliary
            .iter()
            .map(|(path, _)| path.as_str())
            .collect()
    }

    /// Submit `reading` and upload `photo` to every auxiliary endpoint.
    ///
    /// Never fails as a whole: each task's failure, cancellation included, is
    /// recorded in its own slot of the result.
    pub async fn submit_reading(
        &self,
        ctx: &Context,
        reading: &MeterReading,
        photo: &PhotoUpload,
    ) -> SubmissionResult {
        debug!(
            idpel = %reading.idpel,
            auxiliary = self.endpoints.auxiliary.len(),
            "Submitting reading"
        );

        let primary = tokio::spawn(submit_primary(
            Arc::clone(&self.transport),
            Arc::clone(&self.endpoints),
            ctx.clone(),
            reading.clone(),
        ));
        let auxiliary = tokio::spawn(submit_auxiliary_group(
            Arc::clone(&self.transport),
            Arc::clone(&self.endpoints),
            ctx.clone(),
            Arc::new(photo.clone()),
        ));

        let (primary, auxiliary) = tokio::join!(primary, auxiliary);

        let primary = primary.unwrap_or_else(|e| Err(SubmissionError::TaskFailed(e.to_string())));
        let auxiliary = auxiliary.unwrap_or_else(|e| {
            self.endpoints
                .auxiliary
                .iter()
                .map(|(path, _)| AuxiliaryResult {
                    endpoint: path.clone(),
                    outcome: Err(SubmissionError::TaskFailed(e.to_string())),
                })
                .collect()
        });

        let result = SubmissionResult { primary, auxiliary };
        match &result.primary {
            Ok(_) => info!(
                idpel = %reading.idpel,
                succeeded = result.succeeded_count(),
                total = result.total(),
                "Reading submitted"
            ),
            Err(e) => warn!(idpel = %reading.idpel, error = %e, "Reading submission failed"),
        }
        result
    }
}

async fn submit_primary<E: Exchange>(
    transport: Arc<TransportClient<E>>,
    endpoints: Arc<Endpoints>,
    ctx: Context,
    reading: MeterReading,
) -> Result<Vec<u8>, SubmissionError> {
    if let Some(err) = ctx.err() {
        return Err(SubmissionError::Cancelled(err));
    }

    let payload = reading.to_form().encode();
    let headers = default_headers(&endpoints.primary_user_agent);
    transport
        .send(&ctx, Method::POST, &endpoints.primary_url, &payload, &headers)
        .await
        .map_err(SubmissionError::Primary)
}

async fn submit_auxiliary_group<E: Exchange + 'static>(
    transport: Arc<TransportClient<E>>,
    endpoints: Arc<Endpoints>,
    ctx: Context,
    photo: Arc<PhotoUpload>,
) -> Vec<AuxiliaryResult> {
    // Slots are pre-filled so an index is never missing, whatever happens to its task.
    let slots: Arc<Mutex<Vec<AuxiliaryResult>>> = Arc::new(Mutex::new(
        endpoints
            .auxiliary
            .iter()
            .map(|(path, _)| AuxiliaryResult {
                endpoint: path.clone(),
                outcome: Err(SubmissionError::TaskFailed("task did not complete".to_string())),
            })
            .collect(),
    ));

    let handles: Vec<JoinHandle<()>> = (0..endpoints.auxiliary.len())
        .map(|index| {
            let transport = Arc::clone(&transport);
            let endpoints = Arc::clone(&endpoints);
            let ctx = ctx.clone();
            let photo = Arc::clone(&photo);
            let slots = Arc::clone(&slots);

            tokio::spawn(async move {
                let (path, url) = &endpoints.auxiliary[index];
                let outcome = match ctx.err() {
                    Some(err) => Err(SubmissionError::Cancelled(err)),
                    None => {
                        let payload = photo.to_form().encode();
                        let headers = default_headers(&endpoints.auxiliary_user_agent);
                        transport
                            .send(&ctx, Method::POST, url, &payload, &headers)
                            .await
                            .map_err(SubmissionError::Auxiliary)
                    }
                };

                if let Err(e) = &outcome {
                    warn!(endpoint = %path, error = %e, "Auxiliary upload failed");
                }
                slots.lock()[index].outcome = outcome;
            })
        })
        .collect();

    for (index, joined) in futures::future::join_all(handles).await.into_iter().enumerate() {
        if let Err(e) = joined {
            slots.lock()[index].outcome = Err(SubmissionError::TaskFailed(e.to_string()));
        }
    }

    let results = std::mem::take(&mut *slots.lock());
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use crate::reading::SourceRecord;
    use crate::testing::{MockExchange, MockOutcome};
    use crate::transport::TransportError;
    use std::time::{Duration, Instant};

    const BASE: &str = "http://mock.local/mobile";

    fn url(path: &str) -> String {
        format!("{}{}", BASE, path)
    }

    fn orchestrator(mock: MockExchange) -> SubmissionOrchestrator<MockExchange> {
        let transport = Arc::new(TransportClient::new(mock, &TransportConfig::default()));
        SubmissionOrchestrator::new(transport, BASE, &SubmissionConfig::default())
    }

    fn exchange_of(orchestrator: &SubmissionOrchestrator<MockExchange>) -> &MockExchange {
        orchestrator.transport().exchange()
    }

    fn sample() -> (MeterReading, PhotoUpload) {
        let record = SourceRecord {
            idpel: "522600000001".to_string(),
            nama: "BUDI".to_string(),
            tarif: "R1".to_string(),
            daya: "900".to_string(),
            kdrbm: "A1".to_string(),
            blth: "202610".to_string(),
            merk_meter: "HEXING".to_string(),
            nomor_meter: "56000000001".to_string(),
        };
        let reading = MeterReading {
            idpel: record.idpel.clone(),
            blth: record.blth.clone(),
            tglbaca: "10/19/2026 07:42:10".to_string(),
            latitude: "-7.139337".to_string(),
            longitude: "109.252766".to_string(),
            ..Default::default()
        };
        let photo = PhotoUpload::for_record(&record, "52260", "cGhvdG8=".to_string());
        (reading, photo)
    }

    fn all_ok(mock: &MockExchange) {
        mock.always(&url("/setStanPrabayar"), MockOutcome::ok(b"primary"));
        for path in ["/uploadFoto52", "/uploadFoto2", "/uploadFoto3"] {
            mock.always(&url(path), MockOutcome::ok(path.as_bytes()));
        }
    }

    #[tokio::test]
    async fn test_all_succeed() {
        let mock = MockExchange::new();
        all_ok(&mock);
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;

        assert!(result.is_complete_success());
        assert_eq!(result.primary.as_deref().unwrap(), b"primary");
        assert_eq!(result.auxiliary.len(), 3);
        for (slot, path) in result
            .auxiliary
            .iter()
            .zip(["/uploadFoto52", "/uploadFoto2", "/uploadFoto3"])
        {
            assert_eq!(slot.endpoint, path);
            assert_eq!(slot.outcome.as_deref().unwrap(), path.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_slots_follow_configuration_not_completion() {
        let mock = MockExchange::new();
        mock.always(&url("/setStanPrabayar"), MockOutcome::ok(b"primary"));
        mock.always(
            &url("/uploadFoto52"),
            MockOutcome::ok(b"first").with_delay(Duration::from_millis(200)),
        );
        mock.always(
            &url("/uploadFoto2"),
            MockOutcome::ok(b"second").with_delay(Duration::from_millis(50)),
        );
        mock.always(&url("/uploadFoto3"), MockOutcome::ok(b"third"));
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;

        let order = exchange_of(&orchestrator).completion_order();
        let pos = |path: &str| order.iter().position(|u| *u == url(path)).unwrap();
        assert!(pos("/uploadFoto3") < pos("/uploadFoto52"));

        let bodies: Vec<&[u8]> = result
            .auxiliary
            .iter()
            .map(|r| r.outcome.as_deref().unwrap())
            .collect();
        assert_eq!(bodies, vec![&b"first"[..], &b"second"[..], &b"third"[..]]);
        assert_eq!(result.auxiliary[0].endpoint, "/uploadFoto52");
    }

    #[tokio::test]
    async fn test_tasks_run_concurrently() {
        let mock = MockExchange::new();
        let delay = Duration::from_millis(150);
        mock.always(&url("/setStanPrabayar"), MockOutcome::ok(b"").with_delay(delay));
        for path in ["/uploadFoto52", "/uploadFoto2", "/uploadFoto3"] {
            mock.always(&url(path), MockOutcome::ok(b"").with_delay(delay));
        }
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let started = Instant::now();
        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;
        assert!(result.is_complete_success());
        assert!(started.elapsed() < delay * 3);
    }

    #[tokio::test]
    async fn test_auxiliary_failure_is_isolated() {
        let mock = MockExchange::new();
        all_ok(&mock);
        mock.push(&url("/uploadFoto2"), MockOutcome::status(500));
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;

        assert!(result.primary_succeeded());
        assert!(result.auxiliary[0].is_success());
        assert!(matches!(
            result.auxiliary[1].outcome,
            Err(SubmissionError::Auxiliary(TransportError::Status { status: 500 }))
        ));
        assert!(result.auxiliary[2].is_success());
        assert_eq!(result.succeeded_count(), 3);
    }

    #[tokio::test]
    async fn test_primary_failure_leaves_uploads_alone() {
        let mock = MockExchange::new();
        all_ok(&mock);
        mock.push(&url("/setStanPrabayar"), MockOutcome::status(400));
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;

        let err = result.primary.as_ref().unwrap_err();
        assert!(err.to_string().starts_with("primary submission failed"));
        assert!(result.auxiliary.iter().all(AuxiliaryResult::is_success));
    }

    #[tokio::test]
    async fn test_cancelled_context_skips_every_task() {
        let mock = MockExchange::new();
        all_ok(&mock);
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        let ctx = Context::background();
        ctx.cancel();
        let result = orchestrator.submit_reading(&ctx, &reading, &photo).await;

        assert!(matches!(result.primary, Err(SubmissionError::Cancelled(_))));
        assert_eq!(result.auxiliary.len(), 3);
        assert!(result
            .auxiliary
            .iter()
            .all(|r| matches!(r.outcome, Err(SubmissionError::Cancelled(_)))));
        assert!(exchange_of(&orchestrator).recorded().is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_call_survives_cancellation() {
        let mock = MockExchange::new();
        all_ok(&mock);
        mock.push(
            &url("/setStanPrabayar"),
            MockOutcome::ok(b"late but fine").with_delay(Duration::from_millis(100)),
        );
        let orchestrator = Arc::new(orchestrator(mock));
        let (reading, photo) = sample();

        let ctx = Context::background();
        let task = {
            let orchestrator = Arc::clone(&orchestrator);
            let ctx = ctx.clone();
            tokio::spawn(async move { orchestrator.submit_reading(&ctx, &reading, &photo).await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        ctx.cancel();

        let result = task.await.unwrap();
        assert_eq!(result.primary.as_deref().unwrap(), b"late but fine");
    }

    #[tokio::test]
    async fn test_payloads_and_user_agents() {
        let mock = MockExchange::new();
        all_ok(&mock);
        let orchestrator = orchestrator(mock);
        let (reading, photo) = sample();

        orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;

        let mock = exchange_of(&orchestrator);
        let primary = &mock.recorded_for(&url("/setStanPrabayar"))[0];
        assert_eq!(primary.header("user-agent").as_deref(), Some("Dalvik/2.1.0"));
        assert_eq!(
            primary.header("content-type").as_deref(),
            Some("application/x-www-form-urlencoded; charset=UTF-8")
        );
        assert_eq!(
            primary.form_value("tglbaca").as_deref(),
            Some("10/19/2026 07:42:10")
        );

        let uploads: Vec<_> = ["/uploadFoto52", "/uploadFoto2", "/uploadFoto3"]
            .iter()
            .map(|p| mock.recorded_for(&url(p)).remove(0))
            .collect();
        for upload in &uploads {
            assert_eq!(
                upload.header("user-agent").as_deref(),
                Some("Apache-HttpClient/UNAVAILABLE")
            );
            assert_eq!(upload.body, uploads[0].body);
            assert_eq!(upload.form_value("filefoto").as_deref(), Some("cGhvdG8="));
        }
    }

    #[tokio::test]
    async fn test_no_auxiliary_endpoints() {
        let transport = Arc::new(TransportClient::new(
            MockExchange::new(),
            &TransportConfig::default(),
        ));
        transport
            .exchange()
            .always(&url("/setStanPrabayar"), MockOutcome::ok(b"ok"));
        let config = SubmissionConfig {
            auxiliary_paths: Vec::new(),
            ..Default::default()
        };
        let orchestrator = SubmissionOrchestrator::new(transport, BASE, &config);
        let (reading, photo) = sample();

        let result = orchestrator
            .submit_reading(&Context::background(), &reading, &photo)
            .await;
        assert!(result.is_complete_success());
        assert!(result.auxiliary.is_empty());
    }
}
