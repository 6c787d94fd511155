//! High-level client used by the CLI.
//!
//! [`StanClient`] owns everything one session needs: the shared transport and
//! orchestrator, the record store, and the two generators that give every
//! reading a location and a timestamp.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine as _};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{validate_config, Config, ConfigError};
use crate::context::Context;
use crate::coordinate::{CoordinateGenerator, RegionTable};
use crate::fetch::{fetch_records, FetchError};
use crate::orchestrator::{SubmissionOrchestrator, SubmissionResult};
use crate::reading::{MeterReading, PhotoUpload, SourceRecord};
use crate::store::{RecordStore, RoutingGroup, SqliteRecordStore, StoreError};
use crate::time_seq::TimeSequencer;
use crate::transport::{Exchange, ReqwestExchange, TransportClient, TransportError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to initialize transport: {0}")]
    Transport(#[from] TransportError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to read photo {}: {source}", .path.display())]
    Photo {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of one record of a batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub idpel: String,
    pub result: SubmissionResult,
}

pub struct StanClient<E = ReqwestExchange> {
    config: Config,
    username: String,
    orchestrator: SubmissionOrchestrator<E>,
    store: Arc<dyn RecordStore>,
    coordinates: CoordinateGenerator,
    times: TimeSequencer,
    rng: Mutex<StdRng>,
    photo: String,
}

impl StanClient<ReqwestExchange> {
    /// Production client for `username` (a full identity such as `52260.j07`).
    pub fn new(config: Config, username: &str) -> Result<Self, ClientError> {
        let transport = Arc::new(TransportClient::from_config(&config.transport)?);
        let store = Arc::new(SqliteRecordStore::new(&config.database.path)?);
        info!(
            database = %config.database.path.display(),
            "Opened record store"
        );
        Self::with_parts(config, username, transport, store, clock_seed())
    }
}

impl<E: Exchange + 'static> StanClient<E> {
    /// Client over an existing transport and store, generators seeded with `seed`.
    ///
    /// Rejects a configuration that fails [`validate_config`].
    pub fn with_parts(
        config: Config,
        username: &str,
        transport: Arc<TransportClient<E>>,
        store: Arc<dyn RecordStore>,
        seed: u64,
    ) -> Result<Self, ClientError> {
        validate_config(&config)?;
        let photo = match &config.photo.path {
            Some(path) => load_photo(path)?,
            None => String::new(),
        };

        let regions = RegionTable::from_config(&config.coordinates);
        let coordinates = CoordinateGenerator::new(seed, username, &regions);
        let region = coordinates.current_config();
        debug!(
            username = username,
            center_lat = region.center_lat,
            center_lon = region.center_lon,
            radius_km = region.radius_km,
            "Resolved region"
        );

        let orchestrator =
            SubmissionOrchestrator::new(transport, &config.transport.base_url, &config.submission);
        let time_seed = seed.rotate_left(21) ^ 0x5851_f42d_4c95_7f2d;

        Ok(Self {
            times: TimeSequencer::new(time_seed, config.time.clone()),
            rng: Mutex::new(StdRng::seed_from_u64(seed.wrapping_add(1))),
            username: username.to_string(),
            orchestrator,
            store,
            coordinates,
            photo,
            config,
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch the records assigned to this identity and replace the stored batch.
    pub async fn fetch_and_store(&self, ctx: &Context) -> Result<usize, ClientError> {
        let records = fetch_records(
            self.orchestrator.transport(),
            ctx,
            &self.config.transport.base_url,
            &self.config.fetch,
            &self.username,
            &self.config.submission.unit,
        )
        .await?;
        self.store.replace_all(&records)?;
        Ok(records.len())
    }

    pub fn routing_groups(&self) -> Result<Vec<RoutingGroup>, ClientError> {
        Ok(self.store.routing_groups()?)
    }

    pub fn records_by_routing_code(&self, code: &str) -> Result<Vec<SourceRecord>, ClientError> {
        Ok(self.store.records_by_routing_code(code)?)
    }

    /// Build the reading and photo upload for `record`.
    ///
    /// Consumes one timestamp and one location.
    pub fn prepare(&self, record: &SourceRecord) -> (MeterReading, PhotoUpload) {
        let timestamp = self.times.next();
        let location = self.coordinates.generate();
        let reading =
            MeterReading::synthesize(record, timestamp, location, &mut *self.rng.lock());
        let photo =
            PhotoUpload::for_record(record, &self.config.submission.unit, self.photo.clone());
        (reading, photo)
    }

    pub async fn submit_reading(
        &self,
        ctx: &Context,
        reading: &MeterReading,
        photo: &PhotoUpload,
    ) -> SubmissionResult {
        self.orchestrator.submit_reading(ctx, reading, photo).await
    }

    /// Submit `records` with bounded concurrency, results in input order.
    ///
    /// Readings are prepared up front so timestamps follow record order.
    /// Records whose primary submission succeeded are removed from the store.
    pub async fn submit_batch(&self, ctx: &Context, records: &[SourceRecord]) -> Vec<BatchOutcome> {
        let prepared: Vec<_> = records.iter().map(|record| self.prepare(record)).collect();
        let limit = self.config.submission.max_concurrent_submissions.max(1);

        info!(records = prepared.len(), concurrency = limit, "Submitting batch");

        stream::iter(prepared)
            .map(move |(reading, photo)| async move {
                let result = self.submit_reading(ctx, &reading, &photo).await;
                if result.primary_succeeded() {
                    if let Err(e) = self.store.remove(&reading.idpel) {
                        warn!(
                            idpel = %reading.idpel,
                            error = %e,
                            "Failed to remove submitted record"
                        );
                    }
                }
                BatchOutcome {
                    idpel: reading.idpel,
                    result,
                }
            })
            .buffered(limit)
            .collect()
            .await
    }
}

fn load_photo(path: &Path) -> Result<String, ClientError> {
    let bytes = std::fs::read(path).map_err(|source| ClientError::Photo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BASE64_STANDARD.encode(bytes))
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}
