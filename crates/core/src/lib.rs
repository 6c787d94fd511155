pub mod client;
pub mod config;
pub mod context;
pub mod coordinate;
pub mod fetch;
pub mod form;
pub mod identity;
pub mod orchestrator;
pub mod reading;
pub mod store;
pub mod testing;
pub mod time_seq;
pub mod transport;

pub use client::{BatchOutcome, ClientError, StanClient};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, CoordinatesConfig, DatabaseConfig, FetchConfig, PhotoConfig, SubmissionConfig,
    TimeConfig, TransportConfig,
};
pub use context::{Context, ContextError};
pub use coordinate::{CoordinateConfig, CoordinateGenerator, RegionTable};
pub use fetch::{fetch_records, FetchError};
pub use form::FormPayload;
pub use identity::validate_username;
pub use orchestrator::{AuxiliaryResult, SubmissionError, SubmissionOrchestrator, SubmissionResult};
pub use reading::{MeterReading, PhotoUpload, SourceRecord};
pub use store::{RecordStore, RoutingGroup, SqliteRecordStore, StoreError};
pub use time_seq::TimeSequencer;
pub use transport::{Exchange, ExchangeError, ReqwestExchange, TransportClient, TransportError};
