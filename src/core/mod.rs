pub mod config;
pub mod dispatcher;
pub mod http_client;
pub mod runtime_context;
pub mod safe_stop;
pub mod stats;
pub mod variable_pool;
pub mod virtual_user;

pub use config::{ConfigStore, EnvConfigStore, MapConfigStore, PilotConfig};
pub use dispatcher::{IterationEnd, IterationReport, StepDispatcher};
pub use http_client::{HttpClientProvider, HttpPoolConfig};
pub use runtime_context::{FakeIdGenerator, IdGenerator, RealIdGenerator};
pub use safe_stop::StopSignal;
pub use stats::{CallCollector, CallRecord, FanoutRecorder, RunRecorder, RunStats, RunSummary};
pub use variable_pool::VariableEnvironment;
pub use virtual_user::{CookieJar, VirtualUserContext};
