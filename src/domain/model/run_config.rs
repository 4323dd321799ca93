use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FlowError;

/// Load parameters for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRunConfig", rename_all = "camelCase")]
pub struct RunConfig {
    threads: u32,
    #[serde(rename = "totalDuration")]
    total_duration_secs: u64,
    #[serde(rename = "rampUpDuration")]
    ramp_up_secs: u64,
    variables: Map<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRunConfig {
    threads: i64,
    total_duration: i64,
    #[serde(default)]
    ramp_up_duration: i64,
    #[serde(default)]
    variables: Map<String, Value>,
}

impl TryFrom<RawRunConfig> for RunConfig {
    type Error = FlowError;

    fn try_from(raw: RawRunConfig) -> Result<Self, Self::Error> {
        if raw.threads < 1 {
            return Err(FlowError::InvalidRunConfig(
                "threads must be greater than 0".into(),
            ));
        }
        if raw.total_duration < 1 {
            return Err(FlowError::InvalidRunConfig(
                "totalDuration must be greater than 0".into(),
            ));
        }
        if raw.ramp_up_duration < 0 {
            return Err(FlowError::InvalidRunConfig(
                "rampUpDuration cannot be negative".into(),
            ));
        }
        let threads = u32::try_from(raw.threads)
            .map_err(|_| FlowError::InvalidRunConfig("threads is too large".into()))?;
        Ok(Self {
            threads,
            total_duration_secs: raw.total_duration as u64,
            ramp_up_secs: raw.ramp_up_duration as u64,
            variables: raw.variables,
        })
    }
}

impl RunConfig {
    pub fn new(threads: u32, total_duration_secs: u64, ramp_up_secs: u64) -> Result<Self, FlowError> {
        RawRunConfig {
            threads: threads as i64,
            total_duration: i64::try_from(total_duration_secs).unwrap_or(i64::MAX),
            ramp_up_duration: i64::try_from(ramp_up_secs).unwrap_or(i64::MAX),
            variables: Map::new(),
        }
        .try_into()
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    pub fn threads(&self) -> u32 {
        self.threads
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.total_duration_secs
    }

    pub fn ramp_up_secs(&self) -> u64 {
        self.ramp_up_secs
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }
}
