use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AnalyticsError;
use crate::record::AnalyticsRecord;

/// Turns a record into the bytes handed to the sink.
pub trait RecordEncoder: Send + Sync {
    fn encode(&self, record: &AnalyticsRecord) -> Result<Vec<u8>, AnalyticsError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordEncoding {
    #[default]
    Bincode,
    Json,
}

impl RecordEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordEncoding::Bincode => "bincode",
            RecordEncoding::Json => "json",
        }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<AnalyticsRecord, AnalyticsError> {
        match self {
            RecordEncoding::Bincode => {
                bincode::deserialize(bytes).map_err(|err| AnalyticsError::Encode(err.to_string()))
            }
            RecordEncoding::Json => {
                serde_json::from_slice(bytes).map_err(|err| AnalyticsError::Encode(err.to_string()))
            }
        }
    }
}

impl RecordEncoder for RecordEncoding {
    fn encode(&self, record: &AnalyticsRecord) -> Result<Vec<u8>, AnalyticsError> {
        match self {
            RecordEncoding::Bincode => {
                bincode::serialize(record).map_err(|err| AnalyticsError::Encode(err.to_string()))
            }
            RecordEncoding::Json => {
                serde_json::to_vec(record).map_err(|err| AnalyticsError::Encode(err.to_string()))
            }
        }
    }
}

impl fmt::Display for RecordEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordEncoding {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "bincode" => Ok(RecordEncoding::Bincode),
            "json" => Ok(RecordEncoding::Json),
            other => Err(AnalyticsError::InvalidOptions(vec![format!(
                "unknown record encoding: {other}"
            )])),
        }
    }
}
