//! FileSink - appends score cards to a JSON lines file

use chrono::{DateTime, Utc};
use contracts::{ContractError, ScoreCard, ScoreSink, SubmissionReceipt};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output file (JSON lines)
    pub path: PathBuf,

    /// Team identifier stored alongside each card
    pub team_code: Option<String>,
}

impl FileSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let path = params
            .get("path")
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| "missing 'path' parameter".to_string())?;

        Ok(Self {
            path,
            team_code: params.get("team_code").cloned(),
        })
    }
}

#[derive(Serialize)]
struct ScoreLine<'a> {
    team_code: Option<&'a str>,
    forward_laptime: f64,
    backward_laptime: f64,
    recorded_at: DateTime<Utc>,
    written_at: DateTime<Utc>,
}

/// Sink that appends one JSON object per score card
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
}

impl FileSink {
    /// Create a new FileSink, creating the parent directory if needed
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            name: name.into(),
            config,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> std::io::Result<Self> {
        let config = FileSinkConfig::from_params(params)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        Self::new(name, config)
    }

    fn append(&self, card: &ScoreCard) -> std::io::Result<()> {
        let line = ScoreLine {
            team_code: self.config.team_code.as_deref(),
            forward_laptime: card.forward_laptime,
            backward_laptime: card.backward_laptime,
            recorded_at: card.recorded_at,
            written_at: Utc::now(),
        };
        let mut json = serde_json::to_string(&line)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        json.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.path)?;
        file.write_all(json.as_bytes())?;
        file.flush()
    }
}

impl ScoreSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_submit",
        skip(self, card),
        fields(sink = %self.name, path = %self.config.path.display())
    )]
    async fn submit(&mut self, card: &ScoreCard) -> Result<SubmissionReceipt, ContractError> {
        self.append(card)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "score appended");

        Ok(SubmissionReceipt {
            sink_name: self.name.clone(),
            accepted: true,
            status: None,
            detail: self.config.path.display().to_string(),
        })
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
