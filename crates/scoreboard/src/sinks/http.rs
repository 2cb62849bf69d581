//! HttpScoreSink - posts the score to the leaderboard as a multipart form

use contracts::{ContractError, ScoreCard, ScoreSink, SubmissionReceipt};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument, warn};

const DEFAULT_TIMEOUT_S: f64 = 1000.0;
const DEFAULT_ARCHIVE_NAME: &str = "solution.zip";

/// Configuration for HttpScoreSink
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Leaderboard endpoint URL
    pub endpoint: String,
    /// 9-digit team code
    pub team_code: String,
    /// Zip archive uploaded as `solution_code`
    pub solution_path: Option<PathBuf>,
    /// Whole-request timeout
    pub timeout: Duration,
    /// User-Agent header
    pub user_agent: String,
}

impl HttpSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let required = |key: &str| {
            params
                .get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| format!("missing '{key}' parameter"))
        };

        let endpoint = required("endpoint")?;
        let team_code = required("team_code")?;
        if team_code.len() != 9 || !team_code.bytes().all(|b| b.is_ascii_digit()) {
            warn!(team_code = %team_code, "team code is not 9 digits");
        }

        let timeout = match params.get("timeout_s") {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|t| *t > 0.0)
                .and_then(|t| Duration::try_from_secs_f64(t).ok())
                .ok_or_else(|| format!("invalid timeout_s '{raw}'"))?,
            None => Duration::from_secs_f64(DEFAULT_TIMEOUT_S),
        };

        Ok(Self {
            endpoint,
            team_code,
            solution_path: params
                .get("solution_path")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            timeout,
            user_agent: params
                .get("user_agent")
                .cloned()
                .unwrap_or_else(|| concat!("lap-judge/", env!("CARGO_PKG_VERSION")).to_string()),
        })
    }
}

/// Sink that submits the score card to the leaderboard.
///
/// One attempt per card; a non-2xx answer is a rejected receipt.
pub struct HttpScoreSink {
    name: String,
    config: HttpSinkConfig,
    client: Client,
}

impl HttpScoreSink {
    /// Create a new HttpScoreSink
    pub fn new(name: impl Into<String>, config: HttpSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        Ok(Self {
            name,
            config,
            client,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = HttpSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;
        Self::new(name, config)
    }

    async fn build_form(&self, card: &ScoreCard) -> Result<Form, ContractError> {
        let mut form = Form::new()
            .text("team_9digit_code", self.config.team_code.clone())
            .text("forward_laptime", card.forward_laptime.to_string())
            .text("backward_laptime", card.backward_laptime.to_string());

        if let Some(path) = &self.config.solution_path {
            let archive = tokio::fs::read(path).await.map_err(|e| {
                ContractError::sink_write(
                    &self.name,
                    format!("cannot read solution archive {}: {e}", path.display()),
                )
            })?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());
            form = form.part("solution_code", Part::bytes(archive).file_name(file_name));
        }

        Ok(form)
    }
}

impl ScoreSink for HttpScoreSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "http_sink_submit",
        skip(self, card),
        fields(sink = %self.name, endpoint = %self.config.endpoint)
    )]
    async fn submit(&mut self, card: &ScoreCard) -> Result<SubmissionReceipt, ContractError> {
        let form = self.build_form(card).await?;

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ContractError::sink_connection(&self.name, e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            info!(sink = %self.name, status = status.as_u16(), "score published on the leaderboard");
        } else {
            warn!(
                sink = %self.name,
                status = status.as_u16(),
                body = %body,
                "leaderboard rejected the submission"
            );
        }

        Ok(SubmissionReceipt {
            sink_name: self.name.clone(),
            accepted: status.is_success(),
            status: Some(status.as_u16()),
            detail: body,
        })
    }

    #[instrument(name = "http_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Multipart, State};
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use contracts::{LapRecord, TrackDirection};
    use std::sync::{Arc, Mutex};

    type Fields = Arc<Mutex<Vec<(String, Vec<u8>)>>>;

    async fn leaderboard(status: StatusCode) -> (String, Fields) {
        let fields: Fields = Arc::default();
        let app = Router::new()
            .route(
                "/saveData.php",
                post(
                    move |State(fields): State<Fields>, mut multipart: Multipart| async move {
                        while let Some(field) = multipart.next_field().await.unwrap() {
                            let name = field.name().unwrap_or_default().to_string();
                            let data = field.bytes().await.unwrap().to_vec();
                            fields.lock().unwrap().push((name, data));
                        }
                        (status, "leaderboard says hi")
                    },
                ),
            )
            .with_state(fields.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/saveData.php"), fields)
    }

    fn params(endpoint: &str) -> HashMap<String, String> {
        HashMap::from([
            ("endpoint".to_string(), endpoint.to_string()),
            ("team_code".to_string(), "123456789".to_string()),
            ("timeout_s".to_string(), "5".to_string()),
        ])
    }

    fn card() -> ScoreCard {
        ScoreCard::from_laps(
            LapRecord::new(TrackDirection::Backward, Duration::from_millis(71_500)),
            LapRecord::new(TrackDirection::Forward, Duration::from_secs(70)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_submit_multipart_with_archive() {
        let (endpoint, fields) = leaderboard(StatusCode::OK).await;
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("mysolution.zip");
        std::fs::write(&archive, b"PK\x03\x04fake").unwrap();

        let mut params = params(&endpoint);
        params.insert("solution_path".into(), archive.display().to_string());
        let mut sink = HttpScoreSink::from_params("leaderboard", &params).unwrap();

        let receipt = sink.submit(&card()).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.status, Some(200));

        let fields = fields.lock().unwrap().clone();
        let get = |name: &str| {
            fields
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("team_9digit_code"), b"123456789");
        assert_eq!(get("forward_laptime"), b"70");
        assert_eq!(get("backward_laptime"), b"71.5");
        assert_eq!(get("solution_code"), b"PK\x03\x04fake");
    }

    #[tokio::test]
    async fn test_non_success_is_rejected_receipt() {
        let (endpoint, _) = leaderboard(StatusCode::INTERNAL_SERVER_ERROR).await;
        let mut sink = HttpScoreSink::from_params("leaderboard", &params(&endpoint)).unwrap();

        let receipt = sink.submit(&card()).await.unwrap();
        assert!(!receipt.accepted);
        assert_eq!(receipt.status, Some(500));
        assert_eq!(receipt.detail, "leaderboard says hi");
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut sink =
            HttpScoreSink::from_params("leaderboard", &params(&format!("http://{addr}/x"))).unwrap();
        let err = sink.submit(&card()).await.unwrap_err();
        assert!(matches!(err, ContractError::SinkConnection { .. }));
    }

    #[test]
    fn test_missing_params() {
        let err = HttpSinkConfig::from_params(&HashMap::new()).unwrap_err();
        assert!(err.contains("endpoint"));

        let mut p = params("http://localhost/x");
        p.insert("timeout_s".into(), "-3".into());
        assert!(HttpSinkConfig::from_params(&p).unwrap_err().contains("timeout_s"));
    }

    #[test]
    fn test_unrepresentable_timeout_is_rejected() {
        for raw in ["inf", "NaN", "1e20"] {
            let mut p = params("http://localhost/x");
            p.insert("timeout_s".into(), raw.into());
            let err = HttpSinkConfig::from_params(&p).unwrap_err();
            assert!(err.contains("timeout_s"), "{raw}: {err}");
        }

        let mut p = params("http://localhost/x");
        p.insert("timeout_s".into(), "2.5".into());
        let config = HttpSinkConfig::from_params(&p).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }
}
