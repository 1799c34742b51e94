//! API client for a running prodwatch service

use anyhow::{Context, Result};
use prodwatch_lib::{AnalysisReport, HealthResponse, ReportPeriod};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        // Probes answer 503 with a JSON body worth showing
        response.json().await.context("Failed to parse response")
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            anyhow::bail!("API error ({}): {}", status, message);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn analyze(&self, request: &AnalyzeBody) -> Result<AnalysisReport> {
        self.post("api/v1/analyze", request).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.get("healthz").await
    }
}

/// Body of `POST /api/v1/analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeBody {
    pub production_csv: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub revenue_csv: BTreeMap<ReportPeriod, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use prodwatch_lib::{AnalysisConfig, Analyzer, RawTable, ReportRequest};

    const PRODUCTION_CSV: &str = "\
sitetime,inv1 dci /5min
2024-01-08 11:00:00,100
2024-01-08 11:05:00,100
2024-01-08 11:10:00,30
2024-01-08 11:15:00,100
";

    fn body() -> AnalyzeBody {
        AnalyzeBody {
            production_csv: PRODUCTION_CSV.to_string(),
            revenue_csv: BTreeMap::new(),
            config: Some(serde_json::json!({ "relative_threshold": 0.75 })),
        }
    }

    #[tokio::test]
    async fn test_analyze_parses_report() {
        let report = Analyzer::new(AnalysisConfig::default())
            .unwrap()
            .analyze(&ReportRequest::new(RawTable::from_csv_str(PRODUCTION_CSV, 0).unwrap()))
            .unwrap();

        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/analyze")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "config": { "relative_threshold": 0.75 }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(serde_json::to_string(&report).unwrap())
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let received = client.analyze(&body()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(received.periods.len(), report.periods.len());
        assert_eq!(
            received.period(ReportPeriod::January).unwrap().output.dips.len(),
            1
        );
    }

    #[tokio::test]
    async fn test_bad_request_surfaces_service_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/analyze")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error": "No valid energy production columns found."}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.analyze(&body()).await.unwrap_err();

        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("No valid energy production columns found."));
    }

    #[test]
    fn test_rejects_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
