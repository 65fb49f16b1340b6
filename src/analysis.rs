use std::time::Duration;

use reqwest::multipart::{Form, Part};

use crate::engine::{AnalysisReport, UploadRequest};

/// Multipart field the service reads the video from.
const VIDEO_FIELD: &str = "video";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

pub fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AnalysisError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send one artifact to the analysis service and parse its feedback.
pub async fn analyze(
    client: &reqwest::Client,
    url: &str,
    request: UploadRequest,
) -> Result<AnalysisReport, AnalysisError> {
    let size = request.bytes.len();
    let part = Part::bytes(request.bytes.to_vec())
        .file_name(request.name)
        .mime_str(&request.mime)?;
    let form = Form::new().part(VIDEO_FIELD, part);

    log::debug!("POST {url} ({size} bytes)");
    let resp = client.post(url).multipart(form).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AnalysisError::Status { status, body });
    }

    let report: AnalysisReport = resp.json().await?;
    log::info!("Analysis returned {} flagged frame(s)", report.feedback.len());
    Ok(report)
}

/// Check that the service is reachable.
pub async fn ping(client: &reqwest::Client, url: &str) -> Result<(), AnalysisError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(AnalysisError::Status { status, body });
    }
    Ok(())
}
