//! Submits a staged bundle to the control plane's
//! `POST /api/evidence/sites/{id}/submit` (spec §6.1). Network/5xx/4xx
//! non-idempotent failures are the caller's cue to enqueue into
//! `EvidenceQueue` rather than being retried here.

use msp_types::SignedBundle;

use crate::error::EvidenceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    /// Any non-2xx response; the caller enqueues for retry.
    Rejected { status: u16, body: String },
}

pub async fn submit_bundle(
    client: &reqwest::Client,
    control_plane_url: &str,
    site_id: &str,
    bearer_token: Option<&str>,
    bundle: &SignedBundle,
) -> Result<SubmitOutcome, EvidenceError> {
    let url = format!("{control_plane_url}/api/evidence/sites/{site_id}/submit");
    let mut request = client.post(url).json(bundle);
    if let Some(token) = bearer_token {
        request = request.bearer_auth(token);
    }

    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        Ok(SubmitOutcome::Accepted)
    } else {
        let body = response.text().await.unwrap_or_default();
        Ok(SubmitOutcome::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
