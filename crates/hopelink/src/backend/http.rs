//! REST implementation of the backend boundaries.
//!
//! Every request carries the shared `x-ai-secret` header and is bounded by
//! the configured timeout. A timeout or connection failure surfaces as an
//! error; there is no silent fallback to fixture data.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use hopelink_protocol::{Beneficiary, Orphanage};

use super::{
    AuditEntry, BeneficiaryReader, DonationLedger, LedgerReceipt, LedgerRecord,
    SponsorshipRequest, SupplyRequest,
};
use crate::config::BackendConfig;

const SECRET_HEADER: &str = "x-ai-secret";

pub struct HttpBackend {
    client: Client,
    base_url: String,
    secret: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            secret: config.secret.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl BeneficiaryReader for HttpBackend {
    async fn search_children(
        &self,
        category: Option<&str>,
        max_results: usize,
        urgent_only: bool,
    ) -> Result<Vec<Beneficiary>> {
        let mut query: Vec<(&str, String)> = vec![("max_results", max_results.to_string())];
        if let Some(category) = category {
            query.push(("category", category.to_string()));
        }
        if urgent_only {
            query.push(("urgent", "true".to_string()));
        }

        let response = self
            .client
            .get(self.url("/children"))
            .header(SECRET_HEADER, &self.secret)
            .query(&query)
            .send()
            .await
            .context("Backend request failed: GET /children")?
            .error_for_status()
            .context("Backend rejected GET /children")?;

        let children: Vec<Beneficiary> = response
            .json()
            .await
            .context("Failed to decode children response")?;
        debug!(count = children.len(), ?category, "search_children");
        Ok(children)
    }

    async fn search_orphanages(
        &self,
        supply_type: Option<&str>,
        urgent_only: bool,
        max_results: usize,
    ) -> Result<Vec<Orphanage>> {
        let mut query: Vec<(&str, String)> = vec![("max_results", max_results.to_string())];
        if let Some(supply_type) = supply_type {
            query.push(("supply_type", supply_type.to_string()));
        }
        if urgent_only {
            query.push(("urgent", "true".to_string()));
        }

        let response = self
            .client
            .get(self.url("/orphanages"))
            .header(SECRET_HEADER, &self.secret)
            .query(&query)
            .send()
            .await
            .context("Backend request failed: GET /orphanages")?
            .error_for_status()
            .context("Backend rejected GET /orphanages")?;

        let orphanages: Vec<Orphanage> = response
            .json()
            .await
            .context("Failed to decode orphanages response")?;
        debug!(count = orphanages.len(), ?supply_type, "search_orphanages");
        Ok(orphanages)
    }
}

#[derive(Debug, Deserialize)]
struct SponsorshipResponse {
    sponsorship_id: String,
}

#[derive(Debug, Deserialize)]
struct SupplyResponse {
    supply_request_id: String,
}

#[async_trait]
impl DonationLedger for HttpBackend {
    async fn submit(&self, record: &LedgerRecord) -> Result<LedgerReceipt> {
        let response = self
            .client
            .post(self.url("/donations/execute"))
            .header(SECRET_HEADER, &self.secret)
            .json(record)
            .send()
            .await
            .context("Ledger request failed: POST /donations/execute")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ledger rejected donation: HTTP {status}: {body}"));
        }

        let receipt: LedgerReceipt = response
            .json()
            .await
            .context("Failed to decode ledger receipt")?;
        debug!(txn = %receipt.transaction_id, "donation submitted");
        Ok(receipt)
    }

    async fn update_funding_status(
        &self,
        beneficiary_id: &str,
        amount_added: f64,
        transaction_id: &str,
    ) -> Result<()> {
        self.client
            .patch(self.url(&format!("/children/{beneficiary_id}/funding")))
            .header(SECRET_HEADER, &self.secret)
            .json(&serde_json::json!({
                "child_id": beneficiary_id,
                "amount_added": amount_added,
                "transaction_id": transaction_id,
            }))
            .send()
            .await
            .context("Funding update request failed")?
            .error_for_status()
            .context("Backend rejected funding update")?;
        Ok(())
    }

    async fn create_sponsorship(&self, request: &SponsorshipRequest) -> Result<String> {
        let response: SponsorshipResponse = self
            .client
            .post(self.url("/sponsorships"))
            .header(SECRET_HEADER, &self.secret)
            .json(request)
            .send()
            .await
            .context("Sponsorship request failed")?
            .error_for_status()
            .context("Backend rejected sponsorship creation")?
            .json()
            .await
            .context("Failed to decode sponsorship response")?;
        Ok(response.sponsorship_id)
    }

    async fn create_supply_request(&self, request: &SupplyRequest) -> Result<String> {
        let response: SupplyResponse = self
            .client
            .post(self.url("/supplies"))
            .header(SECRET_HEADER, &self.secret)
            .json(request)
            .send()
            .await
            .context("Supply request failed")?
            .error_for_status()
            .context("Backend rejected supply request")?
            .json()
            .await
            .context("Failed to decode supply response")?;
        Ok(response.supply_request_id)
    }

    async fn log_donation(&self, entry: &AuditEntry) {
        // The audit write must never fail a donation that already happened.
        let result = self
            .client
            .post(self.url("/donations/log"))
            .header(SECRET_HEADER, &self.secret)
            .json(entry)
            .send()
            .await;
        match result {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(status = %response.status(), txn = %entry.transaction_id,
                    "audit log write rejected");
            }
            Err(e) => {
                warn!(error = %e, txn = %entry.transaction_id, "audit log write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> BackendConfig {
        BackendConfig {
            base_url: "http://localhost:3000/api/".to_string(),
            secret: "test-secret".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_is_normalized() {
        let backend = HttpBackend::new(&test_config()).unwrap();
        assert_eq!(
            backend.url("/children"),
            "http://localhost:3000/api/children"
        );
    }
}
