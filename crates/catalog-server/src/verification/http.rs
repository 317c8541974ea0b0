//! HTTP client for the regulatory product registry

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{RegulatedProduct, RegulatoryVerifier, VerificationError, VerificationOutcome};
use crate::config::VerificationConfig;

/// Header carrying the registry API key
pub const API_KEY_HEADER: &str = "x-api-key";

const VERIFY_PATH: &str = "/v1/products/verify";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponse {
    verified: bool,
    #[serde(default)]
    product: Option<ProductPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductPayload {
    regulatory_name: String,
    manufacturer_name: String,
    #[serde(default)]
    permit_number: Option<String>,
    #[serde(default)]
    product_id: Option<String>,
    #[serde(default)]
    regulatory_type: Option<String>,
}

impl From<ProductPayload> for RegulatedProduct {
    fn from(payload: ProductPayload) -> Self {
        Self {
            regulatory_name: payload.regulatory_name,
            manufacturer_name: payload.manufacturer_name,
            permit_number: payload.permit_number,
            product_id: payload.product_id,
            regulatory_type: payload.regulatory_type,
        }
    }
}

/// Calls `GET {base_url}/v1/products/verify?barcode=...`
#[derive(Debug, Clone)]
pub struct HttpRegulatoryVerifier {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpRegulatoryVerifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            api_key,
            timeout,
        })
    }

    pub fn from_config(config: &VerificationConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), config.api_key.clone(), config.timeout())
    }

    fn map_transport_error(&self, error: reqwest::Error) -> VerificationError {
        if error.is_timeout() {
            VerificationError::Timeout(self.timeout)
        } else {
            VerificationError::Unavailable(error.to_string())
        }
    }
}

#[async_trait]
impl RegulatoryVerifier for HttpRegulatoryVerifier {
    #[tracing::instrument(skip(self))]
    async fn verify(&self, barcode: &str) -> Result<VerificationOutcome, VerificationError> {
        let url = format!("{}{}", self.base_url, VERIFY_PATH);

        let mut request = self.client.get(&url).query(&[("barcode", barcode)]);
        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(VerificationError::Unavailable(format!(
                "registry returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(VerificationError::InvalidResponse(format!(
                "registry returned {}",
                status
            )));
        }

        let body: VerifyResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                VerificationError::Timeout(self.timeout)
            } else {
                VerificationError::InvalidResponse(e.to_string())
            }
        })?;

        match (body.verified, body.product) {
            (true, Some(product)) => {
                tracing::debug!("Barcode verified by registry");
                Ok(VerificationOutcome::Verified(product.into()))
            },
            (true, None) => Err(VerificationError::InvalidResponse(
                "verified answer without product metadata".to_string(),
            )),
            (false, _) => Ok(VerificationOutcome::NotVerified),
        }
    }
}
