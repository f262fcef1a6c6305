//! Payabli REST Gateway
//!
//! Talks to the Payabli API over HTTPS. Every call is a single request;
//! timeouts come from the underlying client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::PaymentGateway;
use crate::config::GatewayConfig;
use crate::error::{PaymentError, Result};
use crate::model::{
    ChargeRequest, ChargeResult, EntryPoint, Initiator, MethodKind, StoredMethodReference,
    TokenRedemptionRequest, UsageType,
};

/// Processor result code for an approved charge
const RESULT_APPROVED: i64 = 1;

/// HTTP client for the Payabli API
#[derive(Clone, Debug)]
pub struct PayabliGateway {
    client: Client,
    config: GatewayConfig,
}

impl PayabliGateway {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PaymentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(GatewayConfig::from_env()?)
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        body: &B,
    ) -> Result<ApiEnvelope> {
        let url = self.url(path);
        tracing::debug!(url = %url, "POST to processor");

        let response = self
            .client
            .post(&url)
            .query(query)
            .header("requestToken", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        read_envelope(response).await
    }
}

#[async_trait]
impl PaymentGateway for PayabliGateway {
    async fn redeem_temporary_token(&self, request: &TokenRedemptionRequest) -> Result<StoredMethodReference> {
        let body = TokenStorageBody {
            customer_data: CustomerData {
                customer_id: request.payer.customer_id,
            },
            entry_point: request.entry_point.as_str(),
            payment_method: ConvertToken {
                method: request.method,
                token_id: request.token.as_str(),
            },
            source: &request.source,
            method_description: &request.description,
        };

        let envelope = self
            .post_json(
                "TokenStorage/add",
                &[("createAnonymous", "true"), ("temporary", "false")],
                &body,
            )
            .await?;

        let reference = envelope
            .response_data
            .as_ref()
            .and_then(|data| data.reference_id.as_ref())
            .and_then(reference_string)
            .unwrap_or_default();

        StoredMethodReference::from_processor(reference)
    }

    async fn charge_stored_method(&self, request: &ChargeRequest) -> Result<ChargeResult> {
        let body = GetPaidBody {
            customer_data: CustomerData {
                customer_id: request.payer.customer_id,
            },
            entry_point: request.entry_point.as_str(),
            ipaddress: &request.network_address,
            payment_details: PaymentDetails {
                service_fee: request.terms.service_fee,
                total_amount: request.terms.total_amount,
            },
            payment_method: StoredMethod {
                initiator: request.initiator,
                method: request.method,
                stored_method_id: request.stored_method.as_str(),
                stored_method_usage_type: request.usage,
            },
        };

        let envelope = self.post_json("MoneyIn/getpaid", &[], &body).await?;
        let data = envelope.response_data.ok_or_else(|| {
            PaymentError::MalformedResponse("charge response did not include responseData".into())
        })?;

        if let Some(code) = data.result_code {
            if code != RESULT_APPROVED {
                let reason = data
                    .result_text
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| format!("result code {code}"));
                return Err(PaymentError::Declined(reason));
            }
        }

        let reference_id = data
            .reference_id
            .as_ref()
            .and_then(reference_string)
            .ok_or_else(|| {
                PaymentError::MalformedResponse("charge response did not include a reference".into())
            })?;

        Ok(ChargeResult {
            approved: true,
            reference_id,
            auth_code: data.auth_code,
            result_text: data.result_text,
            processed_at: Utc::now(),
        })
    }

    async fn query_transaction(&self, entry_point: &EntryPoint, reference_id: &str) -> Result<Vec<Value>> {
        let url = self.url(&format!("Query/transactions/{}", entry_point.as_str()));
        tracing::debug!(url = %url, reference_id = %reference_id, "Querying transaction");

        let response = self
            .client
            .get(&url)
            .query(&[("transId(eq)", reference_id)])
            .header("requestToken", &self.config.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope>(&text)
                .ok()
                .and_then(|e| e.failure_message())
                .unwrap_or_else(|| status_text(status));
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: QueryResponse = serde_json::from_str(&text)
            .map_err(|e| PaymentError::MalformedResponse(format!("query response: {e}")))?;
        Ok(parsed.records)
    }

    fn name(&self) -> &str {
        "Payabli"
    }
}

async fn read_envelope(response: Response) -> Result<ApiEnvelope> {
    let status = response.status();
    let text = response.text().await?;
    let envelope = serde_json::from_str::<ApiEnvelope>(&text).ok();

    tracing::debug!(status = status.as_u16(), "Processor responded");

    if !status.is_success() {
        let message = envelope
            .and_then(|e| e.failure_message())
            .unwrap_or_else(|| status_text(status));
        return Err(PaymentError::Api {
            status: status.as_u16(),
            message,
        });
    }

    let envelope = envelope.ok_or_else(|| {
        PaymentError::MalformedResponse(format!("unparseable response body: {}", preview(&text)))
    })?;

    match envelope.is_success {
        Some(true) => Ok(envelope),
        Some(false) => Err(PaymentError::Api {
            status: status.as_u16(),
            message: envelope
                .failure_message()
                .unwrap_or_else(|| "processor reported failure".into()),
        }),
        None => Err(PaymentError::MalformedResponse("response did not include isSuccess".into())),
    }
}

fn status_text(status: reqwest::StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
}

fn preview(text: &str) -> String {
    text.chars().take(120).collect()
}

/// References come back as strings from most endpoints and as numbers from a few.
fn reference_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerData {
    customer_id: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenStorageBody<'a> {
    customer_data: CustomerData,
    entry_point: &'a str,
    payment_method: ConvertToken<'a>,
    source: &'a str,
    method_description: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConvertToken<'a> {
    method: MethodKind,
    token_id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GetPaidBody<'a> {
    customer_data: CustomerData,
    entry_point: &'a str,
    ipaddress: &'a str,
    payment_details: PaymentDetails,
    payment_method: StoredMethod<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentDetails {
    #[serde(with = "rust_decimal::serde::float")]
    service_fee: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    total_amount: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredMethod<'a> {
    initiator: Initiator,
    method: MethodKind,
    stored_method_id: &'a str,
    stored_method_usage_type: UsageType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEnvelope {
    #[serde(default)]
    is_success: Option<bool>,
    #[serde(default)]
    response_text: Option<String>,
    #[serde(default)]
    response_data: Option<ResponseData>,
}

impl ApiEnvelope {
    fn failure_message(&self) -> Option<String> {
        self.response_text
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.response_data
                    .as_ref()
                    .and_then(|d| d.result_text.clone())
                    .filter(|t| !t.is_empty())
            })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseData {
    #[serde(default)]
    reference_id: Option<Value>,
    #[serde(default)]
    result_code: Option<i64>,
    #[serde(default)]
    result_text: Option<String>,
    #[serde(default)]
    auth_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(rename = "Records", default)]
    records: Vec<Value>,
}
