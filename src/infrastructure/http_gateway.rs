use crate::domain::ports::{PaymentGateway, TransferConfirmation, TransferRequest};
use crate::error::GatewayError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const SEND_PATH: &str = "/pix/send";
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Payment gateway reached over HTTP.
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CompletedTransaction {
    transaction_id: Option<String>,
}

/// Success body. The reference id is read from the nested transaction first,
/// then from the flat fields some gateways use.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    transaction: Option<CompletedTransaction>,
    transaction_id: Option<String>,
    reference_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// `message` wins over `detail`; a non-string `detail` (validation error
    /// lists) carries nothing worth showing.
    fn into_message(self) -> Option<String> {
        let detail = match self.detail {
            Some(serde_json::Value::String(detail)) => Some(detail),
            _ => None,
        };
        self.message
            .into_iter()
            .chain(detail)
            .find(|text| !text.trim().is_empty())
    }
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn send_url(&self) -> String {
        format!("{}{}", self.base_url, SEND_PATH)
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
    ) -> Result<TransferConfirmation, GatewayError> {
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .and_then(ErrorBody::into_message);
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SendResponse = serde_json::from_slice(&body)
            .map_err(|err| GatewayError::InvalidResponse(err.to_string()))?;
        let reference_id = parsed
            .transaction
            .and_then(|tx| tx.transaction_id)
            .or(parsed.transaction_id)
            .or(parsed.reference_id)
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                GatewayError::InvalidResponse("response carries no transaction id".to_string())
            })?;
        Ok(TransferConfirmation {
            reference_id,
            message: parsed.message,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn send(&self, request: &TransferRequest) -> Result<TransferConfirmation, GatewayError> {
        let url = self.send_url();
        debug!(%url, idempotency_key = %request.idempotency_key, "posting transfer");
        let response = self
            .client
            .post(&url)
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.to_string())
            .json(request)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;
        self.handle_response(response).await
    }
}
