use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::PaymentStatus;

use crate::models::{is_payment_id, GatewayPayment, PaymentError, PaymentReference, PixPaymentRequest};

/// Outbound contract with the payment gateway. Every call runs with the
/// professional's own access token.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a Pix charge. Repeated calls with the same `idempotency_key`
    /// return the original charge.
    async fn create_pix_payment(
        &self,
        access_token: &str,
        request: &PixPaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, PaymentError>;

    async fn get_payment(&self, access_token: &str, payment_id: &str) -> Result<GatewayPayment, PaymentError>;
}

// Mercado Pago wire shapes.

#[derive(Debug, Deserialize)]
struct MpPayment {
    id: PaymentReference,
    status: PaymentStatus,
    transaction_amount: Option<f64>,
    point_of_interaction: Option<MpPointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct MpPointOfInteraction {
    transaction_data: Option<MpTransactionData>,
}

#[derive(Debug, Deserialize)]
struct MpTransactionData {
    qr_code: Option<String>,
    qr_code_base64: Option<String>,
    ticket_url: Option<String>,
}

impl From<MpPayment> for GatewayPayment {
    fn from(payment: MpPayment) -> Self {
        let data = payment
            .point_of_interaction
            .and_then(|poi| poi.transaction_data);

        let (qr_code, qr_code_base64, ticket_url) = match data {
            Some(d) => (d.qr_code, d.qr_code_base64, d.ticket_url),
            None => (None, None, None),
        };

        Self {
            id: payment.id.into_string(),
            status: payment.status,
            transaction_amount: payment.transaction_amount,
            qr_code,
            qr_code_base64,
            ticket_url,
        }
    }
}

pub struct MercadoPagoClient {
    client: Client,
    base_url: String,
}

impl MercadoPagoClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|e| {
                error!("Failed to build gateway HTTP client with timeout, using defaults: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.mercadopago_api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<GatewayPayment, PaymentError> {
        let response = request
            .send()
            .await
            .map_err(|e| PaymentError::GatewayError(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Mercado Pago returned {}: {}", status, body);
            return Err(PaymentError::GatewayError(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let payment: MpPayment = response
            .json()
            .await
            .map_err(|e| PaymentError::GatewayError(format!("Unreadable payment response: {}", e)))?;

        Ok(payment.into())
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    async fn create_pix_payment(
        &self,
        access_token: &str,
        request: &PixPaymentRequest,
        idempotency_key: &str,
    ) -> Result<GatewayPayment, PaymentError> {
        let url = format!("{}/v1/payments", self.base_url);
        debug!("Creating Pix payment for reference {}", request.external_reference);

        let builder = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header("X-Idempotency-Key", idempotency_key)
            .json(request);

        self.send(builder).await
    }

    async fn get_payment(&self, access_token: &str, payment_id: &str) -> Result<GatewayPayment, PaymentError> {
        if !is_payment_id(payment_id) {
            return Err(PaymentError::ValidationError(format!("Invalid payment id: {:?}", payment_id)));
        }

        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);
        debug!("Fetching payment {}", payment_id);

        let builder = self.client.get(&url).bearer_auth(access_token);
        self.send(builder).await
    }
}
