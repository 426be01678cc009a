use crate::{config::AppConfig, errors::ServiceError};
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{error, info, instrument};

type HmacSha256 = Hmac<Sha256>;

/// Verify a payment confirmation proof.
///
/// The expected proof is `hex(HMAC-SHA256(secret, order_ref + "|" + payment_ref))`,
/// lowercase. Missing inputs fail before any hashing and are reported as
/// invalid input rather than a mismatch. No side effects.
pub fn verify_signature(
    order_ref: &str,
    payment_ref: &str,
    provided: &str,
    secret: &str,
) -> Result<bool, ServiceError> {
    if order_ref.is_empty() || payment_ref.is_empty() || provided.is_empty() {
        return Err(ServiceError::InvalidInput(
            "Payment verification data is required".into(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ServiceError::InvalidInput("Invalid signing secret".into()))?;
    mac.update(order_ref.as_bytes());
    mac.update(b"|");
    mac.update(payment_ref.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    Ok(constant_time_eq(&expected, provided))
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Convert a major-unit amount to the gateway's minor currency unit.
fn to_minor_units(amount: Decimal) -> Result<i64, ServiceError> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError("Amount out of range".into()))
}

#[derive(Debug, Serialize)]
struct CreateGatewayOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayOrderBody {
    id: String,
    amount: i64,
    currency: String,
}

/// A remote gateway order, ready for client-side checkout initiation.
#[derive(Debug, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    /// Public key the storefront hands to the gateway's checkout widget.
    pub key_id: String,
}

/// Outbound client for the payment gateway plus signature verification with
/// the shared gateway secret.
#[derive(Clone)]
pub struct PaymentService {
    http: reqwest::Client,
    key_id: Option<String>,
    key_secret: Option<String>,
    api_base: String,
    currency: String,
}

impl PaymentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            key_id: config.gateway_key_id.clone(),
            key_secret: config.gateway_key_secret.clone(),
            api_base: config.gateway_api_base.clone(),
            currency: config.gateway_currency.clone(),
        }
    }

    /// Credentials are provisioned externally; fail fast before any remote
    /// call when they are absent.
    fn credentials(&self) -> Result<(&str, &str), ServiceError> {
        match (self.key_id.as_deref(), self.key_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => Ok((id, secret)),
            _ => Err(ServiceError::GatewayConfigurationError(
                "Payment gateway credentials are missing. \
                 Set APP__GATEWAY_KEY_ID and APP__GATEWAY_KEY_SECRET."
                    .into(),
            )),
        }
    }

    /// Creates a remote gateway order for the given amount. The gateway works
    /// in the smallest currency unit, so the amount is scaled by 100 and
    /// rounded before the call.
    #[instrument(skip(self))]
    pub async fn create_gateway_order(
        &self,
        amount: Decimal,
        currency: Option<String>,
    ) -> Result<GatewayOrder, ServiceError> {
        let (key_id, key_secret) = self.credentials()?;

        if amount <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Valid amount is required".into(),
            ));
        }

        let minor_amount = to_minor_units(amount)?;
        let currency = currency.unwrap_or_else(|| self.currency.clone());
        let receipt = format!("receipt_{}", Utc::now().timestamp_millis());
        let url = format!("{}/orders", self.api_base.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .basic_auth(key_id, Some(key_secret))
            .json(&CreateGatewayOrderBody {
                amount: minor_amount,
                currency: &currency,
                receipt: &receipt,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Payment gateway request failed");
                ServiceError::GatewayError(e.to_string())
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(status = %status, "Payment gateway rejected order creation");
            return Err(ServiceError::GatewayError(format!(
                "gateway returned status {status}"
            )));
        }

        let body: GatewayOrderBody = response.json().await.map_err(|e| {
            error!(error = %e, "Payment gateway returned an unreadable body");
            ServiceError::GatewayError(e.to_string())
        })?;

        info!(gateway_order_id = %body.id, amount = minor_amount, "Gateway order created");

        Ok(GatewayOrder {
            order_id: body.id,
            amount: body.amount,
            currency: body.currency,
            key_id: key_id.to_string(),
        })
    }

    /// Verify a payment confirmation proof with the configured gateway secret.
    pub fn verify_payment(
        &self,
        order_ref: &str,
        payment_ref: &str,
        provided: &str,
    ) -> Result<bool, ServiceError> {
        let (_, key_secret) = self.credentials()?;
        verify_signature(order_ref, payment_ref, provided, key_secret)
    }
}
