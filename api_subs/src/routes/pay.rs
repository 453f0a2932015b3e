use std::sync::Arc;

use actix_web::{Responder, post, web};
use common::{
    env_config::Config,
    error::{AppError, Res},
    http::Success,
};
use quota::QuotaEngine;

use crate::services;

/// Handles Stripe webhook events that change a user's plan.
///
/// # Input
/// - `payload`: Raw string containing the webhook event data
/// - `req`: HTTP request containing Stripe signature in headers
/// - `config`: Application configuration with webhook secret
/// - `engine`: The quota engine the events are forwarded to
///
/// # Output
/// - Success: Returns 200 OK when the event is processed or deliberately ignored
/// - Error: Returns 400 Bad Request for an invalid signature, 503 if the store
///   is unavailable (Stripe retries the delivery)
///
/// # Note
/// This endpoint is not called from the frontend. Stripe calls it when a
/// subscription changes. The subscription's `tier` metadata names the plan
/// (`base`, `mid` or `top`) and the customer id must match the account's
/// `stripe_customer_id`.
///
/// # Stripe Configuration Example
/// 1. Go to Stripe Dashboard → Developers → Webhooks
/// 2. Add Endpoint: https://yourapp.com/api/pay/webhook
/// 3. Select `customer.subscription.created`, `customer.subscription.updated`
///    and `customer.subscription.deleted`
/// 4. Get the webhook signing secret and set it in your environment as STRIPE_WEBHOOK_SECRET
#[post("/webhook")]
async fn post_webhook(
    payload: String,
    req: actix_web::HttpRequest,
    config: web::Data<Arc<Config>>,
    engine: web::Data<Arc<QuotaEngine>>,
) -> Res<impl Responder> {
    let signature = match req.headers().get("stripe-signature") {
        Some(signature) => signature.to_str().unwrap_or(""),
        None => return Err(AppError::BadRequest("Stripe signature missing".to_string())),
    };

    let event = services::pay::construct_event(&payload, signature, &config.stripe_webhook_secret)?;
    services::pay::process_webhook_event(&engine, event).await?;

    Success::ok("Webhook processed successfully")
}
