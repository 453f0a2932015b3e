use common::error::{AppError, Res};
use quota::QuotaEngine;
use stripe::{Event, EventObject, EventType, Subscription, Webhook};
use uuid::Uuid;

use crate::dtos::pay::SubscriptionUpdate;

/// Creates an event for the webhook based on the request payload and signature.
/// Requires a webhook secret key.
pub fn construct_event(payload: &str, signature: &str, webhook_secret: &str) -> Res<Event> {
    match Webhook::construct_event(payload, signature, webhook_secret) {
        Ok(event) => Ok(event),
        Err(e) => {
            log::error!("Error constructing webhook event: {}", e);
            Err(AppError::BadRequest(format!("Webhook Error: {}", e)))
        }
    }
}

/// Processes the webhook event.
pub async fn process_webhook_event(engine: &QuotaEngine, event: Event) -> Res<()> {
    log::info!("Processing webhook event: {}", event.type_);

    let (subscription, update) = match (event.type_, event.data.object) {
        (
            EventType::CustomerSubscriptionCreated | EventType::CustomerSubscriptionUpdated,
            EventObject::Subscription(subscription),
        ) => {
            let update = SubscriptionUpdate::from_parts(
                subscription.status.as_str(),
                subscription.metadata.get("tier").map(String::as_str),
                subscription.trial_end,
            );
            (subscription, update)
        }
        (EventType::CustomerSubscriptionDeleted, EventObject::Subscription(subscription)) => {
            (subscription, SubscriptionUpdate::cancelled())
        }
        (event_type, _) => {
            log::info!("Unhandled event type: {}", event_type);
            return Ok(());
        }
    };

    let Some(user_id) = resolve_user(engine, &subscription).await? else {
        return Ok(());
    };
    apply_update(engine, user_id, update).await
}

async fn resolve_user(engine: &QuotaEngine, subscription: &Subscription) -> Res<Option<Uuid>> {
    let customer_id = subscription.customer.id().to_string();
    let user_id = engine.user_for_customer(&customer_id).await?;
    if user_id.is_none() {
        log::warn!(
            "Subscription {} belongs to unknown customer {}",
            subscription.id,
            customer_id
        );
    }
    Ok(user_id)
}

/// Applies the state before the tier, so a trial that converts to a paid
/// plan is no longer trialing when its tier is looked at.
pub async fn apply_update(engine: &QuotaEngine, user_id: Uuid, update: SubscriptionUpdate) -> Res<()> {
    if let Some(state) = update.state {
        engine
            .on_subscription_state_changed(user_id, state, update.trial_ends_at, update.reason)
            .await?;
    }
    if let Some(tier) = update.tier {
        engine.on_tier_changed(user_id, tier, update.reason).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use common::{
        clock::SystemClock,
        tier::{SubscriptionState, Tier},
    };
    use db::{dtos::account::AccountCreateRequest, ledger::Ledger, memory::MemoryLedger};

    async fn engine_with_user(tier: Tier, state: SubscriptionState) -> (MemoryLedger, QuotaEngine, Uuid) {
        let ledger = MemoryLedger::new();
        let engine = QuotaEngine::new(Arc::new(ledger.clone()), Arc::new(SystemClock), 30);
        let id = Uuid::new_v4();
        ledger
            .insert_account(AccountCreateRequest {
                id,
                email: "billing@example.com".to_string(),
                tier,
                subscription_state: state,
                trial_ends_at: None,
                stripe_customer_id: Some("cus_42".to_string()),
                created_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        (ledger, engine, id)
    }

    #[tokio::test]
    async fn paid_upgrade_moves_tier_and_state() {
        let (ledger, engine, user_id) = engine_with_user(Tier::Base, SubscriptionState::Trialing).await;
        assert_eq!(engine.user_for_customer("cus_42").await.unwrap(), Some(user_id));

        let update = SubscriptionUpdate::from_parts("active", Some("mid"), None);
        apply_update(&engine, user_id, update).await.unwrap();

        let account = ledger.account(user_id).unwrap();
        assert_eq!(account.tier, Tier::Mid);
        assert_eq!(account.subscription_state, SubscriptionState::Active);
    }

    #[tokio::test]
    async fn cancellation_drops_to_base() {
        let (ledger, engine, user_id) = engine_with_user(Tier::Top, SubscriptionState::Active).await;
        apply_update(&engine, user_id, SubscriptionUpdate::cancelled())
            .await
            .unwrap();

        let account = ledger.account(user_id).unwrap();
        assert_eq!(account.tier, Tier::Base);
        assert_eq!(account.subscription_state, SubscriptionState::Cancelled);
        assert!(
            ledger
                .audit_entries()
                .iter()
                .all(|e| e.reason == common::audit::reason::SUBSCRIPTION_CANCELLED)
        );
    }
}
