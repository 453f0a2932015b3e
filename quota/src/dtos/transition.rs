use common::tier::Tier;
use serde::Serialize;
use uuid::Uuid;

/// What a tier change did to the user's open session and cooling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierChange {
    pub from_tier: Tier,
    pub to_tier: Tier,
    pub changed: bool,
    pub closed_session: Option<Uuid>,
    pub retagged_session: Option<Uuid>,
    pub cooling_lifted: bool,
}

impl TierChange {
    pub fn unchanged(tier: Tier) -> Self {
        TierChange {
            from_tier: tier,
            to_tier: tier,
            changed: false,
            closed_session: None,
            retagged_session: None,
            cooling_lifted: false,
        }
    }
}
