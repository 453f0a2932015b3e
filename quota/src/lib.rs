pub mod admin;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod reconcile;
pub mod session;
pub mod transition;
pub mod warning;

pub mod sweeper {
    pub mod cooling;
    pub mod monthly;
    pub mod stale;
    pub mod trial;
}

pub mod dtos {
    pub mod admin;
    pub mod eligibility;
    pub mod session;
    pub mod transition;
}

pub use engine::QuotaEngine;
