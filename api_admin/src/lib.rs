use actix_web::web;

pub mod routes {
    pub mod audit;
    pub mod sweep;
    pub mod tier;
    pub mod user;
}

mod dtos {
    pub(crate) mod admin;
}

/// Operator routes. Every handler requires an admin token and records the
/// caller's id on whatever it changes.
pub fn mount_admin() -> actix_web::Scope {
    web::scope("/admin")
        .service(routes::tier::get_tiers)
        .service(routes::tier::put_tier)
        .service(routes::user::get_user)
        .service(routes::user::post_end_session)
        .service(routes::user::post_reset_cooling)
        .service(routes::user::post_change_tier)
        .service(routes::audit::get_audit)
        .service(routes::sweep::post_sweep)
}
