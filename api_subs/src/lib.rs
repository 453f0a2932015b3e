use actix_web::web;

pub mod routes {
    pub mod pay;
}

pub mod services {
    pub mod pay;
}

pub mod dtos {
    pub mod pay;
}

/// Payment provider callbacks. Mounted outside the authenticated scope:
/// requests are verified by their signature instead.
pub fn mount_webhook() -> actix_web::Scope {
    web::scope("/pay").service(routes::pay::post_webhook)
}
