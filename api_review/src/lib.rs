use actix_web::web;

pub mod routes {
    pub mod review;
}

pub fn mount_review() -> actix_web::Scope {
    web::scope("/review")
        .service(routes::review::get_eligibility)
        .service(routes::review::post_submit)
        .service(routes::review::post_rollback)
}
