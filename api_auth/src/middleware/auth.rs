use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage, HttpResponse,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::jwt::validate_jwt;
use futures::future::{Ready, ok};

/// Verifies the bearer token of every request passing through and stores
/// the decoded `JwtClaims` in the request extensions.
pub struct AuthMiddleware {
    jwt_secret: Rc<String>,
}

impl AuthMiddleware {
    pub fn new(jwt_secret: String) -> Self {
        AuthMiddleware {
            jwt_secret: Rc::new(jwt_secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Arc::new(service),
            jwt_secret: self.jwt_secret.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Arc<S>,
    jwt_secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let token_value = req
            .headers()
            .get("Authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| header.strip_prefix("Bearer "))
            .map(|token| token.to_string());

        let Some(token) = token_value else {
            // no token passed - 401
            let response = HttpResponse::Unauthorized()
                .json(serde_json::json!({"error": "No authorization token provided"}))
                .map_into_boxed_body();
            return Box::pin(async move { Ok(req.into_response(response)) });
        };

        match validate_jwt(&token, &self.jwt_secret) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                let srv = Arc::clone(&self.service);
                Box::pin(async move { srv.call(req).await.map(|res| res.map_into_boxed_body()) })
            }
            Err(err) => {
                log::debug!("Rejected bearer token on {}: {}", req.path(), err);
                let response = HttpResponse::Unauthorized()
                    .json(serde_json::json!({"error": "Invalid token"}))
                    .map_into_boxed_body();
                Box::pin(async move { Ok(req.into_response(response)) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, test, web};
    use common::{
        env_config::JwtConfig,
        jwt::{JwtClaims, Role, generate_jwt},
    };
    use uuid::Uuid;

    const SECRET: &str = "middleware-secret";

    async fn whoami(claims: web::ReqData<JwtClaims>) -> HttpResponse {
        HttpResponse::Ok().body(claims.user_id.to_string())
    }

    fn token(user_id: Uuid, secret: &str) -> String {
        generate_jwt(
            user_id,
            Role::User,
            &JwtConfig {
                secret: secret.to_string(),
                expiration_hours: 1,
            },
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn valid_token_exposes_claims() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(SECRET.to_string()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;
        let user_id = Uuid::new_v4();

        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", token(user_id, SECRET))))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn missing_or_forged_tokens_are_unauthorized() {
        let app = test::init_service(
            App::new()
                .wrap(AuthMiddleware::new(SECRET.to_string()))
                .route("/whoami", web::get().to(whoami)),
        )
        .await;

        let req = test::TestRequest::get().uri("/whoami").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);

        let forged = token(Uuid::new_v4(), "someone-else");
        let req = test::TestRequest::get()
            .uri("/whoami")
            .insert_header(("Authorization", format!("Bearer {}", forged)))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 401);
    }
}
