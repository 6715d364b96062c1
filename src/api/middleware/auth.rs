use crate::auth::{Identity, TokenVerifier};
use crate::error::AppError;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web, Error, FromRequest, HttpMessage, HttpRequest,
};
use std::{
    future::{ready, Future, Ready},
    pin::Pin,
    rc::Rc,
};
use tracing::{error, warn};

/// Paths reachable without a bearer token.
const PUBLIC_PATHS: &[&str] = &["/", "/health"];

/// Verifies the bearer token on every non-public request and attaches the
/// resulting [`Identity`] to the request extensions.
pub struct BearerAuth;

impl<S, B> Transform<S, ServiceRequest> for BearerAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = BearerAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BearerAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct BearerAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for BearerAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();

        if req.method() == actix_web::http::Method::OPTIONS || PUBLIC_PATHS.contains(&req.path()) {
            return Box::pin(async move { srv.call(req).await });
        }

        let verifier = match req.app_data::<web::Data<TokenVerifier>>() {
            Some(v) => v.clone(),
            None => {
                error!("TokenVerifier missing in app_data");
                return Box::pin(async move {
                    Err(actix_web::error::ErrorInternalServerError(
                        "authentication is not configured",
                    ))
                });
            }
        };

        let token = req
            .headers()
            .get("Authorization")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let Some(token) = token else {
            warn!(path = %req.path(), "Request without bearer token");
            return Box::pin(async move {
                Err(AppError::Authentication("Access denied. No token provided.".to_string()).into())
            });
        };

        match verifier.verify(token) {
            Ok(identity) => {
                req.extensions_mut().insert(identity);
            }
            Err(e) => {
                warn!(path = %req.path(), error = %e, "Rejected bearer token");
                return Box::pin(async move { Err(AppError::from(e).into()) });
            }
        }

        Box::pin(async move {
            let res = srv.call(req).await?;
            Ok(res)
        })
    }
}

impl FromRequest for Identity {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<Identity>()
                .cloned()
                .ok_or_else(|| AppError::Authentication("Authentication required".to_string())),
        )
    }
}
