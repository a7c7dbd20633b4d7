use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use tracing::Instrument;

use crate::error::AppError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request tracing span with start/finish events.
/// Query strings are never logged: they may carry credentials.
///
/// An `AppError` behind a failed request is logged here, under the same
/// request id that is echoed back in the `x-request-id` header.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggerService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "http_request",
            request_id = %request_id,
            method = %req.method(),
            path = %req.path(),
        );

        let service = self.service.clone();

        Box::pin(
            async move {
                tracing::info!("Request started");
                let mut res = service.call(req).await;

                let elapsed_ms = start_time.elapsed().as_millis() as u64;
                match &mut res {
                    Ok(response) => {
                        if let Some(app_error) = response.response().error().and_then(app_error) {
                            app_error.log_error(&request_id);
                        }
                        if let Ok(value) = HeaderValue::from_str(&request_id) {
                            response
                                .headers_mut()
                                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                        }
                        tracing::info!(
                            status = response.status().as_u16(),
                            elapsed_ms,
                            "Request completed"
                        );
                    }
                    Err(e) => {
                        if let Some(app_error) = app_error(e) {
                            app_error.log_error(&request_id);
                        }
                        tracing::warn!(
                            status = e.as_response_error().status_code().as_u16(),
                            elapsed_ms,
                            "Request failed"
                        );
                    }
                }

                res
            }
            .instrument(span),
        )
    }
}

fn app_error(error: &Error) -> Option<&AppError> {
    error.as_error::<AppError>()
}
