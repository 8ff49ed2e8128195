use crate::api::{ApiEvent, ApiResponse};
use crate::errors::MergerError;
use crate::merge::DocumentMerger;
use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::{ResponseBody, full_body, make_boxed_error_response};
use std::convert::Infallible;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

/// Accepts `POST` requests carrying a JSON update on any path.
pub struct MergerService<B> {
    merger: DocumentMerger,
    _body: PhantomData<fn(B)>,
}

impl<B> MergerService<B> {
    pub fn new(merger: DocumentMerger) -> Self {
        MergerService {
            merger,
            _body: PhantomData,
        }
    }
}

/// Maps the proxy-style response onto a real HTTP response.
pub fn into_http_response(response: ApiResponse) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(response.status());
    for (name, value) in &response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    builder
        .body(full_body(response.body))
        .unwrap_or_else(|_| make_boxed_error_response(StatusCode::INTERNAL_SERVER_ERROR))
}

impl<B> Service<Request<B>> for MergerService<B>
where
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display + Send,
{
    type Response = Response<ResponseBody>;
    type Error = Infallible;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<B>) -> Self::Future {
        let merger = self.merger.clone();

        Box::pin(async move {
            if req.method() != Method::POST {
                return Ok(make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED));
            }

            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    let err = MergerError::InvalidRequestBody(e.to_string());
                    tracing::warn!("{err}");
                    return Ok(into_http_response(ApiResponse::from(&err)));
                }
            };

            let body = match String::from_utf8(body.to_vec()) {
                Ok(body) => body,
                Err(e) => {
                    let err = MergerError::InvalidRequestBody(e.to_string());
                    tracing::warn!("{err}");
                    return Ok(into_http_response(ApiResponse::from(&err)));
                }
            };

            let event = ApiEvent {
                body: Some(body),
                is_base64_encoded: false,
            };

            let response = match event.json_body() {
                Ok(body) => merger.handle(&body).await,
                Err(e) => {
                    tracing::warn!("{e}");
                    ApiResponse::from(&e)
                }
            };

            Ok(into_http_response(response))
        })
    }
}
