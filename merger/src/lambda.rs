//! AWS Lambda entry point behind an API Gateway proxy integration.
use crate::api::{ApiEvent, ApiResponse};
use crate::merge::DocumentMerger;
use lambda_runtime::{LambdaEvent, service_fn};

pub async fn run(merger: DocumentMerger) -> Result<(), lambda_runtime::Error> {
    lambda_runtime::run(service_fn(move |event: LambdaEvent<ApiEvent>| {
        let merger = merger.clone();
        async move {
            tracing::debug!(request_id = %event.context.request_id, "Processing event");
            Ok::<_, lambda_runtime::Error>(handle_event(&merger, event.payload).await)
        }
    }))
    .await
}

pub async fn handle_event(merger: &DocumentMerger, event: ApiEvent) -> ApiResponse {
    match event.json_body() {
        Ok(body) => merger.handle(&body).await,
        Err(e) => {
            tracing::warn!("{e}");
            ApiResponse::from(&e)
        }
    }
}
