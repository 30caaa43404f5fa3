use crate::service::BestStoriesService;
use crate::types::StoriesError;
use actix_web::http::StatusCode;
use actix_web::{get, web, HttpResponse, ResponseError};
use serde_json::json;
use tracing::{error, info, warn};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(best_stories);
}

/// `GET /{count}`: the `count` best stories, best first.
#[get("/{count}")]
async fn best_stories(
    service: web::Data<BestStoriesService>,
    count: web::Path<i64>,
) -> Result<HttpResponse, StoriesError> {
    let count = count.into_inner();
    info!("Getting {} best stories", count);

    let stories = service.get_best_stories(count).await?;
    Ok(HttpResponse::Ok().json(stories))
}

impl ResponseError for StoriesError {
    fn status_code(&self) -> StatusCode {
        match self {
            StoriesError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            StoriesError::CacheUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = self.to_string();

        match self {
            StoriesError::Timeout => warn!("Best stories request failed: {}", message),
            _ => error!("Best stories request failed: {}", message),
        }

        HttpResponse::build(status).json(json!({ "error": message }))
    }
}
