//! Chat message handlers.

use actix_web::{HttpResponse, web};

use chatter_core::domain::NewMessage;
use chatter_core::rate_limit::{LimitOptions, SEND_MESSAGE};
use chatter_shared::dto::{MessageResponse, MessagesQuery, SendMessageRequest, SendMessageResponse};

use crate::config::MAX_PAGE_SIZE;
use crate::middleware::error::AppResult;
use crate::state::AppState;

/// POST /api/messages
///
/// Admits the author against the `sendMessage` limit, then appends.
/// Rejections answer 429 with `kind: "RateLimited"` and `retryAfter` seconds.
pub async fn send_message(
    state: web::Data<AppState>,
    body: web::Json<SendMessageRequest>,
) -> AppResult<HttpResponse> {
    let req = body.into_inner();

    // Validate before spending a token
    let message = NewMessage::new(&req.author, &req.body)?;

    state
        .limiter
        .limit(SEND_MESSAGE, message.author(), LimitOptions::throwing())
        .await?;

    let id = state.messages.append(message).await?;
    tracing::debug!(message_id = %id, "Message stored");

    Ok(HttpResponse::Created().json(SendMessageResponse { id }))
}

/// GET /api/messages?limit=N
///
/// The most recent messages, oldest first.
pub async fn list_messages(
    state: web::Data<AppState>,
    query: web::Query<MessagesQuery>,
) -> AppResult<HttpResponse> {
    let limit = query
        .limit
        .unwrap_or(state.page_size)
        .clamp(1, MAX_PAGE_SIZE);

    let mut messages = state.messages.recent(limit).await?;
    messages.reverse();

    let body: Vec<MessageResponse> = messages
        .into_iter()
        .map(|m| MessageResponse {
            id: m.id,
            author: m.author,
            body: m.body,
            inserted_at: m.inserted_at,
        })
        .collect();

    Ok(HttpResponse::Ok().json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test};
    use chatter_core::ports::{ManualClock, TokenBucketStore};
    use chatter_core::rate_limit::{BucketConfig, RateLimiter};
    use chatter_infra::{InMemoryMessageRepository, InMemoryTokenBucketStore};
    use chatter_shared::{ErrorKind, ErrorResponse};

    use crate::handlers::{configure_routes, not_found};

    fn test_state() -> (AppState, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let store: Arc<dyn TokenBucketStore> = Arc::new(InMemoryTokenBucketStore::new());
        let config = BucketConfig::new(3, 10, Duration::from_secs(60)).unwrap();
        let limiter = RateLimiter::new(store, [(SEND_MESSAGE, config)]).with_clock(clock.clone());

        let state = AppState::from_parts(
            Arc::new(limiter),
            Arc::new(InMemoryMessageRepository::new()),
            50,
        );
        (state, clock)
    }

    fn send(author: &str, body: &str) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/messages")
            .set_json(SendMessageRequest {
                author: author.to_string(),
                body: body.to_string(),
            })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(configure_routes)
                    .default_service(web::to(not_found)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_send_then_list_in_chronological_order() {
        let (state, clock) = test_state();
        let app = app!(state);

        for body in ["first", "second"] {
            let resp = test::call_service(&app, send("Ada", body).to_request()).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            clock.advance(Duration::from_secs(1));
        }

        let req = test::TestRequest::get().uri("/api/messages").to_request();
        let messages: Vec<MessageResponse> = test::call_and_read_body_json(&app, req).await;
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[actix_web::test]
    async fn test_list_respects_limit() {
        let (state, _) = test_state();
        let app = app!(state);

        for (author, body) in [("Ada", "a"), ("Bob", "b"), ("Cy", "c")] {
            test::call_service(&app, send(author, body).to_request()).await;
        }

        let req = test::TestRequest::get()
            .uri("/api/messages?limit=2")
            .to_request();
        let messages: Vec<MessageResponse> = test::call_and_read_body_json(&app, req).await;
        let bodies: Vec<&str> = messages.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["b", "c"]);
    }

    #[actix_web::test]
    async fn test_fourth_message_is_rate_limited() {
        let (state, _) = test_state();
        let app = app!(state);

        for _ in 0..3 {
            let resp = test::call_service(&app, send("Ada", "hi").to_request()).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
        }

        let resp = test::call_service(&app, send("Ada", "hi").to_request()).await;
        assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(resp.headers().get(header::RETRY_AFTER).unwrap(), "6");

        let error: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(error.kind, ErrorKind::RateLimited);
        assert_eq!(error.retry_after(), Some(Duration::from_secs(6)));

        // Another author is unaffected
        let resp = test::call_service(&app, send("Bob", "hi").to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_admitted_again_after_retry_after() {
        let (state, clock) = test_state();
        let app = app!(state);

        for _ in 0..3 {
            test::call_service(&app, send("Ada", "hi").to_request()).await;
        }
        let resp = test::call_service(&app, send("Ada", "hi").to_request()).await;
        let error: ErrorResponse = test::read_body_json(resp).await;

        clock.advance(error.retry_after().unwrap());
        let resp = test::call_service(&app, send("Ada", "hi").to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_invalid_message_spends_no_tokens() {
        let (state, _) = test_state();
        let app = app!(state);

        for _ in 0..5 {
            let resp = test::call_service(&app, send("Ada", "   ").to_request()).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let error: ErrorResponse = test::read_body_json(resp).await;
            assert_eq!(error.kind, ErrorKind::BadRequest);
        }

        let resp = test::call_service(&app, send("Ada", "hello").to_request()).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[actix_web::test]
    async fn test_malformed_json_has_structured_error() {
        let (state, _) = test_state();
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/messages")
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .set_payload("{\"author\": 1}")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let error: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(error.kind, ErrorKind::BadRequest);
    }

    #[actix_web::test]
    async fn test_unknown_route_is_not_found() {
        let (state, _) = test_state();
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/nope").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let error: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(error.kind, ErrorKind::NotFound);
    }
}
