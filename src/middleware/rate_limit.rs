//! Per-user rate limiting backed by a Redis sorted set
//!
//! Each request adds a member scored by its timestamp; members older than the
//! window are pruned before counting.

use crate::{
    config::RateLimitSettings,
    error::{ApiError, Result},
    middleware::jwt_auth::UserIdentity,
};
use axum::{extract::Request, middleware::Next, response::Response};
use redis::{AsyncCommands, Client};
use std::{future::Future, pin::Pin, sync::Arc};
use time::OffsetDateTime;
use tracing::{debug, warn};
use uuid::Uuid;

type RateLimitFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

/// Build the limiter for routes behind `jwt_auth_middleware`.
///
/// Returns 429 once a user exceeds `requests_per_minute` within the window.
pub fn create_rate_limiter(
    redis_client: Arc<Client>,
    settings: RateLimitSettings,
) -> impl Fn(Request, Next) -> RateLimitFuture + Clone {
    move |request: Request, next: Next| {
        let redis_client = redis_client.clone();
        let settings = settings.clone();

        Box::pin(async move {
            let identity = request
                .extensions()
                .get::<UserIdentity>()
                .copied()
                .ok_or_else(|| {
                    ApiError::Internal(anyhow::anyhow!(
                        "Rate limit middleware requires jwt_auth_middleware"
                    ))
                })?;

            let allowed = check_rate_limit(
                &redis_client,
                &rate_limit_key(identity.user_id),
                settings.requests_per_minute,
                settings.window_seconds,
            )
            .await?;

            if !allowed {
                warn!(user_id = %identity.user_id, "Rate limit exceeded");
                return Err(ApiError::RateLimitExceeded);
            }

            debug!(user_id = %identity.user_id, "Rate limit check passed");
            Ok(next.run(request).await)
        })
    }
}

fn rate_limit_key(user_id: Uuid) -> String {
    format!("coursepay:rate_limit:user:{}", user_id)
}

/// Returns true if the request fits in the window
async fn check_rate_limit(
    redis_client: &Client,
    key: &str,
    limit: u32,
    window_seconds: u32,
) -> Result<bool> {
    let mut conn = redis_client
        .get_multiplexed_async_connection()
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Redis connection failed: {}", e)))?;

    let now = OffsetDateTime::now_utc().unix_timestamp();
    let window_start = now - i64::from(window_seconds);

    let _: () = conn
        .zrembyscore(key, 0, window_start as f64)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Redis ZREMRANGEBYSCORE failed: {}", e)))?;

    let count: u32 = conn
        .zcard(key)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Redis ZCARD failed: {}", e)))?;

    if count >= limit {
        return Ok(false);
    }

    let member = format!("{}:{}", now, Uuid::new_v4());
    let _: () = conn
        .zadd(key, member, now as f64)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Redis ZADD failed: {}", e)))?;

    let _: () = conn
        .expire(key, i64::from(window_seconds) + 10)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Redis EXPIRE failed: {}", e)))?;

    Ok(true)
}
