use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::{
    adapters::http::{app_state::AppState, routes::common::EMAIL_COOKIE},
    app_error::AppError,
};

/// Budget requests per client IP, and per email once the caller has signed in.
pub async fn rate_limit_middleware(
    State(app_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    cookies: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let ip = client_ip(&request, addr, app_state.config.trust_proxy);
    let email = cookies.get(EMAIL_COOKIE).map(|c| c.value().to_owned());

    tracing::debug!(ip = %ip, email = ?email, "Rate limiting request");
    app_state.rate_limiter.check(&ip, email.as_deref()).await?;

    Ok(next.run(request).await)
}

/// Forwarding headers are only honoured behind a configured proxy.
fn client_ip(req: &Request, peer: SocketAddr, trust_proxy: bool) -> String {
    let forwarded = trust_proxy.then(|| forwarded_ip(req)).flatten();
    forwarded.unwrap_or_else(|| peer.ip().to_string())
}

fn forwarded_ip(req: &Request) -> Option<String> {
    let header = |name: &str| {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    // Left-most hop is the original client
    header("x-forwarded-for")
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .or_else(|| header("x-real-ip"))
        .map(str::to_string)
}
