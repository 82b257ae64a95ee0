//! Response security headers.
//!
//! Every response gets the same locked-down header set, pages and API
//! alike. The shells load only same-origin assets and the API serves
//! per-user CRM data, so nothing here needs cross-origin loosening;
//! `no-store` keeps lead data out of shared caches.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

/// Self-only content policy. The page shells ship no inline script or
/// style, and the dashboard talks to its own origin only.
const CONTENT_SECURITY_POLICY: &str = "default-src 'none'; \
     script-src 'self'; \
     style-src 'self'; \
     font-src 'self'; \
     img-src 'self'; \
     connect-src 'self'; \
     frame-src 'none'; \
     object-src 'none'; \
     base-uri 'self'; \
     form-action 'self'; \
     frame-ancestors 'none'; \
     upgrade-insecure-requests";

/// Browser features the application never uses.
const PERMISSIONS_POLICY: &str = "accelerometer=(), \
     autoplay=(), \
     camera=(), \
     display-capture=(), \
     fullscreen=(), \
     geolocation=(), \
     gyroscope=(), \
     interest-cohort=(), \
     magnetometer=(), \
     microphone=(), \
     midi=(), \
     payment=(), \
     publickey-credentials-get=(), \
     serial=(), \
     usb=(), \
     web-share=(), \
     xr-spatial-tracking=()";

const HEADERS: &[(&str, &str)] = &[
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "no-referrer"),
    ("content-security-policy", CONTENT_SECURITY_POLICY),
    ("permissions-policy", PERMISSIONS_POLICY),
    // Lead and client records must never land in a shared cache.
    ("cache-control", "no-store, max-age=0"),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("cross-origin-embedder-policy", "require-corp"),
    ("x-dns-prefetch-control", "off"),
];

/// Stamps the security header set onto the response.
pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    for (name, value) in HEADERS {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_table_is_statically_valid() {
        for (name, value) in HEADERS {
            HeaderName::from_static(name);
            assert!(HeaderValue::from_str(value).is_ok(), "{name} value");
        }
    }
}
