//! Page shell route handlers.
//!
//! The UI is rendered client-side by the front-end bundle; these handlers
//! anchor the paths the access gate and the identity provider redirect
//! between, and give each page a mount point to hydrate into.

use axum::response::Html;

/// Landing page shell.
pub async fn landing() -> Html<&'static str> {
    Html(include_str!("../../pages/index.html"))
}

/// Sign-in page shell. The identity provider renders its own form here.
pub async fn sign_in() -> Html<&'static str> {
    Html(include_str!("../../pages/sign-in.html"))
}

/// Sign-up page shell.
pub async fn sign_up() -> Html<&'static str> {
    Html(include_str!("../../pages/sign-up.html"))
}

/// Dashboard shell. The access gate redirects unentitled visitors away
/// before this handler runs.
pub async fn dashboard() -> Html<&'static str> {
    Html(include_str!("../../pages/dashboard.html"))
}
