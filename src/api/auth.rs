// Registration, login and logout

use axum::extract::State;
use serde::Serialize;

use crate::{
    app_state::AppState,
    core::types::to_rfc3339,
    error::AppResult,
    infrastructure::middleware::Vc,
    services::{identity::NewUser, projections::UserView},
};

use super::{
    envelope::{ApiResponse, Empty},
    form::FormData,
    validation::Rules,
};

#[derive(Debug, Serialize)]
pub struct LoginView {
    pub user: UserView,
    pub token: String,
    pub token_type: &'static str,
    pub expires_at: String,
}

pub async fn register(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<UserView>> {
    let mut rules = Rules::new();
    let first_name = rules.required("first_name", form.text("first_name"));
    rules.max_chars("first_name", first_name, 255);
    let last_name = rules.required("last_name", form.text("last_name"));
    rules.max_chars("last_name", last_name, 255);
    let user_name = rules.required("user_name", form.text("user_name"));
    rules.max_chars("user_name", user_name, 255);
    let email = rules.required("email", form.text("email"));
    rules.email("email", email);
    rules.max_chars("email", email, 255);
    let password = rules.required("password", form.text("password"));
    rules.min_chars("password", password, 8);
    rules.confirmed("password", password, form.text("password_confirmation"));
    rules.finish()?;

    let user = state
        .identity
        .register(NewUser {
            first_name: first_name.unwrap_or_default().to_string(),
            last_name: last_name.unwrap_or_default().to_string(),
            user_name: user_name.unwrap_or_default().to_string(),
            email: email.unwrap_or_default().to_string(),
            password: password.unwrap_or_default().to_string(),
        })
        .await?;

    Ok(ApiResponse::created(
        UserView::project(&user, state.blobs.as_ref()),
        "User registered successfully",
    ))
}

pub async fn login(
    State(state): State<AppState>,
    form: FormData,
) -> AppResult<ApiResponse<LoginView>> {
    let mut rules = Rules::new();
    let email = rules.required("email", form.text("email"));
    rules.email("email", email);
    let password = rules.required("password", form.text("password"));
    rules.finish()?;

    let (user, issued) = state
        .identity
        .login(email.unwrap_or_default(), password.unwrap_or_default())
        .await?;

    Ok(ApiResponse::ok(
        LoginView {
            user: UserView::project(&user, state.blobs.as_ref()),
            token: issued.token,
            token_type: "Bearer",
            expires_at: to_rfc3339(issued.claims.exp as i64 * 1000),
        },
        "Login successful",
    ))
}

pub async fn logout(State(state): State<AppState>, vc: Vc) -> AppResult<ApiResponse<Empty>> {
    state.identity.logout(&vc).await?;
    Ok(ApiResponse::message("Logged out successfully"))
}
