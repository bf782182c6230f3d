use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State},
};
use tracing::{debug, error};

use parley_db::{Store, StoreError};
use parley_gateway::dispatcher::Dispatcher;
use parley_types::api::{LoginRequest, LoginResponse, RegisterResponse, User};

use crate::upload;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub dispatcher: Dispatcher,
}

/// Fields collected from the multipart register form.
#[derive(Debug, Default)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
    pub usb_key: Option<String>,
    pub profile_pic: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Json<RegisterResponse> {
    let form = match collect_form(multipart).await {
        Ok(form) => form,
        Err(e) => {
            error!("register: reading multipart form failed: {}", e);
            return Json(RegisterResponse::failure("registration failed"));
        }
    };
    Json(register_user(&state, form).await)
}

/// Insert the new account row. A unique-constraint rejection is the one
/// failure surfaced with a specific message.
pub async fn register_user(state: &AppStateInner, form: RegisterForm) -> RegisterResponse {
    match state
        .store
        .create_user(
            &form.username,
            &form.password,
            form.profile_pic.as_deref(),
            form.usb_key.as_deref(),
        )
        .await
    {
        Ok(()) => RegisterResponse::ok(),
        Err(StoreError::Constraint) => RegisterResponse::failure("username exists"),
        Err(e) => {
            error!("register: user insert failed: {}", e);
            RegisterResponse::failure("registration failed")
        }
    }
}

async fn collect_form(mut multipart: Multipart) -> anyhow::Result<RegisterForm> {
    let mut form = RegisterForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "username" => form.username = field.text().await?,
            "password" => form.password = field.text().await?,
            "usb_key" => {
                let value = field.text().await?;
                if !value.is_empty() {
                    form.usb_key = Some(value);
                }
            }
            "profile_pic" => form.profile_pic = upload::store_profile_pic(field).await?,
            other => debug!("register: ignoring unknown field {:?}", other),
        }
    }

    Ok(form)
}

pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Json<LoginResponse> {
    Json(login_user(&state, req).await)
}

pub async fn login_user(state: &AppStateInner, req: LoginRequest) -> LoginResponse {
    let row = match state.store.find_user(&req.username, &req.password).await {
        Ok(row) => row,
        Err(e) => {
            error!("login: credential lookup failed: {}", e);
            return LoginResponse::failure("login failed");
        }
    };

    // One message for both a missing user and a wrong password.
    let Some(row) = row else {
        return LoginResponse::failure("invalid username or password");
    };

    // Second factor is checked only once credentials already matched.
    let usb_registered = row.usb_key.as_deref().is_some_and(|k| !k.is_empty());
    if usb_registered && !req.usb_present {
        return LoginResponse::failure("USB key required");
    }

    LoginResponse::ok(User {
        id: row.id,
        username: row.username,
        password: row.password,
        profile_pic: row.profile_pic,
        usb_key: row.usb_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_db::StoreConfig;
    use tempfile::TempDir;

    async fn test_state(dir: &TempDir) -> AppState {
        let store = Store::connect(&StoreConfig {
            database_url: None,
            sqlite_path: dir.path().join("test.db"),
        })
        .await;
        store.init_schema().await.unwrap();
        Arc::new(AppStateInner { store, dispatcher: Dispatcher::new() })
    }

    fn form(username: &str, password: &str, usb_key: Option<&str>) -> RegisterForm {
        RegisterForm {
            username: username.into(),
            password: password.into(),
            usb_key: usb_key.map(Into::into),
            profile_pic: None,
        }
    }

    #[tokio::test]
    async fn duplicate_registration_fails_with_specific_message() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir).await;

        let first = register_user(&state, form("alice", "pw", None)).await;
        assert!(first.success);

        let second = register_user(&state, form("alice", "other", None)).await;
        assert!(!second.success);
        assert_eq!(second.message.as_deref(), Some("username exists"));
    }

    #[tokio::test]
    async fn login_returns_the_matching_user() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir).await;
        register_user(&state, form("alice", "pw", None)).await;

        let resp = login_user(
            &state,
            LoginRequest { username: "alice".into(), password: "pw".into(), usb_present: false },
        )
        .await;

        assert!(resp.success);
        let user = resp.user.unwrap();
        assert_eq!(user.username, "alice");
        assert_eq!(user.password, "pw");
    }

    #[tokio::test]
    async fn wrong_credentials_get_one_generic_message() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir).await;
        register_user(&state, form("alice", "pw", None)).await;

        let bad_password = login_user(
            &state,
            LoginRequest { username: "alice".into(), password: "nope".into(), usb_present: false },
        )
        .await;
        let bad_user = login_user(
            &state,
            LoginRequest { username: "mallory".into(), password: "pw".into(), usb_present: false },
        )
        .await;

        assert!(!bad_password.success);
        assert!(!bad_user.success);
        // neither reveals which field was wrong
        assert_eq!(bad_password.message, bad_user.message);
    }

    #[tokio::test]
    async fn usb_key_accounts_require_the_indicator() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir).await;
        register_user(&state, form("alice", "pw", Some("key-5512"))).await;

        let without = login_user(
            &state,
            LoginRequest { username: "alice".into(), password: "pw".into(), usb_present: false },
        )
        .await;
        assert!(!without.success);
        assert_eq!(without.message.as_deref(), Some("USB key required"));

        let with = login_user(
            &state,
            LoginRequest { username: "alice".into(), password: "pw".into(), usb_present: true },
        )
        .await;
        assert!(with.success);
        assert_eq!(with.user.unwrap().usb_key.as_deref(), Some("key-5512"));
    }

    #[tokio::test]
    async fn usb_check_only_runs_after_credentials_match() {
        let dir = TempDir::new().unwrap();
        let state = test_state(&dir).await;
        register_user(&state, form("alice", "pw", Some("key-5512"))).await;

        // wrong password on a usb account: generic message, never the usb one
        let resp = login_user(
            &state,
            LoginRequest { username: "alice".into(), password: "nope".into(), usb_present: false },
        )
        .await;
        assert_eq!(resp.message.as_deref(), Some("invalid username or password"));
    }
}
