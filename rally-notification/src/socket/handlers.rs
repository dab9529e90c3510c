use std::sync::Arc;

use serde::{Deserialize, Serialize};
use socketioxide::extract::{Data, SocketRef};
use uuid::Uuid;

use crate::socket::dispatcher;
use crate::AppState;

/// Client auth frame, sent once after the connection opens. Identity rides
/// on the JWT; the bound user id comes from its claims, never from a
/// client-asserted field.
#[derive(Debug, Deserialize)]
pub struct AuthFrame {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
}

fn user_room(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

pub async fn on_connect_with_state(socket: SocketRef, state: Arc<AppState>) {
    // Tracked immediately so an auth-less connection is still cleanly
    // removable on close.
    state.registry.register(socket.id);
    tracing::debug!(sid = %socket.id, "push connection opened (unbound)");

    socket.on("auth", {
        let state = state.clone();
        move |socket: SocketRef, Data::<AuthFrame>(frame)| {
            let state = state.clone();
            async move {
                on_auth(socket, frame, &state).await;
            }
        }
    });

    socket.on_disconnect({
        let state = state.clone();
        move |socket: SocketRef| {
            let state = state.clone();
            async move {
                state.registry.unregister(socket.id);
                tracing::debug!(sid = %socket.id, "push connection closed");
            }
        }
    });
}

async fn on_auth(socket: SocketRef, frame: AuthFrame, state: &Arc<AppState>) {
    let user_id = match verify_token(&frame.token, &state.config.jwt_secret) {
        Ok(id) => id,
        Err(msg) => {
            tracing::warn!(sid = %socket.id, error = %msg, "push connection auth failed");
            let _ = socket.emit(
                "error",
                &ErrorPayload {
                    code: "AUTH_FAILED".into(),
                    message: msg,
                },
            );
            socket.disconnect().ok();
            return;
        }
    };

    // The source overwrote bindings without validation; we keep replace
    // semantics but log when the identity actually changes.
    if let Some(previous) = state.registry.bind(socket.id, user_id) {
        if previous != user_id {
            tracing::warn!(
                sid = %socket.id,
                previous = %previous,
                user_id = %user_id,
                "push connection rebound to a different user"
            );
            socket.leave(user_room(previous)).ok();
        }
    }

    // Join the user's room so dispatches reach every tab/device.
    socket.join(user_room(user_id)).ok();

    tracing::info!(user_id = %user_id, sid = %socket.id, "push connection authenticated");

    dispatcher::send_current_count(state, &socket, user_id).await;
}

fn verify_token(token: &str, secret: &str) -> Result<Uuid, String> {
    let mut validation = jsonwebtoken::Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.validate_exp = true;

    let token_data = jsonwebtoken::decode::<rally_shared::types::auth::Claims>(
        token,
        &jsonwebtoken::DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| format!("invalid token: {e}"))?;

    if token_data.claims.is_expired() {
        return Err("token has expired".into());
    }

    Ok(token_data.claims.sub)
}
