use rocket::futures::{SinkExt, StreamExt};
use rocket::{get, State};
use rocket_ws::{Channel, Message, WebSocket};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{ChatMessage, Role};

/// WebSocket chat endpoint. Replays the transcript on connect, then treats
/// every inbound text frame as a question.
#[get("/chat?<session_id>")]
pub fn chat_websocket(
    ws: WebSocket,
    session_id: Uuid,
    state: &State<crate::server::AppState>,
) -> Channel<'static> {
    let state = state.inner().clone();

    ws.channel(move |mut stream| {
        Box::pin(async move {
            let Some(session) = state.sessions.get(session_id).await else {
                warn!("WebSocket rejected: unknown session {}", session_id);
                let _ = stream
                    .send(Message::Text(json!({
                        "type": "error",
                        "content": format!("unknown session {}", session_id),
                    }).to_string()))
                    .await;
                return Ok(());
            };

            info!("WebSocket connected for session {}", session_id);

            // Replay history
            let history: Vec<ChatMessage> = session.lock().await.transcript().to_vec();
            for msg in &history {
                let _ = stream
                    .send(Message::Text(message_frame("history", msg).to_string()))
                    .await;
            }

            // Handle incoming messages
            while let Some(message) = stream.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        let question = parse_question(&text);

                        let frame = {
                            let mut guard = session.lock().await;
                            guard.touch();
                            match guard
                                .ask(state.llm_provider.as_ref(), &state.answer_settings, &question)
                                .await
                            {
                                Ok(reply) => message_frame("message", reply),
                                Err(e) => json!({ "type": "error", "content": e.to_string() }),
                            }
                        };

                        if let Err(e) = stream.send(Message::Text(frame.to_string())).await {
                            error!("Failed to send response: {}", e);
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        info!("WebSocket closed for session {}", session_id);
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            Ok(())
        })
    })
}

/// Accepts either `{"message": "..."}` or the raw frame text.
fn parse_question(text: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(value) => value["message"].as_str().unwrap_or(text).to_string(),
        Err(_) => text.to_string(),
    }
}

fn message_frame(kind: &str, msg: &ChatMessage) -> serde_json::Value {
    let role = match msg.role {
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    json!({
        "type": kind,
        "role": role,
        "content": msg.content,
        "error": msg.error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(role: Role, content: &str, error: bool) -> ChatMessage {
        ChatMessage {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            error,
        }
    }

    #[test]
    fn question_from_json_or_raw_text() {
        assert_eq!(parse_question(r#"{"message": "Who won?"}"#), "Who won?");
        assert_eq!(parse_question("Who won?"), "Who won?");
        // JSON without a message field is taken verbatim
        assert_eq!(parse_question(r#"{"text": "hi"}"#), r#"{"text": "hi"}"#);
        assert_eq!(parse_question("42"), "42");
    }

    #[test]
    fn history_frame_for_user_message() {
        let frame = message_frame("history", &message(Role::User, "What happened?", false));
        assert_eq!(
            frame,
            json!({ "type": "history", "role": "user", "content": "What happened?", "error": false })
        );
    }

    #[test]
    fn reply_frame_carries_error_flag() {
        let frame = message_frame(
            "message",
            &message(Role::Assistant, "Error querying completion service: 429", true),
        );
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["role"], "assistant");
        assert_eq!(frame["error"], true);
        assert_eq!(frame["content"], "Error querying completion service: 429");
    }
}
