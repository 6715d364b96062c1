use actix_web::{delete, get, patch, post, web, HttpResponse, Result as WebResult};

use crate::api::models::{
    ChatRequest, ChatResponse, HistoryItem, HistoryResponse, RenameSessionRequest, SessionInfo,
};
use crate::auth::Identity;
use crate::chat::{SessionManager, TurnCoordinator, TurnRequest};
use crate::error::AppError;

#[get("/")]
pub async fn index() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Counsel chat assistant backend",
        "status": "running"
    }))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({"status": "healthy"}))
}

// --- Turns ---

#[post("/chat")]
pub async fn chat(
    turns: web::Data<TurnCoordinator>,
    identity: Identity,
    req: web::Json<ChatRequest>,
) -> WebResult<HttpResponse> {
    let req = req.into_inner();
    let outcome = turns
        .submit_turn(
            TurnRequest {
                session_id: req.session_id,
                message: req.user_message,
                language: req.language,
            },
            &identity,
        )
        .await?;

    let status = if outcome.committed() { "success" } else { "degraded" };
    Ok(HttpResponse::Ok().json(ChatResponse {
        bot_response: outcome.reply,
        session_id: outcome.session_id,
        status: status.to_string(),
    }))
}

// --- Sessions ---

#[post("")]
pub async fn create_session(
    sessions: web::Data<SessionManager>,
    identity: Identity,
) -> WebResult<HttpResponse> {
    let session = sessions.create_session(&identity).await?;
    Ok(HttpResponse::Created().json(SessionInfo::from(session)))
}

#[get("")]
pub async fn list_sessions(
    sessions: web::Data<SessionManager>,
    identity: Identity,
) -> WebResult<HttpResponse> {
    let listings = sessions.list_sessions(&identity).await?;
    let body: Vec<SessionInfo> = listings.iter().map(SessionInfo::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

#[get("/{id}/history")]
pub async fn get_history(
    sessions: web::Data<SessionManager>,
    identity: Identity,
    id: web::Path<String>,
) -> WebResult<HttpResponse> {
    let id = id.into_inner();
    let transcript = sessions.get_history(&id, &identity).await?;

    Ok(HttpResponse::Ok().json(HistoryResponse {
        session_id: id,
        history: HistoryItem::pair_transcript(&transcript),
    }))
}

#[patch("/{id}")]
pub async fn rename_session(
    sessions: web::Data<SessionManager>,
    identity: Identity,
    id: web::Path<String>,
    req: web::Json<RenameSessionRequest>,
) -> WebResult<HttpResponse> {
    let session = sessions
        .rename_session(&id.into_inner(), &identity, &req.label)
        .await?;
    Ok(HttpResponse::Ok().json(SessionInfo::from(session)))
}

#[delete("/{id}")]
pub async fn delete_session(
    sessions: web::Data<SessionManager>,
    identity: Identity,
    id: web::Path<String>,
) -> WebResult<HttpResponse> {
    sessions.delete_session(&id.into_inner(), &identity).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "message": "Session deleted"
    })))
}

#[get("/{id}/export")]
pub async fn export_session(
    sessions: web::Data<SessionManager>,
    identity: Identity,
    id: web::Path<String>,
) -> WebResult<HttpResponse> {
    let id = id.into_inner();
    let export = sessions.export_session(&id, &identity).await?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"session_{}.txt\"", id)))
        .body(export))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .app_data(
        web::PathConfig::default()
            .error_handler(|err, _req| AppError::validation(err.to_string()).into()),
    )
    .service(index)
    .service(health)
    .service(chat)
    .service(
        web::scope("/sessions")
            .service(create_session)
            .service(list_sessions)
            .service(get_history)
            .service(rename_session)
            .service(delete_session)
            .service(export_session),
    );
}
