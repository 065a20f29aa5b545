//! Single binary web server: JSON API over the tournament service, in-memory store.
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT, SESSION_KEY.
//!
//! Identity is a stand-in: `POST /api/session` stores the caller's principal in a signed
//! cookie, and every other endpoint acts on behalf of that principal.

use actix_session::{storage::CookieSessionStore, Session, SessionMiddleware};
use actix_web::{
    cookie::Key,
    delete, get, post, put,
    web::{Data, Json, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use serde::Deserialize;
use std::time::Duration;
use tournament_bracket::{
    MatchId, MemoryStore, Principal, ServerConfig, TournamentError, TournamentId, TournamentKind,
    TournamentRules, TournamentService, TournamentView,
};

type AppState = Data<TournamentService<MemoryStore>>;

/// Longest a client waits on `/wait` before getting the current state back.
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

const PRINCIPAL_KEY: &str = "principal";

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct SessionBody {
    account_id: String,
    display_name: Option<String>,
    email: Option<String>,
}

#[derive(Deserialize)]
struct CreateProfileBody {
    username: String,
}

#[derive(Deserialize)]
struct CreateTournamentBody {
    name: String,
    #[serde(default)]
    kind: TournamentKind,
    #[serde(default = "default_participate")]
    participate: bool,
}

fn default_participate() -> bool {
    true
}

#[derive(Deserialize)]
struct SetWinnerBody {
    winner_id: String,
}

#[derive(Deserialize)]
struct InviteMemberBody {
    uid: String,
}

#[derive(Deserialize)]
struct SearchQuery {
    q: String,
}

#[derive(Deserialize)]
struct WaitQuery {
    after: Option<u64>,
}

/// Path segment: tournament id (e.g. /api/tournaments/{id})
#[derive(Deserialize)]
struct TournamentPath {
    id: TournamentId,
}

#[derive(Deserialize)]
struct ParticipantPath {
    id: TournamentId,
    participant_id: String,
}

#[derive(Deserialize)]
struct MatchPath {
    id: TournamentId,
    match_id: MatchId,
}

#[derive(Deserialize)]
struct MemberPath {
    id: TournamentId,
    uid: String,
}

fn error_response(e: TournamentError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string(), "retryable": e.is_retryable() });
    match e {
        TournamentError::Unauthorized => HttpResponse::Forbidden().json(body),
        TournamentError::NotFound(_) => HttpResponse::NotFound().json(body),
        TournamentError::StaleWrite => HttpResponse::Conflict().json(body),
        TournamentError::StoreUnavailable(_) => HttpResponse::ServiceUnavailable().json(body),
        TournamentError::Codec(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

fn respond<T: serde::Serialize>(result: Result<T, TournamentError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::Ok().json(value),
        Err(e) => error_response(e),
    }
}

/// Principal stored in the session, or a 401 response.
fn principal(session: &Session) -> Result<Principal, HttpResponse> {
    match session.get::<Principal>(PRINCIPAL_KEY) {
        Ok(Some(p)) => Ok(p),
        _ => Err(HttpResponse::Unauthorized().json(serde_json::json!({ "error": "Not signed in" }))),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "tournament-bracket-web",
    })
}

/// Sign in as the given account.
#[post("/api/session")]
async fn api_sign_in(session: Session, body: Json<SessionBody>) -> HttpResponse {
    let body = body.into_inner();
    if body.account_id.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({ "error": "account_id required" }));
    }
    let principal = Principal {
        account_id: body.account_id,
        display_name: body.display_name,
        email: body.email,
    };
    match session.insert(PRINCIPAL_KEY, &principal) {
        Ok(()) => HttpResponse::Ok().json(principal),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({ "error": e.to_string() })),
    }
}

#[delete("/api/session")]
async fn api_sign_out(session: Session) -> HttpResponse {
    session.purge();
    HttpResponse::NoContent().finish()
}

/// Create the signed-in account's profile.
#[post("/api/profile")]
async fn api_create_profile(state: AppState, session: Session, body: Json<CreateProfileBody>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.create_profile(&p, &body.username).await)
}

#[get("/api/profile/{uid}")]
async fn api_get_profile(state: AppState, uid: Path<String>) -> HttpResponse {
    match state.get_profile(&uid).await {
        Ok(Some(profile)) => HttpResponse::Ok().json(profile),
        Ok(None) => error_response(TournamentError::not_found("Profile")),
        Err(e) => error_response(e),
    }
}

#[get("/api/users/search")]
async fn api_search_users(state: AppState, query: Query<SearchQuery>) -> HttpResponse {
    respond(state.search_users(&query.q).await)
}

/// Create a tournament organized by the caller.
#[post("/api/tournaments")]
async fn api_create_tournament(state: AppState, session: Session, body: Json<CreateTournamentBody>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(
        state
            .create_tournament(&p, &body.name, body.kind, body.participate)
            .await,
    )
}

/// Tournaments still in Setup.
#[get("/api/tournaments")]
async fn api_list_tournaments(state: AppState) -> HttpResponse {
    respond(state.list_open_tournaments().await)
}

#[get("/api/tournaments/{id}")]
async fn api_get_tournament(state: AppState, path: Path<TournamentPath>) -> HttpResponse {
    respond(state.get_tournament(path.id).await.map(|v| v.value))
}

/// Long-poll: return once the tournament changes past version `after` (or on timeout).
#[get("/api/tournaments/{id}/wait")]
async fn api_wait_tournament(state: AppState, path: Path<TournamentPath>, query: Query<WaitQuery>) -> HttpResponse {
    let mut subscription = match state.subscribe_tournament(path.id).await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };
    let mut view = TournamentView::new();
    if let Err(e) = view.reconcile(subscription.current().as_ref()) {
        return error_response(e);
    }
    let after = query.after.unwrap_or(0);
    let waited = tokio::time::timeout(WAIT_TIMEOUT, async {
        while view.version().is_some_and(|v| v <= after) {
            if !view.follow(&mut subscription).await? {
                break;
            }
        }
        Ok::<_, TournamentError>(())
    })
    .await;
    subscription.close();
    if let Ok(Err(e)) = waited {
        return error_response(e);
    }
    match (view.current(), view.version()) {
        (Some(t), Some(version)) => HttpResponse::Ok().json(serde_json::json!({ "version": version, "tournament": t })),
        _ => error_response(TournamentError::not_found("Tournament")),
    }
}

#[delete("/api/tournaments/{id}")]
async fn api_delete_tournament(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.delete_tournament(&p, path.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

#[post("/api/tournaments/{id}/join")]
async fn api_join_tournament(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.join_tournament(&p, path.id).await)
}

#[post("/api/tournaments/{id}/leave")]
async fn api_leave_tournament(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.leave_tournament(&p, path.id).await {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

/// Kick an entry (organizer only).
#[delete("/api/tournaments/{id}/players/{participant_id}")]
async fn api_kick_participant(state: AppState, session: Session, path: Path<ParticipantPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.kick_participant(&p, path.id, &path.participant_id).await)
}

/// Start the tournament (Setup -> InProgress) and generate the bracket.
#[post("/api/tournaments/{id}/start")]
async fn api_start_tournament(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.start_tournament(&p, path.id).await)
}

/// Declare the winner of one match (organizer only).
#[put("/api/tournaments/{id}/matches/{match_id}/winner")]
async fn api_set_match_winner(
    state: AppState,
    session: Session,
    path: Path<MatchPath>,
    body: Json<SetWinnerBody>,
) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(
        state
            .report_result(&p, path.id, path.match_id, &body.winner_id)
            .await,
    )
}

#[put("/api/tournaments/{id}/rules")]
async fn api_update_rules(
    state: AppState,
    session: Session,
    path: Path<TournamentPath>,
    body: Json<TournamentRules>,
) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.update_rules(&p, path.id, body.into_inner()).await)
}

/// Generate a shareable invite token (organizer only).
#[post("/api/tournaments/{id}/invite")]
async fn api_generate_invite(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.generate_invite(&p, path.id).await {
        Ok(token) => HttpResponse::Ok().json(serde_json::json!({ "token": token, "link": format!("/?invite={token}") })),
        Err(e) => error_response(e),
    }
}

#[get("/api/invites/{token}")]
async fn api_resolve_invite(state: AppState, token: Path<String>) -> HttpResponse {
    respond(state.resolve_invite(&token).await)
}

#[post("/api/invites/{token}/join")]
async fn api_join_by_invite(state: AppState, session: Session, token: Path<String>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.join_by_invite(&p, &token).await)
}

/// The caller's team in a team-mode tournament.
#[get("/api/tournaments/{id}/team")]
async fn api_my_team(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let tournament = match state.get_tournament(path.id).await {
        Ok(t) => t.value,
        Err(e) => return error_response(e),
    };
    respond(state.team_of(&tournament, &p.account_id).await.map(|v| v.value))
}

#[get("/api/tournaments/{id}/team/candidates")]
async fn api_team_candidates(
    state: AppState,
    session: Session,
    path: Path<TournamentPath>,
    query: Query<SearchQuery>,
) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.invite_candidates(&p, path.id, &query.q).await)
}

#[post("/api/tournaments/{id}/team/members")]
async fn api_invite_member(
    state: AppState,
    session: Session,
    path: Path<TournamentPath>,
    body: Json<InviteMemberBody>,
) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.invite_member(&p, path.id, &body.uid).await)
}

#[delete("/api/tournaments/{id}/team/members/{uid}")]
async fn api_remove_member(state: AppState, session: Session, path: Path<MemberPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    respond(state.remove_member(&p, path.id, &path.uid).await)
}

/// Leave the caller's team; a captain leaving disbands it.
#[post("/api/tournaments/{id}/team/leave")]
async fn api_leave_team(state: AppState, session: Session, path: Path<TournamentPath>) -> HttpResponse {
    let p = match principal(&session) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.leave_team(&p, path.id).await {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({ "outcome": format!("{:?}", outcome) })),
        Err(e) => error_response(e),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ServerConfig::from_env();
    let key = match &config.session_key {
        Some(bytes) => Key::from(bytes.as_slice()),
        None => {
            log::warn!("SESSION_KEY not set, using a random key; sessions end on restart");
            Key::generate()
        }
    };
    let (host, port) = config.bind_addr();
    log::info!("Starting server at http://{}:{}", host, port);

    let state = Data::new(TournamentService::new(MemoryStore::new()));

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(SessionMiddleware::new(CookieSessionStore::default(), key.clone()))
            .service(api_health)
            .service(api_sign_in)
            .service(api_sign_out)
            .service(api_create_profile)
            .service(api_get_profile)
            .service(api_search_users)
            .service(api_create_tournament)
            .service(api_list_tournaments)
            .service(api_wait_tournament)
            .service(api_get_tournament)
            .service(api_delete_tournament)
            .service(api_join_tournament)
            .service(api_leave_tournament)
            .service(api_kick_participant)
            .service(api_start_tournament)
            .service(api_set_match_winner)
            .service(api_update_rules)
            .service(api_generate_invite)
            .service(api_resolve_invite)
            .service(api_join_by_invite)
            .service(api_my_team)
            .service(api_team_candidates)
            .service(api_invite_member)
            .service(api_remove_member)
            .service(api_leave_team)
    })
    .bind((host, port))?
    .run()
    .await
}
