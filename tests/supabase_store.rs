use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
};
use retos::{
    AttemptStore, ChallengeId, ChallengeSession, Grader, RhaiSynthesizer, StoreError,
    SupabaseStore, UserId, store::NewAttempt,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Tables and request log of the fake PostgREST server.
#[derive(Default)]
struct Tables {
    challenges:  Vec<Value>,
    submissions: Vec<Value>,
    headers:     Vec<HeaderMap>,
    ranking:     Vec<Value>,
    reject_as:   Option<StatusCode>,
}

type Shared = Arc<Mutex<Tables>>;

/// Whether `row[column]` satisfies a PostgREST `eq.` filter.
fn matches(row: &Value, column: &str, filter: Option<&String>) -> bool {
    let Some(wanted) = filter.and_then(|f| f.strip_prefix("eq.")) else {
        return true;
    };
    match &row[column] {
        Value::String(s) => s == wanted,
        other => other.to_string() == wanted,
    }
}

async fn challenges(
    State(tables): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let mut tables = tables.lock().unwrap();
    tables.headers.push(headers);
    Json(
        tables
            .challenges
            .iter()
            .filter(|row| matches(row, "id", params.get("id")))
            .cloned()
            .collect(),
    )
}

async fn list_submissions(
    State(tables): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Json<Vec<Value>> {
    let mut tables = tables.lock().unwrap();
    tables.headers.push(headers);
    let mut rows = tables
        .submissions
        .iter()
        .filter(|row| matches(row, "user_id", params.get("user_id")))
        .filter(|row| matches(row, "challenge_id", params.get("challenge_id")))
        .cloned()
        .collect::<Vec<_>>();
    if params.get("order").map(String::as_str) == Some("created_at.desc") {
        rows.reverse();
    }
    if let Some(limit) = params.get("limit").and_then(|l| l.parse().ok()) {
        rows.truncate(limit);
    }
    Json(rows)
}

async fn insert_submissions(
    State(tables): State<Shared>,
    headers: HeaderMap,
    Json(rows): Json<Vec<Value>>,
) -> (StatusCode, String) {
    let mut tables = tables.lock().unwrap();
    let prefer = headers.get("prefer").cloned();
    tables.headers.push(headers);
    if let Some(status) = tables.reject_as {
        return (status, r#"{"message":"JWT expired"}"#.to_string());
    }
    assert_eq!(prefer.as_ref().and_then(|v| v.to_str().ok()), Some("return=minimal"));

    for mut row in rows {
        let n = tables.submissions.len();
        row["id"] = json!(n + 1);
        row["created_at"] = json!(format!("2024-05-01T10:00:{n:02}"));
        tables.submissions.push(row);
    }
    (StatusCode::CREATED, String::new())
}

async fn get_ranking(State(tables): State<Shared>, headers: HeaderMap) -> Json<Vec<Value>> {
    let mut tables = tables.lock().unwrap();
    tables.headers.push(headers);
    Json(tables.ranking.clone())
}

/// Starts the fake server and returns its base URL with the shared tables.
async fn serve(tables: Tables) -> (String, Shared) {
    let shared = Arc::new(Mutex::new(tables));
    let app = Router::new()
        .route("/challenges", get(challenges))
        .route("/submissions", get(list_submissions).post(insert_submissions))
        .route("/rpc/get_ranking", post(get_ranking))
        .with_state(shared.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/"), shared)
}

fn sum_row() -> Value {
    json!({
        "id": 7,
        "titulo": "Suma",
        "descripcion": "Devuelve a + b",
        "lenguaje": "rhai",
        "codigo_base": "|a, b| a + b",
        "test_cases": [
            { "input": [1, 2], "output": 3 },
            { "input": [5, 7], "output": 12 }
        ]
    })
}

fn store(base: &str, token: Option<&str>) -> SupabaseStore {
    SupabaseStore::new(
        reqwest::Client::new(),
        base,
        "anon-key",
        token.map(str::to_string),
    )
}

#[tokio::test]
async fn fetches_challenges_by_id() {
    let (base, tables) = serve(Tables {
        challenges: vec![sum_row(), json!({ "id": 8, "titulo": "Vacío", "test_cases": null })],
        ..Default::default()
    })
    .await;
    let store = store(&base, None);

    let challenge = store.fetch_challenge(&ChallengeId::Int(7)).await.unwrap();
    assert_eq!(challenge.title, "Suma");
    assert_eq!(challenge.source_template, "|a, b| a + b");
    assert_eq!(challenge.test_cases.len(), 2);

    let empty = store.fetch_challenge(&ChallengeId::Int(8)).await.unwrap();
    assert!(empty.test_cases.is_empty());

    let missing = store.fetch_challenge(&ChallengeId::Int(9)).await.unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(ChallengeId::Int(9))));

    assert_eq!(store.list_challenges().await.unwrap().len(), 2);

    let tables = tables.lock().unwrap();
    assert_eq!(tables.headers[0]["apikey"], "anon-key");
    assert_eq!(tables.headers[0]["authorization"], "Bearer anon-key");
}

#[tokio::test]
async fn saved_attempts_come_back_newest_first() {
    let (base, tables) = serve(Tables::default()).await;
    let store = store(&base, Some("user-jwt"));
    let ana = UserId::new("ana");

    let attempts = [
        ("|a, b| a", "Case 1: ❌ Fail (expected 3, got 1)", false),
        ("|a, b| a + b", "Case 1: ✅ Pass", true),
    ];
    for (source, line, solved) in attempts {
        let attempt = NewAttempt::builder()
            .user_id(ana.clone())
            .challenge_id(ChallengeId::Int(7))
            .source(source)
            .lines(vec![line.to_string()])
            .solved(solved)
            .build();
        store.persist_attempt(&attempt).await.unwrap();
    }
    store
        .persist_attempt(
            &NewAttempt::builder()
                .user_id(UserId::new("leo"))
                .challenge_id(ChallengeId::Int(7))
                .source("|a, b| 0")
                .lines(vec!["Case 1: ❌ Fail (expected 3, got 0)".to_string()])
                .solved(false)
                .build(),
        )
        .await
        .unwrap();

    let latest = store
        .fetch_latest_attempt(&ana, &ChallengeId::Int(7))
        .await
        .unwrap()
        .expect("ana has attempts");
    assert_eq!(latest.source, "|a, b| a + b");
    assert!(latest.is_solved());

    let none = store
        .fetch_latest_attempt(&ana, &ChallengeId::Int(8))
        .await
        .unwrap();
    assert!(none.is_none());

    assert_eq!(store.list_attempts(Some(&ana)).await.unwrap().len(), 2);
    let everyone = store.list_attempts(None).await.unwrap();
    assert_eq!(everyone.len(), 3);
    assert_eq!(everyone[2].user_id, UserId::new("leo"));

    assert!(!store.list_attempts(Some(&ana)).await.unwrap()[0].is_solved());

    let tables = tables.lock().unwrap();
    let stored = &tables.submissions[0];
    assert_eq!(stored["codigo"], "|a, b| a");
    assert_eq!(stored["resultado"], json!(["Case 1: ❌ Fail (expected 3, got 1)"]));
    assert!(stored.get("solved").is_none());
    assert_eq!(tables.headers[0]["authorization"], "Bearer user-jwt");
}

#[tokio::test]
async fn refused_insert_is_rejected_with_status() {
    let (base, _tables) = serve(Tables {
        reject_as: Some(StatusCode::UNAUTHORIZED),
        ..Default::default()
    })
    .await;

    let attempt = NewAttempt::builder()
        .user_id(UserId::new("ana"))
        .challenge_id(ChallengeId::Int(7))
        .source("|a, b| a + b")
        .lines(vec![])
        .solved(true)
        .build();
    let err = store(&base, None).persist_attempt(&attempt).await.unwrap_err();

    match err {
        StoreError::Rejected { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("JWT expired"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_connectivity_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = store(&format!("http://{addr}"), None)
        .list_challenges()
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Connectivity(_)));
}

#[tokio::test]
async fn session_over_supabase_latches_after_a_solve() {
    let (base, tables) = serve(Tables {
        challenges: vec![sum_row()],
        ..Default::default()
    })
    .await;
    let grader = || Grader::new(RhaiSynthesizer::default());
    let user = UserId::new("ana");

    let mut session =
        ChallengeSession::load(store(&base, None), grader(), user.clone(), &ChallengeId::Int(7))
            .await
            .unwrap();
    session.edit("|a, b| a - b").unwrap();
    assert!(!session.run().await.unwrap().solved());
    session.edit("|a, b| a + b").unwrap();
    let result = session.run().await.unwrap();
    assert!(result.solved());
    assert!(result.warnings().is_empty());

    {
        let tables = tables.lock().unwrap();
        assert_eq!(tables.submissions.len(), 2);
        assert_eq!(tables.submissions[1]["resultado"][1], "Case 2: ✅ Pass");
        assert!(
            tables
                .submissions
                .iter()
                .all(|row| row.as_object().is_some_and(|o| !o.contains_key("solved")))
        );
    }

    let reopened = ChallengeSession::load(store(&base, None), grader(), user, &ChallengeId::Int(7))
        .await
        .unwrap();
    assert!(reopened.is_solved());
    assert_eq!(reopened.source(), "|a, b| a + b");
}

#[tokio::test]
async fn ranking_comes_from_the_database_function() {
    let (base, tables) = serve(Tables {
        submissions: vec![json!({
            "user_id": "ana",
            "challenge_id": 7,
            "codigo": "|a, b| a + b",
            "resultado": ["Case 1: ✅ Pass"]
        })],
        ranking: vec![
            json!({
                "user_id": "leo",
                "email": "leonora@example.com",
                "completados": 3,
                "ultimo_envio": "2024-05-02T09:00:00Z"
            }),
            json!({
                "user_id": "ana",
                "email": "ana@x.io",
                "completados": 1,
                "ultimo_envio": "2024-05-01T10:00:00Z"
            }),
        ],
        ..Default::default()
    })
    .await;

    let ranked = store(&base, Some("user-jwt")).fetch_ranking().await.unwrap();

    let names = ranked.iter().map(|e| e.display_name()).collect::<Vec<_>>();
    assert_eq!(names, vec!["leo***@example.com", "ana@x.io"]);
    assert_eq!(ranked[0].completed, 3);
    assert_eq!(ranked[0].last_solved_at.as_deref(), Some("2024-05-02T09:00:00Z"));
    assert_eq!(tables.lock().unwrap().headers[0]["authorization"], "Bearer user-jwt");
}
