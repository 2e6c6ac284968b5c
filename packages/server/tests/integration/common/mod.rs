use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use common::{EventKind, IngestMode, RetryPolicy};
use reqwest::Client;
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use server::config::{
    AppConfig, CorsConfig, DatabaseConfig, IngestConfig, ServerConfig,
};
use server::ingest::{IngestOptions, IngestService, IngestionCoordinator};
use server::state::AppState;
use server::store::{ReportStore, SeaOrmReportStore};
use wcl::{ReportFetcher, WclConfig};

pub const CODE: &str = "AbC123xYz789QwEr";

pub mod routes {
    pub const INGEST: &str = "/api/v1/reports/ingest";
    pub const REPORTS: &str = "/api/v1/reports";

    pub fn report(code: &str) -> String {
        format!("/api/v1/reports/{code}")
    }

    pub fn ingest_status(code: &str) -> String {
        format!("/api/v1/reports/{code}/ingest")
    }

    pub fn fight_events(code: &str, fight_id: i32) -> String {
        format!("/api/v1/reports/{code}/fights/{fight_id}/events")
    }
}

/// A running test server backed by a mock provider and an in-memory database.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub db: DatabaseConnection,
    pub wcl: MockServer,
}

/// Parsed HTTP response for test assertions.
pub struct TestResponse {
    pub status: u16,
    /// Raw response body as text.
    pub text: String,
    /// Parsed JSON body, or `Null` if the response is not valid JSON.
    pub body: Value,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_mode(IngestMode::BestEffort).await
    }

    pub async fn spawn_with_mode(mode: IngestMode) -> Self {
        let wcl = MockServer::start().await;
        mount_token(&wcl).await;

        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            min_connections: 1,
        };
        let db = server::database::init_db(&database)
            .await
            .expect("Failed to initialize test database");

        let mut wcl_config = WclConfig::new("test-client", "test-secret");
        wcl_config.token_url = format!("{}/oauth/token", wcl.uri());
        wcl_config.api_url = format!("{}/api/v2/client", wcl.uri());
        wcl_config.request_timeout_secs = 5;
        wcl_config.retry = RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 10,
        };

        let app_config = AppConfig {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors: CorsConfig::default(),
            },
            database,
            wcl: wcl_config,
            ingest: IngestConfig {
                mode,
                fight_concurrency: 2,
                event_kinds: EventKind::ALL.to_vec(),
            },
        };

        let fetcher =
            ReportFetcher::from_config(&app_config.wcl).expect("Failed to build fetcher");
        let store: Arc<dyn ReportStore> = Arc::new(SeaOrmReportStore::new(db.clone()));
        let coordinator = IngestionCoordinator::new(
            Arc::new(fetcher),
            Arc::clone(&store),
            IngestOptions::from(&app_config.ingest),
        );
        let ingest = Arc::new(IngestService::new(db.clone(), coordinator, store));

        let state = AppState {
            db: db.clone(),
            config: app_config,
            ingest,
        };

        let app = server::build_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            client: Client::new(),
            db,
            wcl,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn post(&self, path: &str, body: &Value) -> TestResponse {
        let res = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to send POST request");

        TestResponse::from_response(res).await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to send GET request");

        TestResponse::from_response(res).await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        let res = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("Failed to send DELETE request");

        TestResponse::from_response(res).await
    }

    /// Trigger an ingestion and assert it was accepted.
    pub async fn trigger(&self, report: &str) -> TestResponse {
        let res = self.post(routes::INGEST, &json!({ "report": report })).await;
        assert_eq!(res.status, 202, "ingest failed: {}", res.text);
        res
    }

    /// Poll the status endpoint until no ingestion of `code` is in flight and
    /// return the last run record.
    pub async fn wait_for_run(&self, code: &str) -> Value {
        for _ in 0..200 {
            let res = self.get(&routes::ingest_status(code)).await;
            if res.status == 200
                && res.body["phase"].is_null()
                && res.body["last_run"]["status"] != "Running"
            {
                return res.body["last_run"].clone();
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("ingestion of {code} did not finish in time");
    }

    /// Trigger an ingestion and wait for its outcome.
    pub async fn ingest(&self, report: &str) -> Value {
        self.trigger(report).await;
        self.wait_for_run(CODE).await
    }
}

impl TestResponse {
    pub async fn from_response(res: reqwest::Response) -> Self {
        let status = res.status().as_u16();
        let text = res.text().await.unwrap_or_default();
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);
        Self { status, text, body }
    }
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "Bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

/// Report metadata with the given fight ids, two players and one boss.
pub fn report_meta(fights: &[i32]) -> Value {
    let fights: Vec<Value> = fights
        .iter()
        .map(|id| {
            json!({
                "id": id,
                "name": format!("Boss {id}"),
                "startTime": id * 10_000,
                "endTime": id * 10_000 + 5_000,
                "kill": id % 2 == 0,
                "difficulty": 5,
                "encounterID": 2900 + id
            })
        })
        .collect();

    json!({
        "code": CODE,
        "title": "Raid night",
        "owner": { "name": "raidlead" },
        "startTime": 1_700_000_000_000_i64,
        "endTime": 1_700_003_600_000_i64,
        "zone": { "id": 38, "name": "Nerub-ar Palace" },
        "fights": fights,
        "masterData": { "actors": [
            { "id": 1, "name": "Healbot", "type": "Player", "subType": "Priest",
              "server": "Draenor", "icon": "Priest-Holy" },
            { "id": 2, "name": "Stabby", "type": "Player", "subType": "Rogue",
              "server": "Draenor", "icon": "Rogue-Assassination" },
            { "id": 40, "name": "Queen Ansurek", "type": "NPC", "subType": "Boss" }
        ]}
    })
}

pub async fn mount_meta(server: &MockServer, meta: Value) {
    Mock::given(method("POST"))
        .and(path("/api/v2/client"))
        .and(body_string_contains("query ReportMeta"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "reportData": { "report": meta } }
        })))
        .mount(server)
        .await;
}

fn events_body(events: Vec<Value>, next: Option<i64>) -> Value {
    json!({
        "data": { "reportData": { "report": {
            "events": { "data": events, "nextPageTimestamp": next }
        } } }
    })
}

/// Single-page response for one fight and provider data type.
pub async fn mount_events(server: &MockServer, fight_id: i32, data_type: &str, events: Vec<Value>) {
    Mock::given(method("POST"))
        .and(path("/api/v2/client"))
        .and(body_string_contains("query FightEvents"))
        .and(body_partial_json(json!({
            "variables": { "fightID": fight_id, "dataType": data_type }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(events_body(events, None)))
        .mount(server)
        .await;
}

/// Empty pages for anything not mounted more specifically.
pub async fn mount_empty_events(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/client"))
        .and(body_string_contains("query FightEvents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(events_body(vec![], None)))
        .with_priority(10)
        .mount(server)
        .await;
}

/// Damage events from both players and the boss for one fight.
pub fn damage_events(fight_id: i32) -> Vec<Value> {
    let base = i64::from(fight_id) * 10_000;
    vec![
        json!({ "timestamp": base + 10, "type": "damage", "fight": fight_id,
                "sourceID": 2, "targetID": 40, "abilityGameID": 1329,
                "hitType": 2, "amount": 5000, "absorbed": 0, "overkill": 0 }),
        json!({ "timestamp": base + 20, "type": "damage", "fight": fight_id,
                "sourceID": 40, "targetID": 1, "abilityGameID": 437417,
                "amount": 120000, "mitigated": 3000 }),
        json!({ "timestamp": base + 30, "type": "damage", "fight": fight_id,
                "sourceID": 1, "targetID": 40, "abilityGameID": 589, "amount": 800 }),
    ]
}

pub fn heal_events(fight_id: i32) -> Vec<Value> {
    let base = i64::from(fight_id) * 10_000;
    vec![
        json!({ "timestamp": base + 15, "type": "heal", "fight": fight_id,
                "sourceID": 1, "targetID": 2, "abilityGameID": 2061,
                "amount": 30000, "overheal": 1200 }),
        json!({ "timestamp": base + 25, "type": "heal", "fight": fight_id,
                "sourceID": 1, "targetID": 1, "abilityGameID": 2061, "amount": 15000 }),
    ]
}

/// A standard two-fight report with damage and healing in every fight.
pub async fn mount_standard_report(server: &MockServer) {
    mount_meta(server, report_meta(&[1, 2])).await;
    for fight in [1, 2] {
        mount_events(server, fight, "DamageDone", damage_events(fight)).await;
        mount_events(server, fight, "Healing", heal_events(fight)).await;
    }
    mount_empty_events(server).await;
}
