use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::*;

const OTHER_CODES: [&str; 2] = ["ZzTop1234567890a", "QqRr9876543210bb"];

async fn mount_meta_for(app: &TestApp, code: &str) {
    let mut meta = report_meta(&[1]);
    meta["code"] = json!(code);
    Mock::given(method("POST"))
        .and(path("/api/v2/client"))
        .and(body_string_contains("query ReportMeta"))
        .and(body_partial_json(json!({ "variables": { "code": code } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "reportData": { "report": meta } }
        })))
        .mount(&app.wcl)
        .await;
}

async fn seeded_app() -> TestApp {
    let app = TestApp::spawn().await;
    mount_standard_report(&app.wcl).await;
    let run = app.ingest(CODE).await;
    assert_eq!(run["status"], "Succeeded");
    app
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let app = TestApp::spawn().await;

        let res = app.get(routes::REPORTS).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["data"], json!([]));
        assert_eq!(res.body["pagination"]["total"], 0);
    }

    #[tokio::test]
    async fn paginates_newest_first() {
        let app = TestApp::spawn().await;
        mount_empty_events(&app.wcl).await;
        for code in [CODE, OTHER_CODES[0], OTHER_CODES[1]] {
            mount_meta_for(&app, code).await;
            app.trigger(code).await;
            app.wait_for_run(code).await;
        }

        let res = app
            .get(&format!("{}?page=1&per_page=2", routes::REPORTS))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["pagination"]["total"], 3);
        assert_eq!(res.body["pagination"]["total_pages"], 2);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["code"], OTHER_CODES[1]);
        assert_eq!(data[1]["code"], OTHER_CODES[0]);

        let res = app
            .get(&format!("{}?page=2&per_page=2", routes::REPORTS))
            .await;
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["code"], CODE);
    }
}

mod detail {
    use super::*;

    #[tokio::test]
    async fn returns_fights_and_players() {
        let app = seeded_app().await;

        let res = app.get(&routes::report(CODE)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["owner"], "raidlead");
        assert_eq!(res.body["zone_name"], "Nerub-ar Palace");

        let fights = res.body["fights"].as_array().unwrap();
        assert_eq!(fights[0]["fight_id"], 1);
        assert_eq!(fights[0]["name"], "Boss 1");
        assert_eq!(fights[1]["kill"], true);

        let players = res.body["players"].as_array().unwrap();
        assert_eq!(players[0]["name"], "Healbot");
        assert_eq!(players[0]["class"], "Priest");
        assert_eq!(players[1]["name"], "Stabby");
    }

    #[tokio::test]
    async fn unknown_report_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::report(CODE)).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");

        let res = app.get(&routes::ingest_status(CODE)).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn invalid_code_is_rejected() {
        let app = TestApp::spawn().await;

        let res = app.get(&routes::report("not-a-code")).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }
}

mod events {
    use super::*;

    #[tokio::test]
    async fn merges_kinds_in_timestamp_order() {
        let app = seeded_app().await;

        let res = app.get(&routes::fight_events(CODE, 1)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["fight_id"], 1);
        assert_eq!(res.body["limit"], 100);

        let data = res.body["data"].as_array().unwrap();
        let timestamps: Vec<i64> = data
            .iter()
            .map(|e| e["timestamp"].as_i64().unwrap())
            .collect();
        assert_eq!(timestamps, vec![10_010, 10_015, 10_020, 10_025, 10_030]);
        let kinds: Vec<&str> = data.iter().map(|e| e["kind"].as_str().unwrap()).collect();
        assert_eq!(kinds, vec!["damage", "heal", "damage", "heal", "damage"]);
    }

    #[tokio::test]
    async fn resolves_actor_references() {
        let app = seeded_app().await;

        let res = app
            .get(&format!("{}?kinds=damage&limit=1", routes::fight_events(CODE, 1)))
            .await;
        let event = &res.body["data"][0];
        assert_eq!(event["amount"], 5000);
        assert_eq!(event["hit_type"], 2);
        assert_eq!(event["source"]["type"], "player");
        assert!(event["source"]["player_id"].is_i64());
        assert_eq!(event["target"]["type"], "npc");
        assert_eq!(event["target"]["npc_id"], 40);
        assert_eq!(event["target"]["name"], "Queen Ansurek");
        assert!(event.get("overheal").is_none());
    }

    #[tokio::test]
    async fn filters_by_kind() {
        let app = seeded_app().await;

        let res = app
            .get(&format!("{}?kinds=heal", routes::fight_events(CODE, 2)))
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["kinds"], json!(["heal"]));
        assert_eq!(res.body["totals"]["damage"], 3);
        assert_eq!(res.body["totals"]["heal"], 2);
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|e| e["kind"] == "heal"));
        assert_eq!(data[0]["overheal"], 1200);
    }

    #[tokio::test]
    async fn pages_with_skip_and_limit() {
        let app = seeded_app().await;

        let res = app
            .get(&format!("{}?skip=1&limit=2", routes::fight_events(CODE, 1)))
            .await;
        let data = res.body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["timestamp"], 10_015);
        assert_eq!(data[1]["timestamp"], 10_020);

        let res = app
            .get(&format!("{}?skip=10", routes::fight_events(CODE, 1)))
            .await;
        assert_eq!(res.body["data"], json!([]));
    }

    #[tokio::test]
    async fn rejects_bad_query() {
        let app = seeded_app().await;
        let base = routes::fight_events(CODE, 1);

        let res = app.get(&format!("{base}?kinds=damage,explosions")).await;
        assert_eq!(res.status, 400);

        let res = app.get(&format!("{base}?limit=0")).await;
        assert_eq!(res.status, 400);

        let res = app.get(&format!("{base}?limit=5000")).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn unknown_fight_is_not_found() {
        let app = seeded_app().await;

        let res = app.get(&routes::fight_events(CODE, 99)).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body["code"], "NOT_FOUND");
    }
}

mod deletion {
    use super::*;

    #[tokio::test]
    async fn deletes_stored_report() {
        let app = seeded_app().await;

        let res = app.delete(&routes::report(CODE)).await;
        assert_eq!(res.status, 204);

        let res = app.get(&routes::report(CODE)).await;
        assert_eq!(res.status, 404);

        let res = app.get(&routes::fight_events(CODE, 1)).await;
        assert_eq!(res.status, 404);

        // Run history outlives the report.
        let res = app.get(&routes::ingest_status(CODE)).await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn missing_report_is_not_found() {
        let app = TestApp::spawn().await;

        let res = app.delete(&routes::report(CODE)).await;
        assert_eq!(res.status, 404);
    }
}

mod docs {
    use super::*;

    #[tokio::test]
    async fn serves_openapi_document() {
        let app = TestApp::spawn().await;

        let res = app.get("/api-docs/openapi.json").await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body["info"]["title"], "Raidlog API");
        assert!(res.body["paths"]["/api/v1/reports/ingest"]["post"].is_object());
        assert!(
            res.body["paths"]["/api/v1/reports/{code}/fights/{fight_id}/events"]["get"]
                .is_object()
        );
    }
}
