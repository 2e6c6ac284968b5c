use std::time::Duration;

use common::IngestMode;
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::*;

async fn mount_failing_events(app: &TestApp, fight_id: i32) {
    Mock::given(method("POST"))
        .and(path("/api/v2/client"))
        .and(body_string_contains("query FightEvents"))
        .and(body_partial_json(json!({ "variables": { "fightID": fight_id } })))
        .respond_with(ResponseTemplate::new(503))
        .with_priority(1)
        .mount(&app.wcl)
        .await;
}

mod trigger {
    use super::*;

    #[tokio::test]
    async fn accepts_report_code() {
        let app = TestApp::spawn().await;
        mount_standard_report(&app.wcl).await;

        let res = app.trigger(CODE).await;
        assert_eq!(res.body["report_code"], CODE);
        assert!(res.body["run_id"].as_i64().is_some());

        let run = app.wait_for_run(CODE).await;
        assert_eq!(run["status"], "Succeeded");
        assert_eq!(run["mode"], "best_effort");
        assert!(run["error"].is_null());
    }

    #[tokio::test]
    async fn accepts_report_url() {
        let app = TestApp::spawn().await;
        mount_standard_report(&app.wcl).await;

        let res = app
            .trigger(&format!("https://www.warcraftlogs.com/reports/{CODE}#fight=2"))
            .await;
        assert_eq!(res.body["report_code"], CODE);

        let run = app.wait_for_run(CODE).await;
        assert_eq!(run["status"], "Succeeded");
    }

    #[tokio::test]
    async fn rejects_invalid_identifier() {
        let app = TestApp::spawn().await;

        let res = app.post(routes::INGEST, &json!({ "report": "abc" })).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");

        let res = app
            .post(
                routes::INGEST,
                &json!({ "report": "https://www.warcraftlogs.com/reports/" }),
            )
            .await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn rejects_malformed_body() {
        let app = TestApp::spawn().await;

        let res = app.post(routes::INGEST, &json!({ "code": CODE })).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn rejects_concurrent_ingestion_of_same_report() {
        let app = TestApp::spawn().await;
        Mock::given(method("POST"))
            .and(path("/api/v2/client"))
            .and(body_string_contains("query ReportMeta"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "data": { "reportData": { "report": report_meta(&[1]) } }
                    }))
                    .set_delay(Duration::from_millis(800)),
            )
            .mount(&app.wcl)
            .await;
        mount_empty_events(&app.wcl).await;

        app.trigger(CODE).await;

        let res = app.post(routes::INGEST, &json!({ "report": CODE })).await;
        assert_eq!(res.status, 409);
        assert_eq!(res.body["code"], "CONFLICT");

        let res = app.delete(&routes::report(CODE)).await;
        assert_eq!(res.status, 409);

        let status = app.get(&routes::ingest_status(CODE)).await;
        assert_eq!(status.status, 200);
        assert!(status.body["phase"]["phase"].is_string());
        assert_eq!(status.body["last_run"]["status"], "Running");

        let run = app.wait_for_run(CODE).await;
        assert_eq!(run["status"], "Succeeded");

        // The claim is released once the run ends.
        app.trigger(CODE).await;
        app.wait_for_run(CODE).await;
    }
}

mod outcome {
    use super::*;

    #[tokio::test]
    async fn stores_report_fights_players_and_events() {
        let app = TestApp::spawn().await;
        mount_standard_report(&app.wcl).await;

        let run = app.ingest(CODE).await;
        let summary = &run["summary"];
        assert_eq!(summary["fights_total"], 2);
        assert_eq!(summary["fights_processed"], 2);
        assert_eq!(summary["events_stored"]["damage"], 6);
        assert_eq!(summary["events_stored"]["heal"], 4);
        assert_eq!(summary["events_stored"]["cast"], 0);
        assert_eq!(summary["cleared_previous"], false);
        assert_eq!(summary["fights_skipped"], json!([]));

        let report = app.get(&routes::report(CODE)).await;
        assert_eq!(report.status, 200);
        assert_eq!(report.body["code"], CODE);
        assert_eq!(report.body["title"], "Raid night");
        assert_eq!(report.body["complete"], true);
        assert_eq!(report.body["fights"].as_array().unwrap().len(), 2);
        assert_eq!(report.body["players"].as_array().unwrap().len(), 2);
        assert_eq!(report.body["event_counts"]["damage"], 6);
        assert_eq!(report.body["event_counts"]["heal"], 4);
    }

    #[tokio::test]
    async fn reingest_replaces_previous_copy() {
        let app = TestApp::spawn().await;
        mount_standard_report(&app.wcl).await;

        let first = app.ingest(CODE).await;
        let second = app.ingest(CODE).await;

        assert_ne!(first["id"], second["id"]);
        assert_eq!(second["summary"]["cleared_previous"], true);
        assert_eq!(
            first["summary"]["events_stored"],
            second["summary"]["events_stored"]
        );

        let list = app.get(routes::REPORTS).await;
        assert_eq!(list.body["pagination"]["total"], 1);

        let report = app.get(&routes::report(CODE)).await;
        assert_eq!(report.body["fights"].as_array().unwrap().len(), 2);
        assert_eq!(report.body["players"].as_array().unwrap().len(), 2);
        assert_eq!(report.body["event_counts"]["damage"], 6);
    }

    #[tokio::test]
    async fn failed_reingest_leaves_no_partial_report() {
        let app = TestApp::spawn().await;
        mount_standard_report(&app.wcl).await;
        app.ingest(CODE).await;

        app.wcl.reset().await;
        mount_token(&app.wcl).await;
        Mock::given(method("POST"))
            .and(path("/api/v2/client"))
            .and(body_string_contains("query ReportMeta"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": { "reportData": { "report": null } }
            })))
            .mount(&app.wcl)
            .await;

        let run = app.ingest(CODE).await;
        assert_eq!(run["status"], "Failed");
        assert!(run["error"].is_string());
        assert!(run["summary"].is_null());

        let report = app.get(&routes::report(CODE)).await;
        assert_eq!(report.status, 404);
    }

    #[tokio::test]
    async fn counts_skipped_and_malformed_events() {
        let app = TestApp::spawn().await;
        mount_meta(&app.wcl, report_meta(&[1])).await;
        mount_events(
            &app.wcl,
            1,
            "DamageDone",
            vec![
                json!({ "timestamp": 10_010, "type": "damage", "sourceID": 2,
                        "targetID": 40, "abilityGameID": 1329, "amount": 5000 }),
                // No amount.
                json!({ "timestamp": 10_020, "type": "damage", "sourceID": 2,
                        "targetID": 40, "abilityGameID": 1329 }),
                // Unknown source.
                json!({ "timestamp": 10_030, "type": "damage", "sourceID": 999,
                        "targetID": 40, "abilityGameID": 1329, "amount": 10 }),
                json!({ "timestamp": 10_040, "type": "absorbed", "sourceID": 1,
                        "targetID": 2, "abilityGameID": 17, "amount": 400 }),
            ],
        )
        .await;
        mount_empty_events(&app.wcl).await;

        let run = app.ingest(CODE).await;
        assert_eq!(run["status"], "Succeeded");
        let summary = &run["summary"];
        assert_eq!(summary["events_stored"]["damage"], 1);
        assert_eq!(summary["events_malformed"], 1);
        assert_eq!(summary["events_skipped"], 2);
        assert_eq!(summary["skip_reasons"]["unresolved_source"], 1);
        assert_eq!(summary["skip_reasons"]["unexpected_type"], 1);
    }
}

mod modes {
    use super::*;

    #[tokio::test]
    async fn best_effort_skips_failed_fight() {
        let app = TestApp::spawn().await;
        mount_failing_events(&app, 2).await;
        mount_standard_report(&app.wcl).await;

        let run = app.ingest(CODE).await;
        assert_eq!(run["status"], "Succeeded");
        let skipped = run["summary"]["fights_skipped"].as_array().unwrap();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0]["fight_id"], 2);
        assert_eq!(skipped[0]["name"], "Boss 2");

        let report = app.get(&routes::report(CODE)).await;
        assert_eq!(report.body["complete"], false);
        assert_eq!(report.body["fights"].as_array().unwrap().len(), 1);
        assert_eq!(report.body["fights"][0]["fight_id"], 1);
        assert_eq!(report.body["event_counts"]["damage"], 3);
    }

    #[tokio::test]
    async fn fail_fast_aborts_on_first_failed_fight() {
        let app = TestApp::spawn_with_mode(IngestMode::FailFast).await;
        mount_failing_events(&app, 2).await;
        mount_standard_report(&app.wcl).await;

        let run = app.ingest(CODE).await;
        assert_eq!(run["status"], "Failed");
        assert_eq!(run["mode"], "fail_fast");
        assert!(run["error"].as_str().unwrap().contains("Fight 2"));
    }

    #[tokio::test]
    async fn rejected_credentials_fail_the_run() {
        let app = TestApp::spawn().await;
        app.wcl.reset().await;
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&app.wcl)
            .await;
        mount_standard_report(&app.wcl).await;

        let run = app.ingest(CODE).await;
        assert_eq!(run["status"], "Failed");

        let report = app.get(&routes::report(CODE)).await;
        assert_eq!(report.status, 404);
    }
}
