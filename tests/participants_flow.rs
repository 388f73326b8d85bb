use std::time::Duration;

use chrono::NaiveDate;
use httptest::matchers::{all_of, contains, eq, json_decoded, request};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::{json, Value};
use tempfile::tempdir;

use crisma_admin::import::ImportPhase;
use crisma_admin::listing::{FixedAnswer, LoadState, Outcome};
use crisma_admin::models::{MaritalStatus, ParticipantForm};
use crisma_admin::participants::{ParticipantDetailPage, ParticipantsPage};
use crisma_admin::ApiClient;

const EXPORT: &str = "Timestamp\tName\tBirth\tEmail\tAddress\tPhone\tStatus\n\
    01/02/2024\tBruno Reis\t02/05/2008\tbruno@example.com\tRua 2\t556\tSolteiro/a\n\
    01/02/2024\tCarla Dias\t11/09/2007\tcarla@example.com\tRua 3\t557\tSolteiro/a\n\
    01/02/2024\tDavi Mota\t11/09/2007\t\tRua 4\t558\tSolteiro/a\n";

fn participant(id: i64, name: &str) -> Value {
    json!({
        "id": id,
        "full_name": name,
        "email": format!("{}@example.com", name.split(' ').next().unwrap_or("x").to_lowercase()),
        "phone_number": "555-0100",
        "address": "Rua 1",
        "birth_date": "2008-05-02",
        "marital_status": "Single",
        "creation_date": "2024-02-01T10:00:00Z",
        "current_group_id": null
    })
}

fn client(server: &Server) -> ApiClient {
    ApiClient::new(
        &server.url("/").to_string(),
        Some(SecretString::from("tok".to_string())),
        "crisma-admin-tests",
    )
    .expect("client")
}

fn expect_list(server: &Server, rows: Value) {
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/confirmands")
        ])
        .respond_with(json_encoded(rows)),
    );
}

fn names(page: &mut ParticipantsPage) -> Vec<String> {
    page.visible().iter().map(|p| p.full_name.clone()).collect()
}

#[tokio::test]
async fn created_participant_lands_in_sorted_position() {
    let server = Server::run();
    expect_list(
        &server,
        json!([participant(1, "Ana Lima"), participant(2, "Zoe Costa")]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/confirmands"),
            request::headers(contains(("authorization", "Bearer tok"))),
        ])
        .respond_with(status_code(201).body(participant(3, "Jane Doe").to_string())),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    assert_eq!(page.state(), &LoadState::Ready);

    let created = page
        .create(ParticipantForm {
            full_name: "  Jane Doe ".into(),
            email: "jane@example.com".into(),
            phone_number: "555-0103".into(),
            birth_date: NaiveDate::from_ymd_opt(2008, 5, 2).unwrap(),
            address: "Rua 9".into(),
            marital_status: MaritalStatus::Single,
            father_name: Some(" ".into()),
            mother_name: None,
            baptism_church: None,
            communion_church: None,
        })
        .await
        .expect("create");
    assert_eq!(created.id, 3);
    assert_eq!(names(&mut page), ["Ana Lima", "Jane Doe", "Zoe Costa"]);
    assert!(page.last_error().is_none());
}

#[tokio::test]
async fn invalid_form_is_rejected_without_a_request() {
    let server = Server::run();
    expect_list(&server, json!([participant(1, "Ana Lima")]));

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    let err = page
        .create(ParticipantForm {
            full_name: "Jane Doe".into(),
            email: "jane@example.com".into(),
            phone_number: "555-0103".into(),
            birth_date: NaiveDate::from_ymd_opt(2008, 5, 2).unwrap(),
            address: "   ".into(),
            marital_status: MaritalStatus::Single,
            father_name: None,
            mother_name: None,
            baptism_church: None,
            communion_church: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.display_message(), "Address is required.");
    assert_eq!(page.last_error(), Some("Address is required."));
    assert_eq!(page.list().len(), 1);
}

#[tokio::test]
async fn failed_delete_leaves_the_list_unchanged() {
    let server = Server::run();
    expect_list(
        &server,
        json!([participant(1, "Ana Lima"), participant(2, "Bruno Reis")]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("DELETE"),
            request::path("/api/confirmands/2")
        ])
        .respond_with(status_code(404).body("Not found")),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    let err = page.delete(2, &FixedAnswer(true)).await.unwrap_err();
    assert_eq!(err.display_message(), "Not found");
    assert_eq!(page.last_error(), Some("Not found"));
    assert_eq!(names(&mut page), ["Ana Lima", "Bruno Reis"]);
}

#[tokio::test]
async fn confirmed_delete_removes_and_declined_delete_sends_nothing() {
    let server = Server::run();
    expect_list(
        &server,
        json!([participant(1, "Ana Lima"), participant(2, "Bruno Reis")]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("DELETE"),
            request::path("/api/confirmands/1")
        ])
        .respond_with(status_code(204)),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    let outcome = page.delete(2, &FixedAnswer(false)).await.expect("cancel");
    assert_eq!(outcome, Outcome::Cancelled);
    assert_eq!(page.list().len(), 2);

    let outcome = page.delete(1, &FixedAnswer(true)).await.expect("delete");
    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(names(&mut page), ["Bruno Reis"]);
}

fn edit_form(name: &str) -> ParticipantForm {
    ParticipantForm {
        full_name: name.into(),
        email: "ana@example.com".into(),
        phone_number: "555-0100".into(),
        birth_date: NaiveDate::from_ymd_opt(2008, 5, 2).unwrap(),
        address: "Rua 1".into(),
        marital_status: MaritalStatus::Single,
        father_name: None,
        mother_name: None,
        baptism_church: None,
        communion_church: None,
    }
}

#[tokio::test]
async fn edited_participant_is_resorted() {
    let server = Server::run();
    expect_list(
        &server,
        json!([participant(1, "Ana Lima"), participant(2, "Bruno Reis")]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("PUT"),
            request::path("/api/confirmands/1"),
            request::headers(contains(("authorization", "Bearer tok"))),
        ])
        .respond_with(json_encoded(participant(1, "Zilda Lima"))),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    let updated = page.update(1, edit_form("Zilda Lima")).await.expect("update");
    assert_eq!(updated.id, 1);
    assert_eq!(names(&mut page), ["Bruno Reis", "Zilda Lima"]);
    assert_eq!(page.list().len(), 2);
    assert!(page.last_error().is_none());
}

#[tokio::test]
async fn rejected_or_empty_update_keeps_the_list() {
    let server = Server::run();
    expect_list(
        &server,
        json!([participant(1, "Ana Lima"), participant(2, "Bruno Reis")]),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("PUT"),
            request::path("/api/confirmands/1")
        ])
        .respond_with(
            status_code(422)
                .append_header("content-type", "application/json")
                .body(r#"{"error":"Email already registered"}"#),
        ),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("PUT"),
            request::path("/api/confirmands/2")
        ])
        .respond_with(status_code(200)),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    let err = page.update(1, edit_form("Zilda Lima")).await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert_eq!(page.last_error(), Some("Email already registered"));
    assert_eq!(names(&mut page), ["Ana Lima", "Bruno Reis"]);

    let err = page.update(2, edit_form("Ana Reis")).await.unwrap_err();
    assert_eq!(
        err.display_message(),
        "API returned a successful but empty response."
    );
    assert_eq!(
        page.last_error(),
        Some("API returned a successful but empty response.")
    );
    assert_eq!(names(&mut page), ["Ana Lima", "Bruno Reis"]);
}

#[tokio::test]
async fn search_filters_case_insensitively() {
    let server = Server::run();
    expect_list(
        &server,
        json!([
            participant(1, "Ana Lima"),
            participant(2, "Bruno Reis"),
            participant(3, "Mariana Alves")
        ]),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    page.search("ANA");
    assert_eq!(names(&mut page), ["Ana Lima", "Mariana Alves"]);
    page.search("");
    assert_eq!(page.visible().len(), 3);
}

#[tokio::test]
async fn load_failure_puts_the_page_in_error_state() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/confirmands")
        ])
        .respond_with(
            status_code(401)
                .append_header("content-type", "application/json")
                .body(r#"{"error":"Unauthenticated"}"#),
        ),
    );

    let page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    assert_eq!(page.state(), &LoadState::Error("Unauthenticated".into()));
    assert!(page.list().is_empty());
}

#[tokio::test]
async fn import_merges_new_records_once() {
    let server = Server::run();
    expect_list(&server, json!([participant(1, "Ana Lima")]));
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/confirmands/import"),
            request::headers(contains(("content-type", "text/plain; charset=utf-8"))),
        ])
        .respond_with(json_encoded(json!({
            "new_participants_imported": 2,
            "rows_skipped": 1,
            "imported_records": [
                participant(5, "Bruno Reis"),
                participant(6, "Carla Dias"),
                participant(1, "Ana Lima")
            ]
        }))),
    );

    let dir = tempdir().unwrap();
    let path = dir.path().join("export.tsv");
    std::fs::write(&path, EXPORT).unwrap();

    let mut page = ParticipantsPage::load(client(&server), Duration::from_millis(1500)).await;
    page.import_widget_mut()
        .select_path(&path)
        .await
        .expect("select file");
    assert_eq!(page.import_widget().phase(), ImportPhase::FileSelected);

    let outcome = page.import().await.expect("import");
    assert_eq!(outcome.new_participants_imported, 2);
    assert_eq!(outcome.rows_skipped, 1);
    assert_eq!(outcome.merged, 2);
    assert_eq!(
        outcome.message,
        "Import successful! 2 new participants added. 1 rows skipped."
    );
    assert_eq!(outcome.close_after, Duration::from_millis(1500));

    let widget = page.import_widget();
    assert_eq!(widget.phase(), ImportPhase::Idle);
    assert!(widget.file().is_none());
    assert_eq!(widget.success(), Some(outcome.message.as_str()));
    assert_eq!(names(&mut page), ["Ana Lima", "Bruno Reis", "Carla Dias"]);
}

#[tokio::test]
async fn rejected_import_keeps_the_file_for_a_retry() {
    let server = Server::run();
    expect_list(&server, json!([participant(1, "Ana Lima")]));
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/confirmands/import")
        ])
        .respond_with(
            status_code(400)
                .append_header("content-type", "application/json")
                .body(r#"{"error":"File is empty"}"#),
        ),
    );

    let mut page = ParticipantsPage::load(client(&server), Duration::from_secs(2)).await;
    page.import_widget_mut()
        .select("export.tsv", EXPORT.to_string())
        .expect("select");
    let err = page.import().await.unwrap_err();
    assert_eq!(err.display_message(), "File is empty");

    let widget = page.import_widget();
    assert_eq!(widget.phase(), ImportPhase::FileSelected);
    assert_eq!(widget.error(), Some("File is empty"));
    assert!(widget.file().is_some());
    assert_eq!(page.list().len(), 1);
}

fn expect_detail(server: &Server) {
    let mut details = participant(1, "Ana Lima");
    details["sacraments"] = json!([{ "id": 1, "name": "Baptism" }]);
    details["group_history"] = json!([
        { "id": 7, "module": 1, "start_date": "2024-03-02", "catechist_name": "Maria" }
    ]);
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/confirmands/1/details")
        ])
        .respond_with(json_encoded(details)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/sacraments")
        ])
        .respond_with(json_encoded(json!([
            { "id": 1, "name": "Baptism" },
            { "id": 2, "name": "First Communion" },
            { "id": 3, "name": "Confirmation" }
        ]))),
    );
}

fn completed(page: &ParticipantDetailPage) -> Vec<i64> {
    page.completed_ids().into_iter().collect()
}

#[tokio::test]
async fn failed_sacrament_toggle_leaves_the_checklist_unchanged() {
    let server = Server::run();
    expect_detail(&server);
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/confirmands/1/sacraments"),
            request::body(json_decoded(eq(json!({ "sacrament_id": 2 })))),
        ])
        .respond_with(
            status_code(500)
                .append_header("content-type", "application/json")
                .body(r#"{"error":"database unavailable"}"#),
        ),
    );

    let mut page = ParticipantDetailPage::load(client(&server), 1).await;
    assert_eq!(page.state(), &LoadState::Ready);
    assert_eq!(completed(&page), [1]);

    let err = page.toggle_sacrament(2, true).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert_eq!(completed(&page), [1]);
    assert_eq!(
        page.last_error(),
        Some("Error updating sacrament: database unavailable. Please refresh and try again.")
    );
}

#[tokio::test]
async fn sacrament_toggles_apply_after_the_server_confirms() {
    let server = Server::run();
    expect_detail(&server);
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/api/confirmands/1/sacraments")
        ])
        .respond_with(status_code(201)),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("DELETE"),
            request::path("/api/confirmands/1/sacraments/1")
        ])
        .respond_with(status_code(204)),
    );

    let mut page = ParticipantDetailPage::load(client(&server), 1).await;
    page.toggle_sacrament(3, true).await.expect("complete");
    page.toggle_sacrament(1, false).await.expect("uncomplete");
    assert_eq!(completed(&page), [3]);

    // Already in the requested state: nothing is sent.
    page.toggle_sacrament(3, true).await.expect("no-op");

    let checklist: Vec<(i64, bool)> = page
        .checklist()
        .into_iter()
        .map(|(s, done)| (s.id, done))
        .collect();
    assert_eq!(checklist, [(1, false), (2, false), (3, true)]);
    let history = &page.details().unwrap().group_history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].catechist_name.as_deref(), Some("Maria"));
}

#[tokio::test]
async fn detail_page_fails_when_either_request_fails() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/confirmands/1/details")
        ])
        .times(0..=1)
        .respond_with(json_encoded(participant(1, "Ana Lima"))),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/api/sacraments")
        ])
        .respond_with(status_code(503).body("Service unavailable")),
    );

    let page = ParticipantDetailPage::load(client(&server), 1).await;
    assert_eq!(page.state(), &LoadState::Error("Service unavailable".into()));
    assert!(page.details().is_none());
}
