#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use sqlx::SqlitePool;

    use crate::db::{get_edit_request, insert_edit_request};
    use crate::models::{EditRequestStatus, NewEditRequest};
    use crate::test::test_db::{TestDb, user_by_email};
    use crate::test::test_utils::{create_standard_test_db, login_test_user, setup_test_client};

    async fn post_form(client: &Client, uri: &str, body: String) -> (Status, Option<String>) {
        let response = client
            .post(uri.to_string())
            .header(ContentType::Form)
            .body(body)
            .dispatch()
            .await;
        let location = response.headers().get_one("Location").map(str::to_string);
        (response.status(), location)
    }

    async fn body_of(client: &Client, uri: &str) -> (Status, String) {
        let response = client.get(uri.to_string()).dispatch().await;
        let status = response.status();
        (status, response.into_string().await.unwrap_or_default())
    }

    async fn count(pool: &SqlitePool, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn assessment_form(child_id: i64, code: &str, score: i64) -> String {
        format!(
            "child_id={}&skill_code={}&score={}&is_prompted=false&assessment_date=2024-01-05&section=A",
            child_id, code, score
        )
    }

    async fn pending_request(test_db: &TestDb, code: &str, score: i64) -> i64 {
        insert_edit_request(
            &test_db.pool,
            &NewEditRequest {
                child_id: test_db.child_id("Ada"),
                therapist_id: test_db.user_id("therapist@example.com"),
                skill_code: code.to_string(),
                reason: "Wrong column".to_string(),
                requested_score: Some(score),
                requested_is_prompted: Some(false),
                requested_assessment_date: NaiveDate::from_ymd_opt(2024, 2, 2),
                requested_comment: None,
            },
        )
        .await
        .expect("Failed to insert edit request")
    }

    #[rocket::async_test]
    async fn test_index_and_health_are_public() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let (status, body) = body_of(&client, "/").await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("/auth/login"));

        let response = client.get("/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let json: serde_json::Value = response.into_json().await.expect("health returns JSON");
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], true);
    }

    #[rocket::async_test]
    async fn test_protected_pages_redirect_to_login() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        for uri in ["/dashboard", "/children", "/reports", "/admin/edit-requests"] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(response.status(), Status::SeeOther, "{} should redirect", uri);
            assert_eq!(response.headers().get_one("Location"), Some("/auth/login"));
        }
    }

    #[rocket::async_test]
    async fn test_role_restrictions_return_forbidden() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        login_test_user(&client, "parent@example.com").await;
        for uri in ["/children", "/assessments", "/requests", "/admin/edit-requests", "/history"] {
            let response = client.get(uri).dispatch().await;
            assert_eq!(response.status(), Status::Forbidden, "{} should be forbidden", uri);
        }

        let (status, _) = body_of(&client, "/progress").await;
        assert_eq!(status, Status::Ok);
    }

    #[rocket::async_test]
    async fn test_register_shows_inline_errors() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        let response = client
            .post("/auth/register")
            .header(ContentType::Form)
            .body("email=new%40example.com&full_name=New+Person&role=therapist&password=password123&password_confirm=password999")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("Passwords do not match."));
        assert!(body.contains("new@example.com"), "email should be echoed back");

        assert!(user_by_email(&test_db.pool, "new@example.com").await.is_none());
    }

    #[rocket::async_test]
    async fn test_register_duplicate_email() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/auth/register")
            .header(ContentType::Form)
            .body("email=Parent%40example.com&full_name=Copy&role=parent&password=password123&password_confirm=password123")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("already registered"));
    }

    #[rocket::async_test]
    async fn test_register_then_login() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        let (status, location) = post_form(
            &client,
            "/auth/register",
            "email=New%40Example.com&full_name=New+Parent&role=parent&password=password123&password_confirm=password123".to_string(),
        )
        .await;
        assert_eq!(status, Status::SeeOther);
        assert_eq!(location.as_deref(), Some("/auth/login"));

        let user = user_by_email(&test_db.pool, "new@example.com")
            .await
            .expect("registered user should exist");
        assert_eq!(user.full_name, "New Parent");

        login_test_user(&client, "new@example.com").await;
        let (status, body) = body_of(&client, "/dashboard").await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("New Parent"));
    }

    #[rocket::async_test]
    async fn test_login_with_wrong_password() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;

        let response = client
            .post("/auth/login")
            .header(ContentType::Form)
            .body("email=admin%40example.com&password=wrongpassword")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::BadRequest);
        let body = response.into_string().await.unwrap();
        assert!(body.contains("Invalid email or password."));
    }

    #[rocket::async_test]
    async fn test_logout_ends_session() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;

        login_test_user(&client, "admin@example.com").await;
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM user_sessions").await, 1);

        let response = client.post("/auth/logout").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM user_sessions").await, 0);

        let response = client.get("/dashboard").dispatch().await;
        assert_eq!(response.status(), Status::SeeOther);
    }

    #[rocket::async_test]
    async fn test_knowledge_base_filters_by_section() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        login_test_user(&client, "parent@example.com").await;

        let (status, body) = body_of(&client, "/knowledge-base?section=b").await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Objective B12"));
        assert!(!body.contains("Objective A2"));
        assert!(body.contains("2 of 4 skills"));

        let (_, body) = body_of(&client, "/knowledge-base?section=ALL").await;
        assert!(body.contains("Objective A2"));
        assert!(body.contains("4 of 4 skills"));
    }

    #[rocket::async_test]
    async fn test_first_assessment_is_recorded() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        login_test_user(&client, "therapist@example.com").await;

        let (status, location) =
            post_form(&client, "/assessments", assessment_form(ada, "a1", 2)).await;

        assert_eq!(status, Status::SeeOther);
        assert_eq!(
            location,
            Some(format!("/assessments?child_id={}&section=A", ada))
        );
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM assessments").await, 1);
        assert_eq!(
            count(
                &test_db.pool,
                "SELECT COUNT(*) FROM audit_logs WHERE action = 'record_assessment'"
            )
            .await,
            1
        );

        let (status, body) = body_of(&client, &location.unwrap()).await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Saved 2 for A1."));
    }

    #[rocket::async_test]
    async fn test_duplicate_assessment_redirects_to_edit_request() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        login_test_user(&client, "therapist@example.com").await;

        post_form(&client, "/assessments", assessment_form(ada, "A1", 1)).await;
        let (status, location) =
            post_form(&client, "/assessments", assessment_form(ada, "A1", 2)).await;

        assert_eq!(status, Status::SeeOther);
        let location = location.expect("redirect location");
        assert!(location.starts_with("/requests?"), "got {}", location);
        assert!(location.contains("skill_code=A1"));
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM assessments").await, 1);

        let (status, _) = body_of(&client, &location).await;
        assert_eq!(status, Status::Ok);
    }

    #[rocket::async_test]
    async fn test_assessment_rules_are_enforced() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        let ben = test_db.child_id("Ben");
        login_test_user(&client, "therapist@example.com").await;

        post_form(&client, "/assessments", assessment_form(ben, "A1", 1)).await;
        post_form(&client, "/assessments", assessment_form(ada, "A1", 3)).await;
        post_form(&client, "/assessments", assessment_form(ada, "Z9", 1)).await;
        post_form(
            &client,
            "/assessments",
            format!(
                "child_id={}&skill_code=A1&score=1&is_prompted=false&assessment_date=05/01/2024",
                ada
            ),
        )
        .await;

        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM assessments").await, 0);
    }

    #[rocket::async_test]
    async fn test_edit_request_submission() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        login_test_user(&client, "therapist@example.com").await;

        let request = format!(
            "child_id={}&skill_code=B1&reason=Miscounted&requested_score=3&requested_is_prompted=true&section=B",
            ada
        );

        post_form(&client, "/requests", request.clone()).await;
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM edit_requests").await, 0);

        post_form(
            &client,
            "/assessments",
            format!(
                "child_id={}&skill_code=B1&score=1&is_prompted=false&assessment_date=2024-01-05&section=B",
                ada
            ),
        )
        .await;

        let (status, location) = post_form(&client, "/requests", request.clone()).await;
        assert_eq!(status, Status::SeeOther);
        assert_eq!(
            location,
            Some(format!("/requests?child_id={}&section=B", ada))
        );
        assert_eq!(
            count(
                &test_db.pool,
                "SELECT COUNT(*) FROM edit_requests WHERE status = 'pending'"
            )
            .await,
            1
        );

        post_form(&client, "/requests", request).await;
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM edit_requests").await, 1);

        let (status, body) = body_of(&client, &format!("/requests?child_id={}", ada)).await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Miscounted"));
    }

    #[rocket::async_test]
    async fn test_approval_over_max_score_leaves_request_pending() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let request_id = pending_request(&test_db, "A1", 5).await;
        login_test_user(&client, "admin@example.com").await;

        let (status, location) = post_form(
            &client,
            &format!("/admin/edit-requests/{}/decision", request_id),
            "decision=approved".to_string(),
        )
        .await;

        assert_eq!(status, Status::SeeOther);
        assert_eq!(location.as_deref(), Some("/admin/edit-requests"));
        let request = get_edit_request(&test_db.pool, request_id).await.unwrap();
        assert_eq!(request.status, EditRequestStatus::Pending);
        assert_eq!(request.applied_assessment_id, None);
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM assessments").await, 0);
    }

    #[rocket::async_test]
    async fn test_approval_applies_request() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let request_id = pending_request(&test_db, "B12", 4).await;
        login_test_user(&client, "admin@example.com").await;

        let (status, body) = body_of(&client, "/admin/edit-requests").await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Wrong column"));

        let (status, _) = post_form(
            &client,
            &format!("/admin/edit-requests/{}/decision", request_id),
            "decision=approved&admin_comment=Confirmed".to_string(),
        )
        .await;
        assert_eq!(status, Status::SeeOther);

        let request = get_edit_request(&test_db.pool, request_id).await.unwrap();
        assert_eq!(request.status, EditRequestStatus::Approved);
        assert!(request.applied_assessment_id.is_some());
        assert_eq!(request.admin_comment.as_deref(), Some("Confirmed"));
        assert_eq!(
            count(&test_db.pool, "SELECT COUNT(*) FROM assessments WHERE score = 4").await,
            1
        );

        post_form(
            &client,
            &format!("/admin/edit-requests/{}/decision", request_id),
            "decision=rejected".to_string(),
        )
        .await;
        let request = get_edit_request(&test_db.pool, request_id).await.unwrap();
        assert_eq!(request.status, EditRequestStatus::Approved);
    }

    #[rocket::async_test]
    async fn test_therapist_cannot_review_requests() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let request_id = pending_request(&test_db, "A1", 1).await;
        login_test_user(&client, "therapist@example.com").await;

        let response = client
            .post(format!("/admin/edit-requests/{}/decision", request_id))
            .header(ContentType::Form)
            .body("decision=approved")
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Forbidden);
        let request = get_edit_request(&test_db.pool, request_id).await.unwrap();
        assert_eq!(request.status, EditRequestStatus::Pending);
    }

    #[rocket::async_test]
    async fn test_admin_manages_children() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ben = test_db.child_id("Ben");
        let other = test_db.user_id("other@example.com");
        let parent = test_db.user_id("parent@example.com");
        login_test_user(&client, "admin@example.com").await;

        let (status, _) = post_form(
            &client,
            "/children",
            "full_name=Cleo&birth_date=2019-04-01&notes=".to_string(),
        )
        .await;
        assert_eq!(status, Status::SeeOther);
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM children").await, 3);

        post_form(&client, "/children", "full_name=+++".to_string()).await;
        assert_eq!(count(&test_db.pool, "SELECT COUNT(*) FROM children").await, 3);

        let assign = format!("/children/{}/assign-therapist", ben);
        post_form(&client, &assign, format!("user_id={}", other)).await;
        post_form(&client, &assign, format!("user_id={}", other)).await;
        post_form(&client, &assign, format!("user_id={}", parent)).await;
        assert_eq!(
            count(
                &test_db.pool,
                "SELECT COUNT(*) FROM child_therapist_assignments"
            )
            .await,
            2
        );
        assert_eq!(
            count(
                &test_db.pool,
                "SELECT COUNT(*) FROM audit_logs WHERE action = 'assign_therapist'"
            )
            .await,
            1
        );

        let (status, body) = body_of(&client, "/children").await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Cleo"));
        assert!(body.contains("Olga Other"));
    }

    #[rocket::async_test]
    async fn test_report_pages_render() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        login_test_user(&client, "therapist@example.com").await;
        post_form(&client, "/assessments", assessment_form(ada, "A1", 2)).await;

        let (status, body) = body_of(&client, &format!("/reports?child_id={}", ada)).await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("Ada"));
        assert!(body.contains("2024-01-05"));

        let (status, body) = body_of(
            &client,
            &format!("/reports/skills-map?child_id={}&section=A", ada),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("level-mastered"));

        let (status, body) = body_of(
            &client,
            &format!("/reports?child_id={}&mode=prompted", ada),
        )
        .await;
        assert_eq!(status, Status::Ok);
        assert!(body.contains("No assessments match these filters."));
    }

    #[rocket::async_test]
    async fn test_pdf_export() {
        let test_db = create_standard_test_db().await;
        let (client, test_db) = setup_test_client(test_db).await;
        let ada = test_db.child_id("Ada");
        login_test_user(&client, "therapist@example.com").await;
        post_form(&client, "/assessments", assessment_form(ada, "A1", 1)).await;

        let response = client
            .get(format!("/reports/export?child_id={}", ada))
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.content_type(), Some(ContentType::PDF));
        let disposition = response
            .headers()
            .get_one("Content-Disposition")
            .expect("attachment header")
            .to_string();
        assert!(disposition.starts_with("attachment; filename=\"ablls_Ada_"));
        assert!(disposition.ends_with(".pdf\""));

        let bytes = response.into_bytes().await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[rocket::async_test]
    async fn test_export_without_children_redirects() {
        let test_db = create_standard_test_db().await;
        let (client, _) = setup_test_client(test_db).await;
        login_test_user(&client, "other@example.com").await;

        let response = client.get("/reports/export").dispatch().await;

        assert_eq!(response.status(), Status::SeeOther);
        assert_eq!(response.headers().get_one("Location"), Some("/reports"));
    }
}
