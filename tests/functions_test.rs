use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;

mod common;

use aipal_backend::db::store::Store;
use common::{body_json, create_test_app, json_request, token_for, Reply};

fn learning_path_args(skill_level: i64, milestone: &str) -> serde_json::Value {
    json!({
        "skill_level": skill_level,
        "strengths": ["reads loop bounds carefully"],
        "areas_for_improvement": ["off-by-one errors"],
        "recommended_topics": ["while loops", "iterators"],
        "next_milestone": milestone
    })
}

#[tokio::test]
async fn analyze_demo_returns_feedback() {
    let app = create_test_app(vec![Reply::Text("Looks tidy.".to_string())]);

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/analyze-demo",
            None,
            json!({ "inputType": "code", "inputContent": "for i in range(3): print(i)" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "feedback": "Looks tidy." }));

    let requests = app.completion.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].user.contains("Analyze this programming code"));
    assert!(requests[0].tool.is_none());
}

#[tokio::test]
async fn empty_submission_never_reaches_the_model() {
    let app = create_test_app(vec![Reply::Text("unused".to_string())]);
    let token = token_for("u1");

    for (uri, token) in [
        ("/functions/v1/analyze-demo", None),
        ("/functions/v1/analyze-input", Some(token.as_str())),
    ] {
        let response = app
            .send(json_request(
                "POST",
                uri,
                token,
                json!({ "inputType": "explanation", "inputContent": "   " }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }

    assert_eq!(app.completion.calls(), 0);
    assert_eq!(app.store.interaction_count(), 0);
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = create_test_app(vec![]);

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/functions/v1/analyze-demo")
                .header("content-type", "application/json")
                .body(Body::from("{\"inputType\": \"essay\""))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.completion.calls(), 0);
}

#[tokio::test]
async fn analyze_input_scores_and_stores_both_rows() {
    let app = create_test_app(vec![Reply::Text("Clarity: 80. Good start.".to_string())]);
    let token = token_for("student-1");

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/analyze-input",
            Some(&token),
            json!({
                "inputType": "code",
                "inputContent": "def f(): pass",
                "programmingLanguage": "Python"
            }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["clarityScore"], 80);
    assert_eq!(body["feedback"], "Clarity: 80. Good start.");

    let interaction_id = body["interactionId"].as_str().unwrap().to_string();
    let interactions = app.store.recent_interactions("student-1", 10).await.unwrap();
    assert_eq!(interactions.len(), 1);
    assert_eq!(interactions[0].id, interaction_id);
    assert_eq!(interactions[0].programming_language.as_deref(), Some("Python"));

    let analysis = app
        .store
        .find_analysis_for_interaction(&interaction_id)
        .await
        .unwrap()
        .expect("analysis row stored");
    assert_eq!(analysis.clarity_score, 80);
    assert_eq!(analysis.user_id, "student-1");
    assert_eq!(analysis.clarity_analysis, "Clarity: 80. Good start.");
    assert_eq!(analysis.adaptive_hint, "Review the fundamental concepts and try again.");

    let request = &app.completion.requests()[0];
    assert_eq!(request.temperature, Some(0.7));
    assert!(request.user.starts_with("Programming Language: Python"));
}

#[tokio::test]
async fn analyze_input_defaults_clarity_when_absent() {
    let app = create_test_app(vec![Reply::Text("Nice explanation overall.".to_string())]);
    let token = token_for("student-2");

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/analyze-input",
            Some(&token),
            json!({ "inputType": "explanation", "inputContent": "Recursion calls itself." }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["clarityScore"], 75);
}

#[tokio::test]
async fn analyze_input_requires_a_valid_token() {
    let app = create_test_app(vec![Reply::Text("unused".to_string())]);
    let body = json!({ "inputType": "code", "inputContent": "x = 1" });

    let response = app
        .send(json_request("POST", "/functions/v1/analyze-input", None, body.clone()))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "No authorization header");

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/analyze-input",
            Some("not-a-jwt"),
            body,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["error"], "Unauthorized");

    assert_eq!(app.completion.calls(), 0);
}

#[tokio::test]
async fn upstream_limits_map_to_distinct_statuses() {
    let cases = [
        (
            Reply::RateLimited,
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        ),
        (
            Reply::CreditsExhausted,
            StatusCode::PAYMENT_REQUIRED,
            "AI credits exhausted. Please add credits to your workspace.",
        ),
    ];

    for (reply, status, message) in cases {
        let app = create_test_app(vec![reply]);
        let response = app
            .send(json_request(
                "POST",
                "/functions/v1/analyze-demo",
                None,
                json!({ "inputType": "code", "inputContent": "x = 1" }),
            ))
            .await;

        assert_eq!(response.status(), status);
        assert_eq!(body_json(response).await["error"], message);
        assert_eq!(app.completion.calls(), 1);
    }
}

#[tokio::test]
async fn learning_path_regeneration_replaces_the_row() {
    let app = create_test_app(vec![
        Reply::Tool(learning_path_args(35, "Finish the loops quiz")),
        Reply::Tool(learning_path_args(70, "Write a nested loop")),
    ]);
    app.store.put_progress("s1", "loops", 30);

    for expected in [35, 70] {
        let response = app
            .send(json_request(
                "POST",
                "/functions/v1/generate-learning-path",
                None,
                json!({ "studentId": "s1", "topic": "loops" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["skill_level"], expected);
    }

    let paths = app.store.list_learning_paths("s1").await.unwrap();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].skill_level, 70);
    assert_eq!(paths[0].next_milestone, "Write a nested loop");

    let request = &app.completion.requests()[0];
    assert!(request.user.contains("Current skill level: 30%"));
    assert_eq!(request.tool.as_ref().map(|t| t.name), Some("create_learning_path"));
}

#[tokio::test]
async fn learning_path_requires_both_fields() {
    let app = create_test_app(vec![]);

    for body in [json!({ "studentId": "s1" }), json!({ "topic": "loops" }), json!({})] {
        let response = app
            .send(json_request(
                "POST",
                "/functions/v1/generate-learning-path",
                None,
                body,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Missing required fields");
    }
    assert_eq!(app.completion.calls(), 0);
}

#[tokio::test]
async fn learning_path_without_tool_call_fails_and_stores_nothing() {
    let app = create_test_app(vec![Reply::NoToolCall]);

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/generate-learning-path",
            None,
            json!({ "studentId": "s1", "topic": "loops" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.store.learning_path_count(), 0);
}

#[tokio::test]
async fn failed_analysis_write_is_reported_and_keeps_the_interaction() {
    let app = create_test_app(vec![Reply::Text("Clarity: 60".to_string())]);
    app.store.reject_analysis_writes();
    let token = token_for("student-3");

    let response = app
        .send(json_request(
            "POST",
            "/functions/v1/analyze-input",
            Some(&token),
            json!({ "inputType": "code", "inputContent": "x = 1" }),
        ))
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["error"], "Failed to store analysis");
    assert_eq!(app.completion.calls(), 1);
    assert_eq!(app.store.interaction_count(), 1);
}
