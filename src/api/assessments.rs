use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::info;

use super::candidates;
use super::{ApiError, ApiRequest, ApiResponse};
use crate::db::Database;
use crate::models::{Assessment, AssessmentInput, Job, Section, Submission, SubmissionInput};

pub(super) fn get(db: &Database, job_id: i64) -> Result<ApiResponse, ApiError> {
    ApiResponse::ok(&find(db, job_id)?)
}

/// Full replace of the job's assessment. Nothing is written unless the whole
/// payload validates.
pub(super) fn put(db: &Database, job_id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: AssessmentInput = request.json()?;
    if db.get::<Job>(job_id)?.is_none() {
        return Err(ApiError::NotFound(format!("Job {job_id} not found")));
    }

    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Assessment title is required".into()))?;
    let sections = normalize_sections(input.sections.unwrap_or_default())?;

    let assessment = Assessment {
        id: job_id,
        job_id,
        title: title.to_string(),
        sections,
        updated_at: db.now_millis(),
    };
    db.put(&assessment)?;
    info!(job_id, questions = assessment.questions().count(), "saved assessment");
    ApiResponse::ok(&assessment)
}

pub(super) fn delete(db: &Database, job_id: i64) -> Result<ApiResponse, ApiError> {
    if !db.delete::<Assessment>(job_id)? {
        return Err(not_found(job_id));
    }
    info!(job_id, "deleted assessment");
    Ok(ApiResponse::no_content())
}

pub(super) fn submit(db: &Database, job_id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: SubmissionInput = request.json()?;
    let (Some(candidate_id), Some(answers)) = (input.candidate_id, input.answers) else {
        return Err(ApiError::Validation("candidateId and answers required".into()));
    };
    candidates::find(db, candidate_id)?;
    let assessment = find(db, job_id)?;

    let known: HashSet<&str> = assessment.questions().map(|q| q.id.as_str()).collect();
    if let Some(unknown) = answers.keys().find(|key| !known.contains(key.as_str())) {
        return Err(ApiError::Validation(format!("Unknown question id '{unknown}'")));
    }
    if let Some(missing) = assessment
        .questions()
        .filter(|q| q.required)
        .find(|q| answers.get(&q.id).is_none_or(is_blank))
    {
        return Err(ApiError::Validation(format!(
            "Question '{}' is required",
            missing.label
        )));
    }

    let mut submission = Submission {
        id: 0,
        job_id,
        candidate_id,
        answers,
        submitted_at: db.now_millis(),
    };
    submission.id = db.add(&submission)?;
    info!(job_id, candidate_id, submission_id = submission.id, "recorded submission");
    ApiResponse::created(&submission)
}

pub(super) fn submissions(db: &Database, job_id: i64) -> Result<ApiResponse, ApiError> {
    let mut items: Vec<Submission> = db.find_by("jobId", &job_id)?;
    items.sort_by_key(|s| (s.submitted_at, s.id));
    ApiResponse::ok(&json!({ "items": items }))
}

fn find(db: &Database, job_id: i64) -> Result<Assessment, ApiError> {
    db.get::<Assessment>(job_id)?.ok_or_else(|| not_found(job_id))
}

fn not_found(job_id: i64) -> ApiError {
    ApiError::NotFound(format!("Assessment for job {job_id} not found"))
}

/// Checks labels and choices, assigns `q-<section>-<question>` ids where
/// missing, and drops choices from non-choice questions.
fn normalize_sections(mut sections: Vec<Section>) -> Result<Vec<Section>, ApiError> {
    if sections.iter().all(|s| s.questions.is_empty()) {
        return Err(ApiError::Validation(
            "Invalid assessment payload: at least one question is required".into(),
        ));
    }

    let mut ids = HashSet::new();
    for (s, section) in sections.iter_mut().enumerate() {
        section.title = section.title.trim().to_string();
        for (q, question) in section.questions.iter_mut().enumerate() {
            question.label = question.label.trim().to_string();
            if question.label.is_empty() {
                return Err(ApiError::Validation(format!(
                    "All questions must have a label (section {}, question {})",
                    s + 1,
                    q + 1
                )));
            }

            question.id = question.id.trim().to_string();
            if question.id.is_empty() {
                question.id = format!("q-{}-{}", s + 1, q + 1);
            }
            if !ids.insert(question.id.clone()) {
                return Err(ApiError::Validation(format!(
                    "Duplicate question id '{}'",
                    question.id
                )));
            }

            if question.kind.has_choices() {
                question.choices = question
                    .choices
                    .iter()
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
                if question.choices.is_empty() {
                    return Err(ApiError::Validation(format!(
                        "Question '{}' needs at least one choice",
                        question.label
                    )));
                }
            } else {
                question.choices.clear();
            }
        }
    }
    Ok(sections)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{call, store};
    use crate::api::Method;
    use crate::models::QuestionType;

    fn job(db: &Database) -> i64 {
        let response = call(db, Method::Post, "/jobs", Some(json!({"title": "Backend Engineer"})));
        response.body["id"].as_i64().unwrap()
    }

    fn candidate(db: &Database) -> i64 {
        let response = call(
            db,
            Method::Post,
            "/candidates",
            Some(json!({"name": "Alice", "email": "a@x.com"})),
        );
        response.body["id"].as_i64().unwrap()
    }

    fn payload() -> Value {
        json!({
            "title": "Screening",
            "sections": [
                {
                    "title": "Basics",
                    "questions": [
                        {"label": "Years of Rust?", "type": "numeric", "required": true, "choices": ["ignored"]},
                        {"label": "Preferred stack", "type": "single-choice", "required": false, "choices": ["axum", " ", "actix"]}
                    ]
                },
                {
                    "title": "Deep dive",
                    "questions": [
                        {"id": "design", "label": "Design a cache", "type": "long-text", "required": true}
                    ]
                }
            ]
        })
    }

    fn put(db: &Database, job_id: i64, body: Value) -> ApiResponse {
        call(db, Method::Put, &format!("/assessments/{job_id}"), Some(body))
    }

    #[test]
    fn test_put_then_get() {
        let db = store();
        let job_id = job(&db);
        assert_eq!(call(&db, Method::Get, &format!("/assessments/{job_id}"), None).status, 404);

        let response = put(&db, job_id, payload());
        assert_eq!(response.status, 200);
        let saved: Assessment = serde_json::from_value(response.body).unwrap();
        assert_eq!(saved.id, job_id);
        let questions: Vec<_> = saved.questions().collect();
        assert_eq!(questions[0].id, "q-1-1");
        assert!(questions[0].choices.is_empty());
        assert_eq!(questions[1].kind, QuestionType::SingleChoice);
        assert_eq!(questions[1].choices, vec!["axum", "actix"]);
        assert_eq!(questions[2].id, "design");

        let response = call(&db, Method::Get, &format!("/assessments/{job_id}"), None);
        assert_eq!(response.status, 200);
        assert_eq!(response.body["title"], "Screening");
    }

    #[test]
    fn test_put_replaces_whole_assessment() {
        let db = store();
        let job_id = job(&db);
        put(&db, job_id, payload());
        let response = put(
            &db,
            job_id,
            json!({"title": "V2", "sections": [{"title": "Only", "questions": [{"label": "Why us?", "type": "short-text"}]}]}),
        );
        assert_eq!(response.status, 200);
        let saved = find(&db, job_id).unwrap();
        assert_eq!(saved.title, "V2");
        assert_eq!(saved.questions().count(), 1);
        assert_eq!(db.count::<Assessment>().unwrap(), 1);
    }

    #[test]
    fn test_empty_label_is_rejected_and_prior_kept() {
        let db = store();
        let job_id = job(&db);
        put(&db, job_id, payload());

        let mut bad = payload();
        bad["title"] = json!("Changed");
        bad["sections"][1]["questions"][0]["label"] = json!("  ");
        let response = put(&db, job_id, bad);
        assert_eq!(response.status, 400);
        assert_eq!(
            response.message(),
            Some("All questions must have a label (section 2, question 1)")
        );
        assert_eq!(find(&db, job_id).unwrap().title, "Screening");
    }

    #[test]
    fn test_put_validation() {
        let db = store();
        let job_id = job(&db);
        let cases = [
            json!({"sections": payload()["sections"].clone()}),
            json!({"title": "T"}),
            json!({"title": "T", "sections": [{"title": "Empty", "questions": []}]}),
            json!({"title": "T", "sections": [{"title": "S", "questions": [{"label": "Pick", "type": "multi-choice"}]}]}),
            json!({"title": "T", "sections": [{"title": "S", "questions": [
                {"id": "a", "label": "One", "type": "file"},
                {"id": "a", "label": "Two", "type": "file"}
            ]}]}),
            json!({"title": "T", "sections": [{"title": "S", "questions": [{"label": "Q", "type": "essay"}]}]}),
        ];
        for body in cases {
            let response = put(&db, job_id, body.clone());
            assert_eq!(response.status, 400, "{body}");
        }
        assert_eq!(db.count::<Assessment>().unwrap(), 0);

        assert_eq!(put(&db, 404, payload()).status, 404);
    }

    #[test]
    fn test_delete_assessment() {
        let db = store();
        let job_id = job(&db);
        put(&db, job_id, payload());
        let path = format!("/assessments/{job_id}");
        assert_eq!(call(&db, Method::Delete, &path, None).status, 204);
        assert_eq!(call(&db, Method::Delete, &path, None).status, 404);
    }

    #[test]
    fn test_submit_records_immutable_submission() {
        let db = store();
        let job_id = job(&db);
        let candidate_id = candidate(&db);
        put(&db, job_id, payload());

        let response = call(
            &db,
            Method::Post,
            &format!("/assessments/{job_id}/submit"),
            Some(json!({
                "candidateId": candidate_id,
                "answers": {"q-1-1": 4, "design": "Sharded LRU", "q-1-2": "axum"}
            })),
        );
        assert_eq!(response.status, 201, "{:?}", response.body);
        assert_eq!(response.body["jobId"], job_id);
        assert_eq!(response.body["answers"]["design"], "Sharded LRU");
        assert!(response.body["submittedAt"].as_i64().unwrap() > 0);

        let response = call(&db, Method::Get, &format!("/assessments/{job_id}/submissions"), None);
        assert_eq!(response.body["items"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_submit_validation() {
        let db = store();
        let job_id = job(&db);
        let candidate_id = candidate(&db);
        let submit = |body: Value| {
            call(&db, Method::Post, &format!("/assessments/{job_id}/submit"), Some(body))
        };

        // No assessment yet.
        let response = submit(json!({"candidateId": candidate_id, "answers": {}}));
        assert_eq!(response.status, 404);

        put(&db, job_id, payload());
        assert_eq!(submit(json!({"answers": {}})).status, 400);
        assert_eq!(submit(json!({"candidateId": candidate_id})).status, 400);
        assert_eq!(
            submit(json!({"candidateId": 999, "answers": {"q-1-1": 1, "design": "x"}})).status,
            404
        );

        let response = submit(json!({"candidateId": candidate_id, "answers": {"q-1-1": 1}}));
        assert_eq!(response.status, 400);
        assert_eq!(response.message(), Some("Question 'Design a cache' is required"));

        let response = submit(json!({"candidateId": candidate_id, "answers": {"q-1-1": 1, "design": "x", "bogus": 1}}));
        assert_eq!(response.status, 400);
        assert_eq!(response.message(), Some("Unknown question id 'bogus'"));

        let response = submit(json!({"candidateId": candidate_id, "answers": {"q-1-1": 1, "design": "  "}}));
        assert_eq!(response.status, 400);

        assert_eq!(db.count::<Submission>().unwrap(), 0);
    }
}
