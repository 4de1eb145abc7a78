use serde_json::json;
use tracing::info;

use super::{ApiError, ApiRequest, ApiResponse};
use crate::db::Database;
use crate::models::{Candidate, CandidatePatch, NewCandidate, Stage, TimelineEntry, TimelineMeta};
use crate::query::{self, ListQuery};

pub(super) fn list(db: &Database, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let query = ListQuery::from_params::<Candidate>(&request.query)?;
    let stage = match request.query.get("stage").filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<Stage>().map_err(ApiError::Validation)?),
        None => None,
    };
    let page = query::run(db.all::<Candidate>()?, &query, |candidate| {
        stage.is_none_or(|stage| candidate.stage == stage)
    });
    ApiResponse::ok(&page)
}

pub(super) fn get(db: &Database, id: i64) -> Result<ApiResponse, ApiError> {
    ApiResponse::ok(&find(db, id)?)
}

/// Inserts the candidate and opens its timeline with a `null -> stage` entry.
pub(super) fn create(db: &Database, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: NewCandidate = request.json()?;
    let name = input.name.as_deref().map(str::trim).unwrap_or_default();
    let email = input.email.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || email.is_empty() {
        return Err(ApiError::Validation("Name and email required".into()));
    }
    if !email.contains('@') {
        return Err(ApiError::Validation(format!("'{email}' is not an email address")));
    }

    let mut candidate = Candidate {
        id: 0,
        name: name.to_string(),
        email: email.to_string(),
        job_id: input.job_id,
        stage: input.stage.unwrap_or(Stage::Applied),
    };
    candidate.id = db.add(&candidate)?;
    record_transition(db, candidate.id, None, candidate.stage, "Candidate created")?;

    info!(candidate_id = candidate.id, stage = %candidate.stage, "created candidate");
    ApiResponse::created(&candidate)
}

/// Applies a stage and/or job change. Only an actual stage change is written
/// to the timeline; a patch that changes nothing writes nothing.
pub(super) fn patch(db: &Database, id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let patch: CandidatePatch = request.json()?;
    let current = find(db, id)?;

    let new_stage = patch.stage.filter(|stage| *stage != current.stage);
    let new_job = patch.job_id.filter(|job_id| *job_id != current.job_id);
    if new_stage.is_none() && new_job.is_none() {
        return ApiResponse::ok(&current);
    }

    let updated = db
        .update::<Candidate>(id, |candidate| {
            if let Some(stage) = new_stage {
                candidate.stage = stage;
            }
            if let Some(job_id) = new_job {
                candidate.job_id = job_id;
            }
        })?
        .ok_or_else(|| not_found(id))?;

    if let Some(stage) = new_stage {
        let note = patch
            .note
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Stage changed");
        record_transition(db, id, Some(current.stage), stage, note)?;
        info!(candidate_id = id, from = %current.stage, to = %stage, "stage changed");
    }
    ApiResponse::ok(&updated)
}

pub(super) fn timeline(db: &Database, id: i64) -> Result<ApiResponse, ApiError> {
    find(db, id)?;
    let mut items: Vec<TimelineEntry> = db.find_by("candidateId", &id)?;
    items.sort_by_key(|entry| (entry.timestamp, entry.id));
    ApiResponse::ok(&json!({ "items": items }))
}

pub(super) fn find(db: &Database, id: i64) -> Result<Candidate, ApiError> {
    db.get::<Candidate>(id)?.ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Candidate {id} not found"))
}

fn record_transition(
    db: &Database,
    candidate_id: i64,
    from_stage: Option<Stage>,
    to_stage: Stage,
    note: &str,
) -> Result<TimelineEntry, ApiError> {
    let mut entry = TimelineEntry {
        id: 0,
        candidate_id,
        timestamp: db.now_millis(),
        from_stage,
        to_stage,
        meta: TimelineMeta {
            note: note.to_string(),
        },
    };
    entry.id = db.add(&entry)?;
    Ok(entry)
}
