use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use tracing::info;

use super::{ApiError, ApiRequest, ApiResponse};
use crate::db::Database;
use crate::models::{Job, JobPatch, JobStatus, NewJob, ReorderRequest};
use crate::query::{self, ListQuery};

static NON_ALNUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Lowercases and collapses every run of non-alphanumerics into one `-`.
pub fn slugify(text: &str) -> String {
    NON_ALNUM
        .replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

pub(super) fn list(db: &Database, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let query = ListQuery::from_params::<Job>(&request.query)?;
    let status = match request.query.get("status").filter(|s| !s.is_empty()) {
        Some(raw) => Some(raw.parse::<JobStatus>().map_err(ApiError::Validation)?),
        None => None,
    };
    let page = query::run(db.all::<Job>()?, &query, |job| {
        status.is_none_or(|status| job.status == status)
    });
    ApiResponse::ok(&page)
}

pub(super) fn get(db: &Database, id: i64) -> Result<ApiResponse, ApiError> {
    let job = find(db, id)?;
    ApiResponse::ok(&job)
}

pub(super) fn create(db: &Database, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: NewJob = request.json()?;
    let title = input
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Title is required".into()))?;

    let mut base = input.slug.as_deref().map(slugify).unwrap_or_default();
    if base.is_empty() {
        base = slugify(title);
    }
    if base.is_empty() {
        base = "job".to_string();
    }
    let slug = unique_slug(db, &base)?;

    let order = db
        .all::<Job>()?
        .iter()
        .map(|job| job.order)
        .max()
        .map_or(1, |max| max + 1);

    let mut job = Job {
        id: 0,
        title: title.to_string(),
        slug,
        status: input.status.unwrap_or(JobStatus::Active),
        tags: clean_list(input.tags),
        order,
        description: input.description.filter(|d| !d.trim().is_empty()),
        requirements: clean_list(input.requirements),
    };
    job.id = db.add(&job)?;
    info!(job_id = job.id, slug = %job.slug, "created job");
    ApiResponse::created(&job)
}

pub(super) fn patch(db: &Database, id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let patch: JobPatch = request.json()?;
    let current = find(db, id)?;

    let title = match patch.title.as_deref().map(str::trim) {
        Some("") => return Err(ApiError::Validation("Title cannot be empty".into())),
        Some(title) => Some(title.to_string()),
        None => None,
    };

    let slug = match patch.slug.as_deref() {
        Some(raw) => {
            let slug = slugify(raw);
            if slug.is_empty() {
                return Err(ApiError::Validation("Slug cannot be empty".into()));
            }
            if slug != current.slug {
                let taken = db
                    .find_by::<Job>("slug", &slug)?
                    .iter()
                    .any(|other| other.id != id);
                if taken {
                    return Err(ApiError::Conflict("Slug must be unique".into()));
                }
            }
            Some(slug)
        }
        None => None,
    };

    let updated = db
        .update::<Job>(id, |job| {
            if let Some(title) = title {
                job.title = title;
            }
            if let Some(slug) = slug {
                job.slug = slug;
            }
            if let Some(status) = patch.status {
                job.status = status;
            }
            if let Some(tags) = patch.tags {
                job.tags = clean_list(tags);
            }
            if let Some(description) = patch.description {
                job.description = description.filter(|d| !d.trim().is_empty());
            }
            if let Some(requirements) = patch.requirements {
                job.requirements = clean_list(requirements);
            }
        })?
        .ok_or_else(|| not_found(id))?;
    ApiResponse::ok(&updated)
}

/// Moves a job to position `toOrder` and renumbers every job 1..N.
pub(super) fn reorder(db: &Database, id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let body: ReorderRequest = request.json()?;

    let mut jobs = ordered(db)?;
    let position = jobs
        .iter()
        .position(|job| job.id == id)
        .ok_or_else(|| not_found(id))?;
    let moving = jobs.remove(position);
    let target = body.to_order.saturating_sub(1).clamp(0, jobs.len() as i64) as usize;
    jobs.insert(target, moving);
    renumber(db, &jobs)?;

    info!(job_id = id, from = body.from_order, to = target + 1, "reordered job");
    ApiResponse::ok(&json!({
        "fromOrder": body.from_order,
        "toOrder": body.to_order,
    }))
}

pub(super) fn delete(db: &Database, id: i64) -> Result<ApiResponse, ApiError> {
    if !db.delete::<Job>(id)? {
        return Err(not_found(id));
    }
    renumber(db, &ordered(db)?)?;
    info!(job_id = id, "deleted job");
    Ok(ApiResponse::no_content())
}

fn find(db: &Database, id: i64) -> Result<Job, ApiError> {
    db.get::<Job>(id)?.ok_or_else(|| not_found(id))
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Job {id} not found"))
}

// Always a fresh read so a stale listing can never skew the ranking.
fn ordered(db: &Database) -> Result<Vec<Job>, ApiError> {
    let mut jobs = db.all::<Job>()?;
    jobs.sort_by_key(|job| (job.order, job.id));
    Ok(jobs)
}

fn renumber(db: &Database, jobs: &[Job]) -> Result<(), ApiError> {
    for (index, job) in jobs.iter().enumerate() {
        let order = index as i64 + 1;
        if job.order != order {
            db.update::<Job>(job.id, |job| job.order = order)?;
        }
    }
    Ok(())
}

fn unique_slug(db: &Database, base: &str) -> Result<String, ApiError> {
    let mut slug = base.to_string();
    let mut suffix = 0;
    while !db.find_by::<Job>("slug", &slug)?.is_empty() {
        suffix += 1;
        slug = format!("{base}-{suffix}");
    }
    Ok(slug)
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
