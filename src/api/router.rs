use tracing::debug;

use super::request::{ApiRequest, ApiResponse, Method};
use super::{assessments, candidates, jobs, notes, ApiError};
use crate::db::Database;

/// Every endpoint the mock backend serves, with its path parameters parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ListJobs,
    CreateJob,
    GetJob(i64),
    PatchJob(i64),
    DeleteJob(i64),
    ReorderJob(i64),
    ListCandidates,
    CreateCandidate,
    GetCandidate(i64),
    PatchCandidate(i64),
    CandidateTimeline(i64),
    ListNotes(i64),
    AddNote(i64),
    GetAssessment(i64),
    PutAssessment(i64),
    DeleteAssessment(i64),
    SubmitAssessment(i64),
    ListSubmissions(i64),
}

impl Route {
    pub fn resolve(method: Method, path: &str) -> Result<Route, ApiError> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let route = match (method, segments.as_slice()) {
            (Method::Get, ["jobs"]) => Route::ListJobs,
            (Method::Post, ["jobs"]) => Route::CreateJob,
            (Method::Get, ["jobs", id]) => Route::GetJob(parse_id("job", id)?),
            (Method::Patch, ["jobs", id]) => Route::PatchJob(parse_id("job", id)?),
            (Method::Delete, ["jobs", id]) => Route::DeleteJob(parse_id("job", id)?),
            (Method::Patch, ["jobs", id, "reorder"]) => Route::ReorderJob(parse_id("job", id)?),
            (Method::Get, ["candidates"]) => Route::ListCandidates,
            (Method::Post, ["candidates"]) => Route::CreateCandidate,
            (Method::Get, ["candidates", id]) => Route::GetCandidate(parse_id("candidate", id)?),
            (Method::Patch, ["candidates", id]) => {
                Route::PatchCandidate(parse_id("candidate", id)?)
            }
            (Method::Get, ["candidates", id, "timeline"]) => {
                Route::CandidateTimeline(parse_id("candidate", id)?)
            }
            (Method::Get, ["candidates", id, "notes"]) => {
                Route::ListNotes(parse_id("candidate", id)?)
            }
            (Method::Post, ["candidates", id, "notes"]) => {
                Route::AddNote(parse_id("candidate", id)?)
            }
            (Method::Get, ["assessments", id]) => Route::GetAssessment(parse_id("job", id)?),
            (Method::Put, ["assessments", id]) => Route::PutAssessment(parse_id("job", id)?),
            (Method::Delete, ["assessments", id]) => {
                Route::DeleteAssessment(parse_id("job", id)?)
            }
            (Method::Post, ["assessments", id, "submit"]) => {
                Route::SubmitAssessment(parse_id("job", id)?)
            }
            (Method::Get, ["assessments", id, "submissions"]) => {
                Route::ListSubmissions(parse_id("job", id)?)
            }
            _ => return Err(ApiError::NotFound(format!("No route for {method} {path}"))),
        };
        Ok(route)
    }

    /// Short operation name used in logs and simulated failure messages.
    pub fn label(&self) -> &'static str {
        match self {
            Route::ListJobs => "list jobs",
            Route::CreateJob => "create job",
            Route::GetJob(_) => "get job",
            Route::PatchJob(_) => "patch job",
            Route::DeleteJob(_) => "delete job",
            Route::ReorderJob(_) => "reorder job",
            Route::ListCandidates => "list candidates",
            Route::CreateCandidate => "create candidate",
            Route::GetCandidate(_) => "get candidate",
            Route::PatchCandidate(_) => "patch candidate",
            Route::CandidateTimeline(_) => "candidate timeline",
            Route::ListNotes(_) => "list notes",
            Route::AddNote(_) => "add note",
            Route::GetAssessment(_) => "get assessment",
            Route::PutAssessment(_) => "save assessment",
            Route::DeleteAssessment(_) => "delete assessment",
            Route::SubmitAssessment(_) => "submit assessment",
            Route::ListSubmissions(_) => "list submissions",
        }
    }

    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Route::CreateJob
                | Route::PatchJob(_)
                | Route::DeleteJob(_)
                | Route::ReorderJob(_)
                | Route::CreateCandidate
                | Route::PatchCandidate(_)
                | Route::AddNote(_)
                | Route::PutAssessment(_)
                | Route::DeleteAssessment(_)
                | Route::SubmitAssessment(_)
        )
    }
}

/// Runs the handler for `route`. Mutating handlers run inside one store
/// transaction, so an error leaves the store exactly as it was.
pub fn dispatch(db: &Database, route: Route, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    debug!(route = route.label(), path = %request.path, "dispatching");
    if route.is_mutating() {
        db.atomically(|db| handle(db, route, request))
    } else {
        handle(db, route, request)
    }
}

fn handle(db: &Database, route: Route, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    match route {
        Route::ListJobs => jobs::list(db, request),
        Route::CreateJob => jobs::create(db, request),
        Route::GetJob(id) => jobs::get(db, id),
        Route::PatchJob(id) => jobs::patch(db, id, request),
        Route::DeleteJob(id) => jobs::delete(db, id),
        Route::ReorderJob(id) => jobs::reorder(db, id, request),
        Route::ListCandidates => candidates::list(db, request),
        Route::CreateCandidate => candidates::create(db, request),
        Route::GetCandidate(id) => candidates::get(db, id),
        Route::PatchCandidate(id) => candidates::patch(db, id, request),
        Route::CandidateTimeline(id) => candidates::timeline(db, id),
        Route::ListNotes(id) => notes::list(db, id),
        Route::AddNote(id) => notes::add(db, id, request),
        Route::GetAssessment(job_id) => assessments::get(db, job_id),
        Route::PutAssessment(job_id) => assessments::put(db, job_id, request),
        Route::DeleteAssessment(job_id) => assessments::delete(db, job_id),
        Route::SubmitAssessment(job_id) => assessments::submit(db, job_id, request),
        Route::ListSubmissions(job_id) => assessments::submissions(db, job_id),
    }
}

fn parse_id(kind: &str, raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::Validation(format!("Invalid {kind} id '{raw}'"))),
    }
}
