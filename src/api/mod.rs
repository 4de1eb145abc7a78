//! The simulated backend: network middleware in front of a router whose
//! handlers read and write the document store.

mod assessments;
mod candidates;
mod error;
pub mod jobs;
pub mod network;
mod notes;
pub mod request;
pub mod router;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::seed;
use network::NetworkPolicy;
use router::Route;

pub use error::ApiError;
pub use request::{ApiRequest, ApiResponse, Method};

/// Handle to the mock backend. Cloning shares the same store.
#[derive(Clone)]
pub struct Api {
    db: Arc<Mutex<Database>>,
    network: Arc<dyn NetworkPolicy>,
}

impl Api {
    /// Creates the collections if needed. Does not seed.
    pub fn new(db: Database, network: Arc<dyn NetworkPolicy>) -> Result<Self> {
        db.init()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            network,
        })
    }

    /// Creates the collections and seeds them on first run.
    pub fn start(db: Database, network: Arc<dyn NetworkPolicy>) -> Result<Self> {
        db.init()?;
        if seed::seed_if_empty(&db)? {
            info!("seeded empty store");
        }
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            network,
        })
    }

    /// Serves one request. Latency and failure injection happen first; the
    /// handler then holds the store for its whole read-modify-write sequence.
    pub async fn handle(&self, request: ApiRequest) -> ApiResponse {
        let route = match Route::resolve(request.method, &request.path) {
            Ok(route) => route,
            Err(err) => return err.into_response(),
        };
        if let Err(err) = network::simulate(self.network.as_ref(), &route).await {
            if err.is_retryable() {
                warn!(route = route.label(), "{err}");
            }
            return err.into_response();
        }

        let db = self.db.lock().await;
        let response = match router::dispatch(&db, route, &request) {
            Ok(response) => response,
            Err(err) => err.into_response(),
        };
        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "handled request"
        );
        response
    }

    pub async fn close(self) -> Result<()> {
        let db = Arc::try_unwrap(self.db)
            .map_err(|_| anyhow!("Store is still shared by another handle"))?
            .into_inner();
        db.close()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::Value;

    pub fn store() -> Database {
        let db = Database::in_memory().unwrap();
        db.init().unwrap();
        db
    }

    /// Routes and dispatches without the network simulation.
    pub fn call(db: &Database, method: Method, target: &str, body: Option<Value>) -> ApiResponse {
        let mut request = ApiRequest::new(method, target);
        request.body = body;
        Route::resolve(request.method, &request.path)
            .and_then(|route| router::dispatch(db, route, &request))
            .unwrap_or_else(ApiError::into_response)
    }
}

#[cfg(test)]
mod tests {
    use super::network::{Reliable, SimulatedNetwork, Unreliable};
    use super::*;
    use crate::models::{Candidate, Job, Stage, TimelineEntry};
    use serde_json::{json, Value};

    fn api() -> Api {
        Api::new(Database::in_memory().unwrap(), Arc::new(Reliable)).unwrap()
    }

    async fn create_job(api: &Api, title: &str) -> Job {
        let response = api.handle(ApiRequest::post("/jobs", json!({ "title": title }))).await;
        assert_eq!(response.status, 201, "{:?}", response.body);
        serde_json::from_value(response.body).unwrap()
    }

    async fn list_jobs(api: &Api) -> Vec<Job> {
        let response = api.handle(ApiRequest::get("/jobs?pageSize=1000")).await;
        serde_json::from_value(response.body["items"].clone()).unwrap()
    }

    #[tokio::test]
    async fn test_create_job_scenario() {
        let api = api();
        let first = create_job(&api, "Backend Engineer").await;
        assert_eq!(first.slug, "backend-engineer");
        assert_eq!(first.order, 1);

        let second = create_job(&api, "Backend Engineer").await;
        assert_eq!(second.slug, "backend-engineer-1");
        assert_eq!(second.order, 2);
    }

    #[tokio::test]
    async fn test_create_candidate_scenario() {
        let api = api();
        let response = api
            .handle(ApiRequest::post(
                "/candidates",
                json!({"name": "Alice", "email": "a@x.com"}),
            ))
            .await;
        assert_eq!(response.status, 201);
        let alice: Candidate = serde_json::from_value(response.body).unwrap();
        assert_eq!(alice.stage, Stage::Applied);

        let response = api
            .handle(ApiRequest::get(&format!("/candidates/{}/timeline", alice.id)))
            .await;
        let items: Vec<TimelineEntry> =
            serde_json::from_value(response.body["items"].clone()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].from_stage, None);
        assert_eq!(items[0].to_stage, Stage::Applied);
    }

    #[tokio::test]
    async fn test_reorder_scenario() {
        let api = api();
        let a = create_job(&api, "A").await;
        let c = create_job(&api, "C").await;
        let b = create_job(&api, "B").await;
        assert_eq!(b.order, 3);

        let response = api
            .handle(ApiRequest::patch(
                &format!("/jobs/{}/reorder", b.id),
                json!({"fromOrder": 3, "toOrder": 1}),
            ))
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"fromOrder": 3, "toOrder": 1}));

        let jobs = list_jobs(&api).await;
        let ids: Vec<i64> = jobs.iter().map(|j| j.id).collect();
        let orders: Vec<i64> = jobs.iter().map(|j| j.order).collect();
        assert_eq!(ids, vec![b.id, a.id, c.id]);
        assert_eq!(orders, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_simulated_failure_has_no_side_effect() {
        let db = Database::in_memory().unwrap();
        let api = Api::new(db, Arc::new(Unreliable)).unwrap();

        let response = api.handle(ApiRequest::post("/jobs", json!({"title": "X"}))).await;
        assert_eq!(response.status, 500);
        assert_eq!(response.message(), Some("Simulated server error (create job)"));

        let response = api.handle(ApiRequest::get("/jobs")).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["total"], 0);
    }

    #[tokio::test]
    async fn test_failed_handler_does_not_partially_apply() {
        let api = api();
        create_job(&api, "A").await;
        let b = create_job(&api, "B").await;

        // Title passes, slug collides: nothing of the patch may land.
        let response = api
            .handle(ApiRequest::patch(
                &format!("/jobs/{}", b.id),
                json!({"title": "Renamed", "slug": "a"}),
            ))
            .await;
        assert_eq!(response.status, 400);

        let response = api.handle(ApiRequest::get(&format!("/jobs/{}", b.id))).await;
        assert_eq!(response.body["title"], "B");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let api = api();
        let response = api.handle(ApiRequest::get("/nope")).await;
        assert_eq!(response.status, 404);
        assert_eq!(response.message(), Some("No route for GET /nope"));
    }

    #[tokio::test]
    async fn test_concurrent_reorders_keep_dense_ordering() {
        let api = Api::new(
            Database::in_memory().unwrap(),
            Arc::new(SimulatedNetwork::new(0, 5, 0.0)),
        )
        .unwrap();
        let mut ids = Vec::new();
        for n in 0..8 {
            ids.push(create_job(&api, &format!("Job {n}")).await.id);
        }

        let mut tasks = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let api = api.clone();
            let id = *id;
            let to = ((i * 5) % 8 + 1) as i64;
            tasks.push(tokio::spawn(async move {
                api.handle(ApiRequest::patch(
                    &format!("/jobs/{id}/reorder"),
                    json!({"fromOrder": i + 1, "toOrder": to}),
                ))
                .await
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().status, 200);
        }

        let mut orders: Vec<i64> = list_jobs(&api).await.iter().map(|j| j.order).collect();
        orders.sort_unstable();
        assert_eq!(orders, (1..=8).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_start_seeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hiretrack.db");

        let api = Api::start(Database::open(&path).unwrap(), Arc::new(Reliable)).unwrap();
        let first: Value = api.handle(ApiRequest::get("/jobs")).await.body;
        let seeded_total = first["total"].as_u64().unwrap();
        assert!(seeded_total > 0);
        api.close().await.unwrap();

        let api = Api::start(Database::open(&path).unwrap(), Arc::new(Reliable)).unwrap();
        let again: Value = api.handle(ApiRequest::get("/jobs")).await.body;
        assert_eq!(again["total"].as_u64().unwrap(), seeded_total);
        api.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_refuses_while_shared() {
        let api = api();
        let other = api.clone();
        assert!(api.close().await.is_err());
        drop(other);
    }
}
