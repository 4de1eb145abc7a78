use serde_json::json;
use tracing::info;

use super::candidates;
use super::{ApiError, ApiRequest, ApiResponse};
use crate::db::Database;
use crate::models::{NewNote, Note};

pub(super) fn list(db: &Database, candidate_id: i64) -> Result<ApiResponse, ApiError> {
    candidates::find(db, candidate_id)?;
    let mut items: Vec<Note> = db.find_by("candidateId", &candidate_id)?;
    items.sort_by_key(|note| std::cmp::Reverse((note.timestamp, note.id)));
    ApiResponse::ok(&json!({ "items": items }))
}

pub(super) fn add(db: &Database, candidate_id: i64, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
    let input: NewNote = request.json()?;
    let text = input
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Note text required".into()))?;
    candidates::find(db, candidate_id)?;

    // Mentions are a set: trimmed, blanks dropped, first occurrence kept.
    let mut mentions: Vec<String> = Vec::new();
    for mention in input.mentions {
        let mention = mention.trim();
        if !mention.is_empty() && !mentions.iter().any(|m| m == mention) {
            mentions.push(mention.to_string());
        }
    }

    let mut note = Note {
        id: 0,
        candidate_id,
        text: text.to_string(),
        mentions,
        timestamp: db.now_millis(),
    };
    note.id = db.add(&note)?;
    info!(candidate_id, note_id = note.id, "added note");
    ApiResponse::created(&note)
}
