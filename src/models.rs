use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::db::{Collection, Document};

macro_rules! document {
    ($ty:ty, $collection:expr) => {
        impl Document for $ty {
            const COLLECTION: Collection = $collection;

            fn id(&self) -> i64 {
                self.id
            }

            fn set_id(&mut self, id: i64) {
                self.id = id;
            }
        }
    };
}

/// Declares a lowercase string enum with `FromStr`/`Display` that agree with
/// its serde representation.
macro_rules! string_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        Err(format!("'{}' is not one of: {}", other, allowed.join(", ")))
                    }
                }
            }
        }
    };
}

string_enum!(JobStatus {
    Draft => "draft",
    Active => "active",
    Archived => "archived",
});

string_enum!(Stage {
    Applied => "applied",
    Screen => "screen",
    Tech => "tech",
    Offer => "offer",
    Hired => "hired",
    Rejected => "rejected",
});

string_enum!(QuestionType {
    SingleChoice => "single-choice",
    MultiChoice => "multi-choice",
    ShortText => "short-text",
    LongText => "long-text",
    Numeric => "numeric",
    File => "file",
});

impl QuestionType {
    pub fn has_choices(self) -> bool {
        matches!(self, QuestionType::SingleChoice | QuestionType::MultiChoice)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub status: JobStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub order: i64, // dense 1..N ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub job_id: Option<i64>, // weak reference, never validated
    pub stage: Stage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineMeta {
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEntry {
    pub id: i64,
    pub candidate_id: i64,
    pub timestamp: i64,
    pub from_stage: Option<Stage>, // None marks creation
    pub to_stage: Stage,
    pub meta: TimelineMeta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: i64,
    pub candidate_id: i64,
    pub text: String,
    #[serde(default)]
    pub mentions: Vec<String>,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

/// One assessment per job; its id is the job id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: i64,
    pub job_id: i64,
    pub title: String,
    pub sections: Vec<Section>,
    pub updated_at: i64,
}

impl Assessment {
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub job_id: i64,
    pub candidate_id: i64,
    pub answers: BTreeMap<String, Value>,
    pub submitted_at: i64,
}

document!(Job, Collection::Jobs);
document!(Candidate, Collection::Candidates);
document!(TimelineEntry, Collection::Timelines);
document!(Note, Collection::Notes);
document!(Assessment, Collection::Assessments);
document!(Submission, Collection::Submissions);

// --- Request payloads ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewJob {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

/// Fields of a job that `PATCH /jobs/:id` may change. `order` is only
/// changed through reorder.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JobPatch {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub status: Option<JobStatus>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub requirements: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub from_order: i64,
    pub to_order: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCandidate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub job_id: Option<i64>,
    pub stage: Option<Stage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CandidatePatch {
    pub stage: Option<Stage>,
    /// Outer `None`: field absent. `Some(None)`: explicit null, clears it.
    #[serde(default, deserialize_with = "present")]
    pub job_id: Option<Option<i64>>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNote {
    pub text: Option<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssessmentInput {
    pub title: Option<String>,
    pub sections: Option<Vec<Section>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionInput {
    pub candidate_id: Option<i64>,
    pub answers: Option<BTreeMap<String, Value>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enums_round_trip_through_text() {
        assert_eq!("screen".parse::<Stage>().unwrap(), Stage::Screen);
        assert_eq!(Stage::Hired.to_string(), "hired");
        assert_eq!(
            serde_json::to_value(QuestionType::MultiChoice).unwrap(),
            json!("multi-choice")
        );
        let err = "paused".parse::<JobStatus>().unwrap_err();
        assert!(err.contains("draft, active, archived"));
    }

    #[test]
    fn test_job_serializes_camel_case() {
        let job = Job {
            id: 1,
            title: "Backend Engineer".into(),
            slug: "backend-engineer".into(),
            status: JobStatus::Active,
            tags: vec!["rust".into()],
            order: 1,
            description: None,
            requirements: vec![],
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "active");
        assert_eq!(value["order"], 1);
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_candidate_patch_distinguishes_null_from_absent() {
        let absent: CandidatePatch = serde_json::from_value(json!({"stage": "tech"})).unwrap();
        assert_eq!(absent.job_id, None);

        let cleared: CandidatePatch = serde_json::from_value(json!({"jobId": null})).unwrap();
        assert_eq!(cleared.job_id, Some(None));

        let set: CandidatePatch = serde_json::from_value(json!({"jobId": 4})).unwrap();
        assert_eq!(set.job_id, Some(Some(4)));
    }

    #[test]
    fn test_patches_reject_unknown_fields() {
        assert!(serde_json::from_value::<JobPatch>(json!({"order": 3})).is_err());
        assert!(serde_json::from_value::<CandidatePatch>(json!({"name": "x"})).is_err());
    }
}
