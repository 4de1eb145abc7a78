//! First-run dataset. Everything is derived from a fixed RNG seed so two fresh
//! stores always start out identical.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::api::jobs::slugify;
use crate::db::Database;
use crate::models::{
    Assessment, Candidate, Job, JobStatus, Note, Question, QuestionType, Section, Stage,
    Submission, TimelineEntry, TimelineMeta,
};

const SEED: u64 = 0x5eed;
const CANDIDATES: usize = 200;
const ASSESSED_JOBS: usize = 3;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

const JOB_TITLES: [&str; 25] = [
    "Backend Engineer",
    "Frontend Engineer",
    "Full Stack Developer",
    "Data Engineer",
    "Data Scientist",
    "Machine Learning Engineer",
    "DevOps Engineer",
    "Site Reliability Engineer",
    "Security Engineer",
    "Mobile Developer",
    "QA Engineer",
    "Product Manager",
    "Product Designer",
    "UX Researcher",
    "Engineering Manager",
    "Technical Writer",
    "Solutions Architect",
    "Support Engineer",
    "Database Administrator",
    "Platform Engineer",
    "Embedded Systems Engineer",
    "Cloud Architect",
    "Analytics Engineer",
    "Developer Advocate",
    "Release Manager",
];

const TAGS: [&str; 12] = [
    "remote", "onsite", "hybrid", "senior", "junior", "rust", "typescript", "python", "go",
    "kubernetes", "design", "leadership",
];

const FIRST_NAMES: [&str; 20] = [
    "Aarav", "Maya", "Liam", "Sofia", "Noah", "Priya", "Ethan", "Chloe", "Lucas", "Amara",
    "Mateo", "Hana", "Oliver", "Zara", "Ravi", "Elena", "Kai", "Nora", "Diego", "Ines",
];

const LAST_NAMES: [&str; 20] = [
    "Sharma", "Nguyen", "Garcia", "Kim", "Okafor", "Rossi", "Muller", "Tanaka", "Silva", "Cohen",
    "Patel", "Novak", "Haddad", "Larsen", "Moreau", "Ivanova", "Mensah", "Dubois", "Reyes", "Berg",
];

const TEAM: [&str; 5] = ["dana", "lee", "morgan", "sam", "tariq"];

const NOTE_TEXTS: [&str; 6] = [
    "Strong communication in the intro call.",
    "Portfolio looks solid, worth a deeper look.",
    "Asked about relocation support.",
    "Take-home submitted early.",
    "Salary expectations above band.",
    "Great culture add, follow up next week.",
];

// Stage path every candidate walks along; the end is either a hire or a
// rejection somewhere on the way.
const PIPELINE: [Stage; 5] = [Stage::Applied, Stage::Screen, Stage::Tech, Stage::Offer, Stage::Hired];

/// Fills every collection if the store has never been seeded. Returns whether
/// anything was written.
pub fn seed_if_empty(db: &Database) -> Result<bool> {
    if db.count::<Job>()? > 0 {
        return Ok(false);
    }
    db.atomically(populate)?;
    Ok(true)
}

fn populate(db: &Database) -> Result<()> {
    let mut rng = StdRng::seed_from_u64(SEED);
    let start = chrono::Utc::now().timestamp_millis() - 60 * DAY_MS;

    let job_ids = seed_jobs(db, &mut rng)?;
    let candidates = seed_candidates(db, &mut rng, &job_ids, start)?;
    seed_assessments(db, &mut rng, &job_ids[..ASSESSED_JOBS], &candidates, start)?;

    info!(
        jobs = job_ids.len(),
        candidates = candidates.len(),
        assessments = ASSESSED_JOBS,
        "seeded store"
    );
    Ok(())
}

fn seed_jobs(db: &Database, rng: &mut StdRng) -> Result<Vec<i64>> {
    let mut ids = Vec::with_capacity(JOB_TITLES.len());
    for (index, title) in JOB_TITLES.iter().enumerate() {
        let status = match rng.gen_range(0..10) {
            0 => JobStatus::Archived,
            1 | 2 => JobStatus::Draft,
            _ => JobStatus::Active,
        };
        let tag_count = rng.gen_range(1..=3);
        let tags: Vec<String> = TAGS
            .choose_multiple(rng, tag_count)
            .map(|t| t.to_string())
            .collect();
        let job = Job {
            id: 0,
            title: title.to_string(),
            slug: slugify(title),
            status,
            tags,
            order: index as i64 + 1,
            description: Some(format!("We are hiring a {title} to join the team.")),
            requirements: vec![
                format!("{} years of relevant experience", rng.gen_range(1..=8)),
                "Clear written communication".to_string(),
            ],
        };
        ids.push(db.add(&job)?);
    }
    Ok(ids)
}

fn seed_candidates(
    db: &Database,
    rng: &mut StdRng,
    job_ids: &[i64],
    start: i64,
) -> Result<Vec<Candidate>> {
    let mut candidates = Vec::with_capacity(CANDIDATES);
    for n in 0..CANDIDATES {
        let first = FIRST_NAMES[n % FIRST_NAMES.len()];
        let last = LAST_NAMES[(n / FIRST_NAMES.len() + n) % LAST_NAMES.len()];

        // Walk the pipeline some distance, maybe ending in a rejection.
        let reached = rng.gen_range(0..PIPELINE.len());
        let mut stages = PIPELINE[..=reached].to_vec();
        if reached < PIPELINE.len() - 1 && rng.gen_bool(0.2) {
            stages.push(Stage::Rejected);
        }
        let final_stage = *stages.last().unwrap_or(&Stage::Applied);

        let mut candidate = Candidate {
            id: 0,
            name: format!("{first} {last}"),
            email: format!(
                "{}.{}{}@example.com",
                first.to_lowercase(),
                last.to_lowercase(),
                n
            ),
            job_id: job_ids.choose(rng).copied(),
            stage: final_stage,
        };
        candidate.id = db.add(&candidate)?;

        let mut at = start + rng.gen_range(0..20 * DAY_MS);
        let mut from = None;
        for stage in stages {
            let note = if from.is_none() { "Candidate created" } else { "Stage changed" };
            db.add(&TimelineEntry {
                id: 0,
                candidate_id: candidate.id,
                timestamp: at,
                from_stage: from,
                to_stage: stage,
                meta: TimelineMeta {
                    note: note.to_string(),
                },
            })?;
            from = Some(stage);
            at += rng.gen_range(HOUR_MS..5 * DAY_MS);
        }

        if rng.gen_bool(0.3) {
            let mention_count = rng.gen_range(0..=2);
            db.add(&Note {
                id: 0,
                candidate_id: candidate.id,
                text: NOTE_TEXTS.choose(rng).copied().unwrap_or_default().to_string(),
                mentions: TEAM
                    .choose_multiple(rng, mention_count)
                    .map(|m| m.to_string())
                    .collect(),
                timestamp: at,
            })?;
        }
        candidates.push(candidate);
    }
    Ok(candidates)
}

fn seed_assessments(
    db: &Database,
    rng: &mut StdRng,
    job_ids: &[i64],
    candidates: &[Candidate],
    start: i64,
) -> Result<()> {
    for &job_id in job_ids {
        let assessment = assessment_for(db, job_id)?;
        db.put(&assessment)?;

        let takers = candidates.iter().filter(|c| {
            c.job_id == Some(job_id) && !matches!(c.stage, Stage::Applied | Stage::Screen)
        });
        for candidate in takers {
            let answers: BTreeMap<String, Value> = assessment
                .questions()
                .map(|q| (q.id.clone(), sample_answer(rng, q)))
                .collect();
            db.add(&Submission {
                id: 0,
                job_id,
                candidate_id: candidate.id,
                answers,
                submitted_at: start + rng.gen_range(20 * DAY_MS..40 * DAY_MS),
            })?;
        }
    }
    Ok(())
}

fn assessment_for(db: &Database, job_id: i64) -> Result<Assessment> {
    let title = db
        .get::<Job>(job_id)?
        .map(|job| format!("{} Assessment", job.title))
        .unwrap_or_else(|| "Assessment".to_string());

    let question = |id: &str, label: &str, kind: QuestionType, required: bool, choices: &[&str]| Question {
        id: id.to_string(),
        label: label.to_string(),
        kind,
        required,
        choices: choices.iter().map(|c| c.to_string()).collect(),
    };

    let sections = vec![
        Section {
            title: "Background".to_string(),
            questions: vec![
                question("q-1-1", "Years of professional experience", QuestionType::Numeric, true, &[]),
                question("q-1-2", "Highest level of education", QuestionType::SingleChoice, true, &["High school", "Bachelor", "Master", "PhD"]),
                question("q-1-3", "Languages you are fluent in", QuestionType::MultiChoice, false, &["English", "Spanish", "German", "Hindi", "Mandarin"]),
                question("q-1-4", "Current location", QuestionType::ShortText, true, &[]),
                question("q-1-5", "Upload your resume", QuestionType::File, false, &[]),
            ],
        },
        Section {
            title: "Role fit".to_string(),
            questions: vec![
                question("q-2-1", "Preferred working arrangement", QuestionType::SingleChoice, true, &["Remote", "Hybrid", "Onsite"]),
                question("q-2-2", "Tools you use daily", QuestionType::MultiChoice, false, &["Git", "Docker", "Figma", "Jira", "SQL"]),
                question("q-2-3", "Describe a project you are proud of", QuestionType::LongText, true, &[]),
                question("q-2-4", "Notice period in weeks", QuestionType::Numeric, false, &[]),
                question("q-2-5", "Why do you want this role?", QuestionType::LongText, true, &[]),
                question("q-2-6", "Anything else we should know?", QuestionType::ShortText, false, &[]),
            ],
        },
    ];

    Ok(Assessment {
        id: job_id,
        job_id,
        title,
        sections,
        updated_at: db.now_millis(),
    })
}

fn sample_answer(rng: &mut StdRng, question: &Question) -> Value {
    match question.kind {
        QuestionType::Numeric => json!(rng.gen_range(0..15)),
        QuestionType::SingleChoice => json!(question.choices.choose(rng)),
        QuestionType::MultiChoice => {
            let picked: Vec<&String> = question.choices.choose_multiple(rng, 2).collect();
            json!(picked)
        }
        QuestionType::File => json!("resume.pdf"),
        QuestionType::ShortText | QuestionType::LongText => {
            json!(format!("Answer to: {}", question.label))
        }
    }
}
