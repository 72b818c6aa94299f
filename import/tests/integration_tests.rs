use std::collections::HashSet;
use std::path::Path;

use bson::oid::ObjectId;
use bson::{Document, doc};
use flow_core::Answer;
use flow_import::{
    Collection, Dump, ImportError, Importer, PopulateConfig, Populator, Stage,
};
use flow_sqlite::{
    Migrator, Table, Target, count_rows, load_course_reviews, load_prof_reviews,
    load_review_votes,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rusqlite::Connection;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn migrated() -> Connection {
    let mut migrator = Migrator::new(Connection::open_in_memory().unwrap()).unwrap();
    migrator.upgrade(&Target::Head).unwrap();
    migrator.into_connection()
}

fn write_collection(dir: &Path, collection: Collection, docs: &[Document]) {
    let mut bytes = Vec::new();
    for doc in docs {
        doc.to_writer(&mut bytes).unwrap();
    }
    std::fs::write(dir.join(collection.file_name()), bytes).unwrap();
}

struct SampleDump {
    dir: TempDir,
    alice: ObjectId,
}

/// Three courses, two profs, two users, and three reviews. The third
/// review points at a course and a prof that are not in the dump.
fn sample_dump() -> SampleDump {
    let dir = TempDir::new().unwrap();
    let alice = ObjectId::new();
    let bob = ObjectId::new();

    write_collection(
        dir.path(),
        Collection::Course,
        &[
            doc! { "_id": "cs135", "name": "Designing Functional Programs", "description": "Racket" },
            doc! { "_id": "math135", "name": "Algebra", "description": "" },
            doc! { "_id": "stat230", "name": "Probability" },
        ],
    );
    write_collection(
        dir.path(),
        Collection::Professor,
        &[
            doc! { "_id": "ada_lovelace", "first_name": "Ada", "last_name": "Lovelace" },
            doc! { "_id": "cher", "first_name": "Cher", "last_name": "" },
        ],
    );
    write_collection(
        dir.path(),
        Collection::User,
        &[
            doc! { "_id": alice, "first_name": "Alice", "last_name": "Liddell", "program_name": "Mathematics" },
            doc! { "_id": bob, "first_name": "Bob", "last_name": "Ross", "program_name": "x".repeat(300) },
        ],
    );
    write_collection(
        dir.path(),
        Collection::UserCourse,
        &[
            doc! {
                "_id": ObjectId::new(),
                "course_id": "cs135",
                "professor_id": "ada_lovelace",
                "user_id": alice,
                "course_review": { "comment": "Loved it", "easiness": 0.2, "interest": 1, "usefulness": null },
                "professor_review": { "comment": "", "clarity": 1.0, "passion": 0 },
            },
            doc! {
                "_id": ObjectId::new(),
                "course_id": "cs135",
                "professor_id": "cher",
                "user_id": bob,
                "course_review": { "comment": "   ", "easiness": 0 },
                "professor_review": { "comment": "Very clear" },
            },
            doc! {
                "_id": ObjectId::new(),
                "course_id": "phys999",
                "professor_id": "nobody",
                "user_id": alice,
                "course_review": { "comment": "Orphan" },
            },
        ],
    );

    SampleDump { dir, alice }
}

fn import(dump: &SampleDump) -> (Importer, flow_import::ImportReport) {
    let mut importer = Importer::new(migrated(), Dump::open(dump.dir.path()).unwrap()).unwrap();
    let report = importer.run().unwrap();
    (importer, report)
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

#[test]
fn test_import_counts_match_dump() {
    let dump = sample_dump();
    let (importer, report) = import(&dump);
    let conn = importer.connection();

    assert_eq!(report.rows(Stage::Courses), 3);
    assert_eq!(report.rows(Stage::Profs), 2);
    assert_eq!(report.rows(Stage::Users), 2);
    assert_eq!(report.rows(Stage::CourseReviews), 3);
    assert_eq!(report.rows(Stage::ProfReviews), 3);

    assert_eq!(count_rows(conn, Table::Course).unwrap(), 3);
    assert_eq!(count_rows(conn, Table::Prof).unwrap(), 2);
    assert_eq!(count_rows(conn, Table::User).unwrap(), 2);
    assert_eq!(count_rows(conn, Table::CourseReview).unwrap(), 3);
    assert_eq!(count_rows(conn, Table::ProfReview).unwrap(), 3);
}

#[test]
fn test_import_assigns_ids_from_zero() {
    let dump = sample_dump();
    let (importer, _) = import(&dump);
    let conn = importer.connection();

    let courses: Vec<(i64, String, Option<String>)> = conn
        .prepare("SELECT id, code, description FROM course ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(
        courses,
        vec![
            (0, "cs135".to_string(), Some("Racket".to_string())),
            (1, "math135".to_string(), Some(String::new())),
            (2, "stat230".to_string(), None),
        ]
    );

    let ids: Vec<i64> = load_course_reviews(conn).unwrap().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[test]
fn test_course_description_stored_verbatim() {
    let dump = sample_dump();
    let (importer, _) = import(&dump);

    // Both documents that carry a description keep it, even the empty one
    let described: i64 = importer
        .connection()
        .query_row("SELECT COUNT(description) FROM course", [], |row| row.get(0))
        .unwrap();
    assert_eq!(described, 2);
}

#[test]
fn test_import_transforms_fields() {
    let dump = sample_dump();
    let (importer, _) = import(&dump);
    let conn = importer.connection();

    let profs: Vec<String> = conn
        .prepare("SELECT name FROM prof ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(profs, vec!["Ada Lovelace", "Cher"]);

    let users: Vec<(String, Option<String>)> = conn
        .prepare("SELECT name, program FROM \"user\" ORDER BY id")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(users[0], ("Alice Liddell".to_string(), Some("Mathematics".to_string())));
    assert_eq!(users[1], ("Bob Ross".to_string(), None));

    let course_reviews = load_course_reviews(conn).unwrap();
    let first = &course_reviews[0];
    assert_eq!(first.text.as_deref(), Some("Loved it"));
    assert_eq!((first.easy, first.liked, first.useful), (Answer::Yes, Answer::Yes, Answer::Unknown));
    assert_eq!((first.course_id, first.prof_id, first.user_id), (Some(0), Some(0), Some(0)));

    let second = &course_reviews[1];
    assert_eq!(second.text, None);
    assert_eq!(second.easy, Answer::No);
    assert_eq!(second.liked, Answer::Unknown);

    let prof_reviews = load_prof_reviews(conn).unwrap();
    assert_eq!(prof_reviews[0].text, None);
    assert_eq!(prof_reviews[0].clear, Answer::Yes);
    assert_eq!(prof_reviews[0].engaging, Answer::No);
    assert_eq!(prof_reviews[1].text.as_deref(), Some("Very clear"));
    assert_eq!(prof_reviews[1].prof_id, Some(1));

    // Missing professor_review sub-document reads as empty
    assert_eq!(prof_reviews[2].text, None);
    assert_eq!(prof_reviews[2].clear, Answer::Unknown);
}

#[test]
fn test_unresolved_references_become_null() {
    let dump = sample_dump();
    let (importer, report) = import(&dump);

    let orphan = &load_course_reviews(importer.connection()).unwrap()[2];
    assert_eq!(orphan.course_id, None);
    assert_eq!(orphan.prof_id, None);
    assert_eq!(orphan.user_id, Some(0));

    // course_id + professor_id, once per review stage
    assert_eq!(report.unresolved(), 4);
    let user_stage = report.stages.iter().find(|s| s.stage == Stage::Users).unwrap();
    assert_eq!(user_stage.dropped, 1);
}

#[test]
fn test_idmap_reverse_lookup() {
    let dump = sample_dump();
    let (importer, _) = import(&dump);
    let idmap = importer.idmap();

    assert_eq!(
        idmap.external(Table::User, 0).map(|id| id.as_str().to_string()),
        Some(dump.alice.to_hex())
    );
    assert_eq!(idmap.len(Table::CourseReview), 3);
    assert_eq!(idmap.len(Table::ProfReview), 3);
}

#[test]
fn test_parent_stage_clears_dependent_idmaps() {
    let dump = sample_dump();
    let (mut importer, _) = import(&dump);

    importer.run_stage(Stage::Users).unwrap();
    assert_eq!(count_rows(importer.connection(), Table::CourseReview).unwrap(), 0);
    assert_eq!(importer.idmap().len(Table::CourseReview), 0);
    assert_eq!(importer.idmap().len(Table::ProfReview), 0);
    assert!(importer.idmap().external(Table::CourseReview, 0).is_none());

    // Untouched parents keep their keys
    assert_eq!(importer.idmap().len(Table::Course), 3);
    assert_eq!(importer.idmap().len(Table::User), 2);
}

#[test]
fn test_rerun_is_identical() {
    let dump = sample_dump();
    let (mut importer, _) = import(&dump);
    let before = load_course_reviews(importer.connection()).unwrap();
    let prof_before = load_prof_reviews(importer.connection()).unwrap();

    importer.run().unwrap();
    assert_eq!(load_course_reviews(importer.connection()).unwrap(), before);
    assert_eq!(load_prof_reviews(importer.connection()).unwrap(), prof_before);
    assert_eq!(count_rows(importer.connection(), Table::Course).unwrap(), 3);
}

#[test]
fn test_missing_dump_fails_before_store() {
    let err = Dump::open("/no/such/dump/dir").unwrap_err();
    assert!(matches!(err, ImportError::MissingDump(_)));
    assert!(err.to_string().contains("/no/such/dump/dir"));
}

#[test]
fn test_course_without_code_aborts_stage() {
    let dump = sample_dump();
    let (mut importer, _) = import(&dump);

    write_collection(
        dump.dir.path(),
        Collection::Course,
        &[
            doc! { "_id": "cs241", "name": "Foundations" },
            doc! { "_id": 17, "name": "Numbered" },
        ],
    );
    let err = importer.run_stage(Stage::Courses).unwrap_err();
    assert!(matches!(
        err,
        ImportError::MissingField { collection: "course", field: "_id" }
    ));

    // Rolled back: previous courses and their reviews are still there
    assert_eq!(count_rows(importer.connection(), Table::Course).unwrap(), 3);
    assert_eq!(count_rows(importer.connection(), Table::CourseReview).unwrap(), 3);
    assert_eq!(importer.idmap().len(Table::Course), 3);
}

// ---------------------------------------------------------------------------
// Populate
// ---------------------------------------------------------------------------

fn small_config() -> PopulateConfig {
    PopulateConfig {
        courses: 40,
        profs: 5,
        users: 8,
        course_reviews: 30,
        prof_reviews: 20,
        course_review_votes: 60,
        prof_review_votes: 50,
    }
}

#[test]
fn test_populate_counts_and_keys() {
    let mut populator =
        Populator::new(migrated(), small_config(), StdRng::seed_from_u64(42)).unwrap();
    let report = populator.run().unwrap();
    assert_eq!(report.courses, 40);
    assert_eq!(report.prof_review_votes, 50);

    let conn = populator.connection();
    assert_eq!(count_rows(conn, Table::Course).unwrap(), 40);
    assert_eq!(count_rows(conn, Table::CourseReviewVote).unwrap(), 60);

    let codes: HashSet<String> = conn
        .prepare("SELECT code FROM course")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(codes.len(), 40);

    for review in load_course_reviews(conn).unwrap() {
        assert!((1..=40).contains(&review.course_id.unwrap()));
        assert!((1..=5).contains(&review.prof_id.unwrap()));
        assert!((1..=8).contains(&review.user_id.unwrap()));
    }

    // Course votes only reference course reviews
    for vote in load_review_votes(conn, Table::CourseReviewVote).unwrap() {
        assert!((1..=30).contains(&vote.review_id));
    }
    let pairs: HashSet<(i64, i64)> = load_review_votes(conn, Table::ProfReviewVote)
        .unwrap()
        .iter()
        .map(|v| (v.review_id, v.user_id))
        .collect();
    assert_eq!(pairs.len(), 50);
}

#[test]
fn test_populate_is_reproducible() {
    let run = |seed| {
        let mut populator =
            Populator::new(migrated(), small_config(), StdRng::seed_from_u64(seed)).unwrap();
        populator.run().unwrap();
        let conn = populator.into_connection();
        let codes: Vec<String> = conn
            .prepare("SELECT code FROM course ORDER BY id")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        (codes, load_review_votes(&conn, Table::CourseReviewVote).unwrap())
    };
    assert_eq!(run(9), run(9));
}

#[test]
fn test_populate_fills_every_vote_pair() {
    let config = PopulateConfig {
        courses: 1,
        profs: 1,
        users: 3,
        course_reviews: 2,
        prof_reviews: 0,
        course_review_votes: 6,
        prof_review_votes: 0,
    };
    let mut populator = Populator::new(migrated(), config, StdRng::seed_from_u64(5)).unwrap();
    populator.run().unwrap();
    assert_eq!(count_rows(populator.connection(), Table::CourseReviewVote).unwrap(), 6);
}

#[test]
fn test_populate_refuses_non_empty_store() {
    let conn = migrated();
    conn.execute("INSERT INTO prof (name) VALUES ('Existing')", []).unwrap();

    let mut populator = Populator::new(conn, small_config(), StdRng::seed_from_u64(1)).unwrap();
    let err = populator.run().unwrap_err();
    assert!(matches!(err, ImportError::NotEmpty(Table::Prof)));
    assert_eq!(count_rows(populator.connection(), Table::Course).unwrap(), 0);
}

#[test]
fn test_populate_rejects_unsatisfiable_votes() {
    let config = PopulateConfig {
        users: 2,
        prof_reviews: 3,
        prof_review_votes: 7,
        ..small_config()
    };
    let err = Populator::new(migrated(), config, StdRng::seed_from_u64(1))
        .err()
        .unwrap();
    assert!(matches!(err, ImportError::InvalidConfig(_)));
}
