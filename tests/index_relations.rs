use std::path::Path;

use wof_sqlite_index::config::{IndexConfig, RelationsConfig, TableSelection};
use wof_sqlite_index::uri::id_to_rel_path;
use wof_sqlite_index::{Database, DatabaseOptions};

fn record(id: i64, relations: &str) -> String {
    format!(
        r#"{{"type":"Feature","id":{id},"properties":{{"wof:id":{id},"wof:name":"place {id}","wof:placetype":"locality"{relations}}},"geometry":{{"type":"Point","coordinates":[1.5,2.5]}}}}"#
    )
}

fn write_record(root: &Path, id: i64, body: &str) {
    let path = root.join(id_to_rel_path(id).expect("rel path"));
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(path, body).expect("write record");
}

fn config(database: &Path, relations_root: Option<&Path>) -> IndexConfig {
    IndexConfig {
        iterator_uri: "directory://".into(),
        database_uri: database.to_string_lossy().to_string(),
        processes: 2,
        optimize: false,
        tables: TableSelection {
            geojson: true,
            ..TableSelection::default()
        },
        relations: RelationsConfig {
            enabled: relations_root.is_some(),
            reader_uri: relations_root.map(|root| root.to_string_lossy().to_string()),
            strict: false,
        },
        ..IndexConfig::default()
    }
}

async fn indexed_ids(database: &Path) -> Vec<i64> {
    let db = Database::connect(&database.to_string_lossy(), &DatabaseOptions::default())
        .await
        .expect("reopen");
    let ids = sqlx::query_scalar("SELECT id FROM geojson ORDER BY id")
        .fetch_all(db.pool())
        .await
        .expect("select ids");
    db.close().await;
    ids
}

#[tokio::test]
async fn indexes_related_records_once() {
    let sources = tempfile::tempdir().expect("sources");
    let relations = tempfile::tempdir().expect("relations");
    let output = tempfile::tempdir().expect("output");
    let database = output.path().join("wof.db");

    write_record(sources.path(), 100, &record(100, r#","wof:belongsto":[200,-1]"#));
    write_record(relations.path(), 200, &record(200, ""));

    let stats = wof_sqlite_index::app::run(
        &config(&database, Some(relations.path())),
        &[sources.path().to_string_lossy().to_string()],
    )
    .await
    .expect("index");

    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.relations_indexed, 1);
    assert_eq!(stats.relations_missing, 0);
    assert_eq!(indexed_ids(&database).await, vec![100, 200]);
}

#[tokio::test]
async fn skips_related_records_already_in_the_database() {
    let existing = tempfile::tempdir().expect("existing");
    let sources = tempfile::tempdir().expect("sources");
    let relations = tempfile::tempdir().expect("relations");
    let output = tempfile::tempdir().expect("output");
    let database = output.path().join("wof.db");

    write_record(existing.path(), 400, &record(400, ""));
    wof_sqlite_index::app::run(
        &config(&database, None),
        &[existing.path().to_string_lossy().to_string()],
    )
    .await
    .expect("seed");
    assert_eq!(indexed_ids(&database).await, vec![400]);

    // The reader has no copy of 400, so any fetch attempt would be reported missing.
    write_record(sources.path(), 300, &record(300, r#","wof:involves":[400]"#));

    let stats = wof_sqlite_index::app::run(
        &config(&database, Some(relations.path())),
        &[sources.path().to_string_lossy().to_string()],
    )
    .await
    .expect("index");

    assert_eq!(stats.indexed, 1);
    assert_eq!(stats.relations_indexed, 0);
    assert_eq!(stats.relations_missing, 0);
    assert_eq!(indexed_ids(&database).await, vec![300, 400]);
}

#[tokio::test]
async fn missing_related_records_are_skipped_unless_strict() {
    let sources = tempfile::tempdir().expect("sources");
    let relations = tempfile::tempdir().expect("relations");
    let output = tempfile::tempdir().expect("output");
    let database = output.path().join("wof.db");

    write_record(sources.path(), 500, &record(500, r#","wof:depicts":[600]"#));

    let lenient = config(&database, Some(relations.path()));
    let stats = wof_sqlite_index::app::run(
        &lenient,
        &[sources.path().to_string_lossy().to_string()],
    )
    .await
    .expect("lenient run");
    assert_eq!(stats.relations_missing, 1);
    assert_eq!(indexed_ids(&database).await, vec![500]);

    let strict_database = output.path().join("strict.db");
    let mut strict = config(&strict_database, Some(relations.path()));
    strict.relations.strict = true;
    let result = wof_sqlite_index::app::run(
        &strict,
        &[sources.path().to_string_lossy().to_string()],
    )
    .await;
    assert!(matches!(result, Err(wof_sqlite_index::Error::Fetch(_))));
}
