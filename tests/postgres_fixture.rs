//! Tests against a live Postgres loaded with `fixtures/firm_fixture.sql`.
//!
//! The fixture drops and recreates the four directory tables, so point
//! DATABASE_URL at a scratch database.
//!
//! Run with: DATABASE_URL=postgres://... cargo test --test postgres_fixture -- --ignored

use serde_json::Value as JsonValue;
use sqlchat::prompt::EXEMPLARS;
use sqlchat::schema::SchemaSnapshotter;
use sqlchat::{ChatSession, Config, Database, PgDatabase, ResultRow};
use tokio::sync::OnceCell;

const FIXTURE: &str = include_str!("fixtures/firm_fixture.sql");

static LOADED: OnceCell<()> = OnceCell::const_new();

fn database_url() -> String {
    std::env::var("DATABASE_URL").expect("DATABASE_URL must be set")
}

async fn fixture_db() -> PgDatabase {
    LOADED
        .get_or_init(|| async {
            let pool = sqlx::PgPool::connect(&database_url()).await.unwrap();
            sqlx::raw_sql(FIXTURE).execute(&pool).await.unwrap();
            pool.close().await;
        })
        .await;
    PgDatabase::connect(&database_url()).await.unwrap()
}

/// Row values only, in a stable order.
fn value_set(rows: &[ResultRow]) -> Vec<Vec<JsonValue>> {
    let mut values: Vec<Vec<JsonValue>> = rows
        .iter()
        .map(|row| row.iter().map(|(_, v)| v.clone()).collect())
        .collect();
    values.sort_by_key(|v| serde_json::to_string(v).unwrap());
    values
}

#[tokio::test]
#[ignore]
async fn test_snapshot_lists_fixture_tables() {
    let db = fixture_db().await;
    let schema = SchemaSnapshotter::new("public").snapshot(&db).await.unwrap();

    for table in ["teams", "careers", "articles", "practice_areas"] {
        assert!(schema.has_table(table), "missing {table}");
    }
    assert!(schema.render().contains("practice_areas text[]"));
}

#[tokio::test]
#[ignore]
async fn test_every_exemplar_executes() {
    let db = fixture_db().await;

    for exemplar in EXEMPLARS {
        let result = db.execute(exemplar.sql).await;
        assert!(result.is_ok(), "{}: {:?}", exemplar.sql, result.err());
    }
}

#[tokio::test]
#[ignore]
async fn test_team_count_is_twelve() {
    let db = fixture_db().await;
    let rows = db.execute("SELECT COUNT(*) FROM teams;").await.unwrap();

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("count"), Some(&JsonValue::from(12)));
}

#[tokio::test]
#[ignore]
async fn test_no_match_is_empty_not_error() {
    let db = fixture_db().await;
    let rows = db
        .execute("SELECT name FROM teams WHERE position ILIKE '%founding partner%' AND firm ILIKE '%Rupp Pfalzgraf%';")
        .await
        .unwrap();

    assert!(rows.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_arrays_decode_as_json_arrays() {
    let db = fixture_db().await;
    let rows = db
        .execute("SELECT name, bar_admissions FROM teams WHERE name = 'Sarah Miller';")
        .await
        .unwrap();

    assert_eq!(rows[0].describe(), "name: Sarah Miller, bar_admissions: [New York, Florida]");
}

#[tokio::test]
#[ignore]
async fn test_bad_column_is_driver_error() {
    let db = fixture_db().await;
    let err = db.execute("SELECT salary FROM teams;").await.unwrap_err();
    assert!(err.to_string().contains("salary"));
}

/// Regression baseline: with a real model, every exemplar question yields
/// the same result set as its library SQL. Needs OPENAI_API_KEY too.
#[tokio::test]
#[ignore]
async fn test_live_model_matches_exemplar_results() {
    let db = fixture_db().await;
    let config = Config::load(None).unwrap();
    let mut session = ChatSession::connect(&config).await.unwrap();

    let mut mismatches = Vec::new();
    for exemplar in EXEMPLARS {
        let expected = db.execute(exemplar.sql).await.unwrap();
        match session.handle_turn(exemplar.question).await {
            Ok(turn) if value_set(&turn.rows) == value_set(&expected) => {}
            Ok(turn) => mismatches.push(format!("{} -> {}", exemplar.question, turn.query)),
            Err(err) => mismatches.push(format!("{} -> {}", exemplar.question, err)),
        }
    }

    assert!(mismatches.is_empty(), "mismatched exemplars:\n{}", mismatches.join("\n"));
}

#[tokio::test]
#[ignore]
async fn test_decodes_temporal_and_array_columns() {
    let db = fixture_db().await;
    let rows = db
        .execute(
            "SELECT interval '3 days' AS age, time '10:30' AS t, ARRAY[1.5, 2]::numeric[] AS n, \
             ARRAY[date '2024-01-02'] AS d, ARRAY[1, 2]::int2[] AS i, \
             ARRAY[timestamptz '2024-01-02 03:04:05+00'] AS ts, 1.1::real AS r, NULL::int4 AS missing;",
        )
        .await
        .unwrap();

    assert_eq!(
        rows[0].describe(),
        "age: 3 days, t: 10:30:00, n: [1.5, 2], d: [2024-01-02], i: [1, 2], \
         ts: [2024-01-02T03:04:05+00:00], r: 1.1, missing: NULL"
    );
}

#[tokio::test]
#[ignore]
async fn test_unsupported_column_type_is_error() {
    let db = fixture_db().await;
    let err = db.execute("SELECT point(1, 2) AS p;").await.unwrap_err();
    assert!(err.to_string().contains("unsupported column type"), "{}", err);
}
