use anyhow::Context;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::matcher;
use crate::models::{
    interval_number, Checkin, CheckinId, TraceTimeIntervalWarning, TraceWarningMatch,
    TraceWarningPackage, INTERVAL_SECONDS,
};
use crate::store::InMemoryEventStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn insert_checkin(
    pool: &PgPool,
    trace_location_id: Uuid,
    description: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    submitted: bool,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO presence_risk.checkins
        (trace_location_id, description, checkin_start, checkin_end, submitted, source_key)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(trace_location_id)
    .bind(description)
    .bind(start)
    .bind(end)
    .bind(submitted)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let bakery = Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?;
    let gym = Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?;
    let at = |day: u32, hour: u32, minute: u32| {
        Utc.with_ymd_and_hms(2021, 3, day, hour, minute, 0)
            .single()
            .context("invalid seed timestamp")
    };

    let checkins = vec![
        ("seed-001", bakery, "Bakery Sonnenschein", at(4, 8, 30)?, at(4, 9, 30)?),
        ("seed-002", gym, "Fitness Studio Nord", at(4, 17, 0)?, at(4, 18, 45)?),
        ("seed-003", gym, "Fitness Studio Nord", at(5, 22, 30)?, at(6, 1, 0)?),
    ];

    for (source_key, location, description, start, end) in checkins {
        insert_checkin(pool, location, description, start, end, false, source_key).await?;
    }

    let package = TraceWarningPackage {
        id: 1,
        warnings: vec![
            TraceTimeIntervalWarning {
                trace_location_id: bakery,
                start_interval_number: interval_number(at(4, 8, 40)?),
                period: 3,
                transmission_risk_level: 2,
            },
            TraceTimeIntervalWarning {
                trace_location_id: gym,
                start_interval_number: interval_number(at(5, 22, 0)?),
                period: Duration::hours(4).num_seconds() / INTERVAL_SECONDS,
                transmission_risk_level: 1,
            },
        ],
    };
    ingest_package(pool, &package).await?;

    Ok(())
}

fn checkin_from_row(row: &PgRow) -> Checkin {
    Checkin {
        id: row.get("id"),
        trace_location_id: row.get("trace_location_id"),
        description: row.get("description"),
        start: row.get("checkin_start"),
        end: row.get("checkin_end"),
        submitted: row.get("submitted"),
    }
}

fn match_from_row(row: &PgRow) -> TraceWarningMatch {
    TraceWarningMatch {
        id: row.get("id"),
        checkin_id: row.get("checkin_id"),
        trace_warning_package_id: row.get("trace_warning_package_id"),
        trace_location_id: row.get("trace_location_id"),
        transmission_risk_level: row.get("transmission_risk_level"),
        start_interval_number: row.get("start_interval_number"),
        end_interval_number: row.get("end_interval_number"),
    }
}

pub async fn fetch_checkins(pool: &PgPool) -> anyhow::Result<Vec<Checkin>> {
    let rows = sqlx::query(
        "SELECT id, trace_location_id, description, checkin_start, checkin_end, submitted \
         FROM presence_risk.checkins ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(checkin_from_row).collect())
}

pub async fn fetch_matches(pool: &PgPool) -> anyhow::Result<Vec<TraceWarningMatch>> {
    let rows = sqlx::query(
        "SELECT id, checkin_id, trace_warning_package_id, trace_location_id, \
         transmission_risk_level, start_interval_number, end_interval_number \
         FROM presence_risk.trace_warning_matches ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(match_from_row).collect())
}

/// Reads every checkin and match into an immutable in-memory snapshot.
pub async fn load_snapshot(pool: &PgPool) -> anyhow::Result<InMemoryEventStore> {
    let checkins = fetch_checkins(pool).await.context("failed to load checkins")?;
    let matches = fetch_matches(pool).await.context("failed to load matches")?;
    debug!(
        checkins = checkins.len(),
        matches = matches.len(),
        "loaded event store snapshot"
    );

    let mut store = InMemoryEventStore::new();
    for checkin in checkins {
        store.insert_checkin(checkin);
    }
    for warning_match in matches {
        store.create_trace_warning_match(warning_match);
    }
    Ok(store)
}

pub async fn store_matches(pool: &PgPool, matches: &[TraceWarningMatch]) -> anyhow::Result<usize> {
    let mut inserted = 0usize;

    for warning_match in matches {
        let result = sqlx::query(
            r#"
            INSERT INTO presence_risk.trace_warning_matches
            (checkin_id, trace_warning_package_id, trace_location_id,
             transmission_risk_level, start_interval_number, end_interval_number)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (checkin_id, trace_warning_package_id, start_interval_number) DO NOTHING
            "#,
        )
        .bind(warning_match.checkin_id)
        .bind(warning_match.trace_warning_package_id)
        .bind(warning_match.trace_location_id)
        .bind(warning_match.transmission_risk_level)
        .bind(warning_match.start_interval_number)
        .bind(warning_match.end_interval_number)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }

    Ok(inserted)
}

pub async fn ingest_package(pool: &PgPool, package: &TraceWarningPackage) -> anyhow::Result<usize> {
    let checkins = fetch_checkins(pool).await?;
    let matches = matcher::match_package(package, &checkins);
    let inserted = store_matches(pool, &matches).await?;
    info!(
        package_id = package.id,
        matched = matches.len(),
        inserted,
        "ingested warning package"
    );
    Ok(inserted)
}

pub async fn mark_submitted(pool: &PgPool, checkin_ids: &[CheckinId]) -> anyhow::Result<u64> {
    let result = sqlx::query(
        "UPDATE presence_risk.checkins SET submitted = TRUE WHERE id = ANY($1) AND NOT submitted",
    )
    .bind(checkin_ids)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        trace_location_id: Uuid,
        description: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[serde(default)]
        submitted: bool,
        source_key: Option<String>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut inserted = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let source_key = row
            .source_key
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()));

        if insert_checkin(
            pool,
            row.trace_location_id,
            &row.description,
            row.start,
            row.end,
            row.submitted,
            &source_key,
        )
        .await?
        {
            inserted += 1;
        }
    }

    Ok(inserted)
}
