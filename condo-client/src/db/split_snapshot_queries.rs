use anyhow::Result;
use sqlx::PgPool;
use time::Date;

/// A computed split kept as a historical record.
///
/// `payload` is the serialized result; `fingerprint` identifies its content so
/// that re-running the same period with unchanged inputs is detectable.
#[derive(Debug, Clone)]
pub struct SplitSnapshot {
    pub date_from: Date,
    pub date_to: Date,
    pub kind: String,
    pub fingerprint: String,
    pub total_amount: f64,
    pub payload: String,
}

/// Insert a snapshot, ignoring one with the same fingerprint already stored.
///
/// Returns `true` when a new row was written.
pub async fn save_split_snapshot(pool: &PgPool, snapshot: &SplitSnapshot) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO split_history (date_from, date_to, kind, fingerprint, total_amount, payload)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (fingerprint) DO NOTHING
        "#,
    )
    .bind(snapshot.date_from)
    .bind(snapshot.date_to)
    .bind(&snapshot.kind)
    .bind(&snapshot.fingerprint)
    .bind(snapshot.total_amount)
    .bind(&snapshot.payload)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
