use anyhow::{bail, Context, Result};
use apportionment_engine::{
    config::{AppConfig, SourceKind},
    load_csv_dir, observability, PgSource, SplitDataSource, SplitEngine, SplitKind,
};
use condo_client::db::{save_split_snapshot, SplitSnapshot};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::env;
use time::{macros::format_description, Date};

const USAGE: &str = "usage: monthly_split <date_from> <date_to> <gas|electricity|both> [--diagnose] [--save]";

struct Args {
    date_from: Date,
    date_to: Date,
    kind: SplitKind,
    diagnose: bool,
    save: bool,
}

fn parse_date(raw: &str) -> Result<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .with_context(|| format!("invalid date '{raw}', expected YYYY-MM-DD"))
}

fn parse_args() -> Result<Args> {
    let args: Vec<String> = env::args().skip(1).collect();
    let (positional, flags): (Vec<&String>, Vec<&String>) = args.iter().partition(|a| !a.starts_with("--"));
    if positional.len() != 3 {
        bail!(USAGE);
    }

    let mut diagnose = false;
    let mut save = false;
    for flag in flags {
        match flag.as_str() {
            "--diagnose" => diagnose = true,
            "--save" => save = true,
            other => bail!("unknown flag {other}\n{USAGE}"),
        }
    }

    Ok(Args {
        date_from: parse_date(positional[0])?,
        date_to: parse_date(positional[1])?,
        kind: positional[2].parse()?,
        diagnose,
        save,
    })
}

async fn run<S: SplitDataSource>(engine: SplitEngine<S>, args: &Args, pool: Option<&PgPool>) -> Result<()> {
    if args.diagnose {
        let diagnostic = engine.diagnose_percentages(args.date_from, args.date_to).await?;
        println!("{}", serde_json::to_string_pretty(&diagnostic)?);
        return Ok(());
    }

    let result = engine
        .calculate_monthly_split(args.date_from, args.date_to, args.kind)
        .await?;
    let payload = serde_json::to_string_pretty(&result)?;

    if args.save {
        let Some(pool) = pool else {
            bail!("--save needs source.kind = \"postgres\"");
        };
        let snapshot = SplitSnapshot {
            date_from: args.date_from,
            date_to: args.date_to,
            kind: args.kind.to_string(),
            fingerprint: result.fingerprint.clone(),
            total_amount: result.verification.expected_total,
            payload: payload.clone(),
        };
        if save_split_snapshot(pool, &snapshot).await? {
            tracing::info!(fingerprint = %snapshot.fingerprint, "split snapshot saved");
        } else {
            tracing::info!(fingerprint = %snapshot.fingerprint, "identical split already saved");
        }
    }

    println!("{payload}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args = parse_args()?;
    let cfg = AppConfig::load()?;
    let concurrency = cfg.split.lookup_concurrency;

    match cfg.source.kind {
        SourceKind::Postgres => {
            let Some(db) = &cfg.database else {
                bail!("source.kind = \"postgres\" requires a [database] section");
            };
            let pool = PgPoolOptions::new()
                .max_connections(db.max_connections)
                .connect(&db.uri)
                .await?;
            let engine = SplitEngine::new(PgSource::new(pool.clone())).with_lookup_concurrency(concurrency);
            run(engine, &args, Some(&pool)).await
        }
        SourceKind::CsvDir => {
            let Some(dir) = &cfg.source.csv_dir else {
                bail!("source.kind = \"csv_dir\" requires source.csv_dir");
            };
            let source = load_csv_dir(dir)?;
            let engine = SplitEngine::new(source).with_lookup_concurrency(concurrency);
            run(engine, &args, None).await
        }
    }
}
