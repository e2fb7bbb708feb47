//! Per-year cache of public holiday dates, used by every leave computation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate};
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;

static HOLIDAY_CACHE: Lazy<Cache<i32, Arc<HashSet<NaiveDate>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(32)
        .time_to_live(Duration::from_secs(86400)) // 24h TTL
        .build()
});

async fn load_year(pool: &MySqlPool, year: i32) -> Result<Arc<HashSet<NaiveDate>>, sqlx::Error> {
    if let Some(hit) = HOLIDAY_CACHE.get(&year).await {
        return Ok(hit);
    }

    let dates = sqlx::query_scalar::<_, NaiveDate>("SELECT date FROM jours_feries WHERE YEAR(date) = ?")
        .bind(year)
        .fetch_all(pool)
        .await?;

    let set = Arc::new(dates.into_iter().collect::<HashSet<_>>());
    HOLIDAY_CACHE.insert(year, set.clone()).await;
    Ok(set)
}

/// Holiday dates falling in `[start, end]`.
pub async fn holidays_between(
    pool: &MySqlPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashSet<NaiveDate>, sqlx::Error> {
    let mut result = HashSet::new();
    for year in start.year()..=end.year() {
        let set = load_year(pool, year).await?;
        result.extend(set.iter().filter(|d| **d >= start && **d <= end).copied());
    }
    Ok(result)
}

/// Drops the cached year after a holiday write.
pub async fn invalidate(year: i32) {
    HOLIDAY_CACHE.invalidate(&year).await;
}
