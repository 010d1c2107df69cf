//! Read paths over the instances cache. Every query acquires its range
//! first, so callers always observe a fully materialized window.

use almanac_domain::{Instance, time::julian_day_start};
use almanac_infra::AlmanacContext;

use super::InstancesCache;
use crate::error::ProviderError;

pub async fn instances_in_range(
    ctx: &AlmanacContext,
    cache: &InstancesCache,
    begin_ms: i64,
    end_ms: i64,
) -> Result<Vec<Instance>, ProviderError> {
    if end_ms < begin_ms {
        return Err(ProviderError::InvalidArgument(format!(
            "instances range {}..{}",
            begin_ms, end_ms
        )));
    }
    cache.acquire_range(begin_ms, end_ms, false).await?;
    Ok(ctx.repos.instances.find_in_range(begin_ms, end_ms).await?)
}

/// Convert a Julian day range to instants in the cache's zone and query.
pub async fn instances_by_day(
    ctx: &AlmanacContext,
    cache: &InstancesCache,
    start_day: i64,
    end_day: i64,
) -> Result<Vec<Instance>, ProviderError> {
    if end_day < start_day {
        return Err(ProviderError::InvalidArgument(format!(
            "instances day range {}..{}",
            start_day, end_day
        )));
    }
    let timezone = cache.timezone().await?;
    let begin = julian_day_start(start_day, &timezone)
        .ok_or(ProviderError::OutOfRange(start_day))?;
    let end = julian_day_start(end_day + 1, &timezone)
        .ok_or(ProviderError::OutOfRange(end_day))?;
    cache
        .acquire_range(begin.timestamp_millis(), end.timestamp_millis(), false)
        .await?;
    Ok(ctx.repos.instances.find_by_days(start_day, end_day).await?)
}

/// Same range semantics, with the rows bucketed by their start day.
pub async fn instances_grouped_by_day(
    ctx: &AlmanacContext,
    cache: &InstancesCache,
    start_day: i64,
    end_day: i64,
) -> Result<Vec<(i64, Vec<Instance>)>, ProviderError> {
    let instances = instances_by_day(ctx, cache, start_day, end_day).await?;
    let mut grouped: Vec<(i64, Vec<Instance>)> = Vec::new();
    for instance in instances {
        match grouped.last_mut() {
            Some((day, bucket)) if *day == instance.start_day => bucket.push(instance),
            _ => grouped.push((instance.start_day, vec![instance])),
        }
    }
    Ok(grouped)
}
