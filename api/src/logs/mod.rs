pub mod route;

pub const DEFAULT_LOG_LIMIT: i64 = 100;
pub const MAX_LOG_LIMIT: i64 = 1000;

/// Anything that isn't a positive integer falls back to the default.
pub fn parse_limit(limit: Option<&str>) -> i64 {
    limit
        .and_then(|limit| limit.trim().parse::<i64>().ok())
        .filter(|limit| *limit > 0)
        .map_or(DEFAULT_LOG_LIMIT, |limit| limit.min(MAX_LOG_LIMIT))
}
