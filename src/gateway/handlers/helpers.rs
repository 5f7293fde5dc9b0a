//! Shared handler helpers

use axum::extract::Query;
use axum::extract::rejection::QueryRejection;

use crate::gateway::types::{ApiError, ApiResult};
use crate::ledger::PageRequest;

/// Unwrap a query extraction, keeping the error envelope on failure
pub fn query<T>(extracted: Result<Query<T>, QueryRejection>) -> ApiResult<T> {
    extracted
        .map(|Query(q)| q)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

pub fn page_request(limit: Option<usize>, starting_after: Option<String>) -> ApiResult<PageRequest> {
    let limit = limit.unwrap_or(PageRequest::DEFAULT_LIMIT);
    if !(1..=PageRequest::MAX_LIMIT).contains(&limit) {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            PageRequest::MAX_LIMIT
        )));
    }
    Ok(PageRequest::new(limit, starting_after))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_bounds() {
        assert_eq!(page_request(None, None).unwrap().limit, 20);
        assert_eq!(page_request(Some(100), None).unwrap().limit, 100);
        assert!(page_request(Some(0), None).is_err());
        assert!(page_request(Some(101), None).is_err());
        assert_eq!(
            page_request(Some(5), Some("01X".into())).unwrap().starting_after.as_deref(),
            Some("01X")
        );
    }
}
