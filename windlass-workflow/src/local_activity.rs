//! Local activity support.
//!
//! Local activities run in the worker process without a server round trip
//! and are persisted as `LocalActivity` markers so replays observe the
//! same result and the same apparent time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use windlass_core::types::{ActivityType, LocalActivityOptions};
use windlass_core::{GenericError, WindlassError};

/// Parameters for executing a local activity.
#[derive(Debug, Clone)]
pub struct ExecuteLocalActivityParams {
    pub activity_type: ActivityType,
    pub input: Option<Vec<u8>>,
    pub options: LocalActivityOptions,
    /// Attempt number, starting from 0.
    pub attempt: i32,
}

/// Payload of a `LocalActivity` marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalActivityMarkerData {
    pub activity_id: String,
    pub activity_type: String,
    pub result: Option<Vec<u8>>,
    pub err_reason: Option<String>,
    pub err_details: Option<Vec<u8>>,
    /// Apparent workflow time when the activity completed, so replays
    /// reconstruct the same clock.
    pub replay_time: DateTime<Utc>,
    pub attempt: i32,
    /// Retry backoff, milliseconds, when the failure is retryable.
    pub backoff_millis: Option<u64>,
}

impl LocalActivityMarkerData {
    pub fn success(
        activity_id: String,
        activity_type: String,
        result: Vec<u8>,
        replay_time: DateTime<Utc>,
        attempt: i32,
    ) -> Self {
        Self {
            activity_id,
            activity_type,
            result: Some(result),
            err_reason: None,
            err_details: None,
            replay_time,
            attempt,
            backoff_millis: None,
        }
    }

    pub fn failure(
        activity_id: String,
        activity_type: String,
        err_reason: String,
        err_details: Option<Vec<u8>>,
        replay_time: DateTime<Utc>,
        attempt: i32,
    ) -> Self {
        Self {
            activity_id,
            activity_type,
            result: None,
            err_reason: Some(err_reason),
            err_details,
            replay_time,
            attempt,
            backoff_millis: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    pub fn is_failure(&self) -> bool {
        self.err_reason.is_some()
    }
}

/// Map recorded marker data to the result delivered to the awaiting
/// future.
pub fn marker_data_to_result(data: LocalActivityMarkerData) -> Result<Vec<u8>, WindlassError> {
    if let Some(result) = data.result {
        Ok(result)
    } else if let Some(reason) = data.err_reason {
        Err(WindlassError::from_reason(
            &reason,
            data.err_details.unwrap_or_default(),
        ))
    } else {
        Err(GenericError::new("local activity marker has no result or error").into())
    }
}

/// Short name of an activity type, tolerant of package-qualified names
/// recorded by other SDKs.
pub fn last_part_of_name(name: &str) -> &str {
    name.rsplit(['.', '/']).next().unwrap_or(name)
}
