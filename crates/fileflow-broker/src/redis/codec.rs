//! Mapping between [`Job`] and its Redis hash representation.
//!
//! Timestamps are stored as epoch milliseconds so the Lua scripts can
//! compare them numerically. Absent optional fields are absent hash fields.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use fileflow_core::error::AppError;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, JobState};

/// Flatten a job into hash field/value pairs.
pub(crate) fn to_fields(job: &Job) -> AppResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("id", job.id.to_string()),
        ("queue", job.queue.clone()),
        ("payload", serde_json::to_string(&job.payload)?),
        ("state", job.state.as_str().to_string()),
        ("attempts", job.attempts.to_string()),
        ("max_attempts", job.max_attempts.to_string()),
        ("created_at", millis(job.created_at)),
        ("available_at", millis(job.available_at)),
    ];

    let optional_times = [
        ("started_at", job.started_at),
        ("finished_at", job.finished_at),
        ("visible_until", job.visible_until),
    ];
    fields.extend(
        optional_times
            .into_iter()
            .filter_map(|(name, value)| value.map(|t| (name, millis(t)))),
    );

    let optional_text = [
        ("worker_id", &job.worker_id),
        ("error", &job.error),
        ("last_error", &job.last_error),
        ("cancel_reason", &job.cancel_reason),
    ];
    fields.extend(
        optional_text
            .into_iter()
            .filter_map(|(name, value)| value.clone().map(|v| (name, v))),
    );

    Ok(fields)
}

/// Rebuild a job from the result of `HGETALL`.
pub(crate) fn from_fields(fields: &HashMap<String, String>) -> AppResult<Job> {
    let required = |name: &str| {
        fields
            .get(name)
            .ok_or_else(|| corrupt(fields, &format!("missing field '{name}'")))
    };

    let id: JobId = required("id")?
        .parse()
        .map_err(|_| corrupt(fields, "invalid id"))?;
    let state: JobState = required("state")?
        .parse()
        .map_err(|e: String| corrupt(fields, &e))?;

    Ok(Job {
        id,
        queue: required("queue")?.clone(),
        payload: serde_json::from_str(required("payload")?)?,
        state,
        attempts: number(fields, "attempts")?,
        max_attempts: number(fields, "max_attempts")?,
        created_at: timestamp(fields, "created_at")?
            .ok_or_else(|| corrupt(fields, "missing created_at"))?,
        started_at: timestamp(fields, "started_at")?,
        finished_at: timestamp(fields, "finished_at")?,
        available_at: timestamp(fields, "available_at")?
            .ok_or_else(|| corrupt(fields, "missing available_at"))?,
        visible_until: timestamp(fields, "visible_until")?,
        worker_id: fields.get("worker_id").cloned(),
        error: fields.get("error").cloned(),
        last_error: fields.get("last_error").cloned(),
        cancel_reason: fields.get("cancel_reason").cloned(),
    })
}

/// Epoch milliseconds as a string argument.
pub(crate) fn millis(at: DateTime<Utc>) -> String {
    at.timestamp_millis().to_string()
}

fn number(fields: &HashMap<String, String>, name: &str) -> AppResult<u32> {
    fields
        .get(name)
        .map(|raw| raw.parse::<u32>())
        .transpose()
        .map(|value| value.unwrap_or(0))
        .map_err(|_| corrupt(fields, &format!("invalid {name}")))
}

fn timestamp(fields: &HashMap<String, String>, name: &str) -> AppResult<Option<DateTime<Utc>>> {
    let Some(raw) = fields.get(name) else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .map(Some)
        .ok_or_else(|| corrupt(fields, &format!("invalid {name}")))
}

fn corrupt(fields: &HashMap<String, String>, detail: &str) -> AppError {
    let id = fields.get("id").map(String::as_str).unwrap_or("<unknown>");
    AppError::internal(format!("Corrupt job record {id}: {detail}"))
}
