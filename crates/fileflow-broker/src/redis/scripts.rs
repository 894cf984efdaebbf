//! Lua scripts executing each job state transition atomically.
//!
//! Scripts report domain outcomes as status strings (`OK`, `NOT_FOUND`,
//! `INVALID:<state>`, `LEASE_LOST:<holder>`) instead of error replies so
//! Redis errors keep meaning "store unavailable".

use std::sync::LazyLock;

use redis::Script;

/// KEYS: pending, delayed, active.
/// ARGV: now_ms, visible_until_ms, worker_id, job key prefix.
pub(crate) static DEQUEUE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('LPUSH', KEYS[1], id)
end
while true do
  local id = redis.call('RPOP', KEYS[1])
  if not id then
    return false
  end
  local key = ARGV[4] .. id
  if redis.call('HGET', key, 'state') == 'pending' then
    redis.call('HSET', key, 'state', 'active', 'started_at', ARGV[1],
      'visible_until', ARGV[2], 'worker_id', ARGV[3])
    redis.call('HINCRBY', key, 'attempts', 1)
    redis.call('ZADD', KEYS[3], ARGV[2], id)
    return id
  end
end
"#,
    )
});

/// KEYS: job, active, target set.
/// ARGV: target state, now_ms, error (empty for none), job id, worker_id.
pub(crate) static FINISH: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local state = redis.call('HGET', KEYS[1], 'state')
if not state then
  return 'NOT_FOUND'
end
if state ~= 'active' then
  return 'INVALID:' .. state
end
local holder = redis.call('HGET', KEYS[1], 'worker_id')
if holder ~= ARGV[5] then
  return 'LEASE_LOST:' .. (holder or '')
end
redis.call('HSET', KEYS[1], 'state', ARGV[1], 'finished_at', ARGV[2])
redis.call('HDEL', KEYS[1], 'visible_until', 'worker_id')
if ARGV[3] ~= '' then
  redis.call('HSET', KEYS[1], 'error', ARGV[3], 'last_error', ARGV[3])
end
redis.call('ZREM', KEYS[2], ARGV[4])
redis.call('ZADD', KEYS[3], ARGV[2], ARGV[4])
return 'OK'
"#,
    )
});

/// KEYS: job, active, delayed, pending, failed.
/// ARGV: error, available_at_ms, now_ms, job id, worker_id.
/// Returns `CANCELLED` when a pending cancellation failed the job instead.
pub(crate) static RETRY: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local state = redis.call('HGET', KEYS[1], 'state')
if not state then
  return 'NOT_FOUND'
end
if state ~= 'active' then
  return 'INVALID:' .. state
end
local holder = redis.call('HGET', KEYS[1], 'worker_id')
if holder ~= ARGV[5] then
  return 'LEASE_LOST:' .. (holder or '')
end
redis.call('HDEL', KEYS[1], 'visible_until', 'worker_id')
redis.call('ZREM', KEYS[2], ARGV[4])
local reason = redis.call('HGET', KEYS[1], 'cancel_reason')
if reason then
  redis.call('HSET', KEYS[1], 'state', 'failed', 'error', reason,
    'last_error', ARGV[1], 'finished_at', ARGV[3])
  redis.call('ZADD', KEYS[5], ARGV[3], ARGV[4])
  return 'CANCELLED'
end
redis.call('HSET', KEYS[1], 'state', 'pending', 'last_error', ARGV[1],
  'available_at', ARGV[2])
if tonumber(ARGV[2]) <= tonumber(ARGV[3]) then
  redis.call('LPUSH', KEYS[4], ARGV[4])
else
  redis.call('ZADD', KEYS[3], ARGV[2], ARGV[4])
end
return 'OK'
"#,
    )
});

/// KEYS: job, active.
/// ARGV: worker_id, visible_until_ms, job id.
/// Returns -1 for an unknown job, 0 when the lease is not held, 1 on success.
pub(crate) static EXTEND: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local state = redis.call('HGET', KEYS[1], 'state')
if not state then
  return -1
end
if state ~= 'active' or redis.call('HGET', KEYS[1], 'worker_id') ~= ARGV[1] then
  return 0
end
redis.call('HSET', KEYS[1], 'visible_until', ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[2], ARGV[3])
return 1
"#,
    )
});

/// KEYS: active, pending, failed.
/// ARGV: now_ms, job key prefix, lease expiry message.
/// Returns a flat list of `id, outcome` pairs.
pub(crate) static RECLAIM: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local stale = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1])
local out = {}
for _, id in ipairs(stale) do
  local key = ARGV[2] .. id
  redis.call('ZREM', KEYS[1], id)
  if redis.call('HGET', key, 'state') == 'active' then
    local attempts = tonumber(redis.call('HGET', key, 'attempts') or '0')
    local max = tonumber(redis.call('HGET', key, 'max_attempts') or '1')
    local reason = redis.call('HGET', key, 'cancel_reason')
    redis.call('HDEL', key, 'visible_until', 'worker_id')
    if reason or attempts >= max then
      if not reason then
        reason = ARGV[3]
      end
      redis.call('HSET', key, 'state', 'failed', 'error', reason,
        'last_error', reason, 'finished_at', ARGV[1])
      redis.call('ZADD', KEYS[3], ARGV[1], id)
      table.insert(out, id)
      table.insert(out, 'failed')
    else
      redis.call('HSET', key, 'state', 'pending', 'last_error', ARGV[3],
        'available_at', ARGV[1])
      redis.call('LPUSH', KEYS[2], id)
      table.insert(out, id)
      table.insert(out, 'requeued')
    end
  end
end
return out
"#,
    )
});

/// KEYS: job, pending, delayed, failed.
/// ARGV: reason, now_ms, job id.
pub(crate) static CANCEL: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local state = redis.call('HGET', KEYS[1], 'state')
if not state then
  return 'NOT_FOUND'
end
if state == 'pending' then
  redis.call('HSET', KEYS[1], 'state', 'failed', 'error', ARGV[1],
    'finished_at', ARGV[2])
  redis.call('LREM', KEYS[2], 0, ARGV[3])
  redis.call('ZREM', KEYS[3], ARGV[3])
  redis.call('ZADD', KEYS[4], ARGV[2], ARGV[3])
  return 'CANCELLED'
end
if state == 'active' then
  redis.call('HSET', KEYS[1], 'cancel_reason', ARGV[1])
  return 'REQUESTED'
end
return 'INVALID:' .. state
"#,
    )
});

/// KEYS: completed, failed.
/// ARGV: cutoff_ms (exclusive), job key prefix.
pub(crate) static PURGE: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local removed = 0
for i = 1, 2 do
  local ids = redis.call('ZRANGEBYSCORE', KEYS[i], '-inf', '(' .. ARGV[1])
  for _, id in ipairs(ids) do
    redis.call('DEL', ARGV[2] .. id)
    redis.call('ZREM', KEYS[i], id)
    removed = removed + 1
  end
end
return removed
"#,
    )
});
