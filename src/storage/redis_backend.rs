use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, Script};

use super::backend::{Batch, BatchOutcome, BackendError, KvBackend};
use crate::utils::{retry_with_backoff, RetryConfig};

// ============================================================================
// Redis Backend
// ============================================================================
//
// A guarded batch is shipped as a single EVALSHA call. Redis runs scripts
// atomically, so no other client can interleave with the guard-check and
// apply phases. A failed SET NX inside MULTI/EXEC would not stop the SADD
// queued after it.
//
// Script arguments: KEYS[i] is the target key of command i, ARGV holds
// (op, arg) pairs in the same order.
//
// Returns -1 when applied, otherwise the 0-based index of the failing guard.
//
// ============================================================================

const BATCH_SCRIPT: &str = r#"
local n = #KEYS
for i = 1, n do
  local op = ARGV[2 * i - 1]
  if op == 'set_nx' or op == 'set_xx' or op == 'del_xx' then
    local present = redis.call('EXISTS', KEYS[i]) == 1
    if op == 'set_nx' and present then return i - 1 end
    if op ~= 'set_nx' and not present then return i - 1 end
  end
end
for i = 1, n do
  local op = ARGV[2 * i - 1]
  local arg = ARGV[2 * i]
  if op == 'set_nx' or op == 'set_xx' then
    redis.call('SET', KEYS[i], arg)
  elseif op == 'del_xx' then
    redis.call('DEL', KEYS[i])
  elseif op == 'sadd' then
    redis.call('SADD', KEYS[i], arg)
  elseif op == 'srem' then
    redis.call('SREM', KEYS[i], arg)
  else
    return redis.error_reply('unknown batch op ' .. op)
  end
end
return -1
"#;

#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
    batch_script: Script,
}

impl RedisBackend {
    /// Connect and verify the server answers PING. Retries follow `retry`
    /// only; the connection manager itself makes a single attempt per call.
    pub async fn connect(url: &str, retry: &RetryConfig) -> Result<Self, BackendError> {
        let client = Client::open(url)?;
        let manager_config = ConnectionManagerConfig::new().set_number_of_retries(0);

        let connection = retry_with_backoff("redis_connect", retry, |attempt| {
            let client = client.clone();
            let manager_config = manager_config.clone();
            async move {
                tracing::debug!(attempt, "Connecting to Redis");
                client.get_connection_manager_with_config(manager_config).await
            }
        })
        .await
        .map_err(|e| {
            BackendError::Unavailable(format!(
                "redis at {} after {} attempts: {}",
                url, retry.max_attempts, e
            ))
        })?;

        let backend = Self {
            connection,
            batch_script: Script::new(BATCH_SCRIPT),
        };
        backend.ping().await?;

        tracing::info!(url = %url, "Connected to Redis");
        Ok(backend)
    }
}

/// Map the batch script's reply onto an outcome for a batch of `len` commands
fn batch_outcome(reply: i64, len: usize) -> Result<BatchOutcome, BackendError> {
    match reply {
        -1 => Ok(BatchOutcome::Applied),
        at if at >= 0 && (at as usize) < len => Ok(BatchOutcome::Aborted { at: at as usize }),
        other => Err(BackendError::UnexpectedReply(format!(
            "batch script returned {} for {} commands",
            other, len
        ))),
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection.clone();
        let present: bool = conn.exists(key).await?;
        Ok(present)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, BackendError> {
        let mut conn = self.connection.clone();
        let members: Vec<String> = conn.smembers(key).await?;
        Ok(members)
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool, BackendError> {
        let mut conn = self.connection.clone();
        let present: bool = conn.sismember(key, member).await?;
        Ok(present)
    }

    async fn execute(&self, batch: Batch) -> Result<BatchOutcome, BackendError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Applied);
        }

        let mut invocation = self.batch_script.prepare_invoke();
        for command in batch.commands() {
            invocation.key(command.key());
            invocation.arg(command.op_name()).arg(command.arg());
        }

        let mut conn = self.connection.clone();
        let reply: i64 = invocation.invoke_async(&mut conn).await?;

        batch_outcome(reply, batch.len())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(BackendError::UnexpectedReply(reply))
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
