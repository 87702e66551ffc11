//! Redis-backed fast counter
//!
//! The gate runs as one Lua script on the server, so the read, the check and
//! the `DECR` happen without any other command interleaving. Every process
//! connected to the same Redis shares one gate.

use super::{CounterError, FastCounter, GATE_UNAVAILABLE};
use crate::domain::CacheKey;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError, Script};
use tracing::{debug, info};

const TEST_AND_DECREMENT: &str = r"
local stock = redis.call('GET', KEYS[1])
if stock == false then
    return tonumber(ARGV[1])
end
stock = tonumber(stock)
if stock <= 0 then
    return tonumber(ARGV[1])
end
return redis.call('DECR', KEYS[1])
";

impl From<RedisError> for CounterError {
    fn from(err: RedisError) -> Self {
        CounterError::Unavailable(err.to_string())
    }
}

#[derive(Clone)]
pub struct RedisFastCounter {
    connection: ConnectionManager,
    gate: Script,
}

impl RedisFastCounter {
    /// Open a managed connection; it reconnects on its own after failures
    pub async fn connect(url: &str) -> Result<Self, CounterError> {
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Connected to Redis fast counter");
        Ok(Self::new(connection))
    }

    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            gate: Script::new(TEST_AND_DECREMENT),
        }
    }
}

#[async_trait]
impl FastCounter for RedisFastCounter {
    async fn atomic_test_and_decrement(&self, key: &CacheKey) -> Result<i64, CounterError> {
        let mut connection = self.connection.clone();
        let remaining: i64 = self
            .gate
            .key(key.to_string())
            .arg(GATE_UNAVAILABLE)
            .invoke_async(&mut connection)
            .await?;
        debug!(%key, remaining, "Gate evaluated");
        Ok(remaining)
    }

    async fn increment(&self, key: &CacheKey) -> Result<i64, CounterError> {
        let mut connection = self.connection.clone();
        Ok(connection.incr(key.to_string(), 1).await?)
    }

    async fn set(&self, key: &CacheKey, value: i64) -> Result<(), CounterError> {
        let mut connection = self.connection.clone();
        let () = connection.set(key.to_string(), value).await?;
        Ok(())
    }

    async fn get(&self, key: &CacheKey) -> Result<Option<i64>, CounterError> {
        let mut connection = self.connection.clone();
        Ok(connection.get(key.to_string()).await?)
    }
}
