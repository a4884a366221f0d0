//! Redis-backed key-value store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, Script};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::store::KeyValueStore;

/// Deletes KEYS[1] only while it still holds ARGV[1].
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Key-value store on a shared Redis instance.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    release_script: Script,
}

impl RedisStore {
    /// Connect to Redis.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        info!("Connecting to Redis");
        let client = Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        info!("Redis connection established");

        Ok(Self {
            connection,
            release_script: Script::new(COMPARE_AND_DELETE),
        })
    }

    fn ttl_millis(ttl: Duration) -> u64 {
        (ttl.as_millis() as u64).max(1)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(Self::ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let mut conn = self.connection.clone();
        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await?;
        debug!(key = %key, deleted, "Compare-and-delete executed");
        Ok(deleted > 0)
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(StoreError::Unavailable(format!("unexpected PING reply: {pong}")));
        }
        Ok(())
    }
}
