use log::warn;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use sha2::{Digest, Sha256};

#[derive(Debug, PartialEq, Eq)]
pub enum Decision {
    Skip,
    Accept,
}

/// Content-addressed dedup against a shared KV store. Any store failure
/// degrades to `Accept` rather than going fatal.
pub struct IdempotencyStore {
    conn: Option<ConnectionManager>,
    ttl_seconds: u64,
}

impl IdempotencyStore {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> Self {
        match redis::Client::open(redis_url) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => IdempotencyStore {
                    conn: Some(conn),
                    ttl_seconds,
                },
                Err(e) => {
                    warn!("redis not reachable at {redis_url}: {e}. Proceeding without idempotency.");
                    IdempotencyStore {
                        conn: None,
                        ttl_seconds,
                    }
                }
            },
            Err(e) => {
                warn!("invalid redis url {redis_url}: {e}. Proceeding without idempotency.");
                IdempotencyStore {
                    conn: None,
                    ttl_seconds,
                }
            }
        }
    }

    fn fingerprint(payload_bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload_bytes);
        format!("{:x}", hasher.finalize())
    }

    pub async fn check_and_mark(&mut self, topic: &str, key: &str, payload_bytes: &[u8]) -> Decision {
        let Some(conn) = self.conn.as_mut() else {
            return Decision::Accept;
        };
        let redis_key = format!("processed:{topic}:{key}");
        let digest = Self::fingerprint(payload_bytes);

        let prev: Result<Option<String>, redis::RedisError> = conn.get(&redis_key).await;
        match prev {
            Ok(Some(existing)) if existing == digest => Decision::Skip,
            Ok(_) => {
                if let Err(e) = conn
                    .set_ex::<_, _, ()>(&redis_key, &digest, self.ttl_seconds)
                    .await
                {
                    warn!("redis set failed for {redis_key}: {e}");
                }
                Decision::Accept
            }
            Err(e) => {
                warn!("redis get failed for {redis_key}: {e}");
                Decision::Accept
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_of_empty_bytes_is_stable() {
        let a = IdempotencyStore::fingerprint(b"");
        let b = IdempotencyStore::fingerprint(b"");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_differs_on_content() {
        let a = IdempotencyStore::fingerprint(b"{\"id\":\"c1\"}");
        let b = IdempotencyStore::fingerprint(b"{\"id\":\"c2\"}");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn disconnected_store_always_accepts() {
        let mut store = IdempotencyStore {
            conn: None,
            ttl_seconds: 86_400,
        };
        assert_eq!(
            store.check_and_mark("customer", "c1", b"payload").await,
            Decision::Accept
        );
        assert_eq!(
            store.check_and_mark("customer", "c1", b"payload").await,
            Decision::Accept
        );
    }
}
