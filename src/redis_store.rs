use crate::config::MutexConfig;
use crate::error::{Error, Result};
use crate::router::{Router, Watch};
use crate::store::Store;
use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::{mpsc, OnceCell};
use tracing::warn;

/// Redis-backed [`Store`].
///
/// Ordinary commands share one lazily-created multiplexed connection. The
/// pub/sub side needs its own dedicated connection (a subscribing connection
/// cannot interleave ordinary commands), also created lazily on the first
/// `watch` and kept for the life of the store. A single driver task owns it
/// and fans incoming messages out through the router; a channel is
/// unsubscribed after each delivery and resubscribed on demand.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<MultiplexedConnection>,
    router: Arc<Router>,
    sub_tx: OnceCell<mpsc::UnboundedSender<String>>,
}

impl RedisStore {
    pub fn new(config: &MutexConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())
            .map_err(|err| Error::Config(format!("bad store address: {err}")))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            router: Arc::new(Router::new()),
            sub_tx: OnceCell::new(),
        })
    }

    async fn conn(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .conn
            .get_or_try_init(|| async { self.client.get_multiplexed_async_connection().await })
            .await?;
        Ok(conn.clone())
    }

    /// Subscribe-request handle for the driver task, starting the task on
    /// first use.
    async fn subscriber(&self) -> Result<mpsc::UnboundedSender<String>> {
        let sub_tx = self
            .sub_tx
            .get_or_try_init(|| async {
                let pubsub = self.client.get_async_pubsub().await?;
                let (mut sink, mut stream) = pubsub.split();
                let (sub_tx, mut sub_rx) = mpsc::unbounded_channel::<String>();
                let (unsub_tx, mut unsub_rx) = mpsc::unbounded_channel::<String>();
                self.router.set_unsubscriber(unsub_tx);
                let router = Arc::clone(&self.router);
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            Some(channel) = sub_rx.recv() => {
                                if let Err(err) = sink.subscribe(&channel).await {
                                    warn!(channel = %channel, error = %err, "subscribe failed, waiter will time out");
                                }
                            }
                            Some(channel) = unsub_rx.recv() => {
                                let _ = sink.unsubscribe(&channel).await;
                            }
                            message = stream.next() => match message {
                                Some(message) => {
                                    let channel = message.get_channel_name().to_string();
                                    router.dispatch(&channel);
                                    // One delivery per subscription.
                                    let _ = sink.unsubscribe(&channel).await;
                                }
                                None => {
                                    warn!("subscriber connection closed, pending waiters will time out");
                                    break;
                                }
                            },
                            else => break,
                        }
                    }
                });
                Ok::<_, redis::RedisError>(sub_tx)
            })
            .await?;
        Ok(sub_tx.clone())
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.conn.initialized())
            .field("subscribing", &self.sub_tx.initialized())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn set_if_absent(&self, key: &str, value: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        let created: bool = conn.set_nx(key, value).await?;
        Ok(created)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>> {
        let mut conn = self.conn().await?;
        let value: Option<i64> = conn.get(key).await?;
        Ok(value)
    }

    async fn get_set(&self, key: &str, value: i64) -> Result<Option<i64>> {
        let mut conn = self.conn().await?;
        let prior: Option<i64> = conn.getset(key, value).await?;
        Ok(prior)
    }

    async fn delete_and_publish(&self, key: &str, channel: &str, payload: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .atomic()
            .del(key)
            .ignore()
            .publish(channel, payload)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn keys_by_pattern(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn.keys(pattern).await?;
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let mut conn = self.conn().await?;
        let values: Vec<Option<i64>> = conn.mget(keys).await?;
        Ok(values)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    async fn watch(&self, channel: &str) -> Result<Watch> {
        let sub_tx = self.subscriber().await?;
        let (watch, first) = self.router.register(channel);
        if first {
            sub_tx
                .send(channel.to_string())
                .map_err(|_| Error::Store("subscriber task stopped".to_string()))?;
        }
        Ok(watch)
    }
}
