use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt as _;
use tendermint_rpc::{
    event::{Event, EventData},
    query::EventType,
    Subscription, SubscriptionClient as _, WebSocketClient,
};
use thiserror::Error as ThisError;
use tokio::{
    select,
    sync::mpsc::UnboundedSender,
    task::JoinHandle,
    time::{interval_at, sleep, timeout, Instant},
};
use tracing::{debug, info, warn};

/// Expected chain block time; the polling fallback's tick period.
const BLOCK_PERIOD: Duration = Duration::from_secs(6);

/// Time allowed for establishing the WebSocket subscription.
const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to stay on the polling fallback before the next subscription
/// attempt.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(60);

/// A subscription delivering nothing for this long is considered stale.
const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(60);

/// One pacemaker beat. Polling ticks carry no height.
#[derive(Debug, Copy, Clone)]
pub struct BlockEvent {
    pub height: Option<u64>,
}

#[derive(Debug, ThisError)]
pub enum SubscribeError {
    #[error("Establishing the subscription timed out!")]
    Timeout,
    #[error("{0}")]
    Rpc(#[from] tendermint_rpc::Error),
}

/// Opens new-block subscriptions.
#[async_trait]
pub trait Connect: Send + Sync + 'static {
    type Stream: BlockStream;

    async fn connect(&self) -> Result<Self::Stream, SubscribeError>;
}

/// An established new-block subscription.
#[async_trait]
pub trait BlockStream: Send + Sized + 'static {
    /// The next block event; `None` once the subscription ended.
    async fn next_event(&mut self) -> Option<Result<BlockEvent, SubscribeError>>;

    async fn close(self);
}

/// Source of new-block notifications: a WebSocket subscription guarded by
/// an inactivity timeout, degrading to a fixed-interval ticker whenever the
/// subscription is unavailable.
#[must_use]
pub struct BlockSource<C>
where
    C: Connect,
{
    connector: C,
    events: UnboundedSender<BlockEvent>,
}

impl BlockSource<WsConnector> {
    pub fn new(rpc_url: &str, events: UnboundedSender<BlockEvent>) -> Self {
        Self::with_connector(WsConnector::new(rpc_url), events)
    }
}

impl<C> BlockSource<C>
where
    C: Connect,
{
    pub fn with_connector(connector: C, events: UnboundedSender<BlockEvent>) -> Self {
        Self { connector, events }
    }

    /// Drives the pacemaker until the consumer goes away. Transport
    /// failures never propagate; they degrade to polling and reconnect.
    /// Only the startup attempt runs without ticks; from then on every
    /// subscription attempt is raced against the polling ticker, so the
    /// consumer keeps receiving beats.
    pub async fn run(self) {
        let mut next_session = self.establish().await;

        while !self.events.is_closed() {
            match next_session {
                Some(session) => {
                    info!(target: "blocks", "Block subscription established.");

                    self.pump(session).await;

                    info!(target: "blocks", "Re-establishing block subscription...");

                    next_session = self.reconnect().await;
                }
                None => {
                    self.poll_window().await;

                    next_session = self.reconnect().await;
                }
            }
        }

        info!(target: "blocks", "Block event channel closed. Exiting.");
    }

    /// The startup subscription attempt, within the establishment budget.
    async fn establish(&self) -> Option<C::Stream> {
        match timeout(SUBSCRIBE_TIMEOUT, self.connector.connect()).await {
            Ok(Ok(stream)) => Some(stream),
            Ok(Err(error)) => {
                warn!(
                    target: "blocks",
                    %error,
                    "Couldn't establish block subscription. Falling back to polling.",
                );

                None
            }
            Err(_elapsed) => {
                warn!(
                    target: "blocks",
                    "Block subscription attempt timed out. Falling back to polling.",
                );

                None
            }
        }
    }

    /// A subscription attempt with the pacemaker kept running: polling
    /// ticks continue at the block period while the connection is pending.
    async fn reconnect(&self) -> Option<C::Stream> {
        let attempt = timeout(SUBSCRIBE_TIMEOUT, self.connector.connect());

        tokio::pin!(attempt);

        let mut ticker = interval_at(Instant::now() + BLOCK_PERIOD, BLOCK_PERIOD);

        loop {
            select! {
                result = &mut attempt => {
                    return match result {
                        Ok(Ok(stream)) => Some(stream),
                        Ok(Err(error)) => {
                            warn!(
                                target: "blocks",
                                %error,
                                "Couldn't re-establish block subscription.",
                            );

                            None
                        }
                        Err(_elapsed) => {
                            warn!(
                                target: "blocks",
                                "Block subscription attempt timed out.",
                            );

                            None
                        }
                    };
                }
                _ = ticker.tick() => {
                    if self.events.send(BlockEvent { height: None }).is_err() {
                        return None;
                    }
                }
            }
        }
    }

    /// Forwards block events until the subscription goes stale or closes.
    async fn pump(&self, mut stream: C::Stream) {
        loop {
            match timeout(INACTIVITY_TIMEOUT, stream.next_event()).await {
                Err(_elapsed) => {
                    warn!(
                        target: "blocks",
                        "No block event within the inactivity window. \
                         Considering the subscription stale.",
                    );

                    break;
                }
                Ok(None) => {
                    warn!(target: "blocks", "Block subscription closed by the node.");

                    break;
                }
                Ok(Some(Err(error))) => {
                    warn!(target: "blocks", %error, "Block subscription failed.");

                    break;
                }
                Ok(Some(Ok(event))) => {
                    debug!(target: "blocks", height = event.height, "New block.");

                    if self.events.send(event).is_err() {
                        break;
                    }
                }
            }
        }

        stream.close().await;
    }

    /// Ticks at the expected block rate for one re-subscribe window, so the
    /// queue keeps draining while the subscription is down.
    async fn poll_window(&self) {
        let window = sleep(RESUBSCRIBE_DELAY);

        tokio::pin!(window);

        let mut ticker = interval_at(Instant::now() + BLOCK_PERIOD, BLOCK_PERIOD);

        loop {
            select! {
                () = &mut window => return,
                _ = ticker.tick() => {
                    if self.events.send(BlockEvent { height: None }).is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// WebSocket transport behind the [`Connect`] seam.
pub struct WsConnector {
    ws_url: String,
}

impl WsConnector {
    pub fn new(rpc_url: &str) -> Self {
        Self {
            ws_url: websocket_url(rpc_url),
        }
    }
}

#[async_trait]
impl Connect for WsConnector {
    type Stream = WsSession;

    async fn connect(&self) -> Result<WsSession, SubscribeError> {
        let (client, driver) = WebSocketClient::new(self.ws_url.as_str()).await?;

        let driver = tokio::spawn(async move {
            if let Err(error) = driver.run().await {
                debug!(target: "blocks", %error, "WebSocket driver exited with an error.");
            }
        });

        match client.subscribe(EventType::NewBlock.into()).await {
            Ok(subscription) => Ok(WsSession {
                client,
                driver,
                subscription,
            }),
            Err(error) => {
                driver.abort();

                Err(error.into())
            }
        }
    }
}

pub struct WsSession {
    client: WebSocketClient,
    driver: JoinHandle<()>,
    subscription: Subscription,
}

#[async_trait]
impl BlockStream for WsSession {
    async fn next_event(&mut self) -> Option<Result<BlockEvent, SubscribeError>> {
        self.subscription.next().await.map(|result| {
            result
                .map(|event| BlockEvent {
                    height: block_height(&event),
                })
                .map_err(Into::into)
        })
    }

    async fn close(self) {
        drop(self.subscription);

        if let Err(error) = self.client.close() {
            debug!(target: "blocks", %error, "Closing the WebSocket client failed.");
        }

        self.driver.abort();
    }
}

fn block_height(event: &Event) -> Option<u64> {
    match &event.data {
        EventData::NewBlock { block, .. } | EventData::LegacyNewBlock { block, .. } => {
            block.as_ref().map(|block| block.header.height.value())
        }
        _ => None,
    }
}

fn websocket_url(rpc_url: &str) -> String {
    let rpc_url = rpc_url.trim_end_matches('/');

    let converted = if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        rpc_url.to_owned()
    };

    format!("{converted}/websocket")
}
