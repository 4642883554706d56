use {
    crate::{
        api::{
            ApiState,
            RestError,
        },
        bid::service::place_bid::PlaceBidInput,
        server::{
            EXIT_CHECK_INTERVAL,
            SHOULD_EXIT,
        },
    },
    anyhow::{
        anyhow,
        Result,
    },
    auction_api_types::{
        ws::{
            ClientMessage,
            ServerMessage,
        },
        AuctionId,
        UserId,
    },
    axum::{
        extract::{
            ws::{
                Message,
                WebSocket,
            },
            Path,
            Query,
            State,
            WebSocketUpgrade,
        },
        response::IntoResponse,
    },
    futures::{
        stream::{
            SplitSink,
            SplitStream,
        },
        SinkExt,
        StreamExt,
    },
    serde::Deserialize,
    std::{
        collections::HashMap,
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
        },
    },
    time::OffsetDateTime,
    tokio::sync::{
        mpsc,
        Mutex,
    },
};

pub type SessionId = usize;

const NOTIFICATIONS_CHAN_LEN: usize = 1000;

#[derive(Clone, Debug)]
pub enum SessionEvent {
    Message(ServerMessage),
    /// Forces the session's actor to close the socket and exit.
    Close,
}

/// One registered client session. The registry owns the only path to the
/// session's outbound queue; the actor on the other end owns the socket.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub user_id:    UserId,
    pub auction_id: AuctionId,
    sender:         mpsc::Sender<SessionEvent>,
}

impl SessionHandle {
    fn send(&self, event: SessionEvent) -> bool {
        // No backpressure on fan-out: a full queue means the session is too
        // slow and the message is dropped.
        self.sender.try_send(event).is_ok()
    }
}

#[derive(Default)]
struct RegistryInner {
    by_auction: HashMap<AuctionId, HashMap<UserId, SessionHandle>>,
    by_user:    HashMap<UserId, Vec<SessionHandle>>,
}

impl RegistryInner {
    fn remove(&mut self, user_id: &UserId, auction_id: AuctionId) -> Option<SessionHandle> {
        let removed = self
            .by_auction
            .get_mut(&auction_id)
            .and_then(|sessions| sessions.remove(user_id))?;
        if self
            .by_auction
            .get(&auction_id)
            .is_some_and(HashMap::is_empty)
        {
            self.by_auction.remove(&auction_id);
        }
        if let Some(sessions) = self.by_user.get_mut(user_id) {
            sessions.retain(|session| session.auction_id != auction_id);
            if sessions.is_empty() {
                self.by_user.remove(user_id);
            }
        }
        Some(removed)
    }
}

/// Live sessions grouped by auction and by user. Both indices mutate under
/// one exclusive lock; the lock is held only for index work, never across a
/// socket send.
pub struct SessionRegistry {
    session_counter: AtomicUsize,
    inner:           Mutex<RegistryInner>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            session_counter: AtomicUsize::new(0),
            inner:           Mutex::new(RegistryInner::default()),
        }
    }

    pub fn next_session_id(&self) -> SessionId {
        self.session_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a session, replacing (and closing) any earlier session for
    /// the same `(user, auction)` pair in this process.
    pub async fn register(&self, handle: SessionHandle) {
        let previous = {
            let mut inner = self.inner.lock().await;
            let previous = inner.remove(&handle.user_id, handle.auction_id);
            inner
                .by_auction
                .entry(handle.auction_id)
                .or_default()
                .insert(handle.user_id.clone(), handle.clone());
            inner
                .by_user
                .entry(handle.user_id.clone())
                .or_default()
                .push(handle.clone());
            previous
        };
        if let Some(previous) = previous {
            previous.send(SessionEvent::Close);
        }
        tracing::info!(
            user_id = %handle.user_id,
            auction_id = %handle.auction_id,
            "Session registered",
        );
    }

    /// Remove a session, but only when it is still the one the id names;
    /// a session replaced by a newer registration must not unregister its
    /// replacement on the way out.
    pub async fn unregister(&self, user_id: &UserId, auction_id: AuctionId, session_id: SessionId) {
        let removed = {
            let mut inner = self.inner.lock().await;
            match inner
                .by_auction
                .get(&auction_id)
                .and_then(|sessions| sessions.get(user_id))
            {
                Some(current) if current.session_id == session_id => {
                    inner.remove(user_id, auction_id)
                }
                _ => None,
            }
        };
        if let Some(removed) = removed {
            removed.send(SessionEvent::Close);
            tracing::info!(user_id = %user_id, auction_id = %auction_id, "Session unregistered");
        }
    }

    /// Close and drop every session of an auction. The only operation that
    /// touches other users' index entries on an auction's behalf.
    pub async fn close_auction(&self, auction_id: AuctionId) {
        let handles: Vec<SessionHandle> = {
            let mut inner = self.inner.lock().await;
            let users: Vec<UserId> = inner
                .by_auction
                .get(&auction_id)
                .map(|sessions| sessions.keys().cloned().collect())
                .unwrap_or_default();
            users
                .iter()
                .filter_map(|user_id| inner.remove(user_id, auction_id))
                .collect()
        };
        for handle in &handles {
            handle.send(SessionEvent::Close);
        }
        tracing::info!(
            auction_id = %auction_id,
            sessions = handles.len(),
            "Sessions closed for auction",
        );
    }

    /// Best-effort fan-out to every session of an auction: failures are
    /// logged and the loop moves on.
    pub async fn broadcast_to_auction(&self, auction_id: AuctionId, message: &ServerMessage) {
        let handles: Vec<SessionHandle> = {
            let inner = self.inner.lock().await;
            inner
                .by_auction
                .get(&auction_id)
                .map(|sessions| sessions.values().cloned().collect())
                .unwrap_or_default()
        };
        for handle in handles {
            if !handle.send(SessionEvent::Message(message.clone())) {
                tracing::warn!(
                    user_id = %handle.user_id,
                    auction_id = %auction_id,
                    "Failed to queue broadcast for session",
                );
            }
        }
    }

    /// Deliver to every session of one user, across auctions.
    pub async fn notify_user(&self, user_id: &UserId, message: &ServerMessage) {
        let handles: Vec<SessionHandle> = {
            let inner = self.inner.lock().await;
            inner.by_user.get(user_id).cloned().unwrap_or_default()
        };
        for handle in handles {
            if !handle.send(SessionEvent::Message(message.clone())) {
                tracing::warn!(user_id = %user_id, "Failed to queue message for user session");
            }
        }
    }
}

#[cfg(test)]
impl SessionRegistry {
    pub async fn register_for_test(
        &self,
        user_id: &str,
        auction_id: AuctionId,
    ) -> mpsc::Receiver<SessionEvent> {
        let (sender, receiver) = mpsc::channel(NOTIFICATIONS_CHAN_LEN);
        self.register(SessionHandle {
            session_id: self.next_session_id(),
            user_id: user_id.to_string(),
            auction_id,
            sender,
        })
        .await;
        receiver
    }

    pub async fn is_empty_for_auction(&self, auction_id: AuctionId) -> bool {
        !self
            .inner
            .lock()
            .await
            .by_auction
            .contains_key(&auction_id)
    }

    pub async fn user_session_count(&self, user_id: &str) -> usize {
        self.inner
            .lock()
            .await
            .by_user
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    user_id: UserId,
}

/// Session admission: the auction must exist durably, must not be over,
/// and the caller must identify itself. Early connections (before the
/// start time) are admitted; their bids reject until the auction starts.
pub async fn ws_route_handler(
    ws: WebSocketUpgrade,
    Path(auction_id): Path<AuctionId>,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<ApiState>>,
) -> Result<impl IntoResponse, RestError> {
    let auction = state.lifecycle.get_auction_by_id(auction_id).await?;
    if OffsetDateTime::now_utc() > auction.end_time || auction.status.is_terminal() {
        tracing::info!(auction_id = %auction_id, "Rejected session, auction is over");
        return Err(RestError::AuctionClosed);
    }
    if query.user_id.is_empty() {
        return Err(RestError::BadParameters("user_id required".to_string()));
    }
    if query.user_id.contains(':') {
        return Err(RestError::BadParameters(
            "user_id must not contain ':'".to_string(),
        ));
    }

    Ok(ws.on_upgrade(move |socket| websocket_handler(socket, state, auction_id, query.user_id)))
}

async fn websocket_handler(
    stream: WebSocket,
    state: Arc<ApiState>,
    auction_id: AuctionId,
    user_id: UserId,
) {
    let session_id = state.registry.next_session_id();
    let (notify_sender, notify_receiver) = mpsc::channel(NOTIFICATIONS_CHAN_LEN);
    let (sender, receiver) = stream.split();

    state
        .registry
        .register(SessionHandle {
            session_id,
            user_id: user_id.clone(),
            auction_id,
            sender: notify_sender,
        })
        .await;
    state.bids.warm_shadow_cache(auction_id).await;

    let mut subscriber = Subscriber::new(
        session_id,
        user_id.clone(),
        auction_id,
        state.clone(),
        notify_receiver,
        receiver,
        sender,
    );
    subscriber.run().await;

    state
        .registry
        .unregister(&user_id, auction_id, session_id)
        .await;
}

/// Actor owning one websocket connection: forwards queued server messages
/// out and feeds inbound `place_bid`/`ping` messages into the evaluator.
pub struct Subscriber {
    session_id:          SessionId,
    user_id:             UserId,
    auction_id:          AuctionId,
    state:               Arc<ApiState>,
    closed:              bool,
    notify_receiver:     mpsc::Receiver<SessionEvent>,
    receiver:            SplitStream<WebSocket>,
    sender:              SplitSink<WebSocket, Message>,
    exit_check_interval: tokio::time::Interval,
}

impl Subscriber {
    fn new(
        session_id: SessionId,
        user_id: UserId,
        auction_id: AuctionId,
        state: Arc<ApiState>,
        notify_receiver: mpsc::Receiver<SessionEvent>,
        receiver: SplitStream<WebSocket>,
        sender: SplitSink<WebSocket, Message>,
    ) -> Self {
        Self {
            session_id,
            user_id,
            auction_id,
            state,
            closed: false,
            notify_receiver,
            receiver,
            sender,
            exit_check_interval: tokio::time::interval(EXIT_CHECK_INTERVAL),
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&mut self) {
        while !self.closed {
            if let Err(err) = self.handle_next().await {
                tracing::debug!(session_id = self.session_id, error = ?err, "Closing session");
                break;
            }
        }
    }

    async fn handle_next(&mut self) -> Result<()> {
        tokio::select! {
            maybe_event = self.notify_receiver.recv() => {
                match maybe_event {
                    Some(SessionEvent::Message(message)) => self.send(&message).await,
                    Some(SessionEvent::Close) | None => {
                        self.sender.close().await?;
                        self.closed = true;
                        Ok(())
                    }
                }
            },
            maybe_message_or_err = self.receiver.next() => {
                self.handle_client_message(
                    maybe_message_or_err.ok_or(anyhow!("Client channel is closed"))??
                ).await
            },
            _ = self.exit_check_interval.tick() => {
                if SHOULD_EXIT.load(Ordering::Acquire) {
                    self.sender.close().await?;
                    self.closed = true;
                    return Err(anyhow!("Application is shutting down. Closing connection."));
                }
                Ok(())
            }
        }
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<()> {
        self.sender
            .send(serde_json::to_string(message)?.into())
            .await?;
        Ok(())
    }

    async fn handle_client_message(&mut self, message: Message) -> Result<()> {
        let text = match message {
            Message::Close(_) => {
                self.sender.close().await?;
                self.closed = true;
                return Ok(());
            }
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8_lossy(&data).to_string(),
            // Axum answers pings on its own.
            Message::Ping(_) | Message::Pong(_) => return Ok(()),
        };

        match serde_json::from_str::<ClientMessage>(&text) {
            Ok(ClientMessage::Ping) => self.send(&ServerMessage::Pong).await,
            Ok(ClientMessage::PlaceBid { amount }) => self.handle_place_bid(amount).await,
            Err(err) => {
                // Well-formed messages of an unknown type are ignored;
                // everything else is a protocol error answered on-session.
                if serde_json::from_str::<serde_json::Value>(&text)
                    .is_ok_and(|value| value.get("type").is_some())
                {
                    return Ok(());
                }
                self.send(&ServerMessage::Error {
                    message: err.to_string(),
                })
                .await
            }
        }
    }

    async fn handle_place_bid(&mut self, amount: String) -> Result<()> {
        let amount = match amount.parse() {
            Ok(amount) => amount,
            Err(_) => {
                return self
                    .send(&ServerMessage::Error {
                        message: "invalid amount format".to_string(),
                    })
                    .await;
            }
        };
        let input = PlaceBidInput {
            auction_id: self.auction_id,
            user_id: self.user_id.clone(),
            amount,
        };
        if !input.amount.is_positive() {
            return self
                .send(&ServerMessage::Error {
                    message: "amount must be positive".to_string(),
                })
                .await;
        }
        if let Err(err) = self.state.bids.place_bid(input).await {
            tracing::error!(session_id = self.session_id, error = ?err, "Failed to place bid");
            self.send(&ServerMessage::Error {
                message: "failed to place bid".to_string(),
            })
            .await?;
        }
        Ok(())
    }
}
