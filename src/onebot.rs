//! The runtime orchestrator: owns the handler and the broadcaster and runs
//! the configured transports.

use crate::action::{retcode, Handler, Request, Response, ResponseWriter};
use crate::comm;
use crate::config::{Config, HeartbeatConfig};
use crate::error::Result;
use crate::event::{AnyEvent, Broadcaster, EventSubscription, HeartbeatEvent, SubscriptionId};
use crate::types::{BotSelf, Encoding};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// A OneBot implementation instance.
///
/// Configure it through `&mut self` (install the handler), then wrap it in an
/// [`Arc`] and call [`OneBot::run`]. Events can be pushed from any task
/// through the shared handle.
///
/// ```ignore
/// let mut ob = OneBot::new("walle", BotSelf::new("myplat", "bot"), config);
/// ob.handle(mux);
/// let ob = Arc::new(ob);
/// tokio::spawn(Arc::clone(&ob).run());
/// ob.push(event);
/// ```
pub struct OneBot {
    impl_name: String,
    platform: String,
    bot_self: Option<BotSelf>,
    config: Config,
    handler: Option<Box<dyn Handler>>,
    broadcaster: Broadcaster,
    cancel: CancellationToken,
}

impl OneBot {
    /// Runtime serving exactly one bot.
    ///
    /// The bot's platform doubles as the extended action prefix.
    pub fn new(impl_name: impl Into<String>, bot_self: BotSelf, config: Config) -> Self {
        let platform = bot_self.platform.clone();
        Self::build(impl_name.into(), platform, Some(bot_self), config)
    }

    /// Runtime serving several bots of one platform.
    ///
    /// Events must be pushed with [`OneBot::push_with_self`], and handlers
    /// resolve the target bot from [`Request::bot_self`].
    pub fn new_multi_self(
        impl_name: impl Into<String>,
        platform: impl Into<String>,
        config: Config,
    ) -> Self {
        Self::build(impl_name.into(), platform.into(), None, config)
    }

    fn build(impl_name: String, platform: String, bot_self: Option<BotSelf>, config: Config) -> Self {
        if platform.is_empty() {
            warn!("platform is empty, extended actions will not be recognized as intended");
        }
        let broadcaster = Broadcaster::new(config.event_buffer_size);
        Self {
            impl_name,
            platform,
            bot_self,
            config,
            handler: None,
            broadcaster,
            cancel: CancellationToken::new(),
        }
    }

    pub fn impl_name(&self) -> &str {
        &self.impl_name
    }

    /// Platform name, also the prefix of extended actions.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// The single bot served, `None` on multi-account runtimes.
    pub fn bot_self(&self) -> Option<&BotSelf> {
        self.bot_self.as_ref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Install the action handler, replacing any previous one.
    pub fn handle(&mut self, handler: impl Handler + 'static) {
        self.handler = Some(Box::new(handler));
    }

    // --- Events ---

    /// Broadcast an event, attributing it to this runtime's bot.
    ///
    /// An event that already names a bot keeps it. Returns `false` if the
    /// event was invalid and dropped.
    pub fn push<E: AnyEvent>(&self, mut event: E) -> bool {
        if let Some(bot_self) = &self.bot_self {
            let base = event.base_mut();
            if base.self_.is_none() {
                base.self_ = Some(bot_self.clone());
            }
        }
        self.broadcaster.broadcast(&mut event)
    }

    /// Broadcast an event on behalf of a specific bot.
    pub fn push_with_self<E: AnyEvent>(&self, mut event: E, bot_self: BotSelf) -> bool {
        event.base_mut().self_ = Some(bot_self);
        self.broadcaster.broadcast(&mut event)
    }

    pub fn open_listen_chan(&self) -> EventSubscription {
        self.broadcaster.open_listen_chan()
    }

    pub fn close_listen_chan(&self, id: SubscriptionId) {
        self.broadcaster.close_listen_chan(id)
    }

    // --- Actions ---

    /// Decode a request, treating `<platform>_` names as extended actions.
    pub fn decode_request(&self, bytes: &[u8], encoding: Encoding) -> Result<Request> {
        Request::decode(bytes, encoding, &self.platform)
    }

    /// `UNKNOWN_SELF` failure when a single-bot runtime is asked to act as
    /// another bot; `None` when the request may proceed.
    pub fn reject_foreign_self(&self, request: &Request) -> Option<Response> {
        let own = self.bot_self.as_ref()?;
        let requested = request.bot_self.as_ref()?;
        if own == requested {
            return None;
        }
        Some(
            Response::failed(retcode::UNKNOWN_SELF, format!("unknown bot `{requested}`"))
                .with_echo(request.echo.clone()),
        )
    }

    /// Dispatch a request to the installed handler.
    ///
    /// The response always carries the request's echo.
    pub fn handle_request(&self, request: &Request) -> Response {
        debug!(action = %request.action, "handling action request");

        if let Some(rejected) = self.reject_foreign_self(request) {
            return rejected;
        }

        let mut w = ResponseWriter::new();
        match &self.handler {
            Some(handler) => handler.handle_action(&mut w, request),
            None => w.write_failed(
                retcode::UNSUPPORTED_ACTION,
                format!("action `{}` not found", request.action),
            ),
        }
        w.into_response(request.echo.clone())
    }

    // --- Lifecycle ---

    /// Token cancelled by [`OneBot::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop every transport. [`OneBot::run`] returns once they have exited.
    pub fn shutdown(&self) {
        info!("OneBot shutting down");
        self.cancel.cancel();
    }

    /// Start every configured transport and run until shutdown.
    ///
    /// All listeners are bound before anything is served, so a bind failure
    /// is returned without starting any transport.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut http_listeners = Vec::with_capacity(self.config.comm.http.len());
        for c in &self.config.comm.http {
            http_listeners.push(comm::bind(&c.addr()).await?);
        }
        let mut ws_listeners = Vec::with_capacity(self.config.comm.ws.len());
        for c in &self.config.comm.ws {
            ws_listeners.push(comm::bind(&c.addr()).await?);
        }

        let mut tasks = JoinSet::new();
        for listener in http_listeners {
            tasks.spawn(comm::http::serve_http(
                listener,
                Arc::clone(&self),
                self.cancel.child_token(),
            ));
        }
        for listener in ws_listeners {
            tasks.spawn(comm::ws::serve_ws(
                listener,
                Arc::clone(&self),
                self.cancel.child_token(),
            ));
        }
        for c in &self.config.comm.http_webhook {
            tasks.spawn(comm::webhook::run_webhook(
                c.clone(),
                Arc::clone(&self),
                self.cancel.child_token(),
            ));
        }
        if self.config.heartbeat.enabled {
            tasks.spawn(run_heartbeat(
                self.config.heartbeat.clone(),
                Arc::clone(&self),
                self.cancel.child_token(),
            ));
        }

        info!(
            impl_name = %self.impl_name,
            platform = %self.platform,
            tasks = tasks.len(),
            "OneBot running"
        );

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                Some(joined) = tasks.join_next() => log_task_exit(joined),
            }
        }
        while let Some(joined) = tasks.join_next().await {
            log_task_exit(joined);
        }

        info!("OneBot stopped");
        Ok(())
    }
}

fn log_task_exit(joined: std::result::Result<Result<()>, tokio::task::JoinError>) {
    match joined {
        Ok(Ok(())) => debug!("transport task finished"),
        Ok(Err(e)) => error!(error = %e, "transport task failed"),
        Err(e) => error!(error = %e, "transport task panicked"),
    }
}

/// Push a meta heartbeat every interval until cancelled.
async fn run_heartbeat(
    config: HeartbeatConfig,
    ob: Arc<OneBot>,
    cancel: CancellationToken,
) -> Result<()> {
    let period = config.interval();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                ob.push(HeartbeatEvent::make_heartbeat_event(config.interval_ms));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, ActionMux, Params, Status};
    use crate::event::{MessageEvent, NoticeEvent};
    use crate::message::{Message, Segment};
    use serde_json::json;
    use std::time::Duration;

    fn single() -> OneBot {
        OneBot::new("test", BotSelf::new("myplat", "bot"), Config::default())
    }

    #[test]
    fn test_push_fills_self() {
        let ob = single();
        let mut sub = ob.open_listen_chan();

        let event = MessageEvent::make_private_message_event("1", Message::from(vec![Segment::text("hi")]), "42");
        assert!(ob.push(event));

        let received = sub.try_recv().unwrap();
        assert_eq!(received.value["self"], json!({"platform": "myplat", "user_id": "bot"}));
    }

    #[test]
    fn test_multi_self_requires_explicit_self() {
        let ob = OneBot::new_multi_self("test", "myplat", Config::default());
        let mut sub = ob.open_listen_chan();

        assert!(!ob.push(NoticeEvent::make_friend_increase_notice_event("1")));
        assert!(ob.push_with_self(
            NoticeEvent::make_friend_increase_notice_event("1"),
            BotSelf::new("myplat", "second"),
        ));

        let received = sub.try_recv().unwrap();
        assert_eq!(received.value["self"]["user_id"], "second");
    }

    #[test]
    fn test_request_for_other_self_is_rejected() {
        let mut ob = single();
        let mut mux = ActionMux::new();
        mux.register_fn("get_version", |w, _| w.write_data("1"));
        ob.handle(mux);

        let request = Request::new(Action::core("get_version"), Params::new())
            .with_echo(json!(1))
            .with_self(BotSelf::new("myplat", "other"));
        let response = ob.handle_request(&request);
        assert_eq!(response.retcode, retcode::UNKNOWN_SELF);
        assert_eq!(response.echo, json!(1));

        let request = request.with_self(BotSelf::new("myplat", "bot"));
        assert!(ob.handle_request(&request).is_ok());
    }

    #[test]
    fn test_no_handler_is_not_found() {
        let ob = single();
        let response = ob.handle_request(&Request::new(Action::core("get_status"), Params::new()));
        assert_eq!(response.status, Status::Failed);
        assert_eq!(response.retcode, retcode::UNSUPPORTED_ACTION);
    }

    #[test]
    fn test_extended_prefix_is_platform() {
        let ob = single();
        let request = ob
            .decode_request(br#"{"action":"myplat_some_action","params":{}}"#, Encoding::Json)
            .unwrap();
        assert_eq!(request.action, Action::extended("myplat", "some_action"));
    }

    #[tokio::test]
    async fn test_run_without_transports_stops_on_shutdown() {
        let ob = Arc::new(single());
        let handle = tokio::spawn(Arc::clone(&ob).run());
        ob.shutdown();
        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_heartbeat_pushes_meta_events() {
        let mut config = Config::default();
        config.heartbeat.enabled = true;
        config.heartbeat.interval_ms = 20;
        let ob = Arc::new(OneBot::new("test", BotSelf::new("myplat", "bot"), config));
        let mut sub = ob.open_listen_chan();

        let handle = tokio::spawn(Arc::clone(&ob).run());
        let event = tokio::time::timeout(Duration::from_secs(5), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.value["type"], "meta");
        assert_eq!(event.value["detail_type"], "heartbeat");
        assert_eq!(event.value["interval"], 20);

        ob.shutdown();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bind_failure_is_returned() {
        let taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let mut config = Config::default();
        config.comm.http.push(crate::config::HttpConfig {
            host: "127.0.0.1".to_string(),
            port,
        });
        let ob = Arc::new(OneBot::new("test", BotSelf::new("myplat", "bot"), config));
        let err = Arc::clone(&ob).run().await.unwrap_err();
        assert!(matches!(err, crate::error::OneBotError::Bind { .. }));
    }
}
