use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, warn};

use super::broadcast::Notifier;
use super::connection_manager::ConnectionRegistry;
use super::membership::RoomMembership;
use super::typing::TypingTracker;

/// Configuration for the liveness sweep
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often connections are probed; an unresponsive peer is detected
    /// within two intervals
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

impl HeartbeatConfig {
    /// Reads overrides from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let interval = std::env::var("HEARTBEAT_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| Self::default().interval);

        Self { interval }
    }
}

/// Background task that probes every registered connection each tick and
/// terminates the ones whose previous ping went unanswered, running the same
/// cleanup cascade as an explicit disconnect. Transport-level error delivery
/// is never relied on for dead-peer detection.
pub async fn start_heartbeat_task(
    registry: Arc<dyn ConnectionRegistry>,
    membership: Arc<RoomMembership>,
    typing: Arc<TypingTracker>,
    notifier: Arc<Notifier>,
    config: HeartbeatConfig,
) {
    info!(
        interval_secs = config.interval.as_secs(),
        "Starting heartbeat monitor"
    );

    let mut tick = interval(config.interval);

    loop {
        tick.tick().await;

        let dead = registry.sweep_dead().await;
        for user_id in dead {
            warn!(user_id = %user_id, "Heartbeat timeout, running disconnect cleanup");

            let rooms_left = membership.purge_user(&user_id).await;
            typing.clear_user(&user_id).await;
            notifier.user_offline(&user_id).await;

            debug!(
                user_id = %user_id,
                rooms = rooms_left.len(),
                "Dead connection purged from room subscriptions"
            );
        }

        let connections = registry.connection_count().await;
        debug!(
            connections = connections,
            "Heartbeat sweep complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryChatStore;
    use crate::websockets::connection_manager::{ConnectionHandle, InMemoryConnectionRegistry};
    use crate::websockets::socket::Outbound;
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn test_silent_connection_terminated_within_two_intervals() {
        let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
        let membership = Arc::new(RoomMembership::new());
        let typing = Arc::new(TypingTracker::new(Duration::from_secs(3)));
        let notifier = Arc::new(Notifier::new(
            Arc::new(InMemoryChatStore::new()),
            Arc::clone(&registry),
            Arc::clone(&membership),
        ));

        // A connection that will never answer pings, subscribed and typing
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry
            .register("alice".to_string(), ConnectionHandle::new(tx))
            .await;
        membership.join("r1", "alice").await;
        typing.arm("r1", "alice").await;

        // An observer who should see alice go offline
        let (observer_tx, mut observer_rx) = mpsc::unbounded_channel();
        registry
            .register("bob".to_string(), ConnectionHandle::new(observer_tx))
            .await;

        let config = HeartbeatConfig {
            interval: Duration::from_secs(30),
        };
        tokio::spawn(start_heartbeat_task(
            Arc::clone(&registry),
            Arc::clone(&membership),
            Arc::clone(&typing),
            notifier,
            config,
        ));

        // First sweep fires immediately: both connections are probed
        tokio::task::yield_now().await;
        assert_eq!(rx.recv().await, Some(Outbound::Ping));

        // Only the observer answers before the next sweep
        registry.mark_alive("bob").await;
        tokio::time::advance(Duration::from_secs(31)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Second sweep terminates the silent connection with a close frame
        let mut saw_close = false;
        while let Ok(frame) = rx.try_recv() {
            if matches!(frame, Outbound::Close { .. }) {
                saw_close = true;
            }
        }
        assert!(saw_close, "dead connection should receive a close frame");

        // Full cleanup cascade ran
        assert!(!membership.is_member("r1", "alice").await);
        assert_eq!(typing.pending_count().await, 0);
        assert_eq!(registry.online_user_ids().await, vec!["bob".to_string()]);

        // Observer got the offline presence envelope (between its own probes)
        let mut saw_offline = false;
        while let Ok(frame) = observer_rx.try_recv() {
            if let Outbound::Text(json) = frame {
                if json.contains(r#""type":"user_offline""#) {
                    saw_offline = true;
                }
            }
        }
        assert!(saw_offline, "observer should be told the user went offline");
    }
}
