//! Local mirror of the engine's running state.
//!
//! Fed by the `clicker-state-changed` push stream plus one pull at mount.
//! The mirror has exactly one writer: the tasks owned by [`StateChannel`].

use crate::engine::EngineClient;
use crate::EngineState;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

struct Mirror {
    state: EngineState,
    mounted: bool,
    /// Push events applied so far; a pull issued before the latest push is stale.
    pushes: u64,
}

struct Shared {
    mirror: Mutex<Mirror>,
    tx: watch::Sender<EngineState>,
}

impl Shared {
    fn apply_push(&self, state: EngineState) {
        let mut mirror = self.mirror.lock().unwrap();
        if !mirror.mounted {
            return;
        }
        mirror.pushes += 1;
        mirror.state = state.clone();
        self.tx.send_replace(state);
    }

    fn apply_pull(&self, state: EngineState, issued_after: u64) {
        let mut mirror = self.mirror.lock().unwrap();
        if !mirror.mounted {
            debug!("Discarding state pull that finished after unmount");
            return;
        }
        if mirror.pushes != issued_after {
            debug!("Discarding state pull overtaken by a push event");
            return;
        }
        mirror.state = state.clone();
        self.tx.send_replace(state);
    }
}

pub struct StateChannel {
    shared: Arc<Shared>,
    subscription: Option<JoinHandle<()>>,
}

impl StateChannel {
    /// Start mirroring. Must be called inside a Tokio runtime.
    ///
    /// The subscription is in place before the pull is issued, so no event
    /// published after mount can be missed.
    pub fn mount(engine: Arc<dyn EngineClient>) -> Self {
        let (tx, _) = watch::channel(EngineState::default());
        let shared = Arc::new(Shared {
            mirror: Mutex::new(Mirror {
                state: EngineState::default(),
                mounted: true,
                pushes: 0,
            }),
            tx,
        });

        let rx = engine.subscribe_state();
        let subscription = tokio::spawn(follow_events(rx, shared.clone()));

        let issued_after = shared.mirror.lock().unwrap().pushes;
        let pull_shared = shared.clone();
        tokio::spawn(async move {
            match engine.get_clicker_state().await {
                Ok(reply) => pull_shared.apply_pull(reply.into(), issued_after),
                Err(e) => warn!(error = %e, "Initial engine state query failed"),
            }
        });

        info!("State channel mounted");
        Self {
            shared,
            subscription: Some(subscription),
        }
    }

    pub fn current(&self) -> EngineState {
        self.shared.mirror.lock().unwrap().state.clone()
    }

    /// Receiver that observes every change to the mirror.
    pub fn watch(&self) -> watch::Receiver<EngineState> {
        self.shared.tx.subscribe()
    }

    pub fn is_mounted(&self) -> bool {
        self.shared.mirror.lock().unwrap().mounted
    }

    /// Stop mirroring. Later pushes and a still-pending pull are ignored.
    pub fn unmount(&mut self) {
        self.shared.mirror.lock().unwrap().mounted = false;
        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
            info!("State channel unmounted");
        }
    }
}

impl Drop for StateChannel {
    fn drop(&mut self) {
        self.unmount();
    }
}

async fn follow_events(mut rx: broadcast::Receiver<EngineState>, shared: Arc<Shared>) {
    loop {
        match rx.recv().await {
            Ok(state) => {
                debug!(?state, "Engine state pushed");
                shared.apply_push(state);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "State events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Engine event stream closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClickerStateReply, MockEngine};

    fn running(rate: f64) -> EngineState {
        EngineState {
            running: true,
            live_rate: rate,
            active_click_mode: "left".into(),
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_pull_populates_mirror() {
        let engine = Arc::new(MockEngine::new());
        engine.set_state(ClickerStateReply {
            running: true,
            live_rate: 9.5,
            click_mode: "double".into(),
            ..ClickerStateReply::default()
        });

        let channel = StateChannel::mount(engine.clone());
        let mut watch = channel.watch();
        watch.changed().await.unwrap();

        let state = channel.current();
        assert!(state.running);
        assert_eq!(state.live_rate, 9.5);
        assert_eq!(state.active_click_mode, "double");
    }

    #[tokio::test]
    async fn test_push_before_pull_wins() {
        let engine = Arc::new(MockEngine::new());
        let held = engine.hold_state_query();

        let channel = StateChannel::mount(engine.clone());
        let mut watch = channel.watch();

        engine.emit_state(running(14.0));
        watch.changed().await.unwrap();
        assert_eq!(channel.current(), running(14.0));

        held.send(ClickerStateReply::default()).unwrap();
        settle().await;
        assert_eq!(channel.current(), running(14.0));
    }

    #[tokio::test]
    async fn test_pushes_keep_overwriting() {
        let engine = Arc::new(MockEngine::new());
        let channel = StateChannel::mount(engine.clone());
        settle().await;

        engine.emit_state(running(5.0));
        engine.emit_state(EngineState::default());
        settle().await;
        assert_eq!(channel.current(), EngineState::default());
    }

    #[tokio::test]
    async fn test_late_pull_after_unmount_is_ignored() {
        let engine = Arc::new(MockEngine::new());
        let held = engine.hold_state_query();

        let mut channel = StateChannel::mount(engine.clone());
        settle().await;
        channel.unmount();
        assert!(!channel.is_mounted());

        held.send(ClickerStateReply {
            running: true,
            ..ClickerStateReply::default()
        })
        .unwrap();
        settle().await;
        assert_eq!(channel.current(), EngineState::default());
    }

    #[tokio::test]
    async fn test_pushes_after_unmount_leave_mirror_alone() {
        let engine = Arc::new(MockEngine::new());
        let mut channel = StateChannel::mount(engine.clone());
        settle().await;
        engine.emit_state(running(5.0));
        settle().await;
        assert_eq!(channel.current(), running(5.0));

        let watch = channel.watch();
        channel.unmount();
        settle().await;
        assert_eq!(engine.subscriber_count(), 0);

        engine.emit_state(running(20.0));
        settle().await;
        assert_eq!(channel.current(), running(5.0));
        assert!(!watch.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let engine = Arc::new(MockEngine::new());
        let channel = StateChannel::mount(engine.clone());
        assert_eq!(engine.subscriber_count(), 1);

        drop(channel);
        settle().await;
        assert_eq!(engine.subscriber_count(), 0);
    }
}
