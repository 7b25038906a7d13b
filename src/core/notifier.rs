use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Listener = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 無內容的變更廣播；訂閱者收到通知後自行回 store 重新讀取
#[derive(Default)]
pub struct ChangeNotifier {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 回呼在鎖外執行，清單本身不會處於半更新狀態，所以 poison 後照常沿用
    fn listeners(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            tracing::warn!("⚠️ Change notifier lock was poisoned, recovering subscriber list");
            poisoned.into_inner()
        })
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners().len()
    }

    /// 先複製訂閱清單再呼叫，讓訂閱者可以在回呼裡讀寫 store 或取消訂閱
    pub fn notify(&self) {
        let snapshot: Vec<Listener> = self.listeners().iter().map(|(_, l)| Arc::clone(l)).collect();

        tracing::debug!("📣 Notifying {} subscriber(s)", snapshot.len());
        for listener in snapshot {
            listener();
        }
    }
}

impl std::fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
