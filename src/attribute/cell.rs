//! # Attribute: an observable, typed value cell.
//!
//! An [`Attribute`] stores one [`Value`] of a declared [`DataType`] and fans
//! every write out to its subscribers, then to the outbound communication
//! callback a binding may have attached.
//!
//! ## Write path
//! ```text
//! set_value(v)
//!   ├─► coerce v → declared type (zero value on failure)
//!   ├─► store
//!   ├─► subscribers[0](&v), subscribers[1](&v), ...   (registration order)
//!   └─► communication callback(&v)                     (if attached)
//! ```
//!
//! ## Rules
//! - Fan-out is **synchronous** and runs on the caller's thread.
//! - No lock is held while callbacks run, so a callback may write this or any
//!   other attribute (re-entrant fan-out).
//! - Re-entrant depth is bounded per thread by [`MAX_FANOUT_DEPTH`]; past the
//!   bound the value is stored but fan-out is skipped.
//! - Callbacks must not block.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::value::{DataType, Value};

/// Maximum nesting of `set_value` calls on one thread before fan-out is cut.
pub const MAX_FANOUT_DEPTH: usize = 64;

/// Id used when a subscription is attached without an explicit id.
pub const DEFAULT_SUBSCRIPTION: &str = "default";

/// Callback invoked with the new value after every write.
pub type SubscriptionCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Outbound callback pushing values to an external binding.
pub type CommunicationCallback = Arc<dyn Fn(&Value) + Send + Sync>;

thread_local! {
    static FANOUT_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Decrements the per-thread fan-out depth on drop.
struct DepthGuard;

impl DepthGuard {
    fn enter() -> Option<Self> {
        FANOUT_DEPTH.with(|d| {
            if d.get() >= MAX_FANOUT_DEPTH {
                None
            } else {
                d.set(d.get() + 1);
                Some(DepthGuard)
            }
        })
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        FANOUT_DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
    }
}

/// Observable, typed value cell owned by a data assembly.
pub struct Attribute {
    name: Arc<str>,
    data_type: DataType,
    init_value: RwLock<Value>,
    value: RwLock<Value>,
    subscribers: Mutex<Vec<(Arc<str>, SubscriptionCallback)>>,
    communication: Mutex<Option<CommunicationCallback>>,
}

impl Attribute {
    /// Creates an attribute; `init` is coerced into `data_type`.
    pub fn new(
        name: impl Into<Arc<str>>,
        data_type: DataType,
        init: impl Into<Value>,
    ) -> Arc<Self> {
        let init = init.into().coerce(data_type);
        Arc::new(Self {
            name: name.into(),
            data_type,
            init_value: RwLock::new(init.clone()),
            value: RwLock::new(init),
            subscribers: Mutex::new(Vec::new()),
            communication: Mutex::new(None),
        })
    }

    /// Creates an attribute with one subscription in the default slot.
    pub fn with_subscription(
        name: impl Into<Arc<str>>,
        data_type: DataType,
        init: impl Into<Value>,
        cb: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Arc<Self> {
        let attr = Self::new(name, data_type, init);
        attr.attach_subscription_callback(cb, None);
        attr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Current value (cloned).
    pub fn value(&self) -> Value {
        self.value.read().clone()
    }

    pub fn as_bool(&self) -> bool {
        self.value.read().as_bool()
    }

    pub fn as_int(&self) -> i64 {
        self.value.read().as_int()
    }

    pub fn as_float(&self) -> f64 {
        self.value.read().as_float()
    }

    pub fn as_string(&self) -> String {
        self.value.read().to_string()
    }

    /// Value the attribute was created with (what a binding publishes first).
    pub fn init_value(&self) -> Value {
        self.init_value.read().clone()
    }

    /// Replaces the init value without touching the current value or notifying.
    pub fn set_init_value(&self, v: impl Into<Value>) {
        *self.init_value.write() = v.into().coerce(self.data_type);
    }

    /// Coerces, stores and fans the value out (see module docs).
    pub fn set_value(&self, v: impl Into<Value>) {
        let v = v.into().coerce(self.data_type);
        *self.value.write() = v.clone();
        tracing::trace!(attribute = %self.name, value = %v, "attribute written");

        let Some(_depth) = DepthGuard::enter() else {
            tracing::warn!(
                attribute = %self.name,
                max_depth = MAX_FANOUT_DEPTH,
                "re-entrant fan-out too deep; value stored without notifying subscribers"
            );
            return;
        };

        let subscribers: Vec<SubscriptionCallback> =
            self.subscribers.lock().iter().map(|(_, cb)| Arc::clone(cb)).collect();
        for cb in subscribers {
            cb(&v);
        }

        let comm = self.communication.lock().clone();
        if let Some(comm) = comm {
            comm(&v);
        }
    }

    /// Adds (or replaces, keeping its position) the subscription with `id`.
    ///
    /// `None` addresses the [`DEFAULT_SUBSCRIPTION`] slot.
    pub fn attach_subscription_callback(
        &self,
        cb: impl Fn(&Value) + Send + Sync + 'static,
        id: Option<&str>,
    ) {
        let id: Arc<str> = id.unwrap_or(DEFAULT_SUBSCRIPTION).into();
        let cb: SubscriptionCallback = Arc::new(cb);
        let mut subs = self.subscribers.lock();
        match subs.iter_mut().find(|(k, _)| *k == id) {
            Some(slot) => slot.1 = cb,
            None => subs.push((id, cb)),
        }
    }

    /// Removes the subscription with `id` (default slot for `None`).
    ///
    /// Returns `true` if a subscription was removed.
    pub fn remove_subscription_callback(&self, id: Option<&str>) -> bool {
        let id = id.unwrap_or(DEFAULT_SUBSCRIPTION);
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(k, _)| &**k != id);
        subs.len() != before
    }

    /// True while at least one subscription is attached.
    ///
    /// Bindings expose monitored attributes as writable.
    pub fn is_monitored(&self) -> bool {
        !self.subscribers.lock().is_empty()
    }

    /// Attaches the outbound callback (core → external binding).
    pub fn attach_communication_callback(&self, cb: impl Fn(&Value) + Send + Sync + 'static) {
        *self.communication.lock() = Some(Arc::new(cb));
    }

    pub fn detach_communication_callback(&self) {
        *self.communication.lock() = None;
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("type", &self.data_type)
            .field("value", &*self.value.read())
            .field("monitored", &self.is_monitored())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_failed_coercion_stores_zero() {
        let a = Attribute::new("V", DataType::Int, 5);
        a.set_value("not a number");
        assert_eq!(a.value(), Value::Int(0));
        assert_eq!(a.init_value(), Value::Int(5));
    }

    #[test]
    fn test_subscribers_run_in_registration_order_then_communication() {
        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let a = Attribute::new("V", DataType::Bool, false);
        for id in ["first", "second"] {
            let log = log.clone();
            a.attach_subscription_callback(move |v| log.lock().push(format!("{id}={v}")), Some(id));
        }
        let l = log.clone();
        a.attach_communication_callback(move |v| l.lock().push(format!("comm={v}")));

        a.set_value(true);
        assert_eq!(*log.lock(), vec!["first=true", "second=true", "comm=true"]);
    }

    #[test]
    fn test_replacing_subscription_keeps_position() {
        let log = Arc::new(Mutex::new(Vec::<&'static str>::new()));
        let a = Attribute::new("V", DataType::Int, 0);
        let (l1, l2, l3) = (log.clone(), log.clone(), log.clone());
        a.attach_subscription_callback(move |_| l1.lock().push("a"), Some("a"));
        a.attach_subscription_callback(move |_| l2.lock().push("b"), Some("b"));
        a.attach_subscription_callback(move |_| l3.lock().push("a2"), Some("a"));
        a.set_value(1);
        assert_eq!(*log.lock(), vec!["a2", "b"]);
    }

    #[test]
    fn test_removing_last_subscription_clears_monitored() {
        let a = Attribute::with_subscription("V", DataType::Int, 0, |_| {});
        assert!(a.is_monitored());
        assert!(a.remove_subscription_callback(None));
        assert!(!a.is_monitored());
        assert!(!a.remove_subscription_callback(None));
    }

    #[test]
    fn test_self_clearing_write_is_reentrant() {
        let hits = Arc::new(AtomicUsize::new(0));
        let a = Attribute::new("Req", DataType::Bool, false);
        let weak = Arc::downgrade(&a);
        let h = hits.clone();
        a.attach_subscription_callback(
            move |v| {
                if v.as_bool() {
                    h.fetch_add(1, Ordering::SeqCst);
                    if let Some(a) = weak.upgrade() {
                        a.set_value(false);
                    }
                }
            },
            None,
        );
        a.set_value(true);
        a.set_value(true);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(!a.as_bool());
    }

    #[test]
    fn test_unbounded_recursion_is_cut() {
        let calls = Arc::new(AtomicUsize::new(0));
        let a = Attribute::new("Loop", DataType::Int, 0);
        let weak = Arc::downgrade(&a);
        let c = calls.clone();
        a.attach_subscription_callback(
            move |v| {
                c.fetch_add(1, Ordering::SeqCst);
                if let Some(a) = weak.upgrade() {
                    a.set_value(v.as_int() + 1);
                }
            },
            None,
        );
        a.set_value(1);
        assert_eq!(calls.load(Ordering::SeqCst), MAX_FANOUT_DEPTH);
        assert_eq!(a.as_int(), MAX_FANOUT_DEPTH as i64 + 1);
    }
}
