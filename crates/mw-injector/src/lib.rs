//! Input injection
//!
//! Playback drives simulated input through the [`InputInjector`] trait. The
//! capability is optional: on hosts with no injection backend every call
//! fails with [`InjectorError::Unavailable`], and playback degrades the
//! failed action to a no-op rather than aborting the session.
//!
//! Key names passed here are native symbols ("up", "enter", "space"); the
//! playback engine owns the translation from logical names.

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;
use tracing::debug;

/// Injection errors
#[derive(Debug, Error)]
pub enum InjectorError {
    #[error("input injection is unavailable on this host")]
    Unavailable,

    #[error("unsupported key: {0}")]
    UnsupportedKey(String),

    #[error("injection failed: {0}")]
    Failed(String),
}

/// Result type for injector calls
pub type InjectorResult = Result<(), InjectorError>;

/// Simulated keyboard and mouse output
///
/// Implementations wrap a platform backend (uinput, SendInput, CGEvent).
/// Every call may fail; callers must treat failures as non-fatal.
#[async_trait]
pub trait InputInjector: Send + Sync {
    /// Press and release a key
    async fn tap_key(&self, key: &str) -> InjectorResult;

    /// Press a key and leave it held
    async fn hold_key(&self, key: &str) -> InjectorResult;

    /// Release a previously held key
    async fn release_key(&self, key: &str) -> InjectorResult;

    /// Click a mouse button ("left", "right", "middle")
    async fn click(&self, button: &str) -> InjectorResult;

    /// Move the cursor to absolute screen coordinates
    async fn move_cursor(&self, x: i32, y: i32) -> InjectorResult;
}

/// The absent capability: every call fails `Unavailable`
///
/// Used on hosts without an injection backend, and in tests asserting that
/// injector failure never aborts a playback session.
#[derive(Debug, Default)]
pub struct UnavailableInjector;

#[async_trait]
impl InputInjector for UnavailableInjector {
    async fn tap_key(&self, _key: &str) -> InjectorResult {
        Err(InjectorError::Unavailable)
    }

    async fn hold_key(&self, _key: &str) -> InjectorResult {
        Err(InjectorError::Unavailable)
    }

    async fn release_key(&self, _key: &str) -> InjectorResult {
        Err(InjectorError::Unavailable)
    }

    async fn click(&self, _button: &str) -> InjectorResult {
        Err(InjectorError::Unavailable)
    }

    async fn move_cursor(&self, _x: i32, _y: i32) -> InjectorResult {
        Err(InjectorError::Unavailable)
    }
}

/// One injected operation, as recorded by [`MemoryInjector`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedOp {
    TapKey(String),
    HoldKey(String),
    ReleaseKey(String),
    Click(String),
    MoveCursor(i32, i32),
}

/// Recording injector for tests and dry runs
///
/// Succeeds on every call and appends the operation to an in-memory log in
/// call order.
#[derive(Debug, Default)]
pub struct MemoryInjector {
    ops: Mutex<Vec<InjectedOp>>,
}

impl MemoryInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, op: InjectedOp) {
        debug!(?op, "injected (memory)");
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).push(op);
    }

    /// All operations injected so far, in order
    pub fn ops(&self) -> Vec<InjectedOp> {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Drop the recorded log
    pub fn clear(&self) {
        self.ops.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl InputInjector for MemoryInjector {
    async fn tap_key(&self, key: &str) -> InjectorResult {
        self.record(InjectedOp::TapKey(key.to_string()));
        Ok(())
    }

    async fn hold_key(&self, key: &str) -> InjectorResult {
        self.record(InjectedOp::HoldKey(key.to_string()));
        Ok(())
    }

    async fn release_key(&self, key: &str) -> InjectorResult {
        self.record(InjectedOp::ReleaseKey(key.to_string()));
        Ok(())
    }

    async fn click(&self, button: &str) -> InjectorResult {
        self.record(InjectedOp::Click(button.to_string()));
        Ok(())
    }

    async fn move_cursor(&self, x: i32, y: i32) -> InjectorResult {
        self.record(InjectedOp::MoveCursor(x, y));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_injector_fails_every_call() {
        let injector = UnavailableInjector;

        assert!(matches!(
            injector.tap_key("a").await,
            Err(InjectorError::Unavailable)
        ));
        assert!(matches!(
            injector.click("left").await,
            Err(InjectorError::Unavailable)
        ));
        assert!(matches!(
            injector.move_cursor(0, 0).await,
            Err(InjectorError::Unavailable)
        ));
    }

    #[tokio::test]
    async fn memory_injector_records_in_call_order() {
        let injector = MemoryInjector::new();

        injector.hold_key("shift").await.unwrap();
        injector.tap_key("a").await.unwrap();
        injector.release_key("shift").await.unwrap();
        injector.click("left").await.unwrap();
        injector.move_cursor(10, 20).await.unwrap();

        assert_eq!(
            injector.ops(),
            vec![
                InjectedOp::HoldKey("shift".into()),
                InjectedOp::TapKey("a".into()),
                InjectedOp::ReleaseKey("shift".into()),
                InjectedOp::Click("left".into()),
                InjectedOp::MoveCursor(10, 20),
            ]
        );

        injector.clear();
        assert!(injector.ops().is_empty());
    }
}
