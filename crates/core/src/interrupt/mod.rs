use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Level-triggered cancellation flag shared by the engine and its host.
///
/// Raising it is synchronous: once [`Interrupt::raise`] returns, every loop
/// processor short-circuits and the device link drops outbound commands
/// until the next game start clears it.
#[derive(Debug, Default, Clone)]
pub struct Interrupt {
    raised: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        if !self.raised.swap(true, Ordering::SeqCst) {
            tracing::info!("interrupt raised");
        }
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_the_same_flag() {
        let interrupt = Interrupt::new();
        let host = interrupt.clone();

        assert!(!interrupt.is_raised());
        host.raise();
        host.raise();
        assert!(interrupt.is_raised());

        interrupt.clear();
        assert!(!host.is_raised());
    }

    #[test]
    fn can_be_raised_from_another_thread() {
        let interrupt = Interrupt::new();
        let remote = interrupt.clone();
        std::thread::spawn(move || remote.raise()).join().unwrap();
        assert!(interrupt.is_raised());
    }
}
