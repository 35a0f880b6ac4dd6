use std::sync::{
    Arc,
    atomic::{AtomicU8, Ordering},
};

/// Why a stop was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::IsVariant)]
pub enum StopReason {
    /// An operator asked for the run to stop (e.g. a `stop` command).
    #[display("manual stop")]
    Manual,
    /// Cancellation coming from the host (shutdown, embedding application, tests).
    #[display("external cancellation")]
    External,
}

const NONE: u8 = 0;
const MANUAL: u8 = 1;
const EXTERNAL: u8 = 2;

/// Cooperative stop flag shared between a training run and whoever may cancel it.
///
/// Clones share the same flag. The flag is only ever polled at tick and
/// generation boundaries, so a stop never interrupts a tick halfway. The first
/// request wins; later requests keep the original reason.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    state: Arc<AtomicU8>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, reason: StopReason) {
        let value = match reason {
            StopReason::Manual => MANUAL,
            StopReason::External => EXTERNAL,
        };
        let _ = self
            .state
            .compare_exchange(NONE, value, Ordering::AcqRel, Ordering::Acquire);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.state.load(Ordering::Acquire) != NONE
    }

    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        match self.state.load(Ordering::Acquire) {
            MANUAL => Some(StopReason::Manual),
            EXTERNAL => Some(StopReason::External),
            _ => None,
        }
    }
}
