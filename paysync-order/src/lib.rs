pub mod locks;
pub mod orchestrator;

pub use locks::KeyedLocks;
pub use orchestrator::{CheckoutOutcome, OrderRefGenerator, RandomOrderRefs, ReconciliationEngine, VerifyOutcome};
