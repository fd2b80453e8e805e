//! Ambient test tooling shared by every other crate's `tests/` directory:
//! driver fixtures, an in-memory `ReactiveSink` fake, and a coordinator
//! decorator for forcing gap-recovery scenarios. Every scenario test
//! depends on this crate; it never depends on production code the other
//! way around.

mod fixtures;
mod flaky_coordinator;
mod sink;

pub use fixtures::{in_memory_driver, reopen_driver, temp_driver, TempDriver};
pub use flaky_coordinator::GapInjectingCoordinator;
pub use sink::RecordingSink;
