//! 🧵 Workers: the ones who actually do the work while the engine takes the credit in the
//! sprint retro.
//!
//! Right now there is exactly one: the [`SourceWorker`], which pumps records out of a
//! [`RecordSource`](crate::backends::RecordSource) into the bounded channel the engine
//! reads from. Writes are not workers, they are short-lived tasks owned by the dispatcher.

use tokio::task::JoinHandle;

mod source_worker;
pub(crate) use source_worker::SourceWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// Starting one spawns it onto the runtime and hands back the handle, so whoever started
/// it can await it, abort it, or find out it panicked.
pub(crate) trait Worker {
    fn start(self) -> JoinHandle<()>;
}
