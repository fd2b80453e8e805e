//! Persisted-collection wrapper (C5): the seam behind which a reactive
//! in-memory collection lives is represented here by the minimal
//! [`ReactiveSink`] trait. Everything else — hydration, ordered apply, gap
//! detection, index mirroring, local commits — lives in
//! [`PersistedCollection`].

mod index;
mod sink;
mod watermark;
mod wrapper;

pub use index::signature_of;
pub use sink::{ReactiveSink, SinkChange};
pub use watermark::{GapCheck, GapWatermark};
pub use wrapper::{CollectionConfig, CollectionMode, CollectionState, PersistedCollection, HYDRATION_BUFFER_CAPACITY};
