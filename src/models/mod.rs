pub mod entry;
pub mod history;

pub use entry::Entry;
pub use history::{History, HistoryEvent};
