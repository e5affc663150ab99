//! Parallel directory scanning
//!
//! - `task`: scan tasks, pending set, work-stealing queue
//! - `scanner`: worker loop and run orchestration
//! - `filter`: size/extension eligibility
//! - `counters`: run-wide totals
//! - `report`: match output thread

pub mod counters;
pub mod filter;
pub mod report;
pub mod scanner;
pub mod task;

pub use counters::{CounterSnapshot, Counters};
pub use filter::{Eligibility, EntryFilter};
pub use report::{absolutize, Reporter};
pub use scanner::{ScanProgress, ScanSummary, Scanner};
pub use task::{PendingSet, ScanTask, TaskQueue};
