pub mod records;
pub mod sink;

pub use records::{AgentsRow, BranchRow, BuildRow, QueueRow, Record};
pub use sink::{Dataset, DayOutputs, DaySink, SinkError};
