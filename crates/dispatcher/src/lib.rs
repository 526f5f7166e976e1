pub mod dispatch;
pub mod registry;
pub mod transport;

pub use dispatch::{BatchReport, DispatchOutcome, DispatchReport, ExecDispatcher};
pub use registry::WorkerRegistry;
pub use transport::{AgentTransport, ExecReply, HttpAgentClient};
