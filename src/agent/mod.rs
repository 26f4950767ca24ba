pub mod dispatcher;
pub mod prompt;
pub mod traits;

#[allow(unused_imports)]
pub use dispatcher::{AgentDispatcher, DispatchError, DispatchOutcome, OfflineInvoker};
#[allow(unused_imports)]
pub use traits::{AgentInvoker, AgentReply, AgentRequest, InvokeError};
