pub mod invoker;
pub mod reply;

pub use invoker::{AgentInvoker, AgentPayload, AgentReply, AgentRequest, ReplyMeta};
pub use reply::{MediaDirective, extract, extract_checked};
