pub mod backoff;
pub mod broker;
pub mod dispatcher;
pub mod message;
pub mod sender;

mod error;

pub use broker::{BatchCallback, ConsumeFuture, Producer, PushConsumer};
pub use dispatcher::{DeadLetterSink, Dispatcher, Handler, HandlerResult};
pub use error::{BoxedError, Error, Result};
pub use message::{ConsumeVerdict, Message};
pub use sender::ReliableSender;

pub const TOPIC_KNOWLEDGE_BASE: &str = "topic_knowledge_base";
pub const TAG_ETL: &str = "tag_etl";
pub const TAG_DELETE: &str = "tag_delete";

pub const TOPIC_AGENT_CONTEXT: &str = "topic_agent_context";
pub const TAG_SUMMARIZE: &str = "tag_summarize";

pub const CONSUMER_GROUP_KNOWLEDGE_BASE: &str = "cg_knowledge_base";
pub const CONSUMER_GROUP_AGENT_CONTEXT: &str = "cg_agent_context";
