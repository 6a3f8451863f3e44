mod extract;
mod mock;
mod openai;

pub use mock::{MockChecker, MockReply};
pub use openai::{CheckerConfig, OpenAiChecker};
