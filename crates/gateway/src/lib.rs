//! OneBot v11 collaborators: frame decoding, CQ-code parsing, the event
//! socket and the HTTP api.

pub mod cqcode;
pub mod http;
pub mod onebot;
pub mod ws;

pub use cqcode::CqCodeParser;
pub use http::{HttpApi, LoginInfo};
pub use onebot::decode_frame;
pub use ws::{EventSourceConfig, run_event_source};
