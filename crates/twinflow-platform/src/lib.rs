//! `twinflow-platform` – the seam to the digital twin platform.
//!
//! The control core never speaks gRPC, REST, or STOMP directly.  It talks to
//! three small traits, and the platform SDK (or the in-process simulation)
//! sits behind them:
//!
//! - [`FeedSubscriber`] – `subscribe(feed)` returning a lazy, unbounded
//!   stream of raw payloads.
//! - [`InputSender`] – `send_input(input, command)`, a fire-and-confirm call.
//! - [`Discovery`] – resolves the fixed set of feeds to follow.
//!
//! Payload decoding lives in [`decode`]; the [`sim`] module provides stub
//! drivers so the full stack runs headless in CI.

pub mod decode;
pub mod discovery;
pub mod sender;
pub mod sim;
pub mod subscriber;

pub use decode::decode_reading;
pub use discovery::Discovery;
pub use sender::InputSender;
pub use subscriber::{FeedSubscriber, RawPayloadStream};
