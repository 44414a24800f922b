//! Message ports and window envelopes linking the coordinator to isolated contexts.
//!
//! A [`MessageChannel`] yields two entangled [`MessagePort`]s; whatever one posts, the other
//! receives, in order. Ports can themselves be transferred inside a message, which is how reply
//! channels travel to the interception and request-routing contexts. Messages posted to the
//! hosting page arrive as [`WindowMessage`]s stamped with the sender's origin.

// crates.io
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
// self
use crate::{_prelude::*, error::ChannelError};

/// Sending half of the hosting page's message stream.
pub type WindowSender = UnboundedSender<WindowMessage>;
/// Receiving half of the hosting page's message stream.
pub type WindowReceiver = UnboundedReceiver<WindowMessage>;

/// Creates the hosting page's message stream.
pub fn window_channel() -> (WindowSender, WindowReceiver) {
	mpsc::unbounded_channel()
}

/// Message delivered to the hosting page by another context.
#[derive(Debug)]
pub struct WindowMessage {
	/// Origin of the sending context, as stamped by the host.
	pub origin: Origin,
	/// Message payload.
	pub data: Value,
	/// Ports transferred with the message.
	pub ports: Vec<MessagePort>,
}
impl WindowMessage {
	/// Creates a message without transferred ports.
	pub fn new(origin: Origin, data: Value) -> Self {
		Self { origin, data, ports: Vec::new() }
	}
}

/// Message delivered over a [`MessagePort`].
#[derive(Debug)]
pub struct PortMessage {
	/// Message payload.
	pub data: Value,
	/// Ports transferred with the message.
	pub ports: Vec<MessagePort>,
}

/// Constructor for entangled port pairs.
#[derive(Debug)]
pub struct MessageChannel;
impl MessageChannel {
	/// Returns two entangled ports, conventionally called `port1` and `port2`.
	#[allow(clippy::new_ret_no_self)]
	pub fn new() -> (MessagePort, MessagePort) {
		let (tx1, rx1) = mpsc::unbounded_channel();
		let (tx2, rx2) = mpsc::unbounded_channel();

		(MessagePort { tx: tx2, rx: rx1 }, MessagePort { tx: tx1, rx: rx2 })
	}
}

/// One end of a [`MessageChannel`].
#[derive(Debug)]
pub struct MessagePort {
	tx: UnboundedSender<PortMessage>,
	rx: UnboundedReceiver<PortMessage>,
}
impl MessagePort {
	/// Posts a message to the entangled port.
	pub fn post(&self, data: Value, ports: Vec<MessagePort>) -> Result<(), ChannelError> {
		self.tx.send(PortMessage { data, ports }).map_err(|_| ChannelError::closed("message port"))
	}

	/// Receives the next message, or `None` once the entangled port is dropped.
	pub async fn recv(&mut self) -> Option<PortMessage> {
		self.rx.recv().await
	}

	/// Returns true if the entangled port has been dropped.
	pub fn is_closed(&self) -> bool {
		self.tx.is_closed()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn ports_deliver_in_both_directions() {
		let (mut port1, mut port2) = MessageChannel::new();

		port1.post(Value::from("ping"), Vec::new()).expect("Posting to port2 should succeed.");
		port2.post(Value::from("pong"), Vec::new()).expect("Posting to port1 should succeed.");

		assert_eq!(port2.recv().await.map(|m| m.data), Some(Value::from("ping")));
		assert_eq!(port1.recv().await.map(|m| m.data), Some(Value::from("pong")));
	}

	#[tokio::test]
	async fn ports_can_be_transferred() {
		let (mut port1, port2) = MessageChannel::new();
		let (reply1, mut reply2) = MessageChannel::new();

		port2.post(Value::Null, vec![reply1]).expect("Transferring a port should succeed.");

		let message = port1.recv().await.expect("A message should arrive on port1.");
		let reply = message.ports.into_iter().next().expect("The reply port should travel along.");

		reply.post(Value::from(42), Vec::new()).expect("Replying should succeed.");

		assert_eq!(reply2.recv().await.map(|m| m.data), Some(Value::from(42)));
	}

	#[test]
	fn dropped_peer_closes_the_port() {
		let (port1, port2) = MessageChannel::new();

		drop(port2);

		assert!(port1.is_closed());
		assert!(matches!(
			port1.post(Value::Null, Vec::new()),
			Err(ChannelError::Closed { .. })
		));
	}
}
