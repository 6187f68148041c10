//! # Message Port
//!
//! Push-style ingestion for the SigMF sink. A producer posts pre-aggregated
//! messages (a sample offset plus a payload dict) into a single-slot inbox:
//! `send` blocks while the previous message is still waiting. The sink drains
//! whatever is available once per invocation without blocking.
//!
//! ## Example
//!
//! ```rust
//! use r4w_sigmf_blocks::message_port::{message_port, Message};
//! use r4w_sigmf_blocks::stream_tags::TagValue;
//!
//! let (tx, mut inbox) = message_port("annotations");
//! tx.send(Message::new(2000, TagValue::dict([("frequency", TagValue::Float(2e9))]))).unwrap();
//! let msg = inbox.try_recv().unwrap();
//! assert_eq!(msg.offset, 2000);
//! ```

use std::sync::mpsc::{self, Receiver, SyncSender, TryRecvError};

use crate::stream_tags::TagValue;

/// A pre-aggregated capture or annotation description.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Absolute sample offset the message refers to
    pub offset: u64,
    pub payload: TagValue,
}

impl Message {
    pub fn new(offset: u64, payload: TagValue) -> Self {
        Self { offset, payload }
    }
}

/// Create a connected sender/inbox pair with a single message slot.
pub fn message_port(name: &str) -> (MessageSender, MessageInbox) {
    let (tx, rx) = mpsc::sync_channel(1);
    (
        MessageSender { tx },
        MessageInbox {
            name: name.to_string(),
            rx,
            received: 0,
        },
    )
}

/// Producer side of a message port. Cloneable.
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: SyncSender<Message>,
}

impl MessageSender {
    /// Post a message, blocking while the slot is occupied.
    ///
    /// Returns the message back if the inbox has been dropped.
    pub fn send(&self, msg: Message) -> Result<(), Message> {
        self.tx.send(msg).map_err(|e| e.0)
    }

    /// Post a message only if the slot is free.
    pub fn try_send(&self, msg: Message) -> Result<(), Message> {
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::TrySendError::Full(m) | mpsc::TrySendError::Disconnected(m) => m,
        })
    }
}

/// Consumer side of a message port.
#[derive(Debug)]
pub struct MessageInbox {
    name: String,
    rx: Receiver<Message>,
    received: u64,
}

impl MessageInbox {
    /// Take the pending message, if any, without blocking.
    pub fn try_recv(&mut self) -> Option<Message> {
        match self.rx.try_recv() {
            Ok(msg) => {
                self.received += 1;
                Some(msg)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Block until a message arrives; `None` once every sender is gone.
    pub fn recv(&mut self) -> Option<Message> {
        let msg = self.rx.recv().ok()?;
        self.received += 1;
        Some(msg)
    }

    /// Take every message available right now.
    pub fn drain(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total messages taken from the inbox.
    pub fn received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_single_slot() {
        let (tx, mut inbox) = message_port("test");
        tx.try_send(Message::new(1, TagValue::Null)).unwrap();

        let rejected = tx.try_send(Message::new(2, TagValue::Null)).unwrap_err();
        assert_eq!(rejected.offset, 2);

        assert_eq!(inbox.try_recv().map(|m| m.offset), Some(1));
        assert!(inbox.try_recv().is_none());
        assert_eq!(inbox.received(), 1);
        assert_eq!(inbox.name(), "test");
    }

    #[test]
    fn test_blocking_send_from_thread() {
        let (tx, mut inbox) = message_port("test");
        let producer = thread::spawn(move || {
            for offset in 0..3 {
                tx.send(Message::new(offset, TagValue::UInt(offset))).unwrap();
            }
        });

        let offsets: Vec<u64> = (0..3).filter_map(|_| inbox.recv()).map(|m| m.offset).collect();
        producer.join().unwrap();
        assert_eq!(offsets, vec![0, 1, 2]);
        assert!(inbox.recv().is_none());
    }

    #[test]
    fn test_send_after_inbox_dropped() {
        let (tx, inbox) = message_port("test");
        drop(inbox);
        assert!(tx.send(Message::new(9, TagValue::Null)).is_err());
    }

    #[test]
    fn test_drain() {
        let (tx, mut inbox) = message_port("test");
        assert!(inbox.drain().is_empty());
        tx.send(Message::new(4, TagValue::Null)).unwrap();
        assert_eq!(inbox.drain().len(), 1);
    }
}
