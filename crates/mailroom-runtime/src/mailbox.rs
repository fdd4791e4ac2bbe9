//! Actor mailbox implementation
//!
//! Unbounded FIFO queue of messages. The mailbox itself is not synchronized;
//! the owning [`Actor`](crate::Actor) guards it together with its lifecycle
//! state so that enqueue, dequeue and state checks are atomic.

use std::collections::VecDeque;

use mailroom_core::message::Message;

/// FIFO mailbox for actor messages
///
/// - Messages are dequeued in exactly the order they were enqueued
/// - Priority only influences which actor is scheduled, never the order
///   within a single mailbox
#[derive(Debug, Default)]
pub struct Mailbox {
    /// Pending messages
    queue: VecDeque<Message>,
    /// Total messages enqueued (for metrics)
    enqueued_count: u64,
    /// Total messages dequeued (for metrics)
    dequeued_count: u64,
}

impl Mailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail
    pub fn push(&mut self, message: Message) {
        self.queue.push_back(message);
        self.enqueued_count = self.enqueued_count.wrapping_add(1);
    }

    /// Remove the message at the head
    pub fn pop(&mut self) -> Option<Message> {
        let message = self.queue.pop_front();
        if message.is_some() {
            self.dequeued_count = self.dequeued_count.wrapping_add(1);
        }
        message
    }

    /// Borrow the message at the head without removing it
    pub fn peek(&self) -> Option<&Message> {
        self.queue.front()
    }

    /// Borrow the first pending message with the highest priority
    ///
    /// Ties resolve to the message closest to the head.
    pub fn peek_highest_priority(&self) -> Option<&Message> {
        let mut best: Option<&Message> = None;
        for message in &self.queue {
            match best {
                Some(current) if message.priority() <= current.priority() => {}
                _ => best = Some(message),
            }
        }
        best
    }

    /// Check if the mailbox is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the number of pending messages
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Get total messages enqueued
    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count
    }

    /// Get total messages dequeued
    pub fn dequeued_count(&self) -> u64 {
        self.dequeued_count
    }

    /// Drain all pending messages
    ///
    /// Used by immediate stop to discard whatever is still queued.
    pub fn drain(&mut self) -> Vec<Message> {
        self.queue.drain(..).collect()
    }
}
