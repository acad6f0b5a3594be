//! MergeSource (spec §4.F): k-way chronological merge across per-channel
//! message streams for a single guild.

use crate::model::Message;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One channel's export: its channel id and the messages it contributed,
/// consumed front-to-back by the merge.
pub struct Stream {
    pub channel_id: u64,
    messages: std::vec::IntoIter<Message>,
}

impl Stream {
    pub fn new(channel_id: u64, messages: Vec<Message>) -> Self {
        Stream {
            channel_id,
            messages: messages.into_iter(),
        }
    }
}

/// A message paired with the channel it came from.
pub struct MergedMessage {
    pub channel_id: u64,
    pub message: Message,
}

struct HeapEntry {
    timestamp: DateTime<Utc>,
    stream_index: usize,
    message: Message,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.stream_index == other.stream_index
    }
}
impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest timestamp (and,
        // on ties, the lowest stream index (i.e. file order) pops first.
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.stream_index.cmp(&self.stream_index))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Emits messages from N per-channel streams in non-decreasing timestamp
/// order, ties broken by file-order index (spec §4.F).
pub struct MergeSource {
    streams: Vec<Stream>,
    heap: BinaryHeap<HeapEntry>,
}

impl MergeSource {
    pub fn new(mut streams: Vec<Stream>) -> Self {
        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (index, stream) in streams.iter_mut().enumerate() {
            if let Some(message) = stream.messages.next() {
                heap.push(HeapEntry {
                    timestamp: message.timestamp,
                    stream_index: index,
                    message,
                });
            }
        }
        MergeSource { streams, heap }
    }
}

impl Iterator for MergeSource {
    type Item = MergedMessage;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.heap.pop()?;
        let channel_id = self.streams[entry.stream_index].channel_id;
        if let Some(next_message) = self.streams[entry.stream_index].messages.next() {
            self.heap.push(HeapEntry {
                timestamp: next_message.timestamp,
                stream_index: entry.stream_index,
                message: next_message,
            });
        }
        Some(MergedMessage {
            channel_id,
            message: entry.message,
        })
    }
}
