use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};
use handling_schema::FieldValue;

/// What caused a field to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    Edit,
    Preset,
    Reset,
    GroundTruth,
}

impl fmt::Display for ChangeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeOrigin::Edit => "edit",
            ChangeOrigin::Preset => "preset",
            ChangeOrigin::Reset => "reset",
            ChangeOrigin::GroundTruth => "ground_truth",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub field: String,
    pub origin: ChangeOrigin,
    pub old: FieldValue,
    pub new: FieldValue,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} -> {}", self.origin, self.field, self.old, self.new)
    }
}

/// Fan-out of change records to any number of subscribers.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Vec<Sender<FieldChange>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> Receiver<FieldChange> {
        let (sender, receiver) = unbounded();
        self.subscribers.push(sender);
        receiver
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send every change to every live subscriber, dropping disconnected ones.
    pub fn publish(&mut self, changes: &[FieldChange]) {
        if changes.is_empty() {
            return;
        }
        self.subscribers.retain(|sender| {
            changes
                .iter()
                .all(|change| sender.send(change.clone()).is_ok())
        });
    }
}
