use crate::protocol::ServerMessage;
use crate::room::ConnectionId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

// Per-session queue depth. Snapshots are full state, so dropping one for a
// lagging session loses nothing the next snapshot does not carry.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 32;

pub type GroupName = String;
pub type OutboundSender = mpsc::Sender<ServerMessage>;
pub type OutboundReceiver = mpsc::Receiver<ServerMessage>;

/// A session's membership in a broadcast group. Dropping it leaves the group.
pub struct EventSubscription {
    membership: Membership,
    pub receiver: OutboundReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut OutboundReceiver {
        &mut self.receiver
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.membership.connection_id
    }

    pub fn group(&self) -> &str {
        &self.membership.group
    }

    /// Splits off the queue so it can be consumed by value. The group is left
    /// once the returned [`Membership`] is dropped.
    pub fn into_parts(self) -> (Membership, OutboundReceiver) {
        (self.membership, self.receiver)
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("group", &self.membership.group)
            .field("connection_id", &self.membership.connection_id)
            .finish()
    }
}

/// Group membership without the queue. Unsubscribes on drop.
pub struct Membership {
    bus: EventBus,
    group: GroupName,
    connection_id: ConnectionId,
}

impl Membership {
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.group, self.connection_id);
    }
}

/// Fan-out of server messages to every session bound to a group. The
/// registry uses the raw room code as the group key.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug)]
struct EventBusInner {
    groups: RwLock<HashMap<GroupName, Vec<(ConnectionId, OutboundSender)>>>,
    buffer: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_OUTBOUND_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                groups: RwLock::new(HashMap::new()),
                buffer: buffer.max(1),
            }),
        }
    }

    pub fn subscribe(&self, group: &str, connection_id: ConnectionId) -> EventSubscription {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        {
            let mut guard = match self.inner.groups.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let members = guard.entry(group.to_string()).or_default();
            members.retain(|(id, _)| *id != connection_id);
            members.push((connection_id, tx));
        }

        tracing::debug!(
            group = %group,
            connection_id = %connection_id,
            "session subscribed to room group"
        );

        EventSubscription {
            membership: Membership {
                bus: self.clone(),
                group: group.to_string(),
                connection_id,
            },
            receiver: rx,
        }
    }

    /// Queues `message` for every member of `group` and returns how many
    /// accepted it. Never waits on a slow member.
    pub fn broadcast(&self, group: &str, message: ServerMessage) -> usize {
        let members = {
            let guard = match self.inner.groups.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.get(group).cloned()
        };

        let Some(members) = members else {
            tracing::debug!(group = %group, "no sessions bound to group");
            return 0;
        };

        tracing::trace!(
            group = %group,
            member_count = members.len(),
            "broadcasting to group"
        );

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in members {
            if Self::deliver(group, id, &sender, message.clone()) {
                delivered += 1;
            } else if sender.is_closed() {
                closed.push(id);
            }
        }
        if !closed.is_empty() {
            self.remove_members(group, &closed);
        }
        delivered
    }

    /// Queues `message` for a single member of `group`.
    pub fn send_to(&self, group: &str, connection_id: ConnectionId, message: ServerMessage) -> bool {
        let sender = {
            let guard = match self.inner.groups.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.get(group).and_then(|members| {
                members
                    .iter()
                    .find(|(id, _)| *id == connection_id)
                    .map(|(_, sender)| sender.clone())
            })
        };

        match sender {
            Some(sender) => Self::deliver(group, connection_id, &sender, message),
            None => false,
        }
    }

    pub fn unsubscribe(&self, group: &str, connection_id: ConnectionId) {
        self.remove_members(group, &[connection_id]);
    }

    pub fn drop_group(&self, group: &str) {
        let mut guard = match self.inner.groups.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.remove(group);
    }

    pub fn group_size(&self, group: &str) -> usize {
        match self.inner.groups.read() {
            Ok(guard) => guard.get(group).map_or(0, Vec::len),
            Err(_) => 0,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        match self.inner.groups.read() {
            Ok(guard) => guard.values().map(Vec::len).sum(),
            Err(_) => 0,
        }
    }

    fn deliver(
        group: &str,
        connection_id: ConnectionId,
        sender: &OutboundSender,
        message: ServerMessage,
    ) -> bool {
        match sender.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    group = %group,
                    connection_id = %connection_id,
                    "outbound queue full, dropping message for slow session"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(
                    group = %group,
                    connection_id = %connection_id,
                    "outbound queue closed"
                );
                false
            }
        }
    }

    fn remove_members(&self, group: &str, ids: &[ConnectionId]) {
        let mut guard = match self.inner.groups.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(members) = guard.get_mut(group) {
            members.retain(|(id, _)| !ids.contains(id));
            if members.is_empty() {
                guard.remove(group);
            }
        }
    }
}
