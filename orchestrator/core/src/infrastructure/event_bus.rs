// Event Bus Implementation - Pub/Sub for Coordination Events
//
// In-memory event streaming over tokio broadcast channels. Feeds the SSE
// endpoint and in-process observers; the graph store stays the only owner of
// coordination state, so a dropped or lagging subscriber loses nothing but
// notifications.

use crate::domain::events::{AgentEvent, MessageEvent, TaskEvent, WorkflowEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type carried by the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinationEvent {
    Task(TaskEvent),
    Workflow(WorkflowEvent),
    Agent(AgentEvent),
    Message(MessageEvent),
}

impl CoordinationEvent {
    /// Short name used as the SSE `event:` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::Workflow(_) => "workflow",
            Self::Agent(_) => "agent",
            Self::Message(_) => "message",
        }
    }
}

/// Event bus for publishing and subscribing to coordination events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<CoordinationEvent>>,
}

impl EventBus {
    /// Capacity is the number of events buffered before the slowest
    /// subscriber starts lagging.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(CoordinationEvent::Task(event));
    }

    pub fn publish_workflow_event(&self, event: WorkflowEvent) {
        self.publish(CoordinationEvent::Workflow(event));
    }

    pub fn publish_agent_event(&self, event: AgentEvent) {
        self.publish(CoordinationEvent::Agent(event));
    }

    pub fn publish_message_event(&self, event: MessageEvent) {
        self.publish(CoordinationEvent::Message(event));
    }

    fn publish(&self, event: CoordinationEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Raw broadcast receiver, for adapters such as `BroadcastStream`.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<CoordinationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all coordination events
pub struct EventReceiver {
    receiver: broadcast::Receiver<CoordinationEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<CoordinationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<CoordinationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1000)
    }
}
