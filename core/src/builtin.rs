//! Node kinds and timers available to every project under the builtin
//! namespace.

use crate::context::Context;
use crate::error::SimResult;
use crate::inbox::Inbox;
use crate::message::Message;
use crate::node::NodeId;
use crate::traits::{NodeBehavior, Timer};

/// A message without a payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoContent;

/// A node that ignores everything it receives.
#[derive(Debug, Default)]
pub struct InertNode;

impl NodeBehavior for InertNode {
    fn kind(&self) -> &str {
        "inert"
    }

    fn init(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        ctx.set_size(3.0)
    }

    fn handle_messages(&mut self, _ctx: &mut Context<'_>, _inbox: &Inbox) -> SimResult<()> {
        Ok(())
    }
}

/// Sends its message when it fires: to one receiver, or as a broadcast when
/// there is none.
#[derive(Debug)]
pub struct MessageTimer {
    message: Box<dyn Message>,
    receiver: Option<NodeId>,
}

impl MessageTimer {
    pub fn unicast(message: impl Message, receiver: NodeId) -> Self {
        Self {
            message: Box::new(message),
            receiver: Some(receiver),
        }
    }

    pub fn broadcast(message: impl Message) -> Self {
        Self {
            message: Box::new(message),
            receiver: None,
        }
    }

    pub fn receiver(&self) -> Option<NodeId> {
        self.receiver
    }
}

impl Timer for MessageTimer {
    fn fire(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        match self.receiver {
            Some(receiver) => ctx.send(self.message.as_ref(), receiver),
            None => ctx.broadcast(self.message.as_ref()),
        }
    }
}
