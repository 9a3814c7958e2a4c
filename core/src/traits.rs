use std::any::Any;

use crate::config::SimConfig;
use crate::context::Context;
use crate::error::SimResult;
use crate::global::GlobalState;
use crate::inbox::{Inbox, NackBox};
use crate::node::NodeId;
use crate::position::Position;

/// Lets hook objects be downcast back to their concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Per-node behavior. Only `handle_messages` is mandatory.
///
/// Every hook receives a [`Context`] bound to the node, through which it
/// sends messages and starts timers.
pub trait NodeBehavior: AsAny + Send {
    fn kind(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Called once, right after the node joins the simulation.
    fn init(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Called for every node during `init`, before `pre_run`.
    fn check_requirements(&self) -> SimResult<()> {
        Ok(())
    }

    fn pre_step(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_neighborhood_change(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    fn on_position_updated(&mut self, _ctx: &mut Context<'_>, _position: Position) -> SimResult<()> {
        Ok(())
    }

    fn handle_nack_messages(&mut self, _ctx: &mut Context<'_>, _nacks: &NackBox) -> SimResult<()> {
        Ok(())
    }

    fn handle_messages(&mut self, ctx: &mut Context<'_>, inbox: &Inbox) -> SimResult<()>;

    fn post_step(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }
}

/// Project-wide callbacks. A project must supply one to be initialized.
pub trait CustomGlobal: AsAny + Send {
    fn has_terminated(&self, state: &GlobalState) -> bool;

    fn check_project_requirements(&mut self, _config: &SimConfig) -> SimResult<()> {
        Ok(())
    }

    fn pre_run(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    fn pre_round(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    fn post_round(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Asynchronous mode only: the event queue ran dry. Called once per
    /// emptiness; may enqueue new events through the context.
    fn handle_empty_event_queue(&mut self, _ctx: &mut Context<'_>) -> SimResult<()> {
        Ok(())
    }

    fn node_added(&mut self, _id: NodeId) {}

    fn node_removed(&mut self, _id: NodeId) {}

    fn on_exit(&mut self) {}
}

/// A one-shot callback. The context is bound to the owning node, or to no
/// node for global timers.
pub trait Timer: Send {
    fn fire(&mut self, ctx: &mut Context<'_>) -> SimResult<()>;
}

impl<F> Timer for F
where
    F: FnMut(&mut Context<'_>) -> SimResult<()> + Send,
{
    fn fire(&mut self, ctx: &mut Context<'_>) -> SimResult<()> {
        self(ctx)
    }
}
