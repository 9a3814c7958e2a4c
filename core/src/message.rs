use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// User payload carried by a packet.
///
/// Implemented for every `Clone + Debug + Send + 'static` type, so project
/// messages are plain structs. Each send clones the payload; packets never
/// share one.
pub trait Message: Any + Send + fmt::Debug {
    fn clone_message(&self) -> Box<dyn Message>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T> Message for T
where
    T: Any + Clone + Send + fmt::Debug,
{
    fn clone_message(&self) -> Box<dyn Message> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl dyn Message {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.as_any().is::<T>()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    Unicast,
    Multicast,
}

/// One message in transit between two nodes.
#[derive(Debug)]
pub struct Packet {
    id: u64,
    message: Box<dyn Message>,
    origin: NodeId,
    destination: NodeId,
    kind: PacketKind,
    positive_delivery: bool,
    sending_time: u64,
    arriving_time: u64,
    intensity: f64,
    /// Counted in its edge's `in_flight` until it leaves the air.
    pub(crate) on_edge: bool,
}

impl Packet {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        message: Box<dyn Message>,
        origin: NodeId,
        destination: NodeId,
        kind: PacketKind,
        sending_time: u64,
        arriving_time: u64,
        intensity: f64,
    ) -> Self {
        debug_assert!(arriving_time >= sending_time);
        Self {
            id,
            message,
            origin,
            destination,
            kind,
            positive_delivery: true,
            sending_time,
            arriving_time,
            intensity,
            on_edge: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn message(&self) -> &dyn Message {
        self.message.as_ref()
    }

    /// Typed view of the payload, `None` if it is another message type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.message.downcast_ref::<T>()
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    pub fn positive_delivery(&self) -> bool {
        self.positive_delivery
    }

    pub fn sending_time(&self) -> u64 {
        self.sending_time
    }

    pub fn arriving_time(&self) -> u64 {
        self.arriving_time
    }

    pub fn transit_time(&self) -> u64 {
        self.arriving_time - self.sending_time
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    /// Marks the packet undeliverable. There is no way back.
    pub fn deny_delivery(&mut self) {
        self.positive_delivery = false;
    }
}

/// Generation-checked index into a [`PacketArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PacketHandle {
    index: u32,
    generation: u32,
}

enum Slot {
    Occupied { generation: u32, packet: Packet },
    Vacant { generation: u32 },
}

/// Owns every packet that is still in transit.
///
/// Removing a packet hands ownership back to the caller and bumps the slot
/// generation, so stale handles held by events or buffers resolve to `None`.
#[derive(Default)]
pub struct PacketArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
}

impl PacketArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, packet: Packet) -> PacketHandle {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let generation = match slot {
                Slot::Vacant { generation } => *generation,
                Slot::Occupied { .. } => unreachable!("free list points at an occupied slot"),
            };
            *slot = Slot::Occupied { generation, packet };
            PacketHandle { index, generation }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot::Occupied { generation: 0, packet });
            PacketHandle {
                index,
                generation: 0,
            }
        }
    }

    pub fn get(&self, handle: PacketHandle) -> Option<&Packet> {
        match self.slots.get(handle.index as usize)? {
            Slot::Occupied { generation, packet } if *generation == handle.generation => {
                Some(packet)
            }
            _ => None,
        }
    }

    pub fn get_mut(&mut self, handle: PacketHandle) -> Option<&mut Packet> {
        match self.slots.get_mut(handle.index as usize)? {
            Slot::Occupied { generation, packet } if *generation == handle.generation => {
                Some(packet)
            }
            _ => None,
        }
    }

    pub fn contains(&self, handle: PacketHandle) -> bool {
        self.get(handle).is_some()
    }

    pub fn remove(&mut self, handle: PacketHandle) -> Option<Packet> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        let generation = match slot {
            Slot::Occupied { generation, .. } if *generation == handle.generation => *generation,
            _ => return None,
        };
        let vacated = Slot::Vacant {
            generation: generation.wrapping_add(1),
        };
        let previous = std::mem::replace(slot, vacated);
        self.free.push(handle.index);
        self.len -= 1;
        match previous {
            Slot::Occupied { packet, .. } => Some(packet),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (PacketHandle, &Packet)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied { generation, packet } => Some((
                    PacketHandle {
                        index: index as u32,
                        generation: *generation,
                    },
                    packet,
                )),
                Slot::Vacant { .. } => None,
            })
    }
}
