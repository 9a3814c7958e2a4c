use std::ops::Deref;

use crate::message::Packet;

/// Packets delivered to a node in one step, ordered by arrival time and then
/// by packet id.
#[derive(Debug, Default)]
pub struct Inbox {
    packets: Vec<Packet>,
}

impl Inbox {
    pub(crate) fn new(mut packets: Vec<Packet>) -> Self {
        packets.sort_by_key(|p| (p.arriving_time(), p.id()));
        Self { packets }
    }

    pub(crate) fn single(packet: Packet) -> Self {
        Self {
            packets: vec![packet],
        }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Packet> {
        self.packets.iter()
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Payloads of type `T`, in delivery order.
    pub fn payloads<'a, T: 'static>(&'a self) -> impl Iterator<Item = (&'a Packet, &'a T)> + 'a {
        self.packets
            .iter()
            .filter_map(|p| p.payload::<T>().map(|payload| (p, payload)))
    }
}

impl<'a> IntoIterator for &'a Inbox {
    type Item = &'a Packet;
    type IntoIter = std::slice::Iter<'a, Packet>;

    fn into_iter(self) -> Self::IntoIter {
        self.packets.iter()
    }
}

/// Unicast packets that were sent by this node and failed to arrive.
#[derive(Debug, Default)]
pub struct NackBox(Inbox);

impl NackBox {
    pub(crate) fn new(packets: Vec<Packet>) -> Self {
        Self(Inbox::new(packets))
    }

    pub(crate) fn single(packet: Packet) -> Self {
        Self(Inbox::single(packet))
    }
}

impl Deref for NackBox {
    type Target = Inbox;

    fn deref(&self) -> &Inbox {
        &self.0
    }
}

impl<'a> IntoIterator for &'a NackBox {
    type Item = &'a Packet;
    type IntoIter = std::slice::Iter<'a, Packet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.packets.iter()
    }
}
