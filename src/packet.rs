use rsmpeg::avcodec::AVPacket;

use std::collections::VecDeque;

/// An owned packet whose payload is fed to the codec through a byte
/// cursor. The backing packet stays alive until every payload byte has
/// been consumed, then both go away together.
pub(crate) struct PendingPacket {
    pkt: AVPacket,
    offset: usize,
}

impl PendingPacket {
    pub fn new(pkt: AVPacket) -> Self {
        Self { pkt, offset: 0 }
    }

    pub fn packet(&self) -> &AVPacket {
        &self.pkt
    }

    /// Payload bytes not yet handed to the codec.
    pub fn remaining(&self) -> usize {
        (self.pkt.size as usize).saturating_sub(self.offset)
    }

    /// Advance the cursor. Returns true once the payload is exhausted and
    /// the backing packet can be released.
    pub fn advance(&mut self, consumed: usize) -> bool {
        self.offset = (self.offset + consumed).min(self.pkt.size as usize);
        self.remaining() == 0
    }
}

/// FIFO of packets owned by one decoder, plus the in-flight pending slot.
pub(crate) struct PacketQueue {
    packets: VecDeque<AVPacket>,
    pending: Option<PendingPacket>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            packets: VecDeque::new(),
            pending: None,
        }
    }

    /// Append a packet to the tail. Ownership moves into the queue.
    pub fn push(&mut self, pkt: AVPacket) {
        self.packets.push_back(pkt);
    }

    pub fn pop(&mut self) -> Option<AVPacket> {
        self.packets.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_pending(&mut self, pending: PendingPacket) {
        self.pending = Some(pending);
    }

    pub fn pending_packet(&self) -> Option<&AVPacket> {
        self.pending.as_ref().map(|p| p.packet())
    }

    pub fn pending_mut(&mut self) -> Option<&mut PendingPacket> {
        self.pending.as_mut()
    }

    pub fn take_pending(&mut self) -> Option<PendingPacket> {
        self.pending.take()
    }

    /// Release the pending packet and every queued packet.
    pub fn clear(&mut self) {
        self.pending = None;
        self.packets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsmpeg::ffi;

    fn packet_with_size(size: i32) -> AVPacket {
        let mut pkt = AVPacket::new();
        unsafe {
            assert!(ffi::av_new_packet(pkt.as_mut_ptr(), size) >= 0);
        }
        pkt
    }

    #[test]
    fn clear_releases_queue_and_pending() {
        let mut queue = PacketQueue::new();
        queue.push(packet_with_size(16));
        queue.push(packet_with_size(32));
        let first = queue.pop().expect("queued packet");
        queue.set_pending(PendingPacket::new(first));

        queue.clear();
        assert!(queue.is_empty());
        assert!(!queue.has_pending());
    }

    #[test]
    fn packets_pop_in_push_order() {
        let mut queue = PacketQueue::new();
        queue.push(packet_with_size(8));
        queue.push(packet_with_size(24));
        assert_eq!(queue.pop().map(|p| p.size), Some(8));
        assert_eq!(queue.pop().map(|p| p.size), Some(24));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn cursor_releases_owner_only_when_exhausted() {
        let mut pending = PendingPacket::new(packet_with_size(100));
        assert_eq!(pending.remaining(), 100);
        assert!(!pending.advance(40));
        assert_eq!(pending.remaining(), 60);
        assert!(pending.advance(60));
        assert_eq!(pending.remaining(), 0);
    }

    #[test]
    fn cursor_clamps_overconsumption() {
        let mut pending = PendingPacket::new(packet_with_size(10));
        assert!(pending.advance(50));
        assert_eq!(pending.remaining(), 0);
    }
}
