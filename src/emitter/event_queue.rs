// EventQueue - lock-free event queue with a recycled spectrum buffer pool
//
// Two SPSC ring buffers connect the audio thread to the sender task:
// - EVENT QUEUE: audio thread pushes events, sender pops and transmits them
// - POOL QUEUE: sender returns spectrum buffers, audio thread reuses them
//
// Buffer flow for a spectrum event:
// 1. Audio thread pops an empty buffer from the pool
// 2. Audio thread copies the reduced spectrum into it
// 3. Audio thread pushes Spectrum(buffer) onto the event queue
// 4. Sender pops the event, encodes and sends the datagram
// 5. Sender pushes the buffer back onto the pool
//
// Every buffer is allocated up front, so the audio thread never touches the
// allocator.

use rtrb::{Consumer, Producer, RingBuffer};

use super::QueuedEvent;

/// Spectrum buffers in flight beyond the queue itself: one held by the
/// emitter after a rejected push, one held by the sender while sending
const EXTRA_BUFFERS: usize = 2;

/// Audio-thread side of the queue
pub struct EmitterChannels {
    /// Producer for events headed to the sender
    pub event_producer: Producer<QueuedEvent>,
    /// Consumer for empty spectrum buffers
    pub pool_consumer: Consumer<Vec<f32>>,
}

/// Sender side of the queue
pub struct SenderChannels {
    /// Consumer for events to transmit
    pub event_consumer: Consumer<QueuedEvent>,
    /// Producer for returning spectrum buffers
    pub pool_producer: Producer<Vec<f32>>,
}

/// Both ends of the event queue and buffer pool
pub struct EventQueueChannels {
    pub event_producer: Producer<QueuedEvent>,
    pub event_consumer: Consumer<QueuedEvent>,
    pub pool_producer: Producer<Vec<f32>>,
    pub pool_consumer: Consumer<Vec<f32>>,
}

impl EventQueueChannels {
    /// Split into the audio-thread half and the sender half
    pub fn split_for_threads(self) -> (EmitterChannels, SenderChannels) {
        (
            EmitterChannels {
                event_producer: self.event_producer,
                pool_consumer: self.pool_consumer,
            },
            SenderChannels {
                event_consumer: self.event_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

pub struct EventQueue;

impl EventQueue {
    /// Create the queue with room for `capacity` events and enough
    /// pre-allocated spectrum buffers of `bucket_count` values to back them.
    ///
    /// # Panics
    /// Panics if capacity or bucket_count is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(capacity: usize, bucket_count: usize) -> EventQueueChannels {
        assert!(capacity > 0, "capacity must be greater than 0");
        assert!(bucket_count > 0, "bucket_count must be greater than 0");

        let buffer_count = capacity + EXTRA_BUFFERS;
        let (mut pool_producer, pool_consumer) = RingBuffer::new(buffer_count);
        let (event_producer, event_consumer) = RingBuffer::new(capacity);

        for _ in 0..buffer_count {
            if pool_producer.push(Vec::with_capacity(bucket_count)).is_err() {
                break;
            }
        }

        EventQueueChannels {
            event_producer,
            event_consumer,
            pool_producer,
            pool_consumer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_creation() {
        let mut channels = EventQueue::new(8, 32);

        let mut available = 0;
        while let Ok(buffer) = channels.pool_consumer.pop() {
            assert!(buffer.capacity() >= 32);
            assert!(buffer.is_empty());
            available += 1;
        }
        assert_eq!(available, 8 + EXTRA_BUFFERS);
        assert!(channels.event_consumer.pop().is_err());
    }

    #[test]
    fn test_event_queue_is_bounded() {
        let mut channels = EventQueue::new(2, 4);
        assert!(channels.event_producer.push(QueuedEvent::Onset).is_ok());
        assert!(channels.event_producer.push(QueuedEvent::Onset).is_ok());
        assert!(channels.event_producer.push(QueuedEvent::Onset).is_err());
    }

    #[test]
    fn test_buffer_circulation() {
        let (mut emitter, mut sender) = EventQueue::new(4, 3).split_for_threads();

        let mut buffer = emitter.pool_consumer.pop().unwrap();
        buffer.extend_from_slice(&[1.0, 2.0, 3.0]);
        emitter
            .event_producer
            .push(QueuedEvent::Spectrum(buffer))
            .unwrap();

        match sender.event_consumer.pop().unwrap() {
            QueuedEvent::Spectrum(values) => {
                assert_eq!(values, vec![1.0, 2.0, 3.0]);
                sender.pool_producer.push(values).unwrap();
            }
            other => panic!("Expected spectrum, got {:?}", other),
        }

        let mut count = 0;
        while emitter.pool_consumer.pop().is_ok() {
            count += 1;
        }
        assert_eq!(count, 4 + EXTRA_BUFFERS);
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<EmitterChannels>();
        assert_send::<SenderChannels>();
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _ = EventQueue::new(0, 8);
    }
}
