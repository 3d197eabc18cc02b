//=========================================================================
// Request Queue
//=========================================================================
//
// Thread-safe FIFO of requests backed by an unbounded crossbeam channel.
//
// The queue owns both channel ends, so it never disconnects. Producers
// enqueue from any thread; consumers either poll with `dequeue()` or
// block on `receiver()` (the background worker does the latter, which is
// how an enqueue wakes a sleeping consumer).
//
//=========================================================================

//=== External Dependencies ===============================================

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::error;

//=== Internal Dependencies ===============================================

use super::{Request, RequestError};

//=== RequestQueue ========================================================

/// Ordered, thread-safe collection of pending requests.
///
/// FIFO order is exact per producer. Concurrent enqueue/dequeue never
/// loses or duplicates a request.
pub struct RequestQueue {
    sender: Sender<Request>,
    receiver: Receiver<Request>,
}

impl RequestQueue {
    /// Creates a new empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Appends a request, waking a consumer blocked on the queue.
    pub fn enqueue(&self, request: Request) {
        // Cannot fail while `self` holds the receiver.
        if self.sender.send(request).is_err() {
            error!(target: "requests", "Request queue disconnected; request lost");
        }
    }

    /// Removes and returns the oldest request.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::EmptyQueue`] if there is nothing queued.
    pub fn dequeue(&self) -> Result<Request, RequestError> {
        self.receiver.try_recv().map_err(|_| RequestError::EmptyQueue)
    }

    /// Returns true if no request is queued.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Blocking consumer end, used by the background worker.
    pub(crate) fn receiver(&self) -> &Receiver<Request> {
        &self.receiver
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

//=========================================================================
// Unit Tests
//=========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::thread;

    fn recording(log: &Arc<Mutex<Vec<u32>>>, value: u32) -> Request {
        let log = Arc::clone(log);
        Box::new(move || log.lock().unwrap().push(value))
    }

    #[test]
    fn new_queue_is_empty() {
        let queue = RequestQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn dequeue_on_empty_fails() {
        let queue = RequestQueue::new();
        assert!(matches!(queue.dequeue(), Err(RequestError::EmptyQueue)));
    }

    #[test]
    fn dequeue_preserves_fifo_order() {
        let queue = RequestQueue::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for value in 0..5 {
            queue.enqueue(recording(&log, value));
        }
        assert_eq!(queue.len(), 5);

        while let Ok(request) = queue.dequeue() {
            request();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 250;

        let queue = Arc::new(RequestQueue::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let queue = Arc::clone(&queue);
                let log = Arc::clone(&log);
                thread::spawn(move || {
                    for seq in 0..PER_PRODUCER {
                        queue.enqueue(recording(&log, producer * 10_000 + seq));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        while let Ok(request) = queue.dequeue() {
            request();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), (PRODUCERS * PER_PRODUCER) as usize, "No request lost or duplicated");

        for producer in 0..PRODUCERS {
            let seqs: Vec<u32> = log
                .iter()
                .filter(|value| **value / 10_000 == producer)
                .map(|value| value % 10_000)
                .collect();
            let expected: Vec<u32> = (0..PER_PRODUCER).collect();
            assert_eq!(seqs, expected, "Producer {} order must be preserved", producer);
        }
    }
}
