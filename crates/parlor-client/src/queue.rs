//! The producer-facing input/output event queue (§4.4, §5).
//!
//! The session itself is single-consumer: one worker thread drains the
//! queue in FIFO order and drives [`crate::ClientSession`] against it.
//! Producers are many: any number of threads may hold an
//! [`EventQueueHandle`] and call [`EventQueueHandle::submit`], which blocks
//! until the session has round-tripped the corresponding request and
//! produced a matching [`crate::OutputEvent`]: "enqueue and await
//! completion on a per-event promise," per §9's design note, implemented
//! here with a one-shot `mpsc` channel per call rather than a shared
//! condition variable.

use std::sync::mpsc;

use crate::{error::ClientError, event::InputEvent, event::OutputEvent};

type PromiseTx = mpsc::Sender<Result<OutputEvent, ClientError>>;

/// One FIFO-ordered job: the event to dispatch plus where to deliver its
/// result.
struct Job {
    event: InputEvent,
    reply: PromiseTx,
}

/// The single-consumer side of the queue. A session's worker thread calls
/// [`EventQueue::recv`] in a loop, translating each event against the wire
/// and replying through the job's promise.
pub struct EventQueue {
    jobs: mpsc::Receiver<Job>,
}

/// The multi-producer side of the queue. Cheap to clone; every clone shares
/// the same underlying channel (§5: "multi-producer, single-consumer").
#[derive(Clone)]
pub struct EventQueueHandle {
    jobs: mpsc::Sender<Job>,
}

impl EventQueue {
    /// Create a fresh queue and a handle producers can clone freely.
    #[must_use]
    pub fn new() -> (Self, EventQueueHandle) {
        let (tx, rx) = mpsc::channel();
        (Self { jobs: rx }, EventQueueHandle { jobs: tx })
    }

    /// Block until the next input event arrives, or `None` once every
    /// [`EventQueueHandle`] has been dropped (the session should stop).
    #[must_use]
    pub fn recv(&self) -> Option<(InputEvent, EventReply)> {
        self.jobs.recv().ok().map(|job| (job.event, EventReply { reply: job.reply }))
    }
}

/// The other half of a dequeued job: deliver the outcome back to whichever
/// producer is waiting on it.
pub struct EventReply {
    reply: PromiseTx,
}

impl EventReply {
    /// Deliver `result` to the producer that submitted this event. The
    /// producer's [`EventQueueHandle::submit`] call is unblocked as soon as
    /// this returns; a disconnected receiver (the producer gave up waiting)
    /// is not an error here, just a no-op.
    pub fn complete(self, result: Result<OutputEvent, ClientError>) {
        let _ = self.reply.send(result);
    }
}

impl EventQueueHandle {
    /// Enqueue `event` and block until the session has produced its
    /// matching output event (§4.4: `add_input_event_and_wait_for_response`).
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Protocol`]-family errors surfaced by the
    /// session, or an I/O error wrapping a disconnected queue if the
    /// session's worker thread has already stopped.
    pub fn submit(&self, event: InputEvent) -> Result<OutputEvent, ClientError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.jobs
            .send(Job { event, reply: reply_tx })
            .map_err(|_| ClientError::Io(std::io::Error::other("client session worker stopped")))?;
        reply_rx
            .recv()
            .map_err(|_| ClientError::Io(std::io::Error::other("client session worker stopped")))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn submit_round_trips_through_a_worker_thread() {
        let (queue, handle) = EventQueue::new();

        let worker = std::thread::spawn(move || {
            let (event, reply) = queue.recv().expect("a job");
            assert_eq!(event, InputEvent::RemoveFriend { username: "bob".into() });
            reply.complete(Ok(OutputEvent::RemoveFriend));
        });

        let result = handle.submit(InputEvent::RemoveFriend { username: "bob".into() });
        assert_eq!(result.unwrap(), OutputEvent::RemoveFriend);
        worker.join().unwrap();
    }

    #[test]
    fn submit_after_worker_stops_is_an_error() {
        let (queue, handle) = EventQueue::new();
        drop(queue);
        assert!(handle.submit(InputEvent::GetRelations).is_err());
    }

    #[test]
    fn fifo_order_is_preserved_across_multiple_producers() {
        let (queue, handle) = EventQueue::new();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let order_worker = order.clone();

        let worker = std::thread::spawn(move || {
            for _ in 0..3 {
                let (event, reply) = queue.recv().expect("a job");
                if let InputEvent::AddFriend { username } = event {
                    order_worker.lock().unwrap().push(username);
                }
                reply.complete(Ok(OutputEvent::AddFriend { success: true }));
            }
        });

        for name in ["a", "b", "c"] {
            handle.submit(InputEvent::AddFriend { username: name.into() }).unwrap();
        }
        worker.join().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c"]);
    }
}
