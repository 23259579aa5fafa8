//! Periodic sampling on a background thread.
//!
//! A [`Poller`] owns an [`Adc`] and runs one transaction per tick, handing
//! each sample to a bounded channel. With a `bounded(1)` conduit the poller
//! holds at most one pending sample: if the consumer has not taken the last
//! one, the poller blocks in `send` and the next transaction waits.
//!
//! Ticks are not caught up. A tick that falls due while the poller is
//! blocked is collapsed into the next one.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use log::{debug, error, info};

use crate::adc::Adc;

#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    #[error("ADC transaction failed: {0:?}")]
    Adc(E),
    #[error("failed to spawn poller thread")]
    Spawn(#[source] io::Error),
    #[error("poller thread panicked")]
    Panicked,
}

/// Handle to a running poller thread.
pub struct Poller<A: Adc> {
    stop: Option<Sender<()>>,
    handle: JoinHandle<Result<A, Error<A::Error>>>,
}

impl<A> Poller<A>
where
    A: Adc + Send + 'static,
    A::Error: Send + 'static,
{
    /// Start reading `adc` every `period`, sending samples into `conduit`.
    pub fn spawn(adc: A, period: Duration, conduit: Sender<u32>) -> Result<Self, Error<A::Error>> {
        let (stop, stop_rx) = bounded::<()>(0);

        let handle = thread::Builder::new()
            .name("adc-poller".into())
            .spawn(move || run(adc, period, conduit, stop_rx))
            .map_err(Error::Spawn)?;

        info!("polling ADC every {:?}", period);
        Ok(Poller {
            stop: Some(stop),
            handle,
        })
    }

    /// Whether the poller thread has exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop polling and hand back the ADC.
    ///
    /// Returns the error that ended polling if the thread had already
    /// stopped because a transaction failed.
    pub fn stop(mut self) -> Result<A, Error<A::Error>> {
        debug!("stopping poller");
        // Dropping the sender wakes the thread wherever it is blocked.
        drop(self.stop.take());
        let result = self.handle.join().map_err(|_| Error::Panicked)?;
        info!("poller stopped");
        result
    }
}

fn run<A: Adc>(
    mut adc: A,
    period: Duration,
    conduit: Sender<u32>,
    stop: Receiver<()>,
) -> Result<A, Error<A::Error>> {
    let ticker = tick(period);

    loop {
        select! {
            recv(ticker) -> _ => {}
            recv(stop) -> _ => return Ok(adc),
        }

        let sample = match adc.read() {
            Ok(sample) => sample,
            Err(e) => {
                error!("ADC read failed, stopping poller");
                return Err(Error::Adc(e));
            }
        };

        select! {
            send(conduit, sample) -> res => {
                if res.is_err() {
                    debug!("sample consumer went away");
                    return Ok(adc);
                }
            }
            recv(stop) -> _ => return Ok(adc),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    const PERIOD: Duration = Duration::from_millis(5);

    /// Counts transactions and returns the transaction index as the sample.
    struct Counter {
        reads: Arc<AtomicU32>,
        fail_at: Option<u32>,
    }

    #[derive(Debug, PartialEq)]
    struct ReadFault;

    impl Adc for Counter {
        type Error = ReadFault;

        fn read(&mut self) -> Result<u32, ReadFault> {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(n) {
                return Err(ReadFault);
            }
            Ok(n)
        }
    }

    fn counter() -> (Counter, Arc<AtomicU32>) {
        let reads = Arc::new(AtomicU32::new(0));
        (
            Counter {
                reads: reads.clone(),
                fail_at: None,
            },
            reads,
        )
    }

    #[test]
    fn delivers_one_sample_per_tick_in_order() {
        let (adc, _) = counter();
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, PERIOD, tx).unwrap();

        let samples: Vec<u32> = rx.iter().take(5).collect();
        assert_eq!(samples, [0, 1, 2, 3, 4]);

        poller.stop().unwrap();
    }

    #[test]
    fn first_sample_waits_one_period() {
        let (adc, _) = counter();
        let (tx, rx) = bounded(1);
        let start = Instant::now();
        let poller = Poller::spawn(adc, Duration::from_millis(50), tx).unwrap();

        assert_eq!(rx.recv(), Ok(0));
        assert!(start.elapsed() >= Duration::from_millis(50));

        poller.stop().unwrap();
    }

    #[test]
    fn runs_one_transaction_per_tick() {
        let period = Duration::from_millis(20);
        let k = 10;
        let (adc, reads) = counter();
        let (tx, rx) = bounded(1);
        let start = Instant::now();
        let poller = Poller::spawn(adc, period, tx).unwrap();

        let samples: Vec<u32> = rx.iter().take(k).collect();
        let elapsed = start.elapsed();

        assert_eq!(samples, (0..k as u32).collect::<Vec<_>>());
        // k ticks have to pass; allow a little timer slop
        assert!(elapsed >= period * k as u32 * 9 / 10, "{:?}", elapsed);
        assert!(reads.load(Ordering::SeqCst) <= k as u32 + 1);

        poller.stop().unwrap();
    }

    #[test]
    fn missed_ticks_are_not_caught_up() {
        let period = Duration::from_millis(20);
        let (adc, _) = counter();
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, period, tx).unwrap();

        thread::sleep(period * 10);

        // buffered sample, parked sample and at most one collapsed tick
        let backlog: Vec<u32> = rx.iter().take(3).collect();
        assert_eq!(backlog, [0, 1, 2]);

        let start = Instant::now();
        let samples: Vec<u32> = rx.iter().take(5).collect();
        let elapsed = start.elapsed();

        assert_eq!(samples, [3, 4, 5, 6, 7]);
        assert!(elapsed >= period * 4 * 9 / 10, "{:?}", elapsed);

        poller.stop().unwrap();
    }

    #[test]
    fn stalled_consumer_blocks_poller() {
        let (adc, reads) = counter();
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, PERIOD, tx).unwrap();

        // Many ticks go by: one sample sits in the slot, the next read is
        // parked in send, nothing further is started.
        thread::sleep(PERIOD * 20);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(rx.len(), 1);

        // Nothing was dropped or overwritten.
        let samples: Vec<u32> = rx.iter().take(4).collect();
        assert_eq!(samples, [0, 1, 2, 3]);

        poller.stop().unwrap();
    }

    #[test]
    fn stop_while_blocked_on_full_conduit() {
        let (adc, reads) = counter();
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, PERIOD, tx).unwrap();

        thread::sleep(PERIOD * 10);
        let adc = poller.stop().unwrap();
        assert_eq!(adc.reads.load(Ordering::SeqCst), reads.load(Ordering::SeqCst));

        // The buffered sample is still there and the conduit is closed.
        assert_eq!(rx.recv(), Ok(0));
        assert!(rx.recv().is_err());
    }

    #[test]
    fn consumer_drop_ends_poller() {
        let (adc, _) = counter();
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, PERIOD, tx).unwrap();

        assert_eq!(rx.recv(), Ok(0));
        drop(rx);

        let deadline = Instant::now() + Duration::from_secs(2);
        while !poller.is_finished() && Instant::now() < deadline {
            thread::sleep(PERIOD);
        }
        assert!(poller.is_finished());
        assert!(poller.stop().is_ok());
    }

    #[test]
    fn read_error_ends_poller_and_closes_conduit() {
        let (mut adc, _) = counter();
        adc.fail_at = Some(2);
        let (tx, rx) = bounded(1);
        let poller = Poller::spawn(adc, PERIOD, tx).unwrap();

        let samples: Vec<u32> = rx.iter().collect();
        assert_eq!(samples, [0, 1]);

        match poller.stop() {
            Err(Error::Adc(e)) => assert_eq!(e, ReadFault),
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("poller should have failed"),
        }
    }
}
