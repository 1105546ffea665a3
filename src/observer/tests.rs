use mockall::predicate::*;
use mockall::*;

use super::*;
use crate::measurements::MeasurementState;

mock! {
    Display {}
    impl Observer for Display {
        fn receive(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
    }
}

#[cfg(test)]
mod observer_tests {
    use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
    use std::time::{Duration, Instant};

    use itertools::Itertools;

    use super::*;

    const WAIT: Duration = Duration::from_secs(5);

    fn snapshot(cycle: u64) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(cycle, MeasurementState::new(27315 + cycle as u16, 29.92)))
    }

    fn forward(tx: Sender<u64>) -> impl Observer {
        move |s: &Snapshot| -> anyhow::Result<()> {
            tx.send(s.cycle())?;
            Ok(())
        }
    }

    fn collect(rx: &Receiver<u64>, n: usize) -> Vec<u64> {
        (0..n).map(|_| rx.recv_timeout(WAIT).unwrap()).collect()
    }

    #[test]
    fn deliver_hands_over_snapshots_in_order() {
        let mut display = MockDisplay::new();
        let mut seq = Sequence::new();
        for cycle in 1..=3u64 {
            display
                .expect_receive()
                .withf(move |s| s.cycle() == cycle)
                .times(1)
                .in_sequence(&mut seq)
                .returning(|_| Ok(()));
        }

        let (tx, rx) = mpsc::channel();
        for cycle in 1..=3 {
            tx.send(snapshot(cycle)).unwrap();
        }
        drop(tx);

        deliver("mock", display, rx);
    }

    #[test]
    fn deliver_keeps_going_after_an_error() {
        let mut display = MockDisplay::new();
        display
            .expect_receive()
            .with(function(|s: &Snapshot| s.cycle() == 1))
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("screen unplugged")));
        display
            .expect_receive()
            .with(function(|s: &Snapshot| s.cycle() == 2))
            .times(1)
            .returning(|_| Ok(()));

        let (tx, rx) = mpsc::channel();
        tx.send(snapshot(1)).unwrap();
        tx.send(snapshot(2)).unwrap();
        drop(tx);

        deliver("mock", display, rx);
    }

    #[test]
    fn subscribe_rejects_blank_name() {
        let registry = ObserverRegistry::new();
        let (tx, _rx) = mpsc::channel();

        let result = registry.subscribe("   ", forward(tx));

        assert!(matches!(result, Err(SubscribeError::EmptyName)));
        assert!(registry.is_empty());
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let registry = ObserverRegistry::new();
        let (tx_a, rx_a) = mpsc::channel();
        let (tx_b, rx_b) = mpsc::channel();
        registry.subscribe("a", forward(tx_a)).unwrap();
        registry.subscribe("b", forward(tx_b)).unwrap();
        assert_eq!(registry.len(), 2);

        for cycle in 1..=4 {
            registry.publish(&snapshot(cycle));
        }

        assert_eq!(collect(&rx_a, 4), vec![1, 2, 3, 4]);
        assert_eq!(collect(&rx_b, 4), vec![1, 2, 3, 4]);
    }

    #[test]
    fn duplicate_registrations_each_get_a_copy() {
        let registry = ObserverRegistry::new();
        let (tx, rx) = mpsc::channel();
        let first = registry.subscribe("twice", forward(tx.clone())).unwrap();
        let second = registry.subscribe("twice", forward(tx)).unwrap();
        assert_ne!(first, second);

        registry.publish(&snapshot(1));

        assert_eq!(collect(&rx, 2), vec![1, 1]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let registry = ObserverRegistry::new();
        let (tx, rx) = mpsc::channel();
        let id = registry.subscribe("leaving", forward(tx)).unwrap();

        registry.publish(&snapshot(1));
        assert!(registry.unsubscribe(id));
        registry.publish(&snapshot(2));

        assert_eq!(rx.recv_timeout(WAIT), Ok(1));
        // worker exits and drops the sender once its queue is closed
        assert_eq!(rx.recv_timeout(WAIT), Err(RecvTimeoutError::Disconnected));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn failing_observers_do_not_affect_others() {
        let registry = ObserverRegistry::new();
        registry
            .subscribe("broken", |_: &Snapshot| -> anyhow::Result<()> {
                anyhow::bail!("always fails")
            })
            .unwrap();
        registry
            .subscribe("panicky", |s: &Snapshot| -> anyhow::Result<()> {
                panic!("cannot draw cycle {}", s.cycle())
            })
            .unwrap();
        let (tx, rx) = mpsc::channel();
        registry.subscribe("healthy", forward(tx)).unwrap();

        for cycle in 1..=5 {
            registry.publish(&snapshot(cycle));
        }

        assert_eq!(collect(&rx, 5), vec![1, 2, 3, 4, 5]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn slow_observer_does_not_block_publish() {
        let registry = ObserverRegistry::new();
        registry
            .subscribe("slow", |_: &Snapshot| -> anyhow::Result<()> {
                thread::sleep(Duration::from_millis(500));
                Ok(())
            })
            .unwrap();
        let (tx, rx) = mpsc::channel();
        registry.subscribe("fast", forward(tx)).unwrap();

        let started = Instant::now();
        for cycle in 1..=5 {
            registry.publish(&snapshot(cycle));
        }
        assert!(started.elapsed() < Duration::from_millis(500));

        let cycles = collect(&rx, 5);
        assert!(cycles.iter().tuple_windows().all(|(a, b)| a < b));
    }
}
