//! # Concurrent Lanes
//!
//! Several worker threads share one messenger, each on its own lane. Lanes
//! must never see each other's messages, and registrations from different
//! threads must leave the registry consistent.

#[cfg(test)]
mod tests {
    use crate::fixtures::{module_in, ChargeBatch};
    use pixsim_bus::{Message, Messenger, MsgFlags, MultiSlot};
    use pixsim_runtime::{install_demo_pipeline, MonitorTally, RuntimeConfig, Simulation};
    use pixsim_types::LaneId;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::thread;

    const LANES: u16 = 8;
    const MESSAGES: u32 = 200;

    #[test]
    fn test_lanes_never_cross() {
        let messenger = Arc::new(Messenger::new());
        let observed = Arc::new(AtomicU64::new(0));

        thread::scope(|scope| {
            for lane in 0..LANES {
                let messenger = Arc::clone(&messenger);
                let observed = Arc::clone(&observed);
                scope.spawn(move || {
                    let receiver = module_in("Collector", lane);
                    let producer = module_in("Producer", lane);
                    let slot = MultiSlot::<ChargeBatch>::new();
                    let bound = messenger
                        .bind_multi(&receiver, &slot, MsgFlags::NONE)
                        .expect("bind");
                    let counter = Arc::clone(&observed);
                    let monitor = messenger
                        .register_any_filter(
                            &module_in("Monitor", lane),
                            move |_, _| {
                                counter.fetch_add(1, Ordering::Relaxed);
                                true
                            },
                            MsgFlags::IGNORE_NAME,
                        )
                        .expect("monitor");

                    for count in 0..MESSAGES {
                        let report = messenger
                            .dispatch(&producer, Arc::new(Message::global(vec![ChargeBatch { count }])))
                            .expect("dispatch");
                        assert_eq!(report.accepted, 2);
                    }

                    let counts: Vec<u32> = slot.snapshot().iter().map(|m| m.data()[0].count).collect();
                    assert_eq!(counts, (0..MESSAGES).collect::<Vec<_>>());
                    assert_eq!(messenger.sent_messages(LaneId(lane)).len(), MESSAGES as usize);
                    assert_eq!(messenger.clear_sent_messages(LaneId(lane)), MESSAGES as usize);

                    messenger.remove_delegate(&bound).expect("remove");
                    messenger.remove_delegate(&monitor).expect("remove");
                });
            }
        });

        assert_eq!(observed.load(Ordering::Relaxed), u64::from(LANES) * u64::from(MESSAGES));
        assert!(messenger.is_empty());
        messenger.verify_consistency().expect("consistent");
        assert_eq!(messenger.stats().messages_dispatched, u64::from(LANES) * u64::from(MESSAGES));
    }

    #[test]
    fn test_concurrent_churn_stays_consistent() {
        let messenger = Arc::new(Messenger::new());

        thread::scope(|scope| {
            for lane in 0..LANES {
                let messenger = Arc::clone(&messenger);
                scope.spawn(move || {
                    let receiver = module_in("Churn", lane);
                    for round in 0..50 {
                        let slots: Vec<_> = (0..4).map(|_| MultiSlot::<ChargeBatch>::new()).collect();
                        let handles: Vec<_> = slots
                            .iter()
                            .map(|slot| messenger.bind_multi(&receiver, slot, MsgFlags::NONE).expect("bind"))
                            .collect();
                        messenger
                            .dispatch(
                                &module_in("Producer", lane),
                                Arc::new(Message::global(vec![ChargeBatch { count: round }])),
                            )
                            .expect("dispatch");
                        for (slot, handle) in slots.iter().zip(&handles) {
                            assert_eq!(slot.len(), 1);
                            messenger.remove_delegate(handle).expect("remove");
                        }
                    }
                });
            }
        });

        assert!(messenger.is_empty());
        messenger.verify_consistency().expect("consistent");
    }

    #[test]
    fn test_simulation_with_more_lanes_than_events() {
        let config = RuntimeConfig {
            events: 3,
            workers: 6,
            ..RuntimeConfig::default()
        };
        let tally = MonitorTally::new();
        let mut simulation = Simulation::new(config).expect("valid config");
        install_demo_pipeline(&mut simulation, &tally);

        let summary = simulation.run().expect("idle lanes are fine");
        assert_eq!(summary.lanes, 6);
        assert_eq!(tally.count("MCTrack"), 3);
    }
}
