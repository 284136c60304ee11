//! # Routing Scenarios
//!
//! Messenger contracts exercised end to end with test payloads:
//!
//! 1. **Single/multi fan-out**: one message reaches a required single slot and
//!    a multi slot; a second message trips the single slot
//! 2. **Ordering**: delegates run in registration order
//! 3. **Wildcard fan-out**: any-type filters see every type, after the typed
//!    delegates
//! 4. **Name scoping**: exact names, wildcard names and unnamed-only

#[cfg(test)]
mod tests {
    use crate::fixtures::{detector, module, module_in, Calibration, ChargeBatch};
    use parking_lot::Mutex;
    use pixsim_bus::{Message, Messenger, MessengerError, MsgFlags, MultiSlot, SingleSlot};
    use std::sync::Arc;

    fn batch(count: u32) -> Arc<Message<ChargeBatch>> {
        Arc::new(Message::global(vec![ChargeBatch { count }]))
    }

    // =========================================================================
    // SINGLE/MULTI FAN-OUT
    // =========================================================================

    #[test]
    fn test_single_and_multi_receive_same_batch() {
        let messenger = Messenger::new();
        let producer = module("P").with_output("default");
        let a = module("A").with_input("default");
        let b = module("B").with_input("default");

        let a_slot = SingleSlot::<ChargeBatch>::new();
        let b_slot = MultiSlot::<ChargeBatch>::new();
        let ha = messenger
            .bind_single(&a, &a_slot, MsgFlags::REQUIRED)
            .expect("bind A");
        let hb = messenger.bind_multi(&b, &b_slot, MsgFlags::NONE).expect("bind B");

        assert!(ha.unmet_requirement().is_some());
        let report = messenger.dispatch(&producer, batch(5)).expect("first dispatch");
        assert_eq!(report.accepted, 2);

        let held = a_slot.get().expect("A filled");
        assert_eq!(held.data(), &[ChargeBatch { count: 5 }]);
        let collected: Vec<_> = b_slot.snapshot().iter().map(|m| m.data()[0].clone()).collect();
        assert_eq!(collected, vec![ChargeBatch { count: 5 }]);
        assert!(ha.unmet_requirement().is_none());

        messenger.remove_delegate(&ha).expect("remove A");
        messenger.remove_delegate(&hb).expect("remove B");
    }

    #[test]
    fn test_second_batch_fails_fast_at_full_single_slot() {
        let messenger = Messenger::new();
        let producer = module("P").with_output("default");
        let a = module("A").with_input("default");
        let b = module("B").with_input("default");

        let a_slot = SingleSlot::<ChargeBatch>::new();
        let b_slot = MultiSlot::<ChargeBatch>::new();
        let ha = messenger
            .bind_single(&a, &a_slot, MsgFlags::REQUIRED)
            .expect("bind A");
        let hb = messenger.bind_multi(&b, &b_slot, MsgFlags::NONE).expect("bind B");

        messenger.dispatch(&producer, batch(5)).expect("first dispatch");
        let err = messenger
            .dispatch(&producer, batch(7))
            .expect_err("A already holds a batch");
        assert!(matches!(err, MessengerError::InvalidBinding { .. }));

        // A was registered first, so B never saw the second batch.
        assert_eq!(a_slot.get().expect("A filled").data()[0].count, 5);
        assert_eq!(b_slot.len(), 1);
        assert_eq!(messenger.sent_messages(producer.lane()).len(), 1);
        assert_eq!(messenger.stats().failed_dispatches, 1);

        messenger.remove_delegate(&ha).expect("remove A");
        messenger.remove_delegate(&hb).expect("remove B");
    }

    #[test]
    fn test_reset_reopens_single_slot() {
        let messenger = Messenger::new();
        let producer = module("P");
        let a = module("A");
        let slot = SingleSlot::<ChargeBatch>::new();
        let handle = messenger.bind_single(&a, &slot, MsgFlags::REQUIRED).expect("bind");

        messenger.dispatch(&producer, batch(1)).expect("first unit of work");
        handle.reset();
        assert!(handle.unmet_requirement().is_some());
        messenger.dispatch(&producer, batch(2)).expect("second unit of work");
        assert_eq!(slot.get().expect("filled").data()[0].count, 2);

        messenger.remove_delegate(&handle).expect("remove");
    }

    // =========================================================================
    // ORDERING AND WILDCARD FAN-OUT
    // =========================================================================

    #[test]
    fn test_typed_before_wildcard_in_registration_order() {
        let messenger = Messenger::new();
        let producer = module("P");
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        {
            let log = Arc::clone(&log);
            handles.push(
                messenger
                    .register_any_filter(
                        &module("Wildcard"),
                        move |message, _| {
                            log.lock().push(format!("*:{}", message.payload_type().name()));
                            true
                        },
                        MsgFlags::IGNORE_NAME,
                    )
                    .expect("wildcard"),
            );
        }
        for name in ["T1", "T2"] {
            let log = Arc::clone(&log);
            handles.push(
                messenger
                    .register_filter::<ChargeBatch, _>(
                        &module(name),
                        move |_| {
                            log.lock().push(name.to_string());
                            true
                        },
                        MsgFlags::NONE,
                    )
                    .expect("typed"),
            );
        }

        messenger.dispatch(&producer, batch(1)).expect("batch");
        messenger
            .dispatch(&producer, Arc::new(Message::global(vec![Calibration { run: 3 }])))
            .expect("calibration");

        assert_eq!(
            *log.lock(),
            vec!["T1", "T2", "*:ChargeBatch", "*:Calibration"]
        );
        for handle in &handles {
            messenger.remove_delegate(handle).expect("remove");
        }
        assert!(messenger.is_empty());
    }

    #[test]
    fn test_rejecting_filter_counts_as_invoked_not_accepted() {
        let messenger = Messenger::new();
        let producer = module("P");
        let handle = messenger
            .register_filter::<ChargeBatch, _>(&module("Odd"), |m| m.data()[0].count % 2 == 1, MsgFlags::NONE)
            .expect("filter");

        let even = messenger.dispatch(&producer, batch(2)).expect("even");
        assert_eq!((even.invoked, even.accepted), (1, 0));
        assert!(!even.was_received());
        let odd = messenger.dispatch(&producer, batch(3)).expect("odd");
        assert!(odd.was_received());

        messenger.remove_delegate(&handle).expect("remove");
    }

    // =========================================================================
    // NAME, DETECTOR AND LANE SCOPING
    // =========================================================================

    #[test]
    fn test_exact_wildcard_and_unnamed_names() {
        let messenger = Messenger::new();
        let producer = module("P");

        let exact = MultiSlot::<ChargeBatch>::new();
        let any = MultiSlot::<ChargeBatch>::new();
        let unnamed = MultiSlot::<ChargeBatch>::new();
        let handles = [
            messenger
                .bind_multi(&module("Exact").with_input("X"), &exact, MsgFlags::NONE)
                .expect("exact"),
            messenger
                .bind_multi(&module("Any").with_input("X"), &any, MsgFlags::IGNORE_NAME)
                .expect("any"),
            messenger
                .bind_multi(&module("Unnamed").with_input("X"), &unnamed, MsgFlags::UNNAMED_ONLY)
                .expect("unnamed"),
        ];

        messenger.dispatch_named(&producer, batch(1), "X").expect("X");
        messenger.dispatch_named(&producer, batch(2), "Y").expect("Y");
        messenger.dispatch(&producer, batch(3)).expect("default");

        let counts = |slot: &MultiSlot<ChargeBatch>| -> Vec<u32> {
            slot.snapshot().iter().map(|m| m.data()[0].count).collect()
        };
        assert_eq!(counts(&exact), vec![1]);
        assert_eq!(counts(&any), vec![1, 2, 3]);
        assert_eq!(counts(&unnamed), vec![3]);

        for handle in &handles {
            messenger.remove_delegate(handle).expect("remove");
        }
    }

    #[test]
    fn test_detector_and_lane_scoping() {
        let messenger = Messenger::new();
        let dut = detector("dut");
        let telescope = detector("telescope");

        let own = MultiSlot::<ChargeBatch>::new();
        let other_lane = MultiSlot::<ChargeBatch>::new();
        let h1 = messenger
            .bind_multi(&module("Reader").with_detector(Arc::clone(&dut)), &own, MsgFlags::NONE)
            .expect("own");
        let h2 = messenger
            .bind_multi(&module_in("Reader", 1), &other_lane, MsgFlags::NONE)
            .expect("other lane");

        let producer = module("P");
        let from_dut = Arc::new(Message::new(vec![ChargeBatch { count: 1 }], Arc::clone(&dut)));
        let from_telescope = Arc::new(Message::new(vec![ChargeBatch { count: 2 }], telescope));
        assert!(messenger.has_receiver(&producer, &*from_dut));
        assert!(!messenger.has_receiver(&producer, &*from_telescope));

        messenger.dispatch(&producer, from_dut).expect("dut");
        messenger.dispatch(&producer, from_telescope).expect("telescope");
        messenger.dispatch(&producer, batch(3)).expect("global");

        let counts: Vec<u32> = own.snapshot().iter().map(|m| m.data()[0].count).collect();
        assert_eq!(counts, vec![1, 3]);
        assert!(other_lane.is_empty());

        messenger.remove_delegate(&h1).expect("remove");
        messenger.remove_delegate(&h2).expect("remove");
    }
}
