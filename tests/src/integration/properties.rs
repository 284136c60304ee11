//! # Registry Properties
//!
//! proptest-driven checks over arbitrary registration histories:
//!
//! - the forward map and the reverse index stay in bijection through any
//!   sequence of registrations and removals, and end empty
//! - `has_receiver` is true exactly when dispatch would invoke a delegate

#[cfg(test)]
mod tests {
    use crate::fixtures::{detector, module_in, Calibration, ChargeBatch};
    use pixsim_bus::{BaseMessage, DelegateHandle, Message, Messenger, MsgFlags, MultiSlot, SingleSlot};
    use pixsim_types::{Detector, ModuleIdentity};
    use proptest::prelude::*;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy)]
    enum Kind {
        Single,
        Multi,
        Filter,
        AnyFilter,
    }

    #[derive(Debug, Clone)]
    enum Op {
        Register { kind: Kind, calibration: bool, flags: MsgFlags },
        /// Remove the handle at `index % live handles`.
        Remove { index: usize },
    }

    fn kind() -> impl Strategy<Value = Kind> {
        prop_oneof![
            Just(Kind::Single),
            Just(Kind::Multi),
            Just(Kind::Filter),
            Just(Kind::AnyFilter),
        ]
    }

    fn name_flags() -> impl Strategy<Value = MsgFlags> {
        prop_oneof![
            Just(MsgFlags::NONE),
            Just(MsgFlags::IGNORE_NAME),
            Just(MsgFlags::UNNAMED_ONLY),
            Just(MsgFlags::REQUIRED),
        ]
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (kind(), any::<bool>(), name_flags())
                .prop_map(|(kind, calibration, flags)| Op::Register { kind, calibration, flags }),
            2 => any::<usize>().prop_map(|index| Op::Remove { index }),
        ]
    }

    fn register(
        messenger: &Messenger,
        receiver: &ModuleIdentity,
        kind: Kind,
        calibration: bool,
        flags: MsgFlags,
    ) -> DelegateHandle {
        let handle = match (kind, calibration) {
            (Kind::Single, false) => messenger.bind_single(receiver, &SingleSlot::<ChargeBatch>::new(), flags),
            (Kind::Single, true) => messenger.bind_single(receiver, &SingleSlot::<Calibration>::new(), flags),
            (Kind::Multi, false) => messenger.bind_multi(receiver, &MultiSlot::<ChargeBatch>::new(), flags),
            (Kind::Multi, true) => messenger.bind_multi(receiver, &MultiSlot::<Calibration>::new(), flags),
            (Kind::Filter, false) => messenger.register_filter::<ChargeBatch, _>(receiver, |_| true, flags),
            (Kind::Filter, true) => messenger.register_filter::<Calibration, _>(receiver, |_| true, flags),
            (Kind::AnyFilter, _) => messenger.register_any_filter(receiver, |_, _| true, flags),
        };
        handle.expect("generated flags are always compatible")
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_registry_bijection(ops in prop::collection::vec(op(), 0..60)) {
            let messenger = Messenger::new();
            let receiver = module_in("Receiver", 0).with_input("X");
            let mut live: Vec<DelegateHandle> = Vec::new();

            for op in ops {
                match op {
                    Op::Register { kind, calibration, flags } => {
                        live.push(register(&messenger, &receiver, kind, calibration, flags));
                    }
                    Op::Remove { index } => {
                        if live.is_empty() {
                            continue;
                        }
                        let handle = live.swap_remove(index % live.len());
                        prop_assert!(messenger.remove_delegate(&handle).is_ok());
                        prop_assert!(messenger.remove_delegate(&handle).is_err());
                    }
                }
                prop_assert!(messenger.verify_consistency().is_ok());
                prop_assert_eq!(messenger.delegate_count(), live.len());
            }

            for handle in live.drain(..) {
                prop_assert!(messenger.remove_delegate(&handle).is_ok());
            }
            prop_assert!(messenger.is_empty());
            prop_assert!(messenger.verify_consistency().is_ok());
        }
    }

    /// One generated receiver: payload (0 batch, 1 calibration, 2 any), lane,
    /// detector (0 none, 1 dut, 2 telescope), input name, name flags, and
    /// whether its filter accepts.
    type Receiver = (u8, u16, u8, bool, MsgFlags, bool);

    fn receiver() -> impl Strategy<Value = Receiver> {
        (
            0u8..3,
            0u16..2,
            0u8..3,
            any::<bool>(),
            prop_oneof![Just(MsgFlags::NONE), Just(MsgFlags::IGNORE_NAME), Just(MsgFlags::UNNAMED_ONLY)],
            any::<bool>(),
        )
    }

    fn pick(detectors: &[Arc<Detector>; 2], index: u8) -> Option<Arc<Detector>> {
        match index {
            1 => Some(Arc::clone(&detectors[0])),
            2 => Some(Arc::clone(&detectors[1])),
            _ => None,
        }
    }

    fn message<T: pixsim_types::Payload>(record: T, origin: Option<Arc<Detector>>) -> Arc<Message<T>> {
        Arc::new(match origin {
            Some(detector) => Message::new(vec![record], detector),
            None => Message::global(vec![record]),
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn prop_has_receiver_agrees_with_dispatch(
            receivers in prop::collection::vec(receiver(), 0..8),
            calibration in any::<bool>(),
            producer_lane in 0u16..2,
            origin in 0u8..3,
            named in any::<bool>(),
        ) {
            let detectors = [detector("dut"), detector("telescope")];
            let messenger = Messenger::new();
            let mut handles = Vec::new();

            for (index, (payload, lane, det, input, flags, accepts)) in receivers.into_iter().enumerate() {
                let mut identity = module_in(&format!("R{index}"), lane);
                if input {
                    identity = identity.with_input("X");
                }
                if let Some(detector) = pick(&detectors, det) {
                    identity = identity.with_detector(detector);
                }
                let handle = match payload {
                    0 => messenger.register_filter::<ChargeBatch, _>(&identity, move |_| accepts, flags),
                    1 => messenger.register_filter::<Calibration, _>(&identity, move |_| accepts, flags),
                    _ => messenger.register_any_filter(&identity, move |_, _| accepts, flags),
                };
                handles.push(handle.expect("valid flags"));
            }

            let producer = module_in("Producer", producer_lane);
            let name = if named { "X" } else { "" };
            let origin = pick(&detectors, origin);
            let (predicted, report) = if calibration {
                let msg = message(Calibration { run: 1 }, origin);
                let predicted = messenger.has_receiver_named(&producer, &*msg as &dyn BaseMessage, name);
                (predicted, messenger.dispatch_named(&producer, msg, name).expect("filters never fail"))
            } else {
                let msg = message(ChargeBatch { count: 1 }, origin);
                let predicted = messenger.has_receiver_named(&producer, &*msg as &dyn BaseMessage, name);
                (predicted, messenger.dispatch_named(&producer, msg, name).expect("filters never fail"))
            };

            prop_assert_eq!(predicted, report.invoked > 0);
            prop_assert!(report.accepted <= report.invoked);

            for handle in &handles {
                prop_assert!(messenger.remove_delegate(handle).is_ok());
            }
            prop_assert!(messenger.is_empty());
        }
    }
}
