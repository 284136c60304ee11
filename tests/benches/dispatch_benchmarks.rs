//! # PixSim Messenger Benchmarks
//!
//! | Operation | Varies with |
//! |-----------|-------------|
//! | dispatch | number of matching delegates |
//! | dispatch | number of non-matching delegates (other types, names, lanes) |
//! | has_receiver | registry size |
//! | register + remove | registry size |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pixsim_bus::{DelegateHandle, Message, Messenger, MsgFlags};
use pixsim_tests::fixtures::{module, module_in, Calibration, ChargeBatch};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

fn populate(messenger: &Messenger, matching: usize, noise: usize) -> Vec<DelegateHandle> {
    let mut handles = Vec::with_capacity(matching + noise);
    for i in 0..matching {
        handles.push(
            messenger
                .register_filter::<ChargeBatch, _>(&module(&format!("Match{i}")), |_| true, MsgFlags::NONE)
                .expect("register"),
        );
    }
    for i in 0..noise {
        let handle = match i % 3 {
            0 => messenger.register_filter::<Calibration, _>(&module(&format!("Type{i}")), |_| true, MsgFlags::NONE),
            1 => messenger.register_filter::<ChargeBatch, _>(
                &module(&format!("Name{i}")).with_input("other"),
                |_| true,
                MsgFlags::NONE,
            ),
            _ => messenger.register_filter::<ChargeBatch, _>(&module_in(&format!("Lane{i}"), 1), |_| true, MsgFlags::NONE),
        };
        handles.push(handle.expect("register"));
    }
    handles
}

fn teardown(messenger: &Messenger, handles: &[DelegateHandle]) {
    for handle in handles {
        messenger.remove_delegate(handle).expect("remove");
    }
}

fn bench_dispatch_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch-fan-out");
    group.measurement_time(Duration::from_secs(5));
    let producer = module("Producer");

    for receivers in [1, 4, 16, 64] {
        let messenger = Messenger::new();
        let handles = populate(&messenger, receivers, 0);
        let message = Arc::new(Message::global(vec![ChargeBatch { count: 1 }]));

        group.throughput(Throughput::Elements(receivers as u64));
        group.bench_with_input(BenchmarkId::new("receivers", receivers), &message, |b, message| {
            b.iter(|| {
                let report = messenger.dispatch(&producer, Arc::clone(message)).expect("dispatch");
                messenger.clear_sent_messages(producer.lane());
                black_box(report)
            })
        });
        teardown(&messenger, &handles);
    }

    group.finish();
}

fn bench_dispatch_with_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch-noise");
    group.measurement_time(Duration::from_secs(5));
    let producer = module("Producer");

    for noise in [0, 100, 1_000, 10_000] {
        let messenger = Messenger::new();
        let handles = populate(&messenger, 4, noise);
        let message = Arc::new(Message::global(vec![ChargeBatch { count: 1 }]));

        group.bench_with_input(BenchmarkId::new("unrelated-delegates", noise), &message, |b, message| {
            b.iter(|| {
                let report = messenger.dispatch(&producer, Arc::clone(message)).expect("dispatch");
                messenger.clear_sent_messages(producer.lane());
                black_box(report)
            })
        });
        group.bench_with_input(BenchmarkId::new("has-receiver", noise), &message, |b, message| {
            b.iter(|| black_box(messenger.has_receiver(&producer, &**message)))
        });
        teardown(&messenger, &handles);
    }

    group.finish();
}

fn bench_registration_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");
    let receiver = module("Churn");

    for size in [0, 1_000] {
        let messenger = Messenger::new();
        let handles = populate(&messenger, 0, size);
        let mut rng = rand::thread_rng();

        group.bench_function(BenchmarkId::new("register-remove", size), |b| {
            b.iter(|| {
                let count = rng.gen_range(0..u32::MAX);
                let handle = messenger
                    .register_filter::<ChargeBatch, _>(&receiver, move |m| m.data()[0].count == count, MsgFlags::NONE)
                    .expect("register");
                messenger.remove_delegate(&handle).expect("remove");
            })
        });
        teardown(&messenger, &handles);
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_dispatch_fan_out,
    bench_dispatch_with_noise,
    bench_registration_churn,
);

criterion_main!(benches);
