use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use nmea_protocol::fault::{CarryBuffer, FaultConfig, FaultInjector, RandomDecisions};
use nmea_protocol::sentence::{sentence_type, TypeFilter};
use nmea_protocol::timestamp::decode_datetime;

const RMC: &[u8] = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";
const ZDA: &[u8] = b"$GPZDA,201530.25,15,06,2022,00,00*6E\r\n";

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Bytes(RMC.len() as u64));

    group.bench_function("sentence_type", |b| {
        b.iter(|| {
            let code = sentence_type(black_box(RMC));
            black_box(code);
        });
    });

    let filter = TypeFilter::parse("GSV,GSA,VDM").unwrap();
    group.bench_function("exclude_filter", |b| {
        b.iter(|| {
            let skip = filter.excludes_line(black_box(RMC));
            black_box(skip);
        });
    });

    group.finish();
}

fn bench_decode_zda(c: &mut Criterion) {
    c.bench_function("decode_zda", |b| {
        b.iter(|| {
            let timestamp = decode_datetime(black_box(ZDA)).unwrap();
            black_box(timestamp);
        });
    });
}

fn bench_fault_injector(c: &mut Criterion) {
    let mut group = c.benchmark_group("fault_injector");
    group.throughput(Throughput::Bytes(RMC.len() as u64));

    for corrupt in [false, true] {
        let name = if corrupt { "faults_on" } else { "faults_off" };
        let config = FaultConfig {
            corrupt,
            ..FaultConfig::default()
        };
        let mut injector = FaultInjector::new(config, RandomDecisions::seeded(42));
        let mut carry = CarryBuffer::new();

        group.bench_function(name, |b| {
            b.iter(|| {
                let decision = injector.apply(&mut carry, black_box(RMC));
                black_box(decision);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_classify,
    bench_decode_zda,
    bench_fault_injector
);
criterion_main!(benches);
