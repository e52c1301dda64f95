use criterion::{criterion_group, criterion_main, Criterion};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use rxvc::api::{EncoderConfig, EncoderSettings};
use rxvc::{Checksum, ChecksumMethod, Frame, XvceCtx};

fn noisy_frame(width: usize, height: usize) -> Frame {
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let mut frame = Frame::new(width, height, rxvc::api::ChromaFormat::CF_420, 8);
    for plane in frame.planes.iter_mut() {
        for v in plane.data.iter_mut() {
            *v = rng.gen_range(0..=255);
        }
    }
    frame
}

fn bench_encode_intra_pic(c: &mut Criterion) {
    let cfg = EncoderConfig {
        width: 64,
        height: 64,
        qp: 32,
        intra_period: 1,
        ..Default::default()
    };
    let frame = noisy_frame(64, 64);
    c.bench_function("encode_intra_64x64", |b| {
        b.iter(|| {
            let mut ctx = XvceCtx::new(&cfg, &EncoderSettings::default()).unwrap();
            ctx.encode_pic(&frame).unwrap()
        })
    });
}

fn bench_checksum(c: &mut Criterion) {
    let frame = noisy_frame(640, 384);
    c.bench_function("md5_picture_640x384", |b| {
        b.iter(|| {
            let mut checksum = Checksum::new(ChecksumMethod::Md5);
            checksum.hash_picture(&frame);
            checksum
        })
    });
    c.bench_function("crc_picture_640x384", |b| {
        b.iter(|| {
            let mut checksum = Checksum::new(ChecksumMethod::Crc);
            checksum.hash_picture(&frame);
            checksum
        })
    });
}

criterion_group!(benches, bench_encode_intra_pic, bench_checksum);
criterion_main!(benches);
