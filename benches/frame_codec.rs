use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use audio_streamer::codec::{decode_frame, encode_frame, FrameAssembler, WireFormat};

fn frame(samples: usize) -> Vec<i16> {
    (0..samples).map(|i| ((i * 997) % 65_536) as i16).collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_frame");

    for format in [WireFormat::Binary, WireFormat::Text] {
        for samples in [32usize, 512] {
            let input = frame(samples);
            let mut out = vec![0u8; format.max_payload_len(samples)];

            group.bench_with_input(BenchmarkId::new(format!("{:?}", format), samples), &input, |b, input| {
                b.iter(|| encode_frame(format, black_box(input), &mut out))
            });
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_frame");

    for format in [WireFormat::Binary, WireFormat::Text] {
        for samples in [32usize, 512] {
            let input = frame(samples);
            let mut payload = vec![0u8; format.max_payload_len(samples)];
            let len = encode_frame(format, &input, &mut payload);
            payload.truncate(len);
            let mut out = vec![0i16; samples];

            group.bench_with_input(BenchmarkId::new(format!("{:?}", format), samples), &payload, |b, payload| {
                b.iter(|| decode_frame(format, black_box(payload), &mut out))
            });
        }
    }
    group.finish();
}

fn bench_reassembly(c: &mut Criterion) {
    let samples = 32;
    let mut payload = vec![0u8; WireFormat::Binary.max_payload_len(samples)];
    encode_frame(WireFormat::Binary, &frame(samples), &mut payload);
    let stream: Vec<u8> = payload.iter().copied().cycle().take(payload.len() * 16).collect();

    c.bench_function("assemble_16_frames_in_100_byte_reads", |b| {
        let mut out = vec![0i16; samples];
        b.iter(|| {
            let mut assembler = FrameAssembler::new(WireFormat::Binary, samples);
            let mut frames = 0;
            for chunk in stream.chunks(100) {
                assembler.push(black_box(chunk));
                while assembler.next_frame(&mut out) {
                    frames += 1;
                }
            }
            frames
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_reassembly);
criterion_main!(benches);
