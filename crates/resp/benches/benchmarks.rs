//! Performance benchmarks for RESP decoder, encoder and pipeline

use std::hint::black_box;

use bytes::Bytes;
use bytes::BytesMut;
use criterion::Criterion;
use criterion::Throughput;
use criterion::criterion_group;
use criterion::criterion_main;
use resp::Command;
use resp::Pipeline;
use resp::RespDecoder;
use resp::RespEncoder;
use resp::RespValue;
use resp::WriteBuffer;

fn bench_decode_scalars(c: &mut Criterion) {
	let mut group = c.benchmark_group("decode_scalar");
	let cases: [(&str, &[u8]); 3] = [
		("simple_string", b"+OK\r\n"),
		("bulk_string", b"$11\r\nhello world\r\n"),
		("integer", b":1000\r\n"),
	];

	for (name, data) in cases {
		group.throughput(Throughput::Bytes(data.len() as u64));
		group.bench_function(name, |b| b.iter(|| resp::decode(black_box(data)).unwrap()));
	}
	group.finish();
}

fn bench_decode_large_array(c: &mut Criterion) {
	let mut group = c.benchmark_group("decode_large_array");

	let mut data = BytesMut::from("*100\r\n");
	for i in 0..100 {
		data.extend_from_slice(format!("$3\r\n{:03}\r\n", i).as_bytes());
	}

	group.throughput(Throughput::Bytes(data.len() as u64));
	group.bench_function("array_100_items", |b| {
		b.iter(|| resp::decode(black_box(&data)).unwrap())
	});
	group.bench_function("array_100_items_byte_at_a_time", |b| {
		b.iter(|| {
			let mut decoder = RespDecoder::new();
			let mut decoded = 0;
			for byte in data.chunks(1) {
				decoded += decoder.feed(black_box(byte)).count();
			}
			decoded
		})
	});
	group.finish();
}

fn bench_encode(c: &mut Criterion) {
	let mut group = c.benchmark_group("encode");
	let simple = RespValue::SimpleString(Bytes::from("OK"));
	let command = Command::new("SET").arg("key").arg("value").into_value();

	group.bench_function("simple_string", |b| b.iter(|| black_box(&simple).encode()));
	group.bench_function("set_command", |b| b.iter(|| black_box(&command).encode()));
	group.finish();
}

fn bench_pipelined_replies(c: &mut Criterion) {
	let mut group = c.benchmark_group("pipeline");
	let mut replies = BytesMut::new();
	for _ in 0..64 {
		RespValue::simple_string("OK").encode_to(&mut replies);
	}

	group.throughput(Throughput::Elements(64));
	group.bench_function("64_commands_roundtrip", |b| {
		b.iter(|| {
			let mut pipeline = Pipeline::new(WriteBuffer::new());
			let mut decoder = RespDecoder::new();
			pipeline.request(64);
			let responses: Vec<_> = (0..64)
				.map(|_| pipeline.enqueue(Command::new("PING").into_value()).unwrap())
				.collect();
			black_box(pipeline.sink_mut().take());
			for value in decoder.feed(&replies) {
				pipeline.on_decoded(value.unwrap()).unwrap();
			}
			responses
		})
	});
	group.finish();
}

criterion_group!(
	benches,
	bench_decode_scalars,
	bench_decode_large_array,
	bench_encode,
	bench_pipelined_replies,
);

criterion_main!(benches);
