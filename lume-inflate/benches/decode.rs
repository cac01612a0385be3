use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

fn test_data() -> Vec<u8>
{
    // text-like, repetitive enough to exercise the match copy paths
    let mut data = Vec::with_capacity(8 << 20);
    let words = ["deflate", "huffman", "entropy", "window", "symbol", "stream"];

    let mut state = 0xCAFE_F00D_u32;

    while data.len() < (8 << 20)
    {
        state = state.wrapping_mul(1664525).wrapping_add(1013904223);
        data.extend_from_slice(words[(state >> 29) as usize % words.len()].as_bytes());
        data.push(b' ');
    }
    data
}

fn decode_writer_lume(bytes: &[u8]) -> Vec<u8>
{
    let mut deflater = lume_inflate::DeflateDecoder::new(bytes);

    deflater.decode_zlib().unwrap()
}

fn decode_writer_miniz(bytes: &[u8]) -> Vec<u8>
{
    miniz_oxide::inflate::decompress_to_vec_zlib(bytes).unwrap()
}

fn decode_test(c: &mut Criterion)
{
    let data = test_data();
    let compressed = lume_inflate::DeflateEncoder::new(&data).encode_zlib().unwrap();

    let mut group = c.benchmark_group("ZLIB decoding");
    group.throughput(Throughput::Bytes(compressed.len() as u64));

    group.bench_function("LUME", |b| {
        b.iter(|| black_box(decode_writer_lume(compressed.as_slice())))
    });

    group.bench_function("MINIZ-OXIDE", |b| {
        b.iter(|| black_box(decode_writer_miniz(compressed.as_slice())))
    });
}

criterion_group!(benches, decode_test);
criterion_main!(benches);
