//! Pipeline benchmark: raw URLs → lexical features → encoded matrix.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use urlsentry::features::{extract, FeatureBatch, TldEncoder};

fn make_urls(n: usize) -> Vec<String> {
    (0..n)
        .map(|i| match i % 3 {
            0 => format!("https://www.example{}.com/docs/page?id={}", i, i),
            1 => format!("http://bit.ly/login-{}", i),
            _ => format!("http://10.0.{}.{}/admin/update.php", i % 256, i % 7),
        })
        .collect()
}

fn bench_extract_one(c: &mut Criterion) {
    let url = "http://secure-paypal.account-update.example.net/webscr?cmd=_login&x=%20";
    c.bench_function("extract_one_url", |b| b.iter(|| extract(black_box(url))));
}

fn bench_batch_encode(c: &mut Criterion) {
    let urls = make_urls(1000);
    let encoder = TldEncoder::PerBatch;

    c.bench_function("extract_and_encode_1000_urls", |b| {
        b.iter(|| {
            let batch = FeatureBatch::extract(black_box(urls.as_slice()));
            black_box(batch.encode(&encoder))
        })
    });
}

criterion_group!(benches, bench_extract_one, bench_batch_encode);
criterion_main!(benches);
