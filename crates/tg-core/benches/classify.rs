use criterion::{black_box, criterion_group, criterion_main, Criterion};

use tg_core::classify::{Classifier, ReferenceTables};
use tg_core::url::hostname_of;

const URLS: &[&str] = &[
    "https://static01.nytimes.com/assets/app.js",
    "https://pagead2.googlesyndication.com/pagead/show_ads_impl.js",
    "https://cdn.jsdelivr.net/npm/lib@1/dist/lib.min.js",
    "https://user:pw@tracker.example.xyz:8443/p.gif?id=1",
    "https://[2001:db8::1]/favicon.ico",
    "https://fonts.gstatic.com/s/roboto.woff2",
];

fn tables() -> ReferenceTables {
    let mut tables = ReferenceTables::new();
    for i in 0..10_000 {
        tables.insert_blocklist(&format!("tracker{i}.com"), "Synthetic tracker");
    }
    tables.insert_blocklist("googlesyndication.com", "Google ads");
    tables.insert_tld_risk(".xyz", 8);
    tables.insert_tld_risk(".top", 6);
    tables
}

fn bench_classify(c: &mut Criterion) {
    let classifier = Classifier::new(tables());
    let hosts: Vec<String> = URLS.iter().filter_map(|url| hostname_of(url)).collect();

    c.bench_function("hostname_of", |b| {
        b.iter(|| {
            for url in URLS {
                black_box(hostname_of(black_box(url)));
            }
        })
    });

    c.bench_function("classify", |b| {
        b.iter(|| {
            for host in &hosts {
                black_box(classifier.classify(black_box(host)));
            }
        })
    });
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
