use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use creditpost_core::{BusinessId, IdempotencyKey, ProductId};
use creditpost_infra::catalog::{CatalogStore, NewBusiness, NewProduct};
use creditpost_infra::{InMemoryStore, PostingEngine};
use creditpost_purchasing::{CreditSnapshot, LockedProduct, PurchaseItem, PurchaseRequest, price_purchase};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

/// A business with an effectively unlimited credit line and `n` well-stocked
/// products.
fn catalog(rt: &tokio::runtime::Runtime, n: usize) -> (InMemoryStore, BusinessId, Vec<ProductId>) {
    rt.block_on(async {
        let store = InMemoryStore::new();
        let business = store
            .register_business(&NewBusiness::new("Bench Co", i64::MAX / 2).unwrap())
            .await
            .unwrap();
        let mut products = Vec::with_capacity(n);
        for i in 0..n {
            let product = NewProduct::new(business, &format!("SKU-{i}"), "Bench item", i64::MAX / 4, 100).unwrap();
            products.push(store.create_product(&product).await.unwrap());
        }
        (store, business, products)
    })
}

fn bench_pricing(c: &mut Criterion) {
    let mut group = c.benchmark_group("price_purchase");

    for lines in [1usize, 10, 100] {
        let business = BusinessId::new();
        let items: Vec<PurchaseItem> = (0..lines).map(|_| PurchaseItem::new(ProductId::new(), 2)).collect();
        let request = PurchaseRequest::new(business, IdempotencyKey::new(), items).unwrap();
        let locked: Vec<LockedProduct> = request
            .product_ids()
            .into_iter()
            .map(|product_id| LockedProduct {
                product_id,
                stock: 1_000,
                price_cents: 1_500,
            })
            .collect();
        let credit = CreditSnapshot {
            credit_limit_cents: i64::MAX,
            balance_cents: 0,
        };

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
            b.iter(|| price_purchase(black_box(&request), black_box(&locked), &credit).unwrap())
        });
    }

    group.finish();
}

fn bench_post_purchase(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("post_purchase_in_memory");

    for lines in [1usize, 10] {
        let (store, business, products) = catalog(&rt, lines);
        let engine = PostingEngine::new(store);

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("fresh_key", lines), &lines, |b, _| {
            b.iter(|| {
                let items = products.iter().map(|p| PurchaseItem::new(*p, 1));
                let request = PurchaseRequest::new(business, IdempotencyKey::new(), items).unwrap();
                rt.block_on(engine.post_purchase(&request)).unwrap()
            })
        });

        let replay = PurchaseRequest::new(
            business,
            IdempotencyKey::new(),
            products.iter().map(|p| PurchaseItem::new(*p, 1)),
        )
        .unwrap();
        rt.block_on(engine.post_purchase(&replay)).unwrap();

        group.bench_with_input(BenchmarkId::new("replay", lines), &lines, |b, _| {
            b.iter(|| rt.block_on(engine.post_purchase(black_box(&replay))).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pricing, bench_post_purchase);
criterion_main!(benches);
