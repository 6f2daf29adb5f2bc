use criterion::{Criterion, criterion_group, criterion_main};
use store::{InMemoryStore, Money, OrderQuery, ProductId, ProductRecord, Store, Transaction};

fn product(id: u32) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: None,
        price: Money::from_cents(999),
        stock: 100,
    }
}

fn bench_commit_single_product(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("store/commit_single_product", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryStore::new();
                let mut tx = store.begin().await.unwrap();
                tx.put_product(&product(1)).await.unwrap();
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_lock_and_update_ten_products(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let ids: Vec<ProductId> = (1..=10).map(ProductId::new).collect();

    rt.block_on(async {
        let mut tx = store.begin().await.unwrap();
        for id in &ids {
            tx.put_product(&product(id.value())).await.unwrap();
        }
        tx.commit().await.unwrap();
    });

    c.bench_function("store/lock_and_update_10_products", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = store.begin().await.unwrap();
                tx.lock_products(&ids).await.unwrap();
                for id in &ids {
                    let p = tx.product(*id).await.unwrap().unwrap();
                    tx.put_product(&p).await.unwrap();
                }
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_find_orders_empty(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();

    c.bench_function("store/find_orders_empty", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = store.begin().await.unwrap();
                tx.find_orders(&OrderQuery::new()).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_commit_single_product,
    bench_lock_and_update_ten_products,
    bench_find_orders_empty
);
criterion_main!(benches);
