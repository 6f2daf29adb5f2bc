use checkout::{CheckoutCoordinator, CheckoutOutcome, CheckoutRequest};
use common::{Money, ProductId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AccountService, CartService, InventoryLedger, PaymentMethod, PaymentProcessor, Registration,
    RoleKind, Session, SimulatedGateway,
};
use store::{InMemoryStore, ProductRecord, Store, Transaction};

async fn setup(store: &InMemoryStore) -> Session {
    let mut tx = store.begin().await.unwrap();
    for id in 1..=5 {
        tx.put_product(&ProductRecord {
            id: ProductId::new(id),
            name: format!("Item {id}"),
            description: None,
            price: Money::from_cents(1_500),
            stock: u32::MAX,
        })
        .await
        .unwrap();
    }
    tx.commit().await.unwrap();

    let accounts = AccountService::new(store.clone());
    accounts
        .register(Registration {
            name: "Bench".into(),
            email: "bench@example.com".into(),
            password: "bench12".into(),
            age: 30,
            phone_number: "5550000".into(),
            address: Some(common::Address {
                street_number: "1".into(),
                street: "Loop Rd".into(),
                city: "Cupertino".into(),
                state: "CA".into(),
                country: "USA".into(),
                zip_code: "95014".into(),
            }),
            role: RoleKind::Customer,
        })
        .await
        .unwrap();
    accounts.login("bench@example.com", "bench12").await.unwrap()
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let session = rt.block_on(setup(&store));
    let ledger = InventoryLedger::default();
    let carts = CartService::new(store.clone(), ledger);
    let checkout = CheckoutCoordinator::new(
        store.clone(),
        ledger,
        PaymentProcessor::new(SimulatedGateway::default()),
    );

    c.bench_function("checkout/five_line_cart", |b| {
        b.iter(|| {
            rt.block_on(async {
                for id in 1..=5 {
                    carts
                        .add_to_cart(&session, ProductId::new(id), 2, false)
                        .await
                        .unwrap();
                }
                let outcome = checkout
                    .checkout(&session, CheckoutRequest::confirm(PaymentMethod::CreditCard))
                    .await
                    .unwrap();
                assert!(matches!(outcome, CheckoutOutcome::Completed(_)));
            });
        });
    });
}

fn bench_preview(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let session = rt.block_on(setup(&store));
    let ledger = InventoryLedger::default();
    let carts = CartService::new(store.clone(), ledger);
    let checkout = CheckoutCoordinator::new(
        store.clone(),
        ledger,
        PaymentProcessor::new(SimulatedGateway::default()),
    );
    rt.block_on(async {
        for id in 1..=5 {
            carts
                .add_to_cart(&session, ProductId::new(id), 1, false)
                .await
                .unwrap();
        }
    });

    c.bench_function("checkout/preview", |b| {
        b.iter(|| {
            rt.block_on(async {
                checkout
                    .checkout(&session, CheckoutRequest::default())
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, bench_checkout, bench_preview);
criterion_main!(benches);
