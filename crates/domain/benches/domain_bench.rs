use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AccountService, Address, Cart, CartItem, CartService, InventoryLedger, Money, Order,
    OrderItem, OrderNumber, ProductId, Registration, RoleKind, UserId, views,
};
use store::{InMemoryStore, ProductRecord, Store, Transaction};

fn address() -> Address {
    Address {
        street_number: "1".into(),
        street: "Bench St".into(),
        city: "Perf".into(),
        state: "CA".into(),
        country: "USA".into(),
        zip_code: "90001".into(),
    }
}

fn bench_order_commands(c: &mut Criterion) {
    c.bench_function("domain/order_add_items", |b| {
        b.iter(|| {
            let mut order = Order::place(OrderNumber::new(1), UserId::new(), address());
            for id in 0..20u32 {
                let item = OrderItem::new(ProductId::new(id % 10), "Item", Money::from_cents(999), 1);
                for event in order.add_item(item).unwrap() {
                    order.apply(event);
                }
            }
            order
        });
    });
}

fn bench_cart_view(c: &mut Criterion) {
    let mut cart = Cart::new(UserId::new());
    for id in 0..50u32 {
        cart.add_item(CartItem {
            product_id: ProductId::new(id),
            product_name: format!("Item {id}"),
            unit_price: Money::from_cents(1_250),
            quantity: 3,
        });
    }

    c.bench_function("domain/cart_view", |b| b.iter(|| views::cart_view(&cart)));
}

fn bench_add_to_cart(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let session = rt.block_on(async {
        let mut tx = store.begin().await.unwrap();
        tx.put_product(&ProductRecord {
            id: ProductId::new(1),
            name: "Bench".into(),
            description: None,
            price: Money::from_cents(100),
            stock: u32::MAX,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let accounts = AccountService::new(store.clone());
        accounts
            .register(Registration {
                name: "Bench".into(),
                email: "bench@example.com".into(),
                password: "bench12".into(),
                age: 30,
                phone_number: "555".into(),
                address: None,
                role: RoleKind::Customer,
            })
            .await
            .unwrap();
        accounts.login("bench@example.com", "bench12").await.unwrap()
    });
    let carts = CartService::new(store.clone(), InventoryLedger::default());

    c.bench_function("domain/add_to_cart", |b| {
        b.iter(|| {
            rt.block_on(async {
                carts
                    .add_to_cart(&session, ProductId::new(1), 1, false)
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_order_commands,
    bench_cart_view,
    bench_add_to_cart
);
criterion_main!(benches);
