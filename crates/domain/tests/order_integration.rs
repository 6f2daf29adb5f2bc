//! Integration tests across the domain services.
//!
//! These tests drive the catalog, cart, account and order services together
//! against the in-memory store, the way the checkout workflow and the HTTP
//! adapter use them.

use domain::{
    AccountService, Address, CartService, CatalogService, DomainError, InventoryLedger, Money,
    NewProduct, Order, OrderError, OrderItem, OrderService, OrderState, PaymentError,
    PaymentMethod, PaymentProcessor, ProductChange, ProductId, Registration, RoleKind, Session,
    SimulatedGateway, ZeroStockPolicy, load_order,
};
use store::{InMemoryStore, Store, Transaction};

fn address() -> Address {
    Address {
        street_number: "221".into(),
        street: "Baker St".into(),
        city: "London".into(),
        state: "Greater London".into(),
        country: "UK".into(),
        zip_code: "12345".into(),
    }
}

async fn login(store: &InMemoryStore, email: &str, role: RoleKind) -> Session {
    let accounts = AccountService::new(store.clone());
    accounts
        .register(Registration {
            name: "Test User".into(),
            email: email.into(),
            password: "secret1".into(),
            age: 35,
            phone_number: "5551234".into(),
            address: Some(address()),
            role,
        })
        .await
        .unwrap();
    accounts.login(email, "secret1").await.unwrap()
}

fn new_product(id: u32, price_cents: i64, stock: i64) -> NewProduct {
    NewProduct {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: Some("A thing".into()),
        price: Money::from_cents(price_cents),
        stock,
    }
}

mod catalog_and_cart {
    use super::*;

    #[tokio::test]
    async fn admin_stocks_catalog_and_customer_fills_cart() {
        let store = InMemoryStore::new();
        let admin = login(&store, "admin@shop.com", RoleKind::Admin).await;
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let ledger = InventoryLedger::default();
        let catalog = CatalogService::new(store.clone(), ledger);
        let carts = CartService::new(store.clone(), ledger);

        catalog
            .add_product(&admin, new_product(1, 5_000, 10))
            .await
            .unwrap();

        carts
            .add_to_cart(&customer, ProductId::new(1), 2, false)
            .await
            .unwrap();
        let outcome = carts
            .add_to_cart(&customer, ProductId::new(1), 3, false)
            .await
            .unwrap();
        assert_eq!(outcome.cart.quantity_of(ProductId::new(1)), 5);
        assert_eq!(outcome.cart.calculate_total(), Money::from_dollars(250));

        // Coupons never persist a discount.
        assert_eq!(
            carts.apply_coupon(&customer, "SAVE40").await.unwrap(),
            Money::from_dollars(150)
        );
        assert_eq!(
            carts.view_cart(&customer).await.unwrap().calculate_total(),
            Money::from_dollars(250)
        );
    }

    #[tokio::test]
    async fn repricing_does_not_touch_cart_snapshots() {
        let store = InMemoryStore::new();
        let admin = login(&store, "admin@shop.com", RoleKind::Admin).await;
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let ledger = InventoryLedger::default();
        let catalog = CatalogService::new(store.clone(), ledger);
        let carts = CartService::new(store.clone(), ledger);

        catalog
            .add_product(&admin, new_product(1, 1_000, 5))
            .await
            .unwrap();
        carts
            .add_to_cart(&customer, ProductId::new(1), 1, false)
            .await
            .unwrap();
        catalog
            .update_product(
                &admin,
                ProductId::new(1),
                ProductChange::Reprice(Money::from_cents(9_900)),
            )
            .await
            .unwrap();

        let cart = carts.view_cart(&customer).await.unwrap();
        assert_eq!(
            cart.item(ProductId::new(1)).unwrap().unit_price,
            Money::from_cents(1_000)
        );
    }

    #[tokio::test]
    async fn customers_cannot_administer_catalog() {
        let store = InMemoryStore::new();
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let catalog = CatalogService::new(store.clone(), InventoryLedger::default());

        assert!(matches!(
            catalog.add_product(&customer, new_product(1, 100, 1)).await,
            Err(DomainError::Forbidden(_))
        ));
    }
}

mod stock_policy {
    use super::*;

    async fn sell_out(policy: ZeroStockPolicy) -> InMemoryStore {
        let store = InMemoryStore::new();
        let admin = login(&store, "admin@shop.com", RoleKind::Admin).await;
        let catalog = CatalogService::new(store.clone(), InventoryLedger::new(policy));
        catalog
            .add_product(&admin, new_product(1, 100, 5))
            .await
            .unwrap();
        catalog
            .update_product(&admin, ProductId::new(1), ProductChange::AdjustStock(-5))
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn retain_keeps_sold_out_product() {
        let store = sell_out(ZeroStockPolicy::Retain).await;
        let mut tx = store.begin().await.unwrap();
        let product = tx.product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.stock, 0);
    }

    #[tokio::test]
    async fn remove_deletes_sold_out_product() {
        let store = sell_out(ZeroStockPolicy::Remove).await;
        assert_eq!(store.product_count().await, 0);
    }
}

mod order_lifecycle {
    use super::*;

    fn orders(store: &InMemoryStore) -> OrderService<InMemoryStore, SimulatedGateway> {
        OrderService::new(
            store.clone(),
            PaymentProcessor::new(SimulatedGateway::default()),
        )
    }

    async fn place_paid_order(
        store: &InMemoryStore,
        service: &OrderService<InMemoryStore, SimulatedGateway>,
        customer: &Session,
    ) -> Order {
        let mut tx = store.begin().await.unwrap();
        let number = tx.allocate_order_number().await.unwrap();
        let mut order = Order::place(number, customer.user_id(), address());
        for event in order
            .add_item(OrderItem::new(
                ProductId::new(1),
                "Desk",
                Money::from_cents(20_000),
                1,
            ))
            .unwrap()
        {
            order.apply(event);
        }
        service
            .pay_in(&mut tx, &mut order, PaymentMethod::BankTransfer)
            .await
            .unwrap();
        tx.insert_order(&order.to_record()).await.unwrap();
        tx.commit().await.unwrap();
        order
    }

    #[tokio::test]
    async fn ship_and_deliver() {
        let store = InMemoryStore::new();
        let admin = login(&store, "admin@shop.com", RoleKind::Admin).await;
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let service = orders(&store);
        let order = place_paid_order(&store, &service, &customer).await;
        assert_eq!(order.state(), OrderState::Processing);

        service
            .ship(&admin, order.order_number(), "1Z999")
            .await
            .unwrap();
        let delivered = service
            .mark_delivered(&admin, order.order_number())
            .await
            .unwrap();
        assert_eq!(delivered.order.state(), OrderState::Delivered);
        assert_eq!(delivered.order.tracking_number(), Some("1Z999"));

        let profile = AccountService::new(store.clone())
            .profile(&customer)
            .await
            .unwrap();
        assert_eq!(profile.loyalty_points(), 20);

        // Delivered orders are final.
        let mut tx = store.begin().await.unwrap();
        let mut stored = load_order(&mut tx, order.order_number()).await.unwrap();
        assert!(matches!(
            service.cancel_in(&mut tx, &mut stored).await,
            Err(DomainError::Order(OrderError::InvalidState {
                current_state: OrderState::Delivered,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn delivery_waits_for_an_in_flight_transition() {
        let store = InMemoryStore::new();
        let admin = login(&store, "admin@shop.com", RoleKind::Admin).await;
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let service = orders(&store);
        let order = place_paid_order(&store, &service, &customer).await;
        let number = order.order_number();
        service.ship(&admin, number, "1Z999").await.unwrap();

        let mut first = store.begin().await.unwrap();
        service
            .execute_in(&mut first, number, Order::mark_delivered)
            .await
            .unwrap();

        let contender = orders(&store);
        let second_admin = admin.clone();
        let handle =
            tokio::spawn(async move { contender.mark_delivered(&second_admin, number).await });

        tokio::task::yield_now().await;
        first.commit().await.unwrap();

        assert!(matches!(
            handle.await.unwrap(),
            Err(DomainError::Order(OrderError::InvalidState {
                current_state: OrderState::Delivered,
                ..
            }))
        ));
        let profile = AccountService::new(store.clone())
            .profile(&customer)
            .await
            .unwrap();
        assert_eq!(profile.loyalty_points(), 0);
    }

    #[tokio::test]
    async fn refunding_twice_is_rejected() {
        let store = InMemoryStore::new();
        let customer = login(&store, "cust@shop.com", RoleKind::Customer).await;
        let service = orders(&store);
        let order = place_paid_order(&store, &service, &customer).await;

        let mut tx = store.begin().await.unwrap();
        let payment = order.payment().unwrap().clone();
        let refunded = service.payments().refund(&mut tx, &payment).await.unwrap();
        assert!(matches!(
            service.payments().refund(&mut tx, &refunded).await,
            Err(DomainError::Payment(PaymentError::AlreadyRefunded(_)))
        ));
    }
}
