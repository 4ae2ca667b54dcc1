use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use comptoir_core::{Money, TenantId, UserId};
use comptoir_entitlements::{PaymentStatus, PlanId, Role, Session, TenantAccount, User};
use comptoir_infra::services::{MovementRequest, NewSale, ReceiptLine};
use comptoir_infra::{Backoffice, EngineConfig};
use comptoir_inventory::{MovementKind, StockItemId};
use comptoir_sales::{ItemQuantity, ProductRef, SaleLine};

fn admin_session() -> Session {
    let tenant_id = TenantId::new();
    Session {
        user: User {
            id: UserId::new(),
            tenant_id,
            roles: BTreeSet::from([Role::Admin]),
        },
        tenant: TenantAccount {
            id: tenant_id,
            payment_status: PaymentStatus::UpToDate,
            plan_id: PlanId::from("PREMIUM"),
        },
    }
}

fn receipt(item: StockItemId, quantity: u64) -> MovementRequest {
    MovementRequest {
        stock_item_id: item,
        kind: MovementKind::In,
        quantity,
        reason: "reception".to_string(),
        reference_id: None,
    }
}

/// An item whose ledger stream already holds `history` movements.
fn item_with_history(bo: &Backoffice, session: &Session, history: usize) -> StockItemId {
    let item = bo.stock.create_item(session, "Farine", None).unwrap().id;
    for _ in 0..history {
        bo.stock.post_movement(session, receipt(item, 1)).unwrap();
    }
    item
}

/// Posting cost grows with the stream that has to be folded first.
fn bench_post_movement_with_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("post_movement_with_history");

    for history in [0usize, 100, 1_000] {
        let bo = Backoffice::in_memory(EngineConfig::default());
        let session = admin_session();
        let item = item_with_history(&bo, &session, history);

        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, _| {
            b.iter(|| {
                bo.stock
                    .post_movement(black_box(&session), black_box(receipt(item, 1)))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn bench_bulk_receive(c: &mut Criterion) {
    let mut group = c.benchmark_group("bulk_receive");

    for lines in [1usize, 10, 50] {
        let bo = Backoffice::in_memory(EngineConfig::default());
        let session = admin_session();
        let receipt_lines: Vec<ReceiptLine> = (0..lines)
            .map(|_| ReceiptLine {
                stock_item_id: item_with_history(&bo, &session, 0),
                quantity: 5,
            })
            .collect();

        group.throughput(Throughput::Elements(lines as u64));
        group.bench_with_input(BenchmarkId::from_parameter(lines), &receipt_lines, |b, receipt_lines| {
            b.iter(|| {
                bo.stock
                    .bulk_receive(&session, black_box(receipt_lines), "reception", None)
                    .unwrap()
            });
        });
    }
    group.finish();
}

/// Sale creation followed by a full delivery: two aggregates, one commit.
fn bench_sell_and_deliver(c: &mut Criterion) {
    let bo = Backoffice::in_memory(EngineConfig::default());
    let session = admin_session();
    let item = item_with_history(&bo, &session, 0);
    bo.stock.post_movement(&session, receipt(item, 1_000_000)).unwrap();

    c.bench_function("sell_and_deliver", |b| {
        b.iter(|| {
            let sale = bo
                .sales
                .create_sale(
                    &session,
                    NewSale {
                        customer_id: None,
                        lines: vec![SaleLine {
                            product: ProductRef::Stock(item),
                            quantity: 2,
                            unit_price: Money::new(1_500),
                        }],
                        initial_payment: None,
                    },
                )
                .unwrap();
            bo.sales
                .record_delivery(&session, sale.id, vec![ItemQuantity { item_id: 1, quantity: 2 }])
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_post_movement_with_history,
    bench_bulk_receive,
    bench_sell_and_deliver
);
criterion_main!(benches);
