use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use orderflow::workflow::{ContextData, Pipeline, PipelineControl, WorkflowError};
use orderflow::{resolve, EngineConfig, MemoryStore, Order, OrderEngine, OrderLineItem, OrderStatus, Signer, StatusValue};
use rust_decimal_macros::dec;
use tokio::runtime::Runtime;

fn bench_resolve(c: &mut Criterion) {
  let statuses: Vec<StatusValue> = OrderStatus::ALL.iter().copied().map(StatusValue::Known).collect();
  c.bench_function("resolve_full_matrix", |b| {
    b.iter(|| {
      for prev in &statuses {
        for next in &statuses {
          black_box(resolve(Some(prev), next));
        }
      }
    })
  });
  c.bench_function("normalize_alias", |b| b.iter(|| black_box(OrderStatus::normalize("Đã giao hàng"))));
}

async fn seeded_engine(lines: i64) -> OrderEngine<MemoryStore> {
  let store = MemoryStore::new();
  let mut items = Vec::new();
  for product_id in 1..=lines {
    store.seed_product(product_id, "bench", dec!(1000), i32::MAX / 2).await;
    items.push(OrderLineItem {
      order_id: 1,
      product_id,
      quantity: 1,
      unit_price: dec!(1000),
      item_discount: dec!(0),
    });
  }
  let order = Order {
    id: 1,
    placed_on: Utc::now(),
    total_amount: dec!(1000),
    status: Some("Pending".into()),
    customer_id: 1,
    staff_id: None,
    shipper_id: None,
    discount_code: None,
    shipping_fee: None,
  };
  store.seed_order(order, items).await;
  OrderEngine::new(store, EngineConfig::default()).expect("default config is valid")
}

fn bench_confirm_cancel_cycle(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let mut group = c.benchmark_group("ConfirmCancelCycle");
  for lines in [1i64, 10, 50] {
    let engine = rt.block_on(seeded_engine(lines));
    group.throughput(Throughput::Elements(lines as u64));
    group.bench_with_input(BenchmarkId::from_parameter(lines), &lines, |b, _| {
      b.to_async(&rt).iter(|| async {
        engine.change_status(1, "Confirmed").await.expect("confirm");
        engine.change_status(1, "Cancelled").await.expect("cancel");
      })
    });
  }
  group.finish();
}

fn bench_signature(c: &mut Criterion) {
  let signer = Signer::new("bench-secret").expect("non-empty secret");
  let sig = signer.sign("TXN_20240101120000_ABCDEF12", dec!(250000));
  c.bench_function("sign", |b| b.iter(|| black_box(signer.sign("TXN_20240101120000_ABCDEF12", dec!(250000)))));
  c.bench_function("verify", |b| {
    b.iter(|| black_box(signer.verify("TXN_20240101120000_ABCDEF12", dec!(250000), &sig)))
  });
}

#[derive(Default)]
struct Counter {
  hits: u64,
}

fn bench_workflow_run(c: &mut Criterion) {
  let rt = Runtime::new().expect("tokio runtime");
  let mut group = c.benchmark_group("WorkflowRun");
  for steps in [1usize, 5, 10] {
    let names: Vec<String> = (0..steps).map(|i| format!("step_{i}")).collect();
    let defs: Vec<(&str, bool, Option<_>)> = names.iter().map(|n| (n.as_str(), false, None)).collect();
    let mut pipeline = Pipeline::<Counter, WorkflowError>::new(&defs);
    for name in &names {
      pipeline
        .on_root(name, |ctx: ContextData<Counter>| async move {
          ctx.write().hits += 1;
          Ok::<_, WorkflowError>(PipelineControl::Continue)
        })
        .expect("step exists");
    }
    group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, _| {
      b.to_async(&rt).iter(|| pipeline.run(ContextData::new(Counter::default())))
    });
  }
  group.finish();
}

criterion_group!(
  benches,
  bench_resolve,
  bench_confirm_cancel_cycle,
  bench_signature,
  bench_workflow_run
);
criterion_main!(benches);
