// ==========================================
// 工单增删改集成测试
// ==========================================
// 测试目标: 新建/更新/删除的派生数据、幂等性、校验错误
// ==========================================

mod helpers;
mod test_helpers;

use helpers::test_data_builder::OrderBuilder;
use opplan_sync::domain::order::{OperationPlan, OrderChange};
use opplan_sync::domain::types::OrderKind;
use opplan_sync::engine::EngineError;
use test_helpers::*;

fn seed_assembly(env: &TestEnv) {
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_resource(c, "bench", "default", 1.0, None)?;
        insert_operation(c, "assemble", "fixed_time", Some("widget"), Some("plant"), 2 * 3600)?;
        insert_operation_material(c, "assemble", "bolt", -2.0, 0.0, None)?;
        insert_operation_resource(c, "assemble", "bench", 1.0, None)?;
        insert_operation(c, "polish", "fixed_time", Some("widget"), Some("dc"), 3600)
    });
}

#[test]
fn test_create_generates_reference_and_derived_rows() {
    let env = setup();
    seed_assembly(&env);

    let created = env
        .engine
        .create(
            OrderBuilder::manufacturing("", "assemble", dt(10, 10)).quantity(3.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();

    assert_eq!(created.reference.len(), 32);
    assert_eq!(created.location.as_deref(), Some("plant"));
    assert_eq!(created.item.as_deref(), Some("widget"));
    assert_eq!(env.flows(&created.reference).len(), 2);
    assert_eq!(env.loads(&created.reference).len(), 1);
    assert_eq!(env.plan_row("bench", 10).unwrap().load, 2.0);
}

#[test]
fn test_duplicate_reference_is_rejected() {
    let env = setup();
    seed_assembly(&env);
    env.engine
        .create(OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).build(), None, &mut env.ctx())
        .unwrap();

    let result = env.engine.create(
        OrderBuilder::manufacturing("MO1", "assemble", dt(11, 10)).build(),
        None,
        &mut env.ctx(),
    );
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert_eq!(env.order("MO1").enddate, dt(10, 10));
}

#[test]
fn test_invalid_quantity_and_window_are_rejected() {
    let env = setup();
    seed_assembly(&env);

    let negative = env.engine.create(
        OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).quantity(-1.0).build(),
        None,
        &mut env.ctx(),
    );
    assert!(matches!(negative, Err(EngineError::Validation(_))));

    env.engine
        .create(OrderBuilder::manufacturing("MO2", "assemble", dt(10, 10)).build(), None, &mut env.ctx())
        .unwrap();
    let reversed = env.engine.update(
        "MO2",
        OrderChange::default().startdate(dt(12, 0)).enddate(dt(11, 0)),
        &mut env.ctx(),
    );
    assert!(matches!(reversed, Err(EngineError::Validation(_))));
    let nan = env
        .engine
        .update("MO2", OrderChange::default().quantity(f64::NAN), &mut env.ctx());
    assert!(matches!(nan, Err(EngineError::Validation(_))));
}

#[test]
fn test_missing_and_unknown_keys_fail_without_writing() {
    let env = setup();
    seed_assembly(&env);

    let no_operation = env.engine.create(
        OperationPlan::new("MO1", OrderKind::Manufacturing, 1.0, dt(10, 10)),
        None,
        &mut env.ctx(),
    );
    assert!(matches!(no_operation, Err(EngineError::MissingField { .. })));

    let unknown_operation = env.engine.create(
        OrderBuilder::manufacturing("MO2", "unknown", dt(10, 10)).build(),
        None,
        &mut env.ctx(),
    );
    assert!(matches!(unknown_operation, Err(EngineError::Configuration(_))));

    let mut no_supplier = OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(10, 0)).build();
    no_supplier.supplier = None;
    let result = env.engine.create(no_supplier, None, &mut env.ctx());
    assert!(matches!(result, Err(EngineError::MissingField { .. })));

    let unknown_demand = env.engine.create(
        OrderBuilder::delivery("DLV1", "SO-X", dt(10, 0)).build(),
        None,
        &mut env.ctx(),
    );
    assert!(matches!(unknown_demand, Err(EngineError::Configuration(_))));

    assert_eq!(env.count("SELECT COUNT(*) FROM operationplan", &[]), 0);
}

#[test]
fn test_update_unknown_reference_fails() {
    let env = setup();
    let result = env
        .engine
        .update("nope", OrderChange::default().quantity(1.0), &mut env.ctx());
    assert!(matches!(result, Err(EngineError::Repository(_))));
}

#[test]
fn test_repeated_update_is_idempotent() {
    let env = setup();
    seed_assembly(&env);
    env.engine
        .create(
            OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).quantity(3.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();

    let change = OrderChange::default().enddate(dt(12, 10)).quantity(4.0);
    let first = env.engine.update("MO1", change.clone(), &mut env.ctx()).unwrap();
    let flows_first = env.flows("MO1");
    let plan_first = env.plan_row("bench", 12).unwrap();

    let second = env.engine.update("MO1", change, &mut env.ctx()).unwrap();
    assert_eq!(first, second);

    // 未变化时不重写明细行
    let flows_second = env.flows("MO1");
    assert_eq!(
        flows_first.iter().map(|f| f.id).collect::<Vec<_>>(),
        flows_second.iter().map(|f| f.id).collect::<Vec<_>>()
    );
    assert_eq!(plan_first, env.plan_row("bench", 12).unwrap());
}

#[test]
fn test_changing_operation_moves_location_and_rebuilds_details() {
    let env = setup();
    seed_assembly(&env);
    env.engine
        .create(OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).build(), None, &mut env.ctx())
        .unwrap();

    let mut change = OrderChange::default();
    change.operation = Some("polish".to_string());
    change.location = Some("dc".to_string());
    let updated = env.engine.update("MO1", change, &mut env.ctx()).unwrap();

    assert_eq!(updated.name.as_deref(), Some("polish"));
    assert_eq!((updated.startdate, updated.enddate), (dt(10, 8), dt(10, 9)));
    let flows = env.flows("MO1");
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].location, "dc");
    assert!(env.loads("MO1").is_empty());
    assert_eq!(env.plan_row("bench", 10).unwrap().load, 0.0);
}

#[test]
fn test_inventory_order_takes_date_from_either_end() {
    let env = setup();
    env.seed(seed_basic_master);

    let stock = env
        .engine
        .create(OrderBuilder::inventory("STCK1", "bolt", "plant", dt(3, 0)).quantity(5.0).build(), None, &mut env.ctx())
        .unwrap();
    assert_eq!(stock.name.as_deref(), Some("Inventory bolt @ plant"));
    assert_eq!((stock.startdate, stock.enddate), (dt(3, 0), dt(3, 0)));

    let moved = env
        .engine
        .update("STCK1", OrderChange::default().startdate(dt(4, 0)), &mut env.ctx())
        .unwrap();
    assert_eq!((moved.startdate, moved.enddate), (dt(4, 0), dt(4, 0)));
    assert_eq!(env.flows("STCK1")[0].flowdate, dt(4, 0));
}

#[test]
fn test_delete_unknown_reference_fails() {
    let env = setup();
    assert!(env.engine.delete("nope", &mut env.ctx()).is_err());
}
