// ==========================================
// 批量规则集成测试
// ==========================================
// 测试目标: 采购/调拨协议与工序的最小批量、批量倍数、最大批量
// ==========================================

mod helpers;
mod test_helpers;

use helpers::test_data_builder::OrderBuilder;
use opplan_sync::domain::order::OrderChange;
use opplan_sync::domain::types::OrderStatus;
use test_helpers::*;

fn seed_purchase_agreement(env: &TestEnv) {
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_item_supplier(c, "bolt", Some("plant"), "acme", 86400, (Some(100.0), Some(50.0), None))
    });
}

#[test]
fn test_purchase_below_minimum_takes_minimum() {
    let env = setup();
    seed_purchase_agreement(&env);

    let po = env
        .engine
        .create(
            OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(15, 0)).quantity(30.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();

    assert_eq!(po.quantity, 100.0);
    let flows = env.flows("PO1");
    assert_eq!(flows.len(), 1);
    assert_eq!(flows[0].quantity, 100.0);
}

#[test]
fn test_purchase_rounds_up_to_next_multiple() {
    let env = setup();
    seed_purchase_agreement(&env);

    let po = env
        .engine
        .create(
            OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(15, 0)).quantity(120.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    assert_eq!(po.quantity, 150.0);
}

#[test]
fn test_quantity_update_is_resized() {
    let env = setup();
    seed_purchase_agreement(&env);

    env.engine
        .create(
            OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(15, 0)).quantity(100.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();

    let po = env
        .engine
        .update("PO1", OrderChange::default().quantity(170.0), &mut env.ctx())
        .unwrap();
    assert_eq!(po.quantity, 200.0);
    assert_eq!(env.flows("PO1")[0].quantity, 200.0);
}

#[test]
fn test_confirmed_order_keeps_requested_quantity() {
    let env = setup();
    seed_purchase_agreement(&env);

    let po = env
        .engine
        .create(
            OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(15, 0))
                .quantity(30.0)
                .status(OrderStatus::Confirmed)
                .build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    assert_eq!(po.quantity, 30.0);
}

#[test]
fn test_manufacturing_uses_operation_sizing() {
    let env = setup();
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_operation(c, "assemble", "fixed_time", Some("widget"), Some("plant"), 3600)?;
        set_operation_sizing(c, "assemble", Some(10.0), Some(5.0), Some(40.0))
    });

    let mo = env
        .engine
        .create(
            OrderBuilder::manufacturing("MO1", "assemble", dt(10, 10)).quantity(12.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    assert_eq!(mo.quantity, 15.0);

    let mo = env
        .engine
        .update("MO1", OrderChange::default().quantity(57.0), &mut env.ctx())
        .unwrap();
    assert_eq!(mo.quantity, 40.0);
}

#[test]
fn test_distribution_uses_distribution_agreement_sizing() {
    let env = setup();
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_item_distribution(c, "bolt", Some("dc"), "plant", 0)?;
        c.execute(
            "UPDATE itemdistribution SET sizemultiple = 12 WHERE item = 'bolt'",
            [],
        )?;
        Ok(())
    });

    let order = env
        .engine
        .create(
            OrderBuilder::distribution("DO1", "bolt", "plant", "dc", dt(15, 0)).quantity(13.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    assert_eq!(order.quantity, 24.0);
}

#[test]
fn test_agreement_with_specific_location_wins() {
    let env = setup();
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_item_supplier(c, "bolt", None, "acme", 86400, (Some(500.0), None, None))?;
        insert_item_supplier(c, "bolt", Some("plant"), "acme", 2 * 86400, (Some(100.0), None, None))
    });

    let po = env
        .engine
        .create(
            OrderBuilder::purchase("PO1", "bolt", "plant", "acme", dt(15, 0)).quantity(30.0).build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();
    assert_eq!(po.quantity, 100.0);
    assert_eq!(po.startdate, dt(13, 0));
}
