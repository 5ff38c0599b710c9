// ==========================================
// 工序依赖传播集成测试
// ==========================================
// 测试目标: 后继推后、前驱拉前、硬安全提前期、不可调工单不动、批次隔离
// ==========================================

mod helpers;
mod test_helpers;

use helpers::test_data_builder::OrderBuilder;
use opplan_sync::domain::order::OrderChange;
use opplan_sync::domain::types::OrderStatus;
use test_helpers::*;

/// forge → machine，硬安全提前期 1 小时
fn seed_chain(env: &TestEnv) {
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_operation(c, "forge", "fixed_time", None, Some("plant"), 2 * 3600)?;
        insert_operation(c, "machine", "fixed_time", None, Some("plant"), 2 * 3600)?;
        insert_dependency(c, "machine", "forge", 3600)
    });
}

#[test]
fn test_creating_successor_pulls_predecessor_back() {
    let env = setup();
    seed_chain(&env);

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 10)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M1", "machine", dt(10, 12)).build(), None, &mut env.ctx())
        .unwrap();

    let forge = env.order("F1");
    assert_eq!(forge.enddate, dt(10, 9));
    assert_eq!(forge.startdate, dt(10, 7));
    assert_eq!(env.order("M1").startdate, dt(10, 10));
}

#[test]
fn test_moving_predecessor_pushes_successor() {
    let env = setup();
    seed_chain(&env);

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 9)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M1", "machine", dt(10, 12)).build(), None, &mut env.ctx())
        .unwrap();

    let mut ctx = env.ctx();
    env.engine
        .update("F1", OrderChange::default().startdate(dt(10, 10)), &mut ctx)
        .unwrap();

    let machine = env.order("M1");
    assert_eq!(machine.startdate, dt(10, 13));
    assert_eq!(machine.enddate, dt(10, 15));
    assert!(ctx.is_visited("M1"));
}

#[test]
fn test_satisfied_dependency_moves_nothing() {
    let env = setup();
    seed_chain(&env);

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 9)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M1", "machine", dt(10, 15)).build(), None, &mut env.ctx())
        .unwrap();

    let mut ctx = env.ctx();
    env.engine
        .update("F1", OrderChange::default().enddate(dt(10, 11)), &mut ctx)
        .unwrap();

    assert_eq!(env.order("M1").startdate, dt(10, 13));
    assert!(!ctx.is_visited("M1"));
}

#[test]
fn test_confirmed_successor_is_not_moved() {
    let env = setup();
    seed_chain(&env);

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 9)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(
            OrderBuilder::manufacturing("M1", "machine", dt(10, 12))
                .status(OrderStatus::Confirmed)
                .build(),
            None,
            &mut env.ctx(),
        )
        .unwrap();

    env.engine
        .update("F1", OrderChange::default().startdate(dt(10, 10)), &mut env.ctx())
        .unwrap();

    let machine = env.order("M1");
    assert_eq!(machine.startdate, dt(10, 10));
    assert_eq!(machine.enddate, dt(10, 12));
}

#[test]
fn test_top_level_propagation_stays_within_batch() {
    let env = setup();
    seed_chain(&env);

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 9)).batch("B1").build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M1", "machine", dt(10, 12)).batch("B1").build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M2", "machine", dt(10, 12)).batch("B2").build(), None, &mut env.ctx())
        .unwrap();

    env.engine
        .update("F1", OrderChange::default().startdate(dt(10, 10)), &mut env.ctx())
        .unwrap();

    assert_eq!(env.order("M1").startdate, dt(10, 13));
    assert_eq!(env.order("M2").startdate, dt(10, 10));
}

#[test]
fn test_chain_propagates_transitively_and_terminates() {
    let env = setup();
    seed_chain(&env);
    env.seed(|c| {
        insert_operation(c, "pack", "fixed_time", None, Some("plant"), 3600)?;
        insert_dependency(c, "pack", "machine", 0)
    });

    env.engine
        .create(OrderBuilder::manufacturing("F1", "forge", dt(10, 9)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("M1", "machine", dt(10, 12)).build(), None, &mut env.ctx())
        .unwrap();
    env.engine
        .create(OrderBuilder::manufacturing("P1", "pack", dt(10, 13)).build(), None, &mut env.ctx())
        .unwrap();

    let mut ctx = env.ctx();
    env.engine
        .update("F1", OrderChange::default().startdate(dt(11, 8)), &mut ctx)
        .unwrap();

    assert_eq!(env.order("M1").startdate, dt(11, 11));
    let pack = env.order("P1");
    assert_eq!(pack.startdate, dt(11, 13));
    assert_eq!(pack.enddate, dt(11, 14));
    assert_eq!(ctx.visited_count(), 3);
}

/// a → b → d 与 a → c → d 两条路径汇合于 d，c 比 b 长
fn seed_diamond(env: &TestEnv) {
    env.seed(|c| {
        seed_basic_master(c)?;
        insert_operation(c, "cut", "fixed_time", None, Some("plant"), 2 * 3600)?;
        insert_operation(c, "drill", "fixed_time", None, Some("plant"), 2 * 3600)?;
        insert_operation(c, "weld", "fixed_time", None, Some("plant"), 5 * 3600)?;
        insert_operation(c, "inspect", "fixed_time", None, Some("plant"), 3600)?;
        insert_dependency(c, "drill", "cut", 0)?;
        insert_dependency(c, "weld", "cut", 0)?;
        insert_dependency(c, "inspect", "drill", 0)?;
        insert_dependency(c, "inspect", "weld", 0)
    });
}

#[test]
fn test_join_step_respects_longest_incoming_path() {
    let env = setup();
    seed_diamond(&env);

    for (reference, operation, end) in [
        ("A", "cut", dt(10, 10)),
        ("B", "drill", dt(10, 12)),
        ("C", "weld", dt(10, 15)),
        ("D", "inspect", dt(10, 16)),
    ] {
        env.engine
            .create(OrderBuilder::manufacturing(reference, operation, end).build(), None, &mut env.ctx())
            .unwrap();
    }

    let mut ctx = env.ctx();
    env.engine
        .update("A", OrderChange::default().startdate(dt(11, 10)), &mut ctx)
        .unwrap();

    let drill = env.order("B");
    let weld = env.order("C");
    let inspect = env.order("D");
    assert_eq!(drill.startdate, dt(11, 12));
    assert_eq!(weld.startdate, dt(11, 12));
    assert_eq!(weld.enddate, dt(11, 17));
    // 汇合步骤第二次被推移
    assert_eq!(inspect.startdate, dt(11, 17));
    assert!(inspect.startdate >= drill.enddate);
    assert_eq!(ctx.visited_count(), 4);
}
