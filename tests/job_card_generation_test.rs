// ==========================================
// 工单自动生成作业卡集成测试
// ==========================================


use custom_manufacturing::domain::types::DocStatus;
use custom_manufacturing::domain::work_order::BomScrapItem;
use custom_manufacturing::engine::DocumentEvent;
use test_helpers::{create_test_state, insert_shift, insert_workstation, time, today, work_order};

#[test]
fn test_generation_is_idempotent() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    for ws in ["WS-A", "WS-B", "WS-C"] {
        insert_workstation(&state, ws, Some("Plant A"), 0.0);
    }
    insert_workstation(&state, "WS-OTHER", Some("Plant B"), 0.0);
    for shift in ["Shift 1", "Shift 2", "Shift 3"] {
        insert_shift(&state, shift, None);
    }

    state
        .work_order_api
        .save(work_order("WO-1", Some("Plant A"), &["Mixing", "Packing"]))
        .unwrap();
    let response = state.work_order_api.submit("WO-1", today()).unwrap();
    assert_eq!(response.created_job_cards.len(), 18);

    // 再次触发提交事件：不重复生成
    let wo = state.work_order_api.get("WO-1").unwrap();
    state
        .with_transaction(|conn| {
            Ok(state
                .dispatcher
                .dispatch(conn, DocumentEvent::WorkOrderSubmit(&wo), today())?)
        })
        .unwrap();
    assert_eq!(state.job_card_repo.count_by_work_order("WO-1").unwrap(), 18);

    let first = state.job_card_api.get(&response.created_job_cards[0]).unwrap();
    assert_eq!(first.docstatus, DocStatus::Draft);
    assert_eq!(first.plant_name.as_deref(), Some("Plant A"));
    assert_eq!(first.posting_date, Some(today()));
    assert_eq!(first.for_quantity, 100.0);
    assert_ne!(first.workstation.as_deref(), Some("WS-OTHER"));
}

#[test]
fn test_generated_cards_carry_shift_time_log_and_scrap() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-A", Some("Plant A"), 0.0);
    insert_shift(&state, "Night", Some((time(22, 0), time(6, 0))));
    state
        .master_data_repo
        .insert_bom_scrap_item(
            "BOM-1",
            1,
            &BomScrapItem {
                item_code: "DUST".to_string(),
                item_name: Some("Dust".to_string()),
                stock_qty: 2.0,
                stock_uom: Some("Kg".to_string()),
            },
        )
        .unwrap();

    let mut wo = work_order("WO-1", Some("Plant A"), &["Mixing"]);
    wo.bom_no = Some("BOM-1".to_string());
    state.work_order_api.save(wo).unwrap();
    let response = state.work_order_api.submit("WO-1", today()).unwrap();

    let jc = state.job_card_api.get(&response.created_job_cards[0]).unwrap();
    assert_eq!(jc.shift_number.as_deref(), Some("Night"));
    assert_eq!(jc.time_logs.len(), 1);
    assert_eq!(jc.time_logs[0].time_in_mins, 480.0);
    assert_eq!(jc.scrap_items.len(), 1);
    assert_eq!(jc.scrap_items[0].item_code, "DUST");
    assert_eq!(jc.scrap_items[0].qty, 2.0);
}

#[test]
fn test_work_order_without_plant_generates_nothing() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");
    insert_workstation(&state, "WS-A", Some("Plant A"), 0.0);
    insert_shift(&state, "Shift 1", None);

    state
        .work_order_api
        .save(work_order("WO-1", None, &["Mixing"]))
        .unwrap();
    let response = state.work_order_api.submit("WO-1", today()).unwrap();

    assert!(response.created_job_cards.is_empty());
    assert_eq!(state.job_card_repo.count_by_work_order("WO-1").unwrap(), 0);
}
