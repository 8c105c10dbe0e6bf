// ==========================================
// 数据补丁集成测试
// ==========================================


use custom_manufacturing::app::AppState;
use custom_manufacturing::domain::types::FieldType;
use custom_manufacturing::patches::{self, convert_machine_time_to_float::PATCH_NAME};
use test_helpers::{create_test_state, job_card, today};

#[test]
fn test_run_all_applies_once() {
    let (_temp_file, state) = create_test_state().expect("Failed to create test state");

    let reports = patches::run_all(&state.patch_repo).unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].patch, PATCH_NAME);
    assert!(reports[0].applied);
    assert!(state.patch_repo.is_applied(PATCH_NAME).unwrap());

    let field = state
        .master_data_repo
        .find_custom_field("job_card", "total_machine_operation_time_float")
        .unwrap()
        .expect("field metadata created");
    assert_eq!(field.fieldtype, FieldType::Float);
    assert_eq!(field.precision.as_deref(), Some("2"));

    let again = patches::run_all(&state.patch_repo).unwrap();
    assert!(!again[0].applied);
    assert!(again[0].steps.is_empty());
}

#[test]
fn test_patch_log_survives_reopen_and_keeps_data() {
    let (temp_file, state) = create_test_state().expect("Failed to create test state");
    state.job_card_api.save(job_card("JC-1", "WS-1", 1.0), today()).unwrap();
    patches::run_all(&state.patch_repo).unwrap();
    drop(state);

    let db_path = temp_file.path().to_str().unwrap().to_string();
    let reopened = AppState::new(db_path).unwrap();
    let reports = patches::run_all(&reopened.patch_repo).unwrap();
    assert!(!reports[0].applied);

    // 30 分钟 → 0.5 小时
    let jc = reopened.job_card_api.get("JC-1").unwrap();
    assert_eq!(jc.total_machine_operation_time_float, 0.5);
}
