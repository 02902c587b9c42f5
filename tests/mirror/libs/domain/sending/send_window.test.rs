// [tests/mirror/libs/domain/sending/send_window.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DEL MOTOR DE VENTANAS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: FESTIVOS, FALLBACK Y SEMIAPERTURA DE SLOTS
 * =================================================================
 */

use serde_json::json;

use serenity_domain_sending::{berlin_time, is_german_public_holiday, is_now_in_send_window};

#[test]
fn certify_holiday_uses_hol_key_with_workspace_fallback() {
    // 2024-01-01 10:30 Europe/Berlin: Neujahr (festivo alemán)
    let now = berlin_time(2024, 1, 1, 10, 30);
    assert!(is_german_public_holiday(now.date_naive()));

    let camp_window = json!({});
    let global_window = json!({"hol": [{"from": "10:00", "to": "12:00"}]});

    assert!(
        is_now_in_send_window(now, &camp_window, &global_window),
        "empty campaign window must fall back to the workspace window"
    );

    // misma hora pero hol vacío -> fuera de ventana
    let empty_hol = json!({"hol": []});
    assert!(!is_now_in_send_window(now, &camp_window, &empty_hol));
}

#[test]
fn certify_campaign_window_shadows_global() {
    // 2024-01-09 es martes
    let now = berlin_time(2024, 1, 9, 9, 30);

    let camp_window = json!({"tue": [{"from": "09:00", "to": "10:00"}]});
    let global_window = json!({"tue": [{"from": "14:00", "to": "16:00"}]});

    assert!(is_now_in_send_window(now, &camp_window, &global_window));

    let later = berlin_time(2024, 1, 9, 14, 30);
    // la campaña define ventana propia: la global NO aplica
    assert!(!is_now_in_send_window(later, &camp_window, &global_window));
}

#[test]
fn certify_half_open_interval() {
    let window = json!({"fri": [{"from": "08:00", "to": "12:00"}]});
    // 2024-01-12 es viernes
    assert!(is_now_in_send_window(berlin_time(2024, 1, 12, 8, 0), &window, &json!({})));
    assert!(is_now_in_send_window(berlin_time(2024, 1, 12, 11, 59), &window, &json!({})));
    assert!(!is_now_in_send_window(berlin_time(2024, 1, 12, 12, 0), &window, &json!({})));
}

#[test]
fn certify_movable_holidays_route_to_hol() {
    // Karfreitag 2024 (29.03) cayó en viernes
    let now = berlin_time(2024, 3, 29, 10, 0);
    assert!(is_german_public_holiday(now.date_naive()));

    let weekday_only = json!({"fri": [{"from": "00:00", "to": "23:59"}]});
    assert!(!is_now_in_send_window(now, &weekday_only, &json!({})));

    let with_hol = json!({"hol": [{"from": "09:00", "to": "11:00"}]});
    assert!(is_now_in_send_window(now, &with_hol, &json!({})));
}
