// [libs/domain/sending/src/lib.rs]
/*!
 * =================================================================
 * APARATO: SEND WINDOW ENGINE
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: DECISIÓN "AHORA ∈ VENTANA" EN EUROPE/BERLIN
 *
 * Contrato: la ventana es {mon..sun, hol: [{from:"HH:MM", to:"HH:MM"}...]}
 * (los slots también se aceptan como pares de 2 elementos). Festivo alemán
 * usa la clave `hol`; resto, la clave del día. "Ahora" está dentro sii
 * algún slot bien formado cumple from <= minutos < to. Ventana de campaña
 * vacía delega en la global del workspace.
 * =================================================================
 */

pub mod holidays;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Europe::Berlin;
use chrono_tz::Tz;
use serde_json::Value;

pub use holidays::is_german_public_holiday;

/// "HH:MM" -> minutos del día; None ante cualquier malformación.
pub fn parse_hhmm_to_minutes(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    let (hours_raw, minutes_raw) = trimmed.split_once(':')?;

    let hours: u32 = hours_raw.parse().ok()?;
    let minutes: u32 = minutes_raw.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Una ventana cuenta como definida si alguna clave tiene slots.
pub fn window_is_nonempty(window: &Value) -> bool {
    let Value::Object(map) = window else {
        return false;
    };
    map.values()
        .any(|slots| matches!(slots, Value::Array(items) if !items.is_empty()))
}

/// Slots tolerantes: {"from","to"} o pares ["HH:MM","HH:MM"].
fn iter_slots(slots_value: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Array(items)) = slots_value else {
        return Vec::new();
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(slot) => {
                let from = slot.get("from").and_then(Value::as_str).unwrap_or("").trim();
                let to = slot.get("to").and_then(Value::as_str).unwrap_or("").trim();
                if !from.is_empty() && !to.is_empty() {
                    out.push((from.to_string(), to.to_string()));
                }
            }
            Value::Array(pair) if pair.len() == 2 => {
                let from = pair[0].as_str().unwrap_or("").trim();
                let to = pair[1].as_str().unwrap_or("").trim();
                if !from.is_empty() && !to.is_empty() {
                    out.push((from.to_string(), to.to_string()));
                }
            }
            _ => {}
        }
    }
    out
}

fn weekday_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

/// "Ahora" (Berlin) contra ventana de campaña con fallback al workspace.
pub fn is_now_in_send_window(now_berlin: DateTime<Tz>, camp_window: &Value, global_window: &Value) -> bool {
    let effective = if window_is_nonempty(camp_window) {
        camp_window
    } else if global_window.is_object() {
        global_window
    } else {
        return false;
    };

    let Value::Object(window_map) = effective else {
        return false;
    };

    let key = if is_german_public_holiday(now_berlin.date_naive()) {
        "hol"
    } else {
        weekday_key(now_berlin.weekday())
    };

    let current_minutes = now_berlin.hour() * 60 + now_berlin.minute();

    for (from_raw, to_raw) in iter_slots(window_map.get(key)) {
        let Some(from) = parse_hhmm_to_minutes(&from_raw) else {
            continue;
        };
        let Some(to) = parse_hhmm_to_minutes(&to_raw) else {
            continue;
        };
        if to <= from {
            continue;
        }
        if from <= current_minutes && current_minutes < to {
            return true;
        }
    }

    false
}

/// "Ahora" físico proyectado a Berlin.
pub fn now_berlin() -> DateTime<Tz> {
    Utc::now().with_timezone(&Berlin)
}

/// Helper de construcción para pruebas y simulaciones.
pub fn berlin_time(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
    Berlin
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("unambiguous Berlin timestamp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hhmm_parsing_is_strict() {
        assert_eq!(parse_hhmm_to_minutes("10:30"), Some(630));
        assert_eq!(parse_hhmm_to_minutes(" 00:00 "), Some(0));
        assert_eq!(parse_hhmm_to_minutes("24:00"), None);
        assert_eq!(parse_hhmm_to_minutes("10:60"), None);
        assert_eq!(parse_hhmm_to_minutes("1030"), None);
        assert_eq!(parse_hhmm_to_minutes(""), None);
    }

    #[test]
    fn weekday_slot_is_half_open() {
        let window = json!({"mon": [{"from": "09:00", "to": "12:00"}]});
        // 2024-01-08 es lunes
        assert!(is_now_in_send_window(berlin_time(2024, 1, 8, 9, 0), &window, &json!({})));
        assert!(is_now_in_send_window(berlin_time(2024, 1, 8, 11, 59), &window, &json!({})));
        assert!(!is_now_in_send_window(berlin_time(2024, 1, 8, 12, 0), &window, &json!({})));
        assert!(!is_now_in_send_window(berlin_time(2024, 1, 8, 8, 59), &window, &json!({})));
    }

    #[test]
    fn pair_format_slots_are_accepted() {
        let window = json!({"tue": [["08:00", "10:00"]]});
        assert!(is_now_in_send_window(berlin_time(2024, 1, 9, 9, 0), &window, &json!({})));
    }

    #[test]
    fn inverted_or_broken_slots_are_skipped() {
        let window = json!({"wed": [
            {"from": "12:00", "to": "09:00"},
            {"from": "xx", "to": "18:00"},
        ]});
        assert!(!is_now_in_send_window(berlin_time(2024, 1, 10, 10, 0), &window, &json!({})));
    }

    #[test]
    fn empty_campaign_window_falls_back_to_global() {
        let global = json!({"hol": [{"from": "10:00", "to": "12:00"}]});
        // 2024-01-01 (Neujahr) es festivo alemán
        let now = berlin_time(2024, 1, 1, 10, 30);

        assert!(is_now_in_send_window(now, &json!({}), &global));
        assert!(!is_now_in_send_window(now, &json!({"hol": []}), &json!({"hol": []})));
    }

    #[test]
    fn holiday_ignores_weekday_slots() {
        // 2024-01-01 cayó en lunes; la clave mon NO aplica en festivo
        let window = json!({"mon": [{"from": "00:00", "to": "23:59"}]});
        assert!(!is_now_in_send_window(berlin_time(2024, 1, 1, 10, 0), &window, &json!({})));
    }
}
