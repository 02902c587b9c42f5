// [libs/domain/sending/src/holidays.rs]
/*!
 * =================================================================
 * APARATO: GERMAN PUBLIC HOLIDAYS
 * CLASIFICACIÓN: DOMAIN KERNEL (ESTRATO L2)
 * RESPONSABILIDAD: FESTIVOS NACIONALES ALEMANES SIN SERVICIO EXTERNO
 *
 * # Mathematical Proof (Computus):
 * El domingo de Pascua se calcula con el algoritmo anónimo gregoriano
 * (Meeus/Jones/Butcher); los festivos móviles (Karfreitag, Ostermontag,
 * Himmelfahrt, Pfingstmontag) son offsets fijos sobre esa fecha.
 * =================================================================
 */

use chrono::{Datelike, Duration, NaiveDate};

/// Domingo de Pascua (calendario gregoriano) para un año dado.
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("valid easter date")
}

/// Festivos de ámbito nacional (los que aplican en todos los Länder):
/// Neujahr, Karfreitag, Ostermontag, Tag der Arbeit, Christi Himmelfahrt,
/// Pfingstmontag, Tag der Deutschen Einheit, 1./2. Weihnachtstag.
pub fn is_german_public_holiday(date: NaiveDate) -> bool {
    let (month, day) = (date.month(), date.day());

    match (month, day) {
        (1, 1) | (5, 1) | (10, 3) | (12, 25) | (12, 26) => return true,
        _ => {}
    }

    let easter = easter_sunday(date.year());
    let movable = [
        easter - Duration::days(2), // Karfreitag
        easter + Duration::days(1), // Ostermontag
        easter + Duration::days(39), // Christi Himmelfahrt
        easter + Duration::days(50), // Pfingstmontag
    ];

    movable.contains(&date)
}
