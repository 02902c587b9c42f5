// [tests/mirror/libs/core/crypto/sealing_integrity.test.rs]
/*!
 * =================================================================
 * APARATO: CERTIFICADOR DE SELLADO DE SECRETOS
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: ROUND-TRIP AEAD, RECHAZO DE MUTACIONES Y HUELLA h64
 * =================================================================
 */

use serenity_core_crypto::fingerprint::{fingerprint_is_valid, h64_text};
use serenity_core_crypto::{decrypt_secret, encrypt_secret, parse_key_material, CryptoError, SEALED_PREFIX};

const KEY_HEX: &str = "9f8e7d6c5b4a39281706f5e4d3c2b1a09f8e7d6c5b4a39281706f5e4d3c2b1a0";

#[test]
fn certify_sealing_round_trip_and_tamper_rejection() {
    println!("\n🔐 [INICIO]: Auditoría de sellado AEAD v1:gcm...");
    let mut anomalies = 0u32;

    let key = parse_key_material("SERENITY_PASS_KEY", KEY_HEX).expect("key material");

    // 1. ROUND-TRIP
    println!("   🧪 Fase 1: round-trip de secreto de buzón...");
    let plaintext = "smtp-password-äöü-2026";
    let sealed = encrypt_secret(plaintext, &key).expect("seal");

    if !sealed.starts_with(SEALED_PREFIX) {
        println!("      ❌ FALLO: el sello no lleva el prefijo de formato.");
        anomalies += 1;
    }
    if decrypt_secret(&sealed, &key).expect("open") != plaintext {
        println!("      ❌ FALLO: el round-trip no preserva el texto plano.");
        anomalies += 1;
    }

    // 2. NONCE FRESCO: dos sellados del mismo texto jamás coinciden
    println!("   🧪 Fase 2: frescura de nonce...");
    let sealed_again = encrypt_secret(plaintext, &key).expect("seal");
    if sealed == sealed_again {
        println!("      ❌ FALLO: nonce reutilizado (sellos idénticos).");
        anomalies += 1;
    }

    // 3. MUTACIÓN DE UN BYTE: la autenticación debe rechazar
    println!("   🧪 Fase 3: rechazo de ciphertext mutado...");
    let body = sealed.trim_start_matches(SEALED_PREFIX);
    let mut tampered_body: Vec<char> = body.chars().collect();
    let victim = tampered_body.len() / 2;
    tampered_body[victim] = if tampered_body[victim] == 'A' { 'B' } else { 'A' };
    let tampered = format!("{SEALED_PREFIX}{}", tampered_body.into_iter().collect::<String>());

    match decrypt_secret(&tampered, &key) {
        Err(CryptoError::AuthenticationFailed) | Err(CryptoError::BlobTooShort(_)) => {}
        other => {
            println!("      ❌ FALLO: mutación aceptada o error inesperado: {other:?}");
            anomalies += 1;
        }
    }

    // 4. CLAVE EQUIVOCADA
    println!("   🧪 Fase 4: clave ajena...");
    let other_key = parse_key_material(
        "SERENITY_PASS_KEY",
        "0000000000000000000000000000000000000000000000000000000000000001",
    )
    .expect("key material");
    if decrypt_secret(&sealed, &other_key).is_ok() {
        println!("      ❌ FALLO: una clave ajena abrió el secreto.");
        anomalies += 1;
    }

    println!("\n🏁 [INFORME]: anomalías={anomalies}");
    assert_eq!(anomalies, 0, "La integridad del sellado ha sido comprometida.");
}

#[test]
fn certify_h64_fingerprint_contract() {
    // misma entrada, misma huella; entradas distintas divergen
    let h1 = h64_text("AB");
    let h2 = h64_text("AB");
    let h3 = h64_text("AC");

    assert_eq!(h1, h2);
    assert_ne!(h1, h3);

    // el resultado real de una tarea jamás debe ser marcador reservado
    assert!(fingerprint_is_valid(Some(h1)));
    assert!(!fingerprint_is_valid(Some(0)));
    assert!(!fingerprint_is_valid(Some(1)));
    assert!(!fingerprint_is_valid(Some(-1)));
    assert!(!fingerprint_is_valid(None));
}
