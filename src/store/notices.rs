//! System notice texts posted into case threads

use chrono::{DateTime, Utc};

use crate::models::CaseKind;

fn subject(kind: CaseKind) -> &'static str {
    match kind {
        CaseKind::Request => "Permohonan Anda",
        CaseKind::Objection => "Keberatan Anda",
    }
}

pub fn completion(
    kind: CaseKind,
    note: Option<&str>,
    evidence_deadline: DateTime<Utc>,
    window_days: i64,
) -> String {
    let mut body = format!("{} telah selesai diproses.", subject(kind));
    if let Some(note) = note {
        body.push_str(&format!(" Catatan petugas: {}", note));
    }
    body.push_str(&format!(
        " Mohon unggah bukti penggunaan informasi dalam waktu {} hari (paling lambat {}).",
        window_days,
        evidence_deadline.format("%d-%m-%Y")
    ));
    body
}

pub fn rejection(kind: CaseKind, note: &str) -> String {
    format!("{} ditolak dengan alasan: {}", subject(kind), note)
}

pub fn session_ended(by: &str) -> String {
    format!("Sesi chat telah diakhiri oleh {}.", by)
}

pub fn session_resumed(by: &str) -> String {
    format!("Sesi chat dilanjutkan oleh {}.", by)
}
