use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use mongodb::bson::DateTime as BsonDateTime;

/// Minimum lead time for modifying or cancelling a cita.
pub const ANTICIPACION_MINIMA_HORAS: i64 = 24;

pub fn chrono_to_bson(dt: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(dt.timestamp_millis())
}

/// Maps Spanish weekday names (as stored in horario documents) to chrono.
pub fn weekday_de_dia(dia: &str) -> Option<Weekday> {
    match dia {
        "Lunes" => Some(Weekday::Mon),
        "Martes" => Some(Weekday::Tue),
        "Miércoles" => Some(Weekday::Wed),
        "Jueves" => Some(Weekday::Thu),
        "Viernes" => Some(Weekday::Fri),
        "Sábado" => Some(Weekday::Sat),
        "Domingo" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Next occurrence of `dia` strictly after `ahora`, at `hora_inicio` (HH:MM).
///
/// If today is the requested weekday the slot lands next week: a "Lunes
/// 08:00" slot published on a Monday is bookable for the following Monday.
pub fn proxima_fecha_dia(
    dia: &str,
    hora_inicio: &str,
    ahora: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let objetivo = weekday_de_dia(dia)?;
    let (hora, minuto) = parse_hora(hora_inicio)?;

    let actual = ahora.weekday().num_days_from_sunday() as i64;
    let destino = objetivo.num_days_from_sunday() as i64;

    let mut diferencia = destino - actual;
    if diferencia <= 0 {
        diferencia += 7;
    }

    let fecha = ahora.date_naive() + Duration::days(diferencia);
    let naive = fecha.and_hms_opt(hora, minuto, 0)?;
    Some(DateTime::from_naive_utc_and_offset(naive, Utc))
}

/// Splits "HH:MM" into (hour, minute). Format is validated upstream; stored
/// data that fails to parse yields None rather than a panic.
pub fn parse_hora(hora: &str) -> Option<(u32, u32)> {
    let (h, m) = hora.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

/// 24-hour lead-time gate: modify/cancel actions are rejected when the cita
/// is less than 24 hours away.
pub fn cumple_anticipacion(fecha_cita: DateTime<Utc>, ahora: DateTime<Utc>) -> bool {
    fecha_cita - ahora >= Duration::hours(ANTICIPACION_MINIMA_HORAS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_proxima_fecha_dia_futuro() {
        // 2026-08-26 is a Wednesday
        let ahora = dt(2026, 8, 26, 10, 0);
        let viernes = proxima_fecha_dia("Viernes", "08:00", ahora).unwrap();
        assert_eq!(viernes, dt(2026, 8, 28, 8, 0));
        assert_eq!(viernes.weekday(), Weekday::Fri);
    }

    #[test]
    fn test_proxima_fecha_mismo_dia_salta_una_semana() {
        let ahora = dt(2026, 8, 26, 10, 0); // Wednesday
        let miercoles = proxima_fecha_dia("Miércoles", "09:30", ahora).unwrap();
        assert_eq!(miercoles, dt(2026, 9, 2, 9, 30));
    }

    #[test]
    fn test_proxima_fecha_dia_anterior_en_la_semana() {
        let ahora = dt(2026, 8, 26, 10, 0); // Wednesday
        let lunes = proxima_fecha_dia("Lunes", "07:00", ahora).unwrap();
        assert_eq!(lunes, dt(2026, 8, 31, 7, 0));
    }

    #[test]
    fn test_proxima_fecha_dia_invalido() {
        let ahora = dt(2026, 8, 26, 10, 0);
        assert!(proxima_fecha_dia("Feriado", "08:00", ahora).is_none());
        assert!(proxima_fecha_dia("Lunes", "25:00", ahora).is_none());
    }

    #[test]
    fn test_parse_hora() {
        assert_eq!(parse_hora("08:15"), Some((8, 15)));
        assert_eq!(parse_hora("23:59"), Some((23, 59)));
        assert_eq!(parse_hora("24:00"), None);
        assert_eq!(parse_hora("0800"), None);
    }

    #[test]
    fn test_anticipacion_24h() {
        let ahora = dt(2026, 8, 26, 10, 0);
        // exactly 24h away: allowed
        assert!(cumple_anticipacion(dt(2026, 8, 27, 10, 0), ahora));
        // 25h away: allowed
        assert!(cumple_anticipacion(dt(2026, 8, 27, 11, 0), ahora));
        // 23h59m away: rejected
        assert!(!cumple_anticipacion(dt(2026, 8, 27, 9, 59), ahora));
        // already in the past: rejected
        assert!(!cumple_anticipacion(dt(2026, 8, 25, 10, 0), ahora));
    }
}
