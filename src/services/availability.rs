use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};

use crate::config::AppConfig;
use crate::models::AvailabilityStatus;

/// Availability gate for booking requests: open weekdays, the lunch service
/// window, a party-size ceiling, and the same-day rule.
pub struct AvailabilityPolicy {
    open_days: Vec<Weekday>,
    service_start: NaiveTime,
    service_end: NaiveTime,
    max_party_size: u32,
}

impl AvailabilityPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            open_days: config.open_days.clone(),
            service_start: NaiveTime::parse_from_str(&config.service_start, "%H:%M")
                .unwrap_or_else(|_| NaiveTime::from_hms_opt(13, 0, 0).unwrap()),
            service_end: NaiveTime::parse_from_str(&config.service_end, "%H:%M")
                .unwrap_or_else(|_| NaiveTime::from_hms_opt(16, 30, 0).unwrap()),
            max_party_size: config.max_party_size,
        }
    }

    pub fn check(
        &self,
        date: &str,
        time: &str,
        party_size: u32,
        today: NaiveDate,
    ) -> AvailabilityStatus {
        let date = match NaiveDate::parse_from_str(date, "%d/%m/%Y") {
            Ok(d) => d,
            Err(_) => {
                return AvailabilityStatus::Invalid(format!("fecha no reconocida: {date}"));
            }
        };
        let time = match NaiveTime::parse_from_str(time, "%H:%M") {
            Ok(t) => t,
            Err(_) => {
                return AvailabilityStatus::Invalid(format!("hora no reconocida: {time}"));
            }
        };

        if date == today {
            return AvailabilityStatus::SameDay;
        }
        if date < today {
            return AvailabilityStatus::Unavailable(
                "Esa fecha ya ha pasado. ¿Qué otro día os vendría bien?".to_string(),
            );
        }
        if !self.open_days.contains(&date.weekday()) {
            return AvailabilityStatus::Unavailable(format!(
                "Ese día estamos cerrados. Abrimos {}.",
                self.open_days_label()
            ));
        }
        if time < self.service_start || time > self.service_end {
            return AvailabilityStatus::Unavailable(format!(
                "Servimos comidas de {} a {}. ¿Os encaja otra hora?",
                self.service_start.format("%H:%M"),
                self.service_end.format("%H:%M")
            ));
        }
        if party_size == 0 {
            return AvailabilityStatus::Invalid("número de personas no válido".to_string());
        }
        if party_size > self.max_party_size {
            return AvailabilityStatus::Unavailable(format!(
                "Para grupos de más de {} personas llamadnos por teléfono y lo organizamos.",
                self.max_party_size
            ));
        }

        AvailabilityStatus::Available
    }

    fn open_days_label(&self) -> String {
        let names: Vec<&str> = self
            .open_days
            .iter()
            .map(|d| match d {
                Weekday::Mon => "los lunes",
                Weekday::Tue => "los martes",
                Weekday::Wed => "los miércoles",
                Weekday::Thu => "los jueves",
                Weekday::Fri => "los viernes",
                Weekday::Sat => "los sábados",
                Weekday::Sun => "los domingos",
            })
            .collect();
        names.join(" y ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AvailabilityPolicy {
        AvailabilityPolicy {
            open_days: vec![Weekday::Sat, Weekday::Sun],
            service_start: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            service_end: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            max_party_size: 12,
        }
    }

    fn today() -> NaiveDate {
        // A Wednesday.
        NaiveDate::from_ymd_opt(2025, 11, 26).unwrap()
    }

    #[test]
    fn test_open_weekend_slot_is_available() {
        // 29/11/2025 is a Saturday.
        assert_eq!(
            policy().check("29/11/2025", "14:00", 4, today()),
            AvailabilityStatus::Available
        );
    }

    #[test]
    fn test_same_day_detected() {
        assert_eq!(
            policy().check("26/11/2025", "14:00", 4, today()),
            AvailabilityStatus::SameDay
        );
    }

    #[test]
    fn test_closed_weekday_rejected() {
        // 27/11/2025 is a Thursday.
        let verdict = policy().check("27/11/2025", "14:00", 4, today());
        match verdict {
            AvailabilityStatus::Unavailable(msg) => assert!(msg.contains("cerrados")),
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_outside_service_window_rejected() {
        let verdict = policy().check("29/11/2025", "21:00", 4, today());
        assert!(matches!(verdict, AvailabilityStatus::Unavailable(_)));
    }

    #[test]
    fn test_party_ceiling() {
        let verdict = policy().check("29/11/2025", "14:00", 13, today());
        match verdict {
            AvailabilityStatus::Unavailable(msg) => assert!(msg.contains("teléfono")),
            other => panic!("expected unavailable, got {other:?}"),
        }
        assert_eq!(
            policy().check("29/11/2025", "14:00", 12, today()),
            AvailabilityStatus::Available
        );
    }

    #[test]
    fn test_unparseable_inputs_are_invalid() {
        assert!(matches!(
            policy().check("el sábado", "14:00", 4, today()),
            AvailabilityStatus::Invalid(_)
        ));
        assert!(matches!(
            policy().check("29/11/2025", "a las dos", 4, today()),
            AvailabilityStatus::Invalid(_)
        ));
    }

    #[test]
    fn test_past_date_rejected() {
        assert!(matches!(
            policy().check("22/11/2025", "14:00", 4, today()),
            AvailabilityStatus::Unavailable(_)
        ));
    }
}
