use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of "now" for every time-window decision.
///
/// Handlers, the lifecycle rules and the status scheduler all read time through
/// this trait so tests can pin or advance it.
pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        primitive_now_utc()
    }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: std::sync::Mutex<PrimitiveDateTime>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(now: PrimitiveDateTime) -> Self {
        Self { now: std::sync::Mutex::new(now) }
    }

    pub(crate) fn set(&self, value: PrimitiveDateTime) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = value;
    }

    pub(crate) fn advance(&self, by: time::Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> PrimitiveDateTime {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn to_primitive_utc(value: OffsetDateTime) -> PrimitiveDateTime {
    let utc = value.to_offset(UtcOffset::UTC);
    PrimitiveDateTime::new(utc.date(), utc.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Date, Duration, Time};

    fn fixed() -> PrimitiveDateTime {
        let date = Date::from_calendar_date(2025, time::Month::January, 2).unwrap();
        let time = Time::from_hms(10, 20, 30).unwrap();
        PrimitiveDateTime::new(date, time)
    }

    #[test]
    fn format_primitive_outputs_utc_z() {
        assert_eq!(format_primitive(fixed()), "2025-01-02T10:20:30Z");
    }

    #[test]
    fn to_primitive_utc_drops_offset() {
        let offset = UtcOffset::from_hms(3, 0, 0).unwrap();
        let shifted = fixed().assume_utc().to_offset(offset);
        assert_eq!(to_primitive_utc(shifted), fixed());
    }

    #[test]
    fn manual_clock_moves_only_when_told() {
        let clock = ManualClock::new(fixed());
        assert_eq!(clock.now(), fixed());

        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), fixed() + Duration::minutes(5));

        clock.set(fixed());
        assert_eq!(clock.now(), fixed());
    }
}
