//! Lenient timestamp parsing for request bodies.
//!
//! Everything is normalized to UTC `PrimitiveDateTime`, which is how the
//! database stores it.

use serde::de::Error as _;
use serde::Deserialize;
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};

use crate::core::time::to_primitive_utc;

pub(crate) fn parse_utc(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(to_primitive_utc(value));
    }

    // datetime-local inputs arrive without seconds or offset.
    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value);
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value);
    }

    None
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<PrimitiveDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc(&raw).ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

pub(crate) fn deserialize_option<'de, D>(
    deserializer: D,
) -> Result<Option<PrimitiveDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_utc(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn offsets_are_normalized_to_utc() {
        assert_eq!(parse_utc("2025-03-01T12:00:00+03:00"), Some(datetime!(2025-03-01 09:00)));
        assert_eq!(parse_utc("2025-03-01T09:00:00Z"), Some(datetime!(2025-03-01 09:00)));
    }

    #[test]
    fn local_inputs_are_taken_as_utc() {
        assert_eq!(parse_utc("2025-03-01T09:00"), Some(datetime!(2025-03-01 09:00)));
        assert_eq!(parse_utc("2025-03-01T09:00:30"), Some(datetime!(2025-03-01 09:00:30)));
        assert_eq!(parse_utc("tomorrow"), None);
    }
}
