use tracing::warn;

use super::{is_reserved, AlarmId};
use crate::error::ValidationError;

/// Pick the id for a new alarm.
///
/// The result is one above the largest of `existing` and `high_water`
/// (`high_water` is the largest id ever handed out, so deleting the newest
/// alarm does not free its id). Reserved sentinel ids are skipped.
pub fn allocate_id<I>(existing: I, high_water: AlarmId) -> Result<AlarmId, ValidationError>
where
    I: IntoIterator<Item = AlarmId>,
{
    let max = existing.into_iter().fold(high_water, AlarmId::max);
    let mut candidate = max.checked_add(1).ok_or(ValidationError::IdSpaceExhausted)?;
    while is_reserved(candidate) {
        warn!(skipped = candidate, "alarm id collides with a reserved id");
        candidate = candidate
            .checked_add(1)
            .ok_or(ValidationError::IdSpaceExhausted)?;
    }
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::DAILY_RESET_ALARM_ID;

    #[test]
    fn first_id_is_one() {
        assert_eq!(allocate_id([], 0), Ok(1));
    }

    #[test]
    fn max_plus_one() {
        assert_eq!(allocate_id([4, 2, 9], 0), Ok(10));
    }

    #[test]
    fn high_water_prevents_reuse() {
        assert_eq!(allocate_id([1, 2], 5), Ok(6));
    }

    #[test]
    fn skips_daily_reset_id() {
        assert_eq!(
            allocate_id([DAILY_RESET_ALARM_ID - 1], 0),
            Ok(DAILY_RESET_ALARM_ID + 1)
        );
    }

    #[test]
    fn exhausted_at_the_top() {
        assert_eq!(
            allocate_id([AlarmId::MAX], 0),
            Err(ValidationError::IdSpaceExhausted)
        );
    }
}
