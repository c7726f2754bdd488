//! IdGenerator port - 新着メールへの id 採番
//!
//! 採番は時刻（Clock）と乱数から作る ULID です。テストでは FixedClock を渡すと
//! timestamp 部分が固定されます。

use std::sync::Mutex;

use crate::domain::TaskId;
use crate::ports::Clock;
use ulid::{Generator, Ulid};

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// Mints ULIDs stamped with the clock's current time.
///
/// Ids minted within the same millisecond still increase strictly, so two
/// emails registered back to back keep their registration order as tie-break.
pub struct UlidGenerator<C> {
    clock: C,
    monotonic: Mutex<Generator>,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            monotonic: Mutex::new(Generator::new()),
        }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let now = self.clock.now();
        let mut generator = self.monotonic.lock().unwrap_or_else(|e| e.into_inner());
        // 乱数部が溢れた場合（同一 ms 内で 2^80 件）は単発の ULID にフォールバック
        let ulid = generator.generate_from_datetime(now.into()).unwrap_or_else(|_| {
            Ulid::from_parts(now.timestamp_millis().max(0) as u64, rand::random())
        });
        TaskId::from_ulid(ulid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeDelta, TimeZone, Utc};

    #[test]
    fn ids_are_unique() {
        let id_gen = UlidGenerator::new(SystemClock);

        let ids: Vec<TaskId> = (0..100).map(|_| id_gen.generate_task_id()).collect();
        let mut dedup = ids.clone();
        dedup.sort();
        dedup.dedup();

        assert_eq!(dedup.len(), ids.len());
    }

    #[test]
    fn fixed_clock_stamps_timestamp_and_keeps_mint_order() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let first = id_gen.generate_task_id();
        let second = id_gen.generate_task_id();

        assert!(first < second);
        assert_eq!(first.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(second.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert!(first.to_string().starts_with("email-"));
    }

    #[test]
    fn later_clock_gives_larger_id() {
        let clock = std::sync::Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let id_gen = UlidGenerator::new(std::sync::Arc::clone(&clock));

        let before = id_gen.generate_task_id();
        clock.advance(TimeDelta::seconds(1));
        let after = id_gen.generate_task_id();

        assert!(before < after);
    }
}
