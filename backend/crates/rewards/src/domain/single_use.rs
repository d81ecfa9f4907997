//! Single-use, time-bound credentials
//!
//! Refresh credentials, launch codes and redeem tokens share one lifecycle:
//!
//! ```text
//! ISSUED --consume before expiry--> CONSUMED (terminal)
//! ISSUED --now >= expires_at------> EXPIRED  (terminal)
//! ```
//!
//! The predicate and the mutation live here once. Store implementations
//! mirror [`SingleUse::check_consumable`] in their conditional `UPDATE`/`DELETE`
//! and fall back to it only to classify a miss.

use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeRejection {
    NotFound,
    AlreadyConsumed,
    Expired,
}

pub trait SingleUse {
    fn expires_at(&self) -> DateTime<Utc>;

    fn is_consumed(&self) -> bool;

    /// Flip the record into its consumed state.
    fn mark_consumed(&mut self, now: DateTime<Utc>);

    /// `AlreadyConsumed` wins over `Expired`: a used credential stays used.
    fn check_consumable(&self, now: DateTime<Utc>) -> Result<(), ConsumeRejection> {
        if self.is_consumed() {
            return Err(ConsumeRejection::AlreadyConsumed);
        }
        if now >= self.expires_at() {
            return Err(ConsumeRejection::Expired);
        }
        Ok(())
    }
}

/// Check-and-mark on a record the caller holds exclusively.
pub fn consume<T: SingleUse>(
    record: Option<&mut T>,
    now: DateTime<Utc>,
) -> Result<&mut T, ConsumeRejection> {
    let record = record.ok_or(ConsumeRejection::NotFound)?;
    record.check_consumable(now)?;
    record.mark_consumed(now);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    struct Ticket {
        expires_at: DateTime<Utc>,
        used_at: Option<DateTime<Utc>>,
    }

    impl SingleUse for Ticket {
        fn expires_at(&self) -> DateTime<Utc> {
            self.expires_at
        }

        fn is_consumed(&self) -> bool {
            self.used_at.is_some()
        }

        fn mark_consumed(&mut self, now: DateTime<Utc>) {
            self.used_at = Some(now);
        }
    }

    #[test]
    fn test_consume_once() {
        let now = Utc::now();
        let mut ticket = Ticket {
            expires_at: now + TimeDelta::seconds(120),
            used_at: None,
        };

        assert!(consume(Some(&mut ticket), now).is_ok());
        assert_eq!(ticket.used_at, Some(now));
        assert_eq!(
            consume(Some(&mut ticket), now).err(),
            Some(ConsumeRejection::AlreadyConsumed)
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let now = Utc::now();
        let ticket = Ticket {
            expires_at: now,
            used_at: None,
        };
        assert_eq!(ticket.check_consumable(now), Err(ConsumeRejection::Expired));
        assert_eq!(
            ticket.check_consumable(now - TimeDelta::milliseconds(1)),
            Ok(())
        );
    }

    #[test]
    fn test_consumed_takes_precedence_over_expired() {
        let now = Utc::now();
        let ticket = Ticket {
            expires_at: now - TimeDelta::seconds(1),
            used_at: Some(now - TimeDelta::seconds(10)),
        };
        assert_eq!(
            ticket.check_consumable(now),
            Err(ConsumeRejection::AlreadyConsumed)
        );
    }

    #[test]
    fn test_missing_record() {
        assert_eq!(
            consume::<Ticket>(None, Utc::now()).err(),
            Some(ConsumeRejection::NotFound)
        );
    }
}
