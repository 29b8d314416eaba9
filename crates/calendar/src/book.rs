//! In-memory appointment book.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Default appointment length in minutes.
pub const DEFAULT_SLOT_MINUTES: i64 = 60;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BookError {
    #[error("{start} overlaps an existing appointment at {conflict}")]
    SlotTaken {
        start: DateTime<Utc>,
        conflict: DateTime<Utc>,
    },

    #[error("{0} is in the past")]
    InPast(DateTime<Utc>),

    #[error("no appointment starts at {0}")]
    NotFound(DateTime<Utc>),
}

/// A booked slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Appointment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub attendee: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
}

impl Appointment {
    fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}

/// Appointments keyed by start time. Every appointment lasts one slot.
#[derive(Debug)]
pub struct AppointmentBook {
    slot: TimeDelta,
    appointments: RwLock<BTreeMap<DateTime<Utc>, Appointment>>,
}

impl Default for AppointmentBook {
    fn default() -> Self {
        Self::new(TimeDelta::minutes(DEFAULT_SLOT_MINUTES))
    }
}

impl AppointmentBook {
    pub fn new(slot: TimeDelta) -> Self {
        Self {
            slot,
            appointments: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn slot(&self) -> TimeDelta {
        self.slot
    }

    /// The appointment overlapping the slot starting at `start`, if any.
    pub async fn conflict(&self, start: DateTime<Utc>) -> Option<Appointment> {
        let end = start + self.slot;
        self.appointments
            .read()
            .await
            .values()
            .find(|a| a.overlaps(start, end))
            .cloned()
    }

    pub async fn is_available(&self, start: DateTime<Utc>) -> bool {
        self.conflict(start).await.is_none()
    }

    /// Book the slot starting at `start`.
    pub async fn schedule(
        &self,
        start: DateTime<Utc>,
        attendee: impl Into<String>,
        purpose: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Appointment, BookError> {
        if start < now {
            return Err(BookError::InPast(start));
        }
        let end = start + self.slot;

        let mut appointments = self.appointments.write().await;
        if let Some(existing) = appointments.values().find(|a| a.overlaps(start, end)) {
            return Err(BookError::SlotTaken {
                start,
                conflict: existing.start,
            });
        }

        let appointment = Appointment {
            start,
            end,
            attendee: attendee.into(),
            purpose,
        };
        appointments.insert(start, appointment.clone());
        info!(%start, attendee = %appointment.attendee, "appointment scheduled");
        Ok(appointment)
    }

    /// Remove the appointment starting exactly at `start`.
    pub async fn cancel(&self, start: DateTime<Utc>) -> Result<Appointment, BookError> {
        let removed = self
            .appointments
            .write()
            .await
            .remove(&start)
            .ok_or(BookError::NotFound(start))?;
        info!(%start, "appointment deleted");
        Ok(removed)
    }

    /// All appointments in start order.
    pub async fn list(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        at("2024-07-01T00:00:00Z")
    }

    #[tokio::test]
    async fn schedule_then_check() {
        let book = AppointmentBook::default();
        let start = at("2024-07-15T15:00:00Z");
        assert!(book.is_available(start).await);

        let appointment = book.schedule(start, "Dana", None, now()).await.unwrap();
        assert_eq!(appointment.end, at("2024-07-15T16:00:00Z"));
        assert!(!book.is_available(start).await);
        assert!(!book.is_available(at("2024-07-15T15:30:00Z")).await);
        assert!(book.is_available(at("2024-07-15T16:00:00Z")).await);
        assert!(book.is_available(at("2024-07-15T14:00:00Z")).await);
    }

    #[tokio::test]
    async fn overlapping_booking_rejected() {
        let book = AppointmentBook::default();
        book.schedule(at("2024-07-15T15:00:00Z"), "Dana", None, now())
            .await
            .unwrap();

        let err = book
            .schedule(at("2024-07-15T14:30:00Z"), "Lee", None, now())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BookError::SlotTaken {
                start: at("2024-07-15T14:30:00Z"),
                conflict: at("2024-07-15T15:00:00Z"),
            }
        );
        assert_eq!(book.list().await.len(), 1);
    }

    #[tokio::test]
    async fn past_booking_rejected() {
        let book = AppointmentBook::default();
        let err = book
            .schedule(at("2024-06-30T09:00:00Z"), "Dana", None, now())
            .await
            .unwrap_err();
        assert_eq!(err, BookError::InPast(at("2024-06-30T09:00:00Z")));
    }

    #[tokio::test]
    async fn cancel_requires_exact_start() {
        let book = AppointmentBook::new(TimeDelta::minutes(30));
        book.schedule(
            at("2024-07-15T15:00:00Z"),
            "Dana",
            Some("intro call".into()),
            now(),
        )
        .await
        .unwrap();

        assert_eq!(
            book.cancel(at("2024-07-15T15:15:00Z")).await,
            Err(BookError::NotFound(at("2024-07-15T15:15:00Z")))
        );
        let removed = book.cancel(at("2024-07-15T15:00:00Z")).await.unwrap();
        assert_eq!(removed.purpose.as_deref(), Some("intro call"));
        assert!(book.list().await.is_empty());
    }
}
