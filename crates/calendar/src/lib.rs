//! Appointment calendar tools for the steward runtime.
//!
//! An in-memory [`AppointmentBook`] and the three tools that let the model
//! check, book and cancel slots on the owner's behalf.

mod book;
mod tools;

pub use book::{Appointment, AppointmentBook, BookError, DEFAULT_SLOT_MINUTES};
pub use tools::{
    CHECK_AVAILABILITY, CheckAvailability, DELETE, Delete, SCHEDULE, Schedule, catalog, register,
};
